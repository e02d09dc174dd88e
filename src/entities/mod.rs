pub mod address;
pub mod admin;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod review;
pub mod role;
pub mod user;
pub mod wishlist_item;

pub use order::{OrderStatus, PaymentStatus};
