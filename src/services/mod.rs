// Shopping
pub mod cart;
pub mod order_status;
pub mod orders;
pub mod reviews;
pub mod wishlist;

// Catalog
pub mod categories;
pub mod products;

// Accounts and access
pub mod accounts;
pub mod addresses;
pub mod admins;
pub mod password_reset;
pub mod roles;

// Back office
pub mod dashboard;
