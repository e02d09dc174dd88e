pub mod addresses;
pub mod admins;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod common;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod roles;
pub mod users;
pub mod wishlist;

use crate::auth::AuthService;
use crate::services::{
    accounts::AccountService, addresses::AddressService, admins::AdminService,
    cart::CartService, categories::CategoryService, dashboard::DashboardService,
    order_status::OrderStatusService, orders::OrderService, password_reset::ResetNotifier,
    products::CatalogService, reviews::ReviewService, roles::RoleService,
    wishlist::WishlistService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub reviews: Arc<ReviewService>,
    pub catalog: Arc<CatalogService>,
    pub categories: Arc<CategoryService>,
    pub accounts: Arc<AccountService>,
    pub admins: Arc<AdminService>,
    pub roles: Arc<RoleService>,
    pub addresses: Arc<AddressService>,
    pub wishlist: Arc<WishlistService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        reset: ResetNotifier,
    ) -> Self {
        Self {
            cart: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone())),
            reviews: Arc::new(ReviewService::new(db.clone())),
            catalog: Arc::new(CatalogService::new(db.clone())),
            categories: Arc::new(CategoryService::new(db.clone())),
            accounts: Arc::new(AccountService::new(db.clone(), auth.clone(), reset.clone())),
            admins: Arc::new(AdminService::new(db.clone(), auth, reset)),
            roles: Arc::new(RoleService::new(db.clone())),
            addresses: Arc::new(AddressService::new(db.clone())),
            wishlist: Arc::new(WishlistService::new(db.clone())),
            dashboard: Arc::new(DashboardService::new(db)),
        }
    }
}
