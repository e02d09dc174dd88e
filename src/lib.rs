//! Storefront API
//!
//! Catalog, cart, checkout, order fulfilment, reviews and back-office
//! administration for a single online store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod rate_limiter;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{middleware, response::Json, Extension, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthService};
use crate::notifications::{ResetEmailComposer, SharedMailer};
use crate::rate_limiter::RateLimitLayer;
use crate::services::password_reset::ResetNotifier;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig, mailer: SharedMailer) -> Self {
        let auth = Arc::new(AuthService::new(
            AuthConfig::from_app_config(&config),
            db.clone(),
        ));
        let reset = ResetNotifier::new(mailer, ResetEmailComposer::from_app_config(&config));
        let services = handlers::AppServices::new(db.clone(), auth.clone(), reset);
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

/// Success envelope. Errors use [`errors::ErrorResponse`].
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
            pagination: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            meta: ResponseMeta::capture(),
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, pagination: PaginationMeta) -> Self {
        let mut response = Self::success(message, data);
        response.meta.pagination = Some(pagination);
        response
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            meta: ResponseMeta::capture(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Assembles the full HTTP surface. CORS, compression and the request
/// timeout are added by the binary.
pub fn build_router(state: AppState, rate_limit: RateLimitLayer) -> Router {
    let auth = state.auth.clone();

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/api", api_routes())
        .merge(openapi::openapi_routes())
        .with_state(state)
        .layer(rate_limit)
        .layer(Extension(auth))
        .layer(TraceLayer::new_for_http().make_span_with(crate::tracing::RequestSpanMaker))
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", handlers::cart::cart_routes())
        .nest("/orders", handlers::orders::customer_order_routes())
        .nest("/admin/orders", handlers::orders::admin_order_routes())
        .nest("/admin/dashboard", handlers::dashboard::dashboard_routes())
        .nest("/admin", handlers::admins::admin_routes())
        .nest("/reviews", handlers::reviews::review_routes())
        .nest("/product", handlers::products::product_routes())
        .nest("/category", handlers::categories::category_routes())
        .nest("/role", handlers::roles::role_routes())
        .nest("/user", handlers::users::user_routes())
        .nest("/address", handlers::addresses::address_routes())
        .nest("/wishlist", handlers::wishlist::wishlist_routes())
}
