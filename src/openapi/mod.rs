use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Catalog, cart, checkout, fulfilment, reviews and back-office administration.

## Authentication

Customer and admin tokens are separate. Send either as a bearer token, or rely on
the httpOnly `token` cookie set at signin:

```
Authorization: Bearer <jwt>
```

## Rate Limiting

`/api` paths are limited per client IP. Check `X-RateLimit-Limit`,
`X-RateLimit-Remaining` and `X-RateLimit-Reset`.

## Errors

```json
{
  "success": false,
  "message": "Cart is empty",
  "error": "Bad Request",
  "meta": { "request_id": "...", "timestamp": "2026-01-01T00:00:00Z" }
}
```
        "#
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "auth", description = "Customer signup, signin and password reset"),
        (name = "cart", description = "The caller's cart"),
        (name = "orders", description = "Checkout and customer order history"),
        (name = "admin-orders", description = "Order fulfilment"),
        (name = "reviews", description = "Product reviews"),
        (name = "products", description = "Catalog"),
        (name = "categories", description = "Three-level category tree"),
        (name = "admins", description = "Back-office accounts")
    ),
    paths(
        crate::handlers::auth::signup,
        crate::handlers::auth::signin,
        crate::handlers::auth::forget_password,
        crate::handlers::auth::reset_password,
        crate::handlers::cart::add_item,
        crate::handlers::cart::get_cart,
        crate::handlers::cart::update_item,
        crate::handlers::orders::create_order,
        crate::handlers::orders::order_history,
        crate::handlers::orders::confirm_payment,
        crate::handlers::orders::list_orders,
        crate::handlers::reviews::submit_review,
        crate::handlers::reviews::list_reviews,
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::categories::create_category,
        crate::handlers::categories::delete_category,
        crate::handlers::admins::signin,
        crate::handlers::admins::list_admins,
    ),
    components(
        schemas(
            crate::PaginationMeta,
            crate::auth::Permission,
            crate::services::cart::CartTotals,
            crate::services::cart::ProductBrief,
            crate::services::categories::CategoryNode,
            crate::services::categories::UpdateCategoryRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::UpdateQuantityRequest,
            crate::services::products::UpdateStatusRequest,
            crate::services::accounts::UpdateUserRequest,
            crate::services::accounts::AuthTokenResponse,
            crate::services::addresses::AddressInput,
            crate::services::addresses::UpdateAddressRequest,
            crate::services::admins::AdminSignupRequest,
            crate::services::admins::UpdateAdminRequest,
            crate::services::admins::AdminStatusRequest,
            crate::services::admins::RoleSummary,
            crate::services::roles::RoleRequest,
            crate::services::roles::UpdateRoleRequest,
            crate::services::wishlist::WishlistRequest,
            crate::services::wishlist::UserWishlist,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_storefront_paths() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/cart/add"));
        assert!(json.contains("/api/admin/orders/all"));
        assert!(json.contains("Bearer"));
    }
}
