use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, CurrentUser},
    entities::cart_item,
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{created_response, message_response, success_response, validate_input},
        AppState,
    },
    services::cart::{AddCartItemRequest, CartView, UpdateCartItemRequest},
    ApiResponse, ApiResult,
};

/// Add a product (optionally a variant, size and color) to the caller's cart
#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Item added"),
        (status = 400, description = "Invalid quantity or out of stock", body = ErrorResponse),
        (status = 404, description = "Product or variant not found", body = ErrorResponse),
        (status = 409, description = "Item already in cart", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<cart_item::Model>>), ServiceError> {
    validate_input(&payload)?;
    let item = state.services.cart.add_item(user.id, payload).await?;
    Ok(created_response("Item added to cart", item))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses((status = 200, description = "Cart with recomputed totals")),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(State(state): State<AppState>, user: CurrentUser) -> ApiResult<CartView> {
    let cart = state.services.cart.recompute_and_fetch(user.id).await?;
    Ok(success_response("User cart", cart))
}

/// Applies a signed quantity delta to one cart line
#[utoipa::path(
    patch,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Cart item updated"),
        (status = 400, description = "Quantity out of range", body = ErrorResponse),
        (status = 404, description = "Cart item not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> ApiResult<cart_item::Model> {
    validate_input(&payload)?;
    let item = state
        .services
        .cart
        .update_quantity(user.id, id, payload.quantity)
        .await?;
    Ok(success_response("Cart item updated successfully", item))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.cart.remove_item(user.id, id).await?;
    Ok(message_response("Cart item removed successfully"))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/add", post(add_item))
        .route("/:id", patch(update_item).delete(remove_item))
        .with_customer_auth()
}
