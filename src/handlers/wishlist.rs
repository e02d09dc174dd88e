use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::{
    auth::{AuthRouterExt, CurrentUser, Permission},
    entities::wishlist_item,
    errors::ServiceError,
    handlers::{
        common::{created_response, message_response, success_response},
        AppState,
    },
    services::wishlist::{UserWishlist, WishlistRequest, WishlistView},
    ApiResponse, ApiResult,
};

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<WishlistRequest>,
) -> Result<(StatusCode, Json<ApiResponse<wishlist_item::Model>>), ServiceError> {
    let entry = state
        .services
        .wishlist
        .add(user.id, payload.product_id)
        .await?;
    Ok(created_response("Product added to wishlist", entry))
}

pub async fn get_wishlist(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<WishlistView> {
    let wishlist = state.services.wishlist.list(user.id).await?;
    Ok(success_response("Wishlist fetched successfully", wishlist))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<WishlistRequest>,
) -> ApiResult<()> {
    state
        .services
        .wishlist
        .remove(user.id, payload.product_id)
        .await?;
    Ok(message_response("Product removed from wishlist"))
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Vec<UserWishlist>> {
    let wishlists = state.services.wishlist.list_all().await?;
    Ok(success_response("Wishlists fetched successfully", wishlists))
}

pub fn wishlist_routes() -> Router<AppState> {
    let own = Router::new()
        .route(
            "/",
            get(get_wishlist)
                .post(add_to_wishlist)
                .delete(remove_from_wishlist),
        )
        .with_customer_auth();
    let admin = Router::new()
        .route("/get-all", get(list_all))
        .with_permission(Permission::ViewWishlist);

    Router::new().merge(own).merge(admin)
}
