use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, CurrentUser, Permission},
    entities::user,
    handlers::{
        common::{paginated_response, success_response, validate_input, PaginationParams},
        AppState,
    },
    services::accounts::{UpdateUserRequest, UserProfile},
    ApiResult,
};

pub async fn profile(State(state): State<AppState>, user: CurrentUser) -> ApiResult<UserProfile> {
    let profile = state.services.accounts.profile(user.id).await?;
    Ok(success_response("User profile fetched successfully", profile))
}

pub async fn update_self(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<user::Model> {
    validate_input(&payload)?;
    let updated = state.services.accounts.update(user.id, payload).await?;
    Ok(success_response("User updated successfully", updated))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Vec<user::Model>> {
    let (users, total) = state
        .services
        .accounts
        .list(page.page(), page.limit())
        .await?;
    Ok(paginated_response("Users fetched successfully", users, page.meta(total)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<user::Model> {
    validate_input(&payload)?;
    let updated = state.services.accounts.update(id, payload).await?;
    Ok(success_response("User updated successfully", updated))
}

pub fn user_routes() -> Router<AppState> {
    let own = Router::new()
        .route("/profile", get(profile))
        .route("/", put(update_self))
        .with_customer_auth();
    let view = Router::new()
        .route("/get-all", get(list_users))
        .with_permission(Permission::ViewUser);
    let update = Router::new()
        .route("/:id", put(update_user))
        .with_permission(Permission::UpdateUser);

    Router::new().merge(own).merge(view).merge(update)
}
