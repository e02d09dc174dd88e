use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, Permission},
    errors::ServiceError,
    handlers::{
        common::{created_response, message_response, success_response, validate_input},
        AppState,
    },
    services::roles::{RoleRequest, RoleView, UpdateRoleRequest},
    ApiResponse, ApiResult,
};

pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<RoleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RoleView>>), ServiceError> {
    validate_input(&payload)?;
    let role = state.services.roles.create(payload).await?;
    Ok(created_response("Role created successfully", role))
}

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<RoleView>> {
    let roles = state.services.roles.list().await?;
    Ok(success_response("Roles fetched successfully", roles))
}

pub async fn get_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<RoleView> {
    let role = state.services.roles.get(id).await?;
    Ok(success_response("Role fetched successfully", role))
}

pub async fn get_role_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<RoleView> {
    let role = state.services.roles.get_by_name(&name).await?;
    Ok(success_response("Role fetched successfully", role))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<RoleView> {
    validate_input(&payload)?;
    let role = state.services.roles.update(id, payload).await?;
    Ok(success_response("Role updated successfully", role))
}

pub async fn delete_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.roles.delete(id).await?;
    Ok(message_response("Role deleted successfully"))
}

pub fn role_routes() -> Router<AppState> {
    let add = Router::new()
        .route("/add", post(create_role))
        .with_permission(Permission::AddRole);
    let view = Router::new()
        .route("/get-all", get(list_roles))
        .route("/by-id/:id", get(get_role))
        .route("/by-name/:name", get(get_role_by_name))
        .with_permission(Permission::ViewRole);
    let edit = Router::new()
        .route("/update/:id", put(update_role))
        .with_permission(Permission::EditRole);
    let remove = Router::new()
        .route("/:id", delete(delete_role))
        .with_permission(Permission::DeleteRole);

    Router::new()
        .merge(add)
        .merge(view)
        .merge(edit)
        .merge(remove)
}
