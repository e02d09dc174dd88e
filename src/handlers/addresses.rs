use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, CurrentUser, Permission},
    entities::address,
    errors::ServiceError,
    handlers::{
        common::{created_response, message_response, success_response, validate_input},
        AppState,
    },
    services::addresses::{AddressInput, UpdateAddressRequest},
    ApiResponse, ApiResult,
};

pub async fn create_address(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<AddressInput>,
) -> Result<(StatusCode, Json<ApiResponse<address::Model>>), ServiceError> {
    validate_input(&payload)?;
    let address = state.services.addresses.create(user.id, payload).await?;
    Ok(created_response("Address added successfully", address))
}

pub async fn list_addresses(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<address::Model>> {
    let addresses = state.services.addresses.list(user.id).await?;
    Ok(success_response("Addresses fetched successfully", addresses))
}

pub async fn get_address(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<address::Model> {
    let address = state.services.addresses.get(user.id, id).await?;
    Ok(success_response("Address fetched successfully", address))
}

/// Back-office correction of any customer's address
pub async fn update_address(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> ApiResult<address::Model> {
    validate_input(&payload)?;
    let address = state.services.addresses.update(id, payload).await?;
    Ok(success_response("Address updated successfully", address))
}

pub async fn delete_address(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.addresses.delete(user.id, id).await?;
    Ok(message_response("Address deleted successfully"))
}

pub fn address_routes() -> Router<AppState> {
    let own = Router::new()
        .route("/add", post(create_address))
        .route("/get-all", get(list_addresses))
        .route("/:id", get(get_address).delete(delete_address))
        .with_customer_auth();
    let admin = Router::new()
        .route("/:id", put(update_address))
        .with_permission(Permission::UpdateAddress);

    Router::new().merge(own).merge(admin)
}
