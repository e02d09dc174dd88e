use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::{cleared_session_cookie, session_cookie, AuthRouterExt, CurrentAdmin, Permission},
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{
            created_response, message_response, paginated_response, success_response,
            validate_input, PaginationParams,
        },
        AppState,
    },
    services::{
        admins::{
            AdminListQuery, AdminSigninRequest, AdminSignupRequest, AdminStatusRequest, AdminView,
            UpdateAdminRequest,
        },
        password_reset::{
            ForgetPasswordRequest, ResetPasswordRequest, GENERIC_RESET_MESSAGE,
            RESET_SUCCESS_MESSAGE,
        },
    },
    ApiResponse, ApiResult,
};

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<AdminSignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AdminView>>), ServiceError> {
    validate_input(&payload)?;
    let admin = state.services.admins.signup(payload).await?;
    Ok(created_response("Admin created successfully", admin))
}

/// Issues an admin token in the body and as an httpOnly cookie
#[utoipa::path(
    post,
    path = "/api/admin/signin",
    request_body = AdminSigninRequest,
    responses(
        (status = 200, description = "Signed in; token also set as cookie"),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 403, description = "Account inactive", body = ErrorResponse),
    ),
    tag = "admins"
)]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<AdminSigninRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let session = state.services.admins.signin(payload).await?;
    let cookie = session_cookie(&session.token, state.auth.config.admin_token_ttl);

    let mut response = success_response("Login successful", session).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

pub async fn logout() -> Response {
    let mut response = message_response("Logged out successfully").into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cleared_session_cookie());
    response
}

pub async fn me(State(state): State<AppState>, admin: CurrentAdmin) -> ApiResult<AdminView> {
    let view = state.services.admins.get(admin.id).await?;
    Ok(success_response("Admin profile fetched successfully", view))
}

#[utoipa::path(
    get,
    path = "/api/admin/get-all",
    params(AdminListQuery),
    responses(
        (status = 200, description = "Non-deleted admins"),
        (status = 403, description = "Missing view-admin permission", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admins"
)]
pub async fn list_admins(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<Vec<AdminView>> {
    let (admins, total) = state.services.admins.list(&query).await?;
    let pagination = PaginationParams::resolve(query.page, query.limit).meta(total);
    Ok(paginated_response("Admins fetched successfully", admins, pagination))
}

pub async fn get_admin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AdminView> {
    let admin = state.services.admins.get(id).await?;
    Ok(success_response("Admin fetched successfully", admin))
}

pub async fn update_self(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Json(payload): Json<UpdateAdminRequest>,
) -> ApiResult<AdminView> {
    validate_input(&payload)?;
    let view = state.services.admins.update_self(admin.id, payload).await?;
    Ok(success_response("Admin updated successfully", view))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminStatusRequest>,
) -> ApiResult<AdminView> {
    let view = state
        .services
        .admins
        .update_status(id, payload.is_active)
        .await?;
    Ok(success_response("Admin status updated successfully", view))
}

pub async fn delete_admin(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    state.services.admins.soft_delete(id).await?;
    Ok(message_response("Admin deleted successfully"))
}

pub async fn forget_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgetPasswordRequest>,
) -> ApiResult<()> {
    validate_input(&payload)?;
    state.services.admins.forget_password(payload).await?;
    Ok(message_response(GENERIC_RESET_MESSAGE))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    validate_input(&payload)?;
    state.services.admins.reset_password(payload).await?;
    Ok(message_response(RESET_SUCCESS_MESSAGE))
}

pub fn admin_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/signin", post(signin))
        .route("/forget-password", post(forget_password))
        .route("/reset-password", post(reset_password));

    let own = Router::new()
        .route("/", axum::routing::put(update_self))
        .route("/me", get(me))
        .route("/log-out", post(logout))
        .with_admin_auth();

    let add = Router::new()
        .route("/signup", post(signup))
        .with_permission(Permission::AddAdmin);
    let view = Router::new()
        .route("/get-all", get(list_admins))
        .route("/:id", get(get_admin))
        .with_permission(Permission::ViewAdmin);
    let status = Router::new()
        .route("/status/:id", patch(update_status))
        .with_permission(Permission::ChangeAdminStatus);
    let remove = Router::new()
        .route("/:id", axum::routing::delete(delete_admin))
        .with_permission(Permission::DeleteAdmin);

    Router::new()
        .merge(public)
        .merge(own)
        .merge(add)
        .merge(view)
        .merge(status)
        .merge(remove)
}
