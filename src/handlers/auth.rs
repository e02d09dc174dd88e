use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use crate::{
    auth::session_cookie,
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{created_response, message_response, success_response, validate_input},
        AppState,
    },
    services::{
        accounts::{AuthTokenResponse, SigninRequest, SignupRequest},
        password_reset::{
            ForgetPasswordRequest, ResetPasswordRequest, GENERIC_RESET_MESSAGE,
            RESET_SUCCESS_MESSAGE,
        },
    },
    ApiResponse, ApiResult,
};

/// Register a customer
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, token issued"),
        (status = 400, description = "Invalid input or email already registered", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthTokenResponse>>), ServiceError> {
    validate_input(&payload)?;
    let session = state.services.accounts.signup(payload).await?;
    Ok(created_response("User registered successfully", session))
}

/// Exchange credentials for a customer token, also set as an httpOnly cookie
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in"),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let session = state.services.accounts.signin(payload).await?;
    let cookie = session_cookie(&session.jwt, state.auth.config.customer_token_ttl);

    let mut response = success_response("Login successful", session).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/auth/forget-password",
    request_body = ForgetPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent if the account exists"),
        (status = 501, description = "Mobile reset requested", body = ErrorResponse),
        (status = 502, description = "Email delivery failed", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn forget_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgetPasswordRequest>,
) -> ApiResult<()> {
    validate_input(&payload)?;
    state.services.accounts.forget_password(payload).await?;
    Ok(message_response(GENERIC_RESET_MESSAGE))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    validate_input(&payload)?;
    state.services.accounts.reset_password(payload).await?;
    Ok(message_response(RESET_SUCCESS_MESSAGE))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/forget-password", post(forget_password))
        .route("/reset-password", post(reset_password))
}
