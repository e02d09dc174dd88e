/*!
 * # Authentication and Authorization Module
 *
 * Two token audiences share this module:
 *
 * - customers, identified by `{sub: user_id}` tokens signed with the customer secret
 * - admins, identified by `{sub: admin_id, role: role_id}` tokens signed with the admin secret
 *
 * Tokens are read from `Authorization: Bearer` first and the `token` cookie second.
 * Admin routes are further gated by typed [`Permission`]s or built-in role names.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{role, user};
use crate::errors::ServiceError;
use crate::repositories::AdminRepository;

pub mod password;
pub mod permissions;

pub use permissions::{has_permission, Permission, RoleGrant};

/// Name of the cookie carrying the session token
pub const TOKEN_COOKIE: &str = "token";

/// Claims carried by customer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by admin tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated customer, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
}

/// Authenticated admin, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub grant: RoleGrant,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub customer_secret: String,
    pub admin_secret: String,
    pub customer_token_ttl: Duration,
    pub admin_token_ttl: Duration,
}

impl AuthConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            customer_secret: cfg.jwt_customer_secret.clone(),
            admin_secret: cfg.jwt_admin_secret.clone(),
            customer_token_ttl: Duration::from_secs(cfg.customer_token_ttl_secs),
            admin_token_ttl: Duration::from_secs(cfg.admin_token_ttl_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Access denied")]
    AdminNotFound,

    #[error("Role not found")]
    RoleNotFound,

    #[error("You do not have permission to perform this action")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => {
                ServiceError::Unauthorized(err.to_string())
            }
            AuthError::UserNotFound | AuthError::RoleNotFound => {
                ServiceError::NotFound(err.to_string())
            }
            AuthError::AdminNotFound | AuthError::InsufficientPermissions => {
                ServiceError::Forbidden(err.to_string())
            }
            AuthError::TokenCreation(msg) => ServiceError::JwtError(msg),
            AuthError::Service(inner) => inner,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication service that issues and validates tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    admins: AdminRepository,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            admins: AdminRepository::new(db.clone()),
            db,
        }
    }

    fn expiry(ttl: Duration) -> Result<(i64, i64), AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(ttl)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;
        Ok((now.timestamp(), exp.timestamp()))
    }

    pub fn issue_customer_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let (iat, exp) = Self::expiry(self.config.customer_token_ttl)?;
        let claims = CustomerClaims {
            sub: user_id.to_string(),
            iat,
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.customer_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn issue_admin_token(&self, admin_id: Uuid, role_id: Uuid) -> Result<String, AuthError> {
        let (iat, exp) = Self::expiry(self.config.admin_token_ttl)?;
        let claims = AdminClaims {
            sub: admin_id.to_string(),
            role: role_id.to_string(),
            iat,
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.admin_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn validate_customer_token(&self, token: &str) -> Result<CustomerClaims, AuthError> {
        decode::<CustomerClaims>(
            token,
            &DecodingKey::from_secret(self.config.customer_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "customer token rejected");
            AuthError::InvalidToken
        })
    }

    pub fn validate_admin_token(&self, token: &str) -> Result<AdminClaims, AuthError> {
        decode::<AdminClaims>(
            token,
            &DecodingKey::from_secret(self.config.admin_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "admin token rejected");
            AuthError::InvalidToken
        })
    }

    /// Resolves a customer token into the live user it names
    pub async fn authenticate_customer(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let claims = self.validate_customer_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or(AuthError::UserNotFound)?;

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
        })
    }

    /// Resolves an admin token into the live, non-deleted admin and its role
    pub async fn authenticate_admin(&self, token: &str) -> Result<CurrentAdmin, AuthError> {
        let claims = self.validate_admin_token(token)?;
        let admin_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let admin = self
            .admins
            .find_by_id(admin_id)
            .await?
            .ok_or(AuthError::AdminNotFound)?;

        let role_id = admin.role_id.ok_or(AuthError::RoleNotFound)?;
        let role = role::Entity::find_by_id(role_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or(AuthError::RoleNotFound)?;

        Ok(CurrentAdmin {
            id: admin.id,
            email: admin.email,
            role_id: role.id,
            grant: RoleGrant::new(role.name.clone(), role.permission_set()),
        })
    }
}

/// Reads the session token from the bearer header, falling back to the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value carrying a fresh session token
pub fn session_cookie(token: &str, ttl: Duration) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        TOKEN_COOKIE,
        token,
        ttl.as_secs()
    ))
    .ok()
}

/// `Set-Cookie` value that clears the session cookie
pub fn cleared_session_cookie() -> HeaderValue {
    HeaderValue::from_static("token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
}

fn auth_service(request: &Request) -> Result<Arc<AuthService>, AuthError> {
    request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| {
            AuthError::Service(ServiceError::InternalError(
                "Authentication service not available".to_string(),
            ))
        })
}

/// Authenticates a customer and stores [`CurrentUser`] in the request extensions.
pub async fn customer_auth_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = auth_service(&request)?;
    let token = extract_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let user = auth.authenticate_customer(&token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Authenticates an admin and stores [`CurrentAdmin`] in the request extensions.
pub async fn admin_auth_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = auth_service(&request)?;
    let token = extract_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let admin = auth.authenticate_admin(&token).await?;

    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

/// Rejects admins whose role does not grant `required`
pub async fn permission_middleware(
    State(required): State<Permission>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let admin = request
        .extensions()
        .get::<CurrentAdmin>()
        .ok_or(AuthError::MissingToken)?;

    if !has_permission(&admin.grant, required) {
        warn!(admin_id = %admin.id, permission = %required, "permission denied");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Rejects admins whose role name is not `required_role`
pub async fn role_middleware(
    State(required_role): State<&'static str>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let admin = request
        .extensions()
        .get::<CurrentAdmin>()
        .ok_or(AuthError::MissingToken)?;

    if !admin.grant.is_role(required_role) {
        warn!(admin_id = %admin.id, role = required_role, "role check failed");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentAdmin>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_customer_auth(self) -> Self;
    fn with_admin_auth(self) -> Self;
    fn with_permission(self, permission: Permission) -> Self;
    fn with_role(self, role: &'static str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_customer_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(customer_auth_middleware))
    }

    fn with_admin_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(admin_auth_middleware))
    }

    fn with_permission(self, permission: Permission) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission,
            permission_middleware,
        ))
        .with_admin_auth()
    }

    fn with_role(self, role: &'static str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(role, role_middleware))
            .with_admin_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    async fn service() -> AuthService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        AuthService::new(
            AuthConfig {
                customer_secret: "customer_secret_for_unit_tests_9f8e7d6c5b4a".into(),
                admin_secret: "admin_secret_for_unit_tests_1a2b3c4d5e6f7g".into(),
                customer_token_ttl: Duration::from_secs(3600),
                admin_token_ttl: Duration::from_secs(3600),
            },
            Arc::new(db),
        )
    }

    #[tokio::test]
    async fn customer_token_round_trips() {
        let svc = service().await;
        let id = Uuid::new_v4();
        let token = svc.issue_customer_token(id).unwrap();
        let claims = svc.validate_customer_token(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
    }

    #[tokio::test]
    async fn tokens_are_not_interchangeable_between_audiences() {
        let svc = service().await;
        let customer = svc.issue_customer_token(Uuid::new_v4()).unwrap();
        assert!(svc.validate_admin_token(&customer).is_err());

        let admin = svc
            .issue_admin_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        assert!(svc.validate_customer_token(&admin).is_err());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=b; token=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn missing_token_maps_to_unauthorized() {
        let err: ServiceError = AuthError::MissingToken.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        let err: ServiceError = AuthError::UserNotFound.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        let err: ServiceError = AuthError::AdminNotFound.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
