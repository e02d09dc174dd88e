use crate::{
    auth::{
        password::{hash_password, verify_password},
        AuthService,
    },
    entities::{address, user},
    errors::ServiceError,
    notifications::ResetAudience,
    services::{
        addresses::MOBILE_RE,
        cart::get_or_create_cart,
        password_reset::{
            invalid_token, generate_reset_token, stored_token_state, ForgetPasswordRequest,
            ResetNotifier, ResetPasswordRequest, StoredToken,
        },
    },
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be 8 to 15 digits"))]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SigninRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(regex(path = "MOBILE_RE", message = "Mobile number must be 8 to 15 digits"))]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthTokenResponse {
    pub jwt: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: user::Model,
    pub addresses: Vec<address::Model>,
}

/// Customer accounts: signup, signin, profile and password reset.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    reset: ResetNotifier,
}

impl AccountService {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>, reset: ResetNotifier) -> Self {
        Self { db, auth, reset }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await?)
    }

    async fn find_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Creates the account and its empty cart, then issues a token.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<AuthTokenResponse, ServiceError> {
        let email = request.email.trim().to_lowercase();
        let duplicate = || {
            ServiceError::BadRequest(format!("User already exists with this email: {}", email))
        };
        if self.find_by_email(&email).await?.is_some() {
            return Err(duplicate());
        }

        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            mobile: Set(request.mobile),
            reset_password_token: Set(None),
            reset_password_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match ServiceError::from_db(e, "") {
            ServiceError::Conflict(_) => duplicate(),
            other => other,
        })?;
        get_or_create_cart(&txn, created.id).await?;
        txn.commit().await?;

        let jwt = self.auth.issue_customer_token(created.id)?;
        info!(user_id = %created.id, "customer signed up");
        Ok(AuthTokenResponse {
            jwt,
            user_id: created.id,
        })
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signin(&self, request: SigninRequest) -> Result<AuthTokenResponse, ServiceError> {
        let user = self
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;
        if !verify_password(&request.password, &user.password_hash)? {
            warn!(user_id = %user.id, "customer signin rejected");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let jwt = self.auth.issue_customer_token(user.id)?;
        Ok(AuthTokenResponse {
            jwt,
            user_id: user.id,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        let user = self.find_user(user_id).await?;
        let addresses = address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .all(&*self.db)
            .await?;
        Ok(UserProfile { user, addresses })
    }

    /// Updates profile fields of `user_id`; used both for self-service and by admins.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        let mut active: user::ActiveModel = self.find_user(user_id).await?.into();
        if let Some(v) = request.first_name {
            active.first_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.last_name {
            active.last_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.mobile {
            active.mobile = Set(Some(v));
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn list(&self, page: u64, limit: u64) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let paginator = user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .paginate(&*self.db, limit.clamp(1, 100));
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((users, total))
    }

    /// Issues and mails a reset token. Unknown emails and pending tokens
    /// succeed silently so callers cannot probe for accounts.
    #[instrument(skip(self, request))]
    pub async fn forget_password(&self, request: ForgetPasswordRequest) -> Result<(), ServiceError> {
        let email = request.target_email()?;
        let Some(user) = self.find_by_email(&email).await? else {
            return Ok(());
        };

        let now = Utc::now();
        match stored_token_state(
            user.reset_password_token.as_deref(),
            user.reset_password_expires,
            now,
        ) {
            StoredToken::Live => return Ok(()),
            StoredToken::Expired => {
                self.store_token(user.clone(), None).await?;
            }
            StoredToken::None => {}
        }

        let token = generate_reset_token();
        let recipient = user.email.clone();
        let user_id = user.id;
        self.store_token(user, Some((token.clone(), self.reset.expiry_from(now))))
            .await?;

        if let Err(err) = self
            .reset
            .deliver(ResetAudience::Customer, &recipient, &token)
            .await
        {
            let user = self.find_user(user_id).await?;
            self.store_token(user, None).await?;
            return Err(err);
        }

        info!(user_id = %user_id, "password reset link sent");
        Ok(())
    }

    async fn store_token(
        &self,
        user: user::Model,
        token: Option<(String, chrono::DateTime<Utc>)>,
    ) -> Result<(), ServiceError> {
        let mut active: user::ActiveModel = user.into();
        let (token, expires) = token.unzip();
        active.reset_password_token = Set(token);
        active.reset_password_expires = Set(expires);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), ServiceError> {
        let user = user::Entity::find()
            .filter(user::Column::ResetPasswordToken.eq(request.token.trim()))
            .one(&*self.db)
            .await?
            .ok_or_else(invalid_token)?;

        if stored_token_state(
            user.reset_password_token.as_deref(),
            user.reset_password_expires,
            Utc::now(),
        ) != StoredToken::Live
        {
            self.store_token(user, None).await?;
            return Err(invalid_token());
        }

        let password_hash = hash_password(&request.new_password)?;
        let user_id = user.id;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.reset_password_token = Set(None);
        active.reset_password_expires = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(user_id = %user_id, "password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_requires_six_character_password() {
        let request = SignupRequest {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha@example.com".into(),
            password: "12345".into(),
            mobile: None,
        };
        assert!(request.validate().is_err());

        let request = SignupRequest {
            password: "123456".into(),
            ..request
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn signup_rejects_malformed_email_and_mobile() {
        let request = SignupRequest {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "not-an-email".into(),
            password: "secret1".into(),
            mobile: Some("12ab".into()),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("mobile"));
    }
}
