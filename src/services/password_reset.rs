//! Shared pieces of the forgot/reset password flow used by customers and admins.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    errors::ServiceError,
    notifications::{ResetAudience, ResetEmailComposer, SharedMailer},
};

pub const GENERIC_RESET_MESSAGE: &str =
    "If your email is registered with us, you will receive a password reset link shortly.";
pub const RESET_SEND_FAILED: &str = "Unable to send password reset email. Please try again later.";
pub const RESET_SUCCESS_MESSAGE: &str = "Password has been reset successfully";
const INVALID_TOKEN: &str = "Invalid or expired token";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ForgetPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 15))]
    pub mobile: Option<String>,
}

impl ForgetPasswordRequest {
    /// Normalized email to reset. Mobile-only requests are not supported.
    pub fn target_email(&self) -> Result<String, ServiceError> {
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let mobile = self
            .mobile
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        match (email, mobile) {
            (Some(email), _) => Ok(email.to_lowercase()),
            (None, Some(_)) => Err(ServiceError::NotImplemented(
                "Mobile-based password reset is not yet supported.".to_string(),
            )),
            (None, None) => Err(ServiceError::ValidationError(
                "Email or mobile number is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub token: String,
    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// 32 random bytes, hex encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn token_is_live(expires: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires.is_some_and(|at| at > now)
}

/// State of a stored reset token at the time of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredToken {
    None,
    Live,
    Expired,
}

pub fn stored_token_state(
    token: Option<&str>,
    expires: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StoredToken {
    match token {
        None => StoredToken::None,
        Some(_) if token_is_live(expires, now) => StoredToken::Live,
        Some(_) => StoredToken::Expired,
    }
}

pub fn invalid_token() -> ServiceError {
    ServiceError::BadRequest(INVALID_TOKEN.to_string())
}

/// Sends reset links through the configured mailer.
#[derive(Clone)]
pub struct ResetNotifier {
    mailer: SharedMailer,
    composer: ResetEmailComposer,
}

impl ResetNotifier {
    pub fn new(mailer: SharedMailer, composer: ResetEmailComposer) -> Self {
        Self { mailer, composer }
    }

    pub fn ttl(&self) -> Duration {
        self.composer.valid_for
    }

    /// Expiry for a token issued at `now`
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ttl = ChronoDuration::from_std(self.ttl()).unwrap_or_else(|_| ChronoDuration::minutes(5));
        now + ttl
    }

    pub async fn deliver(
        &self,
        audience: ResetAudience,
        to: &str,
        token: &str,
    ) -> Result<(), ServiceError> {
        let message = self.composer.compose(audience, to, token);
        self.mailer.send(message).await.map_err(|e| {
            warn!(error = %e, "password reset email failed");
            ServiceError::ExternalServiceError(RESET_SEND_FAILED.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{EmailMessage, Mailer, MailerError};
    use async_trait::async_trait;
    use std::sync::Arc;

    mockall::mock! {
        Mail {}

        #[async_trait]
        impl Mailer for Mail {
            async fn send(&self, message: EmailMessage) -> Result<(), MailerError>;
        }
    }

    fn composer() -> ResetEmailComposer {
        ResetEmailComposer {
            from: "no-reply@storefront.local".into(),
            customer_base_url: "https://shop.example".into(),
            admin_base_url: "https://admin.example".into(),
            valid_for: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn notifier_sends_link_for_audience() {
        let mut mailer = MockMail::new();
        mailer
            .expect_send()
            .withf(|msg| {
                msg.to == "ops@shop.example"
                    && msg.html.contains("https://admin.example/authentication/reset-password?token=tok")
            })
            .times(1)
            .returning(|_| Ok(()));

        let notifier = ResetNotifier::new(Arc::new(mailer), composer());
        notifier
            .deliver(ResetAudience::Admin, "ops@shop.example", "tok")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mailer_failure_becomes_bad_gateway() {
        let mut mailer = MockMail::new();
        mailer
            .expect_send()
            .returning(|_| Err(MailerError::Rejected(503)));

        let notifier = ResetNotifier::new(Arc::new(mailer), composer());
        let err = notifier
            .deliver(ResetAudience::Customer, "a@b.io", "tok")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), RESET_SEND_FAILED);
    }

    #[test]
    fn expiry_uses_composer_ttl() {
        let notifier = ResetNotifier::new(Arc::new(MockMail::new()), composer());
        let now = Utc::now();
        assert_eq!(notifier.expiry_from(now), now + ChronoDuration::minutes(5));
    }

    #[test]
    fn tokens_are_64_hex_chars_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_state_follows_expiry() {
        let now = Utc::now();
        assert_eq!(stored_token_state(None, None, now), StoredToken::None);
        assert_eq!(
            stored_token_state(Some("t"), Some(now + ChronoDuration::minutes(1)), now),
            StoredToken::Live
        );
        assert_eq!(
            stored_token_state(Some("t"), Some(now - ChronoDuration::seconds(1)), now),
            StoredToken::Expired
        );
        assert_eq!(stored_token_state(Some("t"), None, now), StoredToken::Expired);
    }

    #[test]
    fn mobile_only_request_is_not_supported() {
        let request = ForgetPasswordRequest {
            email: None,
            mobile: Some("9876543210".into()),
        };
        let err = request.target_email().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_IMPLEMENTED);

        let request = ForgetPasswordRequest {
            email: Some(" Asha@Example.com ".into()),
            mobile: None,
        };
        assert_eq!(request.target_email().unwrap(), "asha@example.com");
    }
}
