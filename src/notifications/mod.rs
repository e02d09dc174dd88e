//! Outbound email for password resets.
//!
//! [`HttpMailer`] posts JSON to a transactional-email API with a bounded request
//! timeout. [`LogMailer`] only logs and is used when no API is configured.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Email request failed: {0}")]
    Transport(String),
    #[error("Email provider rejected the message with status {0}")]
    Rejected(u16),
    #[error("Email client misconfigured: {0}")]
    Config(String),
}

/// Message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Which frontend a reset link points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAudience {
    Customer,
    Admin,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Builds password reset emails pointing at the configured frontends.
#[derive(Debug, Clone)]
pub struct ResetEmailComposer {
    pub from: String,
    pub customer_base_url: String,
    pub admin_base_url: String,
    pub valid_for: Duration,
}

impl ResetEmailComposer {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            from: cfg.email_from.clone(),
            customer_base_url: cfg.frontend_customer_url.clone(),
            admin_base_url: cfg.frontend_admin_url.clone(),
            valid_for: cfg.reset_token_ttl(),
        }
    }

    pub fn reset_url(&self, audience: ResetAudience, token: &str) -> String {
        match audience {
            ResetAudience::Customer => format!(
                "{}/auth/reset-password/{}",
                self.customer_base_url.trim_end_matches('/'),
                token
            ),
            ResetAudience::Admin => format!(
                "{}/authentication/reset-password?token={}",
                self.admin_base_url.trim_end_matches('/'),
                token
            ),
        }
    }

    pub fn compose(&self, audience: ResetAudience, to: &str, token: &str) -> EmailMessage {
        let url = self.reset_url(audience, token);
        let greeting = match audience {
            ResetAudience::Customer => "Hello",
            ResetAudience::Admin => "Dear Admin",
        };
        let minutes = (self.valid_for.as_secs() / 60).max(1);

        EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: "Reset Your Password".to_string(),
            html: format!(
                "<p>{greeting},</p>\
                 <p>We received a request to reset your password. \
                 Use the link below to choose a new one:</p>\
                 <p><a href=\"{url}\">Reset Password</a></p>\
                 <p>This link is valid for {minutes} minutes. \
                 If you did not request a password reset, please ignore this email.</p>"
            ),
        }
    }
}

/// Delivers mail through an HTTP JSON API
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailerError::Config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "email delivery failed");
            MailerError::Transport(e.to_string())
        })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "email provider returned an error");
            return Err(MailerError::Rejected(response.status().as_u16()));
        }

        info!("email delivered");
        Ok(())
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        info!(to = %message.to, subject = %message.subject, "email not sent, no provider configured");
        Ok(())
    }
}

/// Chooses the HTTP mailer when an endpoint is configured.
pub fn mailer_from_config(cfg: &AppConfig) -> Result<SharedMailer, MailerError> {
    match &cfg.email_api_url {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(HttpMailer::new(
            url.clone(),
            cfg.email_api_key.clone(),
            cfg.email_timeout(),
        )?)),
        _ => Ok(Arc::new(LogMailer)),
    }
}
