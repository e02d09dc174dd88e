#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    auth::Permission,
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    notifications::{EmailMessage, Mailer, MailerError},
    rate_limiter::{RateLimitBackend, RateLimitConfig, RateLimitLayer},
    services::{
        admins::{AdminSigninRequest, AdminSignupRequest},
        roles::RoleRequest,
    },
    AppState,
};

pub const ADMIN_PASSWORD: &str = "admin-pass-1";
pub const CUSTOMER_PASSWORD: &str = "customer-pass-1";

/// Mailer that records messages and can be switched into failure mode.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Token embedded in the most recent reset link.
    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let html = &sent.last()?.html;
        let start = html
            .find("reset-password/")
            .map(|i| i + "reset-password/".len())
            .or_else(|| html.find("token=").map(|i| i + "token=".len()))?;
        let rest = &html[start..];
        let end = rest.find('"').unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError::Rejected(503));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// Application wired against a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "customer_secret_for_integration_tests_Vq83kd".to_string(),
            "admin_secret_for_integration_tests_Lz51pw".to_string(),
            "test".to_string(),
        );

        // One connection, otherwise every pooled connection sees its own empty database.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(Arc::new(pool), cfg, mailer.clone());

        let rate_limit = RateLimitLayer::new(
            RateLimitConfig {
                requests_per_window: 10_000,
                window_duration: Duration::from_secs(60),
                enable_headers: true,
                trust_proxy_headers: false,
            },
            RateLimitBackend::InMemory,
        );
        let router = build_router(state.clone(), rate_limit);

        Self {
            router,
            state,
            mailer,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }
        self.send(builder, body).await
    }

    pub async fn request_with_cookie(&self, method: Method, uri: &str, cookie: &str) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie);
        self.send(builder, None).await
    }

    async fn send(&self, mut builder: axum::http::request::Builder, body: Option<Value>) -> TestResponse {
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("router error during test request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Registers a customer and returns `(token, user_id)`.
    pub async fn signup_customer(&self, email: &str) -> (String, Uuid) {
        let response = self
            .request(
                Method::POST,
                "/auth/signup",
                Some(json!({
                    "first_name": "Asha",
                    "last_name": "Rao",
                    "email": email,
                    "password": CUSTOMER_PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "signup failed: {}", response.body);
        let token = response.data()["jwt"].as_str().unwrap().to_string();
        let user_id = Uuid::parse_str(response.data()["user_id"].as_str().unwrap()).unwrap();
        (token, user_id)
    }

    /// Creates a role and an admin holding it, returning the admin's token.
    pub async fn seed_admin(&self, role_name: &str, permissions: Vec<Permission>) -> String {
        let email = format!("{}@admin.example", role_name.to_lowercase().replace(' ', "-"));
        let role = match self.state.services.roles.get_by_name(role_name).await {
            Ok(existing) => existing,
            Err(_) => self
                .state
                .services
                .roles
                .create(RoleRequest {
                    name: role_name.to_string(),
                    permissions,
                })
                .await
                .expect("seed role"),
        };
        self.state
            .services
            .admins
            .signup(AdminSignupRequest {
                first_name: "Ops".into(),
                last_name: role_name.into(),
                email: email.clone(),
                password: ADMIN_PASSWORD.into(),
                mobile: None,
                role_id: role.id,
            })
            .await
            .expect("seed admin");

        self.state
            .services
            .admins
            .signin(AdminSigninRequest {
                email,
                password: ADMIN_PASSWORD.into(),
            })
            .await
            .expect("seed admin signin")
            .token
    }

    pub async fn developer_token(&self) -> String {
        self.seed_admin("Developer", vec![]).await
    }

    /// Creates a simple product through the API and returns its id.
    pub async fn create_product(
        &self,
        admin_token: &str,
        name: &str,
        price: &str,
        discount: &str,
        quantity: i32,
    ) -> Uuid {
        let response = self
            .request(
                Method::POST,
                "/api/product/add",
                Some(json!({
                    "name": name,
                    "description": format!("{} description", name),
                    "brand": "Northwind",
                    "price": price,
                    "discount_percent": discount,
                    "quantity": quantity,
                    "top_level_category": "Men",
                    "second_level_category": "Clothing",
                    "third_level_category": "Shirts",
                })),
                Some(admin_token),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "product add failed: {}", response.body);
        Uuid::parse_str(response.data()["id"].as_str().unwrap()).unwrap()
    }
}

pub fn address_json() -> Value {
    json!({
        "first_name": "Asha",
        "last_name": "Rao",
        "mobile": "9876543210",
        "street_address": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "zip_code": "560001",
    })
}

/// Reads a decimal that may be serialized as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}
