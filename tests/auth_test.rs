//! Authentication, role based access and password reset over HTTP.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{TestApp, ADMIN_PASSWORD, CUSTOMER_PASSWORD};
use serde_json::json;
use storefront_api::{auth::Permission, services::password_reset::GENERIC_RESET_MESSAGE};

fn session_cookie(response: &common::TestResponse) -> String {
    let raw = response
        .headers
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn health_and_api_docs_are_public() {
    let app = TestApp::new().await;

    let root = app.request(Method::GET, "/", None, None).await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.body, json!({ "message": "E-Commerce website", "status": true }));

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["database"]["status"], "up");

    let docs = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(docs.status, StatusCode::OK);
    assert!(docs.body["paths"]["/api/product/get-all"].is_object());
}

#[tokio::test]
async fn customer_signup_and_signin() {
    let app = TestApp::new().await;
    app.signup_customer("mira@example.com").await;

    let duplicate = app
        .request(
            Method::POST,
            "/auth/signup",
            Some(json!({
                "first_name": "Mira",
                "last_name": "Das",
                "email": "MIRA@example.com",
                "password": CUSTOMER_PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert!(duplicate.message().starts_with("User already exists with this email"));

    let wrong = app
        .request(
            Method::POST,
            "/auth/signin",
            Some(json!({ "email": "mira@example.com", "password": "not-the-password" })),
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.message(), "Invalid email or password");

    let signed_in = app
        .request(
            Method::POST,
            "/auth/signin",
            Some(json!({ "email": "mira@example.com", "password": CUSTOMER_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(signed_in.status, StatusCode::OK);
    let cookie = session_cookie(&signed_in);
    assert!(cookie.starts_with("token="));

    let profile = app
        .request_with_cookie(Method::GET, "/api/user/profile", &cookie)
        .await;
    assert_eq!(profile.status, StatusCode::OK, "{}", profile.body);
    assert_eq!(profile.data()["email"], "mira@example.com");
}

#[tokio::test]
async fn tokens_are_scoped_to_their_audience() {
    let app = TestApp::new().await;
    let (customer, _) = app.signup_customer("scope@example.com").await;
    let admin = app.developer_token().await;

    let anonymous = app.request(Method::GET, "/api/cart", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let customer_on_admin = app
        .request(Method::GET, "/api/admin/get-all", None, Some(&customer))
        .await;
    assert_eq!(customer_on_admin.status, StatusCode::UNAUTHORIZED);

    let admin_on_customer = app
        .request(Method::GET, "/api/cart", None, Some(&admin))
        .await;
    assert_eq!(admin_on_customer.status, StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, "/api/cart", None, Some("not.a.jwt"))
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn permissions_follow_role_grants() {
    let app = TestApp::new().await;
    let vendor = app.seed_admin("Vendor", vec![]).await;
    let editor = app
        .seed_admin("Catalog Editor", vec![Permission::AddCategory])
        .await;

    let product = app.create_product(&vendor, "Vendor Mug", "9", "0", 30).await;

    let vendor_add_category = app
        .request(
            Method::POST,
            "/api/category/add",
            Some(json!({ "name": "Kitchen", "level": 1 })),
            Some(&vendor),
        )
        .await;
    assert_eq!(vendor_add_category.status, StatusCode::FORBIDDEN);

    let editor_add = app
        .request(
            Method::POST,
            "/api/category/add",
            Some(json!({ "name": "Kitchen", "level": 1 })),
            Some(&editor),
        )
        .await;
    assert_eq!(editor_add.status, StatusCode::CREATED);

    let editor_product = app
        .request(
            Method::PATCH,
            &format!("/api/product/quantity/{}", product),
            Some(json!({ "quantity": 1 })),
            Some(&editor),
        )
        .await;
    assert_eq!(editor_product.status, StatusCode::FORBIDDEN);

    let vendor_roles = app
        .request(Method::GET, "/api/role/get-all", None, Some(&vendor))
        .await;
    assert_eq!(vendor_roles.status, StatusCode::FORBIDDEN);

    let vendor_order_delete = app
        .request(
            Method::DELETE,
            &format!("/api/admin/orders/{}", uuid::Uuid::new_v4()),
            None,
            Some(&vendor),
        )
        .await;
    assert_eq!(vendor_order_delete.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn roles_cannot_be_deleted_while_assigned() {
    let app = TestApp::new().await;
    let developer = app.developer_token().await;

    let created = app
        .request(
            Method::POST,
            "/api/role/add",
            Some(json!({ "name": "Support", "permissions": ["view-user", "view-order"] })),
            Some(&developer),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let role_id = created.data()["id"].as_str().unwrap().to_string();

    let by_name = app
        .request(Method::GET, "/api/role/by-name/Support", None, Some(&developer))
        .await;
    assert_eq!(by_name.status, StatusCode::OK);
    assert_eq!(by_name.data()["id"], role_id.as_str());

    let duplicate = app
        .request(
            Method::POST,
            "/api/role/add",
            Some(json!({ "name": "Support", "permissions": [] })),
            Some(&developer),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let hired = app
        .request(
            Method::POST,
            "/api/admin/signup",
            Some(json!({
                "first_name": "Sam",
                "last_name": "Lee",
                "email": "sam@admin.example",
                "password": ADMIN_PASSWORD,
                "role_id": role_id,
            })),
            Some(&developer),
        )
        .await;
    assert_eq!(hired.status, StatusCode::CREATED, "{}", hired.body);
    let sam_id = hired.data()["id"].as_str().unwrap().to_string();

    let blocked = app
        .request(Method::DELETE, &format!("/api/role/{}", role_id), None, Some(&developer))
        .await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);

    let fired = app
        .request(Method::DELETE, &format!("/api/admin/{}", sam_id), None, Some(&developer))
        .await;
    assert_eq!(fired.status, StatusCode::OK);

    let deleted = app
        .request(Method::DELETE, &format!("/api/role/{}", role_id), None, Some(&developer))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let missing = app
        .request(Method::DELETE, &format!("/api/role/{}", role_id), None, Some(&developer))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_session_cookie_and_status() {
    let app = TestApp::new().await;
    let developer = app.developer_token().await;
    let vendor_token = app.seed_admin("Vendor", vec![]).await;

    let signed_in = app
        .request(
            Method::POST,
            "/api/admin/signin",
            Some(json!({ "email": "vendor@admin.example", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(signed_in.status, StatusCode::OK);
    assert_eq!(signed_in.data()["role"]["name"], "Vendor");
    let cookie = session_cookie(&signed_in);

    let me = app
        .request_with_cookie(Method::GET, "/api/admin/me", &cookie)
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.data()["email"], "vendor@admin.example");
    assert!(me.data().get("password_hash").is_none());

    let logout = app
        .request(Method::POST, "/api/admin/log-out", None, Some(&vendor_token))
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(session_cookie(&logout).ends_with("token="));

    let vendor_id = me.data()["id"].as_str().unwrap().to_string();
    let deactivated = app
        .request(
            Method::PATCH,
            &format!("/api/admin/status/{}", vendor_id),
            Some(json!({ "is_active": false })),
            Some(&developer),
        )
        .await;
    assert_eq!(deactivated.status, StatusCode::OK);
    assert_eq!(deactivated.data()["is_active"], false);

    let inactive = app
        .request(
            Method::POST,
            "/api/admin/signin",
            Some(json!({ "email": "vendor@admin.example", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(inactive.status, StatusCode::FORBIDDEN);

    let unknown = app
        .request(
            Method::POST,
            "/api/admin/signin",
            Some(json!({ "email": "ghost@admin.example", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_password_reset_round_trip() {
    let app = TestApp::new().await;
    app.signup_customer("forgetful@example.com").await;

    let unknown = app
        .request(
            Method::POST,
            "/auth/forget-password",
            Some(json!({ "email": "nobody@example.com" })),
            None,
        )
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.message(), GENERIC_RESET_MESSAGE);
    assert_eq!(app.mailer.sent_count(), 0);

    let mobile = app
        .request(
            Method::POST,
            "/auth/forget-password",
            Some(json!({ "mobile": "9876543210" })),
            None,
        )
        .await;
    assert_eq!(mobile.status, StatusCode::NOT_IMPLEMENTED);

    let requested = app
        .request(
            Method::POST,
            "/auth/forget-password",
            Some(json!({ "email": "forgetful@example.com" })),
            None,
        )
        .await;
    assert_eq!(requested.status, StatusCode::OK);
    assert_eq!(app.mailer.sent_count(), 1);
    let token = app.mailer.last_token().expect("reset token in email");

    let bogus = app
        .request(
            Method::POST,
            "/auth/reset-password",
            Some(json!({ "token": "deadbeef", "new_password": "brand-new-pass" })),
            None,
        )
        .await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);
    assert_eq!(bogus.message(), "Invalid or expired token");

    let reset = app
        .request(
            Method::POST,
            "/auth/reset-password",
            Some(json!({ "token": token, "new_password": "brand-new-pass" })),
            None,
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK, "{}", reset.body);

    let reused = app
        .request(
            Method::POST,
            "/auth/reset-password",
            Some(json!({ "token": token, "new_password": "another-pass" })),
            None,
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);

    let old = app
        .request(
            Method::POST,
            "/auth/signin",
            Some(json!({ "email": "forgetful@example.com", "password": CUSTOMER_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .request(
            Method::POST,
            "/auth/signin",
            Some(json!({ "email": "forgetful@example.com", "password": "brand-new-pass" })),
            None,
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn failed_reset_email_clears_the_token() {
    let app = TestApp::new().await;
    app.signup_customer("unlucky@example.com").await;

    app.mailer.set_failing(true);
    let failed = app
        .request(
            Method::POST,
            "/auth/forget-password",
            Some(json!({ "email": "unlucky@example.com" })),
            None,
        )
        .await;
    assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.mailer.sent_count(), 0);

    // No live token was left behind, so the retry sends a fresh link.
    app.mailer.set_failing(false);
    let retried = app
        .request(
            Method::POST,
            "/auth/forget-password",
            Some(json!({ "email": "unlucky@example.com" })),
            None,
        )
        .await;
    assert_eq!(retried.status, StatusCode::OK);
    assert_eq!(app.mailer.sent_count(), 1);
    assert!(app.mailer.last_token().is_some());
}

#[tokio::test]
async fn only_developers_delete_orders() {
    let app = TestApp::new().await;
    let developer = app.developer_token().await;
    let master = app.seed_admin("Master Admin", vec![]).await;
    let (customer, _) = app.signup_customer("deleted-order@example.com").await;
    let product = app.create_product(&developer, "Bottle", "20", "0", 10).await;

    app.request(
        Method::POST,
        "/api/cart/add",
        Some(json!({ "product_id": product })),
        Some(&customer),
    )
    .await;
    let order = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": common::address_json() })),
            Some(&customer),
        )
        .await;
    let order_id = order.data()["id"].as_str().unwrap().to_string();

    let by_master = app
        .request(
            Method::DELETE,
            &format!("/api/admin/orders/{}", order_id),
            None,
            Some(&master),
        )
        .await;
    assert_eq!(by_master.status, StatusCode::FORBIDDEN);

    let by_developer = app
        .request(
            Method::DELETE,
            &format!("/api/admin/orders/{}", order_id),
            None,
            Some(&developer),
        )
        .await;
    assert_eq!(by_developer.status, StatusCode::OK);

    let gone = app
        .request(
            Method::GET,
            &format!("/api/admin/orders/{}", order_id),
            None,
            Some(&developer),
        )
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}
