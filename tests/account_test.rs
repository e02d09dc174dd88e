//! Customer wishlist and address book, plus the admin dashboard.

mod common;

use axum::http::{Method, StatusCode};
use common::{address_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn wishlist_add_list_remove() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (customer, user_id) = app.signup_customer("wish@example.com").await;
    let lamp = app.create_product(&admin, "Desk Lamp", "45", "0", 3).await;

    let added = app
        .request(Method::POST, "/api/wishlist", Some(json!({ "product_id": lamp })), Some(&customer))
        .await;
    assert_eq!(added.status, StatusCode::CREATED, "{}", added.body);

    let again = app
        .request(Method::POST, "/api/wishlist", Some(json!({ "product_id": lamp })), Some(&customer))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let unknown = app
        .request(
            Method::POST,
            "/api/wishlist",
            Some(json!({ "product_id": uuid::Uuid::new_v4() })),
            Some(&customer),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let mine = app.request(Method::GET, "/api/wishlist", None, Some(&customer)).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.data()["total"], 1);
    assert_eq!(mine.data()["products"][0]["name"], "Desk Lamp");

    let overview = app
        .request(Method::GET, "/api/wishlist/get-all", None, Some(&admin))
        .await;
    assert_eq!(overview.status, StatusCode::OK);
    assert_eq!(overview.data()[0]["user_id"], user_id.to_string());
    assert_eq!(overview.data()[0]["total"], 1);

    let removed = app
        .request(Method::DELETE, "/api/wishlist", Some(json!({ "product_id": lamp })), Some(&customer))
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let twice = app
        .request(Method::DELETE, "/api/wishlist", Some(json!({ "product_id": lamp })), Some(&customer))
        .await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn address_book_and_driver_corrections() {
    let app = TestApp::new().await;
    let driver = app.seed_admin("Driver", vec![]).await;
    let (customer, _) = app.signup_customer("home@example.com").await;
    let (neighbour, _) = app.signup_customer("next-door@example.com").await;

    let created = app
        .request(Method::POST, "/api/address/add", Some(address_json()), Some(&customer))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let address_id = created.data()["id"].as_str().unwrap().to_string();

    let mut bad_zip = address_json();
    bad_zip["zip_code"] = json!("12");
    let invalid = app
        .request(Method::POST, "/api/address/add", Some(bad_zip), Some(&customer))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let listed = app
        .request(Method::GET, "/api/address/get-all", None, Some(&customer))
        .await;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);

    let foreign = app
        .request(Method::GET, &format!("/api/address/{}", address_id), None, Some(&neighbour))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let corrected = app
        .request(
            Method::PUT,
            &format!("/api/address/{}", address_id),
            Some(json!({ "street_address": "14 MG Road" })),
            Some(&driver),
        )
        .await;
    assert_eq!(corrected.status, StatusCode::OK, "{}", corrected.body);
    assert_eq!(corrected.data()["street_address"], "14 MG Road");
    assert_eq!(corrected.data()["city"], "Bengaluru");

    let deleted = app
        .request(Method::DELETE, &format!("/api/address/{}", address_id), None, Some(&customer))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
}

#[tokio::test]
async fn dashboard_overview_counts_orders_and_customers() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let vendor = app.seed_admin("Vendor", vec![]).await;
    let (customer, _) = app.signup_customer("dash@example.com").await;
    let product = app.create_product(&admin, "Notebook", "5", "0", 50).await;

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
            Some(json!({ "address": address_json() })),
            Some(&customer),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED);

    let denied = app
        .request(Method::GET, "/api/admin/dashboard/order/overview", None, Some(&vendor))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let overview = app
        .request(Method::GET, "/api/admin/dashboard/order/overview", None, Some(&admin))
        .await;
    assert_eq!(overview.status, StatusCode::OK, "{}", overview.body);
    let stats = &overview.data()["stats"];
    assert_eq!(stats["all_orders"], 1);
    assert_eq!(stats["pending_orders"], 1);
    assert_eq!(stats["delivered_orders"], 0);
    assert_eq!(stats["customers_this_week"], 1);
    assert!(!overview.data()["cards"].as_array().unwrap().is_empty());
}
