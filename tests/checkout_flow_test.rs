//! End-to-end shopping flow: cart, checkout, payment, fulfilment and reviews.

mod common;

use axum::http::{Method, StatusCode};
use common::{address_json, decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn cart_totals_follow_every_mutation() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (customer, _) = app.signup_customer("asha@example.com").await;

    let shirt = app.create_product(&admin, "Linen Shirt", "100", "10", 20).await;
    let socks = app.create_product(&admin, "Wool Socks", "15.50", "0", 20).await;

    let added = app
        .request(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "product_id": shirt, "quantity": 2 })),
            Some(&customer),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.message(), "Item added to cart");
    let shirt_item = added.data()["id"].as_str().unwrap().to_string();

    let duplicate = app
        .request(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "product_id": shirt, "quantity": 1 })),
            Some(&customer),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.message(), "Item already in cart");

    app.request(
        Method::POST,
        "/api/cart/add",
        Some(json!({ "product_id": socks })),
        Some(&customer),
    )
    .await;

    let cart = app.request(Method::GET, "/api/cart", None, Some(&customer)).await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.data()["total_item"], 3);
    assert_eq!(decimal(&cart.data()["total_price"]), dec!(195.50));

    let bumped = app
        .request(
            Method::PATCH,
            &format!("/api/cart/{}", shirt_item),
            Some(json!({ "quantity": 1 })),
            Some(&customer),
        )
        .await;
    assert_eq!(bumped.status, StatusCode::OK);
    assert_eq!(bumped.data()["quantity"], 3);

    let below_one = app
        .request(
            Method::PATCH,
            &format!("/api/cart/{}", shirt_item),
            Some(json!({ "quantity": -3 })),
            Some(&customer),
        )
        .await;
    assert_eq!(below_one.status, StatusCode::BAD_REQUEST);

    let removed = app
        .request(
            Method::DELETE,
            &format!("/api/cart/{}", shirt_item),
            None,
            Some(&customer),
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let cart = app.request(Method::GET, "/api/cart", None, Some(&customer)).await;
    assert_eq!(cart.data()["total_item"], 1);
    assert_eq!(decimal(&cart.data()["total_price"]), dec!(15.50));
    assert_eq!(cart.data()["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn adding_more_than_stock_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (customer, _) = app.signup_customer("stock@example.com").await;
    let product = app.create_product(&admin, "Rare Print", "40", "0", 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "product_id": product, "quantity": 2 })),
            Some(&customer),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_payment_and_fulfilment() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (customer, user_id) = app.signup_customer("buyer@example.com").await;
    let product = app.create_product(&admin, "Denim Jacket", "200", "25", 5).await;

    let empty_checkout = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": address_json() })),
            Some(&customer),
        )
        .await;
    assert_eq!(empty_checkout.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty_checkout.message(), "Cart is empty");

    app.request(
        Method::POST,
        "/api/cart/add",
        Some(json!({ "product_id": product, "quantity": 2 })),
        Some(&customer),
    )
    .await;

    let created = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": address_json() })),
            Some(&customer),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let order = created.data();
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment_status"], "Pending");
    assert_eq!(order["user_id"], user_id.to_string());
    assert_eq!(order["total_item"], 2);
    assert_eq!(decimal(&order["total_price"]), dec!(300));
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["shipping_address"]["city"], "Bengaluru");
    let order_id = order["id"].as_str().unwrap().to_string();

    let cart = app.request(Method::GET, "/api/cart", None, Some(&customer)).await;
    assert_eq!(cart.data()["total_item"], 0);
    assert!(cart.data()["items"].as_array().unwrap().is_empty());

    let paid = app
        .request(
            Method::POST,
            &format!("/api/orders/{}/payment", order_id),
            Some(json!({ "payment_method": "card", "transaction_id": "txn_42" })),
            Some(&customer),
        )
        .await;
    assert_eq!(paid.status, StatusCode::OK);
    assert_eq!(paid.data()["status"], "PLACED");
    assert_eq!(paid.data()["payment_status"], "COMPLETED");

    let paid_again = app
        .request(
            Method::POST,
            &format!("/api/orders/{}/payment", order_id),
            Some(json!({})),
            Some(&customer),
        )
        .await;
    assert_eq!(paid_again.status, StatusCode::BAD_REQUEST);

    for (step, expected) in [("confirmed", "CONFIRMED"), ("ship", "SHIPPED"), ("deliver", "DELIVERED")] {
        let response = app
            .request(
                Method::PATCH,
                &format!("/api/admin/orders/{}/{}", order_id, step),
                None,
                Some(&admin),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{} failed: {}", step, response.body);
        assert_eq!(response.data()["status"], expected);
    }

    let cancel = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/cancel", order_id),
            None,
            Some(&customer),
        )
        .await;
    assert_eq!(cancel.status, StatusCode::BAD_REQUEST);
    assert_eq!(cancel.message(), "Order cannot be cancelled, current status: DELIVERED");

    let history = app
        .request(Method::GET, "/api/orders/get-all", None, Some(&customer))
        .await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.data().as_array().unwrap().len(), 1);

    let listed = app
        .request(
            Method::GET,
            "/api/admin/orders/all?status=DELIVERED",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["meta"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn customers_cannot_see_each_others_orders() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (owner, _) = app.signup_customer("owner@example.com").await;
    let (other, _) = app.signup_customer("other@example.com").await;
    let product = app.create_product(&admin, "Cap", "12", "0", 10).await;

    app.request(
        Method::POST,
        "/api/cart/add",
        Some(json!({ "product_id": product })),
        Some(&owner),
    )
    .await;
    let created = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": address_json() })),
            Some(&owner),
        )
        .await;
    let order_id = created.data()["id"].as_str().unwrap().to_string();

    let peek = app
        .request(Method::GET, &format!("/api/orders/{}", order_id), None, Some(&other))
        .await;
    assert_eq!(peek.status, StatusCode::NOT_FOUND);

    let cancel = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/cancel", order_id),
            None,
            Some(&other),
        )
        .await;
    assert_eq!(cancel.status, StatusCode::NOT_FOUND);

    let own_cancel = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/cancel", order_id),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(own_cancel.status, StatusCode::OK);
    assert_eq!(own_cancel.data()["status"], "CANCELLED");
}

#[tokio::test]
async fn reviews_require_purchase_and_approval() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (customer, _) = app.signup_customer("reviewer@example.com").await;
    let product = app.create_product(&admin, "Trail Shoes", "150", "0", 10).await;

    let premature = app
        .request(
            Method::POST,
            &format!("/api/reviews/{}", product),
            Some(json!({ "rating": 5, "body": "Great" })),
            Some(&customer),
        )
        .await;
    assert_eq!(premature.status, StatusCode::FORBIDDEN);

    app.request(
        Method::POST,
        "/api/cart/add",
        Some(json!({ "product_id": product })),
        Some(&customer),
    )
    .await;
    let created = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": address_json() })),
            Some(&customer),
        )
        .await;
    let order_id = created.data()["id"].as_str().unwrap().to_string();
    app.request(
        Method::PATCH,
        &format!("/api/admin/orders/{}/deliver", order_id),
        None,
        Some(&admin),
    )
    .await;

    let submitted = app
        .request(
            Method::POST,
            &format!("/api/reviews/{}", product),
            Some(json!({ "rating": 4 })),
            Some(&customer),
        )
        .await;
    assert_eq!(submitted.status, StatusCode::CREATED);
    assert_eq!(submitted.data()["approved"], false);
    let review_id = submitted.data()["id"].as_str().unwrap().to_string();

    let again = app
        .request(
            Method::POST,
            &format!("/api/reviews/{}", product),
            Some(json!({ "rating": 3 })),
            Some(&customer),
        )
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let public = app
        .request(Method::GET, &format!("/api/reviews/{}", product), None, None)
        .await;
    assert_eq!(public.status, StatusCode::OK);
    assert!(public.data().as_array().unwrap().is_empty());

    let edited = app
        .request(
            Method::PUT,
            &format!("/api/reviews/{}", product),
            Some(json!({ "rating": 5, "body": "Held up on a long hike" })),
            Some(&customer),
        )
        .await;
    assert_eq!(edited.status, StatusCode::OK);

    let locked = app
        .request(
            Method::PUT,
            &format!("/api/reviews/{}", product),
            Some(json!({ "rating": 1, "body": "Changed my mind" })),
            Some(&customer),
        )
        .await;
    assert_eq!(locked.status, StatusCode::BAD_REQUEST);

    let approved = app
        .request(
            Method::PATCH,
            &format!("/api/reviews/approve/{}", review_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.message(), "Review approved.");

    let twice = app
        .request(
            Method::PATCH,
            &format!("/api/reviews/approve/{}", review_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(twice.status, StatusCode::CONFLICT);

    let public = app
        .request(Method::GET, &format!("/api/reviews/{}", product), None, None)
        .await;
    assert_eq!(public.data().as_array().unwrap().len(), 1);

    let detail = app
        .request(Method::GET, &format!("/api/product/{}", product), None, None)
        .await;
    assert_eq!(detail.data()["num_ratings"], 1);
    assert_eq!(decimal(&detail.data()["average_rating"]), dec!(5));
}

async fn add_to_cart(app: &TestApp, token: &str, body: serde_json::Value) -> common::TestResponse {
    app.request(Method::POST, "/api/cart/add", Some(body), Some(token))
        .await
}

#[tokio::test]
async fn variant_selections_are_validated_and_stock_is_pooled() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let (customer, _) = app.signup_customer("meera@example.com").await;

    let created = app
        .request(
            Method::POST,
            "/api/product/add",
            Some(json!({
                "name": "Summer Dress",
                "description": "Light cotton dress",
                "brand": "Fjell",
                "top_level_category": "Women",
                "second_level_category": "Dresswear",
                "third_level_category": "Dresses",
                "variants": [{
                    "title": "Red",
                    "colors": ["Red"],
                    "sizes": [{ "name": "M", "quantity": 3 }, { "name": "L", "quantity": 0 }],
                    "price": "60",
                }],
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let dress = created.data()["id"].as_str().unwrap().to_string();
    let variant = created.data()["variants"][0]["id"].as_str().unwrap().to_string();

    let no_variant = add_to_cart(&app, &customer, json!({ "product_id": dress, "size": "M" })).await;
    assert_eq!(no_variant.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_variant.message(), "Please select variant of product");

    let unknown_variant = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": uuid::Uuid::new_v4(), "size": "M" }),
    )
    .await;
    assert_eq!(unknown_variant.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_variant.message(), "Product variant does not exist");

    let wrong_color = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": variant, "size": "M", "color": "Blue" }),
    )
    .await;
    assert_eq!(wrong_color.status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_color.message(), "Color \"Blue\" is not available in this variant");

    let no_size = add_to_cart(&app, &customer, json!({ "product_id": dress, "variant_id": variant })).await;
    assert_eq!(no_size.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_size.message(), "Please choose the size of the variant of the product");

    let sold_out = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": variant, "size": "L" }),
    )
    .await;
    assert_eq!(sold_out.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        sold_out.message(),
        "Size \"L\" is not available in the selected variant or insufficient quantity"
    );

    let too_many = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": variant, "size": "M", "quantity": 4 }),
    )
    .await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);

    let first = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": variant, "size": "M", "color": "Red", "quantity": 2 }),
    )
    .await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);

    let respelled = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": variant, "size": "m", "color": "red", "quantity": 2 }),
    )
    .await;
    assert_eq!(respelled.status, StatusCode::CONFLICT);

    // Same size without a color is a separate line drawing on the same stock.
    let colorless = add_to_cart(
        &app,
        &customer,
        json!({ "product_id": dress, "variant_id": variant, "size": "m", "quantity": 2 }),
    )
    .await;
    assert_eq!(colorless.status, StatusCode::CREATED);
    assert_eq!(colorless.data()["size"], "M");
    let colorless_id = colorless.data()["id"].as_str().unwrap().to_string();

    let cart = app.request(Method::GET, "/api/cart", None, Some(&customer)).await;
    assert_eq!(cart.data()["total_item"], 4);

    let oversold = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": address_json() })),
            Some(&customer),
        )
        .await;
    assert_eq!(oversold.status, StatusCode::BAD_REQUEST);
    assert_eq!(oversold.message(), "Insufficient stock for product: Summer Dress");

    let cart = app.request(Method::GET, "/api/cart", None, Some(&customer)).await;
    assert_eq!(cart.data()["total_item"], 4);

    let removed = app
        .request(Method::DELETE, &format!("/api/cart/{}", colorless_id), None, Some(&customer))
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let order = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "address": address_json() })),
            Some(&customer),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{}", order.body);
    assert_eq!(order.data()["total_item"], 2);
    assert_eq!(decimal(&order.data()["total_price"]), dec!(120));
    assert_eq!(order.data()["items"][0]["size"], "M");
    assert_eq!(order.data()["items"][0]["color"], "Red");
}
