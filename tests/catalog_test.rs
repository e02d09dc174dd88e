//! Category hierarchy and product catalog behaviour over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

async fn add_category(app: &TestApp, token: &str, name: &str, level: i32, parent: Option<&str>) -> common::TestResponse {
    app.request(
        Method::POST,
        "/api/category/add",
        Some(json!({ "name": name, "level": level, "parent_id": parent })),
        Some(token),
    )
    .await
}

#[tokio::test]
async fn category_levels_and_parents_are_enforced() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;

    let women = add_category(&app, &admin, "Women", 1, None).await;
    assert_eq!(women.status, StatusCode::CREATED, "{}", women.body);
    let women_id = women.data()["id"].as_str().unwrap().to_string();

    let top_with_parent = add_category(&app, &admin, "Kids", 1, Some(&women_id)).await;
    assert_eq!(top_with_parent.status, StatusCode::BAD_REQUEST);

    let orphan = add_category(&app, &admin, "Clothing", 2, None).await;
    assert_eq!(orphan.status, StatusCode::BAD_REQUEST);

    let missing_parent = add_category(&app, &admin, "Clothing", 2, Some(&Uuid::new_v4().to_string())).await;
    assert_eq!(missing_parent.status, StatusCode::NOT_FOUND);

    let clothing = add_category(&app, &admin, "Clothing", 2, Some(&women_id)).await;
    assert_eq!(clothing.status, StatusCode::CREATED);
    let clothing_id = clothing.data()["id"].as_str().unwrap().to_string();

    let sideways = add_category(&app, &admin, "Footwear", 2, Some(&clothing_id)).await;
    assert_eq!(sideways.status, StatusCode::BAD_REQUEST);

    let duplicate = add_category(&app, &admin, "Women", 1, None).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.message(), "Category already exists");

    let dresses = add_category(&app, &admin, "Dresses", 3, Some(&clothing_id)).await;
    assert_eq!(dresses.status, StatusCode::CREATED);

    let tree = app.request(Method::GET, "/api/category/tree", None, None).await;
    assert_eq!(tree.status, StatusCode::OK);
    let roots = tree.data().as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], "Women");
    assert_eq!(roots[0]["children"][0]["name"], "Clothing");
    assert_eq!(roots[0]["children"][0]["children"][0]["name"], "Dresses");

    let level_two = app
        .request(Method::GET, "/api/category/all?level=2", None, None)
        .await;
    assert_eq!(level_two.status, StatusCode::OK);
    assert_eq!(level_two.body["meta"]["pagination"]["total"], 1);

    let renamed = app
        .request(
            Method::PUT,
            &format!("/api/category/update/{}", clothing_id),
            Some(json!({ "name": "Apparel" })),
            Some(&admin),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.data()["name"], "Apparel");
    assert_eq!(renamed.data()["level"], 2);
}

#[tokio::test]
async fn category_delete_removes_subtree_unless_products_use_it() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;

    // Men > Clothing > Shirts is created on demand by the product.
    let product = app.create_product(&admin, "Oxford Shirt", "80", "0", 4).await;
    let men = app
        .request(Method::GET, "/api/category/all?level=1", None, None)
        .await;
    let men_id = men.data()[0]["id"].as_str().unwrap().to_string();

    let blocked = app
        .request(
            Method::DELETE,
            &format!("/api/category/delete/{}", men_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(blocked.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        blocked.message(),
        "Cannot delete category: a product is associated with this or a subcategory"
    );

    let removed = app
        .request(
            Method::DELETE,
            &format!("/api/product/{}", product),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/category/delete/{}", men_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.body);
    assert_eq!(deleted.data()["deleted_count"], 3);

    let again = app
        .request(
            Method::DELETE,
            &format!("/api/category/delete/{}", men_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_listing_filters_and_sorts() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;

    let shirt = app.create_product(&admin, "Linen Shirt", "100", "10", 20).await;
    let dress = app
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
    assert_eq!(dress.status, StatusCode::CREATED, "{}", dress.body);
    assert_eq!(dress.data()["quantity"], 3);
    assert_eq!(dress.data()["variants"].as_array().unwrap().len(), 1);

    let count = |query: &'static str| {
        let app = &app;
        async move {
            let response = app
                .request(Method::GET, &format!("/api/product/get-all{}", query), None, None)
                .await;
            assert_eq!(response.status, StatusCode::OK, "{}: {}", query, response.body);
            response.data()["total_products"].as_u64().unwrap()
        }
    };

    assert_eq!(count("").await, 2);
    assert_eq!(count("?category=women").await, 1);
    assert_eq!(count("?category=Clothing").await, 1);
    assert_eq!(count("?category=dresses").await, 1);
    assert_eq!(count("?brand=fjell").await, 1);
    assert_eq!(count("?color=red").await, 1);
    assert_eq!(count("?sizes=m,xl").await, 1);
    assert_eq!(count("?min_price=80").await, 1);
    assert_eq!(count("?min_discount=5").await, 1);
    assert_eq!(count("?stock=in_stock").await, 2);
    assert_eq!(count("?page_size=1&page_number=2").await, 2);

    let cheapest = app
        .request(Method::GET, "/api/product/get-all?sort=price_low", None, None)
        .await;
    assert_eq!(cheapest.data()["products"][0]["name"], "Summer Dress");
    assert_eq!(decimal(&cheapest.data()["products"][1]["discounted_price"]), dec!(90));

    let unknown = app
        .request(Method::GET, "/api/product/get-all?category=garden", None, None)
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.message(), "No products found");

    let bad = app
        .request(Method::GET, "/api/product/get-all?stock=plenty", None, None)
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let hidden = app
        .request(
            Method::PATCH,
            &format!("/api/product/status/{}", shirt),
            Some(json!({ "is_active": false })),
            Some(&admin),
        )
        .await;
    assert_eq!(hidden.status, StatusCode::OK);
    assert_eq!(count("").await, 1);
}

#[tokio::test]
async fn bulk_add_reports_each_entry() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;

    let empty = app
        .request(Method::POST, "/api/product/add/many", Some(json!([])), Some(&admin))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let mixed = app
        .request(
            Method::POST,
            "/api/product/add/many",
            Some(json!([
                {
                    "name": "Field Watch",
                    "description": "Hand-wound field watch",
                    "brand": "Tempo",
                    "price": "250",
                    "quantity": 2,
                    "top_level_category": "Accessories",
                    "second_level_category": "Watches",
                    "third_level_category": "Analog",
                },
                { "name": "Missing brand", "description": "no brand", "price": "5" },
            ])),
            Some(&admin),
        )
        .await;
    assert_eq!(mixed.status, StatusCode::CREATED, "{}", mixed.body);
    assert_eq!(mixed.data()["inserted_count"], 1);
    assert_eq!(mixed.data()["failed_count"], 1);
    assert_eq!(mixed.data()["failed"][0]["input"]["name"], "Missing brand");
}

#[tokio::test]
async fn product_updates_and_deletion() {
    let app = TestApp::new().await;
    let admin = app.developer_token().await;
    let product = app.create_product(&admin, "Rain Jacket", "120", "0", 5).await;

    let updated = app
        .request(
            Method::PUT,
            &format!("/api/product/{}", product),
            Some(json!({ "name": "Storm Jacket", "brand": "Fjell" })),
            Some(&admin),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.data()["name"], "Storm Jacket");
    assert_eq!(updated.data()["brand"], "Fjell");

    let negative = app
        .request(
            Method::PATCH,
            &format!("/api/product/quantity/{}", product),
            Some(json!({ "quantity": -1 })),
            Some(&admin),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let restocked = app
        .request(
            Method::PATCH,
            &format!("/api/product/quantity/{}", product),
            Some(json!({ "quantity": 7 })),
            Some(&admin),
        )
        .await;
    assert_eq!(restocked.status, StatusCode::OK);
    assert_eq!(restocked.data()["quantity"], 7);

    let anonymous = app
        .request(Method::DELETE, &format!("/api/product/{}", product), None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/product/{}", product),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = app
        .request(Method::GET, &format!("/api/product/{}", product), None, None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}
