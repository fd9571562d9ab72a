mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn product_listing_filters_by_name_and_price() {
    let app = TestApp::new().await;
    app.seed_product("Blue Mug", "8.00", 10).await;
    app.seed_product("Red Mug", "12.00", 10).await;
    app.seed_product("Poster", "20.00", 10).await;

    let response = app
        .request(Method::GET, "/api/v1/products?name=Mug", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);

    let response = app
        .request(
            Method::GET,
            "/api/v1/products?min_price=10&max_price=15",
            None,
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["products"][0]["name"], "Red Mug");

    let response = app
        .request(Method::GET, "/api/v1/products?page=1&per_page=2", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["products"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_pages"], 2);
}

#[tokio::test]
async fn admin_can_manage_products() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.create_admin("root").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Lamp", "price": 35.5, "stock": 7 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let price: rust_decimal::Decimal = body["price"].as_str().unwrap().parse().unwrap();
    assert_eq!(price, rust_decimal::Decimal::new(3550, 2));
    let id = body["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/products/{}", id),
            Some(json!({ "stock": 3 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["stock"], 3);

    // Anyone can read it back.
    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}", id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}", id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_rejects_unknown_category_and_bad_price() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.create_admin("root").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Orphan",
                "price": 1.0,
                "stock": 1,
                "category_id": uuid::Uuid::new_v4()
            })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Negative", "price": -1.0, "stock": 1 })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn categories_enforce_unique_names() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.create_admin("root").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Music", "description": "Vinyl and CDs" })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Music" })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(Method::GET, "/api/v1/categories", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["categories"][0]["name"], "Music");
}

#[tokio::test]
async fn deleting_category_detaches_products() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.create_admin("root").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Garden" })),
            Some(&admin_token),
        )
        .await;
    let category = response_json(response).await;
    let category_id = category["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Shovel",
                "price": 15.0,
                "stock": 4,
                "category_id": category_id
            })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product = response_json(response).await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/categories/{}", category_id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", product_id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body["category_id"].is_null());
}
