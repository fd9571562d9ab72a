mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn cart_is_created_lazily_and_starts_empty() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("alice", "password123").await;

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn adding_same_product_twice_replaces_quantity() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("bob", "password123").await;
    let product = app.seed_product("Mug", "8.00", 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 2 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 5 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = response_json(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
}

#[tokio::test]
async fn cannot_add_more_than_available_stock() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("carol", "password123").await;
    let product = app.seed_product("Rare", "99.00", 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 4 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 0 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn item_quantity_update_and_removal() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("dana", "password123").await;
    let product = app.seed_product("Pen", "2.50", 20).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 1 })),
            Some(&token),
        )
        .await;
    let item = response_json(response).await;
    let item_id = item["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/cart/items/{}", item_id),
            Some(json!({ "quantity": 3 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["quantity"], 3);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", item_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn cart_items_are_scoped_per_user() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.create_user("alice", "password123").await;
    let (_, eve_token) = app.create_user("eve", "password123").await;
    let product = app.seed_product("Book", "12.00", 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 1 })),
            Some(&alice_token),
        )
        .await;
    let item = response_json(response).await;
    let item_id = item["id"].as_str().unwrap().to_string();

    // Another user cannot touch the line.
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", item_id),
            None,
            Some(&eve_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&eve_token))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn clear_cart_removes_every_line() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("finn", "password123").await;
    let first = app.seed_product("One", "1.00", 5).await;
    let second = app.seed_product("Two", "2.00", 5).await;

    for product in [&first, &second] {
        app.request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 1 })),
            Some(&token),
        )
        .await;
    }

    let response = app
        .request(Method::DELETE, "/api/v1/cart", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}
