mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use hmac::{Hmac, Mac};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use sha2::Sha256;
use storefront_api::entities::{
    order::OrderStatus, payment, payment::PaymentStatus, Order, Payment,
};
use storefront_api::services::payments::ReconcileOutcome;
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "webhook_test_secret";

fn shipping_address() -> serde_json::Value {
    json!({
        "shipping_address": {
            "street": "Av. Santa Fe 500",
            "city": "Rosario",
            "province": "Santa Fe",
            "postal_code": "S2000",
            "country": "Argentina"
        }
    })
}

async fn place_order(app: &TestApp, token: &str) -> Uuid {
    let product = app.seed_product("Gadget", "30.00", 10).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 1 })),
            Some(token),
        )
        .await;
    assert!(response.status().is_success());

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(shipping_address()),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

fn sign_webhook(payment_id: &str, request_id: &str, ts: &str) -> String {
    let manifest = format!("id:{};request-id:{};ts:{};", payment_id, request_id, ts);
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(manifest.as_bytes());
    format!("ts={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn checkout_session_records_pending_payment() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("alice", "password123").await;
    let order_id = place_order(&app, &token).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/checkout", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(
        body["payment_url"].as_str().unwrap(),
        format!("https://checkout.test/{}", order_id)
    );

    let payment_row = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("payment row recorded");
    assert_eq!(payment_row.status, PaymentStatus::Pending);
    assert_eq!(payment_row.provider, "mercadopago");

    // Checkout never advances the order; only reconciliation does.
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn second_checkout_session_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("bob", "password123").await;
    let order_id = place_order(&app, &token).await;

    let uri = format!("/api/v1/orders/{}/checkout", order_id);
    let first = app.request(Method::POST, &uri, None, Some(&token)).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.request(Method::POST, &uri, None, Some(&token)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(app.gateway.preference_call_count(), 1);
}

#[tokio::test]
async fn checkout_for_non_pending_order_never_contacts_provider() {
    let app = TestApp::new().await;
    let (user, token) = app.create_user("carol", "password123").await;
    let order_id = place_order(&app, &token).await;

    // Drive the order to a terminal state through reconciliation.
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("mp-1", "approved", Some(&order_id.to_string()));
    app.state.services.payments.reconcile("mp-1").await.unwrap();
    let calls_before = app.gateway.preference_call_count();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/checkout", order_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.preference_call_count(), calls_before);
}

#[tokio::test]
async fn approved_payment_marks_order_paid() {
    let app = TestApp::new().await;
    let (user, token) = app.create_user("dana", "password123").await;
    let order_id = place_order(&app, &token).await;
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("mp-42", "approved", Some(&order_id.to_string()));

    let outcome = app.state.services.payments.reconcile("mp-42").await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Applied {
            order_id,
            order_status: OrderStatus::Paid
        }
    );

    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let payment_row = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment_row.status, PaymentStatus::Completed);
    assert_eq!(payment_row.provider_transaction_id.as_deref(), Some("mp-42"));
}

#[tokio::test]
async fn rejected_payment_cancels_order() {
    let app = TestApp::new().await;
    let (user, token) = app.create_user("erin", "password123").await;
    let order_id = place_order(&app, &token).await;
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("mp-7", "rejected", Some(&order_id.to_string()));

    app.state.services.payments.reconcile("mp-7").await.unwrap();

    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    let payment_row = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment_row.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn duplicate_delivery_leaves_terminal_order_alone() {
    let app = TestApp::new().await;
    let (user, token) = app.create_user("finn", "password123").await;
    let order_id = place_order(&app, &token).await;
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("mp-9", "approved", Some(&order_id.to_string()));

    app.state.services.payments.reconcile("mp-9").await.unwrap();
    let second = app.state.services.payments.reconcile("mp-9").await.unwrap();
    assert_eq!(second, ReconcileOutcome::Unchanged { order_id });

    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn reconciliation_requires_order_reference() {
    let app = TestApp::new().await;
    app.gateway.seed_payment("mp-null", "approved", None);

    let result = app.state.services.payments.reconcile("mp-null").await;
    assert!(matches!(
        result,
        Err(storefront_api::errors::ServiceError::MissingReference(_))
    ));
}

#[tokio::test]
async fn webhook_with_valid_signature_reconciles_payment() {
    let app = TestApp::new().await;
    let (user, token) = app.create_user("gabi", "password123").await;
    let order_id = place_order(&app, &token).await;
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("314159", "approved", Some(&order_id.to_string()));

    let body = serde_json::to_vec(&json!({ "type": "payment", "data": { "id": "314159" } }))
        .unwrap();
    let signature = sign_webhook("314159", "req-abc", "1700000000");
    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/webhooks/mercadopago?data.id=314159",
            body,
            &[("x-signature", &signature), ("x-request-id", "req-abc")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Reconciliation runs after the acknowledgment; poll briefly.
    let mut paid = false;
    for _ in 0..50 {
        let order = Order::find_by_id(order_id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap();
        if order.status == OrderStatus::Paid {
            paid = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(paid, "webhook never reconciled the order");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_acknowledged_but_ignored() {
    let app = TestApp::new().await;
    let (user, token) = app.create_user("hank", "password123").await;
    let order_id = place_order(&app, &token).await;
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("271828", "approved", Some(&order_id.to_string()));

    let body = serde_json::to_vec(&json!({ "type": "payment", "data": { "id": "271828" } }))
        .unwrap();
    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/webhooks/mercadopago?data.id=271828",
            body,
            &[
                ("x-signature", "ts=1700000000,v1=deadbeefdeadbeef"),
                ("x-request-id", "req-abc"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn webhook_without_configured_secret_is_acknowledged_but_dropped() {
    let app = TestApp::with_webhook_secret(None).await;
    let (user, token) = app.create_user("iris", "password123").await;
    let order_id = place_order(&app, &token).await;
    app.state
        .services
        .payments
        .create_checkout_session(user.id, order_id)
        .await
        .unwrap();
    app.gateway
        .seed_payment("161803", "approved", Some(&order_id.to_string()));

    // Forged delivery: no signature at all. With no secret configured,
    // nothing can be verified, so nothing may be reconciled.
    let body = serde_json::to_vec(&json!({ "type": "payment", "data": { "id": "161803" } }))
        .unwrap();
    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/webhooks/mercadopago?data.id=161803",
            body,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    let payment_row = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment_row.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn webhook_ignores_non_payment_topics() {
    let app = TestApp::new().await;
    let body = serde_json::to_vec(&json!({ "type": "merchant_order", "data": { "id": "1" } }))
        .unwrap();
    let response = app
        .request_with_headers(Method::POST, "/api/v1/webhooks/mercadopago", body, &[])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
