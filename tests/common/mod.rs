use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::{product, user},
    errors::ServiceError,
    events::{self, EventSender},
    payment::{PaymentGateway, PreferenceRequest, PreferenceResponse, ProviderPayment},
    reconcile,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// In-memory stand-in for the payment provider. Preferences always succeed;
/// payments are looked up from a seeded map. Call counts let tests assert the
/// provider was (or was not) contacted.
#[derive(Default)]
pub struct MockGateway {
    payments: Mutex<HashMap<String, ProviderPayment>>,
    pub preference_calls: AtomicUsize,
    pub payment_lookups: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds a provider payment that `get_payment` will return.
    pub fn seed_payment(&self, payment_id: &str, status: &str, external_reference: Option<&str>) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            ProviderPayment {
                id: Value::String(payment_id.to_string()),
                status: status.to_string(),
                external_reference: external_reference.map(str::to_string),
            },
        );
    }

    pub fn preference_call_count(&self) -> usize {
        self.preference_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_preference(
        &self,
        request: PreferenceRequest,
    ) -> Result<PreferenceResponse, ServiceError> {
        self.preference_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PreferenceResponse {
            id: format!("pref-{}", request.external_reference),
            init_point: format!("https://checkout.test/{}", request.external_reference),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, ServiceError> {
        self.payment_lookups.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ExternalServiceError(format!(
                    "provider has no payment {}",
                    payment_id
                ))
            })
    }
}

/// Helper harness wiring the full router to a throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    db_file: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_file);
    }
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_webhook_secret(Some("webhook_test_secret")).await
    }

    /// Like [`TestApp::new`], but with an explicit webhook secret so tests
    /// can cover the unconfigured-secret path.
    pub async fn with_webhook_secret(webhook_secret: Option<&str>) -> Self {
        let db_file = format!("storefront_test_{}.db", Uuid::new_v4().simple());
        let mut cfg = AppConfig::new(
            format!("sqlite://{db_file}?mode=rwc"),
            TEST_JWT_SECRET.to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.mp_webhook_secret = webhook_secret.map(str::to_string);
        cfg.public_api_url = Some("http://localhost:18080".to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = MockGateway::new();
        let (reconcile_queue, reconcile_rx) = reconcile::reconcile_channel();

        let state = AppState::new(
            db_arc,
            Arc::new(cfg),
            gateway.clone(),
            event_sender,
            reconcile_queue,
        );
        tokio::spawn(reconcile::run_reconcile_worker(
            state.services.payments.clone(),
            reconcile_rx,
        ));

        let router = storefront_api::app(state.clone());

        Self {
            router,
            state,
            gateway,
            db_file,
            _event_task: event_task,
        }
    }

    /// Registers a user directly through the account service and returns the
    /// model plus a bearer token.
    pub async fn create_user(&self, username: &str, password: &str) -> (user::Model, String) {
        let user = self
            .state
            .services
            .accounts
            .register(storefront_api::services::accounts::RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
                email: None,
            })
            .await
            .expect("register test user");
        let token = self
            .state
            .auth
            .generate_token(&user)
            .expect("issue test token");
        (user, token.access_token)
    }

    /// Creates an admin user, bypassing the public registration path.
    pub async fn create_admin(&self, username: &str) -> (user::Model, String) {
        let now = Utc::now();
        let hash = self
            .state
            .auth
            .hash_password("admin_password_123")
            .expect("hash admin password");
        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(None),
            password_hash: Set(hash),
            role: Set(user::UserRole::Admin),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert admin user");
        let token = self
            .state
            .auth
            .generate_token(&admin)
            .expect("issue admin token");
        (admin, token.access_token)
    }

    /// Inserts a product directly; price given as a string like "10.00".
    pub async fn seed_product(&self, name: &str, price: &str, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price.parse::<Decimal>().expect("decimal literal")),
            stock: Set(stock),
            image_url: Set(None),
            category_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert product")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Raw request with arbitrary headers, used by the webhook tests.
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not valid json")
    }
}
