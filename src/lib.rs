//! Storefront API Library
//!
//! This crate provides the core functionality for the storefront API:
//! authentication, catalog, carts, orders, and payment reconciliation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod payment;
pub mod reconcile;
pub mod services;

use axum::{middleware, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{
    auth::{require_auth, AuthConfig, AuthService},
    config::AppConfig,
    events::EventSender,
    handlers::AppServices,
    payment::PaymentGateway,
    reconcile::ReconcileQueue,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
    pub event_sender: EventSender,
    pub reconcile: ReconcileQueue,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        reconcile: ReconcileQueue,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            config.jwt_expiration,
        )));
        let services = AppServices::new(
            db.clone(),
            config.clone(),
            auth.clone(),
            gateway,
            event_sender.clone(),
        );
        Self {
            db,
            config,
            auth,
            services,
            event_sender,
            reconcile,
        }
    }
}

/// Versioned API routes. Everything except auth, public catalog reads, and
/// the provider webhook sits behind bearer authentication.
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    let authed = Router::new()
        .nest("/users", handlers::users::user_routes())
        .nest("/addresses", handlers::addresses::address_routes())
        .nest("/cart", handlers::carts::cart_routes())
        .nest("/orders", handlers::orders::order_routes())
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/categories", handlers::categories::category_routes(state))
        .nest("/products", handlers::products::product_routes(state))
        .nest("/webhooks", handlers::webhooks::webhook_routes())
        .merge(authed)
}

/// Full application router with middleware applied.
pub fn app(state: AppState) -> Router {
    handlers::health::init_start_time();

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
