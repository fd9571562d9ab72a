use crate::{
    auth::CurrentUser,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, success_response, validate_input, PaginationParams,
    },
    services::orders::ShippingAddress,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
}

pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .create_order(user.user_id, payload.shipping_address)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ApiError> {
    let (page, per_page) = pagination.normalized();
    let listing = state
        .services
        .orders
        .get_user_orders(user.user_id, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(listing))
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .orders
        .get_order(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .payments
        .create_checkout_session(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(session))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/checkout", post(create_checkout_session))
}
