use crate::{
    auth::CurrentUser,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, no_content_response, success_response, validate_input,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

pub async fn get_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let cart = state
        .services
        .carts
        .get_user_cart(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    state
        .services
        .carts
        .clear_cart(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub async fn add_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let outcome = state
        .services
        .carts
        .upsert_item(user.user_id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    if outcome.created {
        Ok(created_response(outcome.item))
    } else {
        Ok(success_response(outcome.item))
    }
}

pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let item = state
        .services
        .carts
        .update_item_quantity(user.user_id, id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(item))
}

pub async fn remove_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .carts
        .remove_item(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/", delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/{id}", patch(update_item))
        .route("/items/{id}", delete(remove_item))
}
