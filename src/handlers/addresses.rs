use crate::{
    auth::CurrentUser,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, no_content_response, success_response, validate_input,
    },
    services::addresses::{CreateAddressRequest, UpdateAddressRequest},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

pub async fn list_addresses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let addresses = state
        .services
        .addresses
        .list_addresses(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(addresses))
}

pub async fn get_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let address = state
        .services
        .addresses
        .get_address(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(address))
}

pub async fn create_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .create_address(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(address))
}

pub async fn update_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .update_address(user.user_id, id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(address))
}

pub async fn delete_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .addresses
        .delete_address(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses))
        .route("/", post(create_address))
        .route("/{id}", get(get_address))
        .route("/{id}", patch(update_address))
        .route("/{id}", delete(delete_address))
}
