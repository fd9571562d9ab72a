use crate::{
    errors::ApiError,
    handlers::common::{created_response, map_service_error, success_response, validate_input},
    services::accounts::{LoginRequest, RegisterRequest},
    AppState,
};
use axum::{
    extract::State,
    response::Response,
    routing::post,
    Json, Router,
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let user = state
        .services
        .accounts
        .register(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let token = state
        .services
        .accounts
        .login(payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(token))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}
