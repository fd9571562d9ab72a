use crate::{
    auth::CurrentUser,
    errors::ApiError,
    handlers::common::{map_service_error, no_content_response, success_response, validate_input},
    services::users::UpdateProfileRequest,
    AppState,
};
use axum::{
    extract::State,
    response::Response,
    routing::{delete, get, patch},
    Json, Router,
};

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let profile = state
        .services
        .users
        .get_profile(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let profile = state
        .services
        .users
        .update_profile(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    state
        .services
        .users
        .delete_account(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_profile))
        .route("/me", patch(update_profile))
        .route("/me", delete(delete_account))
}
