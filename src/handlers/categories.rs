use crate::{
    auth::{require_admin, require_auth},
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, no_content_response, success_response, validate_input,
        PaginationParams,
    },
    services::categories::{CreateCategoryRequest, UpdateCategoryRequest},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

pub async fn list_categories(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ApiError> {
    let (page, per_page) = pagination.normalized();
    let listing = state
        .services
        .categories
        .list_categories(page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(listing))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let category = state
        .services
        .categories
        .get_category(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let category = state
        .services
        .categories
        .create_category(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let category = state
        .services
        .categories
        .update_category(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .categories
        .delete_category(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Reads are public; mutations require an authenticated admin.
pub fn category_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_category))
        .route("/{id}", patch(update_category))
        .route("/{id}", delete(delete_category))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .route("/", get(list_categories))
        .route("/{id}", get(get_category))
        .merge(admin)
}
