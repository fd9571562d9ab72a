use crate::{
    auth::{require_admin, require_auth},
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, no_content_response, success_response, validate_input,
        PaginationParams,
    },
    services::products::{CreateProductRequest, ProductFilters, UpdateProductRequest},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Response,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use uuid::Uuid;

pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<ProductFilters>,
) -> Result<Response, ApiError> {
    let (page, per_page) = pagination.normalized();
    let listing = state
        .services
        .products
        .list_products(filters, page, per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(listing))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .create_product(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .update_product(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .products
        .delete_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Reads are public; mutations require an authenticated admin. PUT and PATCH
/// share the partial-update semantics.
pub fn product_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/", post(create_product))
        .route("/{id}", put(update_product))
        .route("/{id}", patch(update_product))
        .route("/{id}", delete(delete_product))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
        .merge(admin)
}
