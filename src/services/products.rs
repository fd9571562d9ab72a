use crate::{
    db::DbPool,
    entities::{category, product, Category, Product},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Catalogue listing filters, all optional. Prices are inclusive bounds.
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilters {
    pub name: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: i32,
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: Option<f64>,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: Option<i32>,
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<product::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Product catalogue. Reads are public; writes are admin-only, enforced at
/// the routing layer. Stock mutations during checkout live in the order
/// service, not here.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filters))]
    pub async fn list_products(
        &self,
        filters: ProductFilters,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListResponse, ServiceError> {
        let mut query = Product::find();

        if let Some(name) = filters.name.as_deref() {
            query = query.filter(product::Column::Name.contains(name));
        }
        if let Some(min) = filters.min_price {
            query = query.filter(product::Column::Price.gte(min));
        }
        if let Some(max) = filters.max_price {
            query = query.filter(product::Column::Price.lte(max));
        }
        if let Some(category_id) = filters.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(ProductListResponse {
            products,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page.max(1)),
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))
    }

    #[instrument(skip(self, request))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if let Some(category_id) = request.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let price = Self::parse_price(request.price)?;
        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(price),
            stock: Set(request.stock),
            image_url: Set(request.image_url),
            category_id: Set(request.category_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %created.id, name = %created.name, "product created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = self.get_product(product_id).await?;

        if let Some(category_id) = request.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let mut update: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            update.name = Set(name);
        }
        if let Some(description) = request.description {
            update.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            update.price = Set(Self::parse_price(price)?);
        }
        if let Some(stock) = request.stock {
            update.stock = Set(stock);
        }
        if let Some(image_url) = request.image_url {
            update.image_url = Set(Some(image_url));
        }
        if let Some(category_id) = request.category_id {
            update.category_id = Set(Some(category_id));
        }
        update.updated_at = Set(Utc::now());
        Ok(update.update(&*self.db).await?)
    }

    /// Removes a product from the catalogue. Existing order items keep their
    /// snapshotted name and price; carts referencing it lose the line via the
    /// schema's cascade.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = self.get_product(product_id).await?;
        product.delete(&*self.db).await?;
        info!(product_id = %product_id, "product deleted");
        Ok(())
    }

    fn parse_price(price: f64) -> Result<Decimal, ServiceError> {
        Decimal::try_from(price)
            .map(|d| d.round_dp(2))
            .map_err(|_| ServiceError::ValidationError("price is not representable".into()))
    }

    async fn ensure_category_exists(&self, category_id: Uuid) -> Result<(), ServiceError> {
        Category::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .map(|_: category::Model| ())
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("category {} does not exist", category_id))
            })
    }
}
