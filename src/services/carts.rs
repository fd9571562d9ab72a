use crate::{
    db::DbPool,
    entities::{cart, cart_item, product, Cart, CartItem, Product},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cart line enriched with the live product for display. Prices shown here
/// are informational; the order service re-snapshots them at checkout.
#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub id: Uuid,
    pub quantity: i32,
    pub product: product::Model,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Serialize)]
pub struct UpsertOutcome {
    pub item: cart_item::Model,
    pub created: bool,
}

/// Shopping cart management. Carts are created lazily on first access.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Returns the user's cart with items, creating the cart if absent.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.find_or_create_cart(user_id).await?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart item {} references missing product",
                    item.id
                ))
            })?;
            items.push(CartItemView {
                id: item.id,
                quantity: item.quantity,
                product,
            });
        }

        Ok(CartView { id: cart.id, items })
    }

    /// Adds a product to the cart, or replaces the quantity if the product is
    /// already there. Validates existence and available stock first.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<UpsertOutcome, ServiceError> {
        let cart = self.find_or_create_cart(user_id).await?;
        let product = self.checked_product(product_id, quantity).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&*self.db)
            .await?;

        if let Some(item) = existing {
            let mut update: cart_item::ActiveModel = item.into();
            update.quantity = Set(quantity);
            update.updated_at = Set(Utc::now());
            let item = update.update(&*self.db).await?;
            return Ok(UpsertOutcome {
                item,
                created: false,
            });
        }

        let now = Utc::now();
        let item = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(product.id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(cart_id = %cart.id, item_id = %item.id, "cart item added");
        Ok(UpsertOutcome {
            item,
            created: true,
        })
    }

    /// Changes the quantity of an existing cart line.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let item = self.owned_item(user_id, item_id).await?;
        self.checked_product(item.product_id, quantity).await?;

        let mut update: cart_item::ActiveModel = item.into();
        update.quantity = Set(quantity);
        update.updated_at = Set(Utc::now());
        Ok(update.update(&*self.db).await?)
    }

    /// Removes a single cart line.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let item = self.owned_item(user_id, item_id).await?;
        item.delete(&*self.db).await?;
        Ok(())
    }

    /// Removes every item from the user's cart; returns the removed count.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let cart = self.find_or_create_cart(user_id).await?;
        let result = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find_or_create_cart(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;
        info!(cart_id = %cart.id, user_id = %user_id, "cart created");
        Ok(cart)
    }

    async fn checked_product(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "'{}' has {} in stock, requested {}",
                product.name, product.stock, quantity
            )));
        }
        Ok(product)
    }

    async fn owned_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        let cart = self.find_or_create_cart(user_id).await?;
        CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("cart item {} not found", item_id)))
    }
}
