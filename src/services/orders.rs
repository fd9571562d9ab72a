use crate::{
    db::DbPool,
    entities::{
        cart, cart_item, order, order_item, payment, product, Cart, CartItem, Order, OrderItem,
        Payment, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    prelude::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Shipping address snapshot embedded in the order at creation time. Kept as
/// structured JSON so later edits to the user's saved addresses never change
/// order history.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "street is required"))]
    pub street: String,
    pub apartment: Option<String>,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "province is required"))]
    pub province: String,
    #[validate(length(min = 1, message = "postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
    pub recipient_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<payment::Model>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Line captured after the inventory check, carrying the price snapshot.
struct SnapshotLine {
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
}

/// Order management: cart-to-order conversion with atomic stock decrement,
/// plus order retrieval.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order from the user's cart.
    ///
    /// Validates stock for every cart line before any mutation, snapshots
    /// unit prices, then inserts the order, its items, and the stock
    /// decrements in one transaction. The cart is cleared after the commit,
    /// best-effort: a drain failure is logged and the order is still
    /// returned.
    #[instrument(skip(self, shipping_address), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        shipping_address: ShippingAddress,
    ) -> Result<OrderResponse, ServiceError> {
        shipping_address.validate()?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("cart not found".to_string()))?;

        let cart_items = cart.find_related(CartItem).all(&*self.db).await?;
        if cart_items.is_empty() {
            return Err(ServiceError::InvalidOperation("cart is empty".to_string()));
        }

        // Inventory guard + price snapshot. Read-only; the whole order is
        // rejected if any single line fails.
        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            let product = Product::find_by_id(item.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::Conflict(format!(
                        "product {} no longer exists",
                        item.product_id
                    ))
                })?;

            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "'{}' has {} in stock, cart requests {}",
                    product.name, product.stock, item.quantity
                )));
            }

            total += product.price * Decimal::from(item.quantity);
            lines.push(SnapshotLine {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let address_json = serde_json::to_value(&shipping_address)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        // Order header, line items, and stock decrements commit together or
        // not at all.
        let txn = self.db.begin().await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total: Set(total),
            status: Set(order::OrderStatus::Pending),
            shipping_address: Set(address_json),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let item_models: Vec<order_item::ActiveModel> = lines
            .iter()
            .map(|line| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                price: Set(line.unit_price),
                created_at: Set(now),
            })
            .collect();
        OrderItem::insert_many(item_models).exec(&txn).await?;

        for line in &lines {
            // Guarded decrement: the stock >= quantity filter makes a
            // concurrent oversell show up as zero affected rows, which
            // aborts the transaction.
            let result = Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(line.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(line.product_id))
                .filter(product::Column::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "stock for product {} changed while placing the order",
                    line.product_id
                )));
            }
        }

        txn.commit().await?;

        info!(order_id = %order_id, total = %total, "order created");
        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;

        // Cart drain is deliberately outside the transaction: order
        // durability wins over cart tidiness.
        match CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await
        {
            Ok(_) => {
                self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;
            }
            Err(e) => {
                warn!(cart_id = %cart.id, error = %e, "failed to clear cart after order creation");
            }
        }

        let items = order_model.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderResponse {
            order: order_model,
            items,
            payment: None,
        })
    }

    /// Lists the user's orders, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user_orders(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let per_page = per_page.max(1);
        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        })
    }

    /// Fetches one of the user's orders with its items and payment record.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let items = order.find_related(OrderItem).all(&*self.db).await?;
        let payment = order.find_related(Payment).one(&*self.db).await?;

        Ok(OrderResponse {
            order,
            items,
            payment,
        })
    }
}
