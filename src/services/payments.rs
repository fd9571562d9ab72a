use crate::{
    config::AppConfig,
    db::DbPool,
    entities::{order, payment, Order, Payment},
    errors::ServiceError,
    events::{Event, EventSender},
    payment::{BackUrls, PaymentGateway, PreferenceRequest},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub payment_url: String,
}

/// Result of applying a provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Order transitioned to a terminal state
    Applied {
        order_id: Uuid,
        order_status: order::OrderStatus,
    },
    /// Provider status maps to no transition, or the order was already
    /// terminal (duplicate delivery)
    Unchanged { order_id: Uuid },
}

/// Payment bridge to the hosted checkout provider, plus webhook
/// reconciliation.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
    event_sender: EventSender,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            config,
            event_sender,
        }
    }

    /// Creates a hosted checkout session for one of the user's orders.
    ///
    /// Only PENDING orders are payable, and only once: a second request for
    /// the same order is rejected before the provider is called. On success a
    /// PENDING payment row is recorded and the hosted checkout URL returned.
    /// Order status is not touched here; that happens on reconciliation.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<CheckoutSessionResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        if order.status != order::OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(
                "order is not in a payable state".to_string(),
            ));
        }

        let existing = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "a checkout session already exists for this order".to_string(),
            ));
        }

        let notification_url = self
            .config
            .public_api_url
            .as_ref()
            .map(|base| format!("{}/api/v1/webhooks/mercadopago", base.trim_end_matches('/')));

        let request = PreferenceRequest::for_order(
            order.id,
            order.total,
            &self.config.default_currency,
            BackUrls {
                success: self.config.checkout_success_url.clone(),
                failure: self.config.checkout_failure_url.clone(),
                pending: self.config.checkout_pending_url.clone(),
            },
            notification_url,
        );

        let preference = self.gateway.create_preference(request).await?;

        let now = Utc::now();
        let payment_id = Uuid::new_v4();
        payment::ActiveModel {
            id: Set(payment_id),
            order_id: Set(order.id),
            amount: Set(order.total),
            provider: Set(self.gateway.provider_name().to_string()),
            status: Set(payment::PaymentStatus::Pending),
            provider_transaction_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(order_id = %order.id, payment_id = %payment_id, "checkout session created");
        self.event_sender
            .send_or_log(Event::PaymentRecorded {
                order_id: order.id,
                payment_id,
            })
            .await;

        Ok(CheckoutSessionResponse {
            payment_url: preference.init_point,
        })
    }

    /// Reconciles a provider payment notification against local state.
    ///
    /// Fetches the payment from the provider, maps its status, and applies
    /// the order + payment transition in one transaction. The transition only
    /// fires from PENDING, so duplicate deliveries are no-ops.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        provider_payment_id: &str,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let provider_payment = self.gateway.get_payment(provider_payment_id).await?;

        let reference = provider_payment.external_reference.ok_or_else(|| {
            ServiceError::MissingReference(format!(
                "provider payment {} carries no order reference",
                provider_payment_id
            ))
        })?;
        let order_id = Uuid::parse_str(&reference).map_err(|_| {
            ServiceError::MissingReference(format!(
                "provider payment {} references non-order id '{}'",
                provider_payment_id, reference
            ))
        })?;

        let (order_status, payment_status) = match provider_payment.status.as_str() {
            "approved" => (order::OrderStatus::Paid, payment::PaymentStatus::Completed),
            "cancelled" | "rejected" => (
                order::OrderStatus::Cancelled,
                payment::PaymentStatus::Failed,
            ),
            other => {
                info!(
                    provider_payment_id,
                    status = other,
                    "provider status maps to no transition"
                );
                return Ok(ReconcileOutcome::Unchanged { order_id });
            }
        };

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        // Monotonic state machine: nothing leaves PAID or CANCELLED.
        if order.status.is_terminal() {
            info!(order_id = %order_id, "order already terminal; ignoring duplicate notification");
            return Ok(ReconcileOutcome::Unchanged { order_id });
        }

        let now = Utc::now();
        let mut order_update: order::ActiveModel = order.into();
        order_update.status = Set(order_status);
        order_update.updated_at = Set(now);
        order_update.update(&txn).await?;

        let payment_row = Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("no payment recorded for order {}", order_id))
            })?;
        let mut payment_update: payment::ActiveModel = payment_row.into();
        payment_update.status = Set(payment_status);
        payment_update.provider_transaction_id = Set(Some(provider_payment_id.to_string()));
        payment_update.updated_at = Set(now);
        payment_update.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, status = ?order_status, "payment reconciled");
        let event = match order_status {
            order::OrderStatus::Paid => Event::OrderPaid(order_id),
            _ => Event::OrderCancelled(order_id),
        };
        self.event_sender.send_or_log(event).await;

        Ok(ReconcileOutcome::Applied {
            order_id,
            order_status,
        })
    }
}
