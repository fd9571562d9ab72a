use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderPaid(Uuid),
    OrderCancelled(Uuid),
    CartCleared(Uuid),
    PaymentRecorded { order_id: Uuid, payment_id: Uuid },
    WebhookVerified { provider_payment_id: String },
}

/// Fire-and-forget sender for domain events. Delivery failures are logged,
/// never propagated into request handling.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Consumes events from the channel until all senders are dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(id) => info!(order_id = %id, "event: order created"),
            Event::OrderPaid(id) => info!(order_id = %id, "event: order paid"),
            Event::OrderCancelled(id) => info!(order_id = %id, "event: order cancelled"),
            Event::CartCleared(id) => info!(cart_id = %id, "event: cart cleared"),
            Event::PaymentRecorded {
                order_id,
                payment_id,
            } => {
                info!(order_id = %order_id, payment_id = %payment_id, "event: payment recorded")
            }
            Event::WebhookVerified {
                provider_payment_id,
            } => {
                info!(provider_payment_id = %provider_payment_id, "event: webhook verified")
            }
        }
    }
    info!("Event channel closed; processor exiting");
}
