//! Background reconciliation of provider payment notifications.
//!
//! The webhook handler acknowledges deliveries immediately and pushes the
//! provider payment id onto a bounded queue; a single worker task drains the
//! queue and runs the reconciliation against the provider API and database.
//! Failures are logged and the delivery is dropped; the provider retries
//! undelivered notifications on its own schedule.

use crate::services::payments::PaymentService;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const QUEUE_CAPACITY: usize = 256;

/// Handle for enqueueing payment ids from request handlers.
#[derive(Clone)]
pub struct ReconcileQueue {
    sender: mpsc::Sender<String>,
}

impl ReconcileQueue {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// Enqueues without blocking the request. A full queue drops the
    /// notification; the provider will redeliver it.
    pub fn enqueue(&self, provider_payment_id: String) {
        if let Err(e) = self.sender.try_send(provider_payment_id) {
            warn!("reconciliation queue rejected notification: {}", e);
        }
    }
}

/// Creates the queue plus its receiving end for [`run_reconcile_worker`].
pub fn reconcile_channel() -> (ReconcileQueue, mpsc::Receiver<String>) {
    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    (ReconcileQueue::new(sender), receiver)
}

/// Drains the queue until every sender is dropped. Spawned once at startup.
pub async fn run_reconcile_worker(
    payments: Arc<PaymentService>,
    mut receiver: mpsc::Receiver<String>,
) {
    info!("reconciliation worker started");
    while let Some(provider_payment_id) = receiver.recv().await {
        match payments.reconcile(&provider_payment_id).await {
            Ok(outcome) => {
                info!(
                    provider_payment_id = %provider_payment_id,
                    ?outcome,
                    "payment reconciled"
                );
            }
            Err(e) => {
                error!(
                    provider_payment_id = %provider_payment_id,
                    "payment reconciliation failed: {}",
                    e
                );
            }
        }
    }
    info!("reconciliation worker stopped");
}
