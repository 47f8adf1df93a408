use super::engine::ReconciliationEngine;
use super::locks::OrderLocks;
use super::replayer::BacklogReplayer;
use crate::config::GatewayConfig;
use crate::domain::notification::{Notification, NotificationEvent};
use crate::domain::ports::StoreHandle;
use crate::error::Result;
use tracing::{debug, error};

/// Fixed body the transport answers every notification delivery with.
pub const ACCEPTED: &str = "[accepted]";

/// Outcome of one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub notification: Notification,
    /// The (psp reference, event code) pair had been delivered before.
    pub duplicate: bool,
    /// Backlog processed because this delivery created or confirmed a payment.
    pub replayed: Vec<Notification>,
}

/// Entry point for the transport layer: ingest, reconcile, catch up.
#[derive(Clone)]
pub struct NotificationService {
    store: StoreHandle,
    engine: ReconciliationEngine,
    replayer: BacklogReplayer,
}

impl NotificationService {
    pub fn new(store: StoreHandle, locks: OrderLocks, config: &GatewayConfig) -> Self {
        let engine = ReconciliationEngine::new(store.clone(), locks, config);
        let replayer = BacklogReplayer::new(engine.clone(), store.clone());
        Self {
            store,
            engine,
            replayer,
        }
    }

    pub fn replayer(&self) -> &BacklogReplayer {
        &self.replayer
    }

    /// Records a delivery and reconciles it.
    ///
    /// A repeated delivery of a processed notification is not applied again.
    /// A repeated delivery of one that is still unprocessed (its earlier
    /// attempt failed, or its payment did not exist yet) is retried.
    pub async fn receive(&self, event: NotificationEvent) -> Result<Receipt> {
        let (notification, is_new) = self.store.ingest(event).await?;
        if !is_new && notification.processed {
            debug!(
                psp_reference = %notification.psp_reference,
                event_code = %notification.event_code,
                "duplicate delivery acknowledged"
            );
            return Ok(Receipt {
                notification,
                duplicate: true,
                replayed: Vec::new(),
            });
        }

        let notification = self.engine.process(notification).await?;
        let replayed = self.catch_up(&notification).await?;
        Ok(Receipt {
            notification,
            duplicate: !is_new,
            replayed,
        })
    }

    /// Handles a delivery the way the transport must answer it: always with
    /// [`ACCEPTED`]. Failures are only logged; the notification stays
    /// unprocessed and can be replayed.
    pub async fn acknowledge(&self, event: NotificationEvent) -> &'static str {
        let psp_reference = event.psp_reference.clone();
        if let Err(e) = self.receive(event).await {
            error!(%psp_reference, error = %e, "notification could not be reconciled");
        }
        ACCEPTED
    }

    /// After a successful authorisation, replays what arrived for the payment
    /// before it existed locally.
    async fn catch_up(&self, notification: &Notification) -> Result<Vec<Notification>> {
        if !(notification.processed && notification.success && notification.is_authorisation()) {
            return Ok(Vec::new());
        }
        let (Some(order_number), Some(payment_id)) =
            (notification.order_reference(), notification.payment_id)
        else {
            return Ok(Vec::new());
        };
        let payment = self
            .store
            .load_order(order_number)
            .await?
            .and_then(|order| order.payment(payment_id).cloned());
        match payment {
            Some(payment) => self.replayer.replay_outstanding(&payment).await,
            None => Ok(Vec::new()),
        }
    }
}
