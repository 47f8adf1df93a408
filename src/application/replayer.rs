use super::engine::ReconciliationEngine;
use crate::domain::notification::Notification;
use crate::domain::payment::{Payment, PaymentSource};
use crate::domain::ports::StoreHandle;
use crate::error::Result;
use tracing::{debug, info};

/// Re-drives a payment's unprocessed notifications through the engine.
///
/// Used once a payment exists for notifications that arrived before it, and
/// by operators to recover after a failed reconciliation.
#[derive(Clone)]
pub struct BacklogReplayer {
    engine: ReconciliationEngine,
    store: StoreHandle,
}

impl BacklogReplayer {
    pub fn new(engine: ReconciliationEngine, store: StoreHandle) -> Self {
        Self { engine, store }
    }

    /// Processes every unprocessed notification for the payment's reference,
    /// oldest dispatch first, one after another. Each notification sees the
    /// effects of the ones before it.
    ///
    /// Stops at the first storage error; notifications after it stay unprocessed.
    pub async fn replay_outstanding(&self, payment: &Payment) -> Result<Vec<Notification>> {
        let Some(reference) = source_reference(payment) else {
            debug!(payment = %payment.id, "payment has no reference yet; nothing to replay");
            return Ok(Vec::new());
        };

        let backlog = self.store.unprocessed_for_reference(reference).await?;
        if backlog.is_empty() {
            return Ok(backlog);
        }
        info!(
            payment = %payment.id,
            reference,
            count = backlog.len(),
            "replaying outstanding notifications"
        );

        let mut replayed = Vec::with_capacity(backlog.len());
        for notification in backlog {
            replayed.push(self.engine.process(notification).await?);
        }
        Ok(replayed)
    }
}

/// The reference notifications about this payment are filed under.
fn source_reference(payment: &Payment) -> Option<&str> {
    payment.external_reference().or(match &payment.source {
        PaymentSource::HostedRedirect(source) => source.psp_reference.as_deref(),
        _ => None,
    })
}
