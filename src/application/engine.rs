use super::locks::OrderLocks;
use crate::config::GatewayConfig;
use crate::domain::classifier::{Category, classify};
use crate::domain::notification::Notification;
use crate::domain::order::Order;
use crate::domain::payment::{HostedRedirectSource, Payment, PaymentSource};
use crate::domain::ports::{AuditEntry, AuditSource, Commit, StoreHandle};
use crate::domain::state_machine::{self, Effect};
use crate::error::{ReconcileError, Result};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Applies notifications to the payments they describe.
///
/// Every call runs under the lock of the notification's order and ends in at
/// most one atomic [`Commit`]: the order with its payments, the notification
/// marked processed, and an audit entry. A notification that was already
/// processed is returned untouched, so redelivery and replay are harmless.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: StoreHandle,
    locks: OrderLocks,
    refund_reason_id: String,
}

impl ReconciliationEngine {
    pub fn new(store: StoreHandle, locks: OrderLocks, config: &GatewayConfig) -> Self {
        Self {
            store,
            locks,
            refund_reason_id: config.refund_reason_id.clone(),
        }
    }

    /// Reconciles one notification and returns it as stored afterwards.
    ///
    /// Notifications for unknown orders, and events that match no payment and
    /// cannot create one, are left unprocessed so a later replay can pick them
    /// up once the payment exists.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned. Nothing is written in that case and
    /// the notification stays unprocessed.
    pub async fn process(&self, notification: Notification) -> Result<Notification> {
        let Some(order_number) = notification.order_reference().map(str::to_owned) else {
            warn!(
                psp_reference = %notification.psp_reference,
                event_code = %notification.event_code,
                "notification carries no order reference; skipping"
            );
            return Ok(notification);
        };

        let _guard = self.locks.acquire(&order_number).await;

        let Some(mut order) = self.store.load_order(&order_number).await? else {
            warn!(
                order = %order_number,
                psp_reference = %notification.psp_reference,
                "notification for unknown order; left for replay"
            );
            return Ok(notification);
        };

        // Another worker may have applied this notification while we waited.
        let mut notification = self
            .store
            .find(&notification.key())
            .await?
            .unwrap_or(notification);
        if notification.processed {
            debug!(
                psp_reference = %notification.psp_reference,
                event_code = %notification.event_code,
                "notification already processed"
            );
            return Ok(notification);
        }

        let category = classify(&notification);
        debug!(order = %order_number, ?category, "classified notification");

        let payment_id = match self.resolve_payment(&order, &notification) {
            Some(id) => id,
            None if should_materialize(&notification) => materialize(&mut order, &notification),
            None => {
                warn!(
                    order = %order_number,
                    reference = %notification.payment_reference(),
                    event_code = %notification.event_code,
                    "no payment matches notification; left for replay"
                );
                return Ok(notification);
            }
        };

        self.apply(&mut order, payment_id, category, &notification)?;

        let audit = AuditEntry::new(
            payment_id,
            order_number,
            AuditSource::Notification,
            notification.success,
            serde_json::to_value(&notification)?,
        );
        notification.resolve_payment(payment_id);
        notification.mark_processed();
        self.commit(Some(order), notification.clone(), Some(audit)).await?;
        Ok(notification)
    }

    fn resolve_payment(&self, order: &Order, notification: &Notification) -> Option<Uuid> {
        notification
            .payment_id
            .filter(|id| order.payment(*id).is_some())
            .or_else(|| {
                order
                    .payment_by_reference(notification.payment_reference())
                    .map(|payment| payment.id)
            })
    }

    fn apply(
        &self,
        order: &mut Order,
        payment_id: Uuid,
        category: Category,
        notification: &Notification,
    ) -> Result<()> {
        let payment = order
            .payment_mut(payment_id)
            .ok_or_else(|| ReconcileError::NotFound(format!("payment {payment_id}")))?;

        match state_machine::apply(payment, category, notification, &self.refund_reason_id) {
            Ok(effect) => {
                log_effect(&order.number, payment_id, &effect);
                Ok(())
            }
            Err(ReconcileError::InvalidTransition { from, action }) => {
                // The processor's outcome is final; there is nothing to retry.
                warn!(
                    order = %order.number,
                    payment = %payment_id,
                    state = %from,
                    action,
                    event_code = %notification.event_code,
                    "notification rejected by payment state"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn commit(
        &self,
        order: Option<Order>,
        notification: Notification,
        audit: Option<AuditEntry>,
    ) -> Result<()> {
        let key = notification.key();
        self.store
            .commit(Commit {
                order,
                notification,
                audit,
            })
            .await
            .inspect_err(|e| {
                error!(
                    psp_reference = %key.psp_reference,
                    event_code = %key.event_code,
                    error = %e,
                    "failed to persist reconciliation"
                )
            })
    }
}

fn should_materialize(notification: &Notification) -> bool {
    notification.is_authorisation() && notification.success
}

/// Creates the payment for an authorisation that arrived before the buyer
/// returned from the hosted payment page, and completes the order.
fn materialize(order: &mut Order, notification: &Notification) -> Uuid {
    let source = PaymentSource::HostedRedirect(HostedRedirectSource {
        psp_reference: Some(notification.psp_reference.clone()),
        auth_result: "unknown".to_string(),
        merchant_reference: notification.merchant_reference.clone(),
        payment_method: notification.payment_method.clone(),
    });
    let payment = Payment::new(notification.amount.to_money(), source)
        .with_external_reference(notification.psp_reference.clone());
    let payment_id = order.add_payment(payment);
    info!(
        order = %order.number,
        payment = %payment_id,
        psp_reference = %notification.psp_reference,
        "materialized payment from authorisation"
    );
    if order.complete() {
        info!(order = %order.number, "order completed");
    }
    payment_id
}

fn log_effect(order_number: &str, payment_id: Uuid, effect: &Effect) {
    match effect {
        Effect::Completed { captured } => {
            info!(order = %order_number, payment = %payment_id, %captured, "payment completed")
        }
        Effect::Refunded { amount } => {
            info!(order = %order_number, payment = %payment_id, %amount, "refund recorded")
        }
        Effect::Authorised {
            reference_matches: false,
        } => warn!(
            order = %order_number,
            payment = %payment_id,
            "authorisation reference differs from payment reference"
        ),
        other => debug!(order = %order_number, payment = %payment_id, effect = ?other, "applied"),
    }
}
