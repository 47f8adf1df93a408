//! Checkout-driven payment operations.
//!
//! These calls only ever move a payment to `processing`. Whether a capture,
//! cancel or refund actually happened is decided later by the notification
//! that confirms it, because the processor executes modifications
//! asynchronously. A declined or failed call leaves the payment as it was.

use super::locks::OrderLocks;
use crate::config::{AccountLocator, GatewayConfig};
use crate::domain::gateway::{
    AuthorizationMode, AuthorizeRequest, BillingAddress, GatewayHandle, GatewayResponse,
    ModificationRequest,
};
use crate::domain::money::Money;
use crate::domain::order::Order;
use crate::domain::payment::{Payment, PaymentSource, StoredCardSource};
use crate::domain::ports::{AuditEntry, AuditSource, StoreHandle};
use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum GatewayCall {
    Authorize(AuthorizeRequest),
    Capture(ModificationRequest),
    Cancel(ModificationRequest),
    Credit(ModificationRequest),
}

impl GatewayCall {
    fn name(&self) -> &'static str {
        match self {
            Self::Authorize(_) => "authorize",
            Self::Capture(_) => "capture",
            Self::Cancel(_) => "cancel",
            Self::Credit(_) => "credit",
        }
    }
}

/// Issues gateway requests for a payment on behalf of the checkout flow.
///
/// The order lock is held for the whole gateway round trip, so notifications
/// for the same order wait while a call is in flight.
#[derive(Clone)]
pub struct PaymentProcessor {
    store: StoreHandle,
    locks: OrderLocks,
    gateway: GatewayHandle,
    accounts: AccountLocator,
}

impl PaymentProcessor {
    pub fn new(
        store: StoreHandle,
        locks: OrderLocks,
        gateway: GatewayHandle,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            store,
            locks,
            gateway,
            accounts: config.account_locator.clone(),
        }
    }

    /// Authorises a card payment entered during checkout.
    ///
    /// Zero-amount payments are placeholders for a reused card and are not
    /// authorised. On success the payment records the processor's reference and
    /// the card is refreshed from the processor's stored contract.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::MissingAuthorizationData`] when the card has neither
    /// encrypted data nor a stored profile, [`ReconcileError::Gateway`] when the
    /// processor declines, [`ReconcileError::ProfileLookup`] when the stored
    /// contract cannot be fetched afterwards.
    pub async fn authorize(&self, order_number: &str, payment_id: Uuid) -> Result<Payment> {
        let _guard = self.locks.acquire(order_number).await;
        let mut order = self.load(order_number).await?;
        let payment = find_payment(&order, payment_id)?;

        let PaymentSource::StoredCard(card) = &payment.source else {
            return Err(ReconcileError::Unsupported(format!(
                "{} payments are not authorised at checkout",
                payment.source.kind()
            )));
        };
        if payment.amount.is_zero() {
            return Ok(payment.clone());
        }

        let mode = match authorization_mode(card) {
            Some(mode) => mode,
            None => {
                self.audit(&order, payment_id, false, json!({ "error": "missing card data" }))
                    .await?;
                return Err(ReconcileError::MissingAuthorizationData);
            }
        };
        let request = AuthorizeRequest {
            reference: order.number.clone(),
            merchant_account: self.merchant_account(&order).to_string(),
            amount: payment.amount.to_minor(),
            shopper_ip: order.last_ip_address.clone(),
            shopper_email: order.email.clone(),
            shopper_reference: order.shopper_reference().to_string(),
            billing_address: order.billing_address.as_ref().map(BillingAddress::from),
            mode,
        };

        let response = self
            .dispatch(&mut order, payment_id, GatewayCall::Authorize(request))
            .await?;
        if let Some(reference) = response.psp_reference.as_deref()
            && let Some(payment) = order.payment_mut(payment_id)
        {
            payment.confirm_external_reference(reference);
        }
        self.store.store_order(order.clone()).await?;

        self.update_stored_card(&mut order, payment_id).await?;
        find_payment(&order, payment_id).cloned()
    }

    /// Requests capture of the authorised amount. Completed payments are left
    /// alone; payments outside the processor are completed directly.
    pub async fn capture(&self, order_number: &str, payment_id: Uuid) -> Result<Payment> {
        let _guard = self.locks.acquire(order_number).await;
        let mut order = self.load(order_number).await?;
        let payment = find_payment(&order, payment_id)?;
        if payment.is_completed() {
            return Ok(payment.clone());
        }
        if !payment.source.is_gateway_backed() {
            return self.settle_locally(order, payment_id, Payment::capture_in_full).await;
        }

        let request = self.modification(&order, payment, Some(payment.amount.clone()))?;
        self.dispatch(&mut order, payment_id, GatewayCall::Capture(request))
            .await?;
        self.store.store_order(order.clone()).await?;
        find_payment(&order, payment_id).cloned()
    }

    /// Checkout's "purchase": card payments were authorised when entered, so
    /// purchasing them is a capture.
    pub async fn purchase(&self, order_number: &str, payment_id: Uuid) -> Result<Payment> {
        self.capture(order_number, payment_id).await
    }

    /// Requests cancellation. Hosted bank-transfer payments cannot be cancelled
    /// through the API; the attempt is logged for a manual refund instead.
    pub async fn cancel(&self, order_number: &str, payment_id: Uuid) -> Result<Payment> {
        let _guard = self.locks.acquire(order_number).await;
        let mut order = self.load(order_number).await?;
        let payment = find_payment(&order, payment_id)?;

        if !payment.source.is_gateway_backed() {
            return self.settle_locally(order, payment_id, Payment::void).await;
        }
        if payment.source.requires_manual_refund() {
            warn!(order = %order.number, payment = %payment_id, "payment requires a manual refund");
            let payment = payment.clone();
            self.audit(
                &order,
                payment_id,
                false,
                json!({ "message": "This payment has to be refunded manually" }),
            )
            .await?;
            return Ok(payment);
        }

        let request = self.modification(&order, payment, None)?;
        self.dispatch(&mut order, payment_id, GatewayCall::Cancel(request))
            .await?;
        self.store.store_order(order.clone()).await?;
        find_payment(&order, payment_id).cloned()
    }

    /// Requests a refund of `amount` in the payment's currency. The amount is
    /// not validated against what was captured.
    pub async fn credit(
        &self,
        order_number: &str,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<Payment> {
        let _guard = self.locks.acquire(order_number).await;
        let mut order = self.load(order_number).await?;
        let payment = find_payment(&order, payment_id)?;
        if !payment.source.is_gateway_backed() {
            return Err(ReconcileError::Unsupported(format!(
                "credit is not available for {} payments",
                payment.source.kind()
            )));
        }

        let amount = Money::new(amount, payment.currency());
        let request = self.modification(&order, payment, Some(amount))?;
        self.dispatch(&mut order, payment_id, GatewayCall::Credit(request))
            .await?;
        self.store.store_order(order.clone()).await?;
        find_payment(&order, payment_id).cloned()
    }

    async fn load(&self, order_number: &str) -> Result<Order> {
        self.store
            .load_order(order_number)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("order {order_number}")))
    }

    fn merchant_account(&self, order: &Order) -> &str {
        self.accounts.for_store(order.store_code.as_deref())
    }

    fn modification(
        &self,
        order: &Order,
        payment: &Payment,
        amount: Option<Money>,
    ) -> Result<ModificationRequest> {
        let original_reference = payment.external_reference().ok_or_else(|| {
            ReconcileError::Unsupported(format!("payment {} has not been authorised", payment.id))
        })?;
        Ok(ModificationRequest {
            merchant_account: self.merchant_account(order).to_string(),
            original_reference: original_reference.to_string(),
            amount: amount.map(|money| money.to_minor()),
        })
    }

    /// Moves the payment to `processing` in `order`, sends `call`, and records
    /// the raw answer. On any failure `order` is restored to its state before
    /// the call and an error is returned; nothing about the payment is stored.
    async fn dispatch(
        &self,
        order: &mut Order,
        payment_id: Uuid,
        call: GatewayCall,
    ) -> Result<GatewayResponse> {
        let before = order.clone();
        order
            .payment_mut(payment_id)
            .ok_or_else(|| ReconcileError::NotFound(format!("payment {payment_id}")))?
            .start_processing()?;

        let operation = call.name();
        let result = match call {
            GatewayCall::Authorize(request) => self.gateway.authorize(request).await,
            GatewayCall::Capture(request) => self.gateway.capture(request).await,
            GatewayCall::Cancel(request) => self.gateway.cancel(request).await,
            GatewayCall::Credit(request) => self.gateway.credit(request).await,
        };

        match result {
            Ok(response) if response.success => {
                self.audit(order, payment_id, true, response_details(operation, &response))
                    .await?;
                info!(
                    order = %order.number,
                    payment = %payment_id,
                    operation,
                    psp_reference = ?response.psp_reference,
                    "gateway request accepted"
                );
                Ok(response)
            }
            Ok(response) => {
                *order = before;
                self.audit(order, payment_id, false, response_details(operation, &response))
                    .await?;
                warn!(order = %order.number, payment = %payment_id, operation, "gateway declined");
                Err(ReconcileError::Gateway(
                    response
                        .message
                        .unwrap_or_else(|| format!("{operation} was refused")),
                ))
            }
            Err(e) => {
                *order = before;
                self.audit(
                    order,
                    payment_id,
                    false,
                    json!({ "operation": operation, "error": e.to_string() }),
                )
                .await?;
                warn!(order = %order.number, payment = %payment_id, operation, error = %e, "gateway call failed");
                Err(e)
            }
        }
    }

    async fn update_stored_card(&self, order: &mut Order, payment_id: Uuid) -> Result<()> {
        let response = self
            .gateway
            .list_recurring_details(self.merchant_account(order), order.shopper_reference())
            .await?;
        if !response.success {
            return Err(ReconcileError::ProfileLookup);
        }
        let Some(latest) = response
            .details
            .iter()
            .max_by_key(|detail| detail.creation_date)
        else {
            return Ok(());
        };
        if let Some(payment) = order.payment_mut(payment_id)
            && let PaymentSource::StoredCard(card) = &mut payment.source
        {
            card.update_from(latest);
        }
        self.store.store_order(order.clone()).await
    }

    async fn settle_locally(
        &self,
        mut order: Order,
        payment_id: Uuid,
        transition: fn(&mut Payment) -> Result<()>,
    ) -> Result<Payment> {
        let payment = order
            .payment_mut(payment_id)
            .ok_or_else(|| ReconcileError::NotFound(format!("payment {payment_id}")))?;
        transition(payment)?;
        let payment = payment.clone();
        self.store.store_order(order).await?;
        Ok(payment)
    }

    async fn audit(
        &self,
        order: &Order,
        payment_id: Uuid,
        success: bool,
        details: serde_json::Value,
    ) -> Result<()> {
        self.store
            .record(AuditEntry::new(
                payment_id,
                order.number.clone(),
                AuditSource::Gateway,
                success,
                details,
            ))
            .await
    }
}

fn find_payment(order: &Order, payment_id: Uuid) -> Result<&Payment> {
    order
        .payment(payment_id)
        .ok_or_else(|| ReconcileError::NotFound(format!("payment {payment_id}")))
}

fn authorization_mode(card: &StoredCardSource) -> Option<AuthorizationMode> {
    if let Some(encrypted) = &card.encrypted_data {
        return Some(AuthorizationMode::EncryptedCard {
            encrypted_json: encrypted.clone(),
        });
    }
    card.gateway_customer_profile_id
        .as_ref()
        .map(|profile| AuthorizationMode::Recurring {
            recurring_detail_reference: profile.clone(),
        })
}

fn response_details(operation: &str, response: &GatewayResponse) -> serde_json::Value {
    json!({
        "operation": operation,
        "success": response.success,
        "psp_reference": response.psp_reference,
        "message": response.message,
        "raw": response.raw,
    })
}
