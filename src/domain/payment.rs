use super::gateway::RecurringDetail;
use super::money::Money;
use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Hosted payment methods the processor cannot cancel through the API; they
/// have to be refunded by hand.
pub const MANUAL_REFUND_METHODS: &[&str] =
    &["sofort", "ideal", "giropay", "directEbanking", "trustly"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Processing,
    Completed,
    Void,
    Failed,
}

impl PaymentState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Void => "void",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a payment made on the processor's hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedRedirectSource {
    pub psp_reference: Option<String>,
    pub auth_result: String,
    pub merchant_reference: Option<String>,
    pub payment_method: Option<String>,
}

impl HostedRedirectSource {
    pub fn requires_manual_refund(&self) -> bool {
        self.payment_method
            .as_deref()
            .is_some_and(|method| MANUAL_REFUND_METHODS.contains(&method))
    }
}

/// A card the buyer entered during checkout, or one stored with the processor
/// from an earlier purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCardSource {
    pub encrypted_data: Option<String>,
    pub gateway_customer_profile_id: Option<String>,
    pub brand: Option<String>,
    pub last_digits: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub name: Option<String>,
}

impl StoredCardSource {
    /// Copies the processor's stored contract onto the card.
    pub fn update_from(&mut self, detail: &RecurringDetail) {
        self.gateway_customer_profile_id = Some(detail.recurring_detail_reference.clone());
        self.brand = Some(detail.variant.clone());
        self.last_digits = Some(detail.card_number.clone());
        self.month = Some(format!("{:02}", detail.card_expiry_month));
        self.year = Some(format!("{:04}", detail.card_expiry_year));
        self.name = Some(detail.card_holder_name.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentSource {
    HostedRedirect(HostedRedirectSource),
    StoredCard(StoredCardSource),
    /// Any payment method not handled by the processor, e.g. store credit.
    Other { method: String },
}

impl PaymentSource {
    /// Whether modifications of this payment go through the processor and are
    /// only confirmed by notifications.
    pub fn is_gateway_backed(&self) -> bool {
        !matches!(self, Self::Other { .. })
    }

    pub fn requires_manual_refund(&self) -> bool {
        match self {
            Self::HostedRedirect(source) => source.requires_manual_refund(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::HostedRedirect(_) => "hosted_redirect",
            Self::StoredCard(_) => "stored_card",
            Self::Other { .. } => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub amount: Money,
    pub psp_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub amount: Money,
    pub transaction_id: String,
    pub reason_id: String,
}

/// A local record of a money movement attempt for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub amount: Money,
    pub state: PaymentState,
    external_reference: Option<String>,
    pub source: PaymentSource,
    pub capture_events: Vec<CaptureEvent>,
    pub refunds: Vec<Refund>,
}

impl Payment {
    pub fn new(amount: Money, source: PaymentSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            state: PaymentState::Pending,
            external_reference: None,
            source,
            capture_events: Vec::new(),
            refunds: Vec::new(),
        }
    }

    pub fn with_external_reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference = Some(reference.into());
        self
    }

    pub fn external_reference(&self) -> Option<&str> {
        self.external_reference.as_deref()
    }

    /// Sets the external reference unless one is already known. Returns whether
    /// the reference on the payment now equals `reference`.
    pub fn confirm_external_reference(&mut self, reference: &str) -> bool {
        match &self.external_reference {
            Some(existing) => existing == reference,
            None => {
                self.external_reference = Some(reference.to_string());
                true
            }
        }
    }

    pub fn currency(&self) -> &str {
        &self.amount.currency
    }

    pub fn captured_amount(&self) -> Money {
        self.capture_events
            .iter()
            .fold(Money::zero(self.currency()), |total, event| {
                total + event.amount.clone()
            })
    }

    pub fn refunded_amount(&self) -> Money {
        self.refunds
            .iter()
            .fold(Money::zero(self.currency()), |total, refund| {
                total + refund.amount.clone()
            })
    }

    pub fn is_completed(&self) -> bool {
        self.state == PaymentState::Completed
    }

    /// Marks a gateway request in flight. A completed payment may go back to
    /// processing while a refund is requested; the refund notification
    /// completes it again.
    pub fn start_processing(&mut self) -> Result<()> {
        match self.state {
            PaymentState::Pending | PaymentState::Processing | PaymentState::Completed => {
                self.state = PaymentState::Processing;
                Ok(())
            }
            from => Err(ReconcileError::InvalidTransition {
                from,
                action: "start processing",
            }),
        }
    }

    pub fn complete(&mut self) -> Result<()> {
        match self.state {
            PaymentState::Pending | PaymentState::Processing | PaymentState::Completed => {
                self.state = PaymentState::Completed;
                Ok(())
            }
            from => Err(ReconcileError::InvalidTransition {
                from,
                action: "complete",
            }),
        }
    }

    pub fn void(&mut self) -> Result<()> {
        match self.state {
            PaymentState::Failed => Err(ReconcileError::InvalidTransition {
                from: PaymentState::Failed,
                action: "void",
            }),
            _ => {
                self.state = PaymentState::Void;
                Ok(())
            }
        }
    }

    pub fn fail(&mut self) -> Result<()> {
        match self.state {
            PaymentState::Pending | PaymentState::Processing | PaymentState::Failed => {
                self.state = PaymentState::Failed;
                Ok(())
            }
            from => Err(ReconcileError::InvalidTransition {
                from,
                action: "fail",
            }),
        }
    }

    /// Records a capture and brings the payment amount in line with what was
    /// actually captured.
    pub fn record_capture(&mut self, amount: Money, psp_reference: &str) {
        self.capture_events.push(CaptureEvent {
            amount,
            psp_reference: psp_reference.to_string(),
        });
        self.amount = self.captured_amount();
    }

    /// Completes a payment that settles without the processor, capturing its
    /// whole amount.
    pub fn capture_in_full(&mut self) -> Result<()> {
        self.complete()?;
        let reference = self.external_reference.clone().unwrap_or_default();
        self.record_capture(self.amount.clone(), &reference);
        Ok(())
    }

    pub fn record_refund(&mut self, amount: Money, transaction_id: &str, reason_id: &str) {
        self.refunds.push(Refund {
            amount,
            transaction_id: transaction_id.to_string(),
            reason_id: reason_id.to_string(),
        });
    }
}
