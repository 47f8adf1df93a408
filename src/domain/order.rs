use super::payment::Payment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    #[default]
    Checkout,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address1: String,
    pub city: String,
    pub zipcode: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// The aggregate that owns payments. All payment mutation happens while the
/// order's lock is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub store_code: Option<String>,
    #[serde(default)]
    pub last_ip_address: Option<String>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub state: OrderState,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Order {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            email: None,
            user_id: None,
            store_code: None,
            last_ip_address: None,
            billing_address: None,
            state: OrderState::Checkout,
            payments: Vec::new(),
        }
    }

    pub fn payment(&self, id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|payment| payment.id == id)
    }

    pub fn payment_mut(&mut self, id: Uuid) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|payment| payment.id == id)
    }

    pub fn payment_by_reference(&self, reference: &str) -> Option<&Payment> {
        self.payments
            .iter()
            .find(|payment| payment.external_reference() == Some(reference))
    }

    pub fn add_payment(&mut self, payment: Payment) -> Uuid {
        let id = payment.id;
        self.payments.push(payment);
        id
    }

    /// Advances the order to `complete`. Returns `false` if it already was.
    pub fn complete(&mut self) -> bool {
        if self.state == OrderState::Complete {
            return false;
        }
        self.state = OrderState::Complete;
        true
    }

    /// Identifier the processor stores recurring contracts under.
    pub fn shopper_reference(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.number)
    }
}
