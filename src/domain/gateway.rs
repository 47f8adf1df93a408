//! Boundary of the processor's synchronous API.
//!
//! The HTTP client behind [`GatewayOperations`] lives outside this crate. It
//! normalizes every answer into a [`GatewayResponse`] and reports network
//! failures and timeouts as [`ReconcileError::GatewayTransport`].
//!
//! [`ReconcileError::GatewayTransport`]: crate::error::ReconcileError::GatewayTransport

use super::money::MinorAmount;
use super::order::Address;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    pub psp_reference: Option<String>,
    pub message: Option<String>,
    /// Raw answer, kept for the audit log.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingAddress {
    pub street: String,
    pub house_number_or_name: String,
    pub city: String,
    pub postal_code: String,
    pub state_or_province: String,
    pub country: Option<String>,
}

impl From<&Address> for BillingAddress {
    fn from(address: &Address) -> Self {
        Self {
            street: address.address1.clone(),
            house_number_or_name: "NA".to_string(),
            city: address.city.clone(),
            postal_code: address.zipcode.clone(),
            state_or_province: address.state.clone().unwrap_or_else(|| "NA".to_string()),
            country: address.country.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// First use of a card: the browser-encrypted card blob.
    EncryptedCard { encrypted_json: String },
    /// A contract stored with the processor from an earlier purchase.
    Recurring { recurring_detail_reference: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeRequest {
    pub reference: String,
    pub merchant_account: String,
    pub amount: MinorAmount,
    pub shopper_ip: Option<String>,
    pub shopper_email: Option<String>,
    pub shopper_reference: String,
    pub billing_address: Option<BillingAddress>,
    pub mode: AuthorizationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModificationRequest {
    pub merchant_account: String,
    pub original_reference: String,
    pub amount: Option<MinorAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringDetail {
    pub recurring_detail_reference: String,
    pub variant: String,
    pub card_number: String,
    pub card_expiry_month: u32,
    pub card_expiry_year: u32,
    pub card_holder_name: String,
    pub creation_date: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringDetailsResponse {
    pub success: bool,
    pub details: Vec<RecurringDetail>,
}

#[async_trait]
pub trait GatewayOperations: Send + Sync {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<GatewayResponse>;
    async fn capture(&self, request: ModificationRequest) -> Result<GatewayResponse>;
    async fn cancel(&self, request: ModificationRequest) -> Result<GatewayResponse>;
    async fn credit(&self, request: ModificationRequest) -> Result<GatewayResponse>;
    async fn list_recurring_details(
        &self,
        merchant_account: &str,
        shopper_reference: &str,
    ) -> Result<RecurringDetailsResponse>;
}

pub type GatewayHandle = Arc<dyn GatewayOperations>;
