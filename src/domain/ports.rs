use super::notification::{Notification, NotificationEvent, NotificationKey};
use super::order::Order;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSource {
    Gateway,
    Notification,
}

/// Raw processor payload kept against a payment for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub payment_id: Uuid,
    pub order_number: String,
    pub source: AuditSource,
    pub success: bool,
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        payment_id: Uuid,
        order_number: impl Into<String>,
        source: AuditSource,
        success: bool,
        details: serde_json::Value,
    ) -> Self {
        Self {
            payment_id,
            order_number: order_number.into(),
            source,
            success,
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only, deduplicated log of inbound notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores the event unless its (psp reference, event code) pair is already
    /// known. Returns the stored record and whether this was its first delivery.
    /// The existence check and the write are atomic.
    async fn ingest(&self, event: NotificationEvent) -> Result<(Notification, bool)>;
    async fn find(&self, key: &NotificationKey) -> Result<Option<Notification>>;
    /// Unprocessed notifications about the payment with `reference`, oldest
    /// dispatch first.
    async fn unprocessed_for_reference(&self, reference: &str) -> Result<Vec<Notification>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load_order(&self, number: &str) -> Result<Option<Order>>;
    async fn store_order(&self, order: Order) -> Result<()>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
    async fn entries_for(&self, payment_id: Uuid) -> Result<Vec<AuditEntry>>;
}

/// Everything one reconciliation step writes.
#[derive(Debug, Clone)]
pub struct Commit {
    pub order: Option<Order>,
    pub notification: Notification,
    pub audit: Option<AuditEntry>,
}

#[async_trait]
pub trait ReconciliationStore: NotificationStore + OrderStore + AuditLog {
    /// Writes all parts of `commit` or none of them.
    async fn commit(&self, commit: Commit) -> Result<()>;
}

pub type StoreHandle = Arc<dyn ReconciliationStore>;
