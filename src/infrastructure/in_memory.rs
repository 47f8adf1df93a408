use crate::domain::notification::{Notification, NotificationEvent, NotificationKey};
use crate::domain::order::Order;
use crate::domain::ports::{
    AuditEntry, AuditLog, Commit, NotificationStore, OrderStore, ReconciliationStore,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    notifications: HashMap<NotificationKey, Notification>,
    audit: Vec<AuditEntry>,
}

/// A thread-safe in-memory store for orders, notifications and the audit log.
///
/// All tables sit behind one `RwLock`, so a [`Commit`] is applied atomically
/// and the dedup check in `ingest` cannot race with another ingest.
/// Ideal for testing or for replaying a notification dump.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn ingest(&self, event: NotificationEvent) -> Result<(Notification, bool)> {
        let mut tables = self.tables.write().await;
        let key = event.key();
        if let Some(existing) = tables.notifications.get(&key) {
            return Ok((existing.clone(), false));
        }
        let notification = Notification::from(event);
        tables.notifications.insert(key, notification.clone());
        Ok((notification, true))
    }

    async fn find(&self, key: &NotificationKey) -> Result<Option<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables.notifications.get(key).cloned())
    }

    async fn unprocessed_for_reference(&self, reference: &str) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut pending: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| !n.processed && n.payment_reference() == reference)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.event_date
                .cmp(&b.event_date)
                .then_with(|| a.key().cmp(&b.key()))
        });
        Ok(pending)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn load_order(&self, number: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(number).cloned())
    }

    async fn store_order(&self, order: Order) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.orders.insert(order.number.clone(), order);
        Ok(())
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(orders)
    }
}

#[async_trait]
impl AuditLog for InMemoryStore {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.audit.push(entry);
        Ok(())
    }

    async fn entries_for(&self, payment_id: Uuid) -> Result<Vec<AuditEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .iter()
            .filter(|entry| entry.payment_id == payment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryStore {
    async fn commit(&self, commit: Commit) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(order) = commit.order {
            tables.orders.insert(order.number.clone(), order);
        }
        tables
            .notifications
            .insert(commit.notification.key(), commit.notification);
        if let Some(entry) = commit.audit {
            tables.audit.push(entry);
        }
        Ok(())
    }
}
