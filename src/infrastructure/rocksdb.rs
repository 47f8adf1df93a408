use crate::domain::notification::{Notification, NotificationEvent, NotificationKey};
use crate::domain::order::Order;
use crate::domain::ports::{
    AuditEntry, AuditLog, Commit, NotificationStore, OrderStore, ReconciliationStore,
};
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for storing orders together with their payments.
pub const CF_ORDERS: &str = "orders";
/// Column Family for the notification log.
pub const CF_NOTIFICATIONS: &str = "notifications";
/// Column Family for the audit log.
pub const CF_AUDIT: &str = "audit";

/// A persistent store implementation using RocksDB.
///
/// Orders, notifications and audit entries live in separate Column Families.
/// A [`Commit`] is written as a single `WriteBatch`, so it lands atomically.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    // Serializes the read-then-write of `ingest`.
    ingest_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_NOTIFICATIONS, CF_AUDIT]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            ingest_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ReconcileError::Storage(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(family)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, family: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(family)?, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, family: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(family)?, IteratorMode::From(prefix, Direction::Forward));
        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn audit_key(entry: &AuditEntry) -> Vec<u8> {
        let nanos = entry.recorded_at.timestamp_nanos_opt().unwrap_or_default();
        format!("{}:{:020}:{}", entry.payment_id, nanos, Uuid::new_v4()).into_bytes()
    }
}

#[async_trait]
impl NotificationStore for RocksDBStore {
    async fn ingest(&self, event: NotificationEvent) -> Result<(Notification, bool)> {
        let _guard = self.ingest_lock.lock().await;
        let key = event.key().storage_key();
        if let Some(existing) = self.get_json(CF_NOTIFICATIONS, key.as_bytes())? {
            return Ok((existing, false));
        }
        let notification = Notification::from(event);
        self.put_json(CF_NOTIFICATIONS, key.as_bytes(), &notification)?;
        Ok((notification, true))
    }

    async fn find(&self, key: &NotificationKey) -> Result<Option<Notification>> {
        self.get_json(CF_NOTIFICATIONS, key.storage_key().as_bytes())
    }

    async fn unprocessed_for_reference(&self, reference: &str) -> Result<Vec<Notification>> {
        let mut pending: Vec<Notification> = self
            .scan::<Notification>(CF_NOTIFICATIONS, b"")?
            .into_iter()
            .filter(|n| !n.processed && n.payment_reference() == reference)
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
impl OrderStore for RocksDBStore {
    async fn load_order(&self, number: &str) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, number.as_bytes())
    }

    async fn store_order(&self, order: Order) -> Result<()> {
        self.put_json(CF_ORDERS, order.number.as_bytes(), &order)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS, b"")
    }
}

#[async_trait]
impl AuditLog for RocksDBStore {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.put_json(CF_AUDIT, &Self::audit_key(&entry), &entry)
    }

    async fn entries_for(&self, payment_id: Uuid) -> Result<Vec<AuditEntry>> {
        self.scan(CF_AUDIT, format!("{payment_id}:").as_bytes())
    }
}

#[async_trait]
impl ReconciliationStore for RocksDBStore {
    async fn commit(&self, commit: Commit) -> Result<()> {
        let mut batch = WriteBatch::default();
        if let Some(order) = &commit.order {
            batch.put_cf(
                self.cf(CF_ORDERS)?,
                order.number.as_bytes(),
                serde_json::to_vec(order)?,
            );
        }
        batch.put_cf(
            self.cf(CF_NOTIFICATIONS)?,
            commit.notification.key().storage_key().as_bytes(),
            serde_json::to_vec(&commit.notification)?,
        );
        if let Some(entry) = &commit.audit {
            batch.put_cf(
                self.cf(CF_AUDIT)?,
                Self::audit_key(entry),
                serde_json::to_vec(entry)?,
            );
        }
        self.db.write(&batch)?;
        Ok(())
    }
}
