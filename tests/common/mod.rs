#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use psp_reconciler::application::locks::OrderLocks;
use psp_reconciler::application::service::NotificationService;
use psp_reconciler::config::{EnvOverrides, GatewayConfig, Preferences};
use psp_reconciler::domain::gateway::{
    AuthorizeRequest, GatewayOperations, GatewayResponse, ModificationRequest,
    RecurringDetailsResponse,
};
use psp_reconciler::domain::money::MinorAmount;
use psp_reconciler::domain::notification::{
    EventCode, Notification, NotificationEvent, NotificationKey,
};
use psp_reconciler::domain::order::Order;
use psp_reconciler::domain::ports::{
    AuditEntry, AuditLog, Commit, NotificationStore, OrderStore, ReconciliationStore,
};
use psp_reconciler::error::{ReconcileError, Result};
use psp_reconciler::infrastructure::in_memory::InMemoryStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn config() -> GatewayConfig {
    let preferences = Preferences {
        merchant_account: Some("ShopDefault".into()),
        refund_reason_id: Some("reason-1".into()),
        store_merchant_account_map: HashMap::from([("nl".to_string(), "ShopNL".to_string())]),
        ..Default::default()
    };
    GatewayConfig::resolve(&preferences, &EnvOverrides::default()).unwrap()
}

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap()
}

/// A successful delivery for `order` about payment `reference`.
pub fn event(reference: &str, order: &str, code: EventCode, value: i64) -> NotificationEvent {
    NotificationEvent {
        psp_reference: reference.into(),
        original_reference: None,
        merchant_reference: Some(order.into()),
        event_code: code,
        success: true,
        amount: MinorAmount::new(value, "EUR"),
        event_date: at(0),
        payment_method: Some("visa".into()),
        reason: None,
        additional_data: BTreeMap::new(),
    }
}

/// A modification event filed under its own reference, pointing back at the
/// authorisation.
pub fn modification(
    reference: &str,
    original: &str,
    order: &str,
    code: EventCode,
    value: i64,
) -> NotificationEvent {
    NotificationEvent {
        original_reference: Some(original.into()),
        ..event(reference, order, code, value)
    }
}

pub fn failed(mut event: NotificationEvent) -> NotificationEvent {
    event.success = false;
    event.reason = Some("Refused".into());
    event
}

pub fn dated(mut event: NotificationEvent, minute: u32) -> NotificationEvent {
    event.event_date = at(minute);
    event
}

pub struct Harness {
    pub store: InMemoryStore,
    pub locks: OrderLocks,
    pub service: NotificationService,
}

impl Harness {
    pub async fn with_orders(orders: Vec<Order>) -> Self {
        let store = InMemoryStore::new();
        for order in orders {
            store.store_order(order).await.unwrap();
        }
        let locks = OrderLocks::new();
        let service = NotificationService::new(Arc::new(store.clone()), locks.clone(), &config());
        Self {
            store,
            locks,
            service,
        }
    }

    pub async fn order(&self, number: &str) -> Order {
        self.store.load_order(number).await.unwrap().unwrap()
    }
}

/// Gateway double answering from a queue of scripted responses and recording
/// every request it receives.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<Vec<Result<GatewayResponse>>>,
    recurring: Mutex<Option<RecurringDetailsResponse>>,
    pub calls: Mutex<Vec<String>>,
    pub authorizations: Mutex<Vec<AuthorizeRequest>>,
    pub modifications: Mutex<Vec<ModificationRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: Result<GatewayResponse>) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn with_recurring(self, response: RecurringDetailsResponse) -> Self {
        *self.recurring.lock().unwrap() = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, call: &str) -> Result<GatewayResponse> {
        self.calls.lock().unwrap().push(call.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ReconcileError::GatewayTransport(format!(
                "no scripted response for {call}"
            )));
        }
        responses.remove(0)
    }
}

pub fn accepted(reference: &str) -> Result<GatewayResponse> {
    Ok(GatewayResponse {
        success: true,
        psp_reference: Some(reference.into()),
        message: None,
        raw: serde_json::json!({ "pspReference": reference, "resultCode": "Authorised" }),
    })
}

pub fn refused(message: &str) -> Result<GatewayResponse> {
    Ok(GatewayResponse {
        success: false,
        psp_reference: None,
        message: Some(message.into()),
        raw: serde_json::json!({ "refusalReason": message }),
    })
}

#[async_trait]
impl GatewayOperations for ScriptedGateway {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<GatewayResponse> {
        self.authorizations.lock().unwrap().push(request);
        self.next("authorize")
    }

    async fn capture(&self, request: ModificationRequest) -> Result<GatewayResponse> {
        self.modifications.lock().unwrap().push(request);
        self.next("capture")
    }

    async fn cancel(&self, request: ModificationRequest) -> Result<GatewayResponse> {
        self.modifications.lock().unwrap().push(request);
        self.next("cancel")
    }

    async fn credit(&self, request: ModificationRequest) -> Result<GatewayResponse> {
        self.modifications.lock().unwrap().push(request);
        self.next("credit")
    }

    async fn list_recurring_details(
        &self,
        _merchant_account: &str,
        _shopper_reference: &str,
    ) -> Result<RecurringDetailsResponse> {
        self.calls.lock().unwrap().push("list_recurring_details".into());
        Ok(self
            .recurring
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(RecurringDetailsResponse {
                success: true,
                details: Vec::new(),
            }))
    }
}

/// Wraps an in-memory store and fails every commit while `failing` is set.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: InMemoryStore,
    pub failing: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationStore for FailingStore {
    async fn ingest(&self, event: NotificationEvent) -> Result<(Notification, bool)> {
        self.inner.ingest(event).await
    }

    async fn find(&self, key: &NotificationKey) -> Result<Option<Notification>> {
        self.inner.find(key).await
    }

    async fn unprocessed_for_reference(&self, reference: &str) -> Result<Vec<Notification>> {
        self.inner.unprocessed_for_reference(reference).await
    }
}

#[async_trait]
impl OrderStore for FailingStore {
    async fn load_order(&self, number: &str) -> Result<Option<Order>> {
        self.inner.load_order(number).await
    }

    async fn store_order(&self, order: Order) -> Result<()> {
        self.inner.store_order(order).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        self.inner.all_orders().await
    }
}

#[async_trait]
impl AuditLog for FailingStore {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.inner.record(entry).await
    }

    async fn entries_for(&self, payment_id: Uuid) -> Result<Vec<AuditEntry>> {
        self.inner.entries_for(payment_id).await
    }
}

#[async_trait]
impl ReconciliationStore for FailingStore {
    async fn commit(&self, commit: Commit) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReconcileError::Storage("disk full".into()));
        }
        self.inner.commit(commit).await
    }
}
