use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Registry size above which idle entries are dropped on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusive locks scoped to an order.
///
/// Everything that reads an order's payments in order to change them holds
/// the order's lock. Different orders never contend.
#[derive(Default, Clone)]
pub struct OrderLocks {
    registry: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Held lock on one order, released when dropped.
pub struct OrderGuard {
    order_number: String,
    _guard: OwnedMutexGuard<()>,
}

impl OrderGuard {
    pub fn order_number(&self) -> &str {
        &self.order_number
    }
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        trace!(order = %self.order_number, "order lock released");
    }
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, order_number: &str) -> OrderGuard {
        let lock = {
            let mut registry = self.registry.lock().await;
            if registry.len() > PRUNE_THRESHOLD {
                registry.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            registry
                .entry(order_number.to_string())
                .or_default()
                .clone()
        };
        let guard = lock.lock_owned().await;
        trace!(order = %order_number, "order lock acquired");
        OrderGuard {
            order_number: order_number.to_string(),
            _guard: guard,
        }
    }
}
