use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Two interactions that are logically one conversation (a command and its
/// Confirm click) are independent webhook calls at the protocol level. This
/// store correlates them: short-lived keyed values with pop semantics, plus
/// a bounded wait for confirmation-style flows.
pub struct CorrelationStore {
    entries: Mutex<HashMap<String, Entry>>,
    waiters: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    default_ttl: Duration,
}

struct Entry {
    expires_at: Instant,
    value: Value,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("no confirmation arrived within the wait window")]
pub struct WaitTimeout;

impl CorrelationStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Builds the conventional key for flows correlated by where and by
    /// whom they were started.
    pub fn scope_key(channel_id: &str, author_id: &str) -> String {
        format!("{channel_id}:{author_id}")
    }

    /// Stores `value` under a fresh opaque key and returns it. The key is
    /// what handlers embed in a component custom-id.
    pub fn insert(&self, value: Value, ttl: Duration) -> String {
        let key = Uuid::new_v4().simple().to_string();
        self.insert_keyed(&key, value, ttl);
        key
    }

    pub fn insert_keyed(&self, key: &str, value: Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), Entry { expires_at: Instant::now() + ttl, value });
        }
    }

    /// Non-destructive read; expired entries read as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        (Instant::now() < entry.expires_at).then(|| entry.value.clone())
    }

    /// Destructive read, used once the continuation consumes the state.
    pub fn pop(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.remove(key)?;
        (Instant::now() < entry.expires_at).then_some(entry.value)
    }

    /// Hands `value` to a task blocked in [`wait`](Self::wait) on the same
    /// key, or stores it under the default TTL when nobody is waiting yet.
    pub fn fill(&self, key: &str, value: Value) {
        let waiter = self.waiters.lock().ok().and_then(|mut waiters| waiters.remove(key));

        match waiter {
            Some(sender) => {
                // A closed receiver means the waiter timed out; keep the
                // value available for a later pop instead.
                if let Err(value) = sender.send(value) {
                    self.insert_keyed(key, value, self.default_ttl);
                }
            }
            None => self.insert_keyed(key, value, self.default_ttl),
        }
    }

    /// Suspends until [`fill`](Self::fill) supplies a value for `key`, or
    /// until `timeout` elapses. An already-stored value resolves
    /// immediately (and is consumed).
    pub async fn wait(&self, key: &str, timeout: Duration) -> Result<Value, WaitTimeout> {
        if let Some(value) = self.pop(key) {
            return Ok(value);
        }

        let receiver = {
            let Ok(mut waiters) = self.waiters.lock() else {
                return Err(WaitTimeout);
            };
            let (sender, receiver) = oneshot::channel();
            waiters.insert(key.to_owned(), sender);
            receiver
        };

        let result = tokio::time::timeout(timeout, receiver).await;
        match result {
            Ok(Ok(value)) => Ok(value),
            _ => {
                if let Ok(mut waiters) = self.waiters.lock() {
                    waiters.remove(key);
                }
                Err(WaitTimeout)
            }
        }
    }

    /// Drops every entry whose TTL has passed. Driven by the sweeper task;
    /// callable directly in tests.
    pub fn sweep(&self, now: Instant) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Background task sweeping expired entries on a fixed interval.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = store.sweep(Instant::now());
                if swept > 0 {
                    debug!(
                        event_name = "state.store.swept",
                        swept,
                        remaining = store.len(),
                        "expired correlation entries removed"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::{CorrelationStore, WaitTimeout};

    fn store() -> CorrelationStore {
        CorrelationStore::new(Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn pop_consumes_the_entry_exactly_once() {
        let store = store();
        let key = store.insert(json!({"x": 1}), Duration::from_secs(5));

        assert_eq!(store.pop(&key), Some(json!({"x": 1})));
        assert_eq!(store.pop(&key), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let store = store();
        let key = store.insert(json!({"x": 1}), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.pop(&key), None);
    }

    #[tokio::test(start_paused = true)]
    async fn get_does_not_consume() {
        let store = store();
        let key = store.insert(json!("payload"), Duration::from_secs(5));

        assert_eq!(store.get(&key), Some(json!("payload")));
        assert_eq!(store.get(&key), Some(json!("payload")));
        assert_eq!(store.pop(&key), Some(json!("payload")));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let store = store();
        store.insert_keyed("short", json!(1), Duration::from_secs(2));
        store.insert_keyed("long", json!(2), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(store.sweep(Instant::now()), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_resolves_when_filled() {
        let store = Arc::new(store());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store.wait("confirm:200:42", Duration::from_secs(30)).await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        store.fill("confirm:200:42", json!({"confirmed": true}));

        let value = waiter.await.expect("join").expect("wait should resolve");
        assert_eq!(value, json!({"confirmed": true}));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_as_a_specific_outcome() {
        let store = store();
        let result = store.wait("never-filled", Duration::from_secs(2)).await;
        assert_eq!(result, Err(WaitTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn fill_without_waiter_stores_for_a_later_pop() {
        let store = store();
        store.fill("late", json!("kept"));
        assert_eq!(store.pop("late"), Some(json!("kept")));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_consumes_a_value_stored_before_the_wait() {
        let store = store();
        store.insert_keyed("early", json!(7), Duration::from_secs(30));

        let value = store.wait("early", Duration::from_secs(1)).await.expect("resolve");
        assert_eq!(value, json!(7));
        assert_eq!(store.pop("early"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_prunes_in_the_background() {
        let store = Arc::new(store());
        store.insert_keyed("doomed", json!(0), Duration::from_secs(2));
        let sweeper = store.spawn_sweeper(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(store.is_empty());
        sweeper.abort();
    }
}
