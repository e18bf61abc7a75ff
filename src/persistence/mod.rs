//! Persistence
//!
//! Mirrors the cart's item list into client-local storage. Saves are
//! debounced so a burst of edits produces a single write, and restores are
//! validated so a corrupt or tampered payload never reaches the cart.
//! Storage failures are logged and otherwise ignored: the cart keeps working
//! in memory.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    cart::{CartAggregate, ServerCart, SubscriptionId},
    config::CartConfig,
    items::CartItem,
    scheduler::ScheduledTask,
};

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, StorageError};

/// Default storage key for the item list.
pub const DEFAULT_STORAGE_KEY: &str = "cart-items";

/// Default debounce before a save is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Reasons a stored payload is rejected.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not JSON.
    #[error("payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is JSON but not an array.
    #[error("payload is not an array")]
    NotAnArray,

    /// An element fails validation.
    #[error("entry {index} is invalid: {reason}")]
    InvalidEntry {
        /// Position in the array
        index: usize,

        /// What was wrong
        reason: String,
    },
}

/// Debounced save and validated restore of the item list.
#[derive(Debug)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    key: String,
    debounce: Duration,
    pending: Mutex<Option<ScheduledTask>>,
}

impl PersistenceAdapter {
    /// Creates an adapter with the default key and debounce.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: DEFAULT_STORAGE_KEY.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            pending: Mutex::new(None),
        }
    }

    /// Creates an adapter using the configured key and debounce.
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &CartConfig) -> Self {
        Self::new(store)
            .with_key(config.storage_key.clone())
            .with_debounce(config.persist_debounce())
    }

    /// Sets the storage key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the debounce.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Schedules a write of `items`, superseding any pending write.
    pub fn schedule_save(&self, items: &[CartItem]) {
        let payload = match serde_json::to_string(items) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to serialise cart items");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let key = self.key.clone();

        let task = ScheduledTask::schedule(self.debounce, move || write(&*store, &key, &payload));

        // Replacing the previous task drops it, which cancels its write.
        let previous = self.lock_pending().replace(task);

        drop(previous);
    }

    /// Writes any pending save now. Returns whether a write ran.
    pub fn flush(&self) -> bool {
        let pending = self.lock_pending().take();

        pending.is_some_and(ScheduledTask::flush)
    }

    /// Drops any pending save. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let pending = self.lock_pending().take();

        pending.is_some_and(ScheduledTask::cancel)
    }

    /// Whether a save is waiting for its debounce to elapse.
    pub fn has_pending_save(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .is_some_and(ScheduledTask::is_pending)
    }

    /// Reads the stored item list.
    ///
    /// Returns `None` when nothing is stored, storage fails, or the payload is
    /// invalid. An invalid payload is deleted.
    pub fn restore(&self) -> Option<Vec<CartItem>> {
        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%error, key = %self.key, "failed to read stored cart");
                return None;
            }
        };

        match decode_payload(&raw) {
            Ok(items) => {
                debug!(items = items.len(), "restored stored cart");
                Some(items)
            }
            Err(error) => {
                warn!(%error, key = %self.key, "discarding invalid stored cart");

                if let Err(error) = self.store.remove(&self.key) {
                    warn!(%error, key = %self.key, "failed to delete invalid stored cart");
                }

                None
            }
        }
    }

    /// Restores stored items into `cart`. Returns whether anything was restored.
    pub fn hydrate(&self, cart: &mut CartAggregate) -> bool {
        match self.restore() {
            Some(items) if !items.is_empty() => {
                cart.replace_all(ServerCart::with_items(items));
                true
            }
            _ => false,
        }
    }

    /// Saves `cart`'s items after every committed change.
    pub fn attach(self: &Arc<Self>, cart: &mut CartAggregate) -> SubscriptionId {
        let adapter = Arc::clone(self);

        cart.subscribe(move |cart| adapter.schedule_save(cart.items()))
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parses and validates a stored item list.
///
/// Every element must be an object with a string `id`, a string `productId`
/// and a positive numeric `quantity`. One bad element rejects the whole list.
///
/// # Errors
///
/// Returns a [`PayloadError`] describing the first problem found.
pub fn decode_payload(raw: &str) -> Result<Vec<CartItem>, PayloadError> {
    let Value::Array(entries) = serde_json::from_str::<Value>(raw)? else {
        return Err(PayloadError::NotAnArray);
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| decode_entry(index, entry))
        .collect()
}

fn decode_entry(index: usize, entry: Value) -> Result<CartItem, PayloadError> {
    let invalid = |reason: &str| PayloadError::InvalidEntry {
        index,
        reason: reason.to_string(),
    };

    if !entry.get("id").is_some_and(Value::is_string) {
        return Err(invalid("missing string id"));
    }

    if !entry.get("productId").is_some_and(Value::is_string) {
        return Err(invalid("missing string productId"));
    }

    let positive = entry
        .get("quantity")
        .and_then(Value::as_f64)
        .is_some_and(|quantity| quantity > 0.0);

    if !positive {
        return Err(invalid("quantity must be a positive number"));
    }

    serde_json::from_value(entry).map_err(|error| PayloadError::InvalidEntry {
        index,
        reason: error.to_string(),
    })
}

fn write(store: &dyn KeyValueStore, key: &str, payload: &str) {
    match store.set(key, payload) {
        Ok(()) => debug!(key, "saved cart"),
        Err(error) => warn!(%error, key, "failed to save cart"),
    }
}
