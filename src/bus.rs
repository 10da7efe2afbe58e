//! Per-key event multiplexer used for data broadcasts and the error
//! channel.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A listener registered with an [`EventBus`].
///
/// Listener identity is the allocation behind the `Arc`: subscribing the
/// same `Arc` twice is a no-op, and unsubscribing requires the same
/// `Arc` that was subscribed.
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Fan-out of events to per-key listener lists.
///
/// Emission happens in subscription order, outside the internal lock, so
/// listeners may freely call back into the bus.
pub struct EventBus<T> {
    listeners: RwLock<HashMap<String, Vec<Listener<T>>>>,
}

impl<T> EventBus<T> {
    /// Create an empty bus.
    pub fn new() -> Self {
        EventBus {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register `listener` for events on `key`.
    ///
    /// Registering a listener that is already present for `key` does
    /// nothing.
    pub fn subscribe(&self, key: &str, listener: Listener<T>) {
        let mut map = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let entries = map.entry(key.to_string()).or_default();
        if !entries.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            entries.push(listener);
        }
    }

    /// Remove `listener` from `key`.
    ///
    /// Unknown keys and listeners that were never registered are
    /// ignored. The key's entry is dropped once its last listener
    /// leaves.
    pub fn unsubscribe(&self, key: &str, listener: &Listener<T>) {
        let mut map = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entries) = map.get_mut(key) {
            entries.retain(|l| !Arc::ptr_eq(l, listener));
            if entries.is_empty() {
                map.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: Clone> EventBus<T> {
    /// Deliver `event` to every listener registered for `key`, in the
    /// order they subscribed.
    pub fn emit(&self, key: &str, event: T) {
        let snapshot = {
            let map = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match map.get(key) {
                Some(entries) => entries.clone(),
                None => return,
            }
        };

        for listener in snapshot {
            listener(event.clone());
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        EventBus::new()
    }
}
