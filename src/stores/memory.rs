use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::bus::EventBus;
use crate::item::{CacheItem, ItemData};
use crate::store::{CacheStore, ClearOptions, DataListener, RemoveOptions};

/// Internal slot pairing an item with the sequence number of the write
/// that produced it.
struct Slot<V> {
    seq: u64,
    item: CacheItem<V>,
}

struct Inner<V> {
    items: RwLock<HashMap<String, Slot<V>>>,
    bus: EventBus<Option<V>>,
    write_seq: AtomicU64,
}

/// Thread-safe in-memory store with background resolution of pending
/// items.
///
/// Every write is tagged with a sequence number; the resolution task it
/// schedules commits only while its number still matches the slot, so a
/// later write to the same key wins over an unfinished resolution.
pub struct MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    inner: Arc<Inner<V>>,
}

impl<V> Clone for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn clone(&self) -> Self {
        MemoryStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(Inner {
                items: RwLock::new(HashMap::new()),
                bus: EventBus::new(),
                write_seq: AtomicU64::new(0),
            }),
        }
    }
}

impl<V> Default for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Commit the outcome of a resolution, unless a later write has
    /// superseded it.
    fn commit(&self, key: &str, seq: u64, outcome: Option<V>) {
        match outcome {
            Some(value) => {
                {
                    let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
                    let Some(slot) = items.get_mut(key) else {
                        return;
                    };
                    if slot.seq != seq {
                        tracing::debug!("Skipping superseded resolution: key={}", key);
                        return;
                    }
                    slot.item.data = ItemData::Ready(value.clone());
                }
                self.bus.emit(key, Some(value));
            }
            None => {
                // Nothing came back; drop the entry without announcing it.
                let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
                if items.get(key).is_some_and(|slot| slot.seq == seq) {
                    items.remove(key);
                }
            }
        }
    }
}

impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<CacheItem<V>> {
        let items = self
            .inner
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        items.get(key).map(|slot| slot.item.clone())
    }

    fn set(&self, key: &str, item: CacheItem<V>) {
        let seq = self.inner.write_seq.fetch_add(1, Ordering::SeqCst);

        {
            let mut items = self
                .inner
                .items
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            items.insert(
                key.to_string(),
                Slot {
                    seq,
                    item: item.clone(),
                },
            );
        }

        // Resolution runs in the background even for ready items, so a
        // plain value write still reaches subscribers.
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        tokio::spawn(async move {
            let outcome = item.settled().await;
            inner.commit(&key, seq, outcome);
        });
    }

    fn remove(&self, key: &str, options: RemoveOptions) {
        if options.broadcast {
            self.broadcast(key, None);
        }

        let mut items = self
            .inner
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
    }

    fn clear(&self, options: ClearOptions) {
        // Drain under one acquisition so a concurrent set cannot land
        // between the snapshot and the removal and vanish unannounced.
        let drained = {
            let mut items = self
                .inner
                .items
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *items)
        };

        if options.broadcast {
            for key in drained.keys() {
                self.broadcast(key, None);
            }
        }
    }

    fn has(&self, key: &str) -> bool {
        let items = self
            .inner
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        items.contains_key(key)
    }

    fn subscribe(&self, key: &str, listener: DataListener<V>) {
        self.inner.bus.subscribe(key, listener);
    }

    fn unsubscribe(&self, key: &str, listener: &DataListener<V>) {
        self.inner.bus.unsubscribe(key, listener);
    }

    fn broadcast(&self, key: &str, value: Option<V>) {
        self.inner.bus.emit(key, value);
    }
}
