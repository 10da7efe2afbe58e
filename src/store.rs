use crate::bus::Listener;
use crate::item::CacheItem;

/// Listener for data broadcasts on a store.
///
/// `Some(value)` announces a freshly settled value, `None` announces a
/// removal.
pub type DataListener<V> = Listener<Option<V>>;

/// Options for [`CacheStore::remove`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Announce the removal to the key's subscribers before the entry
    /// is deleted.
    pub broadcast: bool,
}

/// Options for [`CacheStore::clear`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOptions {
    /// Announce each removal to that key's subscribers before the map
    /// is emptied.
    pub broadcast: bool,
}

/// A store is a common interface for keeping cache items and fanning
/// out change notifications to per-key subscribers.
///
/// Reads and writes are synchronous; asynchrony lives inside the items.
/// A pending item handed to [`set`](CacheStore::set) is stored
/// immediately, and the store schedules its resolution in the
/// background: settling to `Some(value)` replaces the item's payload
/// and broadcasts the value, settling to `None` removes the entry
/// without a broadcast. A later write to the same key supersedes an
/// unfinished resolution, which then commits nothing.
pub trait CacheStore<V>: Send + Sync {
    /// A name for tracing.
    ///
    /// # Example
    /// - "memory"
    /// - "persistent"
    fn name(&self) -> &'static str;

    /// Return the item stored under `key`, resolved or not.
    ///
    /// The response must be `None` for cache misses.
    fn get(&self, key: &str) -> Option<CacheItem<V>>;

    /// Store `item` under `key`, replacing whatever was there, and
    /// schedule its resolution.
    fn set(&self, key: &str, item: CacheItem<V>);

    /// Remove the entry under `key`, if any.
    fn remove(&self, key: &str, options: RemoveOptions);

    /// Remove every entry.
    fn clear(&self, options: ClearOptions);

    /// Check whether an entry exists under `key`, resolving or not.
    fn has(&self, key: &str) -> bool;

    /// Register `listener` for broadcasts on `key`.
    fn subscribe(&self, key: &str, listener: DataListener<V>);

    /// Remove `listener` from `key`.
    fn unsubscribe(&self, key: &str, listener: &DataListener<V>);

    /// Deliver `value` to every subscriber of `key`.
    fn broadcast(&self, key: &str, value: Option<V>);
}
