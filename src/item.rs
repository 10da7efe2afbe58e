use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// Shared handle to a resolution still in flight.
///
/// Cloning is cheap and every clone observes the same settled output.
/// Settling to `None` means the resolution produced nothing and the
/// entry should be dropped by whichever store owns it.
pub type PendingValue<V> = Shared<BoxFuture<'static, Option<V>>>;

/// The payload of a cache item.
#[derive(Clone)]
pub enum ItemData<V> {
    /// A settled value, ready to serve.
    Ready(V),
    /// A resolution still in flight.
    Pending(PendingValue<V>),
}

/// A cache item: a settled value or an in-flight resolution, plus an
/// optional expiration horizon.
#[derive(Clone)]
pub struct CacheItem<V> {
    /// The settled value or the pending resolution.
    pub data: ItemData<V>,

    /// Unix timestamp in milliseconds.
    /// At or after this time the item no longer counts as fresh.
    /// An unset horizon means the item is already expired.
    pub expires_at: Option<i64>,
}

impl<V> CacheItem<V> {
    /// Create an item from a settled value, with no expiration horizon.
    pub fn ready(value: V) -> Self {
        CacheItem {
            data: ItemData::Ready(value),
            expires_at: None,
        }
    }

    /// Create an item from an in-flight resolution, with no expiration
    /// horizon.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Option<V>> + Send + 'static,
        V: Clone,
    {
        CacheItem {
            data: ItemData::Pending(future.boxed().shared()),
            expires_at: None,
        }
    }

    /// Push the expiration horizon `ttl_ms` milliseconds past `now_ms`.
    pub fn expires_in(mut self, ttl_ms: i64, now_ms: i64) -> Self {
        self.expires_at = Some(now_ms + ttl_ms);
        self
    }

    /// Check if the item is still resolving.
    pub fn is_resolving(&self) -> bool {
        matches!(self.data, ItemData::Pending(_))
    }

    /// Check if the item has expired. Items without a horizon count as
    /// expired.
    pub fn has_expired(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(at) => now_ms >= at,
            None => true,
        }
    }

    /// Get the settled value, if there is one.
    pub fn value(&self) -> Option<&V> {
        match &self.data {
            ItemData::Ready(value) => Some(value),
            ItemData::Pending(_) => None,
        }
    }
}

impl<V: Clone> CacheItem<V> {
    /// Wait for the item to settle and return its value.
    ///
    /// Ready items settle immediately; pending items yield whatever the
    /// in-flight resolution produces.
    pub async fn settled(&self) -> Option<V> {
        match &self.data {
            ItemData::Ready(value) => Some(value.clone()),
            ItemData::Pending(pending) => pending.clone().await,
        }
    }
}
