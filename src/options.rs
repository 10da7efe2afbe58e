//! Engine configuration and per-call option sets.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::bus::{EventBus, Listener};
use crate::error::SwrError;
use crate::fetcher::{Fetcher, http_fetcher};
use crate::store::CacheStore;
use crate::stores::memory::MemoryStore;
use crate::trigger::{TriggerInstaller, noop_trigger};

/// Listener for errors emitted on the engine's error channel.
pub type ErrorListener = Listener<SwrError>;

/// Replacement for the built-in revalidation, invoked with the key to
/// refresh.
pub type RevalidateFn<V> =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<V>, SwrError>> + Send + Sync>;

/// Engine configuration.
///
/// [`SwrOptions::default`] wires up an in-memory store, a fresh error
/// channel and the HTTP fetcher; [`SwrOptions::new`] leaves the fetcher
/// out for value types that do not come from JSON endpoints.
pub struct SwrOptions<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// The store items are served from and written to.
    pub cache: Arc<dyn CacheStore<V>>,
    /// Channel fetch failures are emitted on.
    pub errors: Arc<EventBus<SwrError>>,
    /// Fetcher used by revalidations that do not bring their own.
    pub fetcher: Option<Fetcher<V>>,
    /// Initial value served to subscriptions when initial-cache loading
    /// is disabled.
    pub fallback_data: Option<V>,
    /// Serve the cached value as a subscription's initial data.
    pub load_initial_cache: bool,
    /// Revalidate when a subscription starts.
    pub revalidate_on_start: bool,
    /// Window in milliseconds during which repeat revalidations of a
    /// key are deduplicated.
    pub deduping_interval: i64,
    /// Revalidate when the focus trigger fires.
    pub revalidate_on_focus: bool,
    /// Minimum spacing in milliseconds between focus revalidations of
    /// one subscription.
    pub focus_throttle_interval: i64,
    /// Revalidate when the reconnect trigger fires.
    pub revalidate_on_reconnect: bool,
    /// Installer for the focus trigger.
    pub focus_when: TriggerInstaller,
    /// Installer for the reconnect trigger.
    pub reconnect_when: TriggerInstaller,
    /// Replacement for the built-in revalidation in mutate follow-ups.
    pub revalidate_function: Option<RevalidateFn<V>>,
}

impl<V> SwrOptions<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Defaults without a fetcher. Revalidations fail until one is
    /// configured here or passed per call.
    pub fn new() -> Self {
        SwrOptions {
            cache: Arc::new(MemoryStore::new()),
            errors: Arc::new(EventBus::new()),
            fetcher: None,
            fallback_data: None,
            load_initial_cache: true,
            revalidate_on_start: true,
            deduping_interval: 2000,
            revalidate_on_focus: true,
            focus_throttle_interval: 5000,
            revalidate_on_reconnect: true,
            focus_when: noop_trigger(),
            reconnect_when: noop_trigger(),
            revalidate_function: None,
        }
    }
}

impl<V> Default for SwrOptions<V>
where
    V: Clone + Send + Sync + DeserializeOwned + 'static,
{
    fn default() -> Self {
        SwrOptions {
            fetcher: Some(http_fetcher()),
            ..SwrOptions::new()
        }
    }
}

/// Options for a single revalidation.
pub struct RevalidateOptions<V> {
    /// Refetch even when the stored item is still fresh.
    pub force: bool,
    /// Fetcher override for this call.
    pub fetcher: Option<Fetcher<V>>,
    /// Deduping window override in milliseconds.
    pub deduping_interval: Option<i64>,
}

impl<V> Clone for RevalidateOptions<V> {
    fn clone(&self) -> Self {
        RevalidateOptions {
            force: self.force,
            fetcher: self.fetcher.clone(),
            deduping_interval: self.deduping_interval,
        }
    }
}

impl<V> Default for RevalidateOptions<V> {
    fn default() -> Self {
        RevalidateOptions {
            force: false,
            fetcher: None,
            deduping_interval: None,
        }
    }
}

impl<V> RevalidateOptions<V> {
    /// Options that bypass the deduping window.
    pub fn forced() -> Self {
        RevalidateOptions {
            force: true,
            ..RevalidateOptions::default()
        }
    }
}

/// Options for a mutation.
pub struct MutateOptions<V> {
    /// Follow the write with a revalidation.
    pub revalidate: bool,
    /// Options handed to that revalidation.
    pub revalidate_options: RevalidateOptions<V>,
    /// Replacement for the built-in revalidation, for this call only.
    pub revalidate_function: Option<RevalidateFn<V>>,
}

impl<V> Clone for MutateOptions<V> {
    fn clone(&self) -> Self {
        MutateOptions {
            revalidate: self.revalidate,
            revalidate_options: self.revalidate_options.clone(),
            revalidate_function: self.revalidate_function.clone(),
        }
    }
}

impl<V> Default for MutateOptions<V> {
    fn default() -> Self {
        MutateOptions {
            revalidate: true,
            revalidate_options: RevalidateOptions::default(),
            revalidate_function: None,
        }
    }
}

impl<V> MutateOptions<V> {
    /// Options that skip the follow-up revalidation.
    pub fn write_only() -> Self {
        MutateOptions {
            revalidate: false,
            ..MutateOptions::default()
        }
    }
}

/// Per-subscription overrides of the engine configuration.
///
/// Unset fields fall back to the engine's values.
pub struct SubscribeOptions<V> {
    pub fetcher: Option<Fetcher<V>>,
    pub deduping_interval: Option<i64>,
    pub fallback_data: Option<V>,
    pub load_initial_cache: Option<bool>,
    pub revalidate_on_start: Option<bool>,
    pub revalidate_on_focus: Option<bool>,
    pub revalidate_on_reconnect: Option<bool>,
}

impl<V> Clone for SubscribeOptions<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        SubscribeOptions {
            fetcher: self.fetcher.clone(),
            deduping_interval: self.deduping_interval,
            fallback_data: self.fallback_data.clone(),
            load_initial_cache: self.load_initial_cache,
            revalidate_on_start: self.revalidate_on_start,
            revalidate_on_focus: self.revalidate_on_focus,
            revalidate_on_reconnect: self.revalidate_on_reconnect,
        }
    }
}

impl<V> Default for SubscribeOptions<V> {
    fn default() -> Self {
        SubscribeOptions {
            fetcher: None,
            deduping_interval: None,
            fallback_data: None,
            load_initial_cache: None,
            revalidate_on_start: None,
            revalidate_on_focus: None,
            revalidate_on_reconnect: None,
        }
    }
}
