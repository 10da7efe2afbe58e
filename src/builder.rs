//! Builder API for configuring engine instances.
//!
//! This module provides a convenient way to assemble an engine from a
//! store, a fetcher and the revalidation settings, without filling an
//! options struct by hand.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::error::SwrError;
use crate::fetcher::Fetcher;
use crate::options::{RevalidateFn, SwrOptions};
use crate::store::CacheStore;
use crate::swr::Swr;
use crate::trigger::TriggerInstaller;

/// Builder for [`Swr`] engines.
///
/// Every setter has the engine-level default documented on
/// [`SwrOptions`]; only the pieces that differ need to be set.
///
/// # Example
///
/// ```ignore
/// use swr_engine::{Swr, http_fetcher};
///
/// let engine: Swr<User> = Swr::builder()
///     .fetcher(http_fetcher())
///     .deduping_interval(5_000)
///     .revalidate_on_focus(false)
///     .build();
/// ```
pub struct SwrBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    options: SwrOptions<V>,
}

impl<V> SwrBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new SwrBuilder.
    pub fn new() -> Self {
        SwrBuilder {
            options: SwrOptions::new(),
        }
    }

    /// Use `cache` as the backing store.
    ///
    /// # Arguments
    /// * `cache` - The store to serve from and write through
    pub fn cache(mut self, cache: Arc<dyn CacheStore<V>>) -> Self {
        self.options.cache = cache;
        self
    }

    /// Use `errors` as the channel fetch failures are emitted on.
    pub fn errors(mut self, errors: Arc<EventBus<SwrError>>) -> Self {
        self.options.errors = errors;
        self
    }

    /// Use `fetcher` to load values that are missing or expired.
    pub fn fetcher(mut self, fetcher: Fetcher<V>) -> Self {
        self.options.fetcher = Some(fetcher);
        self
    }

    /// Serve `value` as a subscription's initial data when initial-cache
    /// loading is disabled.
    pub fn fallback_data(mut self, value: V) -> Self {
        self.options.fallback_data = Some(value);
        self
    }

    /// Whether subscriptions read the cache for their initial value.
    pub fn load_initial_cache(mut self, enabled: bool) -> Self {
        self.options.load_initial_cache = enabled;
        self
    }

    /// Whether subscriptions revalidate as soon as they start.
    pub fn revalidate_on_start(mut self, enabled: bool) -> Self {
        self.options.revalidate_on_start = enabled;
        self
    }

    /// How long a fetch shields its key from further fetches, in
    /// milliseconds.
    pub fn deduping_interval(mut self, interval_ms: i64) -> Self {
        self.options.deduping_interval = interval_ms;
        self
    }

    /// Whether subscriptions revalidate on focus events.
    pub fn revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.options.revalidate_on_focus = enabled;
        self
    }

    /// Minimum spacing between focus revalidations, in milliseconds.
    pub fn focus_throttle_interval(mut self, interval_ms: i64) -> Self {
        self.options.focus_throttle_interval = interval_ms;
        self
    }

    /// Whether subscriptions revalidate on reconnect events.
    pub fn revalidate_on_reconnect(mut self, enabled: bool) -> Self {
        self.options.revalidate_on_reconnect = enabled;
        self
    }

    /// Install `installer` as the source of focus events.
    pub fn focus_when(mut self, installer: TriggerInstaller) -> Self {
        self.options.focus_when = installer;
        self
    }

    /// Install `installer` as the source of reconnect events.
    pub fn reconnect_when(mut self, installer: TriggerInstaller) -> Self {
        self.options.reconnect_when = installer;
        self
    }

    /// Replace the built-in follow-up revalidation that `mutate` runs.
    pub fn revalidate_function(mut self, f: RevalidateFn<V>) -> Self {
        self.options.revalidate_function = Some(f);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Swr<V> {
        Swr::new(self.options)
    }
}

impl<V> Default for SwrBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
