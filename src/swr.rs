use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::builder::SwrBuilder;
use crate::bus::EventBus;
use crate::error::SwrError;
use crate::item::{CacheItem, ItemData, PendingValue};
use crate::options::{
    ErrorListener, MutateOptions, RevalidateOptions, SubscribeOptions, SwrOptions,
};
use crate::store::{CacheStore, ClearOptions, DataListener};
use crate::trigger::{Notify, Teardown, TriggerConfig};
use crate::utils::now_ms;

/// Side channel carrying a fetch failure to the caller that issued it.
type ErrorSlot = Arc<Mutex<Option<SwrError>>>;

/// Outcome of the deduplication step of a revalidation.
enum FetchDecision<V: Clone> {
    /// A usable item already exists; join its resolution.
    Join(CacheItem<V>),
    /// This call issued a fetch.
    Fetch {
        pending: PendingValue<V>,
        error_slot: ErrorSlot,
    },
}

/// Stale-while-revalidate engine over a [`CacheStore`].
///
/// The engine serves settled values synchronously, refreshes them
/// through deduplicated background fetches and fans fresh values out to
/// per-key subscribers. Cloning is cheap; clones share the store, the
/// error channel and the deduplication state.
///
/// # Example
/// ```ignore
/// let engine: Swr<User> = Swr::builder()
///     .fetcher(http_fetcher())
///     .build();
///
/// let user = engine.revalidate("https://api.example.com/user/1", None).await?;
/// ```
pub struct Swr<V>
where
    V: Clone + Send + Sync + 'static,
{
    options: Arc<SwrOptions<V>>,
    /// Serializes the decide-and-insert step of revalidation so
    /// concurrent calls for one key agree on a single fetch.
    fetch_gate: Arc<Mutex<()>>,
}

impl<V> Clone for Swr<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Swr {
            options: Arc::clone(&self.options),
            fetch_gate: Arc::clone(&self.fetch_gate),
        }
    }
}

impl<V> Swr<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an engine from `options`.
    pub fn new(options: SwrOptions<V>) -> Self {
        Swr {
            options: Arc::new(options),
            fetch_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Start building an engine.
    pub fn builder() -> SwrBuilder<V> {
        SwrBuilder::new()
    }

    /// The store this engine serves from.
    pub fn cache(&self) -> &Arc<dyn CacheStore<V>> {
        &self.options.cache
    }

    /// The channel fetch failures are emitted on.
    pub fn errors(&self) -> &Arc<EventBus<SwrError>> {
        &self.options.errors
    }

    /// Return the settled value under `key`, without side effects.
    ///
    /// Items still resolving count as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        self.options
            .cache
            .get(key)
            .and_then(|item| item.value().cloned())
    }

    /// Remove every cached entry.
    pub fn clear(&self, options: ClearOptions) {
        self.options.cache.clear(options);
    }

    /// Refresh the value under `key`, deduplicating concurrent calls.
    ///
    /// A fetch is issued only when the key has no item, its item has
    /// expired, or `force` is set; otherwise the call joins whatever is
    /// already stored and resolves with its settled value. The caller
    /// that issued a failing fetch gets the error; the failure is also
    /// emitted on the error channel and the entry is dropped.
    ///
    /// # Arguments
    /// * `key` - The key to refresh
    /// * `options` - Per-call overrides, or `None` for the engine's
    ///   defaults
    pub async fn revalidate(
        &self,
        key: &str,
        options: Option<RevalidateOptions<V>>,
    ) -> Result<Option<V>, SwrError> {
        if key.is_empty() {
            return Err(SwrError::KeyRequired);
        }
        let options = options.unwrap_or_default();
        let deduping_interval = options
            .deduping_interval
            .unwrap_or(self.options.deduping_interval);

        let decision = {
            let _gate = self.fetch_gate.lock().unwrap_or_else(PoisonError::into_inner);
            let now = now_ms();

            match self.options.cache.get(key) {
                Some(item) if !options.force && !item.has_expired(now) => {
                    FetchDecision::Join(item)
                }
                _ => {
                    tracing::debug!("Issuing fetch: key={}", key);
                    let fetcher = options
                        .fetcher
                        .clone()
                        .or_else(|| self.options.fetcher.clone());
                    let error_slot: ErrorSlot = Arc::new(Mutex::new(None));

                    let errors = Arc::clone(&self.options.errors);
                    let slot = Arc::clone(&error_slot);
                    let fetch_key = key.to_string();
                    let fetch = async move {
                        let failure = match fetcher {
                            Some(fetcher) => match fetcher(fetch_key.clone()).await {
                                Ok(value) => return Some(value),
                                Err(e) => SwrError::fetch(fetch_key.clone(), e),
                            },
                            None => SwrError::fetch(fetch_key.clone(), "no fetcher configured"),
                        };

                        tracing::warn!("Fetch failed: key={}, error={}", fetch_key, failure);
                        *slot.lock().unwrap_or_else(PoisonError::into_inner) =
                            Some(failure.clone());
                        errors.emit(&fetch_key, failure);
                        None
                    };

                    let pending: PendingValue<V> = fetch.boxed().shared();
                    self.options.cache.set(
                        key,
                        CacheItem {
                            data: ItemData::Pending(pending.clone()),
                            expires_at: Some(now + deduping_interval),
                        },
                    );

                    FetchDecision::Fetch {
                        pending,
                        error_slot,
                    }
                }
            }
        };

        match decision {
            FetchDecision::Join(item) => Ok(item.settled().await),
            FetchDecision::Fetch {
                pending,
                error_slot,
            } => match pending.await {
                Some(value) => Ok(Some(value)),
                None => {
                    let failure = error_slot
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    match failure {
                        Some(err) => Err(err),
                        None => Ok(None),
                    }
                }
            },
        }
    }

    /// Write `value` under `key` and follow up with a revalidation.
    ///
    /// The write lands immediately, reaches subscribers, and carries no
    /// expiration horizon, so the follow-up refetches. Exactly one of
    /// the built-in revalidation or a configured replacement runs;
    /// `options.revalidate = false` skips the follow-up and resolves
    /// with the written value.
    pub async fn mutate(
        &self,
        key: &str,
        value: V,
        options: Option<MutateOptions<V>>,
    ) -> Result<Option<V>, SwrError> {
        if key.is_empty() {
            return Err(SwrError::KeyRequired);
        }
        let options = options.unwrap_or_default();

        self.options.cache.set(key, CacheItem::ready(value.clone()));

        if !options.revalidate {
            return Ok(Some(value));
        }

        let replacement = options
            .revalidate_function
            .clone()
            .or_else(|| self.options.revalidate_function.clone());
        match replacement {
            Some(revalidate) => revalidate(key.to_string()).await,
            None => self.revalidate(key, Some(options.revalidate_options)).await,
        }
    }

    /// Like [`mutate`](Swr::mutate), deriving the new value from the
    /// current settled one.
    pub async fn mutate_with<F>(
        &self,
        key: &str,
        f: F,
        options: Option<MutateOptions<V>>,
    ) -> Result<Option<V>, SwrError>
    where
        F: FnOnce(Option<V>) -> V,
    {
        if key.is_empty() {
            return Err(SwrError::KeyRequired);
        }
        let value = f(self.get(key));
        self.mutate(key, value, options).await
    }

    /// Wait for a settled value under `key`.
    ///
    /// Resolves immediately when one is cached, otherwise with the next
    /// broadcast for the key; rejects with the next error emitted for
    /// it. An entry that resolves to nothing is dropped without a
    /// broadcast, so callers racing such a removal should pair this
    /// with a timeout.
    ///
    /// # Example
    /// ```ignore
    /// let value = tokio::time::timeout(
    ///     Duration::from_secs(2),
    ///     engine.get_wait("user:1"),
    /// ).await??;
    /// ```
    pub async fn get_wait(&self, key: &str) -> Result<Option<V>, SwrError> {
        if key.is_empty() {
            return Err(SwrError::KeyRequired);
        }

        let (tx, rx) = oneshot::channel::<Result<Option<V>, SwrError>>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let data_listener: DataListener<V> = {
            let tx = Arc::clone(&tx);
            Arc::new(move |value: Option<V>| {
                if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    let _ = tx.send(Ok(value));
                }
            })
        };
        let error_listener: ErrorListener = {
            let tx = Arc::clone(&tx);
            Arc::new(move |err: SwrError| {
                if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    let _ = tx.send(Err(err));
                }
            })
        };

        // Listeners go in before the cache check so a value settling in
        // between cannot be missed.
        self.options.cache.subscribe(key, data_listener.clone());
        self.options.errors.subscribe(key, error_listener.clone());

        let result = match self.get(key) {
            Some(value) => Ok(Some(value)),
            None => match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Ok(None),
            },
        };

        self.options.cache.unsubscribe(key, &data_listener);
        self.options.errors.unsubscribe(key, &error_listener);

        result
    }

    /// Subscribe to `key`: deliver the initial value, follow `on_data`
    /// broadcasts and `on_error` failures, start a revalidation and
    /// install the focus and reconnect triggers.
    ///
    /// An empty key builds a disabled subscription that delivers
    /// nothing and tears nothing down.
    pub fn subscribe(
        &self,
        key: &str,
        on_data: Option<DataListener<V>>,
        on_error: Option<ErrorListener>,
        options: Option<SubscribeOptions<V>>,
    ) -> Subscription<V> {
        let options = options.unwrap_or_default();
        if key.is_empty() {
            return self.disabled_subscription(options);
        }

        let load_initial_cache = options
            .load_initial_cache
            .unwrap_or(self.options.load_initial_cache);
        let revalidate_on_start = options
            .revalidate_on_start
            .unwrap_or(self.options.revalidate_on_start);
        let revalidate_on_focus = options
            .revalidate_on_focus
            .unwrap_or(self.options.revalidate_on_focus);
        let revalidate_on_reconnect = options
            .revalidate_on_reconnect
            .unwrap_or(self.options.revalidate_on_reconnect);
        let fallback_data = options
            .fallback_data
            .clone()
            .or_else(|| self.options.fallback_data.clone());

        let revalidate_options = RevalidateOptions {
            force: false,
            fetcher: options.fetcher.clone(),
            deduping_interval: options.deduping_interval,
        };

        // Either/or: the fallback stands in for the cache read, not for
        // a cache miss.
        let initial = if load_initial_cache {
            self.get(key)
        } else {
            fallback_data
        };

        if let (Some(listener), Some(value)) = (&on_data, &initial) {
            listener(Some(value.clone()));
        }

        if let Some(listener) = &on_data {
            self.options.cache.subscribe(key, listener.clone());
        }
        if let Some(listener) = &on_error {
            self.options.errors.subscribe(key, listener.clone());
        }

        // Listeners are registered before the start revalidation is
        // spawned; a fetch settling first would otherwise broadcast to
        // nobody.
        let revalidated = revalidate_on_start.then(|| {
            let (tx, rx) = oneshot::channel();
            let engine = self.clone();
            let key = key.to_string();
            let options = revalidate_options.clone();
            tokio::spawn(async move {
                let result = engine.revalidate(&key, Some(options)).await;
                let _ = tx.send(result);
            });
            rx
        });

        let notify: Notify = {
            let engine = self.clone();
            let key = key.to_string();
            let options = revalidate_options;
            Arc::new(move || {
                let engine = engine.clone();
                let key = key.clone();
                let options = options.clone();
                tokio::spawn(async move {
                    let _ = engine.revalidate(&key, Some(options)).await;
                });
            })
        };

        let mut teardowns = Vec::new();
        if revalidate_on_focus {
            let config = TriggerConfig {
                throttle_interval: self.options.focus_throttle_interval,
            };
            if let Some(teardown) = (self.options.focus_when)(notify.clone(), config) {
                teardowns.push(teardown);
            }
        }
        if revalidate_on_reconnect {
            let config = TriggerConfig {
                throttle_interval: 0,
            };
            if let Some(teardown) = (self.options.reconnect_when)(notify, config) {
                teardowns.push(teardown);
            }
        }

        Subscription {
            key: Some(key.to_string()),
            data: initial,
            engine: self.clone(),
            on_data,
            on_error,
            revalidated,
            teardowns,
        }
    }

    /// Subscribe with a lazily produced key. A producer yielding `None`
    /// builds a disabled subscription.
    pub fn subscribe_with<K>(
        &self,
        key_fn: K,
        on_data: Option<DataListener<V>>,
        on_error: Option<ErrorListener>,
        options: Option<SubscribeOptions<V>>,
    ) -> Subscription<V>
    where
        K: FnOnce() -> Option<String>,
    {
        match key_fn() {
            Some(key) => self.subscribe(&key, on_data, on_error, options),
            None => self.disabled_subscription(options.unwrap_or_default()),
        }
    }

    fn disabled_subscription(&self, options: SubscribeOptions<V>) -> Subscription<V> {
        Subscription {
            key: None,
            data: options
                .fallback_data
                .or_else(|| self.options.fallback_data.clone()),
            engine: self.clone(),
            on_data: None,
            on_error: None,
            revalidated: None,
            teardowns: Vec::new(),
        }
    }
}

/// A live subscription handed out by [`Swr::subscribe`].
///
/// Dropping it (or calling [`unsubscribe`](Subscription::unsubscribe))
/// removes the listeners and runs the trigger teardowns, exactly once.
pub struct Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    key: Option<String>,
    data: Option<V>,
    engine: Swr<V>,
    on_data: Option<DataListener<V>>,
    on_error: Option<ErrorListener>,
    revalidated: Option<oneshot::Receiver<Result<Option<V>, SwrError>>>,
    teardowns: Vec<Teardown>,
}

impl<V> Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// The key this subscription follows, or `None` when disabled.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The initial value that was delivered when the subscription
    /// started.
    pub fn data(&self) -> Option<&V> {
        self.data.as_ref()
    }

    /// Wait for the start revalidation and return its result.
    ///
    /// Resolves `Ok(None)` when the subscription is disabled, the
    /// start revalidation was turned off, or the result was already
    /// consumed.
    pub async fn revalidated(&mut self) -> Result<Option<V>, SwrError> {
        match self.revalidated.take() {
            Some(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// End the subscription now.
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(key) = self.key.take() {
            if let Some(listener) = self.on_data.take() {
                self.engine.options.cache.unsubscribe(&key, &listener);
            }
            if let Some(listener) = self.on_error.take() {
                self.engine.options.errors.unsubscribe(&key, &listener);
            }
        }
        for teardown in self.teardowns.drain(..) {
            teardown();
        }
    }
}

impl<V> Drop for Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    use crate::fetcher::{Fetcher, fetcher_fn};
    use crate::trigger::manual_trigger;

    fn counting_fetcher(value: &str) -> (Fetcher<String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let value = value.to_string();
        let fetcher = fetcher_fn(move |_key: String| {
            let calls = calls_clone.clone();
            let value = value.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        });
        (fetcher, calls)
    }

    fn engine_with(fetcher: Fetcher<String>) -> Swr<String> {
        Swr::builder().fetcher(fetcher).build()
    }

    #[tokio::test]
    async fn test_revalidate_requires_a_key() {
        let (fetcher, _calls) = counting_fetcher("v");
        let engine = engine_with(fetcher);

        let result = engine.revalidate("", None).await;
        assert!(matches!(result, Err(SwrError::KeyRequired)));
    }

    #[tokio::test]
    async fn test_revalidate_fetches_and_caches() {
        let (fetcher, calls) = counting_fetcher("fetched");
        let engine = engine_with(fetcher);

        let value = engine.revalidate("user:1", None).await.unwrap();
        assert_eq!(value, Some("fetched".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.get("user:1"), Some("fetched".to_string()));
    }

    #[tokio::test]
    async fn test_revalidate_within_window_skips_the_fetch() {
        let (fetcher, calls) = counting_fetcher("fetched");
        let engine = engine_with(fetcher);

        engine.revalidate("user:1", None).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        let value = engine.revalidate("user:1", None).await.unwrap();

        assert_eq!(value, Some("fetched".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_bypasses_the_window() {
        let (fetcher, calls) = counting_fetcher("fetched");
        let engine = engine_with(fetcher);

        engine.revalidate("user:1", None).await.unwrap();
        engine
            .revalidate("user:1", Some(RevalidateOptions::forced()))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_fetcher_reports_an_error() {
        let engine: Swr<String> = Swr::new(SwrOptions::new());

        let errors = Arc::new(AtomicUsize::new(0));
        let errors_clone = errors.clone();
        let listener: ErrorListener = Arc::new(move |_err| {
            errors_clone.fetch_add(1, Ordering::SeqCst);
        });
        engine.errors().subscribe("user:1", listener);

        let result = engine.revalidate("user:1", None).await;
        assert!(matches!(result, Err(SwrError::FetchFailed { .. })));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_drops_the_entry() {
        let fetcher: Fetcher<String> =
            fetcher_fn(|_key: String| async move { Err("origin down".into()) });
        let engine = engine_with(fetcher);

        let result = engine.revalidate("user:1", None).await;
        assert!(result.is_err());

        sleep(Duration::from_millis(20)).await;
        assert!(!engine.cache().has("user:1"));
        assert_eq!(engine.get("user:1"), None);
    }

    #[tokio::test]
    async fn test_mutate_without_follow_up() {
        let (fetcher, calls) = counting_fetcher("fetched");
        let engine = engine_with(fetcher);

        let value = engine
            .mutate("user:1", "written".to_string(), Some(MutateOptions::write_only()))
            .await
            .unwrap();

        assert_eq!(value, Some("written".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.get("user:1"), Some("written".to_string()));
    }

    #[tokio::test]
    async fn test_mutate_follows_up_with_a_fetch() {
        let (fetcher, calls) = counting_fetcher("fresh");
        let engine = engine_with(fetcher);

        let value = engine
            .mutate("user:1", "optimistic".to_string(), None)
            .await
            .unwrap();

        assert_eq!(value, Some("fresh".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutate_prefers_the_replacement_revalidation() {
        let (fetcher, calls) = counting_fetcher("builtin");
        let engine = engine_with(fetcher);

        let replaced = Arc::new(AtomicUsize::new(0));
        let replaced_clone = replaced.clone();
        let options = MutateOptions {
            revalidate_function: Some(Arc::new(move |_key: String| {
                let replaced = replaced_clone.clone();
                async move {
                    replaced.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("replaced".to_string()))
                }
                .boxed()
            })),
            ..MutateOptions::default()
        };

        let value = engine
            .mutate("user:1", "optimistic".to_string(), Some(options))
            .await
            .unwrap();

        assert_eq!(value, Some("replaced".to_string()));
        assert_eq!(replaced.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mutate_with_reads_the_previous_value() {
        let (fetcher, _calls) = counting_fetcher("unused");
        let engine = engine_with(fetcher);

        engine
            .mutate("user:1", "a".to_string(), Some(MutateOptions::write_only()))
            .await
            .unwrap();
        let value = engine
            .mutate_with(
                "user:1",
                |prev| format!("{}b", prev.unwrap_or_default()),
                Some(MutateOptions::write_only()),
            )
            .await
            .unwrap();

        assert_eq!(value, Some("ab".to_string()));
    }

    #[tokio::test]
    async fn test_get_ignores_resolving_items() {
        let engine: Swr<String> = Swr::new(SwrOptions::new());

        engine.cache().set(
            "user:1",
            CacheItem::pending(async {
                sleep(Duration::from_millis(50)).await;
                Some("late".to_string())
            }),
        );

        assert_eq!(engine.get("user:1"), None);
        sleep(Duration::from_millis(80)).await;
        assert_eq!(engine.get("user:1"), Some("late".to_string()));
    }

    #[tokio::test]
    async fn test_get_wait_resolves_with_the_broadcast() {
        let fetcher = fetcher_fn(|_key: String| async move {
            sleep(Duration::from_millis(30)).await;
            Ok("slow".to_string())
        });
        let engine = engine_with(fetcher);

        let waiter = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.get_wait("user:1").await })
        };

        sleep(Duration::from_millis(10)).await;
        engine.revalidate("user:1", None).await.unwrap();

        let value = waiter.await.unwrap().unwrap();
        assert_eq!(value, Some("slow".to_string()));
    }

    #[tokio::test]
    async fn test_get_wait_rejects_on_fetch_failure() {
        let fetcher: Fetcher<String> = fetcher_fn(|_key: String| async move {
            sleep(Duration::from_millis(20)).await;
            Err("origin down".into())
        });
        let engine = engine_with(fetcher);

        let waiter = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.get_wait("user:1").await })
        };

        sleep(Duration::from_millis(10)).await;
        let _ = engine.revalidate("user:1", None).await;

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(SwrError::FetchFailed { .. })));
    }

    #[tokio::test]
    async fn test_get_wait_short_circuits_on_cached_value() {
        let (fetcher, _calls) = counting_fetcher("unused");
        let engine = engine_with(fetcher);

        engine
            .mutate("user:1", "here".to_string(), Some(MutateOptions::write_only()))
            .await
            .unwrap();

        let value = engine.get_wait("user:1").await.unwrap();
        assert_eq!(value, Some("here".to_string()));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_and_broadcast() {
        let (fetcher, _calls) = counting_fetcher("fresh");
        let engine = engine_with(fetcher);

        engine
            .mutate("user:1", "cached".to_string(), Some(MutateOptions::write_only()))
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let listener: DataListener<String> = Arc::new(move |value| {
            seen_clone.lock().unwrap().push(value);
        });

        let mut subscription = engine.subscribe("user:1", Some(listener), None, None);
        assert_eq!(subscription.data(), Some(&"cached".to_string()));

        // The cached value arrived synchronously, before any broadcast.
        assert_eq!(
            seen.lock().unwrap().first(),
            Some(&Some("cached".to_string()))
        );

        let revalidated = subscription.revalidated().await.unwrap();
        assert_eq!(revalidated, Some("fresh".to_string()));

        sleep(Duration::from_millis(20)).await;
        assert!(
            seen.lock()
                .unwrap()
                .contains(&Some("fresh".to_string()))
        );

        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (fetcher, _calls) = counting_fetcher("fresh");
        let engine = engine_with(fetcher);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let listener: DataListener<String> = Arc::new(move |value| {
            seen_clone.lock().unwrap().push(value);
        });

        let subscription = engine.subscribe(
            "user:1",
            Some(listener),
            None,
            Some(SubscribeOptions {
                revalidate_on_start: Some(false),
                ..SubscribeOptions::default()
            }),
        );
        subscription.unsubscribe();

        engine
            .mutate("user:1", "later".to_string(), Some(MutateOptions::write_only()))
            .await
            .unwrap();
        sleep(Duration::from_millis(20)).await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_serves_fallback_data() {
        let (fetcher, _calls) = counting_fetcher("unused");
        let engine = engine_with(fetcher);

        let subscription = engine.subscribe(
            "user:1",
            None,
            None,
            Some(SubscribeOptions {
                fallback_data: Some("fallback".to_string()),
                load_initial_cache: Some(false),
                revalidate_on_start: Some(false),
                ..SubscribeOptions::default()
            }),
        );

        assert_eq!(subscription.data(), Some(&"fallback".to_string()));
    }

    #[tokio::test]
    async fn test_cache_miss_does_not_fall_back_while_loading_initial_cache() {
        let (fetcher, _calls) = counting_fetcher("unused");
        let engine = engine_with(fetcher);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let listener: DataListener<String> = Arc::new(move |value| {
            seen_clone.lock().unwrap().push(value);
        });

        let subscription = engine.subscribe(
            "user:1",
            Some(listener),
            None,
            Some(SubscribeOptions {
                fallback_data: Some("fallback".to_string()),
                load_initial_cache: Some(true),
                revalidate_on_start: Some(false),
                ..SubscribeOptions::default()
            }),
        );

        // Nothing is cached, so nothing is delivered.
        assert_eq!(subscription.data(), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_with_disabled_key() {
        let (fetcher, calls) = counting_fetcher("unused");
        let engine = engine_with(fetcher);

        let mut subscription =
            engine.subscribe_with(|| None, None, None, None);

        assert_eq!(subscription.key(), None);
        assert_eq!(subscription.revalidated().await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_focus_trigger_revalidates() {
        let (fetcher, calls) = counting_fetcher("fresh");
        let (installer, handle) = manual_trigger();

        let engine: Swr<String> = Swr::builder()
            .fetcher(fetcher)
            .focus_when(installer)
            .revalidate_on_start(false)
            .deduping_interval(0)
            .build();

        let subscription = engine.subscribe("user:1", None, None, None);
        assert_eq!(handle.installed_count(), 1);

        handle.fire();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Within the focus throttle window nothing new is issued.
        handle.fire();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        assert_eq!(handle.installed_count(), 0);
    }
}
