use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::error::BoxError;

/// A fetcher resolves a key to a fresh value.
///
/// Fetchers are shared across revalidations and invoked with the key
/// being revalidated.
pub type Fetcher<V> =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<V, BoxError>> + Send + Sync>;

/// Wrap an async closure as a [`Fetcher`].
///
/// # Example
/// ```ignore
/// let fetcher = fetcher_fn(|key: String| async move {
///     Ok(lookup(&key).await?)
/// });
/// ```
pub fn fetcher_fn<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
{
    Arc::new(move |key| f(key).boxed())
}

/// The default fetcher: treat the key as a URL, GET it and parse the
/// JSON body.
///
/// Non-2xx responses fail the fetch.
pub fn http_fetcher<V>() -> Fetcher<V>
where
    V: DeserializeOwned + Send + 'static,
{
    let client = reqwest::Client::new();
    Arc::new(move |key: String| {
        let client = client.clone();
        async move {
            let response = client.get(&key).send().await?;
            let value = response.error_for_status()?.json::<V>().await?;
            Ok(value)
        }
        .boxed()
    })
}
