//! Durable mirror over the in-memory store.
//!
//! A `PersistentStore` serves everything from an inner [`MemoryStore`]
//! and mirrors settled entries to a [`MirrorBackend`] in the
//! background. At construction it hydrates the memory side from
//! whatever the backend still holds, so previously cached values are
//! served (stale) across restarts until their first revalidation.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{BoxError, SwrError};
use crate::item::{CacheItem, ItemData};
use crate::store::{CacheStore, ClearOptions, DataListener, RemoveOptions};
use crate::stores::memory::MemoryStore;

/// Prefix applied to keys in durable storage.
const KEY_PREFIX: &str = "swr:";

/// Wire shape of a persisted entry.
///
/// Pending items are never persisted; only settled values reach the
/// backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry<V> {
    /// The settled value.
    pub data: V,
    /// Expiration horizon of the entry, if it had one.
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<i64>,
}

/// The durable side of a [`PersistentStore`].
#[async_trait]
pub trait MirrorBackend<V>: Send + Sync {
    /// Load every persisted entry.
    async fn load(&self) -> Result<Vec<(String, PersistedEntry<V>)>, BoxError>;

    /// Write one entry, replacing a previous one under the same key.
    async fn write(&self, key: &str, entry: PersistedEntry<V>) -> Result<(), BoxError>;

    /// Delete the entry under `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), BoxError>;

    /// Delete every persisted entry.
    async fn clear(&self) -> Result<(), BoxError>;
}

/// In-flight mirror operations, one ticket per key. A mirror task
/// commits to the backend only while its ticket is still the latest
/// for the key.
struct MirrorState {
    tickets: RwLock<HashMap<String, u64>>,
    next: AtomicU64,
}

impl MirrorState {
    fn issue(&self, key: &str) -> u64 {
        let ticket = self.next.fetch_add(1, Ordering::SeqCst);
        let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
        tickets.insert(key.to_string(), ticket);
        ticket
    }

    fn is_current(&self, key: &str, ticket: u64) -> bool {
        let tickets = self.tickets.read().unwrap_or_else(PoisonError::into_inner);
        tickets.get(key) == Some(&ticket)
    }

    fn finish(&self, key: &str, ticket: u64) {
        let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
        if tickets.get(key) == Some(&ticket) {
            tickets.remove(key);
        }
    }

    fn supersede_all(&self) {
        let mut tickets = self.tickets.write().unwrap_or_else(PoisonError::into_inner);
        tickets.clear();
    }
}

/// Store that mirrors settled entries to durable local storage.
///
/// Serving is entirely memory-backed; backend failures are logged and
/// never reach callers.
pub struct PersistentStore<V>
where
    V: Clone + Send + Sync,
{
    memory: MemoryStore<V>,
    backend: Arc<dyn MirrorBackend<V>>,
    mirror: Arc<MirrorState>,
}

impl<V> Clone for PersistentStore<V>
where
    V: Clone + Send + Sync,
{
    fn clone(&self) -> Self {
        PersistentStore {
            memory: self.memory.clone(),
            backend: Arc::clone(&self.backend),
            mirror: Arc::clone(&self.mirror),
        }
    }
}

impl<V> PersistentStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store over `backend`, hydrating the memory side from
    /// its persisted entries.
    ///
    /// # Arguments
    /// * `backend` - The durable backend to hydrate from and mirror to
    ///
    /// # Example
    /// ```ignore
    /// let backend = Arc::new(JsonFileBackend::new("/var/lib/app/swr.json"));
    /// let store: PersistentStore<User> = PersistentStore::new(backend).await?;
    /// ```
    pub async fn new(backend: Arc<dyn MirrorBackend<V>>) -> Result<Self, SwrError> {
        let store = PersistentStore {
            memory: MemoryStore::new(),
            backend,
            mirror: Arc::new(MirrorState {
                tickets: RwLock::new(HashMap::new()),
                next: AtomicU64::new(0),
            }),
        };

        let entries = store.backend.load().await.map_err(|e| {
            SwrError::persistence(format!("failed to load persisted entries: {}", e))
        })?;

        for (key, entry) in entries {
            // Hydration touches the memory side only; nothing is
            // echoed back to the backend.
            store.memory.set(
                &key,
                CacheItem {
                    data: ItemData::Ready(entry.data),
                    expires_at: entry.expires_at,
                },
            );
        }

        Ok(store)
    }

    /// Get a reference to the durable backend.
    pub fn backend(&self) -> &Arc<dyn MirrorBackend<V>> {
        &self.backend
    }
}

impl<V> CacheStore<V> for PersistentStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "persistent"
    }

    fn get(&self, key: &str) -> Option<CacheItem<V>> {
        self.memory.get(key)
    }

    fn set(&self, key: &str, item: CacheItem<V>) {
        let ticket = self.mirror.issue(key);
        self.memory.set(key, item.clone());

        let backend = Arc::clone(&self.backend);
        let mirror = Arc::clone(&self.mirror);
        let key = key.to_string();
        tokio::spawn(async move {
            let expires_at = item.expires_at;
            let outcome = item.settled().await;

            if !mirror.is_current(&key, ticket) {
                return;
            }

            let result = match outcome {
                Some(data) => backend.write(&key, PersistedEntry { data, expires_at }).await,
                None => backend.delete(&key).await,
            };
            if let Err(e) = result {
                tracing::warn!("Failed to mirror entry: key={}, error={}", key, e);
            }
            mirror.finish(&key, ticket);
        });
    }

    fn remove(&self, key: &str, options: RemoveOptions) {
        let ticket = self.mirror.issue(key);
        self.memory.remove(key, options);

        let backend = Arc::clone(&self.backend);
        let mirror = Arc::clone(&self.mirror);
        let key = key.to_string();
        tokio::spawn(async move {
            if !mirror.is_current(&key, ticket) {
                return;
            }
            if let Err(e) = backend.delete(&key).await {
                tracing::warn!("Failed to mirror removal: key={}, error={}", key, e);
            }
            mirror.finish(&key, ticket);
        });
    }

    fn clear(&self, options: ClearOptions) {
        self.mirror.supersede_all();
        self.memory.clear(options);

        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.clear().await {
                tracing::warn!("Failed to clear durable storage: error={}", e);
            }
        });
    }

    fn has(&self, key: &str) -> bool {
        self.memory.has(key)
    }

    fn subscribe(&self, key: &str, listener: DataListener<V>) {
        self.memory.subscribe(key, listener);
    }

    fn unsubscribe(&self, key: &str, listener: &DataListener<V>) {
        self.memory.unsubscribe(key, listener);
    }

    fn broadcast(&self, key: &str, value: Option<V>) {
        self.memory.broadcast(key, value);
    }
}

/// Backend keeping every entry in one JSON document on disk.
///
/// Keys are stored under the `swr:` prefix. Operations are serialized
/// through an internal lock, read-modify-write.
pub struct JsonFileBackend<V> {
    path: PathBuf,
    io: tokio::sync::Mutex<()>,
    _marker: PhantomData<V>,
}

impl<V> JsonFileBackend<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    /// Create a backend storing its document at `path`.
    ///
    /// The file and its parent directory are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileBackend {
            path: path.into(),
            io: tokio::sync::Mutex::new(()),
            _marker: PhantomData,
        }
    }

    async fn read_document(&self) -> Result<HashMap<String, PersistedEntry<V>>, BoxError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(
        &self,
        document: &HashMap<String, PersistedEntry<V>>,
    ) -> Result<(), BoxError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl<V> MirrorBackend<V> for JsonFileBackend<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> Result<Vec<(String, PersistedEntry<V>)>, BoxError> {
        let _io = self.io.lock().await;
        let document = self.read_document().await?;

        Ok(document
            .into_iter()
            .filter_map(|(key, entry)| {
                key.strip_prefix(KEY_PREFIX)
                    .map(|k| (k.to_string(), entry))
            })
            .collect())
    }

    async fn write(&self, key: &str, entry: PersistedEntry<V>) -> Result<(), BoxError> {
        let _io = self.io.lock().await;
        let mut document = self.read_document().await?;
        document.insert(format!("{}{}", KEY_PREFIX, key), entry);
        self.write_document(&document).await
    }

    async fn delete(&self, key: &str) -> Result<(), BoxError> {
        let _io = self.io.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(&format!("{}{}", KEY_PREFIX, key)).is_some() {
            self.write_document(&document).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), BoxError> {
        let _io = self.io.lock().await;
        let mut document = self.read_document().await?;
        document.retain(|key, _| !key.starts_with(KEY_PREFIX));
        self.write_document(&document).await
    }
}
