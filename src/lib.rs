//! swr-engine - A stale-while-revalidate (SWR) data layer for Rust
//!
//! This library keeps remote data in a local cache with:
//! - Stale-while-revalidate (SWR) semantics
//! - Deduplication of concurrent fetches per key
//! - Per-key subscriptions notified on every refresh
//! - Pluggable stores, including a JSON-file mirrored one
//!
//! Engine and store operations schedule background work with Tokio, so
//! they expect a running Tokio runtime.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swr_engine::{DataListener, Swr, http_fetcher};
//!
//! #[derive(Clone, serde::Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine: Swr<User> = Swr::builder()
//!         .fetcher(http_fetcher())
//!         .build();
//!
//!     // Deliver the cached user right away and every refresh after
//!     let on_data: DataListener<User> = Arc::new(|user| {
//!         if let Some(user) = user {
//!             println!("user is now {}", user.name);
//!         }
//!     });
//!     let subscription = engine.subscribe(
//!         "https://api.example.com/user/1",
//!         Some(on_data),
//!         None,
//!         None,
//!     );
//!
//!     // Optimistic local write with a follow-up refetch
//!     engine
//!         .mutate("https://api.example.com/user/1", User { name: "Ada".into() }, None)
//!         .await
//!         .unwrap();
//!
//!     subscription.unsubscribe();
//! }
//! ```

mod builder;
mod bus;
mod error;
mod fetcher;
mod item;
mod options;
mod store;
pub mod stores;
mod swr;
mod trigger;
mod utils;

// Re-export public API
pub use builder::SwrBuilder;
pub use bus::{EventBus, Listener};
pub use error::{BoxError, SwrError};
pub use fetcher::{Fetcher, fetcher_fn, http_fetcher};
pub use item::{CacheItem, ItemData, PendingValue};
pub use options::{
    ErrorListener, MutateOptions, RevalidateFn, RevalidateOptions, SubscribeOptions, SwrOptions,
};
pub use store::{CacheStore, ClearOptions, DataListener, RemoveOptions};
pub use stores::memory::MemoryStore;
pub use stores::persistent::{JsonFileBackend, MirrorBackend, PersistedEntry, PersistentStore};
pub use swr::{Subscription, Swr};
pub use trigger::{
    Notify, Teardown, TriggerConfig, TriggerHandle, TriggerInstaller, manual_trigger, noop_trigger,
};
