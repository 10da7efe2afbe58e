//! Store implementations for the engine.

pub mod memory;
pub mod persistent;

pub use memory::MemoryStore;
pub use persistent::{JsonFileBackend, MirrorBackend, PersistedEntry, PersistentStore};
