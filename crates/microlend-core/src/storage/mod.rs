//! Persistence adapter
//!
//! Durable key-value storage that survives process restarts. Stores use it to
//! rehydrate a declared subset of their state (the auth session, UI
//! preferences); it never holds full store state.
//!
//! ## Layout
//!
//! `FilePersistence` keeps one JSON file per key in the state directory:
//!
//! - `auth-storage.json` - signed-in user snapshot
//! - `ui-storage.json` - language and theme
//!
//! Values are wrapped in a versioned envelope (`{"state": ..., "version": N}`)
//! so a format change can be detected and discarded on load.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{
    atomic_write, load_persisted, save_persisted, FilePersistence, MemoryPersistence,
    PersistedEnvelope, PersistenceAdapter,
};
