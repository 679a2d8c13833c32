//! Keeps a host container synchronized with a single JSON file of a remote
//! project-file service.
//!
//! - `retry`: bounded retry with exponential backoff around every remote call
//! - `adapter`: one `StoreAdapter` per supported container shape, chosen by probing
//! - `store`: in-memory containers implementing those shapes
//! - `locator`: resolves, and provisions on first use, the file behind a logical key
//! - `engine`: the `SyncEngine` orchestrator (status machine, single-flight save, autosave)

pub mod adapter;
pub mod config;
pub mod engine;
pub mod locator;
pub mod retry;
pub mod store;

pub use adapter::{probe_adapter, StoreAdapter, BOOKKEEPING_NAMESPACE};
pub use config::{EngineConfig, RetryPolicy, UserMigration};
pub use engine::{SaveOutcome, SyncEngine};
pub use locator::FileLocator;
pub use store::{MemoryModuleStore, MemoryObservableStore};
