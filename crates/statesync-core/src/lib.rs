//! Core traits and types for statesync.
//!
//! This crate defines the abstractions shared between the sync engine and its collaborators:
//! - `StateValue`: the in-memory value model of a synchronized container
//! - `codec`: lossless conversion between `StateValue` and a JSON wire document
//! - `ProjectFileClient`: the remote project-file service
//! - `HostContainer`: capability probes for the supported container shapes
//! - `UiHooks`: optional notification, busy-indicator, veto and file-picker surface

pub mod codec;
mod container;
mod error;
mod hooks;
mod remote;
mod status;
mod value;

pub use container::{
    GenericStore, GetStateFn, HostContainer, Listener, ModuleStore, Mutation, ObservableStore,
    ReplaceStateFn, SubscribeFn, Unsubscribe, UpdateStatusFn,
};
pub use error::{SyncError, SyncResult};
pub use hooks::{NoopHooks, Notice, NoticeLevel, SaveVerdict, UiHooks};
pub use remote::{FileMetadata, ProjectFileClient};
pub use status::SaveStatus;
pub use value::StateValue;
