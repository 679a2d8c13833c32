//! Normalizes the supported container shapes behind one [`StoreAdapter`] contract.
//!
//! The variant is chosen once by [`probe_adapter`], richest shape first.

mod generic;
mod module;
mod observable;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use statesync_core::{
    HostContainer, Listener, Mutation, SaveStatus, StateValue, SyncError, Unsubscribe,
};
use tracing::debug;

pub use generic::GenericStoreAdapter;
pub use module::ModuleStoreAdapter;
pub use observable::ObservableStoreAdapter;

/// State key reserved for the engine's own bookkeeping (the mirrored save status).
pub const BOOKKEEPING_NAMESPACE: &str = "__statesync";

/// Field of the bookkeeping namespace holding the mirrored status.
pub const STATUS_FIELD: &str = "saveStatus";

/// Callback invoked when the container reports a mutation it did not get from the engine.
pub type MutationCallback = Arc<dyn Fn() + Send + Sync>;

/// Uniform view of a host container.
pub trait StoreAdapter: Send + Sync {
    /// Short name of the variant, for logs.
    fn kind(&self) -> &'static str;

    /// Install the bookkeeping namespace. Re-running it on an initialized container is a no-op.
    fn setup(&self);

    /// Full state without the bookkeeping namespace.
    fn get_state(&self) -> StateValue;

    /// Merge `state` over the current state, keeping the bookkeeping namespace.
    fn replace_state(&self, state: StateValue);

    /// Mirror the save status into the container, for display only.
    fn update_save_status(&self, status: SaveStatus);

    /// Report container mutations, except those caused by [`StoreAdapter::update_save_status`].
    fn subscribe(&self, on_mutation: MutationCallback) -> Unsubscribe;

    /// Remove the bookkeeping namespace.
    fn destroy(&self);
}

/// Select the adapter for `host` by probing its capabilities.
pub fn probe_adapter(host: Arc<dyn HostContainer>) -> Result<Arc<dyn StoreAdapter>, SyncError> {
    if let Some(store) = Arc::clone(&host).module_store() {
        debug!("Container offers module store capabilities");
        return Ok(Arc::new(ModuleStoreAdapter::new(store)));
    }
    if let Some(store) = Arc::clone(&host).observable_store() {
        debug!("Container offers observable store capabilities");
        return Ok(Arc::new(ObservableStoreAdapter::new(store)));
    }
    if let Some(store) = host.generic_store() {
        debug!("Container offers generic store functions");
        return Ok(Arc::new(GenericStoreAdapter::new(store)?));
    }
    Err(SyncError::Configuration(
        "unsupported container: it exposes no module store, observable store or generic functions"
            .to_string(),
    ))
}

/// Threads currently inside an engine-originated container write.
///
/// Containers notify subscribers synchronously from inside the write, so a
/// notification delivered on a marked thread was raised by that write. A host
/// mutation arriving on another thread at the same moment is never mistaken
/// for it.
#[derive(Debug, Clone, Default)]
pub(crate) struct WriteMarks {
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl WriteMarks {
    pub(crate) fn write<R>(&self, f: impl FnOnce() -> R) -> R {
        let id = thread::current().id();
        self.threads.lock().expect("write marks poisoned").push(id);
        let _unmark = Unmark {
            threads: &self.threads,
            id,
        };
        f()
    }

    /// Whether the calling thread is inside [`Self::write`].
    pub(crate) fn on_current_thread(&self) -> bool {
        let id = thread::current().id();
        self.threads
            .lock()
            .expect("write marks poisoned")
            .contains(&id)
    }
}

struct Unmark<'a> {
    threads: &'a Mutex<Vec<ThreadId>>,
    id: ThreadId,
}

impl Drop for Unmark<'_> {
    fn drop(&mut self) {
        if let Ok(mut threads) = self.threads.lock() {
            if let Some(position) = threads.iter().position(|id| *id == self.id) {
                threads.swap_remove(position);
            }
        }
    }
}

/// Hides the adapter's own status-mirror writes from its subscription.
#[derive(Debug, Clone, Default)]
pub(crate) struct StatusWriteGuard {
    marks: WriteMarks,
}

impl StatusWriteGuard {
    pub(crate) fn write(&self, f: impl FnOnce()) {
        self.marks.write(f);
    }

    /// Wrap `on_mutation` so it ignores the notifications raised by [`Self::write`].
    ///
    /// Only mutations on the writing thread that touch the bookkeeping
    /// namespace (or carry no path) are dropped.
    pub(crate) fn filter(&self, on_mutation: MutationCallback) -> Listener {
        let marks = self.marks.clone();
        Arc::new(move |mutation: &Mutation| {
            let own_key = mutation
                .root_key()
                .map_or(true, |key| key == BOOKKEEPING_NAMESPACE);
            if !(own_key && marks.on_current_thread()) {
                on_mutation();
            }
        })
    }
}

/// Initial content of the bookkeeping namespace.
pub(crate) fn bookkeeping(status: SaveStatus) -> StateValue {
    let mut namespace = BTreeMap::new();
    namespace.insert(STATUS_FIELD.to_string(), StateValue::from(status.as_str()));
    StateValue::Object(namespace)
}

/// `state` with the bookkeeping namespace removed.
pub(crate) fn strip_bookkeeping(mut state: StateValue) -> StateValue {
    if let Some(entries) = state.as_object_mut() {
        entries.remove(BOOKKEEPING_NAMESPACE);
    }
    state
}

/// Read the mirrored status back from a raw container state.
pub fn mirrored_status(raw_state: &StateValue) -> Option<SaveStatus> {
    raw_state
        .get(BOOKKEEPING_NAMESPACE)?
        .get(STATUS_FIELD)?
        .as_str()
        .and_then(SaveStatus::parse)
}
