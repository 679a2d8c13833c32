use std::sync::Arc;

use statesync_core::{ModuleStore, Mutation, SaveStatus, StateValue, Unsubscribe};
use tracing::debug;

use super::{
    bookkeeping, strip_bookkeeping, MutationCallback, StatusWriteGuard, StoreAdapter,
    BOOKKEEPING_NAMESPACE, STATUS_FIELD,
};

/// Name of the mutation committed to mirror the save status.
pub const SET_STATUS_MUTATION: &str = "statesync/setSaveStatus";

/// Adapter for containers with namespaced modules and committed mutations.
///
/// The bookkeeping namespace is registered as its own module.
pub struct ModuleStoreAdapter {
    store: Arc<dyn ModuleStore>,
    guard: StatusWriteGuard,
}

impl ModuleStoreAdapter {
    pub fn new(store: Arc<dyn ModuleStore>) -> Self {
        Self {
            store,
            guard: StatusWriteGuard::default(),
        }
    }
}

impl StoreAdapter for ModuleStoreAdapter {
    fn kind(&self) -> &'static str {
        "module"
    }

    fn setup(&self) {
        if self.store.has_module(BOOKKEEPING_NAMESPACE) {
            debug!("Bookkeeping module already registered");
            return;
        }
        self.store
            .register_module(BOOKKEEPING_NAMESPACE, bookkeeping(SaveStatus::Saved));
    }

    fn get_state(&self) -> StateValue {
        strip_bookkeeping(self.store.state())
    }

    fn replace_state(&self, state: StateValue) {
        let mut merged = self.store.state();
        let bookkeeping = merged
            .get(BOOKKEEPING_NAMESPACE)
            .cloned()
            .unwrap_or_else(|| bookkeeping(SaveStatus::Saved));
        merged.merge(strip_bookkeeping(state));
        if let Some(entries) = merged.as_object_mut() {
            entries.insert(BOOKKEEPING_NAMESPACE.to_string(), bookkeeping);
        }
        self.store.replace_state(merged);
    }

    fn update_save_status(&self, status: SaveStatus) {
        self.guard.write(|| {
            self.store.commit(Mutation::new(
                SET_STATUS_MUTATION,
                &[BOOKKEEPING_NAMESPACE, STATUS_FIELD],
                StateValue::from(status.as_str()),
            ))
        });
    }

    fn subscribe(&self, on_mutation: MutationCallback) -> Unsubscribe {
        self.store.subscribe(self.guard.filter(on_mutation))
    }

    fn destroy(&self) {
        self.store.unregister_module(BOOKKEEPING_NAMESPACE);
    }
}
