use std::sync::Arc;

use statesync_core::{GenericStore, SaveStatus, StateValue, SyncError, Unsubscribe};

use super::{strip_bookkeeping, MutationCallback, StatusWriteGuard, StoreAdapter};

/// Adapter proxying to the four functions of a [`GenericStore`].
#[derive(Debug)]
pub struct GenericStoreAdapter {
    store: Arc<GenericStore>,
    guard: StatusWriteGuard,
}

impl GenericStoreAdapter {
    /// Fails when any of the four functions is missing.
    pub fn new(store: Arc<GenericStore>) -> Result<Self, SyncError> {
        let missing = store.missing();
        if !missing.is_empty() {
            return Err(SyncError::Configuration(format!(
                "generic container is missing: {}",
                missing.join(", ")
            )));
        }
        Ok(Self {
            store,
            guard: StatusWriteGuard::default(),
        })
    }
}

impl StoreAdapter for GenericStoreAdapter {
    fn kind(&self) -> &'static str {
        "generic"
    }

    fn setup(&self) {}

    fn get_state(&self) -> StateValue {
        self.store
            .get_state
            .as_ref()
            .map(|get_state| strip_bookkeeping(get_state()))
            .unwrap_or_else(StateValue::object)
    }

    fn replace_state(&self, state: StateValue) {
        if let Some(replace_state) = &self.store.replace_state {
            replace_state(strip_bookkeeping(state));
        }
    }

    fn update_save_status(&self, status: SaveStatus) {
        if let Some(update) = &self.store.update_save_status {
            self.guard.write(|| update(status));
        }
    }

    fn subscribe(&self, on_mutation: MutationCallback) -> Unsubscribe {
        match &self.store.subscribe {
            Some(subscribe) => subscribe(self.guard.filter(on_mutation)),
            None => Unsubscribe::noop(),
        }
    }

    fn destroy(&self) {}
}
