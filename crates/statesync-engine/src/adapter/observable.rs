use std::sync::Arc;

use statesync_core::{ObservableStore, SaveStatus, StateValue, Unsubscribe};

use super::{
    bookkeeping, strip_bookkeeping, MutationCallback, StatusWriteGuard, StoreAdapter,
    BOOKKEEPING_NAMESPACE,
};

/// Adapter for snapshot/patch containers. The bookkeeping namespace is a plain top-level key.
pub struct ObservableStoreAdapter {
    store: Arc<dyn ObservableStore>,
    guard: StatusWriteGuard,
}

impl ObservableStoreAdapter {
    pub fn new(store: Arc<dyn ObservableStore>) -> Self {
        Self {
            store,
            guard: StatusWriteGuard::default(),
        }
    }

    fn patch_status(&self, status: SaveStatus) {
        let patch: StateValue = std::iter::once((
            BOOKKEEPING_NAMESPACE.to_string(),
            bookkeeping(status),
        ))
        .collect();
        self.guard.write(|| self.store.patch(patch));
    }
}

impl StoreAdapter for ObservableStoreAdapter {
    fn kind(&self) -> &'static str {
        "observable"
    }

    fn setup(&self) {
        if self.store.snapshot().get(BOOKKEEPING_NAMESPACE).is_none() {
            self.patch_status(SaveStatus::Saved);
        }
    }

    fn get_state(&self) -> StateValue {
        strip_bookkeeping(self.store.snapshot())
    }

    fn replace_state(&self, state: StateValue) {
        // A shallow patch leaves the namespace alone as long as the patch does not carry it.
        self.store.patch(strip_bookkeeping(state));
    }

    fn update_save_status(&self, status: SaveStatus) {
        self.patch_status(status);
    }

    fn subscribe(&self, on_mutation: MutationCallback) -> Unsubscribe {
        self.store.subscribe(self.guard.filter(on_mutation))
    }

    fn destroy(&self) {
        self.guard.write(|| self.store.remove(BOOKKEEPING_NAMESPACE));
    }
}
