use std::sync::{Arc, Mutex};

use statesync_core::{
    HostContainer, Listener, Mutation, ObservableStore, StateValue, Unsubscribe,
};

use super::ListenerSet;

/// In-memory snapshot/patch container. Every patch or removal notifies subscribers.
pub struct MemoryObservableStore {
    state: Mutex<StateValue>,
    listeners: ListenerSet,
}

impl MemoryObservableStore {
    pub fn new(initial: StateValue) -> Self {
        Self {
            state: Mutex::new(initial),
            listeners: ListenerSet::default(),
        }
    }

    /// Patch a single top-level key.
    pub fn set(&self, key: &str, value: StateValue) {
        self.patch(std::iter::once((key.to_string(), value)).collect());
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for MemoryObservableStore {
    fn default() -> Self {
        Self::new(StateValue::object())
    }
}

impl ObservableStore for MemoryObservableStore {
    fn snapshot(&self) -> StateValue {
        self.state.lock().expect("observable store poisoned").clone()
    }

    fn patch(&self, patch: StateValue) {
        let keys: Vec<String> = patch
            .as_object()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        self.state
            .lock()
            .expect("observable store poisoned")
            .merge(patch.clone());
        self.listeners.notify(&Mutation {
            name: "patch".to_string(),
            path: keys,
            payload: patch,
        });
    }

    fn remove(&self, key: &str) {
        let removed = self
            .state
            .lock()
            .expect("observable store poisoned")
            .as_object_mut()
            .and_then(|entries| entries.remove(key));
        if removed.is_some() {
            self.listeners
                .notify(&Mutation::new("remove", &[key], StateValue::Null));
        }
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.listeners.add(listener)
    }
}

impl HostContainer for MemoryObservableStore {
    fn observable_store(self: Arc<Self>) -> Option<Arc<dyn ObservableStore>> {
        Some(self)
    }
}
