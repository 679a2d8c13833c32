use std::sync::{Arc, Mutex};

use statesync_core::{HostContainer, Listener, ModuleStore, Mutation, StateValue, Unsubscribe};

use super::{set_path, ListenerSet};

/// In-memory container with namespaced modules and committed mutations.
///
/// Only [`ModuleStore::commit`] notifies subscribers; replacing the state or
/// (un)registering a module does not.
pub struct MemoryModuleStore {
    state: Mutex<StateValue>,
    listeners: ListenerSet,
}

impl MemoryModuleStore {
    pub fn new(initial: StateValue) -> Self {
        Self {
            state: Mutex::new(initial),
            listeners: ListenerSet::default(),
        }
    }

    /// Commit a generic `set` mutation writing `value` at `path`.
    pub fn set(&self, path: &[&str], value: StateValue) {
        self.commit(Mutation::new("set", path, value));
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut StateValue) -> R) -> R {
        let mut state = self.state.lock().expect("module store poisoned");
        f(&mut state)
    }
}

impl Default for MemoryModuleStore {
    fn default() -> Self {
        Self::new(StateValue::object())
    }
}

impl ModuleStore for MemoryModuleStore {
    fn state(&self) -> StateValue {
        self.with_state(|state| state.clone())
    }

    fn replace_state(&self, state: StateValue) {
        self.with_state(|current| *current = state);
    }

    fn has_module(&self, namespace: &str) -> bool {
        self.with_state(|state| state.get(namespace).is_some())
    }

    fn register_module(&self, namespace: &str, initial: StateValue) {
        self.with_state(|state| set_path(state, &[namespace.to_string()], initial));
    }

    fn unregister_module(&self, namespace: &str) {
        self.with_state(|state| {
            if let Some(entries) = state.as_object_mut() {
                entries.remove(namespace);
            }
        });
    }

    fn commit(&self, mutation: Mutation) {
        self.with_state(|state| set_path(state, &mutation.path, mutation.payload.clone()));
        self.listeners.notify(&mutation);
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.listeners.add(listener)
    }
}

impl HostContainer for MemoryModuleStore {
    fn module_store(self: Arc<Self>) -> Option<Arc<dyn ModuleStore>> {
        Some(self)
    }
}
