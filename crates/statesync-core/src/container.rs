//! Host container capabilities.
//!
//! The engine does not know the concrete container type. It probes a
//! [`HostContainer`] for the richest shape it supports, in this order:
//! - [`ModuleStore`]: namespaced modules and named, committed mutations
//! - [`ObservableStore`]: snapshot, shallow patch and change listeners
//! - [`GenericStore`]: four user-supplied functions

use std::fmt;
use std::sync::Arc;

use crate::status::SaveStatus;
use crate::value::StateValue;

/// A committed change, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Mutation name, e.g. `words/add`
    pub name: String,
    /// Key path the mutation writes to, starting at the state root
    pub path: Vec<String>,
    pub payload: StateValue,
}

impl Mutation {
    pub fn new(name: impl Into<String>, path: &[&str], payload: StateValue) -> Self {
        Self {
            name: name.into(),
            path: path.iter().map(|segment| segment.to_string()).collect(),
            payload,
        }
    }

    /// Top-level key touched by the mutation, if any.
    pub fn root_key(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }
}

/// Callback invoked for every committed mutation.
pub type Listener = Arc<dyn Fn(&Mutation) + Send + Sync>;

/// Subscription handle. Dropping it (or calling [`Unsubscribe::unsubscribe`])
/// detaches the listener.
#[must_use = "dropping the handle detaches the listener immediately"]
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send + Sync>>);

impl Unsubscribe {
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self(Some(Box::new(detach)))
    }

    /// A handle with nothing to detach.
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.0.take() {
            detach();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(detach) = self.0.take() {
            detach();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("attached", &self.0.is_some())
            .finish()
    }
}

/// Container changed only through committed mutations, with namespaced modules.
pub trait ModuleStore: Send + Sync {
    /// Full root state, module namespaces included.
    fn state(&self) -> StateValue;

    /// Replace the whole root state.
    fn replace_state(&self, state: StateValue);

    fn has_module(&self, namespace: &str) -> bool;

    /// Register a module namespace with its initial state.
    fn register_module(&self, namespace: &str, initial: StateValue);

    fn unregister_module(&self, namespace: &str);

    /// Apply a mutation and notify subscribers.
    fn commit(&self, mutation: Mutation);

    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// Container exposing a snapshot, a shallow patch and change listeners.
pub trait ObservableStore: Send + Sync {
    fn snapshot(&self) -> StateValue;

    /// Shallow-merge the top-level keys of `patch` into the state.
    fn patch(&self, patch: StateValue);

    /// Drop a top-level key.
    fn remove(&self, key: &str);

    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

pub type GetStateFn = Box<dyn Fn() -> StateValue + Send + Sync>;
pub type ReplaceStateFn = Box<dyn Fn(StateValue) + Send + Sync>;
pub type UpdateStatusFn = Box<dyn Fn(SaveStatus) + Send + Sync>;
pub type SubscribeFn = Box<dyn Fn(Listener) -> Unsubscribe + Send + Sync>;

/// Any container, adapted through four user-supplied functions.
///
/// Missing functions are reported when the engine is constructed, not when
/// they would be called.
#[derive(Default)]
pub struct GenericStore {
    pub get_state: Option<GetStateFn>,
    pub replace_state: Option<ReplaceStateFn>,
    pub update_save_status: Option<UpdateStatusFn>,
    pub subscribe: Option<SubscribeFn>,
}

impl GenericStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get_state(mut self, f: impl Fn() -> StateValue + Send + Sync + 'static) -> Self {
        self.get_state = Some(Box::new(f));
        self
    }

    pub fn with_replace_state(mut self, f: impl Fn(StateValue) + Send + Sync + 'static) -> Self {
        self.replace_state = Some(Box::new(f));
        self
    }

    pub fn with_update_save_status(
        mut self,
        f: impl Fn(SaveStatus) + Send + Sync + 'static,
    ) -> Self {
        self.update_save_status = Some(Box::new(f));
        self
    }

    pub fn with_subscribe(
        mut self,
        f: impl Fn(Listener) -> Unsubscribe + Send + Sync + 'static,
    ) -> Self {
        self.subscribe = Some(Box::new(f));
        self
    }

    /// Names of the functions that were not supplied.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.get_state.is_none() {
            missing.push("get_state");
        }
        if self.replace_state.is_none() {
            missing.push("replace_state");
        }
        if self.update_save_status.is_none() {
            missing.push("update_save_status");
        }
        if self.subscribe.is_none() {
            missing.push("subscribe");
        }
        missing
    }
}

impl fmt::Debug for GenericStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericStore")
            .field("missing", &self.missing())
            .finish()
    }
}

/// A host container, probed once for the capability shape it offers.
///
/// Implementors override the probe(s) matching what they support.
pub trait HostContainer: Send + Sync {
    fn module_store(self: Arc<Self>) -> Option<Arc<dyn ModuleStore>> {
        None
    }

    fn observable_store(self: Arc<Self>) -> Option<Arc<dyn ObservableStore>> {
        None
    }

    fn generic_store(self: Arc<Self>) -> Option<Arc<GenericStore>> {
        None
    }
}

impl HostContainer for GenericStore {
    fn generic_store(self: Arc<Self>) -> Option<Arc<GenericStore>> {
        Some(self)
    }
}
