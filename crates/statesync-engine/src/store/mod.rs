//! In-memory host containers.
//!
//! Listeners run after the internal lock is released, so a listener may
//! write back into the store it observes.

mod module;
mod observable;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use statesync_core::{Listener, Mutation, StateValue, Unsubscribe};

pub use module::MemoryModuleStore;
pub use observable::MemoryObservableStore;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Listeners in subscription order.
#[derive(Clone, Default)]
pub(crate) struct ListenerSet {
    table: Arc<Mutex<ListenerTable>>,
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Listener) -> Unsubscribe {
        let id = {
            let mut table = self.table.lock().expect("listener table poisoned");
            let id = table.next_id;
            table.next_id += 1;
            table.listeners.insert(id, listener);
            id
        };

        let table = Arc::downgrade(&self.table);
        Unsubscribe::new(move || {
            if let Some(table) = table.upgrade() {
                table
                    .lock()
                    .expect("listener table poisoned")
                    .listeners
                    .remove(&id);
            }
        })
    }

    pub(crate) fn notify(&self, mutation: &Mutation) {
        let current: Vec<Listener> = self
            .table
            .lock()
            .expect("listener table poisoned")
            .listeners
            .values()
            .cloned()
            .collect();
        for listener in current {
            listener(mutation);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table
            .lock()
            .expect("listener table poisoned")
            .listeners
            .len()
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
/// An empty path merges `value` into the root.
pub(crate) fn set_path(root: &mut StateValue, path: &[String], value: StateValue) {
    let Some((last, parents)) = path.split_last() else {
        root.merge(value);
        return;
    };

    let mut node = root;
    for segment in parents {
        if node.as_object().is_none() {
            *node = StateValue::object();
        }
        let StateValue::Object(entries) = node else {
            return;
        };
        node = entries
            .entry(segment.clone())
            .or_insert_with(StateValue::object);
    }
    if node.as_object().is_none() {
        *node = StateValue::object();
    }
    if let StateValue::Object(entries) = node {
        entries.insert(last.clone(), value);
    }
}
