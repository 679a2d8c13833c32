//! Local JSON state files, in the same wire format as the remote file.

use std::path::Path;

use anyhow::Context;
use statesync_core::{codec, ObservableStore, StateValue};
use statesync_engine::{MemoryObservableStore, BOOKKEEPING_NAMESPACE};
use tokio::fs;

/// Read a local state file. A missing or blank file is an empty state.
pub async fn read_state(path: &Path) -> anyhow::Result<StateValue> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateValue::object()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    if raw.trim().is_empty() {
        return Ok(StateValue::object());
    }
    let document: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    codec::decode(&document).with_context(|| format!("{} is not a state document", path.display()))
}

/// Write `state` to `path` atomically, via a temp file next to it.
pub async fn write_state(path: &Path, state: &StateValue) -> anyhow::Result<()> {
    let document = codec::encode(state)?;
    let mut data = serde_json::to_string_pretty(&document)?;
    data.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create parent directory for {}", path.display()))?;
    }

    let temp_path = path.with_extension("json.sync.tmp");
    fs::write(&temp_path, data)
        .await
        .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp file to {}", path.display()))?;
    Ok(())
}

/// Store content without the engine's bookkeeping.
pub fn user_state(store: &MemoryObservableStore) -> StateValue {
    let mut state = store.snapshot();
    if let Some(entries) = state.as_object_mut() {
        entries.remove(BOOKKEEPING_NAMESPACE);
    }
    state
}

/// Make the store's user state equal to `state`: drop the keys `state` lacks,
/// then patch in the rest. Returns whether anything changed.
pub fn apply_state(store: &MemoryObservableStore, state: StateValue) -> bool {
    let current = user_state(store);
    if current == state {
        return false;
    }

    let wanted = state.as_object().cloned().unwrap_or_default();
    if let Some(entries) = current.as_object() {
        for key in entries.keys().filter(|key| !wanted.contains_key(*key)) {
            store.remove(key);
        }
    }
    let changed: StateValue = wanted
        .into_iter()
        .filter(|(key, value)| current.get(key) != Some(value))
        .collect();
    store.patch(changed);
    true
}
