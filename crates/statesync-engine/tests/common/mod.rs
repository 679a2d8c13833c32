#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use statesync_core::{
    FileMetadata, Notice, ProjectFileClient, SaveVerdict, SyncError, UiHooks,
};
use statesync_engine::{EngineConfig, RetryPolicy};

/// In-memory project-file service with per-operation failure injection.
#[derive(Default)]
pub struct FakeProjectFiles {
    files: Mutex<HashMap<String, Option<Value>>>,
    temporary_state: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u32>>,
    save_latency: Mutex<Duration>,
    user_id: String,
}

impl FakeProjectFiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            user_id: "u42".to_string(),
            ..Default::default()
        })
    }

    /// Store a file and map `key` to it, as an earlier session would have.
    pub fn seed(&self, key: &str, file_name: &str, content: Value) {
        self.put_file(file_name, Some(content));
        self.temporary_state
            .lock()
            .unwrap()
            .insert(key.to_string(), file_name.to_string());
    }

    pub fn put_file(&self, file_name: &str, content: Option<Value>) {
        self.files
            .lock()
            .unwrap()
            .insert(file_name.to_string(), content);
    }

    pub fn map_key(&self, key: &str, file_name: &str) {
        self.temporary_state
            .lock()
            .unwrap()
            .insert(key.to_string(), file_name.to_string());
    }

    pub fn file(&self, file_name: &str) -> Option<Value> {
        self.files.lock().unwrap().get(file_name).cloned().flatten()
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn mapping(&self, key: &str) -> Option<String> {
        self.temporary_state.lock().unwrap().get(key).cloned()
    }

    /// Make the next `times` calls of `operation` fail with a 503.
    pub fn fail(&self, operation: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), times);
    }

    pub fn set_save_latency(&self, latency: Duration) {
        *self.save_latency.lock().unwrap() = latency;
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, operation: &str) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(operation.to_string());
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(SyncError::Remote {
                    status: 503,
                    message: format!("{} unavailable", operation),
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ProjectFileClient for FakeProjectFiles {
    async fn get_file_content(
        &self,
        _project_id: &str,
        file_name: &str,
    ) -> Result<Option<Value>, SyncError> {
        self.record("get_file_content")?;
        Ok(self.file(file_name))
    }

    async fn save_file_content(
        &self,
        _project_id: &str,
        file_name: &str,
        content: &Value,
    ) -> Result<(), SyncError> {
        let latency = *self.save_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.record("save_file_content")?;
        self.put_file(file_name, Some(content.clone()));
        Ok(())
    }

    async fn create_file(&self, _project_id: &str, file_name: &str) -> Result<(), SyncError> {
        self.record("create_file")?;
        self.put_file(file_name, None);
        Ok(())
    }

    async fn get_file_metadata(
        &self,
        _project_id: &str,
        file_name: &str,
    ) -> Result<Option<FileMetadata>, SyncError> {
        self.record("get_file_metadata")?;
        let exists = self.files.lock().unwrap().contains_key(file_name);
        Ok(exists.then(|| FileMetadata {
            name: file_name.to_string(),
            modified_at: Some(Utc::now()),
        }))
    }

    async fn get_temporary_state(
        &self,
        _project_id: &str,
    ) -> Result<HashMap<String, String>, SyncError> {
        self.record("get_temporary_state")?;
        Ok(self.temporary_state.lock().unwrap().clone())
    }

    async fn set_temporary_state(
        &self,
        _project_id: &str,
        key: &str,
        file_name: &str,
    ) -> Result<(), SyncError> {
        self.record("set_temporary_state")?;
        self.map_key(key, file_name);
        Ok(())
    }

    async fn current_user_id(&self) -> Result<String, SyncError> {
        self.record("current_user_id")?;
        Ok(self.user_id.clone())
    }
}

/// UI hooks that record what the engine shows and answer from fixed settings.
#[derive(Default)]
pub struct RecordingHooks {
    pub notices: Mutex<Vec<Notice>>,
    pub busy: Mutex<Vec<bool>>,
    pub verdict: Mutex<Option<SaveVerdict>>,
    pub picked_file: Mutex<Option<String>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn veto(&self, message: Option<&str>) {
        *self.verdict.lock().unwrap() = Some(SaveVerdict::Veto(message.map(str::to_string)));
    }

    pub fn pick(&self, file_name: &str) {
        *self.picked_file.lock().unwrap() = Some(file_name.to_string());
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl UiHooks for RecordingHooks {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn set_busy(&self, busy: bool) {
        self.busy.lock().unwrap().push(busy);
    }

    async fn before_save(&self) -> SaveVerdict {
        self.verdict
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(SaveVerdict::Proceed)
    }

    async fn pick_file(&self) -> Option<String> {
        self.picked_file.lock().unwrap().clone()
    }
}

/// Engine settings with short retry delays and autosave off.
pub fn test_config() -> EngineConfig {
    let quick = RetryPolicy::new(3, Duration::from_millis(10));
    EngineConfig::new("p1", "wordFreq")
        .with_autosave_interval(Duration::ZERO)
        .with_save_retry(quick.clone())
        .with_load_retry(quick)
        .with_provisioning_retry(RetryPolicy::new(2, Duration::from_millis(10)))
}
