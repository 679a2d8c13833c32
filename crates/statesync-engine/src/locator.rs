//! Resolves the remote file behind a logical key, provisioning it on first use.
//!
//! Mappings live in the project's temporary-state map so later sessions find
//! the same file. A mapping is only recorded once the file exists and holds
//! its initial content; any earlier failure leaves no mapping behind and the
//! next `resolve` starts provisioning over. Provisioning is single-flight per
//! key: concurrent callers wait for the one in progress and share its file.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use statesync_core::{ProjectFileClient, SyncError};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument};

use crate::config::{EngineConfig, RetryPolicy, UserMigration};
use crate::retry;

pub struct FileLocator {
    client: Arc<dyn ProjectFileClient>,
    project_id: String,
    storage_key: String,
    file_prefix: String,
    per_user: bool,
    migration: UserMigration,
    provisioning_retry: RetryPolicy,
    read_retry: RetryPolicy,
    user_id: OnceCell<String>,
    /// Mappings confirmed during this session: key -> file name
    resolved: DashMap<String, String>,
    /// Held while a key is looked up and, if unmapped, provisioned
    provisioning: DashMap<String, Arc<Mutex<()>>>,
}

impl FileLocator {
    pub fn new(client: Arc<dyn ProjectFileClient>, config: &EngineConfig) -> Self {
        Self {
            client,
            project_id: config.project_id.clone(),
            storage_key: config.storage_key.clone(),
            file_prefix: config.file_prefix.clone(),
            per_user: config.per_user,
            migration: config.user_migration,
            provisioning_retry: config.provisioning_retry.clone(),
            read_retry: config.load_retry.clone(),
            user_id: OnceCell::new(),
            resolved: DashMap::new(),
            provisioning: DashMap::new(),
        }
    }

    /// Logical key of the synchronized state: `storage_key`, or
    /// `storage_key-userId` when state is kept per user.
    pub async fn key(&self) -> Result<String, SyncError> {
        if !self.per_user {
            return Ok(self.storage_key.clone());
        }
        let user_id = self
            .user_id
            .get_or_try_init(|| {
                retry::run_logged("Resolve user identity", &self.read_retry, || {
                    self.client.current_user_id()
                })
            })
            .await?;
        Ok(format!("{}-{}", self.storage_key, user_id))
    }

    /// File name mapped to `key` during this session, if any.
    pub fn cached(&self, key: &str) -> Option<String> {
        self.resolved.get(key).map(|entry| entry.value().clone())
    }

    /// File mapped to `key`, from this session or the project's temporary state.
    /// Never provisions.
    pub async fn lookup(&self, key: &str) -> Result<Option<String>, SyncError> {
        if let Some(file_name) = self.cached(key) {
            return Ok(Some(file_name));
        }

        let mappings = retry::run_logged("Read project state", &self.provisioning_retry, || {
            self.client.get_temporary_state(&self.project_id)
        })
        .await?;

        Ok(mappings.get(key).map(|file_name| {
            debug!("Key {} maps to existing file {}", key, file_name);
            self.resolved.insert(key.to_string(), file_name.clone());
            file_name.clone()
        }))
    }

    /// A fresh, collision-resistant file name for `key`.
    pub fn new_file_name(&self, key: &str) -> String {
        format!("{}-{}-{}.json", self.file_prefix, key, uuid::Uuid::new_v4())
    }

    /// Return the file mapped to `key`, provisioning one if there is none.
    ///
    /// `initial_content` is only evaluated when a new file is created; its
    /// result becomes the file's first content.
    #[instrument(skip(self, initial_content), level = "debug")]
    pub async fn resolve(
        &self,
        key: &str,
        initial_content: impl FnOnce() -> Result<Value, SyncError> + Send,
    ) -> Result<String, SyncError> {
        if let Some(file_name) = self.cached(key) {
            return Ok(file_name);
        }

        let gate = Arc::clone(&*self.provisioning.entry(key.to_string()).or_default());
        let _held = gate.lock().await;
        // A caller that waited here finds the mapping its predecessor recorded.
        if let Some(file_name) = self.lookup(key).await? {
            return Ok(file_name);
        }

        let shared_file =
            if self.migration == UserMigration::CopyShared && key != self.storage_key {
                self.lookup(&self.storage_key).await?
            } else {
                None
            };

        let content = match shared_file {
            Some(shared) => match self.read_shared(&shared).await? {
                Some(content) => {
                    info!("Seeding {} from shared file {}", key, shared);
                    content
                }
                None => initial_content()?,
            },
            None => initial_content()?,
        };

        self.provision(key, &content).await
    }

    async fn read_shared(&self, file_name: &str) -> Result<Option<Value>, SyncError> {
        retry::run_logged("Read shared file", &self.read_retry, || {
            self.client.get_file_content(&self.project_id, file_name)
        })
        .await
    }

    async fn provision(&self, key: &str, content: &Value) -> Result<String, SyncError> {
        let file_name = self.new_file_name(key);
        info!("Provisioning {} for key {}", file_name, key);

        retry::run_logged("Create file", &self.provisioning_retry, || {
            self.client.create_file(&self.project_id, &file_name)
        })
        .await?;

        retry::run_logged("Write initial content", &self.provisioning_retry, || {
            self.client
                .save_file_content(&self.project_id, &file_name, content)
        })
        .await?;

        retry::run_logged("Record file mapping", &self.provisioning_retry, || {
            self.client
                .set_temporary_state(&self.project_id, key, &file_name)
        })
        .await?;

        self.resolved.insert(key.to_string(), file_name.clone());
        Ok(file_name)
    }

    /// Point `key` at an existing file chosen by the user.
    pub async fn repoint(&self, key: &str, file_name: &str) -> Result<(), SyncError> {
        retry::run_logged("Record file mapping", &self.provisioning_retry, || {
            self.client
                .set_temporary_state(&self.project_id, key, file_name)
        })
        .await?;

        let previous = self.resolved.insert(key.to_string(), file_name.to_string());
        info!(
            "Key {} now maps to {} (was {})",
            key,
            file_name,
            previous.as_deref().unwrap_or("unmapped")
        );
        Ok(())
    }
}
