use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Metadata of a file hosted by the project-file service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    /// Last modification time reported by the service
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Remote project-file service.
///
/// Files are addressed by `(project_id, file_name)`. The project also carries a
/// small temporary-state map (logical key -> file name) that outlives sessions.
#[async_trait]
pub trait ProjectFileClient: Send + Sync {
    /// Read the JSON content of a file.
    ///
    /// # Returns
    /// `None` when the file does not exist or its body is empty
    async fn get_file_content(
        &self,
        project_id: &str,
        file_name: &str,
    ) -> Result<Option<Value>, SyncError>;

    /// Overwrite the JSON content of a file.
    async fn save_file_content(
        &self,
        project_id: &str,
        file_name: &str,
        content: &Value,
    ) -> Result<(), SyncError>;

    /// Create an empty file.
    async fn create_file(&self, project_id: &str, file_name: &str) -> Result<(), SyncError>;

    /// Get file metadata, `None` if the file does not exist.
    async fn get_file_metadata(
        &self,
        project_id: &str,
        file_name: &str,
    ) -> Result<Option<FileMetadata>, SyncError>;

    /// Read the project-level temporary-state map.
    async fn get_temporary_state(
        &self,
        project_id: &str,
    ) -> Result<HashMap<String, String>, SyncError>;

    /// Record `key -> file_name` in the project-level temporary-state map.
    async fn set_temporary_state(
        &self,
        project_id: &str,
        key: &str,
        file_name: &str,
    ) -> Result<(), SyncError>;

    /// Identity of the authenticated user.
    async fn current_user_id(&self) -> Result<String, SyncError>;
}
