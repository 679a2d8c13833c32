//! Project-file service client over HTTP.
//!
//! Token is attached per request and can be swapped at runtime; a missing
//! token fails the call before anything is sent.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use statesync_core::{FileMetadata, ProjectFileClient, SyncError};
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: Value,
}

pub struct HttpProjectFileClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpProjectFileClient {
    /// Client for the service rooted at `base_url`, e.g. `https://api.example.com/v1`.
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_http_client(base_url, http)
    }

    pub fn with_http_client(base_url: &str, http: Client) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SyncError::Configuration(format!("Invalid base URL {}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Configuration(format!(
                "Base URL cannot carry a path: {}",
                base_url
            )));
        }
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    /// Replace the bearer token used by later requests.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().expect("token lock poisoned") = token.filter(|t| !t.is_empty());
    }

    fn token(&self) -> Result<String, SyncError> {
        self.token
            .read()
            .expect("token lock poisoned")
            .clone()
            .ok_or(SyncError::MissingToken)
    }

    /// `base_url` followed by `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn content_url(&self, project_id: &str, file_name: &str) -> Url {
        self.endpoint(&["projects", project_id, "files", file_name, "content"])
    }

    fn temporary_state_url(&self, project_id: &str) -> Url {
        self.endpoint(&["projects", project_id, "temporary-state"])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        let token = self.token()?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))
    }
}

/// Turn a non-success response into a `Remote` error carrying the body.
async fn check(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Remote {
        status: status.as_u16(),
        message: body,
    })
}

async fn read_body(response: Response) -> Result<String, SyncError> {
    response
        .text()
        .await
        .map_err(|e| SyncError::Network(format!("Failed to read response body: {}", e)))
}

#[async_trait]
impl ProjectFileClient for HttpProjectFileClient {
    #[instrument(skip(self), level = "debug")]
    async fn get_file_content(
        &self,
        project_id: &str,
        file_name: &str,
    ) -> Result<Option<Value>, SyncError> {
        let url = self.content_url(project_id, file_name);
        let response = self.send(self.http.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("File {} not found", file_name);
            return Ok(None);
        }

        let body = read_body(check(response).await?).await?;
        if body.trim().is_empty() {
            debug!("File {} is empty", file_name);
            return Ok(None);
        }

        debug!("Read {} ({} bytes)", file_name, body.len());
        Ok(Some(serde_json::from_str(&body)?))
    }

    #[instrument(skip(self, content), level = "debug")]
    async fn save_file_content(
        &self,
        project_id: &str,
        file_name: &str,
        content: &Value,
    ) -> Result<(), SyncError> {
        let url = self.content_url(project_id, file_name);
        check(self.send(self.http.put(url).json(content)).await?).await?;
        debug!("Wrote {}", file_name);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_file(&self, project_id: &str, file_name: &str) -> Result<(), SyncError> {
        let url = self.endpoint(&["projects", project_id, "files"]);
        let request = self.http.post(url).json(&json!({ "name": file_name }));
        check(self.send(request).await?).await?;
        debug!("Created {}", file_name);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_file_metadata(
        &self,
        project_id: &str,
        file_name: &str,
    ) -> Result<Option<FileMetadata>, SyncError> {
        let url = self.endpoint(&["projects", project_id, "files", file_name]);
        let response = self.send(self.http.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = read_body(check(response).await?).await?;
        let metadata: FileMetadata = serde_json::from_str(&body)?;
        debug!("Got metadata for {}: {:?}", file_name, metadata);
        Ok(Some(metadata))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_temporary_state(
        &self,
        project_id: &str,
    ) -> Result<HashMap<String, String>, SyncError> {
        let url = self.temporary_state_url(project_id);
        let response = self.send(self.http.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(HashMap::new());
        }

        let body = read_body(check(response).await?).await?;
        if body.trim().is_empty() {
            return Ok(HashMap::new());
        }
        // Other tools share this map; only string entries can be file mappings.
        let entries: HashMap<String, Value> = serde_json::from_str(&body)?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(file_name) => Some((key, file_name)),
                _ => None,
            })
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_temporary_state(
        &self,
        project_id: &str,
        key: &str,
        file_name: &str,
    ) -> Result<(), SyncError> {
        let url = self.temporary_state_url(project_id);
        let mut entry = serde_json::Map::new();
        entry.insert(key.to_string(), Value::String(file_name.to_string()));
        check(self.send(self.http.patch(url).json(&entry)).await?).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_user_id(&self) -> Result<String, SyncError> {
        let url = self.endpoint(&["users", "me"]);
        let body = read_body(check(self.send(self.http.get(url)).await?).await?).await?;
        let user: CurrentUser = serde_json::from_str(&body)?;
        match user.id {
            Value::String(id) if !id.is_empty() => Ok(id),
            Value::Number(id) => Ok(id.to_string()),
            other => Err(SyncError::Decoding(format!("Unexpected user id: {}", other))),
        }
    }
}
