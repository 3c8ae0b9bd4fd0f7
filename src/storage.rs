#![forbid(unsafe_code)]

//! Object store seam and a client for the hosted storage REST API
//! (`/storage/v1/object/...`).

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::StorageConfig;

const LIST_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("object store request failed: {0}")]
    Transport(String),

    #[error("unexpected object store response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` at `path`. Fails if the path already holds an object.
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;
}

pub struct StorageClient {
    agent: ureq::Agent,
    base_url: String,
    service_key: String,
}

impl StorageClient {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        }
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.service_key)
            .set("Authorization", &format!("Bearer {}", self.service_key))
    }
}

fn map_ureq_error(err: ureq::Error) -> StorageError {
    match err {
        ureq::Error::Status(status, response) => StorageError::Http {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => StorageError::Transport(transport.to_string()),
    }
}

fn object_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl ObjectStore for StorageClient {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = format!(
            "{}/storage/v1/object/{bucket}/{}",
            self.base_url,
            object_path(path)
        );
        self.authorized(self.agent.post(&url))
            .set("Content-Type", content_type)
            .set("x-upsert", "false")
            .send_bytes(bytes)
            .map_err(map_ureq_error)?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{}",
            self.base_url,
            object_path(path)
        )
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let url = format!("{}/storage/v1/object/list/{bucket}", self.base_url);
        let response = self
            .authorized(self.agent.post(&url))
            .send_json(json!({
                "prefix": prefix,
                "limit": LIST_LIMIT,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" },
            }))
            .map_err(map_ureq_error)?;
        response
            .into_json::<Vec<StoredObject>>()
            .map_err(|err| StorageError::Decode(err.to_string()))
    }
}
