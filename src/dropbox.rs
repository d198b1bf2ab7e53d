//! # Dropbox storage backend
//!
//! Wires the [`StorageBackend`] trait to the Dropbox HTTP API with a bearer token.
//!
//! - `create_folder` posts to `/2/files/create_folder_v2` with `autorename: false`.
//! - `upload` posts the raw bytes to `/2/files/upload` on the content host, with the
//!   upload arguments (`mode: "add"`, `autorename: true`, `mute: false`) in the
//!   `Dropbox-API-Arg` header.
//!
//! Every call is made once. Whatever status comes back is handed to the caller;
//! only failures to get a status at all are errors here.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::contract::{BackendReply, CollaboratorError, StorageBackend};

#[derive(Serialize)]
struct CreateFolderArg<'a> {
    path: &'a str,
    autorename: bool,
}

#[derive(Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    autorename: bool,
    mute: bool,
}

pub struct DropboxClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
    content_url: String,
}

impl DropboxClient {
    pub fn new(
        token: impl Into<String>,
        api_url: impl Into<String>,
        content_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            content_url: content_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        tracing::info!(
            api_url = %storage.api_url,
            content_url = %storage.content_url,
            token_set = !storage.token.is_empty(),
            "Initialized DropboxClient from config"
        );
        Self::new(&storage.token, &storage.api_url, &storage.content_url)
    }

    async fn reply(
        operation: &str,
        resp: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<BackendReply, CollaboratorError> {
        let resp = resp.map_err(|e| {
            tracing::error!(operation, error = ?e, "Dropbox request failed before a response");
            e
        })?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            tracing::error!(operation, status, error = ?e, "Failed to read Dropbox response body");
            e
        })?;
        tracing::debug!(operation, status, body = %body, "Dropbox responded");
        Ok(BackendReply { status, body })
    }
}

#[async_trait]
impl StorageBackend for DropboxClient {
    async fn create_folder(&self, path: &str) -> Result<BackendReply, CollaboratorError> {
        tracing::info!(path, "Creating Dropbox folder");
        let resp = self
            .http
            .post(format!("{}/2/files/create_folder_v2", self.api_url))
            .bearer_auth(&self.token)
            .json(&CreateFolderArg {
                path,
                autorename: false,
            })
            .send()
            .await;
        Self::reply("create_folder", resp).await
    }

    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<BackendReply, CollaboratorError> {
        let arg = serde_json::to_string(&UploadArg {
            path,
            mode: "add",
            autorename: true,
            mute: false,
        })?;
        tracing::info!(path, size = content.len(), "Uploading file to Dropbox");
        let resp = self
            .http
            .post(format!("{}/2/files/upload", self.content_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header("Dropbox-API-Arg", arg)
            .body(content)
            .send()
            .await;
        Self::reply("upload", resp).await
    }
}
