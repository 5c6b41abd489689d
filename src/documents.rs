use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::Deserialize;
use serde_json::json;

use crate::drive::DriveTokenCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredDocument>;
}

/// Uploads certificate documents to a Drive folder through the multipart
/// upload endpoint.
pub struct DriveStore {
    client: Client,
    upload_url: String,
    folder_id: Option<String>,
    tokens: Arc<DriveTokenCache>,
}

impl DriveStore {
    pub fn new(
        client: Client,
        upload_url: impl Into<String>,
        folder_id: Option<String>,
        tokens: Arc<DriveTokenCache>,
    ) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
            folder_id,
            tokens,
        }
    }
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[async_trait]
impl DocumentStore for DriveStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredDocument> {
        let token = self.tokens.bearer().await?;

        let parents: Vec<&str> = self.folder_id.iter().map(String::as_str).collect();
        let metadata = json!({ "name": name, "parents": parents });
        let metadata_part = Part::text(metadata.to_string())
            .mime_str("application/json")
            .context("invalid metadata content type")?;
        let file_part = Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)
            .context("invalid document content type")?;
        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .context("failed to reach document storage")?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "document upload rejected");
            return Err(anyhow!("document storage returned status {status}"));
        }

        let file: DriveFile = response
            .json()
            .await
            .context("document storage returned an unexpected body")?;
        Ok(StoredDocument { id: file.id })
    }
}
