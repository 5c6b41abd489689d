use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{
    config::AppConfig,
    documents::{DocumentStore, DriveStore},
};

const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECONDS) < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct DriveCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// OAuth access token for the document store, reused until shortly before
/// it expires and refreshed with the refresh-token grant otherwise.
pub struct DriveTokenCache {
    client: Client,
    token_url: String,
    credentials: Option<DriveCredentials>,
    cached: RwLock<Option<CachedToken>>,
}

impl DriveTokenCache {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        credentials: Option<DriveCredentials>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            credentials,
            cached: RwLock::new(None),
        }
    }

    pub async fn bearer(&self) -> Result<String> {
        let now = Utc::now();
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = self.cached.write().await;
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    pub async fn invalidate(&self) {
        self.cached.write().await.take();
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| anyhow!("document storage credentials are not configured"))?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .context("failed to reach token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("token endpoint returned status {status}"));
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("token endpoint returned an unexpected body")?;
        tracing::debug!(expires_in = body.expires_in, "obtained document storage token");

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in.max(0)),
        })
    }
}

pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")
}

pub fn build_document_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let client = build_http_client()?;

    let credentials = match (
        config.drive_client_id.clone(),
        config.drive_client_secret.clone(),
        config.drive_refresh_token.clone(),
    ) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(DriveCredentials {
            client_id,
            client_secret,
            refresh_token,
        }),
        _ => None,
    };

    let tokens = Arc::new(DriveTokenCache::new(
        client.clone(),
        config.drive_token_url.clone(),
        credentials,
    ));

    Ok(Arc::new(DriveStore::new(
        client,
        config.drive_upload_url.clone(),
        config.drive_folder_id.clone(),
        tokens,
    )))
}
