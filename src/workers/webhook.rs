use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::{
    jobs::{WelcomeNotice, JOB_WELCOME_WEBHOOK},
    models::Job,
    state::AppState,
};

use super::{JobExecution, JobHandler};

/// Posts the welcome notice for a new employee to the configured webhook.
pub struct WelcomeWebhookJob {
    client: Client,
}

impl WelcomeWebhookJob {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for WelcomeWebhookJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for WelcomeWebhookJob {
    fn job_type(&self) -> &'static str {
        JOB_WELCOME_WEBHOOK
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let notice: WelcomeNotice = match serde_json::from_value(job.payload) {
            Ok(notice) => notice,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid welcome payload: {err}"),
                }
            }
        };

        let Some(url) = state.config.welcome_webhook_url.as_deref() else {
            warn!(job_id = %job.id, "welcome webhook url missing; skipping notification");
            return JobExecution::Success;
        };

        match self.client.post(url).json(&notice).send().await {
            Ok(response) if response.status().is_success() => JobExecution::Success,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(job_id = %job.id, %status, %body, "welcome webhook rejected notification");
                JobExecution::Failed {
                    error: format!("webhook responded with status {status}"),
                }
            }
            Err(err) => JobExecution::Failed {
                error: format!("webhook request failed: {err}"),
            },
        }
    }
}
