use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    jobs::{finish_job, reserve_job, JobQueueError},
    models::Job,
    state::AppState,
};

pub mod webhook;

#[derive(Debug, PartialEq, Eq)]
pub enum JobExecution {
    Success,
    Failed { error: String },
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;
    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution;
}

pub struct Worker {
    state: Arc<AppState>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        state: Arc<AppState>,
        handlers: Vec<Arc<dyn JobHandler>>,
        poll_interval: Duration,
    ) -> Self {
        let map = handlers
            .into_iter()
            .map(|handler| (handler.job_type(), handler))
            .collect();
        Self {
            state,
            handlers: map,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        info!(job_types = ?self.handlers.keys().collect::<Vec<_>>(), "worker started");
        loop {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => sleep(self.poll_interval).await,
                Err(err) => {
                    error!(error = %err, "worker tick failed");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Runs at most one queued job. Returns whether a job was found.
    pub async fn tick(&self) -> Result<bool, JobQueueError> {
        let job_types: Vec<&str> = self.handlers.keys().copied().collect();
        if job_types.is_empty() {
            return Ok(false);
        }

        let job = {
            let mut conn = match self.state.db() {
                Ok(conn) => conn,
                Err(err) => {
                    error!(?err, "failed to obtain database connection in worker");
                    return Ok(false);
                }
            };
            match reserve_job(&mut conn, &job_types)? {
                Some(job) => job,
                None => return Ok(false),
            }
        };

        let outcome = match self.handlers.get(job.job_type.as_str()) {
            Some(handler) => handler.handle(self.state.clone(), job.clone()).await,
            None => JobExecution::Failed {
                error: "no handler registered".to_string(),
            },
        };

        let recorded = match &outcome {
            JobExecution::Success => {
                info!(job_id = %job.id, job_type = %job.job_type, "job completed");
                Ok(())
            }
            JobExecution::Failed { error } => {
                warn!(job_id = %job.id, job_type = %job.job_type, %error, "job failed; not retrying");
                Err(error.as_str())
            }
        };

        match self.state.db() {
            Ok(mut conn) => finish_job(&mut conn, job.id, recorded)?,
            Err(err) => error!(?err, job_id = %job.id, "failed to record job outcome"),
        }

        Ok(true)
    }
}

pub fn default_handlers() -> Vec<Arc<dyn JobHandler>> {
    vec![Arc::new(webhook::WelcomeWebhookJob::new())]
}
