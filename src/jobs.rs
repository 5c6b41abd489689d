//! Outbound side effects queued in the `jobs` table. Jobs run once: a
//! failure is recorded and never rescheduled.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Job, NewJob};
use crate::schema::jobs;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

pub const JOB_WELCOME_WEBHOOK: &str = "welcome-webhook";

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

/// Body posted to the welcome webhook when an employee joins the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeNotice {
    pub tipo: String,
    pub datos: WelcomeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeData {
    pub nombre: String,
    pub telefono: String,
}

impl WelcomeNotice {
    /// `None` when there is no phone number to greet.
    pub fn for_employee(nombre: &str, telefono: &str) -> Option<Self> {
        let telefono = telefono.trim();
        if telefono.is_empty() {
            return None;
        }
        Some(Self {
            tipo: "bienvenida".to_string(),
            datos: WelcomeData {
                nombre: nombre.trim().to_string(),
                telefono: telefono.to_string(),
            },
        })
    }
}

pub fn enqueue<P: Serialize>(
    conn: &mut PgConnection,
    job_type: &str,
    payload: &P,
) -> JobQueueResult<Uuid> {
    let new_job = NewJob {
        id: Uuid::new_v4(),
        job_type: job_type.to_string(),
        payload: serde_json::to_value(payload)?,
        status: STATUS_QUEUED.to_string(),
        run_after: Utc::now().naive_utc(),
    };

    diesel::insert_into(jobs::table)
        .values(&new_job)
        .execute(conn)?;
    Ok(new_job.id)
}

pub fn reserve_job(conn: &mut PgConnection, job_types: &[&str]) -> JobQueueResult<Option<Job>> {
    let now = Utc::now().naive_utc();

    let reserved = conn.transaction(|conn| {
        let Some(job) = jobs::table
            .filter(jobs::status.eq(STATUS_QUEUED))
            .filter(jobs::run_after.le(now))
            .filter(jobs::job_type.eq_any(job_types))
            .order(jobs::run_after.asc())
            .for_update()
            .skip_locked()
            .first::<Job>(conn)
            .optional()?
        else {
            return Ok::<_, diesel::result::Error>(None);
        };

        diesel::update(jobs::table.find(job.id))
            .set((
                jobs::status.eq(STATUS_PROCESSING),
                jobs::attempts.eq(job.attempts + 1),
                jobs::updated_at.eq(now),
            ))
            .get_result::<Job>(conn)
            .map(Some)
    })?;

    Ok(reserved)
}

/// Records the outcome of a reserved job.
pub fn finish_job(
    conn: &mut PgConnection,
    job_id: Uuid,
    outcome: Result<(), &str>,
) -> JobQueueResult<()> {
    let (status, last_error) = match outcome {
        Ok(()) => (STATUS_SUCCEEDED, None),
        Err(message) => (STATUS_FAILED, Some(message.to_string())),
    };

    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(status),
            jobs::last_error.eq(last_error),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}
