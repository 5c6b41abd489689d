//! Certificate request status lifecycle.
//!
//! `Pendiente -> En proceso -> {Procesada, Rechazada}`. A pending request may
//! also be rejected or processed directly. Processed and rejected requests
//! are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En proceso", alias = "En Progreso", alias = "En progreso")]
    InProgress,
    #[serde(rename = "Procesada")]
    Processed,
    #[serde(rename = "Rechazada")]
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::InProgress,
        RequestStatus::Processed,
        RequestStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pendiente",
            RequestStatus::InProgress => "En proceso",
            RequestStatus::Processed => "Procesada",
            RequestStatus::Rejected => "Rechazada",
        }
    }

    /// Case-insensitive; accepts the "en progreso" spelling used by older rows.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pendiente" => Some(RequestStatus::Pending),
            "en proceso" | "en progreso" => Some(RequestStatus::InProgress),
            "procesada" => Some(RequestStatus::Processed),
            "rechazada" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    /// Unrecognised stored values count as in progress.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(RequestStatus::InProgress)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Processed | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange<'a> {
    Start,
    Reject { reason: &'a str },
    /// Only issued once the certificate document has been stored.
    Complete,
    Reopen,
}

impl<'a> StatusChange<'a> {
    /// Maps a status requested through the status endpoint to a change.
    pub fn requested(
        target: RequestStatus,
        reason: Option<&'a str>,
    ) -> Result<Self, TransitionError> {
        match target {
            RequestStatus::Pending => Ok(StatusChange::Reopen),
            RequestStatus::InProgress => Ok(StatusChange::Start),
            RequestStatus::Rejected => Ok(StatusChange::Reject {
                reason: reason.unwrap_or(""),
            }),
            RequestStatus::Processed => Err(TransitionError::DocumentRequired),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("request is already {0} and can no longer change")]
    Locked(RequestStatus),
    #[error("a rejection reason is required")]
    MissingReason,
    #[error("requests become Procesada only by uploading their certificate document")]
    DocumentRequired,
    #[error("a request cannot return to Pendiente")]
    CannotReopen,
}

impl From<TransitionError> for AppError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::Locked(_) => AppError::conflict(value.to_string()),
            _ => AppError::bad_request(value.to_string()),
        }
    }
}

/// Resolves the status a request moves to, without touching storage.
pub fn apply(
    current: RequestStatus,
    change: StatusChange<'_>,
) -> Result<RequestStatus, TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Locked(current));
    }

    match change {
        StatusChange::Start => Ok(RequestStatus::InProgress),
        StatusChange::Reject { reason } => {
            if reason.trim().is_empty() {
                Err(TransitionError::MissingReason)
            } else {
                Ok(RequestStatus::Rejected)
            }
        }
        StatusChange::Complete => Ok(RequestStatus::Processed),
        StatusChange::Reopen => match current {
            RequestStatus::Pending => Ok(RequestStatus::Pending),
            _ => Err(TransitionError::CannotReopen),
        },
    }
}
