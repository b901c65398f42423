//! errors surfaced by the reconciler and the status page client

use thiserror::Error;

use crate::cachet::{ComponentId, IncidentId};

pub type Result<T> = std::result::Result<T, Error>;

/// coarse classification of [Error] so callers can branch without matching
/// on message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthFailure,
    BackendUnavailable,
    NoOpenIncident,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailure => "auth_failure",
            Self::BackendUnavailable => "backend_unavailable",
            Self::NoOpenIncident => "no_open_incident",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// either the webhook caller or we (towards cachet) presented a wrong token
    #[error("authorization failed: {reason}")]
    AuthFailure { reason: String },

    /// transport errors, unexpected http status codes and undecodable bodies
    #[error("status page backend unavailable: {operation} failed: {reason}")]
    BackendUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// a resolved alert arrived for a component we never opened an incident for
    #[error("no incident found for component {component_id}")]
    NoOpenIncident { component_id: ComponentId },

    #[error("{operation} failed: incident {incident_id} not found")]
    IncidentNotFound {
        operation: &'static str,
        incident_id: IncidentId,
    },

    #[error("{operation} failed: resource not found")]
    NotFound { operation: &'static str },
}

impl Error {
    pub fn auth_failure(reason: impl Into<String>) -> Self {
        Self::AuthFailure {
            reason: reason.into(),
        }
    }

    pub fn backend_unavailable(operation: &'static str, reason: impl ToString) -> Self {
        Self::BackendUnavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailure { .. } => ErrorKind::AuthFailure,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::NoOpenIncident { .. } => ErrorKind::NoOpenIncident,
            Self::IncidentNotFound { .. } | Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}
