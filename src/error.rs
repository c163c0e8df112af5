//! Error model for role synchronisation.
//! `ClusterError` is what the reader/writer collaborators return, `TransformPrecondition`
//! covers malformed role bodies, and `SyncError` wraps both with the role and stage
//! they surfaced in so the orchestrator can report a `Failed` outcome as a value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::SyncStage;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClusterError {
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },
    #[error("{code}: {message}")]
    Connection { code: String, message: String },
    #[error("{code}: {message}")]
    Validation { code: String, message: String },
    #[error("{code}: {message}")]
    Auth { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl ClusterError {
    pub fn code_str(&self) -> &str {
        match self {
            ClusterError::NotFound { code, .. }
            | ClusterError::Connection { code, .. }
            | ClusterError::Validation { code, .. }
            | ClusterError::Auth { code, .. }
            | ClusterError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ClusterError::NotFound { message, .. }
            | ClusterError::Connection { message, .. }
            | ClusterError::Validation { message, .. }
            | ClusterError::Auth { message, .. }
            | ClusterError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { ClusterError::NotFound { code: code.into(), message: msg.into() } }
    pub fn connection<S: Into<String>>(code: S, msg: S) -> Self { ClusterError::Connection { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { ClusterError::Validation { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { ClusterError::Auth { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { ClusterError::Internal { code: code.into(), message: msg.into() } }

    /// Classify a non-success HTTP response from the security API.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let msg = if body.is_empty() { format!("HTTP {}", status) } else { format!("HTTP {}: {}", status, body) };
        match status {
            404 => ClusterError::not_found("role_not_found".to_string(), msg),
            400 | 422 => ClusterError::validation("role_rejected".to_string(), msg),
            401 | 403 => ClusterError::auth("unauthorized".to_string(), msg),
            502..=504 => ClusterError::connection("cluster_unavailable".to_string(), msg),
            _ => ClusterError::internal("cluster_error".to_string(), msg),
        }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, ClusterError::NotFound { .. }) }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClusterError::connection("timeout".to_string(), err.to_string());
        }
        if err.is_decode() {
            return ClusterError::internal("invalid_response".to_string(), err.to_string());
        }
        if let Some(status) = err.status() {
            return ClusterError::from_http_status(status.as_u16(), "");
        }
        ClusterError::connection("connect_failed".to_string(), err.to_string())
    }
}

/// Shape violations in a role body. Only raised for Kibana grants that are actually
/// walked; a grant that was already excluded never reports these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformPrecondition {
    #[error("role body is not a JSON object")]
    NotAnObject,
    #[error("'applications' is not an array")]
    ApplicationsNotArray,
    #[error("application grant #{index} is not an object")]
    GrantNotObject { index: usize },
    #[error("'resources' of application '{application}' is not an array")]
    ResourcesNotArray { application: String },
    #[error("resource #{index} of application '{application}' is not a string")]
    ResourceNotString { application: String, index: usize },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed for role '{role}': {source}")]
    Fetch { role: String, #[source] source: ClusterError },
    #[error("malformed role '{role}': {source}")]
    Precondition { role: String, #[source] source: TransformPrecondition },
    #[error("write failed for role '{role}': {source}")]
    Write { role: String, #[source] source: ClusterError },
}

impl SyncError {
    pub fn role(&self) -> &str {
        match self {
            SyncError::Fetch { role, .. } | SyncError::Precondition { role, .. } | SyncError::Write { role, .. } => role.as_str(),
        }
    }

    /// Stage the run was in when the error surfaced.
    pub fn stage(&self) -> SyncStage {
        match self {
            SyncError::Fetch { .. } => SyncStage::Fetching,
            SyncError::Precondition { .. } => SyncStage::Transforming,
            SyncError::Write { .. } => SyncStage::Writing,
        }
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
