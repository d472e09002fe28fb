//! Error types for the job lifecycle

use std::time::Duration;

use thiserror::Error;

use crate::job::{JobId, JobState};

/// Errors raised by a [`JobClient`](crate::client::JobClient) implementation
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure (connect, TLS, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-success status code
    #[error("Remote service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The remote service answered with a body we could not decode
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O errors while reading a result body
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic remote failure with a message
    #[error("{0}")]
    Remote(String),
}

impl ClientError {
    /// Create a new generic remote error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }
}

/// Coarse failure classification, used by the lifecycle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connect,
    Submission,
    Remote,
    JobExecution,
    JobFailed,
    ResultRead,
    Timeout,
}

/// Errors that abort a [`JobLifecycleController`](crate::JobLifecycleController) run
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to open a session with the job service: {0}")]
    Connect(#[source] ClientError),

    #[error("Job submission failed: {0}")]
    Submission(#[source] ClientError),

    /// The job reached a terminal state but its diagnostic channel is non-empty.
    /// Displays the diagnostic verbatim.
    #[error("{diagnostic}")]
    JobExecution { job_id: JobId, diagnostic: String },

    #[error("Job {job_id} finished in state {state}")]
    JobFailed { job_id: JobId, state: JobState },

    #[error("Failed to read result of job {job_id}: {source}")]
    ResultRead {
        job_id: JobId,
        #[source]
        source: ClientError,
    },

    /// Unclassified remote failure while polling or reading job details
    #[error("{0}")]
    Remote(#[source] ClientError),

    #[error("Query did not finish within {after:?}")]
    Timeout { job_id: Option<JobId>, after: Duration },
}

impl LifecycleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connect(_) => FailureKind::Connect,
            Self::Submission(_) => FailureKind::Submission,
            Self::JobExecution { .. } => FailureKind::JobExecution,
            Self::JobFailed { .. } => FailureKind::JobFailed,
            Self::ResultRead { .. } => FailureKind::ResultRead,
            Self::Remote(_) => FailureKind::Remote,
            Self::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No API key configured; set TD_API_KEY or add `apikey` under [account] in {profile}")]
    MissingApiKey { profile: String },
}

impl ConfigError {
    /// Create a new validation error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_execution_displays_diagnostic_verbatim() {
        let err = LifecycleError::JobExecution {
            job_id: JobId::new("42"),
            diagnostic: "syntax error near FROM".to_string(),
        };
        assert_eq!(err.to_string(), "syntax error near FROM");
        assert_eq!(err.kind(), FailureKind::JobExecution);
    }

    #[test]
    fn test_remote_error_carries_underlying_message() {
        let err = LifecycleError::Remote(ClientError::remote("connection reset"));
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(err.kind(), FailureKind::Remote);
    }
}
