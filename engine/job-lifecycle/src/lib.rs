//! # Job Lifecycle
//!
//! Submission, polling and result retrieval for queries run as asynchronous
//! jobs on a remote analytics service.
//!
//! A [`JobLifecycleController`] opens one session per run through a
//! [`Connector`], submits the query, polls the job with exponential backoff
//! until it is terminal, checks the job's diagnostic output, and drains the
//! result into a [`ResultStream`].

pub mod backoff;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod result;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod treasure_data;

// Re-export main types for easy usage
pub use backoff::BackoffPolicy;
pub use client::{Connector, JobClient, ResultChunks, Session};
pub use config::{BackoffConfig, ClientConfig, QueryServiceConfig};
pub use controller::{JobLifecycleController, LifecycleState};
pub use error::{ClientError, ConfigError, FailureKind, LifecycleError};
pub use job::{Engine, JobId, JobOutcome, JobState, JobStatus, Query, ResultFormat, WireFormat};
pub use result::ResultStream;
pub use treasure_data::{TreasureDataClient, TreasureDataConnector};
