//! Job lifecycle controller
//!
//! Drives one query from submission to a drained result:
//! `Submitted -> Polling -> Terminal -> ValidatingOutcome -> Fetching -> Done`,
//! with any state able to fall into `Failed`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::client::{Connector, JobClient, Session};
use crate::config::BackoffConfig;
use crate::error::{ClientError, ConfigError, FailureKind, LifecycleError};
use crate::job::{JobId, JobStatus, Query, ResultFormat};
use crate::result::{drain, ResultStream};

/// Position of a run in the job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Submitted,
    Polling,
    Terminal,
    ValidatingOutcome,
    Fetching,
    Done,
    Failed(FailureKind),
}

impl LifecycleState {
    pub fn is_final(&self) -> bool {
        matches!(self, LifecycleState::Done | LifecycleState::Failed(_))
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Submitted => f.write_str("submitted"),
            LifecycleState::Polling => f.write_str("polling"),
            LifecycleState::Terminal => f.write_str("terminal"),
            LifecycleState::ValidatingOutcome => f.write_str("validating-outcome"),
            LifecycleState::Fetching => f.write_str("fetching"),
            LifecycleState::Done => f.write_str("done"),
            LifecycleState::Failed(kind) => write!(f, "failed({:?})", kind),
        }
    }
}

/// Per-run bookkeeping. Lives outside the run future so a deadline
/// wrapper can still see how far the run got once it has been cancelled.
#[derive(Debug, Default)]
struct RunTracker {
    job_id: Option<JobId>,
    state: Option<LifecycleState>,
    status_calls: usize,
}

impl RunTracker {
    fn transition(&mut self, next: LifecycleState) {
        let job_id = self.job_id.as_ref().map(JobId::as_str).unwrap_or("-");
        match self.state {
            Some(previous) => debug!(job_id, "Lifecycle {} -> {}", previous, next),
            None => debug!(job_id, "Lifecycle -> {}", next),
        }
        self.state = Some(next);
    }
}

/// Runs queries against a remote job service, one session per run
pub struct JobLifecycleController {
    connector: Arc<dyn Connector>,
    backoff: BackoffConfig,
}

impl JobLifecycleController {
    /// Fails if `backoff` would not produce positive, bounded waits
    pub fn new(connector: Arc<dyn Connector>, backoff: BackoffConfig) -> Result<Self, ConfigError> {
        backoff.validate()?;
        Ok(Self { connector, backoff })
    }

    pub fn backoff_config(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Run `query` to completion and return its drained result.
    ///
    /// Polls without an upper bound; see [`Self::run_with_deadline`].
    pub async fn run(
        &self,
        query: &Query,
        format: ResultFormat,
    ) -> Result<ResultStream, LifecycleError> {
        let session = self.open_session().await?;
        let mut tracker = RunTracker::default();

        let result = self.drive(session.client(), query, format, &mut tracker).await;
        Self::finish(&mut tracker, &result);
        result
    }

    /// Like [`Self::run`], but gives up once `deadline` has elapsed.
    ///
    /// On expiry the submitted job (if any) is asked to stop before the
    /// session is released.
    pub async fn run_with_deadline(
        &self,
        query: &Query,
        format: ResultFormat,
        deadline: Duration,
    ) -> Result<ResultStream, LifecycleError> {
        let session = self.open_session().await?;
        let mut tracker = RunTracker::default();

        let timed = tokio::time::timeout(
            deadline,
            self.drive(session.client(), query, format, &mut tracker),
        )
        .await;

        let result = match timed {
            Ok(result) => result,
            Err(_) => {
                warn!("Query did not finish within {:?}", deadline);
                if let Some(job_id) = &tracker.job_id {
                    if let Err(e) = session.client().kill(job_id).await {
                        warn!(job_id = %job_id, "Failed to kill timed out job: {}", e);
                    }
                }
                Err(LifecycleError::Timeout { job_id: tracker.job_id.clone(), after: deadline })
            }
        };

        Self::finish(&mut tracker, &result);
        result
    }

    async fn open_session(&self) -> Result<Session, LifecycleError> {
        let client = self.connector.connect().await.map_err(LifecycleError::Connect)?;
        Ok(Session::new(client))
    }

    fn finish(tracker: &mut RunTracker, result: &Result<ResultStream, LifecycleError>) {
        match result {
            Ok(_) => {
                info!(status_calls = tracker.status_calls, "Query finished");
            }
            Err(e) => {
                tracker.transition(LifecycleState::Failed(e.kind()));
                warn!("Query failed: {}", e);
            }
        }
    }

    async fn drive(
        &self,
        client: &dyn JobClient,
        query: &Query,
        format: ResultFormat,
        tracker: &mut RunTracker,
    ) -> Result<ResultStream, LifecycleError> {
        let job_id = client
            .submit(query.engine(), query.database(), query.text())
            .await
            .map_err(LifecycleError::Submission)?;
        tracker.job_id = Some(job_id.clone());
        tracker.transition(LifecycleState::Submitted);
        info!(job_id = %job_id, engine = %query.engine(), "Submitted query job");

        let status = self.poll_until_terminal(client, &job_id, tracker).await?;

        tracker.transition(LifecycleState::ValidatingOutcome);
        let outcome = client.info(&job_id).await.map_err(LifecycleError::Remote)?;
        if let Some(diagnostic) = outcome.diagnostic() {
            return Err(LifecycleError::JobExecution {
                job_id,
                diagnostic: diagnostic.to_string(),
            });
        }
        if !status.state.is_success() {
            return Err(LifecycleError::JobFailed { job_id, state: status.state });
        }

        tracker.transition(LifecycleState::Fetching);
        let wire_format = format.wire_format();
        debug!(job_id = %job_id, format = %wire_format, "Fetching job result");

        let chunks = client
            .fetch_result(&job_id, wire_format)
            .await
            .map_err(|source| LifecycleError::ResultRead { job_id: job_id.clone(), source })?;
        let body = drain(chunks).await.map_err(|e| LifecycleError::ResultRead {
            job_id: job_id.clone(),
            source: ClientError::Io(e),
        })?;

        tracker.transition(LifecycleState::Done);
        Ok(ResultStream::new(format, body))
    }

    /// One status call per iteration, sleeping the backoff wait in between
    async fn poll_until_terminal(
        &self,
        client: &dyn JobClient,
        job_id: &JobId,
        tracker: &mut RunTracker,
    ) -> Result<JobStatus, LifecycleError> {
        let mut backoff = BackoffPolicy::from_validated(self.backoff.clone());
        tracker.transition(LifecycleState::Polling);

        loop {
            let status = client.status(job_id).await.map_err(LifecycleError::Remote)?;
            tracker.status_calls += 1;

            if status.is_terminal() {
                tracker.transition(LifecycleState::Terminal);
                info!(job_id = %job_id, state = %status.state, "Job reached terminal state");
                return Ok(status);
            }

            let wait = backoff.next_wait();
            debug!(
                job_id = %job_id,
                state = %status.state,
                wait_ms = wait.as_millis() as u64,
                "Job still in progress"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
