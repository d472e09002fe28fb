//! Scripted in-memory job service
//!
//! Plays back a fixed job history and records every call made against it.
//! Used by the test suites of this crate and of the command-line tool.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use crate::client::{Connector, JobClient, ResultChunks};
use crate::error::ClientError;
use crate::job::{Engine, JobId, JobOutcome, JobState, JobStatus, WireFormat};

/// Step at which a scripted failure is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Connect,
    Submit,
    Status,
    Info,
    Fetch,
    /// The result request succeeds but the body breaks off half way
    Drain,
}

/// The job history to play back
#[derive(Debug, Clone)]
pub struct Script {
    job_id: JobId,
    pending_polls: usize,
    terminal_state: JobState,
    diagnostic: Option<String>,
    body: String,
    failure: Option<ScriptStep>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            job_id: JobId::new("1"),
            pending_polls: 0,
            terminal_state: JobState::Success,
            diagnostic: None,
            body: String::new(),
            failure: None,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = JobId::new(job_id);
        self
    }

    /// Number of status polls answered with `running` before the terminal state
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Job stays `running` forever
    pub fn never_finishes(self) -> Self {
        self.with_pending_polls(usize::MAX)
    }

    pub fn with_terminal_state(mut self, state: JobState) -> Self {
        self.terminal_state = state;
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn with_result_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn failing_at(mut self, step: ScriptStep) -> Self {
        self.failure = Some(step);
        self
    }

    fn fails_at(&self, step: ScriptStep) -> bool {
        self.failure == Some(step)
    }
}

/// A recorded submit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub engine: Engine,
    pub database: String,
    pub query: String,
}

/// Everything the scripted service was asked to do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub connects: usize,
    pub closes: usize,
    pub submissions: Vec<Submission>,
    pub status_calls: usize,
    pub info_calls: usize,
    pub fetches: Vec<WireFormat>,
    pub kills: Vec<JobId>,
}

impl CallLog {
    /// Sessions opened but not yet released
    pub fn open_sessions(&self) -> usize {
        self.connects.saturating_sub(self.closes)
    }
}

/// Connector handing out [`ScriptedClient`] sessions
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    script: Script,
    log: Arc<Mutex<CallLog>>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self { script, log: Arc::new(Mutex::new(CallLog::default())) }
    }

    /// Snapshot of the calls made so far, across all sessions
    pub fn calls(&self) -> CallLog {
        self.log.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn JobClient>, ClientError> {
        if self.script.fails_at(ScriptStep::Connect) {
            return Err(ClientError::remote("connection refused"));
        }

        self.log.lock().connects += 1;
        Ok(Box::new(ScriptedClient {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
            polls: AtomicUsize::new(0),
        }))
    }
}

/// One session of the scripted service
#[derive(Debug)]
pub struct ScriptedClient {
    script: Script,
    log: Arc<Mutex<CallLog>>,
    polls: AtomicUsize,
}

#[async_trait]
impl JobClient for ScriptedClient {
    async fn submit(
        &self,
        engine: Engine,
        database: &str,
        query: &str,
    ) -> Result<JobId, ClientError> {
        self.log.lock().submissions.push(Submission {
            engine,
            database: database.to_string(),
            query: query.to_string(),
        });

        if self.script.fails_at(ScriptStep::Submit) {
            return Err(ClientError::Status { status: 401, body: "invalid API key".to_string() });
        }
        Ok(self.script.job_id.clone())
    }

    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ClientError> {
        self.log.lock().status_calls += 1;

        if self.script.fails_at(ScriptStep::Status) {
            return Err(ClientError::remote("status endpoint unavailable"));
        }

        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        let state = if poll < self.script.pending_polls {
            JobState::Running
        } else {
            self.script.terminal_state.clone()
        };
        Ok(JobStatus::new(job_id.clone(), state))
    }

    async fn info(&self, job_id: &JobId) -> Result<JobOutcome, ClientError> {
        self.log.lock().info_calls += 1;

        if self.script.fails_at(ScriptStep::Info) {
            return Err(ClientError::remote("job details unavailable"));
        }

        Ok(JobOutcome {
            job_id: job_id.clone(),
            state: self.script.terminal_state.clone(),
            stderr: self.script.diagnostic.clone(),
            cmdout: None,
            result_size: Some(self.script.body.len() as u64),
        })
    }

    async fn fetch_result(
        &self,
        _job_id: &JobId,
        format: WireFormat,
    ) -> Result<ResultChunks, ClientError> {
        self.log.lock().fetches.push(format);

        if self.script.fails_at(ScriptStep::Fetch) {
            return Err(ClientError::Status { status: 404, body: "result not found".to_string() });
        }

        let bytes = self.script.body.as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let last = if self.script.fails_at(ScriptStep::Drain) {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
        } else {
            Ok(tail.to_vec())
        };

        Ok(Box::pin(stream::iter(vec![Ok(head.to_vec()), last])))
    }

    async fn kill(&self, job_id: &JobId) -> Result<(), ClientError> {
        self.log.lock().kills.push(job_id.clone());
        Ok(())
    }

    fn close(&self) {
        self.log.lock().closes += 1;
    }
}
