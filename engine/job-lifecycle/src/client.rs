//! Remote job service capability traits

use std::io;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ClientError;
use crate::job::{Engine, JobId, JobOutcome, JobStatus, WireFormat};

/// Raw result body, delivered in chunks as the transport receives them
pub type ResultChunks = BoxStream<'static, io::Result<Vec<u8>>>;

/// One session with the remote job service
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Submit a query to the given engine
    async fn submit(&self, engine: Engine, database: &str, query: &str)
        -> Result<JobId, ClientError>;

    /// Fetch the current status snapshot
    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ClientError>;

    /// Fetch the detailed job record
    async fn info(&self, job_id: &JobId) -> Result<JobOutcome, ClientError>;

    /// Open the result body in the given wire format
    async fn fetch_result(
        &self,
        job_id: &JobId,
        format: WireFormat,
    ) -> Result<ResultChunks, ClientError>;

    /// Ask the service to stop a job
    async fn kill(&self, job_id: &JobId) -> Result<(), ClientError>;

    /// Release everything held for this session
    fn close(&self);
}

/// Opens sessions with the remote job service
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn JobClient>, ClientError>;
}

/// Scope guard around a [`JobClient`]; closes it exactly once when dropped.
///
/// Dropping covers every exit path of a run, including a run future that is
/// cancelled at an await point.
pub struct Session {
    client: Option<Box<dyn JobClient>>,
}

impl Session {
    pub fn new(client: Box<dyn JobClient>) -> Self {
        Self { client: Some(client) }
    }

    pub fn client(&self) -> &dyn JobClient {
        match &self.client {
            Some(client) => client.as_ref(),
            // `client` is only taken in `drop`
            None => unreachable!("session used after release"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            client.close();
            tracing::debug!("Job service session released");
        }
    }
}
