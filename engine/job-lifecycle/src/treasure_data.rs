//! Treasure Data REST API adapter

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{Connector, JobClient, ResultChunks};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::job::{Engine, JobId, JobOutcome, JobState, JobStatus, WireFormat};

/// Opens a fresh HTTP session per run
#[derive(Debug, Clone)]
pub struct TreasureDataConnector {
    config: ClientConfig,
}

impl TreasureDataConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for TreasureDataConnector {
    async fn connect(&self) -> Result<Box<dyn JobClient>, ClientError> {
        let api_key = self.config.api_key().map_err(|e| ClientError::remote(e.to_string()))?;
        let client = TreasureDataClient::new(
            &self.config.endpoint,
            api_key,
            self.config.request_timeout(),
        )?;
        Ok(Box::new(client))
    }
}

/// One HTTP session against the job API
#[derive(Debug)]
pub struct TreasureDataClient {
    http: Client,
    endpoint: Url,
    closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for JobId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(id) => JobId::new(id),
            RawId::Number(id) => JobId::new(id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    job_id: RawId,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    job_id: RawId,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    job_id: RawId,
    status: String,
    #[serde(default)]
    debug: Option<DebugInfo>,
    #[serde(default)]
    result_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DebugInfo {
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    cmdout: Option<String>,
}

impl From<ShowResponse> for JobOutcome {
    fn from(show: ShowResponse) -> Self {
        let debug = show.debug.unwrap_or_default();
        JobOutcome {
            job_id: show.job_id.into(),
            state: JobState::from(show.status.as_str()),
            stderr: debug.stderr,
            cmdout: debug.cmdout,
            result_size: show.result_size,
        }
    }
}

impl TreasureDataClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClientError::remote(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ClientError::remote(format!("Endpoint '{}' is not a base URL", endpoint)));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("TD1 {}", api_key)).map_err(|_| {
            ClientError::remote("API key contains characters not allowed in a header")
        })?;
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("td-query/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, endpoint, closed: AtomicBool::new(false) })
    }

    /// `{endpoint}/v3/{segments...}`, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::remote(format!("Endpoint '{}' is not a base URL", self.endpoint))
            })?
            .pop_if_empty()
            .push("v3")
            .extend(segments);
        Ok(url)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Turn non-success responses into errors carrying the body
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { status: status.as_u16(), body })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl JobClient for TreasureDataClient {
    async fn submit(
        &self,
        engine: Engine,
        database: &str,
        query: &str,
    ) -> Result<JobId, ClientError> {
        let url = self.url(&["job", "issue", engine.as_str(), database])?;
        info!("Issuing {} query on database {}", engine, database);

        let response = self.http.post(url).form(&[("query", query)]).send().await?;
        let issued: IssueResponse = Self::decode(response).await?;
        Ok(issued.job_id.into())
    }

    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ClientError> {
        let response = self.http.get(self.url(&["job", "status", job_id.as_str()])?).send().await?;
        let status: StatusResponse = Self::decode(response).await?;
        Ok(JobStatus::new(status.job_id.into(), JobState::from(status.status.as_str())))
    }

    async fn info(&self, job_id: &JobId) -> Result<JobOutcome, ClientError> {
        let response = self.http.get(self.url(&["job", "show", job_id.as_str()])?).send().await?;
        let show: ShowResponse = Self::decode(response).await?;
        Ok(show.into())
    }

    async fn fetch_result(
        &self,
        job_id: &JobId,
        format: WireFormat,
    ) -> Result<ResultChunks, ClientError> {
        let response = self
            .http
            .get(self.url(&["job", "result", job_id.as_str()])?)
            .query(&[("format", format.as_str())])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let chunks = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(Box::pin(chunks))
    }

    async fn kill(&self, job_id: &JobId) -> Result<(), ClientError> {
        let response = self.http.post(self.url(&["job", "kill", job_id.as_str()])?).send().await?;
        Self::check(response).await?;
        info!("Requested kill of job {}", job_id);
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed job service client for {}", self.endpoint);
        }
    }
}
