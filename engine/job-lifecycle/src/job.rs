//! Job model: queries, handles, status snapshots and outcomes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Query execution engine the job is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Interactive engine
    #[default]
    Presto,
    /// Batch engine
    Hive,
}

impl Engine {
    /// Tag used by the remote service to select the engine
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Presto => "presto",
            Engine::Hive => "hive",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "presto" => Ok(Engine::Presto),
            "hive" => Ok(Engine::Hive),
            other => Err(format!("unknown engine '{}', expected 'presto' or 'hive'", other)),
        }
    }
}

/// An immutable query ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    database: String,
    text: String,
    engine: Engine,
}

impl Query {
    pub fn new(database: impl Into<String>, text: impl Into<String>, engine: Engine) -> Self {
        Self { database: database.into(), text: text.into(), engine }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }
}

/// Opaque job handle issued by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote job state as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Booting,
    Running,
    Success,
    Error,
    Killed,
    /// A state this client does not know about; treated as still in progress
    Unknown(String),
}

impl JobState {
    /// No further progress occurs from a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Error | JobState::Killed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Queued => "queued",
            JobState::Booting => "booting",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Error => "error",
            JobState::Killed => "killed",
            JobState::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for JobState {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "queued" => JobState::Queued,
            "booting" => JobState::Booting,
            "running" => JobState::Running,
            "success" => JobState::Success,
            "error" => JobState::Error,
            "killed" => JobState::Killed,
            _ => JobState::Unknown(raw.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status snapshot from one poll; replaced wholesale by the next poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
}

impl JobStatus {
    pub fn new(job_id: JobId, state: JobState) -> Self {
        Self { job_id, state }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Detailed job record read once the job is terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub state: JobState,
    /// Backend-side error output. Authoritative over `state`.
    pub stderr: Option<String>,
    pub cmdout: Option<String>,
    pub result_size: Option<u64>,
}

impl JobOutcome {
    /// The diagnostic text, if the backend reported any
    pub fn diagnostic(&self) -> Option<&str> {
        self.stderr.as_deref().filter(|text| !text.is_empty())
    }
}

/// Output format requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Tabular,
    Csv,
}

impl ResultFormat {
    /// Wire format requested from the backend for this output format
    pub fn wire_format(&self) -> WireFormat {
        match self {
            ResultFormat::Tabular => WireFormat::Tsv,
            ResultFormat::Csv => WireFormat::Csv,
        }
    }
}

impl FromStr for ResultFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tabular" => Ok(ResultFormat::Tabular),
            "csv" => Ok(ResultFormat::Csv),
            other => Err(format!("unknown format '{}', expected 'tabular' or 'csv'", other)),
        }
    }
}

/// Result encoding understood by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Tsv,
    Csv,
}

impl WireFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::Tsv => "tsv",
            WireFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping_is_exact() {
        assert_eq!(ResultFormat::Tabular.wire_format(), WireFormat::Tsv);
        assert_eq!(ResultFormat::Csv.wire_format(), WireFormat::Csv);
        assert_eq!(ResultFormat::default(), ResultFormat::Tabular);
    }

    #[test]
    fn test_terminal_states() {
        for state in [JobState::Success, JobState::Error, JobState::Killed] {
            assert!(state.is_terminal(), "{} should be terminal", state);
        }
        for state in [JobState::Queued, JobState::Booting, JobState::Running] {
            assert!(!state.is_terminal(), "{} should not be terminal", state);
        }
        assert!(!JobState::from("uploading").is_terminal());
        assert_eq!(JobState::from("SUCCESS"), JobState::Success);
    }

    #[test]
    fn test_diagnostic_is_any_non_empty_stderr() {
        let mut outcome = JobOutcome {
            job_id: JobId::new("1"),
            state: JobState::Success,
            stderr: Some(String::new()),
            cmdout: None,
            result_size: None,
        };
        assert_eq!(outcome.diagnostic(), None);

        outcome.stderr = Some("\n".to_string());
        assert_eq!(outcome.diagnostic(), Some("\n"));

        outcome.stderr = Some("syntax error near FROM".to_string());
        assert_eq!(outcome.diagnostic(), Some("syntax error near FROM"));
    }

    #[test]
    fn test_engine_parsing() {
        assert_eq!("presto".parse::<Engine>(), Ok(Engine::Presto));
        assert_eq!("Hive".parse::<Engine>(), Ok(Engine::Hive));
        assert!("spark".parse::<Engine>().is_err());
        assert_eq!(Engine::default(), Engine::Presto);
    }
}
