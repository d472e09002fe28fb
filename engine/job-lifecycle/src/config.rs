//! Configuration for the job lifecycle
//!
//! Settings are layered: built-in defaults, then the account profile
//! (`~/.td/td.conf`, INI), then `TDQUERY_*` environment variables, and
//! finally `TD_API_KEY` / `TD_API_SERVER`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "https://api.treasuredata.com";
pub const DEFAULT_INITIAL_WAIT_MS: u64 = 1_000;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_WAIT_MS: u64 = 30_000;
pub const DEFAULT_JITTER: f64 = 0.2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryServiceConfig {
    /// Remote service connection settings
    pub client: ClientConfig,

    /// Poll backoff settings
    pub backoff: BackoffConfig,
}

/// Connection settings for the remote job service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API
    pub endpoint: String,

    /// API key sent with every request
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Profile the settings were read from, for diagnostics
    #[serde(skip)]
    pub profile: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            profile: None,
        }
    }
}

impl ClientConfig {
    /// The API key, or an error naming where it was looked for
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().filter(|key| !key.is_empty()).ok_or_else(|| {
            ConfigError::MissingApiKey {
                profile: self
                    .profile
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "the account profile".to_string()),
            }
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Exponential backoff settings for status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First wait in milliseconds
    pub initial_wait_ms: u64,

    /// Growth factor applied per attempt
    pub multiplier: f64,

    /// Ceiling for any single wait in milliseconds
    pub max_wait_ms: u64,

    /// Upward jitter as a fraction of the base wait (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_wait_ms: DEFAULT_INITIAL_WAIT_MS,
            multiplier: DEFAULT_MULTIPLIER,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl BackoffConfig {
    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_wait_ms == 0 {
            return Err(ConfigError::invalid("backoff initial_wait_ms must be greater than 0"));
        }

        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid("backoff multiplier must be at least 1.0"));
        }

        if self.max_wait_ms < self.initial_wait_ms {
            return Err(ConfigError::invalid(
                "backoff max_wait_ms must not be smaller than initial_wait_ms",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::invalid("backoff jitter must be between 0.0 and 1.0"));
        }

        Ok(())
    }
}

/// Default account profile location: `$HOME/.td/td.conf`
pub fn default_profile_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".td").join("td.conf"))
}

impl QueryServiceConfig {
    /// Load configuration from the profile and the process environment
    pub fn load(profile: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_overrides(
            profile,
            std::env::var("TD_API_KEY").ok(),
            std::env::var("TD_API_SERVER").ok(),
        )
    }

    /// Load configuration, with explicit values standing in for
    /// `TD_API_KEY` and `TD_API_SERVER`
    pub fn load_with_overrides(
        profile: Option<&Path>,
        api_key: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self, ConfigError> {
        let profile = profile.map(Path::to_path_buf).or_else(default_profile_path);

        let mut builder = Config::builder()
            .set_default("account.endpoint", DEFAULT_ENDPOINT)?
            .set_default("client.request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        if let Some(path) = &profile {
            builder = builder
                .add_source(File::from(path.as_path()).format(FileFormat::Ini).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("TDQUERY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let backoff = match settings.get::<BackoffConfig>("backoff") {
            Ok(backoff) => backoff,
            Err(config::ConfigError::NotFound(_)) => BackoffConfig::default(),
            Err(e) => return Err(e.into()),
        };
        backoff.validate()?;

        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => settings.get_string("account.endpoint")?,
        };
        let api_key = api_key.or_else(|| settings.get_string("account.apikey").ok());

        let client = ClientConfig {
            endpoint: normalize_endpoint(&endpoint),
            api_key,
            request_timeout_secs: settings.get::<u64>("client.request_timeout_secs")?,
            profile,
        };

        tracing::debug!(endpoint = %client.endpoint, "Loaded job service configuration");

        Ok(Self { client, backoff })
    }
}

/// Profiles may carry a bare host name; requests need a full base URL
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_profile(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_backoff_config_default() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_wait(), Duration::from_secs(1));
        assert_eq!(config.max_wait(), Duration::from_secs(30));
        assert_eq!(config.multiplier, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_config_validation() {
        let config = BackoffConfig { initial_wait_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = BackoffConfig { multiplier: 0.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = BackoffConfig { max_wait_ms: 10, initial_wait_ms: 100, ..Default::default() };
        assert!(config.validate().is_err());

        let config = BackoffConfig { jitter: 1.5, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reads_account_profile() {
        let profile = write_profile(
            "[account]\n  user = analyst@example.com\n  apikey = 1/abcdef\n  endpoint = api.example.com\n",
        );

        let config =
            QueryServiceConfig::load_with_overrides(Some(profile.path()), None, None).unwrap();
        assert_eq!(config.client.api_key().unwrap(), "1/abcdef");
        assert_eq!(config.client.endpoint, "https://api.example.com");
        assert_eq!(config.backoff, BackoffConfig::default());
    }

    #[test]
    fn test_overrides_win_over_profile() {
        let profile = write_profile("[account]\napikey = from-profile\n");

        let config = QueryServiceConfig::load_with_overrides(
            Some(profile.path()),
            Some("from-env".to_string()),
            Some("http://localhost:8080/".to_string()),
        )
        .unwrap();
        assert_eq!(config.client.api_key().unwrap(), "from-env");
        assert_eq!(config.client.endpoint, "http://localhost:8080");
    }

    #[test]
    fn test_missing_profile_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("td.conf");

        let config = QueryServiceConfig::load_with_overrides(Some(&missing), None, None).unwrap();
        assert_eq!(config.client.endpoint, DEFAULT_ENDPOINT);
        assert!(matches!(config.client.api_key(), Err(ConfigError::MissingApiKey { .. })));
    }
}
