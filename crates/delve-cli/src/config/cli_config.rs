//! CLI configuration file support
//!
//! Loads configuration from ~/.config/delve/config.toml

use anyhow::Result;
use delve_ai::client::API_KEY_ENV;
use delve_ai::{ParallelClient, PollerConfig, Processor, SearchRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// API access
    #[serde(default)]
    pub api: ApiConfig,
    /// Deep research defaults
    #[serde(default)]
    pub research: ResearchConfig,
    /// Web search defaults
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Parallel AI API key; `PARALLEL_API_KEY` takes precedence
    pub key: Option<String>,
    /// Override for the API endpoint
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub processor: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results: Option<u32>,
    pub max_chars_per_result: Option<u32>,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring invalid config file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("delve").join("config.toml"))
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api.key.as_deref())
    }

    /// Build an API client from this configuration.
    pub fn client(&self) -> Result<ParallelClient> {
        let client = ParallelClient::new(self.api_key())?;
        Ok(match &self.api.base_url {
            Some(url) => client.with_base_url(url.as_str()),
            None => client,
        })
    }

    /// Processor tier: the explicit choice, then the config file, then `ultra`.
    pub fn processor(&self, explicit: Option<&str>) -> Result<Processor> {
        match explicit.or(self.research.processor.as_deref()) {
            Some(name) => Ok(name.parse()?),
            None => Ok(Processor::default()),
        }
    }

    pub fn poller_config(&self) -> Result<PollerConfig> {
        let defaults = PollerConfig::default();
        let config = PollerConfig {
            max_attempts: self.research.max_attempts.unwrap_or(defaults.max_attempts),
            poll_interval: self
                .research
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
        };
        config.validate()?;
        Ok(config)
    }

    /// Search request with configured limits applied.
    pub fn search_request(&self, objective: &str) -> SearchRequest {
        let mut request = SearchRequest::new(objective);
        if let Some(max_results) = self.search.max_results {
            request = request.with_max_results(max_results);
        }
        if let Some(max_chars) = self.search.max_chars_per_result {
            request = request.with_max_chars_per_result(max_chars);
        }
        request
    }
}

fn resolve_api_key(env: Option<String>, file: Option<&str>) -> Option<String> {
    env.filter(|key| !key.trim().is_empty())
        .or_else(|| file.map(str::to_string))
        .filter(|key| !key.trim().is_empty())
}
