//! Configuration Management
//!
//! Loads client configuration from TOML files.
//! Configuration includes:
//! - Backend base URLs (REST API and AI orchestration)
//! - HTTP timeouts
//! - Polling cadence per execution target
//! - Session storage location

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::TutorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_ai_base_url")]
    pub ai_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Where the signed-in session is persisted (defaults to the config dir)
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// Chat history page size
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,

    #[serde(default)]
    pub polling: PollingConfig,
}

/// Poll cadence for each execution target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_playground_poll")]
    pub playground: PollSettings,
    #[serde(default = "default_problem_poll")]
    pub problem: PollSettings,
    #[serde(default = "default_problem_poll")]
    pub submit: PollSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            playground: default_playground_poll(),
            problem: default_problem_poll(),
            submit: default_problem_poll(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ai_base_url: default_ai_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            session_file: None,
            history_page_size: default_history_page_size(),
            polling: PollingConfig::default(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_ai_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_history_page_size() -> u32 {
    10
}
fn default_playground_poll() -> PollSettings {
    PollSettings {
        interval_ms: 100,
        max_attempts: 50,
    }
}
fn default_problem_poll() -> PollSettings {
    PollSettings {
        interval_ms: 500,
        max_attempts: 20,
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config: Config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => {
                let mut default_paths = vec![PathBuf::from("codetutor.toml")];
                if let Some(dir) = config_dir() {
                    default_paths.push(dir.join("config.toml"));
                }

                let mut loaded = None;
                for p in &default_paths {
                    if let Ok(content) = std::fs::read_to_string(p) {
                        loaded = Some(toml::from_str(&content).with_context(|| {
                            format!("Failed to parse config {}", p.display())
                        })?);
                        break;
                    }
                }
                loaded.unwrap_or_else(|| {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                })
            }
        };

        // Override with environment variables
        if let Ok(url) = std::env::var("CODETUTOR_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("CODETUTOR_AI_BASE_URL") {
            config.ai_base_url = url;
        }
        if let Ok(timeout) = std::env::var("CODETUTOR_TIMEOUT") {
            if let Ok(t) = timeout.parse::<u64>() {
                config.request_timeout_secs = t;
            }
        }
        if let Ok(file) = std::env::var("CODETUTOR_SESSION_FILE") {
            config.session_file = Some(PathBuf::from(file));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject base URLs that reqwest could not use.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("api_base_url", &self.api_base_url),
            ("ai_base_url", &self.ai_base_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| TutorError::Config(format!("{} '{}': {}", name, value, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(TutorError::Config(format!(
                    "{} must be http or https, got '{}'",
                    name,
                    parsed.scheme()
                ))
                .into());
            }
        }
        if self.polling.playground.max_attempts == 0
            || self.polling.problem.max_attempts == 0
            || self.polling.submit.max_attempts == 0
        {
            return Err(TutorError::Config("polling max_attempts must be at least 1".into()).into());
        }
        Ok(())
    }

    /// REST API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// AI orchestration base without a trailing slash.
    pub fn ai_base(&self) -> &str {
        self.ai_base_url.trim_end_matches('/')
    }

    pub fn session_path(&self) -> Option<PathBuf> {
        self.session_file
            .clone()
            .or_else(|| config_dir().map(|d| d.join("session.json")))
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("codetutor"))
}
