// ABOUTME: Router configuration: stage-1 policy, arbitration settings, timeouts, and oracle endpoint.
// ABOUTME: Loaded from JSON under the user config dir, with AGENT_ROUTER_* environment overrides.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::arbiter::DEFAULT_SKIP_THRESHOLD;
use crate::orchestrator::types::SelectionMode;

const CONFIG_DIR_NAME: &str = "agent-router";
const CONFIG_FILE_NAME: &str = "router.json";
const ENV_PREFIX: &str = "AGENT_ROUTER_";

/// Fast, cheap model used for arbitration when none is configured.
pub const DEFAULT_ORACLE_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Types
// =============================================================================

/// Chat completions endpoint used as the routing oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            api_key: None,
            timeout_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Stage-1 score floor. Zero scores never qualify regardless.
    pub min_score: f64,
    pub max_candidates: Option<usize>,
    /// Restrict stage 1 to workers sharing any of these tags.
    pub candidate_tags: Option<BTreeSet<String>>,
    /// Candidate counts at or below this skip arbitration.
    pub arbitration_skip_threshold: usize,
    pub fallback_on_arbitration_error: bool,
    pub selection_mode: SelectionMode,
    pub invocation_timeout_ms: u64,
    pub tracking_buffer: usize,
    pub oracle: Option<OracleConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            max_candidates: Some(5),
            candidate_tags: None,
            arbitration_skip_threshold: DEFAULT_SKIP_THRESHOLD,
            fallback_on_arbitration_error: true,
            selection_mode: SelectionMode::MultiSelect,
            invocation_timeout_ms: 30_000,
            tracking_buffer: 256,
            oracle: None,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl RouterConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// `<config dir>/agent-router/router.json`, when a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the default file if present, apply environment overrides, validate.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("[Config] Loading {}", path.display());
                Self::load(&path)?
            }
            _ => {
                log::debug!("[Config] No config file, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AGENT_ROUTER_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Keys are full variable names.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("MIN_SCORE") {
            self.min_score = parse_value("MIN_SCORE", &v)?;
        }
        if let Some(v) = get("MAX_CANDIDATES") {
            self.max_candidates = match v.as_str() {
                "none" | "unlimited" => None,
                _ => Some(parse_value("MAX_CANDIDATES", &v)?),
            };
        }
        if let Some(v) = get("CANDIDATE_TAGS") {
            let tags: BTreeSet<String> = v
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            self.candidate_tags = (!tags.is_empty()).then_some(tags);
        }
        if let Some(v) = get("SKIP_THRESHOLD") {
            self.arbitration_skip_threshold = parse_value("SKIP_THRESHOLD", &v)?;
        }
        if let Some(v) = get("FALLBACK") {
            self.fallback_on_arbitration_error = parse_value("FALLBACK", &v)?;
        }
        if let Some(v) = get("SELECTION_MODE") {
            self.selection_mode = serde_json::from_value(serde_json::Value::String(v.clone()))
                .map_err(|_| invalid_env("SELECTION_MODE", &v))?;
        }
        if let Some(v) = get("TIMEOUT_MS") {
            self.invocation_timeout_ms = parse_value("TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("TRACKING_BUFFER") {
            self.tracking_buffer = parse_value("TRACKING_BUFFER", &v)?;
        }

        if let Some(url) = get("ORACLE_URL") {
            self.oracle.get_or_insert_with(OracleConfig::default).base_url = url;
        }
        if let Some(oracle) = self.oracle.as_mut() {
            if let Some(model) = get("ORACLE_MODEL") {
                oracle.model = model;
            }
            if let Some(key) = get("ORACLE_API_KEY") {
                oracle.api_key = Some(key);
            }
            if let Some(v) = get("ORACLE_TIMEOUT_MS") {
                oracle.timeout_ms = parse_value("ORACLE_TIMEOUT_MS", &v)?;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_score.is_finite() || !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::Invalid(format!(
                "min_score must be within [0, 1], got {}",
                self.min_score
            )));
        }
        if self.max_candidates == Some(0) {
            return Err(ConfigError::Invalid(
                "max_candidates must be positive".to_string(),
            ));
        }
        if self.invocation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "invocation_timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(oracle) = &self.oracle {
            let parsed = url::Url::parse(&oracle.base_url).map_err(|e| {
                ConfigError::Invalid(format!("oracle base_url {:?}: {}", oracle.base_url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "oracle base_url must be http(s), got {}",
                    parsed.scheme()
                )));
            }
            if oracle.model.trim().is_empty() {
                return Err(ConfigError::Invalid("oracle model is empty".to_string()));
            }
            if oracle.timeout_ms == 0 {
                return Err(ConfigError::Invalid(
                    "oracle timeout_ms must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }
}

fn parse_value<T: std::str::FromStr>(suffix: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid_env(suffix, value))
}

fn invalid_env(suffix: &str, value: &str) -> ConfigError {
    ConfigError::Invalid(format!("{}{}={:?} is not valid", ENV_PREFIX, suffix, value))
}
