//! Configuration file handling.
//!
//! The config is a single JSON file: an API descriptor, disable-policy
//! thresholds, a list of proxy lines, and the `lifetimes` map carried over
//! from earlier runs. Saving writes a `.backup` copy of the previous file
//! first. Unknown top-level keys are preserved across a load/save cycle.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::{FieldEquals, ValidationRules};
use crate::error::ConfigError;
use crate::policy::DisablePolicyConfig;
use crate::proxy::Proxy;
use crate::report::{LifetimeRecord, ProxyOutcome};

/// Validation rules as they appear in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_value: Option<Value>,
    #[serde(default)]
    pub cloudflare_indicators: Vec<String>,
    #[serde(default)]
    pub ratelimit_indicators: Vec<String>,
}

impl ValidationConfig {
    /// Convert to the classifier's rule set. The success-field rule only
    /// exists when `success_field` is set; a missing `success_value`
    /// defaults to `true`.
    pub fn rules(&self) -> ValidationRules {
        ValidationRules {
            cloudflare_indicators: self.cloudflare_indicators.clone(),
            ratelimit_indicators: self.ratelimit_indicators.clone(),
            success_rule: self.success_field.as_ref().map(|field| FieldEquals {
                field: field.clone(),
                expected: self.success_value.clone().unwrap_or(Value::Bool(true)),
            }),
        }
    }
}

/// Descriptor of the target API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl ApiConfig {
    pub fn method(&self) -> http::Method {
        // Validated at load time; GET only as a last resort.
        http::Method::from_bytes(self.method.as_bytes()).unwrap_or(http::Method::GET)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.url).map_err(|source| ConfigError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        http::Method::from_bytes(self.method.as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(self.method.clone()))?;
        Ok(())
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub policy: DisablePolicyConfig,
    #[serde(default)]
    pub proxies: Vec<String>,
    /// Lifetime records from this and earlier runs, keyed by `host:port`.
    #[serde(default)]
    pub lifetimes: BTreeMap<String, LifetimeRecord>,
    /// Optional cap on requests per proxy; absent means proxies run until
    /// disabled or cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_budget: Option<u64>,
    /// Top-level keys this tool does not interpret, kept for round-tripping.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl AppConfig {
    /// Load and validate the configuration. Any problem here is fatal:
    /// without a target and proxies there is nothing to test.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.api.validate()?;
        // Surface malformed proxy lines at load time, not mid-run.
        config.parse_proxies()?;
        Ok(config)
    }

    /// Parse every proxy line.
    pub fn parse_proxies(&self) -> Result<Vec<Proxy>, ConfigError> {
        self.proxies.iter().map(|line| Proxy::parse_line(line)).collect()
    }

    /// Fold a finished run back in: rewrite the proxy lines with their
    /// current status tokens and merge the new lifetime records.
    pub fn apply_run(&mut self, proxies: &[Proxy], records: Vec<LifetimeRecord>) {
        self.proxies = proxies.iter().map(Proxy::to_line).collect();
        for record in records {
            self.lifetimes.insert(record.ip.clone(), record);
        }
    }

    /// Save the configuration, backing up the previous file to
    /// `<path>.backup` first.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            let backup = format!("{}.backup", path.display());
            std::fs::copy(path, &backup).map_err(|source| ConfigError::Write {
                path: backup.clone(),
                source,
            })?;
            info!("config backup written to {}", backup);
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Write the per-proxy results file.
pub fn write_results(path: &Path, outcomes: &[ProxyOutcome]) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(outcomes)?;
    std::fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}
