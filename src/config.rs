use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use std::time::Duration;
use anyhow::{bail, Result};

use crate::trace::DEFAULT_SPAN_OP;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for this crate's targets: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Extra EnvFilter directives appended after the crate level (e.g. "ldap3=warn").
    pub directives: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Operation name recorded on every search span.
    #[serde(default = "default_span_op")]
    pub span_op: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Deadline for a single search in seconds. Unset or 0 means no deadline
    /// beyond the client connection itself.
    pub timeout_sec: Option<u64>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_span_op() -> String {
    DEFAULT_SPAN_OP.to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directives: None,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            span_op: default_span_op(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_sec.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.log.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("Invalid log level: {}", other),
        }
        if self.tracing.span_op.trim().is_empty() {
            bail!("tracing.span_op must not be empty");
        }
        Ok(())
    }

    /// EnvFilter directive string for the subscriber, `--debug` wins over the configured level.
    pub fn env_filter(&self, debug: bool) -> String {
        let level = if debug { "debug" } else { self.log.level.as_str() };
        let mut filter = format!("ldap_search_request={},info", level.to_ascii_lowercase());
        if let Some(extra) = self.log.directives.as_deref().filter(|d| !d.trim().is_empty()) {
            filter.push(',');
            filter.push_str(extra.trim());
        }
        filter
    }
}
