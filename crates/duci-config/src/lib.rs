//! Boot-time configuration for duci.
//!
//! The configuration file is YAML; `${VAR}` references are expanded from
//! the process environment while loading. The loaded value is immutable:
//! `main` constructs it once and shares it by reference.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Process-wide configuration, read-only after boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub server: Server,
    pub github: GitHub,
    pub job: Job,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Server {
    pub workdir: PathBuf,
    pub port: u16,
    pub database_path: PathBuf,
    pub ssh_key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitHub {
    /// Sensitive; rendered as `"***"` by `Display`.
    #[serde(serialize_with = "redact")]
    pub api_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    /// Whole-job timeout in seconds. 0 means no timeout.
    pub timeout: u64,
    /// Maximum number of concurrently running jobs.
    pub concurrency: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            server: Server::default(),
            github: GitHub::default(),
            job: Job::default(),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            workdir: std::env::temp_dir().join("duci"),
            port: 8823,
            database_path: PathBuf::from(".duci/db"),
            ssh_key_path: std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(".ssh/id_rsa"),
        }
    }
}

impl Default for GitHub {
    fn default() -> Self {
        Self {
            api_token: String::new(),
        }
    }
}

impl Default for Job {
    fn default() -> Self {
        Self {
            timeout: 600,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

impl Configuration {
    /// Load the configuration from a YAML file, expanding `${VAR}`
    /// references from the process environment. Unset variables are left
    /// verbatim. Absent keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let expanded = expand_env(&raw);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Listen address, `":<port>"`.
    pub fn addr(&self) -> String {
        format!(":{}", self.server.port)
    }

    /// Whole-job timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.job.timeout)
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&rendered)
    }
}

fn expand_env(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

fn redact<S: Serializer>(_token: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str("***")
}
