//! Configuration loading and validation.
//!
//! Sources are layered, later ones winning:
//! 1. built-in defaults;
//! 2. a configuration file (`.toml`, `.yaml`/`.yml` or `.json`), either given
//!    explicitly or `config.toml` in the platform configuration directory;
//! 3. environment variables prefixed with `TIMEKEEPER_`, with nested keys
//!    separated by a double underscore (`TIMEKEEPER_PROVIDER__API_KEY`).

pub mod error;

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use timekeeper_provider::{ClientOptions, DEFAULT_API_KEY_HEADER, Visibility};

const ENV_PREFIX: &str = "TIMEKEEPER_";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "timekeeper.db";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "timekeeper")
}

/// Which sweeper(s) a process runs.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sends newly requested scans to the provider.
    #[display("submitter")]
    Submitter,
    /// Polls the provider for the results of accepted scans.
    #[display("poller")]
    Poller,
}
impl FromStr for Role {
    type Err = ErrorKind;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitter" => Ok(Self::Submitter),
            "poller" => Ok(Self::Poller),
            _ => Err(ErrorKind::Invalid("role")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = match project_dirs() {
            Some(dirs) => dirs.data_dir().join(DATABASE_FILE),
            None => PathBuf::from(DATABASE_FILE),
        };
        Self { path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Name of the request header carrying the API key.
    pub api_key_header: String,
    pub visibility: Visibility,
    pub timeout_secs: u64,
}
impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://urlscan.io/api/v1".to_string(),
            api_key: String::new(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            visibility: Visibility::default(),
            timeout_secs: 30,
        }
    }
}
impl ProviderConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            api_key_header: self.api_key_header.clone(),
            visibility: self.visibility,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Sweep cadence. Intervals are measured from the end of the previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub submission_interval_secs: u64,
    pub status_interval_secs: u64,
    /// How long to back off after a throttle without a usable reset time.
    pub fallback_backoff_secs: u64,
}
impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            submission_interval_secs: 10,
            status_interval_secs: 60,
            fallback_backoff_secs: 60,
        }
    }
}
impl SweepConfig {
    pub fn submission_interval(&self) -> Duration {
        Duration::from_secs(self.submission_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn fallback_backoff(&self) -> Duration {
        Duration::from_secs(self.fallback_backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// A user can't request the same URL twice within this window, and
    /// results younger than this are shared between users.
    pub dedupe_window_secs: u64,
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dedupe_window_secs: 24 * 60 * 60,
        }
    }
}
impl ScanConfig {
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_secs(self.dedupe_window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub sweep: SweepConfig,
    pub scan: ScanConfig,
    /// Sweepers started by `run` when no role is given on the command line.
    pub roles: Vec<Role>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            provider: ProviderConfig::default(),
            sweep: SweepConfig::default(),
            scan: ScanConfig::default(),
            roles: vec![Role::Submitter, Role::Poller],
        }
    }
}

impl Config {
    /// Location of the configuration file used when none is given.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Build the layered configuration sources without extracting them.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    tracing::error!(path = %path.display(), "Configuration file does not exist");
                    exn::bail!(ErrorKind::Load);
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                if let Some(path) = Self::default_path().filter(|path| path.is_file()) {
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("provider.base_url"));
        }
        if self.provider.api_key_header.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("provider.api_key_header"));
        }
        if self.provider.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("provider.timeout_secs"));
        }
        if self.sweep.submission_interval_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sweep.submission_interval_secs"));
        }
        if self.sweep.status_interval_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sweep.status_interval_secs"));
        }
        if self.sweep.fallback_backoff_secs == 0 {
            exn::bail!(ErrorKind::Invalid("sweep.fallback_backoff_secs"));
        }
        if self.scan.dedupe_window_secs == 0 {
            exn::bail!(ErrorKind::Invalid("scan.dedupe_window_secs"));
        }
        if self.roles.is_empty() {
            exn::bail!(ErrorKind::Invalid("roles"));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    tracing::debug!(path = %path.display(), "Reading configuration file");
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::Invalid("configuration file extension")),
    })
}
