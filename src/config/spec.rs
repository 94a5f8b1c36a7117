//! Configuration types mapping `catalog.migrate.yaml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::migrator::{NameFilter, DEFAULT_MAX_ABSENT_PASSES};
use crate::planner::TargetState;
use crate::session::DEFAULT_REPORT_DIR;
use crate::catalog::DEFAULT_PAGE_SIZE;

/// Root of the migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct MigrateConfig {
    /// Catalog objects are read from here.
    #[validate(nested)]
    pub source: EndpointConfig,
    /// Catalog objects are written here.
    #[validate(nested)]
    pub target: EndpointConfig,
    /// Run options.
    #[serde(default)]
    #[validate(nested)]
    pub migrate: MigrateSection,
    /// Logging options.
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// A catalog endpoint: exactly one of `rest` or `snapshot`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct EndpointConfig {
    /// Remote catalog reached over REST.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub rest: Option<RestEndpoint>,
    /// Catalog held in a JSON snapshot file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub snapshot: Option<SnapshotEndpoint>,
}

/// Resolved endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// REST endpoint.
    Rest(&'a RestEndpoint),
    /// Snapshot file.
    Snapshot(&'a SnapshotEndpoint),
}

impl EndpointConfig {
    /// Returns the configured endpoint, or `None` unless exactly one is set.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint<'_>> {
        match (&self.rest, &self.snapshot) {
            (Some(rest), None) => Some(Endpoint::Rest(rest)),
            (None, Some(snapshot)) => Some(Endpoint::Snapshot(snapshot)),
            _ => None,
        }
    }

    /// Stable description used to compare endpoints.
    #[must_use]
    pub fn locator(&self) -> String {
        match self.endpoint() {
            Some(Endpoint::Rest(rest)) => rest.base_url.trim_end_matches('/').to_lowercase(),
            Some(Endpoint::Snapshot(snapshot)) => snapshot.path.display().to_string(),
            None => String::new(),
        }
    }
}

/// REST endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RestEndpoint {
    /// API base URL, e.g. `https://api.example.com`.
    #[validate(url)]
    pub base_url: String,
    /// Environment variable holding the API token.
    #[validate(length(min = 1))]
    pub token_env: String,
    /// Request timeout.
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
}

/// Snapshot file endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct SnapshotEndpoint {
    /// Path of the JSON snapshot; a leading `~/` is the home directory.
    pub path: PathBuf,
}

/// The `migrate` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct MigrateSection {
    /// PRESENT migrates, ABSENT removes.
    #[serde(default = "default_state")]
    pub state: TargetState,
    /// Prefix joined to source domain names in the target.
    #[serde(default)]
    pub application_domain_prefix: String,
    /// Compute decisions only.
    #[serde(default)]
    pub checkmode: bool,
    /// Filter over application domain names.
    #[serde(default)]
    pub domains: NameFilter,
    /// Filter over object names.
    #[serde(default)]
    pub objects: NameFilter,
    /// Run to remove with state ABSENT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub absent_run_id: Option<String>,
    /// Domain name prefix to remove with state ABSENT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2))]
    pub absent_prefix: Option<String>,
    /// Bound on ABSENT passes.
    #[serde(default = "default_max_absent_passes")]
    #[validate(range(min = 1, max = 100))]
    pub max_absent_passes: u32,
    /// Seconds between ABSENT passes.
    #[serde(default = "default_pass_delay_secs")]
    #[validate(range(max = 300))]
    pub pass_delay_secs: u64,
    /// Listing page size.
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub page_size: u32,
    /// Where run reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for MigrateSection {
    fn default() -> Self {
        Self {
            state: default_state(),
            application_domain_prefix: String::new(),
            checkmode: false,
            domains: NameFilter::default(),
            objects: NameFilter::default(),
            absent_run_id: None,
            absent_prefix: None,
            max_absent_passes: default_max_absent_passes(),
            pass_delay_secs: default_pass_delay_secs(),
            page_size: default_page_size(),
            report_dir: default_report_dir(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// The `logger` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_state() -> TargetState {
    TargetState::Present
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_absent_passes() -> u32 {
    DEFAULT_MAX_ABSENT_PASSES
}

const fn default_pass_delay_secs() -> u64 {
    2
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_DIR)
}

fn default_log_level() -> String {
    String::from("info")
}
