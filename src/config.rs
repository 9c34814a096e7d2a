/// Service configuration loader - parses floodsim.toml
///
/// Keeps operational knobs (retention, polling cadence, upstream URL,
/// terrain SRID, endpoint port) out of the code. Every field has a default,
/// so a missing file or an empty section simply means "use the defaults".
/// `DATABASE_URL` is not configured here; see `db.rs`.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::daemon::{DaemonConfig, INITIAL_DELAY, POLL_INTERVAL, RETENTION_DAYS};
use crate::ingest::pegelonline::PEGELONLINE_API_BASE;
use crate::terrain::postgis::DEFAULT_SRID;

pub const DEFAULT_CONFIG_PATH: &str = "floodsim.toml";

/// Upper bound for `ingest.retention_days`.
pub const MAX_RETENTION_DAYS: u32 = 3650;

/// Upper bound for `ingest.poll_interval_secs` and `ingest.initial_delay_secs`.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub ingest: IngestConfig,
    pub source: SourceConfig,
    pub terrain: TerrainConfig,
    pub endpoint: EndpointConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub retention_days: u32,
    pub poll_interval_secs: u64,
    pub initial_delay_secs: u64,
    /// Set false to skip the startup backfill entirely.
    pub run_backfill: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            retention_days: RETENTION_DAYS,
            poll_interval_secs: POLL_INTERVAL.as_secs(),
            initial_delay_secs: INITIAL_DELAY.as_secs(),
            run_backfill: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: PEGELONLINE_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Projected CRS of both the query coordinates and the raster tiles.
    pub srid: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self { srid: DEFAULT_SRID }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// No port means no HTTP endpoint.
    pub port: Option<u16>,
    pub bind: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the file at `path`. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents, path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RETENTION_DAYS).contains(&self.ingest.retention_days) {
            return Err(ConfigError::Invalid(format!(
                "ingest.retention_days must be between 1 and {}",
                MAX_RETENTION_DAYS
            )));
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.ingest.poll_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "ingest.poll_interval_secs must be between 1 and {}",
                MAX_INTERVAL_SECS
            )));
        }
        if self.ingest.initial_delay_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "ingest.initial_delay_secs must be at most {}",
                MAX_INTERVAL_SECS
            )));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Invalid("source.timeout_secs must be at least 1".into()));
        }
        if self.source.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("source.base_url must not be empty".into()));
        }
        Ok(())
    }
}

impl From<&IngestConfig> for DaemonConfig {
    fn from(config: &IngestConfig) -> Self {
        DaemonConfig {
            retention_days: config.retention_days,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            initial_delay: Duration::from_secs(config.initial_delay_secs),
        }
    }
}
