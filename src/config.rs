use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregator::AggregatorConfig;
use crate::ingest::FlushErrorPolicy;
use crate::sbs::SbsClientConfig;

/// Environment variable naming the settings file
pub const CONFIG_ENV_VAR: &str = "SBS1_WEB_CONFIG";

/// Upper bound on `flight_gap_hours` (one year)
pub const MAX_FLIGHT_GAP_HOURS: i64 = 24 * 365;
/// Upper bound on `aircraft_seen_gap_seconds` (one day)
pub const MAX_SEEN_GAP_SECONDS: i64 = 24 * 60 * 60;
/// Upper bound on the connect timeout and the reconnect delay (one hour)
pub const MAX_CLIENT_WAIT_SECONDS: u64 = 60 * 60;

/// Application settings (TOML)
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Page title of the map
    pub title: String,
    /// Longest silence that still continues the same flight
    pub flight_gap_hours: i64,
    /// How recent a position must be to show on the map
    pub aircraft_seen_gap_seconds: i64,
    /// Bound on connecting to the feed and on waiting for data
    pub connect_timeout_seconds: u64,
    pub reconnect_delay_seconds: u64,
    pub flush_errors: FlushErrorPolicy,
    /// Prometheus exporter port; no exporter when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "SBS1-WEB".to_string(),
            flight_gap_hours: 2,
            aircraft_seen_gap_seconds: 30,
            connect_timeout_seconds: 5,
            reconnect_delay_seconds: 1,
            flush_errors: FlushErrorPolicy::Log,
            metrics_port: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let settings: Settings =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {:?}", path))?;
        Ok(settings)
    }

    /// Reject values the aggregator, map query or feed client cannot work with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_FLIGHT_GAP_HOURS).contains(&self.flight_gap_hours),
            "flight_gap_hours must be between 1 and {}, got {}",
            MAX_FLIGHT_GAP_HOURS,
            self.flight_gap_hours
        );
        ensure!(
            (1..=MAX_SEEN_GAP_SECONDS).contains(&self.aircraft_seen_gap_seconds),
            "aircraft_seen_gap_seconds must be between 1 and {}, got {}",
            MAX_SEEN_GAP_SECONDS,
            self.aircraft_seen_gap_seconds
        );
        ensure!(
            (1..=MAX_CLIENT_WAIT_SECONDS).contains(&self.connect_timeout_seconds),
            "connect_timeout_seconds must be between 1 and {}, got {}",
            MAX_CLIENT_WAIT_SECONDS,
            self.connect_timeout_seconds
        );
        ensure!(
            self.reconnect_delay_seconds <= MAX_CLIENT_WAIT_SECONDS,
            "reconnect_delay_seconds must be at most {}, got {}",
            MAX_CLIENT_WAIT_SECONDS,
            self.reconnect_delay_seconds
        );
        Ok(())
    }

    /// Load from the file named by `SBS1_WEB_CONFIG`, or use the defaults when it is unset
    pub fn from_env() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn flight_gap(&self) -> chrono::Duration {
        chrono::Duration::hours(self.flight_gap_hours)
    }

    pub fn aircraft_seen_gap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.aircraft_seen_gap_seconds)
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            flight_gap: self.flight_gap(),
        }
    }

    pub fn client_config(&self, server: String, port: u16) -> SbsClientConfig {
        SbsClientConfig {
            server,
            port,
            timeout: std::time::Duration::from_secs(self.connect_timeout_seconds),
            reconnect_delay: std::time::Duration::from_secs(self.reconnect_delay_seconds),
        }
    }
}

/// Settings file path from `SBS1_WEB_CONFIG`, if set and non-empty
pub fn config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
