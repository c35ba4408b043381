//! Configuration types for the reconciliation engine
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is JSON; zone and record entries are converted into the
//! typed model with [`ZoneConfig::to_desired_zone`].

use crate::error::{Error, Result};
use crate::model::{AutoDnssec, DesiredZone, RecordType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

/// Main reconciliation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Provider instances by name; zones refer to these names
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Zones to reconcile
    pub zones: Vec<ZoneConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ReconcileConfig {
    /// Parse a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read configuration {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate the configuration
    ///
    /// Checks provider settings, zone uniqueness and engine settings. Zone
    /// contents (provider reference, record values) are checked per zone by
    /// [`ReconcileConfig::zone_provider`] and [`ZoneConfig::to_desired_zone`]
    /// so that one bad zone does not stop the others.
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(Error::config("No zones configured"));
        }

        for (name, provider) in &self.providers {
            provider
                .validate()
                .map_err(|e| Error::config(format!("Provider {}: {}", name, e.message())))?;
        }

        let mut seen = BTreeSet::new();
        for zone in &self.zones {
            let canonical = zone.name.trim().trim_end_matches('.').to_ascii_lowercase();
            if !seen.insert(canonical) {
                return Err(Error::config(format!("Zone {} is configured twice", zone.name)));
            }
        }

        self.engine.validate()
    }

    /// Provider configuration serving `zone`
    pub fn zone_provider(&self, zone: &ZoneConfig) -> Result<&ProviderConfig> {
        self.providers.get(&zone.provider).ok_or_else(|| {
            Error::config(format!(
                "Zone {} refers to unknown provider {}",
                zone.name, zone.provider
            ))
        })
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// deSEC provider
    Desec {
        /// deSEC API token
        #[serde(default)]
        token: String,
        /// API base URL override (defaults to the public deSEC API)
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::Desec { token, .. } => {
                if token.is_empty() {
                    return Err(Error::config("deSEC API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom provider factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Desec { .. } => "desec",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// One zone and its desired records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone name (e.g., "example.com")
    pub name: String,

    /// Name of the entry in [`ReconcileConfig::providers`] serving this zone
    pub provider: String,

    /// Requested DNSSEC signing
    #[serde(default)]
    pub auto_dnssec: AutoDnssec,

    /// Desired records
    #[serde(default)]
    pub records: Vec<RecordConfig>,
}

impl ZoneConfig {
    /// Convert into the typed model
    ///
    /// Every value is parsed here; a bad record is a configuration error.
    pub fn to_desired_zone(&self) -> Result<DesiredZone> {
        let mut zone = DesiredZone::new(&self.name)?.with_auto_dnssec(self.auto_dnssec);
        for record in &self.records {
            zone.add_record(&record.label, record.record_type, &record.value, record.ttl)
                .map_err(|e| {
                    Error::config(format!(
                        "Zone {} record {} {}: {}",
                        self.name,
                        record.label,
                        record.record_type,
                        e.message()
                    ))
                })?;
        }
        Ok(zone)
    }
}

/// DNS record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Owner name relative to the zone; `@` for the apex
    pub label: String,

    /// Record type (e.g., "A", "MX")
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Presentation-format value
    pub value: String,

    /// Time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(label: impl Into<String>, record_type: RecordType, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            record_type,
            value: value.into(),
            ttl: default_ttl(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

fn default_ttl() -> u32 {
    300
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on zones reconciled at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// TTL floor used when the provider does not report one
    #[serde(default = "default_min_ttl")]
    pub default_min_ttl: u32,

    /// Create zones missing at the provider before fetching
    #[serde(default)]
    pub create_missing_zones: bool,

    /// Plan corrections without executing them
    #[serde(default)]
    pub dry_run: bool,

    /// Whole-run deadline; corrections not started by then are skipped
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::config("max_concurrency must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Deadline as a duration, if configured
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
            default_min_ttl: default_min_ttl(),
            create_missing_zones: false,
            dry_run: false,
            deadline_secs: None,
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_min_ttl() -> u32 {
    1
}
