// # Memory Provider
//
// In-memory implementation of DnsProvider.
//
// ## Purpose
//
// Serves record sets out of a map protected by a RwLock. Nothing is
// persisted and no network is involved, which makes it the backend for
// tests, demos and dry runs of a configuration.
//
// ## Behavior
//
// - Zones must exist before records can be fetched or applied
// - `ensure_zone_exists` creates an empty zone
// - Applying an empty record set removes the key

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::capabilities::{Capability, CapabilityDeclaration, CapabilityFlag};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::model::name;
use crate::model::{Record, RecordSet, RecordSetKey};
use crate::normalize::group_by_key;
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Provider identity of [`MemoryProvider`]
pub const MEMORY_PROVIDER: &str = "memory";

type Zones = BTreeMap<String, BTreeMap<RecordSetKey, RecordSet>>;

/// In-memory DNS provider
///
/// # Example
///
/// ```rust,no_run
/// use dnsreconcile_core::providers::MemoryProvider;
/// use dnsreconcile_core::{DnsProvider, Record, RecordType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryProvider::new();
///     provider.ensure_zone_exists("example.com").await?;
///
///     let record = Record::new("example.com", "www", RecordType::A, "1.2.3.4", 300)?;
///     provider.seed("example.com", vec![record]).await?;
///
///     let records = provider.fetch_existing_records("example.com").await?;
///     assert_eq!(records.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<RwLock<Zones>>,
    minimum_ttls: BTreeMap<String, u32>,
}

impl MemoryProvider {
    /// Create a provider serving no zones
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a TTL floor for `zone`
    pub fn with_minimum_ttl(mut self, zone: &str, ttl: u32) -> Self {
        self.minimum_ttls
            .insert(name::canonical_zone(zone).unwrap_or_else(|_| zone.to_string()), ttl);
        self
    }

    /// Capability declaration used by [`MemoryProviderFactory`]
    pub fn capabilities() -> CapabilityDeclaration {
        CapabilityDeclaration::new()
            .note(Capability::CanUseAlias, CapabilityFlag::unimplemented())
            .note(Capability::CanUseLoc, CapabilityFlag::unimplemented())
            .note(Capability::CanAutoDnssec, CapabilityFlag::cannot_with("nothing is signed in memory"))
            .supports(Capability::CanConcur)
            .supports(Capability::CanGetZones)
            .supports(Capability::DocCreateDomains)
            .supports(Capability::CanUseCaa)
            .supports(Capability::CanUsePtr)
            .supports(Capability::CanUseSrv)
            .supports(Capability::CanUseSshfp)
            .supports(Capability::CanUseTlsa)
    }

    /// Replace the content of `zone` with `records`, creating the zone
    pub async fn seed(&self, zone: &str, records: Vec<Record>) -> Result<()> {
        let zone = name::canonical_zone(zone)?;
        let sets = group_by_key(&records);
        let mut guard = self.inner.write().await;
        guard.insert(zone, sets);
        Ok(())
    }

    /// Current records of `zone` in key order; empty if the zone is unknown
    pub async fn records(&self, zone: &str) -> Vec<Record> {
        let Ok(zone) = name::canonical_zone(zone) else {
            return Vec::new();
        };
        let guard = self.inner.read().await;
        guard
            .get(&zone)
            .map(|sets| sets.values().flat_map(|set| set.records(&zone)).collect())
            .unwrap_or_default()
    }

    /// Current record set for `key`, if any
    pub async fn record_set(&self, zone: &str, key: &RecordSetKey) -> Option<RecordSet> {
        let zone = name::canonical_zone(zone).ok()?;
        let guard = self.inner.read().await;
        guard.get(&zone).and_then(|sets| sets.get(key)).cloned()
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    async fn fetch_existing_records(&self, zone: &str) -> Result<Vec<Record>> {
        let zone = name::canonical_zone(zone)?;
        let guard = self.inner.read().await;
        let sets = guard
            .get(&zone)
            .ok_or_else(|| Error::not_found(format!("Zone {} does not exist", zone)))?;
        Ok(sets.values().flat_map(|set| set.records(&zone)).collect())
    }

    async fn apply_record_set(&self, zone: &str, set: &RecordSet) -> Result<()> {
        let zone = name::canonical_zone(zone)?;
        if !name::in_zone(&set.key.fqdn, &zone) {
            return Err(Error::invalid_input(format!(
                "{} is outside of zone {}",
                set.key, zone
            )));
        }

        let mut guard = self.inner.write().await;
        let sets = guard
            .get_mut(&zone)
            .ok_or_else(|| Error::not_found(format!("Zone {} does not exist", zone)))?;
        if set.is_empty() {
            sets.remove(&set.key);
        } else {
            sets.insert(set.key.clone(), set.clone());
        }
        Ok(())
    }

    async fn ensure_zone_exists(&self, zone: &str) -> Result<()> {
        let zone = name::canonical_zone(zone)?;
        let mut guard = self.inner.write().await;
        guard.entry(zone).or_default();
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn minimum_ttl(&self, zone: &str) -> Result<Option<u32>> {
        let zone = name::canonical_zone(zone)?;
        Ok(self.minimum_ttls.get(&zone).copied())
    }

    fn provider_name(&self) -> &'static str {
        MEMORY_PROVIDER
    }
}

/// Factory for [`MemoryProvider`]
///
/// Every `create` call hands out a clone sharing the same zones, so a
/// caller holding the factory can inspect what the engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryProviderFactory {
    provider: MemoryProvider,
}

impl MemoryProviderFactory {
    pub fn new(provider: MemoryProvider) -> Self {
        Self { provider }
    }

    /// The shared provider behind every created instance
    pub fn provider(&self) -> &MemoryProvider {
        &self.provider
    }
}

impl DnsProviderFactory for MemoryProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Custom { factory, .. } if factory == MEMORY_PROVIDER => {
                Ok(Box::new(self.provider.clone()))
            }
            other => Err(Error::config(format!(
                "Memory provider cannot be built from {} configuration",
                other.type_name()
            ))),
        }
    }

    fn capabilities(&self) -> CapabilityDeclaration {
        MemoryProvider::capabilities()
    }
}
