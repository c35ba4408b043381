//! Provider registry
//!
//! Maps provider type names to factories, and collects every factory's
//! capability declaration into the shared [`CapabilityRegistry`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnsreconcile_core::registry::ProviderRegistry;
//!
//! // Built once by the entry point from an explicit factory list
//! let mut registry = ProviderRegistry::new();
//! registry.register("desec", Box::new(DesecProviderFactory));
//!
//! // Create provider from config
//! let provider = registry.create_provider(&config)?;
//!
//! // Hand the capabilities to the engine
//! let (engine, events) = ReconcileEngine::new(registry.capabilities(), engine_config)?;
//! ```
//!
//! The registry is mutated only while it is being built; afterwards it is
//! shared immutably.

use crate::capabilities::CapabilityRegistry;
use crate::config::{ProviderConfig, ReconcileConfig, ZoneConfig};
use crate::engine::{ZoneJob, ZoneReport};
use crate::error::{Error, Result};
use crate::model::name;
use crate::traits::{DnsProvider, DnsProviderFactory};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

/// Zones of a configuration, split into runnable jobs and rejected zones
#[derive(Default)]
pub struct PreparedZones {
    /// Zones ready for the engine
    pub jobs: Vec<ZoneJob>,
    /// Zones whose configuration or provider failed; each carries a fatal error
    pub rejected: Vec<ZoneReport>,
}

/// Provider registry for factory-based DNS provider creation
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: BTreeMap<String, Box<dyn DnsProviderFactory>>,

    /// Capability declarations of the registered factories
    capabilities: CapabilityRegistry,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name; must equal the `provider_name()` of
    ///   the providers it creates
    /// - `factory`: Factory object for creating provider instances
    pub fn register(&mut self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let name = name.into();
        self.capabilities.register(name.clone(), factory.capabilities());
        self.providers.insert(name, factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        let provider_type = config.type_name();

        let factory = self
            .providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config).map(Arc::from)
    }

    /// Turn every configured zone into a job
    ///
    /// One provider instance is created per provider entry and shared by
    /// its zones. A zone with invalid records, an unknown provider
    /// reference or a provider that cannot be created is rejected on its
    /// own; the other zones are unaffected.
    pub fn prepare_zones(&self, config: &ReconcileConfig) -> PreparedZones {
        let mut providers: BTreeMap<&str, Result<Arc<dyn DnsProvider>>> = BTreeMap::new();
        let mut prepared = PreparedZones::default();

        for zone in &config.zones {
            match self.prepare_zone(config, zone, &mut providers) {
                Ok(job) => prepared.jobs.push(job),
                Err(e) => {
                    error!(zone = %zone.name, "Zone rejected: {}", e);
                    let zone_name =
                        name::canonical_zone(&zone.name).unwrap_or_else(|_| zone.name.clone());
                    prepared.rejected.push(ZoneReport::aborted(
                        &zone_name,
                        &zone.provider,
                        config.engine.dry_run,
                        e,
                    ));
                }
            }
        }

        prepared
    }

    fn prepare_zone<'a>(
        &self,
        config: &'a ReconcileConfig,
        zone: &'a ZoneConfig,
        providers: &mut BTreeMap<&'a str, Result<Arc<dyn DnsProvider>>>,
    ) -> Result<ZoneJob> {
        let provider_config = config.zone_provider(zone)?;
        let provider = providers
            .entry(zone.provider.as_str())
            .or_insert_with(|| self.create_provider(provider_config))
            .as_ref()
            .map(Arc::clone)
            .map_err(|e| {
                Error::config(format!("Provider {} unavailable: {}", zone.provider, e.message()))
            })?;
        let desired = zone.to_desired_zone()?;
        Ok(ZoneJob::new(provider, desired))
    }

    /// Snapshot of the capability registry for the engine and the feature matrix
    pub fn capabilities(&self) -> Arc<CapabilityRegistry> {
        Arc::new(self.capabilities.clone())
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }
}
