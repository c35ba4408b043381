// # DNS Provider Trait
//
// Defines the interface between the reconciliation engine and a DNS
// provider's API.
//
// ## Implementations
//
// - deSEC: `dnsreconcile-provider-desec` crate
// - In-memory: `dnsreconcile_core::providers::MemoryProvider` (tests, demos)
//
// ## Usage
//
// ```rust,ignore
// use dnsreconcile_core::{DnsProvider, RecordSet};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let existing = provider.fetch_existing_records("example.com").await?;
//     provider.apply_record_set("example.com", &desired_set).await?;
//
//     Ok(())
// }
// ```

use crate::capabilities::CapabilityDeclaration;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::model::{Record, RecordSet, RecordSetKey};
use async_trait::async_trait;

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe; a provider for a `CanConcur`
/// identity is called from several zone workers at once.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Translate between the provider's wire format and [`Record`]
/// - ✅ Cache provider metadata (zone index, TTL floors) for one process
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed correction is reported, the next run retries)
/// - ❌ Decide what should change (owned by the diff)
/// - ❌ Drop or rewrite desired records (owned by normalization)
/// - ❌ Spawn tasks or threads
///
/// ## Idempotency
///
/// [`DnsProvider::apply_record_set`] is a full replacement of one
/// `(FQDN, type)` record set. Running the same call twice leaves the
/// provider in the same state as running it once.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch every record the provider serves for `zone`
    ///
    /// Returned records carry canonical FQDNs inside `zone`. Records the
    /// engine does not manage (e.g. apex SOA) may be filtered out here.
    async fn fetch_existing_records(&self, zone: &str) -> Result<Vec<Record>>;

    /// Replace the record set `set.key` with exactly `set.values`
    ///
    /// An empty set deletes the record set.
    async fn apply_record_set(&self, zone: &str, set: &RecordSet) -> Result<()>;

    /// Remove the record set `key`
    ///
    /// Defaults to upserting an empty set.
    async fn delete_record_set(&self, zone: &str, key: &RecordSetKey) -> Result<()> {
        self.apply_record_set(zone, &RecordSet::empty(key.clone()))
            .await
    }

    /// Create `zone` at the provider if it does not exist yet
    async fn ensure_zone_exists(&self, zone: &str) -> Result<()>;

    /// Zones the account can manage
    async fn list_zones(&self) -> Result<Vec<String>> {
        Err(Error::provider(
            self.provider_name(),
            "listing zones is not supported",
        ))
    }

    /// Smallest TTL the provider accepts for `zone`, if it enforces one
    async fn minimum_ttl(&self, _zone: &str) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Whether the provider manages `key` itself
    ///
    /// Such record sets are neither reported by fetch nor accepted on apply;
    /// the engine leaves them out of the diff.
    fn manages_record_set(&self, _zone: &str, _key: &RecordSetKey) -> bool {
        false
    }

    /// Provider identity, also the capability registry key
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "desec")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>>;

    /// Static capability declaration of every provider this factory builds
    fn capabilities(&self) -> CapabilityDeclaration;
}
