// # deSEC DNS Provider
//
// This crate provides the deSEC (https://desec.io) provider for dnsreconcile.
//
// ## Behavior
//
// - ✅ Reads every rrset of a zone, following cursor pagination
// - ✅ Replaces one rrset per correction (`PUT` with a one-element array)
// - ✅ Deletes an rrset by sending an empty `records` array
// - ✅ Creates missing zones (`POST /domains/`)
// - ✅ Reports the per-domain TTL floor from the domain index
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 429, 5xx)
// - ❌ NO retry logic (a failed correction is reported; the next run retries)
// - ❌ Apex NS records are managed by deSEC and never read or written
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - deSEC API v1: https://desec.readthedocs.io/en/latest/
// - List domains: GET `/domains/`
// - Create domain: POST `/domains/`
// - List rrsets: GET `/domains/:name/rrsets/`
// - Bulk upsert rrsets: PUT `/domains/:name/rrsets/`

mod api;

pub use api::{Domain, RrSet};

use api::{PROVIDER, error_for_status, next_link};
use async_trait::async_trait;
use dnsreconcile_core::capabilities::{Capability, CapabilityDeclaration, CapabilityFlag};
use dnsreconcile_core::config::ProviderConfig;
use dnsreconcile_core::model::name;
use dnsreconcile_core::traits::{DnsProvider, DnsProviderFactory};
use dnsreconcile_core::{
    Error, ProviderRegistry, Record, RecordSet, RecordSetKey, RecordType, Result,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// deSEC API base URL
pub const DESEC_API_BASE: &str = "https://desec.io/api/v1";

/// Nameservers deSEC assigns to every domain
pub const DEFAULT_NAMESERVERS: [&str; 2] = ["ns1.desec.io", "ns2.desec.org"];

/// TTL floor assumed for domains missing from the index
pub const DEFAULT_MINIMUM_TTL: u32 = 3600;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// deSEC DNS provider
///
/// The domain index (names and TTL floors) is fetched once and cached for
/// the lifetime of the provider; domains created through
/// [`DnsProvider::ensure_zone_exists`] are added to it.
pub struct DesecProvider {
    /// deSEC API token
    /// ⚠️ NEVER log this value
    token: String,

    /// API base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Domain name → minimum TTL
    domain_index: Mutex<Option<BTreeMap<String, u32>>>,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DesecProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesecProvider")
            .field("token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DesecProvider {
    /// Create a new deSEC provider
    ///
    /// # Parameters
    ///
    /// - `token`: deSEC API token
    /// - `base_url`: API base URL; `None` uses [`DESEC_API_BASE`]
    pub fn new(token: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("deSEC API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| DESEC_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            token,
            base_url,
            client,
            domain_index: Mutex::new(None),
        })
    }

    /// Nameservers deSEC serves every domain from
    pub fn default_nameservers(&self) -> Vec<String> {
        DEFAULT_NAMESERVERS.iter().map(|ns| ns.to_string()).collect()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<reqwest::Response> {
        let response = request
            .header("Authorization", self.authorization())
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", context, e)))?;

        if !response.status().is_success() {
            return Err(error_for_status(response, context).await);
        }
        Ok(response)
    }

    /// Domain index, fetched on first use
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /domains/
    /// Authorization: Token <token>
    /// ```
    async fn domain_index(&self) -> Result<BTreeMap<String, u32>> {
        let mut guard = self.domain_index.lock().await;
        if let Some(index) = guard.as_ref() {
            return Ok(index.clone());
        }

        tracing::debug!("Fetching deSEC domain index");
        let response = self
            .send(self.client.get(self.url("domains/")), "list domains")
            .await?;
        let domains: Vec<Domain> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse domain list: {}", e)))?;

        let index: BTreeMap<String, u32> = domains
            .into_iter()
            .map(|domain| {
                let ttl = domain.minimum_ttl.unwrap_or(DEFAULT_MINIMUM_TTL);
                (domain.name.trim_end_matches('.').to_ascii_lowercase(), ttl)
            })
            .collect();
        tracing::debug!(domains = index.len(), "deSEC domain index loaded");

        *guard = Some(index.clone());
        Ok(index)
    }

    /// Every rrset of `zone`, across all pages
    async fn rrsets(&self, zone: &str) -> Result<Vec<RrSet>> {
        let mut rrsets = Vec::new();
        let mut next = Some(self.url(&format!("domains/{}/rrsets/", zone)));

        while let Some(url) = next.take() {
            let response = self
                .send(self.client.get(&url), &format!("list rrsets of {}", zone))
                .await?;
            next = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_link);

            let page: Vec<RrSet> = response
                .json()
                .await
                .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse rrsets: {}", e)))?;
            rrsets.extend(page);
        }

        Ok(rrsets)
    }

    fn subname(zone: &str, fqdn: &str) -> Result<String> {
        match name::label_for_fqdn(fqdn, zone) {
            Some(label) if label == "@" => Ok(String::new()),
            Some(label) => Ok(label),
            None => Err(Error::invalid_input(format!(
                "Name {} is outside of zone {}",
                fqdn, zone
            ))),
        }
    }
}

#[async_trait]
impl DnsProvider for DesecProvider {
    /// Read the zone's rrsets
    ///
    /// Apex NS is skipped since deSEC manages it. Types the record model
    /// does not know (e.g. OPENPGPKEY) are skipped with a debug log.
    async fn fetch_existing_records(&self, zone: &str) -> Result<Vec<Record>> {
        let zone = name::canonical_zone(zone)?;
        let mut records = Vec::new();

        for rrset in self.rrsets(&zone).await? {
            let Ok(rtype) = rrset.rtype.parse::<RecordType>() else {
                tracing::debug!(zone = %zone, rtype = %rrset.rtype, "Skipping unsupported rrset type");
                continue;
            };
            if rrset.subname.is_empty() && rtype == RecordType::Ns {
                continue;
            }

            let fqdn = if rrset.subname.is_empty() {
                zone.clone()
            } else {
                format!("{}.{}", rrset.subname, zone)
            };
            for value in &rrset.records {
                records.push(Record::from_fqdn(&zone, &fqdn, rtype, value, rrset.ttl)?);
            }
        }

        tracing::debug!(zone = %zone, records = records.len(), "Fetched deSEC records");
        Ok(records)
    }

    /// Replace one rrset
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /domains/:name/rrsets/
    /// [{"subname": "www", "type": "A", "ttl": 3600, "records": ["192.0.2.1"]}]
    /// ```
    async fn apply_record_set(&self, zone: &str, set: &RecordSet) -> Result<()> {
        let zone = name::canonical_zone(zone)?;
        let subname = Self::subname(&zone, &set.key.fqdn)?;
        if subname.is_empty() && set.key.rtype == RecordType::Ns {
            return Err(Error::invalid_input(format!(
                "Apex NS of {} is managed by deSEC ({})",
                zone,
                DEFAULT_NAMESERVERS.join(", ")
            )));
        }

        let payload = [RrSet {
            subname,
            rtype: set.key.rtype.as_str().to_string(),
            ttl: set.ttl().unwrap_or(DEFAULT_MINIMUM_TTL),
            records: set.rdata(),
        }];

        tracing::info!(
            zone = %zone,
            "{} deSEC rrset {}",
            if set.is_empty() { "Deleting" } else { "Writing" },
            set.key
        );
        self.send(
            self.client
                .put(self.url(&format!("domains/{}/rrsets/", zone)))
                .json(&payload),
            &format!("write rrset {}", set.key),
        )
        .await?;
        Ok(())
    }

    async fn ensure_zone_exists(&self, zone: &str) -> Result<()> {
        let zone = name::canonical_zone(zone)?;
        if self.domain_index().await?.contains_key(&zone) {
            return Ok(());
        }

        tracing::info!(zone = %zone, "Creating deSEC domain");
        let response = self
            .send(
                self.client
                    .post(self.url("domains/"))
                    .json(&serde_json::json!({ "name": zone })),
                &format!("create domain {}", zone),
            )
            .await?;
        let minimum_ttl = response
            .json::<Domain>()
            .await
            .ok()
            .and_then(|domain| domain.minimum_ttl)
            .unwrap_or(DEFAULT_MINIMUM_TTL);

        if let Some(index) = self.domain_index.lock().await.as_mut() {
            index.insert(zone, minimum_ttl);
        }
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        Ok(self.domain_index().await?.into_keys().collect())
    }

    async fn minimum_ttl(&self, zone: &str) -> Result<Option<u32>> {
        let zone = name::canonical_zone(zone)?;
        let index = self.domain_index().await?;
        Ok(Some(index.get(&zone).copied().unwrap_or(DEFAULT_MINIMUM_TTL)))
    }

    /// Apex NS belongs to deSEC
    fn manages_record_set(&self, zone: &str, key: &RecordSetKey) -> bool {
        key.rtype == RecordType::Ns
            && name::canonical_zone(zone).is_ok_and(|zone| key.fqdn == zone)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating deSEC providers
pub struct DesecFactory;

impl DnsProviderFactory for DesecFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Desec { token, base_url } => {
                if token.is_empty() {
                    return Err(Error::config("deSEC API token is required"));
                }
                Ok(Box::new(DesecProvider::new(token.clone(), base_url.clone())?))
            }
            _ => Err(Error::config("Invalid config for deSEC provider")),
        }
    }

    fn capabilities(&self) -> CapabilityDeclaration {
        CapabilityDeclaration::new()
            .note(
                Capability::CanAutoDnssec,
                CapabilityFlag::can_with(
                    "deSEC always signs all records. When trying to disable, a notice is printed.",
                ),
            )
            .supports(Capability::CanGetZones)
            .supports(Capability::CanConcur)
            .supports(Capability::CanUseCaa)
            .supports(Capability::CanUseDs)
            .supports(Capability::CanUseDnskey)
            .supports(Capability::CanUseHttps)
            .supports(Capability::CanUseNaptr)
            .supports(Capability::CanUsePtr)
            .supports(Capability::CanUseSrv)
            .supports(Capability::CanUseSshfp)
            .supports(Capability::CanUseSvcb)
            .supports(Capability::CanUseTlsa)
            .supports(Capability::DocCreateDomains)
            .note(
                Capability::CanUseAlias,
                CapabilityFlag::unimplemented_with("Apex aliasing is supported via new SVCB and HTTPS records."),
            )
            .note(Capability::CanUseLoc, CapabilityFlag::unimplemented())
            .note(Capability::DocDualHost, CapabilityFlag::unimplemented())
            .note(Capability::DocOfficiallySupported, CapabilityFlag::cannot())
    }
}

/// Register the deSEC provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsreconcile_core::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// dnsreconcile_provider_desec::register(&mut registry);
/// assert!(registry.has_provider("desec"));
/// ```
pub fn register(registry: &mut ProviderRegistry) {
    registry.register(PROVIDER, Box::new(DesecFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsreconcile_core::CapabilityRegistry;

    #[test]
    fn test_factory_creation() {
        let config = ProviderConfig::Desec {
            token: "test_token".to_string(),
            base_url: None,
        };

        let provider = DesecFactory.create(&config).unwrap();
        assert_eq!(provider.provider_name(), "desec");
    }

    #[test]
    fn test_factory_missing_token() {
        let config = ProviderConfig::Desec {
            token: String::new(),
            base_url: None,
        };
        assert!(matches!(DesecFactory.create(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ProviderConfig::Custom {
            factory: "memory".to_string(),
            config: serde_json::json!({}),
        };
        assert!(DesecFactory.create(&config).is_err());
    }

    #[test]
    fn test_empty_token_is_config_error() {
        assert!(matches!(DesecProvider::new("", None), Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = DesecProvider::new("token", Some("http://localhost:8080/api/v1/".to_string())).unwrap();
        assert_eq!(provider.url("domains/"), "http://localhost:8080/api/v1/domains/");
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = DesecProvider::new("secret_token_12345", None).unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("DesecProvider"));
    }

    #[test]
    fn test_subname_mapping() {
        assert_eq!(DesecProvider::subname("example.com", "example.com").unwrap(), "");
        assert_eq!(DesecProvider::subname("example.com", "www.example.com").unwrap(), "www");
        assert!(DesecProvider::subname("example.com", "www.example.org").is_err());
    }

    #[test]
    fn test_default_nameservers() {
        let provider = DesecProvider::new("token", None).unwrap();
        assert_eq!(provider.default_nameservers(), vec!["ns1.desec.io", "ns2.desec.org"]);
    }

    #[test]
    fn test_capabilities() {
        let registry = CapabilityRegistry::new().with_provider("desec", DesecFactory.capabilities());

        assert!(registry.has_capability("desec", Capability::CanAutoDnssec));
        assert!(registry.has_capability("desec", Capability::CanConcur));
        assert!(registry.has_capability("desec", Capability::CanUseSvcb));
        assert!(!registry.has_capability("desec", Capability::CanUseAlias));
        assert!(!registry.has_capability("desec", Capability::CanUseLoc));
        assert!(registry.note("desec", Capability::CanUseAlias).forbids());
        assert!(!registry.has_capability("desec", Capability::DocOfficiallySupported));
    }

    #[test]
    fn test_manages_only_apex_ns() {
        let provider = DesecProvider::new("token", None).unwrap();

        assert!(provider.manages_record_set("example.com", &RecordSetKey::new("example.com", RecordType::Ns)));
        assert!(provider.manages_record_set("Example.COM.", &RecordSetKey::new("example.com", RecordType::Ns)));
        assert!(!provider.manages_record_set("example.com", &RecordSetKey::new("sub.example.com", RecordType::Ns)));
        assert!(!provider.manages_record_set("example.com", &RecordSetKey::new("example.com", RecordType::Mx)));
    }

    #[test]
    fn test_register() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry);

        assert!(registry.has_provider("desec"));
        assert!(registry.capabilities().is_registered("desec"));
    }
}
