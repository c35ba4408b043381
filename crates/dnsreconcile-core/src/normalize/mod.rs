//! Grouping & normalization
//!
//! Rewrites a desired zone to respect the provider's constraints before it
//! is diffed, then groups desired and existing records by
//! [`RecordSetKey`]. The caller's [`DesiredZone`] is left untouched; a new
//! [`NormalizedZone`] snapshot is returned.
//!
//! ## Steps
//!
//! 1. Structural validation (fatal for the zone)
//! 2. Zone settings checked against capabilities (fatal for the zone)
//! 3. Records of unsupported types are dropped with a warning
//! 4. TTLs below the floor are raised with a warning, except exempt types
//! 5. Members of one record set get one TTL (the largest), with a warning
//! 6. Grouping by key; value bags are sets
//!
//! Record sets the provider manages itself are removed afterwards with
//! [`NormalizedZone::exclude_managed`].

use crate::capabilities::{Capability, CapabilityFlag, CapabilityRegistry};
use crate::error::{Error, Result};
use crate::model::{AutoDnssec, DesiredZone, Record, RecordSet, RecordSetKey, RecordType};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Record sets keyed and ordered by `(FQDN, type)`
pub type RecordSets = BTreeMap<RecordSetKey, RecordSet>;

/// Group records into record sets
pub fn group_by_key<'a>(records: impl IntoIterator<Item = &'a Record>) -> RecordSets {
    let mut sets = RecordSets::new();
    for record in records {
        sets.entry(record.key())
            .or_insert_with(|| RecordSet::empty(record.key()))
            .insert(record.value());
    }
    sets
}

/// TTL floor for one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Smallest TTL the provider accepts for this zone
    pub minimum: u32,
    /// Types left alone even when below the floor
    pub exempt: BTreeSet<RecordType>,
}

impl TtlPolicy {
    /// Floor of `minimum` seconds with NS exempt
    pub fn new(minimum: u32) -> Self {
        Self {
            minimum,
            exempt: BTreeSet::from([RecordType::Ns]),
        }
    }

    /// Replace the exempt types
    pub fn with_exempt(mut self, exempt: impl IntoIterator<Item = RecordType>) -> Self {
        self.exempt = exempt.into_iter().collect();
        self
    }

    fn applies_to(&self, record: &Record) -> bool {
        record.ttl < self.minimum && !self.exempt.contains(&record.rtype)
    }
}

/// Non-fatal adjustment made while normalizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationWarning {
    /// A record was removed because the provider cannot serve its type
    Dropped {
        key: RecordSetKey,
        capability: Capability,
        flag: CapabilityFlag,
    },
    /// A record's TTL was raised to the provider minimum
    TtlRaised { key: RecordSetKey, from: u32, to: u32 },
    /// Members of one record set declared different TTLs; all now use `to`
    TtlUnified { key: RecordSetKey, to: u32 },
    /// The provider manages this record set itself
    ProviderManaged { key: RecordSetKey },
    /// `auto_dnssec: off` cannot be honored: the provider always signs
    DnssecNotDisabled {
        zone: String,
        provider: String,
        note: Option<String>,
    },
}

impl NormalizationWarning {
    /// Record set the warning is about; `None` for zone-level warnings
    pub fn key(&self) -> Option<&RecordSetKey> {
        match self {
            NormalizationWarning::Dropped { key, .. }
            | NormalizationWarning::TtlRaised { key, .. }
            | NormalizationWarning::TtlUnified { key, .. }
            | NormalizationWarning::ProviderManaged { key } => Some(key),
            NormalizationWarning::DnssecNotDisabled { .. } => None,
        }
    }
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationWarning::Dropped {
                key,
                capability,
                flag,
            } => write!(
                f,
                "{} dropped: provider capability {} is {}",
                key, capability, flag
            ),
            NormalizationWarning::TtlRaised { key, from, to } => write!(
                f,
                "TTL of {} raised from {} to {} (provider minimum)",
                key, from, to
            ),
            NormalizationWarning::TtlUnified { key, to } => write!(
                f,
                "TTLs of {} unified to {} (one TTL per record set)",
                key, to
            ),
            NormalizationWarning::ProviderManaged { key } => {
                write!(f, "{} skipped: managed by the provider", key)
            }
            NormalizationWarning::DnssecNotDisabled {
                zone,
                provider,
                note,
            } => {
                write!(
                    f,
                    "AUTODNSSEC off is not applied to {}: provider {} keeps signing",
                    zone, provider
                )?;
                if let Some(note) = note {
                    write!(f, " ({})", note)?;
                }
                Ok(())
            }
        }
    }
}

/// Normalized desired state, ready for diffing
#[derive(Debug, Clone)]
pub struct NormalizedZone {
    /// Zone name
    pub zone: String,
    /// Surviving records after rewriting
    pub records: Vec<Record>,
    /// Surviving records grouped by key
    pub desired: RecordSets,
    /// Every adjustment, in record order, without duplicates
    pub warnings: Vec<NormalizationWarning>,
}

impl NormalizedZone {
    /// Adjustment notes per key, for the change report
    pub fn adjustments(&self) -> BTreeMap<RecordSetKey, Vec<String>> {
        let mut notes: BTreeMap<RecordSetKey, Vec<String>> = BTreeMap::new();
        for warning in &self.warnings {
            if let NormalizationWarning::TtlRaised { key, .. }
            | NormalizationWarning::TtlUnified { key, .. } = warning
            {
                notes.entry(key.clone()).or_default().push(warning.to_string());
            }
        }
        notes
    }

    /// Remove the record sets `is_managed` claims, with a warning each
    pub fn exclude_managed(mut self, is_managed: impl Fn(&RecordSetKey) -> bool) -> Self {
        let managed: Vec<RecordSetKey> = self
            .desired
            .keys()
            .filter(|key| is_managed(key))
            .cloned()
            .collect();

        for key in managed {
            warn!(zone = %self.zone, "{} skipped: managed by the provider", key);
            self.desired.remove(&key);
            self.records.retain(|record| record.key() != key);
            self.warnings.push(NormalizationWarning::ProviderManaged { key });
        }
        self
    }
}

/// Normalize `zone` for `provider`
///
/// # Errors
///
/// - `Error::Config` if the zone is structurally invalid
/// - `Error::Config` if the zone asks for DNSSEC signing and the provider
///   declares it cannot sign
pub fn normalize(
    zone: &DesiredZone,
    provider: &str,
    capabilities: &CapabilityRegistry,
    ttl: &TtlPolicy,
) -> Result<NormalizedZone> {
    zone.validate()?;

    let mut records = Vec::with_capacity(zone.records.len());
    let mut warnings: Vec<NormalizationWarning> = Vec::new();
    let mut push_warning = |warning: NormalizationWarning| {
        if !warnings.contains(&warning) {
            warn!(zone = %zone.name, "{}", warning);
            warnings.push(warning);
        }
    };

    let dnssec = capabilities.note(provider, Capability::CanAutoDnssec);
    match zone.auto_dnssec {
        AutoDnssec::On if dnssec.forbids() => {
            return Err(Error::config(format!(
                "Zone {} requests AUTODNSSEC but provider {} {}",
                zone.name, provider, dnssec
            )));
        }
        AutoDnssec::Off if dnssec.is_supported() => {
            push_warning(NormalizationWarning::DnssecNotDisabled {
                zone: zone.name.clone(),
                provider: provider.to_string(),
                note: dnssec.comment().map(str::to_string),
            });
        }
        _ => {}
    }

    for record in &zone.records {
        if let Some(capability) = Capability::for_record_type(record.rtype) {
            let flag = capabilities.note(provider, capability);
            if flag.forbids() {
                push_warning(NormalizationWarning::Dropped {
                    key: record.key(),
                    capability,
                    flag,
                });
                continue;
            }
        }

        let mut record = record.clone();
        if ttl.applies_to(&record) {
            push_warning(NormalizationWarning::TtlRaised {
                key: record.key(),
                from: record.ttl,
                to: ttl.minimum,
            });
            record.ttl = ttl.minimum;
        }
        records.push(record);
    }

    let mut set_ttls: BTreeMap<RecordSetKey, BTreeSet<u32>> = BTreeMap::new();
    for record in &records {
        set_ttls.entry(record.key()).or_default().insert(record.ttl);
    }
    for (key, ttls) in set_ttls {
        let Some(&to) = ttls.last() else { continue };
        if ttls.len() == 1 {
            continue;
        }
        for record in records.iter_mut().filter(|record| record.key() == key) {
            record.ttl = to;
        }
        push_warning(NormalizationWarning::TtlUnified { key, to });
    }

    let desired = group_by_key(&records);
    debug!(
        zone = %zone.name,
        records = records.len(),
        record_sets = desired.len(),
        "Normalized desired records"
    );

    Ok(NormalizedZone {
        zone: zone.name.clone(),
        records,
        desired,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityDeclaration;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::new().with_provider(
            "test",
            CapabilityDeclaration::new()
                .note(Capability::CanUseAlias, CapabilityFlag::cannot())
                .note(Capability::CanUseLoc, CapabilityFlag::unimplemented())
                .supports(Capability::CanUseCaa),
        )
    }

    #[test]
    fn test_group_by_key_collapses_members() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.4", 300)
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.5", 300)
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.4", 300)
            .unwrap()
            .with_record("@", RecordType::A, "1.2.3.4", 300)
            .unwrap();

        let sets = group_by_key(&zone.records);
        assert_eq!(sets.len(), 2);
        let www = &sets[&RecordSetKey::new("www.example.com", RecordType::A)];
        assert_eq!(www.len(), 2);
    }

    #[test]
    fn test_unsupported_records_are_dropped_with_warning() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("@", RecordType::Alias, "target.example.net.", 300)
            .unwrap()
            .with_record("@", RecordType::Caa, "0 issue \"ca.example\"", 300)
            .unwrap()
            .with_record("@", RecordType::Loc, "52 22 23.000 N 4 53 32.000 E -2.00m 0.00m 10000m 10m", 300)
            .unwrap();

        let normalized = normalize(&zone, "test", &registry(), &TtlPolicy::new(0)).unwrap();

        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].rtype, RecordType::Caa);
        assert_eq!(normalized.warnings.len(), 2);
        assert!(matches!(
            normalized.warnings[0],
            NormalizationWarning::Dropped {
                capability: Capability::CanUseAlias,
                ..
            }
        ));
        // Caller's zone is not modified
        assert_eq!(zone.records.len(), 3);
    }

    #[test]
    fn test_unknown_provider_proceeds_optimistically() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("@", RecordType::Alias, "target.example.net.", 300)
            .unwrap();

        let normalized = normalize(&zone, "unregistered", &registry(), &TtlPolicy::new(0)).unwrap();
        assert_eq!(normalized.records.len(), 1);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn test_ttl_raised_to_minimum_except_ns() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.4", 60)
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.5", 60)
            .unwrap()
            .with_record("@", RecordType::Ns, "ns1.example.net.", 60)
            .unwrap()
            .with_record("big", RecordType::A, "1.2.3.6", 7200)
            .unwrap();

        let normalized = normalize(&zone, "test", &registry(), &TtlPolicy::new(300)).unwrap();

        let ttls: Vec<(RecordType, u32)> = normalized
            .records
            .iter()
            .map(|r| (r.rtype, r.ttl))
            .collect();
        assert_eq!(
            ttls,
            vec![
                (RecordType::A, 300),
                (RecordType::A, 300),
                (RecordType::Ns, 60),
                (RecordType::A, 7200),
            ]
        );

        // Two records of one key raised from the same TTL produce one warning
        assert_eq!(normalized.warnings.len(), 1);
        assert_eq!(
            normalized.warnings[0].to_string(),
            "TTL of www.example.com A raised from 60 to 300 (provider minimum)"
        );

        let adjustments = normalized.adjustments();
        assert_eq!(adjustments.len(), 1);
        assert!(adjustments.contains_key(&RecordSetKey::new("www.example.com", RecordType::A)));
    }

    #[test]
    fn test_autodnssec_on_requires_capability() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_auto_dnssec(AutoDnssec::On);

        let err = normalize(&zone, "test", &registry(), &TtlPolicy::new(0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let signing = CapabilityRegistry::new().with_provider(
            "signer",
            CapabilityDeclaration::new().supports(Capability::CanAutoDnssec),
        );
        assert!(normalize(&zone, "signer", &signing, &TtlPolicy::new(0)).is_ok());
    }

    #[test]
    fn test_invalid_zone_is_config_error() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("www", RecordType::Cname, "a.example.net.", 300)
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.4", 300)
            .unwrap();

        assert!(matches!(
            normalize(&zone, "test", &registry(), &TtlPolicy::new(0)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_mixed_ttls_unified_to_largest() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.4", 300)
            .unwrap()
            .with_record("www", RecordType::A, "1.2.3.5", 600)
            .unwrap()
            .with_record("mail", RecordType::A, "1.2.3.6", 300)
            .unwrap();

        let normalized = normalize(&zone, "test", &registry(), &TtlPolicy::new(0)).unwrap();

        let www = &normalized.desired[&RecordSetKey::new("www.example.com", RecordType::A)];
        assert!(www.values.iter().all(|value| value.ttl == 600));
        assert_eq!(www.to_string(), "[1.2.3.4, 1.2.3.5] ttl=600");

        assert_eq!(
            normalized.warnings,
            vec![NormalizationWarning::TtlUnified {
                key: RecordSetKey::new("www.example.com", RecordType::A),
                to: 600,
            }]
        );
        assert_eq!(normalized.adjustments().len(), 1);
    }

    #[test]
    fn test_exclude_managed_drops_keys_with_warning() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_record("@", RecordType::Ns, "ns1.example.net.", 3600)
            .unwrap()
            .with_record("sub", RecordType::Ns, "ns1.example.net.", 3600)
            .unwrap();

        let apex_ns = RecordSetKey::new("example.com", RecordType::Ns);
        let normalized = normalize(&zone, "test", &registry(), &TtlPolicy::new(0))
            .unwrap()
            .exclude_managed(|key| *key == apex_ns);

        assert_eq!(normalized.desired.len(), 1);
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].fqdn, "sub.example.com");
        assert_eq!(
            normalized.warnings[0].to_string(),
            "example.com NS skipped: managed by the provider"
        );
        assert_eq!(normalized.warnings[0].key(), Some(&apex_ns));
    }

    #[test]
    fn test_autodnssec_off_on_always_signing_provider_warns() {
        let zone = DesiredZone::new("example.com")
            .unwrap()
            .with_auto_dnssec(AutoDnssec::Off);

        let signing = CapabilityRegistry::new().with_provider(
            "signer",
            CapabilityDeclaration::new()
                .note(Capability::CanAutoDnssec, CapabilityFlag::can_with("signs everything")),
        );
        let normalized = normalize(&zone, "signer", &signing, &TtlPolicy::new(0)).unwrap();

        assert_eq!(normalized.warnings.len(), 1);
        assert_eq!(normalized.warnings[0].key(), None);
        assert_eq!(
            normalized.warnings[0].to_string(),
            "AUTODNSSEC off is not applied to example.com: provider signer keeps signing (signs everything)"
        );

        // A provider that cannot sign has nothing to disable
        let normalized = normalize(&zone, "test", &registry(), &TtlPolicy::new(0)).unwrap();
        assert!(normalized.warnings.is_empty());
    }
}
