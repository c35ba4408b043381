//! Capability registry
//!
//! Each provider type declares once, at registration, what it supports. The
//! declaration has two layers:
//!
//! - **notes**: explicit documentation entries (`Can` with an optional
//!   comment, `Cannot`, `Unimplemented`). A note always wins.
//! - **probe**: the plain set of capabilities the implementation asserts.
//!
//! Anything neither noted nor asserted resolves to `Cannot`. A provider
//! identity that was never registered resolves to `Unknown`, and callers
//! proceed optimistically.
//!
//! Normalization and the feature matrix both go through
//! [`CapabilityRegistry::note`], so the published table is the enforced one.

pub mod matrix;

use crate::model::RecordType;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use matrix::render_feature_matrix;

/// Capability identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Provider can sign zones automatically
    CanAutoDnssec,
    /// Zones of this provider may be reconciled concurrently
    CanConcur,
    /// Provider can list the zones of an account
    CanGetZones,
    CanUseAlias,
    CanUseCaa,
    CanUseDhcid,
    CanUseDname,
    CanUseDnskey,
    CanUseDs,
    CanUseHttps,
    CanUseLoc,
    CanUseNaptr,
    CanUsePtr,
    CanUseSoa,
    CanUseSrv,
    CanUseSshfp,
    CanUseSvcb,
    CanUseTlsa,
    /// Provider API needs deletions to land before creates and updates
    NeedsDeletesFirst,
    /// Provider can create missing zones
    DocCreateDomains,
    /// Provider can serve a zone alongside another provider
    DocDualHost,
    /// Provider is maintained as officially supported
    DocOfficiallySupported,
}

impl Capability {
    /// The capability a record type needs, if any
    ///
    /// A, AAAA, CNAME, MX, NS and TXT are universally supported.
    pub fn for_record_type(rtype: RecordType) -> Option<Capability> {
        match rtype {
            RecordType::Alias => Some(Capability::CanUseAlias),
            RecordType::Caa => Some(Capability::CanUseCaa),
            RecordType::Dhcid => Some(Capability::CanUseDhcid),
            RecordType::Dname => Some(Capability::CanUseDname),
            RecordType::Dnskey => Some(Capability::CanUseDnskey),
            RecordType::Ds => Some(Capability::CanUseDs),
            RecordType::Https => Some(Capability::CanUseHttps),
            RecordType::Loc => Some(Capability::CanUseLoc),
            RecordType::Naptr => Some(Capability::CanUseNaptr),
            RecordType::Ptr => Some(Capability::CanUsePtr),
            RecordType::Soa => Some(Capability::CanUseSoa),
            RecordType::Srv => Some(Capability::CanUseSrv),
            RecordType::Sshfp => Some(Capability::CanUseSshfp),
            RecordType::Svcb => Some(Capability::CanUseSvcb),
            RecordType::Tlsa => Some(Capability::CanUseTlsa),
            RecordType::A
            | RecordType::Aaaa
            | RecordType::Cname
            | RecordType::Mx
            | RecordType::Ns
            | RecordType::Txt => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Resolved capability state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityFlag {
    /// Supported, optionally with a comment for documentation
    Can(Option<String>),
    /// Not supported
    Cannot(Option<String>),
    /// Supportable in principle, not wired up yet
    Unimplemented(Option<String>),
    /// No assertion was made
    Unknown,
}

impl CapabilityFlag {
    pub fn can() -> Self {
        CapabilityFlag::Can(None)
    }

    pub fn can_with(note: impl Into<String>) -> Self {
        CapabilityFlag::Can(Some(note.into()))
    }

    pub fn cannot() -> Self {
        CapabilityFlag::Cannot(None)
    }

    pub fn cannot_with(note: impl Into<String>) -> Self {
        CapabilityFlag::Cannot(Some(note.into()))
    }

    pub fn unimplemented() -> Self {
        CapabilityFlag::Unimplemented(None)
    }

    pub fn unimplemented_with(note: impl Into<String>) -> Self {
        CapabilityFlag::Unimplemented(Some(note.into()))
    }

    /// Whether the capability is usable
    pub fn is_supported(&self) -> bool {
        matches!(self, CapabilityFlag::Can(_))
    }

    /// Whether records needing this capability must be dropped
    pub fn forbids(&self) -> bool {
        matches!(
            self,
            CapabilityFlag::Cannot(_) | CapabilityFlag::Unimplemented(_)
        )
    }

    /// Free-text comment attached to the flag
    pub fn comment(&self) -> Option<&str> {
        match self {
            CapabilityFlag::Can(note)
            | CapabilityFlag::Cannot(note)
            | CapabilityFlag::Unimplemented(note) => note.as_deref(),
            CapabilityFlag::Unknown => None,
        }
    }
}

impl fmt::Display for CapabilityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityFlag::Can(_) => "can",
            CapabilityFlag::Cannot(_) => "cannot",
            CapabilityFlag::Unimplemented(_) => "unimplemented",
            CapabilityFlag::Unknown => "unknown",
        };
        match self.comment() {
            Some(comment) => write!(f, "{} ({})", name, comment),
            None => f.write_str(name),
        }
    }
}

/// Static capability declaration of one provider type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityDeclaration {
    notes: BTreeMap<Capability, CapabilityFlag>,
    asserted: BTreeSet<Capability>,
}

impl CapabilityDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an explicit documentation note
    pub fn note(mut self, capability: Capability, flag: CapabilityFlag) -> Self {
        self.notes.insert(capability, flag);
        self
    }

    /// Assert a capability without a note
    pub fn supports(mut self, capability: Capability) -> Self {
        self.asserted.insert(capability);
        self
    }

    fn resolve(&self, capability: Capability) -> CapabilityFlag {
        if let Some(flag) = self.notes.get(&capability) {
            return flag.clone();
        }
        if self.asserted.contains(&capability) {
            CapabilityFlag::can()
        } else {
            CapabilityFlag::cannot()
        }
    }
}

/// Read-only lookup table: provider identity -> declaration
///
/// Built once by the process entry point (through
/// [`crate::registry::ProviderRegistry`]) and shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    providers: BTreeMap<String, CapabilityDeclaration>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider identity; a second registration replaces the first
    pub fn register(&mut self, provider: impl Into<String>, declaration: CapabilityDeclaration) {
        self.providers.insert(provider.into(), declaration);
    }

    /// Builder-style variant of [`CapabilityRegistry::register`]
    pub fn with_provider(
        mut self,
        provider: impl Into<String>,
        declaration: CapabilityDeclaration,
    ) -> Self {
        self.register(provider, declaration);
        self
    }

    /// Resolve the flag for `capability` on `provider`
    pub fn note(&self, provider: &str, capability: Capability) -> CapabilityFlag {
        match self.providers.get(provider) {
            Some(declaration) => declaration.resolve(capability),
            None => CapabilityFlag::Unknown,
        }
    }

    /// Whether `provider` supports `capability`
    pub fn has_capability(&self, provider: &str, capability: Capability) -> bool {
        self.note(provider, capability).is_supported()
    }

    /// Registered provider identities in sorted order
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn is_registered(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::new().with_provider(
            "desec",
            CapabilityDeclaration::new()
                .note(Capability::CanUseAlias, CapabilityFlag::unimplemented_with("use SVCB"))
                .note(Capability::CanConcur, CapabilityFlag::can())
                .note(Capability::CanUseSrv, CapabilityFlag::cannot())
                .supports(Capability::CanUseSrv)
                .supports(Capability::CanGetZones),
        )
    }

    #[test]
    fn test_note_overrides_probe() {
        let registry = registry();
        assert_eq!(
            registry.note("desec", Capability::CanUseSrv),
            CapabilityFlag::cannot()
        );
        assert!(!registry.has_capability("desec", Capability::CanUseSrv));
    }

    #[test]
    fn test_probe_used_without_note() {
        let registry = registry();
        assert!(registry.has_capability("desec", Capability::CanGetZones));
        assert_eq!(
            registry.note("desec", Capability::CanGetZones),
            CapabilityFlag::can()
        );
    }

    #[test]
    fn test_unasserted_defaults_to_cannot() {
        let registry = registry();
        assert_eq!(
            registry.note("desec", Capability::CanUseLoc),
            CapabilityFlag::cannot()
        );
        assert!(registry.note("desec", Capability::CanUseLoc).forbids());
    }

    #[test]
    fn test_unregistered_provider_is_unknown() {
        let registry = registry();
        let flag = registry.note("route53", Capability::CanUseAlias);
        assert_eq!(flag, CapabilityFlag::Unknown);
        assert!(!flag.forbids());
        assert!(!flag.is_supported());
    }

    #[test]
    fn test_unimplemented_forbids_and_keeps_comment() {
        let flag = registry().note("desec", Capability::CanUseAlias);
        assert!(flag.forbids());
        assert_eq!(flag.comment(), Some("use SVCB"));
        assert_eq!(flag.to_string(), "unimplemented (use SVCB)");
    }

    #[test]
    fn test_record_type_capabilities() {
        assert_eq!(
            Capability::for_record_type(RecordType::Alias),
            Some(Capability::CanUseAlias)
        );
        assert_eq!(Capability::for_record_type(RecordType::A), None);
        assert_eq!(Capability::for_record_type(RecordType::Ns), None);
    }
}
