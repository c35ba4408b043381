//! Desired zone configuration

use crate::error::{Error, Result};
use crate::model::name;
use crate::model::record::{Record, RecordType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Requested DNSSEC signing state for a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoDnssec {
    /// Provider must sign the zone
    On,
    /// Signing was explicitly not requested
    Off,
    /// No preference
    #[default]
    Unset,
}

/// A named zone plus its desired records and zone-level settings
///
/// Produced by the configuration front end and consumed read-only by the
/// engine. Normalization returns a new snapshot instead of editing this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredZone {
    /// Canonical zone name
    pub name: String,
    /// Desired records in declaration order
    pub records: Vec<Record>,
    /// Requested DNSSEC state
    pub auto_dnssec: AutoDnssec,
}

impl DesiredZone {
    /// Create an empty desired zone
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: name::canonical_zone(name)?,
            records: Vec::new(),
            auto_dnssec: AutoDnssec::Unset,
        })
    }

    /// Add a record built from a label and a presentation value
    pub fn add_record(
        &mut self,
        label: &str,
        rtype: RecordType,
        value: &str,
        ttl: u32,
    ) -> Result<&mut Self> {
        let record = Record::new(&self.name, label, rtype, value, ttl)?;
        self.records.push(record);
        Ok(self)
    }

    /// Builder-style variant of [`DesiredZone::add_record`]
    pub fn with_record(
        mut self,
        label: &str,
        rtype: RecordType,
        value: &str,
        ttl: u32,
    ) -> Result<Self> {
        self.add_record(label, rtype, value, ttl)?;
        Ok(self)
    }

    /// Set the requested DNSSEC state
    pub fn with_auto_dnssec(mut self, auto_dnssec: AutoDnssec) -> Self {
        self.auto_dnssec = auto_dnssec;
        self
    }

    /// Structural validation
    ///
    /// - every record lies inside the zone and carries a value of its type
    /// - a CNAME owns its name exclusively
    pub fn validate(&self) -> Result<()> {
        name::validate_name(&self.name)?;

        let mut types_by_name: BTreeMap<&str, BTreeSet<RecordType>> = BTreeMap::new();
        for record in &self.records {
            record.validate(&self.name)?;
            types_by_name
                .entry(record.fqdn.as_str())
                .or_default()
                .insert(record.rtype);
        }

        for (fqdn, types) in &types_by_name {
            if types.contains(&RecordType::Cname) && types.len() > 1 {
                let others: Vec<&str> = types
                    .iter()
                    .filter(|t| **t != RecordType::Cname)
                    .map(|t| t.as_str())
                    .collect();
                return Err(Error::config(format!(
                    "CNAME at {} cannot coexist with other records ({})",
                    fqdn,
                    others.join(", ")
                )));
            }
        }

        let cname_count = self
            .records
            .iter()
            .filter(|r| r.rtype == RecordType::Cname)
            .fold(BTreeMap::<&str, usize>::new(), |mut acc, r| {
                *acc.entry(r.fqdn.as_str()).or_default() += 1;
                acc
            });
        if let Some((fqdn, _)) = cname_count.iter().find(|(_, count)| **count > 1) {
            return Err(Error::config(format!(
                "Multiple CNAME records at {}",
                fqdn
            )));
        }

        Ok(())
    }
}
