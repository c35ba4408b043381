//! Correction builder
//!
//! Turns a [`ChangeSet`] into one [`Correction`] per changed key. Each
//! correction carries every message for its key and a deferred action that
//! replaces the whole record set in a single provider call.

use crate::diff::{ChangeKind, ChangeSet};
use crate::error::{Error, Result};
use crate::model::{RecordSet, RecordSetKey};
use crate::normalize::RecordSets;
use crate::traits::DnsProvider;
use std::fmt;
use std::sync::Arc;

/// What a correction does when run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionAction {
    /// Replace the record set with exactly these values
    Upsert(RecordSet),
    /// Remove the record set
    Delete(RecordSetKey),
}

/// One idempotent change to apply to a provider
#[derive(Clone)]
pub struct Correction {
    /// Human-readable description; one line per coalesced message
    pub message: String,
    /// Record set touched
    pub key: RecordSetKey,
    /// Kind of change that produced this correction
    pub kind: ChangeKind,
    /// Deferred provider call
    pub action: CorrectionAction,
    zone: String,
    provider: Arc<dyn DnsProvider>,
}

impl Correction {
    /// Zone the action targets
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Run the provider call
    ///
    /// Provider failures are wrapped in `Error::Correction`, labelled with
    /// the first line of the message.
    pub async fn run(&self) -> Result<()> {
        let result = match &self.action {
            CorrectionAction::Upsert(set) => self.provider.apply_record_set(&self.zone, set).await,
            CorrectionAction::Delete(key) => self.provider.delete_record_set(&self.zone, key).await,
        };
        result.map_err(|e| Error::correction(self.headline(), e.to_string()))
    }

    /// First line of the message
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

impl fmt::Debug for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correction")
            .field("message", &self.message)
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("action", &self.action)
            .field("zone", &self.zone)
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

/// Build corrections for `changes` against `provider`
///
/// Corrections follow the change order. With `deletes_first`, deletions
/// are moved ahead of creates and updates; relative order within each
/// group is kept.
pub fn build_corrections(
    zone: &str,
    changes: &ChangeSet,
    desired: &RecordSets,
    provider: Arc<dyn DnsProvider>,
    deletes_first: bool,
) -> Vec<Correction> {
    let mut corrections: Vec<Correction> = changes
        .changes()
        .iter()
        .map(|change| {
            let action = match desired.get(&change.key).filter(|set| !set.is_empty()) {
                Some(set) => CorrectionAction::Upsert(set.clone()),
                None => CorrectionAction::Delete(change.key.clone()),
            };
            Correction {
                message: change.messages.join("\n"),
                key: change.key.clone(),
                kind: change.kind,
                action,
                zone: zone.to_string(),
                provider: Arc::clone(&provider),
            }
        })
        .collect();

    if deletes_first {
        // sort_by_key is stable
        corrections.sort_by_key(|correction| correction.kind != ChangeKind::Delete);
    }

    corrections
}
