//! Record-set diff
//!
//! Compares desired and existing record sets over the union of their keys.
//! Keys are visited in `RecordSetKey` order, so the messages produced for a
//! given pair of inputs are byte-identical across runs.

use crate::model::{RecordSet, RecordSetKey};
use crate::normalize::RecordSets;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How a key differs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Desired only
    Create,
    /// Present on both sides with different value bags
    Update,
    /// Existing only
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Update => "MODIFY",
            ChangeKind::Delete => "DELETE",
        })
    }
}

/// One changed key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: RecordSetKey,
    pub kind: ChangeKind,
    /// Existing bag, absent for creates
    pub old: Option<RecordSet>,
    /// Desired bag, absent for deletes
    pub new: Option<RecordSet>,
    /// Human-readable lines describing the change
    pub messages: Vec<String>,
}

impl Change {
    fn create(desired: &RecordSet) -> Self {
        Self {
            key: desired.key.clone(),
            kind: ChangeKind::Create,
            old: None,
            new: Some(desired.clone()),
            messages: vec![format!("+ CREATE {} {}", desired.key, desired)],
        }
    }

    fn delete(existing: &RecordSet) -> Self {
        Self {
            key: existing.key.clone(),
            kind: ChangeKind::Delete,
            old: Some(existing.clone()),
            new: None,
            messages: vec![format!("- DELETE {} {}", existing.key, existing)],
        }
    }

    fn update(existing: &RecordSet, desired: &RecordSet) -> Self {
        Self {
            key: desired.key.clone(),
            kind: ChangeKind::Update,
            old: Some(existing.clone()),
            new: Some(desired.clone()),
            messages: vec![format!(
                "± MODIFY {} {} -> {}",
                desired.key, existing, desired
            )],
        }
    }
}

/// Every changed key in sorted order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Changes in key order
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Keys that differ
    pub fn changed_keys(&self) -> Vec<&RecordSetKey> {
        self.changes.iter().map(|change| &change.key).collect()
    }

    /// All messages, flattened in key order
    pub fn messages(&self) -> Vec<String> {
        self.changes
            .iter()
            .flat_map(|change| change.messages.iter().cloned())
            .collect()
    }

    /// Number of changed keys
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Append normalization notes to the matching changes
    ///
    /// Notes for keys that did not change are not reported; an adjusted
    /// record that already matches the provider needs no correction.
    pub fn annotate(&mut self, notes: &BTreeMap<RecordSetKey, Vec<String>>) {
        for change in &mut self.changes {
            if let Some(extra) = notes.get(&change.key) {
                change.messages.extend(extra.iter().cloned());
            }
        }
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Classify every key present on either side
///
/// Bags are compared as sets, TTL included. Pure; no I/O.
pub fn diff(desired: &RecordSets, existing: &RecordSets) -> ChangeSet {
    let keys: BTreeSet<&RecordSetKey> = desired.keys().chain(existing.keys()).collect();

    let changes = keys
        .into_iter()
        .filter_map(|key| {
            let wanted = desired.get(key).filter(|set| !set.is_empty());
            let current = existing.get(key).filter(|set| !set.is_empty());
            match (wanted, current) {
                (Some(wanted), None) => Some(Change::create(wanted)),
                (None, Some(current)) => Some(Change::delete(current)),
                (Some(wanted), Some(current)) if wanted.values != current.values => {
                    Some(Change::update(current, wanted))
                }
                _ => None,
            }
        })
        .collect();

    ChangeSet { changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, RecordType};
    use crate::normalize::group_by_key;

    fn sets(records: &[(&str, RecordType, &str, u32)]) -> RecordSets {
        let records: Vec<Record> = records
            .iter()
            .map(|(label, rtype, value, ttl)| {
                Record::new("example.com", label, *rtype, value, *ttl).unwrap()
            })
            .collect();
        group_by_key(&records)
    }

    #[test]
    fn test_create_update_delete_and_unchanged() {
        let desired = sets(&[
            ("www", RecordType::A, "1.2.3.4", 300),
            ("api", RecordType::A, "1.2.3.5", 300),
            ("same", RecordType::Txt, "hello", 300),
        ]);
        let existing = sets(&[
            ("api", RecordType::A, "1.2.3.6", 300),
            ("old", RecordType::A, "1.2.3.7", 300),
            ("same", RecordType::Txt, "\"hello\"", 300),
        ]);

        let changes = diff(&desired, &existing);
        assert_eq!(changes.change_count(), 3);
        assert_eq!(
            changes.messages(),
            vec![
                "± MODIFY api.example.com A [1.2.3.6] ttl=300 -> [1.2.3.5] ttl=300",
                "- DELETE old.example.com A [1.2.3.7] ttl=300",
                "+ CREATE www.example.com A [1.2.3.4] ttl=300",
            ]
        );
    }

    #[test]
    fn test_ttl_difference_is_an_update() {
        let desired = sets(&[("www", RecordType::A, "1.2.3.4", 300)]);
        let existing = sets(&[("www", RecordType::A, "1.2.3.4", 60)]);

        let changes = diff(&desired, &existing);
        assert_eq!(changes.change_count(), 1);
        assert_eq!(changes.changes()[0].kind, ChangeKind::Update);
    }

    #[test]
    fn test_bags_compare_as_sets() {
        let desired = sets(&[
            ("@", RecordType::Mx, "10 a.example.com.", 300),
            ("@", RecordType::Mx, "20 b.example.com.", 300),
        ]);
        let existing = sets(&[
            ("@", RecordType::Mx, "20 B.EXAMPLE.COM.", 300),
            ("@", RecordType::Mx, "10 a", 300),
            ("@", RecordType::Mx, "10 a.example.com.", 300),
        ]);

        assert!(diff(&desired, &existing).is_empty());
    }

    #[test]
    fn test_diff_is_deterministic() {
        let desired = sets(&[
            ("b", RecordType::A, "1.1.1.1", 300),
            ("a", RecordType::Aaaa, "::1", 300),
            ("a", RecordType::A, "1.1.1.2", 300),
        ]);
        let existing = RecordSets::new();

        let first = diff(&desired, &existing).messages();
        let second = diff(&desired, &existing).messages();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                "+ CREATE a.example.com A [1.1.1.2] ttl=300",
                "+ CREATE a.example.com AAAA [::1] ttl=300",
                "+ CREATE b.example.com A [1.1.1.1] ttl=300",
            ]
        );
    }

    #[test]
    fn test_annotate_only_touches_changed_keys() {
        let desired = sets(&[("www", RecordType::A, "1.2.3.4", 300)]);
        let mut changes = diff(&desired, &RecordSets::new());

        let key = RecordSetKey::new("www.example.com", RecordType::A);
        let untouched = RecordSetKey::new("mail.example.com", RecordType::A);
        let notes = BTreeMap::from([
            (key, vec!["TTL raised".to_string()]),
            (untouched, vec!["ignored".to_string()]),
        ]);
        changes.annotate(&notes);

        assert_eq!(changes.changes()[0].messages.len(), 2);
        assert_eq!(changes.messages().len(), 2);
    }
}
