//! Record model
//!
//! - [`Record`]: one resource record with a parsed, canonical payload
//! - [`RecordSetKey`] / [`RecordSet`]: the `(FQDN, type)` unit that is diffed and replaced
//! - [`DesiredZone`]: a zone's declared records plus zone-level settings

pub mod name;
pub mod record;
pub mod zone;

pub use record::{Record, RecordData, RecordSet, RecordSetKey, RecordType, RecordValue};
pub use zone::{AutoDnssec, DesiredZone};
