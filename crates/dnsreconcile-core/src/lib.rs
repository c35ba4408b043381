// # dnsreconcile-core
//
// Core library for converging DNS zones to a declared desired state.
//
// ## Architecture Overview
//
// - **Record model**: Typed records, record-set keys and desired zones
// - **CapabilityRegistry**: What each provider type can serve
// - **normalize**: Drop unsupported records, raise TTLs, group by key
// - **diff**: Classify each key as create / update / delete
// - **correction**: One idempotent full-replacement action per changed key
// - **ReconcileEngine**: Runs the pipeline per zone and reports
// - **ProviderRegistry**: Factory registry for DNS providers
//
// ## Design Principles
//
// 1. **Desired state wins**: The provider is rewritten to match the configuration
// 2. **Idempotency**: A second run against a converged zone plans nothing
// 3. **Determinism**: Keys are processed in sorted order; messages are stable
// 4. **Isolation**: A failing zone or correction never stops the others
// 5. **Library-First**: All core functionality can be used as a library

pub mod capabilities;
pub mod config;
pub mod correction;
pub mod diff;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use capabilities::{
    render_feature_matrix, Capability, CapabilityDeclaration, CapabilityFlag, CapabilityRegistry,
};
pub use config::{EngineConfig, ProviderConfig, ReconcileConfig, RecordConfig, ZoneConfig};
pub use correction::{build_corrections, Correction, CorrectionAction};
pub use diff::{diff, Change, ChangeKind, ChangeSet};
pub use engine::{
    cancellation, execute, CancelHandle, Cancellation, ExecutionOutcome, ReconcileEngine,
    ReconcileEvent, ZoneJob, ZonePlan, ZoneReport,
};
pub use error::{Error, Result};
pub use model::{
    AutoDnssec, DesiredZone, Record, RecordData, RecordSet, RecordSetKey, RecordType, RecordValue,
};
pub use normalize::{group_by_key, normalize, NormalizationWarning, NormalizedZone, TtlPolicy};
pub use registry::{PreparedZones, ProviderRegistry};
pub use traits::{DnsProvider, DnsProviderFactory};
