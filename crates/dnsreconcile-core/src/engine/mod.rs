//! Core reconciliation engine
//!
//! The ReconcileEngine is responsible for:
//! - Fetching the existing records of each zone
//! - Normalizing the desired records against provider capabilities
//! - Diffing and building one correction per changed record set
//! - Executing corrections and reporting per zone
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────────┐
//! │ DesiredZone  │                    │  DnsProvider     │
//! └──────────────┘                    │  (fetch / apply) │
//!        │                            └──────────────────┘
//!        ▼                                  │      ▲
//! ┌──────────────┐   existing records       │      │ corrections
//! │ normalize    │◄─────────────────────────┘      │
//! └──────────────┘                                 │
//!        │                                         │
//!        ▼                                         │
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ diff         │────►│ build        │────►│ execute      │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                                                  │
//!                                                  ▼
//!                                           ┌──────────────┐
//!                                           │ ZoneReport / │
//!                                           │ events       │
//!                                           └──────────────┘
//! ```
//!
//! ## Concurrency
//!
//! One pipeline per zone; each pipeline is sequential. Zones of a provider
//! declaring `CanConcur` run in parallel, the zones of any other provider
//! run one after another. A semaphore bounds the total.

pub mod cancel;
pub mod executor;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use executor::{execute, execute_observed, CorrectionFailure, ExecutionOutcome};

use crate::capabilities::{Capability, CapabilityRegistry};
use crate::config::EngineConfig;
use crate::correction::{build_corrections, Correction};
use crate::diff::{diff, ChangeSet};
use crate::error::{Error, Result};
use crate::model::DesiredZone;
use crate::normalize::{group_by_key, normalize, NormalizationWarning, TtlPolicy};
use crate::traits::DnsProvider;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Events emitted by the ReconcileEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Zone pipeline started
    ZoneStarted { zone: String, provider: String },

    /// Normalization adjusted or dropped a desired record
    NormalizationWarning { zone: String, message: String },

    /// A correction was applied
    CorrectionApplied { zone: String, message: String },

    /// A correction failed; the zone carries on
    CorrectionFailed {
        zone: String,
        message: String,
        error: String,
    },

    /// Zone pipeline finished (possibly with failed corrections)
    ZoneFinished {
        zone: String,
        applied: usize,
        failed: usize,
        skipped: usize,
    },

    /// Zone pipeline stopped on a zone-level error
    ZoneAborted { zone: String, error: String },
}

/// One zone to reconcile and the provider serving it
#[derive(Clone)]
pub struct ZoneJob {
    pub provider: Arc<dyn DnsProvider>,
    pub zone: DesiredZone,
}

impl ZoneJob {
    pub fn new(provider: Arc<dyn DnsProvider>, zone: DesiredZone) -> Self {
        Self { provider, zone }
    }
}

/// Planned corrections for one zone, not yet executed
#[derive(Debug)]
pub struct ZonePlan {
    pub zone: String,
    pub provider: String,
    /// Changed keys with their messages
    pub changes: ChangeSet,
    /// Corrections in execution order
    pub corrections: Vec<Correction>,
    /// Normalization diagnostics
    pub warnings: Vec<NormalizationWarning>,
}

impl ZonePlan {
    /// Correction messages in execution order
    pub fn messages(&self) -> Vec<String> {
        self.corrections.iter().map(|c| c.message.clone()).collect()
    }
}

/// Outcome of reconciling one zone
#[derive(Debug)]
pub struct ZoneReport {
    pub zone: String,
    pub provider: String,
    /// Corrections were planned but not executed
    pub dry_run: bool,
    /// Messages of every planned correction
    pub planned: Vec<String>,
    /// Corrections started
    pub attempted: usize,
    /// Corrections that succeeded
    pub applied: usize,
    /// Corrections that failed
    pub failures: Vec<CorrectionFailure>,
    /// Corrections skipped after cancellation
    pub skipped: usize,
    /// Normalization diagnostics
    pub warnings: Vec<NormalizationWarning>,
    /// Zone-level error that stopped the pipeline
    pub fatal: Option<Error>,
    /// Cancellation cut the zone short
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ZoneReport {
    fn new(zone: &str, provider: &str, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            zone: zone.to_string(),
            provider: provider.to_string(),
            dry_run,
            planned: Vec::new(),
            attempted: 0,
            applied: 0,
            failures: Vec::new(),
            skipped: 0,
            warnings: Vec::new(),
            fatal: None,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Report for a zone stopped by `error` before its pipeline ran
    pub fn aborted(zone: &str, provider: &str, dry_run: bool, error: Error) -> Self {
        let mut report = Self::new(zone, provider, dry_run);
        report.fatal = Some(error);
        report
    }

    /// Whether the zone may still differ from the desired state
    pub fn needs_rerun(&self) -> bool {
        self.fatal.is_some()
            || !self.failures.is_empty()
            || self.cancelled
            || (self.dry_run && !self.planned.is_empty())
    }

    /// Whether the provider now matches the desired state
    pub fn is_converged(&self) -> bool {
        !self.needs_rerun()
    }
}

impl fmt::Display for ZoneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Zone {} ({}): {} planned, {} attempted, {} applied, {} failed{}",
            self.zone,
            self.provider,
            self.planned.len(),
            self.attempted,
            self.applied,
            self.failures.len(),
            if self.dry_run { " [preview]" } else { "" }
        )?;
        for warning in &self.warnings {
            writeln!(f, "  WARNING {}", warning)?;
        }
        for message in &self.planned {
            for line in message.lines() {
                writeln!(f, "  {}", line)?;
            }
        }
        for failure in &self.failures {
            writeln!(f, "  FAILED {}", failure.error)?;
        }
        if self.cancelled {
            writeln!(f, "  CANCELLED ({} skipped)", self.skipped)?;
        }
        if let Some(fatal) = &self.fatal {
            writeln!(f, "  ABORTED {}", fatal)?;
        }
        Ok(())
    }
}

/// Core reconciliation engine
///
/// Cheap to clone; clones share the capability registry and event channel.
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileEngine::new()`]
/// 2. Preview with [`ReconcileEngine::plan_zone()`] or converge with
///    [`ReconcileEngine::reconcile_all()`]
/// 3. Drain the event receiver for monitoring
#[derive(Clone)]
pub struct ReconcileEngine {
    /// Shared, read-only capability lookup
    capabilities: Arc<CapabilityRegistry>,

    /// Engine settings
    config: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl ReconcileEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        capabilities: Arc<CapabilityRegistry>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            capabilities,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch, normalize, diff and build corrections for one zone
    ///
    /// Nothing is written to the provider.
    ///
    /// # Errors
    ///
    /// - `Error::Fetch` if the provider cannot report the zone's records or TTL floor
    /// - `Error::Config` if the desired zone is invalid for this provider
    pub async fn plan_zone(
        &self,
        provider: Arc<dyn DnsProvider>,
        zone: &DesiredZone,
    ) -> Result<ZonePlan> {
        let provider_name = provider.provider_name();

        let minimum_ttl = provider
            .minimum_ttl(&zone.name)
            .await
            .map_err(|e| Error::fetch(&zone.name, e.to_string()))?
            .unwrap_or(self.config.default_min_ttl);

        let existing = provider
            .fetch_existing_records(&zone.name)
            .await
            .map_err(|e| Error::fetch(&zone.name, e.to_string()))?;
        debug!(zone = %zone.name, records = existing.len(), "Fetched existing records");

        let normalized = normalize(
            zone,
            provider_name,
            &self.capabilities,
            &TtlPolicy::new(minimum_ttl),
        )?
        .exclude_managed(|key| provider.manages_record_set(&zone.name, key));
        for warning in &normalized.warnings {
            self.emit_event(ReconcileEvent::NormalizationWarning {
                zone: zone.name.clone(),
                message: warning.to_string(),
            });
        }

        let mut existing = group_by_key(&existing);
        existing.retain(|key, _| !provider.manages_record_set(&zone.name, key));
        let mut changes = diff(&normalized.desired, &existing);
        changes.annotate(&normalized.adjustments());

        let deletes_first = self
            .capabilities
            .has_capability(provider_name, Capability::NeedsDeletesFirst);
        let corrections = build_corrections(
            &zone.name,
            &changes,
            &normalized.desired,
            provider,
            deletes_first,
        );
        debug!(
            zone = %zone.name,
            changes = changes.change_count(),
            corrections = corrections.len(),
            "Planned corrections"
        );

        Ok(ZonePlan {
            zone: zone.name.clone(),
            provider: provider_name.to_string(),
            changes,
            corrections,
            warnings: normalized.warnings,
        })
    }

    /// Run the whole pipeline for one zone
    ///
    /// Never fails; zone-level errors end up in [`ZoneReport::fatal`].
    pub async fn reconcile_zone(
        &self,
        provider: Arc<dyn DnsProvider>,
        zone: &DesiredZone,
        cancellation: &Cancellation,
    ) -> ZoneReport {
        let provider_name = provider.provider_name();
        let mut report = ZoneReport::new(&zone.name, provider_name, self.config.dry_run);

        if cancellation.is_cancelled() {
            report.cancelled = true;
            warn!(zone = %zone.name, "Cancelled before start");
            return report;
        }

        info!(zone = %zone.name, provider = provider_name, "Reconciling zone");
        self.emit_event(ReconcileEvent::ZoneStarted {
            zone: zone.name.clone(),
            provider: provider_name.to_string(),
        });

        if self.config.create_missing_zones
            && !self.config.dry_run
            && self
                .capabilities
                .has_capability(provider_name, Capability::DocCreateDomains)
        {
            if let Err(e) = provider.ensure_zone_exists(&zone.name).await {
                return self.abort(report, e);
            }
        }

        let plan = match self.plan_zone(provider, zone).await {
            Ok(plan) => plan,
            Err(e) => return self.abort(report, e),
        };
        report.planned = plan.messages();
        report.warnings = plan.warnings;

        if self.config.dry_run {
            info!(zone = %zone.name, planned = report.planned.len(), "Dry run, not executing");
            report.finished_at = Utc::now();
            return report;
        }

        let outcome = execute_observed(&plan.corrections, cancellation, |correction, failure| {
            let event = match failure {
                None => ReconcileEvent::CorrectionApplied {
                    zone: correction.zone().to_string(),
                    message: correction.message.clone(),
                },
                Some(e) => ReconcileEvent::CorrectionFailed {
                    zone: correction.zone().to_string(),
                    message: correction.message.clone(),
                    error: e.to_string(),
                },
            };
            self.emit_event(event);
        })
        .await;

        report.attempted = outcome.attempted();
        report.applied = outcome.applied;
        report.skipped = outcome.skipped;
        report.cancelled = outcome.cancelled;
        report.failures = outcome.errors;
        report.finished_at = Utc::now();

        info!(
            zone = %zone.name,
            applied = report.applied,
            failed = report.failures.len(),
            skipped = report.skipped,
            "Zone finished"
        );
        self.emit_event(ReconcileEvent::ZoneFinished {
            zone: zone.name.clone(),
            applied: report.applied,
            failed: report.failures.len(),
            skipped: report.skipped,
        });

        report
    }

    /// Reconcile every job, honoring provider concurrency
    ///
    /// Reports are returned sorted by zone name.
    pub async fn reconcile_all(
        &self,
        jobs: Vec<ZoneJob>,
        cancellation: &Cancellation,
    ) -> Vec<ZoneReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let mut by_provider: BTreeMap<&'static str, Vec<ZoneJob>> = BTreeMap::new();
        for job in jobs {
            by_provider
                .entry(job.provider.provider_name())
                .or_default()
                .push(job);
        }

        let expected: Vec<(String, &'static str)> = by_provider
            .iter()
            .flat_map(|(provider_name, jobs)| {
                jobs.iter().map(|job| (job.zone.name.clone(), *provider_name))
            })
            .collect();

        let mut tasks: JoinSet<Vec<ZoneReport>> = JoinSet::new();
        for (provider_name, jobs) in by_provider {
            let concurrent = self
                .capabilities
                .has_capability(provider_name, Capability::CanConcur);
            debug!(
                provider = provider_name,
                zones = jobs.len(),
                concurrent,
                "Scheduling zones"
            );

            if concurrent {
                for job in jobs {
                    let engine = self.clone();
                    let semaphore = Arc::clone(&semaphore);
                    let cancellation = cancellation.clone();
                    tasks.spawn(async move {
                        let _permit = semaphore.acquire_owned().await.ok();
                        vec![
                            engine
                                .reconcile_zone(job.provider, &job.zone, &cancellation)
                                .await,
                        ]
                    });
                }
            } else {
                let engine = self.clone();
                let semaphore = Arc::clone(&semaphore);
                let cancellation = cancellation.clone();
                tasks.spawn(async move {
                    let mut reports = Vec::with_capacity(jobs.len());
                    for job in jobs {
                        let _permit = Arc::clone(&semaphore).acquire_owned().await.ok();
                        reports.push(
                            engine
                                .reconcile_zone(job.provider, &job.zone, &cancellation)
                                .await,
                        );
                    }
                    reports
                });
            }
        }

        let mut reports = Vec::new();
        let mut worker_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(mut batch) => reports.append(&mut batch),
                Err(e) => {
                    error!("Zone worker failed: {}", e);
                    worker_errors.push(e.to_string());
                }
            }
        }

        if !worker_errors.is_empty() {
            let reason = worker_errors.join("; ");
            for (zone, provider_name) in expected {
                let reported = reports
                    .iter()
                    .any(|report| report.zone == zone && report.provider == provider_name);
                if !reported {
                    let report = ZoneReport::new(&zone, provider_name, self.config.dry_run);
                    reports.push(self.abort(
                        report,
                        Error::Other(format!("Zone worker ended before reporting: {}", reason)),
                    ));
                }
            }
        }

        reports.sort_by(|a, b| a.zone.cmp(&b.zone).then_with(|| a.provider.cmp(&b.provider)));
        reports
    }

    fn abort(&self, mut report: ZoneReport, e: Error) -> ZoneReport {
        error!(zone = %report.zone, "Zone aborted: {}", e);
        self.emit_event(ReconcileEvent::ZoneAborted {
            zone: report.zone.clone(),
            error: e.to_string(),
        });
        report.fatal = Some(e);
        report.finished_at = Utc::now();
        report
    }

    /// Emit an engine event
    fn emit_event(&self, event: ReconcileEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
