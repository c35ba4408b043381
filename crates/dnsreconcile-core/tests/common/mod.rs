//! Test doubles and common utilities for contract tests
//!
//! `RecordingProvider` wraps the in-memory provider and records every call,
//! with knobs for failure injection, latency and in-flight tracking.

#![allow(dead_code)]

use dnsreconcile_core::engine::CancelHandle;
use dnsreconcile_core::error::{Error, Result};
use dnsreconcile_core::providers::MemoryProvider;
use dnsreconcile_core::{
    Capability, CapabilityDeclaration, CapabilityRegistry, DesiredZone, DnsProvider,
    EngineConfig, ReconcileEngine, ReconcileEvent, Record, RecordSet, RecordSetKey, RecordType,
    RecordValue,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A DnsProvider that tracks calls and can be told to fail
pub struct RecordingProvider {
    /// Backing store
    pub inner: MemoryProvider,
    /// Provider identity reported to the engine
    pub name: &'static str,
    /// Call counter for apply_record_set()
    apply_call_count: Arc<AtomicUsize>,
    /// Call counter for fetch_existing_records()
    fetch_call_count: Arc<AtomicUsize>,
    /// Record sets passed to apply_record_set(), in call order
    applied: Arc<Mutex<Vec<RecordSet>>>,
    /// Keys whose apply fails
    failing_keys: Arc<Mutex<BTreeSet<RecordSetKey>>>,
    /// Whether fetch_existing_records() fails
    fail_fetch: Arc<AtomicBool>,
    /// Whether fetch_existing_records() panics
    panic_fetch: Arc<AtomicBool>,
    /// Store every set with one TTL, the way rrset-based APIs do
    one_ttl_per_set: Arc<AtomicBool>,
    /// Calls currently inside fetch/apply
    in_flight: Arc<AtomicUsize>,
    /// Highest observed in_flight
    max_in_flight: Arc<AtomicUsize>,
    /// Simulated latency of every call
    latency: Duration,
    /// Cancel this handle after the first apply
    cancel_after_first_apply: Arc<Mutex<Option<CancelHandle>>>,
}

impl RecordingProvider {
    pub fn new(name: &'static str) -> Self {
        Self::with_inner(name, MemoryProvider::new())
    }

    pub fn with_inner(name: &'static str, inner: MemoryProvider) -> Self {
        Self {
            inner,
            name,
            apply_call_count: Arc::new(AtomicUsize::new(0)),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
            applied: Arc::new(Mutex::new(Vec::new())),
            failing_keys: Arc::new(Mutex::new(BTreeSet::new())),
            fail_fetch: Arc::new(AtomicBool::new(false)),
            panic_fetch: Arc::new(AtomicBool::new(false)),
            one_ttl_per_set: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            latency: Duration::ZERO,
            cancel_after_first_apply: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a new RecordingProvider that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            name: other.name,
            apply_call_count: Arc::clone(&other.apply_call_count),
            fetch_call_count: Arc::clone(&other.fetch_call_count),
            applied: Arc::clone(&other.applied),
            failing_keys: Arc::clone(&other.failing_keys),
            fail_fetch: Arc::clone(&other.fail_fetch),
            panic_fetch: Arc::clone(&other.panic_fetch),
            one_ttl_per_set: Arc::clone(&other.one_ttl_per_set),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
            latency: other.latency,
            cancel_after_first_apply: Arc::clone(&other.cancel_after_first_apply),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make apply_record_set() fail for `key`
    pub fn fail_on(&self, key: RecordSetKey) {
        self.failing_keys.lock().unwrap().insert(key);
    }

    /// Make fetch_existing_records() fail
    pub fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    /// Make fetch_existing_records() panic
    pub fn panic_on_fetch(&self) {
        self.panic_fetch.store(true, Ordering::SeqCst);
    }

    /// Collapse member TTLs to the set TTL on apply
    pub fn store_one_ttl_per_set(&self) {
        self.one_ttl_per_set.store(true, Ordering::SeqCst);
    }

    /// Cancel `handle` as soon as the first apply finishes
    pub fn cancel_after_first_apply(&self, handle: CancelHandle) {
        *self.cancel_after_first_apply.lock().unwrap() = Some(handle);
    }

    /// Get the number of times apply_record_set() was called
    pub fn apply_call_count(&self) -> usize {
        self.apply_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times fetch_existing_records() was called
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    /// Record sets passed to apply_record_set(), in call order
    pub fn applied(&self) -> Vec<RecordSet> {
        self.applied.lock().unwrap().clone()
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn fetch_existing_records(&self, zone: &str) -> Result<Vec<Record>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        if self.panic_fetch.load(Ordering::SeqCst) {
            panic!("provider crashed while fetching {}", zone);
        }
        self.enter().await;
        let result = if self.fail_fetch.load(Ordering::SeqCst) {
            Err(Error::http("connection reset by peer"))
        } else {
            self.inner.fetch_existing_records(zone).await
        };
        self.leave();
        result
    }

    async fn apply_record_set(&self, zone: &str, set: &RecordSet) -> Result<()> {
        self.apply_call_count.fetch_add(1, Ordering::SeqCst);
        self.applied.lock().unwrap().push(set.clone());
        self.enter().await;

        let fails = self.failing_keys.lock().unwrap().contains(&set.key);
        let result = if fails {
            Err(Error::provider(self.name, format!("rejected {}", set.key)))
        } else if self.one_ttl_per_set.load(Ordering::SeqCst) {
            let mut stored = set.clone();
            if let Some(ttl) = set.ttl() {
                stored.values = set
                    .values
                    .iter()
                    .map(|value| RecordValue {
                        data: value.data.clone(),
                        ttl,
                    })
                    .collect();
            }
            self.inner.apply_record_set(zone, &stored).await
        } else {
            self.inner.apply_record_set(zone, set).await
        };
        self.leave();

        if let Some(handle) = self.cancel_after_first_apply.lock().unwrap().take() {
            handle.cancel();
        }
        result
    }

    async fn ensure_zone_exists(&self, zone: &str) -> Result<()> {
        self.inner.ensure_zone_exists(zone).await
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        self.inner.list_zones().await
    }

    async fn minimum_ttl(&self, zone: &str) -> Result<Option<u32>> {
        self.inner.minimum_ttl(zone).await
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// Capability declaration supporting every record type except ALIAS
pub fn full_declaration() -> CapabilityDeclaration {
    [
        Capability::CanUseCaa,
        Capability::CanUseDs,
        Capability::CanUseHttps,
        Capability::CanUseNaptr,
        Capability::CanUsePtr,
        Capability::CanUseSrv,
        Capability::CanUseSshfp,
        Capability::CanUseSvcb,
        Capability::CanUseTlsa,
        Capability::CanGetZones,
        Capability::DocCreateDomains,
    ]
    .into_iter()
    .fold(CapabilityDeclaration::new(), |declaration, capability| {
        declaration.supports(capability)
    })
}

/// Registry with one provider identity
pub fn registry_with(name: &str, declaration: CapabilityDeclaration) -> Arc<CapabilityRegistry> {
    Arc::new(CapabilityRegistry::new().with_provider(name, declaration))
}

/// Engine with default settings
pub fn engine(
    capabilities: Arc<CapabilityRegistry>,
) -> (ReconcileEngine, mpsc::Receiver<ReconcileEvent>) {
    engine_with(capabilities, EngineConfig::default())
}

pub fn engine_with(
    capabilities: Arc<CapabilityRegistry>,
    config: EngineConfig,
) -> (ReconcileEngine, mpsc::Receiver<ReconcileEvent>) {
    ReconcileEngine::new(capabilities, config).expect("engine construction succeeds")
}

/// Desired zone from `(label, type, value, ttl)` tuples
pub fn desired(zone: &str, records: &[(&str, RecordType, &str, u32)]) -> DesiredZone {
    let mut desired = DesiredZone::new(zone).expect("valid zone name");
    for (label, rtype, value, ttl) in records {
        desired
            .add_record(label, *rtype, value, *ttl)
            .expect("valid record");
    }
    desired
}

/// Records for seeding a provider
pub fn records(zone: &str, records: &[(&str, RecordType, &str, u32)]) -> Vec<Record> {
    records
        .iter()
        .map(|(label, rtype, value, ttl)| {
            Record::new(zone, label, *rtype, value, *ttl).expect("valid record")
        })
        .collect()
}

/// Drain every event currently queued
pub fn drain(events: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
