//! Contract Test: Failure Isolation
//!
//! Constraints verified:
//! - A failing correction is recorded and the remaining corrections still run
//! - A fetch failure aborts only that zone, before anything is diffed
//! - A configuration error in one zone leaves other zones untouched
//! - A crashed zone worker still yields a fatal report for its zones
//!
//! If this test fails, one bad record or zone can block unrelated work.

mod common;

use common::*;
use dnsreconcile_core::{
    Cancellation, DnsProvider, Error, ReconcileEvent, RecordSetKey, RecordType, ZoneJob,
};
use std::sync::Arc;

#[tokio::test]
async fn failed_correction_does_not_stop_the_zone() {
    let provider = Arc::new(RecordingProvider::new("test"));
    provider.ensure_zone_exists("example.com").await.unwrap();
    provider.fail_on(RecordSetKey::new("b.example.com", RecordType::A));

    let (engine, mut events) = engine(registry_with("test", full_declaration()));
    let zone = desired(
        "example.com",
        &[
            ("a", RecordType::A, "192.0.2.1", 300),
            ("b", RecordType::A, "192.0.2.2", 300),
            ("c", RecordType::A, "192.0.2.3", 300),
        ],
    );

    let report = engine
        .reconcile_zone(provider.clone(), &zone, &Cancellation::never())
        .await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.applied, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].message.starts_with("+ CREATE b.example.com A"));
    assert!(matches!(report.failures[0].error, Error::Correction { .. }));
    assert!(report.fatal.is_none());
    assert!(report.needs_rerun());

    let stored: Vec<String> = provider
        .inner
        .records("example.com")
        .await
        .iter()
        .map(|r| r.fqdn.clone())
        .collect();
    assert_eq!(stored, vec!["a.example.com", "c.example.com"]);

    let events = drain(&mut events);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ReconcileEvent::CorrectionApplied { .. }))
            .count(),
        2
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ReconcileEvent::ZoneFinished {
            applied: 2,
            failed: 1,
            skipped: 0,
            ..
        }
    )));
}

#[tokio::test]
async fn fetch_failure_aborts_only_that_zone() {
    let broken = Arc::new(RecordingProvider::new("broken"));
    broken.fail_fetches();
    let healthy = Arc::new(RecordingProvider::new("healthy"));
    healthy.ensure_zone_exists("example.org").await.unwrap();

    let capabilities = Arc::new(
        dnsreconcile_core::CapabilityRegistry::new()
            .with_provider("broken", full_declaration())
            .with_provider("healthy", full_declaration()),
    );
    let (engine, _events) = engine(capabilities);

    let jobs = vec![
        ZoneJob::new(
            broken.clone(),
            desired("example.com", &[("www", RecordType::A, "192.0.2.1", 300)]),
        ),
        ZoneJob::new(
            healthy.clone(),
            desired("example.org", &[("www", RecordType::A, "192.0.2.2", 300)]),
        ),
    ];
    let reports = engine.reconcile_all(jobs, &Cancellation::never()).await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].zone, "example.com");
    assert!(matches!(reports[0].fatal, Some(Error::Fetch { .. })));
    assert!(reports[0].planned.is_empty());
    assert_eq!(broken.apply_call_count(), 0);

    assert_eq!(reports[1].zone, "example.org");
    assert!(reports[1].is_converged());
    assert_eq!(healthy.apply_call_count(), 1);
}

#[tokio::test]
async fn invalid_zone_does_not_affect_others() {
    let provider = Arc::new(RecordingProvider::new("test"));
    provider.ensure_zone_exists("example.com").await.unwrap();
    provider.ensure_zone_exists("example.org").await.unwrap();

    let (engine, _events) = engine(registry_with("test", full_declaration()));

    let invalid = desired(
        "example.com",
        &[
            ("www", RecordType::Cname, "target.example.net.", 300),
            ("www", RecordType::A, "192.0.2.1", 300),
        ],
    );
    let valid = desired("example.org", &[("www", RecordType::A, "192.0.2.2", 300)]);

    let reports = engine
        .reconcile_all(
            vec![
                ZoneJob::new(provider.clone(), invalid),
                ZoneJob::new(provider.clone(), valid),
            ],
            &Cancellation::never(),
        )
        .await;

    assert!(matches!(reports[0].fatal, Some(Error::Config(_))));
    assert!(reports[1].is_converged());
    assert_eq!(reports[1].applied, 1);
    assert!(provider.inner.records("example.com").await.is_empty());
}

#[tokio::test]
async fn crashed_worker_is_reported_as_fatal() {
    let crashing = Arc::new(RecordingProvider::new("crashing"));
    crashing.panic_on_fetch();
    let healthy = Arc::new(RecordingProvider::new("healthy"));
    healthy.ensure_zone_exists("example.org").await.unwrap();

    let capabilities = Arc::new(
        dnsreconcile_core::CapabilityRegistry::new()
            .with_provider("crashing", full_declaration())
            .with_provider("healthy", full_declaration()),
    );
    let (engine, mut events) = engine(capabilities);

    let jobs = vec![
        ZoneJob::new(
            crashing.clone(),
            desired("example.com", &[("www", RecordType::A, "192.0.2.1", 300)]),
        ),
        ZoneJob::new(
            healthy.clone(),
            desired("example.org", &[("www", RecordType::A, "192.0.2.2", 300)]),
        ),
    ];
    let reports = engine.reconcile_all(jobs, &Cancellation::never()).await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].zone, "example.com");
    assert_eq!(reports[0].provider, "crashing");
    assert!(matches!(reports[0].fatal, Some(Error::Other(_))));
    assert!(reports[0].needs_rerun());

    assert_eq!(reports[1].zone, "example.org");
    assert!(reports[1].is_converged());

    assert!(drain(&mut events).iter().any(|event| matches!(
        event,
        ReconcileEvent::ZoneAborted { zone, .. } if zone == "example.com"
    )));
}
