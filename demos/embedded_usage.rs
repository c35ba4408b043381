//! Minimal embedding example for dnsreconcile-core
//!
//! Converges one zone held by the in-memory provider: preview, push, then a
//! second preview that plans nothing.

use dnsreconcile_core::providers::{MemoryProvider, MemoryProviderFactory};
use dnsreconcile_core::providers::memory::MEMORY_PROVIDER;
use dnsreconcile_core::{
    DesiredZone, EngineConfig, ProviderConfig, ProviderRegistry, ReconcileEngine, Record, RecordType, Result,
    ZoneJob, cancellation,
};
use std::sync::Arc;

fn desired_zone() -> Result<DesiredZone> {
    DesiredZone::new("example.com")?
        .with_record("@", RecordType::A, "192.0.2.1", 3600)?
        .with_record("www", RecordType::Cname, "example.com.", 3600)?
        .with_record("@", RecordType::Mx, "10 mx1.example.com.", 3600)?
        .with_record("@", RecordType::Mx, "20 mx2.example.com.", 3600)?
        .with_record("@", RecordType::Txt, "v=spf1 mx -all", 300)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded dnsreconcile-core Example ===\n");

    // Provider state the zone starts from
    let store = MemoryProvider::new().with_minimum_ttl("example.com", 60);
    store
        .seed(
            "example.com",
            vec![
                Record::new("example.com", "@", RecordType::A, "192.0.2.99", 3600)?,
                Record::new("example.com", "old", RecordType::A, "192.0.2.50", 3600)?,
            ],
        )
        .await?;

    let mut registry = ProviderRegistry::new();
    registry.register(MEMORY_PROVIDER, Box::new(MemoryProviderFactory::new(store.clone())));
    let provider = registry.create_provider(&ProviderConfig::Custom {
        factory: MEMORY_PROVIDER.to_string(),
        config: serde_json::json!({}),
    })?;

    let zone = desired_zone()?;

    println!("1. Preview");
    let (engine, mut events) = ReconcileEngine::new(registry.capabilities(), EngineConfig::default())?;
    let plan = engine.plan_zone(Arc::clone(&provider), &zone).await?;
    for message in plan.messages() {
        println!("   {}", message);
    }

    println!("\n2. Push");
    let (_handle, cancel) = cancellation();
    let reports = engine
        .reconcile_all(vec![ZoneJob::new(Arc::clone(&provider), zone.clone())], &cancel)
        .await;
    for report in &reports {
        print!("{}", report);
    }
    while let Ok(event) = events.try_recv() {
        println!("   [Event] {:?}", event);
    }

    println!("\n3. Preview again");
    let plan = engine.plan_zone(provider, &zone).await?;
    println!("   {} correction(s) planned", plan.corrections.len());

    println!("\nProvider now holds:");
    for record in store.records("example.com").await {
        println!("   {}", record);
    }

    Ok(())
}

