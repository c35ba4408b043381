// # dnsreconcile - DNS zone reconciler
//
// This binary is a THIN integration layer: it reads the environment, loads
// the configuration file, builds the provider registry from an explicit
// factory list and hands every zone to the engine in dnsreconcile-core.
// No DNS logic lives here.
//
// ## Configuration
//
// All settings are read from environment variables:
//
// - `DNSRECONCILE_CONFIG`: Path to the JSON configuration file (required)
// - `DNSRECONCILE_MODE`: `preview` (default) prints planned corrections,
//   `push` applies them
// - `DNSRECONCILE_LOG_LEVEL`: trace, debug, info (default), warn, error
// - `DNSRECONCILE_DESEC_TOKEN`: Fills deSEC providers configured without a token
// - `DNSRECONCILE_FEATURE_MATRIX`: `1` prints the provider feature matrix and exits
//
// ## Exit codes
//
// - 0: Every zone matches its declared state
// - 1: Configuration or startup error
// - 2: At least one zone needs another run (preview with pending changes,
//   failed corrections, aborted or cancelled zones)
//
// ## Example
//
// ```bash
// export DNSRECONCILE_CONFIG=/etc/dnsreconcile/zones.json
// export DNSRECONCILE_DESEC_TOKEN=your_token
// export DNSRECONCILE_MODE=push
//
// dnsreconcile
// ```

use anyhow::{Context, Result};
use dnsreconcile_core::providers::MemoryProviderFactory;
use dnsreconcile_core::providers::memory::MEMORY_PROVIDER;
use dnsreconcile_core::{
    ProviderConfig, ProviderRegistry, ReconcileConfig, ReconcileEngine, ReconcileEvent,
    ZoneReport, cancellation, render_feature_matrix,
};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReconcileExitCode {
    /// Every zone converged
    Converged = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// At least one zone needs another run
    NeedsRerun = 2,
}

impl From<ReconcileExitCode> for ExitCode {
    fn from(code: ReconcileExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Whether corrections are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Preview,
    Push,
}

impl Mode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "preview" => Ok(Mode::Preview),
            "push" => Ok(Mode::Push),
            other => anyhow::bail!(
                "DNSRECONCILE_MODE '{}' is not valid. Valid modes: preview, push",
                other
            ),
        }
    }
}

/// Settings read from the environment
struct Settings {
    config_path: Option<String>,
    mode: Mode,
    log_level: Level,
    desec_token: Option<String>,
    feature_matrix: bool,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("DNSRECONCILE_CONFIG").ok().filter(|p| !p.is_empty()),
            mode: Mode::parse(&env::var("DNSRECONCILE_MODE").unwrap_or_default())?,
            log_level: parse_log_level(
                &env::var("DNSRECONCILE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            )?,
            desec_token: env::var("DNSRECONCILE_DESEC_TOKEN").ok().filter(|t| !t.is_empty()),
            feature_matrix: env::var("DNSRECONCILE_FEATURE_MATRIX")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn parse_log_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DNSRECONCILE_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

/// Registry populated from the explicit list of built-in factories
fn build_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    #[cfg(feature = "desec")]
    dnsreconcile_provider_desec::register(&mut registry);

    registry.register(MEMORY_PROVIDER, Box::new(MemoryProviderFactory::default()));
    registry
}

/// Load the configuration file and apply environment overrides
fn load_config(settings: &Settings) -> Result<ReconcileConfig> {
    let path = settings.config_path.as_deref().context(
        "DNSRECONCILE_CONFIG is required. \
        Set it via: export DNSRECONCILE_CONFIG=/path/to/zones.json",
    )?;

    let mut config = ReconcileConfig::from_file(path)?;

    if let Some(token) = &settings.desec_token {
        for provider in config.providers.values_mut() {
            if let ProviderConfig::Desec { token: configured, .. } = provider
                && configured.is_empty()
            {
                *configured = token.clone();
            }
        }
    }

    config.engine.dry_run = settings.mode == Mode::Preview;
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ReconcileExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ReconcileExitCode::ConfigError.into();
    }

    let registry = build_registry();

    if settings.feature_matrix {
        print!("{}", render_feature_matrix(&registry.capabilities()));
        return ReconcileExitCode::Converged.into();
    }

    let config = match load_config(&settings) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return ReconcileExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ReconcileExitCode::ConfigError.into();
        }
    };

    rt.block_on(async {
        match run(registry, config, settings.mode).await {
            Ok(reports) => exit_code_for(&reports),
            Err(e) => {
                error!("Startup error: {:#}", e);
                ReconcileExitCode::ConfigError
            }
        }
    })
    .into()
}

/// Reconcile every configured zone and print the reports
async fn run(registry: ProviderRegistry, config: ReconcileConfig, mode: Mode) -> Result<Vec<ZoneReport>> {
    let (engine, mut events) = ReconcileEngine::new(registry.capabilities(), config.engine.clone())?;
    let prepared = registry.prepare_zones(&config);

    info!(
        zones = prepared.jobs.len(),
        rejected = prepared.rejected.len(),
        mode = ?mode,
        providers = ?registry.list_providers(),
        "Starting reconciliation"
    );

    let (handle, mut cancel) = cancellation();
    if let Some(deadline) = config.engine.deadline() {
        cancel = cancel.with_deadline(deadline);
    }

    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received SIGINT, finishing in-flight corrections");
                handle.cancel();
            }
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    });

    let monitor = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let mut reports = engine.reconcile_all(prepared.jobs, &cancel).await;
    reports.extend(prepared.rejected);
    reports.sort_by(|a, b| a.zone.cmp(&b.zone));

    interrupt.abort();
    drop(engine);
    if let Err(e) = monitor.await {
        warn!("Event monitor ended abnormally: {}", e);
    }

    for report in &reports {
        print!("{}", report);
    }
    Ok(reports)
}

fn log_event(event: &ReconcileEvent) {
    match event {
        ReconcileEvent::ZoneStarted { zone, provider } => {
            debug!(zone = %zone, provider = %provider, "Zone started")
        }
        ReconcileEvent::ZoneFinished {
            zone,
            applied,
            failed,
            skipped,
        } => debug!(zone = %zone, applied, failed, skipped, "Zone finished"),
        ReconcileEvent::ZoneAborted { zone, error } => {
            debug!(zone = %zone, error = %error, "Zone aborted")
        }
        other => debug!(event = ?other, "Engine event"),
    }
}

fn exit_code_for(reports: &[ZoneReport]) -> ReconcileExitCode {
    if reports.iter().any(ZoneReport::needs_rerun) {
        ReconcileExitCode::NeedsRerun
    } else {
        ReconcileExitCode::Converged
    }
}
