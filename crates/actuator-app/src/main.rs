//! Actuator application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Build the action registry (implementations, connectors, shared bus)
//! 3. `describe`: print the planner-facing action descriptions
//! 4. `run`: start worker loops, read planner cycles from stdin, submit
//!    each cycle and flush finished tasks at `hertz` until interrupted or
//!    input ends

mod cli;

use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use actuator_action::{ActionBus, ActionOrchestrator, ActionRegistry, BuildContext, FlushReport};
use actuator_core::config::RuntimeConfig;
use actuator_core::error::{ActuatorError, Result};
use actuator_core::types::CommandBatch;

use cli::{CliArgs, CliCommand};

/// Planner cycles buffered between the stdin reader and the dispatch loop.
const INPUT_BUFFER: usize = 64;

/// Longest pause between flushes while draining at shutdown.
const MAX_DRAIN_POLL: Duration = Duration::from_millis(100);

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Load the config file. A path given explicitly must load; the implicit
/// home-directory path falls back to defaults and hands back the load error
/// so it can be logged once tracing is up.
fn load_config(path: &Path, explicit: bool) -> Result<(RuntimeConfig, Option<ActuatorError>)> {
    match RuntimeConfig::load(path) {
        Ok(config) => Ok((config, None)),
        Err(e) if explicit => Err(e),
        Err(e) => Ok((RuntimeConfig::default(), Some(e))),
    }
}

fn build_registry(config: &RuntimeConfig, urid: &str, bus: &ActionBus) -> Result<ActionRegistry> {
    let ctx = BuildContext::new(
        bus.clone(),
        Duration::from_millis(config.supervisor.idle_tick_ms),
    );
    let registry = ActionRegistry::from_specs(
        &config.resolved_actions(urid),
        &ctx,
        config.general.strict_labels,
    )?;
    if registry.is_empty() {
        tracing::warn!("No actions configured; every command will be skipped");
    }
    Ok(registry)
}

/// Interval between flushes. Falls back to one second for unusable values.
fn flush_period(hertz: f64) -> Duration {
    if !(hertz.is_finite() && hertz > 0.0) {
        return Duration::from_secs(1);
    }
    Duration::try_from_secs_f64(1.0 / hertz).unwrap_or(Duration::from_secs(1))
}

/// Parse one stdin line into a planner cycle.
fn parse_cycle(line: &str) -> Result<CommandBatch> {
    Ok(serde_json::from_str(line)?)
}

/// Forward planner cycles from stdin on a plain thread; a blocked read
/// must not hold up runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<CommandBatch>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_cycle(&line) {
                    Ok(batch) => {
                        if tx.blocking_send(batch).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring malformed planner cycle"),
                }
            }
        })?;
    Ok(())
}

fn log_report(report: &FlushReport) {
    for done in &report.completed {
        let latency_ms = done.finished_at.0.saturating_sub(done.submitted_at.0);
        match &done.outcome {
            Ok(output) => tracing::info!(
                label = %done.label,
                id = %done.id,
                output = %output,
                latency_ms,
                "Action completed"
            ),
            Err(e) => tracing::warn!(
                label = %done.label,
                id = %done.id,
                error = %e,
                latency_ms,
                "Action failed"
            ),
        }
    }
}

async fn run(
    mut orchestrator: ActionOrchestrator,
    period: Duration,
    drain_timeout: Duration,
) -> Result<()> {
    let spawned = orchestrator.start()?;
    tracing::info!(
        actions = orchestrator.registry().len(),
        workers = spawned,
        period_ms = period.as_millis() as u64,
        "Action runtime started"
    );

    let (tx, mut rx) = mpsc::channel::<CommandBatch>(INPUT_BUFFER);
    spawn_stdin_reader(tx)?;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut input_open = true;

    loop {
        tokio::select! {
            res = &mut interrupt => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "Failed to listen for interrupt");
                }
                tracing::info!("Interrupt received, stopping");
                break;
            }
            batch = rx.recv(), if input_open => match batch {
                Some(batch) => {
                    let scheduled = orchestrator.submit(&batch.commands);
                    tracing::debug!(
                        commands = batch.commands.len(),
                        scheduled,
                        "Planner cycle submitted"
                    );
                }
                None => {
                    input_open = false;
                    tracing::info!(
                        pending = orchestrator.pending_count(),
                        "Input closed, waiting for pending tasks"
                    );
                }
            },
            _ = ticker.tick() => {
                let report = orchestrator.flush().await;
                log_report(&report);
                if !input_open && report.pending.is_empty() {
                    break;
                }
            }
        }
    }

    let report = orchestrator
        .drain(period.min(MAX_DRAIN_POLL), drain_timeout)
        .await;
    log_report(&report);

    let shutdown = tokio::task::block_in_place(|| orchestrator.shutdown());
    if !shutdown.detached.is_empty() {
        tracing::warn!(workers = ?shutdown.detached, "Worker loops left running at exit");
    }
    tracing::info!(
        stopped = shutdown.stopped,
        abandoned_tasks = report.pending.len(),
        "Actuator stopped"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read first so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let (config, fallback) = load_config(&config_file, args.config_is_explicit())?;
    init_tracing(&args.resolve_log_level(&config.general.log_level));

    tracing::info!("Starting actuator v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = fallback {
        tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        );
    }
    let urid = config.resolve_urid();
    tracing::info!(
        path = %config_file.display(),
        name = %config.general.name,
        urid = %urid,
        "Configuration loaded"
    );

    let bus = ActionBus::default();
    let registry = build_registry(&config, &urid, &bus)?;

    match args.command {
        CliCommand::Describe => {
            println!("{}", registry.describe_all());
        }
        CliCommand::Run { .. } => {
            let period = flush_period(args.resolve_hertz(config.general.hertz));
            let drain_timeout = Duration::from_millis(config.supervisor.shutdown_timeout_ms);
            let orchestrator =
                ActionOrchestrator::new(registry).with_shutdown_timeout(drain_timeout);
            run(orchestrator, period, drain_timeout)
                .await
                .map_err(|e: ActuatorError| {
                    tracing::error!(error = %e, "Actuator exited with error");
                    e
                })?;
        }
    }

    Ok(())
}
