//! # drivelink Control Unit
//!
//! Loads `drivelink.toml` plus the description and limit files it names,
//! builds one actuator per joint through the driver registry, starts the
//! autostart controllers and runs the cycle until Ctrl-C.
//!
//! Stop requests for controllers that failed a mode switch are dispatched on
//! a tokio runtime and applied by the cycle runner between cycles.

use clap::Parser;
use drivelink_common::consts::DEFAULT_CONFIG_PATH;
use drivelink_control_unit::config::load_config;
use drivelink_control_unit::control::{ControlLayer, HoldPositionRuntime};
use drivelink_control_unit::cycle::{rt_setup, CycleRunner};
use drivelink_control_unit::switch::{AsyncStopDispatcher, ModeSwitchCoordinator, QueuedStopRegistry};
use drivelink_hal::ActuatorRegistry;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// drivelink Control Unit: joint limit enforcement and drive mode switching
#[derive(Parser, Debug)]
#[command(name = "drivelink_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Limit-enforcing control cycle with atomic drive mode switching")]
struct Args {
    /// Path to the control unit configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// CPU core to pin the cycle thread to (overrides `[cycle] cpu_core`).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// SCHED_FIFO priority (overrides `[cycle] rt_priority`).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("drivelink Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("drivelink Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_config(&args.config)?;
    let config = loaded.config;
    info!(
        "Config OK: service={}, period={}µs, joints={}, controllers={}",
        config.shared.service_name,
        config.cycle.period_us,
        config.joints.len(),
        config.controllers.len(),
    );

    let control_plane = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("drivelink-ctl")
        .enable_all()
        .build()?;

    let (registry, stop_rx) = QueuedStopRegistry::channel();
    let stopper = AsyncStopDispatcher::new(control_plane.handle().clone(), Arc::new(registry));
    let coordinator = ModeSwitchCoordinator::new(Box::new(stopper));

    let robot = config.build_robot(&ActuatorRegistry::with_builtin())?;
    let mut layer = ControlLayer::new(robot, loaded.sources, coordinator, config.cycle.fixed_period());
    for controller in &config.controllers {
        layer.add_controller(controller.info());
    }
    layer.init(Box::new(HoldPositionRuntime::new()))?;

    let autostart = config.autostart();
    if !autostart.is_empty() {
        match layer.start_controllers(&autostart) {
            Ok(outcome) if outcome.is_success() => info!(controllers = ?autostart, "autostart complete"),
            Ok(outcome) => warn!(failed = ?outcome.failed, "autostart partially failed"),
            Err(e) => warn!("autostart rejected: {e}"),
        }
    }

    let cpu_core = args.cpu_core.unwrap_or(config.cycle.cpu_core);
    let rt_priority = args.rt_priority.unwrap_or(config.cycle.rt_priority);
    rt_setup(cpu_core, rt_priority)?;
    info!("RT setup complete (cpu_core={cpu_core}, priority={rt_priority})");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut runner =
        CycleRunner::new(layer, config.cycle.pacing(), running).with_stop_requests(stop_rx);
    if let Err(e) = runner.run() {
        error!("cycle loop error: {e}");
        return Err(e.into());
    }

    control_plane.shutdown_background();
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
