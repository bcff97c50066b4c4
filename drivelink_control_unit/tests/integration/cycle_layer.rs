//! Integration test: configuration files → control layer → cycle runner.
//!
//! Validates: `load_config` resolves the description and limit files next
//! to the main file, autostart controllers come up operational with their
//! limits, the runner drives the layer until its flag is cleared, and a
//! queued stop request is applied between cycles.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drivelink_common::config::ConfigError;
use drivelink_control_unit::config::{load_config, LoadedConfig};
use drivelink_control_unit::control::{ControlLayer, HoldPositionRuntime, RUNTIME_MISSING};
use drivelink_control_unit::cycle::CycleRunner;
use drivelink_control_unit::handle::JointState;
use drivelink_control_unit::layer::LayerState;
use drivelink_control_unit::switch::{ControllerRegistry, ModeSwitchCoordinator, QueuedStopRegistry, RecordingStopper};
use drivelink_hal::ActuatorRegistry;
use tempfile::TempDir;

const UNIT_TOML: &str = r#"
description = "description.toml"
limits = "limits.toml"

[shared]
service_name = "drivelink-test"

[cycle]
period_us = 1000

[[joints]]
name = "shoulder"

[[joints]]
name = "elbow"
supported_modes = ["cyclic_synchronous_velocity"]

[[controllers]]
name = "hold"
joints = ["shoulder"]
required_mode = "cyclic_synchronous_position"
autostart = true

[[controllers]]
name = "spin"
joints = ["elbow"]
required_mode = "cyclic_synchronous_velocity"
"#;

const DESCRIPTION_TOML: &str = r#"
[joints.shoulder]
lower = -1.5
upper = 1.5
velocity = 2.0

[joints.elbow]
velocity = 3.0
"#;

const LIMITS_TOML: &str = r#"
[joint_limits.shoulder]
has_velocity_limits = true
max_velocity = 1.0

[hold.joint_limits.shoulder]
has_velocity_limits = true
max_velocity = 0.5
"#;

fn write_config(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("description.toml"), DESCRIPTION_TOML).unwrap();
    fs::write(dir.join("limits.toml"), LIMITS_TOML).unwrap();
    let path = dir.join("drivelink.toml");
    fs::write(&path, UNIT_TOML).unwrap();
    path
}

fn layer_from(loaded: LoadedConfig, coordinator: ModeSwitchCoordinator) -> ControlLayer {
    let config = loaded.config;
    let robot = config.build_robot(&ActuatorRegistry::with_builtin()).unwrap();
    let mut layer = ControlLayer::new(robot, loaded.sources, coordinator, config.cycle.fixed_period());
    for controller in &config.controllers {
        layer.add_controller(controller.info());
    }
    layer.init(Box::new(HoldPositionRuntime::new())).unwrap();
    layer.start_controllers(&config.autostart()).unwrap();
    layer
}

// ── loading ─────────────────────────────────────────────────────────

#[test]
fn autostart_from_files() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&write_config(dir.path())).unwrap();
    let layer = layer_from(
        loaded,
        ModeSwitchCoordinator::new(Box::new(RecordingStopper::default())),
    );

    assert!(layer.is_running("hold"));
    assert!(!layer.is_running("spin"));
    let shoulder = layer.robot().handle("shoulder").unwrap();
    assert!(matches!(shoulder.state(), JointState::Operational(_)));
    assert_eq!(shoulder.effective_limits().max_velocity(), Some(0.5));
    assert_eq!(shoulder.effective_limits().position(), Some((-1.5, 1.5)));
    assert_eq!(layer.robot().handle("elbow").unwrap().state(), JointState::Idle);
}

#[test]
fn missing_limit_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    fs::remove_file(dir.path().join("limits.toml")).unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::FileNotFound)));
}

// ── cycle ───────────────────────────────────────────────────────────

#[test]
fn runner_cycles_until_flag_cleared() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&write_config(dir.path())).unwrap();
    let layer = layer_from(
        loaded,
        ModeSwitchCoordinator::new(Box::new(RecordingStopper::default())),
    );

    let running = Arc::new(AtomicBool::new(true));
    let mut runner = CycleRunner::new(layer, Duration::from_millis(1), Arc::clone(&running));
    let worker = std::thread::spawn(move || {
        runner.run().unwrap();
        runner
    });
    std::thread::sleep(Duration::from_millis(30));
    running.store(false, Ordering::SeqCst);
    let runner = worker.join().unwrap();

    let layer = runner.layer();
    assert!(layer.stats().cycle_count > 0);
    assert!(!layer.is_initialized());
}

#[test]
fn queued_stop_request_applies_between_cycles() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&write_config(dir.path())).unwrap();
    let (registry, rx) = QueuedStopRegistry::channel();
    let layer = layer_from(
        loaded,
        ModeSwitchCoordinator::new(Box::new(RecordingStopper::default())),
    );
    let mut runner = CycleRunner::new(layer, Duration::from_millis(1), Arc::new(AtomicBool::new(true)))
        .with_stop_requests(rx);

    assert!(runner.step(LayerState::Ready).is_ok());
    registry.stop_controllers(&["hold".to_string()]).unwrap();
    assert!(runner.step(LayerState::Ready).is_ok());

    assert!(!runner.layer().is_running("hold"));
    assert_eq!(
        runner.layer().robot().handle("shoulder").unwrap().state(),
        JointState::Idle
    );
}

#[test]
fn shutdown_leaves_standing_error() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&write_config(dir.path())).unwrap();
    let mut layer = layer_from(
        loaded,
        ModeSwitchCoordinator::new(Box::new(RecordingStopper::default())),
    );
    assert!(layer.read(LayerState::Ready).is_ok());
    layer.shutdown();
    assert_eq!(layer.read(LayerState::Ready), RUNTIME_MISSING);
    assert_eq!(layer.write(LayerState::Ready, Duration::from_millis(1), false), RUNTIME_MISSING);
    assert!(layer.write(LayerState::Shutdown, Duration::from_millis(1), false).is_ok());
}
