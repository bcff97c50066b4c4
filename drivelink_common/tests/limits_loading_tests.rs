//! File-based limit loading tests.
//!
//! Description file + limits store on disk, folded into a baseline the way
//! the control unit does at bring-up, then layered with a controller's
//! local namespace.

use drivelink_common::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_description(dir: &Path) {
    fs::write(
        dir.join("description.toml"),
        r#"
[joints.shoulder]
lower = -3.0
upper = 3.0
velocity = 2.0
effort = 80.0

[joints.wrist]
continuous = true
velocity = 6.0
"#,
    )
    .unwrap();
}

fn write_limits(dir: &Path) {
    fs::write(
        dir.join("limits.toml"),
        r#"
[joint_limits.shoulder]
has_position_limits = true
min_position = -2.5
max_position = 3.5
has_velocity_limits = true
max_velocity = 1.5
has_acceleration_limits = true
max_acceleration = 4.0
has_soft_limits = true
k_position = 8.0
k_velocity = 3.0
soft_lower_limit = -2.4
soft_upper_limit = 2.4

[slow_controller.joint_limits.shoulder]
has_velocity_limits = true
max_velocity = 0.25
"#,
    )
    .unwrap();
}

#[test]
fn baseline_from_description_and_global_config() {
    let dir = TempDir::new().unwrap();
    write_description(dir.path());
    write_limits(dir.path());

    let desc = MachineDescription::load(&dir.path().join("description.toml")).unwrap();
    let store = TomlConfigStore::load(&dir.path().join("limits.toml")).unwrap();

    let from_desc = read_from_description(&desc, "shoulder");
    let from_cfg = read_from_config(&store, "shoulder", GLOBAL_NAMESPACE, true).unwrap();
    let baseline = from_desc.merge(&from_cfg);

    assert_eq!(baseline.position(), Some((-2.5, 3.0)));
    assert_eq!(baseline.max_velocity(), Some(1.5));
    assert_eq!(baseline.max_acceleration(), Some(4.0));
    assert_eq!(baseline.max_effort(), Some(80.0));
    assert!(baseline.has(LimitFlags::SOFT));
    assert!(baseline.valid());
}

#[test]
fn controller_layer_applies_in_order() {
    let dir = TempDir::new().unwrap();
    write_description(dir.path());
    write_limits(dir.path());

    let desc = MachineDescription::load(&dir.path().join("description.toml")).unwrap();
    let store = TomlConfigStore::load(&dir.path().join("limits.toml")).unwrap();

    let layer = read_from_description(&desc, "shoulder")
        .apply(&read_from_config(&store, "shoulder", GLOBAL_NAMESPACE, true).unwrap())
        .apply(&read_from_config(&store, "shoulder", "slow_controller", true).unwrap());

    // local velocity wins, global position replaces description position
    assert_eq!(layer.max_velocity(), Some(0.25));
    assert_eq!(layer.position(), Some((-2.5, 3.5)));
}

#[test]
fn continuous_joint_and_unknown_joint() {
    let dir = TempDir::new().unwrap();
    write_description(dir.path());
    write_limits(dir.path());

    let desc = MachineDescription::load(&dir.path().join("description.toml")).unwrap();
    let store = TomlConfigStore::load(&dir.path().join("limits.toml")).unwrap();

    let wrist = read_from_description(&desc, "wrist");
    assert_eq!(wrist, Limits::new().with_velocity(6.0));
    assert!(read_from_description(&desc, "gripper").is_empty());
    assert!(read_from_config(&store, "gripper", GLOBAL_NAMESPACE, true)
        .unwrap()
        .is_empty());
}

#[test]
fn malformed_store_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("limits.toml");
    fs::write(&path, "[joint_limits.shoulder\nhas_velocity_limits = ").unwrap();
    assert!(matches!(
        TomlConfigStore::load(&path),
        Err(ConfigError::ParseError(_))
    ));
    assert!(matches!(
        TomlConfigStore::load(&dir.path().join("absent.toml")),
        Err(ConfigError::FileNotFound)
    ));
}
