//! Integration test: limits from description, global and controller
//! configuration, enforced through a switched joint.
//!
//! Validates: baseline = description tightened by global config, controller
//! layers can only tighten the baseline, the enforced command reaches the
//! actuator, rate limits hold cycle after cycle.

use drivelink_common::limits::Limits;
use drivelink_common::mode::OperationMode;
use drivelink_control_unit::layer::LayerState;
use drivelink_control_unit::switch::{ControllerInfo, ModeSwitchCoordinator, RecordingStopper};

use super::{sim_robot, sources};

const DESCRIPTION: &str = r#"
[joints.a]
lower = -1.0
upper = 1.0
velocity = 2.0
effort = 50.0

[joints.b]
continuous = true
velocity = 4.0
"#;

const LIMITS: &str = r#"
[joint_limits.a]
has_velocity_limits = true
max_velocity = 1.5
has_acceleration_limits = true
max_acceleration = 100.0

[joint_limits.b]
has_velocity_limits = true
max_velocity = 3.0
has_acceleration_limits = true
max_acceleration = 10.0

[tight.joint_limits.a]
has_velocity_limits = true
max_velocity = 1.0

[loose.joint_limits.a]
has_velocity_limits = true
max_velocity = 3.0
has_effort_limits = true
max_effort = 80.0
"#;

const CSV: OperationMode = OperationMode::CyclicSynchronousVelocity;

// ── composition ─────────────────────────────────────────────────────

#[test]
fn baseline_merges_description_and_global() {
    let sources = sources(DESCRIPTION, LIMITS);
    let (robot, _) = sim_robot(&["a", "b"], &sources);

    let a = &robot.handle("a").unwrap().runtime().baseline_limits;
    assert_eq!(a.position(), Some((-1.0, 1.0)));
    assert_eq!(a.max_velocity(), Some(1.5));
    assert_eq!(a.max_acceleration(), Some(100.0));
    assert_eq!(a.max_effort(), Some(50.0));

    let b = &robot.handle("b").unwrap().runtime().baseline_limits;
    assert_eq!(b.position(), None);
    assert_eq!(b.max_velocity(), Some(3.0));
}

#[test]
fn controller_layer_only_tightens() {
    let sources = sources(DESCRIPTION, LIMITS);
    let (mut robot, _) = sim_robot(&["a"], &sources);
    let mut coord = ModeSwitchCoordinator::new(Box::new(RecordingStopper::default()));

    let tight = ControllerInfo::new("tight", ["a"], Some(CSV));
    coord.prepare(&robot, &sources, &[tight.clone()], &[]).unwrap();
    coord.commit(&mut robot, &[tight.clone()], &[]);
    assert_eq!(robot.handle("a").unwrap().effective_limits().max_velocity(), Some(1.0));

    let loose = ControllerInfo::new("loose", ["a"], Some(CSV));
    coord.prepare(&robot, &sources, &[loose.clone()], &[tight.clone()]).unwrap();
    coord.commit(&mut robot, &[loose], &[tight]);
    let effective = robot.handle("a").unwrap().effective_limits();
    assert_eq!(effective.max_velocity(), Some(1.5));
    assert_eq!(effective.max_effort(), Some(50.0));
}

// ── cycle ───────────────────────────────────────────────────────────

#[test]
fn clamped_command_reaches_actuator() {
    let sources = sources(DESCRIPTION, LIMITS);
    let (mut robot, probes) = sim_robot(&["a"], &sources);
    let mut coord = ModeSwitchCoordinator::new(Box::new(RecordingStopper::default()));
    let tight = ControllerInfo::new("tight", ["a"], Some(CSV));
    coord.prepare(&robot, &sources, &[tight.clone()], &[]).unwrap();
    coord.commit(&mut robot, &[tight], &[]);

    // acceleration 100 over 1 ms allows 0.1 per cycle; vmax 1.0 caps the ramp
    let mut last = 0.0;
    for _ in 0..20 {
        robot.read(LayerState::Ready);
        robot.handle_mut("a").unwrap().command_mut().velocity = 5.0;
        assert_eq!(robot.enforce_limits(0.001, false), 1);
        robot.write(LayerState::Ready);
        let sent = probes[0].last_target().unwrap();
        assert!(sent - last <= 0.1 + 1e-9, "step {} too large", sent - last);
        assert!(sent <= 1.0 + 1e-12);
        last = sent;
    }
    assert!((last - 1.0).abs() < 1e-9);
}

#[test]
fn rate_limit_band_around_previous_output() {
    let sources = sources(DESCRIPTION, LIMITS);
    let (mut robot, _) = sim_robot(&["b"], &sources);
    let mut coord = ModeSwitchCoordinator::new(Box::new(RecordingStopper::default()));
    let ctl = ControllerInfo::new("ctl", ["b"], Some(CSV));
    coord.prepare(&robot, &sources, &[ctl.clone()], &[]).unwrap();
    coord.commit(&mut robot, &[ctl], &[]);

    let period = 0.002;
    let band = 10.0 * period;
    let mut previous = robot.handle("b").unwrap().feedback().velocity;
    for cmd in [3.0, -3.0, 0.5, 0.5, -0.2, 2.9] {
        let handle = robot.handle_mut("b").unwrap();
        handle.command_mut().velocity = cmd;
        handle.enforce_limits(period, false);
        let out = handle.command().velocity;
        assert!(
            out >= previous - band - 1e-12 && out <= previous + band + 1e-12,
            "{out} outside [{}, {}]",
            previous - band,
            previous + band
        );
        previous = out;
    }
}

#[test]
fn recover_restarts_from_measurement() {
    let sources = sources(DESCRIPTION, LIMITS);
    let (mut robot, probes) = sim_robot(&["b"], &sources);
    let mut coord = ModeSwitchCoordinator::new(Box::new(RecordingStopper::default()));
    let ctl = ControllerInfo::new("ctl", ["b"], Some(CSV));
    coord.prepare(&robot, &sources, &[ctl.clone()], &[]).unwrap();
    coord.commit(&mut robot, &[ctl], &[]);

    let handle = robot.handle_mut("b").unwrap();
    handle.command_mut().velocity = 0.01;
    handle.enforce_limits(0.001, false);

    probes[0].set_feedback(drivelink_common::actuator::RawFeedback {
        position: 0.0,
        velocity: 2.0,
        effort: 0.0,
    });
    handle.read(LayerState::Ready);
    handle.command_mut().velocity = 2.0;
    // without recover the history pins the command near 0.01
    assert!(handle.enforce_limits(0.001, false));

    handle.command_mut().velocity = 2.0;
    assert!(!handle.enforce_limits(0.001, true));
    assert_eq!(handle.command().velocity, 2.0);
}

#[test]
fn idle_joint_enforces_nothing() {
    let sources = sources(DESCRIPTION, LIMITS);
    let (mut robot, probes) = sim_robot(&["a"], &sources);
    let handle = robot.handle_mut("a").unwrap();
    handle.set_overlay_limits(Limits::new().with_velocity(0.1));
    handle.command_mut().velocity = 5.0;
    assert!(!handle.enforce_limits(0.001, false));
    handle.write(LayerState::Ready);
    assert_eq!(probes[0].last_target(), None);
}
