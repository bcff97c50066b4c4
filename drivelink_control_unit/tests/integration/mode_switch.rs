//! Integration test: batch mode switching across joints.
//!
//! Validates: prepare is all-or-nothing, commit switches only the claimed
//! joints, a rejected mode entry rolls back the whole controller and
//! reports it for stopping exactly once.

use drivelink_common::actuator::{Actuator, OperationalState};
use drivelink_common::mode::OperationMode;
use drivelink_control_unit::error::SwitchError;
use drivelink_control_unit::handle::JointState;
use drivelink_control_unit::sources::LimitSources;
use drivelink_control_unit::switch::{ControllerInfo, ModeSwitchCoordinator, RecordingStopper};

use super::{sim_robot, sources};

const CSP: OperationMode = OperationMode::CyclicSynchronousPosition;
const CSV: OperationMode = OperationMode::CyclicSynchronousVelocity;

fn coordinator() -> (ModeSwitchCoordinator, RecordingStopper) {
    let stopper = RecordingStopper::default();
    (ModeSwitchCoordinator::new(Box::new(stopper.clone())), stopper)
}

// ── single joint ────────────────────────────────────────────────────

#[test]
fn position_controller_on_one_joint() {
    let sources = LimitSources::empty();
    let (mut robot, probes) = sim_robot(&["a", "b"], &sources);
    let (mut coord, stopper) = coordinator();

    let c1 = ControllerInfo::new("c1", ["a"], Some(CSP));
    coord.prepare(&robot, &sources, &[c1.clone()], &[]).unwrap();
    let outcome = coord.commit(&mut robot, &[c1], &[]);

    assert!(outcome.is_success());
    assert_eq!(robot.handle("a").unwrap().state(), JointState::Operational(CSP));
    assert_eq!(robot.handle("a").unwrap().actuator().mode(), CSP);
    assert_eq!(robot.handle("b").unwrap().state(), JointState::Idle);
    assert_eq!(probes[1].mode(), OperationMode::NoMode);
    assert!(probes[1].mode_requests().is_empty());
    assert!(stopper.requests().is_empty());
}

// ── readiness ───────────────────────────────────────────────────────

#[test]
fn not_ready_joint_rejects_whole_batch() {
    let sources = LimitSources::empty();
    let (robot, probes) = sim_robot(&["a", "b"], &sources);
    probes[1].set_operational_state(OperationalState::NotReady);
    let (mut coord, _) = coordinator();

    let c2 = ControllerInfo::new("c2", ["a", "b"], Some(CSV));
    let err = coord.prepare(&robot, &sources, &[c2], &[]).unwrap_err();

    assert_eq!(
        err,
        SwitchError::NotReadyToSwitch {
            joint: "b".to_string(),
            mode: CSV,
        }
    );
    assert!(coord.record("c2").is_none());
    for (name, probe) in ["a", "b"].iter().zip(&probes) {
        assert!(probe.mode_requests().is_empty(), "joint {name} was touched");
        assert_eq!(probe.mode(), OperationMode::NoMode);
        assert_eq!(robot.handle(name).unwrap().state(), JointState::Idle);
    }
}

// ── rollback ────────────────────────────────────────────────────────

#[test]
fn rejected_entry_rolls_back_every_joint() {
    let sources = sources(
        "",
        r#"
        [c.joint_limits.a]
        has_velocity_limits = true
        max_velocity = 0.5

        [c.joint_limits.b]
        has_velocity_limits = true
        max_velocity = 0.5
        "#,
    );
    let (mut robot, probes) = sim_robot(&["a", "b"], &sources);
    probes[1].reject_mode(CSV);
    let (mut coord, stopper) = coordinator();

    let c = ControllerInfo::new("c", ["a", "b"], Some(CSV));
    coord.prepare(&robot, &sources, &[c.clone()], &[]).unwrap();
    let outcome = coord.commit(&mut robot, &[c.clone(), c], &[]);

    assert_eq!(outcome.failed, vec!["c".to_string()]);
    assert_eq!(stopper.requests(), vec![vec!["c".to_string()]]);
    for (name, probe) in ["a", "b"].iter().zip(&probes) {
        let handle = robot.handle(name).unwrap();
        assert_eq!(handle.state(), JointState::Idle, "joint {name}");
        assert!(handle.runtime().overlay_limits.is_empty(), "joint {name}");
        assert!(!handle.forwarding());
        assert_eq!(probe.mode(), OperationMode::NoMode);
    }
    assert_eq!(probes[1].halts(), 1);
}

#[test]
fn other_controllers_survive_a_rollback() {
    let sources = LimitSources::empty();
    let (mut robot, probes) = sim_robot(&["a", "b", "c"], &sources);
    probes[2].reject_mode(CSV);
    let (mut coord, stopper) = coordinator();

    let good = ControllerInfo::new("good", ["a"], Some(CSP));
    let bad = ControllerInfo::new("bad", ["b", "c"], Some(CSV));
    let batch = [good, bad];
    coord.prepare(&robot, &sources, &batch, &[]).unwrap();
    let outcome = coord.commit(&mut robot, &batch, &[]);

    assert_eq!(outcome.failed, vec!["bad".to_string()]);
    assert_eq!(robot.handle("a").unwrap().state(), JointState::Operational(CSP));
    assert!(robot.handle("a").unwrap().forwarding());
    assert_eq!(robot.handle("b").unwrap().state(), JointState::Idle);
    assert_eq!(robot.handle("c").unwrap().state(), JointState::Idle);
    assert_eq!(stopper.requests().len(), 1);
}

// ── stop ────────────────────────────────────────────────────────────

#[test]
fn stop_requires_a_prior_switch() {
    let sources = LimitSources::empty();
    let (robot, _) = sim_robot(&["a"], &sources);
    let (mut coord, _) = coordinator();
    let never_started = ControllerInfo::new("never", ["a"], Some(CSP));
    assert_eq!(
        coord.prepare(&robot, &sources, &[], &[never_started]),
        Err(SwitchError::UnknownController("never".to_string()))
    );
}

#[test]
fn handover_between_controllers() {
    let sources = LimitSources::empty();
    let (mut robot, _) = sim_robot(&["a", "b"], &sources);
    let (mut coord, _) = coordinator();

    let pos = ControllerInfo::new("pos", ["a", "b"], Some(CSP));
    coord.prepare(&robot, &sources, &[pos.clone()], &[]).unwrap();
    assert!(coord.commit(&mut robot, &[pos.clone()], &[]).is_success());

    let vel = ControllerInfo::new("vel", ["b"], Some(CSV));
    coord.prepare(&robot, &sources, &[vel.clone()], &[pos.clone()]).unwrap();
    assert!(coord.commit(&mut robot, &[vel], &[pos]).is_success());

    assert_eq!(robot.handle("a").unwrap().state(), JointState::Idle);
    assert_eq!(robot.handle("b").unwrap().state(), JointState::Operational(CSV));
    assert!(robot.handle("b").unwrap().forwarding());
}

#[test]
fn stopping_an_observer_keeps_the_owner_running() {
    let sources = LimitSources::empty();
    let (mut robot, probes) = sim_robot(&["a", "b"], &sources);
    let (mut coord, stopper) = coordinator();

    let owner = ControllerInfo::new("owner", ["a", "b"], Some(CSP));
    let observer = ControllerInfo::new("observer", ["a", "b"], None);
    coord
        .prepare(&robot, &sources, &[owner.clone(), observer.clone()], &[])
        .unwrap();
    assert!(coord.commit(&mut robot, &[owner, observer.clone()], &[]).is_success());
    let requests_before: Vec<usize> = probes.iter().map(|p| p.mode_requests().len()).collect();

    coord.prepare(&robot, &sources, &[], &[observer.clone()]).unwrap();
    assert!(coord.commit(&mut robot, &[], &[observer]).is_success());

    for (name, probe) in ["a", "b"].iter().zip(&probes) {
        let handle = robot.handle(name).unwrap();
        assert_eq!(handle.state(), JointState::Operational(CSP), "joint {name}");
        assert!(handle.forwarding());
        assert_eq!(probe.mode(), CSP);
    }
    let requests_after: Vec<usize> = probes.iter().map(|p| p.mode_requests().len()).collect();
    assert_eq!(requests_before, requests_after);
    assert!(stopper.requests().is_empty());
}

// ── recovery ────────────────────────────────────────────────────────

#[test]
fn faulted_joint_can_switch_again_after_recover() {
    let sources = LimitSources::empty();
    let (mut robot, probes) = sim_robot(&["a"], &sources);
    probes[0].reject_mode(CSV);
    let handle = robot.handle_mut("a").unwrap();
    assert!(handle.switch_mode(CSV).is_err());
    assert_eq!(handle.state(), JointState::Faulted);

    handle.recover();
    assert_eq!(handle.state(), JointState::Idle);
    probes[0].accept_mode(CSV);
    handle.switch_mode(CSV).unwrap();
    assert!(handle.forward_for_mode(CSV));
}
