//! Integration test: failed commit → asynchronous controller stop.
//!
//! Validates: the coordinator returns before the registry is called, the
//! request travels over the tokio runtime to the queued registry, and a
//! registry that fails does not disturb the control plane.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use drivelink_common::mode::OperationMode;
use drivelink_control_unit::handle::JointState;
use drivelink_control_unit::sources::LimitSources;
use drivelink_control_unit::switch::{
    AsyncStopDispatcher, ControllerInfo, ControllerRegistry, ModeSwitchCoordinator,
    QueuedStopRegistry, RegistryError,
};

use super::sim_robot;

const CSV: OperationMode = OperationMode::CyclicSynchronousVelocity;

fn control_plane() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn failed_controller_reaches_registry() {
    let rt = control_plane();
    let (registry, mut rx) = QueuedStopRegistry::channel();
    let stopper = AsyncStopDispatcher::new(rt.handle().clone(), Arc::new(registry));
    let mut coord = ModeSwitchCoordinator::new(Box::new(stopper));

    let sources = LimitSources::empty();
    let (mut robot, probes) = sim_robot(&["a", "b"], &sources);
    probes[1].reject_mode(CSV);

    let c = ControllerInfo::new("c", ["a", "b"], Some(CSV));
    coord.prepare(&robot, &sources, &[c.clone()], &[]).unwrap();
    let outcome = coord.commit(&mut robot, &[c], &[]);
    assert_eq!(outcome.failed, vec!["c".to_string()]);

    let deadline = Instant::now() + Duration::from_secs(5);
    let names = loop {
        if let Ok(names) = rx.try_recv() {
            break names;
        }
        assert!(Instant::now() < deadline, "stop request never arrived");
        std::thread::sleep(Duration::from_millis(1));
    };
    assert_eq!(names, vec!["c".to_string()]);
    assert!(rx.try_recv().is_err());
}

struct SlowFailingRegistry {
    calls: Arc<AtomicUsize>,
}

impl ControllerRegistry for SlowFailingRegistry {
    fn stop_controllers(&self, _names: &[String]) -> Result<(), RegistryError> {
        std::thread::sleep(Duration::from_millis(200));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RegistryError::Unavailable("registry offline".to_string()))
    }
}

#[test]
fn commit_does_not_wait_for_registry() {
    let rt = control_plane();
    let calls = Arc::new(AtomicUsize::new(0));
    let stopper = AsyncStopDispatcher::new(
        rt.handle().clone(),
        Arc::new(SlowFailingRegistry {
            calls: Arc::clone(&calls),
        }),
    );
    let mut coord = ModeSwitchCoordinator::new(Box::new(stopper));

    let sources = LimitSources::empty();
    let (mut robot, probes) = sim_robot(&["a"], &sources);
    probes[0].reject_mode(CSV);

    let c = ControllerInfo::new("c", ["a"], Some(CSV));
    coord.prepare(&robot, &sources, &[c.clone()], &[]).unwrap();
    let started = Instant::now();
    let outcome = coord.commit(&mut robot, &[c], &[]);
    assert!(started.elapsed() < Duration::from_millis(150));
    assert!(!outcome.is_success());
    assert_eq!(robot.handle("a").unwrap().state(), JointState::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while calls.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "registry never called");
        std::thread::sleep(Duration::from_millis(5));
    }
}
