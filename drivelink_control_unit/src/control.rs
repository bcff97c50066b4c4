//! The control layer: joints, limit sources, switch coordinator and the
//! controller runtime, driven by per-cycle `read`/`write`.
//!
//! ## Cycle
//!
//! ```text
//! read(state)                     write(state, period, force_recover)
//!   └─ every joint: feedback        ├─ recover = flag.swap(false) | force_recover
//!                                   ├─ runtime.update(period, recover, robot)
//!                                   ├─ every forwarding joint: enforce limits
//!                                   └─ every joint: forward (Ready only)
//! ```
//!
//! Below `Shutdown` neither call does anything. Without an installed
//! controller runtime both report a standing error above `Shutdown`.
//!
//! ## Control Plane
//!
//! Controller starts and stops go through [`ControlLayer::switch_controllers`]
//! (prepare, then commit). The caller serializes them with the cycle.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drivelink_common::error::ConfigParseError;
use drivelink_common::mode::CommandChannel;
use tracing::{debug, info, warn};

use crate::cycle::CycleStats;
use crate::error::SwitchError;
use crate::handle::JointState;
use crate::layer::{LayerState, LayerStatus};
use crate::robot::RobotLayer;
use crate::sources::LimitSources;
use crate::switch::{CommitOutcome, ControllerInfo, ModeSwitchCoordinator};

/// Standing status while no controller runtime is installed.
pub const RUNTIME_MISSING: LayerStatus = LayerStatus::Error("controller runtime is not initialized");

// ─── Controller Runtime ─────────────────────────────────────────────

/// Whatever computes the joint commands each cycle.
pub trait ControllerRuntime: Send {
    /// Write commands into the joints' command cells.
    ///
    /// `recover` is set on the first cycle after init and after a recover
    /// request; the runtime should restart from the measured state.
    fn update(&mut self, period: Duration, recover: bool, robot: &mut RobotLayer);
}

/// Holds every operational joint where it was when its mode became active.
#[derive(Debug, Default)]
pub struct HoldPositionRuntime {
    held: HashMap<String, f64>,
}

impl HoldPositionRuntime {
    /// Nothing held yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ControllerRuntime for HoldPositionRuntime {
    fn update(&mut self, _period: Duration, recover: bool, robot: &mut RobotLayer) {
        if recover {
            self.held.clear();
        }
        for joint in robot.joints_mut() {
            if !matches!(joint.state(), JointState::Operational(_)) {
                self.held.remove(joint.name());
                continue;
            }
            let measured = joint.feedback().position;
            let hold = *self.held.entry(joint.name().to_string()).or_insert(measured);
            match joint.channel() {
                CommandChannel::Position => joint.command_mut().position = hold,
                CommandChannel::Velocity => joint.command_mut().velocity = 0.0,
                CommandChannel::Effort => joint.command_mut().effort = 0.0,
                CommandChannel::None => {}
            }
        }
    }
}

// ─── Control Layer ──────────────────────────────────────────────────

/// Joints plus everything that changes what they are commanded.
pub struct ControlLayer {
    robot: RobotLayer,
    sources: LimitSources,
    coordinator: ModeSwitchCoordinator,
    runtime: Option<Box<dyn ControllerRuntime>>,
    recover: Arc<AtomicBool>,
    fixed_period: Duration,
    controllers: HashMap<String, ControllerInfo>,
    running: BTreeSet<String>,
    stats: CycleStats,
}

impl ControlLayer {
    /// Assemble a layer. A zero `fixed_period` uses the period passed to
    /// each `write`.
    pub fn new(
        robot: RobotLayer,
        sources: LimitSources,
        coordinator: ModeSwitchCoordinator,
        fixed_period: Duration,
    ) -> Self {
        Self {
            robot,
            sources,
            coordinator,
            runtime: None,
            recover: Arc::new(AtomicBool::new(false)),
            fixed_period,
            controllers: HashMap::new(),
            running: BTreeSet::new(),
            stats: CycleStats::new(),
        }
    }

    // ── lifecycle ──

    /// Build joint baselines and install `runtime`.
    ///
    /// The first `write` after init runs with `recover` set.
    ///
    /// # Errors
    ///
    /// `ConfigParseError` if a joint's global limit entry is malformed.
    pub fn init(&mut self, runtime: Box<dyn ControllerRuntime>) -> Result<(), ConfigParseError> {
        self.robot.init(&self.sources)?;
        if self.runtime.is_some() {
            warn!("controller runtime already initialized, replacing");
        }
        self.runtime = Some(runtime);
        self.recover.store(true, Ordering::Release);
        info!(joints = self.robot.len(), "control layer initialized");
        Ok(())
    }

    /// Drop the controller runtime.
    pub fn shutdown(&mut self) {
        if self.runtime.take().is_some() {
            info!("controller runtime shut down");
        }
    }

    /// Whether a controller runtime is installed.
    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    // ── recovery ──

    /// Flag shared with operator threads; set it to request recovery.
    pub fn recover_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.recover)
    }

    /// Request recovery on the next `write`.
    pub fn request_recover(&self) {
        self.recover.store(true, Ordering::Release);
    }

    /// Faulted joints → Idle. Returns how many were recovered.
    pub fn recover_faulted(&mut self) -> usize {
        let mut recovered = 0;
        for joint in self.robot.joints_mut() {
            if joint.state() == JointState::Faulted {
                joint.recover();
                recovered += 1;
            }
        }
        if recovered > 0 {
            self.request_recover();
        }
        recovered
    }

    // ── cycle ──

    /// Read feedback of every joint.
    pub fn read(&mut self, state: LayerState) -> LayerStatus {
        if !state.does_io() {
            return LayerStatus::Ok;
        }
        if self.runtime.is_none() && state > LayerState::Shutdown {
            return RUNTIME_MISSING;
        }
        self.robot.read(state);
        LayerStatus::Ok
    }

    /// Run the controllers, enforce limits and forward commands.
    pub fn write(&mut self, state: LayerState, period: Duration, force_recover: bool) -> LayerStatus {
        if !state.does_io() {
            return LayerStatus::Ok;
        }
        let Some(runtime) = self.runtime.as_mut() else {
            return if state > LayerState::Shutdown {
                RUNTIME_MISSING
            } else {
                LayerStatus::Ok
            };
        };

        let period = if self.fixed_period.is_zero() {
            period
        } else {
            self.fixed_period
        };
        let recover = self.recover.swap(false, Ordering::AcqRel) || force_recover;

        runtime.update(period, recover, &mut self.robot);
        let clamped = self.robot.enforce_limits(period.as_secs_f64(), recover);
        self.stats.record_clamps(clamped);
        self.robot.write(state)
    }

    // ── controllers ──

    /// Make a controller known. Replaces a stopped controller of the same name.
    pub fn add_controller(&mut self, info: ControllerInfo) -> bool {
        if self.running.contains(&info.name) {
            warn!(controller = %info.name, "cannot replace a running controller");
            return false;
        }
        self.controllers.insert(info.name.clone(), info);
        true
    }

    /// Known controller by name.
    pub fn controller(&self, name: &str) -> Option<&ControllerInfo> {
        self.controllers.get(name)
    }

    /// Names of running controllers.
    pub fn running(&self) -> impl Iterator<Item = &str> {
        self.running.iter().map(String::as_str)
    }

    /// Whether `name` is running.
    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains(name)
    }

    /// Start `start` and stop `stop` as one batch.
    ///
    /// Names already running in `start`, or not running in `stop`, are
    /// skipped. A rejected prepare leaves every joint untouched.
    ///
    /// # Errors
    ///
    /// `UnknownController` for a name never added, otherwise whatever
    /// prepare rejects.
    pub fn switch_controllers(
        &mut self,
        start: &[String],
        stop: &[String],
    ) -> Result<CommitOutcome, SwitchError> {
        let start = self.lookup(start, false)?;
        let stop = self.lookup(stop, true)?;
        if start.is_empty() && stop.is_empty() {
            return Ok(CommitOutcome::default());
        }

        self.coordinator.prepare(&self.robot, &self.sources, &start, &stop)?;
        let outcome = self.coordinator.commit(&mut self.robot, &start, &stop);

        for controller in &stop {
            self.running.remove(&controller.name);
            info!(controller = %controller.name, "controller stopped");
        }
        for controller in &start {
            if !outcome.failed.contains(&controller.name) {
                self.running.insert(controller.name.clone());
                info!(controller = %controller.name, "controller started");
            }
        }
        Ok(outcome)
    }

    /// Start controllers by name.
    ///
    /// # Errors
    ///
    /// See [`switch_controllers`](Self::switch_controllers).
    pub fn start_controllers(&mut self, names: &[String]) -> Result<CommitOutcome, SwitchError> {
        self.switch_controllers(names, &[])
    }

    /// Stop controllers by name.
    ///
    /// # Errors
    ///
    /// See [`switch_controllers`](Self::switch_controllers).
    pub fn stop_controllers(&mut self, names: &[String]) -> Result<CommitOutcome, SwitchError> {
        self.switch_controllers(&[], names)
    }

    fn lookup(&self, names: &[String], running: bool) -> Result<Vec<ControllerInfo>, SwitchError> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let info = self
                .controllers
                .get(name)
                .ok_or_else(|| SwitchError::UnknownController(name.clone()))?;
            if self.running.contains(name) == running {
                out.push(info.clone());
            } else {
                debug!(controller = %name, running, "controller skipped");
            }
        }
        Ok(out)
    }

    // ── accessors ──

    /// The joints.
    pub fn robot(&self) -> &RobotLayer {
        &self.robot
    }

    /// The joints, mutable.
    pub fn robot_mut(&mut self) -> &mut RobotLayer {
        &mut self.robot
    }

    /// The switch coordinator.
    pub fn coordinator(&self) -> &ModeSwitchCoordinator {
        &self.coordinator
    }

    /// Cycle statistics.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Cycle statistics, mutable.
    pub fn stats_mut(&mut self) -> &mut CycleStats {
        &mut self.stats
    }
}

impl std::fmt::Debug for ControlLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLayer")
            .field("robot", &self.robot)
            .field("coordinator", &self.coordinator)
            .field("initialized", &self.runtime.is_some())
            .field("fixed_period", &self.fixed_period)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
