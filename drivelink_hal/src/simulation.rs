//! Simulated drive.
//!
//! `SimulatedActuator` behaves like a CiA-402 drive with a first-order
//! response: every `set_target` advances the simulation by one cycle.
//! A cloneable [`SimProbe`] shares the drive state so tests (and operator
//! tooling) can inject readiness changes, mode rejections and faults, and
//! observe what the control unit wrote.

use std::sync::Arc;
use std::time::Duration;

use drivelink_common::actuator::{Actuator, OperationalState, RawFeedback};
use drivelink_common::error::ActuatorError;
use drivelink_common::mode::{CommandChannel, OperationMode};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Modes the drive accepts. `NoMode` is always accepted.
    pub supported_modes: Vec<OperationMode>,
    /// Response time constant [s].
    pub time_constant: f64,
    /// Simulation step per `set_target` call.
    pub dt: Duration,
    /// Effort to acceleration ratio in torque modes.
    pub inverse_inertia: f64,
    /// Initial position [device units].
    pub initial_position: f64,
    /// Initial operational state.
    pub initial_state: OperationalState,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            supported_modes: vec![
                OperationMode::ProfiledPosition,
                OperationMode::ProfiledVelocity,
                OperationMode::ProfiledTorque,
                OperationMode::CyclicSynchronousPosition,
                OperationMode::CyclicSynchronousVelocity,
                OperationMode::CyclicSynchronousTorque,
            ],
            time_constant: 0.01,
            dt: Duration::from_millis(1),
            inverse_inertia: 1.0,
            initial_position: 0.0,
            initial_state: OperationalState::Ready,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    mode: OperationMode,
    op_state: OperationalState,
    feedback: RawFeedback,
    last_target: Option<f64>,
    rejected: Vec<OperationMode>,
    mode_requests: Vec<OperationMode>,
    halts: u32,
}

/// In-process simulated drive.
pub struct SimulatedActuator {
    config: SimConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedActuator {
    /// Create a drive in `NoMode` at `initial_position`.
    pub fn new(config: SimConfig) -> Self {
        let state = SimState {
            op_state: config.initial_state,
            feedback: RawFeedback {
                position: config.initial_position,
                ..RawFeedback::default()
            },
            ..SimState::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a drive and a probe sharing its state.
    pub fn with_probe(config: SimConfig) -> (Self, SimProbe) {
        let act = Self::new(config);
        let probe = act.probe();
        (act, probe)
    }

    /// Probe sharing this drive's state.
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn step(&self, state: &mut SimState, target: f64) {
        let dt = self.config.dt.as_secs_f64();
        if dt <= 0.0 {
            return;
        }
        let alpha = dt / (self.config.time_constant.max(0.0) + dt);
        let fb = &mut state.feedback;
        match state.mode.channel() {
            Some(CommandChannel::Position) => {
                let next = fb.position + alpha * (target - fb.position);
                fb.velocity = (next - fb.position) / dt;
                fb.position = next;
            }
            Some(CommandChannel::Velocity) => {
                fb.velocity += alpha * (target - fb.velocity);
                fb.position += fb.velocity * dt;
            }
            Some(CommandChannel::Effort) => {
                fb.effort = target;
                fb.velocity += target * self.config.inverse_inertia * dt;
                fb.position += fb.velocity * dt;
            }
            Some(CommandChannel::None) | None => {}
        }
    }
}

impl Actuator for SimulatedActuator {
    fn is_mode_supported(&self, mode: OperationMode) -> bool {
        mode.is_idle() || self.config.supported_modes.contains(&mode)
    }

    fn mode(&self) -> OperationMode {
        self.state.lock().mode
    }

    fn operational_state(&self) -> OperationalState {
        self.state.lock().op_state
    }

    fn enter_mode_and_wait(&mut self, mode: OperationMode) -> Result<(), ActuatorError> {
        let supported = self.is_mode_supported(mode);
        let mut state = self.state.lock();
        state.mode_requests.push(mode);

        if state.op_state == OperationalState::Fault {
            return Err(ActuatorError::Fault("drive fault latched".to_string()));
        }
        if !supported || state.rejected.contains(&mode) {
            warn!(?mode, "simulated drive rejects mode");
            return Err(ActuatorError::ModeRejected(mode));
        }
        if !mode.is_idle() && state.op_state != OperationalState::Ready {
            return Err(ActuatorError::Timeout(mode));
        }

        debug!(from = ?state.mode, to = ?mode, "simulated drive mode change");
        state.mode = mode;
        state.last_target = None;
        Ok(())
    }

    fn halt(&mut self) {
        let mut state = self.state.lock();
        state.halts += 1;
        state.feedback.velocity = 0.0;
        state.feedback.effort = 0.0;
    }

    fn set_target(&mut self, target: f64) {
        let mut state = self.state.lock();
        if state.mode.is_idle() || state.op_state != OperationalState::Ready {
            return;
        }
        trace!(target, "simulated drive target");
        state.last_target = Some(target);
        self.step(&mut state, target);
    }

    fn feedback(&self) -> RawFeedback {
        self.state.lock().feedback
    }
}

/// Shared handle into a simulated drive's state.
#[derive(Clone)]
pub struct SimProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimProbe {
    /// Force the operational state.
    pub fn set_operational_state(&self, op_state: OperationalState) {
        self.state.lock().op_state = op_state;
    }

    /// Make the drive reject `mode` on entry.
    pub fn reject_mode(&self, mode: OperationMode) {
        let mut state = self.state.lock();
        if !state.rejected.contains(&mode) {
            state.rejected.push(mode);
        }
    }

    /// Accept `mode` again.
    pub fn accept_mode(&self, mode: OperationMode) {
        self.state.lock().rejected.retain(|m| *m != mode);
    }

    /// Overwrite the measured state.
    pub fn set_feedback(&self, feedback: RawFeedback) {
        self.state.lock().feedback = feedback;
    }

    /// Current mode.
    pub fn mode(&self) -> OperationMode {
        self.state.lock().mode
    }

    /// Current measured state.
    pub fn feedback(&self) -> RawFeedback {
        self.state.lock().feedback
    }

    /// Last target written since the last mode change.
    pub fn last_target(&self) -> Option<f64> {
        self.state.lock().last_target
    }

    /// Every mode entry requested so far, in order.
    pub fn mode_requests(&self) -> Vec<OperationMode> {
        self.state.lock().mode_requests.clone()
    }

    /// Number of `halt()` calls.
    pub fn halts(&self) -> u32 {
        self.state.lock().halts
    }
}
