//! Joint handle: one actuator, its limits, its command cells.
//!
//! ## State Machine
//!
//! ```text
//!            request(m)                confirm
//! Idle | Operational ───────► Switching ───────► Operational(m) / Idle
//!                                 │
//!                                 │ reject / timeout  (actuator halted)
//!                                 ▼
//!                              Faulted ──recover()──► Idle
//! ```
//!
//! The handle owns all per-joint runtime state ([`JointRuntimeState`]).
//! Mode, overlay and forwarding change only through the mode-switch
//! coordinator; the limiter history changes every cycle.

use drivelink_common::actuator::{Actuator, OperationalState};
use drivelink_common::error::ConfigParseError;
use drivelink_common::limits::Limits;
use drivelink_common::mode::{CommandChannel, OperationMode};
use tracing::{debug, error, info, warn};

use crate::convert::JointConverters;
use crate::error::SwitchError;
use crate::layer::{LayerState, LayerStatus};
use crate::limiter::{JointFeedback, JointLimiter};
use crate::sources::LimitSources;

/// Per-joint switching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JointState {
    /// `NoMode`, nothing forwarded.
    #[default]
    Idle,
    /// Mode entry in progress.
    Switching,
    /// Drive confirmed this mode.
    Operational(OperationMode),
    /// Mode entry failed; the actuator was halted.
    Faulted,
}

/// Outcome of checking whether a joint can take a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchReadiness {
    /// Mode unsupported by the actuator, or not claimable by controllers.
    NotSupported,
    /// Already in the mode.
    NoNeedToSwitch,
    /// Actuator ready, switch possible.
    ReadyToSwitch,
    /// Actuator not operational-ready.
    NotReadyToSwitch,
}

impl SwitchReadiness {
    /// Whether a prepare step may proceed with this outcome.
    #[inline]
    pub const fn is_acceptable(self) -> bool {
        matches!(self, Self::NoNeedToSwitch | Self::ReadyToSwitch)
    }
}

/// Commanded values in joint units, one cell per channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointCommand {
    /// Position command.
    pub position: f64,
    /// Velocity command.
    pub velocity: f64,
    /// Effort command.
    pub effort: f64,
}

impl JointCommand {
    /// Cell of `channel`.
    pub fn get(&self, channel: CommandChannel) -> Option<f64> {
        match channel {
            CommandChannel::None => None,
            CommandChannel::Position => Some(self.position),
            CommandChannel::Velocity => Some(self.velocity),
            CommandChannel::Effort => Some(self.effort),
        }
    }

    /// Write the cell of `channel`.
    pub fn set(&mut self, channel: CommandChannel, value: f64) {
        match channel {
            CommandChannel::None => {}
            CommandChannel::Position => self.position = value,
            CommandChannel::Velocity => self.velocity = value,
            CommandChannel::Effort => self.effort = value,
        }
    }

    /// Copy the measured state into every cell except `keep`.
    fn track(&mut self, feedback: &JointFeedback, keep: CommandChannel) {
        if keep != CommandChannel::Position {
            self.position = feedback.position;
        }
        if keep != CommandChannel::Velocity {
            self.velocity = feedback.velocity;
        }
        if keep != CommandChannel::Effort {
            self.effort = feedback.effort;
        }
    }
}

/// Runtime state owned by one joint handle.
#[derive(Debug)]
pub struct JointRuntimeState {
    /// Limits from description and global config, set at init.
    pub baseline_limits: Limits,
    /// Controller layer of the active mode; empty while idle.
    pub overlay_limits: Limits,
    /// `baseline.merge(overlay)`, what the limiter enforces.
    pub effective_limits: Limits,
    /// Channel-keyed limiter with command history.
    pub limiter: JointLimiter,
    /// Mode last confirmed by the actuator.
    pub active_mode: OperationMode,
    /// Whether the controller command is forwarded this cycle.
    pub forwarding: bool,
}

impl JointRuntimeState {
    fn new(stop_on_limit: bool) -> Self {
        Self {
            baseline_limits: Limits::new(),
            overlay_limits: Limits::new(),
            effective_limits: Limits::new(),
            limiter: JointLimiter::new(CommandChannel::None, stop_on_limit),
            active_mode: OperationMode::NoMode,
            forwarding: false,
        }
    }

    fn refresh_effective(&mut self) {
        self.effective_limits = self.baseline_limits.merge(&self.overlay_limits);
    }
}

// ─── Joint Handle ───────────────────────────────────────────────────

/// One joint of the machine.
pub struct JointHandle {
    name: String,
    actuator: Box<dyn Actuator>,
    converters: JointConverters,
    runtime: JointRuntimeState,
    state: JointState,
    feedback: JointFeedback,
    command: JointCommand,
}

impl JointHandle {
    /// Wrap an actuator.
    pub fn new(
        name: impl Into<String>,
        actuator: Box<dyn Actuator>,
        converters: JointConverters,
        stop_on_limit: bool,
    ) -> Self {
        Self {
            name: name.into(),
            actuator,
            converters,
            runtime: JointRuntimeState::new(stop_on_limit),
            state: JointState::Idle,
            feedback: JointFeedback::default(),
            command: JointCommand::default(),
        }
    }

    // ── accessors ──

    /// Joint name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Switching state.
    #[inline]
    pub fn state(&self) -> JointState {
        self.state
    }

    /// Runtime state.
    #[inline]
    pub fn runtime(&self) -> &JointRuntimeState {
        &self.runtime
    }

    /// Mode last confirmed by the actuator.
    #[inline]
    pub fn active_mode(&self) -> OperationMode {
        self.runtime.active_mode
    }

    /// Channel the limiter enforces.
    #[inline]
    pub fn channel(&self) -> CommandChannel {
        self.runtime.limiter.channel()
    }

    /// Whether commands are forwarded.
    #[inline]
    pub fn forwarding(&self) -> bool {
        self.runtime.forwarding
    }

    /// Limits currently enforced.
    #[inline]
    pub fn effective_limits(&self) -> &Limits {
        &self.runtime.effective_limits
    }

    /// Latest feedback in joint units.
    #[inline]
    pub fn feedback(&self) -> &JointFeedback {
        &self.feedback
    }

    /// Command cells.
    #[inline]
    pub fn command(&self) -> &JointCommand {
        &self.command
    }

    /// Command cells, written by the controller runtime.
    #[inline]
    pub fn command_mut(&mut self) -> &mut JointCommand {
        &mut self.command
    }

    /// The wrapped actuator.
    pub fn actuator(&self) -> &dyn Actuator {
        self.actuator.as_ref()
    }

    // ── mode switching ──

    /// Classify a request for `mode`.
    pub fn can_switch(&self, mode: OperationMode) -> SwitchReadiness {
        if mode.channel().is_none() || !self.actuator.is_mode_supported(mode) {
            return SwitchReadiness::NotSupported;
        }
        if self.actuator.mode() == mode {
            return SwitchReadiness::NoNeedToSwitch;
        }
        if self.actuator.operational_state() == OperationalState::Ready {
            SwitchReadiness::ReadyToSwitch
        } else {
            SwitchReadiness::NotReadyToSwitch
        }
    }

    /// Put the actuator into `mode` and wait for it.
    ///
    /// Forwarding stops until [`forward_for_mode`](Self::forward_for_mode)
    /// confirms the new mode. Switching to `NoMode` also clears the overlay.
    ///
    /// # Errors
    ///
    /// `SwitchError::ActuatorEnterModeFailed` if the actuator refuses; the
    /// actuator is halted and the joint is `Faulted`.
    pub fn switch_mode(&mut self, mode: OperationMode) -> Result<(), SwitchError> {
        if self.actuator.mode() != mode || self.state == JointState::Faulted {
            self.runtime.forwarding = false;
            self.runtime.limiter.set_channel(CommandChannel::None);
            self.state = JointState::Switching;
            debug!(joint = %self.name, ?mode, "entering mode");

            if let Err(source) = self.actuator.enter_mode_and_wait(mode) {
                self.actuator.halt();
                self.state = JointState::Faulted;
                error!(joint = %self.name, ?mode, %source, "mode entry failed, joint halted");
                return Err(SwitchError::ActuatorEnterModeFailed {
                    joint: self.name.clone(),
                    mode,
                    source,
                });
            }
        }

        let channel = mode.channel().unwrap_or(CommandChannel::None);
        if self.runtime.limiter.channel() != channel {
            self.runtime.limiter.set_channel(channel);
        }
        self.runtime.active_mode = mode;
        if mode.is_idle() {
            self.runtime.forwarding = false;
            self.clear_overlay_limits();
            self.state = JointState::Idle;
        } else {
            self.state = JointState::Operational(mode);
        }
        Ok(())
    }

    /// Start forwarding if the actuator reports `mode`.
    pub fn forward_for_mode(&mut self, mode: OperationMode) -> bool {
        let ok = !mode.is_idle() && self.actuator.mode() == mode;
        self.runtime.forwarding = ok;
        ok
    }

    /// Install the controller layer; effective limits become `baseline.merge(overlay)`.
    pub fn set_overlay_limits(&mut self, overlay: Limits) {
        self.runtime.overlay_limits = overlay;
        self.runtime.refresh_effective();
    }

    /// Drop the controller layer.
    pub fn clear_overlay_limits(&mut self) {
        self.set_overlay_limits(Limits::new());
    }

    /// Faulted → Idle. Clears limiter memory.
    pub fn recover(&mut self) {
        self.runtime.limiter.recover();
        if self.state == JointState::Faulted {
            info!(joint = %self.name, "recovered from fault");
            self.runtime.forwarding = false;
            self.runtime.limiter.set_channel(CommandChannel::None);
            self.runtime.active_mode = OperationMode::NoMode;
            self.clear_overlay_limits();
            self.state = JointState::Idle;
        }
    }

    // ── cycle ──

    /// Rebuild the baseline and take an initial reading.
    ///
    /// # Errors
    ///
    /// `ConfigParseError` if this joint's global limit entry is malformed.
    pub fn init(&mut self, sources: &LimitSources) -> Result<(), ConfigParseError> {
        self.converters.reset();
        self.runtime.baseline_limits = Limits::new();
        self.runtime.baseline_limits = sources.baseline(&self.name)?;
        self.runtime.overlay_limits = Limits::new();
        self.runtime.refresh_effective();
        if !self.runtime.effective_limits.is_empty() {
            debug!(joint = %self.name, flags = ?self.runtime.effective_limits.flags(), "baseline limits");
        }
        self.pull_feedback();
        self.command.track(&self.feedback, CommandChannel::None);
        Ok(())
    }

    /// Refresh feedback from the actuator.
    pub fn read(&mut self, state: LayerState) {
        if state.does_io() {
            self.pull_feedback();
        }
    }

    fn pull_feedback(&mut self) {
        let raw = self.actuator.feedback();
        self.feedback = JointFeedback {
            position: self.converters.pos_from_device.evaluate(raw.position),
            velocity: self.converters.vel_from_device.evaluate(raw.velocity),
            effort: self.converters.eff_from_device.evaluate(raw.effort),
        };
    }

    /// Limit the active command cell. Returns whether it was clamped.
    pub fn enforce_limits(&mut self, period: f64, recover: bool) -> bool {
        if recover {
            self.runtime.limiter.recover();
        }
        let channel = self.runtime.limiter.channel();
        if !self.runtime.forwarding {
            return false;
        }
        let Some(cmd) = self.command.get(channel) else {
            return false;
        };
        let (out, clamped) = self.runtime.limiter.enforce(
            period,
            &self.runtime.effective_limits,
            &self.feedback,
            cmd,
        );
        self.command.set(channel, out);
        clamped
    }

    /// Forward the active command to the actuator.
    ///
    /// Only in `Ready`. Cells of inactive channels (all cells while not
    /// forwarding) are overwritten with the measured state.
    pub fn write(&mut self, state: LayerState) -> LayerStatus {
        if state != LayerState::Ready {
            return LayerStatus::Ok;
        }
        let channel = self.channel();
        let active = if self.runtime.forwarding { channel } else { CommandChannel::None };
        let target = match active {
            CommandChannel::Position => Some(self.converters.pos_to_device.evaluate(self.command.position)),
            CommandChannel::Velocity => Some(self.converters.vel_to_device.evaluate(self.command.velocity)),
            CommandChannel::Effort => Some(self.converters.eff_to_device.evaluate(self.command.effort)),
            CommandChannel::None => None,
        };
        if let Some(target) = target {
            self.actuator.set_target(target);
        }
        self.command.track(&self.feedback, active);

        if self.state == JointState::Faulted {
            warn!(joint = %self.name, "joint faulted");
            LayerStatus::Warn("joint faulted")
        } else {
            LayerStatus::Ok
        }
    }
}

impl std::fmt::Debug for JointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JointHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("runtime", &self.runtime)
            .field("feedback", &self.feedback)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}
