//! Actuator handle contract.
//!
//! One actuator per joint. The control unit only ever talks to this trait;
//! drives (CANopen, EtherCAT, simulation) implement it.
//!
//! # Timing Contracts
//!
//! | Operation | Caller | RT Constraint |
//! |-----------|--------|---------------|
//! | `feedback()` / `set_target()` | RT cycle | **HARD**, no blocking |
//! | `enter_mode_and_wait()` | control plane | bounded by the drive's own wait |
//! | `halt()` | control plane | must not block |

use crate::error::ActuatorError;
use crate::mode::OperationMode;

/// Operational state reported by a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationalState {
    /// Not powered / not communicating.
    #[default]
    Off,
    /// Bring-up in progress.
    Init,
    /// Communicating but not able to switch modes.
    NotReady,
    /// Operational, mode switches accepted.
    Ready,
    /// Drive fault latched.
    Fault,
}

/// Raw feedback in device units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawFeedback {
    /// Position [device units].
    pub position: f64,
    /// Velocity [device units].
    pub velocity: f64,
    /// Effort [device units].
    pub effort: f64,
}

/// A mode-switchable joint drive.
pub trait Actuator: Send {
    /// Whether the drive supports `mode`.
    fn is_mode_supported(&self, mode: OperationMode) -> bool;

    /// Mode the drive currently reports.
    fn mode(&self) -> OperationMode;

    /// Current operational state.
    fn operational_state(&self) -> OperationalState;

    /// Enter `mode` and wait for the drive to confirm it.
    ///
    /// # Errors
    ///
    /// `ActuatorError::ModeRejected` or `ActuatorError::Timeout` when the
    /// drive does not end up in `mode`.
    fn enter_mode_and_wait(&mut self, mode: OperationMode) -> Result<(), ActuatorError>;

    /// Stop motion immediately.
    fn halt(&mut self);

    /// Write the target of the active mode [device units].
    fn set_target(&mut self, target: f64);

    /// Latest feedback [device units].
    fn feedback(&self) -> RawFeedback;
}
