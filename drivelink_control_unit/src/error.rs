//! Control unit error types.
//!
//! Mode-request classification (`SwitchReadiness`) is not an error; callers
//! branch on it. `SwitchError` is what a rejected prepare or a failed mode
//! entry returns. Per-cycle problems never surface here, they are reported
//! as a `LayerStatus`.

use drivelink_common::error::{ActuatorError, ConfigParseError};
use drivelink_common::mode::OperationMode;
use thiserror::Error;

/// Mode-switch failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwitchError {
    /// A stopping controller has no switch record.
    #[error("controller '{0}' has no switch record")]
    UnknownController(String),

    /// A starting controller claims a joint with no handle.
    #[error("controller '{controller}' claims unknown joint '{joint}'")]
    UnknownJoint {
        /// Controller name.
        controller: String,
        /// Joint name.
        joint: String,
    },

    /// The joint cannot be driven in the requested mode.
    #[error("joint '{joint}' does not support mode {mode:?}")]
    NotSupported {
        /// Joint name.
        joint: String,
        /// Requested mode.
        mode: OperationMode,
    },

    /// The joint's actuator is not operational-ready.
    #[error("joint '{joint}' is not ready to switch to {mode:?}")]
    NotReadyToSwitch {
        /// Joint name.
        joint: String,
        /// Requested mode.
        mode: OperationMode,
    },

    /// The actuator rejected or timed out a mode entry; the joint was halted.
    #[error("joint '{joint}' failed to enter {mode:?}: {source}")]
    ActuatorEnterModeFailed {
        /// Joint name.
        joint: String,
        /// Requested mode.
        mode: OperationMode,
        /// Actuator failure.
        #[source]
        source: ActuatorError,
    },

    /// Controller limit configuration is malformed.
    #[error("limit configuration: {0}")]
    Config(#[from] ConfigParseError),
}

/// Errors during RT setup or cycle execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}
