//! Error types shared across the workspace.
//!
//! - `ConfigParseError` - a present limit field is malformed
//! - `ActuatorError` - an actuator refused or failed a request

use crate::mode::OperationMode;
use thiserror::Error;

/// Malformed limit configuration.
///
/// Fatal to the configuration load that produced it. Absent fields are
/// never an error; they simply stay unconfigured.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigParseError {
    /// A limit value is present but not a number.
    #[error("'{key}' is not numeric")]
    NotNumeric {
        /// Full key path of the offending value.
        key: String,
    },

    /// A `has_*` switch is present but not a boolean.
    #[error("'{key}' is not a boolean")]
    NotBoolean {
        /// Full key path of the offending value.
        key: String,
    },

    /// A limit is switched on but its value is missing.
    #[error("'{key}' is required when its limit is enabled")]
    Missing {
        /// Full key path of the missing value.
        key: String,
    },

    /// A lower bound lies above its upper bound.
    #[error("{joint}: {what} range is inverted ({min} > {max})")]
    InvertedRange {
        /// Joint name.
        joint: String,
        /// Which range (`position`, `soft`).
        what: &'static str,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// A magnitude bound (velocity, acceleration, jerk, effort, gain) is negative.
    #[error("'{key}' must not be negative (got {value})")]
    NegativeBound {
        /// Full key path of the offending value.
        key: String,
        /// Parsed value.
        value: f64,
    },

    /// Soft limits are configured without hard position limits.
    #[error("{joint}: soft limits require position limits")]
    SoftWithoutPosition {
        /// Joint name.
        joint: String,
    },
}

/// Failure reported by an actuator handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    /// The drive rejected the requested mode.
    #[error("drive rejected mode {0:?}")]
    ModeRejected(OperationMode),

    /// The drive did not confirm the mode within its own bounded wait.
    #[error("drive did not confirm mode {0:?} in time")]
    Timeout(OperationMode),

    /// The drive is in a fault state.
    #[error("drive fault: {0}")]
    Fault(String),
}
