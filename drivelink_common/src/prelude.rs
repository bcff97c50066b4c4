//! Common re-exports.
//!
//! ```rust
//! use drivelink_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CYCLE_TIME_US, GLOBAL_NAMESPACE, MAX_JOINTS};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::limits::source::{
    read_from_config, read_from_description, ConfigStore, DescriptionSource, JointDescription,
};
pub use crate::limits::store::{MachineDescription, TomlConfigStore};
pub use crate::limits::{LimitFlags, Limits, SoftLimits};

// ─── Drives ─────────────────────────────────────────────────────────
pub use crate::actuator::{Actuator, OperationalState, RawFeedback};
pub use crate::error::{ActuatorError, ConfigParseError};
pub use crate::mode::{CommandChannel, OperationMode};

/// Default cycle time as `Duration`.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(DEFAULT_CYCLE_TIME_US as u64);
