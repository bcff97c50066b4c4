//! System-wide constants for the drivelink workspace.
//!
//! Single source of truth for numeric limits and well-known names.

/// Maximum number of joints a single control unit drives.
pub const MAX_JOINTS: usize = 64;

/// Default control cycle time in microseconds (1 kHz = 1000 µs).
pub const DEFAULT_CYCLE_TIME_US: u32 = 1000;

/// Namespace of the global limit configuration (the store root).
pub const GLOBAL_NAMESPACE: &str = "";

/// Key prefix under which per-joint limits live in a namespace.
pub const JOINT_LIMITS_KEY: &str = "joint_limits";

/// Default configuration file path of the control unit binary.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/drivelink/drivelink.toml";
