//! Drive operation modes (CiA-402) and the command channel each one drives.
//!
//! `OperationMode` is `#[repr(i8)]`, matching the object dictionary encoding
//! of "modes of operation" (0x6060).

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Discrete drive mode an actuator can be commanded in.
///
/// `NoMode` is the distinguished idle mode: no controller command is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum OperationMode {
    /// Idle, nothing forwarded.
    NoMode = 0,
    /// Profiled position.
    ProfiledPosition = 1,
    /// Velocity (vl).
    Velocity = 2,
    /// Profiled velocity.
    ProfiledVelocity = 3,
    /// Profiled torque.
    ProfiledTorque = 4,
    /// Homing procedure (drive-internal, no command channel).
    Homing = 6,
    /// Interpolated position.
    InterpolatedPosition = 7,
    /// Cyclic synchronous position.
    CyclicSynchronousPosition = 8,
    /// Cyclic synchronous velocity.
    CyclicSynchronousVelocity = 9,
    /// Cyclic synchronous torque.
    CyclicSynchronousTorque = 10,
}

const_assert_eq!(core::mem::size_of::<OperationMode>(), 1);

impl OperationMode {
    /// Convert from the raw object dictionary value. Returns `None` for
    /// reserved or manufacturer-specific values.
    #[inline]
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Self::NoMode),
            1 => Some(Self::ProfiledPosition),
            2 => Some(Self::Velocity),
            3 => Some(Self::ProfiledVelocity),
            4 => Some(Self::ProfiledTorque),
            6 => Some(Self::Homing),
            7 => Some(Self::InterpolatedPosition),
            8 => Some(Self::CyclicSynchronousPosition),
            9 => Some(Self::CyclicSynchronousVelocity),
            10 => Some(Self::CyclicSynchronousTorque),
            _ => None,
        }
    }

    /// Command channel a controller writes while this mode is active.
    ///
    /// `None` for `NoMode` and for `Homing`, which cannot be claimed by a
    /// controller.
    #[inline]
    pub const fn channel(self) -> Option<CommandChannel> {
        match self {
            Self::NoMode => Some(CommandChannel::None),
            Self::ProfiledPosition | Self::InterpolatedPosition | Self::CyclicSynchronousPosition => {
                Some(CommandChannel::Position)
            }
            Self::Velocity | Self::ProfiledVelocity | Self::CyclicSynchronousVelocity => {
                Some(CommandChannel::Velocity)
            }
            Self::ProfiledTorque | Self::CyclicSynchronousTorque => Some(CommandChannel::Effort),
            Self::Homing => None,
        }
    }

    /// Whether this is the idle mode.
    #[inline]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::NoMode)
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        Self::NoMode
    }
}

/// The quantity a joint's active controller commands.
///
/// One joint handle carries all three command cells; the channel selects
/// which one is forwarded and limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandChannel {
    /// No command forwarded.
    #[default]
    None,
    /// Position command [rad or m].
    Position,
    /// Velocity command [rad/s or m/s].
    Velocity,
    /// Effort command [Nm or N].
    Effort,
}

impl CommandChannel {
    /// Whether a command is forwarded on this channel.
    #[inline]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}
