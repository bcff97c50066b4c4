//! Lifecycle state passed into every `read`/`write` and the status they return.

/// Lifecycle state of the surrounding layer stack.
///
/// Ordered: every state from `Shutdown` on does I/O, below it nothing runs.
/// Only `Ready` forwards commands to the actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LayerState {
    /// Not started.
    #[default]
    Off,
    /// Bring-up in progress.
    Init,
    /// Shutting down, feedback still read.
    Shutdown,
    /// Error latched.
    Error,
    /// Halted.
    Halt,
    /// Recovering.
    Recover,
    /// Operational.
    Ready,
}

impl LayerState {
    /// Whether `read`/`write` do any work in this state.
    #[inline]
    pub fn does_io(self) -> bool {
        self >= Self::Shutdown
    }
}

/// Outcome of one cycle phase.
///
/// Ordered by severity, so the status of a layer is the `max` of its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LayerStatus {
    /// Nothing to report.
    #[default]
    Ok,
    /// Degraded but running.
    Warn(&'static str),
    /// Standing error, reported every cycle until resolved.
    Error(&'static str),
}

impl LayerStatus {
    /// Whether this is `Ok`.
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The more severe of two statuses.
    #[inline]
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}
