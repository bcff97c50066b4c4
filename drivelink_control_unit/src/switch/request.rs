//! Controller descriptions and per-joint switch records.

use drivelink_common::limits::Limits;
use drivelink_common::mode::OperationMode;

/// A controller as the registry describes it on start/stop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControllerInfo {
    /// Controller name; also its limit namespace.
    pub name: String,
    /// Joints the controller claims.
    pub joints: Vec<String>,
    /// Drive mode the controller needs, if any.
    pub required_mode: Option<OperationMode>,
}

impl ControllerInfo {
    /// Controller claiming `joints` in `mode`.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        joints: impl IntoIterator<Item = S>,
        required_mode: Option<OperationMode>,
    ) -> Self {
        Self {
            name: name.into(),
            joints: joints.into_iter().map(Into::into).collect(),
            required_mode,
        }
    }
}

/// One joint's part of a prepared controller start.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchRequest {
    /// Joint name.
    pub joint: String,
    /// Mode to enter.
    pub mode: OperationMode,
    /// Controller layer installed once the mode is confirmed.
    pub overlay: Limits,
}
