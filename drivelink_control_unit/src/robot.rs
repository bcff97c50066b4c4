//! All joints of one machine.
//!
//! Handles are stored in configuration order and looked up by name.
//! Per-cycle operations visit every joint in that order.

use std::collections::HashMap;

use drivelink_common::error::ConfigParseError;
use tracing::{info, warn};

use crate::handle::JointHandle;
use crate::layer::{LayerState, LayerStatus};
use crate::sources::LimitSources;

/// Joint handles of one machine.
#[derive(Debug, Default)]
pub struct RobotLayer {
    joints: Vec<JointHandle>,
    index: HashMap<String, usize>,
}

impl RobotLayer {
    /// No joints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a joint. Returns `false` (and drops `handle`) if the name is taken.
    pub fn add_joint(&mut self, handle: JointHandle) -> bool {
        if self.index.contains_key(handle.name()) {
            warn!(joint = handle.name(), "duplicate joint ignored");
            return false;
        }
        self.index.insert(handle.name().to_string(), self.joints.len());
        self.joints.push(handle);
        true
    }

    /// Joint by name.
    pub fn handle(&self, name: &str) -> Option<&JointHandle> {
        self.index.get(name).map(|&i| &self.joints[i])
    }

    /// Joint by name, mutable.
    pub fn handle_mut(&mut self, name: &str) -> Option<&mut JointHandle> {
        let i = *self.index.get(name)?;
        self.joints.get_mut(i)
    }

    /// All joints in configuration order.
    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    /// All joints, mutable.
    pub fn joints_mut(&mut self) -> &mut [JointHandle] {
        &mut self.joints
    }

    /// Number of joints.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether there are no joints.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Initialize every joint's baseline and feedback.
    ///
    /// # Errors
    ///
    /// The first joint whose global limit entry is malformed.
    pub fn init(&mut self, sources: &LimitSources) -> Result<(), ConfigParseError> {
        for joint in &mut self.joints {
            joint.init(sources)?;
        }
        info!(joints = self.joints.len(), "joint baselines initialized");
        Ok(())
    }

    /// Read every joint.
    pub fn read(&mut self, state: LayerState) {
        for joint in &mut self.joints {
            joint.read(state);
        }
    }

    /// Enforce limits on every forwarding joint. Returns the clamp count.
    pub fn enforce_limits(&mut self, period: f64, recover: bool) -> u32 {
        let mut clamped = 0;
        for joint in &mut self.joints {
            if joint.enforce_limits(period, recover) {
                clamped += 1;
            }
        }
        clamped
    }

    /// Write every joint; the worst status wins.
    pub fn write(&mut self, state: LayerState) -> LayerStatus {
        self.joints
            .iter_mut()
            .fold(LayerStatus::Ok, |status, joint| status.worst(joint.write(state)))
    }
}
