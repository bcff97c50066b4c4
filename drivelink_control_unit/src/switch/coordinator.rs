//! Two-phase mode-switch coordinator.
//!
//! ## Prepare
//!
//! ```text
//! stop set ──► every name must have a record ──────────┐
//! start set ─► per joint: handle? can_switch? layer ok? ├─► records += staged
//!              (first rejection aborts the whole batch) ┘
//! ```
//!
//! ## Commit
//!
//! ```text
//! per stopping controller: its recorded joints join the idle set
//! per starting controller:
//!   all joints → NoMode, then each joint → mode, forward, overlay
//!   any failure → controller failed, its joints join the idle set
//! idle set \ claimed joints → NoMode, overlay cleared
//! failed controllers → StopRequester (not awaited)
//! ```

use std::collections::{BTreeSet, HashMap};

use drivelink_common::error::ConfigParseError;
use drivelink_common::mode::OperationMode;
use tracing::{debug, error, info, warn};

use crate::error::SwitchError;
use crate::handle::SwitchReadiness;
use crate::robot::RobotLayer;
use crate::sources::LimitSources;

use super::request::{ControllerInfo, SwitchRequest};
use super::stop::StopRequester;

/// Result of one commit pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Starting controllers rolled back, each named once.
    pub failed: Vec<String>,
}

impl CommitOutcome {
    /// Whether every starting controller was committed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the controller → switch record table.
pub struct ModeSwitchCoordinator {
    records: HashMap<String, Vec<SwitchRequest>>,
    stopper: Box<dyn StopRequester>,
}

impl ModeSwitchCoordinator {
    /// Coordinator reporting failed controllers to `stopper`.
    pub fn new(stopper: Box<dyn StopRequester>) -> Self {
        Self {
            records: HashMap::new(),
            stopper,
        }
    }

    /// Switch record of `controller`, if prepared.
    pub fn record(&self, controller: &str) -> Option<&[SwitchRequest]> {
        self.records.get(controller).map(Vec::as_slice)
    }

    /// Names of controllers holding a record.
    pub fn recorded_controllers(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    // ── prepare ──

    /// Validate a batch of starts and stops.
    ///
    /// Nothing is switched here. On success one record per starting
    /// controller is stored; on error no record changes.
    ///
    /// # Errors
    ///
    /// - `UnknownController` if a stopping controller was never prepared
    /// - `UnknownJoint` if a starting controller claims a joint with no handle
    /// - `NotSupported` / `NotReadyToSwitch` from the joint's mode check
    /// - `Config` if a controller's limit entry is malformed or invalid
    pub fn prepare(
        &mut self,
        robot: &RobotLayer,
        sources: &LimitSources,
        start: &[ControllerInfo],
        stop: &[ControllerInfo],
    ) -> Result<(), SwitchError> {
        for controller in stop {
            if !self.records.contains_key(&controller.name) {
                warn!(controller = %controller.name, "stop of controller without switch record");
                return Err(SwitchError::UnknownController(controller.name.clone()));
            }
        }

        let mut staged = Vec::with_capacity(start.len());
        for controller in start {
            let requests = Self::prepare_controller(robot, sources, controller)?;
            staged.push((controller.name.clone(), requests));
        }

        for (name, requests) in staged {
            debug!(controller = %name, joints = requests.len(), "switch prepared");
            self.records.insert(name, requests);
        }
        Ok(())
    }

    fn prepare_controller(
        robot: &RobotLayer,
        sources: &LimitSources,
        controller: &ControllerInfo,
    ) -> Result<Vec<SwitchRequest>, SwitchError> {
        let Some(mode) = controller.required_mode else {
            if !controller.joints.is_empty() {
                warn!(controller = %controller.name, "controller claims joints without a required mode");
            }
            return Ok(Vec::new());
        };

        let mut requests = Vec::with_capacity(controller.joints.len());
        for joint in &controller.joints {
            let Some(handle) = robot.handle(joint) else {
                warn!(controller = %controller.name, joint = %joint, "unknown joint");
                return Err(SwitchError::UnknownJoint {
                    controller: controller.name.clone(),
                    joint: joint.clone(),
                });
            };

            match handle.can_switch(mode) {
                SwitchReadiness::NotSupported => {
                    warn!(controller = %controller.name, joint = %joint, ?mode, "mode not supported");
                    return Err(SwitchError::NotSupported {
                        joint: joint.clone(),
                        mode,
                    });
                }
                SwitchReadiness::NotReadyToSwitch => {
                    warn!(controller = %controller.name, joint = %joint, ?mode, "actuator not ready");
                    return Err(SwitchError::NotReadyToSwitch {
                        joint: joint.clone(),
                        mode,
                    });
                }
                SwitchReadiness::NoNeedToSwitch | SwitchReadiness::ReadyToSwitch => {}
            }

            let overlay = sources.controller_layer(joint, &controller.name)?;
            if !handle.runtime().baseline_limits.merge(&overlay).valid() {
                warn!(controller = %controller.name, joint = %joint, "soft limits without position limits");
                return Err(ConfigParseError::SoftWithoutPosition {
                    joint: joint.clone(),
                }
                .into());
            }

            requests.push(SwitchRequest {
                joint: joint.clone(),
                mode,
                overlay,
            });
        }
        Ok(requests)
    }

    // ── commit ──

    /// Switch the joints of every prepared starting controller.
    ///
    /// Never fails as a whole: a controller whose joints cannot all be
    /// switched is rolled back to `NoMode`, reported in the outcome and
    /// handed to the stop requester.
    pub fn commit(
        &mut self,
        robot: &mut RobotLayer,
        start: &[ControllerInfo],
        stop: &[ControllerInfo],
    ) -> CommitOutcome {
        // Stopping controllers release the joints they switched, as recorded.
        let mut to_idle: BTreeSet<String> = BTreeSet::new();
        let mut claimed: BTreeSet<String> = BTreeSet::new();
        let mut failed: Vec<String> = Vec::new();

        for controller in stop {
            let restarting = start.iter().any(|c| c.name == controller.name);
            let record = if restarting {
                self.records.get(&controller.name).cloned()
            } else {
                self.records.remove(&controller.name)
            };
            if let Some(requests) = record {
                to_idle.extend(requests.into_iter().map(|r| r.joint));
            }
        }

        for controller in start {
            let Some(requests) = self.records.get(&controller.name).cloned() else {
                error!(controller = %controller.name, "no switch record at commit");
                to_idle.extend(controller.joints.iter().cloned());
                if !failed.contains(&controller.name) {
                    failed.push(controller.name.clone());
                }
                continue;
            };

            if Self::commit_controller(robot, &controller.name, &requests) {
                claimed.extend(requests.iter().map(|r| r.joint.clone()));
                info!(controller = %controller.name, joints = requests.len(), "switch committed");
            } else {
                error!(controller = %controller.name, "switch failed, rolling back");
                to_idle.extend(requests.iter().map(|r| r.joint.clone()));
                self.records.remove(&controller.name);
                if !failed.contains(&controller.name) {
                    failed.push(controller.name.clone());
                }
            }
        }

        for joint in to_idle.difference(&claimed) {
            let Some(handle) = robot.handle_mut(joint) else {
                continue;
            };
            if let Err(e) = handle.switch_mode(OperationMode::NoMode) {
                error!(joint = %joint, error = %e, "could not idle joint");
            }
            handle.clear_overlay_limits();
            debug!(joint = %joint, "joint idled");
        }

        if !failed.is_empty() {
            info!(controllers = ?failed, "requesting stop of failed controllers");
            self.stopper.request_stop(failed.clone());
        }
        CommitOutcome { failed }
    }

    /// Returns `false` at the first joint that cannot be switched.
    fn commit_controller(robot: &mut RobotLayer, controller: &str, requests: &[SwitchRequest]) -> bool {
        for request in requests {
            let Some(handle) = robot.handle_mut(&request.joint) else {
                error!(controller, joint = %request.joint, "joint vanished before commit");
                return false;
            };
            if handle.switch_mode(OperationMode::NoMode).is_err() {
                return false;
            }
        }

        for request in requests {
            let Some(handle) = robot.handle_mut(&request.joint) else {
                return false;
            };
            if handle.switch_mode(request.mode).is_err() {
                return false;
            }
            if !handle.forward_for_mode(request.mode) {
                error!(controller, joint = %request.joint, mode = ?request.mode, "actuator does not report mode");
                return false;
            }
            handle.set_overlay_limits(request.overlay);
        }
        true
    }
}

impl std::fmt::Debug for ModeSwitchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeSwitchCoordinator")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}
