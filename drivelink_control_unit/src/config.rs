//! Control unit configuration: TOML loading, validation, and assembly of the
//! joint layer.
//!
//! ```toml
//! description = "description.toml"   # relative to this file
//! limits = "limits.toml"
//!
//! [shared]
//! service_name = "drivelink"
//!
//! [cycle]
//! period_us = 1000                    # 0 = measure each cycle
//!
//! [[joints]]
//! name = "shoulder"
//! driver = "simulation"
//! supported_modes = ["cyclic_synchronous_position"]
//!
//! [[controllers]]
//! name = "hold"
//! joints = ["shoulder"]
//! required_mode = "cyclic_synchronous_position"
//! autostart = true
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use drivelink_common::config::{ConfigError, ConfigLoader, SharedConfig};
use drivelink_common::consts::{DEFAULT_CYCLE_TIME_US, MAX_JOINTS};
use drivelink_common::limits::store::{MachineDescription, TomlConfigStore};
use drivelink_common::mode::OperationMode;
use drivelink_hal::{ActuatorRegistry, ActuatorSpec, HalError};
use serde::Deserialize;
use tracing::info;

use crate::convert::{JointConversionConfig, JointConverters};
use crate::handle::JointHandle;
use crate::robot::RobotLayer;
use crate::sources::LimitSources;
use crate::switch::ControllerInfo;

// ─── Sections ───────────────────────────────────────────────────────

/// `[cycle]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    /// Fixed period [µs]; 0 uses the measured time between cycles.
    #[serde(default = "default_period_us")]
    pub period_us: u32,
    /// CPU core for the cycle thread.
    #[serde(default)]
    pub cpu_core: usize,
    /// SCHED_FIFO priority (used with the `rt` feature).
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,
}

fn default_period_us() -> u32 {
    DEFAULT_CYCLE_TIME_US
}

fn default_rt_priority() -> i32 {
    80
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_us: default_period_us(),
            cpu_core: 0,
            rt_priority: default_rt_priority(),
        }
    }
}

impl CycleConfig {
    /// Period handed to the control layer; zero means measured.
    pub fn fixed_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.period_us))
    }

    /// Period the cycle loop sleeps to.
    pub fn pacing(&self) -> Duration {
        let us = if self.period_us == 0 {
            DEFAULT_CYCLE_TIME_US
        } else {
            self.period_us
        };
        Duration::from_micros(u64::from(us))
    }
}

/// One `[[joints]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JointConfig {
    /// Joint name, as in the description and limit store.
    pub name: String,
    /// Actuator driver registry key.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Modes the actuator accepts.
    #[serde(default = "default_supported_modes")]
    pub supported_modes: Vec<OperationMode>,
    /// Command the limit value when the joint would overshoot it.
    #[serde(default = "default_true")]
    pub stop_on_limit: bool,
    /// Unit conversions; missing entries use the defaults.
    #[serde(flatten)]
    pub conversion: JointConversionConfig,
}

fn default_driver() -> String {
    drivelink_hal::driver_registry::SIMULATION_DRIVER.to_string()
}

fn default_supported_modes() -> Vec<OperationMode> {
    vec![
        OperationMode::ProfiledPosition,
        OperationMode::ProfiledVelocity,
        OperationMode::ProfiledTorque,
        OperationMode::CyclicSynchronousPosition,
        OperationMode::CyclicSynchronousVelocity,
        OperationMode::CyclicSynchronousTorque,
    ]
}

fn default_true() -> bool {
    true
}

/// One `[[controllers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Controller name; also its limit namespace.
    pub name: String,
    /// Joints it claims.
    #[serde(default)]
    pub joints: Vec<String>,
    /// Mode it needs on every claimed joint.
    #[serde(default)]
    pub required_mode: Option<OperationMode>,
    /// Start right after bring-up.
    #[serde(default)]
    pub autostart: bool,
}

impl ControllerConfig {
    /// As the switch coordinator sees it.
    pub fn info(&self) -> ControllerInfo {
        ControllerInfo::new(self.name.clone(), self.joints.iter().cloned(), self.required_mode)
    }
}

// ─── Root ───────────────────────────────────────────────────────────

/// Root of `drivelink.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlUnitConfig {
    /// Common service settings.
    pub shared: SharedConfig,
    /// Cycle timing.
    #[serde(default)]
    pub cycle: CycleConfig,
    /// Machine description file.
    #[serde(default)]
    pub description: Option<PathBuf>,
    /// Limit parameter file.
    #[serde(default)]
    pub limits: Option<PathBuf>,
    /// Joints in cycle order.
    #[serde(default)]
    pub joints: Vec<JointConfig>,
    /// Known controllers.
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

impl ControlUnitConfig {
    /// Check everything that does not need other files.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.joints.is_empty() {
            return Err(invalid("at least one joint is required"));
        }
        if self.joints.len() > MAX_JOINTS {
            return Err(invalid(format!(
                "{} joints configured, at most {MAX_JOINTS} supported",
                self.joints.len()
            )));
        }

        let mut joints = HashSet::new();
        for joint in &self.joints {
            if joint.name.trim().is_empty() {
                return Err(invalid("joint name cannot be empty"));
            }
            if !joints.insert(joint.name.as_str()) {
                return Err(invalid(format!("duplicate joint '{}'", joint.name)));
            }
            for conv in [
                joint.conversion.pos_to_device,
                joint.conversion.vel_to_device,
                joint.conversion.eff_to_device,
                joint.conversion.pos_from_device,
                joint.conversion.vel_from_device,
                joint.conversion.eff_from_device,
            ]
            .into_iter()
            .flatten()
            {
                if let Some(alpha) = conv.smoothing.filter(|a| !(*a > 0.0 && *a <= 1.0)) {
                    return Err(invalid(format!(
                        "joint '{}': smoothing {alpha} outside (0, 1]",
                        joint.name
                    )));
                }
            }
        }

        let mut controllers = HashSet::new();
        for controller in &self.controllers {
            if !controllers.insert(controller.name.as_str()) {
                return Err(invalid(format!("duplicate controller '{}'", controller.name)));
            }
            for joint in &controller.joints {
                if !joints.contains(joint.as_str()) {
                    return Err(invalid(format!(
                        "controller '{}' references unknown joint '{joint}'",
                        controller.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build one handle per configured joint, in order.
    ///
    /// # Errors
    ///
    /// `HalError::DriverNotFound` if a joint names an unregistered driver.
    pub fn build_robot(&self, registry: &ActuatorRegistry) -> Result<RobotLayer, HalError> {
        let mut robot = RobotLayer::new();
        for joint in &self.joints {
            let spec = ActuatorSpec {
                joint: joint.name.clone(),
                supported_modes: joint.supported_modes.clone(),
                cycle: self.cycle.pacing(),
            };
            let actuator = registry.create(&joint.driver, &spec)?;
            robot.add_joint(JointHandle::new(
                joint.name.clone(),
                actuator,
                JointConverters::from_config(&joint.conversion),
                joint.stop_on_limit,
            ));
        }
        Ok(robot)
    }

    /// Controllers marked `autostart`, in file order.
    pub fn autostart(&self) -> Vec<String> {
        self.controllers
            .iter()
            .filter(|c| c.autostart)
            .map(|c| c.name.clone())
            .collect()
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

// ─── Loading ────────────────────────────────────────────────────────

/// Validated config plus the limit sources it points at.
pub struct LoadedConfig {
    /// Parsed `drivelink.toml`.
    pub config: ControlUnitConfig,
    /// Description and limit store.
    pub sources: LimitSources,
}

impl std::fmt::Debug for LoadedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedConfig")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Load and validate `path`, then the description and limit files it names.
///
/// Relative paths resolve against the directory of `path`. A missing
/// `description` or `limits` entry yields an empty source.
///
/// # Errors
///
/// `ConfigError` from any of the three files, or from validation.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let config = ControlUnitConfig::load(path)?;
    config.validate()?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let description = match &config.description {
        Some(p) => MachineDescription::load(&base.join(p))?,
        None => MachineDescription::default(),
    };
    let store = match &config.limits {
        Some(p) => TomlConfigStore::load(&base.join(p))?,
        None => TomlConfigStore::default(),
    };
    info!(
        joints = config.joints.len(),
        controllers = config.controllers.len(),
        described = description.joints.len(),
        "configuration loaded"
    );

    Ok(LoadedConfig {
        config,
        sources: LimitSources::new(Box::new(description), Box::new(store)),
    })
}
