//! Actuator driver registry.
//!
//! Constructed at startup, populated via `register()`, and handed to the
//! control unit by value. No global state.

use std::collections::HashMap;
use std::time::Duration;

use drivelink_common::actuator::Actuator;
use drivelink_common::mode::OperationMode;
use tracing::debug;

use crate::HalError;
use crate::simulation::{SimConfig, SimulatedActuator};

/// What a factory needs to build one joint's actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorSpec {
    /// Joint the actuator drives.
    pub joint: String,
    /// Modes the drive accepts.
    pub supported_modes: Vec<OperationMode>,
    /// Control cycle period.
    pub cycle: Duration,
}

/// Builds an actuator for one joint.
pub type ActuatorFactory = fn(&ActuatorSpec) -> Box<dyn Actuator>;

/// Name of the built-in simulation driver.
pub const SIMULATION_DRIVER: &str = "simulation";

/// Registry of available actuator drivers.
pub struct ActuatorRegistry {
    factories: HashMap<&'static str, ActuatorFactory>,
}

impl ActuatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in drivers.
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        reg.factories.insert(SIMULATION_DRIVER, create_simulated);
        reg
    }

    /// Register a driver factory.
    ///
    /// # Errors
    ///
    /// `HalError::DuplicateDriver` if `name` is taken.
    pub fn register(&mut self, name: &'static str, factory: ActuatorFactory) -> Result<(), HalError> {
        if self.factories.contains_key(name) {
            return Err(HalError::DuplicateDriver(name.to_string()));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Build an actuator with the driver registered as `name`.
    ///
    /// # Errors
    ///
    /// `HalError::DriverNotFound` if no such driver exists.
    pub fn create(&self, name: &str, spec: &ActuatorSpec) -> Result<Box<dyn Actuator>, HalError> {
        let factory = self
            .factories
            .get(name)
            .copied()
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        debug!(driver = name, joint = %spec.joint, "creating actuator");
        Ok(factory(spec))
    }

    /// Registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for ActuatorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn create_simulated(spec: &ActuatorSpec) -> Box<dyn Actuator> {
    let config = SimConfig {
        supported_modes: spec.supported_modes.clone(),
        dt: spec.cycle,
        ..SimConfig::default()
    };
    Box::new(SimulatedActuator::new(config))
}
