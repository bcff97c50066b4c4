//! # drivelink HAL
//!
//! Actuator implementations behind the `drivelink_common::actuator::Actuator`
//! contract, and the registry the control unit uses to build them by name.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - driver name to actuator factory
//! - [`simulation`] - in-process simulated drive with fault injection
//!
//! ```text
//! ┌───────────────────────┐      ┌──────────────────────┐
//! │  drivelink_control_   │ name │   ActuatorRegistry   │
//! │  unit (per joint)     ├─────►│  "simulation" → fn   │
//! └──────────┬────────────┘      └──────────┬───────────┘
//!            │ Box<dyn Actuator>            │
//!            ◄──────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod simulation;

use thiserror::Error;

pub use crate::driver_registry::{ActuatorFactory, ActuatorRegistry, ActuatorSpec};
pub use crate::simulation::{SimConfig, SimProbe, SimulatedActuator};

/// Driver registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// No driver registered under this name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// A driver with this name is already registered.
    #[error("Driver '{0}' is already registered")]
    DuplicateDriver(String),
}
