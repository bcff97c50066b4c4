//! # drivelink Control Unit Library
//!
//! Keeps commanded joint motion inside configured limits and switches drive
//! modes across all joints of a machine as one batch.
//!
//! ## Layers
//!
//! 1. **ControlLayer**: controller runtime, recover flag, per-cycle read/write
//! 2. **ModeSwitchCoordinator**: prepare/commit of controller starts and stops
//! 3. **RobotLayer**: every joint, in configuration order
//! 4. **JointHandle**: one actuator, its limit layers and command cells
//! 5. **JointLimiter**: channel-keyed clamping with two cycles of history
//!
//! ## RT Cycle
//!
//! `read` and `write` never block and never allocate on the joint path;
//! clamping is reported through return values and cycle counters only.

pub mod config;
pub mod control;
pub mod convert;
pub mod cycle;
pub mod error;
pub mod handle;
pub mod layer;
pub mod limiter;
pub mod robot;
pub mod sources;
pub mod switch;
