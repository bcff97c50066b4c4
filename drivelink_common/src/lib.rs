//! drivelink Common Library
//!
//! Shared types for every crate of the drivelink workspace: the per-joint
//! limit model and its combination operators, drive modes, the actuator
//! contract and the collaborator contracts (machine description and
//! configuration store) that feed the limit model.
//!
//! # Module Structure
//!
//! - [`limits`] - `Limits` model, `merge`/`apply`, bound and soft-bound math
//! - [`mode`] - CiA-402 operation modes and command channels
//! - [`actuator`] - Actuator handle contract consumed by the control unit
//! - [`config`] - TOML configuration loading
//! - [`error`] - Limit parsing and actuator error types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use drivelink_common::prelude::*;
//!
//! let hw = Limits::new().with_position(-1.0, 1.0).with_velocity(2.0);
//! let cfg = Limits::new().with_velocity(1.5);
//! assert_eq!(hw.merge(&cfg).max_velocity(), Some(1.5));
//! ```

pub mod actuator;
pub mod config;
pub mod consts;
pub mod error;
pub mod limits;
pub mod mode;
pub mod prelude;
