//! Controller start/stop → joint mode switching.
//!
//! Two-phase protocol run from the control plane, never from the RT cycle:
//!
//! 1. **prepare** validates a whole batch of controller starts/stops
//!    against every affected joint and records one [`SwitchRequest`] per
//!    joint. Any rejection aborts the batch before an actuator is touched.
//! 2. **commit** switches the recorded joints. A joint that fails takes its
//!    controller's whole joint set back to `NoMode`; failed controllers are
//!    handed to a [`StopRequester`] without waiting for the outcome.
//!
//! # Submodules
//!
//! - [`request`] - controller info and switch records
//! - [`coordinator`] - prepare/commit/rollback
//! - [`stop`] - fire-and-forget controller stop dispatch

pub mod coordinator;
pub mod request;
pub mod stop;

pub use coordinator::{CommitOutcome, ModeSwitchCoordinator};
pub use request::{ControllerInfo, SwitchRequest};
pub use stop::{
    AsyncStopDispatcher, ControllerRegistry, QueuedStopRegistry, RecordingStopper, RegistryError,
    StopRequester,
};
