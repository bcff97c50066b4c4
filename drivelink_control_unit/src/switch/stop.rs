//! Fire-and-forget controller stop requests.
//!
//! After a failed commit the coordinator asks the controller registry to
//! stop the failed controllers. The request must not block the control
//! plane and its outcome is only logged.
//!
//! - [`AsyncStopDispatcher`] hands the call to a tokio blocking task.
//! - [`QueuedStopRegistry`] is a registry that forwards stop requests over
//!   a channel to whoever drives the controller set (the cycle runner).
//! - [`RecordingStopper`] keeps every request in memory.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{error, info};

/// Controller registry failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry cannot be reached.
    #[error("controller registry unavailable: {0}")]
    Unavailable(String),

    /// The registry refused the request.
    #[error("controller registry rejected request: {0}")]
    Rejected(String),
}

/// The surrounding controller runtime.
pub trait ControllerRegistry: Send + Sync {
    /// Stop the named controllers.
    ///
    /// # Errors
    ///
    /// `RegistryError` when the request cannot be carried out.
    fn stop_controllers(&self, names: &[String]) -> Result<(), RegistryError>;
}

/// Outward stop request issued by the coordinator.
pub trait StopRequester: Send {
    /// Ask for `controllers` to be stopped. Must not block.
    fn request_stop(&self, controllers: Vec<String>);
}

/// Runs stop requests on a tokio runtime's blocking pool.
pub struct AsyncStopDispatcher {
    runtime: Handle,
    registry: Arc<dyn ControllerRegistry>,
}

impl AsyncStopDispatcher {
    /// Dispatch onto `runtime`.
    pub fn new(runtime: Handle, registry: Arc<dyn ControllerRegistry>) -> Self {
        Self { runtime, registry }
    }
}

impl StopRequester for AsyncStopDispatcher {
    fn request_stop(&self, controllers: Vec<String>) {
        if controllers.is_empty() {
            return;
        }
        let registry = Arc::clone(&self.registry);
        self.runtime.spawn_blocking(move || match registry.stop_controllers(&controllers) {
            Ok(()) => info!(?controllers, "failed controllers stopped"),
            Err(e) => error!(?controllers, error = %e, "stopping failed controllers did not succeed"),
        });
    }
}

/// Registry end of a stop-request channel.
#[derive(Clone)]
pub struct QueuedStopRegistry {
    tx: UnboundedSender<Vec<String>>,
}

impl QueuedStopRegistry {
    /// Registry plus the receiver its requests arrive on.
    pub fn channel() -> (Self, UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ControllerRegistry for QueuedStopRegistry {
    fn stop_controllers(&self, names: &[String]) -> Result<(), RegistryError> {
        self.tx
            .send(names.to_vec())
            .map_err(|_| RegistryError::Unavailable("stop queue closed".to_string()))
    }
}

/// Collects stop requests instead of dispatching them.
#[derive(Debug, Clone, Default)]
pub struct RecordingStopper {
    requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingStopper {
    /// Every request so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().clone()
    }
}

impl StopRequester for RecordingStopper {
    fn request_stop(&self, controllers: Vec<String>) {
        self.requests.lock().push(controllers);
    }
}
