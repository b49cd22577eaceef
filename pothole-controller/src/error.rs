//! Controller error type.

use pothole_core::{ActuatorError, SerialError};

/// Error type for controller startup and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// None of the candidate devices for a peripheral could be opened.
    TransportUnavailable,
    /// An OS thread could not be started.
    Spawn,
    Serial(SerialError),
    Actuator(ActuatorError),
}

impl From<SerialError> for ControllerError {
    fn from(err: SerialError) -> Self {
        Self::Serial(err)
    }
}

impl From<ActuatorError> for ControllerError {
    fn from(err: ActuatorError) -> Self {
        Self::Actuator(err)
    }
}

impl core::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TransportUnavailable => write!(f, "no usable transport"),
            Self::Spawn => write!(f, "failed to start thread"),
            Self::Serial(e) => write!(f, "serial: {}", e),
            Self::Actuator(e) => write!(f, "actuator: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

/// Start a named OS thread.
pub(crate) fn spawn_named<F>(
    name: &str,
    f: F,
) -> Result<std::thread::JoinHandle<()>, ControllerError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|e| {
            log::error!("failed to start {} thread: {}", name, e);
            ControllerError::Spawn
        })
}
