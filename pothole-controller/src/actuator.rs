//! Single-consumer actuator task.
//!
//! Every drive intent goes through one channel and is applied by one
//! thread, in arrival order. The last command received wins. Joining the
//! task ends it even while producers still hold handles; their later
//! commands fail with [`ActuatorError::Disconnected`].

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use log::{debug, info, warn};
use pothole_core::{Actuator, ActuatorError, DriveCommand};

use crate::error::{spawn_named, ControllerError};

enum ActuatorMsg {
    Command(DriveCommand),
    Shutdown,
}

/// Sending side of the actuator channel. Clone one per producer.
#[derive(Clone)]
pub struct ActuatorHandle {
    tx: Sender<ActuatorMsg>,
}

impl ActuatorHandle {
    /// Queue a command. Never blocks.
    pub fn command(&self, command: DriveCommand) -> Result<(), ActuatorError> {
        self.tx
            .send(ActuatorMsg::Command(command))
            .map_err(|_| ActuatorError::Disconnected)
    }
}

impl Actuator for ActuatorHandle {
    fn apply(&mut self, command: DriveCommand) -> Result<(), ActuatorError> {
        self.command(command)
    }
}

/// The thread that owns the actuator.
pub struct ActuatorTask {
    tx: Sender<ActuatorMsg>,
    thread: JoinHandle<()>,
}

impl ActuatorTask {
    /// Move `actuator` onto its own thread.
    ///
    /// The thread runs until [`join`](Self::join) is called or every sender
    /// is gone, then applies [`DriveCommand::Stop`] as its last action.
    pub fn spawn<A>(mut actuator: A) -> Result<(ActuatorHandle, Self), ControllerError>
    where
        A: Actuator + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<ActuatorMsg>();
        let thread = spawn_named("actuator", move || {
            for msg in rx {
                let ActuatorMsg::Command(command) = msg else {
                    break;
                };
                debug!("actuator: {:?}", command);
                if let Err(e) = actuator.apply(command) {
                    warn!("actuator: {:?} failed: {}", command, e);
                }
            }
            match actuator.apply(DriveCommand::Stop) {
                Ok(()) => info!("actuator: stopped"),
                Err(e) => warn!("actuator: final stop failed: {}", e),
            }
        })?;
        let handle = ActuatorHandle { tx: tx.clone() };
        Ok((handle, Self { tx, thread }))
    }

    /// Apply the commands already queued, stop, and wait for the thread.
    pub fn join(self) {
        if self.tx.send(ActuatorMsg::Shutdown).is_err() {
            debug!("actuator: thread already gone");
        }
        if self.thread.join().is_err() {
            warn!("actuator: thread panicked");
        }
    }
}
