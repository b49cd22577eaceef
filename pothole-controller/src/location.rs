//! Background GNSS tracking thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};
use pothole_core::{
    configure_receiver, Clock, LocationCell, LocationConfig, LocationFix, LocationSource,
    NmeaTracker, RunFlag, SerialError, SerialPort,
};

use crate::error::{spawn_named, ControllerError};

/// Cheap, cloneable read side of a [`LocationProvider`].
#[derive(Clone, Default)]
pub struct LocationHandle {
    cell: Arc<LocationCell>,
}

impl LocationHandle {
    /// A handle nothing ever writes to. Reads report no fix.
    pub fn detached() -> Self {
        Self::default()
    }
}

impl LocationSource for LocationHandle {
    fn current_location(&self) -> LocationFix {
        self.cell.snapshot()
    }
}

/// Owns the receiver and a thread that keeps the shared fix current.
pub struct LocationProvider {
    handle: LocationHandle,
    flag: Arc<RunFlag>,
    thread: Option<JoinHandle<()>>,
}

impl LocationProvider {
    /// Configure the receiver (if enabled) and start tracking.
    pub fn spawn<P, C>(
        mut port: P,
        clock: C,
        config: LocationConfig,
    ) -> Result<Self, ControllerError>
    where
        P: SerialPort + Send + 'static,
        C: Clock + Send + 'static,
    {
        let handle = LocationHandle::detached();
        let flag = Arc::new(RunFlag::new());

        let cell = handle.cell.clone();
        let running = flag.clone();
        let thread = spawn_named("location", move || {
            if config.configure_receiver {
                if let Err(e) = configure_receiver(&mut port) {
                    warn!("gnss: receiver configuration failed: {}", e);
                }
            }
            info!("gnss: tracking started");

            let mut tracker = NmeaTracker::new();
            while running.is_running() {
                match tracker.run_cycle(&mut port, &clock, &cell, config.cycle_timeout) {
                    Ok(_) => {}
                    Err(SerialError::TransportUnavailable) => {
                        warn!("gnss: receiver gone, tracking stopped");
                        break;
                    }
                    // Keep a failing line from spinning
                    Err(_) => std::thread::sleep(config.cycle_timeout),
                }
            }
            info!("gnss: tracking stopped");
        })?;

        Ok(Self {
            handle,
            flag,
            thread: Some(thread),
        })
    }

    /// Non-blocking snapshot of the latest fix.
    pub fn current_location(&self) -> LocationFix {
        self.handle.current_location()
    }

    pub fn handle(&self) -> LocationHandle {
        self.handle.clone()
    }

    /// Stop tracking. When this returns the fix no longer changes.
    ///
    /// Waits at most one update cycle.
    pub fn stop(&mut self) {
        self.flag.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("gnss: tracking thread panicked");
            }
        }
    }
}

impl Drop for LocationProvider {
    fn drop(&mut self) {
        self.stop();
    }
}
