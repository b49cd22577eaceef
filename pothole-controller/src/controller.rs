//! Controller: starts every task and shuts them down in order.

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};
use pothole_core::{
    Actuator, CaptureTrigger, DetectionPipeline, DistanceSensor, DriveCommand, EventSink,
    LocationFix, LocationSource, PotholeDetector, RunFlag, SerialPort,
};

use crate::actuator::{ActuatorHandle, ActuatorTask};
use crate::clock::{StdDelay, SystemClock};
use crate::config::ControllerConfig;
use crate::control::spawn_manual_control;
use crate::error::{spawn_named, ControllerError};
use crate::location::{LocationHandle, LocationProvider};

/// Boxed serial link that can move to its own thread.
pub type BoxedPort = Box<dyn SerialPort + Send>;

/// Hardware handed to [`Controller::start`].
///
/// The sensor is required. A missing receiver or control link only
/// disables that capability.
pub struct ControllerParts<S, T, K, A> {
    pub sensor: S,
    pub capture: T,
    pub sink: K,
    pub actuator: A,
    pub gnss: Option<BoxedPort>,
    pub control: Option<BoxedPort>,
}

/// The running rover.
///
/// Three threads plus the actuator consumer: detection, manual control and
/// location tracking. All of them stop at their next loop boundary once
/// [`shutdown`](Self::shutdown) is called.
///
/// # Example
///
/// ```no_run
/// use pothole_controller::config::{CONTROL_PORT_CANDIDATES, MODEM_PORT_CANDIDATES};
/// use pothole_controller::port::open_first;
/// use pothole_controller::{BoxedPort, Controller, ControllerConfig, ControllerParts};
/// use pothole_controller::{StdDelay, SystemClock};
/// use pothole_core::{DriveCommand, NoCapture, Reading, ReportChannel, ReportConfig};
///
/// # struct Sensor;
/// # impl pothole_core::DistanceSensor for Sensor {
/// #     fn poll(&mut self) -> Reading { Reading::NoReading }
/// # }
/// # struct Motors;
/// # impl pothole_core::Actuator for Motors {
/// #     fn apply(&mut self, _: DriveCommand) -> Result<(), pothole_core::ActuatorError> { Ok(()) }
/// # }
/// let sink = match open_first(MODEM_PORT_CANDIDATES) {
///     Ok((_, modem)) => {
///         ReportChannel::open(modem, StdDelay, SystemClock::new(), ReportConfig::default())
///     }
///     Err(_) => ReportChannel::unavailable(StdDelay, SystemClock::new(), ReportConfig::default()),
/// };
/// let control = open_first(CONTROL_PORT_CANDIDATES)
///     .ok()
///     .map(|(_, port)| Box::new(port) as BoxedPort);
///
/// let parts = ControllerParts {
///     sensor: Sensor,
///     capture: NoCapture,
///     sink,
///     actuator: Motors,
///     gnss: None,
///     control,
/// };
/// let controller = Controller::start(parts, ControllerConfig::default())?;
/// // ... run until asked to stop ...
/// controller.shutdown();
/// # Ok::<(), pothole_controller::ControllerError>(())
/// ```
pub struct Controller {
    flag: Arc<RunFlag>,
    location: Option<LocationProvider>,
    location_handle: LocationHandle,
    detection: Option<JoinHandle<()>>,
    control: Option<JoinHandle<()>>,
    actuator: Option<ActuatorHandle>,
    actuator_task: Option<ActuatorTask>,
}

impl Controller {
    /// Start every task.
    ///
    /// # Errors
    ///
    /// Only a failure to start a thread aborts startup; tasks already
    /// started are stopped again.
    pub fn start<S, T, K, A>(
        parts: ControllerParts<S, T, K, A>,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError>
    where
        S: DistanceSensor + Send + 'static,
        T: CaptureTrigger + Send + 'static,
        K: EventSink + Send + 'static,
        A: Actuator + Send + 'static,
    {
        let flag = Arc::new(RunFlag::new());
        let (actuator, actuator_task) = ActuatorTask::spawn(parts.actuator)?;

        let mut controller = Self {
            flag: flag.clone(),
            location: None,
            location_handle: LocationHandle::detached(),
            detection: None,
            control: None,
            actuator: Some(actuator.clone()),
            actuator_task: Some(actuator_task),
        };

        match parts.gnss {
            Some(port) => {
                let provider = LocationProvider::spawn(port, SystemClock::new(), config.location)?;
                controller.location_handle = provider.handle();
                controller.location = Some(provider);
            }
            None => warn!("gnss: no receiver, defects will be reported without location"),
        }

        match parts.control {
            Some(port) => {
                controller.control = Some(spawn_manual_control(
                    port,
                    actuator,
                    flag.clone(),
                    config.control_poll,
                )?);
            }
            None => warn!("control: no link, manual control disabled"),
        }

        let location = controller.location_handle.clone();
        let (sensor, capture, sink) = (parts.sensor, parts.capture, parts.sink);
        controller.detection = Some(spawn_named("detection", move || {
            let mut pipeline = DetectionPipeline::new(
                sensor,
                location,
                capture,
                sink,
                SystemClock::new(),
                PotholeDetector::new(config.detector),
            );
            pipeline.run(&flag, &mut StdDelay, config.sample_period);
        })?);

        info!("controller: started");
        Ok(controller)
    }

    pub fn is_running(&self) -> bool {
        self.flag.is_running()
    }

    pub fn current_location(&self) -> LocationFix {
        self.location_handle.current_location()
    }

    /// A producer handle for the actuator channel. It is disconnected once
    /// the controller shuts down.
    pub fn actuator(&self) -> Option<ActuatorHandle> {
        self.actuator.clone()
    }

    /// Stop every task and bring the rover to a halt.
    pub fn shutdown(mut self) {
        self.stop_all();
    }

    fn stop_all(&mut self) {
        if self.actuator_task.is_none() {
            return;
        }
        info!("controller: shutting down");
        self.flag.stop();

        for thread in [self.detection.take(), self.control.take()].into_iter().flatten() {
            if thread.join().is_err() {
                warn!("controller: a task panicked");
            }
        }
        if let Some(mut location) = self.location.take() {
            location.stop();
        }

        if let Some(actuator) = self.actuator.take() {
            if let Err(e) = actuator.command(DriveCommand::Stop) {
                warn!("controller: stop command not delivered: {}", e);
            }
        }
        // Handles still held by callers are disconnected here
        if let Some(task) = self.actuator_task.take() {
            task.join();
        }
        info!("controller: stopped");
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop_all();
    }
}
