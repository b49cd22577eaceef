//! Manual-control thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};
use pothole_core::{ActuatorError, ManualControl, RunFlag, SerialError, SerialPort};

use crate::actuator::ActuatorHandle;
use crate::error::{spawn_named, ControllerError};

/// Poll `port` every `period` and forward decoded commands to the
/// actuator until `flag` is cleared.
///
/// At most one command is taken per poll.
pub fn spawn_manual_control<P>(
    port: P,
    actuator: ActuatorHandle,
    flag: Arc<RunFlag>,
    period: Duration,
) -> Result<JoinHandle<()>, ControllerError>
where
    P: SerialPort + Send + 'static,
{
    spawn_named("manual-control", move || {
        let mut control = ManualControl::new(port);
        info!("control: listening");
        while flag.is_running() {
            match control.poll() {
                Ok(Some(command)) => {
                    if let Err(ActuatorError::Disconnected) = actuator.command(command) {
                        warn!("control: actuator gone");
                        break;
                    }
                }
                Ok(None) => {}
                Err(SerialError::TransportUnavailable) => {
                    warn!("control: link lost, manual control disabled");
                    break;
                }
                Err(e) => warn!("control: read failed: {}", e),
            }
            std::thread::sleep(period);
        }
        info!("control: stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mock::RecordingActuator;
    use crate::actuator::ActuatorTask;
    use crate::port::mock::ScriptPort;
    use pothole_core::DriveCommand;
    use std::time::Instant;

    #[test]
    fn test_commands_reach_actuator() {
        let recorder = RecordingActuator::default();
        let (handle, task) = ActuatorTask::spawn(recorder.clone()).unwrap();
        let flag = Arc::new(RunFlag::new());

        let thread = spawn_manual_control(
            ScriptPort::new(b"fxB\n"),
            handle.clone(),
            flag.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        let start = Instant::now();
        while recorder.snapshot().len() < 2 && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(5));
        }
        flag.stop();
        thread.join().unwrap();
        drop(handle);
        task.join();

        assert_eq!(
            recorder.snapshot(),
            [DriveCommand::Forward, DriveCommand::Backward, DriveCommand::Stop]
        );
    }

    #[test]
    fn test_stops_on_flag_with_idle_link() {
        let recorder = RecordingActuator::default();
        let (handle, task) = ActuatorTask::spawn(recorder.clone()).unwrap();
        let flag = Arc::new(RunFlag::new());

        let thread = spawn_manual_control(
            ScriptPort::new(b""),
            handle.clone(),
            flag.clone(),
            Duration::from_millis(1),
        )
        .unwrap();
        flag.stop();
        thread.join().unwrap();
        drop(handle);
        task.join();

        assert_eq!(recorder.snapshot(), [DriveCommand::Stop]);
    }
}
