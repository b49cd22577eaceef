//! Manual drive commands from a paired handset.

use core::time::Duration;

use log::{debug, trace};
use pothole_proto::{decode_command, DriveCommand};

use crate::serial::{SerialError, SerialPort};

/// Poll interval of the manual-control task.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(50);

/// Reads single-character commands off a serial link.
pub struct ManualControl<S> {
    port: S,
}

impl<S: SerialPort> ManualControl<S> {
    pub fn new(port: S) -> Self {
        Self { port }
    }

    /// Take one pending byte, if any, and decode it.
    ///
    /// Never blocks. Unknown bytes are consumed and ignored.
    pub fn poll(&mut self) -> Result<Option<DriveCommand>, SerialError> {
        if self.port.bytes_available() == 0 {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        match self.port.read(&mut byte, Duration::ZERO) {
            Ok(()) => {}
            Err(SerialError::Timeout) => return Ok(None),
            Err(e) => return Err(e),
        }

        let command = decode_command(byte[0]);
        match command {
            Some(cmd) => debug!("control: {:?}", cmd),
            None => trace!("control: ignoring 0x{:02X}", byte[0]),
        }
        Ok(command)
    }

    pub fn into_port(self) -> S {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::MockPort;

    #[test]
    fn test_idle_link() {
        let mut control = ManualControl::new(MockPort::default());
        assert_eq!(control.poll(), Ok(None));
    }

    #[test]
    fn test_one_command_per_poll() {
        let mut control = ManualControl::new(MockPort::with_rx(b"Fs"));
        assert_eq!(control.poll(), Ok(Some(DriveCommand::Forward)));
        assert_eq!(control.poll(), Ok(Some(DriveCommand::Stop)));
        assert_eq!(control.poll(), Ok(None));
    }

    #[test]
    fn test_unknown_bytes_are_consumed() {
        let mut control = ManualControl::new(MockPort::with_rx(b"x\nl"));
        assert_eq!(control.poll(), Ok(None));
        assert_eq!(control.poll(), Ok(None));
        assert_eq!(control.poll(), Ok(Some(DriveCommand::Left)));
        assert_eq!(control.into_port().bytes_available(), 0);
    }
}
