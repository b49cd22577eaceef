use core::time::Duration;

use log::{debug, trace};
use pothole_proto::lidar::{DEFAULT_DISTANCE_DIVISOR, FRAME_LEN};
use pothole_proto::{baud_rate_command, LidarFrame, LidarFrameParser};

use super::{DistanceSensor, Reading};
use crate::serial::{SerialError, SerialPort};

/// Upper bound on bytes consumed while hunting for a frame on an unbuffered
/// channel: enough to pass one misaligned frame and complete the next.
pub const MAX_SYNC_BYTES: usize = 2 * FRAME_LEN;

enum Mode {
    /// The channel buffers input; only poll when a full frame is waiting.
    Buffered,
    /// The channel only delivers bytes while being read.
    Blocking { timeout: Duration },
}

/// TF02-style LiDAR on a serial channel.
///
/// Any nine bytes after the `0x59 0x59` marker count as a frame and only
/// the distance field is used. [`with_checksum`](Self::with_checksum)
/// rejects frames whose trailing sum does not match.
pub struct LidarSensor<P> {
    port: P,
    parser: LidarFrameParser,
    mode: Mode,
    divisor: f64,
    last_frame: Option<LidarFrame>,
}

impl<P: SerialPort> LidarSensor<P> {
    /// Sensor on a buffered channel (hardware UART, OS serial device).
    ///
    /// A poll returns [`Reading::NoReading`] immediately when fewer than
    /// [`FRAME_LEN`] bytes are waiting.
    pub fn buffered(port: P) -> Self {
        Self::with_mode(port, Mode::Buffered)
    }

    /// Sensor on a channel that cannot report pending input, such as
    /// [`BitBangSerial`](crate::BitBangSerial).
    ///
    /// A poll reads until a frame completes, [`MAX_SYNC_BYTES`] have been
    /// consumed, or `timeout` passes between bytes.
    pub fn bit_banged(port: P, timeout: Duration) -> Self {
        Self::with_mode(port, Mode::Blocking { timeout })
    }

    fn with_mode(port: P, mode: Mode) -> Self {
        Self {
            port,
            parser: LidarFrameParser::without_checksum(),
            mode,
            divisor: DEFAULT_DISTANCE_DIVISOR,
            last_frame: None,
        }
    }

    /// Scale raw distance counts by `divisor` instead of the default.
    #[must_use]
    pub fn with_divisor(mut self, divisor: f64) -> Self {
        self.divisor = divisor;
        self
    }

    /// Drop frames with a bad checksum.
    #[must_use]
    pub fn with_checksum(mut self) -> Self {
        self.parser = LidarFrameParser::new();
        self
    }

    /// Switch the sensor to a new baud rate. The channel itself must be
    /// reopened at the new rate afterwards.
    pub fn configure_baud(&mut self, baud: u16) -> Result<(), SerialError> {
        debug!("lidar: switching to {} baud", baud);
        self.port.write(&baud_rate_command(baud))
    }

    /// The last frame decoded, including strength and temperature.
    pub fn last_frame(&self) -> Option<LidarFrame> {
        self.last_frame
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    fn push(&mut self, byte: u8) -> Option<LidarFrame> {
        match self.parser.push_byte(byte) {
            Ok(frame) => frame,
            Err(e) => {
                trace!("lidar: {}", e);
                None
            }
        }
    }

    fn poll_buffered(&mut self) -> Option<LidarFrame> {
        let available = self.port.bytes_available();
        if available < FRAME_LEN {
            return None;
        }

        // Drain everything so the newest frame wins
        let mut latest = None;
        let mut byte = [0u8; 1];
        for _ in 0..available {
            if self.port.read(&mut byte, Duration::ZERO).is_err() {
                break;
            }
            if let Some(frame) = self.push(byte[0]) {
                latest = Some(frame);
            }
        }
        latest
    }

    fn poll_blocking(&mut self, timeout: Duration) -> Option<LidarFrame> {
        let mut byte = [0u8; 1];
        for _ in 0..MAX_SYNC_BYTES {
            if let Err(e) = self.port.read(&mut byte, timeout) {
                if self.parser.is_synchronized() {
                    debug!("lidar: frame cut short: {}", e);
                } else {
                    trace!("lidar: {}", e);
                }
                self.parser.reset();
                return None;
            }
            if let Some(frame) = self.push(byte[0]) {
                return Some(frame);
            }
        }
        None
    }
}

impl<P: SerialPort> DistanceSensor for LidarSensor<P> {
    fn poll(&mut self) -> Reading {
        let frame = match self.mode {
            Mode::Buffered => self.poll_buffered(),
            Mode::Blocking { timeout } => self.poll_blocking(timeout),
        };

        match frame {
            Some(frame) => {
                self.last_frame = Some(frame);
                Reading::from_cm(frame.distance_scaled(self.divisor))
            }
            None => Reading::NoReading,
        }
    }
}
