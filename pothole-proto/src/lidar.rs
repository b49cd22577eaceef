//! TF02-family LiDAR telemetry frames and configuration commands.
//!
//! # Frame Format
//!
//! ```text
//! 0x59 0x59 dist_lo dist_hi strength_lo strength_hi temp_lo temp_hi checksum
//! ```
//!
//! All multi-byte fields are little-endian. `checksum` is the low byte of the
//! sum of the eight preceding bytes.
//!
//! # Configuration Commands
//!
//! ```text
//! 0x5A len id payload... checksum
//! ```

/// Frame sync byte; every frame starts with two of these.
pub const FRAME_HEADER: u8 = 0x59;

/// Complete frame length in bytes.
pub const FRAME_LEN: usize = 9;

/// Raw distance counts per reported unit.
pub const DEFAULT_DISTANCE_DIVISOR: f64 = 100.0;

/// Configuration command header byte.
pub const COMMAND_HEADER: u8 = 0x5A;

/// Command id for changing the serial baud rate.
pub const COMMAND_SET_BAUD: u8 = 0x03;

/// One decoded telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LidarFrame {
    /// Raw distance counts.
    pub distance: u16,
    /// Return signal strength.
    pub strength: u16,
    /// Raw chip temperature.
    pub temperature: u16,
}

impl LidarFrame {
    /// Scaled distance.
    #[inline]
    #[must_use]
    pub fn distance_scaled(&self, divisor: f64) -> f64 {
        f64::from(self.distance) / divisor
    }

    /// Chip temperature in degrees Celsius.
    #[inline]
    #[must_use]
    pub fn temperature_c(&self) -> f64 {
        f64::from(self.temperature) / 8.0 - 256.0
    }

    /// Encode back to the wire format, checksum included.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let [d_lo, d_hi] = self.distance.to_le_bytes();
        let [s_lo, s_hi] = self.strength.to_le_bytes();
        let [t_lo, t_hi] = self.temperature.to_le_bytes();
        let mut frame = [
            FRAME_HEADER,
            FRAME_HEADER,
            d_lo,
            d_hi,
            s_lo,
            s_hi,
            t_lo,
            t_hi,
            0,
        ];
        frame[FRAME_LEN - 1] = sum_checksum(&frame[..FRAME_LEN - 1]);
        frame
    }
}

/// Frame decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Trailing checksum does not match the frame contents.
    Checksum,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Checksum => write!(f, "lidar frame checksum mismatch"),
        }
    }
}

/// Byte-fed frame synchronizer.
///
/// Bytes before a `0x59 0x59` marker are discarded, so the parser recovers
/// on its own after line noise or a partial frame.
pub struct LidarFrameParser {
    buffer: [u8; FRAME_LEN],
    pos: usize,
    verify_checksum: bool,
}

impl LidarFrameParser {
    /// Create a parser that rejects frames with a bad checksum.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; FRAME_LEN],
            pos: 0,
            verify_checksum: true,
        }
    }

    /// Create a parser that accepts any frame after the marker.
    #[must_use]
    pub const fn without_checksum() -> Self {
        Self {
            buffer: [0u8; FRAME_LEN],
            pos: 0,
            verify_checksum: false,
        }
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Whether the marker has been seen and a frame is being assembled.
    #[inline]
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.pos >= 2
    }

    /// Feed a byte to the parser.
    ///
    /// Returns `Ok(Some(frame))` when a complete frame was assembled.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<LidarFrame>, FrameError> {
        match self.pos {
            0 | 1 => {
                if byte == FRAME_HEADER {
                    self.buffer[self.pos] = byte;
                    self.pos += 1;
                } else {
                    self.pos = 0;
                }
                Ok(None)
            }
            _ => {
                self.buffer[self.pos] = byte;
                self.pos += 1;

                if self.pos < FRAME_LEN {
                    return Ok(None);
                }

                self.pos = 0;
                let expected = sum_checksum(&self.buffer[..FRAME_LEN - 1]);
                if self.verify_checksum && expected != self.buffer[FRAME_LEN - 1] {
                    return Err(FrameError::Checksum);
                }

                Ok(Some(LidarFrame {
                    distance: u16::from_le_bytes([self.buffer[2], self.buffer[3]]),
                    strength: u16::from_le_bytes([self.buffer[4], self.buffer[5]]),
                    temperature: u16::from_le_bytes([self.buffer[6], self.buffer[7]]),
                }))
            }
        }
    }
}

impl Default for LidarFrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the command that switches the sensor to a new baud rate.
///
/// Lowering the rate to 9600 makes a software UART usable:
/// `5A 06 03 80 25 08`.
#[must_use]
pub fn baud_rate_command(baud: u16) -> [u8; 6] {
    let [lo, hi] = baud.to_le_bytes();
    let mut cmd = [COMMAND_HEADER, 0x06, COMMAND_SET_BAUD, lo, hi, 0];
    cmd[5] = sum_checksum(&cmd[..5]);
    cmd
}

/// Low byte of the byte sum.
#[inline]
fn sum_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut LidarFrameParser, bytes: &[u8]) -> Option<Result<LidarFrame, FrameError>> {
        let mut last = None;
        for &b in bytes {
            match parser.push_byte(b) {
                Ok(Some(frame)) => last = Some(Ok(frame)),
                Err(e) => last = Some(Err(e)),
                Ok(None) => {}
            }
        }
        last
    }

    #[test]
    fn test_parse_frame() {
        let frame = LidarFrame {
            distance: 0x000A,
            strength: 1200,
            temperature: 2400,
        };
        let mut parser = LidarFrameParser::new();
        assert_eq!(feed(&mut parser, &frame.encode()), Some(Ok(frame)));
    }

    #[test]
    fn test_distance_little_endian() {
        let mut parser = LidarFrameParser::without_checksum();
        let bytes = [0x59, 0x59, 0x34, 0x12, 0, 0, 0, 0, 0];
        let frame = feed(&mut parser, &bytes).unwrap().unwrap();
        assert_eq!(frame.distance, 0x1234);
        assert_eq!(frame.distance_scaled(100.0), 46.6);
    }

    #[test]
    fn test_resyncs_after_noise() {
        let frame = LidarFrame {
            distance: 850,
            strength: 60,
            temperature: 2048,
        };
        let mut stream = [0u8; 4 + FRAME_LEN];
        stream[..4].copy_from_slice(&[0x12, 0x59, 0x00, 0xFF]);
        stream[4..].copy_from_slice(&frame.encode());

        let mut parser = LidarFrameParser::new();
        assert_eq!(feed(&mut parser, &stream), Some(Ok(frame)));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = LidarFrame {
            distance: 300,
            strength: 10,
            temperature: 0,
        }
        .encode();
        bytes[FRAME_LEN - 1] ^= 0xFF;

        let mut parser = LidarFrameParser::new();
        assert_eq!(feed(&mut parser, &bytes), Some(Err(FrameError::Checksum)));

        let mut lenient = LidarFrameParser::without_checksum();
        assert!(matches!(feed(&mut lenient, &bytes), Some(Ok(_))));
    }

    #[test]
    fn test_marker_only_is_incomplete() {
        let mut parser = LidarFrameParser::new();
        assert_eq!(feed(&mut parser, &[0x59, 0x59, 0x0A, 0x00]), None);
        assert!(parser.is_synchronized());
    }

    #[test]
    fn test_temperature() {
        let frame = LidarFrame {
            distance: 0,
            strength: 0,
            temperature: 2248,
        };
        assert_eq!(frame.temperature_c(), 25.0);
    }

    #[test]
    fn test_baud_rate_command_9600() {
        assert_eq!(baud_rate_command(9600), [0x5A, 0x06, 0x03, 0x80, 0x25, 0x08]);
    }
}
