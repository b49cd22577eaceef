//! JSON serialization of defect reports.
//!
//! # Payload Format
//!
//! ```text
//! {"latitude":<n>,"longitude":<n>,"depth":<n>,"length":<n>,"width":<n>,"severity":"<level>","timestamp":<n>}
//! ```
//!
//! Numbers use the shortest decimal form that round-trips, without an
//! exponent. Non-finite values are written as `0` so the body is always
//! valid JSON.
//!
//! # Example
//!
//! ```
//! use pothole_proto::{DefectEvent, LocationFix, SeverityLevel, Serialize};
//!
//! let fix = LocationFix::new(12.34, 56.78, 0.0);
//! let event = DefectEvent::new(&fix, 6.5, 0.0, SeverityLevel::Moderate, 1000.0);
//!
//! let mut buf = [0u8; 256];
//! let len = event.serialize(&mut buf).unwrap();
//! assert!(buf[..len].starts_with(b"{\"latitude\":12.34,"));
//! ```

use core::fmt;

use crate::fmt::{CountingWriter, SliceWriter};
use crate::types::DefectEvent;

/// Buffer size that holds any report with realistic field values.
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Error type for serialization operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerializeError {
    /// The output buffer is too small to hold the serialized message.
    BufferTooSmall,
    /// A write operation failed (for I/O adapters).
    WriteError,
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::WriteError => write!(f, "write error"),
        }
    }
}

/// Extension trait for serializing report payloads.
pub trait Serialize {
    /// Serialize to the provided buffer.
    ///
    /// Returns the number of bytes written on success.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the buffer is not large enough.
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError>;

    /// Exact length of the serialized form.
    ///
    /// Needed up front because the modem wants the body length announced
    /// before the body.
    fn serialized_len(&self) -> usize;

    /// Serialize to a `heapless::Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if `N` is not large enough.
    #[cfg(feature = "heapless")]
    fn serialize_to_vec<const N: usize>(&self) -> Result<heapless::Vec<u8, N>, SerializeError> {
        let mut vec = heapless::Vec::new();
        vec.resize(N, 0)
            .map_err(|_| SerializeError::BufferTooSmall)?;
        let len = self.serialize(&mut vec)?;
        vec.truncate(len);
        Ok(vec)
    }

    /// Serialize to a `core::fmt::Write` implementation.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::WriteError`] if the write fails.
    fn serialize_fmt<W: fmt::Write>(&self, writer: &mut W) -> Result<(), SerializeError>;

    /// Serialize to an `embedded_io::Write` implementation.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::WriteError`] if the write fails.
    #[cfg(feature = "embedded-io")]
    fn serialize_io<W: embedded_io::Write>(&self, writer: &mut W) -> Result<(), SerializeError>;
}

/// JSON number: finite values as-is, anything else as `0`.
struct JsonNumber(f64);

impl fmt::Display for JsonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("0")
        }
    }
}

fn write_json<W: fmt::Write>(event: &DefectEvent, w: &mut W) -> fmt::Result {
    write!(
        w,
        "{{\"latitude\":{},\"longitude\":{},\"depth\":{},\"length\":{},\"width\":{},\"severity\":\"{}\",\"timestamp\":{}}}",
        JsonNumber(event.latitude()),
        JsonNumber(event.longitude()),
        JsonNumber(event.depth_cm()),
        JsonNumber(event.length_cm()),
        JsonNumber(event.width_cm()),
        event.severity().as_str(),
        JsonNumber(event.timestamp()),
    )
}

impl Serialize for DefectEvent {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = SliceWriter::new(buf);
        write_json(self, &mut w).map_err(|_| SerializeError::BufferTooSmall)?;
        Ok(w.len())
    }

    fn serialized_len(&self) -> usize {
        let mut counter = CountingWriter::default();
        // Counting never fails
        let _ = write_json(self, &mut counter);
        counter.count()
    }

    fn serialize_fmt<W: fmt::Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        write_json(self, writer).map_err(|_| SerializeError::WriteError)
    }

    #[cfg(feature = "embedded-io")]
    fn serialize_io<W: embedded_io::Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let len = self.serialize(&mut buf)?;
        writer
            .write_all(&buf[..len])
            .map_err(|_| SerializeError::WriteError)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::types::{LocationFix, SeverityLevel};
    use std::string::String;

    const MODERATE_AT_FIX: &str = "{\"latitude\":12.34,\"longitude\":56.78,\"depth\":6.5,\"length\":0,\"width\":0,\"severity\":\"Moderate\",\"timestamp\":1000}";

    fn moderate_event() -> DefectEvent {
        let fix = LocationFix::new(12.34, 56.78, 3.0);
        DefectEvent::new(&fix, 6.5, 0.0, SeverityLevel::Moderate, 1000.0)
    }

    #[test]
    fn test_serialize_event() {
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let len = moderate_event().serialize(&mut buf).unwrap();
        assert_eq!(core::str::from_utf8(&buf[..len]).unwrap(), MODERATE_AT_FIX);
    }

    #[test]
    fn test_serialized_len_matches() {
        let event = moderate_event();
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let len = event.serialize(&mut buf).unwrap();
        assert_eq!(event.serialized_len(), len);
        assert_eq!(len, MODERATE_AT_FIX.len());
    }

    #[test]
    fn test_serialize_fmt() {
        let mut s = String::new();
        moderate_event().serialize_fmt(&mut s).unwrap();
        assert_eq!(s, MODERATE_AT_FIX);
    }

    #[test]
    fn test_no_fix_writes_zero_coordinates() {
        let event = DefectEvent::new(
            &LocationFix::NONE,
            9.0,
            4.5,
            SeverityLevel::Critical,
            1700000000.25,
        );
        let mut s = String::new();
        event.serialize_fmt(&mut s).unwrap();
        assert_eq!(
            s,
            "{\"latitude\":0,\"longitude\":0,\"depth\":9,\"length\":4.5,\"width\":0,\"severity\":\"Critical\",\"timestamp\":1700000000.25}"
        );
    }

    #[test]
    fn test_non_finite_becomes_zero() {
        let event = DefectEvent::new(
            &LocationFix::NONE,
            f64::NAN,
            f64::INFINITY,
            SeverityLevel::Unknown,
            0.0,
        );
        let mut s = String::new();
        event.serialize_fmt(&mut s).unwrap();
        assert!(s.contains("\"depth\":0,\"length\":0,"));
        assert!(s.contains("\"severity\":\"Unknown\""));
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buf = [0u8; 32];
        assert_eq!(
            moderate_event().serialize(&mut buf),
            Err(SerializeError::BufferTooSmall)
        );
    }
}
