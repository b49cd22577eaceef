//! NMEA 0183 sentence framing for GNSS receiver configuration.
//!
//! # Sentence Format
//!
//! ```text
//! $<body>*<checksum>\r\n
//! ```
//!
//! `checksum` is the XOR of every byte of `body`, as two uppercase hex digits.

use crate::fmt::SliceWriter;
use crate::serialize::SerializeError;
use core::fmt::Write;

/// Longest sentence the standard permits, `$` and CRLF included.
pub const MAX_SENTENCE_LEN: usize = 82;

/// Position fix update rate of 1 Hz.
pub const PMTK_SET_UPDATE_1HZ: &str = "PMTK220,1000";

/// Output only RMC and GGA sentences.
pub const PMTK_OUTPUT_RMC_GGA: &str = "PMTK314,0,1,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0";

/// Configuration issued once when the receiver stream is opened.
pub const RECEIVER_SETUP: [&str; 2] = [PMTK_OUTPUT_RMC_GGA, PMTK_SET_UPDATE_1HZ];

/// XOR checksum over a sentence body.
#[inline]
#[must_use]
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Frame `body` as a complete sentence into `buf`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`SerializeError::BufferTooSmall`] if `buf` cannot hold the sentence.
pub fn write_sentence(body: &str, buf: &mut [u8]) -> Result<usize, SerializeError> {
    let checksum = nmea_checksum(body.as_bytes());
    let mut w = SliceWriter::new(buf);
    write!(w, "${}*{:02X}\r\n", body, checksum).map_err(|_| SerializeError::BufferTooSmall)?;
    Ok(w.len())
}
