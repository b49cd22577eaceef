//! Wire formats and data model for the pothole survey rover.
//!
//! This crate holds everything that crosses a wire, with no hardware access:
//!
//! - **Types**: the shared data model
//!   - [`DefectEvent`] - A detected defect, ready to report
//!   - [`SeverityLevel`] - Depth classification, see [`classify()`]
//!   - [`LocationFix`] - Positioning snapshot
//!   - [`DriveCommand`] - Actuator intent
//!
//! - **Framing**: [`frame`] describes 8N1 characters for software UARTs
//!
//! - **Sensors and receivers**
//!   - [`lidar`] - TF02 telemetry frames and configuration commands
//!   - [`nmea`] - GNSS configuration sentences
//!
//! - **Reporting**
//!   - [`Serialize`] trait - JSON payload of a [`DefectEvent`]
//!   - [`at`] - Modem bearer and HTTP sessions
//!
//! - **Control**: [`decode_command()`] for the manual-control link
//!
//! # Example
//!
//! ```
//! use pothole_proto::{classify, DefectEvent, LocationFix, SeverityLevel, Serialize};
//!
//! let severity = classify(6.5);
//! assert_eq!(severity, SeverityLevel::Moderate);
//!
//! // No fix: coordinates go out as zero
//! let event = DefectEvent::new(&LocationFix::NONE, 6.5, 4.5, severity, 1000.0);
//! let mut buf = [0u8; pothole_proto::MAX_PAYLOAD_SIZE];
//! let len = event.serialize(&mut buf).unwrap();
//! assert!(buf[..len].starts_with(b"{\"latitude\":0,\"longitude\":0,"));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//! - **`heapless`**: Enable `serialize_to_vec()`
//! - **`embedded-io`**: Enable `serialize_io()` for I/O peripherals
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod at;
pub mod control;
mod fmt;
pub mod frame;
pub mod lidar;
pub mod nmea;
pub mod serialize;
pub mod types;

// Re-export types at crate root for convenience
pub use at::{bearer_setup_commands, http_post_session, AtCommand, SessionStep};
pub use control::decode_command;
pub use frame::FrameTiming;
pub use lidar::{baud_rate_command, FrameError, LidarFrame, LidarFrameParser};
pub use nmea::{nmea_checksum, write_sentence};
pub use serialize::{Serialize, SerializeError, MAX_PAYLOAD_SIZE};
pub use types::{classify, DefectEvent, DriveCommand, LocationFix, OverflowPolicy, SeverityLevel};
