//! Hardware-agnostic drivers and the detection state machine for the
//! pothole survey rover.
//!
//! Everything here talks to hardware through `embedded-hal` 1.0 traits and
//! the crate's own [`SerialPort`] and [`Clock`], so the same code runs on
//! a microcontroller and in host tests.
//!
//! # Overview
//!
//! - [`serial`]: Byte channel trait ([`SerialPort`])
//! - [`bitbang`]: Software UART over two GPIO lines ([`BitBangSerial`])
//! - [`sensor`]: Distance sensors ([`LidarSensor`], [`EchoSensor`])
//! - [`location`]: GNSS tracking and the shared [`LocationCell`]
//! - [`detector`]: Episode state machine ([`PotholeDetector`])
//! - [`capture`]: Camera capture signal ([`CaptureTrigger`])
//! - [`report`]: Cellular delivery of defects ([`ReportChannel`])
//! - [`actuator`]: Drive output ([`HBridgeDrive`])
//! - [`control`]: Manual commands ([`ManualControl`])
//! - [`pipeline`]: Sensor to report flow ([`DetectionPipeline`])
//!
//! # Example
//!
//! ```rust
//! use pothole_core::{PotholeDetector, Transition};
//!
//! let mut detector = PotholeDetector::default();
//! let mut closed = None;
//! for (i, depth) in [2.0, 6.0, 9.0, 2.0].into_iter().enumerate() {
//!     if let Transition::Closed(episode) = detector.update(depth, i as u64 * 50_000_000) {
//!         closed = Some(episode);
//!     }
//! }
//! assert_eq!(closed.map(|e| e.max_depth_cm), Some(9.0));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host use and testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//! - **`heapless`**: Forward `serialize_to_vec()` from `pothole-proto`
//!
//! The [`LocationCell`] lock uses `critical-section`; the final binary must
//! link an implementation (`critical-section/std` on hosts).

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod actuator;
pub mod bitbang;
pub mod capture;
pub mod control;
pub mod detector;
pub mod location;
pub mod pipeline;
pub mod report;
pub mod sensor;
pub mod serial;
pub mod shutdown;
pub mod time;

// Re-export main types at crate root
pub use actuator::{direction_levels, Actuator, ActuatorError, HBridgeDrive};
pub use bitbang::BitBangSerial;
pub use capture::{CaptureError, CaptureTrigger, NoCapture, PulseTrigger, SerialTrigger};
pub use control::ManualControl;
pub use detector::{DetectionState, DetectorConfig, Episode, PotholeDetector, Transition};
pub use location::{
    configure_receiver, FixUpdate, LocationCell, LocationConfig, LocationSource, NmeaTracker,
};
pub use pipeline::{DetectionPipeline, Step};
pub use report::{
    EventSink, ReportChannel, ReportConfig, ReportError, RetryPolicy, RetryQueue,
};
pub use sensor::{DistanceSensor, EchoConfig, EchoSensor, LidarSensor, Reading};
pub use serial::{SerialError, SerialPort, SerialWriter};
pub use shutdown::RunFlag;
pub use time::Clock;

pub use pothole_proto::{DefectEvent, DriveCommand, LocationFix, OverflowPolicy, SeverityLevel};
