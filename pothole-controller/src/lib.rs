//! Threaded runtime for the pothole survey rover.
//!
//! Runs the `pothole-core` drivers on OS threads:
//!
//! - [`location`]: GNSS tracking in the background ([`LocationProvider`])
//! - [`actuator`]: One consumer for every drive command ([`ActuatorTask`])
//! - [`control`]: Manual commands from the handset link
//! - [`controller`]: Startup and ordered shutdown ([`Controller`])
//! - [`port`]: Device files as serial channels ([`StreamPort`], [`open_first`])
//! - [`clock`]: std time sources ([`SystemClock`], [`StdDelay`])
//!
//! Peripherals that fail to open are logged and their capability is
//! disabled; the rest keeps running. Logging goes through the `log` facade;
//! the embedding process installs the logger.

pub mod actuator;
pub mod clock;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod location;
pub mod port;

pub use actuator::{ActuatorHandle, ActuatorTask};
pub use clock::{StdDelay, SystemClock};
pub use config::ControllerConfig;
pub use control::spawn_manual_control;
pub use controller::{BoxedPort, Controller, ControllerParts};
pub use error::ControllerError;
pub use location::{LocationHandle, LocationProvider};
pub use port::{open_device, open_first, StreamPort};
