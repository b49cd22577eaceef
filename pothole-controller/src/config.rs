//! Controller configuration and device defaults.

use std::time::Duration;

use pothole_core::control::DEFAULT_POLL_PERIOD;
use pothole_core::detector::DEFAULT_SAMPLE_PERIOD;
use pothole_core::{DetectorConfig, LocationConfig};

/// Manual-control link candidates, tried in order (HC-05 UART first).
pub const CONTROL_PORT_CANDIDATES: &[&str] =
    &["/dev/ttyAMA1", "/dev/ttyAMA2", "/dev/rfcomm0", "/dev/ttyS0"];

/// Cellular modem UART.
pub const MODEM_PORT_CANDIDATES: &[&str] = &["/dev/ttyAMA0"];

/// TF02 LiDAR UART.
pub const LIDAR_PORT_CANDIDATES: &[&str] = &["/dev/ttyS0"];

/// Runtime parameters. Override fields on top of [`Default`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub sample_period: Duration,
    pub control_poll: Duration,
    pub detector: DetectorConfig,
    pub location: LocationConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_period: DEFAULT_SAMPLE_PERIOD,
            control_poll: DEFAULT_POLL_PERIOD,
            detector: DetectorConfig::default(),
            location: LocationConfig::default(),
        }
    }
}
