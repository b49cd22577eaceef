//! Camera capture signal.
//!
//! Fired once when an episode opens. The camera is an external subsystem;
//! this only raises the signal and never waits for an image.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::serial::{SerialError, SerialPort};

/// High time of the GPIO capture pulse.
pub const DEFAULT_PULSE: Duration = Duration::from_millis(100);

/// Command byte understood by the serial-attached camera.
pub const CAPTURE_COMMAND: u8 = b'c';

/// Error type for capture triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureError {
    /// The trigger line could not be driven.
    Pin,
    /// The camera link failed.
    Serial(SerialError),
}

impl From<SerialError> for CaptureError {
    fn from(err: SerialError) -> Self {
        Self::Serial(err)
    }
}

impl core::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pin => write!(f, "capture line error"),
            Self::Serial(e) => write!(f, "camera link: {}", e),
        }
    }
}

pub trait CaptureTrigger {
    /// Raise the capture signal. Returns once the signal has been sent.
    fn trigger_capture(&mut self) -> Result<(), CaptureError>;
}

impl<T: CaptureTrigger + ?Sized> CaptureTrigger for &mut T {
    #[inline]
    fn trigger_capture(&mut self) -> Result<(), CaptureError> {
        (**self).trigger_capture()
    }
}

#[cfg(feature = "std")]
impl<T: CaptureTrigger + ?Sized> CaptureTrigger for std::boxed::Box<T> {
    #[inline]
    fn trigger_capture(&mut self) -> Result<(), CaptureError> {
        (**self).trigger_capture()
    }
}

/// Drives a GPIO line high for a fixed pulse.
pub struct PulseTrigger<P, D> {
    pin: P,
    delay: D,
    pulse: Duration,
}

impl<P: OutputPin, D: DelayNs> PulseTrigger<P, D> {
    /// Take the line and park it low.
    pub fn new(mut pin: P, delay: D, pulse: Duration) -> Result<Self, CaptureError> {
        pin.set_low().map_err(|_| CaptureError::Pin)?;
        Ok(Self { pin, delay, pulse })
    }
}

impl<P: OutputPin, D: DelayNs> CaptureTrigger for PulseTrigger<P, D> {
    fn trigger_capture(&mut self) -> Result<(), CaptureError> {
        self.pin.set_high().map_err(|_| CaptureError::Pin)?;
        let pulse_us = u32::try_from(self.pulse.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(pulse_us);
        self.pin.set_low().map_err(|_| CaptureError::Pin)
    }
}

/// Sends [`CAPTURE_COMMAND`] over the camera's serial link.
pub struct SerialTrigger<P> {
    port: P,
}

impl<P: SerialPort> SerialTrigger<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

impl<P: SerialPort> CaptureTrigger for SerialTrigger<P> {
    fn trigger_capture(&mut self) -> Result<(), CaptureError> {
        self.port.write(&[CAPTURE_COMMAND])?;
        Ok(())
    }
}

/// For rovers without a camera.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl CaptureTrigger for NoCapture {
    fn trigger_capture(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::serial::mock::MockPort;
    use core::convert::Infallible;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingPin {
        levels: Vec<bool>,
    }

    impl embedded_hal::digital::ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.levels.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.levels.push(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn test_pulse_trigger() {
        let mut trigger =
            PulseTrigger::new(RecordingPin::default(), RecordingDelay::default(), DEFAULT_PULSE)
                .unwrap();
        trigger.trigger_capture().unwrap();

        assert_eq!(trigger.pin.levels, [false, true, false]);
        assert_eq!(trigger.delay.total_ns, 100_000_000);
    }

    #[test]
    fn test_serial_trigger() {
        let mut trigger = SerialTrigger::new(MockPort::default());
        trigger.trigger_capture().unwrap();
        assert_eq!(trigger.port.tx, b"c");
    }

    #[test]
    fn test_serial_trigger_error() {
        let mut trigger = SerialTrigger::new(MockPort {
            fail_writes: 1,
            ..MockPort::default()
        });
        assert_eq!(
            trigger.trigger_capture(),
            Err(CaptureError::Serial(SerialError::Io))
        );
    }
}
