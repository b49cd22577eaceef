//! Distance sensors.
//!
//! Both variants answer a poll with a [`Reading`] and never block past their
//! configured bound. Bad or missing data is [`Reading::NoReading`], not an
//! error.

mod echo;
mod lidar;

pub use echo::{EchoConfig, EchoSensor, SPEED_OF_SOUND_CM_PER_S};
pub use lidar::{LidarSensor, MAX_SYNC_BYTES};

/// Result of one sensor poll.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    /// Distance in centimeters, always positive.
    Distance(f64),
    NoReading,
}

impl Reading {
    /// Wrap a raw measurement. Zero, negative and non-finite values are not
    /// measurements.
    #[inline]
    #[must_use]
    pub fn from_cm(cm: f64) -> Self {
        if cm.is_finite() && cm > 0.0 {
            Self::Distance(cm)
        } else {
            Self::NoReading
        }
    }

    #[inline]
    #[must_use]
    pub fn distance(self) -> Option<f64> {
        match self {
            Self::Distance(cm) => Some(cm),
            Self::NoReading => None,
        }
    }
}

/// A source of single-shot distance readings.
pub trait DistanceSensor {
    /// Take one reading.
    fn poll(&mut self) -> Reading;
}

impl<T: DistanceSensor + ?Sized> DistanceSensor for &mut T {
    #[inline]
    fn poll(&mut self) -> Reading {
        (**self).poll()
    }
}

#[cfg(feature = "std")]
impl<T: DistanceSensor + ?Sized> DistanceSensor for std::boxed::Box<T> {
    #[inline]
    fn poll(&mut self) -> Reading {
        (**self).poll()
    }
}
