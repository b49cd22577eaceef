//! Shared data model: severity bands, location fixes, defect events and drive commands.

use core::fmt;

/// Lower bound of the minor band, in centimeters (inclusive).
pub const MINOR_MIN_CM: f64 = 1.0;

/// Lower bound of the moderate band, in centimeters (inclusive).
pub const MODERATE_MIN_CM: f64 = 3.0;

/// Lower bound of the critical band, in centimeters (inclusive).
pub const CRITICAL_MIN_CM: f64 = 7.0;

/// Upper bound of the critical band, in centimeters (exclusive).
pub const CRITICAL_MAX_CM: f64 = 100.0;

/// How depths at or above [`CRITICAL_MAX_CM`] are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Out-of-band depths are reported as [`SeverityLevel::Unknown`].
    #[default]
    Unknown,
    /// The critical band is unbounded above.
    Critical,
}

/// Severity classification of a detected defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SeverityLevel {
    /// `[1, 3)` cm
    Minor,
    /// `[3, 7)` cm
    Moderate,
    /// `[7, 100)` cm, or unbounded with [`OverflowPolicy::Critical`]
    Critical,
    /// Anything outside the bands, including NaN.
    Unknown,
}

impl SeverityLevel {
    /// Classify a depth using half-open bands.
    ///
    /// Total over `f64`: every value, NaN included, maps to exactly one level.
    /// Boundary values belong to the band whose lower bound they equal.
    #[must_use]
    pub fn classify(depth_cm: f64, policy: OverflowPolicy) -> Self {
        if (MINOR_MIN_CM..MODERATE_MIN_CM).contains(&depth_cm) {
            Self::Minor
        } else if (MODERATE_MIN_CM..CRITICAL_MIN_CM).contains(&depth_cm) {
            Self::Moderate
        } else if (CRITICAL_MIN_CM..CRITICAL_MAX_CM).contains(&depth_cm) {
            Self::Critical
        } else if depth_cm >= CRITICAL_MAX_CM && policy == OverflowPolicy::Critical {
            Self::Critical
        } else {
            Self::Unknown
        }
    }

    /// Name used in the report payload.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify with the default [`OverflowPolicy`].
#[inline]
#[must_use]
pub fn classify(depth_cm: f64) -> SeverityLevel {
    SeverityLevel::classify(depth_cm, OverflowPolicy::default())
}

/// Most recent positioning solution.
///
/// Coordinates are sticky: when the receiver loses its fix only `has_fix`
/// changes, so the last known position stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocationFix {
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
    /// Meters above mean sea level.
    pub altitude_m: f64,
    /// Whether the coordinates come from a current fix.
    pub has_fix: bool,
}

impl LocationFix {
    /// No fix has ever been seen.
    pub const NONE: Self = Self {
        latitude: 0.0,
        longitude: 0.0,
        altitude_m: 0.0,
        has_fix: false,
    };

    /// A current fix.
    #[inline]
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, altitude_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m,
            has_fix: true,
        }
    }

    /// The same coordinates, flagged stale.
    #[inline]
    #[must_use]
    pub const fn lost(self) -> Self {
        Self {
            has_fix: false,
            ..self
        }
    }
}

/// A detected road-surface defect, ready to be reported.
///
/// Immutable once built. Fields are only reachable through accessors so the
/// "no fix means zero coordinates" rule cannot be bypassed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DefectEvent {
    latitude: f64,
    longitude: f64,
    location_known: bool,
    depth_cm: f64,
    length_cm: f64,
    width_cm: f64,
    severity: SeverityLevel,
    timestamp: f64,
}

impl DefectEvent {
    /// Build an event from an episode summary and a location snapshot.
    ///
    /// Width is always zero: no width estimation happens on board.
    #[must_use]
    pub fn new(
        fix: &LocationFix,
        depth_cm: f64,
        length_cm: f64,
        severity: SeverityLevel,
        timestamp: f64,
    ) -> Self {
        let (latitude, longitude) = if fix.has_fix {
            (fix.latitude, fix.longitude)
        } else {
            (0.0, 0.0)
        };

        Self {
            latitude,
            longitude,
            location_known: fix.has_fix,
            depth_cm,
            length_cm,
            width_cm: 0.0,
            severity,
            timestamp,
        }
    }

    #[inline]
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// `false` when no fix existed at construction; coordinates are then `0.0`.
    #[inline]
    #[must_use]
    pub const fn location_known(&self) -> bool {
        self.location_known
    }

    /// Maximum depth sampled during the episode.
    #[inline]
    #[must_use]
    pub const fn depth_cm(&self) -> f64 {
        self.depth_cm
    }

    /// Estimated from episode duration and the assumed ground speed.
    #[inline]
    #[must_use]
    pub const fn length_cm(&self) -> f64 {
        self.length_cm
    }

    #[inline]
    #[must_use]
    pub const fn width_cm(&self) -> f64 {
        self.width_cm
    }

    #[inline]
    #[must_use]
    pub const fn severity(&self) -> SeverityLevel {
        self.severity
    }

    /// Seconds since the Unix epoch.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// Actuator intent shared by the manual-control link and the shutdown path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_bands() {
        assert_eq!(classify(1.0), SeverityLevel::Minor);
        assert_eq!(classify(2.99), SeverityLevel::Minor);
        assert_eq!(classify(3.0), SeverityLevel::Moderate);
        assert_eq!(classify(6.5), SeverityLevel::Moderate);
        assert_eq!(classify(7.0), SeverityLevel::Critical);
        assert_eq!(classify(99.9), SeverityLevel::Critical);
    }

    #[test]
    fn test_classify_out_of_band() {
        assert_eq!(classify(0.0), SeverityLevel::Unknown);
        assert_eq!(classify(0.99), SeverityLevel::Unknown);
        assert_eq!(classify(-4.0), SeverityLevel::Unknown);
        assert_eq!(classify(f64::NAN), SeverityLevel::Unknown);
        assert_eq!(classify(100.0), SeverityLevel::Unknown);
        assert_eq!(classify(f64::INFINITY), SeverityLevel::Unknown);
    }

    #[test]
    fn test_classify_overflow_policy() {
        let policy = OverflowPolicy::Critical;
        assert_eq!(SeverityLevel::classify(100.0, policy), SeverityLevel::Critical);
        assert_eq!(SeverityLevel::classify(150.0, policy), SeverityLevel::Critical);
        // Only the top end is affected
        assert_eq!(SeverityLevel::classify(0.5, policy), SeverityLevel::Unknown);
        assert_eq!(SeverityLevel::classify(f64::NAN, policy), SeverityLevel::Unknown);
    }

    #[test]
    fn test_classify_is_total_over_a_sweep() {
        let mut depth = -10.0;
        while depth < 210.0 {
            let level = classify(depth);
            let expected = if (1.0..3.0).contains(&depth) {
                SeverityLevel::Minor
            } else if (3.0..7.0).contains(&depth) {
                SeverityLevel::Moderate
            } else if (7.0..100.0).contains(&depth) {
                SeverityLevel::Critical
            } else {
                SeverityLevel::Unknown
            };
            assert_eq!(level, expected, "depth {}", depth);
            depth += 0.25;
        }
    }

    #[test]
    fn test_event_without_fix_zeroes_coordinates() {
        let stale = LocationFix::new(12.34, 56.78, 10.0).lost();
        let event = DefectEvent::new(&stale, 6.5, 4.5, SeverityLevel::Moderate, 1000.0);
        assert_eq!(event.latitude(), 0.0);
        assert_eq!(event.longitude(), 0.0);
        assert!(!event.location_known());
        assert_eq!(event.width_cm(), 0.0);
    }

    #[test]
    fn test_event_with_fix_keeps_coordinates() {
        let fix = LocationFix::new(12.34, 56.78, 10.0);
        let event = DefectEvent::new(&fix, 6.5, 4.5, SeverityLevel::Moderate, 1000.0);
        assert_eq!(event.latitude(), 12.34);
        assert_eq!(event.longitude(), 56.78);
        assert!(event.location_known());
        assert_eq!(event.depth_cm(), 6.5);
        assert_eq!(event.length_cm(), 4.5);
    }

    #[test]
    fn test_lost_fix_is_sticky() {
        let fix = LocationFix::new(1.0, 2.0, 3.0).lost();
        assert!(!fix.has_fix);
        assert_eq!(fix.latitude, 1.0);
        assert_eq!(fix.longitude, 2.0);
        assert_eq!(LocationFix::default(), LocationFix::NONE);
    }
}
