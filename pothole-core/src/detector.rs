//! Pothole detection state machine.
//!
//! The detector sees one depth sample at a time:
//!
//! ```text
//!            d > threshold                 d < threshold
//!   Idle ──────────────────▶ InDefect ─────────────────────▶ Idle (+ debounce)
//!     ▲                        │  ▲                              │
//!     └── d <= threshold       └──┘ d >= threshold: track max    └─▶ Episode
//! ```
//!
//! Samples outside the plausible range are dropped without touching the
//! state. After an episode closes, entries are suppressed for the debounce
//! period so the trailing edge of the same feature does not re-trigger.

use core::time::Duration;

use log::{debug, trace};
use pothole_proto::{DefectEvent, LocationFix, OverflowPolicy, SeverityLevel};

use crate::time::duration_ns;

/// Depth above which a sample counts as part of a defect.
pub const DEFAULT_THRESHOLD_CM: f64 = 5.0;

/// Plausible sample range; anything outside is sensor noise.
pub const PLAUSIBLE_MIN_CM: f64 = 0.0;
pub const PLAUSIBLE_MAX_CM: f64 = 200.0;

/// Static calibration of the rover's ground speed.
pub const DEFAULT_ASSUMED_SPEED_CM_PER_S: f64 = 30.0;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Target sampling cadence (20 Hz).
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(50);

/// Detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub threshold_cm: f64,
    pub plausible_min_cm: f64,
    pub plausible_max_cm: f64,
    pub assumed_speed_cm_per_s: f64,
    pub debounce: Duration,
    /// Episodes shorter than this are discarded. Zero reports every
    /// episode, single-sample spikes included.
    pub min_episode: Duration,
    pub overflow: OverflowPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_cm: DEFAULT_THRESHOLD_CM,
            plausible_min_cm: PLAUSIBLE_MIN_CM,
            plausible_max_cm: PLAUSIBLE_MAX_CM,
            assumed_speed_cm_per_s: DEFAULT_ASSUMED_SPEED_CM_PER_S,
            debounce: DEFAULT_DEBOUNCE,
            min_episode: Duration::ZERO,
            overflow: OverflowPolicy::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectionState {
    Idle,
    InDefect {
        start_ns: u64,
        max_depth_cm: f64,
        samples: u32,
    },
}

/// Summary of a closed episode.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Episode {
    pub duration_s: f64,
    pub max_depth_cm: f64,
    /// `duration_s` times the assumed ground speed.
    pub length_cm: f64,
    pub severity: SeverityLevel,
    /// Samples between entry and exit, both included.
    pub samples: u32,
}

impl Episode {
    /// Geotag and timestamp the episode.
    #[must_use]
    pub fn into_event(self, fix: &LocationFix, timestamp: f64) -> DefectEvent {
        DefectEvent::new(
            fix,
            self.max_depth_cm,
            self.length_cm,
            self.severity,
            timestamp,
        )
    }
}

/// What a sample did to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Idle and staying idle.
    None,
    /// Outside the plausible range; ignored.
    Rejected,
    /// Inside the post-episode debounce window; ignored.
    Debounced,
    /// Idle to InDefect. The capture signal fires here.
    Entered,
    /// Still InDefect.
    Updated,
    /// InDefect to Idle with an episode to report.
    Closed(Episode),
    /// InDefect to Idle, but shorter than the minimum episode.
    Discarded(Episode),
}

pub struct PotholeDetector {
    config: DetectorConfig,
    state: DetectionState,
    debounce_until_ns: Option<u64>,
}

impl PotholeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectionState::Idle,
            debounce_until_ns: None,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Evaluate one sample taken at `now_ns`.
    pub fn update(&mut self, depth_cm: f64, now_ns: u64) -> Transition {
        let plausible = self.config.plausible_min_cm..=self.config.plausible_max_cm;
        if !plausible.contains(&depth_cm) {
            trace!("detector: rejected sample {}", depth_cm);
            return Transition::Rejected;
        }

        match self.state {
            DetectionState::Idle => {
                if let Some(until) = self.debounce_until_ns {
                    if now_ns < until {
                        return Transition::Debounced;
                    }
                    self.debounce_until_ns = None;
                }

                if depth_cm > self.config.threshold_cm {
                    debug!("detector: entered defect at {} cm", depth_cm);
                    self.state = DetectionState::InDefect {
                        start_ns: now_ns,
                        max_depth_cm: depth_cm,
                        samples: 1,
                    };
                    Transition::Entered
                } else {
                    Transition::None
                }
            }
            DetectionState::InDefect {
                start_ns,
                max_depth_cm,
                samples,
            } => {
                let max_depth_cm = max_depth_cm.max(depth_cm);
                let samples = samples + 1;

                if depth_cm >= self.config.threshold_cm {
                    self.state = DetectionState::InDefect {
                        start_ns,
                        max_depth_cm,
                        samples,
                    };
                    return Transition::Updated;
                }

                self.state = DetectionState::Idle;
                let debounce_ns = duration_ns(self.config.debounce);
                self.debounce_until_ns = Some(now_ns.saturating_add(debounce_ns));

                let episode = self.close(start_ns, now_ns, max_depth_cm, samples);
                if episode.duration_s < self.config.min_episode.as_secs_f64() {
                    debug!("detector: discarded {} s episode", episode.duration_s);
                    Transition::Discarded(episode)
                } else {
                    debug!(
                        "detector: episode closed, depth {} cm, length {} cm, {}",
                        episode.max_depth_cm, episode.length_cm, episode.severity
                    );
                    Transition::Closed(episode)
                }
            }
        }
    }

    fn close(&self, start_ns: u64, end_ns: u64, max_depth_cm: f64, samples: u32) -> Episode {
        let duration_s = end_ns.saturating_sub(start_ns) as f64 / 1e9;
        Episode {
            duration_s,
            max_depth_cm,
            length_cm: duration_s * self.config.assumed_speed_cm_per_s,
            severity: SeverityLevel::classify(max_depth_cm, self.config.overflow),
            samples,
        }
    }
}

impl Default for PotholeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
