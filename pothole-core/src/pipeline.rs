//! DetectionPipeline: sensor to detector to report.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{info, trace, warn};

use crate::capture::CaptureTrigger;
use crate::detector::{DetectionState, PotholeDetector, Transition};
use crate::location::LocationSource;
use crate::report::EventSink;
use crate::sensor::{DistanceSensor, Reading};
use crate::shutdown::RunFlag;
use crate::time::{duration_ns, Clock};

/// Result of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// The sensor had nothing; the detector was not touched.
    NoReading,
    Sample(Transition),
}

/// Drives one distance sensor through the detector and hands closed
/// episodes to an event sink.
///
/// Capture fires synchronously on entry. Events are geotagged with the
/// location snapshot taken when the episode closes.
///
/// # Error Handling
///
/// Sensor faults arrive as [`Reading::NoReading`] and are skipped. A
/// failed capture is logged and the episode continues.
pub struct DetectionPipeline<S, L, T, K, C> {
    sensor: S,
    location: L,
    capture: T,
    sink: K,
    clock: C,
    detector: PotholeDetector,
}

impl<S, L, T, K, C> DetectionPipeline<S, L, T, K, C>
where
    S: DistanceSensor,
    L: LocationSource,
    T: CaptureTrigger,
    K: EventSink,
    C: Clock,
{
    pub fn new(
        sensor: S,
        location: L,
        capture: T,
        sink: K,
        clock: C,
        detector: PotholeDetector,
    ) -> Self {
        Self {
            sensor,
            location,
            capture,
            sink,
            clock,
            detector,
        }
    }

    /// Run at `period` per sample until `flag` is cleared.
    ///
    /// The period is measured from the start of each step, so a slow
    /// sensor read shortens the following sleep. An overrunning step is
    /// followed immediately by the next one.
    pub fn run<D: DelayNs>(&mut self, flag: &RunFlag, delay: &mut D, period: Duration) {
        info!("detection: running at {:?} per sample", period);
        let period_ns = duration_ns(period);
        while flag.is_running() {
            let start = self.clock.now_ns();
            self.process_one();
            let elapsed = self.clock.now_ns().saturating_sub(start);
            let remaining = period_ns.saturating_sub(elapsed);
            if remaining > 0 {
                delay.delay_ns(u32::try_from(remaining).unwrap_or(u32::MAX));
            }
        }
        info!("detection: stopped");
    }

    /// Take one sample and act on it.
    ///
    /// Returns what happened for testing purposes.
    pub fn process_one(&mut self) -> Step {
        let depth = match self.sensor.poll() {
            Reading::Distance(cm) => cm,
            Reading::NoReading => {
                trace!("detection: no reading");
                self.service_sink();
                return Step::NoReading;
            }
        };

        let transition = self.detector.update(depth, self.clock.now_ns());
        match transition {
            Transition::Entered => {
                if let Err(e) = self.capture.trigger_capture() {
                    warn!("detection: capture failed: {}", e);
                }
            }
            Transition::Closed(episode) => {
                let fix = self.location.current_location();
                let event = episode.into_event(&fix, self.clock.unix_time());
                if !event.location_known() {
                    warn!("detection: no location fix, reporting at 0,0");
                }
                info!(
                    "detection: {} defect, depth {} cm, length {} cm",
                    event.severity(),
                    event.depth_cm(),
                    event.length_cm()
                );
                self.sink.send(&event);
            }
            _ => self.service_sink(),
        }
        Step::Sample(transition)
    }

    // Retries block for whole sessions, never inside an episode
    fn service_sink(&mut self) {
        if self.detector.state() == DetectionState::Idle {
            self.sink.service();
        }
    }

    pub fn detector(&self) -> &PotholeDetector {
        &self.detector
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Decompose the pipeline into sensor, capture trigger and sink.
    pub fn into_parts(self) -> (S, T, K) {
        (self.sensor, self.capture, self.sink)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::capture::CaptureError;
    use crate::detector::DEFAULT_SAMPLE_PERIOD;
    use crate::location::LocationCell;
    use crate::time::sim::SimClock;
    use pothole_proto::{DefectEvent, SeverityLevel};
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    const PERIOD_NS: u64 = 50_000_000;

    struct ScriptedSensor {
        readings: VecDeque<Reading>,
        clock: SimClock,
    }

    impl DistanceSensor for ScriptedSensor {
        fn poll(&mut self) -> Reading {
            // One sample per period
            self.clock.advance(PERIOD_NS);
            self.readings.pop_front().unwrap_or(Reading::NoReading)
        }
    }

    #[derive(Default)]
    struct CountingCapture {
        fired: usize,
        fail: bool,
    }

    impl CaptureTrigger for CountingCapture {
        fn trigger_capture(&mut self) -> Result<(), CaptureError> {
            self.fired += 1;
            if self.fail {
                Err(CaptureError::Pin)
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<DefectEvent>,
        serviced: usize,
    }

    impl EventSink for RecordingSink {
        fn send(&mut self, event: &DefectEvent) {
            self.sent.push(*event);
        }

        fn service(&mut self) {
            self.serviced += 1;
        }
    }

    type TestPipeline<'a> = DetectionPipeline<
        ScriptedSensor,
        &'a LocationCell,
        CountingCapture,
        RecordingSink,
        SimClock,
    >;

    fn pipeline<'a>(cell: &'a LocationCell, depths: &[f64]) -> TestPipeline<'a> {
        let clock = SimClock::new(0);
        let sensor = ScriptedSensor {
            readings: depths.iter().map(|&d| Reading::from_cm(d)).collect(),
            clock: clock.clone(),
        };
        DetectionPipeline::new(
            sensor,
            cell,
            CountingCapture::default(),
            RecordingSink::default(),
            clock,
            PotholeDetector::default(),
        )
    }

    #[test]
    fn test_episode_is_reported_once_with_location() {
        let cell = LocationCell::new();
        cell.publish_fix(12.34, 56.78, 5.0);
        let mut pipeline = pipeline(&cell, &[2.0, 2.0, 6.0, 8.0, 9.0, 4.0, 2.0]);

        let steps: Vec<Step> = (0..7).map(|_| pipeline.process_one()).collect();
        assert_eq!(steps[2], Step::Sample(Transition::Entered));
        assert!(matches!(steps[5], Step::Sample(Transition::Closed(_))));

        let (_, capture, sink) = pipeline.into_parts();
        assert_eq!(capture.fired, 1);
        assert_eq!(sink.sent.len(), 1);
        let event = sink.sent[0];
        assert_eq!(event.depth_cm(), 9.0);
        assert_eq!(event.severity(), SeverityLevel::Critical);
        assert_eq!(event.latitude(), 12.34);
        assert_eq!(event.longitude(), 56.78);
        assert!((event.length_cm() - 4.5).abs() < 1e-9);
        // Closed at the sixth sample, 300 ms in
        assert!((event.timestamp() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_no_fix_reports_zero_coordinates() {
        let cell = LocationCell::new();
        cell.publish_fix(1.0, 2.0, 3.0);
        cell.mark_lost();
        let mut pipeline = pipeline(&cell, &[6.0, 2.0]);
        pipeline.process_one();
        pipeline.process_one();

        let (_, _, sink) = pipeline.into_parts();
        assert_eq!(sink.sent.len(), 1);
        assert!(!sink.sent[0].location_known());
        assert_eq!(sink.sent[0].latitude(), 0.0);
        assert_eq!(sink.sent[0].longitude(), 0.0);
    }

    #[test]
    fn test_no_reading_leaves_detector_alone() {
        let cell = LocationCell::new();
        let mut pipeline = pipeline(&cell, &[6.0]);
        assert_eq!(pipeline.process_one(), Step::Sample(Transition::Entered));
        assert_eq!(pipeline.process_one(), Step::NoReading);
        assert!(matches!(
            pipeline.detector().state(),
            DetectionState::InDefect { samples: 1, .. }
        ));
    }

    #[test]
    fn test_sink_serviced_only_while_idle() {
        let cell = LocationCell::new();
        let mut pipeline = pipeline(&cell, &[2.0, 6.0, 7.0, 2.0, 0.0]);
        for _ in 0..5 {
            pipeline.process_one();
        }
        // Idle sample, then the trailing NoReading (0.0)
        assert_eq!(pipeline.sink().serviced, 2);
        assert_eq!(pipeline.sink().sent.len(), 1);
    }

    #[test]
    fn test_capture_failure_does_not_abort_episode() {
        let cell = LocationCell::new();
        let mut pipeline = pipeline(&cell, &[9.0, 1.0]);
        pipeline.capture.fail = true;
        pipeline.process_one();
        pipeline.process_one();
        assert_eq!(pipeline.sink().sent.len(), 1);
    }

    struct StopAfter<'a> {
        flag: &'a RunFlag,
        calls: usize,
        limit: usize,
        total_ns: u64,
    }

    impl DelayNs for StopAfter<'_> {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
            self.calls += 1;
            if self.calls >= self.limit {
                self.flag.stop();
            }
        }
    }

    #[test]
    fn test_run_stops_on_flag() {
        let cell = LocationCell::new();
        let mut pipeline = pipeline(&cell, &vec![2.0; 10]);
        let flag = RunFlag::new();
        let mut delay = StopAfter {
            flag: &flag,
            calls: 0,
            limit: 3,
            total_ns: 0,
        };

        // Zero-step clock plus a 50 ms sensor read: each step costs the
        // whole period, so the loop only sleeps when the period is longer
        pipeline.run(&flag, &mut delay, DEFAULT_SAMPLE_PERIOD * 2);
        assert_eq!(delay.calls, 3);
        assert_eq!(delay.total_ns, 3 * PERIOD_NS);
        assert_eq!(pipeline.sensor_mut().readings.len(), 7);
    }
}
