//! GNSS tracking and the shared location snapshot.
//!
//! One writer (the tracking task) publishes into a [`LocationCell`]; any
//! number of readers take [`LocationCell::snapshot`] copies. A snapshot is
//! always a complete fix: the cell is replaced whole under a critical
//! section, never field by field.

use core::cell::Cell;
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{debug, trace, warn};
use nmea0183::{ParseResult, Parser};
use pothole_proto::nmea::{MAX_SENTENCE_LEN, RECEIVER_SETUP};
use pothole_proto::{write_sentence, LocationFix};

use crate::serial::{SerialError, SerialPort};
use crate::time::{duration_ns, Clock};

/// How long one update cycle may take before the fix is declared lost.
/// Twice the 1 Hz update period.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-byte read bound while waiting inside a cycle.
pub const BYTE_TIMEOUT: Duration = Duration::from_millis(100);

/// Receiver tracking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationConfig {
    pub cycle_timeout: Duration,
    /// Send the update-rate and sentence-subset commands at startup.
    pub configure_receiver: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            configure_receiver: true,
        }
    }
}

/// Latest [`LocationFix`], shared between one writer and many readers.
pub struct LocationCell {
    fix: Mutex<CriticalSectionRawMutex, Cell<LocationFix>>,
}

impl LocationCell {
    /// A cell that has never seen a fix.
    pub const fn new() -> Self {
        Self {
            fix: Mutex::new(Cell::new(LocationFix::NONE)),
        }
    }

    /// Copy of the current fix. Never waits on the receiver.
    pub fn snapshot(&self) -> LocationFix {
        self.fix.lock(|fix| fix.get())
    }

    /// Replace the fix with a current one.
    pub fn publish_fix(&self, latitude: f64, longitude: f64, altitude_m: f64) {
        let fix = LocationFix::new(latitude, longitude, altitude_m);
        self.fix.lock(|cell| cell.set(fix));
    }

    /// Flag the fix stale, keeping the last coordinates.
    pub fn mark_lost(&self) {
        self.fix.lock(|cell| cell.set(cell.get().lost()));
    }

    fn apply(&self, update: FixUpdate) {
        match update {
            FixUpdate::Fix(fix) => self.publish_fix(fix.latitude, fix.longitude, fix.altitude_m),
            FixUpdate::NoFix => self.mark_lost(),
        }
    }
}

impl Default for LocationCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can hand out a location snapshot.
pub trait LocationSource {
    fn current_location(&self) -> LocationFix;
}

impl LocationSource for LocationCell {
    #[inline]
    fn current_location(&self) -> LocationFix {
        self.snapshot()
    }
}

impl<T: LocationSource + ?Sized> LocationSource for &T {
    #[inline]
    fn current_location(&self) -> LocationFix {
        (**self).current_location()
    }
}

#[cfg(feature = "std")]
impl<T: LocationSource + ?Sized> LocationSource for std::sync::Arc<T> {
    #[inline]
    fn current_location(&self) -> LocationFix {
        (**self).current_location()
    }
}

#[cfg(feature = "std")]
impl<T: LocationSource + ?Sized> LocationSource for std::boxed::Box<T> {
    #[inline]
    fn current_location(&self) -> LocationFix {
        (**self).current_location()
    }
}

/// Outcome of one receiver update cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FixUpdate {
    Fix(LocationFix),
    /// The receiver reported, but is still searching.
    NoFix,
}

/// Turns a receiver byte stream into fix updates.
///
/// A cycle ends with each GGA sentence, which carries position, altitude,
/// fix quality and satellite count.
pub struct NmeaTracker {
    parser: Parser,
}

impl NmeaTracker {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Feed one byte. Returns an update when a GGA sentence completes.
    pub fn feed(&mut self, byte: u8) -> Option<FixUpdate> {
        match self.parser.parse_from_byte(byte)? {
            Ok(ParseResult::GGA(Some(gga))) if gga.sat_in_use > 0 => {
                Some(FixUpdate::Fix(LocationFix::new(
                    gga.latitude.as_f64(),
                    gga.longitude.as_f64(),
                    f64::from(gga.altitude.meters),
                )))
            }
            Ok(ParseResult::GGA(_)) => Some(FixUpdate::NoFix),
            Ok(_) => None,
            Err(e) => {
                trace!("nmea: {}", e);
                None
            }
        }
    }

    /// Read until one update cycle completes or `timeout` passes, and
    /// publish the outcome into `cell`.
    ///
    /// A timeout counts as a lost fix.
    ///
    /// # Errors
    ///
    /// Channel failures other than timeouts are returned after the fix has
    /// been marked lost.
    pub fn run_cycle<P, C>(
        &mut self,
        port: &mut P,
        clock: &C,
        cell: &LocationCell,
        timeout: Duration,
    ) -> Result<FixUpdate, SerialError>
    where
        P: SerialPort + ?Sized,
        C: Clock + ?Sized,
    {
        let deadline = clock.now_ns().saturating_add(duration_ns(timeout));
        let mut byte = [0u8; 1];

        loop {
            let now = clock.now_ns();
            if now >= deadline {
                debug!("gnss: no update within {:?}", timeout);
                cell.mark_lost();
                return Ok(FixUpdate::NoFix);
            }

            let wait = Duration::from_nanos(deadline - now).min(BYTE_TIMEOUT);
            match port.read(&mut byte, wait) {
                Ok(()) => {
                    if let Some(update) = self.feed(byte[0]) {
                        cell.apply(update);
                        return Ok(update);
                    }
                }
                Err(SerialError::Timeout) => {}
                Err(e) => {
                    warn!("gnss: receiver read failed: {}", e);
                    cell.mark_lost();
                    return Err(e);
                }
            }
        }
    }
}

impl Default for NmeaTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Send the startup configuration: RMC+GGA output at 1 Hz.
pub fn configure_receiver<P: SerialPort + ?Sized>(port: &mut P) -> Result<(), SerialError> {
    let mut buf = [0u8; MAX_SENTENCE_LEN];
    for body in RECEIVER_SETUP {
        let len = write_sentence(body, &mut buf).map_err(|_| SerialError::Config)?;
        port.write(&buf[..len])?;
        debug!("gnss: sent ${}", body);
    }
    Ok(())
}
