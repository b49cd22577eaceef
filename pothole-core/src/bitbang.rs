//! Software UART over two GPIO lines.
//!
//! Every bit edge is scheduled against absolute clock time measured from the
//! start of the character, so per-bit latency does not accumulate across a
//! frame.
//!
//! # Known limitations
//!
//! - [`SerialPort::bytes_available`] is only a hint. A character can only be
//!   framed by consuming it from its start edge onward, so the channel can
//!   report at most whether a start bit is on the line right now (1) or not
//!   (0). Callers must not use it as the only gate for a read.
//! - Timing is busy-waited on the calling thread. Above
//!   [`MAX_RELIABLE_BAUD`] scheduling jitter on a host OS corrupts or drops
//!   characters; 9600 baud is reliable, 115200 is not.
//! - The stop bit is consumed but not validated.

use core::time::Duration;

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::{trace, warn};
use pothole_proto::frame::{byte_from_samples, frame_levels, DATA_BITS, MAX_RELIABLE_BAUD};
use pothole_proto::FrameTiming;

use crate::serial::{SerialError, SerialPort};
use crate::time::{duration_ns, spin_until, Clock};

/// Half-duplex 8N1 channel driving `tx` and sampling `rx`.
pub struct BitBangSerial<TX, RX, C> {
    tx: TX,
    rx: RX,
    clock: C,
    timing: FrameTiming,
    /// Whether the line has been seen idle since the last character, which
    /// arms start-bit detection.
    line_idle: bool,
}

impl<TX: OutputPin, RX: InputPin, C: Clock> BitBangSerial<TX, RX, C> {
    /// Take ownership of the two lines and drive TX to idle.
    ///
    /// # Errors
    ///
    /// [`SerialError::Config`] for a zero baud rate, [`SerialError::Io`] if
    /// the TX line cannot be driven.
    pub fn open(mut tx: TX, rx: RX, clock: C, baud: u32) -> Result<Self, SerialError> {
        let timing = FrameTiming::new(baud).ok_or(SerialError::Config)?;
        if baud > MAX_RELIABLE_BAUD {
            warn!(
                "bit-banged serial at {} baud exceeds {} baud; expect lost characters",
                baud, MAX_RELIABLE_BAUD
            );
        }

        tx.set_high().map_err(|_| SerialError::Io)?;

        Ok(Self {
            tx,
            rx,
            clock,
            timing,
            line_idle: false,
        })
    }

    /// Bit-cell timing in use.
    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    /// Release the lines and the clock.
    pub fn into_parts(self) -> (TX, RX, C) {
        (self.tx, self.rx, self.clock)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        let start = self.clock.now_ns();
        for (cell, &level) in frame_levels(byte).iter().enumerate() {
            spin_until(&self.clock, start + self.timing.cell_start_ns(cell));
            self.tx
                .set_state(PinState::from(level))
                .map_err(|_| SerialError::Io)?;
        }
        // Hold the stop bit for its full cell
        spin_until(&self.clock, start + self.timing.transmit_ns(1));
        Ok(())
    }

    /// Wait for the falling edge of a start bit, returning its time.
    fn wait_start_edge(&mut self, deadline_ns: u64) -> Result<u64, SerialError> {
        loop {
            let now = self.clock.now_ns();
            let high = self.rx.is_high().map_err(|_| SerialError::Io)?;
            if high {
                self.line_idle = true;
            } else if self.line_idle {
                return Ok(now);
            }
            if now >= deadline_ns {
                return Err(SerialError::Timeout);
            }
            core::hint::spin_loop();
        }
    }

    fn read_byte(&mut self, deadline_ns: u64) -> Result<u8, SerialError> {
        let edge = self.wait_start_edge(deadline_ns)?;

        let mut samples = [false; DATA_BITS];
        for (bit, sample) in samples.iter_mut().enumerate() {
            spin_until(&self.clock, edge + self.timing.sample_offset_ns(bit));
            *sample = self.rx.is_high().map_err(|_| SerialError::Io)?;
        }

        spin_until(&self.clock, edge + self.timing.stop_offset_ns());
        // Not validated; only re-arms edge detection
        self.line_idle = self.rx.is_high().map_err(|_| SerialError::Io)?;

        Ok(byte_from_samples(samples))
    }
}

impl<TX: OutputPin, RX: InputPin, C: Clock> SerialPort for BitBangSerial<TX, RX, C> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        trace!("bitbang tx {} bytes", bytes.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SerialError> {
        let deadline = self.clock.now_ns().saturating_add(duration_ns(timeout));
        for slot in buf.iter_mut() {
            *slot = self.read_byte(deadline)?;
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> usize {
        match self.rx.is_low() {
            Ok(true) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::time::sim::SimClock;
    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Line level history shared by both ends of a simulated wire.
    #[derive(Clone)]
    struct Wire {
        clock: SimClock,
        transitions: Rc<RefCell<Vec<(u64, bool)>>>,
    }

    impl Wire {
        fn new(clock: SimClock) -> Self {
            Self {
                clock,
                transitions: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn level_at(&self, t: u64) -> bool {
            self.transitions
                .borrow()
                .iter()
                .rev()
                .find(|(at, _)| *at <= t)
                .map(|(_, level)| *level)
                .unwrap_or(true)
        }
    }

    struct TxPin(Wire);

    impl embedded_hal::digital::ErrorType for TxPin {
        type Error = Infallible;
    }

    impl OutputPin for TxPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            let t = self.0.clock.peek();
            self.0.transitions.borrow_mut().push((t, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            let t = self.0.clock.peek();
            self.0.transitions.borrow_mut().push((t, true));
            Ok(())
        }
    }

    struct RxPin(Wire);

    impl embedded_hal::digital::ErrorType for RxPin {
        type Error = Infallible;
    }

    impl InputPin for RxPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.level_at(self.0.clock.peek()))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.level_at(self.0.clock.peek()))
        }
    }

    /// Write `bytes`, rewind virtual time to the start of transmission and
    /// read them back off the same wire.
    fn loopback(bytes: &[u8], baud: u32) -> Result<Vec<u8>, SerialError> {
        let clock = SimClock::new(1_000);
        let wire = Wire::new(clock.clone());
        let mut serial = BitBangSerial::open(
            TxPin(wire.clone()),
            RxPin(wire.clone()),
            clock.clone(),
            baud,
        )?;

        clock.advance(50_000);
        let start = clock.peek();
        serial.write(bytes)?;

        // Rewind far enough to see the idle line before the start edge
        clock.set(start - 20_000);
        let mut out = std::vec![0u8; bytes.len()];
        serial.read(&mut out, Duration::from_millis(100))?;
        Ok(out)
    }

    #[test]
    fn test_loopback_zero() {
        assert_eq!(loopback(&[0x00], 9600).unwrap(), [0x00u8]);
    }

    #[test]
    fn test_loopback_ff() {
        assert_eq!(loopback(&[0xFF], 9600).unwrap(), [0xFFu8]);
    }

    #[test]
    fn test_loopback_lidar_header() {
        let bytes = [0x59, 0x59, 0x0A, 0x00];
        assert_eq!(loopback(&bytes, 9600).unwrap(), bytes);
    }

    #[test]
    fn test_write_occupies_ten_bit_periods_per_byte() {
        let clock = SimClock::new(1_000);
        let wire = Wire::new(clock.clone());
        let mut serial =
            BitBangSerial::open(TxPin(wire.clone()), RxPin(wire.clone()), clock.clone(), 9600)
                .unwrap();

        let start = clock.peek();
        serial.write(&[0x59, 0x59]).unwrap();
        let elapsed = clock.peek() - start;
        let expected = serial.timing().transmit_ns(2);
        assert!(elapsed >= expected);
        assert!(elapsed < expected + 10_000);

        // Line is left idle
        assert!(wire.level_at(clock.peek()));
    }

    #[test]
    fn test_read_times_out_on_idle_line() {
        let clock = SimClock::new(1_000);
        let wire = Wire::new(clock.clone());
        let mut serial =
            BitBangSerial::open(TxPin(wire.clone()), RxPin(wire), clock.clone(), 9600).unwrap();

        let mut buf = [0u8; 1];
        let start = clock.peek();
        assert_eq!(
            serial.read(&mut buf, Duration::from_millis(5)),
            Err(SerialError::Timeout)
        );
        assert!(clock.peek() - start >= 5_000_000);
    }

    #[test]
    fn test_stuck_low_line_times_out() {
        let clock = SimClock::new(1_000);
        let wire = Wire::new(clock.clone());
        let mut serial =
            BitBangSerial::open(TxPin(wire.clone()), RxPin(wire.clone()), clock, 9600).unwrap();
        // Open drove TX idle; hold the line low from the same instant
        wire.transitions.borrow_mut().push((0, false));

        let mut buf = [0u8; 1];
        assert_eq!(
            serial.read(&mut buf, Duration::from_millis(1)),
            Err(SerialError::Timeout)
        );
    }

    #[test]
    fn test_bytes_available_is_a_hint() {
        let clock = SimClock::new(1_000);
        let wire = Wire::new(clock.clone());
        let mut serial =
            BitBangSerial::open(TxPin(wire.clone()), RxPin(wire.clone()), clock.clone(), 9600)
                .unwrap();
        assert_eq!(serial.bytes_available(), 0);

        wire.transitions.borrow_mut().push((clock.peek(), false));
        assert_eq!(serial.bytes_available(), 1);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let clock = SimClock::new(1_000);
        let wire = Wire::new(clock.clone());
        assert!(matches!(
            BitBangSerial::open(TxPin(wire.clone()), RxPin(wire), clock, 0),
            Err(SerialError::Config)
        ));
    }
}
