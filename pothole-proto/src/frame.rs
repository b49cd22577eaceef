//! 8N1 character framing for software-emulated UARTs.
//!
//! One character on the wire is 10 bit cells of `1 / baud` seconds each:
//!
//! ```text
//! idle ‾‾‾|_start_|d0|d1|d2|d3|d4|d5|d6|d7|‾stop‾|‾‾‾ idle
//! ```
//!
//! Data bits go LSB first, there is no parity, and the line idles high.
//! A receiver detects the falling edge of the start bit and then samples
//! the middle of each data cell, i.e. 1.5 bit periods after the edge for
//! `d0` and one bit period apart afterwards.

/// Data bits per character.
pub const DATA_BITS: usize = 8;

/// Bit cells per character: start + 8 data + stop.
pub const FRAME_BITS: usize = 10;

/// Level of an idle line and of the stop bit.
pub const IDLE_LEVEL: bool = true;

/// Level of the start bit.
pub const START_LEVEL: bool = false;

/// Highest baud rate a software UART is expected to hold under host
/// scheduling jitter. Above this, characters will be dropped or corrupted.
pub const MAX_RELIABLE_BAUD: u32 = 38_400;

/// Line levels for one character, in transmission order.
#[must_use]
pub const fn frame_levels(byte: u8) -> [bool; FRAME_BITS] {
    let mut levels = [IDLE_LEVEL; FRAME_BITS];
    levels[0] = START_LEVEL;
    let mut bit = 0;
    while bit < DATA_BITS {
        levels[1 + bit] = (byte >> bit) & 1 == 1;
        bit += 1;
    }
    levels
}

/// Assemble a character from its eight data samples (LSB first).
#[must_use]
pub fn byte_from_samples(samples: [bool; DATA_BITS]) -> u8 {
    samples
        .iter()
        .enumerate()
        .fold(0u8, |acc, (bit, &high)| acc | ((high as u8) << bit))
}

/// Bit-cell timing for a given baud rate, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameTiming {
    bit_period_ns: u64,
}

impl FrameTiming {
    /// Timing for `baud` bits per second. Returns `None` for a zero baud rate.
    #[must_use]
    pub const fn new(baud: u32) -> Option<Self> {
        if baud == 0 {
            return None;
        }
        Some(Self {
            bit_period_ns: 1_000_000_000 / baud as u64,
        })
    }

    #[inline]
    #[must_use]
    pub const fn bit_period_ns(&self) -> u64 {
        self.bit_period_ns
    }

    /// Offset from the start-bit edge to the start of cell `index`.
    #[inline]
    #[must_use]
    pub const fn cell_start_ns(&self, index: usize) -> u64 {
        self.bit_period_ns * index as u64
    }

    /// Offset from the start-bit edge to the middle of data bit `bit`.
    ///
    /// `bit` 0 is sampled 1.5 periods after the edge.
    #[inline]
    #[must_use]
    pub const fn sample_offset_ns(&self, bit: usize) -> u64 {
        self.bit_period_ns * (3 + 2 * bit as u64) / 2
    }

    /// Offset from the start-bit edge to the middle of the stop bit.
    #[inline]
    #[must_use]
    pub const fn stop_offset_ns(&self) -> u64 {
        self.sample_offset_ns(DATA_BITS)
    }

    /// Time the line is occupied by `n_bytes` characters.
    #[inline]
    #[must_use]
    pub const fn transmit_ns(&self, n_bytes: usize) -> u64 {
        self.bit_period_ns * (FRAME_BITS * n_bytes) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_levels_zero() {
        let levels = frame_levels(0x00);
        assert!(!levels[0]);
        assert!(levels[1..9].iter().all(|&l| !l));
        assert!(levels[9]);
    }

    #[test]
    fn test_frame_levels_lsb_first() {
        // 0x59 = 0101_1001
        let levels = frame_levels(0x59);
        assert_eq!(
            levels,
            [false, true, false, false, true, true, false, true, false, true]
        );
    }

    #[test]
    fn test_samples_reassemble() {
        for byte in [0x00u8, 0xFF, 0x59, 0x0A, 0x80, 0x01] {
            let levels = frame_levels(byte);
            let mut samples = [false; DATA_BITS];
            samples.copy_from_slice(&levels[1..9]);
            assert_eq!(byte_from_samples(samples), byte);
        }
    }

    #[test]
    fn test_timing_9600() {
        let timing = FrameTiming::new(9600).unwrap();
        assert_eq!(timing.bit_period_ns(), 104_166);
        assert_eq!(timing.sample_offset_ns(0), 156_249);
        assert_eq!(timing.sample_offset_ns(7), 104_166 * 17 / 2);
        assert_eq!(timing.stop_offset_ns(), 104_166 * 19 / 2);
        assert_eq!(timing.transmit_ns(4), 104_166 * 40);
    }

    #[test]
    fn test_zero_baud_rejected() {
        assert!(FrameTiming::new(0).is_none());
    }
}
