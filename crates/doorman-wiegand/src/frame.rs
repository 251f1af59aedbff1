//! Bit accumulator for a single Wiegand frame.
//!
//! A frame is stored MSB-first in a `u64`: the first bit received ends up in
//! the most significant position of the used range. For a frame of `n` bits
//! the layout is:
//!
//! ```text
//! bit n-1        bits n-2 ..= 1            bit 0
//! [even parity]  [data, MSB first]         [odd parity]
//! ```
//!
//! The leading parity bit makes the number of ones in itself plus the first
//! half of the data bits even; the trailing parity bit makes the number of
//! ones in the second half of the data bits plus itself odd.
//!
//! # Examples
//!
//! ```
//! use doorman_wiegand::BitFrame;
//!
//! let frame = BitFrame::encode(12345, 26).unwrap();
//! assert_eq!(frame.len(), 26);
//! assert!(frame.parity_ok());
//! assert_eq!(frame.code(), 12345);
//! ```

use crate::error::{Result, WiegandError};
use doorman_core::{DataLine, constants::{MAX_FRAME_BITS, SUPPORTED_FRAME_LENGTHS}};
use std::time::{Duration, Instant};

/// A single falling edge captured on one of the data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub line: DataLine,
    pub at: Instant,
}

impl Edge {
    pub fn new(line: DataLine, at: Instant) -> Self {
        Self { line, at }
    }
}

/// Accumulated bits of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitFrame {
    value: u64,
    len: usize,
}

impl BitFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a correctly framed sequence carrying `code`.
    ///
    /// # Errors
    ///
    /// Returns [`WiegandError::UnsupportedLength`] if `bits` is not 26, 34 or
    /// 36, and [`WiegandError::CodeTooWide`] if `code` needs more than
    /// `bits - 2` bits.
    pub fn encode(code: u64, bits: usize) -> Result<Self> {
        if !SUPPORTED_FRAME_LENGTHS.contains(&bits) {
            return Err(WiegandError::unsupported_length(bits));
        }
        let data_bits = bits - 2;
        if code >> data_bits != 0 {
            return Err(WiegandError::CodeTooWide { code, data_bits });
        }

        let (first, second) = split_halves(code, data_bits);
        let even = u64::from(first.count_ones() % 2 == 1);
        let odd = u64::from(second.count_ones() % 2 == 0);

        Ok(Self {
            value: (even << (bits - 1)) | (code << 1) | odd,
            len: bits,
        })
    }

    /// Append one bit. Returns `false` if the frame is already full.
    pub fn push(&mut self, bit: bool) -> bool {
        if self.len >= MAX_FRAME_BITS {
            return false;
        }
        self.value = (self.value << 1) | u64::from(bit);
        self.len += 1;
        true
    }

    /// Number of bits accumulated.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discard all bits.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Bit at `index`, counting from the first bit received.
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some((self.value >> (self.len - 1 - index)) & 1 == 1)
    }

    /// Iterate over the bits in reception order.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).filter_map(|i| self.bit(i))
    }

    /// Data bits with both parity bits stripped, MSB first.
    ///
    /// Returns 0 for frames shorter than three bits.
    pub fn code(&self) -> u64 {
        if self.len < 3 {
            return 0;
        }
        (self.value >> 1) & mask(self.len - 2)
    }

    /// Check the leading even and trailing odd parity bits.
    pub fn parity_ok(&self) -> bool {
        if self.len < 3 {
            return false;
        }
        let data_bits = self.len - 2;
        let (first, second) = split_halves(self.code(), data_bits);
        let leading = (self.value >> (self.len - 1)) & 1;
        let trailing = self.value & 1;

        (first.count_ones() + leading as u32) % 2 == 0
            && (second.count_ones() + trailing as u32) % 2 == 1
    }

    /// Timed edge sequence that transmits this frame.
    ///
    /// The first edge happens at `start`, each following one `bit_interval`
    /// later.
    pub fn edges(&self, start: Instant, bit_interval: Duration) -> Vec<Edge> {
        self.bits()
            .enumerate()
            .map(|(i, bit)| Edge::new(DataLine::for_bit(bit), start + bit_interval * i as u32))
            .collect()
    }
}

#[inline]
fn mask(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Split `data_bits` of `code` into its first (upper) and second (lower) halves.
fn split_halves(code: u64, data_bits: usize) -> (u64, u64) {
    let low_bits = data_bits - data_bits / 2;
    let first = code >> low_bits;
    let second = code & mask(low_bits);
    (first, second)
}
