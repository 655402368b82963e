/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;

use mztape_core::bitvec::prelude::*;

/// The error returned when reading past the end of [TapeBits].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamExhausted {
    /// The bit position at which the failed read started.
    pub position: usize
}

/// A forward-only cursor over the demodulated tape bits.
///
/// Assembles framed bytes and measures gaps. A failed read does not advance the cursor.
#[derive(Clone, Debug)]
pub struct TapeBits<'a> {
    bits: &'a BitSlice<u8, Lsb0>,
    position: usize
}

impl std::error::Error for StreamExhausted {}

impl fmt::Display for StreamExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tape bit stream exhausted at bit {}", self.position)
    }
}

impl<'a> From<&'a BitSlice<u8, Lsb0>> for TapeBits<'a> {
    fn from(bits: &'a BitSlice<u8, Lsb0>) -> Self {
        TapeBits { bits, position: 0 }
    }
}

impl<'a> TapeBits<'a> {
    /// Returns the current bit position.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
    /// Returns the number of bits left.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.position
    }
    /// Returns `true` if there are no more bits left.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
    /// Reads a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, StreamExhausted> {
        match self.bits.get(self.position) {
            Some(bit) => {
                self.position += 1;
                Ok(*bit)
            }
            None => Err(self.exhausted())
        }
    }
    /// Reads `count` bits at once.
    pub fn read_bits(&mut self, count: usize) -> Result<&'a BitSlice<u8, Lsb0>, StreamExhausted> {
        let end = self.position.checked_add(count).filter(|&end| end <= self.bits.len())
                               .ok_or_else(|| self.exhausted())?;
        let bits = &self.bits[self.position..end];
        self.position = end;
        Ok(bits)
    }
    /// Reads a single byte: a framing bit, which is discarded, followed by 8 data bits.
    ///
    /// The data bits are reversed and then the bit at index `j` is weighted `2^j`, so the first
    /// data bit on tape becomes the most significant one.
    pub fn read_byte(&mut self) -> Result<u8, StreamExhausted> {
        let bits = self.read_bits(9)?;
        Ok(bits[1..].iter().rev().enumerate()
                    .fold(0, |byte, (j, bit)| byte | (u8::from(*bit) << j)))
    }
    /// Reads a 16-bit word composed of two bytes, the first one being the most significant.
    pub fn read_u16(&mut self) -> Result<u16, StreamExhausted> {
        if self.remaining() < 2 * 9 {
            return Err(self.exhausted())
        }
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }
    /// Fills `buf` with bytes read from tape.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), StreamExhausted> {
        if self.remaining() < buf.len() * 9 {
            return Err(self.exhausted())
        }
        for p in buf.iter_mut() {
            *p = self.read_byte()?;
        }
        Ok(())
    }
    /// Skips a leader (a run of `1`s) and the following gap (a run of `0`s).
    ///
    /// Returns the length of the gap. The first `1` following the gap is consumed as well.
    ///
    /// Unlike other reads, this one consumes all the scanned bits when the stream ends.
    pub fn skip_leader(&mut self) -> Result<u32, StreamExhausted> {
        let mut bit = self.read_bit()?;
        while bit {
            bit = self.read_bit()?;
        }
        let mut gap = 0u32;
        while !bit {
            gap = gap.saturating_add(1);
            bit = self.read_bit()?;
        }
        Ok(gap)
    }

    fn exhausted(&self) -> StreamExhausted {
        StreamExhausted { position: self.position }
    }
}
