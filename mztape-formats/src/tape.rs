/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
/*! Sharp MZ **TAPE** format utilities.

# TAPE format

A tape side recorded by the MZ-80/MZ-700 monitor routines is a stream of pulses, one bit each,
recovered from audio with [mztape_core::pulse]. Every byte on tape is preceded by a single long
pulse (a framing bit) and is transmitted most significant bit first.

A file consists of a header region followed by a data region.

The header region:

| bits                 | description                                        |
|----------------------|----------------------------------------------------|
| leader/gap           | a run of `1`s then ~22000 `0`s (the long gap)      |
| 79 + 1               | the header tape mark and a trailer bit             |
| (24 + comment) × 9   | the header, see [FileHeader]                       |
| 2 × 9                | the header checksum (MSB first) and a trailer bit  |
| 256                  | a validity field, all `0`s                         |
| (24 + comment) × 9   | the header copy                                    |
| 2 × 9 + 1            | the copy checksum and a trailer bit                |

The data region is a sequence of numbered blocks, each one recorded as:

| bits      | description                                               |
|-----------|-----------------------------------------------------------|
| gap       | ~11000 `0`s (the short gap)                               |
| 39 + 1    | the data tape mark and a trailer bit                      |
| 2 × 9     | the block number (MSB first)                              |
| 256 × 9   | the block payload                                         |
| 2 × 9 + 1 | the payload checksum and a trailer bit                    |
| 256       | a validity field, all `0`s                                |
| 2 × 9     | the block number copy                                     |
| 256 × 9   | the payload copy                                          |
| 2 × 9 + 1 | the copy checksum and a trailer bit                       |

The block with the number [END_BLOCK] terminates the data region and carries no file data.

A checksum is the number of bits set in the checksummed bytes.

## Reading files

```no_run
use mztape_core::{audio::SampleCursor, pulse::{DemodConfig, demodulate}};
use mztape_formats::tape::*;

let samples: Vec<u8> = std::fs::read("side_a.raw")?;
let bits = demodulate(SampleCursor::from(samples), DemodConfig::from_sample_rate(44100), |_| {});
let mut reader = TapeBlockReader::new(&bits, ReaderConfig::default());
while let Some((header, data)) = reader.read_file()? {
    println!("{}", header);
    println!("{} bytes", data.len());
}
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
use core::borrow::Borrow;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

mod bits;
pub mod charset;
mod header;
mod read;
pub use bits::*;
pub use header::*;
pub use read::*;

/// The number of bits of the header tape mark following the long gap.
pub const HEADER_SYNC_BITS: usize = 79;
/// The number of bits of the data tape mark following the short gap.
pub const DATA_SYNC_BITS: usize = 39;
/// The number of bits of the validity field.
pub const VALIDITY_BITS: usize = 256;
/// The size of a data block payload in bytes.
pub const BLOCK_SIZE: usize = 256;
/// The number of the block terminating the data region.
pub const END_BLOCK: u16 = 0xFFFF;
/// The minimal expected length of the header gap.
pub const HEADER_GAP_MIN: u32 = 22000;
/// The minimal expected length of the data block gap.
pub const DATA_GAP_MIN: u32 = 11000;

/// Calculates the Sharp MZ checksum (the number of bits set) from the given iterator of `u8`.
pub fn checksum<I: IntoIterator<Item=B>, B: Borrow<u8>>(iter: I) -> u16 {
    iter.into_iter().fold(0, |acc: u16, x| acc.wrapping_add(x.borrow().count_ones() as u16))
}

/// Determines how stored checksums are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChecksumMode {
    /// A mismatch is logged and reading continues.
    Lenient,
    /// A mismatch is reported as [TapeError::Checksum].
    Strict
}

/// The configuration of the [TapeBlockReader].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReaderConfig {
    /// The size of the comment area of the header, in bytes.
    pub comment_size: usize,
    /// A shorter header gap is reported as a warning.
    pub header_gap_min: u32,
    /// A shorter block gap is reported as a warning.
    pub data_gap_min: u32,
    /// How to treat checksum mismatches.
    pub checksum: ChecksumMode,
}

/// The type of errors returned by the [TapeBlockReader].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapeError {
    /// The bit stream ended in the middle of a file.
    Truncated {
        /// What was being read.
        state: ReadState,
        /// The bit position at which the failed read started.
        position: usize
    },
    /// The stored checksum does not match the contents, only in [ChecksumMode::Strict].
    Checksum {
        /// What was being read.
        state: ReadState,
        /// The checksum read from tape.
        stored: u16,
        /// The checksum of the data read from tape.
        computed: u16
    },
    /// The header could not be parsed.
    Header(HeaderParseError),
    /// The data region was requested without reading a header first.
    MissingHeader,
}

impl Default for ChecksumMode {
    fn default() -> Self {
        ChecksumMode::Lenient
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            comment_size: DEFAULT_COMMENT_SIZE,
            header_gap_min: HEADER_GAP_MIN,
            data_gap_min: DATA_GAP_MIN,
            checksum: ChecksumMode::default()
        }
    }
}

impl ReaderConfig {
    /// Changes `comment_size`, builder style.
    pub fn with_comment_size(mut self, comment_size: usize) -> Self {
        self.comment_size = comment_size;
        self
    }
    /// Changes `checksum`, builder style.
    pub fn with_checksum(mut self, checksum: ChecksumMode) -> Self {
        self.checksum = checksum;
        self
    }
    /// Changes both minimal gap lengths, builder style.
    pub fn with_gaps(mut self, header_gap_min: u32, data_gap_min: u32) -> Self {
        self.header_gap_min = header_gap_min;
        self.data_gap_min = data_gap_min;
        self
    }
    /// Returns the size of the whole header in bytes.
    #[inline]
    pub fn header_size(&self) -> usize {
        HEADER_FIXED_SIZE + self.comment_size
    }
}

impl std::error::Error for TapeError {}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeError::Truncated { state, position } => {
                write!(f, "tape ended at bit {} while reading {}", position, state)
            }
            TapeError::Checksum { state, stored, computed } => {
                write!(f, "checksum mismatch in {}: stored ${:04x}, computed ${:04x}",
                        state, stored, computed)
            }
            TapeError::Header(e) => e.fmt(f),
            TapeError::MissingHeader => f.write_str("no file header was read before the data")
        }
    }
}

impl From<HeaderParseError> for TapeError {
    fn from(e: HeaderParseError) -> Self {
        TapeError::Header(e)
    }
}
