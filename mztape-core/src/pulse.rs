/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
//! **TAPE** pulse demodulation.
//!
//! A Sharp MZ cassette signal is pulse-width modulated: every bit is a single excursion of the
//! waveform from a local minimum up to the following local maximum. A long ascent encodes `1`
//! and a short one encodes `0`.
//!
//! [PulseClassifier] follows the envelope of the signal and classifies each pulse by counting
//! the frames of the ascending run and comparing it to the [DemodConfig::skip] value derived
//! from the sample rate. Excursions no taller than [DemodConfig::threshold] are treated as
//! noise and ignored.
//!
//! ```
//! use mztape_core::audio::SampleCursor;
//! use mztape_core::pulse::{DemodConfig, demodulate};
//!
//! let samples: Vec<u8> = Vec::new(); // 8-bit unsigned PCM frames
//! let config = DemodConfig::from_sample_rate(44100);
//! let bits = demodulate(SampleCursor::from(samples), config, |_| {});
//! assert!(bits.is_empty());
//! ```
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use bitvec::prelude::*;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::audio::SampleSource;

/// The duration in seconds of the pulse ascent separating short pulses from long ones.
pub const PULSE_BOUNDARY_SECS: f64 = 0.000368;
/// The default minimal amplitude of a valid pulse.
pub const DEFAULT_THRESHOLD: u8 = 20;

/// The bit buffer produced by [demodulate].
pub type TapeBitVec = BitVec<u8, Lsb0>;

/// Calibration of the [PulseClassifier].
///
/// Both values depend on the recording, so they are computed once from the sample rate
/// and can be adjusted builder style before the demodulation starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DemodConfig {
    skip: u32,
    threshold: u8
}

/// A single accepted pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    /// The sample value at the bottom of the pulse.
    pub minima: u8,
    /// The sample value at the top of the pulse.
    pub maxima: u8,
    /// The number of frames of the ascending run following the first rising frame.
    pub width: u32
}

/// Demodulates a [SampleSource] into tape bits.
///
/// Implements [Iterator] yielding one bit per accepted pulse. The iterator ends when
/// the source is exhausted; a pulse that was being scanned at that moment is dropped.
#[derive(Debug)]
pub struct PulseClassifier<S> {
    src: S,
    config: DemodConfig,
}

impl Default for DemodConfig {
    fn default() -> Self {
        DemodConfig::from_sample_rate(44100)
    }
}

impl DemodConfig {
    /// Creates a configuration for the recording sampled with the given `sample_rate` in Hz.
    ///
    /// `skip = floor(0.000368 * sample_rate) - 1`, saturating at 0.
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        let skip = (PULSE_BOUNDARY_SECS * f64::from(sample_rate)).floor() as u32;
        DemodConfig { skip: skip.saturating_sub(1), threshold: DEFAULT_THRESHOLD }
    }
    /// Changes `skip`, builder style.
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }
    /// Changes `threshold`, builder style.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }
    /// Pulses with the ascending run longer than this number of frames are decoded as `1`.
    #[inline]
    pub fn skip(&self) -> u32 {
        self.skip
    }
    /// Pulses with the amplitude not exceeding this value are ignored.
    #[inline]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }
}

impl Pulse {
    /// Returns the peak-to-peak amplitude of the pulse.
    #[inline]
    pub fn amplitude(&self) -> u8 {
        self.maxima - self.minima
    }
    /// Returns the bit value of this pulse.
    #[inline]
    pub fn bit(&self, config: &DemodConfig) -> bool {
        self.width > config.skip
    }
}

impl<S> PulseClassifier<S> {
    /// Returns the configuration.
    pub fn config(&self) -> &DemodConfig {
        &self.config
    }
    /// Returns the wrapped source.
    pub fn into_inner(self) -> S {
        self.src
    }
    /// Returns a shared reference to the wrapped source.
    pub fn get_ref(&self) -> &S {
        &self.src
    }
    /// Returns a mutable reference to the wrapped source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.src
    }
}

impl<S: SampleSource> PulseClassifier<S> {
    /// Creates a new `PulseClassifier` from a given [SampleSource].
    pub fn new(src: S, config: DemodConfig) -> Self {
        PulseClassifier { src, config }
    }
    /// Scans the source for the next pulse taller than the threshold.
    ///
    /// Returns `None` if the source is exhausted before such a pulse is found.
    pub fn next_pulse(&mut self) -> Option<Pulse> {
        let src = &mut self.src;
        loop {
            // descend to the minima
            let mut prev = src.read_frame()?;
            let mut next = src.read_frame()?;
            while next <= prev {
                prev = next;
                next = src.read_frame()?;
            }
            let minima = prev;
            // ascend to the maxima
            let mut width = 0u32;
            prev = next;
            next = src.read_frame()?;
            while next >= prev {
                width = width.saturating_add(1);
                prev = next;
                next = src.read_frame()?;
            }
            let pulse = Pulse { minima, maxima: prev, width };
            if pulse.amplitude() > self.config.threshold {
                return Some(pulse)
            }
        }
    }
}

impl<S: SampleSource> Iterator for PulseClassifier<S> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<bool> {
        let config = self.config;
        self.next_pulse().map(|pulse| pulse.bit(&config))
    }
}

/// Demodulates the whole `src` into a bit buffer.
///
/// `progress` is called with the fraction of the consumed frames each time the whole percent
/// value changes. It's never called if the source does not know its length.
pub fn demodulate<S, F>(src: S, config: DemodConfig, mut progress: F) -> TapeBitVec
    where S: SampleSource, F: FnMut(f32)
{
    let total = src.frames_remaining().filter(|&total| total != 0);
    let mut classifier = PulseClassifier::new(src, config);
    let mut bits = TapeBitVec::new();
    let mut percent = 0;
    debug!("demodulating: skip {} threshold {}", config.skip, config.threshold);
    while let Some(bit) = classifier.next() {
        bits.push(bit);
        if let (Some(total), Some(remaining)) = (total, classifier.get_ref().frames_remaining()) {
            let consumed = total - remaining;
            let current = consumed * 100 / total;
            if current != percent {
                percent = current;
                progress(consumed as f32 / total as f32);
            }
        }
    }
    if total.is_some() && percent != 100 {
        progress(1.0);
    }
    debug!("demodulated {} bits, {} long pulses", bits.len(), bits.count_ones());
    bits
}
