/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
//! Sources of audio frames consumed by the [pulse][crate::pulse] demodulator.
//!
//! The demodulator reads a mono signal of 8-bit unsigned samples, one frame at a time,
//! strictly forward. Recordings in other sample formats can be converted with [sample::FromSample].
pub mod sample;

pub use sample::*;

/// A forward-only source of 8-bit unsigned mono audio frames.
pub trait SampleSource {
    /// Returns the next frame or `None` if the source has been exhausted.
    fn read_frame(&mut self) -> Option<u8>;
    /// Returns the number of frames not yet read if it's known.
    fn frames_remaining(&self) -> Option<usize>;
}

/// A [SampleSource] reading frames from any byte container.
///
/// Anything that implements `AsRef<[u8]>` can be used as `T` (e.g. `&[u8]` or `Vec<u8>`).
#[derive(Clone, Debug)]
pub struct SampleCursor<T> {
    position: usize,
    data: T
}

/// A [SampleSource] reading frames from an iterator.
///
/// The number of remaining frames is known only if the iterator reports an exact size hint.
#[derive(Clone, Debug)]
pub struct SampleIter<I> {
    iter: I
}

impl<T> From<T> for SampleCursor<T> where T: AsRef<[u8]> {
    fn from(data: T) -> Self {
        SampleCursor { position: 0, data }
    }
}

impl<T> SampleCursor<T> {
    /// Returns the number of frames read so far.
    pub fn position(&self) -> usize {
        self.position
    }
    /// Returns the underlying container.
    pub fn into_inner(self) -> T {
        self.data
    }
    /// Returns a reference to the underlying container.
    pub fn get_ref(&self) -> &T {
        &self.data
    }
}

impl<T: AsRef<[u8]>> SampleCursor<T> {
    /// Returns the total number of frames.
    pub fn len(&self) -> usize {
        self.data.as_ref().len()
    }
    /// Returns `true` if there are no frames at all.
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_empty()
    }
}

impl<T: AsRef<[u8]>> SampleSource for SampleCursor<T> {
    #[inline]
    fn read_frame(&mut self) -> Option<u8> {
        let frame = self.data.as_ref().get(self.position).copied()?;
        self.position += 1;
        Some(frame)
    }

    fn frames_remaining(&self) -> Option<usize> {
        Some(self.len() - self.position)
    }
}

impl<I: Iterator<Item=u8>> From<I> for SampleIter<I> {
    fn from(iter: I) -> Self {
        SampleIter { iter }
    }
}

impl<I> SampleIter<I> {
    /// Returns the wrapped iterator.
    pub fn into_inner(self) -> I {
        self.iter
    }
}

impl<I: Iterator<Item=u8>> SampleSource for SampleIter<I> {
    #[inline]
    fn read_frame(&mut self) -> Option<u8> {
        self.iter.next()
    }

    fn frames_remaining(&self) -> Option<usize> {
        match self.iter.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower),
            _ => None
        }
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    #[inline]
    fn read_frame(&mut self) -> Option<u8> {
        (**self).read_frame()
    }

    fn frames_remaining(&self) -> Option<usize> {
        (**self).frames_remaining()
    }
}
