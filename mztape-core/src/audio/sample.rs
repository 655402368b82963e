/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
//! Conversions of various PCM sample formats to the 8-bit unsigned frames read by the demodulator.

/// Provides various methods to primitive types being used as audio samples.
pub trait AudioSample: Copy + Default + 'static {
    /// Creates a silent sample value (with zero amplitude).
    #[inline(always)]
    fn silence() -> Self {
        Self::default()
    }
}

/// For converting samples between types.
pub trait FromSample<S> {
    /// Converts to Self a sample from the `other`.
    fn from_sample(other: S) -> Self;
}

/// For converting samples between types.
pub trait IntoSample<S> {
    /// Convert to `S` a sample type from `self`.
    fn into_sample(self) -> S;
}

impl AudioSample for f32 {}
impl AudioSample for i32 {}
impl AudioSample for i16 {}
impl AudioSample for i8 {}
impl AudioSample for u8 {
    #[inline(always)]
    fn silence() -> Self {
        0x80
    }
}

impl<S: FromSample<T>, T> IntoSample<S> for T {
    #[inline]
    fn into_sample(self) -> S {
        S::from_sample(self)
    }
}

impl<T: AudioSample> FromSample<T> for T {
    #[inline(always)]
    fn from_sample(other: T) -> T {
        other
    }
}

impl FromSample<i8> for u8 {
    #[inline]
    fn from_sample(other: i8) -> u8 {
        other.wrapping_sub(i8::MIN) as u8
    }
}

impl FromSample<u8> for i8 {
    #[inline]
    fn from_sample(other: u8) -> i8 {
        other.wrapping_sub(i8::MIN as u8) as i8
    }
}

macro_rules! impl_into_pcm8 {
    ($($int:ty),*) => {$(
        impl FromSample<$int> for u8 {
            #[inline]
            fn from_sample(other: $int) -> u8 {
                u8::from_sample((other >> (<$int>::BITS - i8::BITS)) as i8)
            }
        }
    )*};
}

impl_into_pcm8!(i16, i32);

impl FromSample<f32> for i8 {
    #[inline]
    fn from_sample(other: f32) -> i8 {
        let other = other.clamp(-1.0, 1.0);
        if other >= 0.0 {
            (other * i8::MAX as f32) as i8
        } else {
            (-other * i8::MIN as f32) as i8
        }
    }
}

impl FromSample<f32> for u8 {
    #[inline]
    fn from_sample(other: f32) -> u8 {
        u8::from_sample(i8::from_sample(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm8_from_sample_works() {
        assert_eq!(0x80, u8::silence());
        assert_eq!(u8::from_sample(0i8), u8::silence());
        assert_eq!(0, u8::from_sample(i8::MIN));
        assert_eq!(255, u8::from_sample(i8::MAX));
        assert_eq!(i8::MIN, i8::from_sample(0u8));
        assert_eq!(0, i8::from_sample(0x80u8));
        assert_eq!(0x80, u8::from_sample(0i16));
        assert_eq!(0, u8::from_sample(i16::MIN));
        assert_eq!(255, u8::from_sample(i16::MAX));
        assert_eq!(0x81, u8::from_sample(0x01ffi16));
        assert_eq!(0x7f, u8::from_sample(-1i16));
        assert_eq!(0, u8::from_sample(i32::MIN));
        assert_eq!(255, u8::from_sample(i32::MAX));
        assert_eq!(0x80, u8::from_sample(0.0f32));
        assert_eq!(255, u8::from_sample(1.0f32));
        assert_eq!(0, u8::from_sample(-1.0f32));
        assert_eq!(255, u8::from_sample(7.5f32));
        let sample: u8 = 42u8.into_sample();
        assert_eq!(42, sample);
        let sample: u8 = (-128i8).into_sample();
        assert_eq!(0, sample);
    }
}
