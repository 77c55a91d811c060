//! Raw PCM frame helpers: frame geometry, sample conversion and the
//! lock-free scalar cells shared between a stream and its pacer.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::StreamError;

/// Bytes per signed 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Geometry of the mono frames exchanged with the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Samples per frame
    pub frame_size: usize,
}

impl FrameFormat {
    pub const fn new(sample_rate: u32, frame_size: usize) -> Self {
        Self { sample_rate, frame_size }
    }

    /// Both fields must be non-zero for the frame to have a duration.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.sample_rate == 0 || self.frame_size == 0 {
            return Err(StreamError::InvalidFormat {
                sample_rate: self.sample_rate,
                frame_size: self.frame_size,
            });
        }
        Ok(())
    }

    /// Wall-clock duration of one frame, which is also the pacing tick.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.frame_size as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Number of decoder bytes consumed per tick.
    pub fn frame_bytes(&self) -> usize {
        self.frame_size * BYTES_PER_SAMPLE
    }
}

impl Default for FrameFormat {
    /// 48 kHz, 10 ms frames.
    fn default() -> Self {
        Self::new(48000, 480)
    }
}

/// Scale one sample by `volume` and cast back to 16 bits.
///
/// Not clamped: results outside the i16 range wrap like fixed-width
/// integer arithmetic (`2.0 * 30000` becomes `-5536`).
#[inline]
pub fn scale_sample(sample: i16, volume: f32) -> i16 {
    (volume * sample as f32) as i64 as i16
}

/// Reinterpret little-endian bytes as samples and volume-scale them into `out`.
///
/// `bytes` must hold exactly `out.len() * 2` bytes.
pub fn decode_scaled(bytes: &[u8], volume: f32, out: &mut [i16]) {
    debug_assert_eq!(bytes.len(), out.len() * BYTES_PER_SAMPLE);
    for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(BYTES_PER_SAMPLE)) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        *dst = scale_sample(sample, volume);
    }
}

/// An `f32` stored as raw bits so it can be read and written without a lock.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// An `f64` stored as raw bits so it can be read and written without a lock.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_wraps_instead_of_clamping() {
        assert_eq!(scale_sample(30000, 2.0), -5536);
        assert_eq!(scale_sample(-30000, 2.0), 5536);
    }

    #[test]
    fn zero_volume_is_silence() {
        for s in [i16::MIN, -1, 0, 1, 12345, i16::MAX] {
            assert_eq!(scale_sample(s, 0.0), 0);
        }
    }

    #[test]
    fn scaling_truncates_toward_zero() {
        assert_eq!(scale_sample(3, 1.5), 4);
        assert_eq!(scale_sample(-3, 1.5), -4);
        assert_eq!(scale_sample(1000, 0.5), 500);
    }

    #[test]
    fn decode_reads_little_endian() {
        let bytes = [0x01, 0x00, 0xff, 0xff, 0x79, 0x0a];
        let mut out = [0i16; 3];
        decode_scaled(&bytes, 1.0, &mut out);
        assert_eq!(out, [1, -1, 0x0a79]);
    }

    #[test]
    fn frame_interval_matches_rate() {
        let format = FrameFormat::default();
        assert_eq!(format.interval(), Duration::from_millis(10));
        assert_eq!(format.frame_bytes(), 960);
    }

    #[test]
    fn zero_rate_or_frame_size_is_invalid() {
        assert!(FrameFormat::default().validate().is_ok());
        assert!(matches!(
            FrameFormat::new(0, 480).validate(),
            Err(StreamError::InvalidFormat { sample_rate: 0, .. })
        ));
        assert!(matches!(
            FrameFormat::new(48000, 0).validate(),
            Err(StreamError::InvalidFormat { frame_size: 0, .. })
        ));
    }

    #[test]
    fn atomic_cells_round_trip_values() {
        let v = AtomicF32::new(1.0);
        v.store(-3.25);
        assert_eq!(v.load(), -3.25);

        let e = AtomicF64::new(0.0);
        e.store(5.125);
        assert_eq!(e.load(), 5.125);
    }
}
