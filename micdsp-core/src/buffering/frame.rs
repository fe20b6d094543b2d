//! Frame geometry: the 10 ms frame contract every stage works in.

use crate::error::{MicError, Result};

/// Duration of one frame.
pub const FRAME_DURATION_MS: u64 = 10;

/// Upper bound on frames per `read` call.
pub const MAX_FRAMES_PER_BATCH: usize = 10;

/// Rates the suppression and voice-activity engines accept.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8_000, 16_000, 32_000, 48_000];

/// Frame size derived from a sample rate (`sample_rate / 100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    sample_rate: u32,
    frame_size: usize,
}

impl FrameGeometry {
    /// # Errors
    /// `MicError::UnsupportedSampleRate` unless `sample_rate` is one of
    /// [`SUPPORTED_SAMPLE_RATES`].
    pub fn new(sample_rate: u32) -> Result<Self> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(MicError::UnsupportedSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            frame_size: (sample_rate / 100) as usize,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per 10 ms frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Largest accepted request: ten frames.
    pub fn max_batch_samples(&self) -> usize {
        self.frame_size * MAX_FRAMES_PER_BATCH
    }

    /// Check a requested sample count and return the number of frames it spans.
    ///
    /// # Errors
    /// `MicError::InvalidArgument` when `requested` is zero, not a multiple of
    /// the frame size, or larger than ten frames.
    pub fn validate_request(&self, requested: usize) -> Result<usize> {
        let max = self.max_batch_samples();
        if requested < self.frame_size || requested > max || requested % self.frame_size != 0 {
            return Err(MicError::InvalidArgument {
                requested,
                frame_size: self.frame_size,
                max,
            });
        }
        Ok(requested / self.frame_size)
    }

    /// Whole frames contained in `samples`; a trailing partial frame is dropped.
    pub fn whole_frames(&self, samples: usize) -> usize {
        samples / self.frame_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_is_ten_milliseconds() {
        assert_eq!(FrameGeometry::new(8_000).unwrap().frame_size(), 80);
        assert_eq!(FrameGeometry::new(16_000).unwrap().frame_size(), 160);
        assert_eq!(FrameGeometry::new(32_000).unwrap().frame_size(), 320);
        assert_eq!(FrameGeometry::new(48_000).unwrap().frame_size(), 480);
    }

    #[test]
    fn rejects_unsupported_rates() {
        for rate in [0, 11_025, 22_050, 44_100, 96_000] {
            let err = FrameGeometry::new(rate).unwrap_err();
            assert!(matches!(err, MicError::UnsupportedSampleRate(r) if r == rate));
        }
    }

    #[test]
    fn accepts_every_whole_frame_count_up_to_ten() {
        for rate in SUPPORTED_SAMPLE_RATES {
            let geometry = FrameGeometry::new(rate).unwrap();
            let fs = geometry.frame_size();
            for frames in 1..=MAX_FRAMES_PER_BATCH {
                assert_eq!(geometry.validate_request(frames * fs).unwrap(), frames);
            }
        }
    }

    #[test]
    fn rejects_malformed_counts() {
        let geometry = FrameGeometry::new(16_000).unwrap();
        for requested in [0, 1, 150, 159, 161, 320 + 1, 1599, 1601, 1760, usize::MAX] {
            let err = geometry.validate_request(requested).unwrap_err();
            assert!(err.is_invalid_argument(), "requested={requested}");
        }
    }

    #[test]
    fn invalid_argument_reports_bounds() {
        let geometry = FrameGeometry::new(48_000).unwrap();
        match geometry.validate_request(500) {
            Err(MicError::InvalidArgument {
                requested,
                frame_size,
                max,
            }) => {
                assert_eq!(requested, 500);
                assert_eq!(frame_size, 480);
                assert_eq!(max, 4_800);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn whole_frames_drops_trailing_partial() {
        let geometry = FrameGeometry::new(16_000).unwrap();
        assert_eq!(geometry.whole_frames(0), 0);
        assert_eq!(geometry.whole_frames(159), 0);
        assert_eq!(geometry.whole_frames(160), 1);
        assert_eq!(geometry.whole_frames(479), 2);
        assert_eq!(geometry.whole_frames(1_600), 10);
    }
}
