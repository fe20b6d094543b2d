//! Energy-based VAD using RMS threshold + hangover counter.
//!
//! ## Algorithm
//!
//! 1. Compute the RMS of the frame, normalised to [0, 1] full scale.
//! 2. If RMS ≥ the mode-scaled threshold → emit `Speech`, reload hangover.
//! 3. If RMS < threshold and hangover counter > 0 → emit `Speech`,
//!    decrement counter (prevents clipping syllable endings).
//! 4. Otherwise → emit `Silence`.

use super::{VadDecision, VadMode, VoiceActivityDetector};
use crate::buffering::frame::FrameGeometry;
use crate::error::{MicError, Result};

/// Threshold multiplier per mode; stricter modes need more energy.
const MODE_SCALE: [f32; 4] = [1.0, 1.5, 2.0, 3.0];

/// A simple energy-based voice activity detector for PCM16 frames.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    /// RMS threshold at `VadMode::Quality`, as a fraction of full scale.
    base_threshold: f32,
    /// Threshold in effect after `init` applied the mode.
    threshold: f32,
    /// How many consecutive below-threshold frames still report `Speech`
    /// after real speech ends.
    hangover_frames: u32,
    hangover_counter: u32,
    /// Expected frame length; `None` until `init`.
    frame_size: Option<usize>,
}

impl EnergyVad {
    /// Create a new `EnergyVad`.
    ///
    /// # Parameters
    /// - `threshold`: RMS level (fraction of full scale) at `VadMode::Quality`.
    ///   Default: `0.01`.
    /// - `hangover_frames`: silent frames to extend speech detection.
    ///   Default: `8` (80 ms of 10 ms frames).
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            base_threshold: threshold,
            threshold,
            hangover_frames,
            hangover_counter: 0,
            frame_size: None,
        }
    }

    /// Threshold currently in effect.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples
            .iter()
            .map(|&s| {
                let v = s as f64 / 32_768.0;
                v * v
            })
            .sum();
        (sum_sq / samples.len() as f64).sqrt() as f32
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.01, 8)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn init(&mut self, sample_rate: u32, mode: VadMode) -> Result<()> {
        let geometry = FrameGeometry::new(sample_rate)
            .map_err(|e| MicError::VoiceActivityInit(e.to_string()))?;
        self.frame_size = Some(geometry.frame_size());
        self.threshold = self.base_threshold * MODE_SCALE[mode as usize];
        self.hangover_counter = 0;
        Ok(())
    }

    fn classify(&mut self, frame: &[i16]) -> VadDecision {
        if frame.is_empty() || self.frame_size.is_some_and(|fs| fs != frame.len()) {
            return VadDecision::Silence;
        }

        if Self::rms(frame) >= self.threshold {
            self.hangover_counter = self.hangover_frames;
            VadDecision::Speech
        } else if self.hangover_counter > 0 {
            self.hangover_counter -= 1;
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {
        self.hangover_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_frame() -> Vec<i16> {
        vec![0; 160]
    }

    fn loud_frame(amplitude: i16) -> Vec<i16> {
        vec![amplitude; 160]
    }

    fn ready(threshold: f32, hangover: u32, mode: VadMode) -> EnergyVad {
        let mut vad = EnergyVad::new(threshold, hangover);
        vad.init(16_000, mode).unwrap();
        vad
    }

    #[test]
    fn silence_below_threshold() {
        let mut vad = ready(0.02, 0, VadMode::Quality);
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Silence);
    }

    #[test]
    fn speech_above_threshold() {
        let mut vad = ready(0.02, 0, VadMode::Quality);
        assert_eq!(vad.classify(&loud_frame(16_000)), VadDecision::Speech);
    }

    #[test]
    fn stricter_mode_raises_threshold() {
        approx::assert_abs_diff_eq!(
            ready(0.02, 0, VadMode::Quality).threshold(),
            0.02,
            epsilon = 1e-6
        );
        approx::assert_abs_diff_eq!(
            ready(0.02, 0, VadMode::Aggressive).threshold(),
            0.04,
            epsilon = 1e-6
        );
        approx::assert_abs_diff_eq!(
            ready(0.02, 0, VadMode::VeryAggressive).threshold(),
            0.06,
            epsilon = 1e-6
        );

        // 1000 counts ≈ 0.031 full scale: above 0.02, below 0.06.
        let frame = loud_frame(1_000);
        assert_eq!(
            ready(0.02, 0, VadMode::Quality).classify(&frame),
            VadDecision::Speech
        );
        assert_eq!(
            ready(0.02, 0, VadMode::VeryAggressive).classify(&frame),
            VadDecision::Silence
        );
    }

    #[test]
    fn hangover_extends_speech() {
        let mut vad = ready(0.02, 3, VadMode::Quality);

        assert_eq!(vad.classify(&loud_frame(16_000)), VadDecision::Speech);

        assert_eq!(vad.classify(&silent_frame()), VadDecision::Speech);
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Speech);
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Speech);

        // 4th silent frame: hangover exhausted → Silence
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Silence);
    }

    #[test]
    fn reset_clears_hangover() {
        let mut vad = ready(0.02, 5, VadMode::Quality);
        vad.classify(&loud_frame(16_000));
        vad.reset();
        assert_eq!(vad.classify(&silent_frame()), VadDecision::Silence);
    }

    #[test]
    fn wrong_frame_length_is_silence() {
        let mut vad = ready(0.02, 0, VadMode::Quality);
        assert_eq!(vad.classify(&vec![16_000i16; 100]), VadDecision::Silence);
        assert_eq!(vad.classify(&[]), VadDecision::Silence);
    }

    #[test]
    fn init_rejects_unsupported_rate() {
        let mut vad = EnergyVad::default();
        let err = vad.init(44_100, VadMode::Quality).unwrap_err();
        assert!(matches!(err, MicError::VoiceActivityInit(_)));
    }

    #[test]
    fn rms_of_square_wave() {
        let samples: Vec<i16> = (0..256)
            .map(|i| if i % 2 == 0 { 16_384 } else { -16_384 })
            .collect();
        let rms = EnergyVad::rms(&samples);
        assert!((rms - 0.5).abs() < 1e-5, "rms={rms}");
    }
}
