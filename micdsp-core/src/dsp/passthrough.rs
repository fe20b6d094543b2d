//! Identity engines.
//!
//! Used when no real suppression/gain engine is linked (desktop replay, tests).
//! They honour the contracts (init, frame-in/frame-out) without changing audio.

use tracing::debug;

use super::{AgcConfig, GainController, GainOutcome, NoiseSuppressor, SuppressionPolicy};
use crate::error::{MicError, Result};

/// Copies every frame through unchanged.
#[derive(Debug, Default)]
pub struct PassthroughSuppressor {
    sample_rate: Option<u32>,
    frames: u64,
}

impl PassthroughSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames processed since `init`.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl NoiseSuppressor for PassthroughSuppressor {
    fn init(&mut self, sample_rate: u32, policy: SuppressionPolicy) -> Result<()> {
        if sample_rate == 0 {
            return Err(MicError::NoiseSuppressionInit("sample rate is zero".into()));
        }
        debug!(sample_rate, ?policy, "PassthroughSuppressor::init");
        self.sample_rate = Some(sample_rate);
        self.frames = 0;
        Ok(())
    }

    fn analyze(&mut self, _frame: &[i16]) {}

    fn process(&mut self, input: &[i16], output: &mut [i16]) {
        output.copy_from_slice(input);
        self.frames += 1;
    }
}

/// Leaves the level untouched; flags saturation when a sample sits on a rail.
#[derive(Debug, Default)]
pub struct UnityGain {
    config: Option<AgcConfig>,
}

impl UnityGain {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GainController for UnityGain {
    fn init(&mut self, sample_rate: u32, config: &AgcConfig) -> Result<()> {
        if config.min_mic_level > config.max_mic_level {
            return Err(MicError::GainControlInit(format!(
                "min mic level {} exceeds max {}",
                config.min_mic_level, config.max_mic_level
            )));
        }
        debug!(sample_rate, ?config, "UnityGain::init");
        self.config = Some(*config);
        Ok(())
    }

    fn process(&mut self, frame: &mut [i16], mic_level: i32) -> GainOutcome {
        let saturation = frame.iter().any(|&s| s == i16::MAX || s == i16::MIN);
        let mic_level = match self.config {
            Some(cfg) => mic_level.clamp(cfg.min_mic_level, cfg.max_mic_level),
            None => mic_level,
        };
        GainOutcome {
            mic_level,
            saturation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressor_copies_input() {
        let mut ns = PassthroughSuppressor::new();
        ns.init(16_000, SuppressionPolicy::VeryAggressive).unwrap();
        let input: Vec<i16> = (0..160).map(|i| i as i16 * 3 - 200).collect();
        let mut output = vec![0i16; 160];
        ns.analyze(&input);
        ns.process(&input, &mut output);
        assert_eq!(output, input);
        assert_eq!(ns.frames(), 1);
    }

    #[test]
    fn suppressor_rejects_zero_rate() {
        let mut ns = PassthroughSuppressor::new();
        assert!(ns.init(0, SuppressionPolicy::Mild).is_err());
    }

    #[test]
    fn unity_gain_leaves_frame_and_flags_rails() {
        let mut agc = UnityGain::new();
        agc.init(16_000, &AgcConfig::default()).unwrap();

        let mut quiet = vec![100i16; 160];
        let outcome = agc.process(&mut quiet, 0);
        assert!(quiet.iter().all(|&s| s == 100));
        assert!(!outcome.saturation);

        let mut clipped = vec![0i16; 160];
        clipped[42] = i16::MAX;
        assert!(agc.process(&mut clipped, 0).saturation);
    }

    #[test]
    fn unity_gain_clamps_mic_level() {
        let mut agc = UnityGain::new();
        agc.init(16_000, &AgcConfig::default()).unwrap();
        assert_eq!(agc.process(&mut [0i16; 80], 999).mic_level, 255);
        assert_eq!(agc.process(&mut [0i16; 80], -4).mic_level, 0);
    }

    #[test]
    fn unity_gain_rejects_inverted_levels() {
        let mut agc = UnityGain::new();
        let cfg = AgcConfig {
            min_mic_level: 10,
            max_mic_level: 5,
            ..AgcConfig::default()
        };
        assert!(agc.init(16_000, &cfg).is_err());
    }
}
