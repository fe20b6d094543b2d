//! Noise suppression and gain control contracts.
//!
//! Both engines are opaque, stateful, frame-in/frame-out collaborators. The
//! session initialises them once at `begin` and then feeds them one 10 ms frame
//! at a time, in order. `&mut self` on the processing calls reflects that
//! state (noise estimates, gain level) is carried from frame to frame.

pub mod passthrough;

pub use passthrough::{PassthroughSuppressor, UnityGain};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Noise suppression aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuppressionPolicy {
    Mild = 0,
    Medium = 1,
    Aggressive = 2,
    VeryAggressive = 3,
}

/// Contract for noise suppression engines.
pub trait NoiseSuppressor: Send + 'static {
    /// Create internal state for `sample_rate` and apply `policy`.
    ///
    /// # Errors
    /// `MicError::NoiseSuppressionInit` if the engine rejects the configuration.
    fn init(&mut self, sample_rate: u32, policy: SuppressionPolicy) -> Result<()>;

    /// Update the noise estimate from one input frame.
    fn analyze(&mut self, frame: &[i16]);

    /// Write the suppressed version of `input` into `output` (same length).
    fn process(&mut self, input: &[i16], output: &mut [i16]);
}

/// Gain control operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgcMode {
    Unchanged = 0,
    AdaptiveAnalog = 1,
    AdaptiveDigital = 2,
    FixedDigital = 3,
}

/// Gain control settings applied at `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AgcConfig {
    pub mode: AgcMode,
    pub min_mic_level: i32,
    pub max_mic_level: i32,
    /// Target peak level in -dBFS (3 means -3 dBFS).
    pub target_level_dbfs: i16,
    pub compression_gain_db: i16,
    pub limiter_enabled: bool,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            mode: AgcMode::AdaptiveDigital,
            min_mic_level: 0,
            max_mic_level: 255,
            target_level_dbfs: 3,
            compression_gain_db: 20,
            limiter_enabled: true,
        }
    }
}

/// Per-frame result of gain control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GainOutcome {
    /// Mic level to feed into the next frame.
    pub mic_level: i32,
    /// The engine clipped or was about to.
    pub saturation: bool,
}

/// Contract for adaptive gain control engines.
pub trait GainController: Send + 'static {
    /// # Errors
    /// `MicError::GainControlInit` if the engine rejects the configuration.
    fn init(&mut self, sample_rate: u32, config: &AgcConfig) -> Result<()>;

    /// Apply gain to `frame` in place.
    fn process(&mut self, frame: &mut [i16], mic_level: i32) -> GainOutcome;
}
