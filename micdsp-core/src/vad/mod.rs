//! Voice Activity Detection (VAD) abstraction.
//!
//! The `VoiceActivityDetector` trait is the extensibility point for the
//! classifier: link a WebRTC-style engine on the device, use `EnergyVad` on
//! the desktop, or script decisions in tests, without touching the session.

pub mod energy;

pub use energy::EnergyVad;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Whether a given frame contains speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

impl From<bool> for VadDecision {
    fn from(speech: bool) -> Self {
        if speech {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }
}

/// Classifier sensitivity. Higher modes are more restrictive about
/// reporting speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VadMode {
    Quality = 0,
    LowBitrate = 1,
    Aggressive = 2,
    VeryAggressive = 3,
}

/// Trait for all VAD implementations.
///
/// Implementors may be stateful (hangover counters, history, etc.) but expose
/// only a binary verdict per frame.
pub trait VoiceActivityDetector: Send + 'static {
    /// Configure for `sample_rate` and `mode`.
    ///
    /// # Errors
    /// `MicError::VoiceActivityInit` if the rate or mode is rejected.
    fn init(&mut self, sample_rate: u32, mode: VadMode) -> Result<()>;

    /// Classify one frame. Frames the engine cannot handle count as silence.
    fn classify(&mut self, frame: &[i16]) -> VadDecision;

    /// Reset any internal state (e.g. hangover counters).
    fn reset(&mut self);
}
