//! # micdsp-core
//!
//! Real-time microphone conditioning pipeline.
//!
//! ## Architecture
//!
//! ```text
//! AudioBus::read (32-bit words, up to 10 frames)
//!        │
//!        ▼   per 10 ms frame, oldest first
//! narrow >> 8 → NoiseSuppressor → GainController (optional) → VoiceActivityDetector
//!        │                                                          │
//!        ▼                                                          ▼
//!  caller's i16 buffer                                  speech count → majority vote
//! ```
//!
//! The bus and the three engines are collaborators behind traits; a
//! [`Session`] owns one of each, allocates its scratch space once in
//! [`Session::begin`], and does no heap work per `read`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod convert;
pub mod dsp;
pub mod error;
pub mod events;
pub mod monitor;
pub mod session;
pub mod vad;

// Convenience re-exports for downstream crates
pub use audio::{AudioBus, BusConfig, ChannelFormat, PinConfig, ReadTimeout, RingBus};
pub use buffering::frame::FrameGeometry;
pub use dsp::{AgcConfig, GainController, NoiseSuppressor, SuppressionPolicy};
pub use error::MicError;
pub use events::{ActivityEvent, MonitorStatus, MonitorStatusEvent};
pub use monitor::{ActivityMonitor, MonitorConfig};
pub use session::{BatchReport, Engines, Session, SessionConfig};
pub use vad::{VadDecision, VadMode, VoiceActivityDetector};

#[cfg(feature = "audio-cpal")]
pub use audio::CpalBus;
