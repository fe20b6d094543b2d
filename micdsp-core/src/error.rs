use thiserror::Error;

/// All errors produced by micdsp-core.
#[derive(Debug, Error)]
pub enum MicError {
    #[error("unsupported sample rate: {0} Hz (expected 8000, 16000, 32000 or 48000)")]
    UnsupportedSampleRate(u32),

    #[error("audio bus open failed: {0}")]
    BusOpen(String),

    #[error("audio bus fault: {0}")]
    BusFault(String),

    #[error("noise suppression init failed: {0}")]
    NoiseSuppressionInit(String),

    #[error("gain control init failed: {0}")]
    GainControlInit(String),

    #[error("voice activity init failed: {0}")]
    VoiceActivityInit(String),

    #[error(
        "invalid sample count {requested}: must be a multiple of {frame_size} in [{frame_size}, {max}]"
    )]
    InvalidArgument {
        requested: usize,
        frame_size: usize,
        max: usize,
    },

    #[error("session is not initialised; call begin() first")]
    NotInitialized,

    #[error("monitor is already running")]
    AlreadyRunning,

    #[error("monitor is not running")]
    NotRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MicError {
    /// `true` for the caller-error class that is rejected before any bus access.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, MicError::InvalidArgument { .. })
    }
}

pub type Result<T> = std::result::Result<T, MicError>;
