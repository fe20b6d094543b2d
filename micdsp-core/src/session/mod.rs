//! `Session`: owner of the bus and the three engines.
//!
//! ## Lifecycle
//!
//! ```text
//! Session::new(bus, engines)
//!     └─► begin(&config)   → bus open, DMA purge, settle reads,
//!                            NS init, AGC init, VAD init, scratch allocated
//!         └─► read(..)     → any number of batch reads
//!             └─► drop     → bus released
//! ```
//!
//! `begin` is all-or-nothing: each step runs only if the previous one
//! succeeded, and a failure closes the bus again and leaves the session
//! unusable (`read` returns `MicError::NotInitialized`) until a later `begin`
//! succeeds. Calling `begin` on a ready session starts over from scratch.
//!
//! ## Threading
//!
//! A session is `Send` but not `Sync`: every call takes `&mut self`, so
//! callers are forced to serialise access (see [`crate::monitor`] for a
//! dedicated-thread driver).

pub mod batch;
pub mod diagnostics;

pub use batch::{majority_vote, BatchReport};
pub use diagnostics::{DiagnosticsSnapshot, SessionDiagnostics};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    audio::{AudioBus, BusConfig, ChannelFormat, PinConfig, ReadTimeout},
    buffering::frame::{FrameGeometry, FRAME_DURATION_MS},
    dsp::{
        AgcConfig, GainController, NoiseSuppressor, PassthroughSuppressor, SuppressionPolicy,
        UnityGain,
    },
    error::{MicError, Result},
    vad::{EnergyVad, VadMode, VoiceActivityDetector},
};

const DMA_BUF_COUNT_RANGE: (usize, usize) = (2, 128);
const MAX_SETTLE_READS: usize = 100;

/// Configuration applied by [`Session::begin`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct SessionConfig {
    /// Bus identifier.
    pub port: u8,
    /// Must be 8000, 16000, 32000 or 48000. Default: 16000.
    pub sample_rate: u32,
    pub pins: PinConfig,
    /// Stereo slot the microphone is wired to. Default: left.
    pub channel: ChannelFormat,
    /// Number of DMA buffers, each one frame long. Default: 8.
    pub dma_buf_count: usize,
    /// Frame-sized reads discarded after the bus opens to let the DC offset
    /// settle. Default: 20 (200 ms).
    pub settle_reads: usize,
    pub suppression_policy: SuppressionPolicy,
    pub agc: AgcConfig,
    pub vad_mode: VadMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: 0,
            sample_rate: 16_000,
            pins: PinConfig::default(),
            channel: ChannelFormat::OnlyLeft,
            dma_buf_count: 8,
            settle_reads: 20,
            suppression_policy: SuppressionPolicy::VeryAggressive,
            agc: AgcConfig::default(),
            vad_mode: VadMode::VeryAggressive,
        }
    }
}

impl SessionConfig {
    /// Clamp buffering and settling values into their supported ranges.
    pub fn normalize(&mut self) {
        self.dma_buf_count = self
            .dma_buf_count
            .clamp(DMA_BUF_COUNT_RANGE.0, DMA_BUF_COUNT_RANGE.1);
        self.settle_reads = self.settle_reads.min(MAX_SETTLE_READS);
    }
}

/// The three processing engines a session owns exclusively.
pub struct Engines {
    pub suppressor: Box<dyn NoiseSuppressor>,
    pub gain: Box<dyn GainController>,
    pub vad: Box<dyn VoiceActivityDetector>,
}

impl Engines {
    pub fn new<N, G, V>(suppressor: N, gain: G, vad: V) -> Self
    where
        N: NoiseSuppressor,
        G: GainController,
        V: VoiceActivityDetector,
    {
        Self {
            suppressor: Box::new(suppressor),
            gain: Box::new(gain),
            vad: Box::new(vad),
        }
    }

    /// Identity suppression and gain with the energy VAD.
    pub fn reference() -> Self {
        Self::new(
            PassthroughSuppressor::new(),
            UnityGain::new(),
            EnergyVad::default(),
        )
    }
}

impl std::fmt::Debug for Engines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engines").finish_non_exhaustive()
    }
}

/// State that exists only after a successful `begin`.
struct Prepared {
    geometry: FrameGeometry,
    /// Wide capture scratch, sized to the largest batch.
    wide: Vec<i32>,
    /// One narrowed frame, input to the suppressor.
    narrow: Vec<i16>,
    /// Level carried from one AGC call to the next.
    mic_level: i32,
}

/// The single owning instance of the pipeline for one bus.
pub struct Session {
    bus: Box<dyn AudioBus>,
    bus_open: bool,
    engines: Engines,
    prepared: Option<Prepared>,
    diagnostics: Arc<SessionDiagnostics>,
}

impl Session {
    /// Take ownership of a bus and the engines. Nothing is opened until `begin`.
    pub fn new<B: AudioBus>(bus: B, engines: Engines) -> Self {
        Self {
            bus: Box::new(bus),
            bus_open: false,
            engines,
            prepared: None,
            diagnostics: Arc::new(SessionDiagnostics::default()),
        }
    }

    /// Open the bus and initialise every engine.
    ///
    /// # Errors
    /// - `MicError::UnsupportedSampleRate` before the bus is touched.
    /// - `MicError::BusOpen` if the bus cannot be configured.
    /// - `MicError::NoiseSuppressionInit` / `GainControlInit` /
    ///   `VoiceActivityInit` if the corresponding engine fails.
    pub fn begin(&mut self, config: &SessionConfig) -> Result<()> {
        self.prepared = None;
        self.release_bus();

        let mut config = config.clone();
        config.normalize();

        match self.prepare(&config) {
            Ok(prepared) => {
                self.prepared = Some(prepared);
                self.diagnostics.reset();
                info!("initialisation complete");
                Ok(())
            }
            Err(e) => {
                error!("initialisation failed: {e}");
                self.release_bus();
                Err(e)
            }
        }
    }

    fn prepare(&mut self, config: &SessionConfig) -> Result<Prepared> {
        let geometry = FrameGeometry::new(config.sample_rate)?;
        let fs = geometry.frame_size();

        info!(
            port = config.port,
            sample_rate = config.sample_rate,
            frame_size = fs,
            "initialising audio bus"
        );
        let bus_config = BusConfig::for_geometry(
            config.port,
            geometry,
            config.channel,
            config.dma_buf_count,
            config.pins,
        );
        self.bus.open(&bus_config)?;
        self.bus_open = true;
        self.bus.zero_dma_buffer()?;
        info!("audio bus ready");

        let mut wide = vec![0i32; geometry.max_batch_samples()];

        if config.settle_reads > 0 {
            info!(
                reads = config.settle_reads,
                ms = config.settle_reads as u64 * FRAME_DURATION_MS,
                "purging initial DC offset"
            );
            for _ in 0..config.settle_reads {
                if let Err(e) = self.bus.read(&mut wide[..fs], ReadTimeout::Forever) {
                    warn!("settling read failed: {e}");
                }
            }
        }

        self.engines
            .suppressor
            .init(config.sample_rate, config.suppression_policy)
            .map_err(|e| match e {
                MicError::NoiseSuppressionInit(_) => e,
                other => MicError::NoiseSuppressionInit(other.to_string()),
            })?;
        info!(policy = ?config.suppression_policy, "noise suppression ready");

        self.engines
            .gain
            .init(config.sample_rate, &config.agc)
            .map_err(|e| match e {
                MicError::GainControlInit(_) => e,
                other => MicError::GainControlInit(other.to_string()),
            })?;
        info!(
            target_dbfs = config.agc.target_level_dbfs,
            compression_db = config.agc.compression_gain_db,
            limiter = config.agc.limiter_enabled,
            "gain control ready"
        );

        self.engines
            .vad
            .init(config.sample_rate, config.vad_mode)
            .map_err(|e| match e {
                MicError::VoiceActivityInit(_) => e,
                other => MicError::VoiceActivityInit(other.to_string()),
            })?;
        info!(mode = ?config.vad_mode, "voice activity detection ready");

        Ok(Prepared {
            geometry,
            wide,
            narrow: vec![0i16; fs],
            mic_level: config.agc.min_mic_level,
        })
    }

    /// `true` after a successful `begin`.
    pub fn is_ready(&self) -> bool {
        self.prepared.is_some()
    }

    /// Frame geometry in effect, if ready.
    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.prepared.as_ref().map(|p| p.geometry)
    }

    /// Samples per frame, if ready.
    pub fn frame_size(&self) -> Option<usize> {
        self.geometry().map(|g| g.frame_size())
    }

    /// Shared counters; clone the `Arc` to observe a session owned elsewhere.
    pub fn diagnostics(&self) -> Arc<SessionDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Release the bus, drop the prepared state and clear classifier history.
    /// `begin` may be called again.
    pub fn end(&mut self) {
        self.prepared = None;
        self.engines.vad.reset();
        self.release_bus();
    }

    fn release_bus(&mut self) {
        if self.bus_open {
            self.bus.close();
            self.bus_open = false;
            info!("audio bus released");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release_bus();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ready", &self.is_ready())
            .field("geometry", &self.geometry())
            .finish_non_exhaustive()
    }
}
