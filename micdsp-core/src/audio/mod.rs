//! Audio bus contract.
//!
//! The pipeline never talks to hardware directly. Everything it needs from the
//! microphone bus (open, blocking read with a timeout, DMA purge, release)
//! goes through [`AudioBus`], so an I2S driver, a host microphone
//! (`audio-cpal` feature) or an in-memory [`RingBus`] can sit behind it.
//!
//! # Word layout
//!
//! Buses deliver one signed 32-bit word per sample. The microphone's 16
//! significant PCM bits sit in bits 8..24 of the word, which is why the
//! converter shifts right by 8. [`bus_word_from_pcm16`] packs PCM16 into that
//! layout for buses that emulate the hardware.

#[cfg(feature = "audio-cpal")]
pub mod host;
pub mod resample;
pub mod ring;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{buffering::frame::FrameGeometry, convert::NARROW_SHIFT, error::Result};

#[cfg(feature = "audio-cpal")]
pub use host::CpalBus;
pub use ring::RingBus;

/// How long a bus read may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadTimeout {
    /// Block until the requested number of samples has arrived.
    #[default]
    Forever,
    /// Return whatever arrived once this much time has elapsed.
    After(Duration),
}

impl ReadTimeout {
    /// Absolute deadline for a read starting now; `None` means no deadline.
    pub fn deadline(self) -> Option<Instant> {
        match self {
            ReadTimeout::Forever => None,
            ReadTimeout::After(d) => Some(Instant::now() + d),
        }
    }
}

/// Bus pin assignment. `data_out` is `None` for receive-only buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinConfig {
    pub bclk: i32,
    pub ws: i32,
    pub data_in: i32,
    pub data_out: Option<i32>,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            bclk: 26,
            ws: 25,
            data_in: 33,
            data_out: None,
        }
    }
}

/// Which slot of the stereo frame carries the microphone.
///
/// I2S microphones pick their slot with a select pin; host buses read the
/// same slot from interleaved device frames (mono devices always use slot 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelFormat {
    #[default]
    OnlyLeft,
    OnlyRight,
}

/// Everything a bus needs to open: mode, rate, word width, channel, buffering, pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub port: u8,
    /// Bus is clock master and receive-only.
    pub master_rx: bool,
    pub sample_rate: u32,
    /// Width of one bus word in bits.
    pub bits_per_sample: u8,
    pub channel: ChannelFormat,
    pub dma_buf_count: usize,
    /// DMA buffer length in samples; one frame.
    pub dma_buf_len: usize,
    pub pins: PinConfig,
}

impl BusConfig {
    /// Receive-only, 32-bit, single-slot configuration sized to one frame.
    pub fn for_geometry(
        port: u8,
        geometry: FrameGeometry,
        channel: ChannelFormat,
        dma_buf_count: usize,
        pins: PinConfig,
    ) -> Self {
        Self {
            port,
            master_rx: true,
            sample_rate: geometry.sample_rate(),
            bits_per_sample: 32,
            channel,
            dma_buf_count,
            dma_buf_len: geometry.frame_size(),
            pins,
        }
    }
}

/// Contract for the hardware audio bus.
///
/// Implementations own the peripheral between `open` and `close`. Only one
/// caller may use a bus at a time; the `Session` holding it serialises access.
pub trait AudioBus: Send + 'static {
    /// Install and configure the bus and bind its pins.
    ///
    /// # Errors
    /// `MicError::BusOpen` when the peripheral cannot be configured.
    fn open(&mut self, config: &BusConfig) -> Result<()>;

    /// Read up to `dst.len()` wide samples, blocking until `dst` is full or
    /// `timeout` elapses. Returns the number of samples written, which may be
    /// less than requested (including zero) on timeout.
    ///
    /// # Errors
    /// `MicError::BusFault` on a non-recoverable bus error.
    fn read(&mut self, dst: &mut [i32], timeout: ReadTimeout) -> Result<usize>;

    /// Discard whatever the DMA buffers currently hold.
    fn zero_dma_buffer(&mut self) -> Result<()>;

    /// Release the peripheral. Calling it on a closed bus is a no-op.
    fn close(&mut self);
}

/// Pack a PCM16 sample into the bus word layout the converter expects.
#[inline]
pub fn bus_word_from_pcm16(sample: i16) -> i32 {
    (sample as i32) << NARROW_SHIFT
}

/// Pack a normalised float sample (full scale ±1.0, clamped) into a bus word.
#[inline]
pub fn bus_word_from_f32(sample: f32) -> i32 {
    bus_word_from_pcm16((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
}
