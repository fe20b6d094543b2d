//! Host microphone bus via cpal.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS), but an [`AudioBus`] must be `Send` so a session can move between
//! threads. `CpalBus` therefore builds and drops the stream on a dedicated
//! thread it owns.
//!
//! # Data path
//!
//! ```text
//! cpal callback (device rate, interleaved)
//!     └─► pick the configured slot → f32 → capture ring
//! pump thread
//!     └─► RateConverter (device rate → session rate) → bus words → wide ring
//! Session::read
//!     └─► RingBus pops the wide ring
//! ```
//!
//! The device is always opened at its native rate; resampling happens on the
//! pump thread, never in the callback. The callback must not allocate once
//! running, block, or perform I/O. Its scratch buffer grows on the first
//! callbacks and is reused after.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream,
};
use ringbuf::{traits::Split, HeapCons, HeapProd, HeapRb};
use tracing::{error, info, warn};

use super::{
    bus_word_from_f32, resample::RateConverter, ring::RingBus, AudioBus, BusConfig, ChannelFormat,
    ReadTimeout,
};
use crate::{
    buffering::{create_wide_ring, Consumer, Producer, WideProducer, RING_CAPACITY},
    error::{MicError, Result},
};

/// Pump-thread sleep when the capture ring is empty.
const PUMP_IDLE: Duration = Duration::from_millis(5);

/// [`AudioBus`] backed by a cpal input device.
pub struct CpalBus {
    preferred_device: Option<String>,
    ring: Option<RingBus>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CpalBus {
    /// Use the system default input device.
    pub fn new() -> Self {
        Self::with_preference(None)
    }

    /// Prefer an input device by name, falling back to the default device.
    pub fn with_preference(preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            ring: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl Default for CpalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBus for CpalBus {
    fn open(&mut self, config: &BusConfig) -> Result<()> {
        self.close();

        let (wide_producer, wide_consumer) = create_wide_ring(RING_CAPACITY);
        let mut ring = RingBus::from_consumer(wide_consumer);
        ring.open(config)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let preferred = self.preferred_device.clone();
        let target_rate = config.sample_rate;
        let channel = config.channel;

        let (open_tx, open_rx) = mpsc::channel::<Result<u32>>();

        let worker = thread::spawn(move || {
            let (capture_producer, capture_consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();

            // The stream is created and dropped on this thread only.
            let opened = build_stream(
                capture_producer,
                Arc::clone(&running),
                preferred.as_deref(),
                channel,
            )
            .and_then(|(stream, device_rate)| {
                let converter =
                    RateConverter::new(device_rate, target_rate, (device_rate / 100) as usize)?;
                Ok((stream, device_rate, converter))
            });

            let (stream, converter) = match opened {
                Ok((stream, device_rate, converter)) => {
                    let _ = open_tx.send(Ok(device_rate));
                    (stream, converter)
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            pump(capture_consumer, converter, wide_producer, &running);
            drop(stream);
        });

        match open_rx.recv() {
            Ok(Ok(device_rate)) => {
                self.ring = Some(ring);
                self.worker = Some(worker);
                info!(device_rate, target_rate, "host microphone bus open");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(MicError::BusOpen("capture thread died unexpectedly".into()))
            }
        }
    }

    fn read(&mut self, dst: &mut [i32], timeout: ReadTimeout) -> Result<usize> {
        match self.ring.as_mut() {
            Some(ring) => ring.read(dst, timeout),
            None => Err(MicError::BusFault("host microphone bus is not open".into())),
        }
    }

    fn zero_dma_buffer(&mut self) -> Result<()> {
        match self.ring.as_mut() {
            Some(ring) => ring.zero_dma_buffer(),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("capture thread panicked during shutdown");
            }
        }
        if let Some(mut ring) = self.ring.take() {
            ring.close();
        }
    }
}

impl Drop for CpalBus {
    fn drop(&mut self) {
        self.close();
    }
}

/// Move captured audio through the rate converter into the wide ring until
/// `running` clears.
fn pump(
    mut capture: HeapCons<f32>,
    mut converter: RateConverter,
    mut wide: WideProducer,
    running: &AtomicBool,
) {
    let mut raw = vec![0f32; 4_096];
    let mut converted: Vec<f32> = Vec::with_capacity(4_096);
    let mut words: Vec<i32> = Vec::with_capacity(4_096);

    while running.load(Ordering::Relaxed) {
        let n = capture.pop_slice(&mut raw);
        if n == 0 {
            thread::sleep(PUMP_IDLE);
            continue;
        }

        converted.clear();
        converter.process(&raw[..n], &mut converted);

        words.clear();
        words.extend(converted.iter().map(|&s| bus_word_from_f32(s)));
        let written = wide.push_slice(&words);
        if written < words.len() {
            warn!("wide ring full: dropped {} samples", words.len() - written);
        }
    }
}

/// Copy one slot of each interleaved frame into `scratch` as f32 and push it.
fn push_slot<T: Copy>(
    data: &[T],
    channels: usize,
    slot: usize,
    scratch: &mut Vec<f32>,
    producer: &mut HeapProd<f32>,
    to_f32: impl Fn(T) -> f32,
) {
    scratch.clear();
    scratch.extend(data.chunks_exact(channels).map(|frame| to_f32(frame[slot])));
    let written = producer.push_slice(scratch);
    if written < scratch.len() {
        warn!("capture ring full: dropped {} samples", scratch.len() - written);
    }
}

/// Build and start the input stream at the device's native rate.
///
/// Returns the stream together with that rate.
fn build_stream(
    mut producer: HeapProd<f32>,
    running: Arc<AtomicBool>,
    preferred_device_name: Option<&str>,
    channel: ChannelFormat,
) -> Result<(Stream, u32)> {
    let host = cpal::default_host();

    let mut selected = None;
    if let Some(preferred) = preferred_device_name {
        match host.input_devices() {
            Ok(mut devices) => {
                selected = devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                if selected.is_none() {
                    warn!("preferred input device '{}' not found, falling back", preferred);
                }
            }
            Err(e) => warn!("failed to list input devices: {e}"),
        }
    }

    let device = match selected {
        Some(d) => d,
        None => host
            .default_input_device()
            .ok_or_else(|| MicError::BusOpen("no default input device found".into()))?,
    };

    info!(
        device = device.name().unwrap_or_default().as_str(),
        "opening input device"
    );

    let supported = device
        .default_input_config()
        .map_err(|e| MicError::BusOpen(e.to_string()))?;
    let device_rate = supported.sample_rate().0;
    let ch = supported.channels().max(1) as usize;
    let slot = match channel {
        ChannelFormat::OnlyLeft => 0,
        ChannelFormat::OnlyRight => 1,
    }
    .min(ch - 1);
    let config = supported.config();

    info!(device_rate, channels = ch, slot, "audio config selected");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let mut scratch: Vec<f32> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    if running.load(Ordering::Relaxed) {
                        push_slot(data, ch, slot, &mut scratch, &mut producer, |s| s);
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
        }
        SampleFormat::I16 => {
            let mut scratch: Vec<f32> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    if running.load(Ordering::Relaxed) {
                        push_slot(data, ch, slot, &mut scratch, &mut producer, |s| {
                            s as f32 / 32_768.0
                        });
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
        }
        SampleFormat::I32 => {
            let mut scratch: Vec<f32> = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i32], _info| {
                    if running.load(Ordering::Relaxed) {
                        push_slot(data, ch, slot, &mut scratch, &mut producer, |s| {
                            s as f32 / 2_147_483_648.0
                        });
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
        }
        fmt => {
            return Err(MicError::BusOpen(format!(
                "unsupported sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| MicError::BusOpen(e.to_string()))?;

    stream
        .play()
        .map_err(|e| MicError::BusOpen(e.to_string()))?;

    Ok((stream, device_rate))
}
