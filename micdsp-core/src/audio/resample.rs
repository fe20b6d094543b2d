//! Sample-rate conversion for buses whose device rate differs from the session rate.
//!
//! Host microphones run at their own native rate (commonly 44.1 or 48 kHz),
//! while a session is fixed at one of the supported frame rates. `RateConverter`
//! wraps a rubato `FastFixedIn` and is driven off the real-time callback, on
//! the thread that owns the capture stream, where allocation is allowed.
//!
//! When both rates match it is a passthrough and no rubato state exists.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{MicError, Result};

/// Converts mono f32 audio from one fixed rate to another.
pub struct RateConverter {
    /// `None` in passthrough mode.
    resampler: Option<FastFixedIn<f32>>,
    /// Input held back until a full `chunk_size` block is available.
    pending: Vec<f32>,
    chunk_size: usize,
    /// `[1][output_frames_max]`, reused for every block.
    block_out: Vec<Vec<f32>>,
}

impl RateConverter {
    /// `chunk_size` is the number of input samples rubato consumes per block;
    /// one 10 ms frame at `device_rate` is a good choice.
    ///
    /// # Errors
    /// `MicError::BusOpen` if rubato rejects the ratio or chunk size.
    pub fn new(device_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if device_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                chunk_size,
                block_out: Vec::new(),
            });
        }
        if device_rate == 0 || target_rate == 0 || chunk_size == 0 {
            return Err(MicError::BusOpen(format!(
                "cannot resample {device_rate} Hz -> {target_rate} Hz in blocks of {chunk_size}"
            )));
        }

        let ratio = target_rate as f64 / device_rate as f64;
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, 1)
            .map_err(|e| MicError::BusOpen(format!("resampler init: {e}")))?;
        let block_out = vec![vec![0f32; resampler.output_frames_max()]; 1];

        info!(device_rate, target_rate, chunk_size, "resampling host audio");
        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            block_out,
        })
    }

    /// Feed `samples` and append whatever output is ready to `out`.
    ///
    /// Input short of a full block is kept for the next call.
    pub fn process(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let Some(ref mut resampler) = self.resampler else {
            out.extend_from_slice(samples);
            return;
        };

        self.pending.extend_from_slice(samples);
        let mut start = 0;
        while self.pending.len() - start >= self.chunk_size {
            let block = &self.pending[start..start + self.chunk_size];
            match resampler.process_into_buffer(&[block], &mut self.block_out, None) {
                Ok((_, produced)) => out.extend_from_slice(&self.block_out[0][..produced]),
                Err(e) => error!("resampler block failed: {e}"),
            }
            start += self.chunk_size;
        }
        self.pending.drain(..start);
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
