//! Batch read: capture → per frame (narrow → suppress → gain → classify) → vote.
//!
//! ## Stages (per call)
//!
//! ```text
//! 1. Validate the requested sample count (1..=10 whole frames)
//! 2. Capture up to that many wide samples from the bus
//! 3. Drop any trailing partial frame
//! 4. For each whole frame, oldest first:
//!    a. narrow 32 → 16 bit into the session scratch frame
//!    b. noise suppression: analyze, then process into the caller's buffer
//!    c. gain control in place (only when enabled for this call)
//!    d. voice activity classification, counting speech frames
//! 5. Majority vote over the processed frames
//! ```

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::Session;
use crate::{
    audio::ReadTimeout,
    convert::narrow_frame,
    error::{MicError, Result},
};

/// Outcome of one [`Session::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Narrow samples written to the output buffer (`frames × frame_size`).
    pub samples_read: usize,
    /// Whole frames processed.
    pub frames: usize,
    /// Frames the classifier marked as speech.
    pub speech_frames: usize,
    /// Strict-majority verdict over `frames`; `false` when nothing was processed.
    pub is_speech: bool,
    /// Gain control reported saturation on at least one frame.
    pub saturated: bool,
}

impl BatchReport {
    /// Fraction of processed frames classified as speech.
    pub fn speech_ratio(&self) -> Option<f32> {
        (self.frames > 0).then(|| self.speech_frames as f32 / self.frames as f32)
    }
}

/// `true` iff strictly more than half of `frames` were speech.
///
/// Ties go to "not speech"; zero frames is never speech.
pub fn majority_vote(speech_frames: usize, frames: usize) -> bool {
    frames > 0 && speech_frames * 2 > frames
}

impl Session {
    /// Capture and process `output.len()` samples.
    ///
    /// The request must be a whole number of frames between one and ten. On
    /// return, the first `samples_read` samples of `output` hold the
    /// processed audio; anything past that is left untouched. A bus that
    /// delivers fewer samples before `timeout` is not an error.
    ///
    /// # Errors
    /// - `MicError::NotInitialized` before a successful `begin`.
    /// - `MicError::InvalidArgument` for a malformed length; the bus is not touched.
    /// - Whatever the bus returns for a read fault, unchanged.
    pub fn read(
        &mut self,
        output: &mut [i16],
        timeout: ReadTimeout,
        agc_enabled: bool,
    ) -> Result<BatchReport> {
        let Some(prepared) = self.prepared.as_mut() else {
            return Err(MicError::NotInitialized);
        };
        let diagnostics = &self.diagnostics;
        let geometry = prepared.geometry;
        let fs = geometry.frame_size();
        let requested = output.len();

        if let Err(e) = geometry.validate_request(requested) {
            diagnostics.invalid_requests.fetch_add(1, Ordering::Relaxed);
            error!(
                requested,
                frame_size = fs,
                max = geometry.max_batch_samples(),
                "sample count must be a whole number of frames"
            );
            return Err(e);
        }

        let captured = match self.bus.read(&mut prepared.wide[..requested], timeout) {
            Ok(n) => n.min(requested),
            Err(e) => {
                diagnostics.bus_faults.fetch_add(1, Ordering::Relaxed);
                warn!("bus read failed: {e}");
                return Err(e);
            }
        };

        let frames = geometry.whole_frames(captured);
        let samples_read = frames * fs;
        diagnostics.batches.fetch_add(1, Ordering::Relaxed);
        if captured < requested {
            diagnostics.short_reads.fetch_add(1, Ordering::Relaxed);
            diagnostics
                .discarded_samples
                .fetch_add(captured - samples_read, Ordering::Relaxed);
            debug!(captured, requested, frames, "short capture");
        }

        let mut speech_frames = 0usize;
        let mut saturated = false;

        for (wide, out) in prepared.wide[..samples_read]
            .chunks_exact(fs)
            .zip(output.chunks_exact_mut(fs))
        {
            narrow_frame(wide, &mut prepared.narrow);

            self.engines.suppressor.analyze(&prepared.narrow);
            self.engines.suppressor.process(&prepared.narrow, out);

            if agc_enabled {
                let outcome = self.engines.gain.process(out, prepared.mic_level);
                prepared.mic_level = outcome.mic_level;
                if outcome.saturation {
                    saturated = true;
                    diagnostics.saturation_events.fetch_add(1, Ordering::Relaxed);
                }
            }

            if self.engines.vad.classify(out).is_speech() {
                speech_frames += 1;
            }
        }

        diagnostics
            .frames_processed
            .fetch_add(frames, Ordering::Relaxed);
        diagnostics
            .speech_frames
            .fetch_add(speech_frames, Ordering::Relaxed);

        let report = BatchReport {
            samples_read,
            frames,
            speech_frames,
            is_speech: majority_vote(speech_frames, frames),
            saturated,
        };
        debug!(
            frames,
            speech_frames,
            is_speech = report.is_speech,
            agc_enabled,
            "batch processed"
        );
        Ok(report)
    }
}
