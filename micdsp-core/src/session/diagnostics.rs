use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Running counters for one session, updated by every `read`.
#[derive(Debug, Default)]
pub struct SessionDiagnostics {
    pub batches: AtomicUsize,
    pub frames_processed: AtomicUsize,
    pub speech_frames: AtomicUsize,
    pub short_reads: AtomicUsize,
    pub discarded_samples: AtomicUsize,
    pub saturation_events: AtomicUsize,
    pub bus_faults: AtomicUsize,
    pub invalid_requests: AtomicUsize,
}

impl SessionDiagnostics {
    pub fn reset(&self) {
        self.batches.store(0, Ordering::Relaxed);
        self.frames_processed.store(0, Ordering::Relaxed);
        self.speech_frames.store(0, Ordering::Relaxed);
        self.short_reads.store(0, Ordering::Relaxed);
        self.discarded_samples.store(0, Ordering::Relaxed);
        self.saturation_events.store(0, Ordering::Relaxed);
        self.bus_faults.store(0, Ordering::Relaxed);
        self.invalid_requests.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            speech_frames: self.speech_frames.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            discarded_samples: self.discarded_samples.load(Ordering::Relaxed),
            saturation_events: self.saturation_events.load(Ordering::Relaxed),
            bus_faults: self.bus_faults.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub batches: usize,
    pub frames_processed: usize,
    pub speech_frames: usize,
    pub short_reads: usize,
    pub discarded_samples: usize,
    pub saturation_events: usize,
    pub bus_faults: usize,
    pub invalid_requests: usize,
}

impl DiagnosticsSnapshot {
    /// Share of processed frames classified as speech over the session;
    /// `None` until a frame has been processed.
    pub fn speech_ratio(&self) -> Option<f64> {
        (self.frames_processed > 0)
            .then(|| self.speech_frames as f64 / self.frames_processed as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters_and_reset_clears_them() {
        let diag = SessionDiagnostics::default();
        diag.frames_processed.fetch_add(8, Ordering::Relaxed);
        diag.speech_frames.fetch_add(3, Ordering::Relaxed);
        diag.bus_faults.fetch_add(1, Ordering::Relaxed);

        let snap = diag.snapshot();
        assert_eq!(snap.frames_processed, 8);
        assert_eq!(snap.bus_faults, 1);
        approx::assert_abs_diff_eq!(snap.speech_ratio().unwrap(), 0.375);

        diag.reset();
        assert_eq!(diag.snapshot(), DiagnosticsSnapshot::default());
        assert_eq!(diag.snapshot().speech_ratio(), None);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_fields() {
        let snap = DiagnosticsSnapshot {
            saturation_events: 2,
            ..DiagnosticsSnapshot::default()
        };
        let json = serde_json::to_value(snap).expect("serialize snapshot");
        assert_eq!(json["saturationEvents"], 2);
        assert_eq!(json["framesProcessed"], 0);
    }
}
