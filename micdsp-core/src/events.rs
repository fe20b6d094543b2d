//! Event types published by the [`ActivityMonitor`](crate::monitor::ActivityMonitor).
//!
//! All events serialise with camelCase fields so hosts can forward them as
//! JSON unchanged.

use serde::{Deserialize, Serialize};

use crate::session::BatchReport;

/// Emitted once per processed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub samples: usize,
    pub frames: usize,
    pub speech_frames: usize,
    /// Majority-vote verdict for the batch.
    pub is_speech: bool,
    pub saturated: bool,
}

impl ActivityEvent {
    pub fn from_report(seq: u64, report: &BatchReport) -> Self {
        Self {
            seq,
            samples: report.samples_read,
            frames: report.frames,
            speech_frames: report.speech_frames,
            is_speech: report.is_speech,
            saturated: report.saturated,
        }
    }
}

/// Emitted when the monitor state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatusEvent {
    pub status: MonitorStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the activity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    /// Created, `start()` not yet called.
    Idle,
    /// Reading batches on the worker thread.
    Listening,
    /// Stopped on request; the session has been or can be handed back.
    Stopped,
    /// The worker gave up after repeated bus faults.
    Error,
}
