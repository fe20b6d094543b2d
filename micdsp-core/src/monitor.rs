//! `ActivityMonitor`: runs a session on a dedicated thread.
//!
//! ## Lifecycle
//!
//! ```text
//! ActivityMonitor::new()
//!     └─► start(session, config) → worker thread owns the session, status = Listening
//!         └─► stop()             → running=false, worker joined, session handed back
//! ```
//!
//! The session is not reentrant, so the monitor moves it onto one worker
//! thread and every `read` happens there. Each processed batch is published
//! as an [`ActivityEvent`] on a broadcast channel; status changes go out as
//! [`MonitorStatusEvent`]s.
//!
//! The only way to interrupt a blocking capture is its timeout, so `stop()`
//! returns after at most one `MonitorConfig::timeout` plus processing time.
//! With `ReadTimeout::Forever` it waits for the next full batch.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    audio::ReadTimeout,
    buffering::frame::MAX_FRAMES_PER_BATCH,
    error::{MicError, Result},
    events::{ActivityEvent, MonitorStatus, MonitorStatusEvent},
    session::{DiagnosticsSnapshot, Session, SessionDiagnostics},
};

/// Broadcast channel capacity: events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Consecutive bus faults tolerated before the worker gives up.
const MAX_CONSECUTIVE_FAULTS: usize = 5;

/// Pause between retries after a bus fault.
const FAULT_BACKOFF: Duration = Duration::from_millis(10);

/// Per-call settings the worker passes to every `Session::read`.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Frames per batch, clamped to 1..=10. Default: 3.
    pub batch_frames: usize,
    /// Capture timeout per batch. Default: 100 ms.
    pub timeout: ReadTimeout,
    pub agc_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            batch_frames: 3,
            timeout: ReadTimeout::After(Duration::from_millis(100)),
            agc_enabled: true,
        }
    }
}

/// `start()` failed; the session is handed back untouched.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StartError {
    pub error: MicError,
    pub session: Session,
}

#[derive(Clone)]
struct StatusPublisher {
    status: Arc<Mutex<MonitorStatus>>,
    tx: broadcast::Sender<MonitorStatusEvent>,
}

impl StatusPublisher {
    fn set(&self, status: MonitorStatus, detail: Option<String>) {
        *self.status.lock() = status;
        let _ = self.tx.send(MonitorStatusEvent { status, detail });
    }
}

pub struct ActivityMonitor {
    running: Arc<AtomicBool>,
    status: StatusPublisher,
    activity_tx: broadcast::Sender<ActivityEvent>,
    seq: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<Session>>>,
    diagnostics: Mutex<Option<Arc<SessionDiagnostics>>>,
}

impl ActivityMonitor {
    pub fn new() -> Self {
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            running: Arc::new(AtomicBool::new(false)),
            status: StatusPublisher {
                status: Arc::new(Mutex::new(MonitorStatus::Idle)),
                tx: status_tx,
            },
            activity_tx,
            seq: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
            diagnostics: Mutex::new(None),
        }
    }

    /// Move `session` onto a worker thread and start reading batches.
    ///
    /// # Errors
    /// - `MicError::AlreadyRunning` if a worker is already attached.
    /// - `MicError::NotInitialized` if `begin` has not succeeded on `session`.
    ///
    /// Either way the session comes back inside [`StartError`].
    pub fn start(
        &self,
        session: Session,
        config: MonitorConfig,
    ) -> std::result::Result<(), StartError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(StartError {
                error: MicError::AlreadyRunning,
                session,
            });
        }
        let Some(frame_size) = session.frame_size() else {
            return Err(StartError {
                error: MicError::NotInitialized,
                session,
            });
        };

        let batch_samples = config.batch_frames.clamp(1, MAX_FRAMES_PER_BATCH) * frame_size;
        *self.diagnostics.lock() = Some(session.diagnostics());

        self.running.store(true, Ordering::SeqCst);
        self.status.set(MonitorStatus::Listening, None);

        let running = Arc::clone(&self.running);
        let status = self.status.clone();
        let activity_tx = self.activity_tx.clone();
        let seq = Arc::clone(&self.seq);

        *worker = Some(thread::spawn(move || {
            run(
                session,
                config,
                batch_samples,
                running,
                status,
                activity_tx,
                seq,
            )
        }));
        info!(batch_samples, "activity monitor started");
        Ok(())
    }

    /// Stop the worker and hand the session back.
    ///
    /// Also collects a worker that already exited on its own after faults.
    ///
    /// # Errors
    /// - `MicError::NotRunning` if no worker is attached.
    pub fn stop(&self) -> Result<Session> {
        let handle = self.worker.lock().take().ok_or(MicError::NotRunning)?;
        self.running.store(false, Ordering::SeqCst);

        let session = handle
            .join()
            .map_err(|_| MicError::Other(anyhow::anyhow!("monitor thread panicked")))?;

        if self.status() != MonitorStatus::Error {
            self.status.set(MonitorStatus::Stopped, None);
        }
        info!("activity monitor stopped");
        Ok(session)
    }

    /// `true` while the worker is reading.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current status (snapshot).
    pub fn status(&self) -> MonitorStatus {
        *self.status.status.lock()
    }

    /// Subscribe to per-batch activity events.
    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<MonitorStatusEvent> {
        self.status.tx.subscribe()
    }

    /// Counters of the most recently started session.
    pub fn diagnostics_snapshot(&self) -> Option<DiagnosticsSnapshot> {
        self.diagnostics.lock().as_ref().map(|d| d.snapshot())
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("monitor thread panicked during shutdown");
            }
        }
    }
}

fn run(
    mut session: Session,
    config: MonitorConfig,
    batch_samples: usize,
    running: Arc<AtomicBool>,
    status: StatusPublisher,
    activity_tx: broadcast::Sender<ActivityEvent>,
    seq: Arc<AtomicU64>,
) -> Session {
    let mut buf = vec![0i16; batch_samples];
    let mut consecutive_faults = 0usize;

    while running.load(Ordering::Relaxed) {
        match session.read(&mut buf, config.timeout, config.agc_enabled) {
            Ok(report) => {
                consecutive_faults = 0;
                if report.frames == 0 {
                    continue;
                }
                let n = seq.fetch_add(1, Ordering::Relaxed);
                let _ = activity_tx.send(ActivityEvent::from_report(n, &report));
            }
            Err(MicError::BusFault(msg)) => {
                consecutive_faults += 1;
                warn!(consecutive_faults, "bus fault: {msg}");
                if consecutive_faults >= MAX_CONSECUTIVE_FAULTS {
                    error!("giving up after {consecutive_faults} consecutive bus faults");
                    status.set(MonitorStatus::Error, Some(msg));
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                thread::sleep(FAULT_BACKOFF);
            }
            Err(e) => {
                error!("monitor read failed: {e}");
                status.set(MonitorStatus::Error, Some(e.to_string()));
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    session
}
