#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use micdsp_core::audio::{AudioBus, BusConfig, ReadTimeout};
use micdsp_core::dsp::{AgcConfig, GainController, GainOutcome, NoiseSuppressor, SuppressionPolicy};
use micdsp_core::error::{MicError, Result};
use micdsp_core::vad::{VadDecision, VadMode, VoiceActivityDetector};
use micdsp_core::{Engines, SessionConfig};
use parking_lot::Mutex;

/// Ordered record of every collaborator call, shared by all mocks of one test.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn count(log: &CallLog, name: &str) -> usize {
    log.lock().iter().filter(|c| c.as_str() == name).count()
}

/// Test config: 16 kHz, no settling reads.
pub fn config_16k() -> SessionConfig {
    SessionConfig {
        settle_reads: 0,
        ..SessionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

pub enum Step {
    Samples(Vec<i32>),
    Fault(&'static str),
}

pub struct ScriptedBus {
    pub script: Arc<Mutex<VecDeque<Step>>>,
    pub log: CallLog,
    pub last_config: Arc<Mutex<Option<BusConfig>>>,
    pub last_timeout: Arc<Mutex<Option<ReadTimeout>>>,
    pub fail_open: bool,
    /// Returned once the script runs dry; `None` means "zero samples".
    pub fault_when_empty: Option<&'static str>,
}

impl ScriptedBus {
    pub fn new(log: &CallLog) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            log: Arc::clone(log),
            last_config: Arc::new(Mutex::new(None)),
            last_timeout: Arc::new(Mutex::new(None)),
            fail_open: false,
            fault_when_empty: None,
        }
    }

    pub fn push(&self, step: Step) {
        self.script.lock().push_back(step);
    }
}

impl AudioBus for ScriptedBus {
    fn open(&mut self, config: &BusConfig) -> Result<()> {
        self.log.lock().push("bus.open".into());
        if self.fail_open {
            return Err(MicError::BusOpen("driver install failed".into()));
        }
        *self.last_config.lock() = Some(config.clone());
        Ok(())
    }

    fn read(&mut self, dst: &mut [i32], timeout: ReadTimeout) -> Result<usize> {
        self.log.lock().push("bus.read".into());
        *self.last_timeout.lock() = Some(timeout);
        match self.script.lock().pop_front() {
            Some(Step::Samples(samples)) => {
                let n = samples.len().min(dst.len());
                dst[..n].copy_from_slice(&samples[..n]);
                Ok(n)
            }
            Some(Step::Fault(msg)) => Err(MicError::BusFault(msg.into())),
            None => match self.fault_when_empty {
                Some(msg) => Err(MicError::BusFault(msg.into())),
                None => Ok(0),
            },
        }
    }

    fn zero_dma_buffer(&mut self) -> Result<()> {
        self.log.lock().push("bus.purge".into());
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().push("bus.close".into());
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// Halves every sample so its output is distinguishable from its input.
pub struct HalvingSuppressor {
    pub log: CallLog,
    pub fail_init: usize,
    pub outputs: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl NoiseSuppressor for HalvingSuppressor {
    fn init(&mut self, _sample_rate: u32, _policy: SuppressionPolicy) -> Result<()> {
        self.log.lock().push("ns.init".into());
        if self.fail_init > 0 {
            self.fail_init -= 1;
            return Err(MicError::NoiseSuppressionInit("out of memory".into()));
        }
        Ok(())
    }

    fn analyze(&mut self, _frame: &[i16]) {
        self.log.lock().push("ns.analyze".into());
    }

    fn process(&mut self, input: &[i16], output: &mut [i16]) {
        self.log.lock().push("ns.process".into());
        for (o, i) in output.iter_mut().zip(input) {
            *o = i / 2;
        }
        self.outputs.lock().push(output.to_vec());
    }
}

/// Adds a fixed offset, reports scripted saturation, and bumps the mic level.
pub struct OffsetGain {
    pub log: CallLog,
    pub fail_init: usize,
    pub offset: i16,
    pub saturate_on_call: Option<usize>,
    pub mic_levels_seen: Arc<Mutex<Vec<i32>>>,
    calls: usize,
}

impl OffsetGain {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: Arc::clone(log),
            fail_init: 0,
            offset: 7,
            saturate_on_call: None,
            mic_levels_seen: Arc::new(Mutex::new(Vec::new())),
            calls: 0,
        }
    }
}

impl GainController for OffsetGain {
    fn init(&mut self, _sample_rate: u32, _config: &AgcConfig) -> Result<()> {
        self.log.lock().push("agc.init".into());
        if self.fail_init > 0 {
            self.fail_init -= 1;
            return Err(MicError::GainControlInit("bad target level".into()));
        }
        Ok(())
    }

    fn process(&mut self, frame: &mut [i16], mic_level: i32) -> GainOutcome {
        self.log.lock().push("agc.process".into());
        self.mic_levels_seen.lock().push(mic_level);
        for s in frame.iter_mut() {
            *s = s.wrapping_add(self.offset);
        }
        let saturation = self.saturate_on_call == Some(self.calls);
        self.calls += 1;
        GainOutcome {
            mic_level: mic_level + 1,
            saturation,
        }
    }
}

/// Replays a list of decisions and records every frame it is shown.
pub struct ScriptedVad {
    pub log: CallLog,
    pub fail_init: usize,
    pub decisions: Vec<bool>,
    pub seen: Arc<Mutex<Vec<Vec<i16>>>>,
    pub resets: Arc<AtomicUsize>,
    idx: usize,
}

impl ScriptedVad {
    pub fn new(log: &CallLog, decisions: Vec<bool>) -> Self {
        Self {
            log: Arc::clone(log),
            fail_init: 0,
            decisions,
            seen: Arc::new(Mutex::new(Vec::new())),
            resets: Arc::new(AtomicUsize::new(0)),
            idx: 0,
        }
    }
}

impl VoiceActivityDetector for ScriptedVad {
    fn init(&mut self, _sample_rate: u32, _mode: VadMode) -> Result<()> {
        self.log.lock().push("vad.init".into());
        if self.fail_init > 0 {
            self.fail_init -= 1;
            return Err(MicError::VoiceActivityInit("mode rejected".into()));
        }
        Ok(())
    }

    fn classify(&mut self, frame: &[i16]) -> VadDecision {
        self.log.lock().push("vad.classify".into());
        self.seen.lock().push(frame.to_vec());
        let decision = self.decisions.get(self.idx).copied().unwrap_or(false);
        self.idx += 1;
        VadDecision::from(decision)
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }
}

/// Probes kept by a test after the mocks move into the session.
pub struct Harness {
    pub log: CallLog,
    pub script: Arc<Mutex<VecDeque<Step>>>,
    pub bus_config: Arc<Mutex<Option<BusConfig>>>,
    pub last_timeout: Arc<Mutex<Option<ReadTimeout>>>,
    pub ns_outputs: Arc<Mutex<Vec<Vec<i16>>>>,
    pub vad_seen: Arc<Mutex<Vec<Vec<i16>>>>,
    pub mic_levels: Arc<Mutex<Vec<i32>>>,
    pub vad_resets: Arc<AtomicUsize>,
}

impl Harness {
    pub fn resets(&self) -> usize {
        self.vad_resets.load(Ordering::Relaxed)
    }
}

impl Harness {
    pub fn push(&self, step: Step) {
        self.script.lock().push_back(step);
    }
}

/// Failure knobs for [`build`].
#[derive(Default, Clone, Copy)]
pub struct Faults {
    pub bus_open: bool,
    pub ns_init: usize,
    pub agc_init: usize,
    pub vad_init: usize,
    pub saturate_on_call: Option<usize>,
}

pub fn build(decisions: Vec<bool>, faults: Faults) -> (ScriptedBus, Engines, Harness) {
    let log = call_log();

    let mut bus = ScriptedBus::new(&log);
    bus.fail_open = faults.bus_open;

    let ns = HalvingSuppressor {
        log: Arc::clone(&log),
        fail_init: faults.ns_init,
        outputs: Arc::new(Mutex::new(Vec::new())),
    };
    let mut agc = OffsetGain::new(&log);
    agc.fail_init = faults.agc_init;
    agc.saturate_on_call = faults.saturate_on_call;
    let mut vad = ScriptedVad::new(&log, decisions);
    vad.fail_init = faults.vad_init;

    let harness = Harness {
        log,
        script: Arc::clone(&bus.script),
        bus_config: Arc::clone(&bus.last_config),
        last_timeout: Arc::clone(&bus.last_timeout),
        ns_outputs: Arc::clone(&ns.outputs),
        vad_seen: Arc::clone(&vad.seen),
        mic_levels: Arc::clone(&agc.mic_levels_seen),
        vad_resets: Arc::clone(&vad.resets),
    };

    (bus, Engines::new(ns, agc, vad), harness)
}

/// `frames` frames of 160 bus words each, frame `f` sample `i` = `(f*1000 + i) << 8`.
pub fn ramp_words(frames: usize) -> Vec<i32> {
    (0..frames * 160)
        .map(|n| {
            let (f, i) = (n / 160, n % 160);
            ((f * 1_000 + i) as i32) << 8
        })
        .collect()
}
