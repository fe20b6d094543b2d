//! `micdsp-replay`: push a recording (or, with `audio-cpal`, the default
//! input device) through the conditioning pipeline and print one JSON line
//! per batch.
//!
//! ```text
//! micdsp-replay <file.wav> [--config <file.json>] [--batch-frames <n>] [--no-agc]
//! micdsp-replay --live <secs> [--config <file.json>] [--batch-frames <n>] [--no-agc]
//! micdsp-replay --write-config <file.json>
//! ```

mod settings;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use micdsp_core::{
    audio::{bus_word_from_pcm16, ReadTimeout, RingBus},
    buffering::{Producer, RING_CAPACITY},
    session::DiagnosticsSnapshot,
    BatchReport, Engines, Session, SessionConfig,
};
use serde::Serialize;
use settings::{load_config, save_config};
use tracing::{info, warn};

const DEFAULT_BATCH_FRAMES: usize = 3;

struct Args {
    input: Option<PathBuf>,
    live_secs: Option<u64>,
    config: Option<PathBuf>,
    write_config: Option<PathBuf>,
    batch_frames: usize,
    agc_enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchLine {
    batch: usize,
    offset_ms: u64,
    #[serde(flatten)]
    report: BatchReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    source: String,
    sample_rate: u32,
    batch_frames: usize,
    agc_enabled: bool,
    speech_batches: usize,
    diagnostics: DiagnosticsSnapshot,
}

fn usage() -> &'static str {
    "Usage: micdsp-replay <file.wav> [--config <file.json>] [--batch-frames <1-10>] [--no-agc]\n\
     \x20      micdsp-replay --live <secs> [options]   (requires the audio-cpal feature)\n\
     \x20      micdsp-replay --write-config <file.json>"
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        input: None,
        live_secs: None,
        config: None,
        write_config: None,
        batch_frames: DEFAULT_BATCH_FRAMES,
        agc_enabled: true,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --config".into());
                };
                args.config = Some(PathBuf::from(v));
            }
            "--write-config" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --write-config".into());
                };
                args.write_config = Some(PathBuf::from(v));
            }
            "--batch-frames" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --batch-frames".into());
                };
                args.batch_frames = v
                    .parse::<usize>()
                    .map_err(|_| "invalid value for --batch-frames".to_string())?
                    .clamp(1, 10);
            }
            "--live" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --live".into());
                };
                args.live_secs = Some(
                    v.parse::<u64>()
                        .map_err(|_| "invalid value for --live".to_string())?,
                );
            }
            "--no-agc" => args.agc_enabled = false,
            "--help" | "-h" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown argument: {other}"));
            }
            path => {
                if args.input.is_some() {
                    return Err(format!("unexpected extra input: {path}"));
                }
                args.input = Some(PathBuf::from(path));
            }
        }
    }

    if args.input.is_none() && args.live_secs.is_none() && args.write_config.is_none() {
        return Err(usage().into());
    }
    Ok(args)
}

fn read_wav(path: &Path, expected_rate: u32) -> Result<Vec<i16>> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let format = reader.spec();
    if format.channels != 1 || format.bits_per_sample != 16 {
        bail!(
            "{} must be 16-bit mono (found {} ch, {} bit)",
            path.display(),
            format.channels,
            format.bits_per_sample
        );
    }
    if format.sample_rate != expected_rate {
        bail!(
            "{} is {} Hz but the session is configured for {} Hz",
            path.display(),
            format.sample_rate,
            expected_rate
        );
    }
    reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("decoding samples")
}

fn print_line<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// What a replay produced, besides the per-batch lines.
struct ReplayOutcome {
    batches: usize,
    speech_batches: usize,
    diagnostics: DiagnosticsSnapshot,
}

/// Feed `samples` through a ring-backed session one batch at a time,
/// handing each processed batch to `emit`.
///
/// Stops at the first batch that yields no whole frame.
fn replay_samples(
    samples: &[i16],
    config: &SessionConfig,
    batch_frames: usize,
    agc_enabled: bool,
    mut emit: impl FnMut(&BatchLine) -> Result<()>,
) -> Result<ReplayOutcome> {
    let (bus, mut producer) = RingBus::new(RING_CAPACITY);
    let mut session = Session::new(bus, Engines::reference());
    // A recording has no DC settling period.
    let session_config = SessionConfig {
        settle_reads: 0,
        ..config.clone()
    };
    session.begin(&session_config)?;

    let frame_size = session
        .frame_size()
        .context("session reported no frame size after begin")?;
    let batch_samples = batch_frames * frame_size;
    let mut output = vec![0i16; batch_samples];
    let mut words = Vec::with_capacity(batch_samples);
    let mut batches = 0usize;
    let mut speech_batches = 0usize;
    let mut offset_samples = 0usize;

    for (batch, chunk) in samples.chunks(batch_samples).enumerate() {
        words.clear();
        words.extend(chunk.iter().map(|&s| bus_word_from_pcm16(s)));
        producer.push_slice(&words);

        let report = session.read(&mut output, ReadTimeout::After(Duration::ZERO), agc_enabled)?;
        if report.frames == 0 {
            break;
        }
        batches += 1;
        if report.is_speech {
            speech_batches += 1;
        }
        emit(&BatchLine {
            batch,
            offset_ms: (offset_samples as u64 * 1_000) / config.sample_rate as u64,
            report,
        })?;
        offset_samples += report.samples_read;
    }

    Ok(ReplayOutcome {
        batches,
        speech_batches,
        diagnostics: session.diagnostics().snapshot(),
    })
}

fn replay_file(path: &Path, config: &SessionConfig, args: &Args) -> Result<()> {
    let samples = read_wav(path, config.sample_rate)?;
    info!(path = %path.display(), samples = samples.len(), "replaying recording");

    let started = Instant::now();
    let outcome = replay_samples(
        &samples,
        config,
        args.batch_frames,
        args.agc_enabled,
        print_line::<BatchLine>,
    )?;
    info!(
        batches = outcome.batches,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "replay finished"
    );

    print_line(&Summary {
        source: path.display().to_string(),
        sample_rate: config.sample_rate,
        batch_frames: args.batch_frames,
        agc_enabled: args.agc_enabled,
        speech_batches: outcome.speech_batches,
        diagnostics: outcome.diagnostics,
    })
}

#[cfg(feature = "audio-cpal")]
fn listen_live(secs: u64, config: &SessionConfig, args: &Args) -> Result<()> {
    use micdsp_core::{ActivityMonitor, CpalBus, MonitorConfig};

    let mut session = Session::new(CpalBus::new(), Engines::reference());
    session.begin(config)?;

    let monitor = ActivityMonitor::new();
    let mut activity = monitor.subscribe_activity();
    monitor
        .start(
            session,
            MonitorConfig {
                batch_frames: args.batch_frames,
                agc_enabled: args.agc_enabled,
                ..MonitorConfig::default()
            },
        )
        .map_err(|e| e.error)?;

    let deadline = Instant::now() + Duration::from_secs(secs);
    let mut speech_batches = 0usize;
    while Instant::now() < deadline && monitor.is_running() {
        while let Ok(event) = activity.try_recv() {
            if event.is_speech {
                speech_batches += 1;
            }
            print_line(&event)?;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    let status = monitor.status();
    let snapshot = monitor.diagnostics_snapshot().unwrap_or_default();
    drop(monitor.stop()?);
    print_line(&Summary {
        source: format!("live ({status:?})"),
        sample_rate: config.sample_rate,
        batch_frames: args.batch_frames,
        agc_enabled: args.agc_enabled,
        speech_batches,
        diagnostics: snapshot,
    })
}

#[cfg(not(feature = "audio-cpal"))]
fn listen_live(_secs: u64, _config: &SessionConfig, _args: &Args) -> Result<()> {
    bail!("--live requires building with the audio-cpal feature")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("micdsp=info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => load_config(path),
        None => {
            let mut config = SessionConfig::default();
            config.normalize();
            config
        }
    };

    if let Some(path) = &args.write_config {
        save_config(path, &config).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "config written");
        if args.input.is_none() && args.live_secs.is_none() {
            return Ok(());
        }
    }

    if let Some(secs) = args.live_secs {
        if args.input.is_some() {
            warn!("--live given; ignoring the input file");
        }
        return listen_live(secs, &config, &args);
    }

    match &args.input {
        Some(path) => replay_file(path, &config, &args),
        None => Ok(()),
    }
}
