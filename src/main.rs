//! Polaron CLI - run dataflow programs from the command line.

use clap::{Parser, Subcommand};
use polaron::device::{ExternalDevice, WavInFeeder, WavOutWriter};
use polaron::engine::Engine;
use polaron::error::Result;
use polaron::procs;
use serde::Deserialize;
use serde_json::Value as Cfg;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{error, info};

// counting allocator so the engine can flag steady-state allocations
#[global_allocator]
static GLOBAL: polaron::alloc_guard::CountingAlloc = polaron::alloc_guard::CountingAlloc;

#[derive(Parser)]
#[command(name = "polaron")]
#[command(about = "Polaron dataflow engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program file until it halts
    Run {
        /// Program cfg (.json)
        program: PathBuf,

        /// Initial network preset (overrides the program's `preset:`)
        #[arg(short, long)]
        preset: Option<String>,

        /// Directory for output WAV files (default: alongside the program)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the class dictionary
    Classes,

    /// Instantiate a program's network and print it
    Network {
        /// Program cfg (.json)
        program: PathBuf,
    },
}

/// Device declarations from the program's optional `devices:` list:
/// `{ label, type: "audio", dir: "in"|"out", ch_cnt?, file? }`.
#[derive(Deserialize)]
struct DeviceSpec {
    label: String,
    #[serde(rename = "type")]
    type_label: String,
    dir: String,
    #[serde(default)]
    ch_cnt: Option<usize>,
    #[serde(default)]
    file: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Classes => {
            procs::class_dict(None)?.print();
            Ok(())
        }
        Commands::Network { program } => {
            let pgm = load_program(&program)?;
            let mut engine = build_engine(&pgm)?;
            let (devices, _, _) = build_devices(&pgm, &engine, &program)?;
            engine.initialize(devices, None)?;
            engine.print_network();
            Ok(())
        }
        Commands::Run { program, preset, out_dir } => {
            let pgm = load_program(&program)?;
            let mut engine = build_engine(&pgm)?;
            let (devices, mut feeders, writer_specs) = build_devices(&pgm, &engine, &program)?;
            engine.initialize(devices, preset.as_deref())?;

            let mut writers: Vec<(PathBuf, WavOutWriter)> = Vec::new();
            for (dev_idx, path) in writer_specs {
                writers.push((path, WavOutWriter::new(&engine.devices[dev_idx])?));
            }

            loop {
                let mut exhausted = false;
                for f in feeders.iter_mut() {
                    if !f.fill_next() {
                        exhausted = true;
                    }
                }
                match engine.exec_cycle() {
                    Ok(()) => {}
                    Err(e) if e.is_eof() => break,
                    Err(e) => return Err(e),
                }
                for (_, w) in writers.iter_mut() {
                    w.append_cycle();
                }
                if exhausted {
                    info!("input audio exhausted");
                    break;
                }
            }

            let out_dir = out_dir
                .or_else(|| program.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            for (path, w) in &writers {
                let full = if path.is_absolute() { path.clone() } else { out_dir.join(path) };
                w.write(&full)?;
                info!("wrote {}", full.display());
            }
            Ok(())
        }
    }
}

fn load_program(path: &PathBuf) -> Result<Cfg> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn build_engine(pgm: &Cfg) -> Result<Engine> {
    let classes = Rc::new(procs::class_dict(pgm.get("udp"))?);
    Engine::new(classes, pgm)
}

/// Build the device array from the program's `devices:` list. Audio input
/// devices with a `file:` are fed from that WAV; audio output devices
/// with a `file:` are recorded to it.
#[allow(clippy::type_complexity)]
fn build_devices(
    pgm: &Cfg,
    engine: &Engine,
    program_path: &PathBuf,
) -> Result<(Vec<ExternalDevice>, Vec<WavInFeeder>, Vec<(usize, PathBuf)>)> {
    let mut devices = Vec::new();
    let mut feeders = Vec::new();
    let mut writers = Vec::new();

    let Some(devs_cfg) = pgm.get("devices") else {
        return Ok((devices, feeders, writers));
    };

    let specs: Vec<DeviceSpec> = serde_json::from_value(devs_cfg.clone())?;
    let base = program_path.parent().map(PathBuf::from).unwrap_or_default();

    for spec in specs {
        match (spec.type_label.as_str(), spec.dir.as_str()) {
            ("audio", "in") => {
                if let Some(file) = &spec.file {
                    let full = if file.is_absolute() { file.clone() } else { base.join(file) };
                    let (feeder, dev) =
                        WavInFeeder::open(&spec.label, &full, engine.frames_per_cycle())?;
                    feeders.push(feeder);
                    devices.push(dev);
                } else {
                    devices.push(ExternalDevice::audio_in(
                        &spec.label,
                        engine.sample_rate(),
                        spec.ch_cnt.unwrap_or(2),
                        engine.frames_per_cycle(),
                    ));
                }
            }
            ("audio", "out") => {
                let dev = ExternalDevice::audio_out(
                    &spec.label,
                    engine.sample_rate(),
                    spec.ch_cnt.unwrap_or(2),
                    engine.frames_per_cycle(),
                );
                if let Some(file) = spec.file {
                    writers.push((devices.len(), file));
                }
                devices.push(dev);
            }
            (t, d) => {
                return Err(polaron::Error::invalid_arg(format!(
                    "unsupported device spec: type '{t}' dir '{d}' on '{}'",
                    spec.label
                )))
            }
        }
    }
    Ok((devices, feeders, writers))
}
