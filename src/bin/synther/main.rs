//! synther - play a short arpeggio through the engine and print what the
//! analyzer hears.
//!
//! Run with: cargo run --bin synther [config.json]

use std::thread;
use std::time::Duration;

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use log::info;
use synther_engine::{params, EngineConfig, SynthEngine};

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const CONTROL_CHANGE: u8 = 0xB0;

const ARPEGGIO: [u8; 8] = [48, 55, 60, 63, 67, 63, 60, 55];
const STEP: Duration = Duration::from_millis(250);

fn load_config() -> EyreResult<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("failed to read config {path}"))?;
            EngineConfig::from_json_str(&json).wrap_err("invalid engine config")
        }
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let engine = SynthEngine::new(config.clone());
    engine
        .initialize(config.sample_rate, config.buffer_size, config.initial_volume)
        .wrap_err("failed to start the engine")?;

    println!("=== synther ===");
    println!("Sample rate: {} Hz", engine.sample_rate());
    println!("Buffer: {} frames", engine.buffer_size());
    println!("FFT: {}", engine.fft_size());
    println!();

    engine.set_parameter(params::REVERB_MIX, 0.35, false);
    engine.set_parameter(params::RELEASE_TIME, 0.2, false);

    for (step, &note) in ARPEGGIO.iter().cycle().take(ARPEGGIO.len() * 2).enumerate() {
        // Sweep the mod wheel (filter cutoff) across the run
        let wheel = (step * 127 / (ARPEGGIO.len() * 2 - 1)) as u8;
        engine.process_midi_event(CONTROL_CHANGE, 1, wheel);
        engine.process_midi_event(NOTE_ON, note, 100);

        thread::sleep(STEP);

        let readings = engine.analysis();
        println!(
            "note {note:3}  bass {:.4}  mid {:.4}  high {:.4}  peak {:.3}  dominant {:7.1} Hz",
            readings.bass,
            readings.mid,
            readings.high,
            readings.amplitude,
            readings.dominant_frequency
        );

        engine.process_midi_event(NOTE_OFF, note, 0);
    }

    // Let the release and reverb ring out
    thread::sleep(Duration::from_millis(800));
    info!("final peak {:.3}", engine.amplitude_level());

    engine.shutdown();
    Ok(())
}
