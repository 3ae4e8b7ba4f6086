use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use synther_engine::analysis::{AnalysisReadings, SpectrumAnalyzer};
use synther_engine::params::{self, oscillator_param, OscillatorField};
use synther_engine::{
    BackendError, EngineConfig, EngineError, OfflineBackend, OfflineHandle, SynthEngine, XyAxis,
};

const SAMPLE_RATE: u32 = 48_000;
const BLOCK: usize = 256;

fn engine() -> (Arc<SynthEngine>, OfflineHandle) {
    let backend = OfflineBackend::new();
    let handle = backend.handle();
    let engine = SynthEngine::with_backend(EngineConfig::default(), Box::new(backend));
    engine.initialize(SAMPLE_RATE, BLOCK as u32, 0.8).unwrap();
    (engine, handle)
}

fn render(handle: &OfflineHandle, frames: usize) -> Vec<f32> {
    handle.render_frames(frames).expect("backend running")
}

fn peak(block: &[f32]) -> f32 {
    block.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[test]
fn uninitialized_engine_is_inert() {
    let engine = SynthEngine::with_backend(EngineConfig::default(), Box::new(OfflineBackend::new()));
    assert!(!engine.is_initialized());
    assert!(!engine.set_parameter(params::FILTER_CUTOFF, 500.0, false));
    assert_eq!(engine.get_parameter(params::FILTER_CUTOFF), 0.0);
    assert!(!engine.note_on(60, 100));
    assert!(!engine.process_midi_event(0x90, 60, 100));

    let mut block = vec![1.0; 64];
    engine.process_audio(&mut block);
    assert!(block.iter().all(|&s| s == 0.0));

    // Shutdown before initialize is harmless
    engine.shutdown();
}

#[test]
fn initialize_and_shutdown_are_idempotent() {
    let (engine, handle) = engine();
    assert!(engine.initialize(SAMPLE_RATE, BLOCK as u32, 0.8).is_ok());
    assert_eq!(engine.sample_rate(), SAMPLE_RATE);
    assert_eq!(engine.buffer_size(), BLOCK as u32);
    assert_eq!(engine.oscillator_count(), 2);

    engine.shutdown();
    engine.shutdown();
    assert!(!engine.is_initialized());
    assert!(handle.render_frames(BLOCK).is_none());

    engine.initialize(44_100, 128, 0.5).unwrap();
    assert!(engine.is_initialized());
    assert_eq!(engine.sample_rate(), 44_100);
    assert!(peak(&render(&handle, 128)) > 0.0);
}

#[test]
fn backend_failure_fails_initialize() {
    let engine = SynthEngine::with_backend(
        EngineConfig::default(),
        Box::new(OfflineBackend::failing("device unplugged")),
    );
    let err = engine.initialize(SAMPLE_RATE, 256, 0.8).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Backend(BackendError::Unavailable(ref reason)) if reason == "device unplugged"
    ));
    assert!(!engine.is_initialized());
    assert!(!engine.set_parameter(params::MASTER_VOLUME, 0.5, false));
}

#[test]
fn invalid_rates_are_rejected() {
    let engine = SynthEngine::with_backend(EngineConfig::default(), Box::new(OfflineBackend::new()));
    assert!(matches!(
        engine.initialize(0, 256, 0.8),
        Err(EngineError::InvalidSampleRate(0))
    ));
    assert!(matches!(
        engine.initialize(SAMPLE_RATE, 0, 0.8),
        Err(EngineError::InvalidBufferSize(0))
    ));
    assert!(!engine.is_initialized());
}

#[test]
fn read_back_falls_back_to_module_targets() {
    let (engine, _handle) = engine();
    assert!((engine.get_parameter(params::MASTER_VOLUME) - 0.8).abs() < 1e-6);
    assert_eq!(engine.get_parameter(params::MASTER_MUTE), 0.0);
    assert_eq!(engine.get_parameter(params::FILTER_CUTOFF), 1000.0);
    assert_eq!(engine.get_parameter(params::FILTER_RESONANCE), 0.5);
    assert_eq!(engine.get_parameter(params::REVERB_MIX), 0.0);

    assert!(engine.set_parameter(params::FILTER_CUTOFF, 2400.0, false));
    assert_eq!(engine.get_parameter(params::FILTER_CUTOFF), 2400.0);
}

#[test]
fn missing_oscillator_slot_fails_but_is_cached() {
    let (engine, _handle) = engine();
    let id = oscillator_param(5, OscillatorField::Volume);
    assert!(!engine.set_parameter(id, 0.3, false));
    assert_eq!(engine.get_parameter(id), 0.3);

    let live = oscillator_param(1, OscillatorField::Detune);
    assert!(engine.set_parameter(live, -7.0, false));
    assert_eq!(engine.get_parameter(live), -7.0);
}

#[test]
fn unknown_ids_fail_but_are_cached() {
    let (engine, _handle) = engine();
    assert!(!engine.set_parameter(9_999, 0.5, false));
    assert_eq!(engine.get_parameter(9_999), 0.5);
    assert!(!engine.set_parameter(-1, 0.5, false));
}

#[test]
fn generic_cc_parameters_are_cache_only() {
    let (engine, _handle) = engine();
    let id = params::generic_cc_param(74).unwrap();
    assert!(engine.set_parameter(id, 0.6, false));
    assert_eq!(engine.get_parameter(id), 0.6);
}

#[test]
fn mute_renders_silence() {
    let (engine, handle) = engine();
    assert!(peak(&render(&handle, BLOCK)) > 0.0);

    assert!(engine.set_parameter(params::MASTER_MUTE, 1.0, false));
    assert!(engine.is_muted());
    assert_eq!(engine.get_parameter(params::MASTER_MUTE), 1.0);
    assert!(render(&handle, BLOCK).iter().all(|&s| s == 0.0));

    assert!(engine.set_parameter(params::MASTER_MUTE, 0.0, false));
    assert!(peak(&render(&handle, BLOCK)) > 0.0);
}

#[test]
fn note_on_attacks_from_silence() {
    let (engine, handle) = engine();
    assert!(engine.note_on(69, 127));
    assert_eq!(engine.active_notes(), vec![69]);

    let block = render(&handle, 2048);
    let onset = peak(&block[..2 * 8]);
    let body = peak(&block[2 * 1000..2 * 2000]);
    assert!(onset < body * 0.2, "onset {onset} should be well under body {body}");

    assert!(engine.note_off(69));
    assert!(engine.active_notes().is_empty());
}

#[test]
fn release_waits_for_last_note() {
    let (engine, _handle) = engine();
    engine.note_on(60, 100);
    engine.note_on(64, 100);
    engine.note_off(60);
    assert_eq!(engine.active_notes(), vec![64]);

    // Velocity 0 is a note off
    assert!(engine.process_midi_event(0x90, 64, 0));
    assert!(engine.active_notes().is_empty());

    // Releasing a note that is not held is not an error
    assert!(engine.note_off(64));
    assert!(!engine.note_on(128, 10));
    assert!(!engine.note_on(60, 200));
}

#[test]
fn midi_learn_replaces_prior_mapping() {
    let (engine, _handle) = engine();

    engine.start_midi_learn(params::FILTER_CUTOFF);
    assert!(engine.is_midi_learn_active());
    assert!(engine.process_midi_event(0xB0, 20, 64));
    assert!(!engine.is_midi_learn_active());
    assert_eq!(engine.cc_mapping(20), Some(params::FILTER_CUTOFF));

    engine.start_midi_learn(params::FILTER_CUTOFF);
    assert!(engine.process_midi_event(0xB0, 21, 10));
    assert_eq!(engine.cc_mapping(21), Some(params::FILTER_CUTOFF));
    assert_eq!(engine.cc_mapping(20), None);
    assert_eq!(engine.cc_mappings(), vec![(21, params::FILTER_CUTOFF)]);

    // Mapped CCs drive their parameter with the normalized value
    assert!(engine.process_midi_event(0xB0, 21, 127));
    assert_eq!(engine.get_parameter(params::FILTER_CUTOFF), 1.0);
    assert_eq!(engine.last_cc_value(21), Some(127));

    engine.start_midi_learn(params::REVERB_MIX);
    engine.stop_midi_learn();
    assert!(!engine.is_midi_learn_active());
}

#[test]
fn unmapped_ccs_use_fallbacks() {
    let (engine, _handle) = engine();
    assert!(engine.process_midi_event(0xB0, 7, 127));
    assert_eq!(engine.get_parameter(params::MASTER_VOLUME), 1.0);

    assert!(engine.send_mod_wheel(0));
    assert!((engine.get_parameter(params::FILTER_CUTOFF) - 20.0).abs() < 1e-3);
    assert!(engine.send_mod_wheel(127));
    assert!((engine.get_parameter(params::FILTER_CUTOFF) - 20_000.0).abs() < 1e-2);

    assert!(!engine.process_midi_event(0xB0, 50, 10));
    assert!(!engine.process_midi_event(0xC0, 5, 0));
}

#[test]
fn pitch_bend_and_aftertouch_route_through_parameters() {
    let (engine, _handle) = engine();
    assert!(engine.send_pitch_bend(8192));
    assert_eq!(engine.get_parameter(params::PITCH_BEND), 0.0);
    assert!(engine.send_pitch_bend(0));
    assert_eq!(engine.get_parameter(params::PITCH_BEND), -1.0);

    assert!(engine.process_midi_event(0xD0, 64, 0));
    assert!((engine.get_parameter(params::CHANNEL_AFTERTOUCH) - 64.0 / 127.0).abs() < 1e-6);

    assert!(!engine.send_poly_aftertouch(60, 100));
    engine.note_on(60, 90);
    assert!(engine.send_poly_aftertouch(60, 127));
    assert_eq!(engine.get_parameter(params::CHANNEL_AFTERTOUCH), 1.0);
}

#[test]
fn ui_channel_sets_and_cycles_panel() {
    let (engine, _handle) = engine();
    let forwarded = Arc::new(Mutex::new(Vec::new()));
    let sink = forwarded.clone();
    engine.set_ui_control_callback(Some(Arc::new(move |panel: u8, cc: u8, value: u8| {
        sink.lock().push((panel, cc, value));
    })));

    assert!(engine.process_midi_event(0xBF, 32, 5));
    assert_eq!(engine.ui_target_panel(), 5);
    assert!(engine.process_midi_event(0xBF, 109, 0));
    assert_eq!(engine.ui_target_panel(), 6);

    assert!(engine.process_midi_event(0xBF, 105, 64));
    assert_eq!(*forwarded.lock(), vec![(6, 105, 64)]);

    engine.process_midi_event(0xBF, 32, 127);
    engine.process_midi_event(0xBF, 109, 0);
    assert_eq!(engine.ui_target_panel(), 0);

    // UI channel CCs never reach sound parameters
    assert!(engine.process_midi_event(0xBF, 7, 0));
    assert!((engine.get_parameter(params::MASTER_VOLUME) - 0.8).abs() < 1e-6);
    assert!(!engine.process_midi_event(0x9F, 60, 100));
    assert!(engine.active_notes().is_empty());
}

#[test]
fn xy_pad_forwards_one_level() {
    let (engine, _handle) = engine();
    assert_eq!(engine.xy_pad_parameter(XyAxis::X), params::FILTER_CUTOFF);
    assert_eq!(engine.xy_pad_parameter(XyAxis::Y), params::FILTER_RESONANCE);

    assert!(engine.set_parameter(params::XY_PAD_X, 2000.0, false));
    assert_eq!(engine.get_parameter(params::XY_PAD_X), 2000.0);
    assert_eq!(engine.get_parameter(params::FILTER_CUTOFF), 2000.0);

    assert!(!engine.set_xy_pad_parameter(XyAxis::X, params::XY_PAD_Y));
    assert!(!engine.set_xy_pad_parameter(XyAxis::X, params::XY_PAD_X));
    assert!(!engine.set_xy_pad_parameter(XyAxis::X, 9_999));

    assert!(engine.set_xy_pad_parameter(XyAxis::Y, params::REVERB_MIX));
    assert!(engine.set_parameter(params::XY_PAD_Y, 0.4, false));
    assert_eq!(engine.get_parameter(params::REVERB_MIX), 0.4);
}

#[test]
fn automation_records_and_replays() {
    let (engine, handle) = engine();

    engine.start_automation_recording();
    assert!(engine.is_automation_recording());
    engine.set_parameter(params::FILTER_CUTOFF, 500.0, false);
    engine.set_parameter(params::FILTER_CUTOFF, 800.0, false);
    // Replayed writes are not recorded
    engine.set_parameter(params::REVERB_MIX, 0.9, true);
    engine.stop_automation_recording();

    assert!(engine.has_automation_data());
    let tracks = engine.automation_tracks();
    assert_eq!(tracks.len(), 1);
    let track = &tracks[&params::FILTER_CUTOFF];
    assert_eq!(track.len(), 2);
    assert_eq!(track[0].value, 500.0);
    assert_eq!(track[1].value, 800.0);
    assert!(track[0].timestamp <= track[1].timestamp);

    engine.set_parameter(params::FILTER_CUTOFF, 100.0, false);

    let replayed = Arc::new(Mutex::new(Vec::new()));
    let sink = replayed.clone();
    engine.set_automation_callback(Some(Arc::new(move |id: i32, value: f32| {
        sink.lock().push((id, value));
    })));

    assert!(engine.start_automation_playback());
    assert!(engine.is_automation_playing());
    for _ in 0..400 {
        render(&handle, BLOCK);
        if replayed.lock().len() >= 2 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(
        *replayed.lock(),
        vec![(params::FILTER_CUTOFF, 500.0), (params::FILTER_CUTOFF, 800.0)]
    );
    assert_eq!(engine.get_parameter(params::FILTER_CUTOFF), 800.0);
    // Playback does not grow the tracks
    assert_eq!(engine.automation_tracks()[&params::FILTER_CUTOFF].len(), 2);

    engine.clear_automation();
    assert!(!engine.has_automation_data());
    assert!(!engine.is_automation_playing());
    assert!(!engine.start_automation_playback());
}

#[test]
fn fft_size_changes_keep_valid_sizes() {
    let (engine, handle) = engine();
    assert_eq!(engine.fft_size(), 2048);
    assert!(!engine.set_fft_size(1000));
    assert!(!engine.set_fft_size(32));
    assert_eq!(engine.fft_size(), 2048);

    assert!(engine.set_fft_size(4096));
    assert_eq!(engine.fft_size(), 4096);
    render(&handle, BLOCK);
    assert!(engine.amplitude_level() > 0.0);
}

#[test]
fn granular_buffer_loads_through_the_queue() {
    let (engine, handle) = engine();
    assert!(!engine.load_granular_buffer(Vec::new()));

    let source: Vec<f32> = (0..4800)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect();
    assert!(engine.load_granular_buffer(source));
    assert!(engine.set_parameter(params::GRANULAR_ACTIVE, 1.0, false));
    assert!(engine.set_parameter(params::GRANULAR_GRAIN_RATE, 40.0, false));

    for _ in 0..20 {
        let block = render(&handle, BLOCK);
        assert!(block.iter().all(|s| s.is_finite()));
    }
    // A second load retires the first buffer on this side
    assert!(engine.load_granular_buffer(vec![0.1; 2400]));
    render(&handle, BLOCK);
}

#[test]
fn shutdown_clears_shared_state() {
    let (engine, _handle) = engine();
    engine.set_parameter(params::REVERB_MIX, 0.4, false);
    engine.note_on(60, 100);
    engine.start_midi_learn(params::REVERB_MIX);
    engine.process_midi_event(0xB0, 30, 1);
    engine.process_midi_event(0xBF, 32, 9);
    engine.set_parameter(params::MASTER_MUTE, 1.0, false);

    engine.shutdown();
    engine.initialize(SAMPLE_RATE, BLOCK as u32, 0.8).unwrap();

    assert_eq!(engine.get_parameter(params::REVERB_MIX), 0.0);
    assert!(engine.active_notes().is_empty());
    assert!(engine.cc_mappings().is_empty());
    assert_eq!(engine.ui_target_panel(), 0);
    assert!(!engine.is_muted());
}

#[test]
fn analyzer_finds_sine_frequency() {
    const RATE: f32 = 48_000.0;
    const FFT: usize = 4096;
    let readings = Arc::new(AnalysisReadings::new());
    let mut analyzer = SpectrumAnalyzer::new(FFT, RATE, readings.clone()).unwrap();

    let frequency = 1234.0;
    let block: Vec<f32> = (0..FFT)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / RATE).sin())
        .collect();
    analyzer.analyze(&block, 1);

    let found = readings.dominant_frequency();
    assert!(
        (found - frequency as f64).abs() <= analyzer.bin_width() as f64,
        "found {found} Hz, expected {frequency} Hz"
    );
    assert!(readings.mid() > readings.bass());
    assert!(readings.mid() > readings.high());
}
