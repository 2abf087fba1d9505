//! Runtime-level behaviour of the effect set
//!
//! Every effect driven the way a host drives it: through `EffectRuntime`,
//! with parameters delivered by name or over the snapshot channel.
//! - Feedback delay repeats decay and stay bounded
//! - Reset replays bit-identically for every kind, also with smoothers mid-ramp
//! - Mono equals the mid of the stereo path
//! - Reported latency is exact and survives bypass
//! - Faults never poison feedback state
//! - IRs and loops reach the audio thread through their handles

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use pf_core::{ImpulseResponse, ParamMap, ProcessSpec};
use pf_engine::effects::{Cabinet, Looper, LooperConfig, LooperState, NoiseGate};
use pf_engine::{
    EffectKind, EffectRuntime, RuntimeState, create_effect, param_channel,
};
use pf_engine::handoff::DEFAULT_PARAM_QUEUE;
use pf_file::IrLibrary;

const SAMPLE_RATE: f64 = 48000.0;

fn spec() -> ProcessSpec {
    ProcessSpec::new(SAMPLE_RATE, 512)
}

/// Deterministic white noise in [-1, 1)
fn generate_noise(samples: usize, seed: u32) -> Vec<f64> {
    let mut state = seed;
    (0..samples)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state as f64 / u32::MAX as f64) * 2.0 - 1.0
        })
        .collect()
}

fn runtime(kind: EffectKind) -> EffectRuntime {
    let mut runtime = EffectRuntime::new(create_effect(kind));
    runtime.prepare(spec());
    runtime
}

fn run_stereo(runtime: &mut EffectRuntime, left: &[f64], right: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut l = left.to_vec();
    let mut r = right.to_vec();
    runtime.process_stereo(&mut l, &mut r);
    (l, r)
}

fn peak(signal: &[f64]) -> f64 {
    signal.iter().fold(0.0, |p: f64, s| p.max(s.abs()))
}

fn rms(signal: &[f64]) -> f64 {
    (signal.iter().map(|s| s * s).sum::<f64>() / signal.len().max(1) as f64).sqrt()
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEEDBACK
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_delay_repeats_decay_and_stay_bounded() {
    let mut rt = runtime(EffectKind::Delay);
    assert!(rt.set_param_by_name("time", 10.0));
    assert!(rt.set_param_by_name("feedback", 0.5));
    assert!(rt.set_param_by_name("mix", 1.0));
    assert!(rt.set_param_by_name("damping", 20000.0));

    // Deliver the parameters, then snap the glide to the new time
    let silence = vec![0.0; 64];
    run_stereo(&mut rt, &silence, &silence);
    rt.reset();

    let period = 480;
    let repeats = 8;
    let mut input = vec![0.0; period * (repeats + 1)];
    input[0] = 1.0;
    let (out, _) = run_stereo(&mut rt, &input, &input);

    assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));

    let peaks: Vec<f64> = (1..=repeats)
        .map(|k| peak(&out[k * period - period / 2..k * period + period / 2]))
        .collect();
    assert!(peaks[0] > 0.5);
    for pair in peaks.windows(2) {
        assert!(pair[1] < pair[0], "repeat peaks not decreasing: {peaks:?}");
        assert!(pair[1] > 0.0);
    }
}

#[test]
fn test_nan_burst_does_not_poison_feedback() {
    let mut rt = runtime(EffectKind::Delay);
    rt.set_param_by_name("feedback", 0.9);

    let mut input = generate_noise(512, 4);
    input[100] = f64::NAN;
    run_stereo(&mut rt, &input, &input);
    assert_eq!(rt.fault_count(), 1);

    let clean = generate_noise(48000, 5);
    let (l, r) = run_stereo(&mut rt, &clean, &clean);
    assert!(l.iter().chain(&r).all(|s| s.is_finite()));
    assert_eq!(rt.fault_count(), 1);
    assert_eq!(rt.state(), RuntimeState::Active);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETERMINISM
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reset_replays_bit_identical_for_every_kind() {
    let left = generate_noise(4096, 1);
    let right = generate_noise(4096, 2);

    for kind in EffectKind::ALL {
        let mut fresh = runtime(kind);
        let first = run_stereo(&mut fresh, &left, &right);

        let mut used = runtime(kind);
        run_stereo(&mut used, &right, &left);
        used.reset();
        let second = run_stereo(&mut used, &left, &right);

        assert!(first == second, "{kind:?} did not replay after reset");
        assert!(
            first.0.iter().chain(&first.1).all(|s| s.is_finite()),
            "{kind:?} produced non-finite output"
        );
    }
}

/// Move every parameter to 90 % of its normalised range
fn set_all_params_high(rt: &mut EffectRuntime) {
    for spec in rt.params().specs() {
        rt.set_param(spec.id, spec.range.denormalize(0.9));
    }
}

#[test]
fn test_reset_mid_glide_replays_with_non_default_params() {
    let left = generate_noise(4096, 11);
    let right = generate_noise(4096, 12);

    for kind in EffectKind::ALL {
        // Reference: configured, prepared and reset before any audio
        let mut fresh = EffectRuntime::new(create_effect(kind));
        set_all_params_high(&mut fresh);
        fresh.prepare(spec());
        fresh.reset();
        let first = run_stereo(&mut fresh, &left, &right);

        // Parameters change while running; reset lands with smoothers mid-ramp
        let mut used = runtime(kind);
        run_stereo(&mut used, &right, &left);
        set_all_params_high(&mut used);
        run_stereo(&mut used, &left[..64], &right[..64]);
        used.reset();
        let second = run_stereo(&mut used, &left, &right);

        assert!(first == second, "{kind:?} did not replay after a mid-glide reset");

        used.reset();
        let third = run_stereo(&mut used, &left, &right);
        assert!(second == third, "{kind:?} did not replay after a second reset");
    }
}

#[test]
fn test_mono_is_mid_of_duplicated_stereo() {
    let input = generate_noise(3000, 9);

    for kind in EffectKind::ALL {
        let mut mono = runtime(kind);
        let mut mono_out = input.clone();
        mono.process(&mut mono_out);

        let mut stereo = runtime(kind);
        let (l, r) = run_stereo(&mut stereo, &input, &input);

        for (i, m) in mono_out.iter().enumerate() {
            let mid = 0.5 * (l[i] + r[i]);
            assert!(
                (m - mid).abs() < 1e-12,
                "{kind:?} sample {i}: mono {m} vs mid {mid}"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LATENCY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reported_latency_matches_capabilities() {
    for kind in EffectKind::ALL {
        let rt = runtime(kind);
        let caps = rt.descriptor().capabilities;
        if !caps.reports_latency {
            assert_eq!(rt.latency_samples(), 0, "{kind:?}");
        }
    }
    assert_eq!(runtime(EffectKind::Compressor).latency_samples(), 72);
    assert_eq!(runtime(EffectKind::Cabinet).latency_samples(), 256);
}

#[test]
fn test_bypass_keeps_latency() {
    for kind in [EffectKind::Compressor, EffectKind::Cabinet] {
        let mut rt = runtime(kind);
        let latency = rt.latency_samples();

        rt.set_bypass(true);
        assert_eq!(rt.latency_samples(), latency);

        let input = generate_noise(2048, 3);
        let (l, _) = run_stereo(&mut rt, &input, &input);
        assert!(l[..latency].iter().all(|&s| s == 0.0));
        assert_eq!(&l[latency..], &input[..input.len() - latency]);

        rt.set_bypass(false);
        assert_eq!(rt.latency_samples(), latency);
    }
}

#[test]
fn test_cabinet_unit_impulse_is_delayed_identity() {
    let mut cabinet = Cabinet::new();
    cabinet
        .set_impulse_response(Arc::new(ImpulseResponse::unit_impulse(SAMPLE_RATE)))
        .unwrap();
    let mut rt = EffectRuntime::new(Box::new(cabinet));
    rt.prepare(spec());
    let latency = rt.latency_samples();

    let left = generate_noise(4096, 21);
    let right = generate_noise(4096, 22);
    let (l, r) = run_stereo(&mut rt, &left, &right);
    for i in 0..left.len() - latency {
        assert_abs_diff_eq!(l[i + latency], left[i], epsilon = 1e-12);
        assert_abs_diff_eq!(r[i + latency], right[i], epsilon = 1e-12);
    }
}

#[test]
fn test_cabinet_loads_ir_file_through_library() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cab.wav");
    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, wav_spec).unwrap();
    for s in [16384i16, 0, 0, 0] {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let mut cabinet = Cabinet::new();
    let mut loader = cabinet.loader();
    let mut rt = EffectRuntime::new(Box::new(cabinet));
    rt.prepare(spec());

    let library = IrLibrary::new();
    loader.load_file(&library, &path).unwrap();
    assert_eq!(library.stats().misses, 1);

    let mut input = vec![0.0; 1024];
    input[0] = 1.0;
    let (l, _) = run_stereo(&mut rt, &input, &input);
    // Normalised to a 0.5 peak, one block late
    assert_abs_diff_eq!(l[256], 0.5, epsilon = 1e-9);
    assert!(l[257..].iter().all(|s| s.abs() < 1e-9));

    assert!(loader.load_file(&library, dir.path().join("missing.wav")).is_err());
}

#[test]
fn test_cabinet_fault_keeps_reported_latency() {
    let mut cabinet = Cabinet::new();
    cabinet
        .set_impulse_response(Arc::new(ImpulseResponse::unit_impulse(SAMPLE_RATE)))
        .unwrap();
    let mut rt = EffectRuntime::new(Box::new(cabinet));
    rt.prepare(spec());
    let latency = rt.latency_samples();
    assert_eq!(latency, 256);

    let first = generate_noise(512, 31);
    run_stereo(&mut rt, &first, &first);
    assert_eq!(rt.fault_count(), 0);

    // A NaN on the right reaches the output inside this block
    let second = generate_noise(512, 32);
    let mut right = second.clone();
    right[0] = f64::NAN;
    let (l, _) = run_stereo(&mut rt, &second, &right);
    assert_eq!(rt.fault_count(), 1);

    let mut expected = first[512 - latency..].to_vec();
    expected.extend_from_slice(&second[..512 - latency]);
    assert_eq!(l, expected);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER HANDOFF
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_snapshots_reach_the_audio_thread() {
    let (mut publisher, receiver) = param_channel(DEFAULT_PARAM_QUEUE);
    let mut rt = EffectRuntime::new(create_effect(EffectKind::Overdrive)).with_receiver(receiver);
    rt.prepare(spec());

    let mut control = ParamMap::new(rt.descriptor().params);
    let mix = control.id_of("mix").unwrap();

    control.set(mix, 0.3);
    assert!(publisher.publish_map(&control));
    control.set(mix, 0.0);
    assert!(publisher.publish_map(&control));
    assert_eq!(publisher.generation(), 2);

    // Only the newest snapshot applies: zero mix is exactly dry
    let input = generate_noise(1024, 6);
    let (l, r) = run_stereo(&mut rt, &input, &input);
    assert_eq!(rt.param(mix), 0.0);
    assert_eq!(l, input);
    assert_eq!(r, input);
}

#[test]
fn test_out_of_range_values_are_clamped() {
    let mut rt = runtime(EffectKind::Delay);
    let feedback = rt.params().id_of("feedback").unwrap();
    rt.set_param(feedback, 7.0);
    assert!(rt.param(feedback) <= 0.95);
    rt.set_param(feedback, f64::NAN);
    assert!(rt.param(feedback).is_finite());
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEFUL EFFECTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_gate_mutes_hiss_and_passes_signal() {
    let mut rt = EffectRuntime::new(Box::new(NoiseGate::new()));
    rt.prepare(spec());

    let hiss: Vec<f64> = generate_noise(9600, 8).iter().map(|s| s * 3e-4).collect();
    let (l, _) = run_stereo(&mut rt, &hiss, &hiss);
    assert!(rms(&l[4800..]) < rms(&hiss[4800..]) * 0.01);

    let tone = pf_dsp::analysis::sine(440.0, SAMPLE_RATE, 0.5, 9600);
    let (l, _) = run_stereo(&mut rt, &tone, &tone);
    assert!(rms(&l[4800..]) > rms(&tone[4800..]) * 0.95);
}

#[test]
fn test_looper_driven_from_control_handle() {
    let mut looper = Looper::with_config(LooperConfig {
        max_seconds: 1.0,
        ..LooperConfig::default()
    });
    let mut control = looper.control();
    let mut rt = EffectRuntime::new(Box::new(looper));
    rt.prepare(spec());
    rt.trigger();

    let take = generate_noise(1000, 12);
    control.record();
    let (l, _) = run_stereo(&mut rt, &take, &take);
    assert_eq!(l, take);
    assert_eq!(control.state(), LooperState::Recording);

    control.play();
    let silence = vec![0.0; 2500];
    let (l, _) = run_stereo(&mut rt, &silence, &silence);
    assert_eq!(control.state(), LooperState::Playing);
    assert_eq!(control.loop_length(), 1000);
    for (i, s) in l.iter().enumerate() {
        assert_eq!(*s, take[i % 1000]);
    }

    control.clear();
    let (l, _) = run_stereo(&mut rt, &silence, &silence);
    assert_eq!(control.state(), LooperState::Idle);
    assert!(l.iter().all(|&s| s == 0.0));
}
