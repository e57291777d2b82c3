//! Cross-fade controller tests.

use polaron::crossfade::{CrossFader, DestId, FadeState};
use polaron::device::ExternalDevice;
use polaron::procs;
use serde_json::json;
use std::rc::Rc;

fn fader(cross_n: usize) -> CrossFader {
    let pgm = json!({
        "network": { "procs": {
            "osc": { "class": "sine_tone", "args": { "freq": 330.0 } },
            "main_out": { "class": "audio_out", "in": { "in": "osc.out" } }
        }}
    });
    let classes = Rc::new(procs::class_dict(None).unwrap());
    let devices = vec![ExternalDevice::audio_out("main", 48000.0, 1, 64)];
    CrossFader::new(classes, &pgm, cross_n, devices, None).unwrap()
}

#[test]
fn test_initial_states() {
    let f = fader(2);
    assert_eq!(f.cross_count(), 2);
    assert_eq!(f.current_index(), 0);
    assert_eq!(f.state_of(0), (FadeState::Active, 1.0));
    assert_eq!(f.state_of(1), (FadeState::Inactive, 0.0));
}

#[test]
fn test_fewer_than_two_networks_rounds_up() {
    let f = fader(1);
    assert_eq!(f.cross_count(), 2);
}

/// With a one-second ramp at 48 kHz and 64 frames per cycle, the fade
/// completes after exactly 48000/64 = 750 cycles: the incoming network is
/// active at gain 1, the outgoing one inactive at gain 0. While the fade
/// runs, the two gains sum to one.
#[test]
fn test_cross_fade_completion() {
    let mut f = fader(2);
    for _ in 0..4 {
        f.exec_cycle().unwrap();
    }

    f.begin_cross_fade(1000);
    assert_eq!(f.current_index(), 1);

    let cycles = 48000 / 64;
    for i in 0..cycles {
        f.exec_cycle().unwrap();
        let (s0, g0) = f.state_of(0);
        let (s1, g1) = f.state_of(1);
        approx::assert_abs_diff_eq!(g0 + g1, 1.0, epsilon = 1e-9);
        if i + 1 < cycles {
            assert_eq!(s1, FadeState::FadeIn);
            assert_eq!(s0, FadeState::FadeOut);
        }
    }

    assert_eq!(f.state_of(1), (FadeState::Active, 1.0));
    assert_eq!(f.state_of(0), (FadeState::Inactive, 0.0));
}

/// The master output carries audio from the active replica only; during
/// a fade the blend keeps it nonzero throughout.
#[test]
fn test_master_output_follows_active_net() {
    let mut f = fader(2);
    f.exec_cycle().unwrap();

    let master = f.devices[0].abuf.clone().unwrap();
    let rms = |buf: &polaron::buffer::AudioBuf| {
        (buf.channel(0).iter().map(|s| (*s as f64).powi(2)).sum::<f64>()
            / buf.frame_n as f64)
            .sqrt()
    };
    assert!(rms(&master.borrow()) > 0.1);

    f.begin_cross_fade(100);
    for _ in 0..10 {
        f.exec_cycle().unwrap();
        assert!(rms(&master.borrow()) > 0.05);
    }
}

/// Preset and variable operations address {current, next, all}.
#[test]
fn test_destination_selectors() {
    let mut f = fader(3);

    f.set_variable_value(DestId::Next, "osc", "freq", None, polaron::Value::Double(550.0))
        .unwrap();
    let next = f
        .get_variable_value(DestId::Next, "osc", "freq", None)
        .unwrap()
        .as_f64()
        .unwrap();
    let cur = f
        .get_variable_value(DestId::Current, "osc", "freq", None)
        .unwrap()
        .as_f64()
        .unwrap();
    assert_eq!(next, 550.0);
    assert_eq!(cur, 330.0);

    f.set_variable_value(DestId::All, "osc", "freq", None, polaron::Value::Double(110.0))
        .unwrap();
    for dest in [DestId::Current, DestId::Next] {
        assert_eq!(
            f.get_variable_value(dest, "osc", "freq", None).unwrap().as_f64().unwrap(),
            110.0
        );
    }
}
