//! Polyphonic network replication tests.

mod common;

use common::engine_from;
use serde_json::json;

fn poly_pgm() -> serde_json::Value {
    json!({
        "network": {
            "procs": {
                "vox": {
                    "class": "poly",
                    "args": { "count": 2 },
                    "network": {
                        "procs": { "osc": { "class": "sine_tone", "args": { "gain": 0.9 } } },
                        "presets": {
                            "tune": {
                                "osc_0": { "freq": 220.0 },
                                "osc_1": { "freq": 440.0 }
                            }
                        }
                    }
                }
            },
            "presets": { "voices": { "vox": "tune" } }
        }
    })
}

/// Walk the poly chain of the `vox` proc's internal networks.
fn voice_nets(engine: &polaron::Engine) -> Vec<usize> {
    let root = engine.root_net.unwrap();
    let vox =
        polaron::network::proc_find(&engine.graph, &engine.graph.nets[root], "vox", 0).unwrap();
    let mut ids = Vec::new();
    let mut id = engine.graph.procs[vox].internal_net;
    while let Some(i) = id {
        ids.push(i);
        id = engine.graph.nets[i].poly_link;
    }
    ids
}

/// `poly_count = 2` yields exactly two linked replicas with poly indexes
/// 0 and 1, and procs suffixed by voice.
#[test]
fn test_poly_replication_shape() {
    let engine = engine_from(&poly_pgm());
    let nets = voice_nets(&engine);
    assert_eq!(nets.len(), 2);
    for (k, &id) in nets.iter().enumerate() {
        let net = &engine.graph.nets[id];
        assert_eq!(net.poly_idx, k as u32);
        assert_eq!(net.poly_n, 2);
        let osc =
            polaron::network::proc_find(&engine.graph, net, "osc", k as u32).expect("voice osc");
        assert_eq!(engine.graph.procs[osc].label_sfx_id, k as u32);
    }
}

/// An explicit proc suffix inside a poly network must match the voice
/// index.
#[test]
fn test_poly_suffix_mismatch_rejected() {
    let pgm = json!({
        "network": { "procs": {
            "vox": {
                "class": "poly",
                "args": { "count": 2 },
                "network": { "procs": { "osc7": { "class": "sine_tone" } } }
            }
        }}
    });
    assert!(common::try_engine_from(&pgm).is_err());
}

/// Per-voice presets tune the two voices to 220 Hz and 440 Hz; both
/// produce audio and their measured frequencies match.
#[test]
fn test_poly_voices_follow_per_voice_preset() {
    let mut engine = engine_from(&poly_pgm());
    engine.apply_preset("voices").unwrap();

    let nets = voice_nets(&engine);
    let bufs: Vec<_> = nets
        .iter()
        .enumerate()
        .map(|(k, &id)| {
            let addr = polaron::network::get_var(
                &engine.graph,
                id,
                &format!("osc{k}"),
                "out",
                None,
            )
            .expect("voice osc.out");
            polaron::network::var_read(&engine.graph, addr).as_abuf().unwrap()
        })
        .collect();

    // run one second and collect each voice's channel 0
    let srate = engine.sample_rate();
    let cycles = (srate as usize) / engine.frames_per_cycle();
    let mut voices: Vec<Vec<f32>> = vec![Vec::new(); bufs.len()];
    for _ in 0..cycles {
        engine.exec_cycle().unwrap();
        for (v, buf) in voices.iter_mut().zip(&bufs) {
            v.extend_from_slice(buf.borrow().channel(0));
        }
    }

    for (v, expect_hz) in voices.iter().zip([220.0f64, 440.0]) {
        let rms = (v.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>() / v.len() as f64)
            .sqrt();
        assert!(rms > 0.1, "voice is silent (rms {rms})");

        // positive-going zero crossings over one second approximate Hz
        let mut crossings = 0usize;
        for w in v.windows(2) {
            if w[0] <= 0.0 && w[1] > 0.0 {
                crossings += 1;
            }
        }
        let dur = v.len() as f64 / srate;
        let hz = crossings as f64 / dur;
        assert!(
            (hz - expect_hz).abs() < 5.0,
            "measured {hz} Hz, expected {expect_hz}"
        );
    }
}
