//! Preset engine tests: value-list application, dual interpolation, the
//! preset-pair table, and probabilistic selection plumbing.

mod common;

use common::{engine_from, f64_of};
use polaron::preset::{MultiPresetSel, PresetOrder};
use serde_json::json;

fn gain_pgm() -> serde_json::Value {
    json!({
        "network": {
            "procs": {
                "osc": { "class": "sine_tone", "args": { "freq": 200.0 } }
            },
            "presets": {
                "lo":  { "osc": { "gain": 0.0 } },
                "hi":  { "osc": { "gain": 1.0 } },
                "mid": [ "lo", "hi", 0.25 ]
            }
        }
    })
}

#[test]
fn test_value_list_preset_applies() {
    let mut engine = engine_from(&gain_pgm());
    engine.apply_preset("hi").unwrap();
    assert_eq!(f64_of(&engine, "osc", "gain"), 1.0);
    engine.apply_preset("lo").unwrap();
    assert_eq!(f64_of(&engine, "osc", "gain"), 0.0);
}

#[test]
fn test_unknown_preset_is_an_error() {
    let mut engine = engine_from(&gain_pgm());
    assert!(engine.apply_preset("nope").is_err());
}

/// The named dual preset `[lo, hi, 0.25]` lands exactly a quarter of the
/// way between the endpoints.
#[test]
fn test_dual_preset_interpolates() {
    let mut engine = engine_from(&gain_pgm());
    engine.apply_preset("mid").unwrap();
    approx::assert_abs_diff_eq!(f64_of(&engine, "osc", "gain"), 0.25, epsilon = f64::EPSILON);
}

#[test]
fn test_dual_preset_by_labels() {
    let mut engine = engine_from(&gain_pgm());
    engine.apply_dual_preset("lo", "hi", 0.75).unwrap();
    approx::assert_abs_diff_eq!(f64_of(&engine, "osc", "gain"), 0.75, epsilon = f64::EPSILON);
}

/// Applying the same preset twice produces identical state; a dual of a
/// preset with itself equals the preset alone.
#[test]
fn test_preset_idempotence() {
    let mut engine = engine_from(&gain_pgm());
    engine.apply_preset("hi").unwrap();
    let once = f64_of(&engine, "osc", "gain");
    engine.apply_preset("hi").unwrap();
    assert_eq!(f64_of(&engine, "osc", "gain"), once);

    for coeff in [0.0, 0.3, 1.0] {
        engine.apply_dual_preset("hi", "hi", coeff).unwrap();
        assert_eq!(f64_of(&engine, "osc", "gain"), once);
    }
}

/// Preset-pair table length is the sum over procs and vars of
/// `channel_count + 1`.
#[test]
fn test_pair_table_enumerates_every_channelized_var() {
    let engine = engine_from(&gain_pgm());
    let root = engine.root_net.unwrap();
    let net = &engine.graph.nets[root];

    let mut expected = 0usize;
    for &p in &net.proc_ids {
        let proc = &engine.graph.procs[p];
        let mut seen: Vec<(String, u32)> = Vec::new();
        for v in &proc.vars {
            let key = (v.label.clone(), v.label_sfx_id);
            if !seen.contains(&key) {
                expected += proc.channel_count(&v.label, v.label_sfx_id) + 1;
                seen.push(key);
            }
        }
    }
    assert_eq!(net.preset_pairs.len(), expected);
}

/// A channelized preset value lands one element per channel.
#[test]
fn test_preset_list_value_channelizes() {
    let pgm = json!({
        "network": {
            "procs": {
                "osc": { "class": "sine_tone", "args": { "ch_cnt": 2 } }
            },
            "presets": {
                "spread": { "osc": { "freq": [220.0, 440.0] } }
            }
        }
    });
    let mut engine = engine_from(&pgm);
    engine.apply_preset("spread").unwrap();
    let f0 = engine.get_variable_value("osc", "freq", Some(0)).unwrap().as_f64().unwrap();
    let f1 = engine.get_variable_value("osc", "freq", Some(1)).unwrap().as_f64().unwrap();
    assert_eq!((f0, f1), (220.0, 440.0));
}

/// A preset may reference a class preset of the target proc by label.
#[test]
fn test_preset_reference_to_class_preset() {
    let pgm = json!({
        "network": {
            "procs": { "osc": { "class": "sine_tone" } },
            "presets": { "soft": { "osc": "quiet" } }
        }
    });
    let mut engine = engine_from(&pgm);
    engine.apply_preset("soft").unwrap();
    approx::assert_abs_diff_eq!(f64_of(&engine, "osc", "gain"), 0.1, epsilon = 1e-9);
}

/// The multi-preset selector with interpolation off and no probability
/// flags applies the first candidate deterministically.
#[test]
fn test_multi_preset_deterministic_path() {
    let mut engine = engine_from(&gain_pgm());
    let sel = MultiPresetSel {
        pri_prob_fl: false,
        sec_prob_fl: false,
        interp_fl: false,
        coeffs: vec![],
        presets: vec![
            PresetOrder { preset_label: "hi".into(), order: 1 },
            PresetOrder { preset_label: "lo".into(), order: 2 },
        ],
    };
    engine.apply_multi_preset(&sel).unwrap();
    assert_eq!(f64_of(&engine, "osc", "gain"), 1.0);
}

/// With interpolation on and two candidates, the selection applies a dual
/// whose coefficient is the mean of the nonzero inputs.
#[test]
fn test_multi_preset_interpolated_pair() {
    let mut engine = engine_from(&gain_pgm());
    let sel = MultiPresetSel {
        pri_prob_fl: false,
        sec_prob_fl: false,
        interp_fl: true,
        coeffs: vec![0.5],
        presets: vec![
            PresetOrder { preset_label: "lo".into(), order: 1 },
            PresetOrder { preset_label: "hi".into(), order: 2 },
        ],
    };
    engine.apply_multi_preset(&sel).unwrap();
    // primary is `lo` (rank 1), secondary the remaining `hi`, coeff 0.5
    approx::assert_abs_diff_eq!(f64_of(&engine, "osc", "gain"), 0.5, epsilon = 1e-12);
}

/// Applying a preset after the initial one was set by cfg works the same
/// as applying it by hand (the `preset:` cfg field).
#[test]
fn test_initial_preset_from_cfg() {
    let mut pgm = gain_pgm();
    pgm["preset"] = json!("hi");
    let engine = engine_from(&pgm);
    assert_eq!(f64_of(&engine, "osc", "gain"), 1.0);
}
