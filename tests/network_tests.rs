//! Network instantiation and execution-order tests.

mod common;

use common::{engine_from, f64_of, try_engine_from};
use polaron::value::Value;
use serde_json::json;

/// Chained numbers with a feedback out-statement. The `number` proc acts
/// as a one-cycle delay, so the two adders climb by two each cycle.
#[test]
fn test_chained_numbers_with_feedback() {
    let pgm = json!({
        "network": { "procs": {
            "n_a":   { "class": "number", "args": { "in": 1 } },
            "n_b":   { "class": "number", "args": { "in": 1 } },
            "add_a": { "class": "add", "in": { "in_0": "n_a.out", "in_1": "n_b.out" } },
            "n_c":   { "class": "number", "args": { "in": 1 } },
            "add_b": { "class": "add",
                       "in":  { "in_0": "n_c.out", "in_1": "add_a.out" },
                       "out": { "out": "n_a.in" } },
            "prn":   { "class": "print", "in": { "in_0": "add_a.out", "in_1": "add_b.out" } }
        }}
    });
    let mut engine = engine_from(&pgm);

    let mut emitted = Vec::new();
    for _ in 0..10 {
        engine.exec_cycle().unwrap();
        emitted.push(f64_of(&engine, "add_a", "out"));
        emitted.push(f64_of(&engine, "add_b", "out"));
    }

    let expected: Vec<f64> = (2..=21).map(|v| v as f64).collect();
    assert_eq!(emitted, expected);
}

/// `mix_.in_ = split.out_` auto-iterates over the four split outputs.
#[test]
fn test_iterating_in_statement() {
    let pgm = json!({
        "max_cycle_count": 4,
        "network": { "procs": {
            "osc":   { "class": "sine_tone", "args": { "ch_cnt": 4, "freq": 100.0 } },
            "split": { "class": "audio_split", "in": { "in": "osc.out" } },
            "mix":   { "class": "audio_mix", "in": { "in_": "split.out_" } }
        }}
    });
    let mut engine = engine_from(&pgm);
    engine.exec_cycle().unwrap();

    // four inputs were created, one per split output
    let root = engine.root_net.unwrap();
    let mix = polaron::network::proc_find(&engine.graph, &engine.graph.nets[root], "mix", 0)
        .expect("mix proc");
    assert_eq!(engine.graph.procs[mix].mult_sfx_ids("in"), vec![0, 1, 2, 3]);

    // every osc channel carries the same tone, so the mix is 4x channel 0
    let osc_out = engine.get_variable_value("osc", "out", None).unwrap().as_abuf().unwrap();
    let mix_out = engine.get_variable_value("mix", "out", None).unwrap().as_abuf().unwrap();
    let osc_out = osc_out.borrow();
    let mix_out = mix_out.borrow();
    assert_eq!(mix_out.ch_n, 1);
    for i in 0..mix_out.frame_n {
        approx::assert_abs_diff_eq!(
            mix_out.channel(0)[i],
            4.0 * osc_out.channel(0)[i],
            epsilon = 1e-5
        );
    }
}

#[test]
fn test_both_local_proc_and_var_iterating_rejected() {
    let pgm = json!({
        "network": { "procs": {
            "osc":   { "class": "sine_tone", "args": { "ch_cnt": 2 } },
            "split": { "class": "audio_split", "in": { "in": "osc.out" } },
            "mix":   { "class": "audio_mix", "in": { "_.in_": "split.out_" } }
        }}
    });
    assert!(try_engine_from(&pgm).is_err());
}

#[test]
fn test_zero_iteration_count_rejected() {
    let pgm = json!({
        "network": { "procs": {
            "osc":   { "class": "sine_tone", "args": { "ch_cnt": 2 } },
            "split": { "class": "audio_split", "in": { "in": "osc.out" } },
            "mix":   { "class": "audio_mix", "in": { "in_0_0": "split.out_" } }
        }}
    });
    assert!(try_engine_from(&pgm).is_err());
}

#[test]
fn test_unknown_class_rejected() {
    let pgm = json!({
        "network": { "procs": { "x": { "class": "does_not_exist" } } }
    });
    assert!(try_engine_from(&pgm).is_err());
}

#[test]
fn test_duplicate_proc_label_rejected() {
    let pgm = json!({
        "network": { "procs": {
            "n0": { "class": "number" },
            "n":  { "class": "number" }
        }}
    });
    // `n0` and `n` both resolve to n:0
    assert!(try_engine_from(&pgm).is_err());
}

#[test]
fn test_set_on_connected_var_fails_and_leaves_state() {
    let pgm = json!({
        "network": { "procs": {
            "n": { "class": "number", "args": { "value": 7 } },
            "m": { "class": "number", "in": { "in": "n.out" } }
        }}
    });
    let mut engine = engine_from(&pgm);
    engine.exec_cycle().unwrap();

    let before = f64_of(&engine, "m", "value");
    assert!(engine
        .set_variable_value("m", "in", None, Value::Double(99.0))
        .is_err());
    assert_eq!(f64_of(&engine, "m", "value"), before);
}

#[test]
fn test_required_src_without_connection_rejected() {
    // audio_gain.in demands a source
    let pgm = json!({
        "network": { "procs": { "g": { "class": "audio_gain" } } }
    });
    assert!(try_engine_from(&pgm).is_err());
}

/// Rebuilding from the same cfg reproduces identical initial state for
/// every non-buffer variable.
#[test]
fn test_recreate_is_deterministic() {
    let pgm = json!({
        "network": { "procs": {
            "osc": { "class": "sine_tone", "args": { "freq": [220.0, 330.0], "ch_cnt": 2 } },
            "lvl": { "class": "audio_gain", "in": { "in": "osc.out" }, "args": { "gain": 0.5 } },
            "cnt": { "class": "counter", "args": { "max": 8.0, "mode": "loop" } }
        }}
    });

    let snap = |e: &polaron::Engine| -> Vec<String> {
        let mut out = Vec::new();
        for p in &e.graph.procs {
            for v in &p.vars {
                if !v.value.supports_ele_count() {
                    out.push(format!(
                        "{} {} {}",
                        p.ctx_label(),
                        v.ctx_label(&p.label, p.label_sfx_id),
                        v.value
                    ));
                }
            }
        }
        out
    };

    let a = engine_from(&pgm);
    let b = engine_from(&pgm);
    assert_eq!(snap(&a), snap(&b));
}

/// A UDP class packages a network fragment behind a class surface.
#[test]
fn test_udp_wrapper_proxies_in_and_out() {
    let pgm = json!({
        "udp": {
            "half": {
                "network": { "procs": {
                    "g": { "class": "audio_gain", "args": { "gain": 0.5 } }
                }},
                "vars": {
                    "in":  { "type": "audio", "doc": "wrapper input", "proxy": "g.in" },
                    "out": { "type": "audio", "doc": "wrapper output", "flags": ["out"], "proxy": "g.out" }
                }
            }
        },
        "network": { "procs": {
            "osc": { "class": "sine_tone", "args": { "freq": 100.0 } },
            "fx":  { "class": "half", "in": { "in": "osc.out" } }
        }}
    });
    let mut engine = engine_from(&pgm);
    engine.exec_cycle().unwrap();

    let osc = engine.get_variable_value("osc", "out", None).unwrap().as_abuf().unwrap();
    let fx = engine.get_variable_value("fx", "out", None).unwrap().as_abuf().unwrap();
    let osc = osc.borrow();
    let fx = fx.borrow();
    for i in 0..fx.frame_n {
        approx::assert_abs_diff_eq!(fx.channel(0)[i], 0.5 * osc.channel(0)[i], epsilon = 1e-6);
    }
}

/// After create, every non-runtime class var desc resolves through the
/// var map on the `any` channel.
#[test]
fn test_var_map_covers_every_desc() {
    let pgm = json!({
        "network": { "procs": {
            "osc": { "class": "sine_tone" },
            "lvl": { "class": "audio_gain", "in": { "in": "osc.out" } },
            "n":   { "class": "number" }
        }}
    });
    let engine = engine_from(&pgm);
    let root = engine.root_net.unwrap();
    for &p in &engine.graph.nets[root].proc_ids {
        let proc = &engine.graph.procs[p];
        let class = &engine.classes.classes[proc.class_idx];
        for (vid, desc) in class.var_descs.iter().enumerate() {
            if desc.type_fl.is_runtime() {
                continue;
            }
            let vi = proc
                .var_by_vid(vid, None)
                .unwrap_or_else(|| panic!("{}: no var for desc '{}'", proc.ctx_label(), desc.label));
            let var = &proc.vars[vi];
            assert!(
                var.value.is_null()
                    || polaron::TypeFl::can_convert(var.value.type_fl(), desc.type_fl),
                "{}: '{}' holds a value outside its declared type",
                proc.ctx_label(),
                desc.label
            );
        }
    }
}

/// `halt` flags end-of-stream once its input goes true.
#[test]
fn test_halt_proc_ends_run() {
    let pgm = json!({
        "network": { "procs": {
            "cnt":  { "class": "counter" },
            "trip": { "class": "sample_hold",
                      "in": { "in": "cnt.out", "trigger": "cnt.out" } },
            "stop": { "class": "halt", "in": { "in": "cnt.out" } }
        }}
    });
    let mut engine = engine_from(&pgm);
    // cycle 0 emits 0 (no halt); cycle 1 emits 1 -> halt at cycle end
    engine.exec_cycle().unwrap();
    let rc = engine.exec_cycle();
    assert!(matches!(rc, Err(e) if e.is_eof()));
}
