//! Built-in processor classes.
//!
//! Each module defines one class: its cfg fragment (variable descriptors,
//! class presets) and its [`ProcImpl`](crate::proc::ProcImpl) lifecycle
//! state. The class dictionary is assembled from these fragments plus any
//! user-defined-proc dictionary supplied by the program.
//!
//! Value-id constants in each module index the class's variable
//! descriptors and must match the order of the `vars` dictionary in its
//! cfg fragment.

pub mod add;
pub mod audio_gain;
pub mod audio_in;
pub mod audio_mix;
pub mod audio_out;
pub mod audio_silence;
pub mod audio_split;
pub mod counter;
pub mod halt;
pub mod midi_in;
pub mod midi_out;
pub mod number;
pub mod poly;
pub mod print;
pub mod sample_hold;
pub mod sine_tone;
pub mod user_def_proc;

use crate::class::{ClassDict, ProcCtor};
use crate::error::Result;
use serde_json::{json, Value as Cfg};
use std::rc::Rc;

/// The built-in class dictionary cfg.
pub fn class_dict_cfg() -> Cfg {
    let mut dict = json!({});
    let m = dict.as_object_mut().unwrap();
    for (label, cfg) in [
        ("audio_in", audio_in::class_cfg()),
        ("audio_out", audio_out::class_cfg()),
        ("midi_in", midi_in::class_cfg()),
        ("midi_out", midi_out::class_cfg()),
        ("sine_tone", sine_tone::class_cfg()),
        ("audio_gain", audio_gain::class_cfg()),
        ("audio_split", audio_split::class_cfg()),
        ("audio_mix", audio_mix::class_cfg()),
        ("audio_silence", audio_silence::class_cfg()),
        ("number", number::class_cfg()),
        ("add", add::class_cfg()),
        ("counter", counter::class_cfg()),
        ("sample_hold", sample_hold::class_cfg()),
        ("print", print::class_cfg()),
        ("halt", halt::class_cfg()),
        ("poly", poly::class_cfg()),
    ] {
        m.insert(label.to_string(), cfg);
    }
    dict
}

/// Lifecycle constructor lookup for the built-in classes.
pub fn ctor_for(label: &str) -> Option<ProcCtor> {
    Some(match label {
        "audio_in" => Rc::new(|| Box::new(audio_in::AudioIn::default())),
        "audio_out" => Rc::new(|| Box::new(audio_out::AudioOut::default())),
        "midi_in" => Rc::new(|| Box::new(midi_in::MidiIn::default())),
        "midi_out" => Rc::new(|| Box::new(midi_out::MidiOut::default())),
        "sine_tone" => Rc::new(|| Box::new(sine_tone::SineTone::default())),
        "audio_gain" => Rc::new(|| Box::new(audio_gain::AudioGain::default())),
        "audio_split" => Rc::new(|| Box::new(audio_split::AudioSplit::default())),
        "audio_mix" => Rc::new(|| Box::new(audio_mix::AudioMix::default())),
        "audio_silence" => Rc::new(|| Box::new(audio_silence::AudioSilence::default())),
        "number" => Rc::new(|| Box::new(number::Number::default())),
        "add" => Rc::new(|| Box::new(add::Add::default())),
        "counter" => Rc::new(|| Box::new(counter::Counter::default())),
        "sample_hold" => Rc::new(|| Box::new(sample_hold::SampleHold::default())),
        "print" => Rc::new(|| Box::new(print::Print::default())),
        "halt" => Rc::new(|| Box::new(halt::Halt::default())),
        "poly" => Rc::new(|| Box::new(poly::Poly::default())),
        _ => return None,
    })
}

/// Build the class dictionary from the built-ins plus an optional UDP
/// dictionary from the program cfg.
pub fn class_dict(udp_cfg: Option<&Cfg>) -> Result<ClassDict> {
    ClassDict::from_cfg(
        &class_dict_cfg(),
        udp_cfg,
        &ctor_for,
        Rc::new(|| Box::new(user_def_proc::UserDefProc::default())),
    )
}
