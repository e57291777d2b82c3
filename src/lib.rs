//! # Polaron - runtime audio/MIDI dataflow engine
//!
//! Polaron runs networks of processor instances ("procs") connected by
//! typed, channelized variables. A network is described declaratively as
//! a JSON cfg - procs, their arguments, input/output wiring with
//! iteration shorthand, presets - and driven by a periodic execution
//! cycle, one cycle per audio-device callback.
//!
//! ## Core pieces
//!
//! - **Values & buffers** ([`value`], [`buffer`], [`record`]): a tagged
//!   value union over scalars, strings, cfg nodes, MIDI messages and
//!   audio/spectral/MIDI/record buffers.
//! - **Classes & variables** ([`class`], [`var`]): a class declares its
//!   variables once; instances stamp typed, connectable variable slots
//!   from the descriptors, with per-channel children created on demand.
//! - **Networks** ([`network`]): declarative instantiation in execution
//!   order, `in:`/`out:` statement wiring (with `name_`, `name_5_3`
//!   iteration forms), polyphonic replication and user-defined procs.
//! - **Presets** ([`preset`]): named parameter collections, dual-preset
//!   interpolation and rank-weighted probabilistic selection.
//! - **Runtime** ([`engine`], [`crossfade`], [`device`]): the
//!   single-threaded cycle driver, UI update batching, the external
//!   device surface, and cross-fading between parallel network replicas.
//!
//! ## Example
//!
//! ```rust
//! use polaron::engine::Engine;
//! use polaron::procs;
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let pgm = json!({
//!     "max_cycle_count": 4,
//!     "network": {
//!         "procs": {
//!             "osc":  { "class": "sine_tone", "args": { "freq": 220.0 } },
//!             "lvl":  { "class": "audio_gain", "in": { "in": "osc.out" } }
//!         }
//!     }
//! });
//!
//! let classes = Rc::new(procs::class_dict(None).unwrap());
//! let mut engine = Engine::new(classes, &pgm).unwrap();
//! engine.initialize(Vec::new(), None).unwrap();
//! engine.exec().unwrap();
//! assert_eq!(engine.cycle_index(), 4);
//! ```

pub mod alloc_guard;
pub mod buffer;
pub mod cfg;
pub mod class;
pub mod crossfade;
pub mod device;
pub mod engine;
pub mod error;
pub mod midi;
pub mod network;
pub mod preset;
pub mod proc;
pub mod procs;
pub mod record;
pub mod stmt;
pub mod ui;
pub mod value;
pub mod var;

pub use crate::engine::Engine;
pub use crate::error::{Error, Result};
pub use crate::value::{TypeFl, Value};
