//! Record plumbing through the network: custom leaf classes publish and
//! consume record buffers, and required-field validation runs at build
//! time.

use polaron::buffer::RecordBuf;
use polaron::class::{ClassDict, ProcCtor};
use polaron::engine::Engine;
use polaron::error::Result;
use polaron::proc::{ExecState, ProcCtx, ProcImpl};
use polaron::procs;
use polaron::record::{Record, RecordType};
use polaron::value::Value;
use serde_json::{json, Value as Cfg};
use std::rc::Rc;

/// Emits one record per cycle from a record type built at create time.
#[derive(Default)]
struct RecdGen {
    rtype: Option<Rc<RecordType>>,
    pitch_idx: usize,
    next_pitch: u32,
}

const GEN_FIELDS: usize = 0; // vid of the `fields` cfg var
const GEN_OUT: usize = 1;

impl ProcImpl for RecdGen {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let fields = ctx.cfg(GEN_FIELDS)?;
        let rtype = RecordType::from_cfg(Some(&*fields), None)?;
        self.pitch_idx = rtype.field_index("pitch").unwrap_or(usize::MAX);
        self.next_pitch = 60;
        let rbuf = RecordBuf::new(Rc::clone(&rtype), 8);
        self.rtype = Some(rtype);
        ctx.set_rbuf(GEN_OUT, rbuf.shared())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let rbuf = ctx.rbuf(GEN_OUT)?;
        let mut rbuf = rbuf.borrow_mut();
        let rtype = self.rtype.as_ref().unwrap();
        rbuf.recds.clear();
        let mut r = Record::init(rtype, None);
        if self.pitch_idx != usize::MAX {
            r.set(rtype, self.pitch_idx, Value::UInt(self.next_pitch))?;
            self.next_pitch += 1;
        }
        rbuf.recds.push(r);
        Ok(ExecState::Continue)
    }
}

/// Copies the `pitch` field of incoming records to its `out` variable.
#[derive(Default)]
struct PitchTap {
    last: u32,
}

const TAP_IN: usize = 0;
const TAP_OUT: usize = 1;

impl ProcImpl for PitchTap {
    fn notify(&mut self, ctx: &mut ProcCtx, var_idx: usize) -> Result<()> {
        if ctx.proc().vars[var_idx].vid != TAP_IN {
            return Ok(());
        }
        let rbuf = ctx.rbuf(TAP_IN)?;
        let rbuf = rbuf.borrow();
        let rtype = Rc::clone(&rbuf.rtype);
        if let Some(idx) = rtype.field_index("pitch") {
            for r in &rbuf.recds {
                self.last = r.get(&rtype, idx)?.as_u32()?;
            }
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        ctx.set_u32(TAP_OUT, None, self.last)?;
        Ok(ExecState::Continue)
    }
}

fn test_classes() -> ClassDict {
    let mut class_cfg = procs::class_dict_cfg();
    let extra = json!({
        "recd_gen": {
            "vars": {
                "fields": { "type": "cfg", "flags": ["init"], "doc": "record field spec" },
                "out":    { "type": "record" }
            }
        },
        "pitch_tap": {
            "vars": {
                "in":  { "type": "record", "flags": ["src", "notify"],
                         "required_fields": ["pitch"] },
                "out": { "type": "uint", "value": 0 }
            }
        }
    });
    for (k, v) in extra.as_object().unwrap() {
        class_cfg.as_object_mut().unwrap().insert(k.clone(), v.clone());
    }

    let ctor_for = |label: &str| -> Option<ProcCtor> {
        match label {
            "recd_gen" => Some(Rc::new(|| Box::<RecdGen>::default())),
            "pitch_tap" => Some(Rc::new(|| Box::<PitchTap>::default())),
            other => procs::ctor_for(other),
        }
    };
    ClassDict::from_cfg(
        &class_cfg,
        None,
        &ctor_for,
        Rc::new(|| Box::<polaron::procs::user_def_proc::UserDefProc>::default()),
    )
    .unwrap()
}

fn build(pgm: &Cfg) -> polaron::Result<Engine> {
    let mut engine = Engine::new(Rc::new(test_classes()), pgm)?;
    engine.initialize(Vec::new(), None)?;
    Ok(engine)
}

/// Records flow producer to consumer; the consumer is manually notified
/// each cycle the window is nonempty.
#[test]
fn test_record_flow() {
    let pgm = json!({
        "network": { "procs": {
            "gen": { "class": "recd_gen",
                     "args": { "fields": {
                         "pitch": { "type": "uint", "value": 0 },
                         "vel":   { "type": "uint", "value": 64 }
                     }}},
            "tap": { "class": "pitch_tap", "in": { "in": "gen.out" } }
        }}
    });
    let mut engine = build(&pgm).unwrap();
    engine.exec_cycle().unwrap();
    assert_eq!(
        engine.get_variable_value("tap", "out", None).unwrap().as_u32().unwrap(),
        60
    );
    engine.exec_cycle().unwrap();
    assert_eq!(
        engine.get_variable_value("tap", "out", None).unwrap().as_u32().unwrap(),
        61
    );
}

/// A source whose record type lacks a required field fails network
/// validation with an element-not-found error naming the field.
#[test]
fn test_missing_required_field_rejected() {
    let pgm = json!({
        "network": { "procs": {
            "gen": { "class": "recd_gen",
                     "args": { "fields": {
                         "vel": { "type": "uint", "value": 64 }
                     }}},
            "tap": { "class": "pitch_tap", "in": { "in": "gen.out" } }
        }}
    });
    let err = match build(&pgm) {
        Err(e) => e,
        Ok(_) => panic!("expected build to fail"),
    };
    let msg = err.to_string();
    assert!(msg.contains("pitch"), "error should name the field: {msg}");
    assert!(matches!(err, polaron::Error::NotFound(_) | polaron::Error::OpFail(_)), "{err}");
}
