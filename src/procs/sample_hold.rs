//! Latch: captures `in` whenever `trigger` is nonzero.

use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use crate::value::Value;
use serde_json::{json, Value as Cfg};

pub const V_IN: usize = 0;
pub const V_TRIGGER: usize = 1;
pub const V_OUT: usize = 2;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "in":      { "type": "number", "flags": ["src"], "doc": "sampled signal" },
            "trigger": { "type": "number", "value": 0.0, "flags": ["src_opt"], "doc": "nonzero latches" },
            "out":     { "type": "number", "value": 0.0, "doc": "held value" }
        }
    })
}

#[derive(Default)]
pub struct SampleHold {
    held: f64,
}

impl ProcImpl for SampleHold {
    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        if ctx.f64(V_TRIGGER)? != 0.0 {
            let v = ctx.value(V_IN, None)?;
            if !matches!(v, Value::Null) {
                self.held = v.as_f64()?;
            }
        }
        ctx.set_f64(V_OUT, None, self.held)?;
        Ok(ExecState::Continue)
    }
}
