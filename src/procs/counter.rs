//! Stepped value generator.
//!
//! Starts at `init` and advances by `inc` each cycle. In `limit` mode the
//! value clamps at the range edge; in `loop` mode it wraps to the other
//! edge.

use crate::error::{Error, Result};
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_INIT: usize = 0;
pub const V_MIN: usize = 1;
pub const V_MAX: usize = 2;
pub const V_INC: usize = 3;
pub const V_MODE: usize = 4;
pub const V_OUT: usize = 5;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "init": { "type": "number", "value": 0.0, "flags": ["init"], "doc": "starting value" },
            "min":  { "type": "number", "value": 0.0 },
            "max":  { "type": "number", "value": 0.0 },
            "inc":  { "type": "number", "value": 1.0, "doc": "per-cycle increment" },
            "mode": { "type": "string", "value": "limit", "doc": "limit | loop" },
            "out":  { "type": "number", "value": 0.0 }
        }
    })
}

#[derive(Default)]
pub struct Counter {
    cur: f64,
}

impl ProcImpl for Counter {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        self.cur = ctx.f64(V_INIT)?;
        let mode = ctx.string(V_MODE)?;
        if mode != "limit" && mode != "loop" {
            return Err(Error::invalid_arg(format!("unknown counter mode '{mode}'")));
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        ctx.set_f64(V_OUT, None, self.cur)?;

        let min = ctx.f64(V_MIN)?;
        let max = ctx.f64(V_MAX)?;
        let inc = ctx.f64(V_INC)?;
        let looping = ctx.string(V_MODE)? == "loop";

        let mut next = self.cur + inc;
        if max > min {
            if next >= max {
                next = if looping { min + (next - max) } else { max };
            }
            if next < min {
                next = if looping { max - (min - next) } else { min };
            }
        }
        self.cur = next;
        Ok(ExecState::Continue)
    }
}
