//! Number holder.
//!
//! Holds one scalar. `in` updates the held value when it changes (it is
//! typically fed by a connection, including feedback from procs declared
//! later in the network); `out` republishes the held value every cycle,
//! which makes `number` the standard one-cycle delay element in feedback
//! loops.

use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_VALUE: usize = 0;
pub const V_IN: usize = 1;
pub const V_OUT: usize = 2;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "value": { "type": "number", "value": 0.0, "doc": "held value" },
            "in":    { "type": "number", "flags": ["notify", "src_opt"], "doc": "sets the held value" },
            "out":   { "type": "number", "value": 0.0, "doc": "republished every cycle" }
        }
    })
}

#[derive(Default)]
pub struct Number;

impl ProcImpl for Number {
    fn notify(&mut self, ctx: &mut ProcCtx, var_idx: usize) -> Result<()> {
        if ctx.proc().vars[var_idx].vid == V_IN {
            let v = ctx.value(V_IN, None)?;
            if !v.is_null() {
                ctx.set_value(V_VALUE, None, v)?;
            }
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let v = ctx.value(V_VALUE, None)?;
        ctx.set_value(V_OUT, None, v)?;
        Ok(ExecState::Continue)
    }
}
