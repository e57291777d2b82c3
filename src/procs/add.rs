//! Numeric summer: `out` = sum of every `in_i` each cycle.

use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_IN: usize = 0;
pub const V_OUT: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "in":  { "type": "number", "flags": ["mult", "src"], "doc": "summed inputs" },
            "out": { "type": "number", "value": 0.0, "doc": "sum of the inputs" }
        }
    })
}

#[derive(Default)]
pub struct Add {
    sfx_ids: Vec<u32>,
}

impl ProcImpl for Add {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        self.sfx_ids = ctx.mult_sfx_ids(V_IN);
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let mut sum = 0.0;
        for &sfx in &self.sfx_ids {
            sum += ctx.value_sfx("in", sfx, None)?.as_f64()?;
        }
        ctx.set_f64(V_OUT, None, sum)?;
        Ok(ExecState::Continue)
    }
}
