//! Programmatic halt: requests end-of-stream when `in` becomes true.

use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};
use tracing::info;

pub const V_IN: usize = 0;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "in": { "type": "number", "value": 0.0, "flags": ["src_opt"], "doc": "halt when true" }
        }
    })
}

#[derive(Default)]
pub struct Halt {
    announced: bool,
}

impl ProcImpl for Halt {
    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        if ctx.bool(V_IN)? {
            if !self.announced {
                info!("'{}' requested a halt", ctx.proc().ctx_label());
                self.announced = true;
            }
            return Ok(ExecState::Eof);
        }
        Ok(ExecState::Continue)
    }
}
