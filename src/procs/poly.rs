//! Polyphonic network holder.
//!
//! Instantiates the proc cfg's `network:` description `count` times; the
//! replicas are chained through `poly_link` with poly indexes
//! `0..count-1`, and each runs once per cycle. Procs inside the replicas
//! take their label suffix from the poly index, so sibling voices wire to
//! their own-voice peers by default.

use crate::error::{Error, Result};
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};
use std::rc::Rc;

pub const V_COUNT: usize = 0;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "count": { "type": "uint", "value": 2, "flags": ["init"], "doc": "voice count" }
        }
    })
}

#[derive(Default)]
pub struct Poly;

impl ProcImpl for Poly {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let count = ctx.u32(V_COUNT)?;
        if count == 0 {
            return Err(Error::invalid_arg("the poly count must be greater than zero"));
        }
        let net_cfg = ctx
            .proc()
            .cfg
            .get("network")
            .cloned()
            .ok_or_else(|| {
                Error::syntax(format!(
                    "the poly proc '{}' has no 'network' field",
                    ctx.proc().ctx_label()
                ))
            })?;
        ctx.create_internal_net(Rc::new(net_cfg), count, &[])?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        ctx.exec_internal_net()
    }
}
