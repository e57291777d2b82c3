//! Value logger: reports each watched input when it changes.

use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};
use tracing::info;

pub const V_IN: usize = 0;
pub const V_TEXT: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "in":   { "flags": ["mult", "notify", "src_opt"], "doc": "watched values" },
            "text": { "type": "string", "value": "", "doc": "message prefix" }
        }
    })
}

#[derive(Default)]
pub struct Print;

impl ProcImpl for Print {
    fn notify(&mut self, ctx: &mut ProcCtx, var_idx: usize) -> Result<()> {
        let var = &ctx.proc().vars[var_idx];
        if var.vid != V_IN || var.ch_idx.is_some() {
            return Ok(());
        }
        let sfx = var.label_sfx_id;
        let value = ctx.value_sfx("in", sfx, None)?;
        if value.is_null() {
            return Ok(());
        }
        let text = ctx.string(V_TEXT).unwrap_or_default();
        let proc_label = ctx.proc().ctx_label();
        if text.is_empty() {
            info!("{proc_label}: in:{sfx} = {value}");
        } else {
            info!("{proc_label}: {text} {value}");
        }
        Ok(())
    }

    fn exec(&mut self, _ctx: &mut ProcCtx) -> Result<ExecState> {
        Ok(ExecState::Continue)
    }
}
