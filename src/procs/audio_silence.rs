//! Silent audio source: a zeroed buffer with a configurable shape.

use crate::buffer::AudioBuf;
use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_CH_CNT: usize = 0;
pub const V_OUT: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "ch_cnt": { "type": "uint", "value": 1, "flags": ["init"] },
            "out":    { "type": "audio" }
        }
    })
}

#[derive(Default)]
pub struct AudioSilence;

impl ProcImpl for AudioSilence {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let ch_n = ctx.u32(V_CH_CNT)?.max(1) as usize;
        let buf = AudioBuf::new(ctx.sample_rate(), ch_n, ctx.frames_per_cycle());
        ctx.set_abuf(V_OUT, buf.shared())
    }

    fn exec(&mut self, _ctx: &mut ProcCtx) -> Result<ExecState> {
        Ok(ExecState::Continue)
    }
}
