//! Channel splitter: one input buffer fans out to per-channel outputs
//! `out_0 .. out_{N-1}`.

use crate::buffer::AudioBuf;
use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_IN: usize = 0;
pub const V_OUT: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "in":  { "type": "audio", "flags": ["src"], "doc": "input signal" },
            "out": { "type": "audio", "flags": ["mult"], "doc": "one single-channel output per input channel" }
        }
    })
}

#[derive(Default)]
pub struct AudioSplit {
    ch_n: usize,
}

impl ProcImpl for AudioSplit {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let (srate, ch_n, frame_n) = {
            let src = ctx.abuf(V_IN)?;
            let src = src.borrow();
            (src.srate, src.ch_n, src.frame_n)
        };
        self.ch_n = ch_n;

        // one mono output per input channel, suffixed out_0..out_{n-1}
        for ch in 0..ch_n {
            let vi = crate::network::var_channelize(
                ctx.graph,
                ctx.classes,
                ctx.proc_idx,
                "out",
                ch as u32,
                &Cfg::Null,
            )?;
            let addr = crate::var::VarAddr { proc: ctx.proc_idx, var: vi };
            crate::network::var_set(
                ctx.graph,
                addr,
                crate::value::Value::ABuf(AudioBuf::new(srate, 1, frame_n).shared()),
            )?;
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let src = ctx.abuf(V_IN)?;
        let src = src.borrow();
        for ch in 0..self.ch_n.min(src.ch_n) {
            let dst = ctx.value_sfx("out", ch as u32, None)?.as_abuf()?;
            let mut dst = dst.borrow_mut();
            let frame_n = dst.frame_n.min(src.frame_n);
            dst.channel_mut(0)[..frame_n].copy_from_slice(&src.channel(ch)[..frame_n]);
        }
        Ok(ExecState::Continue)
    }
}
