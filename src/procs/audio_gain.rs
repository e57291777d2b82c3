//! Per-channel gain stage.

use crate::buffer::AudioBuf;
use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_IN: usize = 0;
pub const V_GAIN: usize = 1;
pub const V_OUT: usize = 2;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "in":   { "type": "audio", "flags": ["src"], "doc": "input signal" },
            "gain": { "type": "number", "value": 1.0, "flags": ["notify"] },
            "out":  { "type": "audio" }
        }
    })
}

#[derive(Default)]
pub struct AudioGain;

impl ProcImpl for AudioGain {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        // shape the output after the incoming signal; per-channel `gain`
        // values come from cfg channelization, with the any instance as
        // the fallback
        let (srate, ch_n, frame_n) = {
            let src = ctx.abuf(V_IN)?;
            let src = src.borrow();
            (src.srate, src.ch_n, src.frame_n)
        };
        ctx.set_abuf(V_OUT, AudioBuf::new(srate, ch_n, frame_n).shared())?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let src = ctx.abuf(V_IN)?;
        let dst = ctx.abuf(V_OUT)?;
        let src = src.borrow();
        let mut dst = dst.borrow_mut();
        let ch_n = dst.ch_n.min(src.ch_n);
        for ch in 0..ch_n {
            let gain = ctx.f64_ch(V_GAIN, ch)? as f32;
            let s = src.channel(ch);
            let d = dst.channel_mut(ch);
            for i in 0..d.len().min(s.len()) {
                d[i] = s[i] * gain;
            }
        }
        Ok(ExecState::Continue)
    }
}
