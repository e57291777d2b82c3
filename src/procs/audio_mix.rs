//! Mixer: sums `in_0 .. in_{N-1}` into one output, scaled by per-input
//! gains (`gain_i` falls back to the `gain` any-instance).

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
            "in":   { "type": "audio", "flags": ["mult", "src"], "doc": "mixed inputs" },
            "gain": { "type": "number", "value": 1.0, "flags": ["mult"], "mult_ref": "in" },
            "out":  { "type": "audio" }
        }
    })
}

#[derive(Default)]
pub struct AudioMix {
    sfx_ids: Vec<u32>,
}

impl ProcImpl for AudioMix {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        self.sfx_ids = ctx.mult_sfx_ids(V_IN);

        // the output is shaped by the widest input
        let mut srate = ctx.sample_rate();
        let mut ch_n = 1;
        let frame_n = ctx.frames_per_cycle();
        for &sfx in &self.sfx_ids {
            let src = ctx.value_sfx("in", sfx, None)?.as_abuf()?;
            let src = src.borrow();
            srate = src.srate;
            ch_n = ch_n.max(src.ch_n);
        }
        ctx.set_abuf(V_OUT, AudioBuf::new(srate, ch_n, frame_n).shared())?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let dst = ctx.abuf(V_OUT)?;
        let mut dst = dst.borrow_mut();
        dst.zero();

        for &sfx in &self.sfx_ids {
            let src = ctx.value_sfx("in", sfx, None)?.as_abuf()?;
            let src = src.borrow();
            let gain = match ctx.value_sfx("gain", sfx, None) {
                Ok(v) if !v.is_null() => v.as_f64()? as f32,
                _ => ctx.f64(V_GAIN)? as f32,
            };
            let ch_n = dst.ch_n.min(src.ch_n);
            for ch in 0..ch_n {
                let s = src.channel(ch);
                let d = dst.channel_mut(ch);
                for i in 0..d.len().min(s.len()) {
                    d[i] += s[i] * gain;
                }
            }
        }
        Ok(ExecState::Continue)
    }
}
