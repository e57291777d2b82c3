//! Sine oscillator.
//!
//! Writes a sine into its `out` audio buffer each cycle. `freq` and
//! `gain` may be channelized; channels without an explicit value fall
//! back to the `any` instance.

use crate::buffer::AudioBuf;
use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};
use std::f64::consts::TAU;

pub const V_CH_CNT: usize = 0;
pub const V_FREQ: usize = 1;
pub const V_GAIN: usize = 2;
pub const V_OUT: usize = 3;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "ch_cnt": { "type": "uint", "value": 1, "flags": ["init"], "doc": "output channel count" },
            "freq":   { "type": "number", "value": 440.0, "flags": ["notify"], "doc": "frequency in Hz" },
            "gain":   { "type": "number", "value": 0.8 },
            "out":    { "type": "audio", "doc": "generated tone" }
        },
        "presets": {
            "a440": { "freq": 440.0 },
            "quiet": { "gain": 0.1 }
        }
    })
}

#[derive(Default)]
pub struct SineTone {
    phase: Vec<f64>,
}

impl ProcImpl for SineTone {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        // cfg may have channelized freq/gain past the declared count
        let ch_n = (ctx.u32(V_CH_CNT)?.max(1) as usize)
            .max(ctx.channel_count(V_FREQ))
            .max(ctx.channel_count(V_GAIN));
        self.phase = vec![0.0; ch_n];

        let buf = AudioBuf::new(ctx.sample_rate(), ch_n, ctx.frames_per_cycle());
        ctx.set_abuf(V_OUT, buf.shared())?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let out = ctx.abuf(V_OUT)?;
        let mut out = out.borrow_mut();
        let srate = out.srate;
        for ch in 0..out.ch_n {
            let freq = ctx.f64_ch(V_FREQ, ch)?;
            let gain = ctx.f64_ch(V_GAIN, ch)?;
            let step = TAU * freq / srate;
            let buf = out.channel_mut(ch);
            let mut phase = self.phase[ch];
            for s in buf.iter_mut() {
                *s = (phase.sin() * gain) as f32;
                phase += step;
            }
            self.phase[ch] = phase % TAU;
        }
        Ok(ExecState::Continue)
    }
}
