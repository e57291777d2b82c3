//! External audio input: copies a named device's buffer into `out` each
//! cycle.

use crate::buffer::AudioBuf;
use crate::device::DeviceKind;
use crate::error::{Error, Result};
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_DEV: usize = 0;
pub const V_OUT: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "dev": { "type": "string", "value": "main", "flags": ["init"], "doc": "device label" },
            "out": { "type": "audio", "doc": "incoming device audio" }
        }
    })
}

#[derive(Default)]
pub struct AudioIn {
    dev_idx: usize,
}

impl ProcImpl for AudioIn {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let label = ctx.string(V_DEV)?;
        self.dev_idx = ctx.device_index(DeviceKind::Audio, &label)?;
        let dev = &ctx.devices[self.dev_idx];
        if !dev.in_fl {
            return Err(Error::invalid_arg(format!(
                "the audio device '{label}' is not an input device"
            )));
        }
        let (srate, ch_n, frame_n) = {
            let b = dev.abuf.as_ref().unwrap().borrow();
            (b.srate, b.ch_n, b.frame_n)
        };
        ctx.set_abuf(V_OUT, AudioBuf::new(srate, ch_n, frame_n).shared())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let dev_buf = ctx.devices[self.dev_idx]
            .abuf
            .as_ref()
            .ok_or_else(|| Error::invalid_state("the audio device lost its buffer"))?;
        let out = ctx.value(V_OUT, None)?.as_abuf()?;
        out.borrow_mut().copy_from(&dev_buf.borrow());
        Ok(ExecState::Continue)
    }
}
