//! External audio output: copies `in` into a named device's buffer each
//! cycle.

use crate::device::DeviceKind;
use crate::error::{Error, Result};
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_DEV: usize = 0;
pub const V_IN: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "dev": { "type": "string", "value": "main", "flags": ["init"], "doc": "device label" },
            "in":  { "type": "audio", "flags": ["src"], "doc": "signal sent to the device" }
        }
    })
}

#[derive(Default)]
pub struct AudioOut {
    dev_idx: usize,
}

impl ProcImpl for AudioOut {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let label = ctx.string(V_DEV)?;
        self.dev_idx = ctx.device_index(DeviceKind::Audio, &label)?;
        if !ctx.devices[self.dev_idx].out_fl {
            return Err(Error::invalid_arg(format!(
                "the audio device '{label}' is not an output device"
            )));
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let src = ctx.abuf(V_IN)?;
        let dev_buf = ctx.devices[self.dev_idx]
            .abuf
            .as_ref()
            .ok_or_else(|| Error::invalid_state("the audio device lost its buffer"))?;
        dev_buf.borrow_mut().copy_from(&src.borrow());
        Ok(ExecState::Continue)
    }
}
