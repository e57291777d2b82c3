//! External MIDI output: forwards `in` messages through the named
//! device's send hook.

use crate::device::DeviceKind;
use crate::error::{Error, Result};
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};

pub const V_DEV: usize = 0;
pub const V_IN: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "dev": { "type": "string", "flags": ["init"], "doc": "device label" },
            "in":  { "type": "midi_buf", "flags": ["src"], "doc": "messages to send" }
        }
    })
}

#[derive(Default)]
pub struct MidiOut {
    dev_idx: usize,
}

impl ProcImpl for MidiOut {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let label = ctx.string(V_DEV)?;
        self.dev_idx = ctx.device_index(DeviceKind::Midi, &label)?;
        if ctx.devices[self.dev_idx].midi_send.is_none() {
            return Err(Error::invalid_arg(format!(
                "the MIDI device '{label}' has no send hook"
            )));
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let mbuf = ctx.mbuf(V_IN)?;
        let send = ctx.devices[self.dev_idx]
            .midi_send
            .clone()
            .ok_or_else(|| Error::invalid_state("the MIDI device lost its send hook"))?;
        let mut send = send.borrow_mut();
        for m in mbuf.borrow().msgs.iter() {
            (*send)(m);
        }
        Ok(ExecState::Continue)
    }
}
