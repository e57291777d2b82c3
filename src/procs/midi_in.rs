//! External MIDI input.
//!
//! Publishes the per-cycle window of the consolidated device message
//! queue through its `out` MIDI buffer. With a `dev` label the window is
//! filtered to that device; empty means all devices. MIDI buffers cannot
//! auto-notify, so consumers list their inputs for manual notification.

use crate::buffer::MidiBuf;
use crate::device::DeviceKind;
use crate::error::Result;
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use serde_json::{json, Value as Cfg};
use std::cell::RefCell;
use std::rc::Rc;

pub const V_DEV: usize = 0;
pub const V_OUT: usize = 1;

pub fn class_cfg() -> Cfg {
    json!({
        "vars": {
            "dev": { "type": "string", "value": "", "flags": ["init"], "doc": "device label; empty = all" },
            "out": { "type": "midi_buf", "doc": "this cycle's messages" }
        }
    })
}

#[derive(Default)]
pub struct MidiIn {
    dev_idx: Option<usize>,
    out: Option<Rc<RefCell<MidiBuf>>>,
}

impl ProcImpl for MidiIn {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let label = ctx.string(V_DEV)?;
        if !label.is_empty() {
            self.dev_idx = Some(ctx.device_index(DeviceKind::Midi, &label)?);
        }
        let out = MidiBuf::default().shared();
        self.out = Some(Rc::clone(&out));
        ctx.set_mbuf(V_OUT, out)
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        let out = self.out.as_ref().expect("created");
        let mut out = out.borrow_mut();
        out.msgs.clear();

        // all MIDI input devices share one ordered queue; read it through
        // any of them
        let queue = ctx
            .devices
            .iter()
            .find(|d| d.kind == DeviceKind::Midi && d.in_fl)
            .and_then(|d| d.midi_q.clone());
        let Some(queue) = queue else { return Ok(ExecState::Continue) };

        for m in queue.borrow().iter() {
            if self.dev_idx.map_or(true, |di| m.dev_idx == di) {
                out.msgs.push(*m);
            }
        }
        Ok(ExecState::Continue)
    }
}
