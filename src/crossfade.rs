//! Cross-fade controller: K parallel replicas of one network, gain-blended
//! on preset changes.
//!
//! Every replica runs every cycle so its internal state (delay lines,
//! envelopes) stays warm; only the output gain fades. Input audio is
//! always mirrored into every replica for the same reason. Output audio
//! is summed into the master device buffers under a per-sample linear
//! ramp between the replica's current gain and its state target.

use crate::class::ClassDict;
use crate::device::{DeviceKind, ExternalDevice};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::preset::MultiPresetSel;
use crate::value::Value;
use serde_json::Value as Cfg;
use std::rc::Rc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    Inactive,
    Active,
    FadeIn,
    FadeOut,
}

/// Which replica a preset or variable operation lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestId {
    /// The currently-sounding network.
    Current,
    /// The network that becomes current after the next cross-fade.
    Next,
    /// Every network.
    All,
}

struct CrossNet {
    engine: Engine,
    state: FadeState,
    /// Cached gain at the end of the last cycle.
    fade_gain: f64,
    /// Ramp length in samples.
    fade_smp_n: usize,
    /// Samples elapsed since the ramp started. Kept in integer samples so
    /// a ramp of N samples completes after exactly N samples.
    fade_pos_smp: usize,
}

pub struct CrossFader {
    nets: Vec<CrossNet>,
    cur_idx: usize,
    srate: f64,
    frames_per_cycle: usize,
    /// The caller-facing devices; replicas own private audio clones.
    pub devices: Vec<ExternalDevice>,
}

impl CrossFader {
    /// Build `cross_n` (at least 2) replicas of the program's network.
    /// Replica 0 starts active, the rest inactive.
    pub fn new(
        classes: Rc<ClassDict>,
        pgm_cfg: &Cfg,
        cross_n: usize,
        devices: Vec<ExternalDevice>,
        init_preset: Option<&str>,
    ) -> Result<Self> {
        let cross_n = cross_n.max(2);
        let mut nets = Vec::with_capacity(cross_n);
        let mut srate = 0.0;
        let mut frames_per_cycle = 0;

        for i in 0..cross_n {
            let mut engine = Engine::new(Rc::clone(&classes), pgm_cfg)?;
            srate = engine.sample_rate();
            frames_per_cycle = engine.frames_per_cycle();
            let replica_devices: Vec<ExternalDevice> =
                devices.iter().map(ExternalDevice::clone_for_subnet).collect();
            engine.initialize(replica_devices, init_preset).map_err(|e| {
                Error::op_fail(format!("cross-fade network {i} create failed: {e}"))
            })?;
            nets.push(CrossNet {
                engine,
                state: if i == 0 { FadeState::Active } else { FadeState::Inactive },
                fade_gain: if i == 0 { 1.0 } else { 0.0 },
                fade_smp_n: 0,
                fade_pos_smp: 0,
            });
        }

        Ok(Self { nets, cur_idx: 0, srate, frames_per_cycle, devices })
    }

    pub fn cross_count(&self) -> usize {
        self.nets.len()
    }

    pub fn current_index(&self) -> usize {
        self.cur_idx
    }

    fn next_index(&self) -> usize {
        (self.cur_idx + 1) % self.nets.len()
    }

    fn dest_indices(&self, dest: DestId) -> Vec<usize> {
        match dest {
            DestId::Current => vec![self.cur_idx],
            DestId::Next => vec![self.next_index()],
            DestId::All => (0..self.nets.len()).collect(),
        }
    }

    pub fn state_of(&self, idx: usize) -> (FadeState, f64) {
        (self.nets[idx].state, self.nets[idx].fade_gain)
    }

    /// Run one cycle of every replica and blend the outputs.
    pub fn exec_cycle(&mut self) -> Result<()> {
        // zero the master output buffers; replica outputs sum into them
        for d in &self.devices {
            if d.kind == DeviceKind::Audio && d.out_fl {
                if let Some(b) = &d.abuf {
                    b.borrow_mut().zero();
                }
            }
        }

        let mut eof = false;
        for net in self.nets.iter_mut() {
            // inputs are always mirrored, active or not, so every replica
            // keeps valid internal state
            for (di, d) in self.devices.iter().enumerate() {
                if d.kind == DeviceKind::Audio && d.in_fl {
                    if let (Some(master), Some(inner)) =
                        (&d.abuf, &net.engine.devices[di].abuf)
                    {
                        inner.borrow_mut().copy_from(&master.borrow());
                    }
                }
                if d.kind == DeviceKind::Audio && d.out_fl {
                    if let Some(inner) = &net.engine.devices[di].abuf {
                        inner.borrow_mut().zero();
                    }
                }
            }

            match net.engine.exec_cycle() {
                Ok(()) => {}
                Err(e) if e.is_eof() => eof = true,
                Err(e) => return Err(e),
            }

            for (di, d) in self.devices.iter().enumerate() {
                if d.kind == DeviceKind::Audio && d.out_fl {
                    if let (Some(master), Some(inner)) =
                        (d.abuf.clone(), net.engine.devices[di].abuf.clone())
                    {
                        fade_audio(
                            &inner.borrow(),
                            &mut master.borrow_mut(),
                            net,
                            self.frames_per_cycle,
                        );
                    }
                }
            }
        }

        if eof {
            return Err(Error::Eof);
        }
        Ok(())
    }

    /// Start fading out the current network and fading in the next one.
    /// The ramp covers `fade_ms` milliseconds of samples; both sides use
    /// the same ramp length so their gains sum to one throughout.
    pub fn begin_cross_fade(&mut self, fade_ms: u32) {
        let fade_smp_n = ((self.srate * fade_ms as f64) / 1000.0) as usize;
        let outgoing = &mut self.nets[self.cur_idx];
        outgoing.state = FadeState::FadeOut;
        outgoing.fade_smp_n = fade_smp_n;
        // an interrupted fade resumes from its current gain
        outgoing.fade_pos_smp = ((1.0 - outgoing.fade_gain) * fade_smp_n as f64) as usize;
        self.cur_idx = self.next_index();
        let incoming = &mut self.nets[self.cur_idx];
        incoming.state = FadeState::FadeIn;
        incoming.fade_smp_n = fade_smp_n;
        incoming.fade_pos_smp = (incoming.fade_gain * fade_smp_n as f64) as usize;
        info!(
            "cross-fade begun: {} ms, incoming net {}",
            fade_ms, self.cur_idx
        );
    }

    pub fn apply_preset(&mut self, dest: DestId, label: &str) -> Result<()> {
        for i in self.dest_indices(dest) {
            self.nets[i]
                .engine
                .apply_preset(label)
                .map_err(|e| Error::op_fail(format!("preset '{label}' failed on net {i}: {e}")))?;
        }
        Ok(())
    }

    pub fn apply_multi_preset(&mut self, dest: DestId, sel: &MultiPresetSel) -> Result<()> {
        for i in self.dest_indices(dest) {
            self.nets[i].engine.apply_multi_preset(sel)?;
        }
        Ok(())
    }

    pub fn set_variable_value(
        &mut self,
        dest: DestId,
        proc_label: &str,
        var_label: &str,
        ch_idx: Option<usize>,
        value: Value,
    ) -> Result<()> {
        for i in self.dest_indices(dest) {
            self.nets[i]
                .engine
                .set_variable_value(proc_label, var_label, ch_idx, value.clone())?;
        }
        Ok(())
    }

    pub fn get_variable_value(
        &self,
        dest: DestId,
        proc_label: &str,
        var_label: &str,
        ch_idx: Option<usize>,
    ) -> Result<Value> {
        let idx = match dest {
            DestId::All => {
                return Err(Error::invalid_arg(
                    "a variable read needs a single destination".to_string(),
                ))
            }
            d => self.dest_indices(d)[0],
        };
        self.nets[idx].engine.get_variable_value(proc_label, var_label, ch_idx)
    }

    pub fn engine(&self, idx: usize) -> &Engine {
        &self.nets[idx].engine
    }

    pub fn print(&self) {
        info!("cross-fader: sr {} nets {}", self.srate, self.nets.len());
        for (i, net) in self.nets.iter().enumerate() {
            let tag = if i == self.cur_idx {
                "current"
            } else if i == self.next_index() {
                "next"
            } else {
                ""
            };
            info!(
                "  net {i} {tag} state {:?} gain {:.3}",
                net.state, net.fade_gain
            );
        }
    }
}

/// Sum `src` into `dst` under a linear per-sample ramp from the replica's
/// current gain toward its state target, then advance the gain and settle
/// state transitions at the rail values.
fn fade_audio(src: &crate::buffer::AudioBuf, dst: &mut crate::buffer::AudioBuf, net: &mut CrossNet, frames_per_cycle: usize) {
    let frame_n = dst.frame_n.min(src.frame_n).min(frames_per_cycle);
    let ch_n = dst.ch_n.min(src.ch_n);
    if frame_n == 0 {
        return;
    }

    // advance the ramp position by one cycle of samples; working in
    // integer samples makes an N-sample ramp complete after exactly N
    let (g0, g1) = match net.state {
        FadeState::Active => (net.fade_gain, 1.0),
        FadeState::Inactive => (net.fade_gain, 0.0),
        FadeState::FadeIn | FadeState::FadeOut => {
            let n = net.fade_smp_n.max(1);
            let p0 = net.fade_pos_smp.min(n);
            let p1 = (p0 + frame_n).min(n);
            net.fade_pos_smp = p1;
            let (f0, f1) = (p0 as f64 / n as f64, p1 as f64 / n as f64);
            if net.state == FadeState::FadeIn {
                (f0, f1)
            } else {
                (1.0 - f0, 1.0 - f1)
            }
        }
    };
    let dg = g1 - g0;

    for ch in 0..ch_n {
        let s = src.channel(ch);
        let d = dst.channel_mut(ch);
        for i in 0..frame_n {
            let g = g0 + dg * i as f64 / frame_n as f64;
            d[i] += (g * s[i] as f64) as f32;
        }
    }

    net.fade_gain = g1;
    if net.state == FadeState::FadeIn && g1 >= 1.0 {
        net.state = FadeState::Active;
    }
    if net.state == FadeState::FadeOut && g1 <= 0.0 {
        net.state = FadeState::Inactive;
    }
}
