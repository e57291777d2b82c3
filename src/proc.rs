//! Proc instances and the lifecycle implementation trait.
//!
//! A proc owns its variables and its class-specific state. The state
//! implements [`ProcImpl`] and sees the engine through a [`ProcCtx`]: a
//! borrow of the proc graph focused on one proc, with typed variable
//! accessors. All lifecycle callbacks run on the engine thread.

use crate::buffer::{AudioBuf, MidiBuf, RecordBuf, SpectralBuf};
use crate::class::ClassPreset;
use crate::device::ExternalDevice;
use crate::engine::Globals;
use crate::error::{Error, Result};
use crate::network::{self, Graph};
use crate::value::{TypeFl, Value};
use crate::var::{Var, VarAddr};
use serde_json::Value as Cfg;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Returned by `exec`: keep running, or halt the network at cycle end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Continue,
    Eof,
}

/// Class-specific lifecycle state. `create` runs once after the proc's
/// variables exist and may add channels or fix runtime-typed variables;
/// `notify` fires once per changed variable; `exec` once per cycle.
/// Dropping the box is the destroy step.
pub trait ProcImpl {
    fn create(&mut self, _ctx: &mut ProcCtx) -> Result<()> {
        Ok(())
    }

    fn notify(&mut self, _ctx: &mut ProcCtx, _var_idx: usize) -> Result<()> {
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState>;

    /// Optional state dump for diagnostics.
    fn report(&self, _ctx: &ProcCtx) {}
}

/// One node of the dataflow graph.
pub struct Proc {
    pub label: String,
    pub label_sfx_id: u32,
    pub class_idx: usize,
    /// Owning network (index into the graph's net arena).
    pub net_id: usize,
    /// Instance cfg node (the pair value from the network's procs dict).
    pub cfg: Rc<Cfg>,
    pub vars: Vec<Var>,
    /// `var_map[vid][ch_slot]` -> var index; slot 0 is the `any` channel,
    /// slot `ch+1` is channel `ch`. Covers base-suffix variables.
    pub var_map: Vec<Vec<Option<usize>>>,
    /// Class state; absent only while its own callback is on the stack.
    pub imp: Option<Box<dyn ProcImpl>>,
    /// Head network of a poly/UDP internal network chain.
    pub internal_net: Option<usize>,
    /// Per-instance presets (the proc cfg's `presets:` dictionary).
    pub presets: Vec<ClassPreset>,
    /// Vars scheduled for owner notification.
    pub pending_notify: Vec<usize>,
    /// Input vars that cannot auto-notify; checked each cycle.
    pub manual_notify: Vec<usize>,
    pub log_init_vars: Vec<usize>,
    pub log_exec_vars: Vec<usize>,
    pub prof_dur: Duration,
    pub prof_cnt: u64,
}

impl Proc {
    pub fn ctx_label(&self) -> String {
        format!("{}:{}", self.label, self.label_sfx_id)
    }

    /// Find a variable instance by label, suffix and channel. No `any`
    /// fallback; use [`Proc::find_var_or_any`] for reads.
    pub fn find_var(&self, label: &str, sfx_id: u32, ch_idx: Option<usize>) -> Option<usize> {
        self.vars.iter().position(|v| {
            v.label == label && v.label_sfx_id == sfx_id && v.ch_idx == ch_idx
        })
    }

    /// Find the concrete channel instance, falling back to `any`.
    pub fn find_var_or_any(
        &self,
        label: &str,
        sfx_id: u32,
        ch_idx: Option<usize>,
    ) -> Option<usize> {
        self.find_var(label, sfx_id, ch_idx)
            .or_else(|| self.find_var(label, sfx_id, None))
    }

    /// Lookup by value id and channel slot for base-suffix vars: O(1)
    /// through the var map once it is built, by scan before that (the map
    /// does not exist yet while the proc's own `create` is running).
    pub fn var_by_vid(&self, vid: usize, ch_idx: Option<usize>) -> Option<usize> {
        if let Some(row) = self.var_map.get(vid) {
            let slot = ch_idx.map_or(0, |c| c + 1);
            return row.get(slot).copied().flatten().or_else(|| row.first().copied().flatten());
        }
        let scan = |ch: Option<usize>| {
            self.vars.iter().position(|v| {
                v.vid == vid
                    && v.label_sfx_id == crate::network::BASE_SFX_ID
                    && v.ch_idx == ch
            })
        };
        scan(ch_idx).or_else(|| if ch_idx.is_some() { scan(None) } else { None })
    }

    /// Count of concrete channels on a variable (0 = `any` only).
    pub fn channel_count(&self, label: &str, sfx_id: u32) -> usize {
        self.vars
            .iter()
            .filter(|v| v.label == label && v.label_sfx_id == sfx_id)
            .filter_map(|v| v.ch_idx)
            .map(|c| c + 1)
            .max()
            .unwrap_or(0)
    }

    /// Suffix ids present for a `mult` variable label, in ascending order.
    pub fn mult_sfx_ids(&self, label: &str) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .vars
            .iter()
            .filter(|v| v.label == label && v.ch_idx.is_none())
            .map(|v| v.label_sfx_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Build the `var_map` lookup. Fails when two base-suffix variables
    /// land in the same (vid, channel) slot.
    pub fn build_var_map(&mut self, var_desc_n: usize) -> Result<()> {
        let mut map: Vec<Vec<Option<usize>>> = vec![Vec::new(); var_desc_n];
        for (vi, v) in self.vars.iter().enumerate() {
            if v.label_sfx_id != crate::network::BASE_SFX_ID || v.vid >= var_desc_n {
                continue;
            }
            let slot = v.ch_idx.map_or(0, |c| c + 1);
            let row = &mut map[v.vid];
            if row.len() <= slot {
                row.resize(slot + 1, None);
            }
            if row[slot].is_some() {
                return Err(Error::invalid_state(format!(
                    "two variables occupy slot vid:{} ch:{:?} on proc '{}'",
                    v.vid,
                    v.ch_idx,
                    self.ctx_label()
                )));
            }
            row[slot] = Some(vi);
        }
        self.var_map = map;
        Ok(())
    }

    /// Schedule a variable for owner notification, once.
    pub fn schedule_notify(&mut self, var_idx: usize) {
        if !self.vars[var_idx].pending_notify {
            self.vars[var_idx].pending_notify = true;
            self.pending_notify.push(var_idx);
        }
    }
}

/// The view a proc's lifecycle callbacks get of the engine.
pub struct ProcCtx<'a> {
    pub graph: &'a mut Graph,
    pub proc_idx: usize,
    pub classes: &'a crate::class::ClassDict,
    pub globals: &'a Globals,
    pub devices: &'a mut Vec<ExternalDevice>,
}

impl<'a> ProcCtx<'a> {
    pub fn proc(&self) -> &Proc {
        &self.graph.procs[self.proc_idx]
    }

    pub fn proc_mut(&mut self) -> &mut Proc {
        &mut self.graph.procs[self.proc_idx]
    }

    pub fn frames_per_cycle(&self) -> usize {
        self.globals.frames_per_cycle
    }

    pub fn sample_rate(&self) -> f64 {
        self.globals.sample_rate
    }

    pub fn cycle_index(&self) -> u64 {
        self.globals.cycle_idx.get()
    }

    fn err(&self, var_idx: usize, msg: &str) -> Error {
        let p = self.proc();
        Error::op_fail(format!(
            "{} on {}",
            msg,
            p.vars[var_idx].ctx_label(&p.label, p.label_sfx_id)
        ))
    }

    /// Resolve (vid, ch) to a var index with `any` fallback.
    fn resolve(&self, vid: usize, ch_idx: Option<usize>) -> Result<usize> {
        self.proc().var_by_vid(vid, ch_idx).ok_or_else(|| {
            Error::not_found(format!(
                "no variable with vid {vid} ch {ch_idx:?} on proc '{}'",
                self.proc().ctx_label()
            ))
        })
    }

    /// Read a variable's value, following its source connection.
    pub fn value(&self, vid: usize, ch_idx: Option<usize>) -> Result<Value> {
        let vi = self.resolve(vid, ch_idx)?;
        Ok(network::var_read(self.graph, VarAddr { proc: self.proc_idx, var: vi }))
    }

    /// Read by label/suffix (for `mult` duplicates).
    pub fn value_sfx(&self, label: &str, sfx_id: u32, ch_idx: Option<usize>) -> Result<Value> {
        let vi = self
            .proc()
            .find_var_or_any(label, sfx_id, ch_idx)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "no variable '{label}:{sfx_id}' on proc '{}'",
                    self.proc().ctx_label()
                ))
            })?;
        Ok(network::var_read(self.graph, VarAddr { proc: self.proc_idx, var: vi }))
    }

    pub fn f64(&self, vid: usize) -> Result<f64> {
        self.value(vid, None)?.as_f64()
    }

    pub fn f64_ch(&self, vid: usize, ch: usize) -> Result<f64> {
        self.value(vid, Some(ch))?.as_f64()
    }

    pub fn f32(&self, vid: usize) -> Result<f32> {
        self.value(vid, None)?.as_f32()
    }

    pub fn u32(&self, vid: usize) -> Result<u32> {
        self.value(vid, None)?.as_u32()
    }

    pub fn i32(&self, vid: usize) -> Result<i32> {
        self.value(vid, None)?.as_i32()
    }

    pub fn bool(&self, vid: usize) -> Result<bool> {
        self.value(vid, None)?.as_bool()
    }

    pub fn string(&self, vid: usize) -> Result<String> {
        Ok(self.value(vid, None)?.as_str()?.to_string())
    }

    pub fn abuf(&self, vid: usize) -> Result<Rc<RefCell<AudioBuf>>> {
        self.value(vid, None)?.as_abuf()
    }

    pub fn fbuf(&self, vid: usize) -> Result<Rc<RefCell<SpectralBuf>>> {
        self.value(vid, None)?.as_fbuf()
    }

    pub fn mbuf(&self, vid: usize) -> Result<Rc<RefCell<MidiBuf>>> {
        self.value(vid, None)?.as_mbuf()
    }

    pub fn rbuf(&self, vid: usize) -> Result<Rc<RefCell<RecordBuf>>> {
        self.value(vid, None)?.as_rbuf()
    }

    pub fn cfg(&self, vid: usize) -> Result<Rc<Cfg>> {
        self.value(vid, None)?.as_cfg()
    }

    /// Set a variable. Fails when it is fed by a source connection.
    pub fn set_value(&mut self, vid: usize, ch_idx: Option<usize>, v: Value) -> Result<()> {
        let vi = self.resolve(vid, ch_idx)?;
        network::var_set(self.graph, VarAddr { proc: self.proc_idx, var: vi }, v)
            .map_err(|e| self.err(vi, &e.to_string()))
    }

    pub fn set_f64(&mut self, vid: usize, ch_idx: Option<usize>, v: f64) -> Result<()> {
        self.set_value(vid, ch_idx, Value::Double(v))
    }

    pub fn set_bool(&mut self, vid: usize, ch_idx: Option<usize>, v: bool) -> Result<()> {
        self.set_value(vid, ch_idx, Value::Bool(v))
    }

    pub fn set_u32(&mut self, vid: usize, ch_idx: Option<usize>, v: u32) -> Result<()> {
        self.set_value(vid, ch_idx, Value::UInt(v))
    }

    pub fn set_abuf(&mut self, vid: usize, buf: Rc<RefCell<AudioBuf>>) -> Result<()> {
        self.set_value(vid, None, Value::ABuf(buf))
    }

    pub fn set_fbuf(&mut self, vid: usize, buf: Rc<RefCell<SpectralBuf>>) -> Result<()> {
        self.set_value(vid, None, Value::FBuf(buf))
    }

    pub fn set_mbuf(&mut self, vid: usize, buf: Rc<RefCell<MidiBuf>>) -> Result<()> {
        self.set_value(vid, None, Value::MBuf(buf))
    }

    pub fn set_rbuf(&mut self, vid: usize, buf: Rc<RefCell<RecordBuf>>) -> Result<()> {
        self.set_value(vid, None, Value::RBuf(buf))
    }

    /// Fix the concrete type of a runtime-typed variable during create.
    pub fn fix_runtime_type(&mut self, vid: usize, type_fl: TypeFl) -> Result<()> {
        let vi = self.resolve(vid, None)?;
        let var = &mut self.graph.procs[self.proc_idx].vars[vi];
        if !var.type_mask.is_runtime() {
            return Err(Error::invalid_state(format!(
                "the variable '{}' is not runtime-typed",
                var.label
            )));
        }
        var.type_mask = type_fl;
        var.val_type = TypeFl::INVALID;
        Ok(())
    }

    /// Ensure per-channel child variables exist for channels `0..ch_n`,
    /// seeding each from the `any` instance. Typically called from a
    /// proc's `create` so its channel count matches the incoming shape.
    pub fn ensure_channels(&mut self, vid: usize, ch_n: usize) -> Result<()> {
        for ch in 0..ch_n {
            let proc = self.proc_mut();
            let any_vi = proc.var_by_vid(vid, None).ok_or_else(|| {
                Error::not_found(format!("no variable with vid {vid} to channelize"))
            })?;
            if proc.find_var(
                &proc.vars[any_vi].label.clone(),
                proc.vars[any_vi].label_sfx_id,
                Some(ch),
            ).is_some() {
                continue;
            }
            let (label, sfx, flags, mask, val) = {
                let v = &proc.vars[any_vi];
                (v.label.clone(), v.label_sfx_id, v.flags, v.type_mask, v.value.clone())
            };
            let mut child = Var::new(&label, sfx, vid, Some(ch), flags, mask);
            if !val.is_null() {
                child.store(val)?;
            }
            proc.vars.push(child);
            let vi = proc.vars.len() - 1;
            // extend the var map row, when the map has been built already
            if sfx == crate::network::BASE_SFX_ID && vid < proc.var_map.len() {
                let row = &mut proc.var_map[vid];
                if row.len() <= ch + 1 {
                    row.resize(ch + 2, None);
                }
                row[ch + 1] = Some(vi);
            }
        }
        Ok(())
    }

    /// Number of concrete channels on a base-suffix variable.
    pub fn channel_count(&self, vid: usize) -> usize {
        let p = self.proc();
        if let Some(row) = p.var_map.get(vid) {
            return row.len().saturating_sub(1);
        }
        // before the var map exists (during create), count by scan
        p.vars
            .iter()
            .find(|v| v.vid == vid && v.label_sfx_id == crate::network::BASE_SFX_ID)
            .map(|v| p.channel_count(&v.label, v.label_sfx_id))
            .unwrap_or(0)
    }

    /// Suffix duplicates of a `mult` variable, by desc label.
    pub fn mult_sfx_ids(&self, vid: usize) -> Vec<u32> {
        let p = self.proc();
        match p.vars.iter().find(|v| v.vid == vid) {
            Some(v) => {
                let label = v.label.clone();
                p.mult_sfx_ids(&label)
            }
            None => Vec::new(),
        }
    }

    /// Run one cycle of this proc's internal network chain (poly/UDP).
    pub fn exec_internal_net(&mut self) -> Result<ExecState> {
        let Some(head) = self.proc().internal_net else {
            return Ok(ExecState::Continue);
        };
        let mut state = ExecState::Continue;
        let mut net_id = Some(head);
        while let Some(id) = net_id {
            let s =
                network::exec_cycle(self.graph, id, self.classes, self.globals, self.devices)?;
            if s == ExecState::Eof {
                state = ExecState::Eof;
            }
            net_id = self.graph.nets[id].poly_link;
        }
        Ok(state)
    }

    /// Instantiate a network as this proc's internal net (poly and UDP
    /// wrappers call this from `create`). `proxy_vars` carries the
    /// wrapper's variables down for proxy wiring.
    pub fn create_internal_net(
        &mut self,
        net_cfg: Rc<Cfg>,
        poly_cnt: u32,
        proxy_vars: &[crate::var::VarAddr],
    ) -> Result<usize> {
        let label = self.proc().label.clone();
        let proc_idx = self.proc_idx;
        let mut bctx = crate::network::BuildCtx {
            graph: &mut *self.graph,
            classes: self.classes,
            globals: self.globals,
            devices: &mut *self.devices,
        };
        let head = network::network_create(
            &mut bctx,
            &label,
            net_cfg,
            poly_cnt,
            proxy_vars,
            Some(proc_idx),
        )?;
        self.proc_mut().internal_net = Some(head);
        Ok(head)
    }

    /// Look up an external device by type and label.
    pub fn device_index(
        &self,
        kind: crate::device::DeviceKind,
        label: &str,
    ) -> Result<usize> {
        self.devices
            .iter()
            .position(|d| d.kind == kind && d.label == label)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "no {kind:?} device labeled '{label}' (proc '{}')",
                    self.proc().ctx_label()
                ))
            })
    }
}
