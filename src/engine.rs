//! The engine: program cfg parsing, network instantiation, and the
//! single-threaded cycle driver.
//!
//! Everything runs on one thread: build, presets, variable access and the
//! per-cycle exec of every proc. In real-time use the caller invokes
//! [`Engine::exec_cycle`] from its audio callback after filling the input
//! device buffers; in non-real-time mode [`Engine::exec`] spins the loop
//! as fast as it can until a halt.

use crate::class::ClassDict;
use crate::device::{DeviceKind, ExternalDevice};
use crate::error::{Error, Result};
use crate::network::{self, BuildCtx, Graph};
use crate::preset::{self, MultiPresetSel};
use crate::proc::ExecState;
use crate::ui::{self, UiCallback, UiNet};
use crate::value::Value;
use serde_json::Value as Cfg;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_FRAMES_PER_CYCLE: usize = 64;
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Engine-global runtime constants, visible to every proc through its ctx.
pub struct Globals {
    pub sample_rate: f64,
    pub frames_per_cycle: usize,
    pub non_real_time_fl: bool,
    pub profile_fl: bool,
    /// Halt the engine on a proc exec error instead of squashing it.
    pub halt_on_exec_err: bool,
    pub cycle_idx: Cell<u64>,
    pub max_cycle_count: Option<u64>,
}

pub struct Engine {
    pub classes: Rc<ClassDict>,
    pub globals: Globals,
    pub graph: Graph,
    pub devices: Vec<ExternalDevice>,
    pub root_net: Option<usize>,
    network_cfg: Rc<Cfg>,
    init_preset: Option<String>,
    print_class_dict_fl: bool,
    print_network_fl: bool,
    pub multi_pri_preset_prob_fl: bool,
    pub multi_sec_preset_prob_fl: bool,
    pub multi_preset_interp_fl: bool,
    ui_update_cycle_n: u64,
    ui_update_cycle_idx: u64,
    ui_cb: Option<UiCallback>,
    pub ui_net: Option<UiNet>,
    alloc_warned: bool,
}

impl Engine {
    /// Parse the program cfg. The network is not instantiated until
    /// [`Engine::initialize`], so the caller can inspect the parsed
    /// header first and build a matching device array.
    pub fn new(classes: Rc<ClassDict>, pgm_cfg: &Cfg) -> Result<Self> {
        let network_cfg = Rc::new(
            crate::cfg::child(pgm_cfg, "network")
                .map_err(|_| Error::syntax("the program cfg has no 'network'".to_string()))?
                .clone(),
        );

        let mut sample_rate =
            crate::cfg::f64_opt(pgm_cfg, "sample_rate")?.unwrap_or(DEFAULT_SAMPLE_RATE);
        if sample_rate <= 0.0 {
            info!("an invalid sample rate {sample_rate} was given; using {DEFAULT_SAMPLE_RATE}");
            sample_rate = DEFAULT_SAMPLE_RATE;
        }
        let mut frames_per_cycle = crate::cfg::usize_opt(pgm_cfg, "frames_per_cycle")?
            .unwrap_or(DEFAULT_FRAMES_PER_CYCLE);
        if frames_per_cycle == 0 {
            info!("an invalid frames/cycle 0 was given; using {DEFAULT_FRAMES_PER_CYCLE}");
            frames_per_cycle = DEFAULT_FRAMES_PER_CYCLE;
        }

        // an explicit cycle limit wins over a duration limit
        let max_cycle_count = match crate::cfg::u32_opt(pgm_cfg, "max_cycle_count")? {
            Some(n) => Some(n as u64),
            None => match crate::cfg::f64_opt(pgm_cfg, "dur_limit_secs")? {
                Some(secs) if secs > 0.0 => {
                    Some((secs * sample_rate / frames_per_cycle as f64) as u64)
                }
                _ => None,
            },
        };

        let ui_update_ms = crate::cfg::u32_opt(pgm_cfg, "ui_update_ms")?.unwrap_or(50);
        let ui_update_cycle_n =
            (((ui_update_ms as f64 * sample_rate) / 1000.0) / frames_per_cycle as f64).max(1.0)
                as u64;

        Ok(Self {
            classes,
            globals: Globals {
                sample_rate,
                frames_per_cycle,
                non_real_time_fl: crate::cfg::bool_opt(pgm_cfg, "non_real_time_fl")?
                    .unwrap_or(false),
                profile_fl: crate::cfg::bool_opt(pgm_cfg, "profile_fl")?.unwrap_or(false),
                halt_on_exec_err: crate::cfg::bool_opt(pgm_cfg, "halt_on_exec_err_fl")?
                    .unwrap_or(false),
                cycle_idx: Cell::new(0),
                max_cycle_count,
            },
            graph: Graph::default(),
            devices: Vec::new(),
            root_net: None,
            network_cfg,
            init_preset: crate::cfg::str_opt(pgm_cfg, "preset")?,
            print_class_dict_fl: crate::cfg::bool_opt(pgm_cfg, "print_class_dict_fl")?
                .unwrap_or(false),
            print_network_fl: crate::cfg::bool_opt(pgm_cfg, "print_network_fl")?.unwrap_or(false),
            multi_pri_preset_prob_fl: crate::cfg::bool_opt(pgm_cfg, "multiPriPresetProbFl")?
                .unwrap_or(false),
            multi_sec_preset_prob_fl: crate::cfg::bool_opt(pgm_cfg, "multiSecPresetProbFl")?
                .unwrap_or(false),
            multi_preset_interp_fl: crate::cfg::bool_opt(pgm_cfg, "multiPresetInterpFl")?
                .unwrap_or(false),
            ui_update_cycle_n,
            ui_update_cycle_idx: 0,
            ui_cb: None,
            ui_net: None,
            alloc_warned: false,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.globals.sample_rate
    }

    pub fn frames_per_cycle(&self) -> usize {
        self.globals.frames_per_cycle
    }

    pub fn is_non_real_time(&self) -> bool {
        self.globals.non_real_time_fl
    }

    pub fn cycle_index(&self) -> u64 {
        self.globals.cycle_idx.get()
    }

    pub fn set_ui_callback(&mut self, cb: UiCallback) {
        self.ui_cb = Some(cb);
    }

    /// Instantiate the network against the given device array, then apply
    /// the initial preset (the `preset:` cfg field unless overridden).
    pub fn initialize(
        &mut self,
        devices: Vec<ExternalDevice>,
        preset_override: Option<&str>,
    ) -> Result<()> {
        if self.root_net.is_some() {
            return Err(Error::invalid_state("the engine is already initialized".to_string()));
        }
        self.devices = devices;

        for d in &self.devices {
            if d.kind == DeviceKind::Audio {
                let Some(abuf) = &d.abuf else {
                    return Err(Error::invalid_arg(format!(
                        "the audio device '{}' has no buffer",
                        d.label
                    )));
                };
                let frame_n = abuf.borrow().frame_n;
                if frame_n != self.globals.frames_per_cycle {
                    warn!(
                        "the audio frame count ({frame_n}) of device '{}' does not match frames_per_cycle ({})",
                        d.label, self.globals.frames_per_cycle
                    );
                }
            }
        }

        if self.print_class_dict_fl {
            self.classes.print();
        }

        let mut bctx = BuildCtx {
            graph: &mut self.graph,
            classes: &*self.classes,
            globals: &self.globals,
            devices: &mut self.devices,
        };
        let root =
            network::network_create(&mut bctx, "root", Rc::clone(&self.network_cfg), 1, &[], None)?;
        self.root_net = Some(root);

        let preset = preset_override
            .map(str::to_string)
            .or_else(|| self.init_preset.clone());
        if let Some(label) = &preset {
            // applied twice: the first pass settles init-only values, the
            // second pins the final state after every proc has created
            preset::apply_network_preset(&mut self.graph, root, label, None)?;
            preset::apply_network_preset(&mut self.graph, root, label, None)?;
        }

        if self.print_network_fl {
            network::print_network(&self.graph, root, 0);
        }

        let classes = Rc::clone(&self.classes);
        self.ui_net = Some(ui::build_ui_net(&self.graph, root, &move |ci| {
            classes.classes[ci].label.clone()
        }));

        info!("entering runtime");
        Ok(())
    }

    fn root(&self) -> Result<usize> {
        self.root_net
            .ok_or_else(|| Error::invalid_state("the engine is not initialized".to_string()))
    }

    /// Run one cycle. Returns `Err(Error::Eof)` when the run is over
    /// (max cycle count reached or a proc requested a halt).
    pub fn exec_cycle(&mut self) -> Result<()> {
        let root = self.root()?;

        if let Some(max) = self.globals.max_cycle_count {
            if self.globals.cycle_idx.get() >= max {
                info!("max_cycle_count reached: {max}; shutting down");
                return Err(Error::Eof);
            }
        }

        // in real-time mode, allocations inside the steady-state cycle are
        // a defect; the counter only moves when the embedding binary
        // installs the counting allocator
        let alloc0 = (!self.globals.non_real_time_fl && self.globals.cycle_idx.get() > 0)
            .then(crate::alloc_guard::alloc_count);

        // run every poly replica of the root network
        let mut state = ExecState::Continue;
        let mut net_id = Some(root);
        while let Some(id) = net_id {
            let s = network::exec_cycle(
                &mut self.graph,
                id,
                &self.classes,
                &self.globals,
                &mut self.devices,
            )?;
            if s == ExecState::Eof {
                state = ExecState::Eof;
            }
            net_id = self.graph.nets[id].poly_link;
        }

        if let Some(n0) = alloc0 {
            let n1 = crate::alloc_guard::alloc_count();
            if n1 > n0 && !self.alloc_warned {
                self.alloc_warned = true;
                warn!(
                    "{} allocation(s) inside cycle {} - procs must not allocate in exec",
                    n1 - n0,
                    self.globals.cycle_idx.get()
                );
            }
        }

        self.ui_update_cycle_idx += 1;
        if self.ui_update_cycle_idx >= self.ui_update_cycle_n {
            self.send_ui_updates();
            self.ui_update_cycle_idx = 0;
        }

        self.globals.cycle_idx.set(self.globals.cycle_idx.get() + 1);

        match state {
            ExecState::Continue => Ok(()),
            ExecState::Eof => Err(Error::Eof),
        }
    }

    /// Run cycles until halt. Returns Ok on a clean end-of-stream.
    pub fn exec(&mut self) -> Result<()> {
        let t0 = Instant::now();
        let rc = loop {
            match self.exec_cycle() {
                Ok(()) => {}
                Err(e) if e.is_eof() => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        info!(
            "exec time: {} ms, cycles: {}",
            t0.elapsed().as_millis(),
            self.globals.cycle_idx.get()
        );
        rc
    }

    /// Drain the pending UI-update queue, invoking the callback once per
    /// changed variable. Runs automatically at the configured cadence;
    /// call it directly after out-of-band state changes.
    pub fn send_ui_updates(&mut self) {
        let pending = std::mem::take(&mut self.graph.ui_pending);
        for addr in pending {
            self.graph.procs[addr.proc].vars[addr.var].in_ui_q = false;
            if let Some(cb) = self.ui_cb.as_mut() {
                let snapshot = ui::ui_var_snapshot(&self.graph, addr);
                if !snapshot.hide_fl {
                    cb(&snapshot);
                }
            }
        }
    }

    // -- preset application -------------------------------------------------

    pub fn preset_labels(&self) -> Vec<String> {
        self.root_net
            .map(|r| self.graph.nets[r].presets.iter().map(|p| p.label.clone()).collect())
            .unwrap_or_default()
    }

    pub fn apply_preset(&mut self, label: &str) -> Result<()> {
        let root = self.root()?;
        preset::apply_network_preset(&mut self.graph, root, label, None)
    }

    pub fn apply_dual_preset(&mut self, pri: &str, sec: &str, coeff: f64) -> Result<()> {
        let root = self.root()?;
        preset::apply_dual_preset(&mut self.graph, root, pri, sec, coeff, None)
    }

    pub fn apply_multi_preset(&mut self, sel: &MultiPresetSel) -> Result<()> {
        let root = self.root()?;
        preset::apply_multi_preset(&mut self.graph, root, sel, None, &mut rand::thread_rng())
    }

    /// The multi-preset behavior flags from the program cfg, packed the
    /// way [`MultiPresetSel`] consumes them.
    pub fn preset_cfg_flags(&self) -> (bool, bool, bool) {
        (
            self.multi_pri_preset_prob_fl,
            self.multi_sec_preset_prob_fl,
            self.multi_preset_interp_fl,
        )
    }

    // -- variable access ----------------------------------------------------

    pub fn set_variable_value(
        &mut self,
        proc_label: &str,
        var_label: &str,
        ch_idx: Option<usize>,
        value: Value,
    ) -> Result<()> {
        let root = self.root()?;
        let addr = network::get_var(&self.graph, root, proc_label, var_label, ch_idx)?;
        network::var_set(&mut self.graph, addr, value)
    }

    pub fn get_variable_value(
        &self,
        proc_label: &str,
        var_label: &str,
        ch_idx: Option<usize>,
    ) -> Result<Value> {
        let root = self.root()?;
        let addr = network::get_var(&self.graph, root, proc_label, var_label, ch_idx)?;
        Ok(network::var_read(&self.graph, addr))
    }

    // -- diagnostics --------------------------------------------------------

    pub fn print_network(&self) {
        if let Some(root) = self.root_net {
            network::print_network(&self.graph, root, 0);
        }
    }

    pub fn profile_report(&self) {
        if let Some(root) = self.root_net {
            network::profile_report(&self.graph, root);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.globals.profile_fl {
            self.profile_report();
        }
    }
}
