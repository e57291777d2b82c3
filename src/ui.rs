//! Derived UI description and update plumbing.
//!
//! After a network is instantiated the engine derives a UI-facing mirror
//! of it: per-proc, per-var records with stable addresses. Variables that
//! change during a cycle are queued; the engine drains the queue at a
//! reduced cadence and invokes the user callback once per pending
//! variable. The callback runs on the engine thread and must not mutate
//! engine state.

use crate::network::Graph;
use crate::value::TypeFl;
use crate::var::{VarAddr, VarFlags};

/// Stable identifier handed to the UI callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiVarKey(pub VarAddr);

#[derive(Debug, Clone)]
pub struct UiVar {
    pub key: UiVarKey,
    pub label: String,
    pub label_sfx_id: u32,
    pub title: String,
    pub vid: usize,
    pub ch_idx: Option<usize>,
    pub ch_n: usize,
    pub value_type: TypeFl,
    pub has_source: bool,
    pub hide_fl: bool,
    pub disable_fl: bool,
    /// Caller-assigned id, settable after the UI is built.
    pub user_id: u64,
}

#[derive(Debug, Clone)]
pub struct UiProc {
    pub label: String,
    pub label_sfx_id: u32,
    pub class_label: String,
    pub vars: Vec<UiVar>,
    pub internal_net: Option<Box<UiNet>>,
}

#[derive(Debug, Clone)]
pub struct UiNet {
    pub label: String,
    pub poly_idx: u32,
    pub procs: Vec<UiProc>,
    pub presets: Vec<String>,
    pub poly_link: Option<Box<UiNet>>,
}

pub type UiCallback = Box<dyn FnMut(&UiVar)>;

/// Snapshot one variable into its UI record.
pub fn ui_var_snapshot(graph: &Graph, addr: VarAddr) -> UiVar {
    let proc = &graph.procs[addr.proc];
    let var = &proc.vars[addr.var];
    UiVar {
        key: UiVarKey(addr),
        label: var.label.clone(),
        label_sfx_id: var.label_sfx_id,
        title: var.ui_title.clone().unwrap_or_else(|| var.label.clone()),
        vid: var.vid,
        ch_idx: var.ch_idx,
        ch_n: proc.channel_count(&var.label, var.label_sfx_id),
        value_type: var.val_type,
        has_source: var.src.is_some(),
        hide_fl: var.ui_hide,
        // connected and init-only vars are not editable from the UI
        disable_fl: var.ui_disable || var.src.is_some() || var.flags.has(VarFlags::INIT),
        user_id: 0,
    }
}

fn build_ui_proc(
    graph: &Graph,
    proc_idx: usize,
    class_label_of: &dyn Fn(usize) -> String,
) -> UiProc {
    let proc = &graph.procs[proc_idx];
    let vars = (0..proc.vars.len())
        .map(|vi| ui_var_snapshot(graph, VarAddr { proc: proc_idx, var: vi }))
        .collect();
    UiProc {
        label: proc.label.clone(),
        label_sfx_id: proc.label_sfx_id,
        class_label: class_label_of(proc.class_idx),
        vars,
        internal_net: proc
            .internal_net
            .map(|id| Box::new(build_ui_net(graph, id, class_label_of))),
    }
}

/// Derive the UI description of a network tree. `class_label_of` maps a
/// proc's class index to its label (supplied by the engine, which owns the
/// class dictionary).
pub fn build_ui_net(
    graph: &Graph,
    net_id: usize,
    class_label_of: &dyn Fn(usize) -> String,
) -> UiNet {
    let net = &graph.nets[net_id];
    let procs = net
        .proc_ids
        .iter()
        .map(|&p| build_ui_proc(graph, p, class_label_of))
        .collect();
    UiNet {
        label: net.label.clone(),
        poly_idx: net.poly_idx,
        procs,
        presets: net.presets.iter().map(|p| p.label.clone()).collect(),
        poly_link: net
            .poly_link
            .map(|id| Box::new(build_ui_net(graph, id, class_label_of))),
    }
}
