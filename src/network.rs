//! Network instantiation and the proc graph.
//!
//! A network description is a dictionary of proc instances plus optional
//! presets and a record-type registry. Procs execute in declaration order;
//! in-statements wire a proc to procs declared before it, out-statements
//! wire feedback into procs declared earlier. Polyphonic networks are the
//! same description instantiated `poly_count` times and chained through
//! `poly_link`.
//!
//! All procs of all networks (including internal networks owned by `poly`
//! and UDP procs) live in one arena, [`Graph`], so connections can cross
//! network boundaries.

use crate::class::{ClassDict, ClassPreset};
use crate::device::ExternalDevice;
use crate::engine::Globals;
use crate::error::{Error, Result};
use crate::preset::{self, NetworkPreset, PairTable};
use crate::proc::{ExecState, Proc, ProcCtx};
use crate::record::RecordType;
use crate::stmt::{self, IoEle};
use crate::value::{value_from_cfg, TypeFl, Value};
use crate::var::{Var, VarAddr, VarFlags};
use serde_json::Value as Cfg;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const BASE_SFX_ID: u32 = 0;

/// The proc/net arena plus the pending UI-update queue.
#[derive(Default)]
pub struct Graph {
    pub procs: Vec<Proc>,
    pub nets: Vec<Network>,
    /// The first network created: the root of the tree, addressed by `_`
    /// in remote-net references.
    pub root_net: Option<usize>,
    /// Vars awaiting the UI callback; appended on change, drained by the
    /// engine between cycles.
    pub ui_pending: Vec<VarAddr>,
}

pub struct Network {
    pub label: String,
    pub cfg: Rc<Cfg>,
    pub proc_ids: Vec<usize>,
    pub presets: Vec<NetworkPreset>,
    pub preset_pairs: PairTable,
    /// Record-type registry: `records:{label: fmt_cfg}`.
    pub records: Vec<(String, Rc<RecordType>)>,
    pub poly_idx: u32,
    pub poly_n: u32,
    pub poly_link: Option<usize>,
    /// Proc that owns this network as its internal net, if any.
    pub owner_proc: Option<usize>,
    /// Set when a proc requested a halt this cycle.
    pub halted: bool,
}

impl Network {
    pub fn record_type(&self, label: &str) -> Option<Rc<RecordType>> {
        self.records
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, t)| Rc::clone(t))
    }
}

// ---------------------------------------------------------------------------
// Graph-level variable operations
// ---------------------------------------------------------------------------

/// Read a variable's value, following the source chain.
pub fn var_read(graph: &Graph, addr: VarAddr) -> Value {
    let mut addr = addr;
    // connection chains are short (UDP pass-throughs); the bound guards
    // against wiring cycles
    for _ in 0..64 {
        let var = &graph.procs[addr.proc].vars[addr.var];
        match var.src {
            Some(src) => addr = src,
            None => return var.value.clone(),
        }
    }
    error!("source chain loop detected at {:?}", addr);
    Value::Null
}

/// Set a variable's value. Fails when the variable is fed by a source.
/// On change, schedules owner/downstream notification and queues the UI
/// update.
pub fn var_set(graph: &mut Graph, addr: VarAddr, v: Value) -> Result<()> {
    let proc = &mut graph.procs[addr.proc];
    let var = &mut proc.vars[addr.var];

    if var.src.is_some() {
        return Err(Error::op_fail(
            "the variable is connected to a source; disconnect it first".to_string(),
        ));
    }

    let changed = var.store(v)?;
    if !changed {
        return Ok(());
    }

    let notify_fl = var.flags.has(VarFlags::NOTIFY);
    let ui_fl = !var.ui_hide && !var.in_ui_q;
    let dsts: Vec<VarAddr> = var.dst.clone();

    if ui_fl {
        var.in_ui_q = true;
        graph.ui_pending.push(addr);
    }
    if notify_fl {
        graph.procs[addr.proc].schedule_notify(addr.var);
    }

    // downstream dependents see the new value through the connection; the
    // ones that asked for notification are scheduled on their own proc
    for d in dsts {
        if graph.procs[d.proc].vars[d.var].flags.has(VarFlags::NOTIFY) {
            graph.procs[d.proc].schedule_notify(d.var);
        }
    }
    Ok(())
}

/// Connect `src` to feed `dst`. For `any` -> `any` connections the
/// matching concrete channel pairs are connected as well.
pub fn var_connect(graph: &mut Graph, src: VarAddr, dst: VarAddr) -> Result<()> {
    {
        let dvar = &graph.procs[dst.proc].vars[dst.var];
        if dvar.src.is_some() {
            return Err(Error::op_fail(format!(
                "the variable '{}' already has a source",
                dvar.label
            )));
        }
        if dvar.flags.has(VarFlags::NO_SRC) {
            return Err(Error::op_fail(format!(
                "the variable '{}' may not be connected to a source",
                dvar.label
            )));
        }
        let svar = &graph.procs[src.proc].vars[src.var];
        if !dvar.type_mask.is_runtime() && !svar.type_mask.intersects(dvar.type_mask) {
            return Err(Error::type_mismatch(format!(
                "the connection {} -> {} has no common type",
                svar.label, dvar.label
            )));
        }
    }

    graph.procs[src.proc].vars[src.var].dst.push(dst);
    graph.procs[dst.proc].vars[dst.var].src = Some(src);

    // pair up concrete channels under an any->any connection
    let (s_any, d_any) = (
        graph.procs[src.proc].vars[src.var].ch_idx.is_none(),
        graph.procs[dst.proc].vars[dst.var].ch_idx.is_none(),
    );
    if s_any && d_any {
        let (s_label, s_sfx) = {
            let v = &graph.procs[src.proc].vars[src.var];
            (v.label.clone(), v.label_sfx_id)
        };
        let (d_label, d_sfx) = {
            let v = &graph.procs[dst.proc].vars[dst.var];
            (v.label.clone(), v.label_sfx_id)
        };
        let ch_n = graph.procs[dst.proc]
            .channel_count(&d_label, d_sfx)
            .max(graph.procs[src.proc].channel_count(&s_label, s_sfx));
        for ch in 0..ch_n {
            let s_ch = graph.procs[src.proc].find_var(&s_label, s_sfx, Some(ch));
            let d_ch = graph.procs[dst.proc].find_var(&d_label, d_sfx, Some(ch));
            if let (Some(sv), Some(dv)) = (s_ch, d_ch) {
                if graph.procs[dst.proc].vars[dv].src.is_none() {
                    graph.procs[src.proc].vars[sv].dst.push(VarAddr { proc: dst.proc, var: dv });
                    graph.procs[dst.proc].vars[dv].src = Some(VarAddr { proc: src.proc, var: sv });
                }
            }
        }
    }
    Ok(())
}

/// Drop a variable's source connection.
pub fn var_disconnect(graph: &mut Graph, addr: VarAddr) {
    if let Some(src) = graph.procs[addr.proc].vars[addr.var].src.take() {
        graph.procs[src.proc].vars[src.var].dst.retain(|d| *d != addr);
    }
}

/// Create or update a per-channel child variable from a cfg value.
/// A list value (on a non-cfg variable) channelizes: element `i` lands on
/// channel `i`. Returns the var index of the `any` instance.
pub fn var_channelize(
    graph: &mut Graph,
    classes: &ClassDict,
    proc_idx: usize,
    label: &str,
    sfx_id: u32,
    value_cfg: &Cfg,
) -> Result<usize> {
    let class_idx = graph.procs[proc_idx].class_idx;
    let (vid, desc) = classes.classes[class_idx].var_desc(label).ok_or_else(|| {
        Error::not_found(format!(
            "the variable '{label}' is not declared by class '{}' (proc '{}')",
            classes.classes[class_idx].label,
            graph.procs[proc_idx].ctx_label()
        ))
    })?;
    let is_cfg_var = desc.type_fl.contains(TypeFl::CFG);
    let flags = desc.flags;
    let type_fl = if desc.type_fl.is_runtime() { TypeFl::ALL.union(TypeFl::RUNTIME) } else { desc.type_fl };

    let any_vi = ensure_var(graph, proc_idx, label, sfx_id, None, vid, flags, type_fl)?;

    if value_cfg.is_array() && !is_cfg_var {
        let elems: Vec<Cfg> = value_cfg.as_array().unwrap().clone();
        for (ch, ele) in elems.iter().enumerate() {
            let vi = ensure_var(graph, proc_idx, label, sfx_id, Some(ch), vid, flags, type_fl)?;
            set_from_cfg(graph, proc_idx, vi, ele)?;
        }
    } else if !value_cfg.is_null() {
        set_from_cfg(graph, proc_idx, any_vi, value_cfg)?;
    }
    Ok(any_vi)
}

fn ensure_var(
    graph: &mut Graph,
    proc_idx: usize,
    label: &str,
    sfx_id: u32,
    ch_idx: Option<usize>,
    vid: usize,
    flags: VarFlags,
    type_fl: TypeFl,
) -> Result<usize> {
    let proc = &mut graph.procs[proc_idx];
    if let Some(vi) = proc.find_var(label, sfx_id, ch_idx) {
        return Ok(vi);
    }
    let var = Var::new(label, sfx_id, vid, ch_idx, flags, type_fl);
    proc.vars.push(var);
    let vi = proc.vars.len() - 1;

    // keep the vid lookup current for vars created after the map is built
    // (presets may channelize late)
    if sfx_id == BASE_SFX_ID && vid < proc.var_map.len() {
        let slot = ch_idx.map_or(0, |c| c + 1);
        let row = &mut proc.var_map[vid];
        if row.len() <= slot {
            row.resize(slot + 1, None);
        }
        row[slot] = Some(vi);
    }
    Ok(vi)
}

fn set_from_cfg(graph: &mut Graph, proc_idx: usize, vi: usize, cfg: &Cfg) -> Result<()> {
    let v = value_from_cfg(cfg)?;
    if v.is_null() {
        return Ok(());
    }
    var_set(graph, VarAddr { proc: proc_idx, var: vi }, v)
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

pub fn proc_find(graph: &Graph, net: &Network, label: &str, sfx_id: u32) -> Option<usize> {
    net.proc_ids
        .iter()
        .copied()
        .find(|&p| graph.procs[p].label == label && graph.procs[p].label_sfx_id == sfx_id)
}

/// Recursively search the network tree rooted at `net_id` for the internal
/// network owned by a proc labeled `label`.
pub fn find_labeled_network(graph: &Graph, net_id: usize, label: &str) -> Option<usize> {
    let net = &graph.nets[net_id];
    for &p in &net.proc_ids {
        if let Some(inner) = graph.procs[p].internal_net {
            if graph.procs[p].label == label {
                return Some(inner);
            }
            if let Some(found) = find_labeled_network(graph, inner, label) {
                return Some(found);
            }
        }
    }
    net.poly_link.and_then(|id| find_labeled_network(graph, id, label))
}

/// Resolve `proc_label.var_label@ch` to a variable address within `net`.
pub fn get_var(
    graph: &Graph,
    net_id: usize,
    proc_label: &str,
    var_label: &str,
    ch_idx: Option<usize>,
) -> Result<VarAddr> {
    let ele = stmt::parse_ele(proc_label, false)?;
    let sfx = ele.base_sfx_id.unwrap_or(BASE_SFX_ID);
    let p = proc_find(graph, &graph.nets[net_id], &ele.label, sfx)
        .ok_or_else(|| Error::not_found(format!("the proc '{proc_label}' was not found")))?;
    let v = graph.procs[p]
        .find_var_or_any(var_label, BASE_SFX_ID, ch_idx)
        .ok_or_else(|| {
            Error::not_found(format!(
                "the variable '{var_label}' was not found on proc '{proc_label}'"
            ))
        })?;
    Ok(VarAddr { proc: p, var: v })
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Everything proc instantiation needs to see.
pub struct BuildCtx<'a> {
    pub graph: &'a mut Graph,
    pub classes: &'a ClassDict,
    pub globals: &'a Globals,
    pub devices: &'a mut Vec<ExternalDevice>,
}

/// Instantiate `net_cfg` `poly_cnt` times (or as overridden by its
/// `count:` field), returning the head network id of the poly chain.
/// `proxy_vars` carries a UDP wrapper's variables down into its internal
/// network build.
pub fn network_create(
    bctx: &mut BuildCtx,
    label: &str,
    net_cfg: Rc<Cfg>,
    poly_cnt: u32,
    proxy_vars: &[VarAddr],
    owner_proc: Option<usize>,
) -> Result<usize> {
    let poly_cnt = crate::cfg::u32_opt(&net_cfg, "count")?.unwrap_or(poly_cnt).max(1);

    let mut head: Option<usize> = None;
    let mut prev: Option<usize> = None;

    for poly_idx in 0..poly_cnt {
        let net_id = bctx.graph.nets.len();
        bctx.graph.nets.push(Network {
            label: label.to_string(),
            cfg: Rc::clone(&net_cfg),
            proc_ids: Vec::new(),
            presets: Vec::new(),
            preset_pairs: PairTable::default(),
            records: Vec::new(),
            poly_idx,
            poly_n: poly_cnt,
            poly_link: None,
            owner_proc,
            halted: false,
        });
        if head.is_none() {
            head = Some(net_id);
        }
        if bctx.graph.root_net.is_none() {
            bctx.graph.root_net = Some(net_id);
        }
        if let Some(prev) = prev {
            bctx.graph.nets[prev].poly_link = Some(net_id);
        }
        prev = Some(net_id);

        network_init(bctx, net_id, proxy_vars).map_err(|e| {
            Error::op_fail(format!(
                "network '{label}' create failed on poly index {poly_idx}: {e}"
            ))
        })?;
    }

    Ok(head.expect("poly count is at least one"))
}

fn network_init(bctx: &mut BuildCtx, net_id: usize, proxy_vars: &[VarAddr]) -> Result<()> {
    let net_cfg = Rc::clone(&bctx.graph.nets[net_id].cfg);
    let procs_cfg = crate::cfg::child(&net_cfg, "procs")?.clone();

    // record-type registry first so record vars can resolve their formats
    if let Some(records_cfg) = crate::cfg::child_opt(&net_cfg, "records") {
        let mut records = Vec::new();
        for (label, fmt_cfg) in crate::cfg::dict_iter(records_cfg, "records")? {
            if label.contains('.') {
                return Err(Error::syntax(format!(
                    "the record format label '{label}' may not contain a '.'"
                )));
            }
            let base = match crate::cfg::str_opt(fmt_cfg, "base")? {
                None => None,
                Some(b) => Some(
                    records
                        .iter()
                        .find(|r: &&(String, Rc<RecordType>)| r.0 == b)
                        .map(|r| Rc::clone(&r.1))
                        .ok_or_else(|| {
                            Error::not_found(format!("the base record type '{b}' is not registered"))
                        })?,
                ),
            };
            let rtype = RecordType::from_cfg(fmt_cfg.get("fields"), base)?;
            records.push((label.clone(), rtype));
        }
        bctx.graph.nets[net_id].records = records;
    }

    // create each proc in declaration order
    for (proc_label, proc_cfg) in crate::cfg::dict_iter(&procs_cfg, "procs")? {
        if let Some(proc_id) = proc_create(bctx, net_id, proc_label, proc_cfg, proxy_vars)? {
            bctx.graph.nets[net_id].proc_ids.push(proc_id);
        }
    }

    // the preset pair table enumerates every channelized variable
    let pairs = preset::build_pair_table(bctx.graph, net_id);
    bctx.graph.nets[net_id].preset_pairs = pairs;

    // parse (but do not apply) the network presets
    if let Some(presets_cfg) = crate::cfg::child_opt(&net_cfg, "presets") {
        let presets = preset::parse_network_presets(bctx, net_id, presets_cfg)?;
        bctx.graph.nets[net_id].presets = presets;
    }

    Ok(())
}

// one in/out statement, parsed and iteration-resolved
struct IoStmt {
    local_proc: IoEle,
    local_var: IoEle,
    remote_net: usize,
    remote_proc: IoEle,
    remote_var: IoEle,
    iter_cnt: u32,
}

struct ParseState {
    class_idx: usize,
    in_stmts: Vec<IoStmt>,
    out_cfg: Option<Cfg>,
    ui_cfg: Option<Cfg>,
    log_cfg: Option<Cfg>,
    preset_labels: Option<Cfg>,
    args_cfg: Option<Cfg>,
}

/// Instantiate one proc. Returns `None` when the class's poly limit has
/// been reached (the instantiation is skipped silently).
fn proc_create(
    bctx: &mut BuildCtx,
    net_id: usize,
    proc_label: &str,
    proc_cfg: &Cfg,
    proxy_vars: &[VarAddr],
) -> Result<Option<usize>> {
    // 1. label parsing
    let (label, sfx_id) = parse_proc_label(bctx.graph, net_id, proc_label)?;

    if proc_find(bctx.graph, &bctx.graph.nets[net_id], &label, sfx_id).is_some() {
        return Err(Error::syntax(format!(
            "the proc label '{label}:{sfx_id}' has already been used"
        )));
    }

    // 2. class lookup
    let class_label = crate::cfg::str_opt(proc_cfg, "class")?
        .ok_or_else(|| Error::syntax(format!("the proc '{label}' has no 'class' field")))?;
    let (class_idx, class) = bctx
        .classes
        .find(&class_label)
        .ok_or_else(|| Error::not_found(format!("the class '{class_label}' was not found")))?;

    if class.poly_limit_n > 0 {
        let n = bctx.graph.nets[net_id]
            .proc_ids
            .iter()
            .filter(|&&p| bctx.graph.procs[p].class_idx == class_idx)
            .count();
        if n >= class.poly_limit_n {
            debug!(
                "poly class copy count reached for '{class_label}' - skipping '{label}:{sfx_id}'"
            );
            return Ok(None);
        }
    }

    let proc_idx = bctx.graph.procs.len();
    bctx.graph.procs.push(Proc {
        label: label.clone(),
        label_sfx_id: sfx_id,
        class_idx,
        net_id,
        cfg: Rc::new(proc_cfg.clone()),
        vars: Vec::new(),
        var_map: Vec::new(),
        imp: None,
        internal_net: None,
        presets: parse_instance_presets(proc_cfg)?,
        pending_notify: Vec::new(),
        manual_notify: Vec::new(),
        log_init_vars: Vec::new(),
        log_exec_vars: Vec::new(),
        prof_dur: Duration::ZERO,
        prof_cnt: 0,
    });

    let mut ps = ParseState {
        class_idx,
        in_stmts: Vec::new(),
        out_cfg: proc_cfg.get("out").cloned(),
        ui_cfg: proc_cfg.get("ui").cloned(),
        log_cfg: proc_cfg.get("log").cloned(),
        preset_labels: proc_cfg.get("preset").cloned(),
        args_cfg: proc_cfg.get("args").cloned(),
    };

    if let Err(e) = proc_build_steps(bctx, net_id, proc_idx, proc_cfg, proxy_vars, &mut ps) {
        let ctx_label = bctx.graph.procs[proc_idx].ctx_label();
        error!("proc instantiation failed on '{ctx_label}': {e}");
        // the half-built proc stays in the arena; the caller abandons the
        // whole network build
        return Err(e);
    }

    Ok(Some(proc_idx))
}

/// Steps 3-15 of proc instantiation (see `proc_create`).
fn proc_build_steps(
    bctx: &mut BuildCtx,
    net_id: usize,
    proc_idx: usize,
    proc_cfg: &Cfg,
    proxy_vars: &[VarAddr],
    ps: &mut ParseState,
) -> Result<()> {
    // 3. in-statements create local input vars before create runs
    if let Some(in_cfg) = proc_cfg.get("in") {
        ps.in_stmts = parse_io_stmts(bctx, net_id, proc_idx, in_cfg, false)?;
        precreate_in_vars(bctx, proc_idx, &ps.in_stmts)?;
    }

    // 4. UDP proxied vars land on the inner procs that proxy to them
    create_proxied_vars(bctx, proc_idx, proxy_vars)?;

    // 5. default variable creation for every remaining class var desc
    let descs: Vec<(usize, Option<Rc<Cfg>>, bool)> = bctx.classes.classes[ps.class_idx]
        .var_descs
        .iter()
        .enumerate()
        .map(|(i, d)| (i, d.val_cfg.clone(), d.type_fl.is_runtime()))
        .collect();
    for (vid, val_cfg, runtime_fl) in descs {
        let d_label = bctx.classes.classes[ps.class_idx].var_descs[vid].label.clone();
        if runtime_fl && bctx.graph.procs[proc_idx].find_var(&d_label, BASE_SFX_ID, None).is_none()
        {
            continue;
        }
        if bctx.graph.procs[proc_idx].find_var(&d_label, BASE_SFX_ID, None).is_some() {
            continue;
        }
        let cfg = val_cfg.map(|c| (*c).clone()).unwrap_or(Cfg::Null);
        var_channelize(bctx.graph, bctx.classes, proc_idx, &d_label, BASE_SFX_ID, &cfg)?;
    }

    // 6. class presets named by the `preset:` field
    if let Some(preset_labels) = &ps.preset_labels {
        apply_class_presets(bctx, proc_idx, preset_labels)?;
    }

    // 7. args override defaults (and possibly channelize)
    if let Some(args_cfg) = &ps.args_cfg {
        process_args(bctx, proc_idx, args_cfg)?;
    }

    // 8. finalize in-connections
    connect_io_stmts(bctx, proc_idx, &ps.in_stmts, false)?;

    // 8b. wire the UDP wrapper's vars to their proxied inner vars
    connect_proxied_vars(bctx, proc_idx, proxy_vars)?;

    // 9. custom create
    let mut imp = (bctx.classes.classes[ps.class_idx].ctor)();
    {
        let mut ctx = ProcCtx {
            graph: &mut *bctx.graph,
            proc_idx,
            classes: bctx.classes,
            globals: bctx.globals,
            devices: &mut *bctx.devices,
        };
        imp.create(&mut ctx)?;
    }
    bctx.graph.procs[proc_idx].imp = Some(imp);

    // 10. var-map build + record required-field validation
    let var_desc_n = bctx.classes.classes[ps.class_idx].var_descs.len();
    bctx.graph.procs[proc_idx].build_var_map(var_desc_n)?;
    verify_required_record_fields(bctx, proc_idx)?;
    validate_src_flags(bctx, proc_idx)?;

    // 11. out-statements (feedback)
    if let Some(out_cfg) = &ps.out_cfg {
        let out_stmts = parse_io_stmts(bctx, net_id, proc_idx, out_cfg, true)?;
        connect_io_stmts(bctx, proc_idx, &out_stmts, true)?;
    }

    // 12. log-statement registration
    if let Some(log_cfg) = &ps.log_cfg {
        process_log_stmt(bctx, proc_idx, log_cfg)?;
    }
    register_flagged_log_vars(bctx, proc_idx);

    // 13. manual-notify list: inputs whose producers cannot auto-notify
    let manual: Vec<usize> = bctx.graph.procs[proc_idx]
        .vars
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            v.src.is_some() && v.type_mask.intersects(TypeFl::MBUF.union(TypeFl::RBUF))
        })
        .map(|(i, _)| i)
        .collect();
    bctx.graph.procs[proc_idx].manual_notify = manual;

    // 14. pre-runtime notification pass: the proc sees initial state
    pre_runtime_notify(bctx, proc_idx)?;

    // 15. per-var UI attributes
    if let Some(ui_cfg) = &ps.ui_cfg {
        parse_ui_cfg(bctx, proc_idx, ui_cfg)?;
    }

    Ok(())
}

fn parse_proc_label(graph: &Graph, net_id: usize, proc_label: &str) -> Result<(String, u32)> {
    let head_len = proc_label
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .len();
    if head_len == 0 {
        return Err(Error::syntax(format!(
            "the proc label '{proc_label}' is a number rather than an identifier"
        )));
    }

    let net = &graph.nets[net_id];
    let sfx_id = if head_len == proc_label.len() {
        // no explicit suffix: default to the owning poly index
        net.poly_idx
    } else {
        let sfx: u32 = proc_label[head_len..]
            .parse()
            .map_err(|_| Error::syntax(format!("bad suffix on proc label '{proc_label}'")))?;
        if net.poly_n > 1 && sfx != net.poly_idx {
            return Err(Error::invalid_state(format!(
                "the proc '{proc_label}' suffix id ({sfx}) conflicts with the network poly index ({})",
                net.poly_idx
            )));
        }
        sfx
    };
    Ok((proc_label[..head_len].to_string(), sfx_id))
}

fn parse_instance_presets(proc_cfg: &Cfg) -> Result<Vec<ClassPreset>> {
    let mut presets = Vec::new();
    if let Some(p) = proc_cfg.get("presets") {
        for (label, pdef) in crate::cfg::dict_iter(p, "presets")? {
            if !pdef.is_object() {
                return Err(Error::syntax(format!(
                    "the instance preset '{label}' must be a dictionary"
                )));
            }
            presets.push(ClassPreset { label: label.clone(), cfg: Rc::new(pdef.clone()) });
        }
    }
    Ok(presets)
}

// -- in/out statements ------------------------------------------------------

fn parse_io_stmts(
    bctx: &mut BuildCtx,
    net_id: usize,
    proc_idx: usize,
    io_cfg: &Cfg,
    out_fl: bool,
) -> Result<Vec<IoStmt>> {
    let what = if out_fl { "out" } else { "in" };
    let mut stmts = Vec::new();

    for (local_str, remote_cfg) in crate::cfg::dict_iter(io_cfg, what)? {
        let remote_str = crate::cfg::as_str(remote_cfg, what)?;
        let stmt = parse_one_io_stmt(bctx, net_id, proc_idx, local_str, &remote_str, out_fl)
            .map_err(|e| {
                Error::syntax(format!(
                    "the {what}-stmt '{local_str}: {remote_str}' on proc '{}' failed: {e}",
                    bctx.graph.procs[proc_idx].ctx_label()
                ))
            })?;
        stmts.push(stmt);
    }
    Ok(stmts)
}

fn parse_one_io_stmt(
    bctx: &mut BuildCtx,
    net_id: usize,
    proc_idx: usize,
    local_str: &str,
    remote_str: &str,
    out_fl: bool,
) -> Result<IoStmt> {
    let (local_proc, local_var) = stmt::parse_local(local_str)?;
    let (remote_net_label, mut remote_proc, remote_var) = stmt::parse_remote(remote_str)?;

    if local_proc.is_iter && local_var.is_iter {
        return Err(Error::syntax(
            "both the local proc and the local var cannot iterate".to_string(),
        ));
    }

    // resolve the remote network by nearest-enclosing name, `_` = root
    let remote_net = match remote_net_label.as_deref() {
        None => net_id,
        Some("_") => bctx.graph.root_net.unwrap_or(net_id),
        Some(l) => {
            let root = bctx.graph.root_net.unwrap_or(net_id);
            find_labeled_network(bctx.graph, root, l)
                .ok_or_else(|| Error::not_found(format!("the remote net '{l}' was not found")))?
        }
    };

    // a remote proc with no explicit suffix on the local net takes this
    // proc's suffix, so poly voices wire 1:1 by default
    if !remote_proc.is_iter && remote_proc.base_sfx_id.is_none() && remote_net == net_id {
        remote_proc.base_sfx_id = Some(bctx.graph.procs[proc_idx].label_sfx_id);
    }

    // iteration count determination (in-stmts only; a local-var in an
    // out-stmt follows the same rules with the roles flipped)
    let iter_cnt = if !local_var.is_iter {
        1
    } else {
        determine_iter_count(bctx, remote_net, &local_var, &remote_proc, &remote_var, out_fl)?
    };

    if local_var.is_iter && iter_cnt == 0 {
        return Err(Error::syntax("the iteration count must be greater than zero".to_string()));
    }

    Ok(IoStmt { local_proc, local_var, remote_net, remote_proc, remote_var, iter_cnt })
}

/// Exactly one element controls an iterating statement's count: a literal
/// count on the local var, the remote proc, or the remote var; otherwise
/// the inherent replication of whichever remote element is iterating.
fn determine_iter_count(
    bctx: &BuildCtx,
    remote_net: usize,
    local_var: &IoEle,
    remote_proc: &IoEle,
    remote_var: &IoEle,
    out_fl: bool,
) -> Result<u32> {
    let literal_n = [local_var, remote_proc, remote_var]
        .iter()
        .filter(|e| e.sfx_id_count.is_some())
        .count();
    if literal_n > 1 {
        return Err(Error::syntax(
            "only one element of an iterating statement may give a literal count".to_string(),
        ));
    }

    if let Some(n) = local_var.sfx_id_count {
        return Ok(n);
    }
    if let Some(n) = remote_proc.sfx_id_count {
        return check_proc_run(bctx, remote_net, remote_proc, Some(n));
    }
    if let Some(n) = remote_var.sfx_id_count {
        return check_var_run(bctx, remote_net, remote_proc, remote_var, Some(n), out_fl);
    }
    if remote_proc.is_iter {
        if remote_var.is_iter {
            return Err(Error::syntax(
                "the remote proc is iterating therefore the remote var cannot".to_string(),
            ));
        }
        return check_proc_run(bctx, remote_net, remote_proc, None);
    }
    if remote_var.is_iter {
        return check_var_run(bctx, remote_net, remote_proc, remote_var, None, out_fl);
    }
    Err(Error::syntax("no iteration count control was specified".to_string()))
}

/// Count the run of procs `label:base, label:base+1, ...` in the remote
/// net, validating any literal count against it.
fn check_proc_run(
    bctx: &BuildCtx,
    remote_net: usize,
    remote_proc: &IoEle,
    literal: Option<u32>,
) -> Result<u32> {
    let base = remote_proc.base_sfx_id.unwrap_or(BASE_SFX_ID);
    let net = &bctx.graph.nets[remote_net];
    let mut n = 0;
    while proc_find(bctx.graph, net, &remote_proc.label, base + n).is_some() {
        n += 1;
    }
    if n == 0 {
        return Err(Error::not_found(format!(
            "the remote proc '{}:{base}' was not found",
            remote_proc.label
        )));
    }
    match literal {
        Some(l) if l > n => Err(Error::syntax(format!(
            "the literal count {l} exceeds the {n} available '{}' procs",
            remote_proc.label
        ))),
        Some(l) => Ok(l),
        None => Ok(n),
    }
}

/// Count the run of vars `label:base, label:base+1, ...` on the remote proc.
fn check_var_run(
    bctx: &BuildCtx,
    remote_net: usize,
    remote_proc: &IoEle,
    remote_var: &IoEle,
    literal: Option<u32>,
    _out_fl: bool,
) -> Result<u32> {
    let proc_sfx = remote_proc.base_sfx_id.unwrap_or(BASE_SFX_ID);
    let net = &bctx.graph.nets[remote_net];
    let p = proc_find(bctx.graph, net, &remote_proc.label, proc_sfx).ok_or_else(|| {
        Error::not_found(format!(
            "the remote proc '{}:{proc_sfx}' was not found",
            remote_proc.label
        ))
    })?;
    let base = remote_var.base_sfx_id.unwrap_or(BASE_SFX_ID);
    let mut n = 0;
    while bctx.graph.procs[p].find_var(&remote_var.label, base + n, None).is_some() {
        n += 1;
    }
    if n == 0 {
        return Err(Error::not_found(format!(
            "the remote var '{}:{base}' was not found",
            remote_var.label
        )));
    }
    match literal {
        Some(l) if l > n => Err(Error::syntax(format!(
            "the literal count {l} exceeds the {n} available '{}' vars",
            remote_var.label
        ))),
        Some(l) => Ok(l),
        None => Ok(n),
    }
}

/// Create the local input vars an in-statement addresses, before the
/// proc's create callback runs.
fn precreate_in_vars(bctx: &mut BuildCtx, proc_idx: usize, stmts: &[IoStmt]) -> Result<()> {
    for s in stmts {
        if !(s.local_var.is_iter || s.local_var.has_sfx) {
            continue;
        }
        let base = s.local_var.base_sfx_id.unwrap_or(BASE_SFX_ID);
        let n = if s.local_var.is_iter { s.iter_cnt } else { 1 };
        for j in 0..n {
            let sfx = base + j;
            if bctx.graph.procs[proc_idx]
                .find_var(&s.local_var.label, sfx, None)
                .is_none()
            {
                var_channelize(
                    bctx.graph,
                    bctx.classes,
                    proc_idx,
                    &s.local_var.label,
                    sfx,
                    &Cfg::Null,
                )?;
            }
        }
    }
    Ok(())
}

fn connect_io_stmts(
    bctx: &mut BuildCtx,
    proc_idx: usize,
    stmts: &[IoStmt],
    out_fl: bool,
) -> Result<()> {
    for s in stmts {
        for j in 0..s.iter_cnt {
            // when the local proc iterates, the increment is the proc's
            // own suffix id (poly wiring); otherwise the loop index
            let incr = if s.local_proc.is_iter {
                bctx.graph.procs[proc_idx].label_sfx_id
            } else {
                j
            };

            let mut local_sfx = s.local_var.base_sfx_id.unwrap_or(BASE_SFX_ID);
            let mut remote_proc_sfx = s.remote_proc.base_sfx_id.unwrap_or(BASE_SFX_ID);
            let mut remote_var_sfx = s.remote_var.base_sfx_id.unwrap_or(BASE_SFX_ID);

            if s.local_var.is_iter {
                local_sfx += incr;
            }
            if s.remote_proc.is_iter {
                remote_proc_sfx += incr;
            }
            if s.remote_var.is_iter {
                remote_var_sfx += incr;
            }

            let local_vi = bctx.graph.procs[proc_idx]
                .find_var(&s.local_var.label, local_sfx, None)
                .ok_or_else(|| {
                    Error::not_found(format!(
                        "the local var '{}:{local_sfx}' was not found",
                        s.local_var.label
                    ))
                })?;

            let rnet = &bctx.graph.nets[s.remote_net];
            let rproc = proc_find(bctx.graph, rnet, &s.remote_proc.label, remote_proc_sfx)
                .ok_or_else(|| {
                    Error::not_found(format!(
                        "the remote proc '{}:{remote_proc_sfx}' was not found",
                        s.remote_proc.label
                    ))
                })?;
            let rvar = bctx.graph.procs[rproc]
                .find_var(&s.remote_var.label, remote_var_sfx, None)
                .ok_or_else(|| {
                    Error::not_found(format!(
                        "the remote var '{}:{remote_var_sfx}' was not found on '{}'",
                        s.remote_var.label,
                        bctx.graph.procs[rproc].ctx_label()
                    ))
                })?;

            let local = VarAddr { proc: proc_idx, var: local_vi };
            let remote = VarAddr { proc: rproc, var: rvar };

            if out_fl {
                // feedback: the local side is the source
                var_connect(bctx.graph, local, remote)?;
            } else {
                var_connect(bctx.graph, remote, local)?;
            }
        }
    }
    Ok(())
}

// -- UDP proxy wiring -------------------------------------------------------

/// While building a UDP's internal network, make sure each inner variable
/// referenced by a wrapper proxy exists on this proc.
fn create_proxied_vars(bctx: &mut BuildCtx, proc_idx: usize, proxy_vars: &[VarAddr]) -> Result<()> {
    let proc_label = bctx.graph.procs[proc_idx].label.clone();
    for &pv in proxy_vars {
        let wrapper_proc = pv.proc;
        let (wlabel, wvid) = {
            let v = &bctx.graph.procs[wrapper_proc].vars[pv.var];
            (v.label.clone(), v.vid)
        };
        let Some((target_proc, target_var)) = bctx.classes.classes
            [bctx.graph.procs[wrapper_proc].class_idx]
            .var_descs
            .get(wvid)
            .and_then(|d| d.proxy.clone())
        else {
            continue;
        };
        if target_proc != proc_label {
            continue;
        }
        if bctx.graph.procs[proc_idx].find_var(&target_var, BASE_SFX_ID, None).is_none() {
            var_channelize(bctx.graph, bctx.classes, proc_idx, &target_var, BASE_SFX_ID, &Cfg::Null)
                .map_err(|e| {
                    Error::not_found(format!(
                        "the proxied var '{target_proc}.{target_var}' (wrapper var '{wlabel}') could not be created: {e}"
                    ))
                })?;
        }
    }
    Ok(())
}

/// Connect wrapper vars to their proxied inner vars: `out`-flagged wrapper
/// vars are fed by the inner var, all others feed it.
fn connect_proxied_vars(bctx: &mut BuildCtx, proc_idx: usize, proxy_vars: &[VarAddr]) -> Result<()> {
    let proc_label = bctx.graph.procs[proc_idx].label.clone();
    for &pv in proxy_vars {
        let wrapper_proc = pv.proc;
        let (wvid, wflags) = {
            let v = &bctx.graph.procs[wrapper_proc].vars[pv.var];
            (v.vid, v.flags)
        };
        let Some((target_proc, target_var)) = bctx.classes.classes
            [bctx.graph.procs[wrapper_proc].class_idx]
            .var_descs
            .get(wvid)
            .and_then(|d| d.proxy.clone())
        else {
            continue;
        };
        if target_proc != proc_label {
            continue;
        }
        let inner_vi = bctx.graph.procs[proc_idx]
            .find_var(&target_var, BASE_SFX_ID, None)
            .ok_or_else(|| {
                Error::not_found(format!("the proxied var '{target_proc}.{target_var}' is missing"))
            })?;
        let inner = VarAddr { proc: proc_idx, var: inner_vi };
        if wflags.has(VarFlags::OUT) {
            var_connect(bctx.graph, inner, pv)?;
        } else {
            var_connect(bctx.graph, pv, inner)?;
        }
    }
    Ok(())
}

// -- class presets / args ---------------------------------------------------

/// Apply the `preset:` field: a preset label or list of labels resolved
/// against the instance presets first, then the class presets.
fn apply_class_presets(bctx: &mut BuildCtx, proc_idx: usize, preset_labels: &Cfg) -> Result<()> {
    let labels: Vec<String> = if let Some(s) = preset_labels.as_str() {
        vec![s.to_string()]
    } else {
        let mut v = Vec::new();
        for l in crate::cfg::list_iter(preset_labels, "preset")? {
            v.push(crate::cfg::as_str(l, "preset label")?);
        }
        v
    };

    for label in labels {
        let cfg = find_proc_preset(bctx, proc_idx, &label).ok_or_else(|| {
            Error::not_found(format!(
                "the preset '{label}' could not be found for proc '{}'",
                bctx.graph.procs[proc_idx].ctx_label()
            ))
        })?;
        preset_channelize_vars(bctx, proc_idx, &label, &cfg)?;
    }
    Ok(())
}

/// Instance presets shadow class presets of the same label.
pub fn find_proc_preset(bctx: &BuildCtx, proc_idx: usize, label: &str) -> Option<Rc<Cfg>> {
    let proc = &bctx.graph.procs[proc_idx];
    if let Some(p) = proc.presets.iter().find(|p| p.label == label) {
        return Some(Rc::clone(&p.cfg));
    }
    bctx.classes.classes[proc.class_idx]
        .preset(label)
        .map(|p| Rc::clone(&p.cfg))
}

pub fn preset_channelize_vars(
    bctx: &mut BuildCtx,
    proc_idx: usize,
    preset_label: &str,
    preset_cfg: &Cfg,
) -> Result<()> {
    for (var_label, value) in crate::cfg::dict_iter(preset_cfg, preset_label)? {
        var_channelize(bctx.graph, bctx.classes, proc_idx, var_label, BASE_SFX_ID, value)
            .map_err(|e| {
                Error::op_fail(format!(
                    "preset '{preset_label}' failed on proc '{}' var '{var_label}': {e}",
                    bctx.graph.procs[proc_idx].ctx_label()
                ))
            })?;
    }
    Ok(())
}

/// Args: `{ var_label[_sfx][_cnt]: value }`. Iterating labels without a
/// literal count take it from the desc's `mult_ref` variable.
fn process_args(bctx: &mut BuildCtx, proc_idx: usize, args_cfg: &Cfg) -> Result<()> {
    for (arg_label, value) in crate::cfg::dict_iter(args_cfg, "args")? {
        let ele = stmt::parse_ele(arg_label, false)?;

        let cnt = if ele.is_iter {
            match ele.sfx_id_count {
                Some(n) => n,
                None => {
                    let class_idx = bctx.graph.procs[proc_idx].class_idx;
                    let mult_ref = bctx.classes.classes[class_idx]
                        .var_desc(&ele.label)
                        .and_then(|(_, d)| d.mult_ref.clone())
                        .ok_or_else(|| {
                            Error::syntax(format!(
                                "the arg '{arg_label}' iterates but '{}' has no 'mult_ref'",
                                ele.label
                            ))
                        })?;
                    let n = bctx.graph.procs[proc_idx].mult_sfx_ids(&mult_ref).len() as u32;
                    if n == 0 {
                        return Err(Error::syntax(format!(
                            "the 'mult_ref' var '{mult_ref}' for arg '{arg_label}' has no instances"
                        )));
                    }
                    n
                }
            }
        } else {
            1
        };

        let base = ele.base_sfx_id.unwrap_or(BASE_SFX_ID);
        for sfx in base..base + cnt {
            var_channelize(bctx.graph, bctx.classes, proc_idx, &ele.label, sfx, value).map_err(
                |e| {
                    Error::op_fail(format!(
                        "arg '{arg_label}' failed on proc '{}': {e}",
                        bctx.graph.procs[proc_idx].ctx_label()
                    ))
                },
            )?;
        }
    }
    Ok(())
}

// -- validation / logging / notification ------------------------------------

fn verify_required_record_fields(bctx: &BuildCtx, proc_idx: usize) -> Result<()> {
    let proc = &bctx.graph.procs[proc_idx];
    let class = &bctx.classes.classes[proc.class_idx];
    for (vi, var) in proc.vars.iter().enumerate() {
        let Some(desc) = class.var_descs.get(var.vid) else { continue };
        if desc.required_fields.is_empty() || var.src.is_none() {
            continue;
        }
        let val = var_read(bctx.graph, VarAddr { proc: proc_idx, var: vi });
        let Value::RBuf(rb) = val else { continue };
        let rtype = Rc::clone(&rb.borrow().rtype);
        for f in &desc.required_fields {
            if rtype.field_index(f).is_none() {
                return Err(Error::not_found(format!(
                    "the required record field '{f}' is missing on '{}'",
                    var.ctx_label(&proc.label, proc.label_sfx_id)
                )));
            }
        }
    }
    Ok(())
}

fn validate_src_flags(bctx: &BuildCtx, proc_idx: usize) -> Result<()> {
    let proc = &bctx.graph.procs[proc_idx];
    for var in &proc.vars {
        if var.ch_idx.is_some() {
            continue;
        }
        if var.flags.has(VarFlags::SRC) && var.src.is_none() {
            return Err(Error::invalid_state(format!(
                "the variable '{}' requires a source connection",
                var.ctx_label(&proc.label, proc.label_sfx_id)
            )));
        }
    }
    Ok(())
}

/// `log: { init: [var...], exec: [var...] }` or a bare list (exec).
fn process_log_stmt(bctx: &mut BuildCtx, proc_idx: usize, log_cfg: &Cfg) -> Result<()> {
    let mut add = |bctx: &mut BuildCtx, labels: &Cfg, init_fl: bool| -> Result<()> {
        for l in crate::cfg::list_iter(labels, "log")? {
            let label = crate::cfg::as_str(l, "log var label")?;
            let ele = stmt::parse_ele(&label, false)?;
            let sfx = ele.base_sfx_id.unwrap_or(BASE_SFX_ID);
            let proc = &mut bctx.graph.procs[proc_idx];
            let vi = proc.find_var(&ele.label, sfx, None).ok_or_else(|| {
                Error::not_found(format!(
                    "the log var '{label}' was not found on '{}'",
                    proc.ctx_label()
                ))
            })?;
            if init_fl {
                proc.log_init_vars.push(vi);
            } else {
                proc.log_exec_vars.push(vi);
            }
        }
        Ok(())
    };

    if log_cfg.is_array() {
        add(bctx, log_cfg, false)?;
    } else {
        if let Some(init) = log_cfg.get("init") {
            add(bctx, init, true)?;
        }
        if let Some(exec) = log_cfg.get("exec") {
            add(bctx, exec, false)?;
        }
    }
    Ok(())
}

/// Vars whose class desc carries a `log_init`/`log_exec` flag register
/// with or without a `log:` statement.
fn register_flagged_log_vars(bctx: &mut BuildCtx, proc_idx: usize) {
    let proc = &bctx.graph.procs[proc_idx];
    let mut init_extra = Vec::new();
    let mut exec_extra = Vec::new();
    for (vi, v) in proc.vars.iter().enumerate() {
        if v.flags.has(VarFlags::LOG_INIT) {
            init_extra.push(vi);
        }
        if v.flags.has(VarFlags::LOG_EXEC) {
            exec_extra.push(vi);
        }
    }
    let proc = &mut bctx.graph.procs[proc_idx];
    proc.log_init_vars.extend(init_extra);
    proc.log_exec_vars.extend(exec_extra);
    proc.log_init_vars.sort_unstable();
    proc.log_init_vars.dedup();
    proc.log_exec_vars.sort_unstable();
    proc.log_exec_vars.dedup();
}

/// Deliver every variable to the proc's notify callback once, then emit
/// the init logs. The log runs after notification so it reflects any
/// fixups the proc made on first sight of the value.
fn pre_runtime_notify(bctx: &mut BuildCtx, proc_idx: usize) -> Result<()> {
    // the pass below delivers every var once; notifications scheduled by
    // default/preset/arg sets during the build would only repeat it on the
    // first cycle (after feedback wiring has changed what a read returns)
    let pending = std::mem::take(&mut bctx.graph.procs[proc_idx].pending_notify);
    for vi in pending {
        bctx.graph.procs[proc_idx].vars[vi].pending_notify = false;
    }

    let var_n = bctx.graph.procs[proc_idx].vars.len();
    let mut imp = bctx.graph.procs[proc_idx]
        .imp
        .take()
        .ok_or_else(|| Error::invalid_state("proc state missing before notification"))?;
    let mut rc = Ok(());
    for vi in 0..var_n {
        let mut ctx = ProcCtx {
            graph: &mut *bctx.graph,
            proc_idx,
            classes: bctx.classes,
            globals: bctx.globals,
            devices: &mut *bctx.devices,
        };
        if let Err(e) = imp.notify(&mut ctx, vi) {
            rc = Err(e);
            break;
        }
    }
    bctx.graph.procs[proc_idx].imp = Some(imp);

    // class-desc log_init flags fire here, once
    let proc = &bctx.graph.procs[proc_idx];
    for (vi, v) in proc.vars.iter().enumerate() {
        if v.flags.has(VarFlags::LOG_INIT) || proc.log_init_vars.contains(&vi) {
            info!(
                "init {} = {}",
                v.ctx_label(&proc.label, proc.label_sfx_id),
                var_read(bctx.graph, VarAddr { proc: proc_idx, var: vi })
            );
        }
    }
    rc
}

fn parse_ui_cfg(bctx: &mut BuildCtx, proc_idx: usize, ui_cfg: &Cfg) -> Result<()> {
    if let Some(vars_cfg) = ui_cfg.get("vars") {
        for (var_label, v_ui) in crate::cfg::dict_iter(vars_cfg, "ui vars")? {
            let proc = &mut bctx.graph.procs[proc_idx];
            let Some(vi) = proc.find_var(var_label, BASE_SFX_ID, None) else {
                warn!(
                    "the ui var '{var_label}' was not found on '{}'",
                    proc.ctx_label()
                );
                continue;
            };
            let var = &mut proc.vars[vi];
            if let Some(title) = crate::cfg::str_opt(v_ui, "title")? {
                var.ui_title = Some(title);
            }
            if let Some(h) = crate::cfg::bool_opt(v_ui, "hide")? {
                var.ui_hide = h;
            }
            if let Some(d) = crate::cfg::bool_opt(v_ui, "disable")? {
                var.ui_disable = d;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run one cycle of `net_id`: deliver pending notifications and execute
/// every proc in declaration order. A proc returning end-of-stream (or an
/// error, when `halt_on_exec_err` is set) halts at cycle end.
pub fn exec_cycle(
    graph: &mut Graph,
    net_id: usize,
    classes: &ClassDict,
    globals: &Globals,
    devices: &mut Vec<ExternalDevice>,
) -> Result<ExecState> {
    let mut halt_fl = graph.nets[net_id].halted;
    let proc_ids = graph.nets[net_id].proc_ids.clone();

    for proc_idx in proc_ids {
        let t0 = globals.profile_fl.then(Instant::now);

        // manual notification for inputs that cannot auto-notify
        let manual = graph.procs[proc_idx].manual_notify.clone();
        for vi in manual {
            let val = var_read(graph, VarAddr { proc: proc_idx, var: vi });
            if val.has_elements_now() {
                graph.procs[proc_idx].schedule_notify(vi);
            }
        }

        let Some(mut imp) = graph.procs[proc_idx].imp.take() else {
            return Err(Error::invalid_state(format!(
                "proc '{}' re-entered during its own callback",
                graph.procs[proc_idx].ctx_label()
            )));
        };

        // deliver pending notifications, then exec
        let mut rc = Ok(ExecState::Continue);
        loop {
            let pending = std::mem::take(&mut graph.procs[proc_idx].pending_notify);
            if pending.is_empty() {
                break;
            }
            for vi in pending {
                graph.procs[proc_idx].vars[vi].pending_notify = false;
                let mut ctx = ProcCtx {
                    graph: &mut *graph,
                    proc_idx,
                    classes,
                    globals,
                    devices: &mut *devices,
                };
                if let Err(e) = imp.notify(&mut ctx, vi) {
                    rc = Err(e);
                    break;
                }
            }
            if rc.is_err() {
                break;
            }
        }

        if rc.is_ok() {
            let mut ctx = ProcCtx {
                graph: &mut *graph,
                proc_idx,
                classes,
                globals,
                devices: &mut *devices,
            };
            rc = imp.exec(&mut ctx);
        }
        graph.procs[proc_idx].imp = Some(imp);

        match rc {
            Ok(ExecState::Continue) => {}
            Ok(ExecState::Eof) => halt_fl = true,
            Err(e) => {
                let ctx_label = graph.procs[proc_idx].ctx_label();
                if globals.halt_on_exec_err {
                    return Err(Error::op_fail(format!("exec failed on '{ctx_label}': {e}")));
                }
                error!("exec failed on '{ctx_label}' (cycle squashed): {e}");
            }
        }

        // per-cycle log registrations
        let log_vars = graph.procs[proc_idx].log_exec_vars.clone();
        for vi in log_vars {
            let p = &graph.procs[proc_idx];
            info!(
                "exec {} = {}",
                p.vars[vi].ctx_label(&p.label, p.label_sfx_id),
                var_read(graph, VarAddr { proc: proc_idx, var: vi })
            );
        }

        if let Some(t0) = t0 {
            let p = &mut graph.procs[proc_idx];
            p.prof_dur += t0.elapsed();
            p.prof_cnt += 1;
        }
    }

    graph.nets[net_id].halted = false;
    Ok(if halt_fl { ExecState::Eof } else { ExecState::Continue })
}

/// Log the instantiated network: procs, vars, connections.
pub fn print_network(graph: &Graph, net_id: usize, indent: usize) {
    let net = &graph.nets[net_id];
    let pad = "  ".repeat(indent);
    info!(
        "{pad}net '{}' poly {}/{} procs:{}",
        net.label,
        net.poly_idx,
        net.poly_n,
        net.proc_ids.len()
    );
    for &p in &net.proc_ids {
        let proc = &graph.procs[p];
        info!("{pad}  proc {}", proc.ctx_label());
        for v in &proc.vars {
            let src = v
                .src
                .map(|s| {
                    let sp = &graph.procs[s.proc];
                    format!(" <- {}", sp.vars[s.var].ctx_label(&sp.label, sp.label_sfx_id))
                })
                .unwrap_or_default();
            info!(
                "{pad}    {} = {}{src}",
                v.ctx_label(&proc.label, proc.label_sfx_id),
                v.value
            );
        }
        if let Some(inner) = proc.internal_net {
            let mut id = Some(inner);
            while let Some(i) = id {
                print_network(graph, i, indent + 2);
                id = graph.nets[i].poly_link;
            }
        }
    }
}

/// Per-proc accumulated exec-time report.
pub fn profile_report(graph: &Graph, net_id: usize) {
    let net = &graph.nets[net_id];
    let total: Duration = net
        .proc_ids
        .iter()
        .map(|&p| graph.procs[p].prof_dur)
        .sum();
    info!("net '{}' total: {:.5}s", net.label, total.as_secs_f64());
    for &p in &net.proc_ids {
        let proc = &graph.procs[p];
        let dur = proc.prof_dur.as_secs_f64();
        let share = if total.as_secs_f64() > 0.0 { dur / total.as_secs_f64() } else { 0.0 };
        info!(
            "  {:6.2}% {:.5}s n:{} {}",
            share * 100.0,
            dur,
            proc.prof_cnt,
            proc.ctx_label()
        );
        if let Some(inner) = proc.internal_net {
            let mut id = Some(inner);
            while let Some(i) = id {
                profile_report(graph, i);
                id = graph.nets[i].poly_link;
            }
        }
    }
}
