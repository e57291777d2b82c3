//! Network presets: parsing, application, dual interpolation and
//! probabilistic multi-preset selection.
//!
//! A value-list preset resolves at parse time to a list of
//! `(proc, var, channel, value)` records. A dual preset points at two
//! value-list presets plus an interpolation coefficient. The flat
//! preset-pair table enumerates every channelized variable of the network
//! so dual application can pair primary and secondary records in O(1).

use crate::error::{Error, Result};
use crate::network::{self, BuildCtx, Graph};
use crate::value::{value_from_cfg, TypeFl, Value};
use crate::var::VarAddr;
use rand::Rng;
use serde_json::Value as Cfg;
use std::collections::HashMap;
use tracing::warn;

pub const BASE_SFX_ID: u32 = network::BASE_SFX_ID;

// ---------------------------------------------------------------------------
// Preset pair table
// ---------------------------------------------------------------------------

/// One row per (variable, channel-slot): slot 0 is the `any` instance,
/// slots 1.. are the concrete channels.
#[derive(Debug, Clone)]
pub struct PairRow {
    pub addr: VarAddr,
}

#[derive(Debug, Clone, Default)]
pub struct PairTable {
    pub rows: Vec<PairRow>,
    /// `(proc, var_label, var_sfx)` -> (first row, row count).
    pub index: HashMap<(usize, String, u32), (usize, usize)>,
}

impl PairTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Enumerate every channelized variable of `net_id` into the pair table:
/// `channel_count + 1` rows per variable, the `any` slot plus each
/// concrete channel.
pub fn build_pair_table(graph: &Graph, net_id: usize) -> PairTable {
    let mut table = PairTable::default();
    for &p in &graph.nets[net_id].proc_ids {
        let proc = &graph.procs[p];
        // group by (label, sfx) preserving first-seen order
        let mut seen: Vec<(String, u32)> = Vec::new();
        for v in &proc.vars {
            let key = (v.label.clone(), v.label_sfx_id);
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
        for (label, sfx) in seen {
            let row0 = table.rows.len();
            let Some(any_vi) = proc.find_var(&label, sfx, None) else { continue };
            table.rows.push(PairRow { addr: VarAddr { proc: p, var: any_vi } });
            let ch_n = proc.channel_count(&label, sfx);
            for ch in 0..ch_n {
                if let Some(vi) = proc.find_var(&label, sfx, Some(ch)) {
                    table.rows.push(PairRow { addr: VarAddr { proc: p, var: vi } });
                }
            }
            let n = table.rows.len() - row0;
            table.index.insert((p, label, sfx), (row0, n));
        }
    }
    table
}

// ---------------------------------------------------------------------------
// Preset representation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum PresetValue {
    /// One resolved variable assignment.
    Direct {
        addr: VarAddr,
        /// Channel the record addresses (`None` = the `any` instance).
        ch: Option<usize>,
        value: Value,
        /// Row range in the pair table, when the variable is in it.
        pair: Option<(usize, usize)>,
        /// Owning proc's label suffix (for poly-restricted application).
        proc_sfx: u32,
    },
    /// Reference to a preset of an inner (poly/UDP) network.
    NetRef { net: usize, preset_label: String },
}

#[derive(Debug, Clone)]
pub enum PresetBody {
    VList { values: Vec<PresetValue> },
    Dual { pri: String, sec: String, coeff: f64 },
}

#[derive(Debug, Clone)]
pub struct NetworkPreset {
    pub label: String,
    pub body: PresetBody,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the network `presets:` dictionary. Value-list presets are
/// dictionaries; dual presets are `[pri, sec, coeff]` lists.
pub fn parse_network_presets(
    bctx: &mut BuildCtx,
    net_id: usize,
    presets_cfg: &Cfg,
) -> Result<Vec<NetworkPreset>> {
    let dict = presets_cfg
        .as_object()
        .ok_or_else(|| Error::syntax("the network preset list is not a dictionary".to_string()))?
        .clone();

    let mut presets = Vec::new();

    // value-list presets first so dual presets can reference them
    for (label, body) in &dict {
        if body.is_object() {
            let values = parse_vlist(bctx, net_id, label, body)?;
            presets.push(NetworkPreset { label: label.clone(), body: PresetBody::VList { values } });
        }
    }

    for (label, body) in &dict {
        if body.is_object() {
            continue;
        }
        let items: Vec<&Cfg> = crate::cfg::list_iter(body, label)?.collect();
        let [pri, sec, coeff] = items.as_slice() else {
            return Err(Error::syntax(format!(
                "the dual preset '{label}' must be a [pri, sec, coeff] list"
            )));
        };
        let pri = crate::cfg::as_str(pri, "primary preset label")?;
        let sec = crate::cfg::as_str(sec, "secondary preset label")?;
        let coeff = crate::cfg::as_f64(coeff, "dual preset coefficient")?;

        for l in [&pri, &sec] {
            match presets.iter().find(|p| p.label == *l) {
                Some(NetworkPreset { body: PresetBody::VList { .. }, .. }) => {}
                _ => {
                    return Err(Error::not_found(format!(
                        "the dual preset '{label}' references '{l}' which is not a value-list preset"
                    )))
                }
            }
        }
        presets.push(NetworkPreset { label: label.clone(), body: PresetBody::Dual { pri, sec, coeff } });
    }

    Ok(presets)
}

fn parse_vlist(
    bctx: &mut BuildCtx,
    net_id: usize,
    preset_label: &str,
    body: &Cfg,
) -> Result<Vec<PresetValue>> {
    let mut values = Vec::new();

    for (proc_label, value_spec) in crate::cfg::dict_iter(body, preset_label)? {
        let ele = crate::stmt::parse_ele(proc_label, false)?;
        let base = ele.base_sfx_id.unwrap_or(BASE_SFX_ID);

        // a plain label addresses every instance of that name; `_sfx`
        // addresses one; an iterating label addresses a literal run
        let sfx_n = if ele.is_iter {
            match ele.sfx_id_count {
                Some(n) => n,
                None => proc_run_len(bctx.graph, net_id, &ele.label, base),
            }
        } else if ele.has_sfx {
            1
        } else {
            proc_run_len(bctx.graph, net_id, &ele.label, base)
        };
        if sfx_n == 0 {
            return Err(Error::not_found(format!(
                "the preset '{preset_label}' names the unknown proc '{proc_label}'"
            )));
        }

        for j in 0..sfx_n {
            let proc_sfx = base + j;
            let net = &bctx.graph.nets[net_id];
            if net.poly_n > 1 && proc_sfx != net.poly_idx {
                continue;
            }
            let Some(proc_idx) = network::proc_find(bctx.graph, net, &ele.label, proc_sfx) else {
                return Err(Error::not_found(format!(
                    "the preset '{preset_label}' names the unknown proc '{}:{proc_sfx}'",
                    ele.label
                )));
            };

            if let Some(ref_label) = value_spec.as_str() {
                // a label either references an inner-network preset (poly
                // and UDP holders) or a class/instance preset
                if let Some(inner) = bctx.graph.procs[proc_idx].internal_net {
                    let mut id = Some(inner);
                    while let Some(i) = id {
                        if !bctx.graph.nets[i].presets.iter().any(|p| p.label == ref_label) {
                            return Err(Error::not_found(format!(
                                "the inner network of '{}' has no preset '{ref_label}'",
                                ele.label
                            )));
                        }
                        values.push(PresetValue::NetRef { net: i, preset_label: ref_label.to_string() });
                        id = bctx.graph.nets[i].poly_link;
                    }
                    continue;
                }
                let var_dict = network::find_proc_preset(bctx, proc_idx, ref_label)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "the preset '{ref_label}' could not be found for proc '{}'",
                            bctx.graph.procs[proc_idx].ctx_label()
                        ))
                    })?;
                parse_vlist_var_dict(bctx, net_id, proc_idx, proc_sfx, &var_dict, &mut values)?;
            } else if value_spec.is_object() {
                parse_vlist_var_dict(bctx, net_id, proc_idx, proc_sfx, value_spec, &mut values)?;
            } else {
                return Err(Error::syntax(format!(
                    "the preset value for '{proc_label}' in '{preset_label}' must be a label or a dictionary"
                )));
            }
        }
    }
    Ok(values)
}

fn proc_run_len(graph: &Graph, net_id: usize, label: &str, base: u32) -> u32 {
    let net = &graph.nets[net_id];
    let mut n = 0;
    while network::proc_find(graph, net, label, base + n).is_some() {
        n += 1;
    }
    n
}

fn parse_vlist_var_dict(
    bctx: &mut BuildCtx,
    net_id: usize,
    proc_idx: usize,
    proc_sfx: u32,
    var_dict: &Cfg,
    values: &mut Vec<PresetValue>,
) -> Result<()> {
    for (var_label, val_cfg) in crate::cfg::dict_iter(var_dict, "preset vars")? {
        let ele = crate::stmt::parse_ele(var_label, false)?;
        let base = ele.base_sfx_id.unwrap_or(BASE_SFX_ID);
        let var_n = if ele.is_iter {
            match ele.sfx_id_count {
                Some(n) => n,
                None => var_run_len(bctx.graph, proc_idx, &ele.label, base),
            }
        } else {
            1
        };

        for m in 0..var_n {
            let var_sfx = base + m;
            push_value_records(
                bctx,
                net_id,
                proc_idx,
                proc_sfx,
                &ele.label,
                var_sfx,
                val_cfg,
                values,
            )?;
        }
    }
    Ok(())
}

fn var_run_len(graph: &Graph, proc_idx: usize, label: &str, base: u32) -> u32 {
    let mut n = 0;
    while graph.procs[proc_idx].find_var(label, base + n, None).is_some() {
        n += 1;
    }
    n
}

/// Append one record per addressed channel. A list value lands one record
/// on each successive channel; a scalar lands on the `any` instance.
fn push_value_records(
    bctx: &mut BuildCtx,
    net_id: usize,
    proc_idx: usize,
    proc_sfx: u32,
    var_label: &str,
    var_sfx: u32,
    val_cfg: &Cfg,
    values: &mut Vec<PresetValue>,
) -> Result<()> {
    // find-or-create makes channel children as needed so presets can
    // address channels the args never touched
    network::var_channelize(bctx.graph, bctx.classes, proc_idx, var_label, var_sfx, &Cfg::Null)?;

    let pair = bctx.graph.nets[net_id]
        .preset_pairs
        .index
        .get(&(proc_idx, var_label.to_string(), var_sfx))
        .copied();

    let is_cfg_var = {
        let proc = &bctx.graph.procs[proc_idx];
        let class = &bctx.classes.classes[proc.class_idx];
        class
            .var_desc(var_label)
            .map(|(_, d)| d.type_fl.contains(TypeFl::CFG))
            .unwrap_or(false)
    };

    if val_cfg.is_array() && !is_cfg_var {
        let elems = val_cfg.as_array().unwrap().clone();
        for (ch, ele_cfg) in elems.iter().enumerate() {
            let vi = ensure_channel_var(bctx, proc_idx, var_label, var_sfx, ch)?;
            values.push(PresetValue::Direct {
                addr: VarAddr { proc: proc_idx, var: vi },
                ch: Some(ch),
                value: value_from_cfg(ele_cfg)?,
                pair,
                proc_sfx,
            });
        }
    } else {
        let vi = bctx.graph.procs[proc_idx]
            .find_var(var_label, var_sfx, None)
            .expect("the any instance was just created");
        values.push(PresetValue::Direct {
            addr: VarAddr { proc: proc_idx, var: vi },
            ch: None,
            value: value_from_cfg(val_cfg)?,
            pair,
            proc_sfx,
        });
    }
    Ok(())
}

fn ensure_channel_var(
    bctx: &mut BuildCtx,
    proc_idx: usize,
    var_label: &str,
    var_sfx: u32,
    ch: usize,
) -> Result<usize> {
    if let Some(vi) = bctx.graph.procs[proc_idx].find_var(var_label, var_sfx, Some(ch)) {
        return Ok(vi);
    }
    // channelize with a null list long enough to create the channel
    let nulls = Cfg::Array(vec![Cfg::Null; ch + 1]);
    network::var_channelize(bctx.graph, bctx.classes, proc_idx, var_label, var_sfx, &nulls)?;
    bctx.graph.procs[proc_idx]
        .find_var(var_label, var_sfx, Some(ch))
        .ok_or_else(|| Error::op_fail(format!("could not create channel {ch} of '{var_label}'")))
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

fn find_preset(graph: &Graph, net_id: usize, label: &str) -> Result<NetworkPreset> {
    graph.nets[net_id]
        .presets
        .iter()
        .find(|p| p.label == label)
        .cloned()
        .ok_or_else(|| Error::not_found(format!("the network preset '{label}' was not found")))
}

/// Apply a named preset. `proc_sfx_filter` restricts application to procs
/// with a matching label suffix (the poly voice selector).
pub fn apply_network_preset(
    graph: &mut Graph,
    net_id: usize,
    label: &str,
    proc_sfx_filter: Option<u32>,
) -> Result<()> {
    let preset = find_preset(graph, net_id, label)?;
    match preset.body {
        PresetBody::VList { ref values } => apply_vlist(graph, values, proc_sfx_filter),
        PresetBody::Dual { ref pri, ref sec, coeff } => {
            apply_dual_preset(graph, net_id, pri, sec, coeff, proc_sfx_filter)
        }
    }
}

fn apply_vlist(
    graph: &mut Graph,
    values: &[PresetValue],
    proc_sfx_filter: Option<u32>,
) -> Result<()> {
    for v in values {
        match v {
            PresetValue::Direct { addr, value, proc_sfx, .. } => {
                if proc_sfx_filter.is_some_and(|f| f != *proc_sfx) {
                    continue;
                }
                network::var_set(graph, *addr, value.clone()).map_err(|e| {
                    let p = &graph.procs[addr.proc];
                    Error::op_fail(format!(
                        "preset value apply failed on '{}': {e}",
                        p.vars[addr.var].ctx_label(&p.label, p.label_sfx_id)
                    ))
                })?;
            }
            PresetValue::NetRef { net, preset_label } => {
                apply_network_preset(graph, *net, preset_label, proc_sfx_filter)?;
            }
        }
    }
    Ok(())
}

/// Apply `pri + coeff * (sec - pri)` for every variable present in either
/// preset. Non-numeric values fall through to the primary.
pub fn apply_dual_preset(
    graph: &mut Graph,
    net_id: usize,
    pri_label: &str,
    sec_label: &str,
    coeff: f64,
    proc_sfx_filter: Option<u32>,
) -> Result<()> {
    let pri = find_preset(graph, net_id, pri_label)?;
    let sec = find_preset(graph, net_id, sec_label)?;
    let (PresetBody::VList { values: pri_vals }, PresetBody::VList { values: sec_vals }) =
        (&pri.body, &sec.body)
    else {
        return Err(Error::invalid_arg(format!(
            "dual application requires value-list presets ('{pri_label}', '{sec_label}')"
        )));
    };

    // fill the pair table's value column from the secondary preset
    let mut sec_col: Vec<Option<Value>> = vec![None; graph.nets[net_id].preset_pairs.len()];
    for v in sec_vals {
        let PresetValue::Direct { ch, value, pair: Some((row0, n)), proc_sfx, .. } = v else {
            continue;
        };
        if proc_sfx_filter.is_some_and(|f| f != *proc_sfx) {
            continue;
        }
        match ch {
            Some(c) if *c + 1 < *n => sec_col[row0 + c + 1] = Some(value.clone()),
            Some(_) => {}
            None => {
                for r in *row0..row0 + n {
                    sec_col[r] = Some(value.clone());
                }
            }
        }
    }

    // walk the primary preset, interpolating where a secondary value lines up
    for v in pri_vals {
        match v {
            PresetValue::Direct { addr, ch, value, pair, proc_sfx } => {
                if proc_sfx_filter.is_some_and(|f| f != *proc_sfx) {
                    continue;
                }
                let rows: Vec<usize> = match (pair, ch) {
                    (Some((row0, n)), Some(c)) if *c + 1 < *n => vec![row0 + c + 1],
                    (Some((row0, n)), None) => (*row0..row0 + n).collect(),
                    _ => Vec::new(),
                };
                if rows.is_empty() {
                    // not in the pair table: primary value wins outright
                    network::var_set(graph, *addr, value.clone())?;
                    continue;
                }
                for row in rows {
                    let target = graph.nets[net_id].preset_pairs.rows[row].addr;
                    let out = match (&sec_col[row], value.is_numeric()) {
                        (Some(sv), true) if sv.is_numeric() => {
                            let v0 = value.as_f64()?;
                            let v1 = sv.as_f64()?;
                            Value::Double(v0 + (v1 - v0) * coeff)
                        }
                        _ => value.clone(),
                    };
                    network::var_set(graph, target, out)?;
                }
            }
            // a dual cannot blend network references; skipped by design
            PresetValue::NetRef { .. } => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Probabilistic multi-preset selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PresetOrder {
    pub preset_label: String,
    /// Integer rank used as a relative selection weight.
    pub order: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MultiPresetSel {
    pub pri_prob_fl: bool,
    pub sec_prob_fl: bool,
    pub interp_fl: bool,
    /// Interpolation coefficient inputs; the applied coefficient is the
    /// mean of the nonzero entries, clamped to [0,1].
    pub coeffs: Vec<f64>,
    pub presets: Vec<PresetOrder>,
}

/// Rank-weighted random selection. Integer ranks act as relative weights,
/// scaled by the product of all distinct ranks so the threshold math stays
/// in integers. `sel_mask`, when present, limits the candidate set.
fn select_ranked(
    presets: &[PresetOrder],
    sel_mask: Option<&[bool]>,
    rng: &mut impl Rng,
) -> Option<usize> {
    let idx_map: Vec<usize> = (0..presets.len())
        .filter(|&i| sel_mask.map_or(true, |m| m[i]))
        .collect();
    if idx_map.is_empty() {
        warn!("all preset candidates have been eliminated");
        return None;
    }
    if idx_map.len() == 1 {
        return Some(idx_map[0]);
    }

    let ranks: Vec<u64> = idx_map.iter().map(|&i| presets[i].order as u64).collect();
    let mut distinct: Vec<u64> = ranks.clone();
    distinct.sort_unstable();
    distinct.dedup();
    let prod: u64 = distinct.iter().filter(|&&r| r > 0).product::<u64>().max(1);

    let mut thresh = 0u64;
    let threshv: Vec<u64> = ranks
        .iter()
        .map(|r| {
            thresh += r * prod;
            thresh
        })
        .collect();
    if thresh == 0 {
        return Some(idx_map[idx_map.len() - 1]);
    }

    let draw = rng.gen_range(0..thresh);
    let mut t0 = 0u64;
    for (j, &t1) in threshv.iter().enumerate() {
        if t0 <= draw && draw < t1 {
            return Some(idx_map[j]);
        }
        t0 = t1;
    }
    Some(idx_map[idx_map.len() - 1])
}

/// The dual coefficient is the mean of the nonzero coefficients, clamped
/// to [0,1]; with no inputs it defaults to 0.5.
pub fn multi_preset_coeff(sel: &MultiPresetSel) -> f64 {
    if sel.coeffs.is_empty() {
        return 0.5;
    }
    let nonzero: Vec<f64> = sel.coeffs.iter().copied().filter(|c| *c != 0.0).collect();
    if nonzero.is_empty() {
        warn!("no usable coefficient for the multi-preset dual; using 0");
        return 0.0;
    }
    let mean = nonzero.iter().sum::<f64>() / sel.coeffs.len() as f64;
    mean.clamp(0.0, 1.0)
}

/// Select and apply a preset from a ranked candidate set, optionally as an
/// interpolated dual of the primary and secondary selections.
pub fn apply_multi_preset(
    graph: &mut Graph,
    net_id: usize,
    sel: &MultiPresetSel,
    proc_sfx_filter: Option<u32>,
    rng: &mut impl Rng,
) -> Result<()> {
    if sel.presets.is_empty() {
        return Err(Error::invalid_arg(
            "a multi-preset application was requested but no candidates were given".to_string(),
        ));
    }

    // single selection path
    if !sel.interp_fl || sel.presets.len() == 1 {
        let idx = if sel.presets.len() > 1 && sel.pri_prob_fl {
            select_ranked(&sel.presets, None, rng).unwrap_or(0)
        } else {
            0
        };
        return apply_network_preset(graph, net_id, &sel.presets[idx].preset_label, proc_sfx_filter);
    }

    // primary selection
    let pri_idx = if sel.pri_prob_fl {
        select_ranked(&sel.presets, None, rng).unwrap_or(0)
    } else {
        // among the candidates ranked 1
        let mask: Vec<bool> = sel.presets.iter().map(|p| p.order == 1).collect();
        select_ranked(&sel.presets, Some(&mask), rng).unwrap_or(0)
    };

    // secondary selection: the remaining candidate when only one is left
    let sec_idx = if sel.presets.len() == 2 {
        1 - pri_idx
    } else {
        let mut mask = vec![true; sel.presets.len()];
        mask[pri_idx] = false;
        if sel.sec_prob_fl {
            select_ranked(&sel.presets, Some(&mask), rng)
                .unwrap_or_else(|| if pri_idx == 0 { 1 } else { 0 })
        } else {
            (0..sel.presets.len()).find(|&i| i != pri_idx).unwrap_or(0)
        }
    };

    let coeff = multi_preset_coeff(sel);
    apply_dual_preset(
        graph,
        net_id,
        &sel.presets[pri_idx].preset_label,
        &sel.presets[sec_idx].preset_label,
        coeff,
        proc_sfx_filter,
    )
}

/// Parse a `{preset_label, order}` candidate list cfg:
/// `[ { preset: "a", order: 2 }, ... ]` or `{ a: 2, b: 1 }`.
pub fn parse_preset_order_list(cfg: &Cfg) -> Result<Vec<PresetOrder>> {
    let mut out = Vec::new();
    if cfg.is_array() {
        for ele in crate::cfg::list_iter(cfg, "preset order list")? {
            let label = crate::cfg::str_opt(ele, "preset")?
                .ok_or_else(|| Error::syntax("a preset order entry has no 'preset' label"))?;
            let order = crate::cfg::u32_opt(ele, "order")?.unwrap_or(1);
            out.push(PresetOrder { preset_label: label, order });
        }
    } else {
        for (label, order) in crate::cfg::dict_iter(cfg, "preset order dict")? {
            out.push(PresetOrder {
                preset_label: label.clone(),
                order: crate::cfg::as_u32(order, "order")?,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn orders(v: &[(&str, u32)]) -> Vec<PresetOrder> {
        v.iter()
            .map(|(l, o)| PresetOrder { preset_label: l.to_string(), order: *o })
            .collect()
    }

    #[test]
    fn test_select_ranked_respects_mask() {
        let mut rng = StdRng::seed_from_u64(7);
        let ps = orders(&[("a", 1), ("b", 1), ("c", 1)]);
        let mask = [false, true, false];
        for _ in 0..16 {
            assert_eq!(select_ranked(&ps, Some(&mask), &mut rng), Some(1));
        }
    }

    #[test]
    fn test_select_ranked_weights_follow_rank() {
        let mut rng = StdRng::seed_from_u64(11);
        let ps = orders(&[("a", 9), ("b", 1)]);
        let mut counts = [0usize; 2];
        for _ in 0..2000 {
            counts[select_ranked(&ps, None, &mut rng).unwrap()] += 1;
        }
        // 9:1 weights; allow generous slack
        assert!(counts[0] > counts[1] * 5, "counts: {counts:?}");
    }

    #[test]
    fn test_select_ranked_empty_mask_is_none() {
        let mut rng = StdRng::seed_from_u64(3);
        let ps = orders(&[("a", 1)]);
        assert_eq!(select_ranked(&ps, Some(&[false]), &mut rng), None);
    }

    #[test]
    fn test_multi_preset_coeff_mean_of_nonzero() {
        let mut sel = MultiPresetSel::default();
        sel.coeffs = vec![0.5, 0.0, 0.25];
        // nonzero sum 0.75 over coeffN 3
        assert!((multi_preset_coeff(&sel) - 0.25).abs() < 1e-12);

        sel.coeffs = vec![2.0];
        assert_eq!(multi_preset_coeff(&sel), 1.0); // clamped

        sel.coeffs.clear();
        assert_eq!(multi_preset_coeff(&sel), 0.5);
    }
}
