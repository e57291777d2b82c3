//! Proc class descriptors and the class dictionary.
//!
//! A class bundles its variable descriptors, class-level presets, a
//! polyphony instantiation limit and the lifecycle implementation
//! constructor. The dictionary is built once at startup from the built-in
//! class cfg plus any user-defined-proc (UDP) dictionary, and never
//! changes afterwards.

use crate::error::{Error, Result};
use crate::proc::ProcImpl;
use crate::value::TypeFl;
use crate::var::VarFlags;
use serde_json::Value as Cfg;
use std::rc::Rc;

/// Constructs the class-specific state for one proc instance.
pub type ProcCtor = Rc<dyn Fn() -> Box<dyn ProcImpl>>;

/// Class variable descriptor: the shared immutable template variables are
/// stamped from.
#[derive(Clone)]
pub struct VarDesc {
    pub label: String,
    pub doc: String,
    pub type_fl: TypeFl,
    /// Default value cfg node.
    pub val_cfg: Option<Rc<Cfg>>,
    /// Record format spec for record-typed vars: either an inline fmt
    /// dictionary or a string naming an entry in the network's record
    /// registry (resolved at proc-create time).
    pub fmt_cfg: Option<Rc<Cfg>>,
    pub flags: VarFlags,
    /// UDP variables proxy an inner `proc.var`.
    pub proxy: Option<(String, String)>,
    /// Label of the sibling variable whose channel count dictates this
    /// variable's iteration count in arg statements.
    pub mult_ref: Option<String>,
    /// Required record fields on an input-side record variable.
    pub required_fields: Vec<String>,
}

#[derive(Clone)]
pub struct ClassPreset {
    pub label: String,
    pub cfg: Rc<Cfg>,
}

pub struct ClassDesc {
    pub label: String,
    pub var_descs: Vec<VarDesc>,
    pub presets: Vec<ClassPreset>,
    /// Max instances of this class per network; 0 = unlimited.
    pub poly_limit_n: usize,
    /// UDP classes wrap an inner network description.
    pub udp_network: Option<Rc<Cfg>>,
    pub ctor: ProcCtor,
}

impl ClassDesc {
    pub fn var_desc(&self, label: &str) -> Option<(usize, &VarDesc)> {
        self.var_descs.iter().enumerate().find(|(_, d)| d.label == label)
    }

    pub fn preset(&self, label: &str) -> Option<&ClassPreset> {
        self.presets.iter().find(|p| p.label == label)
    }

    pub fn is_udp(&self) -> bool {
        self.udp_network.is_some()
    }
}

pub struct ClassDict {
    pub classes: Vec<ClassDesc>,
}

impl ClassDict {
    /// Build the dictionary from the class cfg and an optional UDP cfg.
    /// `ctor_for` maps class labels to their lifecycle constructors;
    /// `udp_ctor` builds the wrapper state shared by all UDP classes.
    pub fn from_cfg(
        class_cfg: &Cfg,
        udp_cfg: Option<&Cfg>,
        ctor_for: &dyn Fn(&str) -> Option<ProcCtor>,
        udp_ctor: ProcCtor,
    ) -> Result<Self> {
        let mut classes = Vec::new();

        for (label, cdef) in crate::cfg::dict_iter(class_cfg, "class dictionary")? {
            let ctor = ctor_for(label).ok_or_else(|| {
                Error::not_found(format!(
                    "the class '{label}' has no registered lifecycle implementation"
                ))
            })?;
            classes.push(Self::parse_class(label, cdef, None, ctor)?);
        }

        if let Some(udp_cfg) = udp_cfg {
            for (label, cdef) in crate::cfg::dict_iter(udp_cfg, "UDP dictionary")? {
                if classes.iter().any(|c| c.label == *label) {
                    return Err(Error::invalid_arg(format!(
                        "the UDP class '{label}' collides with an existing class"
                    )));
                }
                let net = crate::cfg::child(cdef, "network").map_err(|_| {
                    Error::syntax(format!("the UDP class '{label}' has no 'network' field"))
                })?;
                classes.push(Self::parse_class(
                    label,
                    cdef,
                    Some(Rc::new(net.clone())),
                    Rc::clone(&udp_ctor),
                )?);
            }
        }

        Ok(Self { classes })
    }

    fn parse_class(
        label: &str,
        cdef: &Cfg,
        udp_network: Option<Rc<Cfg>>,
        ctor: ProcCtor,
    ) -> Result<ClassDesc> {
        let is_udp = udp_network.is_some();
        let mut var_descs = Vec::new();

        if let Some(vars) = crate::cfg::child_opt(cdef, "vars") {
            for (var_label, vdef) in crate::cfg::dict_iter(vars, "vars")? {
                let vd = parse_var_desc(label, var_label, vdef)?;

                // proxy and UDP-out wiring only make sense on UDP classes
                if !is_udp {
                    if vd.proxy.is_some() {
                        return Err(Error::syntax(format!(
                            "the variable '{label}.{var_label}' declares a proxy outside a UDP class"
                        )));
                    }
                    if vd.flags.has(VarFlags::OUT) {
                        return Err(Error::syntax(format!(
                            "the variable '{label}.{var_label}' uses the 'out' flag outside a UDP class"
                        )));
                    }
                } else if vd.proxy.is_none() {
                    return Err(Error::syntax(format!(
                        "the UDP variable '{label}.{var_label}' has no proxy"
                    )));
                }

                var_descs.push(vd);
            }
        }

        let presets = parse_class_presets(crate::cfg::child_opt(cdef, "presets"))?;
        let poly_limit_n = crate::cfg::usize_opt(cdef, "poly_limit_cnt")?.unwrap_or(0);

        Ok(ClassDesc {
            label: label.to_string(),
            var_descs,
            presets,
            poly_limit_n,
            udp_network,
            ctor,
        })
    }

    pub fn find(&self, label: &str) -> Option<(usize, &ClassDesc)> {
        self.classes.iter().enumerate().find(|(_, c)| c.label == label)
    }

    /// Dump the dictionary to the log, one class per line.
    pub fn print(&self) {
        for c in &self.classes {
            let vars = c
                .var_descs
                .iter()
                .map(|d| format!("{}:{}", d.label, d.type_fl))
                .collect::<Vec<String>>()
                .join(" ");
            tracing::info!(
                "class {} udp:{} poly_limit:{} vars: {vars}",
                c.label,
                c.is_udp(),
                c.poly_limit_n
            );
        }
    }
}

fn parse_var_desc(class_label: &str, var_label: &str, vdef: &Cfg) -> Result<VarDesc> {
    if !vdef.is_object() {
        return Err(Error::syntax(format!(
            "the variable description '{class_label}.{var_label}' must be a dictionary"
        )));
    }

    let mut type_fl = TypeFl::ALL;
    if let Some(type_str) = crate::cfg::str_opt(vdef, "type")? {
        type_fl = TypeFl::from_label(&type_str).ok_or_else(|| {
            Error::syntax(format!(
                "unknown type '{type_str}' on variable '{class_label}.{var_label}'"
            ))
        })?;
    }

    let mut flags = VarFlags::NONE;
    if let Some(flags_cfg) = crate::cfg::child_opt(vdef, "flags") {
        for f in crate::cfg::list_iter(flags_cfg, "flags")? {
            let fl_label = crate::cfg::as_str(f, "flag")?;
            if fl_label == "runtime" {
                type_fl = type_fl.union(TypeFl::RUNTIME);
                continue;
            }
            let fl = VarFlags::from_label(&fl_label).ok_or_else(|| {
                Error::syntax(format!(
                    "unknown flag '{fl_label}' on variable '{class_label}.{var_label}'"
                ))
            })?;
            flags.set(fl);
        }
    }

    let proxy = match crate::cfg::str_opt(vdef, "proxy")? {
        None => None,
        Some(p) => {
            let (proc_part, var_part) = p.split_once('.').ok_or_else(|| {
                Error::syntax(format!(
                    "the proxy '{p}' on '{class_label}.{var_label}' must have the form proc.var"
                ))
            })?;
            if proc_part.is_empty() || var_part.is_empty() {
                return Err(Error::syntax(format!(
                    "the proxy '{p}' on '{class_label}.{var_label}' must name both a proc and a var"
                )));
            }
            Some((proc_part.to_string(), var_part.to_string()))
        }
    };

    let mut required_fields = Vec::new();
    if let Some(req) = crate::cfg::child_opt(vdef, "required_fields") {
        for r in crate::cfg::list_iter(req, "required_fields")? {
            required_fields.push(crate::cfg::as_str(r, "required field")?);
        }
    }

    Ok(VarDesc {
        label: var_label.to_string(),
        doc: crate::cfg::str_opt(vdef, "doc")?.unwrap_or_default(),
        type_fl,
        val_cfg: vdef.get("value").map(|v| Rc::new(v.clone())),
        fmt_cfg: vdef.get("fmt").map(|v| Rc::new(v.clone())),
        flags,
        proxy,
        mult_ref: crate::cfg::str_opt(vdef, "mult_ref")?,
        required_fields,
    })
}

fn parse_class_presets(presets_cfg: Option<&Cfg>) -> Result<Vec<ClassPreset>> {
    let mut presets = Vec::new();
    if let Some(cfg) = presets_cfg {
        for (label, pdef) in crate::cfg::dict_iter(cfg, "presets")? {
            if !pdef.is_object() {
                return Err(Error::syntax(format!(
                    "the class preset '{label}' must be a dictionary"
                )));
            }
            presets.push(ClassPreset { label: label.clone(), cfg: Rc::new(pdef.clone()) });
        }
    }
    Ok(presets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::{ExecState, ProcCtx};
    use serde_json::json;

    struct NullImpl;
    impl ProcImpl for NullImpl {
        fn exec(&mut self, _ctx: &mut ProcCtx) -> Result<ExecState> {
            Ok(ExecState::Continue)
        }
    }

    fn null_ctor() -> ProcCtor {
        Rc::new(|| Box::new(NullImpl))
    }

    fn lookup(known: &'static [&'static str]) -> impl Fn(&str) -> Option<ProcCtor> {
        move |label| known.contains(&label).then(null_ctor)
    }

    #[test]
    fn test_class_parse_basics() {
        let cfg = json!({
            "sine_tone": {
                "vars": {
                    "freq": { "type": "number", "value": 440.0, "doc": "tone frequency" },
                    "out":  { "type": "audio", "flags": ["notify"] }
                },
                "presets": { "low": { "freq": 110.0 } },
                "poly_limit_cnt": 4
            }
        });
        let dict =
            ClassDict::from_cfg(&cfg, None, &lookup(&["sine_tone"]), null_ctor()).unwrap();
        let (_, c) = dict.find("sine_tone").unwrap();
        assert_eq!(c.var_descs.len(), 2);
        assert_eq!(c.poly_limit_n, 4);
        assert!(c.preset("low").is_some());
        let (vid, freq) = c.var_desc("freq").unwrap();
        assert_eq!(vid, 0);
        assert_eq!(freq.type_fl, TypeFl::NUMERIC);
        let (_, out) = c.var_desc("out").unwrap();
        assert!(out.flags.has(VarFlags::NOTIFY));
    }

    #[test]
    fn test_unknown_class_fails_loudly() {
        let cfg = json!({ "mystery": { "vars": {} } });
        assert!(ClassDict::from_cfg(&cfg, None, &lookup(&[]), null_ctor()).is_err());
    }

    #[test]
    fn test_proxy_outside_udp_rejected() {
        let cfg = json!({
            "plain": { "vars": { "x": { "type": "number", "proxy": "a.b" } } }
        });
        assert!(ClassDict::from_cfg(&cfg, None, &lookup(&["plain"]), null_ctor()).is_err());
    }

    #[test]
    fn test_out_flag_outside_udp_rejected() {
        let cfg = json!({
            "plain": { "vars": { "x": { "type": "number", "flags": ["out"] } } }
        });
        assert!(ClassDict::from_cfg(&cfg, None, &lookup(&["plain"]), null_ctor()).is_err());
    }

    #[test]
    fn test_udp_class_requires_network_and_proxies() {
        let class_cfg = json!({});
        let udp_cfg = json!({
            "stereo_fx": {
                "network": { "procs": {} },
                "vars": { "in": { "type": "audio", "proxy": "g.in" } }
            }
        });
        let dict =
            ClassDict::from_cfg(&class_cfg, Some(&udp_cfg), &lookup(&[]), null_ctor()).unwrap();
        let (_, c) = dict.find("stereo_fx").unwrap();
        assert!(c.is_udp());
        assert_eq!(c.var_descs[0].proxy.as_ref().unwrap().0, "g");

        let bad = json!({ "bad": { "vars": {} } });
        assert!(
            ClassDict::from_cfg(&class_cfg, Some(&bad), &lookup(&[]), null_ctor()).is_err()
        );
    }
}
