//! Helpers over the JSON cfg tree.
//!
//! The whole configuration surface (program, network, class dictionary,
//! presets) is one loosely-typed `serde_json::Value` tree. These helpers
//! give the rest of the engine typed reads with consistent error text, in
//! place of scattering `as_*`/`get` chains everywhere.

use serde_json::Value as Cfg;

use crate::error::{Error, Result};

/// Required child lookup on a dictionary node.
pub fn child<'a>(cfg: &'a Cfg, key: &str) -> Result<&'a Cfg> {
    cfg.get(key)
        .ok_or_else(|| Error::not_found(format!("cfg field '{key}' is missing")))
}

/// Optional child lookup. Returns `None` when the key is absent or the
/// node is not a dictionary.
pub fn child_opt<'a>(cfg: &'a Cfg, key: &str) -> Option<&'a Cfg> {
    cfg.get(key)
}

pub fn as_str(cfg: &Cfg, what: &str) -> Result<String> {
    cfg.as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::syntax(format!("'{what}' must be a string")))
}

pub fn as_bool(cfg: &Cfg, what: &str) -> Result<bool> {
    cfg.as_bool()
        .ok_or_else(|| Error::syntax(format!("'{what}' must be a bool")))
}

pub fn as_u32(cfg: &Cfg, what: &str) -> Result<u32> {
    cfg.as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| Error::syntax(format!("'{what}' must be an unsigned integer")))
}

pub fn as_usize(cfg: &Cfg, what: &str) -> Result<usize> {
    cfg.as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| Error::syntax(format!("'{what}' must be an unsigned integer")))
}

pub fn as_f64(cfg: &Cfg, what: &str) -> Result<f64> {
    cfg.as_f64()
        .ok_or_else(|| Error::syntax(format!("'{what}' must be a number")))
}

pub fn str_opt(cfg: &Cfg, key: &str) -> Result<Option<String>> {
    match cfg.get(key) {
        None => Ok(None),
        Some(v) => as_str(v, key).map(Some),
    }
}

pub fn bool_opt(cfg: &Cfg, key: &str) -> Result<Option<bool>> {
    match cfg.get(key) {
        None => Ok(None),
        Some(v) => as_bool(v, key).map(Some),
    }
}

pub fn u32_opt(cfg: &Cfg, key: &str) -> Result<Option<u32>> {
    match cfg.get(key) {
        None => Ok(None),
        Some(v) => as_u32(v, key).map(Some),
    }
}

pub fn usize_opt(cfg: &Cfg, key: &str) -> Result<Option<usize>> {
    match cfg.get(key) {
        None => Ok(None),
        Some(v) => as_usize(v, key).map(Some),
    }
}

pub fn f64_opt(cfg: &Cfg, key: &str) -> Result<Option<f64>> {
    match cfg.get(key) {
        None => Ok(None),
        Some(v) => as_f64(v, key).map(Some),
    }
}

/// Iterate the `(key, value)` pairs of a dictionary node, failing with
/// context when the node is not a dictionary.
pub fn dict_iter<'a>(
    cfg: &'a Cfg,
    what: &str,
) -> Result<impl Iterator<Item = (&'a String, &'a Cfg)>> {
    cfg.as_object()
        .map(|m| m.iter())
        .ok_or_else(|| Error::syntax(format!("'{what}' must be a dictionary")))
}

/// Iterate the elements of a list node.
pub fn list_iter<'a>(cfg: &'a Cfg, what: &str) -> Result<impl Iterator<Item = &'a Cfg>> {
    cfg.as_array()
        .map(|v| v.iter())
        .ok_or_else(|| Error::syntax(format!("'{what}' must be a list")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_reads() {
        let cfg = json!({ "a": 3, "b": "hi", "c": true, "d": 1.5 });

        assert_eq!(as_u32(child(&cfg, "a").unwrap(), "a").unwrap(), 3);
        assert_eq!(str_opt(&cfg, "b").unwrap().as_deref(), Some("hi"));
        assert_eq!(bool_opt(&cfg, "c").unwrap(), Some(true));
        assert_eq!(f64_opt(&cfg, "d").unwrap(), Some(1.5));
        assert!(str_opt(&cfg, "missing").unwrap().is_none());
    }

    #[test]
    fn test_wrong_type_is_syntax_error() {
        let cfg = json!({ "a": "not a number" });
        assert!(as_u32(child(&cfg, "a").unwrap(), "a").is_err());
    }

    #[test]
    fn test_missing_required_child() {
        let cfg = json!({});
        assert!(child(&cfg, "network").is_err());
    }
}
