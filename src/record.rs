//! Record types and records.
//!
//! A record type names a flat set of typed fields, optionally arranged in
//! groups addressed with dot paths (`loc.pitch`). A record is the matching
//! flat value array. Record types may inherit from a base type: field
//! indices are local to the derived type, and indices at or past the local
//! field count address the base chain.
//!
//! Cfg syntax:
//! `{ alloc_cnt:<n>, required:[ "field" ], fields:{ label:{ type:<>, value:<>, doc:<> } | { <group fields> } } }`

use crate::error::{Error, Result};
use crate::value::{value_from_cfg, TypeFl, Value};
use serde_json::Value as Cfg;
use std::rc::Rc;

/// One field (leaf or group) of a record type.
#[derive(Debug, Clone)]
pub struct RecordField {
    pub label: String,
    pub doc: String,
    /// Leaf: declared value type and flat value index. Group: nested fields.
    pub body: FieldBody,
}

#[derive(Debug, Clone)]
pub enum FieldBody {
    Leaf {
        type_fl: TypeFl,
        /// Index into the record's flat value array.
        index: usize,
        /// Default seeded into new records, already converted to `type_fl`.
        default: Option<Value>,
    },
    Group { fields: Vec<RecordField> },
}

#[derive(Debug, Clone, Default)]
pub struct RecordType {
    pub fields: Vec<RecordField>,
    /// Count of leaf values local to this type (excludes the base chain).
    pub field_n: usize,
    pub base: Option<Rc<RecordType>>,
}

impl RecordType {
    /// Parse a record type from the `fields` dictionary of a record fmt
    /// cfg. `base` supplies inherited fields addressed past `field_n`.
    pub fn from_cfg(fields_cfg: Option<&Cfg>, base: Option<Rc<RecordType>>) -> Result<Rc<Self>> {
        let mut rt = RecordType { fields: Vec::new(), field_n: 0, base };
        if let Some(cfg) = fields_cfg {
            let dict = cfg
                .as_object()
                .ok_or_else(|| Error::syntax("the record 'fields' node must be a dictionary"))?;
            let mut next_index = 0;
            for (label, field_cfg) in dict {
                let field = Self::parse_field(label, field_cfg, &mut next_index)?;
                rt.fields.push(field);
            }
            rt.field_n = next_index;
        }
        Ok(Rc::new(rt))
    }

    fn parse_field(label: &str, cfg: &Cfg, next_index: &mut usize) -> Result<RecordField> {
        if label.contains('.') {
            return Err(Error::syntax(format!(
                "the record field label '{label}' may not contain a '.'"
            )));
        }
        let dict = cfg.as_object().ok_or_else(|| {
            Error::syntax(format!("the record field '{label}' must be a dictionary"))
        })?;

        // A dictionary with a 'type' key is a leaf; anything else is a
        // group of nested fields.
        if let Some(type_cfg) = dict.get("type") {
            let type_label = type_cfg.as_str().ok_or_else(|| {
                Error::syntax(format!("the 'type' of record field '{label}' must be a string"))
            })?;
            let type_fl = TypeFl::from_label(type_label).ok_or_else(|| {
                Error::syntax(format!(
                    "unknown type '{type_label}' on record field '{label}'"
                ))
            })?;

            let default = match dict.get("value") {
                None => None,
                Some(v) => {
                    let val = value_from_cfg(v)?;
                    // Defaults must be representable in the declared type.
                    let conv = val.convert_to_mask(type_fl).map_err(|e| {
                        Error::type_mismatch(format!(
                            "the default of record field '{label}' does not fit its type: {e}"
                        ))
                    })?;
                    Some(conv)
                }
            };

            let doc = dict.get("doc").and_then(Cfg::as_str).unwrap_or("").to_string();
            let index = *next_index;
            *next_index += 1;
            Ok(RecordField {
                label: label.to_string(),
                doc,
                body: FieldBody::Leaf { type_fl, index, default },
            })
        } else {
            let mut fields = Vec::new();
            for (sub_label, sub_cfg) in dict {
                fields.push(Self::parse_field(sub_label, sub_cfg, next_index)?);
            }
            Ok(RecordField { label: label.to_string(), doc: String::new(), body: FieldBody::Group { fields } })
        }
    }

    /// Total leaf count including the base chain.
    pub fn total_field_n(&self) -> usize {
        self.field_n + self.base.as_ref().map_or(0, |b| b.total_field_n())
    }

    /// Resolve a dot path (`group.field`) to a flat field index. Local
    /// fields come first; base fields are offset by the local field count.
    pub fn field_index(&self, path: &str) -> Option<usize> {
        if let Some(idx) = Self::find_in(&self.fields, path) {
            return Some(idx);
        }
        self.base.as_ref().and_then(|b| b.field_index(path)).map(|i| self.field_n + i)
    }

    fn find_in(fields: &[RecordField], path: &str) -> Option<usize> {
        let (head, rest) = match path.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (path, None),
        };
        for f in fields {
            if f.label != head {
                continue;
            }
            return match (&f.body, rest) {
                (FieldBody::Leaf { index, .. }, None) => Some(*index),
                (FieldBody::Group { fields }, Some(rest)) => Self::find_in(fields, rest),
                _ => None,
            };
        }
        None
    }

    /// Reverse lookup: field index to dot-path label.
    pub fn field_label(&self, index: usize) -> Option<String> {
        if index >= self.field_n {
            return self.base.as_ref().and_then(|b| b.field_label(index - self.field_n));
        }
        Self::label_in(&self.fields, index, "")
    }

    fn label_in(fields: &[RecordField], index: usize, prefix: &str) -> Option<String> {
        for f in fields {
            match &f.body {
                FieldBody::Leaf { index: i, .. } if *i == index => {
                    return Some(if prefix.is_empty() {
                        f.label.clone()
                    } else {
                        format!("{prefix}.{}", f.label)
                    });
                }
                FieldBody::Group { fields: sub } => {
                    let p = if prefix.is_empty() {
                        f.label.clone()
                    } else {
                        format!("{prefix}.{}", f.label)
                    };
                    if let Some(s) = Self::label_in(sub, index, &p) {
                        return Some(s);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn leaf_by_index(&self, index: usize) -> Option<&RecordField> {
        fn walk<'a>(fields: &'a [RecordField], index: usize) -> Option<&'a RecordField> {
            for f in fields {
                match &f.body {
                    FieldBody::Leaf { index: i, .. } if *i == index => return Some(f),
                    FieldBody::Group { fields: sub } => {
                        if let Some(f) = walk(sub, index) {
                            return Some(f);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        walk(&self.fields, index)
    }

    /// Two types are equivalent when they agree on field labels, indices
    /// and leaf types, so records can be exchanged without rearranging the
    /// value arrays.
    pub fn is_equivalent(&self, other: &RecordType) -> bool {
        if self.field_n != other.field_n {
            return false;
        }
        for i in 0..self.field_n {
            match (self.leaf_by_index(i), other.leaf_by_index(i)) {
                (Some(a), Some(b)) => {
                    let (FieldBody::Leaf { type_fl: ta, .. }, FieldBody::Leaf { type_fl: tb, .. }) =
                        (&a.body, &b.body)
                    else {
                        return false;
                    };
                    if a.label != b.label || ta != tb {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        match (&self.base, &other.base) {
            (None, None) => true,
            (Some(a), Some(b)) => a.is_equivalent(b),
            _ => false,
        }
    }
}

/// A record: the flat local value array plus the inherited base record.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub vals: Vec<Value>,
    pub base: Option<Rc<Record>>,
}

impl Record {
    /// New record with defaults applied for every local field that has one.
    pub fn init(rtype: &RecordType, base: Option<Rc<Record>>) -> Self {
        let mut vals = vec![Value::Null; rtype.field_n];
        fn seed(fields: &[RecordField], vals: &mut [Value]) {
            for f in fields {
                match &f.body {
                    FieldBody::Leaf { index, default: Some(d), .. } => vals[*index] = d.clone(),
                    FieldBody::Group { fields } => seed(fields, vals),
                    _ => {}
                }
            }
        }
        seed(&rtype.fields, &mut vals);
        Self { vals, base }
    }

    /// Read a field value, walking the base chain for indices past the
    /// local field count.
    pub fn get<'a>(&'a self, rtype: &RecordType, index: usize) -> Result<&'a Value> {
        if index < rtype.field_n {
            return self
                .vals
                .get(index)
                .ok_or_else(|| Error::invalid_arg(format!("record field index {index} out of range")));
        }
        match (&self.base, &rtype.base) {
            (Some(recd), Some(rt)) => recd.get(rt, index - rtype.field_n),
            _ => Err(Error::invalid_arg(format!(
                "record field index {index} addresses a base record that is not present"
            ))),
        }
    }

    /// Set a local field. Fields of the inherited base record may not be
    /// written through a derived record.
    pub fn set(&mut self, rtype: &RecordType, index: usize, v: Value) -> Result<()> {
        if index >= rtype.field_n {
            return Err(Error::invalid_arg(
                "only local record fields may be set".to_string(),
            ));
        }
        self.vals[index] = v;
        Ok(())
    }
}

/// The record format spec attached to a record-typed variable desc:
/// preallocation count, required field labels, and the record type.
#[derive(Debug, Clone)]
pub struct RecordFmt {
    pub alloc_n: usize,
    pub required: Vec<String>,
    pub rtype: Rc<RecordType>,
}

impl RecordFmt {
    pub fn from_cfg(cfg: &Cfg, base: Option<Rc<RecordType>>) -> Result<Self> {
        let alloc_n = crate::cfg::usize_opt(cfg, "alloc_cnt")?.unwrap_or(32);
        let mut required = Vec::new();
        if let Some(req) = cfg.get("required") {
            for r in crate::cfg::list_iter(req, "required")? {
                required.push(crate::cfg::as_str(r, "required field label")?);
            }
        }
        let rtype = RecordType::from_cfg(cfg.get("fields"), base)?;
        Ok(Self { alloc_n, required, rtype })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pitch_type() -> Rc<RecordType> {
        RecordType::from_cfg(
            Some(&json!({
                "pitch": { "type": "uint", "value": 60, "doc": "MIDI pitch" },
                "vel":   { "type": "uint", "value": 64 },
                "loc": {
                    "beat": { "type": "double" },
                    "bar":  { "type": "uint" }
                }
            })),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_flat_indexing_and_dot_paths() {
        let rt = pitch_type();
        assert_eq!(rt.field_n, 4);
        assert_eq!(rt.field_index("pitch"), Some(0));
        assert_eq!(rt.field_index("loc.beat"), Some(2));
        assert_eq!(rt.field_index("loc.bar"), Some(3));
        assert_eq!(rt.field_index("loc"), None);
        assert_eq!(rt.field_index("nope"), None);
        assert_eq!(rt.field_label(2).as_deref(), Some("loc.beat"));
    }

    #[test]
    fn test_dot_in_field_label_rejected() {
        let r = RecordType::from_cfg(
            Some(&json!({ "a.b": { "type": "uint" } })),
            None,
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_defaults_must_fit_declared_type() {
        let r = RecordType::from_cfg(
            Some(&json!({ "x": { "type": "uint", "value": -1 } })),
            None,
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_base_chain_offsets() {
        let base = pitch_type();
        let derived = RecordType::from_cfg(
            Some(&json!({ "score_idx": { "type": "uint", "value": 0 } })),
            Some(Rc::clone(&base)),
        )
        .unwrap();

        assert_eq!(derived.total_field_n(), 5);
        assert_eq!(derived.field_index("score_idx"), Some(0));
        // base fields are shifted past the local field count
        assert_eq!(derived.field_index("pitch"), Some(1));
        assert_eq!(derived.field_index("loc.bar"), Some(4));

        let base_recd = Rc::new(Record::init(&base, None));
        let recd = Record::init(&derived, Some(Rc::clone(&base_recd)));
        let v = recd.get(&derived, 1).unwrap();
        assert_eq!(v.as_u32().unwrap(), 60); // base default

        let mut recd = recd;
        assert!(recd.set(&derived, 1, Value::UInt(61)).is_err()); // base fields read-only
        recd.set(&derived, 0, Value::UInt(7)).unwrap();
        assert_eq!(recd.get(&derived, 0).unwrap().as_u32().unwrap(), 7);
    }

    #[test]
    fn test_equivalence() {
        let a = pitch_type();
        let b = pitch_type();
        assert!(a.is_equivalent(&b));
        let c = RecordType::from_cfg(Some(&json!({ "pitch": { "type": "double" } })), None).unwrap();
        assert!(!a.is_equivalent(&c));
    }
}
