//! Tagged value container and the type-flag bitset.
//!
//! Every variable slot holds a [`Value`]. Scalars behave by value; strings
//! own their storage; buffers are shared `Rc<RefCell<..>>` handles owned by
//! the producing proc. Multiple type bits may be set on a variable's
//! declared type ("runtime-typed" variables accept several); a concrete
//! value always carries exactly one bit.

use crate::buffer::{AudioBuf, MidiBuf, RecordBuf, SpectralBuf};
use crate::error::{Error, Result};
use crate::midi::ChMsg;
use serde_json::Value as Cfg;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Type-flag bitset. `can_convert(src, dst)` holds when all of `src`'s
/// bits are inside `dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeFl(pub u32);

impl TypeFl {
    pub const INVALID: TypeFl = TypeFl(0);
    pub const BOOL: TypeFl = TypeFl(0x0001);
    pub const UINT: TypeFl = TypeFl(0x0002);
    pub const INT: TypeFl = TypeFl(0x0004);
    pub const FLOAT: TypeFl = TypeFl(0x0008);
    pub const DOUBLE: TypeFl = TypeFl(0x0010);
    pub const ABUF: TypeFl = TypeFl(0x0020);
    pub const FBUF: TypeFl = TypeFl(0x0040);
    pub const MBUF: TypeFl = TypeFl(0x0080);
    pub const RBUF: TypeFl = TypeFl(0x0100);
    pub const STRING: TypeFl = TypeFl(0x0200);
    pub const CFG: TypeFl = TypeFl(0x0400);
    pub const MIDI: TypeFl = TypeFl(0x0800);

    pub const NUMERIC: TypeFl =
        TypeFl(Self::BOOL.0 | Self::UINT.0 | Self::INT.0 | Self::FLOAT.0 | Self::DOUBLE.0);
    pub const ALL: TypeFl = TypeFl(0x0fff);

    /// The value type of a variable marked `runtime` is fixed by the proc
    /// during its create callback rather than by the class dictionary.
    pub const RUNTIME: TypeFl = TypeFl(0x8000_0000);

    pub fn contains(self, other: TypeFl) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TypeFl) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: TypeFl) -> TypeFl {
        TypeFl(self.0 | other.0)
    }

    pub fn mask(self) -> TypeFl {
        TypeFl(self.0 & Self::ALL.0)
    }

    pub fn is_runtime(self) -> bool {
        self.intersects(Self::RUNTIME)
    }

    pub fn is_numeric(self) -> bool {
        Self::NUMERIC.intersects(self) && Self::NUMERIC.contains(self.mask())
    }

    /// If all of `src`'s bits are inside `dst` the types are convertible.
    pub fn can_convert(src: TypeFl, dst: TypeFl) -> bool {
        dst.contains(src.mask())
    }

    pub fn from_label(s: &str) -> Option<TypeFl> {
        Some(match s {
            "bool" => Self::BOOL,
            "uint" => Self::UINT,
            "int" => Self::INT,
            "float" => Self::FLOAT,
            "double" => Self::DOUBLE,
            "audio" => Self::ABUF,
            "spectrum" => Self::FBUF,
            "midi_buf" => Self::MBUF,
            "record" => Self::RBUF,
            "string" => Self::STRING,
            "cfg" => Self::CFG,
            "midi" => Self::MIDI,
            "number" => Self::NUMERIC,
            "all" => Self::ALL,
            "runtime" => Self::RUNTIME,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BOOL => "bool",
            Self::UINT => "uint",
            Self::INT => "int",
            Self::FLOAT => "float",
            Self::DOUBLE => "double",
            Self::ABUF => "audio",
            Self::FBUF => "spectrum",
            Self::MBUF => "midi_buf",
            Self::RBUF => "record",
            Self::STRING => "string",
            Self::CFG => "cfg",
            Self::MIDI => "midi",
            _ => "<multi>",
        }
    }
}

impl fmt::Display for TypeFl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The tagged value union.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    UInt(u32),
    Int(i32),
    Float(f32),
    Double(f64),
    Str(String),
    /// A borrowed cfg node. The engine owns the program tree; values hold
    /// a shared handle on the relevant subtree.
    Cfg(Rc<Cfg>),
    Midi(ChMsg),
    ABuf(Rc<RefCell<AudioBuf>>),
    FBuf(Rc<RefCell<SpectralBuf>>),
    MBuf(Rc<RefCell<MidiBuf>>),
    RBuf(Rc<RefCell<RecordBuf>>),
}

impl Value {
    pub fn type_fl(&self) -> TypeFl {
        match self {
            Value::Null => TypeFl::INVALID,
            Value::Bool(_) => TypeFl::BOOL,
            Value::UInt(_) => TypeFl::UINT,
            Value::Int(_) => TypeFl::INT,
            Value::Float(_) => TypeFl::FLOAT,
            Value::Double(_) => TypeFl::DOUBLE,
            Value::Str(_) => TypeFl::STRING,
            Value::Cfg(_) => TypeFl::CFG,
            Value::Midi(_) => TypeFl::MIDI,
            Value::ABuf(_) => TypeFl::ABUF,
            Value::FBuf(_) => TypeFl::FBUF,
            Value::MBuf(_) => TypeFl::MBUF,
            Value::RBuf(_) => TypeFl::RBUF,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        self.type_fl().is_numeric()
    }

    /// Buffer and cfg values contain zero or more elements; scalars do not
    /// support the notion at all.
    pub fn supports_ele_count(&self) -> bool {
        matches!(
            self,
            Value::ABuf(_) | Value::FBuf(_) | Value::MBuf(_) | Value::RBuf(_) | Value::Cfg(_)
        )
    }

    /// True when the value supports elements and currently has a nonzero
    /// element count. Drives buffer-type change notification.
    pub fn has_elements_now(&self) -> bool {
        match self {
            Value::ABuf(b) => {
                let b = b.borrow();
                b.ch_n > 0 && b.frame_n > 0
            }
            Value::FBuf(b) => b.borrow().chans.iter().any(|c| c.bin_n > 0),
            Value::MBuf(b) => !b.borrow().msgs.is_empty(),
            Value::RBuf(b) => !b.borrow().recds.is_empty(),
            Value::Cfg(c) => !c.is_null(),
            _ => false,
        }
    }

    /// True when a change to this value can notify the owning proc without
    /// help. MIDI and record windows are refilled in place by their
    /// producers, so their owners list them for manual notification.
    pub fn can_auto_notify(&self) -> bool {
        !matches!(self, Value::MBuf(_) | Value::RBuf(_))
    }

    /// Scalar equality used for edge-triggered change notification.
    /// Buffer values always compare unequal so every producer update is
    /// propagated.
    pub fn eq_scalar(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Midi(a), Value::Midi(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        Ok(match self {
            Value::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Value::UInt(v) => *v as f64,
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v as f64,
            Value::Double(v) => *v,
            _ => {
                return Err(Error::type_mismatch(format!(
                    "cannot read a {} value as a number",
                    self.type_fl()
                )))
            }
        })
    }

    pub fn as_f32(&self) -> Result<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            _ => self.as_f64().map(|v| v != 0.0),
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match self {
            Value::UInt(v) => Ok(*v),
            Value::Int(v) if *v >= 0 => Ok(*v as u32),
            Value::Int(v) => Err(Error::type_mismatch(format!(
                "the negative value {v} cannot be read as unsigned"
            ))),
            Value::Bool(v) => Ok(*v as u32),
            Value::Float(v) if *v >= 0.0 => Ok(*v as u32),
            Value::Double(v) if *v >= 0.0 => Ok(*v as u32),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as unsigned",
                self.type_fl()
            ))),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) if *v <= i32::MAX as u32 => Ok(*v as i32),
            Value::UInt(v) => Err(Error::type_mismatch(format!(
                "the value {v} overflows a signed integer"
            ))),
            Value::Bool(v) => Ok(*v as i32),
            Value::Float(v) => Ok(*v as i32),
            Value::Double(v) => Ok(*v as i32),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as an integer",
                self.type_fl()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as a string",
                self.type_fl()
            ))),
        }
    }

    pub fn as_abuf(&self) -> Result<Rc<RefCell<AudioBuf>>> {
        match self {
            Value::ABuf(b) => Ok(Rc::clone(b)),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as an audio buffer",
                self.type_fl()
            ))),
        }
    }

    pub fn as_fbuf(&self) -> Result<Rc<RefCell<SpectralBuf>>> {
        match self {
            Value::FBuf(b) => Ok(Rc::clone(b)),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as a spectral buffer",
                self.type_fl()
            ))),
        }
    }

    pub fn as_mbuf(&self) -> Result<Rc<RefCell<MidiBuf>>> {
        match self {
            Value::MBuf(b) => Ok(Rc::clone(b)),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as a MIDI buffer",
                self.type_fl()
            ))),
        }
    }

    pub fn as_rbuf(&self) -> Result<Rc<RefCell<RecordBuf>>> {
        match self {
            Value::RBuf(b) => Ok(Rc::clone(b)),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as a record buffer",
                self.type_fl()
            ))),
        }
    }

    pub fn as_cfg(&self) -> Result<Rc<Cfg>> {
        match self {
            Value::Cfg(c) => Ok(Rc::clone(c)),
            _ => Err(Error::type_mismatch(format!(
                "cannot read a {} value as a cfg node",
                self.type_fl()
            ))),
        }
    }

    /// Convert into a type allowed by `mask`. A value already inside the
    /// mask is kept as-is; otherwise the first declared type that can
    /// represent it wins (bool last, since it is the lossiest).
    pub fn convert_to_mask(&self, mask: TypeFl) -> Result<Value> {
        if mask.contains(self.type_fl()) {
            return Ok(self.clone());
        }
        for fl in [
            TypeFl::UINT,
            TypeFl::INT,
            TypeFl::FLOAT,
            TypeFl::DOUBLE,
            TypeFl::STRING,
            TypeFl::BOOL,
            TypeFl::ABUF,
            TypeFl::FBUF,
            TypeFl::MBUF,
            TypeFl::RBUF,
            TypeFl::CFG,
            TypeFl::MIDI,
        ] {
            if mask.contains(fl) {
                if let Ok(v) = self.convert_to(fl) {
                    return Ok(v);
                }
            }
        }
        Err(Error::type_mismatch(format!(
            "a {} value cannot be represented in the declared type",
            self.type_fl()
        )))
    }

    /// Convert `self` into the single concrete type `dst_fl`. Fails when
    /// the value cannot be represented in the destination type.
    pub fn convert_to(&self, dst_fl: TypeFl) -> Result<Value> {
        if self.type_fl() == dst_fl {
            return Ok(self.clone());
        }
        Ok(match dst_fl {
            TypeFl::BOOL => Value::Bool(self.as_bool()?),
            TypeFl::UINT => Value::UInt(self.as_u32()?),
            TypeFl::INT => Value::Int(self.as_i32()?),
            TypeFl::FLOAT => Value::Float(self.as_f32()?),
            TypeFl::DOUBLE => Value::Double(self.as_f64()?),
            TypeFl::STRING => Value::Str(self.as_str()?.to_string()),
            TypeFl::ABUF => Value::ABuf(self.as_abuf()?),
            TypeFl::FBUF => Value::FBuf(self.as_fbuf()?),
            TypeFl::MBUF => Value::MBuf(self.as_mbuf()?),
            TypeFl::RBUF => Value::RBuf(self.as_rbuf()?),
            TypeFl::CFG => Value::Cfg(self.as_cfg()?),
            TypeFl::MIDI => match self {
                Value::Midi(m) => Value::Midi(*m),
                _ => {
                    return Err(Error::type_mismatch(format!(
                        "cannot convert {} to midi",
                        self.type_fl()
                    )))
                }
            },
            _ => {
                return Err(Error::type_mismatch(format!(
                    "cannot convert {} to {}",
                    self.type_fl(),
                    dst_fl
                )))
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<null>"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Cfg(v) => write!(f, "{v}"),
            Value::Midi(m) => write!(f, "midi({:02x} ch:{} {} {})", m.status, m.ch, m.d0, m.d1),
            Value::ABuf(b) => {
                let b = b.borrow();
                write!(f, "abuf(ch:{} frames:{})", b.ch_n, b.frame_n)
            }
            Value::FBuf(b) => write!(f, "fbuf(ch:{})", b.borrow().ch_n()),
            Value::MBuf(b) => write!(f, "mbuf(n:{})", b.borrow().msgs.len()),
            Value::RBuf(b) => write!(f, "rbuf(n:{})", b.borrow().recds.len()),
        }
    }
}

/// Build a value from a cfg node. Numbers map to `Int`/`UInt`/`Double` by
/// inspection; containers are carried as borrowed cfg handles.
pub fn value_from_cfg(cfg: &Cfg) -> Result<Value> {
    Ok(match cfg {
        Cfg::Null => Value::Null,
        Cfg::Bool(v) => Value::Bool(*v),
        Cfg::Number(n) => {
            if let Some(u) = n.as_u64() {
                if u <= u32::MAX as u64 {
                    Value::UInt(u as u32)
                } else {
                    Value::Double(u as f64)
                }
            } else if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 {
                    Value::Int(i as i32)
                } else {
                    Value::Double(i as f64)
                }
            } else {
                Value::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Cfg::String(s) => Value::Str(s.clone()),
        Cfg::Array(_) | Cfg::Object(_) => Value::Cfg(Rc::new(cfg.clone())),
    })
}

/// Render a scalar value back to an equivalent cfg node.
pub fn value_to_cfg(v: &Value) -> Result<Cfg> {
    Ok(match v {
        Value::Null => Cfg::Null,
        Value::Bool(b) => Cfg::Bool(*b),
        Value::UInt(u) => Cfg::from(*u),
        Value::Int(i) => Cfg::from(*i),
        Value::Float(f) => Cfg::from(*f as f64),
        Value::Double(d) => Cfg::from(*d),
        Value::Str(s) => Cfg::String(s.clone()),
        Value::Cfg(c) => (**c).clone(),
        _ => {
            return Err(Error::type_mismatch(format!(
                "a {} value has no cfg representation",
                v.type_fl()
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_mask() {
        assert!(TypeFl::can_convert(TypeFl::UINT, TypeFl::NUMERIC));
        assert!(TypeFl::can_convert(TypeFl::DOUBLE, TypeFl::DOUBLE));
        assert!(!TypeFl::can_convert(TypeFl::STRING, TypeFl::NUMERIC));
        assert!(!TypeFl::can_convert(TypeFl::ABUF, TypeFl::FBUF));
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Value::UInt(3).convert_to(TypeFl::DOUBLE).unwrap().as_f64().unwrap(), 3.0);
        assert_eq!(Value::Double(2.0).convert_to(TypeFl::INT).unwrap().as_i32().unwrap(), 2);
        assert!(Value::Int(-1).convert_to(TypeFl::UINT).is_err());
        assert!(Value::Str("x".into()).convert_to(TypeFl::DOUBLE).is_err());
    }

    #[test]
    fn test_value_from_cfg_primitives() {
        assert!(matches!(value_from_cfg(&json!(true)).unwrap(), Value::Bool(true)));
        assert!(matches!(value_from_cfg(&json!(3)).unwrap(), Value::UInt(3)));
        assert!(matches!(value_from_cfg(&json!(-3)).unwrap(), Value::Int(-3)));
        assert!(matches!(value_from_cfg(&json!(1.25)).unwrap(), Value::Double(_)));
        assert!(matches!(value_from_cfg(&json!("hi")).unwrap(), Value::Str(_)));
        assert!(matches!(value_from_cfg(&json!([1, 2])).unwrap(), Value::Cfg(_)));
    }

    #[test]
    fn test_cfg_round_trip_for_primitives() {
        for cfg in [json!(true), json!(7), json!(-7), json!(0.5), json!("s")] {
            let v = value_from_cfg(&cfg).unwrap();
            assert_eq!(value_to_cfg(&v).unwrap(), cfg);
        }
    }

    #[test]
    fn test_buffer_values_share_by_handle() {
        let b = AudioBuf::new(48000.0, 1, 8).shared();
        let v0 = Value::ABuf(Rc::clone(&b));
        let v1 = v0.clone();
        v0.as_abuf().unwrap().borrow_mut().channel_mut(0)[0] = 0.7;
        assert_eq!(v1.as_abuf().unwrap().borrow().channel(0)[0], 0.7);
        assert!(Rc::ptr_eq(&v0.as_abuf().unwrap(), &v1.as_abuf().unwrap()));
    }

    #[test]
    fn test_element_count_support() {
        assert!(!Value::Double(1.0).supports_ele_count());
        let mb = MidiBuf::default().shared();
        let v = Value::MBuf(Rc::clone(&mb));
        assert!(v.supports_ele_count());
        assert!(!v.has_elements_now());
        mb.borrow_mut().msgs.push(crate::midi::ChMsg::new(0, 0, 0x90, 60, 100));
        assert!(v.has_elements_now());
        assert!(!v.can_auto_notify());
    }
}
