//! Variables: typed, channelized, connectable slots on a proc.
//!
//! A variable starts life on the `any` channel. Assigning a list value
//! channelizes it: each list element lands on a per-channel child variable
//! and the `any` instance remains the fallback for channels with no
//! explicit value. At most one upstream variable may feed a variable
//! (its source); a source may feed many downstream variables.

use crate::value::{TypeFl, Value};

/// Attribute flags from the class variable descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarFlags(pub u32);

impl VarFlags {
    pub const NONE: VarFlags = VarFlags(0);
    /// Must be connected to a source.
    pub const SRC: VarFlags = VarFlags(0x0001);
    /// May be connected to a source.
    pub const SRC_OPT: VarFlags = VarFlags(0x0002);
    /// May not be connected to a source.
    pub const NO_SRC: VarFlags = VarFlags(0x0004);
    /// Value is read at create time only; runtime sets are rejected.
    pub const INIT: VarFlags = VarFlags(0x0008);
    /// May be duplicated with label suffix ids (`in_0`, `in_1`, ...).
    pub const MULT: VarFlags = VarFlags(0x0010);
    /// UDP output-side proxy (inner network feeds the wrapper var).
    pub const OUT: VarFlags = VarFlags(0x0020);
    /// Owner proc is notified when the value changes.
    pub const NOTIFY: VarFlags = VarFlags(0x0040);
    /// Log the value once after the pre-runtime notification pass.
    pub const LOG_INIT: VarFlags = VarFlags(0x0080);
    /// Log the value every cycle.
    pub const LOG_EXEC: VarFlags = VarFlags(0x0100);
    pub const UI_HIDE: VarFlags = VarFlags(0x0200);
    pub const UI_DISABLE: VarFlags = VarFlags(0x0400);

    pub fn has(self, f: VarFlags) -> bool {
        self.0 & f.0 != 0
    }

    pub fn set(&mut self, f: VarFlags) {
        self.0 |= f.0;
    }

    pub fn from_label(s: &str) -> Option<VarFlags> {
        Some(match s {
            "src" => Self::SRC,
            "src_opt" => Self::SRC_OPT,
            "no_src" => Self::NO_SRC,
            "init" => Self::INIT,
            "mult" => Self::MULT,
            "out" => Self::OUT,
            "notify" => Self::NOTIFY,
            "log_init" => Self::LOG_INIT,
            "log_exec" => Self::LOG_EXEC,
            "ui_hide" => Self::UI_HIDE,
            "ui_disable" => Self::UI_DISABLE,
            _ => return None,
        })
    }
}

/// Address of a variable in the engine's proc arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarAddr {
    pub proc: usize,
    pub var: usize,
}

/// A variable instance. Per-channel children are separate `Var` entries on
/// the owning proc sharing label/suffix and differing in `ch_idx`.
#[derive(Debug)]
pub struct Var {
    pub label: String,
    pub label_sfx_id: u32,
    /// Index of the class var desc this instance was stamped from, which
    /// doubles as the O(1) lookup id used by proc code.
    pub vid: usize,
    /// `None` is the `any` channel.
    pub ch_idx: Option<usize>,
    pub flags: VarFlags,
    /// Declared type mask from the desc (or ALL for runtime-typed vars).
    pub type_mask: TypeFl,
    /// Concrete value type once established; further sets convert to it.
    pub val_type: TypeFl,
    pub value: Value,
    /// Previous value (2-slot history).
    pub prior: Option<Value>,
    pub src: Option<VarAddr>,
    pub dst: Vec<VarAddr>,
    /// Scheduled for owner notification this cycle.
    pub pending_notify: bool,
    /// Already sitting in the engine's pending UI-update queue.
    pub in_ui_q: bool,
    pub ui_title: Option<String>,
    pub ui_hide: bool,
    pub ui_disable: bool,
}

impl Var {
    pub fn new(
        label: &str,
        label_sfx_id: u32,
        vid: usize,
        ch_idx: Option<usize>,
        flags: VarFlags,
        type_mask: TypeFl,
    ) -> Self {
        Self {
            label: label.to_string(),
            label_sfx_id,
            vid,
            ch_idx,
            flags,
            type_mask,
            val_type: TypeFl::INVALID,
            value: Value::Null,
            prior: None,
            src: None,
            dst: Vec::new(),
            pending_notify: false,
            in_ui_q: false,
            ui_title: None,
            ui_hide: flags.has(VarFlags::UI_HIDE),
            ui_disable: flags.has(VarFlags::UI_DISABLE),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.src.is_some()
    }

    /// Store a new value, converting to the established concrete type.
    /// Returns whether the stored value differs from the prior one (the
    /// edge used for change notification). Buffer-typed stores count as
    /// changed only when the element count is nonzero.
    pub fn store(&mut self, v: Value) -> crate::error::Result<bool> {
        let v = if self.val_type == TypeFl::INVALID {
            // first assignment establishes the concrete type
            let v = v.convert_to_mask(self.type_mask)?;
            self.val_type = v.type_fl();
            v
        } else {
            v.convert_to(self.val_type)?
        };

        let changed = if v.supports_ele_count() {
            v.has_elements_now()
        } else {
            !v.eq_scalar(&self.value)
        };

        self.prior = Some(std::mem::replace(&mut self.value, v));
        Ok(changed)
    }

    /// `proc:sfx.var:sfx@ch` display context for error logs.
    pub fn ctx_label(&self, proc_label: &str, proc_sfx: u32) -> String {
        match self.ch_idx {
            Some(ch) => format!(
                "{proc_label}:{proc_sfx}.{}:{}@{ch}",
                self.label, self.label_sfx_id
            ),
            None => format!(
                "{proc_label}:{proc_sfx}.{}:{}@any",
                self.label, self.label_sfx_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_var() -> Var {
        Var::new("gain", 0, 0, None, VarFlags::NONE, TypeFl::NUMERIC)
    }

    #[test]
    fn test_first_store_establishes_type() {
        let mut v = numeric_var();
        assert!(v.store(Value::Double(0.5)).unwrap());
        assert_eq!(v.val_type, TypeFl::DOUBLE);

        // later stores convert to the established type
        v.store(Value::UInt(2)).unwrap();
        assert!(matches!(v.value, Value::Double(d) if d == 2.0));
    }

    #[test]
    fn test_incompatible_store_fails_and_leaves_state() {
        let mut v = numeric_var();
        v.store(Value::Double(1.0)).unwrap();
        assert!(v.store(Value::Str("x".into())).is_err());
        assert!(matches!(v.value, Value::Double(d) if d == 1.0));
    }

    #[test]
    fn test_change_edge_is_value_inequality() {
        let mut v = numeric_var();
        assert!(v.store(Value::Double(1.0)).unwrap());
        assert!(!v.store(Value::Double(1.0)).unwrap());
        assert!(v.store(Value::Double(2.0)).unwrap());
        assert!(matches!(v.prior, Some(Value::Double(d)) if d == 1.0));
    }

    #[test]
    fn test_buffer_store_changed_only_with_elements() {
        use crate::buffer::AudioBuf;
        let mut v = Var::new("out", 0, 0, None, VarFlags::NONE, TypeFl::ABUF);
        let empty = AudioBuf::new(48000.0, 0, 0).shared();
        assert!(!v.store(Value::ABuf(empty)).unwrap());
        let full = AudioBuf::new(48000.0, 1, 64).shared();
        assert!(v.store(Value::ABuf(full)).unwrap());
    }
}
