//! Raw values crossing the foreign call boundary
//!
//! A `ForeignValue` is what a marshaled argument or an unmarshaled return
//! value looks like at the C calling-convention level: scalars widened to
//! 64 bits, object pointers, struct members laid out in order.

use std::fmt;
use std::sync::{Arc, Weak};

use nsbridge_types::TypeDescriptor;
use parking_lot::Mutex;

use crate::error::CallResult;
use crate::handle::{ObjectPtr, Sel};

/// A host callable the foreign side can invoke as a block
pub trait BlockInvoke: Send + Sync {
    /// Return type of the block
    fn return_type(&self) -> &TypeDescriptor;

    /// Parameter types, including the leading block slot when present
    fn parameter_types(&self) -> &[TypeDescriptor];

    /// Invoke with one foreign value per parameter type
    fn invoke(&self, args: &[ForeignValue]) -> CallResult<ForeignValue>;
}

/// A block pointer as seen by the foreign runtime
#[derive(Clone)]
pub enum BlockPtr {
    /// A host closure exposed through the bridge's block registry.
    ///
    /// The registry owns the trampoline; the foreign side only holds a weak
    /// reference, so a released block fails to upgrade instead of dangling.
    Bridged {
        /// Registry id
        id: u64,
        /// Trampoline entry
        entry: Weak<dyn BlockInvoke>,
    },
    /// A block created by foreign code, passed through unchanged
    Opaque(usize),
}

impl BlockPtr {
    /// Upgrade a bridged block's trampoline, `None` if released or opaque
    pub fn entry(&self) -> Option<Arc<dyn BlockInvoke>> {
        match self {
            BlockPtr::Bridged { entry, .. } => entry.upgrade(),
            BlockPtr::Opaque(_) => None,
        }
    }
}

impl PartialEq for BlockPtr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BlockPtr::Bridged { id: a, .. }, BlockPtr::Bridged { id: b, .. }) => a == b,
            (BlockPtr::Opaque(a), BlockPtr::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for BlockPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockPtr::Bridged { id, entry } => f
                .debug_struct("Bridged")
                .field("id", id)
                .field("live", &(entry.strong_count() > 0))
                .finish(),
            BlockPtr::Opaque(addr) => write!(f, "Opaque({:#x})", addr),
        }
    }
}

/// Storage behind a pointer argument the callee may write through
pub type OutSlot = Arc<Mutex<ForeignValue>>;

/// Create a slot holding `value`
pub fn out_slot(value: ForeignValue) -> OutSlot {
    Arc::new(Mutex::new(value))
}

/// A value in the foreign calling convention
#[derive(Debug, Clone, Default)]
pub enum ForeignValue {
    /// No value (`v` returns)
    #[default]
    Void,
    /// `B`
    Bool(bool),
    /// Signed integers (`c s i l q`), sign-extended
    Int(i64),
    /// Unsigned integers (`C S I L Q`), zero-extended
    UInt(u64),
    /// `f`
    Float(f32),
    /// `d`
    Double(f64),
    /// `*`, `None` for a null C string
    CString(Option<String>),
    /// `@`, `None` for nil
    Object(Option<ObjectPtr>),
    /// `#`, `None` for Nil
    Class(Option<ObjectPtr>),
    /// `:`, `None` for a null selector
    Selector(Option<Sel>),
    /// `@?`, `None` for a nil block
    Block(Option<BlockPtr>),
    /// An opaque pointer (`^v`, `^?`, `**`); 0 is null
    Pointer(usize),
    /// Pointer to a caller-owned slot (in/out arguments)
    Reference(OutSlot),
    /// Struct members in declaration order
    Struct(Vec<ForeignValue>),
    /// Fixed-size C array elements
    Array(Vec<ForeignValue>),
}

impl ForeignValue {
    /// Nil object
    pub const NIL: ForeignValue = ForeignValue::Object(None);

    /// The object pointer of an `Object` or `Class` value
    pub fn as_object(&self) -> Option<ObjectPtr> {
        match self {
            ForeignValue::Object(ptr) | ForeignValue::Class(ptr) => *ptr,
            _ => None,
        }
    }

    /// Nil object, Nil class, null pointer or null C string
    pub fn is_nil(&self) -> bool {
        match self {
            ForeignValue::Object(None)
            | ForeignValue::Class(None)
            | ForeignValue::Selector(None)
            | ForeignValue::Block(None)
            | ForeignValue::CString(None)
            | ForeignValue::Pointer(0) => true,
            _ => false,
        }
    }

    /// Numeric payload widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ForeignValue::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            ForeignValue::Int(i) => Some(i as f64),
            ForeignValue::UInt(u) => Some(u as f64),
            ForeignValue::Float(f) => Some(f64::from(f)),
            ForeignValue::Double(d) => Some(d),
            _ => None,
        }
    }

    /// Integer payload, truncating floats
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ForeignValue::Bool(b) => Some(i64::from(b)),
            ForeignValue::Int(i) => Some(i),
            ForeignValue::UInt(u) => Some(u as i64),
            ForeignValue::Float(f) => Some(f as i64),
            ForeignValue::Double(d) => Some(d as i64),
            _ => None,
        }
    }

    /// Unsigned integer payload; `None` for negative and non-integer values
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            ForeignValue::Bool(b) => Some(u64::from(b)),
            ForeignValue::Int(i) => u64::try_from(i).ok(),
            ForeignValue::UInt(u) => Some(u),
            _ => None,
        }
    }

    /// Truthiness of a scalar (`BOOL` is a `c` on most targets)
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ForeignValue::Bool(b) => Some(b),
            _ => self.as_i64().map(|i| i != 0),
        }
    }

    /// Short kind name, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            ForeignValue::Void => "void",
            ForeignValue::Bool(_) => "bool",
            ForeignValue::Int(_) => "int",
            ForeignValue::UInt(_) => "uint",
            ForeignValue::Float(_) => "float",
            ForeignValue::Double(_) => "double",
            ForeignValue::CString(_) => "CString",
            ForeignValue::Object(_) => "object",
            ForeignValue::Class(_) => "class",
            ForeignValue::Selector(_) => "selector",
            ForeignValue::Block(_) => "block",
            ForeignValue::Pointer(_) => "pointer",
            ForeignValue::Reference(_) => "reference",
            ForeignValue::Struct(_) => "struct",
            ForeignValue::Array(_) => "array",
        }
    }
}

impl PartialEq for ForeignValue {
    fn eq(&self, other: &Self) -> bool {
        use ForeignValue::*;
        match (self, other) {
            (Void, Void) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (CString(a), CString(b)) => a == b,
            (Object(a), Object(b)) | (Class(a), Class(b)) => a == b,
            (Selector(a), Selector(b)) => a == b,
            (Block(a), Block(b)) => a == b,
            (Pointer(a), Pointer(b)) => a == b,
            (Reference(a), Reference(b)) => Arc::ptr_eq(a, b),
            (Struct(a), Struct(b)) | (Array(a), Array(b)) => a == b,
            _ => false,
        }
    }
}

impl From<ObjectPtr> for ForeignValue {
    fn from(ptr: ObjectPtr) -> Self {
        ForeignValue::Object(Some(ptr))
    }
}

impl From<Option<ObjectPtr>> for ForeignValue {
    fn from(ptr: Option<ObjectPtr>) -> Self {
        ForeignValue::Object(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_values() {
        assert!(ForeignValue::NIL.is_nil());
        assert!(ForeignValue::Pointer(0).is_nil());
        assert!(!ForeignValue::Int(0).is_nil());
        let obj = ObjectPtr::new(0x10).unwrap();
        assert_eq!(ForeignValue::from(obj).as_object(), Some(obj));
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(ForeignValue::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(ForeignValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(ForeignValue::Int(1).as_bool(), Some(true));
        assert_eq!(ForeignValue::UInt(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(ForeignValue::Int(-1).as_u64(), None);
        assert_eq!(ForeignValue::NIL.as_f64(), None);
    }

    #[test]
    fn test_reference_identity() {
        let slot = out_slot(ForeignValue::NIL);
        let a = ForeignValue::Reference(Arc::clone(&slot));
        let b = ForeignValue::Reference(slot);
        let c = ForeignValue::Reference(out_slot(ForeignValue::NIL));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
