//! Argument marshaling and return unmarshaling
//!
//! One rule per [`TypeDescriptor`] shape, shared by method calls, block
//! trampolines and in/out cells. Values are deep-copied; struct and array
//! nesting is bounded to prevent runaway recursion.

use std::sync::Arc;

use nsbridge_sdk::{BlockPtr, ForeignValue, ObjectPtr};
use nsbridge_types::{AggregateKind, PrimitiveKind, StructType, TypeDescriptor};
use thiserror::Error;

use crate::block::Block;
use crate::bridge::Bridge;
use crate::codecs::Unconverted;
use crate::error::BridgeError;
use crate::inout::InOutRef;
use crate::value::{HostValue, StructValue};

/// Maximum struct/array nesting depth
const MAX_DEPTH: usize = 64;

/// Errors that can occur while marshaling a single value
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The value does not fit the declared type
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        /// What the type accepts
        expected: String,
        /// Kind of the supplied value
        got: &'static str,
    },

    /// A type the bridge does not marshal (unions, incomplete structs, void)
    #[error("{0}")]
    Unsupported(String),

    /// Maximum marshaling depth exceeded
    #[error("maximum marshaling depth exceeded")]
    MaxDepthExceeded,

    /// A bridge operation failed while converting (foreign exception, released block)
    #[error(transparent)]
    Bridge(Box<BridgeError>),
}

impl From<BridgeError> for MarshalError {
    fn from(err: BridgeError) -> Self {
        MarshalError::Bridge(Box::new(err))
    }
}

impl MarshalError {
    fn mismatch(expected: impl Into<String>, value: &HostValue) -> Self {
        MarshalError::TypeMismatch {
            expected: expected.into(),
            got: value.kind_name(),
        }
    }

    fn foreign_mismatch(ty: &TypeDescriptor, value: &ForeignValue) -> Self {
        MarshalError::TypeMismatch {
            expected: ty.to_string(),
            got: value.kind_name(),
        }
    }

    /// Report as an error about a value of type `encoding`
    pub fn into_bridge_error(self, encoding: &str, context: &str) -> BridgeError {
        match self {
            MarshalError::Bridge(err) => *err,
            MarshalError::Unsupported(reason) => BridgeError::UnsupportedType {
                encoding: encoding.to_string(),
                reason,
            },
            other => BridgeError::UnsupportedType {
                encoding: encoding.to_string(),
                reason: format!("{}: {}", context, other),
            },
        }
    }

    /// Report as a bad explicit argument
    pub fn into_argument_error(
        self,
        selector: &str,
        index: usize,
        encoding: &str,
        ty: &TypeDescriptor,
    ) -> BridgeError {
        match self {
            MarshalError::Bridge(err) => *err,
            MarshalError::Unsupported(reason) => BridgeError::UnsupportedType {
                encoding: ty.to_string(),
                reason,
            },
            other => BridgeError::ArgumentType {
                selector: selector.to_string(),
                index,
                encoding: encoding.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// The null/zero foreign value of a type
pub fn null_of(ty: &TypeDescriptor) -> ForeignValue {
    match ty {
        TypeDescriptor::Primitive(kind) => match kind {
            PrimitiveKind::Void => ForeignValue::Void,
            PrimitiveKind::Bool => ForeignValue::Bool(false),
            PrimitiveKind::Float => ForeignValue::Float(0.0),
            PrimitiveKind::Double => ForeignValue::Double(0.0),
            PrimitiveKind::CString => ForeignValue::CString(None),
            kind if kind.is_unsigned_integer() => ForeignValue::UInt(0),
            _ => ForeignValue::Int(0),
        },
        TypeDescriptor::Object => ForeignValue::Object(None),
        TypeDescriptor::Class => ForeignValue::Class(None),
        TypeDescriptor::Selector => ForeignValue::Selector(None),
        TypeDescriptor::Block => ForeignValue::Block(None),
        TypeDescriptor::Pointer { .. } | TypeDescriptor::UnknownOpaque => ForeignValue::Pointer(0),
        TypeDescriptor::Struct(st) => {
            ForeignValue::Struct(st.fields().iter().map(|f| null_of(&f.ty)).collect())
        }
        TypeDescriptor::Array { length, element } => {
            ForeignValue::Array((0..*length).map(|_| null_of(element)).collect())
        }
    }
}

/// Convert a host value to the foreign representation of `ty`
pub fn marshal(
    bridge: &Bridge,
    ty: &TypeDescriptor,
    value: &HostValue,
) -> Result<ForeignValue, MarshalError> {
    marshal_recursive(bridge, ty, value, 0)
}

fn marshal_recursive(
    bridge: &Bridge,
    ty: &TypeDescriptor,
    value: &HostValue,
    depth: usize,
) -> Result<ForeignValue, MarshalError> {
    if depth > MAX_DEPTH {
        return Err(MarshalError::MaxDepthExceeded);
    }

    match ty {
        TypeDescriptor::Primitive(kind) => marshal_primitive(*kind, value),

        TypeDescriptor::Object => match value {
            HostValue::Null => Ok(ForeignValue::NIL),
            HostValue::Object(proxy) => Ok(ForeignValue::Object(Some(proxy.ptr()))),
            HostValue::Block(block) => Ok(ForeignValue::Block(Some(block.foreign_ptr()?))),
            other => match bridge.to_foreign_with(other, Unconverted::Fail) {
                Ok(foreign) => Ok(foreign),
                Err(BridgeError::UnconvertibleValue { .. }) => {
                    Err(MarshalError::mismatch("an object or null", other))
                }
                Err(err) => Err(err.into()),
            },
        },

        TypeDescriptor::Class => match value {
            HostValue::Null => Ok(ForeignValue::Class(None)),
            HostValue::Object(proxy) if proxy.is_class() => {
                Ok(ForeignValue::Class(Some(proxy.ptr())))
            }
            other => Err(MarshalError::mismatch("a class", other)),
        },

        TypeDescriptor::Selector => match value {
            HostValue::Null => Ok(ForeignValue::Selector(None)),
            HostValue::Selector(name) | HostValue::Text(name) => Ok(ForeignValue::Selector(Some(
                bridge.runtime().register_selector(name),
            ))),
            other => Err(MarshalError::mismatch("a selector", other)),
        },

        TypeDescriptor::Block => match value {
            HostValue::Null => Ok(ForeignValue::Block(None)),
            HostValue::Block(block) => Ok(ForeignValue::Block(Some(block.foreign_ptr()?))),
            other => Err(MarshalError::mismatch("a block", other)),
        },

        TypeDescriptor::UnknownOpaque => marshal_opaque_pointer(value),

        TypeDescriptor::Pointer { .. } => match (ty.inout_target(), value) {
            (Some(target), HostValue::Ref(cell)) => cell.bind(bridge, target),
            (_, HostValue::Ref(_)) => Err(MarshalError::Unsupported(format!(
                "in/out references cannot be passed as '{}'",
                ty
            ))),
            _ => marshal_opaque_pointer(value),
        },

        TypeDescriptor::Struct(st) => marshal_struct(bridge, st, value, depth),

        TypeDescriptor::Array { length, element } => match value {
            HostValue::Array(items) if items.len() == *length => items
                .iter()
                .map(|item| marshal_recursive(bridge, element, item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(ForeignValue::Array),
            other => Err(MarshalError::mismatch(
                format!("an array of {} elements", length),
                other,
            )),
        },
    }
}

fn marshal_primitive(kind: PrimitiveKind, value: &HostValue) -> Result<ForeignValue, MarshalError> {
    match (kind, value) {
        (PrimitiveKind::Void, _) => Err(MarshalError::Unsupported(
            "void is not a valid argument type".to_string(),
        )),
        (PrimitiveKind::CString, HostValue::Text(s)) => Ok(ForeignValue::CString(Some(s.clone()))),
        (PrimitiveKind::CString, HostValue::Null) => Ok(ForeignValue::CString(None)),
        (PrimitiveKind::CString, other) => Err(MarshalError::mismatch("a string", other)),
        (PrimitiveKind::Bool, HostValue::Bool(b)) => Ok(ForeignValue::Bool(*b)),
        (PrimitiveKind::Bool, HostValue::Number(n)) => Ok(ForeignValue::Bool(*n != 0.0)),
        (PrimitiveKind::Float, HostValue::Number(n)) => Ok(ForeignValue::Float(*n as f32)),
        (PrimitiveKind::Double, HostValue::Number(n)) => Ok(ForeignValue::Double(*n)),
        (kind, HostValue::Bool(b)) if kind.is_signed_integer() => {
            Ok(ForeignValue::Int(i64::from(*b)))
        }
        (kind, HostValue::Bool(b)) if kind.is_unsigned_integer() => {
            Ok(ForeignValue::UInt(u64::from(*b)))
        }
        (kind, HostValue::Number(n)) if kind.is_signed_integer() => {
            let (min, max) = signed_range(kind);
            if in_integer_range(*n, min, max) {
                Ok(ForeignValue::Int(*n as i64))
            } else {
                Err(integer_range_mismatch(kind, value))
            }
        }
        (kind, HostValue::Number(n)) if kind.is_unsigned_integer() => {
            if in_integer_range(*n, 0.0, unsigned_max(kind)) {
                Ok(ForeignValue::UInt(*n as u64))
            } else {
                Err(integer_range_mismatch(kind, value))
            }
        }
        (kind, other) => Err(MarshalError::mismatch(
            format!("a value of type {}", kind.c_name()),
            other,
        )),
    }
}

/// Inclusive bounds of a signed integer kind, as floats
fn signed_range(kind: PrimitiveKind) -> (f64, f64) {
    match kind.size() {
        8 => (i64::MIN as f64, i64::MAX as f64),
        size => {
            let half = 2f64.powi(size as i32 * 8 - 1);
            (-half, half - 1.0)
        }
    }
}

fn unsigned_max(kind: PrimitiveKind) -> f64 {
    match kind.size() {
        8 => u64::MAX as f64,
        size => 2f64.powi(size as i32 * 8) - 1.0,
    }
}

/// Whole numbers only; `i64::MAX as f64` rounds up to 2^63, so the upper
/// bound of 8-byte kinds is exclusive.
fn in_integer_range(n: f64, min: f64, max: f64) -> bool {
    if !n.is_finite() || n.fract() != 0.0 || n < min {
        return false;
    }
    if max >= 2f64.powi(63) {
        n < max
    } else {
        n <= max
    }
}

fn integer_range_mismatch(kind: PrimitiveKind, value: &HostValue) -> MarshalError {
    MarshalError::mismatch(format!("an integer in range for {}", kind.c_name()), value)
}

fn marshal_opaque_pointer(value: &HostValue) -> Result<ForeignValue, MarshalError> {
    match value {
        HostValue::Null => Ok(ForeignValue::Pointer(0)),
        HostValue::Pointer(addr) => Ok(ForeignValue::Pointer(*addr)),
        HostValue::Object(proxy) => Ok(ForeignValue::Pointer(proxy.ptr().addr())),
        other => Err(MarshalError::mismatch("a pointer or null", other)),
    }
}

fn marshal_struct(
    bridge: &Bridge,
    st: &Arc<StructType>,
    value: &HostValue,
    depth: usize,
) -> Result<ForeignValue, MarshalError> {
    if st.kind() == AggregateKind::Union {
        return Err(MarshalError::Unsupported(format!(
            "union '{}' cannot be marshaled",
            st.name()
        )));
    }
    if st.is_forward() {
        return Err(MarshalError::Unsupported(format!(
            "struct '{}' has no field information",
            st.name()
        )));
    }

    let fields: Vec<HostValue> = match value {
        HostValue::Struct(sv) if same_struct_shape(sv.struct_type(), st) => sv.values().to_vec(),
        HostValue::Struct(sv) => {
            return Err(MarshalError::TypeMismatch {
                expected: format!("struct {}", st.name()),
                got: if sv.struct_type().is_anonymous() {
                    "anonymous struct"
                } else {
                    "struct"
                },
            })
        }
        HostValue::Map(map) => StructValue::from_map(Arc::clone(st), map)?.values().to_vec(),
        HostValue::Array(items) if items.len() == st.fields().len() => items.clone(),
        other => return Err(MarshalError::mismatch(format!("struct {}", st.name()), other)),
    };

    st.fields()
        .iter()
        .zip(&fields)
        .map(|(field, v)| marshal_recursive(bridge, &field.ty, v, depth + 1))
        .collect::<Result<Vec<_>, _>>()
        .map(ForeignValue::Struct)
}

/// Struct values are interchangeable with a slot of the same tag and arity.
/// Anonymous structs share the `?` tag, so their member types must match too.
fn same_struct_shape(value: &Arc<StructType>, slot: &Arc<StructType>) -> bool {
    if Arc::ptr_eq(value, slot) {
        return true;
    }
    if value.name() != slot.name() || value.fields().len() != slot.fields().len() {
        return false;
    }
    !slot.is_anonymous()
        || value
            .fields()
            .iter()
            .zip(slot.fields())
            .all(|(a, b)| a.ty == b.ty)
}

/// Convert a foreign value of type `ty` to a host value.
///
/// Objects are wrapped in proxies, not converted; use the codecs for that.
pub fn unmarshal(
    bridge: &Bridge,
    ty: &TypeDescriptor,
    value: &ForeignValue,
) -> Result<HostValue, MarshalError> {
    unmarshal_recursive(bridge, ty, value, 0)
}

fn unmarshal_recursive(
    bridge: &Bridge,
    ty: &TypeDescriptor,
    value: &ForeignValue,
    depth: usize,
) -> Result<HostValue, MarshalError> {
    if depth > MAX_DEPTH {
        return Err(MarshalError::MaxDepthExceeded);
    }

    match (ty, value) {
        (TypeDescriptor::Primitive(PrimitiveKind::Void), _) => Ok(HostValue::Null),
        (TypeDescriptor::Primitive(PrimitiveKind::Bool), v) => v
            .as_bool()
            .map(HostValue::Bool)
            .ok_or_else(|| MarshalError::foreign_mismatch(ty, v)),
        (TypeDescriptor::Primitive(PrimitiveKind::CString), ForeignValue::CString(s)) => {
            Ok(s.clone().map_or(HostValue::Null, HostValue::Text))
        }
        (TypeDescriptor::Primitive(_), v) => v
            .as_f64()
            .map(HostValue::Number)
            .ok_or_else(|| MarshalError::foreign_mismatch(ty, v)),

        (TypeDescriptor::Object | TypeDescriptor::Class, v) => match v {
            ForeignValue::Object(ptr) | ForeignValue::Class(ptr) => Ok(wrap_object(bridge, *ptr)),
            ForeignValue::Pointer(addr) => Ok(wrap_object(bridge, ObjectPtr::new(*addr))),
            ForeignValue::Block(ptr) => Ok(wrap_block(ptr.as_ref())),
            other => Err(MarshalError::foreign_mismatch(ty, other)),
        },

        (TypeDescriptor::Selector, ForeignValue::Selector(sel)) => {
            Ok(sel.map_or(HostValue::Null, |sel| {
                HostValue::Selector(bridge.runtime().selector_name(sel))
            }))
        }

        (TypeDescriptor::Block, ForeignValue::Block(ptr)) => Ok(wrap_block(ptr.as_ref())),
        (TypeDescriptor::Block, ForeignValue::Object(None)) => Ok(HostValue::Null),

        (TypeDescriptor::Pointer { .. }, ForeignValue::Reference(slot)) => {
            match ty.inout_target() {
                Some(target) => {
                    let current =
                        unmarshal_recursive(bridge, target, &slot.lock().clone(), depth + 1)?;
                    Ok(HostValue::Ref(InOutRef::from_slot(
                        target.clone(),
                        Arc::clone(slot),
                        current,
                    )))
                }
                None => Err(MarshalError::foreign_mismatch(ty, value)),
            }
        }
        (
            TypeDescriptor::Pointer { .. } | TypeDescriptor::UnknownOpaque,
            ForeignValue::Pointer(addr),
        ) => {
            Ok(if *addr == 0 {
                HostValue::Null
            } else {
                HostValue::Pointer(*addr)
            })
        }

        (TypeDescriptor::Struct(st), ForeignValue::Struct(fields)) => {
            if st.kind() == AggregateKind::Union || st.is_forward() {
                return Err(MarshalError::Unsupported(format!(
                    "'{}' cannot be unmarshaled",
                    st
                )));
            }
            if fields.len() != st.fields().len() {
                return Err(MarshalError::foreign_mismatch(ty, value));
            }
            let values = st
                .fields()
                .iter()
                .zip(fields)
                .map(|(field, v)| unmarshal_recursive(bridge, &field.ty, v, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(HostValue::Struct(StructValue::from_values(
                Arc::clone(st),
                values,
            )?))
        }

        (TypeDescriptor::Array { element, .. }, ForeignValue::Array(items)) => items
            .iter()
            .map(|item| unmarshal_recursive(bridge, element, item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(HostValue::Array),

        (_, other) => Err(MarshalError::foreign_mismatch(ty, other)),
    }
}

fn wrap_object(bridge: &Bridge, ptr: Option<ObjectPtr>) -> HostValue {
    match ptr {
        Some(ptr) => HostValue::Object(bridge.wrap(ptr)),
        None => HostValue::Null,
    }
}

fn wrap_block(ptr: Option<&BlockPtr>) -> HostValue {
    match ptr {
        Some(ptr) => HostValue::Block(Block::from_foreign(ptr)),
        None => HostValue::Null,
    }
}
