//! Host-side values
//!
//! `HostValue` is the dynamically typed value the host language works
//! with. Foreign objects appear as [`ObjectProxy`] values; everything else
//! is a plain Rust value until it is marshaled for a call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nsbridge_types::{AggregateKind, PrimitiveKind, StructType, TypeDescriptor};

use crate::block::Block;
use crate::error::{BridgeError, BridgeResult};
use crate::inout::InOutRef;
use crate::proxy::ObjectProxy;

/// A point in time, as seconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    /// From seconds since the epoch (fractional seconds allowed)
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Seconds since the epoch
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// The current time
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Convert to a `SystemTime`; `None` for non-finite timestamps and
    /// ones outside the range `SystemTime` can represent
    pub fn to_system_time(self) -> Option<SystemTime> {
        if !self.0.is_finite() {
            return None;
        }
        let offset = Duration::try_from_secs_f64(self.0.abs()).ok()?;
        if self.0 >= 0.0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(after.as_secs_f64()),
            Err(before) => Self(-before.duration().as_secs_f64()),
        }
    }
}

/// A dynamically typed host value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    /// `null`; maps to nil
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Number (all host numbers are doubles)
    Number(f64),
    /// String
    Text(String),
    /// Date
    Date(Timestamp),
    /// Ordered list
    Array(Vec<HostValue>),
    /// String-keyed record
    Map(BTreeMap<String, HostValue>),
    /// Wrapped foreign object or class
    Object(ObjectProxy),
    /// Selector, by its colon-delimited name
    Selector(String),
    /// Block
    Block(Block),
    /// In/out reference cell
    Ref(InOutRef),
    /// Struct instance
    Struct(StructValue),
    /// Opaque pointer address
    Pointer(usize),
}

impl HostValue {
    /// Kind name, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::Text(_) => "string",
            HostValue::Date(_) => "date",
            HostValue::Array(_) => "array",
            HostValue::Map(_) => "map",
            HostValue::Object(_) => "object",
            HostValue::Selector(_) => "selector",
            HostValue::Block(_) => "block",
            HostValue::Ref(_) => "ref",
            HostValue::Struct(_) => "struct",
            HostValue::Pointer(_) => "pointer",
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// The wrapped object, if this is one
    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            HostValue::Object(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// The string, if this is one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HostValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The zero value for a foreign type: `0`, `false`, null, or a zeroed struct
    pub fn zero_for(ty: &TypeDescriptor) -> HostValue {
        match ty {
            TypeDescriptor::Primitive(PrimitiveKind::Bool) => HostValue::Bool(false),
            TypeDescriptor::Primitive(PrimitiveKind::Void)
            | TypeDescriptor::Primitive(PrimitiveKind::CString) => HostValue::Null,
            TypeDescriptor::Primitive(_) => HostValue::Number(0.0),
            TypeDescriptor::Struct(st)
                if st.kind() == AggregateKind::Struct && !st.is_forward() =>
            {
                HostValue::Struct(StructValue::zeroed(Arc::clone(st)))
            }
            TypeDescriptor::Array { length, element } => {
                HostValue::Array((0..*length).map(|_| HostValue::zero_for(element)).collect())
            }
            _ => HostValue::Null,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", n),
            HostValue::Text(s) => write!(f, "\"{}\"", s),
            HostValue::Date(t) => write!(f, "Date({})", t.as_secs()),
            HostValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            HostValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            HostValue::Object(proxy) => write!(f, "{}", proxy),
            HostValue::Selector(name) => write!(f, "Selector({})", name),
            HostValue::Block(block) => write!(f, "{}", block),
            HostValue::Ref(cell) => write!(f, "Ref({})", cell.value()),
            HostValue::Struct(value) => write!(f, "{}", value),
            HostValue::Pointer(addr) => write!(f, "Pointer({:#x})", addr),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(f64::from(n))
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Text(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Text(s)
    }
}

impl From<Timestamp> for HostValue {
    fn from(t: Timestamp) -> Self {
        HostValue::Date(t)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::Array(items)
    }
}

impl From<BTreeMap<String, HostValue>> for HostValue {
    fn from(map: BTreeMap<String, HostValue>) -> Self {
        HostValue::Map(map)
    }
}

impl From<ObjectProxy> for HostValue {
    fn from(proxy: ObjectProxy) -> Self {
        HostValue::Object(proxy)
    }
}

impl From<Block> for HostValue {
    fn from(block: Block) -> Self {
        HostValue::Block(block)
    }
}

impl From<InOutRef> for HostValue {
    fn from(cell: InOutRef) -> Self {
        HostValue::Ref(cell)
    }
}

impl From<StructValue> for HostValue {
    fn from(value: StructValue) -> Self {
        HostValue::Struct(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

/// An instance of a struct type, one host value per field
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    ty: Arc<StructType>,
    values: Vec<HostValue>,
}

impl StructValue {
    /// All fields set to their zero value
    pub fn zeroed(ty: Arc<StructType>) -> Self {
        let values = ty
            .fields()
            .iter()
            .map(|field| HostValue::zero_for(&field.ty))
            .collect();
        Self { ty, values }
    }

    /// Positional construction; missing trailing fields are zero
    pub fn from_values(ty: Arc<StructType>, values: Vec<HostValue>) -> BridgeResult<Self> {
        if values.len() > ty.fields().len() {
            return Err(BridgeError::StructFieldCount {
                struct_name: ty.name().to_string(),
                expected: ty.fields().len(),
                got: values.len(),
            });
        }
        let mut value = Self::zeroed(ty);
        for (slot, v) in value.values.iter_mut().zip(values) {
            *slot = v;
        }
        Ok(value)
    }

    /// Construction by field name; missing fields are zero
    pub fn from_map(ty: Arc<StructType>, map: &BTreeMap<String, HostValue>) -> BridgeResult<Self> {
        let mut value = Self::zeroed(ty);
        for (name, v) in map {
            value.set(name, v.clone())?;
        }
        Ok(value)
    }

    /// The struct type
    pub fn struct_type(&self) -> &Arc<StructType> {
        &self.ty
    }

    /// Field values in declaration order
    pub fn values(&self) -> &[HostValue] {
        &self.values
    }

    /// Field value by name
    pub fn get(&self, field: &str) -> Option<&HostValue> {
        self.ty.field_index(field).map(|index| &self.values[index])
    }

    /// Replace a field value by name
    pub fn set(&mut self, field: &str, value: HostValue) -> BridgeResult<()> {
        match self.ty.field_index(field) {
            Some(index) => {
                self.values[index] = value;
                Ok(())
            }
            None => Err(BridgeError::UnknownStructField {
                struct_name: self.ty.name().to_string(),
                field: field.to_string(),
            }),
        }
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.ty.name())?;
        for (i, (field, value)) in self.ty.fields().iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match &field.name {
                Some(name) => write!(f, " {}: {}", name, value)?,
                None => write!(f, " ${}: {}", i, value)?,
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsbridge_types::StructRegistry;

    #[test]
    fn test_struct_value_by_name() {
        let registry = StructRegistry::with_foundation_types();
        let rect = registry.get("NSRect").unwrap();
        let mut value = StructValue::zeroed(Arc::clone(&rect));
        let HostValue::Struct(origin) = value.get("origin").unwrap() else {
            panic!("nested struct should be zeroed as a struct");
        };
        assert_eq!(origin.get("x"), Some(&HostValue::Number(0.0)));

        value.set("size", HostValue::Null).unwrap();
        assert!(matches!(
            value.set("depth", HostValue::Null),
            Err(BridgeError::UnknownStructField { .. })
        ));
    }

    #[test]
    fn test_struct_value_from_map() {
        let registry = StructRegistry::with_foundation_types();
        let point = registry.get("CGPoint").unwrap();
        let mut map = BTreeMap::new();
        map.insert("y".to_string(), HostValue::Number(4.0));
        let value = StructValue::from_map(point, &map).unwrap();
        assert_eq!(value.values(), &[HostValue::Number(0.0), HostValue::Number(4.0)]);
        assert_eq!(value.to_string(), "CGPoint { x: 0, y: 4 }");
    }

    #[test]
    fn test_struct_value_too_many_values() {
        let registry = StructRegistry::with_foundation_types();
        let size = registry.get("NSSize").unwrap();
        let result = StructValue::from_values(size, vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(
            result.unwrap_err(),
            BridgeError::StructFieldCount {
                struct_name: "CGSize".to_string(),
                expected: 2,
                got: 3,
            }
        );
    }

    #[test]
    fn test_timestamp_system_time() {
        let t = Timestamp::from_secs(1_500_000_000.5);
        let back = Timestamp::from(t.to_system_time().unwrap());
        assert!((back.as_secs() - t.as_secs()).abs() < 1e-6);
        assert!(Timestamp::from_secs(f64::NAN).to_system_time().is_none());
    }

    #[test]
    fn test_timestamp_out_of_range() {
        assert!(Timestamp::from_secs(1e20).to_system_time().is_none());
        assert!(Timestamp::from_secs(-1e20).to_system_time().is_none());
        assert!(Timestamp::from_secs(f64::MAX).to_system_time().is_none());
    }

    #[test]
    fn test_display() {
        let value = HostValue::Array(vec![1.into(), "a".into(), true.into(), HostValue::Null]);
        assert_eq!(value.to_string(), "[1, \"a\", true, null]");
    }
}
