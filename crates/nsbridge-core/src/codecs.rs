//! Conversion between host values and their Foundation equivalents
//!
//! | host | foreign |
//! |------|---------|
//! | `Text` | `NSString` |
//! | `Number` | `NSNumber` |
//! | `Bool` | the `__NSCFBoolean` singletons |
//! | `Date` | `NSDate` |
//! | `Array` | `NSArray` |
//! | `Map` | `NSDictionary` with string keys |
//!
//! Containers convert all-or-nothing: if any element has no foreign
//! equivalent, the whole container is treated as unconverted.

use std::collections::BTreeMap;

use dashmap::DashMap;
use nsbridge_sdk::{ForeignValue, ObjectPtr};
use nsbridge_types::TypeDescriptor;

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::marshal;
use crate::proxy::ObjectProxy;
use crate::value::{HostValue, Timestamp};

/// What [`to_foreign`] does with a value that has no foreign equivalent
#[derive(Clone, Copy)]
pub enum Unconverted<'a> {
    /// Hand selectors, blocks, pointers and structs over in their raw form
    PassThrough,
    /// Let the caller decide
    Handler(&'a dyn Fn(&HostValue) -> BridgeResult<ForeignValue>),
    /// Fail with `UnconvertibleValue`
    Fail,
}

/// What [`to_host`] does with an object that has no host equivalent
#[derive(Clone, Copy)]
pub enum Fallback<'a> {
    /// Return the proxy unchanged
    Proxy,
    /// Let the caller decide
    Handler(&'a dyn Fn(ObjectProxy) -> BridgeResult<HostValue>),
}

/// Foundation classes and boolean singletons, looked up once per bridge
#[derive(Debug, Default)]
pub struct FoundationCache {
    classes: DashMap<&'static str, ObjectPtr>,
    booleans: DashMap<bool, ObjectPtr>,
}

impl FoundationCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Class handle for a Foundation class name
    pub fn class(&self, bridge: &Bridge, name: &'static str) -> BridgeResult<ObjectPtr> {
        if let Some(ptr) = self.classes.get(name) {
            return Ok(*ptr);
        }
        let ptr = bridge
            .runtime()
            .class_by_name(name)
            .ok_or_else(|| BridgeError::ClassNotFound {
                name: name.to_string(),
            })?;
        self.classes.insert(name, ptr);
        Ok(ptr)
    }

    /// The shared `@YES` or `@NO` instance
    pub fn boolean(&self, bridge: &Bridge, value: bool) -> BridgeResult<ObjectPtr> {
        if let Some(ptr) = self.booleans.get(&value) {
            return Ok(*ptr);
        }
        let class = self.class(bridge, "__NSCFBoolean")?;
        let ptr = bridge
            .call(class, "numberWithBool:", &[HostValue::Bool(value)])?
            .as_object()
            .ok_or_else(|| BridgeError::ForeignException {
                name: "NSInternalInconsistencyException".to_string(),
                reason: "numberWithBool: returned nil".to_string(),
            })?;
        Ok(*self.booleans.entry(value).or_insert(ptr))
    }

    fn is_kind_of(
        &self,
        bridge: &Bridge,
        object: ObjectPtr,
        name: &'static str,
    ) -> BridgeResult<bool> {
        let class = self.class(bridge, name)?;
        Ok(bridge.runtime().is_kind_of(object, class))
    }
}

/// Convert a host value to a foreign object
pub fn to_foreign(
    bridge: &Bridge,
    value: &HostValue,
    unconverted: Unconverted<'_>,
) -> BridgeResult<ForeignValue> {
    let foundation = bridge.foundation();
    match value {
        HostValue::Object(proxy) => Ok(ForeignValue::Object(Some(proxy.ptr()))),
        HostValue::Null => Ok(ForeignValue::NIL),
        HostValue::Text(_) => {
            let class = foundation.class(bridge, "NSString")?;
            bridge.call(class, "stringWithUTF8String:", std::slice::from_ref(value))
        }
        HostValue::Number(_) => {
            let class = foundation.class(bridge, "NSNumber")?;
            bridge.call(class, "numberWithDouble:", std::slice::from_ref(value))
        }
        HostValue::Bool(b) => Ok(ForeignValue::Object(Some(foundation.boolean(bridge, *b)?))),
        HostValue::Date(t) => {
            let class = foundation.class(bridge, "NSDate")?;
            bridge.call(
                class,
                "dateWithTimeIntervalSince1970:",
                &[HostValue::Number(t.as_secs())],
            )
        }
        HostValue::Array(items) => match array_to_foreign(bridge, items) {
            Err(BridgeError::UnconvertibleValue { kind }) => {
                tracing::warn!(element = %kind, "array has an unconvertible element");
                unconverted_value(bridge, value, unconverted)
            }
            other => other,
        },
        HostValue::Map(map) => match map_to_foreign(bridge, map) {
            Err(BridgeError::UnconvertibleValue { kind }) => {
                tracing::warn!(element = %kind, "map has an unconvertible value");
                unconverted_value(bridge, value, unconverted)
            }
            other => other,
        },
        _ => unconverted_value(bridge, value, unconverted),
    }
}

fn array_to_foreign(bridge: &Bridge, items: &[HostValue]) -> BridgeResult<ForeignValue> {
    let class = bridge.foundation().class(bridge, "NSMutableArray")?;
    let array = bridge.call(class, "array", &[])?;
    let array = object_or_nil(array, "array")?;
    for item in items {
        let element = to_foreign(bridge, item, Unconverted::Fail)?;
        bridge.call(array, "addObject:", &[as_argument(bridge, &element)])?;
    }
    Ok(ForeignValue::Object(Some(array)))
}

fn map_to_foreign(
    bridge: &Bridge,
    map: &BTreeMap<String, HostValue>,
) -> BridgeResult<ForeignValue> {
    let class = bridge.foundation().class(bridge, "NSMutableDictionary")?;
    let dictionary = bridge.call(class, "dictionary", &[])?;
    let dictionary = object_or_nil(dictionary, "dictionary")?;
    for (key, item) in map {
        let element = to_foreign(bridge, item, Unconverted::Fail)?;
        let key = to_foreign(bridge, &HostValue::Text(key.clone()), Unconverted::Fail)?;
        bridge.call(
            dictionary,
            "setObject:forKey:",
            &[as_argument(bridge, &element), as_argument(bridge, &key)],
        )?;
    }
    Ok(ForeignValue::Object(Some(dictionary)))
}

fn object_or_nil(value: ForeignValue, selector: &str) -> BridgeResult<ObjectPtr> {
    value.as_object().ok_or_else(|| BridgeError::ForeignException {
        name: "NSInternalInconsistencyException".to_string(),
        reason: format!("{} returned nil", selector),
    })
}

fn as_argument(bridge: &Bridge, value: &ForeignValue) -> HostValue {
    match value.as_object() {
        Some(ptr) => HostValue::Object(bridge.wrap(ptr)),
        None => HostValue::Null,
    }
}

fn unconverted_value(
    bridge: &Bridge,
    value: &HostValue,
    unconverted: Unconverted<'_>,
) -> BridgeResult<ForeignValue> {
    match unconverted {
        Unconverted::Fail => Err(BridgeError::UnconvertibleValue {
            kind: value.kind_name().to_string(),
        }),
        Unconverted::Handler(handler) => handler(value),
        Unconverted::PassThrough => pass_through(bridge, value),
    }
}

fn pass_through(bridge: &Bridge, value: &HostValue) -> BridgeResult<ForeignValue> {
    let ty = match value {
        HostValue::Selector(_) => TypeDescriptor::Selector,
        HostValue::Block(_) => TypeDescriptor::Block,
        HostValue::Pointer(_) => TypeDescriptor::opaque_pointer(),
        HostValue::Struct(sv) => TypeDescriptor::Struct(sv.struct_type().clone()),
        other => {
            return Err(BridgeError::UnconvertibleValue {
                kind: other.kind_name().to_string(),
            })
        }
    };
    marshal::marshal(bridge, &ty, value)
        .map_err(|err| err.into_bridge_error(&ty.to_string(), "passing a value through"))
}

/// Convert a foreign object to its host equivalent.
///
/// Values that are not objects are returned unchanged, as are class
/// objects and nil.
pub fn to_host(
    bridge: &Bridge,
    value: &HostValue,
    fallback: Fallback<'_>,
) -> BridgeResult<HostValue> {
    let proxy = match value {
        HostValue::Object(proxy) if !proxy.is_class() => proxy,
        HostValue::Object(proxy) => return fall_back(proxy.clone(), fallback),
        other => return Ok(other.clone()),
    };
    let foundation = bridge.foundation();
    let ptr = proxy.ptr();

    if foundation.is_kind_of(bridge, ptr, "NSString")? {
        return match bridge.send(ptr, "UTF8String", &[])? {
            HostValue::Null => Ok(HostValue::Text(String::new())),
            text => Ok(text),
        };
    }
    if foundation.is_kind_of(bridge, ptr, "__NSCFBoolean")? {
        return match bridge.send(ptr, "boolValue", &[])? {
            HostValue::Bool(b) => Ok(HostValue::Bool(b)),
            HostValue::Number(n) => Ok(HostValue::Bool(n != 0.0)),
            other => Err(BridgeError::UnsupportedType {
                encoding: "B".to_string(),
                reason: format!("boolValue returned a {}", other.kind_name()),
            }),
        };
    }
    if foundation.is_kind_of(bridge, ptr, "NSNumber")? {
        return bridge.send(ptr, "doubleValue", &[]);
    }
    if foundation.is_kind_of(bridge, ptr, "NSDate")? {
        let secs = bridge
            .send(ptr, "timeIntervalSince1970", &[])?
            .as_number()
            .unwrap_or(f64::NAN);
        return Ok(HostValue::Date(Timestamp::from_secs(secs)));
    }
    if foundation.is_kind_of(bridge, ptr, "NSArray")? {
        let mut items = Vec::new();
        for element in proxy.iter()? {
            items.push(to_host(bridge, &HostValue::Object(element?), Fallback::Proxy)?);
        }
        return Ok(HostValue::Array(items));
    }
    if foundation.is_kind_of(bridge, ptr, "NSDictionary")? {
        let mut map = BTreeMap::new();
        for key in proxy.iter()? {
            let key = key?;
            let item = bridge.send(ptr, "objectForKey:", &[HostValue::Object(key.clone())])?;
            map.insert(key.to_string_value()?, to_host(bridge, &item, Fallback::Proxy)?);
        }
        return Ok(HostValue::Map(map));
    }
    fall_back(proxy.clone(), fallback)
}

fn fall_back(proxy: ObjectProxy, fallback: Fallback<'_>) -> BridgeResult<HostValue> {
    match fallback {
        Fallback::Proxy => Ok(HostValue::Object(proxy)),
        Fallback::Handler(handler) => handler(proxy),
    }
}
