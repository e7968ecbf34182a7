//! Object proxies
//!
//! An [`ObjectProxy`] presents a foreign class or instance to the host.
//! Method names arrive in host spelling (`stringWithUTF8String_`) and are
//! resolved against the receiver on each call; the resolved descriptors
//! are cached by the bridge, not by the proxy, so any number of proxies
//! may wrap the same object.

use std::fmt;
use std::sync::Arc;

use nsbridge_sdk::{ObjectPtr, Sel};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::value::HostValue;

/// Class or instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// A class object
    Class,
    /// An instance
    Instance,
}

/// A non-owning reference to a foreign object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Object address
    pub ptr: ObjectPtr,
    /// Class or instance
    pub kind: HandleKind,
}

/// Result of [`ObjectProxy::attribute`]
#[derive(Debug, Clone)]
pub enum Attribute {
    /// The reserved `ptr` key
    Pointer(ObjectPtr),
    /// Any other name: a method bound to the receiver, resolved when called
    Method(MethodProxy),
}

/// A foreign class or instance
#[derive(Clone)]
pub struct ObjectProxy {
    bridge: Bridge,
    handle: ObjectHandle,
    /// Cached for classes only; instances can change class at runtime
    class_name: Option<Arc<str>>,
}

impl ObjectProxy {
    pub(crate) fn new(bridge: Bridge, ptr: ObjectPtr) -> Self {
        let runtime = bridge.runtime();
        let (kind, class_name) = if runtime.is_class(ptr) {
            (HandleKind::Class, Some(Arc::from(runtime.class_name(ptr))))
        } else {
            (HandleKind::Instance, None)
        };
        Self {
            bridge,
            handle: ObjectHandle { ptr, kind },
            class_name,
        }
    }

    /// The wrapped handle
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Object address
    pub fn ptr(&self) -> ObjectPtr {
        self.handle.ptr
    }

    /// Whether this wraps a class object
    pub fn is_class(&self) -> bool {
        self.handle.kind == HandleKind::Class
    }

    /// The bridge this proxy belongs to
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Name of the class, or of the object's class for instances
    pub fn class_name(&self) -> String {
        match &self.class_name {
            Some(name) => name.to_string(),
            None => {
                let runtime = self.bridge.runtime();
                runtime.class_name(runtime.class_of(self.handle.ptr))
            }
        }
    }

    /// Call a method by host name.
    ///
    /// When more arguments are given than the name has underscores, a
    /// trailing `_` is assumed, so `stringWithString("x")` behaves like
    /// `stringWithString_("x")`.
    pub fn invoke(&self, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        let name = host_name_for_arity(name, args.len());
        let selector = self.bridge.resolve_selector(self.handle.ptr, &name)?;
        self.bridge.send(self.handle.ptr, &selector, args)
    }

    /// Look up an attribute: `ptr` or a method
    pub fn attribute(&self, name: &str) -> Attribute {
        if name == "ptr" {
            Attribute::Pointer(self.handle.ptr)
        } else {
            Attribute::Method(self.method(name))
        }
    }

    /// A method bound to this object, resolved when called
    pub fn method(&self, name: &str) -> MethodProxy {
        MethodProxy {
            target: self.clone(),
            name: name.to_string(),
        }
    }

    /// The object's `description`
    pub fn to_string_value(&self) -> BridgeResult<String> {
        let description = self.bridge.send(self.handle.ptr, "description", &[])?;
        match description {
            HostValue::Object(text) => match self.bridge.send(text.ptr(), "UTF8String", &[])? {
                HostValue::Text(s) => Ok(s),
                _ => Ok(String::new()),
            },
            _ => Ok(String::new()),
        }
    }

    /// The object's `doubleValue`
    pub fn to_number(&self) -> BridgeResult<f64> {
        match self.bridge.send(self.handle.ptr, "doubleValue", &[])? {
            HostValue::Number(n) => Ok(n),
            other => Err(BridgeError::UnsupportedType {
                encoding: "d".to_string(),
                reason: format!("doubleValue returned a {}", other.kind_name()),
            }),
        }
    }

    /// Whether the object is an instance of the named class or a subclass
    pub fn is_kind_of(&self, class_name: &str) -> BridgeResult<bool> {
        let class = self.bridge.class(class_name)?;
        Ok(self.bridge.runtime().is_kind_of(self.handle.ptr, class.ptr()))
    }

    /// Whether the object handles `selector` (colon spelling)
    pub fn responds_to(&self, selector: &str) -> bool {
        let runtime = self.bridge.runtime();
        let sel: Sel = runtime.register_selector(selector);
        runtime.responds_to(self.handle.ptr, sel)
    }

    /// Iterate an `NSArray` or `NSSet` by element, an `NSDictionary` by key
    pub fn iter(&self) -> BridgeResult<ProxyIter> {
        let selector = if self.is_class() {
            None
        } else if self.is_kind_of("NSArray")? || self.is_kind_of("NSSet")? {
            Some("objectEnumerator")
        } else if self.is_kind_of("NSDictionary")? {
            Some("keyEnumerator")
        } else {
            None
        };
        let Some(selector) = selector else {
            return Err(BridgeError::NotEnumerable {
                class: self.class_name(),
            });
        };
        let enumerator = match self.bridge.send(self.handle.ptr, selector, &[])? {
            HostValue::Object(enumerator) => Some(enumerator),
            _ => None,
        };
        Ok(ProxyIter { enumerator })
    }

    fn description_or_address(&self) -> String {
        match self.to_string_value() {
            Ok(description) => description.split_whitespace().collect::<Vec<_>>().join(" "),
            Err(_) => format!("<{}: {}>", self.class_name(), self.handle.ptr),
        }
    }
}

fn host_name_for_arity(name: &str, arity: usize) -> String {
    let separators = name.matches('_').count();
    if arity > separators && !name.ends_with('_') {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

impl PartialEq for ObjectProxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("ptr", &self.handle.ptr)
            .field("kind", &self.handle.kind)
            .field("class_name", &self.class_name)
            .finish()
    }
}

impl fmt::Display for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class_name {
            Some(name) => write!(f, "[objc.Class {}]", name),
            None => write!(f, "[objc {}]", self.description_or_address()),
        }
    }
}

/// A method name bound to a receiver
#[derive(Debug, Clone)]
pub struct MethodProxy {
    target: ObjectProxy,
    name: String,
}

impl MethodProxy {
    /// The receiver
    pub fn target(&self) -> &ObjectProxy {
        &self.target
    }

    /// Host spelling of the method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve and call
    pub fn call(&self, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.target.invoke(&self.name, args)
    }
}

impl fmt::Display for MethodProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = if self.target.is_class() { '+' } else { '-' };
        write!(
            f,
            "[objc.MethodProxy '{}[{} {}]']",
            sigil,
            self.target.class_name(),
            self.name
        )
    }
}

/// Iterator over an `NSEnumerator`; stays exhausted once `nextObject`
/// returns nil
#[derive(Debug)]
pub struct ProxyIter {
    enumerator: Option<ObjectProxy>,
}

impl Iterator for ProxyIter {
    type Item = BridgeResult<ObjectProxy>;

    fn next(&mut self) -> Option<Self::Item> {
        let enumerator = self.enumerator.as_ref()?;
        match enumerator.bridge.send(enumerator.handle.ptr, "nextObject", &[]) {
            Ok(HostValue::Object(object)) => Some(Ok(object)),
            Ok(_) => {
                self.enumerator = None;
                None
            }
            Err(err) => {
                self.enumerator = None;
                Some(Err(err))
            }
        }
    }
}
