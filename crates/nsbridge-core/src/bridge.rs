//! The bridge entry point
//!
//! A [`Bridge`] ties a [`ForeignRuntime`] to the caches built on top of it.
//! It is cheap to clone; clones share the runtime and every cache.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use nsbridge_sdk::{ForeignRuntime, ForeignValue, ObjectPtr};
use nsbridge_types::{StructRegistry, StructType};

use crate::block::BlockTypes;
use crate::codecs::{self, Fallback, FoundationCache, Unconverted};
use crate::error::{BridgeError, BridgeResult};
use crate::options::BridgeOptions;
use crate::proxy::ObjectProxy;
use crate::selector;
use crate::signature::{self, CallDescriptor, SignatureCache};
use crate::value::{HostValue, StructValue};

struct BridgeInner {
    runtime: Arc<dyn ForeignRuntime>,
    options: BridgeOptions,
    signatures: SignatureCache,
    /// Class handles by name; proxies are rebuilt on demand so the cache
    /// holds no reference back to the bridge
    classes: DashMap<String, ObjectPtr>,
    foundation: FoundationCache,
    block_types: BlockTypes,
}

/// Handle to a foreign runtime plus the bridge caches
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Create a bridge with default options
    pub fn new(runtime: Arc<dyn ForeignRuntime>) -> Self {
        Self::with_options(runtime, BridgeOptions::default())
    }

    /// Create a bridge with custom options
    pub fn with_options(runtime: Arc<dyn ForeignRuntime>, options: BridgeOptions) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                runtime,
                options,
                signatures: SignatureCache::new(),
                classes: DashMap::new(),
                foundation: FoundationCache::new(),
                block_types: BlockTypes::new(),
            }),
        }
    }

    /// The foreign runtime
    pub fn runtime(&self) -> &dyn ForeignRuntime {
        self.inner.runtime.as_ref()
    }

    /// Options the bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// Struct types used when parsing encodings
    pub fn structs(&self) -> &Arc<StructRegistry> {
        &self.inner.options.struct_registry
    }

    /// Cached call descriptors
    pub fn signatures(&self) -> &SignatureCache {
        &self.inner.signatures
    }

    pub(crate) fn foundation(&self) -> &FoundationCache {
        &self.inner.foundation
    }

    /// Named block types
    pub fn block_types(&self) -> &BlockTypes {
        &self.inner.block_types
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Proxy for the class named `name`
    pub fn class(&self, name: &str) -> BridgeResult<ObjectProxy> {
        if let Some(ptr) = self.inner.classes.get(name) {
            return Ok(self.wrap(*ptr));
        }
        let ptr = self
            .runtime()
            .class_by_name(name)
            .ok_or_else(|| BridgeError::ClassNotFound {
                name: name.to_string(),
            })?;
        self.inner.classes.insert(name.to_string(), ptr);
        Ok(self.wrap(ptr))
    }

    /// Proxy for an object or class pointer
    pub fn wrap(&self, ptr: ObjectPtr) -> ObjectProxy {
        ObjectProxy::new(self.clone(), ptr)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call descriptor for `selector` (colon spelling) on `receiver`
    pub fn introspect(
        &self,
        receiver: ObjectPtr,
        selector: &str,
    ) -> BridgeResult<Arc<CallDescriptor>> {
        signature::introspect(self, receiver, selector)
    }

    /// Map a host method name to the selector `receiver` responds to
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn resolve_selector(&self, receiver: ObjectPtr, host_name: &str) -> BridgeResult<String> {
        let runtime = self.runtime();
        let max = self.options().max_selector_separators;
        let responds =
            |candidate: &str| runtime.responds_to(receiver, runtime.register_selector(candidate));

        if let Some(found) = selector::resolve(host_name, max, responds) {
            return Ok(found);
        }

        let suggestion = if self.options().suggest_corrections && !host_name.ends_with('_') {
            let corrected = format!("{}_", host_name);
            selector::resolve(&corrected, max, responds).map(|_| corrected)
        } else {
            None
        };
        Err(BridgeError::MethodNotFound {
            class: runtime.class_name(runtime.class_of(receiver)),
            name: host_name.to_string(),
            suggestion,
        })
    }

    /// Send `selector` (colon spelling), returning the raw result
    pub fn call(
        &self,
        receiver: ObjectPtr,
        selector: &str,
        args: &[HostValue],
    ) -> BridgeResult<ForeignValue> {
        self.introspect(receiver, selector)?.invoke_raw(self, receiver, args)
    }

    /// Send `selector` (colon spelling); object results come back as proxies
    pub fn send(
        &self,
        receiver: ObjectPtr,
        selector: &str,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        self.introspect(receiver, selector)?.invoke(self, receiver, args)
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Convert to a Foundation object, failing for values with no equivalent
    pub fn to_foreign(&self, value: &HostValue) -> BridgeResult<ForeignValue> {
        codecs::to_foreign(self, value, Unconverted::Fail)
    }

    /// Convert to a Foundation object with a policy for unconvertible values
    pub fn to_foreign_with(
        &self,
        value: &HostValue,
        unconverted: Unconverted<'_>,
    ) -> BridgeResult<ForeignValue> {
        codecs::to_foreign(self, value, unconverted)
    }

    /// Convert a Foundation object to a plain host value, leaving other
    /// objects as proxies
    pub fn to_host(&self, value: &HostValue) -> BridgeResult<HostValue> {
        codecs::to_host(self, value, Fallback::Proxy)
    }

    /// Convert a Foundation object with a fallback for other objects
    pub fn to_host_with(
        &self,
        value: &HostValue,
        fallback: Fallback<'_>,
    ) -> BridgeResult<HostValue> {
        codecs::to_host(self, value, fallback)
    }

    // ========================================================================
    // Structs
    // ========================================================================

    /// Register a struct encoding such as `{CGVector="dx"d"dy"d}` under
    /// its name and any aliases
    pub fn define_struct(&self, encoding: &str, aliases: &[&str]) -> BridgeResult<Arc<StructType>> {
        Ok(self.structs().define(encoding, aliases)?)
    }

    /// A zeroed instance of a registered struct type
    pub fn struct_value(&self, name: &str) -> BridgeResult<StructValue> {
        Ok(StructValue::zeroed(self.structs().get(name)?))
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("options", &self.inner.options)
            .field("signatures", &self.inner.signatures.len())
            .field("classes", &self.inner.classes.len())
            .finish_non_exhaustive()
    }
}
