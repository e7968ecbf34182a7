//! Call-signature introspection and caching
//!
//! A [`CallDescriptor`] is everything needed to send one selector to
//! receivers of one class: the parsed method encoding, the positions of
//! in/out arguments and the implementation pointer. Descriptors are built
//! on first use and kept for the life of the process.

use std::sync::Arc;

use dashmap::DashMap;
use nsbridge_sdk::{ForeignValue, Imp, MethodEncoding, MethodSide, ObjectPtr, Sel};
use nsbridge_types::{strip_offsets, TypeDescriptor};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::marshal;
use crate::value::HostValue;

/// A resolved, ready-to-invoke method
#[derive(Debug)]
pub struct CallDescriptor {
    class_name: String,
    side: MethodSide,
    selector: String,
    sel: Sel,
    encoding: String,
    signature: MethodEncoding,
    inout_positions: Vec<usize>,
    imp: Imp,
}

impl CallDescriptor {
    /// Build a descriptor from a method's type encoding.
    ///
    /// The receiver and selector slots are forced to opaque pointers
    /// whatever the encoding says about them.
    pub(crate) fn from_encoding(
        bridge: &Bridge,
        class_name: String,
        side: MethodSide,
        selector: &str,
        sel: Sel,
        encoding: String,
        imp: Imp,
    ) -> BridgeResult<Self> {
        let mut signature = MethodEncoding::parse(&encoding, bridge.structs())?;
        if signature.arguments.len() < 2 {
            return Err(BridgeError::UnsupportedType {
                encoding: strip_offsets(&encoding),
                reason: "method encoding lacks the receiver and selector slots".to_string(),
            });
        }
        signature.arguments[0] = TypeDescriptor::opaque_pointer();
        signature.arguments[1] = TypeDescriptor::opaque_pointer();

        let inout_positions = signature.arguments[2..]
            .iter()
            .enumerate()
            .filter(|(_, ty)| ty.is_inout_reference())
            .map(|(index, _)| index)
            .collect();

        Ok(Self {
            class_name,
            side,
            selector: selector.to_string(),
            sel,
            encoding,
            signature,
            inout_positions,
            imp,
        })
    }

    /// Name of the class the method was looked up on
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Class or instance method
    pub fn side(&self) -> MethodSide {
        self.side
    }

    /// Colon-delimited selector name
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Interned selector
    pub fn sel(&self) -> Sel {
        self.sel
    }

    /// The raw method encoding, offsets included
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Parsed signature; arguments start with the receiver and selector slots
    pub fn signature(&self) -> &MethodEncoding {
        &self.signature
    }

    /// Return type
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.signature.return_type
    }

    /// Types of the explicit arguments
    pub fn argument_types(&self) -> &[TypeDescriptor] {
        &self.signature.arguments[2..]
    }

    /// Number of explicit arguments
    pub fn explicit_arity(&self) -> usize {
        self.signature.explicit_argument_count()
    }

    /// Explicit argument indices that are in/out references
    pub fn inout_positions(&self) -> &[usize] {
        &self.inout_positions
    }

    /// Implementation pointer
    pub fn imp(&self) -> Imp {
        self.imp
    }

    /// Send to `receiver`, returning the raw foreign result.
    ///
    /// In/out cells among `args` hold their read-back values afterwards.
    pub fn invoke_raw(
        &self,
        bridge: &Bridge,
        receiver: ObjectPtr,
        args: &[HostValue],
    ) -> BridgeResult<ForeignValue> {
        if args.len() != self.explicit_arity() {
            return Err(BridgeError::ArgumentCount {
                selector: self.selector.clone(),
                expected: self.explicit_arity(),
                got: args.len(),
            });
        }

        let mut foreign = Vec::with_capacity(args.len() + 2);
        foreign.push(ForeignValue::Pointer(receiver.addr()));
        foreign.push(ForeignValue::Pointer(self.sel.0));
        for (index, (ty, arg)) in self.argument_types().iter().zip(args).enumerate() {
            let value = marshal::marshal(bridge, ty, arg).map_err(|err| {
                err.into_argument_error(&self.selector, index, &strip_offsets(&self.encoding), ty)
            })?;
            foreign.push(value);
        }

        tracing::trace!(
            selector = %self.selector,
            side = %self.side.sigil(),
            class = %self.class_name,
            "sending message"
        );
        let result = bridge.runtime().call(self.imp, &self.signature, &foreign)?;

        for &index in &self.inout_positions {
            if let HostValue::Ref(cell) = &args[index] {
                cell.read_back(bridge)?;
            }
        }
        Ok(result)
    }

    /// Send to `receiver` and unmarshal the result
    pub fn invoke(
        &self,
        bridge: &Bridge,
        receiver: ObjectPtr,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        let result = self.invoke_raw(bridge, receiver, args)?;
        marshal::unmarshal(bridge, self.return_type(), &result).map_err(|err| {
            err.into_bridge_error(&self.return_type().to_string(), "unmarshaling the return value")
        })
    }
}

type CacheKey = (ObjectPtr, MethodSide, String);

/// Call descriptors by (class, side, selector)
#[derive(Debug, Default)]
pub struct SignatureCache {
    descriptors: DashMap<CacheKey, Arc<CallDescriptor>>,
}

impl SignatureCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached descriptor, if any
    pub fn get(
        &self,
        class: ObjectPtr,
        side: MethodSide,
        selector: &str,
    ) -> Option<Arc<CallDescriptor>> {
        self.descriptors
            .get(&(class, side, selector.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Insert unless another thread got there first; returns the cached entry
    pub fn insert(
        &self,
        class: ObjectPtr,
        side: MethodSide,
        descriptor: CallDescriptor,
    ) -> Arc<CallDescriptor> {
        let key = (class, side, descriptor.selector.clone());
        Arc::clone(
            self.descriptors
                .entry(key)
                .or_insert_with(|| Arc::new(descriptor))
                .value(),
        )
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Look up, parse and cache the method `selector` for `receiver`
#[tracing::instrument(level = "debug", skip_all, fields(selector = %selector))]
pub(crate) fn introspect(
    bridge: &Bridge,
    receiver: ObjectPtr,
    selector: &str,
) -> BridgeResult<Arc<CallDescriptor>> {
    let runtime = bridge.runtime();
    let class = runtime.class_of(receiver);
    let side = runtime.side_of(receiver);

    if let Some(cached) = bridge.signatures().get(class, side, selector) {
        return Ok(cached);
    }

    let class_name = runtime.class_name(class);
    let sel = runtime.register_selector(selector);
    let method = runtime
        .method(class, side, sel)
        .ok_or_else(|| BridgeError::SelectorNotFound {
            class: class_name.clone(),
            selector: selector.to_string(),
        })?;

    let encoding = runtime.method_type_encoding(method);
    let imp = runtime.method_implementation(method);
    let descriptor =
        CallDescriptor::from_encoding(bridge, class_name, side, selector, sel, encoding, imp)?;
    tracing::debug!(
        class = %descriptor.class_name,
        encoding = %descriptor.encoding,
        "cached call descriptor"
    );
    Ok(bridge.signatures().insert(class, side, descriptor))
}
