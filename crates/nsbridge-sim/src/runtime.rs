//! The simulated runtime
//!
//! Objects live in a table keyed by fake addresses. Classes are objects
//! too, each with a class-side and an instance-side method table; lookups
//! walk the superclass chain. Method implementations are Rust closures
//! that receive the runtime, the receiver and the explicit arguments.

use std::sync::Arc;

use nsbridge_sdk::{
    BlockPtr, CallResult, ForeignException, ForeignRuntime, ForeignValue, Imp, MethodEncoding,
    MethodRef, MethodSide, ObjectPtr, OutSlot, Sel,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::SimError;

/// A method implementation: runtime, receiver, explicit arguments
pub type MethodImpl =
    Arc<dyn Fn(&SimRuntime, ObjectPtr, &[ForeignValue]) -> CallResult<ForeignValue> + Send + Sync>;

/// Native state carried by a simulated instance
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Plain object
    #[default]
    None,
    /// `NSString`
    String(String),
    /// `NSNumber`
    Number(f64),
    /// `__NSCFBoolean`
    Bool(bool),
    /// `NSDate`, seconds since the epoch
    Date(f64),
    /// `NSArray`
    Array(Vec<ObjectPtr>),
    /// `NSDictionary`, in insertion order
    Dictionary(Vec<(ObjectPtr, ObjectPtr)>),
    /// `NSSet`
    Set(Vec<ObjectPtr>),
    /// `NSEnumerator`
    Enumerator {
        /// Snapshot of the enumerated collection
        items: Vec<ObjectPtr>,
        /// Index of the next item
        position: usize,
    },
    /// `NSError`
    Error {
        /// Error domain
        domain: String,
        /// Error code
        code: i64,
    },
    /// Instance variables of classes defined through [`ClassBuilder`]
    Fields(FxHashMap<String, ForeignValue>),
}

#[derive(Clone)]
struct SimMethod {
    encoding: String,
    imp: MethodImpl,
}

struct SimClass {
    name: String,
    superclass: Option<ObjectPtr>,
    class_methods: FxHashMap<Sel, MethodRef>,
    instance_methods: FxHashMap<Sel, MethodRef>,
}

enum SimObject {
    Class(SimClass),
    Instance { class: ObjectPtr, payload: Payload },
}

struct SimState {
    next_addr: usize,
    objects: FxHashMap<ObjectPtr, SimObject>,
    classes: FxHashMap<String, ObjectPtr>,
    selectors: Vec<String>,
    selector_ids: FxHashMap<String, Sel>,
    methods: Vec<SimMethod>,
}

impl SimState {
    fn allocate(&mut self, object: SimObject) -> ObjectPtr {
        loop {
            self.next_addr = self.next_addr.wrapping_add(0x10);
            if let Some(ptr) = ObjectPtr::new(self.next_addr) {
                self.objects.insert(ptr, object);
                return ptr;
            }
        }
    }

    fn class(&self, ptr: ObjectPtr) -> Option<&SimClass> {
        match self.objects.get(&ptr) {
            Some(SimObject::Class(class)) => Some(class),
            _ => None,
        }
    }

    fn class_of(&self, ptr: ObjectPtr) -> ObjectPtr {
        match self.objects.get(&ptr) {
            Some(SimObject::Instance { class, .. }) => *class,
            _ => ptr,
        }
    }

    fn lookup(&self, mut class: ObjectPtr, side: MethodSide, sel: Sel) -> Option<MethodRef> {
        loop {
            let entry = self.class(class)?;
            let table = match side {
                MethodSide::Class => &entry.class_methods,
                MethodSide::Instance => &entry.instance_methods,
            };
            if let Some(method) = table.get(&sel) {
                return Some(*method);
            }
            class = entry.superclass?;
        }
    }

    fn intern(&mut self, name: &str) -> Sel {
        if let Some(sel) = self.selector_ids.get(name) {
            return *sel;
        }
        self.selectors.push(name.to_string());
        let sel = Sel(self.selectors.len());
        self.selector_ids.insert(name.to_string(), sel);
        sel
    }
}

/// A simulated Foundation runtime
pub struct SimRuntime {
    state: Mutex<SimState>,
    booleans: Mutex<[Option<ObjectPtr>; 2]>,
}

impl SimRuntime {
    /// A runtime with the Foundation classes installed
    pub fn new() -> Self {
        let runtime = Self::empty();
        crate::foundation::install(&runtime);
        runtime
    }

    /// A runtime with no classes at all
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(SimState {
                next_addr: 0x1000,
                objects: FxHashMap::default(),
                classes: FxHashMap::default(),
                selectors: Vec::new(),
                selector_ids: FxHashMap::default(),
                methods: Vec::new(),
            }),
            booleans: Mutex::new([None, None]),
        }
    }

    /// Start defining a class
    pub fn class_builder(&self, name: &str) -> ClassBuilder<'_> {
        ClassBuilder {
            runtime: self,
            name: name.to_string(),
            superclass: Some("NSObject".to_string()),
            methods: Vec::new(),
        }
    }

    pub(crate) fn define_class(&self, name: &str, superclass: Option<ObjectPtr>) -> ObjectPtr {
        let mut state = self.state.lock();
        let ptr = state.allocate(SimObject::Class(SimClass {
            name: name.to_string(),
            superclass,
            class_methods: FxHashMap::default(),
            instance_methods: FxHashMap::default(),
        }));
        state.classes.insert(name.to_string(), ptr);
        tracing::debug!(class = name, %ptr, "defined class");
        ptr
    }

    pub(crate) fn add_method(
        &self,
        class: ObjectPtr,
        side: MethodSide,
        selector: &str,
        encoding: &str,
        imp: MethodImpl,
    ) {
        let mut state = self.state.lock();
        let sel = state.intern(selector);
        state.methods.push(SimMethod {
            encoding: encoding.to_string(),
            imp,
        });
        let method = MethodRef(state.methods.len() - 1);
        if let Some(SimObject::Class(entry)) = state.objects.get_mut(&class) {
            match side {
                MethodSide::Class => entry.class_methods.insert(sel, method),
                MethodSide::Instance => entry.instance_methods.insert(sel, method),
            };
        }
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Create an instance of `class`
    pub fn alloc(&self, class: ObjectPtr, payload: Payload) -> ObjectPtr {
        self.state
            .lock()
            .allocate(SimObject::Instance { class, payload })
    }

    /// Create an instance of the class named `class_name`
    pub fn instantiate(&self, class_name: &str, payload: Payload) -> CallResult<ObjectPtr> {
        let class = self
            .class_by_name(class_name)
            .ok_or_else(|| {
                ForeignException::new(
                    "NSInternalInconsistencyException",
                    format!("no class {}", class_name),
                )
            })?;
        Ok(self.alloc(class, payload))
    }

    /// Copy of an instance's payload
    pub fn payload(&self, object: ObjectPtr) -> Option<Payload> {
        match self.state.lock().objects.get(&object) {
            Some(SimObject::Instance { payload, .. }) => Some(payload.clone()),
            _ => None,
        }
    }

    /// Mutate an instance's payload. `f` runs with the object table locked
    /// and must not call back into the runtime.
    pub fn with_payload<R>(
        &self,
        object: ObjectPtr,
        f: impl FnOnce(&mut Payload) -> R,
    ) -> Option<R> {
        match self.state.lock().objects.get_mut(&object) {
            Some(SimObject::Instance { payload, .. }) => Some(f(payload)),
            _ => None,
        }
    }

    /// Number of live objects, classes included
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// A new `NSString`
    pub fn new_string(&self, value: impl Into<String>) -> CallResult<ObjectPtr> {
        self.instantiate("NSString", Payload::String(value.into()))
    }

    /// A new `NSNumber`
    pub fn new_number(&self, value: f64) -> CallResult<ObjectPtr> {
        self.instantiate("NSNumber", Payload::Number(value))
    }

    /// The `@YES`/`@NO` singleton
    pub fn boolean(&self, value: bool) -> CallResult<ObjectPtr> {
        let mut booleans = self.booleans.lock();
        let slot = &mut booleans[usize::from(value)];
        if let Some(ptr) = slot {
            return Ok(*ptr);
        }
        let ptr = self.instantiate("__NSCFBoolean", Payload::Bool(value))?;
        *slot = Some(ptr);
        Ok(ptr)
    }

    /// A new `NSError`
    pub fn new_error(&self, domain: &str, code: i64) -> CallResult<ObjectPtr> {
        self.instantiate(
            "NSError",
            Payload::Error {
                domain: domain.to_string(),
                code,
            },
        )
    }

    /// Contents of an `NSString`
    pub fn string_value(&self, object: ObjectPtr) -> Option<String> {
        match self.payload(object)? {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Content equality for strings, numbers and dates; identity otherwise
    pub fn is_equal(&self, a: ObjectPtr, b: ObjectPtr) -> bool {
        if a == b {
            return true;
        }
        match (self.payload(a), self.payload(b)) {
            (Some(Payload::String(x)), Some(Payload::String(y))) => x == y,
            (Some(Payload::Number(x)), Some(Payload::Number(y)))
            | (Some(Payload::Date(x)), Some(Payload::Date(y))) => x == y,
            _ => false,
        }
    }

    /// The `description` string of an object, without sending a message
    pub fn describe(&self, object: ObjectPtr) -> String {
        if self.is_class(object) {
            return self.class_name(object);
        }
        match self.payload(object) {
            Some(Payload::String(s)) => s,
            Some(Payload::Number(n)) => format_number(n),
            Some(Payload::Bool(b)) => (if b { "1" } else { "0" }).to_string(),
            Some(Payload::Date(secs)) => format!("{} seconds since 1970", format_number(secs)),
            Some(Payload::Array(items)) => {
                let lines: Vec<String> = items
                    .iter()
                    .map(|item| format!("    {}", self.describe(*item)))
                    .collect();
                format!("(\n{}\n)", lines.join(",\n"))
            }
            Some(Payload::Set(items)) => {
                let lines: Vec<String> = items
                    .iter()
                    .map(|item| format!("    {}", self.describe(*item)))
                    .collect();
                format!("{{(\n{}\n)}}", lines.join(",\n"))
            }
            Some(Payload::Dictionary(entries)) => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| {
                        format!("    {} = {};", self.describe(*key), self.describe(*value))
                    })
                    .collect();
                format!("{{\n{}\n}}", lines.join("\n"))
            }
            Some(Payload::Error { domain, code }) => {
                format!("Error Domain={} Code={}", domain, code)
            }
            _ => format!("<{}: {}>", self.class_name(self.class_of(object)), object),
        }
    }

    /// Invoke a block with the given arguments, block slot included
    pub fn call_block(
        &self,
        block: Option<&BlockPtr>,
        args: &[ForeignValue],
    ) -> CallResult<ForeignValue> {
        let block = block
            .ok_or_else(|| ForeignException::invalid_argument("block argument cannot be nil"))?;
        let entry = block
            .entry()
            .ok_or_else(|| ForeignException::invalid_argument("block has been released"))?;
        entry.invoke(args)
    }
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimRuntime")
            .field("objects", &state.objects.len())
            .field("classes", &state.classes.len())
            .field("methods", &state.methods.len())
            .finish()
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl ForeignRuntime for SimRuntime {
    fn class_by_name(&self, name: &str) -> Option<ObjectPtr> {
        self.state.lock().classes.get(name).copied()
    }

    fn class_of(&self, object: ObjectPtr) -> ObjectPtr {
        self.state.lock().class_of(object)
    }

    fn class_name(&self, class: ObjectPtr) -> String {
        let state = self.state.lock();
        let class = state.class_of(class);
        state
            .class(class)
            .map_or_else(|| "<unknown>".to_string(), |entry| entry.name.clone())
    }

    fn is_class(&self, object: ObjectPtr) -> bool {
        self.state.lock().class(object).is_some()
    }

    fn is_kind_of(&self, object: ObjectPtr, class: ObjectPtr) -> bool {
        let state = self.state.lock();
        let mut current = Some(state.class_of(object));
        while let Some(ptr) = current {
            if ptr == class {
                return true;
            }
            current = state.class(ptr).and_then(|entry| entry.superclass);
        }
        false
    }

    fn register_selector(&self, name: &str) -> Sel {
        self.state.lock().intern(name)
    }

    fn selector_name(&self, sel: Sel) -> String {
        let state = self.state.lock();
        sel.0
            .checked_sub(1)
            .and_then(|index| state.selectors.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn class_method(&self, class: ObjectPtr, sel: Sel) -> Option<MethodRef> {
        self.state.lock().lookup(class, MethodSide::Class, sel)
    }

    fn instance_method(&self, class: ObjectPtr, sel: Sel) -> Option<MethodRef> {
        self.state.lock().lookup(class, MethodSide::Instance, sel)
    }

    fn method_type_encoding(&self, method: MethodRef) -> String {
        self.state
            .lock()
            .methods
            .get(method.0)
            .map(|m| m.encoding.clone())
            .unwrap_or_default()
    }

    fn method_implementation(&self, method: MethodRef) -> Imp {
        Imp(method.0)
    }

    fn responds_to(&self, receiver: ObjectPtr, sel: Sel) -> bool {
        let state = self.state.lock();
        let side = if state.class(receiver).is_some() {
            MethodSide::Class
        } else {
            MethodSide::Instance
        };
        state.lookup(state.class_of(receiver), side, sel).is_some()
    }

    fn call(
        &self,
        imp: Imp,
        signature: &MethodEncoding,
        args: &[ForeignValue],
    ) -> CallResult<ForeignValue> {
        let method = self.state.lock().methods.get(imp.0).cloned();
        let method = method
            .ok_or_else(|| ForeignException::invalid_argument("bad implementation pointer"))?;
        if args.len() != signature.arguments.len() || args.len() < 2 {
            return Err(ForeignException::invalid_argument(format!(
                "expected {} arguments, got {}",
                signature.arguments.len(),
                args.len()
            )));
        }
        let receiver = object_arg(args, 0)?
            .ok_or_else(|| ForeignException::invalid_argument("message sent to nil"))?;
        (method.imp)(self, receiver, &args[2..])
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn bad_argument(index: usize, expected: &str, got: &ForeignValue) -> ForeignException {
    ForeignException::invalid_argument(format!(
        "argument {} should be {}, got {}",
        index,
        expected,
        got.kind_name()
    ))
}

fn argument(args: &[ForeignValue], index: usize) -> CallResult<&ForeignValue> {
    args.get(index)
        .ok_or_else(|| ForeignException::invalid_argument(format!("missing argument {}", index)))
}

/// Object (or class) argument; `None` for nil
pub fn object_arg(args: &[ForeignValue], index: usize) -> CallResult<Option<ObjectPtr>> {
    match argument(args, index)? {
        ForeignValue::Object(ptr) | ForeignValue::Class(ptr) => Ok(*ptr),
        ForeignValue::Pointer(addr) => Ok(ObjectPtr::new(*addr)),
        other => Err(bad_argument(index, "an object", other)),
    }
}

/// Numeric argument widened to `f64`
pub fn double_arg(args: &[ForeignValue], index: usize) -> CallResult<f64> {
    let value = argument(args, index)?;
    value.as_f64().ok_or_else(|| bad_argument(index, "a number", value))
}

/// Integer argument
pub fn int_arg(args: &[ForeignValue], index: usize) -> CallResult<i64> {
    let value = argument(args, index)?;
    value.as_i64().ok_or_else(|| bad_argument(index, "an integer", value))
}

/// `BOOL` or `bool` argument
pub fn bool_arg(args: &[ForeignValue], index: usize) -> CallResult<bool> {
    let value = argument(args, index)?;
    value.as_bool().ok_or_else(|| bad_argument(index, "a boolean", value))
}

/// C string argument
pub fn cstring_arg(args: &[ForeignValue], index: usize) -> CallResult<Option<String>> {
    match argument(args, index)? {
        ForeignValue::CString(s) => Ok(s.clone()),
        other => Err(bad_argument(index, "a C string", other)),
    }
}

/// Pointer-to-value argument; `None` for a null pointer
pub fn slot_arg(args: &[ForeignValue], index: usize) -> CallResult<Option<OutSlot>> {
    match argument(args, index)? {
        ForeignValue::Reference(slot) => Ok(Some(Arc::clone(slot))),
        ForeignValue::Pointer(0) => Ok(None),
        other => Err(bad_argument(index, "a pointer", other)),
    }
}

/// Block argument; `None` for nil
pub fn block_arg(args: &[ForeignValue], index: usize) -> CallResult<Option<BlockPtr>> {
    match argument(args, index)? {
        ForeignValue::Block(block) => Ok(block.clone()),
        ForeignValue::Object(None) => Ok(None),
        other => Err(bad_argument(index, "a block", other)),
    }
}

/// Struct argument members
pub fn struct_arg(args: &[ForeignValue], index: usize) -> CallResult<Vec<ForeignValue>> {
    match argument(args, index)? {
        ForeignValue::Struct(fields) => Ok(fields.clone()),
        other => Err(bad_argument(index, "a struct", other)),
    }
}

// ============================================================================
// Class builder
// ============================================================================

/// Defines a class with Rust method implementations
pub struct ClassBuilder<'a> {
    runtime: &'a SimRuntime,
    name: String,
    superclass: Option<String>,
    methods: Vec<(MethodSide, String, String, MethodImpl)>,
}

impl<'a> ClassBuilder<'a> {
    /// Inherit from `name` instead of `NSObject`
    pub fn superclass(mut self, name: &str) -> Self {
        self.superclass = Some(name.to_string());
        self
    }

    /// Make this a root class
    pub fn root(mut self) -> Self {
        self.superclass = None;
        self
    }

    /// Add a `-` method
    pub fn instance_method<F>(mut self, selector: &str, encoding: &str, imp: F) -> Self
    where
        F: Fn(&SimRuntime, ObjectPtr, &[ForeignValue]) -> CallResult<ForeignValue>
            + Send
            + Sync
            + 'static,
    {
        self.methods.push((
            MethodSide::Instance,
            selector.to_string(),
            encoding.to_string(),
            Arc::new(imp),
        ));
        self
    }

    /// Add a `+` method
    pub fn class_method<F>(mut self, selector: &str, encoding: &str, imp: F) -> Self
    where
        F: Fn(&SimRuntime, ObjectPtr, &[ForeignValue]) -> CallResult<ForeignValue>
            + Send
            + Sync
            + 'static,
    {
        self.methods.push((
            MethodSide::Class,
            selector.to_string(),
            encoding.to_string(),
            Arc::new(imp),
        ));
        self
    }

    /// Register the class
    pub fn register(self) -> Result<ObjectPtr, SimError> {
        if self.runtime.class_by_name(&self.name).is_some() {
            return Err(SimError::ClassExists(self.name));
        }
        let superclass = match &self.superclass {
            Some(name) => Some(self.runtime.class_by_name(name).ok_or_else(|| {
                SimError::UnknownSuperclass {
                    class: self.name.clone(),
                    superclass: name.clone(),
                }
            })?),
            None => None,
        };
        let class = self.runtime.define_class(&self.name, superclass);
        for (side, selector, encoding, imp) in self.methods {
            self.runtime.add_method(class, side, &selector, &encoding, imp);
        }
        Ok(class)
    }
}
