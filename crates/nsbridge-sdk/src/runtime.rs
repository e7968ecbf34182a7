//! The foreign object runtime interface
//!
//! The bridge never talks to the platform runtime directly. Everything it
//! needs (class and selector lookup, method introspection and the raw
//! message send) goes through this trait, so the bridge can run against
//! the real runtime or an in-process simulation.

use nsbridge_types::MethodEncoding;

use crate::error::CallResult;
use crate::handle::{Imp, MethodRef, MethodSide, ObjectPtr, Sel};
use crate::value::ForeignValue;

/// Abstract foreign runtime.
///
/// Classes are objects: a class handle is an [`ObjectPtr`] for which
/// [`is_class`](ForeignRuntime::is_class) returns true.
pub trait ForeignRuntime: Send + Sync {
    // ========================================================================
    // Classes
    // ========================================================================

    /// Look up a class by name
    fn class_by_name(&self, name: &str) -> Option<ObjectPtr>;

    /// The class of an object; a class object is its own class here
    fn class_of(&self, object: ObjectPtr) -> ObjectPtr;

    /// Name of a class
    fn class_name(&self, class: ObjectPtr) -> String;

    /// Whether `object` is a class object
    fn is_class(&self, object: ObjectPtr) -> bool;

    /// Whether `object` is an instance of `class` or one of its subclasses
    fn is_kind_of(&self, object: ObjectPtr, class: ObjectPtr) -> bool;

    // ========================================================================
    // Selectors
    // ========================================================================

    /// Intern a selector name
    fn register_selector(&self, name: &str) -> Sel;

    /// Name of an interned selector
    fn selector_name(&self, sel: Sel) -> String;

    // ========================================================================
    // Methods
    // ========================================================================

    /// `+` method lookup, including superclasses
    fn class_method(&self, class: ObjectPtr, sel: Sel) -> Option<MethodRef>;

    /// `-` method lookup, including superclasses
    fn instance_method(&self, class: ObjectPtr, sel: Sel) -> Option<MethodRef>;

    /// Full type encoding of a method, offsets included
    fn method_type_encoding(&self, method: MethodRef) -> String;

    /// Implementation pointer of a method
    fn method_implementation(&self, method: MethodRef) -> Imp;

    /// Whether the receiver would handle `sel`
    fn responds_to(&self, receiver: ObjectPtr, sel: Sel) -> bool;

    // ========================================================================
    // Calls
    // ========================================================================

    /// Invoke an implementation.
    ///
    /// `args` holds one value per entry of `signature.arguments`, receiver
    /// and selector first. Foreign exceptions are caught and returned.
    fn call(
        &self,
        imp: Imp,
        signature: &MethodEncoding,
        args: &[ForeignValue],
    ) -> CallResult<ForeignValue>;

    // ========================================================================
    // Provided
    // ========================================================================

    /// Method lookup on the given side
    fn method(&self, class: ObjectPtr, side: MethodSide, sel: Sel) -> Option<MethodRef> {
        match side {
            MethodSide::Class => self.class_method(class, sel),
            MethodSide::Instance => self.instance_method(class, sel),
        }
    }

    /// Which method table messages to `receiver` go through
    fn side_of(&self, receiver: ObjectPtr) -> MethodSide {
        if self.is_class(receiver) {
            MethodSide::Class
        } else {
            MethodSide::Instance
        }
    }
}
