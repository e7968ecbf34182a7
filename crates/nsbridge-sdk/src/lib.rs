//! nsbridge SDK - the foreign runtime surface
//!
//! This crate defines what the bridge consumes from a foreign object
//! runtime without depending on any particular implementation of it:
//!
//! - [`ForeignRuntime`]: class, selector and method lookup plus the raw call
//! - [`ForeignValue`]: values in the foreign calling convention
//! - handles ([`ObjectPtr`], [`Sel`], [`Imp`], [`MethodRef`])
//! - [`BlockInvoke`]: the trampoline interface for host-backed blocks
//! - [`ForeignException`]: foreign exceptions caught at the call boundary

#![warn(missing_docs)]

pub mod error;
pub mod handle;
pub mod runtime;
pub mod value;

pub use error::{CallResult, ForeignException};
pub use handle::{Imp, MethodRef, MethodSide, ObjectPtr, Sel};
pub use runtime::ForeignRuntime;
pub use value::{out_slot, BlockInvoke, BlockPtr, ForeignValue, OutSlot};

// Re-exported so runtime implementations need only this crate
pub use nsbridge_types::{MethodEncoding, TypeDescriptor};
