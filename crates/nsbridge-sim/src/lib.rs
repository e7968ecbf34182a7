//! nsbridge sim - a simulated Foundation runtime
//!
//! Implements [`ForeignRuntime`](nsbridge_sdk::ForeignRuntime) entirely in
//! process so the bridge can be exercised without the platform runtime.
//! Comes with a small Foundation: `NSObject`, `NSString`, `NSNumber`,
//! `__NSCFBoolean`, `NSDate`, `NSArray`, `NSMutableArray`, `NSDictionary`,
//! `NSMutableDictionary`, `NSSet`, `NSEnumerator` and `NSError`.
//!
//! More classes can be defined with [`ClassBuilder`]:
//!
//! ```ignore
//! let runtime = SimRuntime::new();
//! runtime
//!     .class_builder("Greeter")
//!     .instance_method("greet:", "@@:@", |rt, _, args| { ... })
//!     .register()?;
//! ```

#![warn(missing_docs)]

pub mod error;
mod foundation;
pub mod runtime;

pub use error::SimError;
pub use foundation::NOT_FOUND;
pub use runtime::{
    block_arg, bool_arg, cstring_arg, double_arg, int_arg, object_arg, slot_arg, struct_arg,
    ClassBuilder, MethodImpl, Payload, SimRuntime,
};
