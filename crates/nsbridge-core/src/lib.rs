//! nsbridge core
//!
//! Dynamic access to a foreign object runtime from host code:
//!
//! - [`selector`]: host method names to colon-delimited selectors
//! - [`signature`]: method introspection and the call-descriptor cache
//! - [`marshal`]: host values to the foreign calling convention and back
//! - [`codecs`]: host values to Foundation objects and back
//! - [`proxy`]: foreign classes and instances as host objects
//! - [`block`]: host closures as foreign blocks
//! - [`inout`]: pointer-to-value arguments
//!
//! ```ignore
//! let bridge = Bridge::new(runtime);
//! let string = bridge.class("NSString")?.invoke("stringWithString", &["hi".into()])?;
//! ```

#![warn(missing_docs)]

pub mod block;
pub mod bridge;
pub mod codecs;
pub mod error;
pub mod inout;
pub mod marshal;
pub mod options;
pub mod proxy;
pub mod selector;
pub mod signature;
pub mod value;

pub use block::{Block, BlockId, BlockRegistry, BlockType, BlockTypes};
pub use bridge::Bridge;
pub use codecs::{Fallback, Unconverted};
pub use error::{BridgeError, BridgeResult};
pub use inout::InOutRef;
pub use options::BridgeOptions;
pub use proxy::{Attribute, HandleKind, MethodProxy, ObjectHandle, ObjectProxy, ProxyIter};
pub use signature::{CallDescriptor, SignatureCache};
pub use value::{HostValue, StructValue, Timestamp};
