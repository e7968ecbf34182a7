//! Opaque handles into the foreign runtime
//!
//! All handles are plain addresses. They do not own or retain anything on
//! the foreign side; keeping the referenced object alive is the caller's
//! responsibility.

use std::fmt;
use std::num::NonZeroUsize;

/// Non-nil pointer to a foreign object (instances and classes alike)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectPtr(NonZeroUsize);

impl ObjectPtr {
    /// Wrap an address, returning `None` for nil
    pub const fn new(addr: usize) -> Option<Self> {
        match NonZeroUsize::new(addr) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Raw address
    pub const fn addr(self) -> usize {
        self.0.get()
    }

    /// Address of an optional pointer, 0 for nil
    pub fn addr_of(ptr: Option<ObjectPtr>) -> usize {
        ptr.map_or(0, ObjectPtr::addr)
    }
}

impl fmt::Debug for ObjectPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPtr({:#x})", self.addr())
    }
}

impl fmt::Display for ObjectPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

/// Interned selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sel(pub usize);

/// Method implementation pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Imp(pub usize);

/// Method metadata handle (`Method`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef(pub usize);

/// Which method table a lookup goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodSide {
    /// `+` methods, looked up when the receiver is a class
    Class,
    /// `-` methods
    Instance,
}

impl MethodSide {
    /// `+` or `-`, as in `-[NSString length]`
    pub const fn sigil(self) -> char {
        match self {
            MethodSide::Class => '+',
            MethodSide::Instance => '-',
        }
    }
}
