//! In/out reference cells
//!
//! Methods such as `-[NSURL getResourceValue:forKey:error:]` return extra
//! results through pointer arguments. An `InOutRef` stands in for such an
//! argument: the pointed-to type is only learned when the cell is marshaled
//! into an in/out position, and the value is read back once the call
//! returns.

use std::fmt;
use std::sync::Arc;

use nsbridge_sdk::{out_slot, ForeignValue, OutSlot};
use nsbridge_types::TypeDescriptor;
use parking_lot::Mutex;

use crate::bridge::Bridge;
use crate::error::BridgeResult;
use crate::marshal::{self, MarshalError};
use crate::value::HostValue;

enum RefState {
    /// Holds the value to pass in; type not yet known
    Unbound(HostValue),
    /// Marshaled into a call; the callee may write through `slot`
    Bound {
        ty: TypeDescriptor,
        slot: OutSlot,
        initial: HostValue,
    },
    /// Value read back after the call
    Read(HostValue),
}

/// A mutable cell passed to pointer-to-value parameters
///
/// Clones share the same cell. Not meant to be shared across threads while
/// a call is in flight; the lock only provides interior mutability.
#[derive(Clone)]
pub struct InOutRef {
    state: Arc<Mutex<RefState>>,
}

impl InOutRef {
    /// A cell holding `initial`
    pub fn new(initial: impl Into<HostValue>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefState::Unbound(initial.into()))),
        }
    }

    /// A cell holding null, the usual way to receive an `NSError **`
    pub fn empty() -> Self {
        Self::new(HostValue::Null)
    }

    /// Current value: the value read back after the last call, or the
    /// initial value if the cell has not been through a call yet
    pub fn value(&self) -> HostValue {
        match &*self.state.lock() {
            RefState::Unbound(value) | RefState::Read(value) => value.clone(),
            RefState::Bound { initial, .. } => initial.clone(),
        }
    }

    /// Replace the value, unbinding the cell
    pub fn set(&self, value: impl Into<HostValue>) {
        *self.state.lock() = RefState::Unbound(value.into());
    }

    /// Pointed-to type discovered by the last call, if any
    pub fn bound_type(&self) -> Option<TypeDescriptor> {
        match &*self.state.lock() {
            RefState::Bound { ty, .. } => Some(ty.clone()),
            _ => None,
        }
    }

    /// Whether a call has bound the cell and not yet read it back
    pub fn is_bound(&self) -> bool {
        matches!(&*self.state.lock(), RefState::Bound { .. })
    }

    /// A cell already bound to foreign storage, as received by a block
    /// callback with a pointer parameter
    pub(crate) fn from_slot(ty: TypeDescriptor, slot: OutSlot, initial: HostValue) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefState::Bound { ty, slot, initial })),
        }
    }

    /// Marshal the current value into a fresh slot typed `target`.
    ///
    /// Rebinding a cell that is already bound replaces the earlier binding.
    pub(crate) fn bind(
        &self,
        bridge: &Bridge,
        target: &TypeDescriptor,
    ) -> Result<ForeignValue, MarshalError> {
        let initial = self.value();
        let foreign = if initial.is_null() {
            marshal::null_of(target)
        } else {
            marshal::marshal(bridge, target, &initial)?
        };
        let slot = out_slot(foreign);
        *self.state.lock() = RefState::Bound {
            ty: target.clone(),
            slot: Arc::clone(&slot),
            initial,
        };
        Ok(ForeignValue::Reference(slot))
    }

    /// Unmarshal the slot contents after the call returned
    pub(crate) fn read_back(&self, bridge: &Bridge) -> BridgeResult<HostValue> {
        let (ty, slot) = match &*self.state.lock() {
            RefState::Bound { ty, slot, .. } => (ty.clone(), Arc::clone(slot)),
            RefState::Unbound(value) | RefState::Read(value) => return Ok(value.clone()),
        };
        let foreign = slot.lock().clone();
        let value = marshal::unmarshal(bridge, &ty, &foreign).map_err(|err| {
            err.into_bridge_error(&ty.to_string(), "reading back an in/out argument")
        })?;
        *self.state.lock() = RefState::Read(value.clone());
        Ok(value)
    }

    /// Write through a bound cell from inside a block callback
    pub fn store(&self, bridge: &Bridge, value: impl Into<HostValue>) -> BridgeResult<()> {
        let value = value.into();
        let mut state = self.state.lock();
        match &*state {
            RefState::Bound { ty, slot, .. } => {
                let foreign = if value.is_null() {
                    marshal::null_of(ty)
                } else {
                    marshal::marshal(bridge, ty, &value).map_err(|err| {
                        err.into_bridge_error(&ty.to_string(), "writing an in/out argument")
                    })?
                };
                *slot.lock() = foreign;
            }
            _ => *state = RefState::Unbound(value),
        }
        Ok(())
    }
}

impl PartialEq for InOutRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for InOutRef {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for InOutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.lock() {
            RefState::Unbound(value) => write!(f, "InOutRef::Unbound({:?})", value),
            RefState::Bound { ty, .. } => write!(f, "InOutRef::Bound({})", ty),
            RefState::Read(value) => write!(f, "InOutRef::Read({:?})", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_value() {
        let cell = InOutRef::new(3);
        assert_eq!(cell.value(), HostValue::Number(3.0));
        assert!(!cell.is_bound());
        assert!(cell.bound_type().is_none());
    }

    #[test]
    fn test_set_is_last_write_wins() {
        let cell = InOutRef::empty();
        let alias = cell.clone();
        cell.set("first");
        alias.set("second");
        assert_eq!(cell.value(), HostValue::Text("second".to_string()));
        assert_eq!(cell, alias);
        assert_ne!(cell, InOutRef::empty());
    }
}
