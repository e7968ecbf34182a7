//! Bridge configuration

use std::sync::Arc;

use nsbridge_types::StructRegistry;

/// Options controlling a [`Bridge`](crate::Bridge)
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Above this many `_` in a host method name, only the escape mapping
    /// (`_` to `:`, `__` to `_`) is tried instead of all 2^k spellings
    pub max_selector_separators: usize,

    /// Whether `MethodNotFound` errors suggest a trailing `_`
    pub suggest_corrections: bool,

    /// Struct types used when parsing method encodings
    pub struct_registry: Arc<StructRegistry>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            max_selector_separators: 12,
            suggest_corrections: true,
            struct_registry: Arc::new(StructRegistry::with_foundation_types()),
        }
    }
}

impl BridgeOptions {
    /// Share the process-wide struct registry instead of a private one
    pub fn with_global_structs(mut self) -> Self {
        self.struct_registry = StructRegistry::global();
        self
    }
}
