//! Registry of named struct types
//!
//! Every struct definition the parser encounters lands here, keyed by its
//! tag and by the exact encoding text it was parsed from. The runtime
//! reports the same struct with varying detail (`{_NSRange=QQ}` in a method
//! signature, `{_NSRange="location"Q"length"Q}` from metadata), so a later
//! definition replaces an earlier one only when it carries more field
//! information.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::error::{EncodingError, EncodingResult};
use crate::parser::parse_one;
use crate::ty::{StructType, TypeDescriptor};

static GLOBAL: LazyLock<Arc<StructRegistry>> =
    LazyLock::new(|| Arc::new(StructRegistry::with_foundation_types()));

/// Definitions preloaded by [`StructRegistry::with_foundation_types`]
const FOUNDATION_TYPES: &[(&str, &[&str])] = &[
    ("{CGPoint=\"x\"d\"y\"d}", &["NSPoint"]),
    ("{CGSize=\"width\"d\"height\"d}", &["NSSize"]),
    ("{CGRect=\"origin\"{CGPoint}\"size\"{CGSize}}", &["NSRect"]),
    ("{_NSRange=\"location\"Q\"length\"Q}", &["NSRange"]),
];

/// Struct type cache shared by the parser and the bridge
///
/// Entries are append-mostly: a merge swaps which `Arc` a key points at but
/// never mutates a `StructType` already handed out.
pub struct StructRegistry {
    types: DashMap<String, Arc<StructType>>,
}

impl StructRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Create a registry preloaded with the common geometry and range structs
    /// (`CGPoint`, `CGSize`, `CGRect`, `_NSRange` and their `NS` aliases)
    pub fn with_foundation_types() -> Self {
        let registry = Self::new();
        for (encoding, aliases) in FOUNDATION_TYPES {
            if let Err(err) = registry.define(encoding, aliases) {
                tracing::warn!(%encoding, %err, "failed to preload struct type");
            }
        }
        registry
    }

    /// The process-wide registry
    pub fn global() -> Arc<StructRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Look up a struct by tag, alias or full encoding
    pub fn lookup(&self, key: &str) -> Option<Arc<StructType>> {
        self.types.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a struct, failing with [`EncodingError::UndefinedStruct`]
    pub fn get(&self, key: &str) -> EncodingResult<Arc<StructType>> {
        self.lookup(key).ok_or_else(|| EncodingError::UndefinedStruct {
            name: key.to_string(),
        })
    }

    /// Whether `key` is bound
    pub fn contains(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }

    /// Number of bound keys (names, aliases and encodings)
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Merge a freshly parsed definition, returning the entry that won.
    ///
    /// The new definition replaces the current one for its tag only when it
    /// is strictly more complete; every key bound to the replaced entry is
    /// re-pointed. Either way `encoding` becomes an alias of the winner.
    pub fn merge(&self, definition: StructType, encoding: &str) -> Arc<StructType> {
        let name = definition.name().to_string();
        let existing = self.lookup(&name);

        match existing {
            Some(current) if definition.completeness() <= current.completeness() => {
                self.types
                    .entry(encoding.to_string())
                    .or_insert_with(|| Arc::clone(&current));
                current
            }
            Some(current) => {
                let winner = Arc::new(definition);
                tracing::debug!(
                    struct_name = %name,
                    %encoding,
                    previous = %current,
                    "replacing struct definition with a more complete one"
                );
                for mut entry in self.types.iter_mut() {
                    if Arc::ptr_eq(entry.value(), &current) {
                        *entry.value_mut() = Arc::clone(&winner);
                    }
                }
                self.types.insert(encoding.to_string(), Arc::clone(&winner));
                winner
            }
            None => {
                let winner = Arc::new(definition);
                tracing::debug!(struct_name = %name, %encoding, "registered struct type");
                self.types.insert(name, Arc::clone(&winner));
                self.types.insert(encoding.to_string(), Arc::clone(&winner));
                winner
            }
        }
    }

    /// Bind an additional name to an existing struct type
    ///
    /// Rebinding an alias to the same type is a no-op; binding it to a
    /// different type fails with [`EncodingError::AliasExists`].
    pub fn alias(&self, alias: &str, ty: &Arc<StructType>) -> EncodingResult<()> {
        match self.types.entry(alias.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                if Arc::ptr_eq(entry.get(), ty) {
                    Ok(())
                } else {
                    Err(EncodingError::AliasExists {
                        alias: alias.to_string(),
                    })
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::clone(ty));
                Ok(())
            }
        }
    }

    /// Parse a struct encoding, register it and bind the given aliases
    pub fn define(&self, encoding: &str, aliases: &[&str]) -> EncodingResult<Arc<StructType>> {
        let ty = match parse_one(encoding, self)? {
            TypeDescriptor::Struct(ty) => ty,
            _ => {
                return Err(EncodingError::NotAStructEncoding {
                    encoding: encoding.to_string(),
                })
            }
        };
        for alias in aliases {
            self.alias(alias, &ty)?;
        }
        Ok(ty)
    }
}

impl Default for StructRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StructRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructRegistry")
            .field("keys", &self.types.len())
            .finish()
    }
}
