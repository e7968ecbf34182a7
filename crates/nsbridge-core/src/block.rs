//! Blocks: host closures callable from foreign code
//!
//! A bridged block is a [`Trampoline`] kept alive in the process-wide
//! [`BlockRegistry`] until it is released. The foreign side only ever sees
//! a weak reference to it, so a call into a released block fails instead
//! of touching freed memory. Blocks created by foreign code are carried as
//! opaque addresses and handed back unchanged.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use nsbridge_sdk::{BlockInvoke, BlockPtr, CallResult, ForeignValue};
use nsbridge_types::{parse_one, parse_sequence, TypeDescriptor};

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::marshal;
use crate::value::HostValue;

/// Host function behind a block
pub type BlockFn = dyn Fn(&[HostValue]) -> BridgeResult<HostValue> + Send + Sync;

/// Registry key of a bridged block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Adapts a host function to the foreign calling convention
pub struct Trampoline {
    bridge: Bridge,
    function: Arc<BlockFn>,
    return_type: TypeDescriptor,
    /// Includes the leading block slot when `include_self` is set
    parameter_types: Vec<TypeDescriptor>,
    include_self: bool,
}

impl Trampoline {
    fn run(&self, args: &[ForeignValue]) -> BridgeResult<ForeignValue> {
        if args.len() != self.parameter_types.len() {
            return Err(BridgeError::ArgumentCount {
                selector: "block".to_string(),
                expected: self.parameter_types.len(),
                got: args.len(),
            });
        }
        let skip = usize::from(self.include_self);
        let host_args = self.parameter_types[skip..]
            .iter()
            .zip(&args[skip..])
            .map(|(ty, value)| {
                marshal::unmarshal(&self.bridge, ty, value).map_err(|err| {
                    err.into_bridge_error(&ty.to_string(), "unmarshaling a block argument")
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        let result = (self.function)(&host_args)?;

        if self.return_type.is_void() || result.is_null() {
            return Ok(marshal::null_of(&self.return_type));
        }
        marshal::marshal(&self.bridge, &self.return_type, &result).map_err(|err| {
            err.into_bridge_error(&self.return_type.to_string(), "marshaling a block result")
        })
    }
}

impl BlockInvoke for Trampoline {
    fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    fn parameter_types(&self) -> &[TypeDescriptor] {
        &self.parameter_types
    }

    fn invoke(&self, args: &[ForeignValue]) -> CallResult<ForeignValue> {
        self.run(args).map_err(BridgeError::into_foreign_exception)
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("return_type", &self.return_type)
            .field("parameter_types", &self.parameter_types)
            .field("include_self", &self.include_self)
            .finish_non_exhaustive()
    }
}

/// Process-wide arena of live trampolines
#[derive(Debug, Default)]
pub struct BlockRegistry {
    trampolines: DashMap<BlockId, Arc<Trampoline>>,
    next_id: AtomicU64,
}

static GLOBAL_BLOCKS: LazyLock<BlockRegistry> = LazyLock::new(BlockRegistry::default);

impl BlockRegistry {
    /// The process-wide registry
    pub fn global() -> &'static BlockRegistry {
        &GLOBAL_BLOCKS
    }

    fn register(&self, trampoline: Trampoline) -> BlockId {
        let id = BlockId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.trampolines.insert(id, Arc::new(trampoline));
        tracing::debug!(%id, "registered block");
        id
    }

    /// Live trampoline for `id`
    pub fn get(&self, id: BlockId) -> Option<Arc<Trampoline>> {
        self.trampolines.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the registry's reference; true if the block was live
    pub fn release(&self, id: BlockId) -> bool {
        self.trampolines.remove(&id).is_some()
    }

    /// Whether `id` is still registered
    pub fn contains(&self, id: BlockId) -> bool {
        self.trampolines.contains_key(&id)
    }

    /// Number of live blocks
    pub fn len(&self) -> usize {
        self.trampolines.len()
    }

    /// Check if no blocks are live
    pub fn is_empty(&self) -> bool {
        self.trampolines.is_empty()
    }
}

/// A block value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    /// Host closure registered with the bridge
    Bridged(BlockId),
    /// Block created by foreign code
    Opaque(usize),
}

impl Block {
    /// Wrap `function` as a block.
    ///
    /// `argument_types` are the encodings of the host-visible parameters.
    /// With `include_self` a leading `@` slot for the block itself is
    /// inserted; the foreign side passes it but the host function never
    /// sees it.
    pub fn new<F>(
        bridge: &Bridge,
        function: F,
        return_type: &str,
        argument_types: &[&str],
        include_self: bool,
    ) -> BridgeResult<Block>
    where
        F: Fn(&[HostValue]) -> BridgeResult<HostValue> + Send + Sync + 'static,
    {
        let return_type = parse_one(return_type, bridge.structs())?;
        let argument_types = argument_types
            .iter()
            .map(|encoding| parse_one(encoding, bridge.structs()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_types(
            bridge,
            Arc::new(function),
            return_type,
            argument_types,
            include_self,
        ))
    }

    /// Like [`Block::new`] with parsed types
    pub fn with_types(
        bridge: &Bridge,
        function: Arc<BlockFn>,
        return_type: TypeDescriptor,
        argument_types: Vec<TypeDescriptor>,
        include_self: bool,
    ) -> Block {
        let mut parameter_types = Vec::with_capacity(argument_types.len() + 1);
        if include_self {
            parameter_types.push(TypeDescriptor::Object);
        }
        parameter_types.extend(argument_types);
        let id = BlockRegistry::global().register(Trampoline {
            bridge: bridge.clone(),
            function,
            return_type,
            parameter_types,
            include_self,
        });
        Block::Bridged(id)
    }

    /// Wrap a block pointer received from the runtime
    pub fn from_foreign(ptr: &BlockPtr) -> Block {
        match ptr {
            BlockPtr::Bridged { id, .. } => Block::Bridged(BlockId(*id)),
            BlockPtr::Opaque(addr) => Block::Opaque(*addr),
        }
    }

    /// Registry id of a bridged block
    pub fn id(&self) -> Option<BlockId> {
        match self {
            Block::Bridged(id) => Some(*id),
            Block::Opaque(_) => None,
        }
    }

    /// Whether the host closure behind a bridged block is gone
    pub fn is_released(&self) -> bool {
        match self {
            Block::Bridged(id) => !BlockRegistry::global().contains(*id),
            Block::Opaque(_) => false,
        }
    }

    /// Release the host closure. Foreign code still holding the block gets
    /// an exception when calling it.
    pub fn release(&self) -> bool {
        match self {
            Block::Bridged(id) => {
                let released = BlockRegistry::global().release(*id);
                if released {
                    tracing::debug!(%id, "released block");
                }
                released
            }
            Block::Opaque(_) => false,
        }
    }

    /// The pointer handed to the foreign runtime
    pub fn foreign_ptr(&self) -> BridgeResult<BlockPtr> {
        match self {
            Block::Bridged(id) => {
                let trampoline = BlockRegistry::global()
                    .get(*id)
                    .ok_or(BridgeError::ReleasedCallable { id: id.0 })?;
                let entry: Arc<dyn BlockInvoke> = trampoline;
                Ok(BlockPtr::Bridged {
                    id: id.0,
                    entry: Arc::downgrade(&entry),
                })
            }
            Block::Opaque(addr) => Ok(BlockPtr::Opaque(*addr)),
        }
    }

    /// Call a bridged block the way foreign code would: arguments are
    /// marshaled to the parameter types and the result unmarshaled back
    pub fn call(&self, args: &[HostValue]) -> BridgeResult<HostValue> {
        let Block::Bridged(id) = self else {
            return Err(BridgeError::UnsupportedType {
                encoding: "@?".to_string(),
                reason: "blocks created by foreign code cannot be called from the host"
                    .to_string(),
            });
        };
        let trampoline = BlockRegistry::global()
            .get(*id)
            .ok_or(BridgeError::ReleasedCallable { id: id.0 })?;
        let bridge = &trampoline.bridge;

        let mut foreign = Vec::with_capacity(trampoline.parameter_types.len());
        if trampoline.include_self {
            foreign.push(ForeignValue::Block(Some(self.foreign_ptr()?)));
        }
        let skip = usize::from(trampoline.include_self);
        let explicit = &trampoline.parameter_types[skip..];
        if args.len() != explicit.len() {
            return Err(BridgeError::ArgumentCount {
                selector: format!("block {}", id),
                expected: explicit.len(),
                got: args.len(),
            });
        }
        for (ty, arg) in explicit.iter().zip(args) {
            foreign.push(marshal::marshal(bridge, ty, arg).map_err(|err| {
                err.into_bridge_error(&ty.to_string(), "marshaling a block argument")
            })?);
        }

        let result = trampoline.invoke(&foreign).map_err(BridgeError::from)?;
        marshal::unmarshal(bridge, &trampoline.return_type, &result).map_err(|err| {
            err.into_bridge_error(
                &trampoline.return_type.to_string(),
                "unmarshaling a block result",
            )
        })
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Bridged(id) => write!(f, "[objc.Block {}]", id),
            Block::Opaque(addr) => write!(f, "[objc.Block {:#x}]", addr),
        }
    }
}

/// A parsed block signature, for creating many blocks of the same type
#[derive(Debug, Clone, PartialEq)]
pub struct BlockType {
    encoding: String,
    return_type: TypeDescriptor,
    argument_types: Vec<TypeDescriptor>,
}

impl BlockType {
    /// Parse a block signature: return type first, then the block slot
    /// (`@`), then the parameters, e.g. `q@@@` for a comparator
    pub fn define(bridge: &Bridge, encoding: &str) -> BridgeResult<BlockType> {
        let mut types = parse_sequence(encoding, bridge.structs())?.into_iter();
        let return_type = types.next().unwrap_or(TypeDescriptor::VOID);
        match types.next() {
            Some(TypeDescriptor::Object) => {}
            _ => {
                return Err(BridgeError::UnsupportedType {
                    encoding: encoding.to_string(),
                    reason: "block signatures start with the return type and the block slot '@'"
                        .to_string(),
                })
            }
        }
        Ok(BlockType {
            encoding: encoding.to_string(),
            return_type,
            argument_types: types.collect(),
        })
    }

    /// Original encoding
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Return type
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    /// Host-visible parameter types
    pub fn argument_types(&self) -> &[TypeDescriptor] {
        &self.argument_types
    }

    /// Create a block of this type
    pub fn create<F>(&self, bridge: &Bridge, function: F) -> Block
    where
        F: Fn(&[HostValue]) -> BridgeResult<HostValue> + Send + Sync + 'static,
    {
        Block::with_types(
            bridge,
            Arc::new(function),
            self.return_type.clone(),
            self.argument_types.clone(),
            true,
        )
    }
}

/// Named block types
#[derive(Debug, Default)]
pub struct BlockTypes {
    types: DashMap<String, Arc<BlockType>>,
}

impl BlockTypes {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `encoding` and register it as `name`, replacing any earlier
    /// definition
    pub fn define(
        &self,
        bridge: &Bridge,
        name: &str,
        encoding: &str,
    ) -> BridgeResult<Arc<BlockType>> {
        let ty = Arc::new(BlockType::define(bridge, encoding)?);
        self.types.insert(name.to_string(), Arc::clone(&ty));
        Ok(ty)
    }

    /// Block type registered as `name`
    pub fn get(&self, name: &str) -> Option<Arc<BlockType>> {
        self.types.get(name).map(|entry| Arc::clone(entry.value()))
    }
}
