//! Core type descriptors for foreign type encodings

use std::fmt;
use std::sync::Arc;

/// Scalar types with a single-letter encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `c` - char (also the classic encoding of `BOOL`)
    Char,
    /// `i` - int
    Int,
    /// `s` - short
    Short,
    /// `l` - long (a 32-bit quantity even on 64-bit targets)
    Long,
    /// `q` - long long
    LongLong,
    /// `C` - unsigned char
    UChar,
    /// `I` - unsigned int
    UInt,
    /// `S` - unsigned short
    UShort,
    /// `L` - unsigned long (32-bit)
    ULong,
    /// `Q` - unsigned long long
    ULongLong,
    /// `f` - float
    Float,
    /// `d` - double
    Double,
    /// `B` - C99 `_Bool`
    Bool,
    /// `v` - void
    Void,
    /// `*` - C string (`char *`)
    CString,
}

impl PrimitiveKind {
    /// Map an encoding letter to its primitive kind
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'c' => PrimitiveKind::Char,
            b'i' => PrimitiveKind::Int,
            b's' => PrimitiveKind::Short,
            b'l' => PrimitiveKind::Long,
            b'q' => PrimitiveKind::LongLong,
            b'C' => PrimitiveKind::UChar,
            b'I' => PrimitiveKind::UInt,
            b'S' => PrimitiveKind::UShort,
            b'L' => PrimitiveKind::ULong,
            b'Q' => PrimitiveKind::ULongLong,
            b'f' => PrimitiveKind::Float,
            b'd' => PrimitiveKind::Double,
            b'B' => PrimitiveKind::Bool,
            b'v' => PrimitiveKind::Void,
            b'*' => PrimitiveKind::CString,
            _ => return None,
        })
    }

    /// The encoding letter for this kind
    pub const fn code(self) -> char {
        match self {
            PrimitiveKind::Char => 'c',
            PrimitiveKind::Int => 'i',
            PrimitiveKind::Short => 's',
            PrimitiveKind::Long => 'l',
            PrimitiveKind::LongLong => 'q',
            PrimitiveKind::UChar => 'C',
            PrimitiveKind::UInt => 'I',
            PrimitiveKind::UShort => 'S',
            PrimitiveKind::ULong => 'L',
            PrimitiveKind::ULongLong => 'Q',
            PrimitiveKind::Float => 'f',
            PrimitiveKind::Double => 'd',
            PrimitiveKind::Bool => 'B',
            PrimitiveKind::Void => 'v',
            PrimitiveKind::CString => '*',
        }
    }

    /// C-style name, used in diagnostics
    pub const fn c_name(self) -> &'static str {
        match self {
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int32",
            PrimitiveKind::Short => "int16",
            PrimitiveKind::Long => "int32",
            PrimitiveKind::LongLong => "int64",
            PrimitiveKind::UChar => "uchar",
            PrimitiveKind::UInt => "uint32",
            PrimitiveKind::UShort => "uint16",
            PrimitiveKind::ULong => "uint32",
            PrimitiveKind::ULongLong => "uint64",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Void => "void",
            PrimitiveKind::CString => "CString",
        }
    }

    /// Signed integer kinds
    pub const fn is_signed_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Char
                | PrimitiveKind::Int
                | PrimitiveKind::Short
                | PrimitiveKind::Long
                | PrimitiveKind::LongLong
        )
    }

    /// Unsigned integer kinds
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            PrimitiveKind::UChar
                | PrimitiveKind::UInt
                | PrimitiveKind::UShort
                | PrimitiveKind::ULong
                | PrimitiveKind::ULongLong
        )
    }

    /// Floating point kinds
    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// Size in bytes on a 64-bit target (`void` is 0, `char *` is pointer sized)
    pub const fn size(self) -> usize {
        match self {
            PrimitiveKind::Char | PrimitiveKind::UChar | PrimitiveKind::Bool => 1,
            PrimitiveKind::Short | PrimitiveKind::UShort => 2,
            PrimitiveKind::Int
            | PrimitiveKind::UInt
            | PrimitiveKind::Long
            | PrimitiveKind::ULong
            | PrimitiveKind::Float => 4,
            PrimitiveKind::LongLong
            | PrimitiveKind::ULongLong
            | PrimitiveKind::Double
            | PrimitiveKind::CString => 8,
            PrimitiveKind::Void => 0,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Whether an aggregate was encoded as a struct (`{}`) or a union (`()`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    /// `{name=...}`
    Struct,
    /// `(name=...)`
    Union,
}

impl AggregateKind {
    /// Opening delimiter
    pub const fn open(self) -> char {
        match self {
            AggregateKind::Struct => '{',
            AggregateKind::Union => '(',
        }
    }

    /// Closing delimiter
    pub const fn close(self) -> char {
        match self {
            AggregateKind::Struct => '}',
            AggregateKind::Union => ')',
        }
    }
}

/// A single struct member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    /// Member name (`"x"`), absent in method-signature encodings such as `{_NSRange=QQ}`
    pub name: Option<String>,
    /// Member type
    pub ty: TypeDescriptor,
}

impl StructField {
    /// Create a named field
    pub fn named(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    /// Create an unnamed field
    pub fn unnamed(ty: TypeDescriptor) -> Self {
        Self { name: None, ty }
    }
}

/// A named aggregate type
///
/// A struct with a name and no fields is a forward reference (`{Opaque=}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    name: String,
    kind: AggregateKind,
    fields: Vec<StructField>,
}

impl StructType {
    /// Create a struct type
    pub fn new(name: impl Into<String>, kind: AggregateKind, fields: Vec<StructField>) -> Self {
        Self {
            name: name.into(),
            kind,
            fields,
        }
    }

    /// Struct tag, e.g. `CGRect`, or `?` for anonymous structs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Struct or union
    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    /// Members in declaration order
    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    /// Index of the member with the given name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name.as_deref() == Some(name))
    }

    /// Number of members that carry a name
    pub fn named_field_count(&self) -> usize {
        self.fields.iter().filter(|field| field.name.is_some()).count()
    }

    /// How much field information this definition carries.
    ///
    /// Compared lexicographically when two definitions share a name.
    pub fn completeness(&self) -> (usize, usize) {
        (self.named_field_count(), self.fields.len())
    }

    /// Forward reference without any field information
    pub fn is_forward(&self) -> bool {
        self.fields.is_empty()
    }

    /// Anonymous aggregate (`{?=...}`)
    pub fn is_anonymous(&self) -> bool {
        self.name == "?"
    }

    /// Full encoding string, e.g. `{CGPoint="x"d"y"d}`
    pub fn encoding(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}=", self.kind.open(), self.name)?;
        for field in &self.fields {
            if let Some(name) = &field.name {
                write!(f, "\"{}\"", name)?;
            }
            write!(f, "{}", field.ty)?;
        }
        write!(f, "{}", self.kind.close())
    }
}

/// A parsed type encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// Scalar or C string
    Primitive(PrimitiveKind),
    /// `^type`, with the number of `^` levels
    Pointer {
        /// The pointed-to type
        pointee: Box<TypeDescriptor>,
        /// Number of `^` prefixes (always >= 1)
        indirection: u8,
    },
    /// `{name=...}` or `(name=...)`
    Struct(Arc<StructType>),
    /// `[N type]`
    Array {
        /// Element count (always > 0)
        length: usize,
        /// Element type
        element: Box<TypeDescriptor>,
    },
    /// `@` - an object (`id`)
    Object,
    /// `#` - a class object
    Class,
    /// `:` - a selector
    Selector,
    /// `@?` - a block
    Block,
    /// `?` - unknown type, typically a function pointer
    UnknownOpaque,
}

impl TypeDescriptor {
    /// `void`
    pub const VOID: TypeDescriptor = TypeDescriptor::Primitive(PrimitiveKind::Void);

    /// `^v`, the generic pointer the receiver and selector slots are forced to
    pub fn opaque_pointer() -> Self {
        Self::pointer_to(Self::VOID, 1)
    }

    /// Pointer to `pointee` with the given indirection
    pub fn pointer_to(pointee: TypeDescriptor, indirection: u8) -> Self {
        TypeDescriptor::Pointer {
            pointee: Box::new(pointee),
            indirection: indirection.max(1),
        }
    }

    /// `void`
    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Primitive(PrimitiveKind::Void))
    }

    /// Types passed as a foreign object pointer (`@`, `#`)
    pub fn is_object_like(&self) -> bool {
        matches!(self, TypeDescriptor::Object | TypeDescriptor::Class)
    }

    /// Single-level pointer to a value the callee may read and write.
    ///
    /// `^@` (e.g. `NSError **`) is the common case; `^v`, `^?` and double
    /// indirection are opaque pointers instead.
    pub fn is_inout_reference(&self) -> bool {
        self.inout_target().is_some()
    }

    /// The pointed-to type of an in/out reference
    pub fn inout_target(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::Pointer {
                pointee,
                indirection: 1,
            } => match pointee.as_ref() {
                TypeDescriptor::Primitive(PrimitiveKind::Void) | TypeDescriptor::UnknownOpaque => {
                    None
                }
                TypeDescriptor::Struct(st) if st.is_forward() => None,
                other => Some(other),
            },
            _ => None,
        }
    }

    /// Short human-readable kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeDescriptor::Primitive(kind) => kind.c_name(),
            TypeDescriptor::Pointer { .. } => "pointer",
            TypeDescriptor::Struct(st) => match st.kind() {
                AggregateKind::Struct => "struct",
                AggregateKind::Union => "union",
            },
            TypeDescriptor::Array { .. } => "array",
            TypeDescriptor::Object => "object",
            TypeDescriptor::Class => "class",
            TypeDescriptor::Selector => "selector",
            TypeDescriptor::Block => "block",
            TypeDescriptor::UnknownOpaque => "unknown",
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(kind) => write!(f, "{}", kind),
            TypeDescriptor::Pointer {
                pointee,
                indirection,
            } => {
                for _ in 0..*indirection {
                    f.write_str("^")?;
                }
                write!(f, "{}", pointee)
            }
            TypeDescriptor::Struct(st) => write!(f, "{}", st),
            TypeDescriptor::Array { length, element } => write!(f, "[{}{}]", length, element),
            TypeDescriptor::Object => f.write_str("@"),
            TypeDescriptor::Class => f.write_str("#"),
            TypeDescriptor::Selector => f.write_str(":"),
            TypeDescriptor::Block => f.write_str("@?"),
            TypeDescriptor::UnknownOpaque => f.write_str("?"),
        }
    }
}
