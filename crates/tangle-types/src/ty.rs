//! Structural type descriptors.
//!
//! A [`Type`] is a shared, immutable description of a value's shape. Types
//! are identified by their canonical [`name`](TypeDesc::name) — the registry
//! keys on it, and the identity model pairs it with a storage address, so
//! two structurally distinct types must never render the same name. Type
//! equality is name equality.
//!
//! The canonical grammar:
//!
//! | Shape | Name |
//! |---|---|
//! | primitive | `bool`, `string`, `i8` … `u64`, `int`, `uint`, `f32`, `f64`, `complex64`, `complex128`, `uintptr`, `rawptr`, `any` |
//! | named | the declared name, verbatim |
//! | pointer | `*T` |
//! | slice | `[]T` |
//! | array | `[N]T` |
//! | map | `map[K]V` |
//! | struct | declared name, or `struct { f1 T1; f2 T2 }` |
//! | channel | `chan T`, `<-chan T`, `chan<- T` |
//! | function | the signature string, verbatim |
//!
//! Self-referential types (`type Node *Node`) are tied through [`recursive`];
//! the resulting descriptor cycle is immortal, like any registry-held type.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::kind::Kind;

/// Shared handle to a type descriptor.
pub type Type = Arc<TypeDesc>;

/// Direction of a channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    /// Send-only (`chan<-`).
    Send,
    /// Receive-only (`<-chan`).
    Recv,
    /// Bidirectional.
    Both,
}

/// One field of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Blank and anonymous fields have no usable name on the wire; the
    /// named struct coding mode falls back to an index sentinel for them.
    pub fn is_blank(&self) -> bool {
        self.name.is_empty() || self.name == "_"
    }
}

/// A structural type descriptor. Construct through the free functions in
/// this module ([`primitive`], [`pointer_to`], [`struct_of`], …).
#[derive(Clone)]
pub enum TypeDesc {
    /// The reserved nil type (registry id 0).
    Nil,
    /// The empty interface (`any`).
    Any,
    Bool,
    Str,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Uint,
    Int,
    Uintptr,
    RawPtr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    /// A declared name over another type (`type Celsius f64`). The
    /// underlying slot is set exactly once; [`recursive`] fills it after
    /// construction so the name can appear inside its own definition.
    Named {
        name: String,
        underlying: OnceLock<Type>,
    },
    Pointer { elem: Type },
    Slice { elem: Type },
    Array { len: usize, elem: Type },
    Map { key: Type, value: Type },
    Struct {
        name: Option<String>,
        fields: Vec<StructField>,
    },
    Chan { dir: ChanDir, elem: Type },
    Func { sig: String },
}

impl TypeDesc {
    /// The kind of values of this type. Named types share the kind of
    /// their underlying type.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Nil => Kind::Nil,
            Self::Any => Kind::Interface,
            Self::Bool => Kind::Bool,
            Self::Str => Kind::String,
            Self::Uint8 => Kind::Uint8,
            Self::Int8 => Kind::Int8,
            Self::Uint16 => Kind::Uint16,
            Self::Int16 => Kind::Int16,
            Self::Uint32 => Kind::Uint32,
            Self::Int32 => Kind::Int32,
            Self::Uint64 => Kind::Uint64,
            Self::Int64 => Kind::Int64,
            Self::Uint => Kind::Uint,
            Self::Int => Kind::Int,
            Self::Uintptr => Kind::Uintptr,
            Self::RawPtr => Kind::RawPtr,
            Self::Float32 => Kind::Float32,
            Self::Float64 => Kind::Float64,
            Self::Complex64 => Kind::Complex64,
            Self::Complex128 => Kind::Complex128,
            Self::Named { .. } => self.underlying().kind(),
            Self::Pointer { .. } => Kind::Pointer,
            Self::Slice { .. } => Kind::Slice,
            Self::Array { .. } => Kind::Array,
            Self::Map { .. } => Kind::Map,
            Self::Struct { .. } => Kind::Struct,
            Self::Chan { .. } => Kind::Chan,
            Self::Func { .. } => Kind::Func,
        }
    }

    /// Resolve through `Named` wrappers to the structural type.
    pub fn underlying(&self) -> &TypeDesc {
        let mut t = self;
        while let Self::Named { underlying, .. } = t {
            t = underlying
                .get()
                .expect("recursive type used before its definition was tied");
        }
        t
    }

    /// Element type of pointers, slices, arrays and channels.
    pub fn elem(&self) -> Option<&Type> {
        match self.underlying() {
            Self::Pointer { elem }
            | Self::Slice { elem }
            | Self::Array { elem, .. }
            | Self::Chan { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Key/value types of a map.
    pub fn map_types(&self) -> Option<(&Type, &Type)> {
        match self.underlying() {
            Self::Map { key, value } => Some((key, value)),
            _ => None,
        }
    }

    /// Struct field descriptors.
    pub fn fields(&self) -> Option<&[StructField]> {
        match self.underlying() {
            Self::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Fixed length of an array type.
    pub fn array_len(&self) -> Option<usize> {
        match self.underlying() {
            Self::Array { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// The canonical name (registry and identity key).
    pub fn name(&self) -> String {
        match self {
            Self::Nil => "nil".to_owned(),
            Self::Any => "any".to_owned(),
            Self::Bool => "bool".to_owned(),
            Self::Str => "string".to_owned(),
            Self::Uint8 => "u8".to_owned(),
            Self::Int8 => "i8".to_owned(),
            Self::Uint16 => "u16".to_owned(),
            Self::Int16 => "i16".to_owned(),
            Self::Uint32 => "u32".to_owned(),
            Self::Int32 => "i32".to_owned(),
            Self::Uint64 => "u64".to_owned(),
            Self::Int64 => "i64".to_owned(),
            Self::Uint => "uint".to_owned(),
            Self::Int => "int".to_owned(),
            Self::Uintptr => "uintptr".to_owned(),
            Self::RawPtr => "rawptr".to_owned(),
            Self::Float32 => "f32".to_owned(),
            Self::Float64 => "f64".to_owned(),
            Self::Complex64 => "complex64".to_owned(),
            Self::Complex128 => "complex128".to_owned(),
            Self::Named { name, .. } => name.clone(),
            Self::Pointer { elem } => format!("*{}", elem.name()),
            Self::Slice { elem } => format!("[]{}", elem.name()),
            Self::Array { len, elem } => format!("[{len}]{}", elem.name()),
            Self::Map { key, value } => format!("map[{}]{}", key.name(), value.name()),
            Self::Struct { name, fields } => {
                if let Some(name) = name {
                    return name.clone();
                }
                let mut s = String::from("struct {");
                for (i, f) in fields.iter().enumerate() {
                    if i > 0 {
                        s.push(';');
                    }
                    s.push(' ');
                    s.push_str(&f.name);
                    s.push(' ');
                    s.push_str(&f.ty.name());
                }
                s.push_str(" }");
                s
            }
            Self::Chan { dir, elem } => match dir {
                ChanDir::Both => format!("chan {}", elem.name()),
                ChanDir::Recv => format!("<-chan {}", elem.name()),
                ChanDir::Send => format!("chan<- {}", elem.name()),
            },
            Self::Func { sig } => sig.clone(),
        }
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for TypeDesc {}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// The derived impl would chase descriptor cycles of recursive types.
impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDesc({})", self.name())
    }
}

/// The primitive type for a kind. Panics on composite kinds, which need
/// their element/field types.
pub fn primitive(kind: Kind) -> Type {
    let desc = match kind {
        Kind::Nil => TypeDesc::Nil,
        Kind::Interface => TypeDesc::Any,
        Kind::Bool => TypeDesc::Bool,
        Kind::String => TypeDesc::Str,
        Kind::Uint8 => TypeDesc::Uint8,
        Kind::Int8 => TypeDesc::Int8,
        Kind::Uint16 => TypeDesc::Uint16,
        Kind::Int16 => TypeDesc::Int16,
        Kind::Uint32 => TypeDesc::Uint32,
        Kind::Int32 => TypeDesc::Int32,
        Kind::Uint64 => TypeDesc::Uint64,
        Kind::Int64 => TypeDesc::Int64,
        Kind::Uint => TypeDesc::Uint,
        Kind::Int => TypeDesc::Int,
        Kind::Uintptr => TypeDesc::Uintptr,
        Kind::RawPtr => TypeDesc::RawPtr,
        Kind::Float32 => TypeDesc::Float32,
        Kind::Float64 => TypeDesc::Float64,
        Kind::Complex64 => TypeDesc::Complex64,
        Kind::Complex128 => TypeDesc::Complex128,
        other => panic!("{} is not a primitive kind", other.name()),
    };
    Arc::new(desc)
}

/// A declared name over another type.
pub fn named(name: impl Into<String>, underlying: Type) -> Type {
    let cell = OnceLock::new();
    cell.set(underlying).expect("fresh cell");
    Arc::new(TypeDesc::Named {
        name: name.into(),
        underlying: cell,
    })
}

/// A declared name whose definition mentions itself (`type Node *Node`).
/// The closure receives the named type and returns its underlying type.
pub fn recursive(name: impl Into<String>, build: impl FnOnce(&Type) -> Type) -> Type {
    let t: Type = Arc::new(TypeDesc::Named {
        name: name.into(),
        underlying: OnceLock::new(),
    });
    let u = build(&t);
    if let TypeDesc::Named { underlying, .. } = &*t {
        underlying.set(u).expect("fresh cell");
    }
    t
}

pub fn pointer_to(elem: Type) -> Type {
    Arc::new(TypeDesc::Pointer { elem })
}

pub fn slice_of(elem: Type) -> Type {
    Arc::new(TypeDesc::Slice { elem })
}

pub fn array_of(len: usize, elem: Type) -> Type {
    Arc::new(TypeDesc::Array { len, elem })
}

pub fn map_of(key: Type, value: Type) -> Type {
    Arc::new(TypeDesc::Map { key, value })
}

pub fn struct_of(name: Option<&str>, fields: Vec<StructField>) -> Type {
    Arc::new(TypeDesc::Struct {
        name: name.map(str::to_owned),
        fields,
    })
}

pub fn chan_of(dir: ChanDir, elem: Type) -> Type {
    Arc::new(TypeDesc::Chan { dir, elem })
}

pub fn func_sig(sig: impl Into<String>) -> Type {
    Arc::new(TypeDesc::Func { sig: sig.into() })
}
