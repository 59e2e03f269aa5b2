//! The dynamic value model.
//!
//! A [`Value`] pairs a [`Type`] with a payload. Payloads that are shared by
//! reference in the source model (string buffers, slice/map contents,
//! channel and function handles) are `Arc`s here — cloning a value shares
//! them, and the `Arc` pointer doubles as the value's identity address.
//! Addressable storage lives in the [`Heap`](crate::heap::Heap); pointers
//! hold [`Place`]s into it.

use std::sync::Arc;

use crate::heap::Place;
use crate::kind::Kind;
use crate::ty::{self, Type, TypeDesc};

/// A channel handle. Only the capacity survives serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChanVal {
    pub cap: usize,
}

/// A function handle, identified by a qualified symbolic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncVal {
    pub name: String,
}

impl FuncVal {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

/// Value payload. The variant must agree with the kind of the value's type;
/// the [`Value`] constructors maintain that invariant.
#[derive(Debug, Clone)]
pub enum Data {
    /// The untyped nil / invalid value.
    Nil,
    Bool(bool),
    Str(Arc<[u8]>),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Uint(u64),
    Int(i64),
    Uintptr(u64),
    /// Raw untyped pointer; 0 is the null pointer.
    RawPtr(u64),
    F32(f32),
    F64(f64),
    C64(f32, f32),
    C128(f64, f64),
    Array(Vec<Value>),
    Slice(Option<Arc<Vec<Value>>>),
    Map(Option<Arc<Vec<(Value, Value)>>>),
    Struct(Vec<Value>),
    Iface(Option<Box<Value>>),
    Ptr(Option<Place>),
    Chan(Option<Arc<ChanVal>>),
    Func(Option<Arc<FuncVal>>),
}

impl Data {
    fn kind(&self) -> Kind {
        match self {
            Self::Nil => Kind::Nil,
            Self::Bool(_) => Kind::Bool,
            Self::Str(_) => Kind::String,
            Self::U8(_) => Kind::Uint8,
            Self::I8(_) => Kind::Int8,
            Self::U16(_) => Kind::Uint16,
            Self::I16(_) => Kind::Int16,
            Self::U32(_) => Kind::Uint32,
            Self::I32(_) => Kind::Int32,
            Self::U64(_) => Kind::Uint64,
            Self::I64(_) => Kind::Int64,
            Self::Uint(_) => Kind::Uint,
            Self::Int(_) => Kind::Int,
            Self::Uintptr(_) => Kind::Uintptr,
            Self::RawPtr(_) => Kind::RawPtr,
            Self::F32(_) => Kind::Float32,
            Self::F64(_) => Kind::Float64,
            Self::C64(..) => Kind::Complex64,
            Self::C128(..) => Kind::Complex128,
            Self::Array(_) => Kind::Array,
            Self::Slice(_) => Kind::Slice,
            Self::Map(_) => Kind::Map,
            Self::Struct(_) => Kind::Struct,
            Self::Iface(_) => Kind::Interface,
            Self::Ptr(_) => Kind::Pointer,
            Self::Chan(_) => Kind::Chan,
            Self::Func(_) => Kind::Func,
        }
    }
}

/// A dynamically-typed value.
#[derive(Debug, Clone)]
pub struct Value {
    ty: Type,
    data: Data,
}

impl Value {
    /// Pair a type with a payload. The payload's kind must match the
    /// type's kind.
    pub fn new(ty: Type, data: Data) -> Self {
        debug_assert_eq!(ty.kind(), data.kind(), "type/payload kind mismatch");
        Self { ty, data }
    }

    /// Re-type this value with a named (or otherwise compatible) type of
    /// the same kind.
    pub fn with_type(mut self, ty: Type) -> Self {
        debug_assert_eq!(ty.kind(), self.data.kind(), "type/payload kind mismatch");
        self.ty = ty;
        self
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn kind(&self) -> Kind {
        self.data.kind()
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// The untyped nil value.
    pub fn nil() -> Self {
        Self {
            ty: ty::primitive(Kind::Nil),
            data: Data::Nil,
        }
    }

    pub fn bool(v: bool) -> Self {
        Self::new(ty::primitive(Kind::Bool), Data::Bool(v))
    }

    /// A string value with a fresh buffer.
    pub fn string(s: &str) -> Self {
        Self::new(ty::primitive(Kind::String), Data::Str(Arc::from(s.as_bytes())))
    }

    /// A string value sharing an existing buffer; clones of the `Arc`
    /// share identity and coalesce on the wire.
    pub fn string_shared(buf: Arc<[u8]>) -> Self {
        Self::new(ty::primitive(Kind::String), Data::Str(buf))
    }

    pub fn uint8(v: u8) -> Self {
        Self::new(ty::primitive(Kind::Uint8), Data::U8(v))
    }

    pub fn int8(v: i8) -> Self {
        Self::new(ty::primitive(Kind::Int8), Data::I8(v))
    }

    pub fn uint16(v: u16) -> Self {
        Self::new(ty::primitive(Kind::Uint16), Data::U16(v))
    }

    pub fn int16(v: i16) -> Self {
        Self::new(ty::primitive(Kind::Int16), Data::I16(v))
    }

    pub fn uint32(v: u32) -> Self {
        Self::new(ty::primitive(Kind::Uint32), Data::U32(v))
    }

    pub fn int32(v: i32) -> Self {
        Self::new(ty::primitive(Kind::Int32), Data::I32(v))
    }

    pub fn uint64(v: u64) -> Self {
        Self::new(ty::primitive(Kind::Uint64), Data::U64(v))
    }

    pub fn int64(v: i64) -> Self {
        Self::new(ty::primitive(Kind::Int64), Data::I64(v))
    }

    /// Machine-word unsigned integer.
    pub fn uint(v: u64) -> Self {
        Self::new(ty::primitive(Kind::Uint), Data::Uint(v))
    }

    /// Machine-word signed integer.
    pub fn int(v: i64) -> Self {
        Self::new(ty::primitive(Kind::Int), Data::Int(v))
    }

    pub fn uintptr(v: u64) -> Self {
        Self::new(ty::primitive(Kind::Uintptr), Data::Uintptr(v))
    }

    /// Raw untyped pointer; 0 is null.
    pub fn raw_ptr(addr: u64) -> Self {
        Self::new(ty::primitive(Kind::RawPtr), Data::RawPtr(addr))
    }

    pub fn float32(v: f32) -> Self {
        Self::new(ty::primitive(Kind::Float32), Data::F32(v))
    }

    pub fn float64(v: f64) -> Self {
        Self::new(ty::primitive(Kind::Float64), Data::F64(v))
    }

    pub fn complex64(re: f32, im: f32) -> Self {
        Self::new(ty::primitive(Kind::Complex64), Data::C64(re, im))
    }

    pub fn complex128(re: f64, im: f64) -> Self {
        Self::new(ty::primitive(Kind::Complex128), Data::C128(re, im))
    }

    /// An `any` value carrying (or not carrying) a dynamic value.
    pub fn interface(inner: Option<Value>) -> Self {
        Self::new(
            ty::primitive(Kind::Interface),
            Data::Iface(inner.map(Box::new)),
        )
    }

    /// A typed pointer. `None` is the typed nil pointer.
    pub fn pointer(ty: Type, target: Option<Place>) -> Self {
        Self::new(ty, Data::Ptr(target))
    }

    /// A struct value. `fields` must match the type's field count.
    pub fn struct_value(ty: Type, fields: Vec<Value>) -> Self {
        debug_assert_eq!(
            ty.fields().map(<[_]>::len),
            Some(fields.len()),
            "struct field arity mismatch"
        );
        Self::new(ty, Data::Struct(fields))
    }

    /// An array value. `elems` must match the type's length.
    pub fn array(ty: Type, elems: Vec<Value>) -> Self {
        debug_assert_eq!(ty.array_len(), Some(elems.len()), "array length mismatch");
        Self::new(ty, Data::Array(elems))
    }

    /// A slice value; `None` is the typed nil slice.
    pub fn slice(ty: Type, elems: Option<Vec<Value>>) -> Self {
        Self::new(ty, Data::Slice(elems.map(Arc::new)))
    }

    /// A slice sharing an existing payload.
    pub fn slice_shared(ty: Type, elems: Arc<Vec<Value>>) -> Self {
        Self::new(ty, Data::Slice(Some(elems)))
    }

    /// A map value; `None` is the typed nil map. Entries keep their
    /// insertion order, which makes encoding deterministic.
    pub fn map(ty: Type, entries: Option<Vec<(Value, Value)>>) -> Self {
        Self::new(ty, Data::Map(entries.map(Arc::new)))
    }

    /// A map sharing an existing payload.
    pub fn map_shared(ty: Type, entries: Arc<Vec<(Value, Value)>>) -> Self {
        Self::new(ty, Data::Map(Some(entries)))
    }

    /// A channel handle; `None` is the typed nil channel.
    pub fn chan(ty: Type, handle: Option<Arc<ChanVal>>) -> Self {
        Self::new(ty, Data::Chan(handle))
    }

    /// A function handle; `None` is the typed nil function.
    pub fn func(ty: Type, handle: Option<Arc<FuncVal>>) -> Self {
        Self::new(ty, Data::Func(handle))
    }

    /// Whether this value is nil-like: the untyped nil, a typed nil
    /// pointer/slice/map/chan/func, a null raw pointer, or an empty
    /// interface.
    pub fn is_nil(&self) -> bool {
        match &self.data {
            Data::Nil => true,
            Data::Ptr(t) => t.is_none(),
            Data::Slice(p) => p.is_none(),
            Data::Map(p) => p.is_none(),
            Data::Chan(h) => h.is_none(),
            Data::Func(h) => h.is_none(),
            Data::Iface(i) => i.is_none(),
            Data::RawPtr(a) => *a == 0,
            _ => false,
        }
    }

    /// The zero value of a type: false, 0, empty string, nil handles,
    /// zeroed fields/elements.
    pub fn zero(ty: &Type) -> Self {
        let data = match ty.underlying() {
            TypeDesc::Nil => Data::Nil,
            TypeDesc::Any => Data::Iface(None),
            TypeDesc::Bool => Data::Bool(false),
            TypeDesc::Str => Data::Str(Arc::from(&b""[..])),
            TypeDesc::Uint8 => Data::U8(0),
            TypeDesc::Int8 => Data::I8(0),
            TypeDesc::Uint16 => Data::U16(0),
            TypeDesc::Int16 => Data::I16(0),
            TypeDesc::Uint32 => Data::U32(0),
            TypeDesc::Int32 => Data::I32(0),
            TypeDesc::Uint64 => Data::U64(0),
            TypeDesc::Int64 => Data::I64(0),
            TypeDesc::Uint => Data::Uint(0),
            TypeDesc::Int => Data::Int(0),
            TypeDesc::Uintptr => Data::Uintptr(0),
            TypeDesc::RawPtr => Data::RawPtr(0),
            TypeDesc::Float32 => Data::F32(0.0),
            TypeDesc::Float64 => Data::F64(0.0),
            TypeDesc::Complex64 => Data::C64(0.0, 0.0),
            TypeDesc::Complex128 => Data::C128(0.0, 0.0),
            TypeDesc::Named { .. } => unreachable!("underlying() resolves names"),
            TypeDesc::Pointer { .. } => Data::Ptr(None),
            TypeDesc::Slice { .. } => Data::Slice(None),
            TypeDesc::Map { .. } => Data::Map(None),
            TypeDesc::Struct { fields, .. } => {
                Data::Struct(fields.iter().map(|f| Self::zero(&f.ty)).collect())
            }
            TypeDesc::Array { len, elem } => {
                Data::Array((0..*len).map(|_| Self::zero(elem)).collect())
            }
            TypeDesc::Chan { .. } => Data::Chan(None),
            TypeDesc::Func { .. } => Data::Func(None),
        };
        Self {
            ty: ty.clone(),
            data,
        }
    }

    /// Mutable child access for in-place container navigation.
    pub(crate) fn child_mut(&mut self, idx: usize) -> Option<&mut Value> {
        match &mut self.data {
            Data::Struct(fields) => fields.get_mut(idx),
            Data::Array(elems) => elems.get_mut(idx),
            _ => None,
        }
    }

    /// Shared child access for in-place container navigation.
    pub(crate) fn child(&self, idx: usize) -> Option<&Value> {
        match &self.data {
            Data::Struct(fields) => fields.get(idx),
            Data::Array(elems) => elems.get(idx),
            _ => None,
        }
    }
}
