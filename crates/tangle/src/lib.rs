//! Reflective binary serialization for arbitrary object graphs.
//!
//! `tangle` encodes in-memory value graphs — primitives, containers,
//! channel and function handles, shared substructure, interior pointers,
//! and arbitrary cycles — into a compact self-describing byte stream, and
//! reconstructs structurally equivalent graphs on decode.
//!
//! # Wire format
//!
//! ```text
//! stream   = version(1) encoding
//! encoding = REF node-id            ; back/forward reference
//!          | type-id body           ; type-id: 3-bit-header uint
//! body     = NIL | FALSE/TRUE | bytes… per kind
//! struct   = CONTAINER field-bodies ; field types come from the registry
//! pointer  = NIL | NONNIL pointee-body-or-REF
//! ```
//!
//! Aliased values are emitted once and referenced afterwards; node ids are
//! assigned in pre-order and kept monotonically decodable even when an
//! interior pointer is discovered before the container it points into.
//!
//! # Example
//!
//! ```
//! use tangle::{decode, encode, structural_eq, Heap, Value};
//!
//! let heap = Heap::new();
//! let bytes = encode(&heap, &Value::string("0123456789"), &[]).unwrap();
//!
//! let mut out = Heap::new();
//! let back = decode(&mut out, &bytes, &[]).unwrap();
//! assert!(structural_eq(&heap, &Value::string("0123456789"), &out, &back));
//! ```
//!
//! Cyclic graphs go through the [`Heap`]:
//!
//! ```
//! use tangle::{decode, encode, ty, Data, Heap, Kind, Place, Value};
//!
//! // x = &x
//! let pt = ty::pointer_to(ty::primitive(Kind::Interface));
//! let mut heap = Heap::new();
//! let cell = heap.alloc(Value::nil());
//! let place = Place::new(cell);
//! heap.put(
//!     &place,
//!     Value::interface(Some(Value::pointer(pt.clone(), Some(place.clone())))),
//! );
//! let root = Value::pointer(pt, Some(place));
//!
//! let bytes = encode(&heap, &root, &[]).unwrap();
//! let mut out = Heap::new();
//! let back = decode(&mut out, &bytes, &[]).unwrap();
//! // The decoded pointer's pointee holds the pointer itself.
//! let Data::Ptr(Some(target)) = back.data() else { panic!() };
//! assert!(out.value(target).is_some());
//! ```

pub use tangle_codec::{
    bits, decode, default_struct_encoding, encode, set_default_struct_encoding, wire,
    CodecOption, Decoder, Encoder, StructEncoding,
};
pub use tangle_error::{Error, Result};
pub use tangle_types::{
    structural_eq, ty, CellId, ChanDir, ChanVal, Data, FuncVal, Heap, Kind, Place, Registered,
    StructField, Type, TypeDesc, TypeRegistry, Value,
};
