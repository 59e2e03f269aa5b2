//! Value model, structural types, addressable heap, and type registry for
//! the tangle serialization engine.
//!
//! This crate is the "reflection adapter" side of the system: it supplies
//! the abstract capabilities the codec traverses with — value kinds, field
//! access, type identity, function identity, and the raw address of
//! addressable storage — without any knowledge of the wire format.

pub mod heap;
pub mod kind;
pub mod registry;
pub mod ty;
pub mod value;

pub use heap::{structural_eq, CellId, Heap, Place};
pub use kind::Kind;
pub use registry::{Registered, TypeRegistry};
pub use ty::{ChanDir, StructField, Type, TypeDesc};
pub use value::{ChanVal, Data, FuncVal, Value};
