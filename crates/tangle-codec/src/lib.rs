//! Graph traversal, identity tracking, and the wire codec.
//!
//! Encoding is two-phase: a depth-first traversal numbers every distinct
//! value in pre-order and coalesces aliased values through their identity
//! addresses (renumbering when an interior pointer is discovered before
//! its container slot), then emission walks the numbered graph producing
//! type tokens, bodies, and `REF` back-references. Decoding is one forward
//! pass that mirrors the numbering with an append-only id table and a
//! small end-of-stream fixup list for pointers threaded ahead of their
//! pointees.

pub mod bits;
mod decoder;
mod encoder;
mod graph;
mod options;
pub mod wire;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use options::{
    default_struct_encoding, set_default_struct_encoding, CodecOption, StructEncoding,
};

use tangle_error::Result;
use tangle_types::{Heap, Value};

use options::Config;

/// Encode one value graph into a self-describing byte stream.
///
/// `heap` provides the storage behind any pointers inside `value`; pass an
/// empty heap for pointer-free data.
pub fn encode(heap: &Heap, value: &Value, options: &[CodecOption]) -> Result<Vec<u8>> {
    let cfg = Config::from_options(options)?;
    Encoder::from_config(cfg).encode(heap, value)
}

/// Decode a byte stream produced by [`encode`].
///
/// Addressable storage is materialised into `heap` and the returned root
/// value references it, so the heap must outlive the value.
pub fn decode(heap: &mut Heap, data: &[u8], options: &[CodecOption]) -> Result<Value> {
    let cfg = Config::from_options(options)?;
    Decoder::from_config(cfg).decode(heap, data)
}
