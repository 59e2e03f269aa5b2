//! Wire-format constants.
//!
//! A stream is one version byte followed by the root value's encoding.
//! Each value encoding is a type token (type id, 3-bit header) followed by
//! a kind-specific body — except references, which are the `REF` byte
//! followed by a node id in the same 3-bit-header form. A type token's
//! first byte is always `>= 0b0010_0000`, so `REF` (zero) never collides
//! with one, and the metadata bytes below never collide with the header
//! byte of a length/count in the positions where both may appear.

/// Stream format version.
pub const VERSION: u8 = 1;

/// A reference to an already-numbered node follows.
pub const META_REF: u8 = 0b0000_0000;
/// Boolean false.
pub const META_FALSE: u8 = 0b0000_0001;
/// Boolean true.
pub const META_TRUE: u8 = 0b0000_0011;
/// Null / absent.
pub const META_NIL: u8 = 0b0001_0000;
/// Present, non-null.
pub const META_NONNIL: u8 = 0b0010_0000;
/// Struct/array body prefix.
pub const META_CONTAINER: u8 = 0b0100_0000;

/// Header width for 16-bit integers.
pub const HDR_U16: u32 = 2;
/// Header width for 32-bit integers and float32 bit patterns.
pub const HDR_U32: u32 = 3;
/// Header width for 64-bit and machine-word integers, float64 bit
/// patterns, string lengths, slice/map lengths and channel capacities.
pub const HDR_U64: u32 = 4;
/// Header width for type ids.
pub const HDR_TYPE_ID: u32 = 3;
/// Header width for reference node ids (same form as type ids).
pub const HDR_REF: u32 = 3;
/// Header width for lengths and counts.
pub const HDR_LEN: u32 = 4;
