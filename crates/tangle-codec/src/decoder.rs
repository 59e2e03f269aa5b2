//! The decoder: a single forward pass over the byte stream.
//!
//! The id table mirrors the encoder's pre-order numbering exactly — one
//! entry per value node *and* per container slot — so a `REF` token is an
//! index into work already done. Values that occupy storage (the root,
//! struct fields, array elements, pointer pointees) bind their heap place
//! before their body decodes, which is what lets a cycle's back-reference
//! resolve while its target is still being built. A reference in pointee
//! position yields a pointer to the target's place; a reference in value
//! position yields the target value, sharing its payload buffers.
//!
//! A forward reference (a pointer threaded ahead of its pointee by the
//! encoder's renumbering) allocates a forwarding placeholder cell and a
//! patch; patches resolve in one pass at end-of-stream, and redirecting
//! the placeholder makes every copy of the pointer see the final target.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use tangle_error::{Error, Result};
use tangle_types::{
    CellId, ChanVal, Data, Heap, Kind, Place, Registered, Type, TypeDesc, TypeRegistry, Value,
};

use crate::bits;
use crate::options::{Config, StructEncoding};
use crate::wire;

/// Reusable decoder configuration.
pub struct Decoder {
    registry: Arc<TypeRegistry>,
    struct_mode: StructEncoding,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// A decoder over the process-wide defaults.
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::global(),
            struct_mode: crate::options::default_struct_encoding(),
        }
    }

    pub(crate) fn from_config(cfg: Config) -> Self {
        Self {
            registry: cfg.registry,
            struct_mode: cfg.struct_mode,
        }
    }

    /// Use this registry instead of the process-wide default.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use this struct field layout.
    #[must_use]
    pub fn with_struct_encoding(mut self, mode: StructEncoding) -> Self {
        self.struct_mode = mode;
        self
    }

    /// Decode one stream. Addressable storage is materialised into
    /// `heap`; the returned root value references it. On error the heap
    /// may retain cells allocated before the failure.
    pub fn decode(&self, heap: &mut Heap, data: &[u8]) -> Result<Value> {
        // Malformed input must never terminate the host: anything that
        // slips past the explicit checks surfaces as Corrupt.
        match catch_unwind(AssertUnwindSafe(|| self.decode_inner(heap, data))) {
            Ok(result) => result,
            Err(_) => Err(Error::corrupt("internal invariant violated")),
        }
    }

    fn decode_inner(&self, heap: &mut Heap, data: &[u8]) -> Result<Value> {
        let Some(&version) = data.first() else {
            return Err(Error::Truncated);
        };
        if version != wire::VERSION {
            return Err(Error::corrupt(format!(
                "unsupported stream version {version}"
            )));
        }
        let root_place = heap.alloc_place(Value::nil());
        let mut run = DecodeRun {
            data,
            pos: 1,
            heap,
            registry: &self.registry,
            struct_mode: self.struct_mode,
            nodes: Vec::new(),
            patches: Vec::new(),
        };
        let root = run.decode_entry(Some(&root_place))?;
        run.heap.put(&root_place, root.clone());
        run.resolve_patches()?;
        debug!(
            bytes = run.pos,
            nodes = run.nodes.len(),
            "decoded value graph"
        );
        Ok(root)
    }
}

/// One entry of the id table. `place` is bound before the node's body
/// decodes (when the node occupies storage); `value` when it completes.
struct NodeSlot {
    place: Option<Place>,
    value: Option<Value>,
}

/// A pointer that was produced before its pointee existed.
struct Patch {
    cell: CellId,
    target: u64,
    expect: Type,
}

struct DecodeRun<'d, 'h, 'r> {
    data: &'d [u8],
    pos: usize,
    heap: &'h mut Heap,
    registry: &'r Arc<TypeRegistry>,
    struct_mode: StructEncoding,
    nodes: Vec<NodeSlot>,
    patches: Vec<Patch>,
}

impl DecodeRun<'_, '_, '_> {
    fn rest(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn peek(&self) -> Result<u8> {
        self.data.get(self.pos).copied().ok_or(Error::Truncated)
    }

    fn take_byte(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take_uint(&mut self, header_bits: u32) -> Result<u64> {
        let (v, n) = bits::take_uint_with_header(self.rest(), header_bits)?;
        self.pos += n;
        Ok(v)
    }

    fn take_len(&mut self) -> Result<usize> {
        let v = self.take_uint(wire::HDR_LEN)?;
        usize::try_from(v).map_err(|_| Error::WidthMismatch {
            needed: 64,
            native: usize::BITS,
        })
    }

    fn unrecognised(&self, byte: u8) -> Error {
        Error::UnrecognisedKind {
            byte,
            offset: self.pos.saturating_sub(1),
        }
    }

    fn push_node(&mut self, place: Option<&Place>) -> usize {
        self.nodes.push(NodeSlot {
            place: place.cloned(),
            value: None,
        });
        self.nodes.len() - 1
    }

    fn complete(&mut self, id: usize, v: &Value) {
        self.nodes[id].value = Some(v.clone());
    }

    /// A full, self-describing emission: a reference, or a type token
    /// followed by the body.
    fn decode_entry(&mut self, place: Option<&Place>) -> Result<Value> {
        if self.peek()? == wire::META_REF {
            self.pos += 1;
            let id = self.take_uint(wire::HDR_REF)?;
            return self.ref_value(id);
        }
        let type_id = self.take_uint(wire::HDR_TYPE_ID)?;
        match self.registry.lookup(type_id)? {
            Registered::Type(ty) => self.decode_typed(&ty, place),
            Registered::Func { ty, handle } => {
                let id = self.push_node(place);
                let v = self.decode_func_body(&ty, handle)?;
                self.complete(id, &v);
                Ok(v)
            }
        }
    }

    /// A body-only emission whose type is statically known (container
    /// children, pointer pointees, and the body after a type token —
    /// no valid body's first byte collides with `REF`).
    fn decode_typed(&mut self, ty: &Type, place: Option<&Place>) -> Result<Value> {
        let kind = ty.kind();
        if kind == Kind::Interface {
            // The interface wrapper is a node of its own; its dynamic
            // value is boxed, unaddressable storage.
            let id = self.push_node(place);
            let inner = self.decode_entry(None)?;
            let data = if inner.kind() == Kind::Nil {
                Data::Iface(None)
            } else {
                Data::Iface(Some(Box::new(inner)))
            };
            let v = Value::new(ty.clone(), data);
            self.complete(id, &v);
            return Ok(v);
        }
        if kind.can_reference() && self.peek()? == wire::META_REF {
            self.pos += 1;
            let id = self.take_uint(wire::HDR_REF)?;
            return self.ref_value(id);
        }
        let id = self.push_node(place);
        let v = self.decode_body(ty, place, id)?;
        self.complete(id, &v);
        Ok(v)
    }

    fn decode_body(&mut self, ty: &Type, place: Option<&Place>, node: usize) -> Result<Value> {
        match ty.underlying().clone() {
            TypeDesc::Nil => {
                let b = self.take_byte()?;
                if b != wire::META_NIL {
                    return Err(self.unrecognised(b));
                }
                Ok(Value::nil())
            }
            TypeDesc::Any | TypeDesc::Named { .. } => {
                Err(Error::corrupt("unresolvable static type"))
            }
            TypeDesc::Bool => {
                let b = self.take_byte()?;
                let v = match b {
                    wire::META_FALSE => false,
                    wire::META_TRUE => true,
                    other => return Err(self.unrecognised(other)),
                };
                Ok(Value::new(ty.clone(), Data::Bool(v)))
            }
            TypeDesc::Str => {
                let len = self.take_len()?;
                if self.data.len() - self.pos < len {
                    return Err(Error::Truncated);
                }
                let bytes: Arc<[u8]> = Arc::from(&self.data[self.pos..self.pos + len]);
                self.pos += len;
                Ok(Value::new(ty.clone(), Data::Str(bytes)))
            }
            TypeDesc::Uint8 => Ok(Value::new(ty.clone(), Data::U8(self.take_byte()?))),
            TypeDesc::Int8 => {
                let b = self.take_byte()?;
                #[allow(clippy::cast_possible_truncation)]
                let v = bits::unzigzag(u64::from(b)) as i8;
                Ok(Value::new(ty.clone(), Data::I8(v)))
            }
            TypeDesc::Uint16 => {
                let v = self.take_uint(wire::HDR_U16)?;
                #[allow(clippy::cast_possible_truncation)]
                let v = v as u16;
                Ok(Value::new(ty.clone(), Data::U16(v)))
            }
            TypeDesc::Int16 => {
                let v = self.take_uint(wire::HDR_U16)?;
                #[allow(clippy::cast_possible_truncation)]
                let v = bits::unzigzag(v) as i16;
                Ok(Value::new(ty.clone(), Data::I16(v)))
            }
            TypeDesc::Uint32 => {
                let v = self.take_uint(wire::HDR_U32)?;
                #[allow(clippy::cast_possible_truncation)]
                let v = v as u32;
                Ok(Value::new(ty.clone(), Data::U32(v)))
            }
            TypeDesc::Int32 => {
                let v = self.take_uint(wire::HDR_U32)?;
                #[allow(clippy::cast_possible_truncation)]
                let v = bits::unzigzag(v) as i32;
                Ok(Value::new(ty.clone(), Data::I32(v)))
            }
            TypeDesc::Uint64 => Ok(Value::new(ty.clone(), Data::U64(self.take_uint(wire::HDR_U64)?))),
            TypeDesc::Int64 => {
                let v = self.take_uint(wire::HDR_U64)?;
                Ok(Value::new(ty.clone(), Data::I64(bits::unzigzag(v))))
            }
            TypeDesc::Uint => {
                let v = self.take_uint(wire::HDR_U64)?;
                check_native_width(v)?;
                Ok(Value::new(ty.clone(), Data::Uint(v)))
            }
            TypeDesc::Int => {
                let v = self.take_uint(wire::HDR_U64)?;
                check_native_width(v)?;
                Ok(Value::new(ty.clone(), Data::Int(bits::unzigzag(v))))
            }
            TypeDesc::Uintptr => {
                let v = self.take_uint(wire::HDR_U64)?;
                check_native_width(v)?;
                Ok(Value::new(ty.clone(), Data::Uintptr(v)))
            }
            TypeDesc::RawPtr => {
                // The null raw pointer's frame is the NIL byte itself.
                let v = self.take_uint(wire::HDR_U64)?;
                check_native_width(v)?;
                Ok(Value::new(ty.clone(), Data::RawPtr(v)))
            }
            TypeDesc::Float32 => Ok(Value::new(ty.clone(), Data::F32(self.take_f32()?))),
            TypeDesc::Float64 => Ok(Value::new(ty.clone(), Data::F64(self.take_f64()?))),
            TypeDesc::Complex64 => {
                let re = self.take_f32()?;
                let im = self.take_f32()?;
                Ok(Value::new(ty.clone(), Data::C64(re, im)))
            }
            TypeDesc::Complex128 => {
                let re = self.take_f64()?;
                let im = self.take_f64()?;
                Ok(Value::new(ty.clone(), Data::C128(re, im)))
            }
            TypeDesc::Chan { .. } => {
                let b = self.take_byte()?;
                match b {
                    wire::META_NIL => Ok(Value::new(ty.clone(), Data::Chan(None))),
                    wire::META_NONNIL => {
                        let cap = self.take_len()?;
                        Ok(Value::new(
                            ty.clone(),
                            Data::Chan(Some(Arc::new(ChanVal { cap }))),
                        ))
                    }
                    other => Err(self.unrecognised(other)),
                }
            }
            TypeDesc::Func { .. } => self.decode_func_body(ty, None),
            TypeDesc::Struct { .. } => self.decode_struct(ty, place),
            TypeDesc::Array { len, elem } => {
                let b = self.take_byte()?;
                if b != wire::META_CONTAINER {
                    return Err(self.unrecognised(b));
                }
                let mut elems = Vec::with_capacity(len);
                for i in 0..len {
                    let ep = place.map(|p| p.child(i as u32));
                    let slot = self.push_node(ep.as_ref());
                    let ev = self.decode_typed(&elem, ep.as_ref())?;
                    self.complete(slot, &ev);
                    elems.push(ev);
                }
                Ok(Value::new(ty.clone(), Data::Array(elems)))
            }
            TypeDesc::Slice { elem } => {
                let b = self.take_byte()?;
                match b {
                    wire::META_NIL => Ok(Value::new(ty.clone(), Data::Slice(None))),
                    wire::META_NONNIL => {
                        let len = self.take_len()?;
                        let len = self.checked_count(len)?;
                        let mut elems = Vec::with_capacity(len);
                        for _ in 0..len {
                            elems.push(self.decode_typed(&elem, None)?);
                        }
                        Ok(Value::new(ty.clone(), Data::Slice(Some(Arc::new(elems)))))
                    }
                    other => Err(self.unrecognised(other)),
                }
            }
            TypeDesc::Map { key, value } => {
                let b = self.take_byte()?;
                match b {
                    wire::META_NIL => Ok(Value::new(ty.clone(), Data::Map(None))),
                    wire::META_NONNIL => {
                        let len = self.take_len()?;
                        let len = self.checked_count(len)?;
                        let mut entries = Vec::with_capacity(len);
                        for _ in 0..len {
                            let k = self.decode_typed(&key, None)?;
                            let v = self.decode_typed(&value, None)?;
                            entries.push((k, v));
                        }
                        Ok(Value::new(ty.clone(), Data::Map(Some(Arc::new(entries)))))
                    }
                    other => Err(self.unrecognised(other)),
                }
            }
            TypeDesc::Pointer { elem } => {
                let b = self.take_byte()?;
                match b {
                    wire::META_NIL => Ok(Value::new(ty.clone(), Data::Ptr(None))),
                    wire::META_NONNIL => {
                        let target = if self.peek()? == wire::META_REF {
                            self.pos += 1;
                            let id = self.take_uint(wire::HDR_REF)?;
                            self.pointee_place(id, &elem)?
                        } else {
                            let p = self.heap.alloc_place(Value::zero(&elem));
                            // The pointer's value is already determined, so
                            // complete its node before descending: a cycle
                            // through the pointee may reference it.
                            let v = Value::new(ty.clone(), Data::Ptr(Some(p.clone())));
                            self.complete(node, &v);
                            let pv = self.decode_typed(&elem, Some(&p))?;
                            self.heap.put(&p, pv);
                            p
                        };
                        Ok(Value::new(ty.clone(), Data::Ptr(Some(target))))
                    }
                    other => Err(self.unrecognised(other)),
                }
            }
        }
    }

    fn decode_struct(&mut self, ty: &Type, place: Option<&Place>) -> Result<Value> {
        let b = self.take_byte()?;
        if b != wire::META_CONTAINER {
            return Err(self.unrecognised(b));
        }
        let fields = ty
            .fields()
            .ok_or_else(|| Error::corrupt("struct body for a non-struct type"))?
            .to_vec();
        let mut vals: Vec<Value> = fields.iter().map(|f| Value::zero(&f.ty)).collect();
        for wire_pos in 0..fields.len() {
            let i = match self.struct_mode {
                StructEncoding::Positional => wire_pos,
                StructEncoding::Indexed => {
                    let idx = self.take_len()?;
                    if idx >= fields.len() {
                        return Err(Error::corrupt(format!(
                            "field index {idx} out of range for {}",
                            ty.name()
                        )));
                    }
                    idx
                }
                StructEncoding::Named => {
                    let len = self.take_len()?;
                    if self.data.len() - self.pos < len {
                        return Err(Error::Truncated);
                    }
                    let name = &self.data[self.pos..self.pos + len];
                    self.pos += len;
                    if name.is_empty() || name == b"_" {
                        // Blank fields carry an index sentinel.
                        let idx = self.take_len()?;
                        if idx >= fields.len() {
                            return Err(Error::corrupt(format!(
                                "field index {idx} out of range for {}",
                                ty.name()
                            )));
                        }
                        idx
                    } else {
                        fields
                            .iter()
                            .position(|f| f.name.as_bytes() == name)
                            .ok_or_else(|| {
                                Error::corrupt(format!(
                                    "unknown field {} in {}",
                                    String::from_utf8_lossy(name),
                                    ty.name()
                                ))
                            })?
                    }
                }
            };
            let fp = place.map(|p| p.child(i as u32));
            let slot = self.push_node(fp.as_ref());
            let fv = self.decode_typed(&fields[i].ty, fp.as_ref())?;
            self.complete(slot, &fv);
            vals[i] = fv;
        }
        Ok(Value::new(ty.clone(), Data::Struct(vals)))
    }

    fn decode_func_body(&mut self, ty: &Type, handle: Option<Arc<tangle_types::FuncVal>>) -> Result<Value> {
        let b = self.take_byte()?;
        match b {
            wire::META_NIL => Ok(Value::new(ty.clone(), Data::Func(None))),
            // An unresolvable function decodes as a nil handle of the
            // correct type.
            wire::META_NONNIL => Ok(Value::new(ty.clone(), Data::Func(handle))),
            other => Err(self.unrecognised(other)),
        }
    }

    fn take_f32(&mut self) -> Result<f32> {
        let v = self.take_uint(wire::HDR_U32)?;
        #[allow(clippy::cast_possible_truncation)]
        let bits = (v as u32).swap_bytes();
        Ok(f32::from_bits(bits))
    }

    fn take_f64(&mut self) -> Result<f64> {
        let v = self.take_uint(wire::HDR_U64)?;
        Ok(f64::from_bits(v.swap_bytes()))
    }

    /// Every encoded element costs at least one byte, so a count beyond
    /// the remaining input is already malformed.
    fn checked_count(&self, len: usize) -> Result<usize> {
        if len > self.data.len() - self.pos {
            return Err(Error::Truncated);
        }
        Ok(len)
    }

    /// A reference in value position: the target's (completed) value.
    fn ref_value(&mut self, id: u64) -> Result<Value> {
        let slot = usize::try_from(id)
            .ok()
            .and_then(|i| self.nodes.get(i))
            .ok_or_else(|| Error::bad_reference(id))?;
        slot.value
            .clone()
            .ok_or_else(|| Error::corrupt(format!("value reference into open node {id}")))
    }

    /// A reference in pointee position: the target's place.
    fn pointee_place(&mut self, id: u64, elem_ty: &Type) -> Result<Place> {
        let Ok(idx) = usize::try_from(id) else {
            return Err(Error::bad_reference(id));
        };
        if let Some(slot) = self.nodes.get(idx) {
            if let Some(p) = &slot.place {
                return Ok(p.clone());
            }
            if let Some(v) = &slot.value {
                // The target has no stable storage (a map/slice element or
                // boxed payload): point at a fresh copy of it.
                let v = v.clone();
                return Ok(self.heap.alloc_place(v));
            }
            return Err(Error::corrupt(format!("pointer into open node {id}")));
        }
        // Forward reference: a placeholder cell, redirected at
        // end-of-stream so every copy of this pointer follows along.
        let cell = self.heap.alloc(Value::zero(elem_ty));
        self.patches.push(Patch {
            cell,
            target: id,
            expect: elem_ty.clone(),
        });
        Ok(Place::new(cell))
    }

    fn resolve_patches(&mut self) -> Result<()> {
        let patches = std::mem::take(&mut self.patches);
        for patch in patches {
            let slot = usize::try_from(patch.target)
                .ok()
                .and_then(|i| self.nodes.get(i))
                .ok_or_else(|| Error::bad_reference(patch.target))?;
            if let Some(p) = &slot.place {
                if p.cell() == patch.cell {
                    return Err(Error::BadReference {
                        id: patch.target,
                        detail: Some("forward reference resolves to itself".to_owned()),
                    });
                }
                if let Some(v) = self.heap.value(p) {
                    check_pointee_type(v, &patch.expect, patch.target)?;
                }
                self.heap.forward(patch.cell, p.clone());
            } else if let Some(v) = &slot.value {
                check_pointee_type(v, &patch.expect, patch.target)?;
                self.heap.put(&Place::new(patch.cell), v.clone());
            } else {
                return Err(Error::bad_reference(patch.target));
            }
        }
        Ok(())
    }
}

/// The stream may carry a 64-bit machine-word value onto a platform whose
/// words are narrower.
fn check_native_width(v: u64) -> Result<()> {
    if usize::BITS < 64 && v > u64::from(u32::MAX) {
        return Err(Error::WidthMismatch {
            needed: 64,
            native: usize::BITS,
        });
    }
    Ok(())
}

/// A resolved forward reference must produce a value the pointer's
/// element type can accept.
fn check_pointee_type(v: &Value, expect: &Type, id: u64) -> Result<()> {
    if expect.kind() == Kind::Interface {
        return Ok(());
    }
    let got = v.ty().name();
    let want = expect.name();
    if got != want {
        return Err(Error::BadReference {
            id,
            detail: Some(format!("pointee is {got} where {want} was expected")),
        });
    }
    Ok(())
}
