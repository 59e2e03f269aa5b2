//! The encoder: traverse, then emit.
//!
//! Traversal walks the value graph depth-first, numbering each first
//! encounter in pre-order and coalescing repeat encounters through the
//! identity indexes. Struct fields and array elements each get a *slot*
//! node carrying the slot's container address before their value is
//! registered; a pointer that later resolves into a known slot becomes a
//! back-reference to it, and a slot that turns out to be the target of an
//! earlier pointer triggers [`Graph::renumber`] so the wire stays
//! decodable front to back.
//!
//! Emission then walks the numbered graph: first visit emits a type token
//! and a body, every later visit emits `REF` + node id.

use std::sync::{Arc, OnceLock};

use tracing::{debug, trace};

use tangle_error::{Error, Result};
use tangle_types::{Data, Heap, Type, TypeRegistry, Value};

use crate::bits;
use crate::graph::{Addr, AddrLoc, Graph, NodeId, NodeValue, ValueAt, VIRTUAL_ROOT};
use crate::options::{Config, StructEncoding};
use crate::wire;

/// Reusable encoder configuration.
pub struct Encoder {
    registry: Arc<TypeRegistry>,
    struct_mode: StructEncoding,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// An encoder over the process-wide defaults.
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

    /// Encode one value graph. `heap` provides the storage behind any
    /// pointers inside `value`; pass an empty heap for pointer-free data.
    pub fn encode(&self, heap: &Heap, value: &Value) -> Result<Vec<u8>> {
        // The top level is handed over by value; an interface wrapper at
        // the root is transparent, like a reflection handle taken from an
        // `any`.
        let root: &Value = match value.data() {
            Data::Iface(Some(inner)) => inner,
            Data::Iface(None) => nil_value(),
            _ => value,
        };
        let mut run = EncodeRun {
            registry: &self.registry,
            struct_mode: self.struct_mode,
            heap,
            graph: Graph::new(),
            next_id: 0,
        };
        run.traverse(
            VIRTUAL_ROOT,
            ValueAt {
                v: root,
                place: None,
            },
        )?;
        let mut out = vec![wire::VERSION];
        let root_id = run.graph.children(VIRTUAL_ROOT)[0];
        run.emit_node(root_id, &mut out)?;
        debug!(
            bytes = out.len(),
            nodes = run.next_id,
            "encoded value graph"
        );
        Ok(out)
    }
}

fn nil_value() -> &'static Value {
    static NIL: OnceLock<Value> = OnceLock::new();
    NIL.get_or_init(Value::nil)
}

struct EncodeRun<'a, 'r> {
    registry: &'r Arc<TypeRegistry>,
    struct_mode: StructEncoding,
    heap: &'a Heap,
    graph: Graph<'a>,
    next_id: NodeId,
}

impl<'a> EncodeRun<'a, '_> {
    fn next_node_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Identity address of a value, when it has one.
    fn address(&self, v: &ValueAt<'a>) -> Option<Addr> {
        let type_name = || v.v.ty().name();
        match v.v.data() {
            Data::Struct(_) | Data::Array(_) => v.place.as_ref().map(|p| Addr {
                loc: AddrLoc::Place(self.heap.resolve(p)),
                type_name: type_name(),
            }),
            Data::Str(buf) => Some(Addr {
                loc: AddrLoc::Buf(Arc::as_ptr(buf) as *const u8 as usize),
                type_name: type_name(),
            }),
            Data::Slice(Some(buf)) => Some(Addr {
                loc: AddrLoc::Buf(Arc::as_ptr(buf) as usize),
                type_name: type_name(),
            }),
            Data::Map(Some(buf)) => Some(Addr {
                loc: AddrLoc::Buf(Arc::as_ptr(buf) as usize),
                type_name: type_name(),
            }),
            Data::Chan(Some(handle)) => Some(Addr {
                loc: AddrLoc::Buf(Arc::as_ptr(handle) as usize),
                type_name: type_name(),
            }),
            Data::Func(Some(handle)) => Some(Addr {
                loc: AddrLoc::Buf(Arc::as_ptr(handle) as usize),
                type_name: type_name(),
            }),
            Data::Ptr(Some(target)) => Some(Addr {
                loc: AddrLoc::Place(self.heap.resolve(target)),
                type_name: type_name(),
            }),
            _ => None,
        }
    }

    /// Register a value occurrence. Returns the fresh node id, or `None`
    /// when the value coalesced into an existing node (its subtree is not
    /// re-entered).
    fn register_value(&mut self, v: ValueAt<'a>, parent: NodeId) -> Option<NodeId> {
        let Some(addr) = self.address(&v) else {
            let id = self.next_node_id();
            self.graph.add_with_value(
                id,
                parent,
                NodeValue {
                    value: Some(v),
                    addr: None,
                    cntr: None,
                },
            );
            return Some(id);
        };
        if let Some(existing) = self.graph.node_at(&addr) {
            trace!(node = existing, parent, "aliased value");
            self.graph.add(existing, parent);
            return None;
        }
        let id = self.next_node_id();
        self.graph.add_with_value(
            id,
            parent,
            NodeValue {
                value: Some(v),
                addr: Some(addr),
                cntr: None,
            },
        );
        Some(id)
    }

    /// Register a container slot (struct field / array element). Returns
    /// false when the slot's address was already claimed by an earlier
    /// pointer — the graph has been renumbered and the slot's value must
    /// not be traversed again.
    fn register_container(
        &mut self,
        v: ValueAt<'a>,
        declared_ty: &Type,
        node: NodeId,
        parent: NodeId,
    ) -> bool {
        let Some(place) = v.place.clone() else {
            // Unplaced containers (by-value roots, interface payloads)
            // cannot be pointed into; the slot is plain bookkeeping.
            self.graph.add_with_value(node, parent, NodeValue::default());
            return true;
        };
        let addr = Addr {
            loc: AddrLoc::Place(self.heap.resolve(&place)),
            type_name: declared_ty.name(),
        };
        if let Some(container_id) = self.graph.container_node_at(&addr) {
            trace!(node, container = container_id, "slot claimed by earlier pointer");
            self.graph.add_with_value(
                node,
                parent,
                NodeValue {
                    value: Some(v),
                    addr: None,
                    cntr: Some(addr),
                },
            );
            self.graph.renumber(node, container_id + 1);
            let relocated = self.graph.children(container_id)[0];
            self.graph.visit(relocated);
            return false;
        }
        self.graph.add_with_value(
            node,
            parent,
            NodeValue {
                value: None,
                addr: None,
                cntr: Some(addr),
            },
        );
        true
    }

    fn traverse(&mut self, parent: NodeId, v: ValueAt<'a>) -> Result<()> {
        let Some(node) = self.register_value(v.clone(), parent) else {
            return Ok(());
        };
        match v.v.data() {
            Data::Struct(_) => self.traverse_struct(v, node),
            Data::Array(_) => self.traverse_array(v, node),
            Data::Slice(_) => self.traverse_slice(v, node),
            Data::Map(_) => self.traverse_map(v, node),
            Data::Iface(_) => self.traverse_interface(v, node),
            Data::Ptr(_) => self.traverse_pointer(v, node),
            _ => Ok(()),
        }
    }

    fn traverse_struct(&mut self, v: ValueAt<'a>, node: NodeId) -> Result<()> {
        let Data::Struct(fields) = v.v.data() else {
            unreachable!()
        };
        let desc = v.v.ty().clone();
        let Some(field_descs) = desc.fields() else {
            return Err(Error::corrupt("struct value with non-struct type"));
        };
        if field_descs.len() != fields.len() {
            return Err(Error::corrupt("struct value arity differs from its type"));
        }
        for (i, (field, fd)) in fields.iter().zip(field_descs).enumerate() {
            let fv = ValueAt {
                v: field,
                place: v.place.as_ref().map(|p| p.child(i as u32)),
            };
            let slot = self.next_node_id();
            if self.register_container(fv.clone(), &fd.ty, slot, node) {
                self.traverse(slot, fv)?;
            }
        }
        Ok(())
    }

    fn traverse_array(&mut self, v: ValueAt<'a>, node: NodeId) -> Result<()> {
        let Data::Array(elems) = v.v.data() else {
            unreachable!()
        };
        let desc = v.v.ty().clone();
        let Some(elem_ty) = desc.elem().cloned() else {
            return Err(Error::corrupt("array value with non-array type"));
        };
        for (i, elem) in elems.iter().enumerate() {
            let ev = ValueAt {
                v: elem,
                place: v.place.as_ref().map(|p| p.child(i as u32)),
            };
            let slot = self.next_node_id();
            if self.register_container(ev.clone(), &elem_ty, slot, node) {
                self.traverse(slot, ev)?;
            }
        }
        Ok(())
    }

    fn traverse_slice(&mut self, v: ValueAt<'a>, node: NodeId) -> Result<()> {
        if let Data::Slice(Some(elems)) = v.v.data() {
            for elem in elems.iter() {
                self.traverse(node, ValueAt { v: elem, place: None })?;
            }
        }
        Ok(())
    }

    fn traverse_map(&mut self, v: ValueAt<'a>, node: NodeId) -> Result<()> {
        if let Data::Map(Some(entries)) = v.v.data() {
            for (key, value) in entries.iter() {
                self.traverse(node, ValueAt { v: key, place: None })?;
                self.traverse(node, ValueAt { v: value, place: None })?;
            }
        }
        Ok(())
    }

    fn traverse_interface(&mut self, v: ValueAt<'a>, node: NodeId) -> Result<()> {
        let inner: &'a Value = match v.v.data() {
            Data::Iface(Some(inner)) => inner,
            _ => nil_value(),
        };
        self.traverse(node, ValueAt { v: inner, place: None })
    }

    fn traverse_pointer(&mut self, v: ValueAt<'a>, node: NodeId) -> Result<()> {
        let Data::Ptr(target) = v.v.data() else {
            unreachable!()
        };
        let Some(target) = target else {
            return Ok(());
        };
        // Split the heap reference off `self`: the pointee borrow must
        // outlive the graph mutations below.
        let heap: &'a Heap = self.heap;
        let target = heap.resolve(target);
        let Some(pointee) = heap.value(&target) else {
            return Err(Error::corrupt("pointer to unallocated storage"));
        };
        let Some(elem_ty) = v.v.ty().elem().cloned() else {
            return Err(Error::corrupt("pointer value with non-pointer type"));
        };
        let addr = Addr {
            loc: AddrLoc::Place(target.clone()),
            type_name: elem_ty.name(),
        };
        if let Some(container_id) = self.graph.container_node_at(&addr) {
            // The pointee is a known container slot: reference it instead
            // of descending.
            self.graph.set_value(
                node,
                NodeValue {
                    value: Some(v),
                    addr: None,
                    cntr: None,
                },
            );
            self.graph.add(container_id, node);
            return Ok(());
        }
        // Adopt the pointee's location so later aliases into it (slots or
        // other pointers) reconcile against this node.
        self.graph.update_value(
            node,
            NodeValue {
                value: None,
                addr: None,
                cntr: Some(addr),
            },
        );
        self.traverse(
            node,
            ValueAt {
                v: pointee,
                place: Some(target),
            },
        )
    }

    // --- emission ---

    fn node_value(&self, node: NodeId) -> Result<ValueAt<'a>> {
        self.graph
            .value(node)
            .and_then(|nv| nv.value.clone())
            .ok_or_else(|| Error::corrupt("emission reached a node without a value"))
    }

    fn emit_node(&mut self, node: NodeId, out: &mut Vec<u8>) -> Result<()> {
        if self.graph.is_visited(node) {
            return self.emit_reference(node, out);
        }
        self.graph.visit(node);
        let v = self.node_value(node)?;
        let type_id = self.registry.id_for_value(v.v)?;
        bits::put_uint_with_header(out, type_id, wire::HDR_TYPE_ID);
        self.emit_value(&v, node, out)
    }

    fn emit_reference(&mut self, node: NodeId, out: &mut Vec<u8>) -> Result<()> {
        out.push(wire::META_REF);
        bits::put_uint_with_header(out, node as u64, wire::HDR_REF);
        Ok(())
    }

    /// Body-only emission with the reference check (container children and
    /// pointer pointees, whose type the decoder already knows).
    fn emit_child(&mut self, node: NodeId, out: &mut Vec<u8>) -> Result<()> {
        if self.graph.is_visited(node) {
            return self.emit_reference(node, out);
        }
        self.graph.visit(node);
        let v = self.node_value(node)?;
        self.emit_value(&v, node, out)
    }

    /// Emit the value body held by a slot: the slot's single child.
    fn emit_slot(&mut self, slot: NodeId, out: &mut Vec<u8>) -> Result<()> {
        let &[child, ..] = self.graph.children(slot) else {
            return Err(Error::corrupt("container slot without a value"));
        };
        self.emit_child(child, out)
    }

    fn emit_value(&mut self, v: &ValueAt<'a>, node: NodeId, out: &mut Vec<u8>) -> Result<()> {
        if v.v.ty().kind() != v.v.kind() {
            // A payload at odds with its type has no wire representation a
            // decoder could reproduce.
            return Err(Error::UnsupportedKind {
                kind: v.v.kind().name(),
            });
        }
        match v.v.data() {
            Data::Nil => out.push(wire::META_NIL),
            Data::Bool(b) => out.push(if *b { wire::META_TRUE } else { wire::META_FALSE }),
            Data::Str(bytes) => {
                bits::put_uint_with_header(out, bytes.len() as u64, wire::HDR_LEN);
                out.extend_from_slice(bytes);
            }
            Data::U8(x) => out.push(*x),
            Data::I8(x) => out.push(bits::zigzag(i64::from(*x)) as u8),
            Data::U16(x) => bits::put_uint_with_header(out, u64::from(*x), wire::HDR_U16),
            Data::I16(x) => {
                bits::put_uint_with_header(out, bits::zigzag(i64::from(*x)), wire::HDR_U16);
            }
            Data::U32(x) => bits::put_uint_with_header(out, u64::from(*x), wire::HDR_U32),
            Data::I32(x) => {
                bits::put_uint_with_header(out, bits::zigzag(i64::from(*x)), wire::HDR_U32);
            }
            Data::U64(x) | Data::Uint(x) | Data::Uintptr(x) => {
                bits::put_uint_with_header(out, *x, wire::HDR_U64);
            }
            Data::I64(x) | Data::Int(x) => {
                bits::put_uint_with_header(out, bits::zigzag(*x), wire::HDR_U64);
            }
            Data::RawPtr(addr) => {
                if *addr == 0 {
                    out.push(wire::META_NIL);
                } else {
                    bits::put_uint_with_header(out, *addr, wire::HDR_U64);
                }
            }
            Data::F32(x) => emit_f32(*x, out),
            Data::F64(x) => emit_f64(*x, out),
            Data::C64(re, im) => {
                emit_f32(*re, out);
                emit_f32(*im, out);
            }
            Data::C128(re, im) => {
                emit_f64(*re, out);
                emit_f64(*im, out);
            }
            Data::Chan(handle) => match handle {
                None => out.push(wire::META_NIL),
                Some(h) => {
                    out.push(wire::META_NONNIL);
                    bits::put_uint_with_header(out, h.cap as u64, wire::HDR_LEN);
                }
            },
            Data::Func(handle) => out.push(if handle.is_some() {
                wire::META_NONNIL
            } else {
                wire::META_NIL
            }),
            Data::Struct(_) => return self.emit_struct(v, node, out),
            Data::Array(_) => return self.emit_array(node, out),
            Data::Slice(payload) => {
                let len = payload.as_ref().map(|p| p.len());
                return self.emit_elements(node, len, out);
            }
            Data::Map(payload) => {
                let len = payload.as_ref().map(|p| p.len());
                return self.emit_elements(node, len, out);
            }
            Data::Iface(_) => {
                let &[child, ..] = self.graph.children(node) else {
                    return Err(Error::corrupt("interface node without a dynamic value"));
                };
                return self.emit_node(child, out);
            }
            Data::Ptr(_) => {
                let children = self.graph.children(node);
                let Some(&child) = children.first() else {
                    out.push(wire::META_NIL);
                    return Ok(());
                };
                out.push(wire::META_NONNIL);
                return self.emit_child(child, out);
            }
        }
        Ok(())
    }

    fn emit_struct(&mut self, v: &ValueAt<'a>, node: NodeId, out: &mut Vec<u8>) -> Result<()> {
        out.push(wire::META_CONTAINER);
        let slots: Vec<NodeId> = self.graph.children(node).to_vec();
        let ty = v.v.ty().clone();
        let fields = ty
            .fields()
            .ok_or_else(|| Error::corrupt("struct value with non-struct type"))?;
        if slots.len() != fields.len() {
            return Err(Error::corrupt("struct slot count differs from its type"));
        }
        for (i, &slot) in slots.iter().enumerate() {
            match self.struct_mode {
                StructEncoding::Positional => {}
                StructEncoding::Indexed => {
                    bits::put_uint_with_header(out, i as u64, wire::HDR_LEN);
                }
                StructEncoding::Named => {
                    let field = &fields[i];
                    bits::put_uint_with_header(out, field.name.len() as u64, wire::HDR_LEN);
                    out.extend_from_slice(field.name.as_bytes());
                    if field.is_blank() {
                        bits::put_uint_with_header(out, i as u64, wire::HDR_LEN);
                    }
                }
            }
            self.graph.visit(slot);
            self.emit_slot(slot, out)?;
        }
        Ok(())
    }

    fn emit_array(&mut self, node: NodeId, out: &mut Vec<u8>) -> Result<()> {
        out.push(wire::META_CONTAINER);
        let slots: Vec<NodeId> = self.graph.children(node).to_vec();
        for &slot in &slots {
            self.graph.visit(slot);
            self.emit_slot(slot, out)?;
        }
        Ok(())
    }

    /// Slice/map body: nil tag, or NONNIL + count + child emissions.
    fn emit_elements(
        &mut self,
        node: NodeId,
        len: Option<usize>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let Some(len) = len else {
            out.push(wire::META_NIL);
            return Ok(());
        };
        out.push(wire::META_NONNIL);
        bits::put_uint_with_header(out, len as u64, wire::HDR_LEN);
        let children: Vec<NodeId> = self.graph.children(node).to_vec();
        for child in children {
            self.emit_child(child, out)?;
        }
        Ok(())
    }
}

fn emit_f32(x: f32, out: &mut Vec<u8>) {
    bits::put_uint_with_header(out, u64::from(x.to_bits().swap_bytes()), wire::HDR_U32);
}

fn emit_f64(x: f64, out: &mut Vec<u8>) {
    bits::put_uint_with_header(out, x.to_bits().swap_bytes(), wire::HDR_U64);
}
