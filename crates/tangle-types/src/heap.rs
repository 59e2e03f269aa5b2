//! Addressable storage.
//!
//! The [`Heap`] is an arena of cells; a [`Place`] names a storage location
//! as a cell plus a path of struct-field / array-element indexes. Pointers
//! hold places, so aliasing, interior pointers, and cycles are all explicit
//! and cheap to compare. Interface payloads are not storage — paths never
//! descend into them.
//!
//! A cell may *forward* to another place. The decoder uses this for
//! pointers that materialise before their pointee: every copy of such a
//! pointer keeps referring to the placeholder cell, and redirecting the
//! placeholder at end-of-stream makes all copies observe the final target.

use std::collections::HashSet;

use smallvec::SmallVec;

use crate::value::{Data, Value};

/// Index of a heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A storage location: a cell, descended through container children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    cell: CellId,
    path: SmallVec<[u32; 4]>,
}

impl Place {
    pub fn new(cell: CellId) -> Self {
        Self {
            cell,
            path: SmallVec::new(),
        }
    }

    /// The place of the `idx`-th field/element inside this place.
    pub fn child(&self, idx: u32) -> Self {
        let mut path = self.path.clone();
        path.push(idx);
        Self {
            cell: self.cell,
            path,
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }
}

#[derive(Debug, Clone)]
enum Cell {
    Live(Value),
    Forward(Place),
}

/// Arena of addressable values.
#[derive(Debug, Default)]
pub struct Heap {
    cells: Vec<Cell>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Allocate a cell holding `v`; returns its id.
    pub fn alloc(&mut self, v: Value) -> CellId {
        let id = CellId(u32::try_from(self.cells.len()).expect("heap cell overflow"));
        self.cells.push(Cell::Live(v));
        id
    }

    /// Allocate a cell holding `v`; returns its place.
    pub fn alloc_place(&mut self, v: Value) -> Place {
        Place::new(self.alloc(v))
    }

    /// Redirect `cell` to `target`. Every place rooted at `cell` now
    /// resolves through `target`.
    pub fn forward(&mut self, cell: CellId, target: Place) {
        if let Some(slot) = self.cells.get_mut(cell.index()) {
            *slot = Cell::Forward(target);
        }
    }

    /// Resolve forwarding at the root of `p`. Bounded by the heap size, so
    /// a corrupt forwarding loop degrades to returning the last place
    /// reached rather than hanging.
    pub fn resolve(&self, p: &Place) -> Place {
        let mut cur = p.clone();
        for _ in 0..=self.cells.len() {
            match self.cells.get(cur.cell.index()) {
                Some(Cell::Forward(t)) => {
                    let mut next = t.clone();
                    next.path.extend_from_slice(&cur.path);
                    cur = next;
                }
                _ => return cur,
            }
        }
        cur
    }

    /// The value stored at `p`, following forwarding. `None` when the
    /// place does not name live storage.
    pub fn value(&self, p: &Place) -> Option<&Value> {
        let p = self.resolve(p);
        let Cell::Live(root) = self.cells.get(p.cell.index())? else {
            return None;
        };
        let mut v = root;
        for &idx in &p.path {
            v = v.child(idx as usize)?;
        }
        Some(v)
    }

    /// Write `v` at `p`, following forwarding. Returns false when the
    /// place does not name live storage.
    pub fn put(&mut self, p: &Place, v: Value) -> bool {
        let p = self.resolve(p);
        let Some(Cell::Live(root)) = self.cells.get_mut(p.cell.index()) else {
            return false;
        };
        let mut slot = root;
        for &idx in &p.path {
            match slot.child_mut(idx as usize) {
                Some(c) => slot = c,
                None => return false,
            }
        }
        *slot = v;
        true
    }
}

/// Structural equality over two heaps: value contents compare by shape,
/// and pointer identity lifts to graph isomorphism — corresponding
/// pointers must keep corresponding targets, so shared substructure and
/// cycles on one side must be mirrored on the other.
pub fn structural_eq(ha: &Heap, a: &Value, hb: &Heap, b: &Value) -> bool {
    let mut seen = HashSet::new();
    eq_value(ha, a, hb, b, &mut seen)
}

fn eq_value(
    ha: &Heap,
    a: &Value,
    hb: &Heap,
    b: &Value,
    seen: &mut HashSet<(Place, Place)>,
) -> bool {
    if a.ty().name() != b.ty().name() {
        return false;
    }
    match (a.data(), b.data()) {
        (Data::Nil, Data::Nil) => true,
        (Data::Bool(x), Data::Bool(y)) => x == y,
        (Data::Str(x), Data::Str(y)) => x == y,
        (Data::U8(x), Data::U8(y)) => x == y,
        (Data::I8(x), Data::I8(y)) => x == y,
        (Data::U16(x), Data::U16(y)) => x == y,
        (Data::I16(x), Data::I16(y)) => x == y,
        (Data::U32(x), Data::U32(y)) => x == y,
        (Data::I32(x), Data::I32(y)) => x == y,
        (Data::U64(x), Data::U64(y)) => x == y,
        (Data::I64(x), Data::I64(y)) => x == y,
        (Data::Uint(x), Data::Uint(y)) => x == y,
        (Data::Int(x), Data::Int(y)) => x == y,
        (Data::Uintptr(x), Data::Uintptr(y)) => x == y,
        (Data::RawPtr(x), Data::RawPtr(y)) => x == y,
        (Data::F32(x), Data::F32(y)) => x.to_bits() == y.to_bits(),
        (Data::F64(x), Data::F64(y)) => x.to_bits() == y.to_bits(),
        (Data::C64(xr, xi), Data::C64(yr, yi)) => {
            xr.to_bits() == yr.to_bits() && xi.to_bits() == yi.to_bits()
        }
        (Data::C128(xr, xi), Data::C128(yr, yi)) => {
            xr.to_bits() == yr.to_bits() && xi.to_bits() == yi.to_bits()
        }
        (Data::Array(xs), Data::Array(ys)) | (Data::Struct(xs), Data::Struct(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| eq_value(ha, x, hb, y, seen))
        }
        (Data::Slice(x), Data::Slice(y)) => match (x, y) {
            (None, None) => true,
            (Some(xs), Some(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|(x, y)| eq_value(ha, x, hb, y, seen))
            }
            _ => false,
        },
        (Data::Map(x), Data::Map(y)) => match (x, y) {
            (None, None) => true,
            (Some(xs), Some(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys.iter()).all(|((xk, xv), (yk, yv))| {
                        eq_value(ha, xk, hb, yk, seen) && eq_value(ha, xv, hb, yv, seen)
                    })
            }
            _ => false,
        },
        (Data::Iface(x), Data::Iface(y)) => match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => eq_value(ha, x, hb, y, seen),
            _ => false,
        },
        (Data::Chan(x), Data::Chan(y)) => match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => x.cap == y.cap,
            _ => false,
        },
        (Data::Func(x), Data::Func(y)) => match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => x.name == y.name,
            _ => false,
        },
        (Data::Ptr(x), Data::Ptr(y)) => match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => {
                let (pa, pb) = (ha.resolve(x), hb.resolve(y));
                if !seen.insert((pa.clone(), pb.clone())) {
                    // Already comparing (or compared) this pair; assuming
                    // equality here is what makes cycles terminate.
                    return true;
                }
                match (ha.value(&pa), hb.value(&pb)) {
                    (Some(va), Some(vb)) => eq_value(ha, va, hb, vb, seen),
                    _ => false,
                }
            }
            _ => false,
        },
        _ => false,
    }
}
