//! The traversal graph.
//!
//! Nodes are numbered in pre-order of first encounter; the number doubles
//! as the on-wire reference id, so emission order and decoder numbering
//! must agree. When traversal discovers that a container slot it is just
//! entering was already claimed by an earlier pointer (an interior pointer
//! seen before its container), [`Graph::renumber`] relocates the pointer's
//! subtree to the container position and shifts the ids in between, so the
//! stream stays decodable in one pass with an append-only id table.
//!
//! A node may have several parents (aliasing); `by value address` and
//! `by container address` indexes provide the identity coalescing.

use std::collections::{HashMap, HashSet};

use tangle_types::{Place, Value};

/// Node identifier. The virtual root is [`VIRTUAL_ROOT`].
pub(crate) type NodeId = i64;

/// Parent of the top-level node.
pub(crate) const VIRTUAL_ROOT: NodeId = -1;

/// Where a value's identity lives: stable heap storage, or a shared
/// payload buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum AddrLoc {
    Place(Place),
    Buf(usize),
}

/// An identity address: location plus type name. Two values share
/// identity exactly when both components are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Addr {
    pub loc: AddrLoc,
    pub type_name: String,
}

/// A traversed value: the reflected handle plus the storage it occupies,
/// when it occupies any.
#[derive(Debug, Clone)]
pub(crate) struct ValueAt<'a> {
    pub v: &'a Value,
    pub place: Option<Place>,
}

/// Per-node payload: the value, its identity address, and the container
/// address it owns (for slots and for pointers that adopted their
/// pointee's location).
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeValue<'a> {
    pub value: Option<ValueAt<'a>>,
    pub addr: Option<Addr>,
    pub cntr: Option<Addr>,
}

#[derive(Default)]
pub(crate) struct Graph<'a> {
    childs: HashMap<NodeId, Vec<NodeId>>,
    prnts: HashMap<NodeId, Vec<NodeId>>,
    visited: HashSet<NodeId>,
    values: HashMap<NodeId, NodeValue<'a>>,
    tvals: HashMap<NodeId, NodeValue<'a>>,
    addrs: HashMap<Addr, NodeId>,
    cntrs: HashMap<Addr, NodeId>,
}

impl<'a> Graph<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child edge.
    pub fn add(&mut self, child: NodeId, parent: NodeId) {
        self.childs.entry(parent).or_default().push(child);
        self.prnts.entry(child).or_default().push(parent);
    }

    /// Add a child edge and attach a payload to the child.
    pub fn add_with_value(&mut self, child: NodeId, parent: NodeId, value: NodeValue<'a>) {
        self.add(child, parent);
        self.set_value(child, value);
    }

    /// Attach a payload, indexing its addresses.
    pub fn set_value(&mut self, node: NodeId, value: NodeValue<'a>) {
        if let Some(addr) = &value.addr {
            self.addrs.insert(addr.clone(), node);
        }
        if let Some(cntr) = &value.cntr {
            self.cntrs.insert(cntr.clone(), node);
        }
        self.values.insert(node, value);
    }

    /// Merge `new` over the node's payload, re-keying address indexes for
    /// any replaced component.
    pub fn update_value(&mut self, node: NodeId, new: NodeValue<'a>) {
        let mut v = self.values.get(&node).cloned().unwrap_or_default();
        if let Some(nv) = new.value {
            v.value = Some(nv);
        }
        if let Some(na) = new.addr {
            if let Some(old) = &v.addr {
                self.addrs.remove(old);
            }
            self.addrs.insert(na.clone(), node);
            v.addr = Some(na);
        }
        if let Some(nc) = new.cntr {
            if let Some(old) = &v.cntr {
                self.cntrs.remove(old);
            }
            self.cntrs.insert(nc.clone(), node);
            v.cntr = Some(nc);
        }
        self.values.insert(node, v);
    }

    pub fn value(&self, node: NodeId) -> Option<&NodeValue<'a>> {
        self.values.get(&node)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.childs.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn node_at(&self, addr: &Addr) -> Option<NodeId> {
        self.addrs.get(addr).copied()
    }

    pub fn container_node_at(&self, addr: &Addr) -> Option<NodeId> {
        self.cntrs.get(addr).copied()
    }

    pub fn is_visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    pub fn visit(&mut self, node: NodeId) {
        self.visited.insert(node);
    }

    /// Relocate `break_node`'s subtree under `current` and shift the ids
    /// in `[break_node, current]` so pre-order numbering holds again:
    /// `[break_node, max]` moves up to end at `current`'s old position,
    /// `(max, current]` moves down by the subtree's width, edges crossing
    /// the range boundary are patched on both sides, and the address
    /// indexes are re-keyed. The earlier pointer keeps its (low) id and
    /// now references the relocated slot.
    pub fn renumber(&mut self, current: NodeId, break_node: NodeId) {
        let max = self.find_max_node_id(break_node, break_node, break_node, &mut HashSet::new());
        let inc = current - max;
        let dec = max - break_node + 1;
        self.tvals.clear();

        self.renumber_border_nodes(break_node, max, inc, dec);
        let mut prnts = self.renumber_parents(break_node, current, max, inc, dec);
        let childs = self.renumber_childs(break_node, current, max, inc, dec, &mut prnts);

        let current = current - dec;
        let break_node = break_node + inc;
        let mut moved = prnts.remove(&break_node).unwrap_or_default();
        prnts.entry(current).or_default().append(&mut moved);
        prnts.insert(break_node, vec![current]);

        let mut childs = childs;
        childs.insert(current, vec![break_node]);

        self.childs.extend(childs);
        self.prnts.extend(prnts);
        self.restore_meta();
    }

    /// Greatest id reachable from `parent` through edges into ids greater
    /// than `min` (the subtree-forward closure; cross-edges to earlier
    /// nodes do not extend the range).
    fn find_max_node_id(
        &self,
        parent: NodeId,
        min: NodeId,
        mut max: NodeId,
        seen: &mut HashSet<NodeId>,
    ) -> NodeId {
        let kids: Vec<NodeId> = self.children(parent).to_vec();
        for kid in kids {
            if kid <= min || !seen.insert(kid) {
                continue;
            }
            if kid > max {
                max = kid;
            }
            max = self.find_max_node_id(kid, min, max, seen);
        }
        max
    }

    /// Patch child entries of nodes below the range that point into it.
    /// The `inc - 1` offset makes an edge into `[start, turn]` land on the
    /// relocated *slot* (one below the moved subtree's new start), which
    /// is exactly where an earlier pointer must point.
    fn renumber_border_nodes(&mut self, start: NodeId, turn: NodeId, inc: i64, dec: i64) {
        let mut border: Vec<NodeId> = self.prnts.get(&(turn + 1)).cloned().unwrap_or_default();
        border.extend(self.prnts.get(&start).cloned().unwrap_or_default());
        for parent in border {
            if parent >= start {
                continue;
            }
            let Some(mut kids) = self.childs.remove(&parent) else {
                continue;
            };
            for kid in kids.iter_mut() {
                if *kid >= start {
                    *kid = self.renumber_node_id(*kid, turn, inc - 1, dec);
                }
            }
            self.childs.insert(parent, kids);
        }
    }

    fn renumber_parents(
        &mut self,
        start: NodeId,
        end: NodeId,
        turn: NodeId,
        inc: i64,
        dec: i64,
    ) -> HashMap<NodeId, Vec<NodeId>> {
        let mut prnts = HashMap::new();
        for node in start..=end {
            let Some(mut elems) = self.prnts.remove(&node) else {
                continue;
            };
            for e in elems.iter_mut() {
                if *e >= start {
                    *e = self.renumber_node_id(*e, turn, inc, dec);
                }
            }
            let new_id = self.renumber_node_id(node, turn, inc, dec);
            prnts.insert(new_id, elems);
        }
        prnts
    }

    fn renumber_childs(
        &mut self,
        start: NodeId,
        end: NodeId,
        turn: NodeId,
        inc: i64,
        dec: i64,
        prnts: &mut HashMap<NodeId, Vec<NodeId>>,
    ) -> HashMap<NodeId, Vec<NodeId>> {
        let mut childs = HashMap::new();
        for node in start..=end {
            let Some(mut elems) = self.childs.remove(&node) else {
                continue;
            };
            for i in 0..elems.len() {
                let id = elems[i];
                if id >= start {
                    elems[i] = self.renumber_node_id(id, turn, inc, dec);
                    continue;
                }
                // Cross-edge to a node below the range: patch its parent
                // list instead.
                let Some(mut parents) = self.prnts.remove(&id) else {
                    continue;
                };
                for p in parents.iter_mut() {
                    if *p >= start {
                        *p = self.renumber_node_id(*p, turn, inc, dec);
                    }
                }
                prnts.insert(id, parents);
            }
            let new_id = self.renumber_node_id(node, turn, inc, dec);
            childs.insert(new_id, elems);
        }
        childs
    }

    fn renumber_node_id(&mut self, node: NodeId, turn: NodeId, inc: i64, dec: i64) -> NodeId {
        let id = if node <= turn { node + inc } else { node - dec };
        self.rebind_meta(node, id);
        id
    }

    fn rebind_meta(&mut self, old: NodeId, new: NodeId) {
        if let Some(v) = self.values.get(&old) {
            self.tvals.insert(new, v.clone());
        }
    }

    fn restore_meta(&mut self) {
        let tvals = std::mem::take(&mut self.tvals);
        for (node, v) in tvals {
            if let Some(addr) = &v.addr {
                self.addrs.insert(addr.clone(), node);
            }
            if let Some(cntr) = &v.cntr {
                self.cntrs.insert(cntr.clone(), node);
            }
            self.values.insert(node, v);
        }
    }

    /// Test-facing view of the adjacency (sorted for stable assertions).
    #[cfg(test)]
    pub fn edges(&self) -> (Vec<(NodeId, Vec<NodeId>)>, Vec<(NodeId, Vec<NodeId>)>) {
        let mut c: Vec<_> = self
            .childs
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        c.sort_by_key(|(k, _)| *k);
        let mut p: Vec<_> = self
            .prnts
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        p.sort_by_key(|(k, _)| *k);
        (c, p)
    }
}
