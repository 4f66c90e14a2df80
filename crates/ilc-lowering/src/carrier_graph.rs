//! Carrier dependency graph and self-reference detection.
//!
//! Each wrapper has an edge to every wrapper its carrier resolves through:
//! the carrier itself when it is a wrapper, and the bound of a carrier type
//! parameter (followed transitively through parameter-to-parameter bounds).
//! Arrays and generic applications erase to a host reference without looking
//! at their arguments, so they contribute no edges.
//!
//! Cycles are found with Tarjan's strongly connected components over the
//! wrapper arena. Every non-trivial component (or self-loop) becomes one
//! [`CarrierCycle`] with a concrete trace `A -> B -> A`, found by a
//! breadth-first search restricted to the component.

use crate::def::{WrapperId, WrapperStore};
use crate::types::{OrdinaryType, TypeId, TypeInterner, TypeShape};
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::debug;

/// Bound on parameter-to-parameter chains followed while collecting edges.
const MAX_BOUND_CHAIN: usize = 32;

/// A self-referential carrier chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierCycle {
    /// Every wrapper in the strongly connected component, ascending.
    pub members: Vec<WrapperId>,
    /// A concrete cycle starting and ending at the smallest member.
    pub trace: Vec<WrapperId>,
}

pub struct CarrierGraph {
    edges: Vec<SmallVec<[WrapperId; 2]>>,
}

impl CarrierGraph {
    /// Build the graph for every defined wrapper of `store`.
    pub fn build(store: &WrapperStore, types: &TypeInterner) -> Self {
        let mut edges = vec![SmallVec::new(); store.len()];
        for (id, decl) in store.iter() {
            edges[id.index()] = carrier_edges(types, decl.carrier);
        }
        Self { edges }
    }

    pub fn successors(&self, id: WrapperId) -> &[WrapperId] {
        self.edges
            .get(id.index())
            .map(|e| e.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Find every carrier cycle.
    pub fn find_cycles(&self) -> Vec<CarrierCycle> {
        let mut tarjan = Tarjan::new(self.edges.len());
        for node in 0..self.edges.len() {
            if tarjan.index[node].is_none() {
                tarjan.strongconnect(self, node);
            }
        }

        let mut cycles = Vec::new();
        for mut component in tarjan.components {
            let is_cycle = component.len() > 1
                || self.edges[component[0]].contains(&WrapperId(component[0] as u32));
            if !is_cycle {
                continue;
            }
            component.sort_unstable();
            let members: Vec<WrapperId> =
                component.iter().map(|&n| WrapperId(n as u32)).collect();
            let trace = self.trace_cycle(&members);
            debug!(len = members.len(), "carrier cycle found");
            cycles.push(CarrierCycle { members, trace });
        }
        cycles.sort_by_key(|c| c.members[0]);
        cycles
    }

    /// Shortest cycle through the smallest member, staying inside `members`.
    fn trace_cycle(&self, members: &[WrapperId]) -> Vec<WrapperId> {
        let start = members[0];
        if self.successors(start).contains(&start) {
            return vec![start, start];
        }

        let mut in_component = FixedBitSet::with_capacity(self.edges.len());
        for member in members {
            in_component.insert(member.index());
        }

        let mut parent: Vec<Option<WrapperId>> = vec![None; self.edges.len()];
        let mut seen = FixedBitSet::with_capacity(self.edges.len());
        let mut queue = VecDeque::new();
        seen.insert(start.index());
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for &next in self.successors(node) {
                if next == start {
                    let mut trace = vec![start];
                    let mut cursor = Some(node);
                    while let Some(current) = cursor {
                        if current == start {
                            break;
                        }
                        trace.push(current);
                        cursor = parent[current.index()];
                    }
                    trace[1..].reverse();
                    trace.push(start);
                    return trace;
                }
                if in_component.contains(next.index()) && !seen.contains(next.index()) {
                    seen.insert(next.index());
                    parent[next.index()] = Some(node);
                    queue.push_back(next);
                }
            }
        }

        // Unreachable for a genuine component; fall back to member order.
        let mut trace = members.to_vec();
        trace.push(start);
        trace
    }
}

/// Wrappers a carrier resolves through.
fn carrier_edges(types: &TypeInterner, carrier: TypeId) -> SmallVec<[WrapperId; 2]> {
    let mut out = SmallVec::new();
    let mut current = carrier;
    for _ in 0..MAX_BOUND_CHAIN {
        let Some(data) = types.lookup(current) else {
            break;
        };
        match data.shape {
            TypeShape::Wrapper(id) => {
                out.push(id);
                break;
            }
            TypeShape::Ordinary(OrdinaryType::TypeParameter(info)) => match info.bound {
                Some(bound) => current = bound,
                None => break,
            },
            TypeShape::Ordinary(_) => break,
        }
    }
    out
}

struct Tarjan {
    next_index: u32,
    index: Vec<Option<u32>>,
    lowlink: Vec<u32>,
    on_stack: FixedBitSet,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan {
    fn new(len: usize) -> Self {
        Self {
            next_index: 0,
            index: vec![None; len],
            lowlink: vec![0; len],
            on_stack: FixedBitSet::with_capacity(len),
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Tarjan from `root`, with an explicit frame stack in place of
    /// recursion so chain length never bounds the native stack.
    fn strongconnect(&mut self, graph: &CarrierGraph, root: usize) {
        // (node, index of the next successor to visit)
        let mut frames: Vec<(usize, usize)> = Vec::new();
        self.visit(root);
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let (node, cursor) = *frame;
            let successors = graph.successors(WrapperId(node as u32));

            if let Some(&succ) = successors.get(cursor) {
                frame.1 += 1;
                let succ = succ.index();
                if succ >= self.index.len() {
                    continue;
                }
                match self.index[succ] {
                    None => {
                        self.visit(succ);
                        frames.push((succ, 0));
                    }
                    Some(succ_index) if self.on_stack.contains(succ) => {
                        self.lowlink[node] = self.lowlink[node].min(succ_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            // Every successor of `node` is done.
            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if Some(self.lowlink[node]) == self.index[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.set(member, false);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    fn visit(&mut self, node: usize) {
        self.index[node] = Some(self.next_index);
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);
    }
}

#[cfg(test)]
#[path = "../tests/carrier_graph_tests.rs"]
mod tests;
