//! Interference graph and move list
//!
//! Nodes live in an arena indexed by [`NodeId`] and are created lazily, the
//! first time their temp shows up in a use or def set, so node numbering
//! follows program order. For every instruction `n` with live-out set `L`:
//!
//! - every pair `{a, b} ⊆ L` interferes
//! - every `d ∈ def(n)` interferes with every `o ∈ L`, `d ≠ o`
//!
//! except that the destination and source of a `Move` never interfere because
//! of that move, which is what makes them coalescing candidates.
//!
//! Precolored nodes keep no adjacency list and report an infinite degree;
//! the pair set still records their edges in both directions.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use super::RegAllocError;
use super::flowgraph::{FNode, FlowGraph};
use super::instr::Instr;
use super::liveness::LiveSets;
use super::regfile::{Reg, RegisterFile};
use super::temp::Temp;

/// Degree reported for precolored nodes
pub const INFINITE_DEGREE: usize = usize::MAX;

/// Interference graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Index into [`InterferenceGraph::moves`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoveId(pub usize);

/// A `Move` instruction seen as a coalescing candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEdge {
    pub dst: NodeId,
    pub src: NodeId,
    /// Flow node of the move instruction
    pub at: FNode,
}

#[derive(Debug, Default)]
pub struct InterferenceGraph {
    /// Node -> temp
    temps: Vec<Temp>,
    /// Temp -> node
    nodes: HashMap<Temp, NodeId>,
    /// Register of each precolored node
    precolored: Vec<Option<Reg>>,
    /// Both orientations of every edge
    adj_set: HashSet<(NodeId, NodeId)>,
    /// Neighbors of each virtual node; empty for precolored nodes
    adj_list: Vec<Vec<NodeId>>,
    degree: Vec<usize>,
    moves: Vec<MoveEdge>,
    /// Moves each node takes part in
    move_list: Vec<Vec<MoveId>>,
}

impl InterferenceGraph {
    /// Build the graph of one allocation attempt
    pub fn build(
        instrs: &[Instr],
        flow: &FlowGraph,
        live: &LiveSets,
        regs: &RegisterFile,
    ) -> Result<Self, RegAllocError> {
        let mut graph = InterferenceGraph::default();

        for inst in instrs {
            for &temp in inst.uses().iter().chain(inst.defs()) {
                graph.ensure_node(temp, regs);
            }
        }

        for node in flow.nodes() {
            let inst = &instrs[node.0];

            let exempt = match inst.move_pair() {
                Some((dst, src)) => {
                    let edge = MoveEdge {
                        dst: graph.lookup(dst)?,
                        src: graph.lookup(src)?,
                        at: node,
                    };
                    graph.add_move(edge);
                    Some((edge.dst, edge.src))
                }
                None => None,
            };
            let is_exempt = |a: NodeId, b: NodeId| {
                exempt.is_some_and(|(d, s)| (a == d && b == s) || (a == s && b == d))
            };

            let live_out = live
                .live_out(node)
                .iter()
                .map(|&t| graph.lookup(t))
                .collect::<Result<Vec<_>, _>>()?;

            for (i, &a) in live_out.iter().enumerate() {
                for &b in &live_out[i + 1..] {
                    if !is_exempt(a, b) {
                        graph.add_edge(a, b);
                    }
                }
            }

            for &def in inst.defs() {
                let d = graph.lookup(def)?;
                for &o in &live_out {
                    if d != o && !is_exempt(d, o) {
                        graph.add_edge(d, o);
                    }
                }
            }
        }

        Ok(graph)
    }

    fn ensure_node(&mut self, temp: Temp, regs: &RegisterFile) -> NodeId {
        if let Some(&node) = self.nodes.get(&temp) {
            return node;
        }
        let node = NodeId(self.temps.len());
        let reg = regs.reg_of(temp);
        self.temps.push(temp);
        self.nodes.insert(temp, node);
        self.precolored.push(reg);
        self.adj_list.push(Vec::new());
        self.degree
            .push(if reg.is_some() { INFINITE_DEGREE } else { 0 });
        self.move_list.push(Vec::new());
        node
    }

    fn add_move(&mut self, edge: MoveEdge) {
        let id = MoveId(self.moves.len());
        self.moves.push(edge);
        self.move_list[edge.src.0].push(id);
        if edge.dst != edge.src {
            self.move_list[edge.dst.0].push(id);
        }
    }

    /// Node of `temp`, failing if the temp never appeared in the instructions
    pub fn lookup(&self, temp: Temp) -> Result<NodeId, RegAllocError> {
        self.node(temp).ok_or(RegAllocError::MissingTemp(temp))
    }

    pub fn node(&self, temp: Temp) -> Option<NodeId> {
        self.nodes.get(&temp).copied()
    }

    pub fn temp(&self, node: NodeId) -> Temp {
        self.temps[node.0]
    }

    pub fn len(&self) -> usize {
        self.temps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.temps.len()).map(NodeId)
    }

    pub fn precolored(&self, node: NodeId) -> Option<Reg> {
        self.precolored[node.0]
    }

    pub fn is_precolored(&self, node: NodeId) -> bool {
        self.precolored[node.0].is_some()
    }

    pub fn interferes(&self, u: NodeId, v: NodeId) -> bool {
        self.adj_set.contains(&(u, v))
    }

    /// Every neighbor ever added; callers filter out removed nodes
    pub fn adj_list(&self, node: NodeId) -> &[NodeId] {
        &self.adj_list[node.0]
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.degree[node.0]
    }

    pub fn moves(&self) -> &[MoveEdge] {
        &self.moves
    }

    pub fn mov(&self, id: MoveId) -> MoveEdge {
        self.moves[id.0]
    }

    pub fn move_list(&self, node: NodeId) -> &[MoveId] {
        &self.move_list[node.0]
    }

    /// Every edge once, lower node first
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.adj_set.iter().copied().filter(|(u, v)| u < v)
    }

    /// Insert `u–v`; no-op for self edges and edges already present
    pub(crate) fn add_edge(&mut self, u: NodeId, v: NodeId) {
        if u == v || self.adj_set.contains(&(u, v)) {
            return;
        }
        self.adj_set.insert((u, v));
        self.adj_set.insert((v, u));
        for (a, b) in [(u, v), (v, u)] {
            if !self.is_precolored(a) {
                self.adj_list[a.0].push(b);
                self.degree[a.0] += 1;
            }
        }
    }

    /// Drop one from a virtual node's degree, returning the old degree
    pub(crate) fn decrement_degree(&mut self, node: NodeId) -> usize {
        let old = self.degree[node.0];
        if !self.is_precolored(node) {
            self.degree[node.0] = old.saturating_sub(1);
        }
        old
    }

    /// Hand every move of `from` over to `into`
    pub(crate) fn merge_moves(&mut self, from: NodeId, into: NodeId) {
        for id in self.move_list[from.0].clone() {
            if !self.move_list[into.0].contains(&id) {
                self.move_list[into.0].push(id);
            }
        }
    }
}
