//! Graph coloring with iterated register coalescing
//!
//! One [`GraphColoring`] runs one allocation attempt over a freshly built
//! interference graph, following George & Appel:
//!
//! 1. **Simplify**: remove a low-degree node that is not move-related
//! 2. **Coalesce**: merge the ends of a move when Briggs or George says it is safe
//! 3. **Freeze**: give up coalescing a low-degree move-related node
//! 4. **Spill**: push a high-degree node optimistically
//! 5. **Select**: pop the stack and hand out registers first-fit
//!
//! Every node carries exactly one [`NodeState`] tag and every move one
//! [`MoveState`] tag. Tags only change through [`GraphColoring::set_state`]
//! and [`GraphColoring::set_move_state`], which keep the ordered worklist
//! sets in step with the tags.

mod check;
mod coalesce;
pub(crate) mod cost;
mod select;
mod worklist;

use std::collections::{BTreeMap, BTreeSet};

use super::RegAllocError;
use super::config::{AllocatorConfig, SpillHeuristic};
use super::interference::{InterferenceGraph, MoveId, NodeId};
use super::regfile::{Reg, RegisterFile};
use super::temp::Temp;

/// Worklist a node currently belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// Machine register, never simplified or spilled
    Precolored,
    /// Not yet categorized
    Initial,
    /// Low-degree, non-move-related
    Simplify,
    /// Low-degree, move-related
    Freeze,
    /// High-degree
    Spill,
    /// On the select stack
    OnStack,
    /// Merged into its alias
    Coalesced,
    Colored,
    /// No register left during select
    Spilled,
}

/// Worklist a move currently belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MoveState {
    /// Ready to be considered for coalescing
    Worklist,
    /// Not yet safe to coalesce
    Active,
    Coalesced,
    /// Both ends interfere
    Constrained,
    /// No longer considered for coalescing
    Frozen,
}

/// Result of one attempt
#[derive(Debug)]
pub(crate) struct ColorOutcome {
    /// Register of every colored, precolored and coalesced temp
    pub colors: BTreeMap<Temp, Reg>,
    /// Temps that must live in memory, in node order
    pub spilled: Vec<Temp>,
    /// `(merged, representative)` for every coalesced temp
    pub aliases: Vec<(Temp, Temp)>,
    pub coalesced_moves: usize,
    pub constrained_moves: usize,
    pub frozen_moves: usize,
}

/// Worklist machine for one allocation attempt
pub(crate) struct GraphColoring<'a> {
    /// Number of allocatable registers (K)
    k: usize,
    regs: &'a RegisterFile,
    heuristic: SpillHeuristic,
    verify: bool,
    graph: InterferenceGraph,
    /// Estimated cost of spilling each node; summed over coalesced classes
    spill_cost: Vec<f64>,
    node_state: Vec<NodeState>,
    move_state: Vec<MoveState>,
    simplify_worklist: BTreeSet<NodeId>,
    freeze_worklist: BTreeSet<NodeId>,
    spill_worklist: BTreeSet<NodeId>,
    select_stack: Vec<NodeId>,
    spilled_nodes: BTreeSet<NodeId>,
    move_worklist: BTreeSet<MoveId>,
    active_moves: BTreeSet<MoveId>,
    /// Union-find parent; a node is its own alias until coalesced
    alias: Vec<NodeId>,
    color: Vec<Option<Reg>>,
}

impl<'a> GraphColoring<'a> {
    pub fn new(
        graph: InterferenceGraph,
        spill_cost: Vec<f64>,
        regs: &'a RegisterFile,
        config: &AllocatorConfig,
    ) -> Self {
        let node_state = graph
            .nodes()
            .map(|n| {
                if graph.is_precolored(n) {
                    NodeState::Precolored
                } else {
                    NodeState::Initial
                }
            })
            .collect();
        let color = graph.nodes().map(|n| graph.precolored(n)).collect();
        let moves = graph.moves().len();

        Self {
            k: regs.k(),
            regs,
            heuristic: config.spill_heuristic,
            verify: config.check_invariants,
            alias: graph.nodes().collect(),
            spill_cost,
            node_state,
            move_state: vec![MoveState::Worklist; moves],
            simplify_worklist: BTreeSet::new(),
            freeze_worklist: BTreeSet::new(),
            spill_worklist: BTreeSet::new(),
            select_stack: Vec::new(),
            spilled_nodes: BTreeSet::new(),
            move_worklist: (0..moves).map(MoveId).collect(),
            active_moves: BTreeSet::new(),
            color,
            graph,
        }
    }

    /// Run the worklist machine to completion and assign colors
    pub fn run(mut self) -> Result<ColorOutcome, RegAllocError> {
        if self.k == 0 {
            return Err(RegAllocError::NoAllocatableRegisters);
        }

        self.make_worklist();
        self.verify()?;

        loop {
            if let Some(&node) = self.simplify_worklist.first() {
                self.simplify(node);
            } else if let Some(&mv) = self.move_worklist.first() {
                self.coalesce(mv);
            } else if let Some(&node) = self.freeze_worklist.first() {
                self.freeze(node);
            } else if !self.spill_worklist.is_empty() {
                self.select_spill();
            } else {
                break;
            }
            self.verify()?;
        }

        self.assign_colors();
        Ok(self.into_outcome())
    }

    fn verify(&self) -> Result<(), RegAllocError> {
        if self.verify { self.check() } else { Ok(()) }
    }

    /// Move `node` to the worklist for `to`
    pub(super) fn set_state(&mut self, node: NodeId, to: NodeState) {
        let from = std::mem::replace(&mut self.node_state[node.0], to);
        match from {
            NodeState::Simplify => {
                self.simplify_worklist.remove(&node);
            }
            NodeState::Freeze => {
                self.freeze_worklist.remove(&node);
            }
            NodeState::Spill => {
                self.spill_worklist.remove(&node);
            }
            NodeState::Spilled => {
                self.spilled_nodes.remove(&node);
            }
            NodeState::OnStack => {
                if self.select_stack.last() == Some(&node) {
                    self.select_stack.pop();
                } else {
                    self.select_stack.retain(|&n| n != node);
                }
            }
            NodeState::Precolored
            | NodeState::Initial
            | NodeState::Coalesced
            | NodeState::Colored => {}
        }
        match to {
            NodeState::Simplify => {
                self.simplify_worklist.insert(node);
            }
            NodeState::Freeze => {
                self.freeze_worklist.insert(node);
            }
            NodeState::Spill => {
                self.spill_worklist.insert(node);
            }
            NodeState::Spilled => {
                self.spilled_nodes.insert(node);
            }
            NodeState::OnStack => self.select_stack.push(node),
            NodeState::Precolored
            | NodeState::Initial
            | NodeState::Coalesced
            | NodeState::Colored => {}
        }
    }

    /// Move `mv` to the move list for `to`
    pub(super) fn set_move_state(&mut self, mv: MoveId, to: MoveState) {
        let from = std::mem::replace(&mut self.move_state[mv.0], to);
        match from {
            MoveState::Worklist => {
                self.move_worklist.remove(&mv);
            }
            MoveState::Active => {
                self.active_moves.remove(&mv);
            }
            MoveState::Coalesced | MoveState::Constrained | MoveState::Frozen => {}
        }
        match to {
            MoveState::Worklist => {
                self.move_worklist.insert(mv);
            }
            MoveState::Active => {
                self.active_moves.insert(mv);
            }
            MoveState::Coalesced | MoveState::Constrained | MoveState::Frozen => {}
        }
    }

    fn state(&self, node: NodeId) -> NodeState {
        self.node_state[node.0]
    }

    fn temp(&self, node: NodeId) -> Temp {
        self.graph.temp(node)
    }

    fn count_moves(&self, state: MoveState) -> usize {
        self.move_state.iter().filter(|&&s| s == state).count()
    }

    fn into_outcome(mut self) -> ColorOutcome {
        let mut colors = BTreeMap::new();
        let mut aliases = Vec::new();
        for node in self.graph.nodes() {
            if let Some(reg) = self.color[node.0] {
                colors.insert(self.temp(node), reg);
            }
            if self.state(node) == NodeState::Coalesced {
                let alias = self.get_alias(node);
                aliases.push((self.temp(node), self.temp(alias)));
            }
        }

        ColorOutcome {
            spilled: self.spilled_nodes.iter().map(|&n| self.temp(n)).collect(),
            coalesced_moves: self.count_moves(MoveState::Coalesced),
            constrained_moves: self.count_moves(MoveState::Constrained),
            frozen_moves: self.count_moves(MoveState::Frozen),
            colors,
            aliases,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::flowgraph::FlowGraph;
    use crate::instr::Instr;
    use crate::liveness::LiveSets;
    use crate::regfile::RegisterFileDesc;

    /// `r0..rK`, all allocatable, no return sink
    pub(crate) fn make_regs(k: usize) -> RegisterFile {
        let names: Vec<String> = (0..k).map(|i| format!("r{i}")).collect();
        RegisterFile::from_desc(&RegisterFileDesc {
            registers: names.clone(),
            allocatable: names,
            return_sink: Vec::new(),
            caller_saves: Vec::new(),
            callee_saves: Vec::new(),
        })
        .unwrap()
    }

    pub(crate) fn make_coloring<'a>(
        body: &[Instr],
        regs: &'a RegisterFile,
        config: &AllocatorConfig,
    ) -> GraphColoring<'a> {
        let flow = FlowGraph::build(body).unwrap();
        let live = LiveSets::compute(body, &flow);
        let graph = InterferenceGraph::build(body, &flow, &live, regs).unwrap();
        let costs = cost::spill_costs(body, &flow, &graph, &HashSet::new(), config.loop_weight);
        GraphColoring::new(graph, costs, regs, config)
    }

    fn color_body(body: &[Instr], regs: &RegisterFile) -> ColorOutcome {
        let config = AllocatorConfig {
            check_invariants: true,
            ..AllocatorConfig::default()
        };
        make_coloring(body, regs, &config).run().unwrap()
    }

    fn def(t: u32) -> Instr {
        Instr::oper("movq $1,`d0", vec![Temp(t)], vec![])
    }

    fn use_all(temps: &[u32]) -> Instr {
        Instr::oper("use", vec![], temps.iter().map(|&t| Temp(t)).collect())
    }

    #[test]
    fn test_simple_allocation() {
        let regs = make_regs(2);
        let body = vec![def(10), def(11), use_all(&[10, 11]), def(12), use_all(&[12])];
        let out = color_body(&body, &regs);

        assert!(out.spilled.is_empty());
        assert_ne!(out.colors[&Temp(10)], out.colors[&Temp(11)]);
        assert!(out.colors.contains_key(&Temp(12)));
    }

    #[test]
    fn test_move_is_coalesced() {
        // b <- a, a dead afterwards
        let regs = make_regs(2);
        let body = vec![
            def(10),
            Instr::mov("movq `s0,`d0", Temp(11), Temp(10)),
            use_all(&[11]),
        ];
        let out = color_body(&body, &regs);

        assert!(out.spilled.is_empty());
        assert_eq!(out.coalesced_moves, 1);
        assert_eq!(out.colors[&Temp(10)], out.colors[&Temp(11)]);
        assert_eq!(out.aliases, vec![(Temp(10), Temp(11))]);
    }

    #[test]
    fn test_interfering_move_is_constrained() {
        let regs = make_regs(3);
        let body = vec![
            def(10),
            def(11),
            def(12),
            use_all(&[10, 11, 12]),
            Instr::mov("movq `s0,`d0", Temp(11), Temp(10)),
            use_all(&[11, 12]),
        ];
        let out = color_body(&body, &regs);

        assert!(out.spilled.is_empty());
        assert_eq!(out.constrained_moves, 1);
        assert_eq!(out.coalesced_moves, 0);
        let colors: HashSet<Reg> = [10, 11, 12].iter().map(|&t| out.colors[&Temp(t)]).collect();
        assert_eq!(colors.len(), 3);
    }

    #[test]
    fn test_clique_spills_excess_nodes() {
        let regs = make_regs(2);
        let body = vec![def(10), def(11), def(12), def(13), use_all(&[10, 11, 12, 13])];
        let out = color_body(&body, &regs);

        assert_eq!(out.spilled.len(), 2);
        let colored: Vec<Reg> = [10, 11, 12, 13]
            .iter()
            .filter_map(|&t| out.colors.get(&Temp(t)).copied())
            .collect();
        assert_eq!(colored.len(), 2);
        assert_ne!(colored[0], colored[1]);
    }

    #[test]
    fn test_precolored_move_uses_george() {
        // t20 <- %rdi ; t20 += 1 ; %rax <- t20
        let regs = RegisterFile::x86_64();
        let rdi = regs.by_name("%rdi").unwrap();
        let body = vec![
            Instr::mov("movq `s0,`d0", Temp(20), rdi.temp()),
            Instr::oper("addq $1,`d0", vec![Temp(20)], vec![Temp(20)]),
            Instr::mov("movq `s0,`d0", Temp(0), Temp(20)),
        ];
        let out = color_body(&body, &regs);

        assert_eq!(out.colors[&Temp(20)], rdi);
        assert_eq!(out.coalesced_moves, 1);
        // %rax <- %rdi after merging cannot be coalesced
        assert_eq!(out.constrained_moves, 1);
    }

    #[test]
    fn test_empty_graph() {
        let regs = make_regs(1);
        let out = color_body(&[], &regs);
        assert!(out.colors.is_empty());
        assert!(out.spilled.is_empty());
    }
}
