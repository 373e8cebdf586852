use log::trace;

use super::*;

impl GraphColoring<'_> {
    /// Sort every initial node into the simplify, freeze or spill worklist
    pub(super) fn make_worklist(&mut self) {
        for node in self.graph.nodes() {
            if self.state(node) != NodeState::Initial {
                continue;
            }

            let to = if self.graph.degree(node) >= self.k {
                NodeState::Spill
            } else if self.move_related(node) {
                NodeState::Freeze
            } else {
                NodeState::Simplify
            };
            self.set_state(node, to);
        }
    }

    /// Neighbors still in the graph: not on the select stack, not merged away
    pub(super) fn adjacent(&self, node: NodeId) -> Vec<NodeId> {
        self.graph
            .adj_list(node)
            .iter()
            .copied()
            .filter(|&n| !matches!(self.state(n), NodeState::OnStack | NodeState::Coalesced))
            .collect()
    }

    /// Moves of `node` that may still be coalesced
    pub(super) fn node_moves(&self, node: NodeId) -> Vec<MoveId> {
        self.graph
            .move_list(node)
            .iter()
            .copied()
            .filter(|&mv| matches!(self.move_state[mv.0], MoveState::Worklist | MoveState::Active))
            .collect()
    }

    pub(super) fn move_related(&self, node: NodeId) -> bool {
        !self.node_moves(node).is_empty()
    }

    /// Push a low-degree node and release its neighbors
    pub(super) fn simplify(&mut self, node: NodeId) {
        trace!("simplify {}", self.temp(node));
        self.set_state(node, NodeState::OnStack);
        for neighbor in self.adjacent(node) {
            self.decrement_degree(neighbor);
        }
    }

    /// Lower a neighbor's degree; at K it leaves the spill worklist
    pub(super) fn decrement_degree(&mut self, node: NodeId) {
        if self.graph.is_precolored(node) {
            return;
        }

        let old_degree = self.graph.decrement_degree(node);
        if old_degree != self.k {
            return;
        }

        let mut nodes = self.adjacent(node);
        nodes.push(node);
        self.enable_moves(&nodes);

        if self.state(node) == NodeState::Spill {
            let to = if self.move_related(node) {
                NodeState::Freeze
            } else {
                NodeState::Simplify
            };
            self.set_state(node, to);
        }
    }

    /// Give active moves of `nodes` another chance at coalescing
    pub(super) fn enable_moves(&mut self, nodes: &[NodeId]) {
        for &node in nodes {
            for mv in self.node_moves(node) {
                if self.move_state[mv.0] == MoveState::Active {
                    self.set_move_state(mv, MoveState::Worklist);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::tests::{make_coloring, make_regs};
    use crate::instr::Instr;

    #[test]
    fn test_initial_classification() {
        // t10 and t11 interfere; t12 <- t11 is a move
        let regs = make_regs(1);
        let body = vec![
            Instr::oper("movq $1,`d0", vec![Temp(10)], vec![]),
            Instr::oper("movq $2,`d0", vec![Temp(11)], vec![]),
            Instr::oper("use", vec![], vec![Temp(10)]),
            Instr::mov("movq `s0,`d0", Temp(12), Temp(11)),
            Instr::oper("use", vec![], vec![Temp(12)]),
        ];
        let config = AllocatorConfig::default();
        let mut coloring = make_coloring(&body, &regs, &config);
        coloring.make_worklist();

        let t10 = coloring.graph.node(Temp(10)).unwrap();
        let t11 = coloring.graph.node(Temp(11)).unwrap();
        let t12 = coloring.graph.node(Temp(12)).unwrap();
        assert_eq!(coloring.state(t10), NodeState::Spill);
        assert_eq!(coloring.state(t11), NodeState::Spill);
        assert_eq!(coloring.state(t12), NodeState::Freeze);
        assert!(coloring.move_related(t11));
        assert!(coloring.check().is_ok());
    }

    #[test]
    fn test_simplify_releases_spill_node() {
        let regs = make_regs(1);
        let body = vec![
            Instr::oper("movq $1,`d0", vec![Temp(10)], vec![]),
            Instr::oper("movq $2,`d0", vec![Temp(11)], vec![]),
            Instr::oper("use", vec![], vec![Temp(10), Temp(11)]),
        ];
        let config = AllocatorConfig::default();
        let mut coloring = make_coloring(&body, &regs, &config);
        coloring.make_worklist();

        let t10 = coloring.graph.node(Temp(10)).unwrap();
        let t11 = coloring.graph.node(Temp(11)).unwrap();
        // Both have degree 1 == K
        coloring.set_state(t10, NodeState::Simplify);
        coloring.simplify(t10);

        assert_eq!(coloring.select_stack, vec![t10]);
        assert_eq!(coloring.graph.degree(t11), 0);
        assert_eq!(coloring.state(t11), NodeState::Simplify);
        assert!(coloring.check().is_ok());
    }
}
