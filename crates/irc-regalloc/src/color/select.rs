use log::trace;

use super::*;

impl GraphColoring<'_> {
    /// Give up coalescing `node` so it can be simplified
    pub(super) fn freeze(&mut self, node: NodeId) {
        trace!("freeze {}", self.temp(node));
        self.set_state(node, NodeState::Simplify);
        self.freeze_moves(node);
    }

    /// Freeze every pending move of `u`, releasing partners left with nothing
    /// to coalesce
    pub(super) fn freeze_moves(&mut self, u: NodeId) {
        for mv in self.node_moves(u) {
            let edge = self.graph.mov(mv);
            let x = self.get_alias(edge.dst);
            let y = self.get_alias(edge.src);
            let v = if y == self.get_alias(u) { x } else { y };

            self.set_move_state(mv, MoveState::Frozen);

            if self.state(v) == NodeState::Freeze
                && !self.move_related(v)
                && self.graph.degree(v) < self.k
            {
                self.set_state(v, NodeState::Simplify);
            }
        }
    }

    /// Push a potential spill and stop coalescing it
    pub(super) fn select_spill(&mut self) {
        let Some(node) = self.spill_candidate() else {
            return;
        };
        trace!(
            "select spill {} (cost {}, degree {})",
            self.temp(node),
            self.spill_cost[node.0],
            self.graph.degree(node)
        );
        self.set_state(node, NodeState::Simplify);
        self.freeze_moves(node);
    }

    /// Pop the select stack, giving each node the first free register
    pub(super) fn assign_colors(&mut self) {
        while let Some(&node) = self.select_stack.last() {
            let mut ok_colors = self.regs.allocatable().to_vec();
            for w in self.graph.adj_list(node).to_vec() {
                let w = self.get_alias(w);
                if matches!(self.state(w), NodeState::Colored | NodeState::Precolored) {
                    if let Some(reg) = self.color[w.0] {
                        ok_colors.retain(|&r| r != reg);
                    }
                }
            }

            match ok_colors.first() {
                Some(&reg) => {
                    self.color[node.0] = Some(reg);
                    self.set_state(node, NodeState::Colored);
                }
                None => {
                    trace!("no register left for {}", self.temp(node));
                    self.set_state(node, NodeState::Spilled);
                }
            }
        }

        for node in self.graph.nodes() {
            if self.state(node) == NodeState::Coalesced {
                let alias = self.get_alias(node);
                self.color[node.0] = self.color[alias.0];
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
    fn test_freeze_gives_up_on_move() {
        // Freezing t10 drops the only move of t11 as well
        let regs = make_regs(2);
        let body = vec![
            Instr::oper("def", vec![Temp(10)], vec![]),
            Instr::mov("movq `s0,`d0", Temp(11), Temp(10)),
            Instr::oper("use", vec![], vec![Temp(11)]),
        ];
        let config = AllocatorConfig::default();
        let mut coloring = make_coloring(&body, &regs, &config);
        coloring.make_worklist();

        let t10 = coloring.graph.node(Temp(10)).unwrap();
        let t11 = coloring.graph.node(Temp(11)).unwrap();
        assert_eq!(coloring.state(t10), NodeState::Freeze);

        coloring.freeze(t10);
        assert_eq!(coloring.move_state[0], MoveState::Frozen);
        assert_eq!(coloring.state(t10), NodeState::Simplify);
        assert_eq!(coloring.state(t11), NodeState::Simplify);
        assert!(coloring.move_worklist.is_empty());
        assert!(coloring.check().is_ok());
    }

    #[test]
    fn test_first_fit_follows_allocatable_order() {
        let regs = RegisterFile::from_json(
            r#"{ "registers": ["a", "b", "c"], "allocatable": ["c", "a", "b"] }"#,
        )
        .unwrap();
        let body = vec![
            Instr::oper("def", vec![Temp(10)], vec![]),
            Instr::oper("def", vec![Temp(11)], vec![]),
            Instr::oper("use", vec![], vec![Temp(10), Temp(11)]),
        ];
        let config = AllocatorConfig::default();
        let out = make_coloring(&body, &regs, &config).run().unwrap();

        // t11 is simplified last, so it is colored first
        assert_eq!(regs.name(out.colors[&Temp(11)]), "c");
        assert_eq!(regs.name(out.colors[&Temp(10)]), "a");
    }

    #[test]
    fn test_precolored_neighbor_blocks_its_register() {
        let regs = make_regs(2);
        // r0 is defined while t10 is live
        let body = vec![
            Instr::oper("def", vec![Temp(10)], vec![]),
            Instr::oper("clobber", vec![Temp(0)], vec![]),
            Instr::oper("use", vec![], vec![Temp(10)]),
        ];
        let config = AllocatorConfig::default();
        let out = make_coloring(&body, &regs, &config).run().unwrap();
        assert_eq!(regs.name(out.colors[&Temp(10)]), "r1");
        assert_eq!(regs.name(out.colors[&Temp(0)]), "r0");
    }
}
