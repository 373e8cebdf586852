//! Invariant verification between worklist steps

use super::*;

impl GraphColoring<'_> {
    /// Verify adjacency, degree and worklist invariants
    pub(super) fn check(&self) -> Result<(), RegAllocError> {
        self.check_adjacency()?;
        self.check_node_partition()?;
        self.check_move_partition()?;
        self.check_degrees()
    }

    fn check_adjacency(&self) -> Result<(), RegAllocError> {
        for node in self.graph.nodes() {
            let neighbors = self.graph.adj_list(node);
            for (i, &t) in neighbors.iter().enumerate() {
                let mirrored = self.graph.is_precolored(t) || self.graph.adj_list(t).contains(&node);
                if t == node
                    || neighbors[..i].contains(&t)
                    || !self.graph.interferes(node, t)
                    || !self.graph.interferes(t, node)
                    || !mirrored
                {
                    return Err(RegAllocError::AsymmetricEdge {
                        a: self.temp(node),
                        b: self.temp(t),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_node_partition(&self) -> Result<(), RegAllocError> {
        let inconsistent = |node: NodeId, detail: String| RegAllocError::WorklistInconsistency {
            temp: self.temp(node),
            detail,
        };

        for node in self.graph.nodes() {
            let state = self.state(node);
            if self.graph.is_precolored(node) != (state == NodeState::Precolored) {
                return Err(inconsistent(node, format!("precolored node tagged {state:?}")));
            }

            let listed = match state {
                NodeState::Initial => {
                    return Err(inconsistent(node, "still uncategorized".into()));
                }
                NodeState::Simplify => self.simplify_worklist.contains(&node),
                NodeState::Freeze => self.freeze_worklist.contains(&node),
                NodeState::Spill => self.spill_worklist.contains(&node),
                NodeState::OnStack => self.select_stack.contains(&node),
                NodeState::Spilled => self.spilled_nodes.contains(&node),
                NodeState::Precolored | NodeState::Coalesced | NodeState::Colored => true,
            };
            if !listed {
                return Err(inconsistent(node, format!("tagged {state:?} but not listed")));
            }
        }

        let worklists = [
            (NodeState::Simplify, &self.simplify_worklist),
            (NodeState::Freeze, &self.freeze_worklist),
            (NodeState::Spill, &self.spill_worklist),
            (NodeState::Spilled, &self.spilled_nodes),
        ];
        for (expected, members) in worklists {
            if let Some(&node) = members.iter().find(|&&n| self.state(n) != expected) {
                return Err(inconsistent(
                    node,
                    format!("listed as {expected:?} but tagged {:?}", self.state(node)),
                ));
            }
        }

        for (i, &node) in self.select_stack.iter().enumerate() {
            if self.state(node) != NodeState::OnStack || self.select_stack[..i].contains(&node) {
                return Err(inconsistent(node, "stray select stack entry".into()));
            }
        }
        Ok(())
    }

    fn check_move_partition(&self) -> Result<(), RegAllocError> {
        for (i, &state) in self.move_state.iter().enumerate() {
            let mv = MoveId(i);
            let in_worklist = self.move_worklist.contains(&mv);
            let in_active = self.active_moves.contains(&mv);
            let consistent = match state {
                MoveState::Worklist => in_worklist && !in_active,
                MoveState::Active => in_active && !in_worklist,
                MoveState::Coalesced | MoveState::Constrained | MoveState::Frozen => {
                    !in_worklist && !in_active
                }
            };
            if !consistent {
                let edge = self.graph.mov(mv);
                return Err(RegAllocError::WorklistInconsistency {
                    temp: self.temp(edge.dst),
                    detail: format!("move from {} tagged {state:?}", self.temp(edge.src)),
                });
            }
        }
        Ok(())
    }

    /// Degree of every node still in the graph counts its remaining neighbors
    fn check_degrees(&self) -> Result<(), RegAllocError> {
        for node in self.graph.nodes() {
            if !matches!(
                self.state(node),
                NodeState::Simplify | NodeState::Freeze | NodeState::Spill
            ) {
                continue;
            }

            let actual = self
                .graph
                .adj_list(node)
                .iter()
                .filter(|&&t| {
                    matches!(
                        self.state(t),
                        NodeState::Precolored
                            | NodeState::Simplify
                            | NodeState::Freeze
                            | NodeState::Spill
                    )
                })
                .count();
            let cached = self.graph.degree(node);
            if cached != actual {
                return Err(RegAllocError::DegreeMismatch {
                    temp: self.temp(node),
                    cached,
                    actual,
                });
            }
        }
        Ok(())
    }
}
