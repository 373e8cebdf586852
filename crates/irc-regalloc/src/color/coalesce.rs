use std::collections::BTreeSet;

use log::trace;

use super::*;

impl GraphColoring<'_> {
    /// Try to merge the two ends of `mv`
    pub(super) fn coalesce(&mut self, mv: MoveId) {
        let edge = self.graph.mov(mv);
        let x = self.get_alias(edge.dst);
        let y = self.get_alias(edge.src);

        // If one end is precolored it becomes u
        let (u, v) = if self.graph.is_precolored(y) { (y, x) } else { (x, y) };

        if u == v {
            trace!("coalesce {} <- {}: same node", self.temp(x), self.temp(y));
            self.set_move_state(mv, MoveState::Coalesced);
            self.add_worklist(u);
        } else if self.graph.is_precolored(v)
            || self.graph.interferes(u, v)
            || !self.holds_allocatable(u)
        {
            trace!("coalesce {} <- {}: constrained", self.temp(x), self.temp(y));
            self.set_move_state(mv, MoveState::Constrained);
            self.add_worklist(u);
            self.add_worklist(v);
        } else if (self.graph.is_precolored(u) && self.george(u, v))
            || (!self.graph.is_precolored(u) && self.briggs(u, v))
        {
            trace!("coalesce {} <- {}: merged", self.temp(u), self.temp(v));
            self.set_move_state(mv, MoveState::Coalesced);
            self.combine(u, v);
            self.add_worklist(u);
        } else {
            self.set_move_state(mv, MoveState::Active);
        }
    }

    /// Precolored nodes outside the allocatable set never absorb a temp
    fn holds_allocatable(&self, node: NodeId) -> bool {
        self.graph
            .precolored(node)
            .is_none_or(|reg| self.regs.allocatable().contains(&reg))
    }

    /// George: every neighbor of `v` is insignificant, precolored, or
    /// already a neighbor of the precolored `u`
    pub(super) fn george(&self, u: NodeId, v: NodeId) -> bool {
        self.adjacent(v).into_iter().all(|t| {
            self.graph.degree(t) < self.k
                || self.graph.is_precolored(t)
                || self.graph.interferes(t, u)
        })
    }

    /// Briggs: the merged node has fewer than K significant neighbors
    pub(super) fn briggs(&self, u: NodeId, v: NodeId) -> bool {
        let significant: BTreeSet<NodeId> = self
            .adjacent(u)
            .into_iter()
            .chain(self.adjacent(v))
            .filter(|&n| self.graph.degree(n) >= self.k)
            .collect();
        significant.len() < self.k
    }

    /// Promote `node` from freeze to simplify once it has nothing left to coalesce
    pub(super) fn add_worklist(&mut self, node: NodeId) {
        if self.state(node) == NodeState::Freeze
            && !self.move_related(node)
            && self.graph.degree(node) < self.k
        {
            self.set_state(node, NodeState::Simplify);
        }
    }

    /// Merge `v` into `u`
    pub(super) fn combine(&mut self, u: NodeId, v: NodeId) {
        self.set_state(v, NodeState::Coalesced);
        self.alias[v.0] = u;
        self.graph.merge_moves(v, u);
        self.enable_moves(&[v]);

        for t in self.adjacent(v) {
            self.graph.add_edge(t, u);
            self.decrement_degree(t);
        }

        if self.graph.degree(u) >= self.k && self.state(u) == NodeState::Freeze {
            self.set_state(u, NodeState::Spill);
        }
        self.spill_cost[u.0] += self.spill_cost[v.0];
    }

    /// Representative of `node`'s coalesced class, compressing the path
    pub(super) fn get_alias(&mut self, node: NodeId) -> NodeId {
        let mut root = node;
        while self.alias[root.0] != root {
            root = self.alias[root.0];
        }

        let mut cur = node;
        while cur != root {
            let next = self.alias[cur.0];
            self.alias[cur.0] = root;
            cur = next;
        }
        root
    }
}
