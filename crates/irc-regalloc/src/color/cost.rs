//! Spill cost estimation and spill candidate choice

use std::cmp::Ordering;
use std::collections::HashSet;

use super::*;
use crate::flowgraph::FlowGraph;
use crate::instr::Instr;

/// Loop-weighted reference count of every node
///
/// Each use or def of a temp adds `loop_weight ^ depth` to its node, where
/// `depth` is the loop nesting depth of the instruction. Precolored nodes and
/// temps in `unspillable` cost infinity.
pub(crate) fn spill_costs(
    instrs: &[Instr],
    flow: &FlowGraph,
    graph: &InterferenceGraph,
    unspillable: &HashSet<Temp>,
    loop_weight: f64,
) -> Vec<f64> {
    let mut cost = vec![0.0; graph.len()];

    for (inst, depth) in instrs.iter().zip(flow.loop_depths()) {
        let weight = loop_weight.powi(i32::try_from(depth).unwrap_or(i32::MAX));
        for &temp in inst.uses().iter().chain(inst.defs()) {
            if let Some(node) = graph.node(temp) {
                cost[node.0] += weight;
            }
        }
    }

    for node in graph.nodes() {
        if graph.is_precolored(node) || unspillable.contains(&graph.temp(node)) {
            cost[node.0] = f64::INFINITY;
        }
    }
    cost
}

impl GraphColoring<'_> {
    /// Node to push optimistically when nothing else can move
    ///
    /// Nodes with a finite cost are preferred under every heuristic; ties
    /// go to the lower node.
    pub(super) fn spill_candidate(&self) -> Option<NodeId> {
        let finite: Vec<NodeId> = self
            .spill_worklist
            .iter()
            .copied()
            .filter(|n| self.spill_cost[n.0].is_finite())
            .collect();
        let candidates = if finite.is_empty() {
            self.spill_worklist.iter().copied().collect()
        } else {
            finite
        };

        match self.heuristic {
            SpillHeuristic::First => candidates.first().copied(),
            SpillHeuristic::HighestDegree => candidates.into_iter().reduce(|best, n| {
                if self.graph.degree(n) > self.graph.degree(best) {
                    n
                } else {
                    best
                }
            }),
            SpillHeuristic::CostPerDegree => candidates.into_iter().reduce(|best, n| {
                match self.cost_per_degree(n).total_cmp(&self.cost_per_degree(best)) {
                    Ordering::Less => n,
                    Ordering::Equal if self.graph.degree(n) > self.graph.degree(best) => n,
                    _ => best,
                }
            }),
        }
    }

    fn cost_per_degree(&self, node: NodeId) -> f64 {
        self.spill_cost[node.0] / self.graph.degree(node).max(1) as f64
    }
}
