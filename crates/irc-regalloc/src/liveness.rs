//! Liveness analysis
//!
//! Backward dataflow over the instruction-level flow graph:
//!
//! ```text
//! live_in[n]  = use[n] ∪ (live_out[n] − def[n])
//! live_out[n] = ∪ live_in[s]  for all successors s of n
//! ```
//!
//! All sets start empty and the equations are iterated until a full pass
//! changes nothing. Nodes are visited in reverse program order, which for a
//! backward problem usually converges in one pass more than the loop nesting
//! depth. The result is exact, the interference graph depends on it.

use std::collections::BTreeSet;

use super::flowgraph::{FNode, FlowGraph};
use super::instr::Instr;
use super::temp::Temp;

/// Set of temporaries, ordered so every consumer iterates deterministically
pub type TempSet = BTreeSet<Temp>;

/// Live-in and live-out sets for every flow graph node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSets {
    live_in: Vec<TempSet>,
    live_out: Vec<TempSet>,
    /// Full passes made before the sets stopped changing
    passes: usize,
}

impl LiveSets {
    /// Compute liveness for `instrs`, whose flow graph is `flow`
    pub fn compute(instrs: &[Instr], flow: &FlowGraph) -> Self {
        let mut live = LiveSets {
            live_in: vec![TempSet::new(); flow.len()],
            live_out: vec![TempSet::new(); flow.len()],
            passes: 0,
        };

        let mut changed = true;
        while changed {
            changed = false;
            live.passes += 1;

            for node in flow.nodes().rev() {
                let live_out = live.out_from_successors(flow, node);
                let live_in = transfer(&instrs[node.0], &live_out);

                if live_in != live.live_in[node.0] || live_out != live.live_out[node.0] {
                    changed = true;
                    live.live_in[node.0] = live_in;
                    live.live_out[node.0] = live_out;
                }
            }
        }

        live
    }

    fn out_from_successors(&self, flow: &FlowGraph, node: FNode) -> TempSet {
        let mut out = TempSet::new();
        for succ in flow.successors(node) {
            out.extend(self.live_in[succ.0].iter().copied());
        }
        out
    }

    pub fn live_in(&self, node: FNode) -> &TempSet {
        &self.live_in[node.0]
    }

    pub fn live_out(&self, node: FNode) -> &TempSet {
        &self.live_out[node.0]
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Whether both equations hold at every node
    ///
    /// Always true for sets returned by [`LiveSets::compute`]; exposed so
    /// callers and tests can check results they derive or cache.
    pub fn is_fixpoint(&self, instrs: &[Instr], flow: &FlowGraph) -> bool {
        flow.nodes().all(|node| {
            let out = self.out_from_successors(flow, node);
            out == self.live_out[node.0] && transfer(&instrs[node.0], &out) == self.live_in[node.0]
        })
    }
}

/// `use ∪ (out − def)` for one instruction
fn transfer(inst: &Instr, live_out: &TempSet) -> TempSet {
    let mut live_in = live_out.clone();
    for def in inst.defs() {
        live_in.remove(def);
    }
    live_in.extend(inst.uses().iter().copied());
    live_in
}
