//! Allocation driver
//!
//! Runs flow graph, liveness, interference and coloring on an instruction
//! list, rewriting it for spilled temps and starting over until an attempt
//! colors every node.

use std::collections::{BTreeMap, HashSet};

use log::{debug, trace, warn};

use super::RegAllocError;
use super::color::{GraphColoring, cost};
use super::config::AllocatorConfig;
use super::flowgraph::FlowGraph;
use super::frame::Frame;
use super::instr::Instr;
use super::interference::InterferenceGraph;
use super::liveness::LiveSets;
use super::regfile::{Reg, RegisterFile};
use super::spill;
use super::temp::{Temp, TempFactory};

/// Counters collected over every attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Attempts made, including the successful one
    pub rounds: usize,
    /// Moves coalesced in the final attempt
    pub coalesced_moves: usize,
    /// Moves whose ends interfere in the final attempt
    pub constrained_moves: usize,
    /// Moves given up on in the final attempt
    pub frozen_moves: usize,
    /// Moves dropped because both ends got the same register
    pub removed_moves: usize,
    /// Every temp that was spilled, in spill order
    pub spilled: Vec<Temp>,
    /// Frame slots handed out for spills
    pub spill_slots: usize,
}

/// Final instruction list and the register of every temp in it
#[derive(Debug, Clone)]
pub struct Allocation {
    pub instrs: Vec<Instr>,
    pub coloring: BTreeMap<Temp, Reg>,
    /// `(merged, representative)` pairs from the final attempt
    pub coalesced: Vec<(Temp, Temp)>,
    pub stats: AllocationStats,
}

impl Allocation {
    pub fn reg(&self, temp: Temp) -> Option<Reg> {
        self.coloring.get(&temp).copied()
    }

    /// Assembly text with register names substituted
    pub fn render(&self, regs: &RegisterFile) -> Vec<String> {
        self.instrs
            .iter()
            .map(|inst| {
                inst.render(|temp| match self.reg(temp) {
                    Some(reg) => regs.name(reg).to_string(),
                    None => temp.to_string(),
                })
            })
            .collect()
    }
}

/// Register allocator for one target, shareable across threads
#[derive(Debug, Clone)]
pub struct RegAllocator {
    regs: RegisterFile,
    config: AllocatorConfig,
}

impl RegAllocator {
    pub fn new(regs: RegisterFile) -> Self {
        Self::with_config(regs, AllocatorConfig::default())
    }

    pub fn with_config(regs: RegisterFile, config: AllocatorConfig) -> Self {
        Self { regs, config }
    }

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Allocate registers for one function body
    ///
    /// `temps` must be the factory that produced the body's virtual temps;
    /// spill rewrites draw fresh temps from it and spill slots from `frame`.
    pub fn allocate<F: Frame + ?Sized>(
        &self,
        instrs: Vec<Instr>,
        temps: &mut TempFactory,
        frame: &mut F,
    ) -> Result<Allocation, RegAllocError> {
        if self.regs.k() == 0 {
            return Err(RegAllocError::NoAllocatableRegisters);
        }

        let mut instrs = instrs;
        if self.config.append_return_sink {
            let sink = self.regs.return_sink().iter().map(|r| r.temp()).collect();
            instrs.push(Instr::oper("", Vec::new(), sink));
        }

        let virtual_temps: HashSet<Temp> = instrs
            .iter()
            .flat_map(|inst| inst.uses().iter().chain(inst.defs()))
            .copied()
            .filter(|&temp| !self.regs.is_precolored(temp))
            .collect();
        let max_rounds = self.config.max_rounds.unwrap_or(virtual_temps.len() + 1);

        let mut unspillable = HashSet::new();
        let mut stats = AllocationStats::default();

        let outcome = loop {
            stats.rounds += 1;

            let flow = FlowGraph::build(&instrs)?;
            let live = LiveSets::compute(&instrs, &flow);
            let graph = InterferenceGraph::build(&instrs, &flow, &live, &self.regs)?;
            let (nodes, moves) = (graph.len(), graph.moves().len());
            let costs = cost::spill_costs(
                &instrs,
                &flow,
                &graph,
                &unspillable,
                self.config.loop_weight,
            );
            let outcome = GraphColoring::new(graph, costs, &self.regs, &self.config).run()?;

            debug!(
                "round {}: {} instructions, {} nodes, {} moves, {} coalesced, {} spilled",
                stats.rounds,
                instrs.len(),
                nodes,
                moves,
                outcome.coalesced_moves,
                outcome.spilled.len()
            );

            if outcome.spilled.is_empty() {
                break outcome;
            }
            if stats.rounds >= max_rounds
                || outcome.spilled.iter().all(|t| unspillable.contains(t))
            {
                return Err(RegAllocError::SpillNotProgressing {
                    round: stats.rounds,
                    temps: outcome.spilled,
                });
            }

            let rewrite = spill::rewrite(instrs, &outcome.spilled, temps, frame);
            trace!(
                "spill rewrite added {} temps, {} instructions now",
                rewrite.new_temps.len(),
                rewrite.instrs.len()
            );
            stats.spill_slots += rewrite.slots.len();
            stats.spilled.extend(&outcome.spilled);
            unspillable.extend(rewrite.new_temps);
            instrs = rewrite.instrs;
        };

        if self.config.append_return_sink {
            instrs.pop();
        }

        for inst in &instrs {
            for &temp in inst.uses().iter().chain(inst.defs()) {
                if !outcome.colors.contains_key(&temp) {
                    return Err(RegAllocError::MissingTemp(temp));
                }
            }
        }

        if self.config.remove_coalesced_moves {
            let before = instrs.len();
            instrs.retain(|inst| match inst.move_pair() {
                Some((dst, src)) => outcome.colors.get(&dst) != outcome.colors.get(&src),
                None => true,
            });
            stats.removed_moves = before - instrs.len();
        }

        stats.coalesced_moves = outcome.coalesced_moves;
        stats.constrained_moves = outcome.constrained_moves;
        stats.frozen_moves = outcome.frozen_moves;

        if stats.rounds > 1 {
            warn!(
                "allocation needed {} rounds, {} temps spilled to {} slots",
                stats.rounds,
                stats.spilled.len(),
                stats.spill_slots
            );
        }

        Ok(Allocation {
            instrs,
            coloring: outcome.colors,
            coalesced: outcome.aliases,
            stats,
        })
    }
}
