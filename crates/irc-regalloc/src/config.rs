//! Allocator configuration

use serde::{Deserialize, Serialize};

use super::RegAllocError;

/// How a spill candidate is picked once no node can be simplified,
/// coalesced or frozen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpillHeuristic {
    /// Lowest loop-weighted use/def count divided by degree
    #[default]
    CostPerDegree,
    /// Highest current degree
    HighestDegree,
    /// Lowest node index in the spill worklist
    First,
}

/// Knobs for [`RegAllocator`](crate::RegAllocator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    pub spill_heuristic: SpillHeuristic,
    /// Base of the per-loop-depth weight applied to uses and defs
    pub loop_weight: f64,
    /// Hard cap on spill rounds; `None` bounds rounds by the number of
    /// virtual temps in the input
    pub max_rounds: Option<usize>,
    /// Verify graph and worklist invariants after every step
    pub check_invariants: bool,
    /// Drop moves whose ends received the same register
    pub remove_coalesced_moves: bool,
    /// Append an instruction keeping the return-sink registers live at exit
    pub append_return_sink: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            spill_heuristic: SpillHeuristic::default(),
            loop_weight: 10.0,
            max_rounds: None,
            check_invariants: cfg!(debug_assertions),
            remove_coalesced_moves: true,
            append_return_sink: true,
        }
    }
}

impl AllocatorConfig {
    /// Parse a JSON object; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, RegAllocError> {
        Ok(serde_json::from_str(json)?)
    }
}
