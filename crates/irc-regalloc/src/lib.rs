#![doc = include_str!("../README.md")]

mod color;
pub mod config;
pub mod flowgraph;
pub mod frame;
pub mod instr;
pub mod interference;
pub mod liveness;
mod regalloc;
pub mod regfile;
pub mod spill;
pub mod temp;

pub use config::{AllocatorConfig, SpillHeuristic};
pub use frame::{Frame, SpillSlot, StackFrame};
pub use instr::{Instr, Jumps};
pub use regalloc::{Allocation, AllocationStats, RegAllocator};
pub use regfile::{Reg, RegisterFile, RegisterFileDesc};
pub use temp::{Label, Temp, TempFactory};

use thiserror::Error;

/// Errors raised while allocating registers
///
/// Apart from `Config` and `InvalidRegisterFile`, every variant reports a
/// broken internal invariant or malformed input from instruction selection.
#[derive(Debug, Error)]
pub enum RegAllocError {
    #[error("Jump to undefined label `{0}`")]
    UnknownLabel(Label),

    #[error("Label `{0}` is defined more than once")]
    DuplicateLabel(Label),

    #[error("Temporary {0} has no interference graph node or register")]
    MissingTemp(Temp),

    #[error("Worklist inconsistency at {temp}: {detail}")]
    WorklistInconsistency { temp: Temp, detail: String },

    #[error("Degree of {temp} is {cached} but it has {actual} neighbors")]
    DegreeMismatch {
        temp: Temp,
        cached: usize,
        actual: usize,
    },

    #[error("Interference edge {a}-{b} is not symmetric")]
    AsymmetricEdge { a: Temp, b: Temp },

    #[error("Spilling made no progress in round {round}: {temps:?}")]
    SpillNotProgressing { round: usize, temps: Vec<Temp> },

    #[error("Register file has no allocatable registers")]
    NoAllocatableRegisters,

    #[error("Invalid register file: {0}")]
    InvalidRegisterFile(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
