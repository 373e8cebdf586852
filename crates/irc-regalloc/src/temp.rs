//! Temporaries and labels
//!
//! A `Temp` is an abstract storage location for one value. Machine registers
//! are themselves temps (the precolored ones), created once by the
//! [`RegisterFile`](crate::regfile::RegisterFile); every other temp is virtual
//! and handed out by a per-function [`TempFactory`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Temporary ID - unlimited, will be mapped to a register or a spill slot later
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Temp(pub u32);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Jump target name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label(pub String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out fresh temps for one function.
///
/// Starts counting after the temps reserved by the register file, so virtual
/// temps never collide with precolored ones.
#[derive(Debug, Clone)]
pub struct TempFactory {
    next: u32,
}

impl TempFactory {
    /// Create a factory whose first temp is `first`
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Allocate a fresh temp
    pub fn alloc(&mut self) -> Temp {
        let temp = Temp(self.next);
        self.next += 1;
        temp
    }

    /// One past the highest temp handed out so far
    pub fn limit(&self) -> u32 {
        self.next
    }
}
