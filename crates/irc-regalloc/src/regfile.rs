//! Register file description
//!
//! Every machine register is represented by one precolored temp. The temp for
//! register `r` is `Temp(r.0)`, so the first `len()` temps of every function
//! are reserved and virtual temps start right after them.
//!
//! Only the *allocatable* subset takes part in coloring; its length is K and
//! its order is the first-fit order used when assigning colors, which keeps
//! generated code reproducible.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::RegAllocError;
use super::temp::{Temp, TempFactory};

/// Physical register index into a [`RegisterFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reg(pub u8);

impl Reg {
    /// The precolored temp standing for this register
    pub fn temp(self) -> Temp {
        Temp(u32::from(self.0))
    }
}

/// Register file by names, as read from a configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFileDesc {
    /// Every machine register, in canonical order
    pub registers: Vec<String>,
    /// Registers the allocator may hand out, in first-fit order
    pub allocatable: Vec<String>,
    /// Registers live at function exit
    #[serde(default)]
    pub return_sink: Vec<String>,
    #[serde(default)]
    pub caller_saves: Vec<String>,
    #[serde(default)]
    pub callee_saves: Vec<String>,
}

/// Read-only register file shared by every allocation
#[derive(Debug, Clone)]
pub struct RegisterFile {
    names: Vec<String>,
    allocatable: Vec<Reg>,
    return_sink: Vec<Reg>,
    caller_saves: Vec<Reg>,
    callee_saves: Vec<Reg>,
}

impl RegisterFile {
    /// Build from a name-based description, validating every reference
    pub fn from_desc(desc: &RegisterFileDesc) -> Result<Self, RegAllocError> {
        if desc.registers.len() > usize::from(u8::MAX) + 1 {
            return Err(RegAllocError::InvalidRegisterFile(format!(
                "{} registers exceed the supported maximum of 256",
                desc.registers.len()
            )));
        }

        let mut by_name: HashMap<&str, Reg> = HashMap::new();
        for (idx, name) in desc.registers.iter().enumerate() {
            // idx < 256 checked above
            let reg = Reg(idx as u8);
            if by_name.insert(name.as_str(), reg).is_some() {
                return Err(RegAllocError::InvalidRegisterFile(format!(
                    "register `{name}` listed twice"
                )));
            }
        }

        let resolve = |names: &[String]| -> Result<Vec<Reg>, RegAllocError> {
            let mut regs = Vec::with_capacity(names.len());
            for name in names {
                let reg = by_name.get(name.as_str()).copied().ok_or_else(|| {
                    RegAllocError::InvalidRegisterFile(format!("unknown register `{name}`"))
                })?;
                if regs.contains(&reg) {
                    return Err(RegAllocError::InvalidRegisterFile(format!(
                        "register `{name}` listed twice"
                    )));
                }
                regs.push(reg);
            }
            Ok(regs)
        };

        let allocatable = resolve(&desc.allocatable)?;
        if allocatable.is_empty() {
            return Err(RegAllocError::NoAllocatableRegisters);
        }

        Ok(Self {
            names: desc.registers.clone(),
            allocatable,
            return_sink: resolve(&desc.return_sink)?,
            caller_saves: resolve(&desc.caller_saves)?,
            callee_saves: resolve(&desc.callee_saves)?,
        })
    }

    /// Parse a JSON [`RegisterFileDesc`]
    pub fn from_json(json: &str) -> Result<Self, RegAllocError> {
        let desc: RegisterFileDesc = serde_json::from_str(json)?;
        Self::from_desc(&desc)
    }

    /// x86-64 System V: 16 registers, everything but `%rsp` allocatable
    pub fn x86_64() -> Self {
        const REGISTERS: [&str; 16] = [
            "%rax", "%rbx", "%rcx", "%rdx", "%rsi", "%rdi", "%rbp", "%rsp", "%r8", "%r9", "%r10",
            "%r11", "%r12", "%r13", "%r14", "%r15",
        ];
        let regs = |list: &[&str]| -> Vec<Reg> {
            list.iter()
                .filter_map(|name| REGISTERS.iter().position(|r| r == name))
                .map(|idx| Reg(idx as u8))
                .collect()
        };

        Self {
            names: REGISTERS.iter().map(|s| s.to_string()).collect(),
            allocatable: regs(&[
                "%rax", "%rbx", "%rcx", "%rdx", "%rsi", "%rdi", "%rbp", "%r8", "%r9", "%r10",
                "%r11", "%r12", "%r13", "%r14", "%r15",
            ]),
            return_sink: regs(&["%rbp", "%rbx", "%r12", "%r13", "%r14", "%r15", "%rsp", "%rax"]),
            caller_saves: regs(&[
                "%rax", "%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9", "%r10", "%r11",
            ]),
            callee_saves: regs(&["%rbp", "%rbx", "%r12", "%r13", "%r14", "%r15"]),
        }
    }

    /// Number of machine registers (allocatable or not)
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// K: number of registers available to the allocator
    pub fn k(&self) -> usize {
        self.allocatable.len()
    }

    pub fn allocatable(&self) -> &[Reg] {
        &self.allocatable
    }

    pub fn return_sink(&self) -> &[Reg] {
        &self.return_sink
    }

    pub fn caller_saves(&self) -> &[Reg] {
        &self.caller_saves
    }

    pub fn callee_saves(&self) -> &[Reg] {
        &self.callee_saves
    }

    pub fn name(&self, reg: Reg) -> &str {
        self.names
            .get(usize::from(reg.0))
            .map(String::as_str)
            .unwrap_or("%?")
    }

    pub fn by_name(&self, name: &str) -> Option<Reg> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| Reg(idx as u8))
    }

    /// Register a precolored temp stands for, `None` for virtual temps
    pub fn reg_of(&self, temp: Temp) -> Option<Reg> {
        usize::try_from(temp.0)
            .ok()
            .filter(|&idx| idx < self.names.len())
            .map(|idx| Reg(idx as u8))
    }

    pub fn is_precolored(&self, temp: Temp) -> bool {
        self.reg_of(temp).is_some()
    }

    /// Temp factory for a new function body
    pub fn temp_factory(&self) -> TempFactory {
        TempFactory::starting_at(self.names.len() as u32)
    }
}
