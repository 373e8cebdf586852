//! Spill slots and the instructions that reach them
//!
//! Frame layout belongs to the calling convention, not to the allocator, so
//! spill code is produced through the [`Frame`] trait. [`StackFrame`] is the
//! stack-pointer-relative layout used when the caller has nothing better.

use super::instr::Instr;
use super::temp::Temp;

/// One word-sized memory cell holding a spilled temp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpillSlot {
    /// Slot number within the function
    pub index: u32,
    /// Byte offset from the frame base
    pub offset: i32,
}

/// Collaborator owning the function's frame layout
pub trait Frame {
    /// Reserve a fresh slot for one spilled temp
    fn alloc_spill_slot(&mut self) -> SpillSlot;

    /// `dst <- [slot]`, inserted before a use
    fn load(&self, slot: SpillSlot, dst: Temp) -> Instr;

    /// `[slot] <- src`, inserted after a def
    fn store(&self, slot: SpillSlot, src: Temp) -> Instr;
}

/// Spill slots stacked above the locals, addressed from `%rsp`
#[derive(Debug, Clone)]
pub struct StackFrame {
    word_size: i32,
    locals_size: i32,
    slots: u32,
}

impl StackFrame {
    /// `locals_size` bytes are already taken by the function's own locals
    pub fn new(word_size: i32, locals_size: i32) -> Self {
        Self {
            word_size,
            locals_size,
            slots: 0,
        }
    }

    pub fn spill_slots(&self) -> u32 {
        self.slots
    }

    /// Bytes needed for locals plus every spill slot handed out so far
    pub fn frame_size(&self) -> i32 {
        self.locals_size + self.word_size * self.slots as i32
    }
}

impl Default for StackFrame {
    fn default() -> Self {
        Self::new(8, 0)
    }
}

impl Frame for StackFrame {
    fn alloc_spill_slot(&mut self) -> SpillSlot {
        let slot = SpillSlot {
            index: self.slots,
            offset: self.locals_size + self.word_size * self.slots as i32,
        };
        self.slots += 1;
        slot
    }

    fn load(&self, slot: SpillSlot, dst: Temp) -> Instr {
        Instr::oper(format!("movq {}(%rsp),`d0", slot.offset), vec![dst], Vec::new())
    }

    fn store(&self, slot: SpillSlot, src: Temp) -> Instr {
        Instr::oper(format!("movq `s0,{}(%rsp)", slot.offset), Vec::new(), vec![src])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_stack_above_locals() {
        let mut frame = StackFrame::new(8, 16);
        let a = frame.alloc_spill_slot();
        let b = frame.alloc_spill_slot();
        assert_eq!((a.index, a.offset), (0, 16));
        assert_eq!((b.index, b.offset), (1, 24));
        assert_eq!(frame.frame_size(), 32);
        assert_eq!(frame.spill_slots(), 2);
    }

    #[test]
    fn test_spill_code_shape() {
        let mut frame = StackFrame::default();
        let slot = frame.alloc_spill_slot();

        let load = frame.load(slot, Temp(30));
        assert_eq!(load.defs(), &[Temp(30)]);
        assert!(load.uses().is_empty());
        assert_eq!(load.to_string(), "movq 0(%rsp),t30");

        let store = frame.store(slot, Temp(31));
        assert!(store.defs().is_empty());
        assert_eq!(store.uses(), &[Temp(31)]);
        assert_eq!(store.to_string(), "movq t31,0(%rsp)");
    }
}
