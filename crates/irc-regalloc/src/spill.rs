//! Spill code insertion
//!
//! Every spilled temp gets one frame slot. Each instruction referencing it is
//! rewritten to use a fresh temp instead: loaded from the slot right before
//! the instruction when it is read, stored right after when it is written.
//! An instruction that both reads and writes the temp shares one fresh temp
//! between the load and the store, so the new temps live across at most one
//! instruction.

use std::collections::HashMap;

use log::trace;

use super::frame::{Frame, SpillSlot};
use super::instr::Instr;
use super::temp::{Temp, TempFactory};

/// Result of rewriting an instruction list for a set of spilled temps
#[derive(Debug)]
pub struct SpillRewrite {
    pub instrs: Vec<Instr>,
    /// Temps introduced by the rewrite, in creation order
    pub new_temps: Vec<Temp>,
    /// Slot of each spilled temp
    pub slots: HashMap<Temp, SpillSlot>,
}

/// Insert loads and stores around every reference to `spilled`
pub fn rewrite<F: Frame + ?Sized>(
    instrs: Vec<Instr>,
    spilled: &[Temp],
    temps: &mut TempFactory,
    frame: &mut F,
) -> SpillRewrite {
    let slots: HashMap<Temp, SpillSlot> = spilled
        .iter()
        .map(|&temp| {
            let slot = frame.alloc_spill_slot();
            trace!("spill {temp} to slot {} (offset {})", slot.index, slot.offset);
            (temp, slot)
        })
        .collect();

    let mut out = Vec::with_capacity(instrs.len());
    let mut new_temps = Vec::new();

    for mut inst in instrs {
        // Spilled temps referenced here, in first-reference order
        let mut fresh: Vec<(Temp, Temp)> = Vec::new();
        for &temp in inst.uses().iter().chain(inst.defs()) {
            if slots.contains_key(&temp) && !fresh.iter().any(|&(old, _)| old == temp) {
                let new = temps.alloc();
                new_temps.push(new);
                fresh.push((temp, new));
            }
        }
        if fresh.is_empty() {
            out.push(inst);
            continue;
        }

        let replacement = |temp: Temp| {
            fresh
                .iter()
                .find(|&&(old, _)| old == temp)
                .map_or(temp, |&(_, new)| new)
        };

        let mut loads = Vec::new();
        for &(old, new) in &fresh {
            if inst.uses().contains(&old) {
                loads.push(frame.load(slots[&old], new));
            }
        }
        let mut stores = Vec::new();
        for &(old, new) in &fresh {
            if inst.defs().contains(&old) {
                stores.push(frame.store(slots[&old], new));
            }
        }

        for temp in inst.uses_mut() {
            *temp = replacement(*temp);
        }
        for temp in inst.defs_mut() {
            *temp = replacement(*temp);
        }

        out.extend(loads);
        out.push(inst);
        out.extend(stores);
    }

    SpillRewrite {
        instrs: out,
        new_temps,
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StackFrame;

    #[test]
    fn test_use_gets_load_and_def_gets_store() {
        let body = vec![
            Instr::oper("movq $1,`d0", vec![Temp(20)], vec![]),
            Instr::oper("movq $2,`d0", vec![Temp(21)], vec![]),
            Instr::oper("addq `s0,`d0", vec![Temp(21)], vec![Temp(20), Temp(21)]),
        ];
        let mut temps = TempFactory::starting_at(30);
        let mut frame = StackFrame::default();
        let result = rewrite(body, &[Temp(20)], &mut temps, &mut frame);

        let text: Vec<String> = result.instrs.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            text,
            vec![
                "movq $1,t30",
                "movq t30,0(%rsp)",
                "movq $2,t21",
                "movq 0(%rsp),t31",
                "addq t31,t21",
            ]
        );
        assert_eq!(result.new_temps, vec![Temp(30), Temp(31)]);
        assert_eq!(frame.spill_slots(), 1);
    }

    #[test]
    fn test_read_modify_write_shares_one_temp() {
        let body = vec![Instr::oper(
            "addq $1,`d0",
            vec![Temp(20)],
            vec![Temp(20)],
        )];
        let mut temps = TempFactory::starting_at(30);
        let mut frame = StackFrame::new(8, 16);
        let result = rewrite(body, &[Temp(20)], &mut temps, &mut frame);

        let text: Vec<String> = result.instrs.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            text,
            vec!["movq 16(%rsp),t30", "addq $1,t30", "movq t30,16(%rsp)"]
        );
        assert_eq!(result.new_temps, vec![Temp(30)]);
        assert_eq!(result.slots[&Temp(20)].offset, 16);
    }

    #[test]
    fn test_spilled_move_source() {
        let body = vec![Instr::mov("movq `s0,`d0", Temp(21), Temp(20))];
        let mut temps = TempFactory::starting_at(30);
        let mut frame = StackFrame::default();
        let result = rewrite(body, &[Temp(20)], &mut temps, &mut frame);

        assert_eq!(result.instrs.len(), 2);
        assert_eq!(result.instrs[1].move_pair(), Some((Temp(21), Temp(30))));
    }

    #[test]
    fn test_untouched_instructions_pass_through() {
        let body = vec![
            Instr::oper("movq $1,`d0", vec![Temp(21)], vec![]),
            Instr::oper("ret", vec![], vec![Temp(21)]),
        ];
        let mut temps = TempFactory::starting_at(30);
        let mut frame = StackFrame::default();
        let result = rewrite(body.clone(), &[Temp(20)], &mut temps, &mut frame);
        assert_eq!(result.instrs, body);
        assert!(result.new_temps.is_empty());
    }
}
