//! Abstract machine instructions
//!
//! Instruction selection hands the allocator a flat list of these. Each one
//! exposes what it defines, what it uses and where it may jump; the allocator
//! never looks at the assembly text except to render it.
//!
//! Templates refer to operands positionally: `` `d0 `` is the first
//! destination, `` `s1 `` the second source, `` `j0 `` the first jump target.

use std::fmt;
use std::slice;

use super::temp::{Label, Temp};

/// Jump targets of an `Oper`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jumps {
    /// Control always leaves through one of the labels (no fall-through)
    Always(Vec<Label>),
    /// Falls through to the next instruction when the jump is not taken
    Conditional(Vec<Label>),
}

impl Jumps {
    pub fn labels(&self) -> &[Label] {
        match self {
            Jumps::Always(labels) | Jumps::Conditional(labels) => labels,
        }
    }

    pub fn falls_through(&self) -> bool {
        matches!(self, Jumps::Conditional(_))
    }
}

/// One abstract instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// Jump target marker
    Label { assem: String, label: Label },
    /// Register-to-register copy, a coalescing candidate
    Move { assem: String, dst: Temp, src: Temp },
    /// Any other operation
    Oper {
        assem: String,
        dst: Vec<Temp>,
        src: Vec<Temp>,
        jumps: Option<Jumps>,
    },
}

impl Instr {
    /// `name:` label marker
    pub fn label(label: Label) -> Self {
        Instr::Label {
            assem: format!("{label}:"),
            label,
        }
    }

    /// Copy `src` into `dst`
    pub fn mov(assem: impl Into<String>, dst: Temp, src: Temp) -> Self {
        Instr::Move {
            assem: assem.into(),
            dst,
            src,
        }
    }

    /// Straight-line operation
    pub fn oper(assem: impl Into<String>, dst: Vec<Temp>, src: Vec<Temp>) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst,
            src,
            jumps: None,
        }
    }

    /// Unconditional jump to `target`
    pub fn jump(assem: impl Into<String>, target: Label) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst: Vec::new(),
            src: Vec::new(),
            jumps: Some(Jumps::Always(vec![target])),
        }
    }

    /// Conditional jump reading `src`, falling through when not taken
    pub fn cjump(assem: impl Into<String>, src: Vec<Temp>, targets: Vec<Label>) -> Self {
        Instr::Oper {
            assem: assem.into(),
            dst: Vec::new(),
            src,
            jumps: Some(Jumps::Conditional(targets)),
        }
    }

    /// Temps written by this instruction
    pub fn defs(&self) -> &[Temp] {
        match self {
            Instr::Label { .. } => &[],
            Instr::Move { dst, .. } => slice::from_ref(dst),
            Instr::Oper { dst, .. } => dst,
        }
    }

    /// Temps read by this instruction
    pub fn uses(&self) -> &[Temp] {
        match self {
            Instr::Label { .. } => &[],
            Instr::Move { src, .. } => slice::from_ref(src),
            Instr::Oper { src, .. } => src,
        }
    }

    pub fn defs_mut(&mut self) -> &mut [Temp] {
        match self {
            Instr::Label { .. } => &mut [],
            Instr::Move { dst, .. } => slice::from_mut(dst),
            Instr::Oper { dst, .. } => dst,
        }
    }

    pub fn uses_mut(&mut self) -> &mut [Temp] {
        match self {
            Instr::Label { .. } => &mut [],
            Instr::Move { src, .. } => slice::from_mut(src),
            Instr::Oper { src, .. } => src,
        }
    }

    /// Non-sequential control transfer, if any
    pub fn jumps(&self) -> Option<&Jumps> {
        match self {
            Instr::Oper { jumps, .. } => jumps.as_ref(),
            _ => None,
        }
    }

    /// Whether control can continue to the next instruction in the list
    pub fn falls_through(&self) -> bool {
        self.jumps().is_none_or(Jumps::falls_through)
    }

    /// `(dst, src)` of a move
    pub fn move_pair(&self) -> Option<(Temp, Temp)> {
        match self {
            Instr::Move { dst, src, .. } => Some((*dst, *src)),
            _ => None,
        }
    }

    pub fn label_name(&self) -> Option<&Label> {
        match self {
            Instr::Label { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn assem(&self) -> &str {
        match self {
            Instr::Label { assem, .. } | Instr::Move { assem, .. } | Instr::Oper { assem, .. } => {
                assem
            }
        }
    }

    /// Substitute operand placeholders, naming each temp through `name`
    pub fn render<F>(&self, name: F) -> String
    where
        F: Fn(Temp) -> String,
    {
        let assem = self.assem();
        let labels = self.jumps().map(Jumps::labels).unwrap_or(&[]);
        let mut out = String::with_capacity(assem.len());
        let mut chars = assem.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if c != '`' {
                out.push(c);
                continue;
            }

            let Some(&(_, kind)) = chars.peek() else {
                out.push(c);
                break;
            };
            if !matches!(kind, 'd' | 's' | 'j') {
                out.push(c);
                continue;
            }
            chars.next();

            let mut index = String::new();
            while let Some(&(_, digit)) = chars.peek() {
                if !digit.is_ascii_digit() {
                    break;
                }
                index.push(digit);
                chars.next();
            }

            let operand = index.parse::<usize>().ok().and_then(|i| match kind {
                'd' => self.defs().get(i).map(|&t| name(t)),
                's' => self.uses().get(i).map(|&t| name(t)),
                _ => labels.get(i).map(Label::to_string),
            });

            match operand {
                Some(text) => out.push_str(&text),
                // Leave malformed placeholders visible
                None => {
                    out.push('`');
                    out.push(kind);
                    out.push_str(&index);
                }
            }
        }

        out
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|t| t.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_def_use_accessors() {
        let mv = Instr::mov("movq `s0,`d0", Temp(20), Temp(21));
        assert_eq!(mv.defs(), &[Temp(20)]);
        assert_eq!(mv.uses(), &[Temp(21)]);
        assert_eq!(mv.move_pair(), Some((Temp(20), Temp(21))));

        let add = Instr::oper("addq `s0,`d0", vec![Temp(22)], vec![Temp(23), Temp(22)]);
        assert_eq!(add.defs(), &[Temp(22)]);
        assert_eq!(add.uses(), &[Temp(23), Temp(22)]);
        assert!(add.move_pair().is_none());

        let label = Instr::label(Label::new("L1"));
        assert!(label.defs().is_empty());
        assert!(label.uses().is_empty());
        assert_eq!(label.label_name(), Some(&Label::new("L1")));
    }

    #[test]
    fn test_fall_through() {
        assert!(Instr::oper("nop", vec![], vec![]).falls_through());
        assert!(!Instr::jump("jmp `j0", Label::new("L1")).falls_through());
        assert!(Instr::cjump("je `j0", vec![], vec![Label::new("L1")]).falls_through());
    }

    #[test]
    fn test_render_placeholders() {
        let inst = Instr::oper("addq `s0,`d0", vec![Temp(20)], vec![Temp(21), Temp(20)]);
        let text = inst.render(|t| if t == Temp(20) { "%rax".into() } else { "%rbx".into() });
        assert_eq!(text, "addq %rbx,%rax");

        let jmp = Instr::jump("jmp `j0", Label::new("done"));
        assert_eq!(jmp.to_string(), "jmp done");
    }

    #[test]
    fn test_render_keeps_malformed_placeholder() {
        let inst = Instr::oper("movq `s3,`d0 `x", vec![Temp(1)], vec![]);
        assert_eq!(inst.to_string(), "movq `s3,t1 `x");
    }
}
