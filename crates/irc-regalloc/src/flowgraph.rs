//! Control flow graph over individual instructions
//!
//! Each node wraps exactly one instruction of the list it was built from, and
//! node `n` is the instruction at index `n`. Edges come from:
//! - fall-through to the next instruction, unless the instruction always jumps
//! - every jump target, resolved to the node holding its `Label`
//!
//! Labels are resolved in a first pass so backward and forward jumps are
//! handled the same way.

use std::collections::HashMap;
use std::fmt;

use super::RegAllocError;
use super::instr::Instr;
use super::temp::Label;

/// Flow graph node: index of an instruction in the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FNode(pub usize);

impl fmt::Display for FNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Instruction-level control flow graph
#[derive(Debug)]
pub struct FlowGraph {
    /// Successors of each node, fall-through edge first
    successors: Vec<Vec<FNode>>,
    /// Predecessors of each node
    predecessors: Vec<Vec<FNode>>,
    /// Label -> node holding it
    labels: HashMap<Label, FNode>,
}

impl FlowGraph {
    /// Build the graph for an instruction list
    pub fn build(instrs: &[Instr]) -> Result<Self, RegAllocError> {
        let mut labels = HashMap::new();
        for (idx, inst) in instrs.iter().enumerate() {
            if let Some(label) = inst.label_name() {
                if labels.insert(label.clone(), FNode(idx)).is_some() {
                    return Err(RegAllocError::DuplicateLabel(label.clone()));
                }
            }
        }

        let mut graph = FlowGraph {
            successors: vec![Vec::new(); instrs.len()],
            predecessors: vec![Vec::new(); instrs.len()],
            labels,
        };

        for (idx, inst) in instrs.iter().enumerate() {
            let node = FNode(idx);

            if inst.falls_through() && idx + 1 < instrs.len() {
                graph.add_edge(node, FNode(idx + 1));
            }

            if let Some(jumps) = inst.jumps() {
                for label in jumps.labels() {
                    let target = graph
                        .labels
                        .get(label)
                        .copied()
                        .ok_or_else(|| RegAllocError::UnknownLabel(label.clone()))?;
                    graph.add_edge(node, target);
                }
            }
        }

        Ok(graph)
    }

    fn add_edge(&mut self, from: FNode, to: FNode) {
        // A conditional jump to the next instruction must not count twice
        if self.successors[from.0].contains(&to) {
            return;
        }
        self.successors[from.0].push(to);
        self.predecessors[to.0].push(from);
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// All nodes in program order
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = FNode> + use<> {
        (0..self.successors.len()).map(FNode)
    }

    pub fn successors(&self, node: FNode) -> &[FNode] {
        &self.successors[node.0]
    }

    pub fn predecessors(&self, node: FNode) -> &[FNode] {
        &self.predecessors[node.0]
    }

    /// Node holding `label`
    pub fn label_node(&self, label: &Label) -> Option<FNode> {
        self.labels.get(label).copied()
    }

    /// Loop nesting depth of each node
    ///
    /// A jump to a label at or before the jump closes a loop spanning every
    /// node from the label to the jump; nested and overlapping back edges
    /// stack their depths.
    pub fn loop_depths(&self) -> Vec<u32> {
        let mut depth = vec![0u32; self.len()];
        for node in self.nodes() {
            for &succ in self.successors(node) {
                if succ.0 <= node.0 {
                    for d in &mut depth[succ.0..=node.0] {
                        *d += 1;
                    }
                }
            }
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::Temp;

    fn make_loop_body() -> Vec<Instr> {
        // 0: movq $0,t20
        // 1: L1:
        // 2: addq $1,t20
        // 3: cmpq $10,t20
        // 4: jl L1
        // 5: movq t20,%rax
        vec![
            Instr::oper("movq $0,`d0", vec![Temp(20)], vec![]),
            Instr::label(Label::new("L1")),
            Instr::oper("addq $1,`d0", vec![Temp(20)], vec![Temp(20)]),
            Instr::oper("cmpq $10,`s0", vec![], vec![Temp(20)]),
            Instr::cjump("jl `j0", vec![], vec![Label::new("L1")]),
            Instr::mov("movq `s0,`d0", Temp(0), Temp(20)),
        ]
    }

    #[test]
    fn test_fall_through_and_jump_edges() {
        let body = make_loop_body();
        let graph = FlowGraph::build(&body).unwrap();

        assert_eq!(graph.len(), 6);
        assert_eq!(graph.successors(FNode(0)), &[FNode(1)]);
        assert_eq!(graph.successors(FNode(4)), &[FNode(5), FNode(1)]);
        assert!(graph.successors(FNode(5)).is_empty());
        assert_eq!(graph.predecessors(FNode(1)), &[FNode(0), FNode(4)]);
        assert_eq!(graph.label_node(&Label::new("L1")), Some(FNode(1)));
    }

    #[test]
    fn test_unconditional_jump_does_not_fall_through() {
        let body = vec![
            Instr::jump("jmp `j0", Label::new("done")),
            Instr::oper("movq $1,`d0", vec![Temp(20)], vec![]),
            Instr::label(Label::new("done")),
        ];
        let graph = FlowGraph::build(&body).unwrap();

        assert_eq!(graph.successors(FNode(0)), &[FNode(2)]);
        assert!(graph.predecessors(FNode(1)).is_empty());
    }

    #[test]
    fn test_jump_to_next_instruction_is_one_edge() {
        let body = vec![
            Instr::cjump("je `j0", vec![], vec![Label::new("next")]),
            Instr::label(Label::new("next")),
        ];
        let graph = FlowGraph::build(&body).unwrap();
        assert_eq!(graph.successors(FNode(0)), &[FNode(1)]);
        assert_eq!(graph.predecessors(FNode(1)), &[FNode(0)]);
    }

    #[test]
    fn test_unknown_label() {
        let body = vec![Instr::jump("jmp `j0", Label::new("nowhere"))];
        let err = FlowGraph::build(&body).unwrap_err();
        assert!(matches!(err, RegAllocError::UnknownLabel(label) if label.name() == "nowhere"));
    }

    #[test]
    fn test_duplicate_label() {
        let body = vec![Instr::label(Label::new("L1")), Instr::label(Label::new("L1"))];
        assert!(matches!(
            FlowGraph::build(&body),
            Err(RegAllocError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn test_loop_depths() {
        let body = make_loop_body();
        let graph = FlowGraph::build(&body).unwrap();
        assert_eq!(graph.loop_depths(), vec![0, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_empty_list() {
        let graph = FlowGraph::build(&[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.loop_depths().is_empty());
    }
}
