//! Arena-based data-flow graph over instruction streams.
//!
//! Nodes are operations, variables and immediates held in one vector;
//! edges are index lists. Each *write* of a variable creates a fresh node
//! and consumers attach to the most recent write, so the graph encodes
//! def-use chains even before the single-assignment rewrite runs.

use std::collections::HashMap;

use crate::error::MapperError;
use crate::isa::PisaInstruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Operation,
    Variable,
    Immediate,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub label: String,
    /// Index into the source instruction list, for operation nodes.
    pub instr: Option<usize>,
    /// `(order, num_rns)` when the source carries operand shapes.
    pub shape: Option<(u32, u32)>,
}

/// A reference an instruction makes to a named value.
#[derive(Debug, Clone)]
pub struct GraphOperand {
    pub name: String,
    pub immediate: bool,
    pub shape: Option<(u32, u32)>,
}

/// Anything a graph can be built over.
pub trait GraphInstruction {
    fn op_label(&self) -> &str;
    fn graph_inputs(&self) -> Vec<GraphOperand>;
    fn graph_outputs(&self) -> Vec<GraphOperand>;
}

impl GraphInstruction for PisaInstruction {
    fn op_label(&self) -> &str {
        self.opcode.base_name()
    }

    fn graph_inputs(&self) -> Vec<GraphOperand> {
        self.inputs
            .iter()
            .map(|operand| GraphOperand {
                name: operand.name(),
                immediate: operand.immediate,
                shape: None,
            })
            .collect()
    }

    fn graph_outputs(&self) -> Vec<GraphOperand> {
        self.outputs
            .iter()
            .map(|operand| GraphOperand {
                name: operand.name(),
                immediate: false,
                shape: None,
            })
            .collect()
    }
}

impl GraphInstruction for pisa_trace::PolyOperation {
    fn op_label(&self) -> &str {
        &self.name
    }

    fn graph_inputs(&self) -> Vec<GraphOperand> {
        self.inputs
            .iter()
            .map(|operand| GraphOperand {
                name: operand.name.clone(),
                immediate: false,
                shape: Some((operand.order, operand.num_rns)),
            })
            .collect()
    }

    fn graph_outputs(&self) -> Vec<GraphOperand> {
        self.outputs
            .iter()
            .map(|operand| GraphOperand {
                name: operand.name.clone(),
                immediate: false,
                shape: Some((operand.order, operand.num_rns)),
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InstructionGraph {
    pub(crate) nodes: Vec<Node>,
    ins: Vec<Vec<usize>>,
    outs: Vec<Vec<usize>>,
}

impl InstructionGraph {
    /// Builds the graph, checking producer/consumer shape coherence where
    /// the instruction source carries shapes.
    pub fn build<T: GraphInstruction>(instructions: &[T]) -> Result<Self, MapperError> {
        let mut graph = InstructionGraph::default();
        // Latest node per label: consumers read the most recent write.
        let mut latest: HashMap<String, usize> = HashMap::new();

        for (index, instruction) in instructions.iter().enumerate() {
            let op_node = graph.push_node(Node {
                kind: NodeKind::Operation,
                label: instruction.op_label().to_owned(),
                instr: Some(index),
                shape: None,
            });

            for operand in instruction.graph_inputs() {
                let value_node = match latest.get(&operand.name) {
                    Some(&node) => {
                        if let (Some(produced), Some(consumed)) =
                            (graph.nodes[node].shape, operand.shape)
                        {
                            if produced != consumed {
                                return Err(MapperError::ShapeMismatch {
                                    symbol: operand.name.clone(),
                                    produced_order: produced.0,
                                    produced_rns: produced.1,
                                    consumed_order: consumed.0,
                                    consumed_rns: consumed.1,
                                });
                            }
                        }
                        node
                    }
                    None => {
                        let node = graph.push_node(Node {
                            kind: if operand.immediate {
                                NodeKind::Immediate
                            } else {
                                NodeKind::Variable
                            },
                            label: operand.name.clone(),
                            instr: None,
                            shape: operand.shape,
                        });
                        latest.insert(operand.name.clone(), node);
                        node
                    }
                };
                graph.push_edge(value_node, op_node);
            }

            for operand in instruction.graph_outputs() {
                let node = graph.push_node(Node {
                    kind: NodeKind::Variable,
                    label: operand.name.clone(),
                    instr: None,
                    shape: operand.shape,
                });
                latest.insert(operand.name.clone(), node);
                graph.push_edge(op_node, node);
            }
        }

        Ok(graph)
    }

    fn push_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.ins.push(Vec::new());
        self.outs.push(Vec::new());
        self.nodes.len() - 1
    }

    fn push_edge(&mut self, from: usize, to: usize) {
        self.outs[from].push(to);
        self.ins[to].push(from);
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn set_label(&mut self, index: usize, label: String) {
        self.nodes[index].label = label;
    }

    pub fn in_nodes(&self, index: usize) -> &[usize] {
        &self.ins[index]
    }

    pub fn out_nodes(&self, index: usize) -> &[usize] {
        &self.outs[index]
    }

    /// Nodes with no incoming edges, filtered by kind.
    pub fn input_nodes(
        &self,
        include_variables: bool,
        include_immediates: bool,
        include_operations: bool,
    ) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, node)| {
                self.ins[*i].is_empty()
                    && match node.kind {
                        NodeKind::Variable => include_variables,
                        NodeKind::Immediate => include_immediates,
                        NodeKind::Operation => include_operations,
                    }
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Nodes with no outgoing edges.
    pub fn output_nodes(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.outs[i].is_empty())
            .collect()
    }

    /// Peels the operation-projected graph into dependency layers.
    ///
    /// Returns operation node indices, layer by layer; within a layer the
    /// creation order is preserved. Fails if the projection has a cycle.
    pub fn operation_layers(&self) -> Result<Vec<Vec<usize>>, MapperError> {
        let op_nodes: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].kind == NodeKind::Operation)
            .collect();

        // In-degree of each operation counted through its value nodes.
        let mut indegree: HashMap<usize, usize> = HashMap::new();
        for &op in &op_nodes {
            let mut count = 0;
            for &value in &self.ins[op] {
                count += self.ins[value].len();
            }
            indegree.insert(op, count);
        }

        const PLACED: usize = usize::MAX;
        let mut layers = Vec::new();
        let mut remaining = op_nodes.len();
        let mut active: Vec<usize> = op_nodes;
        while remaining > 0 {
            let layer: Vec<usize> = active
                .iter()
                .copied()
                .filter(|op| indegree[op] == 0)
                .collect();
            if layer.is_empty() {
                return Err(MapperError::CyclicIr);
            }
            for &op in &layer {
                for &value in &self.outs[op] {
                    for &consumer in &self.outs[value] {
                        let count = indegree.get_mut(&consumer).expect("operation node");
                        if *count != PLACED {
                            *count -= 1;
                        }
                    }
                }
                indegree.insert(op, PLACED);
            }
            active.retain(|op| indegree[op] != PLACED);
            remaining -= layer.len();
            layers.push(layer);
        }
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::parse_instruction;

    fn add(line: &str) -> PisaInstruction {
        parse_instruction(line).unwrap()
    }

    #[test]
    fn inputs_and_outputs_by_degree() {
        let instructions = vec![
            add("13, add, t_0_0, a_0_0, b_0_0, 0"),
            add("13, add, out_0_0, t_0_0, c_0_0, 0"),
        ];
        let graph = InstructionGraph::build(&instructions).unwrap();

        let inputs: Vec<&str> = graph
            .input_nodes(true, false, false)
            .into_iter()
            .map(|i| graph.node(i).label.as_str())
            .collect();
        assert_eq!(inputs, vec!["a_0_0", "b_0_0", "c_0_0"]);

        let outputs: Vec<&str> = graph
            .output_nodes()
            .into_iter()
            .map(|i| graph.node(i).label.as_str())
            .collect();
        assert_eq!(outputs, vec!["out_0_0"]);
    }

    #[test]
    fn rewrites_create_one_node_per_write() {
        let instructions = vec![
            add("13, add, t_0_0, a_0_0, b_0_0, 0"),
            add("13, add, t_0_0, t_0_0, c_0_0, 0"),
            add("13, add, out_0_0, t_0_0, d_0_0, 0"),
        ];
        let graph = InstructionGraph::build(&instructions).unwrap();
        let t_nodes = graph
            .nodes
            .iter()
            .filter(|n| n.label == "t_0_0" && n.kind == NodeKind::Variable)
            .count();
        assert_eq!(t_nodes, 2);

        let layers = graph.operation_layers().unwrap();
        assert_eq!(layers.len(), 3);
    }

    #[test]
    fn layers_group_independent_operations() {
        let instructions = vec![
            add("13, add, t0_0_0, a_0_0, b_0_0, 0"),
            add("13, add, t1_0_0, c_0_0, d_0_0, 0"),
            add("13, add, out_0_0, t0_0_0, t1_0_0, 0"),
        ];
        let graph = InstructionGraph::build(&instructions).unwrap();
        let layers = graph.operation_layers().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].len(), 2);
        assert_eq!(layers[1].len(), 1);
    }

    #[test]
    fn immediates_are_tracked_separately() {
        let instructions = vec![add("13, muli, out_0_0, a_0_0, R2_0, 0")];
        let graph = InstructionGraph::build(&instructions).unwrap();
        let immediates = graph.input_nodes(false, true, false);
        assert_eq!(immediates.len(), 1);
        assert_eq!(graph.node(immediates[0]).label, "R2_0");
    }
}
