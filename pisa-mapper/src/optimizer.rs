//! Instruction-graph rewriting: single-assignment renaming, opcode-specific
//! operand ordering, duplicate-input separation and linearization.

use std::collections::HashSet;

use tracing::debug;

use crate::error::MapperError;
use crate::graph::{InstructionGraph, NodeKind};
use crate::isa::{Opcode, PisaInstruction};

/// Rewrites a spliced instruction stream into a legal schedule.
///
/// The `uid` counter lives here so that two runs over the same input
/// produce identical streams; a fresh optimizer is created per pipeline
/// run.
#[derive(Debug)]
pub struct GraphOptimizer {
    unique_counter: u64,
    pub perform_variable_isolation: bool,
}

impl Default for GraphOptimizer {
    fn default() -> Self {
        Self {
            unique_counter: 0,
            perform_variable_isolation: true,
        }
    }
}

impl GraphOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits duplicated input registers: any instruction referencing one
    /// register in two input slots gets a preceding `copy` into a fresh
    /// `copyA`-prefixed register, and the later slot is rewritten. Repeats
    /// until no instruction has a duplicated input.
    pub fn apply_duplicate_input_separation(
        &self,
        instructions: Vec<PisaInstruction>,
    ) -> Vec<PisaInstruction> {
        let mut result = Vec::with_capacity(instructions.len());
        for mut instruction in instructions {
            loop {
                let duplicate = find_duplicate_inputs(&instruction);
                let Some(slot) = duplicate else { break };

                let source = instruction.inputs[slot].clone();
                let mut destination = source.clone();
                destination.set_name(&format!("copyA{}", source.name()));
                debug!(register = %source.name(), "separating duplicate input");

                result.push(PisaInstruction::copy_of(
                    instruction.pmd,
                    instruction.residual,
                    destination.clone(),
                    source,
                ));
                let fresh = destination.name();
                instruction.inputs[slot].set_name(&fresh);
            }
            result.push(instruction);
        }
        result
    }

    /// Applies the single-assignment rewrite and operand adjustments, then
    /// returns the stream in dependency-layer order. With `fixed_order` the
    /// rewrites still run but the incoming order is kept.
    pub fn generate_instruction_stream(
        &mut self,
        mut instructions: Vec<PisaInstruction>,
        fixed_order: bool,
    ) -> Result<Vec<PisaInstruction>, MapperError> {
        let mut graph = InstructionGraph::build(&instructions)?;
        let layers = graph.operation_layers()?;

        if self.perform_variable_isolation {
            self.isolate_variables(&mut graph, &layers, &mut instructions)?;
        }

        if fixed_order {
            return Ok(instructions);
        }

        let mut slots: Vec<Option<PisaInstruction>> =
            instructions.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());
        for layer in &layers {
            for &op_node in layer {
                let index = graph.node(op_node).instr.expect("operation node");
                ordered.push(slots[index].take().expect("instruction emitted once"));
            }
        }
        Ok(ordered)
    }

    fn isolate_variables(
        &mut self,
        graph: &mut InstructionGraph,
        layers: &[Vec<usize>],
        instructions: &mut [PisaInstruction],
    ) -> Result<(), MapperError> {
        // Registers that must keep their names: program outputs, and
        // everything a MAC touches (it accumulates in place, so its output
        // register and the register it reads back must stay aligned).
        let mut rename_locks: HashSet<String> = HashSet::new();
        for layer in layers {
            for &op_node in layer {
                let index = graph.node(op_node).instr.expect("operation node");
                let is_mac = instructions[index].opcode == Opcode::Mac;
                for &target in graph.out_nodes(op_node) {
                    if graph.out_nodes(target).is_empty() || is_mac {
                        rename_locks.insert(graph.node(target).label.clone());
                    }
                }
                if is_mac {
                    for &value in graph.in_nodes(op_node) {
                        rename_locks.insert(graph.node(value).label.clone());
                    }
                }
            }
        }

        for layer in layers {
            for &op_node in layer {
                let targets: Vec<usize> = graph.out_nodes(op_node).to_vec();
                for target in targets {
                    let label = graph.node(target).label.clone();
                    if !rename_locks.contains(&label) {
                        let renamed = format!("uid_{}_{label}", self.unique_counter);
                        self.unique_counter += 1;
                        debug!(from = label.as_str(), to = renamed.as_str(), "isolating register");
                        graph.set_label(target, renamed);
                    }
                }
            }
        }

        for layer in layers {
            for &op_node in layer {
                self.adjust_instruction(graph, op_node, instructions)?;
            }
        }
        Ok(())
    }

    fn adjust_instruction(
        &self,
        graph: &InstructionGraph,
        op_node: usize,
        instructions: &mut [PisaInstruction],
    ) -> Result<(), MapperError> {
        let index = graph.node(op_node).instr.expect("operation node");
        let in_labels: Vec<String> = graph
            .in_nodes(op_node)
            .iter()
            .map(|&n| graph.node(n).label.clone())
            .collect();
        let out_labels: Vec<String> = graph
            .out_nodes(op_node)
            .iter()
            .map(|&n| graph.node(n).label.clone())
            .collect();

        let instruction = &mut instructions[index];
        match instruction.opcode {
            // The immediate must sit in the second slot.
            Opcode::Muli if in_labels.len() == 2 => {
                let first_is_immediate =
                    graph.node(graph.in_nodes(op_node)[0]).kind == NodeKind::Immediate;
                if first_is_immediate {
                    instruction.inputs.swap(0, 1);
                    instruction.inputs[0].set_name(&in_labels[1]);
                    instruction.inputs[1].set_name(&in_labels[0]);
                } else {
                    instruction.inputs[0].set_name(&in_labels[0]);
                    instruction.inputs[1].set_name(&in_labels[1]);
                }
            }
            // The accumulator input must mirror the output register; the
            // remaining inputs keep their relative order.
            Opcode::Mac => {
                if in_labels.len() != 3 || out_labels.is_empty() {
                    return Err(MapperError::InvalidMacInstruction(
                        instruction.outputs.first().map(|o| o.name()).unwrap_or_default(),
                    ));
                }
                let out = &out_labels[0];
                instruction.outputs[0].set_name(out);
                let order: [usize; 3] = if *out == in_labels[0] {
                    [0, 1, 2]
                } else if *out == in_labels[1] {
                    [1, 0, 2]
                } else if *out == in_labels[2] {
                    [2, 0, 1]
                } else {
                    return Err(MapperError::InvalidMacInstruction(out.clone()));
                };
                for (slot, &source) in order.iter().enumerate() {
                    instruction.inputs[slot].set_name(&in_labels[source]);
                }
            }
            _ => {
                for (slot, label) in in_labels.iter().enumerate() {
                    instruction.inputs[slot].set_name(label);
                }
            }
        }

        for (slot, label) in out_labels.iter().enumerate() {
            instruction.outputs[slot].set_name(label);
        }
        Ok(())
    }
}

fn find_duplicate_inputs(instruction: &PisaInstruction) -> Option<usize> {
    let names: Vec<String> = instruction.inputs.iter().map(|o| o.name()).collect();
    for i in 0..names.len() {
        for j in i + 1..names.len() {
            if names[i] == names[j] {
                return Some(j);
            }
        }
    }
    None
}
