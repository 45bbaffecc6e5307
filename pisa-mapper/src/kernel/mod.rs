//! Kernel instantiation and symbol splicing.
//!
//! A [`Kernel`] is the P-ISA expansion of one FHE-level operation, parsed
//! from the generator's output. Its externally visible symbols (inputs,
//! outputs, immediates) are discovered from its own data-flow graph; the
//! pipeline then renames them into the program-wide namespace while
//! internal temporaries get a per-instantiation prefix so the same kernel
//! can be spliced in more than once.

mod cache;

pub use cache::{KernelCache, KernelProtocol, KernelRequest};

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::error::MapperError;
use crate::graph::InstructionGraph;
use crate::isa::PisaInstruction;

#[derive(Debug)]
pub struct Kernel {
    pub name: String,
    pub kernel_id: u64,
    instructions: Vec<PisaInstruction>,
    mapped_instructions: Vec<PisaInstruction>,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    pub immediate_names: Vec<String>,
    naming_map: BTreeMap<String, String>,
    immediate_map: BTreeMap<String, String>,
    internal_map: BTreeMap<String, String>,
    map_dirty: bool,
    enable_namespace: bool,
}

fn register_root(name: &str) -> &str {
    match name.find('_') {
        Some(i) => &name[..i],
        None => name,
    }
}

fn non_repeating_roots<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    labels
        .map(register_root)
        .unique()
        .map(ToOwned::to_owned)
        .collect()
}

impl Kernel {
    pub fn new(name: impl Into<String>, kernel_id: u64, instructions: Vec<PisaInstruction>) -> Self {
        let mapped_instructions = instructions.clone();
        Self {
            name: name.into(),
            kernel_id,
            instructions,
            mapped_instructions,
            input_names: Vec::new(),
            output_names: Vec::new(),
            immediate_names: Vec::new(),
            naming_map: BTreeMap::new(),
            immediate_map: BTreeMap::new(),
            internal_map: BTreeMap::new(),
            map_dirty: true,
            enable_namespace: true,
        }
    }

    pub fn instructions(&self) -> &[PisaInstruction] {
        &self.instructions
    }

    pub fn set_enable_namespace(&mut self, enable: bool) {
        self.enable_namespace = enable;
        self.map_dirty = true;
    }

    /// Discovers the kernel's boundary symbols from its data-flow graph.
    ///
    /// Inputs keep first-occurrence order except that roots containing
    /// `"input"` are sorted ascending among themselves; this pins the
    /// positional operand convention of the stdin generator while leaving
    /// the named operands of the legacy generators alone. Outputs are
    /// sorted; immediates are tracked by their full name.
    pub fn determine_variable_naming(&mut self) -> Result<(), MapperError> {
        let graph = InstructionGraph::build(&self.instructions)?;

        let inputs = graph.input_nodes(true, false, false);
        let outputs = graph.output_nodes();
        let immediates = graph.input_nodes(false, true, false);

        let mut input_roots =
            non_repeating_roots(inputs.iter().map(|&i| graph.node(i).label.as_str()));
        for root in &input_roots {
            self.naming_map.insert(root.clone(), root.clone());
        }
        // Positional roots sort ascending among themselves; named roots from
        // the legacy generators keep their slots.
        let positions: Vec<usize> = input_roots.iter().positions(|r| r.contains("input")).collect();
        let mut positional: Vec<String> =
            positions.iter().map(|&p| input_roots[p].clone()).collect();
        positional.sort();
        for (&slot, root) in positions.iter().zip(positional) {
            input_roots[slot] = root;
        }
        self.input_names = input_roots;

        let mut output_roots =
            non_repeating_roots(outputs.iter().map(|&i| graph.node(i).label.as_str()));
        for root in &output_roots {
            self.naming_map.insert(root.clone(), root.clone());
        }
        output_roots.sort();
        self.output_names = output_roots;

        for &node in &immediates {
            let label = graph.node(node).label.clone();
            if !self.immediate_map.contains_key(&label) {
                self.immediate_names.push(label.clone());
                self.immediate_map.insert(label.clone(), label);
            }
        }

        self.map_dirty = true;
        Ok(())
    }

    pub fn map_input(&mut self, index: usize, new_name: &str) {
        let old = self.input_names[index].clone();
        self.naming_map.insert(old, new_name.to_owned());
        self.map_dirty = true;
    }

    pub fn map_output(&mut self, index: usize, new_name: &str) {
        let old = self.output_names[index].clone();
        self.naming_map.insert(old, new_name.to_owned());
        self.map_dirty = true;
    }

    pub fn map_immediate(&mut self, index: usize, new_name: &str) {
        let old = self.immediate_names[index].clone();
        self.naming_map.insert(old, new_name.to_owned());
        self.map_dirty = true;
    }

    pub fn set_immediate(&mut self, key: &str, value: &str) {
        self.immediate_map.insert(key.to_owned(), value.to_owned());
        self.map_dirty = true;
    }

    /// The spliced instruction list, re-materialized after any rename.
    pub fn mapped_instructions(&mut self) -> &[PisaInstruction] {
        if self.map_dirty {
            self.update_symbols();
        }
        &self.mapped_instructions
    }

    fn create_internal_variable_map(&mut self) {
        for name in &self.immediate_names {
            self.internal_map.insert(name.clone(), name.clone());
        }
        for (key, value) in &self.immediate_map {
            self.naming_map
                .entry(key.clone())
                .or_insert_with(|| value.clone());
            self.internal_map.insert(key.clone(), value.clone());
        }

        let operands: Vec<(String, String)> = self
            .instructions
            .iter()
            .flat_map(|instruction| instruction.inputs.iter().chain(&instruction.outputs))
            .map(|operand| (operand.root().to_owned(), operand.name()))
            .collect();

        for (root, location) in operands {
            if !self.naming_map.contains_key(&root)
                && !self.immediate_map.contains_key(&location)
                && !self.internal_map.contains_key(&location)
            {
                let namespaced = format!("internal_{}_{}_NS_{location}", self.name, self.kernel_id);
                self.internal_map.insert(location, namespaced);
            }
        }
    }

    fn update_symbols(&mut self) {
        if self.internal_map.is_empty() {
            self.create_internal_variable_map();
        }

        for (i, instruction) in self.instructions.iter().enumerate() {
            for (x, operand) in instruction.inputs.iter().enumerate() {
                if let Some(new_root) = self.naming_map.get(operand.root()) {
                    self.mapped_instructions[i].inputs[x].set_root(new_root);
                } else if self.enable_namespace {
                    if let Some(namespaced) = self.internal_map.get(&operand.name()) {
                        self.mapped_instructions[i].inputs[x].set_name(namespaced);
                    }
                }
            }
            for (x, operand) in instruction.outputs.iter().enumerate() {
                if let Some(new_root) = self.naming_map.get(operand.root()) {
                    self.mapped_instructions[i].outputs[x].set_root(new_root);
                } else if self.enable_namespace {
                    if let Some(namespaced) = self.internal_map.get(&operand.name()) {
                        self.mapped_instructions[i].outputs[x].set_name(namespaced);
                    }
                }
            }
        }
        self.map_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::parse_instruction;

    fn kernel_instructions() -> Vec<PisaInstruction> {
        vec![
            parse_instruction("13, muli, t0_0_0, input0_0_0, R2_0, 0").unwrap(),
            parse_instruction("13, add, output0_0_0, t0_0_0, input1_0_0, 0").unwrap(),
        ]
    }

    #[test]
    fn boundary_discovery() {
        let mut kernel = Kernel::new("add", 0, kernel_instructions());
        kernel.determine_variable_naming().unwrap();
        assert_eq!(kernel.input_names, vec!["input0", "input1"]);
        assert_eq!(kernel.output_names, vec!["output0"]);
        assert_eq!(kernel.immediate_names, vec!["R2_0"]);
    }

    #[test]
    fn splicing_renames_boundaries_and_namespaces_temporaries() {
        let mut kernel = Kernel::new("add", 3, kernel_instructions());
        kernel.determine_variable_naming().unwrap();
        kernel.map_input(0, "a");
        kernel.map_input(1, "b");
        kernel.map_output(0, "sum");

        let mapped = kernel.mapped_instructions();
        assert_eq!(mapped[0].inputs[0].name(), "a_0_0");
        assert_eq!(mapped[0].inputs[1].name(), "R2_0");
        assert_eq!(mapped[0].outputs[0].name(), "internal_add_3_NS_t0_0_0");
        assert_eq!(mapped[1].inputs[0].name(), "internal_add_3_NS_t0_0_0");
        assert_eq!(mapped[1].inputs[1].name(), "b_0_0");
        assert_eq!(mapped[1].outputs[0].name(), "sum_0_0");
    }

    #[test]
    fn namespacing_can_be_disabled() {
        let mut kernel = Kernel::new("add", 1, kernel_instructions());
        kernel.determine_variable_naming().unwrap();
        kernel.map_input(0, "a");
        kernel.map_input(1, "b");
        kernel.map_output(0, "sum");
        kernel.set_enable_namespace(false);

        let mapped = kernel.mapped_instructions();
        assert_eq!(mapped[0].outputs[0].name(), "t0_0_0");
    }

    #[test]
    fn legacy_operand_names_sort_only_input_roots() {
        let instructions = vec![
            parse_instruction("13, add, out_0_0, d_0_0, c_0_0, 0").unwrap(),
        ];
        let mut kernel = Kernel::new("add", 0, instructions);
        kernel.determine_variable_naming().unwrap();
        // Neither root contains "input": positional order is preserved.
        assert_eq!(kernel.input_names, vec!["d", "c"]);

        let instructions = vec![
            parse_instruction("13, add, out_0_0, input1_0_0, input0_0_0, 0").unwrap(),
        ];
        let mut kernel = Kernel::new("add", 0, instructions);
        kernel.determine_variable_naming().unwrap();
        assert_eq!(kernel.input_names, vec!["input0", "input1"]);
    }
}
