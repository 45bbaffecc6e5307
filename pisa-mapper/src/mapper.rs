//! The pipeline driver: trace in, P-ISA CSV and memory manifest out.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use pisa_trace::PolyProgram;
use tracing::{info, warn};

use crate::emitter;
use crate::error::MapperError;
use crate::graph::{InstructionGraph, NodeKind};
use crate::isa::PisaInstruction;
use crate::kernel::{Kernel, KernelCache, KernelProtocol, KernelRequest};
use crate::optimizer::GraphOptimizer;

/// Everything configurable about one lowering run. The defaults mirror the
/// tool's: stdin generator protocol, caching on, namespacing on, layer
/// ordering, no bank suffixes, unbounded generator runtime.
#[derive(Debug, Clone)]
pub struct MapperOptions {
    pub kerngen_path: PathBuf,
    /// Output prefix; the artifacts are `<prefix>.csv` and `<prefix>.tw.mem`.
    pub out_prefix: PathBuf,
    pub cache_dir: PathBuf,
    pub protocol: KernelProtocol,
    pub use_cache: bool,
    pub remove_cache: bool,
    pub apply_namespacing: bool,
    /// Keep intermediate symbols under their trace names instead of
    /// operation-scoped ones.
    pub enable_intermediates: bool,
    pub emit_banks: bool,
    /// Keep the spliced instruction order instead of layer order.
    pub fixed_order: bool,
    pub kernel_timeout: Option<Duration>,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            kerngen_path: PathBuf::new(),
            out_prefix: PathBuf::from("program_pisa"),
            cache_dir: PathBuf::from("./kernel_cache"),
            protocol: KernelProtocol::Stdin,
            use_cache: true,
            remove_cache: false,
            apply_namespacing: true,
            enable_intermediates: false,
            emit_banks: false,
            fixed_order: false,
            kernel_timeout: None,
        }
    }
}

/// The result of a lowering run, with the emitted stream kept in memory
/// for callers that post-process it.
#[derive(Debug)]
pub struct MapperOutput {
    pub instructions: Vec<PisaInstruction>,
    pub program_inputs: Vec<String>,
    pub program_outputs: Vec<String>,
    pub max_rns: u32,
    pub instruction_path: PathBuf,
    pub mem_path: PathBuf,
}

pub struct ProgramMapper {
    options: MapperOptions,
}

impl ProgramMapper {
    pub fn new(options: MapperOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    /// Lowers `program` and writes both artifacts.
    ///
    /// The emitted stream is a deterministic function of the program, the
    /// cache contents and the options; all counters are scoped to this
    /// call.
    pub fn run(&self, program: &PolyProgram) -> Result<MapperOutput, MapperError> {
        // The program-level graph names the external interface and checks
        // that every consumer agrees with its producer on operand shape.
        let program_graph = InstructionGraph::build(&program.operations)?;

        let mut register_map: BTreeMap<String, String> = BTreeMap::new();
        for node in program_graph.input_nodes(true, true, false) {
            let label = program_graph.node(node).label.clone();
            register_map.insert(label.clone(), label);
        }
        for node in program_graph.output_nodes() {
            let label = program_graph.node(node).label.clone();
            register_map.insert(label.clone(), label);
        }
        if self.options.enable_intermediates {
            for node in 0..program_graph.node_count() {
                if program_graph.node(node).kind == NodeKind::Variable {
                    let label = program_graph.node(node).label.clone();
                    register_map.insert(label.clone(), label);
                }
            }
        }

        // Intermediates link adjacent kernels; they get operation-scoped
        // names unless already pinned above.
        for (index, op) in program.operations.iter().enumerate() {
            for (slot, input) in op.inputs.iter().enumerate() {
                register_map
                    .entry(input.name.clone())
                    .or_insert_with(|| format!("{}{}input{}", op.name, index, slot));
            }
            for (slot, output) in op.outputs.iter().enumerate() {
                register_map
                    .entry(output.name.clone())
                    .or_insert_with(|| format!("{}{}output{}", op.name, index, slot));
            }
        }

        let cache = KernelCache::new(
            &self.options.cache_dir,
            self.options.use_cache,
            self.options.remove_cache,
        );

        let mut kernels = Vec::with_capacity(program.operations.len());
        let mut max_rns = 0u32;
        for op in &program.operations {
            max_rns = max_rns.max(op.rns_terms);
            let request = KernelRequest::from_operation(op, program);
            let instructions = cache.fetch(
                &self.options.kerngen_path,
                &request,
                self.options.protocol,
                self.options.kernel_timeout,
            )?;
            let mut kernel = Kernel::new(op.name.clone(), kernels.len() as u64, instructions);
            kernel.determine_variable_naming()?;
            kernels.push(kernel);
        }

        for (kernel, op) in kernels.iter_mut().zip(&program.operations) {
            for (slot, input) in op.inputs.iter().enumerate() {
                if slot >= kernel.input_names.len() {
                    warn!(
                        op = op.name.as_str(),
                        operand = input.name.as_str(),
                        "operation has more inputs than its kernel exposes"
                    );
                    continue;
                }
                kernel.map_input(slot, &register_map[&input.name]);
            }
            for (slot, output) in op.outputs.iter().enumerate() {
                if slot >= kernel.output_names.len() {
                    warn!(
                        op = op.name.as_str(),
                        operand = output.name.as_str(),
                        "operation has more outputs than its kernel exposes"
                    );
                    continue;
                }
                kernel.map_output(slot, &register_map[&output.name]);
            }
        }

        let mut combined: Vec<PisaInstruction> = Vec::new();
        for kernel in &mut kernels {
            kernel.set_enable_namespace(self.options.apply_namespacing);
            combined.extend_from_slice(kernel.mapped_instructions());
        }
        info!(
            kernels = kernels.len(),
            instructions = combined.len(),
            "spliced kernels"
        );

        let mut optimizer = GraphOptimizer::new();
        let combined = optimizer.apply_duplicate_input_separation(combined);
        let stream = optimizer.generate_instruction_stream(combined, self.options.fixed_order)?;

        let final_graph = InstructionGraph::build(&stream)?;
        let program_inputs: Vec<String> = final_graph
            .input_nodes(true, false, false)
            .into_iter()
            .map(|node| final_graph.node(node).label.clone())
            .collect();
        let program_outputs: Vec<String> = final_graph
            .output_nodes()
            .into_iter()
            .map(|node| final_graph.node(node).label.clone())
            .collect();

        let instruction_path = self.options.out_prefix.with_extension("csv");
        let mem_path = self.options.out_prefix.with_extension("tw.mem");
        emitter::write_instructions(&instruction_path, &stream, self.options.emit_banks)?;
        let mem_lines = emitter::generate_mem_manifest(&program_inputs, &program_outputs, max_rns);
        emitter::write_mem_manifest(&mem_path, &mem_lines)?;

        info!(
            instructions = stream.len(),
            inputs = program_inputs.len(),
            outputs = program_outputs.len(),
            "lowering complete"
        );

        Ok(MapperOutput {
            instructions: stream,
            program_inputs,
            program_outputs,
            max_rns,
            instruction_path,
            mem_path,
        })
    }
}
