//! The P-ISA instruction model.
//!
//! Every instruction is one tagged record; the per-opcode operand layout
//! lives in [`descriptor`] and drives both the CSV parser and rendering.
//! Register names follow the `root_residual_chunk` convention; an
//! [`Operand`] keeps the split so boundary renames can replace the root
//! while leaving the address suffix untouched.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::MapperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Mac,
    Maci,
    Muli,
    Ntt,
    Intt,
    Copy,
}

impl Opcode {
    pub fn base_name(&self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Mac => "mac",
            Opcode::Maci => "maci",
            Opcode::Muli => "muli",
            Opcode::Ntt => "ntt",
            Opcode::Intt => "intt",
            Opcode::Copy => "copy",
        }
    }

    pub fn parse(name: &str) -> Option<Opcode> {
        Some(match name {
            "add" => Opcode::Add,
            "sub" => Opcode::Sub,
            "mul" => Opcode::Mul,
            "mac" => Opcode::Mac,
            "maci" => Opcode::Maci,
            "muli" => Opcode::Muli,
            "ntt" => Opcode::Ntt,
            "intt" => Opcode::Intt,
            "copy" => Opcode::Copy,
            _ => return None,
        })
    }
}

/// Positional slot kinds of an instruction line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSlot {
    PolyModDegLog2,
    OpName,
    OutputOperand,
    InputOperand,
    InputOutputOperand,
    Immediate,
    WPackedParam,
    Residual,
    GaloisElement,
}

use ParamSlot::*;

/// Operand layout per opcode, in line order.
pub fn descriptor(opcode: Opcode) -> &'static [ParamSlot] {
    match opcode {
        Opcode::Add | Opcode::Sub | Opcode::Mul => {
            &[PolyModDegLog2, OpName, OutputOperand, InputOperand, InputOperand, Residual]
        }
        Opcode::Mac => {
            &[PolyModDegLog2, OpName, InputOutputOperand, InputOperand, InputOperand, Residual]
        }
        Opcode::Maci => {
            &[PolyModDegLog2, OpName, InputOutputOperand, InputOperand, Immediate, Residual]
        }
        Opcode::Muli => &[PolyModDegLog2, OpName, OutputOperand, InputOperand, Immediate, Residual],
        Opcode::Ntt => &[
            PolyModDegLog2,
            OpName,
            OutputOperand,
            OutputOperand,
            InputOperand,
            InputOperand,
            WPackedParam,
            Residual,
        ],
        Opcode::Intt => &[
            PolyModDegLog2,
            OpName,
            OutputOperand,
            OutputOperand,
            InputOperand,
            InputOperand,
            WPackedParam,
            Residual,
            GaloisElement,
        ],
        Opcode::Copy => &[PolyModDegLog2, OpName, OutputOperand, InputOperand],
    }
}

/// Twiddle selector of an NTT/INTT stage, rendered `w_<res>_<stage>_<block>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WParam {
    pub residual: u32,
    pub stage: u32,
    pub block: u32,
}

impl WParam {
    pub fn parse(text: &str) -> Result<Self, MapperError> {
        let malformed = || MapperError::MalformedInstruction(format!("w-parameter {text}"));
        let mut parts = text.split('_');
        match parts.next() {
            Some("w") => {}
            _ => return Err(malformed()),
        }
        let mut next = || -> Result<u32, MapperError> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(malformed)
        };
        Ok(Self {
            residual: next()?,
            stage: next()?,
            block: next()?,
        })
    }
}

impl fmt::Display for WParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w_{}_{}_{}", self.residual, self.stage, self.block)
    }
}

/// A register or immediate reference. The name is `root + suffix`, where
/// the root runs up to the first underscore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    root: String,
    suffix: String,
    pub immediate: bool,
}

impl Operand {
    pub fn new(name: &str, immediate: bool) -> Self {
        let (root, suffix) = split_name(name);
        Self {
            root: root.to_owned(),
            suffix: suffix.to_owned(),
            immediate,
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.root, self.suffix)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Replaces the whole register name, re-deriving the root.
    pub fn set_name(&mut self, name: &str) {
        let (root, suffix) = split_name(name);
        self.root = root.to_owned();
        self.suffix = suffix.to_owned();
    }

    /// Replaces the root, keeping the address suffix.
    pub fn set_root(&mut self, root: &str) {
        self.root = root.to_owned();
    }
}

fn split_name(name: &str) -> (&str, &str) {
    match name.find('_') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    }
}

/// One P-ISA instruction. Unused fields stay at their defaults; the
/// descriptor decides what is parsed and printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PisaInstruction {
    pub opcode: Opcode,
    pub pmd: u32,
    pub residual: u32,
    pub galois_element: u32,
    pub w_param: Option<WParam>,
    pub inputs: Vec<Operand>,
    pub outputs: Vec<Operand>,
    /// Appends `_bank0` to every rendered operand when set.
    pub output_bank: bool,
}

impl PisaInstruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            pmd: 0,
            residual: 0,
            // Plain inverse transforms use the identity element's tables.
            galois_element: 1,
            w_param: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_bank: false,
        }
    }

    pub fn copy_of(pmd: u32, residual: u32, output: Operand, input: Operand) -> Self {
        let mut instr = Self::new(Opcode::Copy);
        instr.pmd = pmd;
        instr.residual = residual;
        instr.outputs.push(output);
        instr.inputs.push(input);
        instr
    }

    fn operand_string(&self, operand: &Operand) -> String {
        if !operand.immediate && self.output_bank {
            format!("{}_bank0", operand.name())
        } else {
            operand.name()
        }
    }
}

impl fmt::Display for PisaInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        let mut input_count = 0;
        let mut output_count = 0;
        for slot in descriptor(self.opcode) {
            match slot {
                PolyModDegLog2 => fields.push(self.pmd.to_string()),
                OpName => fields.push(self.opcode.base_name().to_owned()),
                OutputOperand => {
                    fields.push(self.operand_string(&self.outputs[output_count]));
                    output_count += 1;
                }
                InputOperand | Immediate => {
                    fields.push(self.operand_string(&self.inputs[input_count]));
                    input_count += 1;
                }
                InputOutputOperand => {
                    fields.push(self.operand_string(&self.outputs[output_count]));
                    output_count += 1;
                    input_count += 1;
                }
                WPackedParam => fields.push(self.w_param.unwrap_or_default().to_string()),
                Residual => fields.push(self.residual.to_string()),
                GaloisElement => fields.push(self.galois_element.to_string()),
            }
        }
        write!(f, "{}", fields.join(", "))
    }
}

fn strip_spaces(field: &str) -> String {
    field.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

/// Parses one comma-separated P-ISA line.
pub fn parse_instruction(line: &str) -> Result<PisaInstruction, MapperError> {
    let mut fields: Vec<String> = line.split(',').map(strip_spaces).collect();
    if line.trim_end().ends_with(',') {
        fields.pop();
    }
    const OP_CODE_LOCATION: usize = 1;
    let op_field = fields
        .get(OP_CODE_LOCATION)
        .ok_or_else(|| MapperError::MalformedInstruction(line.to_owned()))?;
    let opcode =
        Opcode::parse(op_field).ok_or_else(|| MapperError::UnknownOpcode(op_field.clone()))?;

    let slots = descriptor(opcode);
    if fields.len() > slots.len() {
        return Err(MapperError::MalformedInstruction(line.to_owned()));
    }

    let parse_u32 = |field: &str| -> Result<u32, MapperError> {
        field
            .parse()
            .map_err(|_| MapperError::MalformedInstruction(line.to_owned()))
    };

    let mut instr = PisaInstruction::new(opcode);
    for (slot, field) in slots.iter().zip(&fields) {
        match slot {
            PolyModDegLog2 => instr.pmd = parse_u32(field)?,
            OpName => {}
            OutputOperand => instr.outputs.push(Operand::new(field, false)),
            InputOperand => instr.inputs.push(Operand::new(field, false)),
            Immediate => instr.inputs.push(Operand::new(field, true)),
            InputOutputOperand => {
                instr.inputs.push(Operand::new(field, false));
                instr.outputs.push(Operand::new(field, false));
            }
            WPackedParam => instr.w_param = Some(WParam::parse(field)?),
            Residual => instr.residual = parse_u32(field)?,
            GaloisElement => instr.galois_element = parse_u32(field)?,
        }
    }
    Ok(instr)
}

/// Parses a P-ISA CSV stream, one instruction per non-empty line.
pub fn parse_pisa<R: Read>(reader: R) -> Result<Vec<PisaInstruction>, MapperError> {
    let mut instructions = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        instructions.push(parse_instruction(&line)?);
    }
    Ok(instructions)
}

pub fn parse_pisa_file(path: &Path) -> Result<Vec<PisaInstruction>, MapperError> {
    parse_pisa(File::open(path)?)
}
