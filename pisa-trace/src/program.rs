use pisa_data::context::Scheme;
use tracing::warn;

use crate::descriptors::{descriptor, ParamKind};
use crate::error::TraceError;
use crate::wire::{Arg, Instruction, ParamValue, Trace};

/// One named operand of a polynomial operation. `order` is the number of
/// polynomial parts (2 for a fresh ciphertext), `num_rns` the number of RNS
/// terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyOperand {
    pub name: String,
    pub order: u32,
    pub num_rns: u32,
}

impl PolyOperand {
    pub fn new(name: impl Into<String>, order: u32, num_rns: u32) -> Self {
        Self {
            name: name.into(),
            order,
            num_rns,
        }
    }

    /// Parses the `name-order-rns` operand form of a trace row.
    pub fn parse(text: &str) -> Result<Self, TraceError> {
        let malformed = || TraceError::MalformedOperand(text.to_owned());
        let first = text.find('-').ok_or_else(malformed)?;
        let second = text[first + 1..]
            .find('-')
            .map(|i| i + first + 1)
            .ok_or_else(malformed)?;

        let name = &text[..first];
        let order = text[first + 1..second].parse().map_err(|_| malformed())?;
        let num_rns = text[second + 1..].parse().map_err(|_| malformed())?;
        if name.is_empty() {
            return Err(malformed());
        }
        Ok(Self::new(name, order, num_rns))
    }

    pub fn to_arg_string(&self) -> String {
        format!("{}-{}-{}", self.name, self.order, self.num_rns)
    }
}

/// One FHE-level operation of a polynomial program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolyOperation {
    pub name: String,
    pub inputs: Vec<PolyOperand>,
    pub outputs: Vec<PolyOperand>,
    pub rns_terms: u32,
    pub cipher_degree: u32,
    pub galois_elt: u32,
    pub factor: u32,
    /// Immediate scalar of a multiply-by-constant, carried as text.
    pub scalar_operand: Option<String>,
}

impl PolyOperation {
    pub fn input(&self, i: usize) -> &PolyOperand {
        &self.inputs[i]
    }

    pub fn output(&self, i: usize) -> &PolyOperand {
        &self.outputs[i]
    }
}

/// An ordered polynomial program plus the scheme-wide parameters shared by
/// every operation in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyProgram {
    pub scheme: Scheme,
    /// Ring dimension N.
    pub poly_modulus_degree: u32,
    pub key_rns: u32,
    pub alpha: u32,
    pub dnum: u32,
    pub q_size: u32,
    pub operations: Vec<PolyOperation>,
}

impl Default for PolyProgram {
    fn default() -> Self {
        Self {
            scheme: Scheme::Bgv,
            poly_modulus_degree: 0,
            key_rns: 0,
            alpha: 0,
            dnum: 0,
            q_size: 0,
            operations: Vec::new(),
        }
    }
}

impl PolyProgram {
    /// Builds a program from a wire-level trace. Bootstrap helper
    /// instructions (`bk_` opcode prefix) are skipped.
    pub fn from_trace(trace: &Trace) -> Result<Self, TraceError> {
        let mut program = PolyProgram {
            scheme: trace.scheme,
            poly_modulus_degree: trace.n,
            key_rns: trace.key_rns_num,
            alpha: trace.alpha,
            dnum: trace.dnum,
            q_size: trace.q_size,
            operations: Vec::new(),
        };

        for instruction in &trace.instructions {
            if instruction.op.starts_with("bk_") {
                continue;
            }
            program
                .operations
                .push(Self::operation_from_instruction(instruction)?);
        }
        Ok(program)
    }

    fn operation_from_instruction(instruction: &Instruction) -> Result<PolyOperation, TraceError> {
        let desc = descriptor(&instruction.op)
            .ok_or_else(|| TraceError::UnknownOperation(instruction.op.clone()))?;

        let mut op = PolyOperation {
            name: desc.op_name.to_owned(),
            ..Default::default()
        };
        for dest in &instruction.dests {
            op.outputs
                .push(PolyOperand::new(&dest.symbol_name, dest.order, dest.num_rns));
        }
        for src in &instruction.srcs {
            op.inputs
                .push(PolyOperand::new(&src.symbol_name, src.order, src.num_rns));
        }

        let first_src = instruction
            .srcs
            .first()
            .ok_or_else(|| TraceError::MissingArgument(instruction.op.clone(), "source operand"))?;
        op.rns_terms = first_src.num_rns;
        op.cipher_degree = first_src.order;

        for (key, value) in &instruction.params {
            match key.as_str() {
                "galois_elt" => {
                    op.galois_elt = value.as_text().parse().map_err(|_| {
                        TraceError::MalformedRow(format!("galois_elt = {}", value.as_text()))
                    })?;
                }
                "factor" => {
                    op.factor = value.as_text().parse().map_err(|_| {
                        TraceError::MalformedRow(format!("factor = {}", value.as_text()))
                    })?;
                }
                "operand" => op.scalar_operand = Some(value.as_text()),
                _ => {}
            }
        }
        Ok(op)
    }

    /// Builds the wire-level trace for this program, the inverse of
    /// [`PolyProgram::from_trace`].
    pub fn to_trace(&self) -> Result<Trace, TraceError> {
        let mut trace = Trace {
            scheme: self.scheme,
            n: self.poly_modulus_degree,
            key_rns_num: self.key_rns,
            q_size: self.q_size,
            dnum: self.dnum,
            alpha: self.alpha,
            instructions: Vec::new(),
        };

        for op in &self.operations {
            let desc = descriptor(&op.name)
                .ok_or_else(|| TraceError::UnknownOperation(op.name.clone()))?;
            let mut instruction = Instruction {
                op: op.name.clone(),
                ..Default::default()
            };
            for output in &op.outputs {
                instruction.dests.push(Arg {
                    symbol_name: output.name.clone(),
                    num_rns: output.num_rns,
                    order: output.order,
                });
            }
            for input in &op.inputs {
                instruction.srcs.push(Arg {
                    symbol_name: input.name.clone(),
                    num_rns: input.num_rns,
                    order: input.order,
                });
            }
            for kind in desc.params {
                match kind {
                    ParamKind::GaloisElt => {
                        instruction
                            .params
                            .insert("galois_elt".to_owned(), ParamValue::U32(op.galois_elt));
                    }
                    ParamKind::Factor => {
                        instruction
                            .params
                            .insert("factor".to_owned(), ParamValue::U32(op.factor));
                    }
                    _ => {}
                }
            }
            if let Some(scalar) = &op.scalar_operand {
                instruction
                    .params
                    .insert("operand".to_owned(), ParamValue::Str(scalar.clone()));
            }
            trace.instructions.push(instruction);
        }
        Ok(trace)
    }

    /// Parses one trace row (already split into fields) into an operation,
    /// updating the program-wide parameters in place.
    pub(crate) fn parse_row(&mut self, fields: &[String]) -> Result<(), TraceError> {
        let op_field = fields
            .first()
            .ok_or_else(|| TraceError::MalformedRow("empty row".into()))?;
        let desc = descriptor(op_field)
            .ok_or_else(|| TraceError::UnknownOperation(op_field.clone()))?;

        if fields.len() > desc.params.len() {
            return Err(TraceError::TooManyArguments {
                op: op_field.clone(),
                given: fields.len(),
                expected: desc.params.len(),
            });
        }
        if fields.len() < desc.params.len() {
            warn!(
                op = op_field.as_str(),
                given = fields.len(),
                expected = desc.params.len(),
                "trace row is missing trailing arguments"
            );
        }

        let mut op = PolyOperation {
            name: desc.op_name.to_owned(),
            ..Default::default()
        };
        let parse_u32 = |value: &str| -> Result<u32, TraceError> {
            value
                .parse()
                .map_err(|_| TraceError::MalformedRow(format!("expected integer, got {value}")))
        };

        for (kind, value) in desc.params.iter().zip(fields) {
            match kind {
                ParamKind::OpName => {}
                ParamKind::FheScheme => {
                    self.scheme = Scheme::parse(value)
                        .ok_or_else(|| TraceError::MalformedRow(format!("scheme {value}")))?;
                }
                ParamKind::PolymodDegLog2 => self.poly_modulus_degree = parse_u32(value)?,
                ParamKind::KeyRns => self.key_rns = parse_u32(value)?,
                ParamKind::Alpha => self.alpha = parse_u32(value)?,
                ParamKind::QSize => self.q_size = parse_u32(value)?,
                ParamKind::Dnum => self.dnum = parse_u32(value)?,
                ParamKind::OutputArgument => op.outputs.push(PolyOperand::parse(value)?),
                ParamKind::InputArgument => op.inputs.push(PolyOperand::parse(value)?),
                ParamKind::InputOutputArgument => {
                    let operand = PolyOperand::parse(value)?;
                    op.inputs.push(operand.clone());
                    op.outputs.push(operand);
                }
                ParamKind::CipherDegree => op.cipher_degree = parse_u32(value)?,
                ParamKind::RnsTerm => op.rns_terms = parse_u32(value)?,
                ParamKind::GaloisElt => op.galois_elt = parse_u32(value)?,
                ParamKind::Factor => op.factor = parse_u32(value)?,
            }
        }

        if let Some(first) = op.inputs.first() {
            op.rns_terms = first.num_rns;
            op.cipher_degree = first.order;
        }

        self.operations.push(op);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_parsing() {
        let operand = PolyOperand::parse("ct0-2-3").unwrap();
        assert_eq!(operand, PolyOperand::new("ct0", 2, 3));
        assert_eq!(operand.to_arg_string(), "ct0-2-3");

        assert!(PolyOperand::parse("ct0").is_err());
        assert!(PolyOperand::parse("ct0-2").is_err());
        assert!(PolyOperand::parse("-2-3").is_err());
        assert!(PolyOperand::parse("ct0-x-3").is_err());
    }

    #[test]
    fn bootstrap_helpers_are_skipped() {
        let trace = Trace {
            scheme: Scheme::Bgv,
            n: 16,
            key_rns_num: 2,
            q_size: 1,
            dnum: 1,
            alpha: 1,
            instructions: vec![
                Instruction {
                    op: "bk_prepare".to_owned(),
                    ..Default::default()
                },
                Instruction {
                    op: "add".to_owned(),
                    dests: vec![Arg {
                        symbol_name: "out".into(),
                        num_rns: 2,
                        order: 2,
                    }],
                    srcs: vec![
                        Arg {
                            symbol_name: "a".into(),
                            num_rns: 2,
                            order: 2,
                        },
                        Arg {
                            symbol_name: "b".into(),
                            num_rns: 2,
                            order: 2,
                        },
                    ],
                    ..Default::default()
                },
            ],
        };

        let program = PolyProgram::from_trace(&trace).unwrap();
        assert_eq!(program.operations.len(), 1);
        assert_eq!(program.operations[0].name, "add");
        assert_eq!(program.operations[0].rns_terms, 2);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let trace = Trace {
            scheme: Scheme::Bgv,
            n: 16,
            key_rns_num: 2,
            q_size: 1,
            dnum: 1,
            alpha: 1,
            instructions: vec![Instruction {
                op: "frobnicate".to_owned(),
                srcs: vec![Arg {
                    symbol_name: "a".into(),
                    num_rns: 1,
                    order: 2,
                }],
                ..Default::default()
            }],
        };
        assert!(matches!(
            PolyProgram::from_trace(&trace),
            Err(TraceError::UnknownOperation(op)) if op == "frobnicate"
        ));
    }
}
