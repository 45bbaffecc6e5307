use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::descriptors::{descriptor, ParamKind};
use crate::error::TraceError;
use crate::program::PolyProgram;

const HEADER: &str =
    "scheme,poly_modulus_degree,rns_terms,cipher_degree,instruction,arg0,arg1,arg2,arg3,arg4,arg5,arg6,arg7,arg8,arg9";

/// Parses a CSV polynomial program: a header line followed by one
/// descriptor-ordered row per operation.
pub fn parse_csv<R: Read>(reader: R, ignore_header: bool) -> Result<PolyProgram, TraceError> {
    let mut program = PolyProgram::default();
    let mut lines = BufReader::new(reader).lines();
    if ignore_header {
        lines.next().transpose()?;
    }

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields: Vec<String> = line.split(',').map(|f| f.trim().to_owned()).collect();
        if line.trim_end().ends_with(',') {
            fields.pop();
        }
        program.parse_row(&fields)?;
    }
    Ok(program)
}

pub fn parse_csv_file(path: &Path) -> Result<PolyProgram, TraceError> {
    parse_csv(File::open(path)?, true)
}

/// Writes a program back out in row form, one descriptor-ordered line per
/// operation. Operands are written as `name-order-rns` so the output
/// reparses.
pub fn write_csv<W: Write>(writer: &mut W, program: &PolyProgram) -> Result<(), TraceError> {
    writeln!(writer, "{HEADER}")?;
    for op in &program.operations {
        let desc =
            descriptor(&op.name).ok_or_else(|| TraceError::UnknownOperation(op.name.clone()))?;

        let mut fields = Vec::with_capacity(desc.params.len());
        let mut next_input = 0;
        let mut next_output = 0;
        for kind in desc.params {
            let field = match kind {
                ParamKind::OpName => op.name.clone(),
                ParamKind::FheScheme => program.scheme.as_upper().to_owned(),
                ParamKind::PolymodDegLog2 => program.poly_modulus_degree.to_string(),
                ParamKind::KeyRns => program.key_rns.to_string(),
                ParamKind::Alpha => program.alpha.to_string(),
                ParamKind::QSize => program.q_size.to_string(),
                ParamKind::Dnum => program.dnum.to_string(),
                ParamKind::CipherDegree => op.cipher_degree.to_string(),
                ParamKind::RnsTerm => op.rns_terms.to_string(),
                ParamKind::GaloisElt => op.galois_elt.to_string(),
                ParamKind::Factor => op.factor.to_string(),
                ParamKind::OutputArgument | ParamKind::InputOutputArgument => {
                    let operand = op.outputs.get(next_output).ok_or_else(|| {
                        TraceError::MissingArgument(op.name.clone(), "output operand")
                    })?;
                    next_output += 1;
                    if matches!(kind, ParamKind::InputOutputArgument) {
                        next_input += 1;
                    }
                    operand.to_arg_string()
                }
                ParamKind::InputArgument => {
                    let operand = op.inputs.get(next_input).ok_or_else(|| {
                        TraceError::MissingArgument(op.name.clone(), "input operand")
                    })?;
                    next_input += 1;
                    operand.to_arg_string()
                }
            };
            fields.push(field);
        }
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

pub fn write_csv_file(path: &Path, program: &PolyProgram) -> Result<(), TraceError> {
    let mut file = File::create(path)?;
    write_csv(&mut file, program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pisa_data::context::Scheme;

    const SAMPLE: &str = "scheme,poly_modulus_degree,rns_terms,cipher_degree,instruction,arg0,arg1,arg2,arg3,arg4,arg5,arg6,arg7,arg8,arg9\n\
        add,BGV,8192,4,out-2-3,a-2-3,b-2-3\n\
        rotate,BGV,8192,4,rot-2-3,out-2-3,3,1,3,4\n";

    #[test]
    fn parse_sample_program() {
        let program = parse_csv(SAMPLE.as_bytes(), true).unwrap();
        assert_eq!(program.scheme, Scheme::Bgv);
        assert_eq!(program.poly_modulus_degree, 8192);
        assert_eq!(program.key_rns, 4);
        assert_eq!(program.operations.len(), 2);

        let add = &program.operations[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.outputs[0].name, "out");
        assert_eq!(add.inputs.len(), 2);
        assert_eq!(add.rns_terms, 3);
        assert_eq!(add.cipher_degree, 2);

        let rotate = &program.operations[1];
        assert_eq!(rotate.galois_elt, 3);
        assert_eq!(program.alpha, 1);
        assert_eq!(program.q_size, 3);
        assert_eq!(program.dnum, 4);
    }

    #[test]
    fn unknown_op_is_a_parse_error() {
        let text = format!("{HEADER}\nwarp,BGV,8192,4,out-2-3,a-2-3\n");
        assert!(matches!(
            parse_csv(text.as_bytes(), true),
            Err(TraceError::UnknownOperation(op)) if op == "warp"
        ));
    }

    #[test]
    fn too_many_arguments_is_a_parse_error() {
        let text = format!("{HEADER}\nadd,BGV,8192,4,out-2-3,a-2-3,b-2-3,extra\n");
        assert!(matches!(
            parse_csv(text.as_bytes(), true),
            Err(TraceError::TooManyArguments { .. })
        ));
    }

    #[test]
    fn write_then_parse_round_trip() {
        let program = parse_csv(SAMPLE.as_bytes(), true).unwrap();
        let mut text = Vec::new();
        write_csv(&mut text, &program).unwrap();
        let reparsed = parse_csv(text.as_slice(), true).unwrap();
        assert_eq!(reparsed, program);
    }
}
