//! Final artifact emission: the P-ISA CSV and the `.tw.mem` memory manifest.
//!
//! Both files are written to a temporary and renamed into place, so error
//! paths never publish partial output.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::error::MapperError;
use crate::isa::PisaInstruction;

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), MapperError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Writes the instruction stream, one P-ISA line per instruction.
pub fn write_instructions(
    path: &Path,
    instructions: &[PisaInstruction],
    emit_banks: bool,
) -> Result<(), MapperError> {
    let mut contents = Vec::new();
    for instruction in instructions {
        let mut line = instruction.clone();
        line.output_bank = emit_banks;
        writeln!(contents, "{line}")?;
    }
    write_atomically(path, &contents)
}

/// Builds the memory manifest lines.
///
/// Slot indices increase monotonically: the four transform tables, then
/// eight `twid` and one `ones` line per 64-residual group, then one
/// `dload, poly` per unique program input and one `dstore` per output.
pub fn generate_mem_manifest(inputs: &[String], outputs: &[String], max_rns: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut counter = 0usize;
    let mut slot = |counter: &mut usize| {
        let current = *counter;
        *counter += 1;
        current
    };

    for table in [
        "ntt_auxiliary_table",
        "ntt_routing_table",
        "intt_auxiliary_table",
        "intt_routing_table",
    ] {
        lines.push(format!("dload, {table}, {}", slot(&mut counter)));
    }

    let high_rns_iters = (1 + (max_rns as i64 - 1) / 64).max(1) as usize;
    for _ in 0..8 * high_rns_iters {
        lines.push(format!("dload, twid, {}", slot(&mut counter)));
    }
    for _ in 0..high_rns_iters {
        lines.push(format!("dload, ones, {}", slot(&mut counter)));
    }

    let mut address_map: BTreeMap<&str, usize> = BTreeMap::new();
    for input in inputs {
        let address = *address_map
            .entry(input.as_str())
            .or_insert_with(|| slot(&mut counter));
        lines.push(format!("dload, poly, {address}, {input}"));
    }
    for output in outputs {
        let address = *address_map
            .entry(output.as_str())
            .or_insert_with(|| slot(&mut counter));
        lines.push(format!("dstore, {output}, {address}"));
    }
    lines
}

pub fn write_mem_manifest(path: &Path, lines: &[String]) -> Result<(), MapperError> {
    let mut contents = Vec::new();
    for line in lines {
        writeln!(contents, "{line}")?;
    }
    write_atomically(path, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_manifest_has_only_the_preamble() {
        let lines = generate_mem_manifest(&[], &[], 0);
        assert_eq!(lines.len(), 4 + 8 + 1);
        assert_eq!(lines[0], "dload, ntt_auxiliary_table, 0");
        assert_eq!(lines[3], "dload, intt_routing_table, 3");
        assert_eq!(lines[4], "dload, twid, 4");
        assert_eq!(lines[12], "dload, ones, 12");
    }

    #[test]
    fn slots_increase_and_are_never_reused() {
        let inputs = vec!["a_0_0".to_owned(), "b_0_0".to_owned()];
        let outputs = vec!["out_0_0".to_owned()];
        let lines = generate_mem_manifest(&inputs, &outputs, 3);

        assert_eq!(lines[13], "dload, poly, 13, a_0_0");
        assert_eq!(lines[14], "dload, poly, 14, b_0_0");
        assert_eq!(lines[15], "dstore, out_0_0, 15");
    }

    #[test]
    fn more_than_64_residuals_add_twiddle_groups() {
        let lines = generate_mem_manifest(&[], &[], 65);
        // Two groups: 4 tables + 16 twid + 2 ones.
        assert_eq!(lines.len(), 4 + 16 + 2);
    }

    #[test]
    fn repeated_input_symbols_share_a_slot() {
        let inputs = vec!["a_0_0".to_owned(), "a_0_0".to_owned()];
        let lines = generate_mem_manifest(&inputs, &[], 1);
        assert_eq!(lines[13], "dload, poly, 13, a_0_0");
        assert_eq!(lines[14], "dload, poly, 13, a_0_0");
    }
}
