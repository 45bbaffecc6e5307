use std::path::{Path, PathBuf};

use pisa_mapper::kernel::KernelProtocol;
use pisa_mapper::{MapperOptions, Opcode, ProgramMapper};
use pisa_trace::csv::parse_csv;
use pisa_trace::PolyProgram;

/// A stand-in generator: answers the stdin protocol with canned kernels.
fn write_fake_kerngen(dir: &Path) -> PathBuf {
    let path = dir.join("kerngen.sh");
    let script = r#"#!/bin/sh
payload=$(cat)
case "$payload" in
  *"MUL "*) cat <<'EOF'
13, muli, t_0_0, input0_0_0, R2_0, 0
13, mul, output0_0_0, t_0_0, input1_0_0, 0
EOF
  ;;
  *) cat <<'EOF'
13, add, output0_0_0, input0_0_0, input1_0_0, 0
EOF
  ;;
esac
"#;
    std::fs::write(&path, script).unwrap();

    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn program(rows: &str) -> PolyProgram {
    let text = format!(
        "scheme,poly_modulus_degree,rns_terms,cipher_degree,instruction,arg0,arg1,arg2,arg3,arg4,arg5,arg6,arg7,arg8,arg9\n{rows}"
    );
    parse_csv(text.as_bytes(), true).unwrap()
}

fn options(dir: &Path, name: &str) -> MapperOptions {
    MapperOptions {
        kerngen_path: write_fake_kerngen(dir),
        out_prefix: dir.join(name),
        cache_dir: dir.join("kernel_cache"),
        protocol: KernelProtocol::Stdin,
        ..Default::default()
    }
}

#[test]
fn duplicate_operands_are_split_with_a_single_copy() {
    let dir = tempfile::tempdir().unwrap();
    let program = program("add,BGV,16,2,out-1-1,a-1-1,a-1-1\n");

    let output = ProgramMapper::new(options(dir.path(), "dup"))
        .run(&program)
        .unwrap();

    assert_eq!(output.instructions.len(), 2);
    let copy = &output.instructions[0];
    let add = &output.instructions[1];
    assert_eq!(copy.opcode, Opcode::Copy);
    assert_eq!(copy.inputs[0].name(), "a_0_0");
    let fresh = copy.outputs[0].name();
    assert_ne!(fresh, "a_0_0");

    assert_eq!(add.opcode, Opcode::Add);
    assert_eq!(add.inputs[0].name(), "a_0_0");
    assert_eq!(add.inputs[1].name(), fresh);
    assert_eq!(add.outputs[0].name(), "out_0_0");
}

#[test]
fn intermediates_are_unified_namespaced_and_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let program = program(
        "add,BGV,16,2,s0-1-1,a-1-1,a-1-1\n\
         mul,BGV,16,2,s1-1-1,s0-1-1,b-1-1\n",
    );

    let output = ProgramMapper::new(options(dir.path(), "chain"))
        .run(&program)
        .unwrap();

    let lines: Vec<String> = output
        .instructions
        .iter()
        .map(|i| i.to_string())
        .collect();
    assert_eq!(
        lines,
        vec![
            "13, copy, uid_0_copyAa_0_0, a_0_0",
            "13, add, uid_1_add0output0_0_0, a_0_0, uid_0_copyAa_0_0, 0",
            "13, muli, uid_2_internal_mul_1_NS_t_0_0, uid_1_add0output0_0_0, R2_0, 0",
            "13, mul, s1_0_0, uid_2_internal_mul_1_NS_t_0_0, b_0_0, 0",
        ]
    );

    assert_eq!(output.program_inputs, vec!["a_0_0", "b_0_0"]);
    assert_eq!(output.program_outputs, vec!["s1_0_0"]);
    assert_eq!(output.max_rns, 1);
}

#[test]
fn emitted_files_are_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let program = program(
        "add,BGV,16,2,s0-1-1,a-1-1,a-1-1\n\
         mul,BGV,16,2,s1-1-1,s0-1-1,b-1-1\n",
    );

    let first = ProgramMapper::new(options(dir.path(), "first"))
        .run(&program)
        .unwrap();
    // The second run hits the populated kernel cache.
    let second = ProgramMapper::new(options(dir.path(), "second"))
        .run(&program)
        .unwrap();

    let first_csv = std::fs::read(&first.instruction_path).unwrap();
    let second_csv = std::fs::read(&second.instruction_path).unwrap();
    assert_eq!(first_csv, second_csv);

    let first_mem = std::fs::read(&first.mem_path).unwrap();
    let second_mem = std::fs::read(&second.mem_path).unwrap();
    assert_eq!(first_mem, second_mem);
}

#[test]
fn memory_manifest_layout() {
    let dir = tempfile::tempdir().unwrap();
    let program = program(
        "add,BGV,16,2,s0-1-1,a-1-1,a-1-1\n\
         mul,BGV,16,2,s1-1-1,s0-1-1,b-1-1\n",
    );

    let output = ProgramMapper::new(options(dir.path(), "mem"))
        .run(&program)
        .unwrap();
    let mem = std::fs::read_to_string(&output.mem_path).unwrap();
    let lines: Vec<&str> = mem.lines().collect();

    assert_eq!(lines[0], "dload, ntt_auxiliary_table, 0");
    assert_eq!(lines[3], "dload, intt_routing_table, 3");
    assert_eq!(lines[4], "dload, twid, 4");
    assert_eq!(lines[12], "dload, ones, 12");
    assert_eq!(lines[13], "dload, poly, 13, a_0_0");
    assert_eq!(lines[14], "dload, poly, 14, b_0_0");
    assert_eq!(lines[15], "dstore, s1_0_0, 15");
    assert_eq!(lines.len(), 16);
}

#[test]
fn empty_program_emits_only_the_preamble() {
    let dir = tempfile::tempdir().unwrap();
    let program = program("");

    let output = ProgramMapper::new(options(dir.path(), "empty"))
        .run(&program)
        .unwrap();

    assert!(output.instructions.is_empty());
    let csv = std::fs::read_to_string(&output.instruction_path).unwrap();
    assert!(csv.is_empty());

    let mem = std::fs::read_to_string(&output.mem_path).unwrap();
    assert_eq!(mem.lines().count(), 13);
}

#[test]
fn corrupt_cache_entries_are_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), "corrupt");
    let program = program("add,BGV,16,2,out-1-1,a-1-1,b-1-1\n");

    std::fs::create_dir_all(&options.cache_dir).unwrap();
    std::fs::write(
        options.cache_dir.join("bgv_add_16_1_1.csv"),
        "not a kernel at all\n",
    )
    .unwrap();

    let output = ProgramMapper::new(options).run(&program).unwrap();
    assert_eq!(output.instructions.len(), 1);
    assert_eq!(output.instructions[0].opcode, Opcode::Add);
}

#[test]
fn shape_mismatches_are_detected_at_graph_construction() {
    let dir = tempfile::tempdir().unwrap();
    // s0 is produced with rns 1 but consumed with rns 2.
    let program = program(
        "add,BGV,16,2,s0-1-1,a-1-1,b-1-1\n\
         add,BGV,16,2,s1-1-2,s0-1-2,c-1-2\n",
    );

    let err = ProgramMapper::new(options(dir.path(), "shape"))
        .run(&program)
        .unwrap_err();
    assert!(matches!(
        err,
        pisa_mapper::MapperError::ShapeMismatch { symbol, .. } if symbol == "s0"
    ));
}
