use pisa_trace::csv::{parse_csv, write_csv};
use pisa_trace::wire::Trace;
use pisa_trace::PolyProgram;

const SAMPLE: &str = "scheme,poly_modulus_degree,rns_terms,cipher_degree,instruction,arg0,arg1,arg2,arg3,arg4,arg5,arg6,arg7,arg8,arg9\n\
    add,CKKS,16384,4,s0-2-3,x-2-3,x-2-3\n\
    mul,CKKS,16384,4,s1-3-3,s0-2-3,x-2-3\n\
    relin,CKKS,16384,4,s2-2-3,s1-3-3,1,3,3\n\
    rescale,CKKS,16384,4,s3-2-2,s2-2-3,3\n\
    mod_switch,CKKS,16384,4,s4-2-1,s3-2-2\n";

#[test]
fn csv_to_binary_and_back_preserves_the_program() {
    let program = parse_csv(SAMPLE.as_bytes(), true).unwrap();
    assert_eq!(program.operations.len(), 5);
    assert_eq!(program.operations[4].name, "mod");

    let trace = program.to_trace().unwrap();
    assert_eq!(trace.n, 16384);
    assert_eq!(trace.instructions.len(), 5);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.bin");
    trace.store(&path).unwrap();
    let loaded = Trace::load(&path).unwrap();
    assert_eq!(loaded, trace);

    let back = PolyProgram::from_trace(&loaded).unwrap();
    assert_eq!(back, program);
}

#[test]
fn binary_program_exports_to_parseable_csv() {
    let program = parse_csv(SAMPLE.as_bytes(), true).unwrap();
    let trace = program.to_trace().unwrap();
    let restored = PolyProgram::from_trace(&trace).unwrap();

    let mut text = Vec::new();
    write_csv(&mut text, &restored).unwrap();
    let reparsed = parse_csv(text.as_slice(), true).unwrap();
    assert_eq!(reparsed, restored);
}
