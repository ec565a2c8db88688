//! Whole-program tests: compile real sources and execute them on the VM.
use pl0::{
    error::Pl0Error,
    io::MemoryIo,
    pcode::{Instruction, OpCode},
    vm::{Pl0Conf, Pl0Vm},
};
use pl0_compiler::compile;

/// Compile, asserting the program is error-free.
fn compile_ok(source: &str) -> Vec<Instruction> {
    let result = compile(source);
    assert!(
        !result.has_errors(),
        "unexpected compile errors: {:#?}",
        result.diagnostics
    );
    result.code.expect("error-free compile must produce code")
}

/// Compile and run with the given inputs, returning everything written.
fn run(source: &str, inputs: &[i64]) -> Vec<i64> {
    let code = compile_ok(source);
    let mut vm = Pl0Vm::new(code, MemoryIo::with_inputs(inputs.iter().copied()));
    vm.run().expect("program must run to completion");
    vm.into_io().outputs().to_vec()
}

const GCD: &str = "program gcd;\n\
                   var x, y, z;\n\
                   procedure g;\n\
                   var f, g;\n\
                   begin\n\
                     f := x; g := y;\n\
                     while f <> g do\n\
                     begin\n\
                       if f < g then g := g - f;\n\
                       if g < f then f := f - g\n\
                     end;\n\
                     z := f\n\
                   end;\n\
                   begin x := 84; y := 36; call g; write(z) end.";

const FACTORIAL: &str = "var f;\n\
                         procedure fac(n);\n\
                         begin\n\
                           if n = 0 then f := 1\n\
                           else begin call fac(n - 1); f := n * f end\n\
                         end;\n\
                         begin call fac(5); write(f) end.";

const NESTED_ACCESS: &str = "var a;\n\
                             procedure p;\n\
                               procedure q;\n\
                               begin a := a + 1 end;\n\
                             begin call q end;\n\
                             begin a := 0; call p; write(a) end.";

#[test]
fn test_gcd_iterative() {
    assert_eq!(run(GCD, &[]), vec![12]);
}

#[test]
fn test_factorial_recursive() {
    assert_eq!(run(FACTORIAL, &[]), vec![120]);
}

#[test]
fn test_nested_scope_nonlocal_access() {
    // Verifies the static-link walk at level difference 2.
    assert_eq!(run(NESTED_ACCESS, &[]), vec![1]);
}

#[test]
fn test_folded_zero_divisor_blocks_codegen() {
    let result = compile("var a;\nbegin a := 10 / (5 - 5); write(a) end.");
    assert!(result.has_errors());
    assert!(result.code.is_none());
    let error = result
        .diagnostics
        .iter()
        .find(|d| d.is_error())
        .expect("an error must be raised");
    assert_eq!(error.line, 2);
    assert_eq!(
        error.to_string(),
        "[Semantic Error] Line 2: division by zero"
    );
}

#[test]
fn test_undeclared_identifier_suggestion() {
    let result = compile("var counter;\nbegin countr := 1 end.");
    assert!(result.has_errors());
    assert!(result.diagnostics.iter().any(|d| d.to_string()
        == "[Semantic Error] Line 2: Undeclared identifier 'countr'. Did you mean 'counter'?"));
}

#[test]
fn test_panic_recovery_reports_both_errors() {
    // Two successive syntax errors in separate statements: both are
    // reported, compilation is blocked, nothing crashes.
    let result = compile(
        "var x;\n\
         begin\n\
           x := ;\n\
           x + 3;\n\
           x := 1\n\
         end.",
    );
    let error_lines: Vec<u32> = result
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.line)
        .collect();
    assert!(error_lines.contains(&3), "got {:?}", result.diagnostics);
    assert!(error_lines.contains(&4), "got {:?}", result.diagnostics);
    assert!(result.code.is_none());
}

#[test]
fn test_recursion_depth_32() {
    let source = "var hits;\n\
                  procedure down(k);\n\
                  begin\n\
                    hits := hits + 1;\n\
                    if k > 0 then call down(k - 1)\n\
                  end;\n\
                  begin hits := 0; call down(32); write(hits) end.";
    assert_eq!(run(source, &[]), vec![33]);
}

#[test]
fn test_division_truncates_toward_zero_at_runtime() {
    // Values arrive through `read` so nothing folds away.
    let source = "var a, b;\nbegin read(a, b); write(a / b) end.";
    assert_eq!(run(source, &[-7, 2]), vec![-3]);
    assert_eq!(run(source, &[7, -2]), vec![-3]);
    assert_eq!(run(source, &[-7, -2]), vec![3]);
}

#[test]
fn test_constant_folding_preserves_semantics() {
    // The same arithmetic once over constants (folded at compile time)
    // and once over variables fed by `read` (evaluated by the VM).
    let folded = "const a = 17, b = 5;\n\
                  begin write((a * b - 7) / (b - 2) + (0 - a), -a / 2) end.";
    let unfolded = "var a, b;\n\
                    begin read(a, b); write((a * b - 7) / (b - 2) + (0 - a), -a / 2) end.";
    assert_eq!(run(folded, &[]), run(unfolded, &[17, 5]));
}

#[test]
fn test_runtime_division_by_zero() {
    let code = compile_ok("var a;\nbegin read(a); write(1 / a) end.");
    let mut vm = Pl0Vm::new(code, MemoryIo::with_inputs([0]));
    match vm.run() {
        Err(Pl0Error::Runtime { cause, .. }) => assert_eq!(cause, "division by zero"),
        other => panic!("expected a runtime fault, got {:?}", other),
    }
}

#[test]
fn test_exhausted_input_is_a_runtime_error() {
    let code = compile_ok("var a;\nbegin read(a) end.");
    let mut vm = Pl0Vm::new(code, MemoryIo::new());
    assert!(matches!(vm.run(), Err(Pl0Error::Runtime { .. })));
}

#[test]
fn test_deep_recursion_overflows_the_stack() {
    let source = "procedure down(k);\n\
                  begin call down(k + 1) end;\n\
                  begin call down(0) end.";
    let code = compile_ok(source);
    let mut vm = Pl0Vm::with_conf(code, MemoryIo::new(), Pl0Conf { stack_limit: 256 });
    match vm.run() {
        Err(Pl0Error::Runtime { cause, .. }) => assert_eq!(cause, "stack overflow"),
        other => panic!("expected a runtime fault, got {:?}", other),
    }
}

#[test]
fn test_read_write_round_trip() {
    let source = "var a, b;\nbegin read(a, b); write(a + b, a - b) end.";
    assert_eq!(run(source, &[10, 4]), vec![14, 6]);
}

#[test]
fn test_keywords_are_case_insensitive_end_to_end() {
    let source = "VAR x;\nBEGIN x := 2; WHILE x > 0 DO x := x - 1; Write(x) END.";
    assert_eq!(run(source, &[]), vec![0]);
}

#[test]
fn test_else_branch_execution() {
    let source = "var x;\n\
                  begin\n\
                    read(x);\n\
                    if odd x then write(1) else write(2)\n\
                  end.";
    assert_eq!(run(source, &[7]), vec![1]);
    assert_eq!(run(source, &[8]), vec![2]);
}

#[test]
fn test_warnings_do_not_block_execution() {
    let source = "var x, unused;\nbegin x := 0; if 1 = 2 then x := 1; write(x) end.";
    let result = compile(source);
    assert!(!result.has_errors());
    assert!(result.diagnostics.iter().any(|d| !d.is_error()));
    assert_eq!(run(source, &[]), vec![0]);
}

// ----------------------------------------------------------------------------
// Generated-code invariants

/// Every program the compiler accepts obeys the frame discipline: memory
/// instructions never touch the SL/DL/RA header, levels are non-negative
/// (the `-1` staging store excepted), and every control transfer lands
/// inside the program.
fn assert_code_invariants(code: &[Instruction]) {
    assert!(!code.is_empty());

    for (addr, instr) in code.iter().enumerate() {
        match instr.op {
            OpCode::Lod | OpCode::Red => {
                assert!(instr.l >= 0, "{}: {}", addr, instr);
                assert!(instr.a >= 3, "{}: {}", addr, instr);
            }
            OpCode::Sto => {
                assert!(instr.l >= -1, "{}: {}", addr, instr);
                assert!(instr.a >= 3, "{}: {}", addr, instr);
            }
            OpCode::Jmp | OpCode::Jpc => {
                let target = instr.a as usize;
                assert!(target < code.len(), "{}: {}", addr, instr);
            }
            OpCode::Cal => {
                assert!(instr.l >= 0, "{}: {}", addr, instr);
                let target = instr.a as usize;
                assert!(target < code.len(), "{}: {}", addr, instr);
                assert_eq!(code[target].op, OpCode::Int, "{}: {}", addr, instr);
            }
            _ => {}
        }
    }
}

#[test]
fn test_emitted_code_invariants() {
    for source in [
        GCD,
        FACTORIAL,
        NESTED_ACCESS,
        "begin write(1) end.",
        "var a, b;\nbegin read(a, b); while a < b do a := a + 1; write(a) end.",
    ] {
        assert_code_invariants(&compile_ok(source));
    }
}
