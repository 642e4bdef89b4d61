//! End-to-end scenarios exercising the whole pipeline through the facade,
//! mirroring the root `lex` crate's top-level integration tests
//! (`reference_parser.rs`, `txxtv_integration.rs`) which drive the
//! reassembled crate rather than any one module in isolation.

use openprose::{compile, parse, validate, PrinterOptions};

#[test]
fn do_block_escape_versus_shadow() {
    let source = "let x = session \"outer\"\ndo:\n  let y = session \"escapes\"\n  let x = session \"shadows\"\nsession \"use\"\n  context: [y]\n";
    let parsed = parse(source);
    assert!(parsed.errors.is_empty());
    let result = validate(&parsed.program);
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, "shadowed-binding");
}

#[test]
fn retry_zero_is_an_error() {
    let parsed = parse("session \"x\"\n  retry: 0\n");
    let result = validate(&parsed.program);
    assert!(!result.valid);
    assert!(result.errors.iter().any(|d| d.code == "invalid-retry"));
}

#[test]
fn retry_fifteen_warns_but_is_valid() {
    let parsed = parse("session \"x\"\n  retry: 15\n");
    let result = validate(&parsed.program);
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
    assert!(result.warnings.iter().any(|d| d.code == "high-retry"));
}

#[test]
fn unrecognized_backoff_value_is_an_error() {
    let parsed = parse("session \"x\"\n  retry: 3\n  backoff: \"weird\"\n");
    let result = validate(&parsed.program);
    assert!(!result.valid);
    assert!(result.errors.iter().any(|d| d.code == "invalid-backoff"));
}

#[test]
fn round_trip_preserves_structural_equality() {
    let source = "agent reviewer:\n  model: sonnet\n  prompt: \"Review the diff\"\n\nsession: reviewer\n  retry: 2\n";
    let first = parse(source);
    assert!(first.errors.is_empty());
    assert!(validate(&first.program).valid);

    let compiled = compile(&first.program, &PrinterOptions::default());
    let second = parse(&compiled.code);
    assert!(second.errors.is_empty(), "re-parse errors: {:?}", second.errors);
    assert_eq!(first.program.statements, second.program.statements);
}

#[test]
fn diagnostics_are_deterministic_across_runs() {
    let source = "session \"x\"\nimport \"s\" from \"github:o/r\"\n";
    let run_one = validate(&parse(source).program);
    let run_two = validate(&parse(source).program);
    assert_eq!(run_one.errors.len(), run_two.errors.len());
    for (a, b) in run_one.errors.iter().zip(run_two.errors.iter()) {
        assert_eq!(a.code, b.code);
        assert_eq!(a.span, b.span);
    }
}
