//! Public entry points for the OpenProse DSL frontend.
//!
//! Five plain functions, one per spec.md §6 operation, each delegating to
//! its sub-crate. Mirrors the root `lex` crate's `src/lib.rs`, which
//! re-exports its own pipeline as a single public surface rather than
//! spreading it across crate boundaries the caller has to know about.

use serde::{Deserialize, Serialize};

pub use openprose_analysis::{validate, Diagnostic, Severity, ValidationResult};
pub use openprose_parser::ast::{CommentNode, Program};
pub use openprose_parser::{parse as parse_tokens, tokenize as lex, LexError, LexOptions, ParseError, Token};
pub use openprose_printer::{print_program, PrinterOptions};
pub use openprose_semantic_tokens::{collect_semantic_tokens, encode_delta, EncodedToken, SemanticToken, SemanticTokenKind};
pub use openprose_telemetry::{count_nodes, NodeCounts};

/// Result of [`tokenize`]: the complete token stream plus any lexical errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Result of [`parse`]: the parsed program plus any syntax errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

/// Result of [`compile`]: normalized source text plus the comments the
/// printer stripped out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub code: String,
    pub stripped_comments: Vec<CommentNode>,
}

/// Result of [`semantic_tokens`]: both the raw and delta-encoded forms,
/// since callers want one or the other depending on whether they're
/// diffing against a previous response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticTokensResult {
    pub tokens: Vec<SemanticToken>,
    pub encoded: Vec<EncodedToken>,
}

/// Lex `source` into a token stream. Never panics; malformed input yields
/// tokens for everything it could recover plus an accumulated error list.
pub fn tokenize(source: &str, opts: Option<&LexOptions>) -> TokenizeResult {
    let default_opts = LexOptions::default();
    let result = lex(source, opts.unwrap_or(&default_opts));
    TokenizeResult { tokens: result.tokens, errors: result.errors }
}

/// Lex then parse `source` into a [`Program`]. Combines both phases'
/// diagnostics the way a caller who only wants the final AST expects.
pub fn parse(source: &str) -> ParseOutcome {
    let lexed = lex(source, &LexOptions::default());
    let parsed = parse_tokens(lexed.tokens);
    ParseOutcome { program: parsed.program, errors: parsed.errors }
}

/// Re-serialize `program` to canonical source text.
pub fn compile(program: &Program, opts: &PrinterOptions) -> CompileResult {
    let result = print_program(program, opts);
    CompileResult { code: result.code, stripped_comments: result.stripped_comments }
}

/// Lex `source` and classify its token stream for editor highlighting.
pub fn semantic_tokens(source: &str) -> SemanticTokensResult {
    let lexed = lex(source, &LexOptions::default());
    let tokens = collect_semantic_tokens(&lexed.tokens);
    let encoded = encode_delta(&tokens);
    SemanticTokensResult { tokens, encoded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("session \"Hello\"", true)]
    #[case("session \"x\"\nimport \"s\" from \"github:o/r\"\n", false)]
    #[case("agent a:\n  prompt: \"hi\"\nagent a:\n  model: sonnet\n  prompt: \"hi\"\n", false)]
    #[case("let x = 1\nconst x = 2\n", false)]
    fn validity_matches_expectation_across_scenarios(#[case] source: &str, #[case] expect_valid: bool) {
        let parsed = parse(source);
        let result = validate(&parsed.program);
        assert_eq!(result.valid, expect_valid, "diagnostics: {:?}", result.errors);
    }

    #[test]
    fn hello_world_round_trips_with_no_diagnostics() {
        let source = r#"session "Hello""#;
        let parsed = parse(source);
        assert!(parsed.errors.is_empty());
        let result = validate(&parsed.program);
        assert!(result.valid, "unexpected errors: {:?}", result.errors);

        let compiled = compile(&parsed.program, &PrinterOptions::default());
        assert_eq!(compiled.code.trim(), source);
    }

    #[test]
    fn import_after_other_statements_is_reported() {
        let source = "session \"x\"\nimport \"s\" from \"github:o/r\"\n";
        let parsed = parse(source);
        let result = validate(&parsed.program);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "import-order"));
    }

    #[test]
    fn interpolation_resolves_against_a_prior_let_binding() {
        let ok = parse("let topic = session \"t\"\nsession \"about {topic}\"\n");
        assert!(validate(&ok.program).valid);

        let bad = parse("session \"about {topic}\"\n");
        let result = validate(&bad.program);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "undefined-interpolation-variable"));
    }

    #[test]
    fn parallel_named_results_escape_to_the_enclosing_scope() {
        let source = "parallel:\n  a = session \"A\"\n  b = session \"B\"\nsession \"combine\"\n  context: { a, b }\n";
        let parsed = parse(source);
        let result = validate(&parsed.program);
        assert!(result.valid, "unexpected errors: {:?}", result.errors);
    }

    #[test]
    fn compile_is_idempotent_on_an_already_canonical_program() {
        let source = "agent reviewer:\n  model: sonnet\n  prompt: \"Review the diff\"\n\nsession: reviewer\n";
        let first = parse(source);
        assert!(first.errors.is_empty());
        let compiled_once = compile(&first.program, &PrinterOptions::default());

        let second = parse(&compiled_once.code);
        assert!(second.errors.is_empty());
        let compiled_twice = compile(&second.program, &PrinterOptions::default());

        assert_eq!(compiled_once.code, compiled_twice.code);
    }

    #[test]
    fn semantic_tokens_cover_keywords_and_strings() {
        let result = semantic_tokens(r#"session "Hello""#);
        assert!(result.tokens.iter().any(|t| t.kind == SemanticTokenKind::Keyword));
        assert!(result.tokens.iter().any(|t| t.kind == SemanticTokenKind::String));
        assert_eq!(result.tokens.len(), result.encoded.len());
    }

    #[test]
    fn node_counts_reflect_top_level_statements() {
        let parsed = parse("session \"a\"\nsession \"b\"\n");
        let counts = count_nodes(&parsed.program);
        assert_eq!(counts.sessions, 2);
    }

    #[test]
    fn compile_result_round_trips_through_json() {
        let parsed = parse(r#"session "Hello""#);
        let compiled = compile(&parsed.program, &PrinterOptions::default());
        let json = serde_json::to_string(&compiled).expect("result should serialize");
        let restored: CompileResult = serde_json::from_str(&json).expect("result should deserialize");
        assert_eq!(restored.code, compiled.code);
    }
}
