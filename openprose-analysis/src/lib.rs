//! Semantic validation for the OpenProse DSL: scope-aware cross-reference
//! resolution and per-construct rule enforcement over a parsed
//! [`openprose_parser::ast::Program`].
//!
//! The public surface is a single entry point, [`validate`], returning a
//! [`ValidationResult`] that splits diagnostics into `errors` (block
//! `compile`/execution) and `warnings` (informational). Internally this is
//! a two-pass design — see `validator` module docs.

pub mod diagnostic;
pub mod scope;
pub mod validator;

pub use diagnostic::Diagnostic;
pub use openprose_parser::Severity;
pub use scope::{Binding, DefineOutcome, ScopeKind, ScopeStack};
pub use validator::{validate, ValidationResult};

#[cfg(test)]
mod tests {
    use super::*;
    use openprose_parser::{parse, tokenize, LexOptions};

    fn validate_source(src: &str) -> ValidationResult {
        let lexed = tokenize(src, &LexOptions::default());
        let parsed = parse(lexed.tokens);
        validate(&parsed.program)
    }

    #[test]
    fn minimal_session_is_valid() {
        let result = validate_source(r#"session "Summarize this document""#);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn agent_without_model_is_an_error() {
        let result = validate_source(
            r#"
agent reviewer:
  prompt: "Review the diff"
"#,
        );
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "missing-model"));
    }

    #[test]
    fn agent_prompt_interpolation_is_resolved_like_a_session_prompt() {
        let result = validate_source(
            r#"
agent reviewer:
  model: sonnet
  prompt: "Hello {undefined}"
"#,
        );
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "undefined-interpolation-variable"));
    }

    #[test]
    fn session_referencing_undeclared_agent_is_an_error() {
        let result = validate_source(r#"session review: reviewer"#);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "undefined-agent"));
    }

    #[test]
    fn agent_and_block_sharing_a_name_collide() {
        let result = validate_source(
            r#"
agent helper:
  model: sonnet
  prompt: "Help"

block helper():
  session "Help"
"#,
        );
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "namespace-collision"));
    }

    #[test]
    fn parallel_named_results_escape_to_enclosing_scope() {
        let result = validate_source(
            r#"
agent worker:
  model: sonnet
  prompt: "Work"

parallel:
  a = session x: worker
  b = session y: worker

session "{a} and {b}"
"#,
        );
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn binding_from_a_loop_body_does_not_escape() {
        let result = validate_source(
            r#"
loop until **three attempts have been made**:
  let plan = "expand"

session "{plan}"
"#,
        );
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "undefined-interpolation-variable"));
    }

    #[test]
    fn unbounded_loop_without_max_warns() {
        let result = validate_source(
            r#"
loop:
  session "poll"
"#,
        );
        assert!(result.valid);
        assert!(result.warnings.iter().any(|d| d.code == "unbounded-loop"));
    }

    #[test]
    fn try_without_catch_or_finally_is_already_a_parse_error() {
        // The parser itself rejects this shape, so validation never runs
        // against a `TryBlock` lacking both `catch` and `finally`.
        let lexed = tokenize(
            r#"
try:
  session "risky"
"#,
            &LexOptions::default(),
        );
        let parsed = parse(lexed.tokens);
        assert!(!parsed.errors.is_empty());
    }

    #[test]
    fn anonymous_do_block_defines_in_enclosing_scope() {
        let result = validate_source(
            r#"
do:
  let total = 0

session "{total}"
"#,
        );
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn import_after_other_statements_is_an_error() {
        let result = validate_source(
            r#"
session "Hello"
import "search" from "github:acme/search"
"#,
        );
        assert!(!result.valid);
        assert!(result.errors.iter().any(|d| d.code == "import-order"));
    }

    #[test]
    fn validation_result_round_trips_through_json() {
        let result = validate_source(r#"session "Hello""#);
        let json = serde_json::to_string(&result).expect("result should serialize");
        let restored: ValidationResult = serde_json::from_str(&json).expect("result should deserialize");
        assert_eq!(restored.valid, result.valid);
        assert_eq!(restored.errors.len(), result.errors.len());
    }
}
