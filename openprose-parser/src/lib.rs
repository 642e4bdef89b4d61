//! Lexer, token/span types, AST, and recursive-descent parser for the
//! OpenProse DSL.
//!
//! This crate is the foundation of the pipeline: source text in, a typed
//! [`ast::Program`] out, with every phase accumulating its own diagnostics
//! rather than throwing. Downstream crates (`openprose-analysis`,
//! `openprose-printer`, `openprose-semantic-tokens`, `openprose-telemetry`)
//! only ever read the types defined here.

pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;
pub mod visit;

pub use ast::{Expr, Program, Statement};
pub use diagnostic::Severity;
pub use lexer::{tokenize, LexError, LexOptions, LexResult};
pub use parser::{parse, ParseError, ParseResult};
pub use span::{Position, Span};
pub use token::{Token, TokenKind};

/// Convenience entry point: lex then parse, merging both diagnostic lists
/// in pipeline order (lexer errors precede parser errors, per spec.md §5).
pub fn parse_source(source: &str, lex_opts: &LexOptions) -> (Program, Vec<SourceError>) {
    let lexed = tokenize(source, lex_opts);
    let parsed = parser::parse(lexed.tokens);

    let mut errors: Vec<SourceError> = lexed
        .errors
        .into_iter()
        .map(|e| SourceError {
            message: e.message,
            span: e.span,
            severity: e.severity,
            phase: Phase::Lexer,
        })
        .collect();
    errors.extend(parsed.errors.into_iter().map(|e| SourceError {
        message: e.message,
        span: e.span,
        severity: Severity::Error,
        phase: Phase::Parser,
    }));
    errors.sort_by_key(|e| e.span.start.offset);

    (parsed.program, errors)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    Lexer,
    Parser,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceError {
    pub message: String,
    pub span: Span,
    pub severity: Severity,
    pub phase: Phase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_source_reports_zero_errors_for_hello_world() {
        let (program, errors) = parse_source(r#"session "Hello""#, &LexOptions::default());
        assert!(errors.is_empty());
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn program_round_trips_through_json() {
        let (program, _) = parse_source(r#"session "Hello""#, &LexOptions::default());
        let json = serde_json::to_string(&program).expect("program should serialize");
        let restored: Program = serde_json::from_str(&json).expect("program should deserialize");
        assert_eq!(program, restored);
    }
}
