//! Validator diagnostics.
//!
//! Shape mirrors `lex-parser/src/lex/ast/diagnostics.rs`'s
//! `Diagnostic`/`DiagnosticSeverity` pair: a builder-constructed struct
//! carrying a stable `code` alongside the free-text message, so callers can
//! match on diagnostic kind without string-matching the message.

use serde::{Deserialize, Serialize};

pub use openprose_parser::Severity;
use openprose_parser::Span;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            span,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            span,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}
