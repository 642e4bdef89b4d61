//! Token kinds, the keyword table, and string/escape metadata.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::span::Span;

/// The closed set of reserved words recognized at identifier-scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Keyword {
    Import,
    From,
    Agent,
    Session,
    Model,
    Prompt,
    Skills,
    Permissions,
    Block,
    Do,
    Parallel,
    Choice,
    Option,
    Let,
    Const,
    Context,
    Retry,
    Backoff,
    Loop,
    Until,
    While,
    Repeat,
    For,
    In,
    As,
    If,
    Elif,
    Else,
    Try,
    Catch,
    Finally,
    Throw,
    Map,
    Filter,
    Reduce,
    Pmap,
}

static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    use Keyword::*;
    HashMap::from([
        ("import", Import),
        ("from", From),
        ("agent", Agent),
        ("session", Session),
        ("model", Model),
        ("prompt", Prompt),
        ("skills", Skills),
        ("permissions", Permissions),
        ("block", Block),
        ("do", Do),
        ("parallel", Parallel),
        ("choice", Choice),
        ("option", Option),
        ("let", Let),
        ("const", Const),
        ("context", Context),
        ("retry", Retry),
        ("backoff", Backoff),
        ("loop", Loop),
        ("until", Until),
        ("while", While),
        ("repeat", Repeat),
        ("for", For),
        ("in", In),
        ("as", As),
        ("if", If),
        ("elif", Elif),
        ("else", Else),
        ("try", Try),
        ("catch", Catch),
        ("finally", Finally),
        ("throw", Throw),
        ("map", Map),
        ("filter", Filter),
        ("reduce", Reduce),
        ("pmap", Pmap),
    ])
});

/// Resolve an identifier lexeme against the keyword table.
pub fn lookup_keyword(ident: &str) -> std::option::Option<Keyword> {
    KEYWORDS.get(ident).copied()
}

/// The kind of an individual escape sequence found inside a string body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscapeKind {
    Standard,
    Unicode,
    Invalid,
}

/// A single decoded (or rejected) escape sequence within a string literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeSequence {
    pub kind: EscapeKind,
    pub lexeme: String,
    pub resolved: String,
    pub span: Span,
}

/// A `{name}` interpolation placeholder found in a decoded string body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    pub var_name: String,
    pub span: Span,
}

/// Metadata attached to string tokens and `StringLiteral` AST nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringMetadata {
    pub raw: String,
    pub is_triple_quoted: bool,
    pub escape_sequences: Vec<EscapeSequence>,
    pub interpolations: Vec<Interpolation>,
}

/// The decoded token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(String),
    Number(f64),
    String {
        value: String,
        metadata: StringMetadata,
    },
    /// `**...**` (inline) or `***...***` (multiline) natural-language span.
    Discretion { text: String, multiline: bool },
    Comment { text: String, inline: bool },

    // Punctuation
    Colon,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Arrow,  // ->
    Pipe,   // |
    Equals, // =

    // Structural
    Indent,
    Dedent,
    Newline,
    Eof,
}

impl TokenKind {
    /// Whether this token kind carries no semantic-token category
    /// (spec.md §4.5: structural tokens yield no semantic token).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TokenKind::Indent | TokenKind::Dedent | TokenKind::Newline | TokenKind::Eof
        )
    }
}

/// A single lexed token: its kind, literal source text, and span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("import", Some(Keyword::Import))]
    #[case("session", Some(Keyword::Session))]
    #[case("pmap", Some(Keyword::Pmap))]
    #[case("not-a-keyword", None)]
    #[case("Import", None)] // keywords are case-sensitive
    fn resolves_keywords(#[case] ident: &str, #[case] expected: std::option::Option<Keyword>) {
        assert_eq!(lookup_keyword(ident), expected);
    }

    #[test]
    fn structural_tokens_carry_no_semantic_category() {
        assert!(TokenKind::Indent.is_structural());
        assert!(TokenKind::Eof.is_structural());
        assert!(!TokenKind::Comma.is_structural());
    }
}
