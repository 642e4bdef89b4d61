//! Editor semantic-highlighting tokens for the OpenProse DSL.
//!
//! `collect_semantic_tokens` and `encode_delta` are the crate's entry
//! points: a pure classification over the lexer's token stream, with no
//! AST dependency and no language-server machinery.

pub mod tokens;

pub use tokens::{collect_semantic_tokens, encode_delta, EncodedToken, SemanticToken, SemanticTokenKind};
