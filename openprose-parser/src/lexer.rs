//! Character scanner producing a token stream from OpenProse source text.
//!
//! ## Key design
//!
//! - **Indentation is synthesized, not literal**: leading whitespace on a
//!   logical line is compared against an indent-width stack; the lexer
//!   emits `INDENT`/`DEDENT` tokens rather than passing whitespace through.
//! - **Blank and comment-only lines are invisible to the stack**: they are
//!   skipped (blank) or emitted as a standalone comment (comment-only)
//!   without affecting indentation.
//! - **Never panics**: every malformed construct records a [`LexError`] and
//!   the scanner resumes, per the "continue at next statement" contract.
//! - **Unicode-aware**: positions track characters for columns and raw byte
//!   offsets for spans; scanning is done over `char_indices()`, not bytes.

use serde::{Deserialize, Serialize};

use crate::diagnostic::Severity;
use crate::span::{Position, Span};
use crate::token::{
    lookup_keyword, EscapeKind, EscapeSequence, Interpolation, StringMetadata, Token, TokenKind,
};

/// Options accepted by [`tokenize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexOptions {
    pub include_comments: bool,
}

impl Default for LexOptions {
    fn default() -> Self {
        Self {
            include_comments: true,
        }
    }
}

/// A lexical error or warning, always carrying the span it was found at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexError {
    pub message: String,
    pub span: Span,
    pub severity: Severity,
}

impl LexError {
    fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            severity: Severity::Error,
        }
    }

    fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            severity: Severity::Warning,
        }
    }
}

/// The result of [`tokenize`]: a complete token stream plus any errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Tabs count as width 8 for indent-stack comparison, rounding up to the
/// next tab stop (spec.md's Design Notes: "Tabs are accounted as width 8
/// solely for comparison").
fn tab_stop(width: usize) -> usize {
    (width / 8 + 1) * 8
}

struct Scanner<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    byte_len: usize,
    idx: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    indent_stack: Vec<usize>,
    include_comments: bool,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str, opts: &LexOptions) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            byte_len: source.len(),
            idx: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
            indent_stack: vec![0],
            include_comments: opts.include_comments,
        }
    }

    fn pos(&self) -> Position {
        let offset = self.chars.get(self.idx).map(|(o, _)| *o).unwrap_or(self.byte_len);
        Position::new(self.line, self.column, offset)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).map(|(_, c)| *c)
    }

    fn at_eof(&self) -> bool {
        self.idx >= self.chars.len()
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = *self.chars.get(self.idx)?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn slice(&self, start_offset: usize, end_offset: usize) -> &'a str {
        &self.source[start_offset..end_offset]
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, span: Span) {
        self.tokens.push(Token::new(kind, lexeme, span));
    }

    fn run(mut self) -> LexResult {
        let mut at_line_start = true;
        loop {
            if at_line_start {
                match self.handle_line_start() {
                    LineStartOutcome::ContentLine => at_line_start = false,
                    LineStartOutcome::SkippedLine => continue,
                    LineStartOutcome::Eof => break,
                }
            }

            if self.at_eof() {
                self.emit_newline_if_needed();
                break;
            }

            match self.peek() {
                Some('\n') => {
                    let start = self.pos();
                    self.advance();
                    let end = self.pos();
                    self.push(TokenKind::Newline, "\n", Span::new(start, end));
                    at_line_start = true;
                }
                Some(c) if c == ' ' || c == '\t' => {
                    self.advance();
                }
                Some('#') => self.scan_comment(false),
                Some('"') => self.scan_string(),
                Some('*') => self.scan_discretion(),
                Some(c) if c.is_ascii_digit() => self.scan_number(),
                Some(c) if is_ident_start(c) => self.scan_identifier(),
                Some(':') => self.scan_single(TokenKind::Colon, ":"),
                Some(',') => self.scan_single(TokenKind::Comma, ","),
                Some('(') => self.scan_single(TokenKind::LParen, "("),
                Some(')') => self.scan_single(TokenKind::RParen, ")"),
                Some('[') => self.scan_single(TokenKind::LBracket, "["),
                Some(']') => self.scan_single(TokenKind::RBracket, "]"),
                Some('{') => self.scan_single(TokenKind::LBrace, "{"),
                Some('}') => self.scan_single(TokenKind::RBrace, "}"),
                Some('=') => self.scan_single(TokenKind::Equals, "="),
                Some('|') => self.scan_single(TokenKind::Pipe, "|"),
                Some('-') => self.scan_minus_or_arrow(),
                Some(other) => {
                    let start = self.pos();
                    self.advance();
                    let end = self.pos();
                    self.errors.push(LexError::error(
                        format!("unexpected character '{}'", other),
                        Span::new(start, end),
                    ));
                }
                None => {
                    self.emit_newline_if_needed();
                    break;
                }
            }
        }

        self.flush_dedents_and_eof();
        LexResult {
            tokens: self.tokens,
            errors: self.errors,
        }
    }

    /// Statements don't necessarily end with a literal newline (EOF may cut
    /// them short); the parser relies on a trailing Newline before DEDENT/EOF,
    /// so synthesize one if the last token wasn't already structural.
    fn emit_newline_if_needed(&mut self) {
        if let Some(last) = self.tokens.last() {
            if matches!(
                last.kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
            ) {
                return;
            }
        } else {
            return;
        }
        let pos = self.pos();
        self.push(TokenKind::Newline, "", Span::point(pos));
    }

    fn flush_dedents_and_eof(&mut self) {
        let pos = self.pos();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, "", Span::point(pos));
        }
        self.push(TokenKind::Eof, "", Span::point(pos));
    }

    /// Measure leading whitespace and update the indent stack, or determine
    /// that the line is blank/comment-only and should be skipped entirely.
    fn handle_line_start(&mut self) -> LineStartOutcome {
        if self.at_eof() {
            return LineStartOutcome::Eof;
        }

        let mut width = 0usize;
        let mut chars_consumed = 0usize;
        loop {
            match self.peek() {
                Some(' ') => {
                    width += 1;
                    chars_consumed += 1;
                    self.advance();
                }
                Some('\t') => {
                    width = tab_stop(width);
                    chars_consumed += 1;
                    self.advance();
                }
                _ => break,
            }
        }
        let _ = chars_consumed;

        match self.peek() {
            None => {
                LineStartOutcome::Eof
            }
            Some('\n') => {
                self.advance();
                LineStartOutcome::SkippedLine
            }
            Some('#') => {
                self.scan_comment(true);
                // Consume the trailing newline without emitting a token for
                // it: comment-only lines terminate no statement.
                if self.peek() == Some('\n') {
                    self.advance();
                } else if self.at_eof() {
                    return LineStartOutcome::Eof;
                }
                LineStartOutcome::SkippedLine
            }
            Some(_) => {
                self.apply_indent(width);
                LineStartOutcome::ContentLine
            }
        }
    }

    fn apply_indent(&mut self, width: usize) {
        let top = *self.indent_stack.last().unwrap();
        let pos = self.pos();
        if width > top {
            self.indent_stack.push(width);
            self.push(TokenKind::Indent, "", Span::point(pos));
        } else if width < top {
            while *self.indent_stack.last().unwrap() > width {
                self.indent_stack.pop();
                self.push(TokenKind::Dedent, "", Span::point(pos));
            }
            if *self.indent_stack.last().unwrap() != width {
                self.errors.push(LexError::error(
                    "mismatched indentation".to_string(),
                    Span::point(pos),
                ));
                self.indent_stack.push(width);
            }
        }
    }

    fn scan_single(&mut self, kind: TokenKind, lexeme: &str) {
        let start = self.pos();
        self.advance();
        let end = self.pos();
        self.push(kind, lexeme, Span::new(start, end));
    }

    fn scan_minus_or_arrow(&mut self) {
        let start = self.pos();
        self.advance();
        if self.peek() == Some('>') {
            self.advance();
            let end = self.pos();
            self.push(TokenKind::Arrow, "->", Span::new(start, end));
        } else {
            let end = self.pos();
            self.errors.push(LexError::error(
                "unexpected character '-'".to_string(),
                Span::new(start, end),
            ));
        }
    }

    fn scan_comment(&mut self, standalone: bool) {
        let start = self.pos();
        self.advance(); // consume '#'
        let text_start = self.pos();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let text_end = self.pos();
        let text = self.slice(text_start.offset, text_end.offset).to_string();
        if self.include_comments {
            self.push(
                TokenKind::Comment {
                    text,
                    inline: !standalone,
                },
                self.slice(start.offset, text_end.offset).to_string(),
                Span::new(start, text_end),
            );
        }
    }

    fn scan_number(&mut self) {
        let start = self.pos();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let end = self.pos();
        let lexeme = self.slice(start.offset, end.offset);
        let value: f64 = lexeme.parse().unwrap_or(0.0);
        self.push(TokenKind::Number(value), lexeme.to_string(), Span::new(start, end));
    }

    fn scan_identifier(&mut self) {
        let start = self.pos();
        self.advance();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let end = self.pos();
        let lexeme = self.slice(start.offset, end.offset).to_string();
        let span = Span::new(start, end);
        match lookup_keyword(&lexeme) {
            Some(kw) => self.push(TokenKind::Keyword(kw), lexeme, span),
            None => self.push(TokenKind::Identifier(lexeme.clone()), lexeme, span),
        }
    }

    /// `**...**` inline or `***...***` multiline. A bare `*` with no
    /// matching partner is an unexpected-character error.
    fn scan_discretion(&mut self) {
        let start = self.pos();
        let star_count = {
            let mut n = 0;
            while self.peek_at(n) == Some('*') {
                n += 1;
            }
            n
        };

        if star_count >= 3 {
            for _ in 0..3 {
                self.advance();
            }
            let body_start = self.pos();
            loop {
                if self.at_eof() {
                    self.errors.push(LexError::error(
                        "unterminated multiline discretion".to_string(),
                        Span::new(start, self.pos()),
                    ));
                    break;
                }
                // A line whose trimmed content is exactly "***" terminates.
                if self.at_line_start_of_closing_triple_star() {
                    break;
                }
                self.advance();
            }
            let body_end = self.pos();
            let body = self.slice(body_start.offset, body_end.offset).to_string();
            // Consume the closing line's leading whitespace and the "***".
            while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
                self.advance();
            }
            for _ in 0..3 {
                if self.peek() == Some('*') {
                    self.advance();
                }
            }
            let end = self.pos();
            self.push(
                TokenKind::Discretion {
                    text: body.trim().to_string(),
                    multiline: true,
                },
                self.slice(start.offset, end.offset).to_string(),
                Span::new(start, end),
            );
        } else if star_count == 2 {
            self.advance();
            self.advance();
            let body_start = self.pos();
            while !(self.peek() == Some('*') && self.peek_at(1) == Some('*')) {
                if self.at_eof() || self.peek() == Some('\n') {
                    self.errors.push(LexError::error(
                        "unterminated inline discretion".to_string(),
                        Span::new(start, self.pos()),
                    ));
                    let end = self.pos();
                    self.push(
                        TokenKind::Discretion {
                            text: self.slice(body_start.offset, end.offset).to_string(),
                            multiline: false,
                        },
                        self.slice(start.offset, end.offset).to_string(),
                        Span::new(start, end),
                    );
                    return;
                }
                self.advance();
            }
            let body_end = self.pos();
            let body = self.slice(body_start.offset, body_end.offset).to_string();
            self.advance();
            self.advance();
            let end = self.pos();
            self.push(
                TokenKind::Discretion {
                    text: body,
                    multiline: false,
                },
                self.slice(start.offset, end.offset).to_string(),
                Span::new(start, end),
            );
        } else {
            self.advance();
            let end = self.pos();
            self.errors.push(LexError::error(
                "unexpected character '*'".to_string(),
                Span::new(start, end),
            ));
        }
    }

    /// Look (without consuming) at whether the remainder of the current
    /// physical line, after optional leading whitespace, is exactly `***`.
    fn at_line_start_of_closing_triple_star(&self) -> bool {
        // Only meaningful right after a newline boundary; cheap to check at
        // every position since it only fires when whitespace+*** matches.
        let mut n = 0usize;
        loop {
            match self.peek_at(n) {
                Some(' ') | Some('\t') => n += 1,
                _ => break,
            }
        }
        if self.peek_at(n) != Some('*') || self.peek_at(n + 1) != Some('*') || self.peek_at(n + 2) != Some('*') {
            return false;
        }
        match self.peek_at(n + 3) {
            None | Some('\n') => {
                // Must be preceded by start-of-line: check previous char was '\n' or we're at buffer start.
                self.idx == 0 || self.chars.get(self.idx.wrapping_sub(1)).map(|(_, c)| *c) == Some('\n')
            }
            _ => false,
        }
    }

    fn scan_string(&mut self) {
        let start = self.pos();
        let is_triple = self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"');
        if is_triple {
            self.advance();
            self.advance();
            self.advance();
        } else {
            self.advance();
        }

        let mut decoded = String::new();
        let mut escapes = Vec::new();
        let mut interpolations = Vec::new();
        let mut terminated = false;

        loop {
            if self.at_eof() {
                break;
            }
            if is_triple {
                if self.peek() == Some('"') && self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
                    self.advance();
                    self.advance();
                    self.advance();
                    terminated = true;
                    break;
                }
            } else {
                match self.peek() {
                    Some('"') => {
                        self.advance();
                        terminated = true;
                        break;
                    }
                    Some('\n') => break,
                    _ => {}
                }
            }

            match self.peek() {
                Some('\\') => self.scan_escape(&mut decoded, &mut escapes),
                Some('{') => self.scan_interpolation(&mut decoded, &mut interpolations),
                Some(c) => {
                    decoded.push(c);
                    self.advance();
                }
                None => break,
            }
        }

        let end = self.pos();
        if !terminated {
            self.errors.push(LexError::error(
                "unterminated string literal".to_string(),
                Span::new(start, end),
            ));
        }

        let raw = self.slice(start.offset, end.offset).to_string();
        let metadata = StringMetadata {
            raw,
            is_triple_quoted: is_triple,
            escape_sequences: escapes,
            interpolations,
        };
        let lexeme = self.slice(start.offset, end.offset).to_string();
        self.push(
            TokenKind::String {
                value: decoded,
                metadata,
            },
            lexeme,
            Span::new(start, end),
        );
    }

    fn scan_escape(&mut self, decoded: &mut String, escapes: &mut Vec<EscapeSequence>) {
        let start = self.pos();
        self.advance(); // consume backslash
        let next = match self.peek() {
            Some(c) => c,
            None => {
                self.errors.push(LexError::error(
                    "dangling escape at end of input".to_string(),
                    Span::new(start, self.pos()),
                ));
                return;
            }
        };

        if next == 'u' {
            self.advance();
            let digits_start = self.pos();
            let mut digits = String::new();
            for _ in 0..4 {
                match self.peek() {
                    Some(c) if c.is_ascii_hexdigit() => {
                        digits.push(c);
                        self.advance();
                    }
                    _ => break,
                }
            }
            let end = self.pos();
            let lexeme = self.slice(start.offset, end.offset).to_string();
            if digits.len() == 4 {
                if let Some(resolved) = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                {
                    decoded.push(resolved);
                    escapes.push(EscapeSequence {
                        kind: EscapeKind::Unicode,
                        lexeme,
                        resolved: resolved.to_string(),
                        span: Span::new(start, end),
                    });
                } else {
                    self.errors.push(LexError::error(
                        format!("invalid unicode escape '\\u{}'", digits),
                        Span::new(digits_start, end),
                    ));
                }
            } else {
                self.errors.push(LexError::error(
                    "incomplete unicode escape (expected 4 hex digits)".to_string(),
                    Span::new(start, end),
                ));
            }
            return;
        }

        let resolved: Option<char> = match next {
            '\\' => Some('\\'),
            '"' => Some('"'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            '0' => Some('\0'),
            '#' => Some('#'),
            '{' => Some('{'),
            '}' => Some('}'),
            _ => None,
        };
        self.advance();
        let end = self.pos();
        let lexeme = self.slice(start.offset, end.offset).to_string();
        match resolved {
            Some(c) => {
                decoded.push(c);
                escapes.push(EscapeSequence {
                    kind: EscapeKind::Standard,
                    lexeme,
                    resolved: c.to_string(),
                    span: Span::new(start, end),
                });
            }
            None => {
                decoded.push(next);
                escapes.push(EscapeSequence {
                    kind: EscapeKind::Invalid,
                    lexeme,
                    resolved: next.to_string(),
                    span: Span::new(start, end),
                });
                self.errors.push(LexError::warning(
                    format!("unknown escape sequence '\\{}'", next),
                    Span::new(start, end),
                ));
            }
        }
    }

    /// Scan a raw (unescaped) `{` found in a string body: `{{`/`{}` are
    /// literal, `{name}` records an [`Interpolation`], anything else is left
    /// untouched as a literal `{` so scanning can continue normally.
    fn scan_interpolation(&mut self, decoded: &mut String, interpolations: &mut Vec<Interpolation>) {
        if self.peek_at(1) == Some('{') {
            decoded.push('{');
            self.advance();
            self.advance();
            return;
        }
        if self.peek_at(1) == Some('}') {
            decoded.push('{');
            decoded.push('}');
            self.advance();
            self.advance();
            return;
        }

        let start = self.pos();
        if !matches!(self.peek_at(1), Some(c) if is_ident_start(c)) {
            decoded.push('{');
            self.advance();
            return;
        }

        self.advance(); // consume '{'
        let name_start = self.pos();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let name_end = self.pos();
        let name = self.slice(name_start.offset, name_end.offset).to_string();

        if self.peek() == Some('}') {
            self.advance();
            let end = self.pos();
            decoded.push('{');
            decoded.push_str(&name);
            decoded.push('}');
            interpolations.push(Interpolation {
                var_name: name,
                span: Span::new(start, end),
            });
        } else {
            // Not a well-formed `{name}`: treat the `{` as literal and let
            // the rest be rescanned normally.
            decoded.push('{');
            decoded.push_str(&name);
        }
    }
}

enum LineStartOutcome {
    ContentLine,
    SkippedLine,
    Eof,
}

/// Tokenize OpenProse source text. Never panics; all failures are recorded
/// in [`LexResult::errors`] and scanning continues at the next line.
pub fn tokenize(source: &str, opts: &LexOptions) -> LexResult {
    Scanner::new(source, opts).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(result: &LexResult) -> Vec<&TokenKind> {
        result.tokens.iter().map(|t| &t.kind).collect()
    }

    #[test]
    fn hello_world_session() {
        let result = tokenize(r#"session "Hello""#, &LexOptions::default());
        assert!(result.errors.is_empty());
        let kinds = kinds(&result);
        assert!(matches!(kinds[0], TokenKind::Keyword(crate::token::Keyword::Session)));
        assert!(matches!(kinds[1], TokenKind::String { .. }));
    }

    #[test]
    fn indentation_produces_balanced_indent_dedent() {
        let src = "agent a:\n  model: sonnet\n  prompt: \"x\"\n";
        let result = tokenize(src, &LexOptions::default());
        let indents = result
            .tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Indent))
            .count();
        let dedents = result
            .tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Dedent))
            .count();
        assert_eq!(indents, dedents);
        assert_eq!(indents, 1);
    }

    #[test]
    fn blank_and_comment_only_lines_do_not_affect_indentation() {
        let src = "agent a:\n  model: sonnet\n\n  # a comment\n  prompt: \"x\"\n";
        let result = tokenize(src, &LexOptions::default());
        let indents = result.tokens.iter().filter(|t| matches!(t.kind, TokenKind::Indent)).count();
        assert_eq!(indents, 1);
    }

    #[test]
    fn mismatched_dedent_records_error() {
        let src = "agent a:\n    model: sonnet\n  prompt: \"x\"\n";
        let result = tokenize(src, &LexOptions::default());
        assert!(result.errors.iter().any(|e| e.message.contains("mismatched")));
    }

    #[test]
    fn triple_quoted_string_spans_lines_and_keeps_interpolation() {
        let src = "session \"\"\"\n  multi-line prompt with {var}\n\"\"\"\n";
        let result = tokenize(src, &LexOptions::default());
        assert!(result.errors.is_empty());
        let string_tok = result
            .tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::String { metadata, .. } => Some(metadata),
                _ => None,
            })
            .unwrap();
        assert!(string_tok.is_triple_quoted);
        assert_eq!(string_tok.interpolations.len(), 1);
        assert_eq!(string_tok.interpolations[0].var_name, "var");
    }

    #[test]
    fn escaped_and_doubled_braces_are_not_interpolations() {
        let src = r#"session "literal \{brace\} and {{doubled}}""#;
        let result = tokenize(src, &LexOptions::default());
        let metadata = result
            .tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::String { metadata, .. } => Some(metadata),
                _ => None,
            })
            .unwrap();
        assert!(metadata.interpolations.is_empty());
    }

    #[test]
    fn unknown_escape_is_a_warning_and_decodes_literally() {
        let src = r#"session "a \z b""#;
        let result = tokenize(src, &LexOptions::default());
        assert!(result
            .errors
            .iter()
            .any(|e| e.severity == Severity::Warning && e.message.contains("unknown escape")));
    }

    #[test]
    fn bad_unicode_escape_is_an_error() {
        let src = r#"session "a \u12 b""#;
        let result = tokenize(src, &LexOptions::default());
        assert!(result
            .errors
            .iter()
            .any(|e| e.severity == Severity::Error && e.message.contains("unicode")));
    }

    #[test]
    fn inline_discretion_and_multiline_discretion() {
        let src = "if **cond**:\n  session \"x\"\nloop until ***\nrun until done\n***:\n  session \"y\"\n";
        let result = tokenize(src, &LexOptions::default());
        let discretions: Vec<_> = result
            .tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Discretion { text, multiline } => Some((text.clone(), *multiline)),
                _ => None,
            })
            .collect();
        assert_eq!(discretions.len(), 2);
        assert_eq!(discretions[0].0, "cond");
        assert!(!discretions[0].1);
        assert!(discretions[1].1);
    }

    #[test]
    fn span_monotonicity_holds() {
        let src = "agent a:\n  model: sonnet\n  prompt: \"hi {x}\"\nsession \"go\"\n";
        let result = tokenize(src, &LexOptions::default());
        let mut last_offset = 0usize;
        for token in &result.tokens {
            assert!(token.span.start.offset <= token.span.end.offset);
            assert!(token.span.start.offset >= last_offset);
            last_offset = token.span.start.offset;
        }
    }

    #[test]
    fn include_comments_false_drops_comment_tokens() {
        let src = "# hi\nsession \"x\" # inline\n";
        let result = tokenize(src, &LexOptions { include_comments: false });
        assert!(!result.tokens.iter().any(|t| matches!(t.kind, TokenKind::Comment { .. })));
    }

    #[test]
    fn inline_vs_standalone_comment_classification() {
        let src = "# standalone\nsession \"x\" # inline\n";
        let result = tokenize(src, &LexOptions::default());
        let comments: Vec<_> = result
            .tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Comment { inline, .. } => Some(*inline),
                _ => None,
            })
            .collect();
        assert_eq!(comments, vec![false, true]);
    }
}
