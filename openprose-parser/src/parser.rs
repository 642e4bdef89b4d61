//! Indentation-aware recursive-descent parser.
//!
//! ## Key design
//!
//! - **One token of lookahead.** The parser never backtracks past a single
//!   peeked token; ties (e.g. whether a trailing `->` attaches to a
//!   just-completed session) resolve by always preferring to attach.
//! - **Statements and expressions share one dispatch table.** Constructs
//!   that spec.md allows as arrow/pipe operands (session, do, parallel,
//!   try, loop, choice, if) are parsed once by [`Parser::parse_expr`] and
//!   converted to a [`Statement`] at statement position via
//!   [`expr_to_statement`] — there is no separate statement-only copy of
//!   their grammar.
//! - **Never panics.** Every missing-token condition records one
//!   [`ParseError`] and calls [`Parser::synchronize`], which skips to the
//!   next `NEWLINE`/`DEDENT`/`EOF` boundary.

use serde::{Deserialize, Serialize};

use crate::ast::*;
use crate::span::Span;
use crate::token::{Keyword, Token, TokenKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prev_was_block_close: bool,
    errors: Vec<ParseError>,
    comments: Vec<CommentNode>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            prev_was_block_close: false,
            errors: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn parse(mut self) -> ParseResult {
        let start = self.current_span();
        let mut statements = Vec::new();
        while !self.at_end() {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
        }
        let end = self.current_span();
        ParseResult {
            program: Program {
                statements,
                comments: self.comments,
                span: Span::new(start.start, end.end),
            },
            errors: self.errors,
        }
    }

    // ---- cursor helpers ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.prev_was_block_close = matches!(tok.kind, TokenKind::Dedent);
        tok
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ParseError {
            message: message.into(),
            span,
        });
    }

    /// Skip to the next statement/block boundary after a local failure.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::Dedent => return,
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn expect_colon(&mut self) -> bool {
        if matches!(self.peek_kind(), TokenKind::Colon) {
            self.advance();
            true
        } else {
            let span = self.current_span();
            self.error("expected ':'", span);
            self.synchronize();
            false
        }
    }

    fn expect_identifier(&mut self) -> Option<(String, Span)> {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            let span = self.current_span();
            self.advance();
            Some((name, span))
        } else {
            let span = self.current_span();
            self.error("expected an identifier", span);
            self.synchronize();
            None
        }
    }

    fn expect_string(&mut self) -> Option<StringLiteral> {
        if let TokenKind::String { value, metadata } = self.peek_kind().clone() {
            let span = self.current_span();
            self.advance();
            Some(StringLiteral { value, metadata, span })
        } else {
            let span = self.current_span();
            self.error("expected a string literal", span);
            self.synchronize();
            None
        }
    }

    fn expect_number(&mut self) -> Option<(f64, Span)> {
        if let TokenKind::Number(n) = *self.peek_kind() {
            let span = self.current_span();
            self.advance();
            Some((n, span))
        } else {
            let span = self.current_span();
            self.error("expected a number", span);
            self.synchronize();
            None
        }
    }

    fn expect_discretion(&mut self) -> Option<DiscretionExpr> {
        if let TokenKind::Discretion { text, multiline } = self.peek_kind().clone() {
            let span = self.current_span();
            self.advance();
            Some(DiscretionExpr { text, multiline, span })
        } else {
            let span = self.current_span();
            self.error("expected a discretion condition", span);
            self.synchronize();
            None
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, desc: &str) -> bool {
        if self.eat_keyword(kw) {
            true
        } else {
            let span = self.current_span();
            self.error(format!("expected '{}'", desc), span);
            self.synchronize();
            false
        }
    }

    /// Mirrors the property/name lexeme trick: several property names
    /// (`model`, `prompt`, `skills`, `permissions`, `context`, `retry`,
    /// `backoff`) are themselves keywords, so a bare-name position accepts
    /// either an identifier or a keyword token, using its lexeme.
    fn expect_name_token(&mut self) -> Option<(String, Span)> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                Some((name, span))
            }
            TokenKind::Keyword(_) => {
                let span = self.current_span();
                let lexeme = self.current().lexeme.clone();
                self.advance();
                Some((lexeme, span))
            }
            _ => {
                let span = self.current_span();
                self.error("expected a name", span);
                self.synchronize();
                None
            }
        }
    }

    /// Consume a trailing inline comment and/or newline that terminates a
    /// single-line statement. A no-op if the statement already ended by
    /// closing an indented block (its own Newline+Dedent already consumed).
    fn finish_statement(&mut self) {
        if self.prev_was_block_close {
            return;
        }
        if let TokenKind::Comment { text, inline: true } = self.peek_kind().clone() {
            let span = self.current_span();
            self.advance();
            self.comments.push(CommentNode { text, inline: true, span });
        }
        if matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    // ---- statement dispatch ----

    fn parse_statement(&mut self) -> Option<Statement> {
        let stmt = self.parse_statement_inner()?;
        self.finish_statement();
        Some(stmt)
    }

    fn parse_statement_inner(&mut self) -> Option<Statement> {
        match self.peek_kind().clone() {
            TokenKind::Comment { text, inline: false } => {
                let span = self.current_span();
                self.advance();
                let node = CommentNode { text, inline: false, span };
                self.comments.push(node.clone());
                Some(Statement::Comment(node))
            }
            TokenKind::Keyword(Keyword::Import) => self.parse_import(),
            TokenKind::Keyword(Keyword::Agent) => self.parse_agent_definition(),
            TokenKind::Keyword(Keyword::Block) => self.parse_block_definition(),
            TokenKind::Keyword(Keyword::Let) => self.parse_let(),
            TokenKind::Keyword(Keyword::Const) => self.parse_const(),
            TokenKind::Keyword(Keyword::Repeat) => self.parse_repeat(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_each(false),
            TokenKind::Keyword(Keyword::Parallel)
                if matches!(self.peek_kind_at(1), TokenKind::Keyword(Keyword::For)) =>
            {
                self.advance(); // consume 'parallel'
                self.parse_for_each(true)
            }
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw(),
            TokenKind::Identifier(_)
                if matches!(self.peek_kind_at(1), TokenKind::Equals) =>
            {
                self.parse_assignment()
            }
            _ => {
                let expr = self.parse_expr()?;
                let span = expr.span();
                match expr_to_statement(expr) {
                    Some(stmt) => Some(stmt),
                    None => {
                        self.error("this expression cannot stand alone as a statement", span);
                        self.synchronize();
                        None
                    }
                }
            }
        }
    }

    fn parse_import(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // import
        let skill = self.expect_string()?;
        if !self.expect_keyword(Keyword::From, "from") {
            return None;
        }
        let source = self.expect_string()?;
        let end = source.span;
        Some(Statement::Import(Import {
            skill_name: skill.value,
            source: source.value,
            span: Span::new(start.start, end.end),
        }))
    }

    fn parse_agent_definition(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // agent
        let (name, _) = self.expect_identifier()?;
        if !self.expect_colon() {
            return None;
        }
        let properties = self.parse_property_block();
        let end = self.current_span();
        Some(Statement::AgentDefinition(AgentDefinition {
            name,
            properties,
            span: Span::new(start.start, end.start),
        }))
    }

    fn parse_block_definition(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // block
        let (name, _) = self.expect_identifier()?;
        let mut params = Vec::new();
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            if !matches!(self.peek_kind(), TokenKind::RParen) {
                loop {
                    let (p, _) = self.expect_identifier()?;
                    params.push(p);
                    if matches!(self.peek_kind(), TokenKind::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            if matches!(self.peek_kind(), TokenKind::RParen) {
                self.advance();
            } else {
                let span = self.current_span();
                self.error("expected ')'", span);
            }
        }
        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();
        let end = self.current_span();
        Some(Statement::BlockDefinition(BlockDefinition {
            name,
            params,
            body,
            span: Span::new(start.start, end.start),
        }))
    }

    fn parse_let(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // let
        let (name, _) = self.expect_identifier()?;
        if !matches!(self.peek_kind(), TokenKind::Equals) {
            let span = self.current_span();
            self.error("expected '='", span);
            self.synchronize();
            return None;
        }
        self.advance();
        let value = self.parse_expr()?;
        let end = value.span();
        Some(Statement::LetBinding(LetBinding {
            name,
            value,
            span: Span::new(start.start, end.end),
        }))
    }

    fn parse_const(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // const
        let (name, _) = self.expect_identifier()?;
        if !matches!(self.peek_kind(), TokenKind::Equals) {
            let span = self.current_span();
            self.error("expected '='", span);
            self.synchronize();
            return None;
        }
        self.advance();
        let value = self.parse_expr()?;
        let end = value.span();
        Some(Statement::ConstBinding(ConstBinding {
            name,
            value,
            span: Span::new(start.start, end.end),
        }))
    }

    fn parse_assignment(&mut self) -> Option<Statement> {
        let (name, start) = self.expect_identifier()?;
        self.advance(); // =
        let value = self.parse_expr()?;
        let end = value.span();
        Some(Statement::Assignment(Assignment {
            name,
            value,
            span: Span::new(start.start, end.end),
        }))
    }

    fn parse_repeat(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // repeat
        let count = self.parse_primary_expr()?;
        let binding = if self.eat_keyword(Keyword::As) {
            let (name, _) = self.expect_identifier()?;
            Some(name)
        } else {
            None
        };
        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();
        let end = self.current_span();
        Some(Statement::RepeatBlock(RepeatBlock {
            count,
            binding,
            body,
            span: Span::new(start.start, end.start),
        }))
    }

    fn parse_for_each(&mut self, is_parallel: bool) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // for
        let (item, _) = self.expect_identifier()?;
        let index = if matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            let (idx, _) = self.expect_identifier()?;
            Some(idx)
        } else {
            None
        };
        if !self.expect_keyword(Keyword::In, "in") {
            return None;
        }
        let iterable = self.parse_primary_expr()?;
        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();
        let end = self.current_span();
        Some(Statement::ForEachBlock(ForEachBlock {
            item,
            index,
            iterable,
            is_parallel,
            body,
            span: Span::new(start.start, end.start),
        }))
    }

    fn parse_throw(&mut self) -> Option<Statement> {
        let start = self.current_span();
        self.advance(); // throw
        let message = self.parse_primary_expr()?;
        let end = message.span();
        Some(Statement::ThrowStatement(ThrowStatement {
            message,
            span: Span::new(start.start, end.end),
        }))
    }

    // ---- expression-capable constructs (also reachable as statements) ----

    fn parse_session(&mut self) -> Option<Session> {
        let start = self.current_span();
        self.advance(); // session

        if let TokenKind::String { .. } = self.peek_kind() {
            let prompt = self.expect_string()?;
            let properties = self.parse_trailing_property_block();
            let end = self.current_span();
            return Some(Session {
                label: None,
                agent_ref: None,
                inline_prompt: Some(prompt),
                properties,
                span: Span::new(start.start, end.start),
            });
        }

        let label = if matches!(self.peek_kind(), TokenKind::Identifier(_))
            && matches!(self.peek_kind_at(1), TokenKind::Colon)
        {
            let (name, _) = self.expect_identifier()?;
            Some(name)
        } else {
            None
        };
        if !self.expect_colon() {
            return None;
        }
        let (agent_name, agent_span) = self.expect_identifier()?;
        let properties = self.parse_trailing_property_block();
        let end = self.current_span();
        Some(Session {
            label,
            agent_ref: Some(IdentifierExpr {
                name: agent_name,
                span: agent_span,
            }),
            inline_prompt: None,
            properties,
            span: Span::new(start.start, end.start),
        })
    }

    /// Property blocks attach purely by indentation after a session head —
    /// no colon is required (unlike every other block-bodied construct).
    fn parse_trailing_property_block(&mut self) -> Vec<Property> {
        if matches!(self.peek_kind(), TokenKind::Newline)
            && matches!(self.peek_kind_at(1), TokenKind::Indent)
        {
            self.advance(); // newline
            self.advance(); // indent
            let mut props = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                if let Some(p) = self.parse_property_line() {
                    props.push(p);
                }
            }
            if matches!(self.peek_kind(), TokenKind::Dedent) {
                self.advance();
            }
            props
        } else {
            Vec::new()
        }
    }

    fn parse_do(&mut self) -> Option<DoBlock> {
        let start = self.current_span();
        self.advance(); // do
        if matches!(self.peek_kind(), TokenKind::Colon) {
            self.advance();
            let body = self.parse_indented_block();
            let end = self.current_span();
            return Some(DoBlock {
                name: None,
                args: Vec::new(),
                body,
                span: Span::new(start.start, end.start),
            });
        }
        let (name, _) = self.expect_identifier()?;
        let mut args = Vec::new();
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            if !matches!(self.peek_kind(), TokenKind::RParen) {
                loop {
                    args.push(self.parse_primary_expr()?);
                    if matches!(self.peek_kind(), TokenKind::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            if matches!(self.peek_kind(), TokenKind::RParen) {
                self.advance();
            } else {
                let span = self.current_span();
                self.error("expected ')'", span);
            }
        }
        let end = self.current_span();
        Some(DoBlock {
            name: Some(name),
            args,
            body: Vec::new(),
            span: Span::new(start.start, end.start),
        })
    }

    fn parse_parallel(&mut self) -> Option<ParallelBlock> {
        let start = self.current_span();
        self.advance(); // parallel

        let mut strategy = None;
        let mut count = None;
        let mut on_fail = None;
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            while !matches!(self.peek_kind(), TokenKind::RParen | TokenKind::Eof) {
                match self.peek_kind().clone() {
                    TokenKind::String { value, .. } => {
                        let span = self.current_span();
                        self.advance();
                        let parsed = match value.as_str() {
                            "all" => Some(ParallelStrategy::All),
                            "first" => Some(ParallelStrategy::First),
                            "any" => Some(ParallelStrategy::Any),
                            _ => {
                                self.error(format!("unknown parallel strategy '{}'", value), span);
                                None
                            }
                        };
                        if strategy.is_some() {
                            self.error("duplicate parallel strategy modifier", span);
                        } else {
                            strategy = parsed;
                        }
                    }
                    TokenKind::Identifier(name) if name == "count" => {
                        self.advance();
                        self.expect_colon_modifier();
                        if let Some((n, span)) = self.expect_number() {
                            if count.is_some() {
                                self.error("duplicate 'count' modifier", span);
                            } else {
                                count = Some(n as u64);
                            }
                        }
                    }
                    TokenKind::Identifier(name) if name == "on-fail" => {
                        self.advance();
                        self.expect_colon_modifier();
                        if let Some(s) = self.expect_string() {
                            if on_fail.is_some() {
                                self.error("duplicate 'on-fail' modifier", s.span);
                            } else {
                                on_fail = Some(s.value);
                            }
                        }
                    }
                    _ => {
                        let span = self.current_span();
                        self.error("unexpected parallel modifier", span);
                        self.advance();
                    }
                }
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                }
            }
            if matches!(self.peek_kind(), TokenKind::RParen) {
                self.advance();
            }
        }

        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();
        let end = self.current_span();
        Some(ParallelBlock {
            strategy,
            count,
            on_fail,
            body,
            span: Span::new(start.start, end.start),
        })
    }

    /// `count:`/`on-fail:` modifiers use a literal `:` inside the `(...)`
    /// modifier list, distinct from the block-introducing colon.
    fn expect_colon_modifier(&mut self) -> bool {
        self.expect_colon()
    }

    fn parse_loop(&mut self) -> Option<LoopBlock> {
        let start = self.current_span();
        self.advance(); // loop

        let condition = if self.eat_keyword(Keyword::Until) {
            Some(LoopCondition {
                kind: LoopConditionKind::Until,
                discretion: self.expect_discretion()?,
            })
        } else if self.eat_keyword(Keyword::While) {
            Some(LoopCondition {
                kind: LoopConditionKind::While,
                discretion: self.expect_discretion()?,
            })
        } else {
            None
        };

        let mut max = None;
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.advance();
            if let TokenKind::Identifier(name) = self.peek_kind().clone() {
                if name == "max" {
                    self.advance();
                    self.expect_colon_modifier();
                    if let Some((n, _)) = self.expect_number() {
                        max = Some(n as u64);
                    }
                }
            }
            if matches!(self.peek_kind(), TokenKind::RParen) {
                self.advance();
            } else {
                let span = self.current_span();
                self.error("expected ')'", span);
            }
        }

        let binding = if self.eat_keyword(Keyword::As) {
            let (name, _) = self.expect_identifier()?;
            Some(name)
        } else {
            None
        };

        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();
        let end = self.current_span();
        Some(LoopBlock {
            condition,
            max,
            binding,
            body,
            span: Span::new(start.start, end.start),
        })
    }

    fn parse_try(&mut self) -> Option<TryBlock> {
        let start = self.current_span();
        self.advance(); // try
        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();

        let mut catch = None;
        if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Catch)) {
            let catch_start = self.current_span();
            self.advance();
            let binding = if self.eat_keyword(Keyword::As) {
                let (name, _) = self.expect_identifier()?;
                Some(name)
            } else {
                None
            };
            if self.expect_colon() {
                let catch_body = self.parse_indented_block();
                let catch_end = self.current_span();
                catch = Some(CatchClause {
                    binding,
                    body: catch_body,
                    span: Span::new(catch_start.start, catch_end.start),
                });
            }
        }

        let mut finally = None;
        if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Finally)) {
            self.advance();
            if self.expect_colon() {
                finally = Some(self.parse_indented_block());
            }
        }

        if catch.is_none() && finally.is_none() {
            self.error("'try' requires a following 'catch' or 'finally'", start);
        }

        let end = self.current_span();
        Some(TryBlock {
            body,
            catch,
            finally,
            span: Span::new(start.start, end.start),
        })
    }

    fn parse_choice(&mut self) -> Option<ChoiceBlock> {
        let start = self.current_span();
        self.advance(); // choice
        let condition = self.expect_discretion()?;
        if !self.expect_colon() {
            return None;
        }

        let mut options = Vec::new();
        if matches!(self.peek_kind(), TokenKind::Newline) && matches!(self.peek_kind_at(1), TokenKind::Indent) {
            self.advance();
            self.advance();
            while matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Option)) {
                let opt_start = self.current_span();
                self.advance();
                let label = match self.expect_string() {
                    Some(s) => s.value,
                    None => continue,
                };
                if !self.expect_colon() {
                    continue;
                }
                let body = self.parse_indented_block();
                let opt_end = self.current_span();
                options.push(ChoiceOption {
                    label,
                    body,
                    span: Span::new(opt_start.start, opt_end.start),
                });
            }
            if matches!(self.peek_kind(), TokenKind::Dedent) {
                self.advance();
            }
        }

        let end = self.current_span();
        Some(ChoiceBlock {
            condition,
            options,
            span: Span::new(start.start, end.start),
        })
    }

    fn parse_if(&mut self) -> Option<IfStatement> {
        let start = self.current_span();
        self.advance(); // if
        let condition = self.expect_discretion()?;
        if !self.expect_colon() {
            return None;
        }
        let body = self.parse_indented_block();

        let mut elifs = Vec::new();
        while matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Elif)) {
            let elif_start = self.current_span();
            self.advance();
            let cond = self.expect_discretion()?;
            if !self.expect_colon() {
                continue;
            }
            let ebody = self.parse_indented_block();
            let elif_end = self.current_span();
            elifs.push(ElifClause {
                condition: cond,
                body: ebody,
                span: Span::new(elif_start.start, elif_end.start),
            });
        }

        let else_body = if self.eat_keyword(Keyword::Else) {
            if self.expect_colon() {
                Some(self.parse_indented_block())
            } else {
                None
            }
        } else {
            None
        };

        let end = self.current_span();
        Some(IfStatement {
            condition,
            body,
            elifs,
            else_body,
            span: Span::new(start.start, end.start),
        })
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek_kind() {
                TokenKind::Arrow => {
                    let left_start = expr.span().start;
                    self.advance();
                    let rhs = match self.parse_primary_expr() {
                        Some(r) => r,
                        None => {
                            let span = self.current_span();
                            self.error("expected an expression after '->'", span);
                            break;
                        }
                    };
                    let end = rhs.span().end;
                    expr = Expr::Arrow(Box::new(ArrowExpression {
                        left: Box::new(expr),
                        right: Box::new(rhs),
                        span: Span::new(left_start, end),
                    }));
                }
                TokenKind::Pipe => {
                    expr = self.parse_pipe_tail(expr)?;
                    break;
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn parse_pipe_tail(&mut self, input: Expr) -> Option<Expr> {
        let start = input.span().start;
        let mut operations = Vec::new();
        while matches!(self.peek_kind(), TokenKind::Pipe) {
            self.advance();
            let op_start = self.current_span();
            let operator = match self.peek_kind().clone() {
                TokenKind::Keyword(Keyword::Map) => PipeOperator::Map,
                TokenKind::Keyword(Keyword::Filter) => PipeOperator::Filter,
                TokenKind::Keyword(Keyword::Reduce) => PipeOperator::Reduce,
                TokenKind::Keyword(Keyword::Pmap) => PipeOperator::Pmap,
                _ => {
                    let span = self.current_span();
                    self.error("expected 'map', 'filter', 'reduce', or 'pmap'", span);
                    self.synchronize();
                    break;
                }
            };
            self.advance();

            let mut params = Vec::new();
            if operator == PipeOperator::Reduce {
                if matches!(self.peek_kind(), TokenKind::LParen) {
                    self.advance();
                    let (acc, _) = self.expect_identifier()?;
                    params.push(acc);
                    if matches!(self.peek_kind(), TokenKind::Comma) {
                        self.advance();
                        let (item, _) = self.expect_identifier()?;
                        params.push(item);
                    }
                    if matches!(self.peek_kind(), TokenKind::RParen) {
                        self.advance();
                    } else {
                        let span = self.current_span();
                        self.error("expected ')'", span);
                    }
                } else {
                    let span = self.current_span();
                    self.error("'reduce' requires (accumulator, item) parameters", span);
                }
            }

            if !self.expect_colon() {
                break;
            }
            let body = self.parse_indented_block();
            let op_end = self.current_span();
            operations.push(PipeOperation {
                operator,
                params,
                body,
                span: Span::new(op_start.start, op_end.start),
            });
        }
        let end = self.current_span();
        Some(Expr::Pipe(Box::new(PipeExpression {
            input: Box::new(input),
            operations,
            span: Span::new(start, end.start),
        })))
    }

    fn parse_primary_expr(&mut self) -> Option<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Keyword(Keyword::Session) => Some(Expr::Session(Box::new(self.parse_session()?))),
            TokenKind::Keyword(Keyword::Do) => Some(Expr::Do(Box::new(self.parse_do()?))),
            TokenKind::Keyword(Keyword::Parallel) => {
                if matches!(self.peek_kind_at(1), TokenKind::Keyword(Keyword::For)) {
                    // `parallel for` has no `Expr` counterpart (ForEachBlock
                    // never appears as an expression operand per spec.md);
                    // it is intercepted at statement position in
                    // `parse_statement_inner` before this path is reached.
                    self.error(
                        "'parallel for' cannot be used as an expression",
                        self.current_span(),
                    );
                    None
                } else {
                    Some(Expr::Parallel(Box::new(self.parse_parallel()?)))
                }
            }
            TokenKind::Keyword(Keyword::Try) => Some(Expr::Try(Box::new(self.parse_try()?))),
            TokenKind::Keyword(Keyword::Loop) => Some(Expr::Loop(Box::new(self.parse_loop()?))),
            TokenKind::Keyword(Keyword::Choice) => Some(Expr::Choice(Box::new(self.parse_choice()?))),
            TokenKind::Keyword(Keyword::If) => Some(Expr::If(Box::new(self.parse_if()?))),
            TokenKind::String { value, metadata } => {
                let span = self.current_span();
                self.advance();
                Some(Expr::StringLiteral(StringLiteral { value, metadata, span }))
            }
            TokenKind::Number(n) => {
                let span = self.current_span();
                self.advance();
                Some(Expr::NumberLiteral(NumberLiteral { value: n, span }))
            }
            TokenKind::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                Some(Expr::Identifier(IdentifierExpr { name, span }))
            }
            TokenKind::Discretion { text, multiline } => {
                let span = self.current_span();
                self.advance();
                Some(Expr::Discretion(DiscretionExpr { text, multiline, span }))
            }
            TokenKind::LBracket => Some(self.parse_array_literal()),
            TokenKind::LBrace => Some(self.parse_object_literal()),
            _ => {
                let span = self.current_span();
                self.error("expected an expression", span);
                self.synchronize();
                None
            }
        }
    }

    fn parse_array_literal(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // [
        let mut elements = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBracket) {
            loop {
                elements.push(self.parse_inline_value_expr());
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        if matches!(self.peek_kind(), TokenKind::RBracket) {
            self.advance();
        } else {
            let span = self.current_span();
            self.error("expected ']'", span);
        }
        let end = self.current_span();
        Expr::Array(ArrayExpression {
            elements,
            span: Span::new(start.start, end.start),
        })
    }

    fn parse_object_literal(&mut self) -> Expr {
        let start = self.current_span();
        self.advance(); // {
        if matches!(self.peek_kind(), TokenKind::RBrace) {
            self.advance();
            let end = self.current_span();
            return Expr::Object(ObjectExpression {
                properties: Vec::new(),
                is_shorthand: false,
                span: Span::new(start.start, end.start),
            });
        }

        let is_shorthand = matches!(self.peek_kind(), TokenKind::Identifier(_))
            && matches!(self.peek_kind_at(1), TokenKind::Comma | TokenKind::RBrace);

        let mut properties = Vec::new();
        if is_shorthand {
            loop {
                if let Some((name, span)) = self.expect_identifier() {
                    properties.push(Property {
                        name: name.clone(),
                        value: Expr::Identifier(IdentifierExpr { name, span }),
                        span,
                    });
                }
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        } else {
            loop {
                let name_start = self.current_span();
                let name = match self.expect_name_token() {
                    Some((n, _)) => n,
                    None => break,
                };
                if !self.expect_colon() {
                    break;
                }
                let value = self.parse_inline_value_expr();
                let end = value.span();
                properties.push(Property {
                    name,
                    value,
                    span: Span::new(name_start.start, end.end),
                });
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }

        if matches!(self.peek_kind(), TokenKind::RBrace) {
            self.advance();
        } else {
            let span = self.current_span();
            self.error("expected '}'", span);
        }
        let end = self.current_span();
        Expr::Object(ObjectExpression {
            properties,
            is_shorthand,
            span: Span::new(start.start, end.start),
        })
    }

    /// A non-composite value as used inside arrays/objects/properties:
    /// string, number, identifier, array, or object — never a session/do/
    /// control-flow construct.
    fn parse_inline_value_expr(&mut self) -> Expr {
        match self.peek_kind().clone() {
            TokenKind::String { value, metadata } => {
                let span = self.current_span();
                self.advance();
                Expr::StringLiteral(StringLiteral { value, metadata, span })
            }
            TokenKind::Number(n) => {
                let span = self.current_span();
                self.advance();
                Expr::NumberLiteral(NumberLiteral { value: n, span })
            }
            TokenKind::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                Expr::Identifier(IdentifierExpr { name, span })
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            _ => {
                let span = self.current_span();
                self.error("expected a value", span);
                self.advance();
                Expr::Identifier(IdentifierExpr {
                    name: String::new(),
                    span,
                })
            }
        }
    }

    // ---- blocks ----

    fn parse_indented_block(&mut self) -> Vec<Statement> {
        if matches!(self.peek_kind(), TokenKind::Newline) && matches!(self.peek_kind_at(1), TokenKind::Indent) {
            self.advance();
            self.advance();
            let mut statements = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                if let Some(s) = self.parse_statement() {
                    statements.push(s);
                }
            }
            if matches!(self.peek_kind(), TokenKind::Dedent) {
                self.advance();
            }
            statements
        } else {
            Vec::new()
        }
    }

    fn parse_property_block(&mut self) -> Vec<Property> {
        if matches!(self.peek_kind(), TokenKind::Newline) && matches!(self.peek_kind_at(1), TokenKind::Indent) {
            self.advance();
            self.advance();
            let mut properties = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                if let Some(p) = self.parse_property_line() {
                    properties.push(p);
                }
            }
            if matches!(self.peek_kind(), TokenKind::Dedent) {
                self.advance();
            }
            properties
        } else {
            Vec::new()
        }
    }

    fn parse_property_line(&mut self) -> Option<Property> {
        let start = self.current_span();
        let (name, _) = self.expect_name_token()?;
        if !self.expect_colon() {
            return None;
        }
        let value = self.parse_property_value();
        let end = value.span();
        let property = Property {
            name,
            value,
            span: Span::new(start.start, end.end),
        };
        self.finish_statement();
        Some(property)
    }

    fn parse_property_value(&mut self) -> Expr {
        if matches!(self.peek_kind(), TokenKind::Newline) && matches!(self.peek_kind_at(1), TokenKind::Indent) {
            let start = self.current_span();
            self.advance();
            self.advance();
            let mut properties = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                if let Some(p) = self.parse_property_line() {
                    properties.push(p);
                }
            }
            if matches!(self.peek_kind(), TokenKind::Dedent) {
                self.advance();
            }
            let end = self.current_span();
            Expr::Object(ObjectExpression {
                properties,
                is_shorthand: false,
                span: Span::new(start.start, end.start),
            })
        } else {
            self.parse_inline_value_expr()
        }
    }
}

/// Fold one of the expr-capable composite variants back into its matching
/// statement, per spec.md's shared statement/expression node design.
/// Returns `None` for bare-literal expressions that aren't meaningful on
/// their own (e.g. a lone number), which the caller reports as an error.
fn expr_to_statement(expr: Expr) -> Option<Statement> {
    match expr {
        Expr::Session(s) => Some(Statement::Session(*s)),
        Expr::Do(d) => Some(Statement::DoBlock(*d)),
        Expr::Parallel(p) => Some(Statement::ParallelBlock(*p)),
        Expr::Try(t) => Some(Statement::TryBlock(*t)),
        Expr::Loop(l) => Some(Statement::LoopBlock(*l)),
        Expr::Choice(c) => Some(Statement::ChoiceBlock(*c)),
        Expr::If(i) => Some(Statement::IfStatement(*i)),
        Expr::Arrow(a) => Some(Statement::ArrowExpression(*a)),
        Expr::Pipe(p) => Some(Statement::PipeExpression(*p)),
        Expr::StringLiteral(_)
        | Expr::NumberLiteral(_)
        | Expr::Identifier(_)
        | Expr::Discretion(_)
        | Expr::Array(_)
        | Expr::Object(_) => None,
    }
}

pub fn parse(tokens: Vec<Token>) -> ParseResult {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{tokenize, LexOptions};

    fn parse_source(src: &str) -> ParseResult {
        let lexed = tokenize(src, &LexOptions::default());
        parse(lexed.tokens)
    }

    #[test]
    fn hello_world() {
        let result = parse_source(r#"session "Hello""#);
        assert!(result.errors.is_empty());
        assert_eq!(result.program.statements.len(), 1);
        match &result.program.statements[0] {
            Statement::Session(session) => {
                assert_eq!(session.inline_prompt.as_ref().unwrap().value, "Hello");
            }
            other => panic!("expected Session, got {:?}", other),
        }
    }

    #[test]
    fn agent_definition_with_properties() {
        let src = "agent reviewer:\n  model: sonnet\n  prompt: \"Review this code\"\n  skills: [\"lint\"]\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match &result.program.statements[0] {
            Statement::AgentDefinition(def) => {
                assert_eq!(def.name, "reviewer");
                assert_eq!(def.properties.len(), 3);
            }
            other => panic!("expected AgentDefinition, got {:?}", other),
        }
    }

    #[test]
    fn parallel_block_with_shorthand_context() {
        let src = "parallel:\n  a = session \"A\"\n  b = session \"B\"\nsession \"combine\"\n  context: { a, b }\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.program.statements.len(), 2);
    }

    #[test]
    fn arrow_chain_is_left_associative() {
        let result = parse_source(r#"session "A" -> session "B" -> session "C""#);
        assert!(result.errors.is_empty());
        match &result.program.statements[0] {
            Statement::ArrowExpression(top) => {
                // ((A -> B) -> C)
                assert!(matches!(*top.right, Expr::Session(_)));
                assert!(matches!(*top.left, Expr::Arrow(_)));
            }
            other => panic!("expected ArrowExpression, got {:?}", other),
        }
    }

    #[test]
    fn pipeline_with_chained_operations() {
        let src = "let r = items | filter:\n  session \"keep?\"\n  | map:\n    session \"transform\"\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match &result.program.statements[0] {
            Statement::LetBinding(binding) => match &binding.value {
                Expr::Pipe(pipe) => assert_eq!(pipe.operations.len(), 2),
                other => panic!("expected PipeExpression, got {:?}", other),
            },
            other => panic!("expected LetBinding, got {:?}", other),
        }
    }

    #[test]
    fn try_without_catch_or_finally_is_an_error() {
        let src = "try:\n  session \"x\"\nsession \"after\"\n";
        let result = parse_source(src);
        assert!(result.errors.iter().any(|e| e.message.contains("catch")));
    }

    #[test]
    fn if_elif_else_chain() {
        let src = "if **cond**:\n  session \"a\"\nelif **other**:\n  session \"b\"\nelse:\n  session \"c\"\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match &result.program.statements[0] {
            Statement::IfStatement(stmt) => {
                assert_eq!(stmt.elifs.len(), 1);
                assert!(stmt.else_body.is_some());
            }
            other => panic!("expected IfStatement, got {:?}", other),
        }
    }

    #[test]
    fn empty_object_context_parses_with_zero_properties() {
        let src = "session \"x\"\n  context: {}\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn parallel_for_each_parses_as_a_for_each_block() {
        let src = "parallel for item in items:\n  session \"{item}\"\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.program.statements.len(), 1);
        match &result.program.statements[0] {
            Statement::ForEachBlock(block) => assert!(block.is_parallel),
            other => panic!("expected ForEachBlock, got {:?}", other),
        }
    }

    #[test]
    fn loop_until_with_max_and_binding() {
        let src = "loop until **condition** (max: 10) as n:\n  session \"x\"\n";
        let result = parse_source(src);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        match &result.program.statements[0] {
            Statement::LoopBlock(block) => {
                assert_eq!(block.max, Some(10));
                assert_eq!(block.binding.as_deref(), Some("n"));
            }
            other => panic!("expected LoopBlock, got {:?}", other),
        }
    }
}
