//! The typed AST produced by the parser.
//!
//! ## Key design
//!
//! - **Tagged variants, not inheritance**: [`Statement`] and [`Expr`] are
//!   closed sum types with exhaustive dispatch in every consumer (the
//!   validator, the printer, the semantic-token producer).
//! - **Statement/expression overlap is modeled by sharing node structs**:
//!   a `Session`, `DoBlock`, `ParallelBlock`, and the rest can appear both
//!   as a top-level statement and as the right-hand side of a pipe/arrow
//!   expression, so each lives in exactly one struct and both `Statement`
//!   and `Expr` wrap the same type rather than duplicating its fields.
//! - **Immutable once built**: the parser builds bottom-up; nothing past
//!   construction mutates a node. The validator and printer only read.

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::token::StringMetadata;

/// The root of a parsed program: its statements in source order plus every
/// comment encountered, flattened for tooling (semantic tokens, the
/// printer's "strip" pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
    pub comments: Vec<CommentNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    pub text: String,
    pub inline: bool,
    pub span: Span,
}

/// A `(name, value)` pair attached to a session or agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLiteral {
    pub value: String,
    pub metadata: StringMetadata,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberLiteral {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierExpr {
    pub name: String,
    pub span: Span,
}

/// A natural-language discretion span. Opaque beyond length checks per
/// spec.md's Design Notes ("Discretion is opaque").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretionExpr {
    pub text: String,
    pub multiline: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpression {
    pub elements: Vec<Expr>,
    pub span: Span,
}

/// `{ a, b }` (shorthand, every property a bare identifier reused as its
/// own value) or a full `{ name: value, ... }` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<Property>,
    pub is_shorthand: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub skill_name: String,
    pub source: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub properties: Vec<Property>,
    pub span: Span,
}

/// Either an inline-prompt session (`session "..."`) or an agent-reference
/// session (`session [label]: agentId` plus an optional property block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub label: Option<String>,
    pub agent_ref: Option<IdentifierExpr>,
    pub inline_prompt: Option<StringLiteral>,
    pub properties: Vec<Property>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// An invocation (`name` set, `args` may be non-empty, `body` empty) or an
/// anonymous block (`name` absent, `body` non-empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoBlock {
    pub name: Option<String>,
    pub args: Vec<Expr>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl DoBlock {
    pub fn is_invocation(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParallelStrategy {
    All,
    First,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelBlock {
    pub strategy: Option<ParallelStrategy>,
    pub count: Option<u64>,
    pub on_fail: Option<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatBlock {
    pub count: Expr,
    pub binding: Option<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachBlock {
    pub item: String,
    pub index: Option<String>,
    pub iterable: Expr,
    pub is_parallel: bool,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopConditionKind {
    Until,
    While,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopCondition {
    pub kind: LoopConditionKind,
    pub discretion: DiscretionExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopBlock {
    pub condition: Option<LoopCondition>,
    pub max: Option<u64>,
    pub binding: Option<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub binding: Option<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryBlock {
    pub body: Vec<Statement>,
    pub catch: Option<CatchClause>,
    pub finally: Option<Vec<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub message: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceBlock {
    pub condition: DiscretionExpr,
    pub options: Vec<ChoiceOption>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElifClause {
    pub condition: DiscretionExpr,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: DiscretionExpr,
    pub body: Vec<Statement>,
    pub elifs: Vec<ElifClause>,
    pub else_body: Option<Vec<Statement>>,
    pub span: Span,
}

/// Left-associative `->` chain, modeled as nested binary nodes per
/// spec.md's Design Notes ("Pipelines and arrow chains are expressions").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowExpression {
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetBinding {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstBinding {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipeOperator {
    Map,
    Filter,
    Reduce,
    Pmap,
}

/// One `| operator [params]: body` stage. Only `reduce` carries params
/// (`accIdent, itemIdent`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeOperation {
    pub operator: PipeOperator,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeExpression {
    pub input: Box<Expr>,
    pub operations: Vec<PipeOperation>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Comment(CommentNode),
    Import(Import),
    Session(Session),
    AgentDefinition(AgentDefinition),
    BlockDefinition(BlockDefinition),
    DoBlock(DoBlock),
    ParallelBlock(ParallelBlock),
    RepeatBlock(RepeatBlock),
    ForEachBlock(ForEachBlock),
    LoopBlock(LoopBlock),
    TryBlock(TryBlock),
    ThrowStatement(ThrowStatement),
    ChoiceBlock(ChoiceBlock),
    IfStatement(IfStatement),
    ArrowExpression(ArrowExpression),
    LetBinding(LetBinding),
    ConstBinding(ConstBinding),
    Assignment(Assignment),
    PipeExpression(PipeExpression),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Comment(n) => n.span,
            Statement::Import(n) => n.span,
            Statement::Session(n) => n.span,
            Statement::AgentDefinition(n) => n.span,
            Statement::BlockDefinition(n) => n.span,
            Statement::DoBlock(n) => n.span,
            Statement::ParallelBlock(n) => n.span,
            Statement::RepeatBlock(n) => n.span,
            Statement::ForEachBlock(n) => n.span,
            Statement::LoopBlock(n) => n.span,
            Statement::TryBlock(n) => n.span,
            Statement::ThrowStatement(n) => n.span,
            Statement::ChoiceBlock(n) => n.span,
            Statement::IfStatement(n) => n.span,
            Statement::ArrowExpression(n) => n.span,
            Statement::LetBinding(n) => n.span,
            Statement::ConstBinding(n) => n.span,
            Statement::Assignment(n) => n.span,
            Statement::PipeExpression(n) => n.span,
        }
    }

    /// The AST node-kind name, used by diagnostics and the telemetry counter.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Comment(_) => "Comment",
            Statement::Import(_) => "Import",
            Statement::Session(_) => "Session",
            Statement::AgentDefinition(_) => "AgentDefinition",
            Statement::BlockDefinition(_) => "BlockDefinition",
            Statement::DoBlock(_) => "DoBlock",
            Statement::ParallelBlock(_) => "ParallelBlock",
            Statement::RepeatBlock(_) => "RepeatBlock",
            Statement::ForEachBlock(_) => "ForEachBlock",
            Statement::LoopBlock(_) => "LoopBlock",
            Statement::TryBlock(_) => "TryBlock",
            Statement::ThrowStatement(_) => "ThrowStatement",
            Statement::ChoiceBlock(_) => "ChoiceBlock",
            Statement::IfStatement(_) => "IfStatement",
            Statement::ArrowExpression(_) => "ArrowExpression",
            Statement::LetBinding(_) => "LetBinding",
            Statement::ConstBinding(_) => "ConstBinding",
            Statement::Assignment(_) => "Assignment",
            Statement::PipeExpression(_) => "PipeExpression",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    StringLiteral(StringLiteral),
    NumberLiteral(NumberLiteral),
    Identifier(IdentifierExpr),
    Discretion(DiscretionExpr),
    Array(ArrayExpression),
    Object(ObjectExpression),
    Session(Box<Session>),
    Do(Box<DoBlock>),
    Parallel(Box<ParallelBlock>),
    Try(Box<TryBlock>),
    Loop(Box<LoopBlock>),
    Choice(Box<ChoiceBlock>),
    If(Box<IfStatement>),
    Arrow(Box<ArrowExpression>),
    Pipe(Box<PipeExpression>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::StringLiteral(n) => n.span,
            Expr::NumberLiteral(n) => n.span,
            Expr::Identifier(n) => n.span,
            Expr::Discretion(n) => n.span,
            Expr::Array(n) => n.span,
            Expr::Object(n) => n.span,
            Expr::Session(n) => n.span,
            Expr::Do(n) => n.span,
            Expr::Parallel(n) => n.span,
            Expr::Try(n) => n.span,
            Expr::Loop(n) => n.span,
            Expr::Choice(n) => n.span,
            Expr::If(n) => n.span,
            Expr::Arrow(n) => n.span,
            Expr::Pipe(n) => n.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::StringLiteral(_) => "StringLiteral",
            Expr::NumberLiteral(_) => "NumberLiteral",
            Expr::Identifier(_) => "Identifier",
            Expr::Discretion(_) => "Discretion",
            Expr::Array(_) => "ArrayExpression",
            Expr::Object(_) => "ObjectExpression",
            Expr::Session(_) => "Session",
            Expr::Do(_) => "DoBlock",
            Expr::Parallel(_) => "ParallelBlock",
            Expr::Try(_) => "TryBlock",
            Expr::Loop(_) => "LoopBlock",
            Expr::Choice(_) => "ChoiceBlock",
            Expr::If(_) => "IfStatement",
            Expr::Arrow(_) => "ArrowExpression",
            Expr::Pipe(_) => "PipeExpression",
        }
    }

    /// Identifiers embedded directly in this expression (not descending
    /// into nested blocks); used by the validator's context/collection
    /// reference checks.
    pub fn as_identifier(&self) -> Option<&IdentifierExpr> {
        match self {
            Expr::Identifier(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    fn dummy_span() -> Span {
        Span::point(Position::start_of_file())
    }

    #[test]
    fn statement_kind_name_matches_variant() {
        let stmt = Statement::ThrowStatement(ThrowStatement {
            message: Expr::StringLiteral(StringLiteral {
                value: "x".into(),
                metadata: StringMetadata {
                    raw: "\"x\"".into(),
                    is_triple_quoted: false,
                    escape_sequences: vec![],
                    interpolations: vec![],
                },
                span: dummy_span(),
            }),
            span: dummy_span(),
        });
        assert_eq!(stmt.kind_name(), "ThrowStatement");
    }

    #[test]
    fn do_block_is_invocation_iff_named() {
        let invocation = DoBlock {
            name: Some("greet".into()),
            args: vec![],
            body: vec![],
            span: dummy_span(),
        };
        assert!(invocation.is_invocation());

        let anonymous = DoBlock {
            name: None,
            args: vec![],
            body: vec![],
            span: dummy_span(),
        };
        assert!(!anonymous.is_invocation());
    }
}
