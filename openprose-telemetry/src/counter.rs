//! Trivial per-kind node counting over a parsed program.
//!
//! Grounded on the `Visitor` trait in `openprose_parser::visit`: this
//! crate's only job is to tally how many nodes of each kind appear, not to
//! interpret discretion bodies or evaluate anything. `count_nodes` is the
//! single entry point.

use serde::{Deserialize, Serialize};

use openprose_parser::ast::{Expr, Program, Statement};
use openprose_parser::visit::{walk_expr, walk_program, walk_statement, Visitor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounts {
    pub statements: usize,
    pub expressions: usize,
    pub imports: usize,
    pub comments: usize,
    pub agents: usize,
    pub blocks: usize,
    pub sessions: usize,
    pub do_blocks: usize,
    pub parallel_blocks: usize,
    pub repeat_blocks: usize,
    pub for_each_blocks: usize,
    pub loop_blocks: usize,
    pub try_blocks: usize,
    pub throws: usize,
    pub choices: usize,
    pub ifs: usize,
    pub pipes: usize,
    pub arrows: usize,
    pub discretions: usize,
}

struct Counter {
    counts: NodeCounts,
}

impl Visitor for Counter {
    fn visit_statement(&mut self, stmt: &Statement) {
        self.counts.statements += 1;
        match stmt {
            Statement::Import(_) => self.counts.imports += 1,
            Statement::Comment(_) => self.counts.comments += 1,
            Statement::AgentDefinition(_) => self.counts.agents += 1,
            Statement::BlockDefinition(_) => self.counts.blocks += 1,
            Statement::Session(_) => self.counts.sessions += 1,
            Statement::DoBlock(_) => self.counts.do_blocks += 1,
            Statement::ParallelBlock(_) => self.counts.parallel_blocks += 1,
            Statement::RepeatBlock(_) => self.counts.repeat_blocks += 1,
            Statement::ForEachBlock(_) => self.counts.for_each_blocks += 1,
            Statement::LoopBlock(_) => self.counts.loop_blocks += 1,
            Statement::TryBlock(_) => self.counts.try_blocks += 1,
            Statement::ThrowStatement(_) => self.counts.throws += 1,
            Statement::ChoiceBlock(_) => self.counts.choices += 1,
            Statement::IfStatement(_) => self.counts.ifs += 1,
            Statement::ArrowExpression(_) => self.counts.arrows += 1,
            Statement::PipeExpression(_) => self.counts.pipes += 1,
            Statement::LetBinding(_) | Statement::ConstBinding(_) | Statement::Assignment(_) => {}
        }
        walk_statement(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.counts.expressions += 1;
        match expr {
            Expr::Session(_) => self.counts.sessions += 1,
            Expr::Do(_) => self.counts.do_blocks += 1,
            Expr::Parallel(_) => self.counts.parallel_blocks += 1,
            Expr::Try(_) => self.counts.try_blocks += 1,
            Expr::Loop(_) => self.counts.loop_blocks += 1,
            Expr::Choice(_) => self.counts.choices += 1,
            Expr::If(_) => self.counts.ifs += 1,
            Expr::Arrow(_) => self.counts.arrows += 1,
            Expr::Pipe(_) => self.counts.pipes += 1,
            Expr::Discretion(_) => self.counts.discretions += 1,
            Expr::StringLiteral(_) | Expr::NumberLiteral(_) | Expr::Identifier(_) | Expr::Array(_) | Expr::Object(_) => {}
        }
        walk_expr(self, expr);
    }
}

pub fn count_nodes(program: &Program) -> NodeCounts {
    let mut counter = Counter { counts: NodeCounts::default() };
    walk_program(&mut counter, program);
    counter.counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use openprose_parser::{parse, tokenize, LexOptions};

    fn count(src: &str) -> NodeCounts {
        let lexed = tokenize(src, &LexOptions::default());
        let parsed = parse(lexed.tokens);
        count_nodes(&parsed.program)
    }

    #[test]
    fn counts_top_level_session() {
        let counts = count(r#"session "Summarize the log""#);
        assert_eq!(counts.sessions, 1);
        assert_eq!(counts.statements, 1);
    }

    #[test]
    fn counts_nested_constructs_inside_parallel() {
        let src = "parallel:\n  session \"a\"\n  session \"b\"\n";
        let counts = count(src);
        assert_eq!(counts.parallel_blocks, 1);
        assert_eq!(counts.sessions, 2);
    }

    #[test]
    fn counts_agent_and_import_definitions() {
        let src = "import \"reviewer\" from \"github:org/repo\"\nagent reviewer:\n  model: sonnet\n  prompt: \"Review the diff\"\n";
        let counts = count(src);
        assert_eq!(counts.imports, 1);
        assert_eq!(counts.agents, 1);
    }
}
