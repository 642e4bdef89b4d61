//! A minimal visitor over the AST, grounded on the `accept`-style traversal
//! the teacher's AST nodes implement. Consumers that only need to count or
//! inspect node kinds (the telemetry crate) implement [`Visitor`] and call
//! [`walk_program`] rather than hand-rolling a recursive match.

use crate::ast::{
    ChoiceBlock, DoBlock, Expr, ForEachBlock, IfStatement, LoopBlock, ParallelBlock, PipeExpression,
    Program, RepeatBlock, Statement, TryBlock,
};

pub trait Visitor {
    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for stmt in &program.statements {
        visitor.visit_statement(stmt);
    }
}

fn walk_statements<V: Visitor + ?Sized>(visitor: &mut V, body: &[Statement]) {
    for stmt in body {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Comment(_) | Statement::Import(_) | Statement::AgentDefinition(_) => {}
        Statement::Session(session) => {
            if let Some(prompt) = &session.inline_prompt {
                visitor.visit_expr(&Expr::StringLiteral(prompt.clone()));
            }
        }
        Statement::BlockDefinition(block) => walk_statements(visitor, &block.body),
        Statement::DoBlock(block) => walk_do_block(visitor, block),
        Statement::ParallelBlock(block) => walk_parallel_block(visitor, block),
        Statement::RepeatBlock(block) => walk_repeat_block(visitor, block),
        Statement::ForEachBlock(block) => walk_for_each_block(visitor, block),
        Statement::LoopBlock(block) => walk_loop_block(visitor, block),
        Statement::TryBlock(block) => walk_try_block(visitor, block),
        Statement::ThrowStatement(throw) => visitor.visit_expr(&throw.message),
        Statement::ChoiceBlock(choice) => walk_choice_block(visitor, choice),
        Statement::IfStatement(stmt) => walk_if_statement(visitor, stmt),
        Statement::ArrowExpression(arrow) => {
            visitor.visit_expr(&arrow.left);
            visitor.visit_expr(&arrow.right);
        }
        Statement::LetBinding(binding) => visitor.visit_expr(&binding.value),
        Statement::ConstBinding(binding) => visitor.visit_expr(&binding.value),
        Statement::Assignment(assignment) => visitor.visit_expr(&assignment.value),
        Statement::PipeExpression(pipe) => walk_pipe_expression(visitor, pipe),
    }
}

fn walk_do_block<V: Visitor + ?Sized>(visitor: &mut V, block: &DoBlock) {
    for arg in &block.args {
        visitor.visit_expr(arg);
    }
    walk_statements(visitor, &block.body);
}

fn walk_parallel_block<V: Visitor + ?Sized>(visitor: &mut V, block: &ParallelBlock) {
    walk_statements(visitor, &block.body);
}

fn walk_repeat_block<V: Visitor + ?Sized>(visitor: &mut V, block: &RepeatBlock) {
    visitor.visit_expr(&block.count);
    walk_statements(visitor, &block.body);
}

fn walk_for_each_block<V: Visitor + ?Sized>(visitor: &mut V, block: &ForEachBlock) {
    visitor.visit_expr(&block.iterable);
    walk_statements(visitor, &block.body);
}

fn walk_loop_block<V: Visitor + ?Sized>(visitor: &mut V, block: &LoopBlock) {
    walk_statements(visitor, &block.body);
}

fn walk_try_block<V: Visitor + ?Sized>(visitor: &mut V, block: &TryBlock) {
    walk_statements(visitor, &block.body);
    if let Some(catch) = &block.catch {
        walk_statements(visitor, &catch.body);
    }
    if let Some(finally) = &block.finally {
        walk_statements(visitor, finally);
    }
}

fn walk_choice_block<V: Visitor + ?Sized>(visitor: &mut V, choice: &ChoiceBlock) {
    for option in &choice.options {
        walk_statements(visitor, &option.body);
    }
}

fn walk_if_statement<V: Visitor + ?Sized>(visitor: &mut V, stmt: &IfStatement) {
    walk_statements(visitor, &stmt.body);
    for elif in &stmt.elifs {
        walk_statements(visitor, &elif.body);
    }
    if let Some(else_body) = &stmt.else_body {
        walk_statements(visitor, else_body);
    }
}

fn walk_pipe_expression<V: Visitor + ?Sized>(visitor: &mut V, pipe: &PipeExpression) {
    visitor.visit_expr(&pipe.input);
    for op in &pipe.operations {
        walk_statements(visitor, &op.body);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::StringLiteral(_)
        | Expr::NumberLiteral(_)
        | Expr::Identifier(_)
        | Expr::Discretion(_) => {}
        Expr::Array(array) => {
            for element in &array.elements {
                visitor.visit_expr(element);
            }
        }
        Expr::Object(object) => {
            for property in &object.properties {
                visitor.visit_expr(&property.value);
            }
        }
        Expr::Session(session) => {
            if let Some(prompt) = &session.inline_prompt {
                visitor.visit_expr(&Expr::StringLiteral(prompt.clone()));
            }
        }
        Expr::Do(block) => walk_do_block(visitor, block),
        Expr::Parallel(block) => walk_parallel_block(visitor, block),
        Expr::Try(block) => walk_try_block(visitor, block),
        Expr::Loop(block) => walk_loop_block(visitor, block),
        Expr::Choice(block) => walk_choice_block(visitor, block),
        Expr::If(stmt) => walk_if_statement(visitor, stmt),
        Expr::Arrow(arrow) => {
            visitor.visit_expr(&arrow.left);
            visitor.visit_expr(&arrow.right);
        }
        Expr::Pipe(pipe) => walk_pipe_expression(visitor, pipe),
    }
}
