//! Two-pass semantic validator.
//!
//! Pass one (`collect_globals`) scans only the top-level statements,
//! registering every import/agent/block name and flagging duplicate or
//! cross-namespace names; these three kinds become program-global exactly
//! once this pass completes (spec.md §8: "agents/blocks/imports ... are
//! program-global after first pass"). A second scan flags any agent/block
//! definition found nested inside a body — legal grammar, illegal position.
//!
//! Pass two (`Validator::traverse_statements`) walks the tree in source
//! order with a [`ScopeStack`], resolving every variable/agent/block/skill
//! reference and enforcing each construct's own rules. Grounded on
//! `Document::diagnostics()`'s two-helper aggregation
//! (`validate_references()` + `validate_structure()`) in
//! `lex-parser/src/lex/ast/diagnostics.rs`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use openprose_parser::ast::*;
use openprose_parser::Span;

use crate::diagnostic::Diagnostic;
use crate::scope::{ScopeKind, ScopeStack};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Default)]
struct GlobalRegistry {
    agents: HashMap<String, Span>,
    blocks: HashMap<String, (Span, usize)>,
    skills: HashMap<String, Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefineMode {
    /// Ordinary `let`/`const`/assignment at statement position: defines in
    /// the scope currently on top of the stack.
    Local,
    /// try/catch/finally/if/elif/else/parallel branch bodies: the binding
    /// becomes visible one level up once the construct completes.
    EscapeToParent,
    /// An anonymous `do:` block's own escape rule.
    AnonymousDo,
}

pub fn validate(program: &Program) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let registry = collect_globals(&program.statements, &mut diagnostics);

    for stmt in &program.statements {
        for body in nested_bodies_of(stmt) {
            scan_nested_bodies(body, &mut diagnostics);
        }
    }

    check_comments(&program.comments, &mut diagnostics);

    let mut validator = Validator {
        registry,
        scope: ScopeStack::new(),
        diagnostics,
    };
    validator.traverse_statements(&program.statements, DefineMode::Local, false);

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for d in validator.diagnostics {
        match d.severity {
            openprose_parser::Severity::Error => errors.push(d),
            openprose_parser::Severity::Warning => warnings.push(d),
        }
    }
    errors.sort_by_key(|d| d.span.start.offset);
    warnings.sort_by_key(|d| d.span.start.offset);

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

// ---- pass one: global collection ----

fn collect_globals(statements: &[Statement], diagnostics: &mut Vec<Diagnostic>) -> GlobalRegistry {
    let mut registry = GlobalRegistry::default();
    let mut seen_non_import = false;

    for stmt in statements {
        match stmt {
            Statement::Comment(_) => {}
            Statement::Import(imp) => {
                if seen_non_import {
                    diagnostics.push(Diagnostic::error(
                        "import-order",
                        "Import statements must appear at the top of the file",
                        imp.span,
                    ));
                }
                if registry.skills.contains_key(&imp.skill_name) {
                    diagnostics.push(Diagnostic::error(
                        "duplicate-skill",
                        format!("duplicate skill name '{}'", imp.skill_name),
                        imp.span,
                    ));
                } else {
                    registry.skills.insert(imp.skill_name.clone(), imp.span);
                }
                let recognized_prefix = ["github:", "npm:", "./", "../", "/"]
                    .iter()
                    .any(|p| imp.source.starts_with(p));
                if !recognized_prefix {
                    diagnostics.push(Diagnostic::warning(
                        "unusual-import-source",
                        format!("unusual import source '{}'", imp.source),
                        imp.span,
                    ));
                }
            }
            Statement::AgentDefinition(def) => {
                seen_non_import = true;
                check_namespace_collision(&registry, &def.name, def.span, "agent", diagnostics);
                if registry.agents.contains_key(&def.name) {
                    diagnostics.push(Diagnostic::error(
                        "duplicate-agent",
                        format!("duplicate agent definition '{}'", def.name),
                        def.span,
                    ));
                } else {
                    registry.agents.insert(def.name.clone(), def.span);
                }
                validate_agent_properties(def, &registry, diagnostics);
            }
            Statement::BlockDefinition(def) => {
                seen_non_import = true;
                check_namespace_collision(&registry, &def.name, def.span, "block", diagnostics);
                if registry.blocks.contains_key(&def.name) {
                    diagnostics.push(Diagnostic::error(
                        "duplicate-block",
                        format!("duplicate block definition '{}'", def.name),
                        def.span,
                    ));
                } else {
                    registry.blocks.insert(def.name.clone(), (def.span, def.params.len()));
                }
                let mut seen_params = HashSet::new();
                for p in &def.params {
                    if !seen_params.insert(p.clone()) {
                        diagnostics.push(Diagnostic::error(
                            "duplicate-param",
                            format!("duplicate parameter name '{}'", p),
                            def.span,
                        ));
                    }
                }
                if def.body.is_empty() {
                    diagnostics.push(Diagnostic::error(
                        "empty-block-body",
                        format!("block '{}' has an empty body", def.name),
                        def.span,
                    ));
                }
            }
            _ => seen_non_import = true,
        }
    }

    registry
}

fn check_namespace_collision(registry: &GlobalRegistry, name: &str, span: Span, kind: &str, diagnostics: &mut Vec<Diagnostic>) {
    let collides = match kind {
        "agent" => registry.blocks.contains_key(name) || registry.skills.contains_key(name),
        "block" => registry.agents.contains_key(name) || registry.skills.contains_key(name),
        _ => false,
    };
    if collides {
        diagnostics.push(Diagnostic::error(
            "namespace-collision",
            format!("'{}' collides with a name in another namespace", name),
            span,
        ));
    }
}

fn check_duplicate_properties(properties: &[Property], diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for p in properties {
        if !seen.insert(p.name.clone()) {
            diagnostics.push(Diagnostic::error(
                "duplicate-property",
                format!("duplicate property '{}'", p.name),
                p.span,
            ));
        }
    }
}

const KNOWN_PROPERTY_NAMES: &[&str] = &["model", "prompt", "skills", "permissions", "context", "retry", "backoff"];
const KNOWN_PERMISSION_KEYS: &[&str] = &["read", "write", "bash", "network", "edit"];

fn validate_agent_properties(def: &AgentDefinition, registry: &GlobalRegistry, diagnostics: &mut Vec<Diagnostic>) {
    check_duplicate_properties(&def.properties, diagnostics);
    check_shared_properties(&def.properties, registry, diagnostics);

    let model = def.properties.iter().find(|p| p.name == "model");
    match model {
        None => diagnostics.push(Diagnostic::error("missing-model", "agent requires a 'model' property", def.span)),
        Some(p) => match &p.value {
            Expr::Identifier(id) if ["sonnet", "opus", "haiku"].contains(&id.name.as_str()) => {}
            _ => diagnostics.push(Diagnostic::error(
                "invalid-model",
                "model must be one of 'sonnet', 'opus', 'haiku'",
                p.span,
            )),
        },
    }

    let prompt = def.properties.iter().find(|p| p.name == "prompt");
    match prompt {
        None => diagnostics.push(Diagnostic::error("missing-prompt", "agent requires a 'prompt' property", def.span)),
        Some(p) if !matches!(p.value, Expr::StringLiteral(_)) => {
            diagnostics.push(Diagnostic::error("invalid-prompt", "prompt must be a string", p.span))
        }
        _ => {}
    }
}

/// Checks shared across agent and session property lists that don't need
/// scope access: `skills`, `permissions`, `retry`, `backoff`, and the
/// generic "unknown property" warning. `context` is scope-sensitive and is
/// validated separately during the traversal pass.
fn check_shared_properties(properties: &[Property], registry: &GlobalRegistry, diagnostics: &mut Vec<Diagnostic>) {
    for p in properties {
        match p.name.as_str() {
            "skills" => check_skills_value(&p.value, registry, diagnostics),
            "permissions" => check_permissions_value(&p.value, diagnostics),
            "retry" => check_retry_value(&p.value, diagnostics),
            "backoff" => check_backoff_value(&p.value, diagnostics),
            "model" | "prompt" | "context" => {}
            other => diagnostics.push(Diagnostic::warning(
                "unknown-property",
                format!("unknown property '{}'", other),
                p.span,
            )),
        }
    }
}

fn check_skills_value(value: &Expr, registry: &GlobalRegistry, diagnostics: &mut Vec<Diagnostic>) {
    match value {
        Expr::Array(arr) => {
            if arr.elements.is_empty() {
                diagnostics.push(Diagnostic::warning("empty-skills", "empty skills array", arr.span));
            }
            let mut seen = HashSet::new();
            for el in &arr.elements {
                match el {
                    Expr::StringLiteral(s) => {
                        if !seen.insert(s.value.clone()) {
                            diagnostics.push(Diagnostic::error(
                                "duplicate-skill-reference",
                                format!("duplicate skill name '{}'", s.value),
                                s.span,
                            ));
                        }
                        if !registry.skills.contains_key(&s.value) {
                            diagnostics.push(Diagnostic::warning(
                                "unimported-skill",
                                format!("skill '{}' was not previously imported", s.value),
                                s.span,
                            ));
                        }
                    }
                    other => diagnostics.push(Diagnostic::error(
                        "invalid-skills-element",
                        "skills array elements must be strings",
                        other.span(),
                    )),
                }
            }
        }
        other => diagnostics.push(Diagnostic::error(
            "invalid-skills",
            "skills must be an array of strings",
            other.span(),
        )),
    }
}

fn check_permissions_value(value: &Expr, diagnostics: &mut Vec<Diagnostic>) {
    match value {
        Expr::Object(obj) => {
            for p in &obj.properties {
                if !KNOWN_PERMISSION_KEYS.contains(&p.name.as_str()) {
                    diagnostics.push(Diagnostic::warning(
                        "unknown-permission-token",
                        format!("unknown permission token '{}'", p.name),
                        p.span,
                    ));
                }
            }
        }
        other => diagnostics.push(Diagnostic::error(
            "invalid-permissions",
            "permissions must be a nested object",
            other.span(),
        )),
    }
}

fn check_retry_value(value: &Expr, diagnostics: &mut Vec<Diagnostic>) {
    match value {
        Expr::NumberLiteral(n) => {
            if n.value.fract() != 0.0 || n.value <= 0.0 {
                diagnostics.push(Diagnostic::error("invalid-retry", "retry must be a positive integer", n.span));
            } else if n.value > 10.0 {
                diagnostics.push(Diagnostic::warning(
                    "high-retry",
                    "retry value is unusually high (>10)",
                    n.span,
                ));
            }
        }
        other => diagnostics.push(Diagnostic::error("invalid-retry", "retry must be a number", other.span())),
    }
}

fn check_backoff_value(value: &Expr, diagnostics: &mut Vec<Diagnostic>) {
    match value {
        Expr::StringLiteral(s) if ["none", "linear", "exponential"].contains(&s.value.as_str()) => {}
        Expr::NumberLiteral(n) if n.value >= 0.0 => {}
        other => diagnostics.push(Diagnostic::error(
            "invalid-backoff",
            "backoff must be 'none', 'linear', 'exponential', or a non-negative number of milliseconds",
            other.span(),
        )),
    }
}

static COMMENT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(TODO|FIXME|HACK)\b").unwrap());

fn check_comments(comments: &[CommentNode], diagnostics: &mut Vec<Diagnostic>) {
    for c in comments {
        if COMMENT_MARKER.is_match(&c.text) {
            diagnostics.push(Diagnostic::warning(
                "comment-marker",
                "comment contains a TODO/FIXME/HACK marker",
                c.span,
            ));
        }
    }
}

// ---- misplaced top-level-only definitions ----

fn nested_bodies_of(stmt: &Statement) -> Vec<&[Statement]> {
    match stmt {
        Statement::BlockDefinition(b) => vec![&b.body],
        Statement::DoBlock(b) => vec![&b.body],
        Statement::ParallelBlock(b) => vec![&b.body],
        Statement::RepeatBlock(b) => vec![&b.body],
        Statement::ForEachBlock(b) => vec![&b.body],
        Statement::LoopBlock(b) => vec![&b.body],
        Statement::TryBlock(b) => {
            let mut v = vec![b.body.as_slice()];
            if let Some(c) = &b.catch {
                v.push(&c.body);
            }
            if let Some(f) = &b.finally {
                v.push(f);
            }
            v
        }
        Statement::ChoiceBlock(b) => b.options.iter().map(|o| o.body.as_slice()).collect(),
        Statement::IfStatement(s) => {
            let mut v = vec![s.body.as_slice()];
            for e in &s.elifs {
                v.push(&e.body);
            }
            if let Some(eb) = &s.else_body {
                v.push(eb);
            }
            v
        }
        Statement::PipeExpression(p) => p.operations.iter().map(|o| o.body.as_slice()).collect(),
        _ => Vec::new(),
    }
}

fn scan_nested_bodies(statements: &[Statement], diagnostics: &mut Vec<Diagnostic>) {
    for stmt in statements {
        match stmt {
            Statement::AgentDefinition(def) => diagnostics.push(Diagnostic::error(
                "nested-agent-definition",
                format!("agent '{}' must be defined at the top level", def.name),
                def.span,
            )),
            Statement::BlockDefinition(def) => diagnostics.push(Diagnostic::error(
                "nested-block-definition",
                format!("block '{}' must be defined at the top level", def.name),
                def.span,
            )),
            _ => {}
        }
        for body in nested_bodies_of(stmt) {
            scan_nested_bodies(body, diagnostics);
        }
    }
}

fn has_unclosed_brace(raw: &str) -> bool {
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '{' if chars.get(i + 1) == Some(&'{') => i += 2,
            '}' if chars.get(i + 1) == Some(&'}') => i += 2,
            '{' => {
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    match chars[j] {
                        '\\' => j += 2,
                        '}' if chars.get(j + 1) == Some(&'}') => j += 2,
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' if chars.get(j + 1) == Some(&'{') => j += 2,
                        '{' => break,
                        _ => j += 1,
                    }
                }
                if !closed {
                    return true;
                }
                i = j + 1;
            }
            _ => i += 1,
        }
    }
    false
}

// ---- pass two: scope-aware traversal ----

struct Validator {
    registry: GlobalRegistry,
    scope: ScopeStack,
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn report_define_outcome(&mut self, outcome: crate::scope::DefineOutcome, name: &str, span: Span) {
        use crate::scope::DefineOutcome::*;
        match outcome {
            Defined => {}
            DefinedWithShadow => self.diagnostics.push(Diagnostic::warning(
                "shadowed-binding",
                format!("'{}' shadows a binding in an enclosing scope", name),
                span,
            )),
            DuplicateInScope => self.diagnostics.push(Diagnostic::error(
                "duplicate-definition",
                format!("'{}' is already defined in this scope", name),
                span,
            )),
        }
    }

    fn check_variable_namespace(&mut self, name: &str, span: Span) {
        if self.registry.agents.contains_key(name) || self.registry.blocks.contains_key(name) {
            self.diagnostics.push(Diagnostic::error(
                "namespace-collision",
                format!("'{}' collides with a name in another namespace", name),
                span,
            ));
        }
    }

    fn resolve_var(&mut self, id: &IdentifierExpr) {
        if self.scope.lookup(&id.name).is_none() {
            self.diagnostics.push(Diagnostic::error(
                "undefined-variable",
                format!("undefined variable '{}'", id.name),
                id.span,
            ));
        }
    }

    fn check_discretion_length(&mut self, d: &DiscretionExpr) {
        let trimmed = d.text.trim();
        let significant = trimmed.chars().filter(|c| !c.is_whitespace()).count();
        if significant == 0 {
            self.diagnostics.push(Diagnostic::error(
                "empty-discretion",
                "discretion condition must not be empty",
                d.span,
            ));
        } else if significant < 3 {
            self.diagnostics.push(Diagnostic::warning(
                "short-discretion",
                "discretion condition is very short or ambiguous",
                d.span,
            ));
        }
    }

    fn check_string_literal(&mut self, s: &StringLiteral) {
        for interp in &s.metadata.interpolations {
            if self.scope.lookup(&interp.var_name).is_none() {
                self.diagnostics.push(Diagnostic::error(
                    "undefined-interpolation-variable",
                    format!("undefined variable '{}' in string interpolation", interp.var_name),
                    interp.span,
                ));
            }
        }
        if has_unclosed_brace(&s.metadata.raw) {
            self.diagnostics.push(Diagnostic::error(
                "unclosed-interpolation-brace",
                "unclosed '{' with no matching '}' in string literal",
                s.span,
            ));
        }
        if s.value.chars().count() > 4000 {
            self.diagnostics.push(Diagnostic::warning(
                "long-prompt",
                "unusually long prompt text",
                s.span,
            ));
        }
    }

    fn check_context_value(&mut self, value: &Expr) {
        match value {
            Expr::Identifier(id) => self.resolve_var(id),
            Expr::Array(arr) => {
                for el in &arr.elements {
                    match el {
                        Expr::Identifier(id) => self.resolve_var(id),
                        other => self.diagnostics.push(Diagnostic::error(
                            "invalid-context-element",
                            "context array elements must be identifiers",
                            other.span(),
                        )),
                    }
                }
            }
            Expr::Object(obj) => {
                for p in &obj.properties {
                    if let Expr::Identifier(id) = &p.value {
                        self.resolve_var(id);
                    }
                }
            }
            other => self.diagnostics.push(Diagnostic::error(
                "invalid-context",
                "context must be an identifier, an array, or an object",
                other.span(),
            )),
        }
    }

    fn traverse_statements(&mut self, body: &[Statement], mode: DefineMode, parallel_direct: bool) {
        for stmt in body {
            match stmt {
                Statement::LetBinding(b) => self.handle_let(b, mode),
                Statement::ConstBinding(b) => self.handle_const(b, mode),
                Statement::Assignment(a) => self.handle_assignment(a, mode, parallel_direct),
                other => self.visit_statement(other),
            }
        }
    }

    fn define_with_mode(&mut self, name: String, is_const: bool, span: Span, mode: DefineMode) -> crate::scope::DefineOutcome {
        match mode {
            DefineMode::Local => self.scope.define_in_current(name, is_const, span),
            DefineMode::EscapeToParent => self.scope.define_in_escape_target(name, is_const, span),
            DefineMode::AnonymousDo => self.scope.define_in_anonymous_do(name, is_const, span).0,
        }
    }

    fn handle_let(&mut self, b: &LetBinding, mode: DefineMode) {
        self.visit_expr_for_refs(&b.value);
        self.check_variable_namespace(&b.name, b.span);
        let outcome = self.define_with_mode(b.name.clone(), false, b.span, mode);
        self.report_define_outcome(outcome, &b.name, b.span);
    }

    fn handle_const(&mut self, b: &ConstBinding, mode: DefineMode) {
        self.visit_expr_for_refs(&b.value);
        self.check_variable_namespace(&b.name, b.span);
        let outcome = self.define_with_mode(b.name.clone(), true, b.span, mode);
        self.report_define_outcome(outcome, &b.name, b.span);
    }

    fn handle_assignment(&mut self, a: &Assignment, mode: DefineMode, parallel_direct: bool) {
        self.visit_expr_for_refs(&a.value);
        if parallel_direct && self.scope.lookup(&a.name).is_none() {
            self.check_variable_namespace(&a.name, a.span);
            let outcome = self.define_with_mode(a.name.clone(), false, a.span, mode);
            self.report_define_outcome(outcome, &a.name, a.span);
            return;
        }
        match self.scope.lookup(&a.name) {
            None => self.diagnostics.push(Diagnostic::error(
                "undefined-assignment-target",
                format!("cannot assign to undefined variable '{}'", a.name),
                a.span,
            )),
            Some(binding) if binding.is_const => self.diagnostics.push(Diagnostic::error(
                "const-reassignment",
                format!("cannot reassign const '{}'", a.name),
                a.span,
            )),
            Some(_) => {}
        }
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Comment(_) | Statement::Import(_) => {}
            Statement::AgentDefinition(def) => self.check_agent_prompt(def),
            Statement::BlockDefinition(def) => {
                self.scope.push(ScopeKind::Function);
                for p in &def.params {
                    let outcome = self.scope.define_in_current(p.clone(), true, def.span);
                    self.report_define_outcome(outcome, p, def.span);
                }
                self.traverse_statements(&def.body, DefineMode::Local, false);
                self.scope.pop();
            }
            Statement::Session(session) => self.check_session(session),
            Statement::DoBlock(block) => self.check_do(block),
            Statement::ParallelBlock(block) => self.check_parallel(block),
            Statement::RepeatBlock(block) => self.check_repeat(block),
            Statement::ForEachBlock(block) => self.check_for_each(block),
            Statement::LoopBlock(block) => self.check_loop(block),
            Statement::TryBlock(block) => self.check_try(block),
            Statement::ThrowStatement(stmt) => self.check_throw(stmt),
            Statement::ChoiceBlock(block) => self.check_choice(block),
            Statement::IfStatement(stmt) => self.check_if(stmt),
            Statement::ArrowExpression(a) => {
                self.visit_expr_for_refs(&a.left);
                self.visit_expr_for_refs(&a.right);
            }
            Statement::PipeExpression(p) => self.check_pipe(p),
            // Reached only defensively; traverse_statements intercepts these.
            Statement::LetBinding(b) => self.handle_let(b, DefineMode::Local),
            Statement::ConstBinding(b) => self.handle_const(b, DefineMode::Local),
            Statement::Assignment(a) => self.handle_assignment(a, DefineMode::Local, false),
        }
    }

    fn visit_expr_for_refs(&mut self, expr: &Expr) {
        match expr {
            Expr::StringLiteral(s) => self.check_string_literal(s),
            Expr::NumberLiteral(_) => {}
            Expr::Identifier(id) => self.resolve_var(id),
            Expr::Discretion(d) => self.check_discretion_length(d),
            Expr::Array(a) => {
                for e in &a.elements {
                    self.visit_expr_for_refs(e);
                }
            }
            Expr::Object(o) => {
                for p in &o.properties {
                    self.visit_expr_for_refs(&p.value);
                }
            }
            Expr::Session(s) => self.check_session(s),
            Expr::Do(d) => self.check_do(d),
            Expr::Parallel(p) => self.check_parallel(p),
            Expr::Try(t) => self.check_try(t),
            Expr::Loop(l) => self.check_loop(l),
            Expr::Choice(c) => self.check_choice(c),
            Expr::If(i) => self.check_if(i),
            Expr::Arrow(a) => {
                self.visit_expr_for_refs(&a.left);
                self.visit_expr_for_refs(&a.right);
            }
            Expr::Pipe(p) => self.check_pipe(p),
        }
    }

    /// Agent prompts get the same string-literal treatment as session
    /// prompts (interpolation resolution, unclosed-brace check,
    /// long-prompt warning) — spec.md's interpolation rule applies to
    /// every string literal, with no carve-out for this property.
    /// Existence and type are already enforced by
    /// `validate_agent_properties` in pass one.
    fn check_agent_prompt(&mut self, def: &AgentDefinition) {
        if let Some(p) = def.properties.iter().find(|p| p.name == "prompt") {
            if let Expr::StringLiteral(s) = &p.value {
                self.check_string_literal(s);
            }
        }
    }

    fn check_session(&mut self, session: &Session) {
        if let Some(agent_ref) = &session.agent_ref {
            if !self.registry.agents.contains_key(&agent_ref.name) {
                self.diagnostics.push(Diagnostic::error(
                    "undefined-agent",
                    format!("undefined agent '{}'", agent_ref.name),
                    agent_ref.span,
                ));
            }
        }

        check_duplicate_properties(&session.properties, &mut self.diagnostics);
        check_shared_properties(&session.properties, &self.registry, &mut self.diagnostics);

        let prompt_property = session.properties.iter().find(|p| p.name == "prompt");
        if session.agent_ref.is_none() && session.inline_prompt.is_none() && prompt_property.is_none() {
            self.diagnostics.push(Diagnostic::error(
                "missing-prompt",
                "session requires a prompt (inline or property) or an agent reference",
                session.span,
            ));
        }
        if session.inline_prompt.is_some() && prompt_property.is_some() {
            self.diagnostics.push(Diagnostic::warning(
                "duplicate-prompt",
                "both an inline prompt and a 'prompt' property are specified",
                session.span,
            ));
        }

        if let Some(prompt) = &session.inline_prompt {
            self.check_string_literal(prompt);
        }
        for p in &session.properties {
            match p.name.as_str() {
                "prompt" => {
                    if let Expr::StringLiteral(s) = &p.value {
                        self.check_string_literal(s);
                    } else {
                        self.diagnostics.push(Diagnostic::error("invalid-prompt", "prompt must be a string", p.span));
                    }
                }
                "context" => self.check_context_value(&p.value),
                _ => {}
            }
        }
    }

    fn check_do(&mut self, block: &DoBlock) {
        if block.is_invocation() {
            let name = block.name.as_ref().unwrap();
            match self.registry.blocks.get(name) {
                None => self.diagnostics.push(Diagnostic::error(
                    "undefined-block",
                    format!("undefined block '{}'", name),
                    block.span,
                )),
                Some((_, param_count)) if *param_count != block.args.len() => {
                    self.diagnostics.push(Diagnostic::error(
                        "arity-mismatch",
                        format!(
                            "block '{}' expects {} argument(s), found {}",
                            name,
                            param_count,
                            block.args.len()
                        ),
                        block.span,
                    ));
                }
                Some(_) => {}
            }
            for arg in &block.args {
                self.visit_expr_for_refs(arg);
            }
        } else {
            self.scope.push(ScopeKind::AnonymousDo);
            self.traverse_statements(&block.body, DefineMode::AnonymousDo, false);
            self.scope.pop();
        }
    }

    fn check_parallel(&mut self, block: &ParallelBlock) {
        match block.strategy {
            Some(ParallelStrategy::First) | Some(ParallelStrategy::Any) if block.body.len() < 2 => {
                self.diagnostics.push(Diagnostic::error(
                    "insufficient-branches",
                    "'first'/'any' parallel strategy requires at least two branches",
                    block.span,
                ));
            }
            _ => {}
        }
        if let Some(count) = block.count {
            match block.strategy {
                Some(ParallelStrategy::Any) => {
                    if count < 1 {
                        self.diagnostics.push(Diagnostic::error(
                            "invalid-count",
                            "'count' must be at least 1",
                            block.span,
                        ));
                    } else if (count as usize) > block.body.len() {
                        self.diagnostics.push(Diagnostic::warning(
                            "count-exceeds-branches",
                            "'count' exceeds the number of branches",
                            block.span,
                        ));
                    }
                }
                _ => self.diagnostics.push(Diagnostic::error(
                    "invalid-count-modifier",
                    "'count' is only valid with the 'any' strategy",
                    block.span,
                )),
            }
        }

        self.scope.push(ScopeKind::Block);
        self.traverse_statements(&block.body, DefineMode::EscapeToParent, true);
        self.scope.pop();
    }

    fn check_repeat(&mut self, block: &RepeatBlock) {
        match &block.count {
            Expr::NumberLiteral(n) => {
                if n.value.fract() != 0.0 || n.value <= 0.0 {
                    self.diagnostics.push(Diagnostic::error(
                        "invalid-repeat-count",
                        "repeat count must be a positive integer",
                        n.span,
                    ));
                }
            }
            Expr::Identifier(id) => self.resolve_var(id),
            other => self.diagnostics.push(Diagnostic::error(
                "invalid-repeat-count",
                "repeat count must be a positive integer literal or a variable",
                other.span(),
            )),
        }

        self.scope.push(ScopeKind::Loop);
        if let Some(b) = &block.binding {
            let outcome = self.scope.define_in_current(b.clone(), true, block.span);
            self.report_define_outcome(outcome, b, block.span);
        }
        self.traverse_statements(&block.body, DefineMode::Local, false);
        self.scope.pop();
    }

    fn check_for_each(&mut self, block: &ForEachBlock) {
        match &block.iterable {
            Expr::Identifier(id) => self.resolve_var(id),
            Expr::Array(arr) => {
                for el in &arr.elements {
                    if let Expr::Identifier(id) = el {
                        self.resolve_var(id);
                    }
                }
            }
            _ => {}
        }

        self.scope.push(ScopeKind::Loop);
        let item_outcome = self.scope.define_in_current(block.item.clone(), true, block.span);
        self.report_define_outcome(item_outcome, &block.item, block.span);
        if let Some(idx) = &block.index {
            let outcome = self.scope.define_in_current(idx.clone(), true, block.span);
            self.report_define_outcome(outcome, idx, block.span);
        }
        self.traverse_statements(&block.body, DefineMode::Local, false);
        self.scope.pop();
    }

    fn check_loop(&mut self, block: &LoopBlock) {
        if let Some(condition) = &block.condition {
            self.check_discretion_length(&condition.discretion);
        }
        if block.condition.is_none() && block.max.is_none() {
            self.diagnostics.push(Diagnostic::warning(
                "unbounded-loop",
                "loop has no 'max' modifier and may run unbounded",
                block.span,
            ));
        }
        if let Some(max) = block.max {
            if max == 0 {
                self.diagnostics.push(Diagnostic::error("invalid-max", "'max' must be a positive integer", block.span));
            }
        }

        self.scope.push(ScopeKind::Loop);
        if let Some(b) = &block.binding {
            let outcome = self.scope.define_in_current(b.clone(), true, block.span);
            self.report_define_outcome(outcome, b, block.span);
        }
        self.traverse_statements(&block.body, DefineMode::Local, false);
        self.scope.pop();
    }

    fn check_try(&mut self, block: &TryBlock) {
        self.scope.push(ScopeKind::Try);
        self.traverse_statements(&block.body, DefineMode::EscapeToParent, false);
        self.scope.pop();

        if let Some(catch) = &block.catch {
            self.scope.push(ScopeKind::Catch);
            if let Some(b) = &catch.binding {
                // The caught error variable is local to catch, unlike the
                // rest of catch's own let/const bindings.
                self.scope.define_in_current(b.clone(), false, catch.span);
            }
            self.traverse_statements(&catch.body, DefineMode::EscapeToParent, false);
            self.scope.pop();
        }
        if let Some(finally) = &block.finally {
            self.scope.push(ScopeKind::Block);
            self.traverse_statements(finally, DefineMode::EscapeToParent, false);
            self.scope.pop();
        }
    }

    fn check_throw(&mut self, stmt: &ThrowStatement) {
        self.visit_expr_for_refs(&stmt.message);
        if let Expr::StringLiteral(s) = &stmt.message {
            if s.value.trim().is_empty() {
                self.diagnostics.push(Diagnostic::warning("empty-throw", "throw message is empty", s.span));
            }
        }
    }

    fn check_choice(&mut self, block: &ChoiceBlock) {
        self.check_discretion_length(&block.condition);
        if block.options.is_empty() {
            self.diagnostics.push(Diagnostic::error(
                "empty-choice",
                "choice requires at least one option",
                block.span,
            ));
        }
        let mut seen_labels = HashSet::new();
        for option in &block.options {
            if !seen_labels.insert(option.label.clone()) {
                self.diagnostics.push(Diagnostic::warning(
                    "duplicate-option-label",
                    format!("duplicate choice option label '{}'", option.label),
                    option.span,
                ));
            }
            self.scope.push(ScopeKind::ChoiceOption);
            self.traverse_statements(&option.body, DefineMode::Local, false);
            self.scope.pop();
        }
    }

    fn check_if(&mut self, stmt: &IfStatement) {
        self.check_discretion_length(&stmt.condition);
        self.scope.push(ScopeKind::Block);
        self.traverse_statements(&stmt.body, DefineMode::EscapeToParent, false);
        self.scope.pop();

        for elif in &stmt.elifs {
            self.check_discretion_length(&elif.condition);
            self.scope.push(ScopeKind::Block);
            self.traverse_statements(&elif.body, DefineMode::EscapeToParent, false);
            self.scope.pop();
        }

        if let Some(else_body) = &stmt.else_body {
            self.scope.push(ScopeKind::Block);
            self.traverse_statements(else_body, DefineMode::EscapeToParent, false);
            self.scope.pop();
        }
    }

    fn check_pipe(&mut self, pipe: &PipeExpression) {
        self.visit_expr_for_refs(&pipe.input);
        for op in &pipe.operations {
            self.scope.push(ScopeKind::Function);
            for p in &op.params {
                let outcome = self.scope.define_in_current(p.clone(), true, op.span);
                self.report_define_outcome(outcome, p, op.span);
            }
            self.traverse_statements(&op.body, DefineMode::Local, false);
            self.scope.pop();
        }
    }
}
