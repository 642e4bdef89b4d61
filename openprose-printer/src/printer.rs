//! Canonical pretty-printer.
//!
//! Reserializes a [`Program`] to normalized source text: one statement per
//! line, two-space indentation by default, properties on their own
//! indented lines, string values re-escaped to their most compact valid
//! form. Grounded on `LexSerializer` in
//! `lex-babel/src/formats/lex/serializer.rs` — the one teacher format that
//! round-trips the source language itself rather than exporting to an
//! unrelated target.

use serde::{Deserialize, Serialize};

use openprose_parser::ast::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterOptions {
    pub preserve_comments: bool,
    /// Reserved per spec.md §6's recognized option set. The only layout
    /// this printer produces is the canonical one described in §4.4, so
    /// this currently has no effect; kept so callers needn't special-case
    /// the option's absence.
    pub pretty_print: bool,
    pub indent: String,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            preserve_comments: false,
            pretty_print: true,
            indent: "  ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintResult {
    pub code: String,
    pub stripped_comments: Vec<CommentNode>,
}

pub fn print_program(program: &Program, options: &PrinterOptions) -> PrintResult {
    let mut printer = Printer::new(program, options);
    printer.print_statements(&program.statements, 0);
    PrintResult {
        code: printer.buf,
        stripped_comments: program.comments.clone(),
    }
}

struct Printer<'a> {
    options: &'a PrinterOptions,
    buf: String,
    inline_comments: std::collections::VecDeque<CommentNode>,
}

impl<'a> Printer<'a> {
    fn new(program: &Program, options: &'a PrinterOptions) -> Self {
        let mut inline: Vec<CommentNode> = program.comments.iter().filter(|c| c.inline).cloned().collect();
        inline.sort_by_key(|c| c.span.start.offset);
        Self {
            options,
            buf: String::new(),
            inline_comments: inline.into(),
        }
    }

    fn indent_str(&self, level: usize) -> String {
        self.options.indent.repeat(level)
    }

    fn write_line(&mut self, indent: usize, text: &str) {
        self.buf.push_str(&self.indent_str(indent));
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    fn attach_inline_comment(&mut self, lower: usize, upper: usize) {
        if !self.options.preserve_comments {
            return;
        }
        if let Some(front) = self.inline_comments.front() {
            if front.span.start.offset > lower && front.span.start.offset < upper {
                let c = self.inline_comments.pop_front().unwrap();
                if self.buf.ends_with('\n') {
                    self.buf.pop();
                }
                self.buf.push_str("  # ");
                self.buf.push_str(&c.text);
                self.buf.push('\n');
            }
        }
    }

    fn print_statements(&mut self, statements: &[Statement], indent: usize) {
        for (i, stmt) in statements.iter().enumerate() {
            self.print_statement(stmt, indent);
            let upper = statements.get(i + 1).map(|s| s.span().start.offset).unwrap_or(usize::MAX);
            self.attach_inline_comment(stmt.span().start.offset, upper);
        }
    }

    fn print_statement(&mut self, stmt: &Statement, indent: usize) {
        match stmt {
            Statement::Comment(node) => {
                if self.options.preserve_comments {
                    self.write_line(indent, &format!("# {}", node.text));
                }
            }
            Statement::Import(imp) => {
                self.write_line(indent, &format!("import {} from {}", quote(&imp.skill_name, false), quote(&imp.source, false)));
            }
            Statement::AgentDefinition(def) => {
                self.write_line(indent, &format!("agent {}:", def.name));
                for p in &def.properties {
                    self.print_property(p, indent + 1);
                }
            }
            Statement::Session(s) => self.print_session(s, indent, ""),
            Statement::DoBlock(d) => self.print_do(d, indent, ""),
            Statement::ParallelBlock(p) => self.print_parallel(p, indent, ""),
            Statement::RepeatBlock(r) => self.print_repeat(r, indent, ""),
            Statement::ForEachBlock(f) => self.print_for_each(f, indent, ""),
            Statement::LoopBlock(l) => self.print_loop(l, indent, ""),
            Statement::TryBlock(t) => self.print_try(t, indent, ""),
            Statement::ThrowStatement(t) => {
                self.write_line(indent, &format!("throw {}", self.render_inline_expr(&t.message)));
            }
            Statement::ChoiceBlock(c) => self.print_choice(c, indent, ""),
            Statement::IfStatement(s) => self.print_if(s, indent, ""),
            Statement::ArrowExpression(a) => {
                let text = self.render_arrow_chain(a);
                self.write_line(indent, &text);
            }
            Statement::LetBinding(b) => self.print_value(&b.value, indent, &format!("let {} = ", b.name)),
            Statement::ConstBinding(b) => self.print_value(&b.value, indent, &format!("const {} = ", b.name)),
            Statement::Assignment(a) => self.print_value(&a.value, indent, &format!("{} = ", a.name)),
            Statement::PipeExpression(p) => self.print_pipe(p, indent, ""),
        }
    }

    /// Renders a value-position expression. Composite constructs (session,
    /// do, parallel, try, loop, choice, if, pipe) that can also stand alone
    /// as statements get the same multi-line rendering here, prefixed with
    /// e.g. `"let r = "`.
    fn print_value(&mut self, value: &Expr, indent: usize, prefix: &str) {
        match value {
            Expr::Session(s) => self.print_session(s, indent, prefix),
            Expr::Do(d) => self.print_do(d, indent, prefix),
            Expr::Parallel(p) => self.print_parallel(p, indent, prefix),
            Expr::Try(t) => self.print_try(t, indent, prefix),
            Expr::Loop(l) => self.print_loop(l, indent, prefix),
            Expr::Choice(c) => self.print_choice(c, indent, prefix),
            Expr::If(s) => self.print_if(s, indent, prefix),
            Expr::Pipe(p) => self.print_pipe(p, indent, prefix),
            Expr::Arrow(a) => {
                let text = format!("{}{}", prefix, self.render_arrow_chain(a));
                self.write_line(indent, &text);
            }
            other => {
                let text = format!("{}{}", prefix, self.render_inline_expr(other));
                self.write_line(indent, &text);
            }
        }
    }

    fn session_header(&self, s: &Session) -> String {
        if let Some(prompt) = &s.inline_prompt {
            format!("session {}", print_string_literal(prompt))
        } else {
            let agent = s.agent_ref.as_ref().map(|a| a.name.as_str()).unwrap_or("");
            match &s.label {
                Some(label) => format!("session {}: {}", label, agent),
                None => format!("session: {}", agent),
            }
        }
    }

    fn print_session(&mut self, s: &Session, indent: usize, prefix: &str) {
        let text = format!("{}{}", prefix, self.session_header(s));
        self.write_line(indent, &text);
        for p in &s.properties {
            self.print_property(p, indent + 1);
        }
    }

    fn print_do(&mut self, d: &DoBlock, indent: usize, prefix: &str) {
        if d.is_invocation() {
            let args = self.join_inline(&d.args);
            let text = format!("{}do {}({})", prefix, d.name.as_ref().unwrap(), args);
            self.write_line(indent, &text);
        } else {
            self.write_line(indent, &format!("{}do:", prefix));
            self.print_statements(&d.body, indent + 1);
        }
    }

    fn parallel_modifiers(&self, p: &ParallelBlock) -> String {
        let mut parts = Vec::new();
        if let Some(strategy) = p.strategy {
            let s = match strategy {
                ParallelStrategy::All => "all",
                ParallelStrategy::First => "first",
                ParallelStrategy::Any => "any",
            };
            parts.push(quote(s, false));
        }
        if let Some(count) = p.count {
            parts.push(format!("count: {}", count));
        }
        if let Some(on_fail) = &p.on_fail {
            parts.push(format!("on-fail: {}", quote(on_fail, false)));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }

    fn print_parallel(&mut self, p: &ParallelBlock, indent: usize, prefix: &str) {
        let text = format!("{}parallel{}:", prefix, self.parallel_modifiers(p));
        self.write_line(indent, &text);
        self.print_statements(&p.body, indent + 1);
    }

    fn print_repeat(&mut self, r: &RepeatBlock, indent: usize, prefix: &str) {
        let count = self.render_inline_expr(&r.count);
        let binding = r.binding.as_ref().map(|b| format!(" as {}", b)).unwrap_or_default();
        self.write_line(indent, &format!("{}repeat {}{}:", prefix, count, binding));
        self.print_statements(&r.body, indent + 1);
    }

    fn print_for_each(&mut self, f: &ForEachBlock, indent: usize, prefix: &str) {
        let keyword = if f.is_parallel { "parallel for" } else { "for" };
        let index = f.index.as_ref().map(|i| format!(", {}", i)).unwrap_or_default();
        let iterable = self.render_inline_expr(&f.iterable);
        self.write_line(indent, &format!("{}{} {}{} in {}:", prefix, keyword, f.item, index, iterable));
        self.print_statements(&f.body, indent + 1);
    }

    fn loop_header(&self, l: &LoopBlock) -> String {
        let condition = match &l.condition {
            Some(c) => {
                let kw = match c.kind {
                    LoopConditionKind::Until => "until",
                    LoopConditionKind::While => "while",
                };
                format!(" {} {}", kw, render_discretion(&c.discretion))
            }
            None => String::new(),
        };
        let max = l.max.map(|m| format!(" (max: {})", m)).unwrap_or_default();
        let binding = l.binding.as_ref().map(|b| format!(" as {}", b)).unwrap_or_default();
        format!("loop{}{}{}:", condition, max, binding)
    }

    fn print_loop(&mut self, l: &LoopBlock, indent: usize, prefix: &str) {
        let text = format!("{}{}", prefix, self.loop_header(l));
        self.write_line(indent, &text);
        self.print_statements(&l.body, indent + 1);
    }

    fn print_try(&mut self, t: &TryBlock, indent: usize, prefix: &str) {
        self.write_line(indent, &format!("{}try:", prefix));
        self.print_statements(&t.body, indent + 1);
        if let Some(catch) = &t.catch {
            let binding = catch.binding.as_ref().map(|b| format!(" as {}", b)).unwrap_or_default();
            self.write_line(indent, &format!("catch{}:", binding));
            self.print_statements(&catch.body, indent + 1);
        }
        if let Some(finally) = &t.finally {
            self.write_line(indent, "finally:");
            self.print_statements(finally, indent + 1);
        }
    }

    fn print_choice(&mut self, c: &ChoiceBlock, indent: usize, prefix: &str) {
        self.write_line(indent, &format!("{}choice {}:", prefix, render_discretion(&c.condition)));
        for option in &c.options {
            self.write_line(indent + 1, &format!("option {}:", quote(&option.label, false)));
            self.print_statements(&option.body, indent + 2);
        }
    }

    fn print_if(&mut self, s: &IfStatement, indent: usize, prefix: &str) {
        self.write_line(indent, &format!("{}if {}:", prefix, render_discretion(&s.condition)));
        self.print_statements(&s.body, indent + 1);
        for elif in &s.elifs {
            self.write_line(indent, &format!("elif {}:", render_discretion(&elif.condition)));
            self.print_statements(&elif.body, indent + 1);
        }
        if let Some(else_body) = &s.else_body {
            self.write_line(indent, "else:");
            self.print_statements(else_body, indent + 1);
        }
    }

    fn pipe_op_header(&mut self, op: &PipeOperation) -> String {
        let name = match op.operator {
            PipeOperator::Map => "map",
            PipeOperator::Filter => "filter",
            PipeOperator::Reduce => "reduce",
            PipeOperator::Pmap => "pmap",
        };
        if op.params.is_empty() {
            format!("{}:", name)
        } else {
            format!("{}({}):", name, op.params.join(", "))
        }
    }

    fn print_pipe(&mut self, p: &PipeExpression, indent: usize, prefix: &str) {
        let input = format!("{}{}", prefix, self.render_arrow_operand(&p.input));
        self.write_line(indent, &input);
        for op in &p.operations {
            let header = self.pipe_op_header(op);
            self.write_line(indent + 1, &format!("| {}", header));
            self.print_statements(&op.body, indent + 2);
        }
    }

    fn print_property(&mut self, prop: &Property, indent: usize) {
        match &prop.value {
            Expr::Object(obj) if obj.is_shorthand => {
                let names: Vec<&str> = obj.properties.iter().map(|p| p.name.as_str()).collect();
                self.write_line(indent, &format!("{}: {{ {} }}", prop.name, names.join(", ")));
            }
            Expr::Object(obj) => {
                self.write_line(indent, &format!("{}:", prop.name));
                for p in &obj.properties {
                    self.print_property(p, indent + 1);
                }
            }
            other => {
                let rendered = self.render_inline_expr(other);
                self.write_line(indent, &format!("{}: {}", prop.name, rendered));
            }
        }
    }

    fn join_inline(&mut self, exprs: &[Expr]) -> String {
        exprs.iter().map(|e| self.render_inline_expr(e)).collect::<Vec<_>>().join(", ")
    }

    /// Renders a leaf-shaped expression (no own block body) to a single
    /// inline string: literals, identifiers, discretion markers, arrays,
    /// and inline objects.
    fn render_inline_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::StringLiteral(s) => print_string_literal(s),
            Expr::NumberLiteral(n) => format_number(n.value),
            Expr::Identifier(id) => id.name.clone(),
            Expr::Discretion(d) => render_discretion(d),
            Expr::Array(a) => format!("[{}]", self.join_inline(&a.elements)),
            Expr::Object(o) if o.is_shorthand => {
                let names: Vec<&str> = o.properties.iter().map(|p| p.name.as_str()).collect();
                format!("{{ {} }}", names.join(", "))
            }
            Expr::Object(o) => {
                let parts: Vec<String> = o
                    .properties
                    .iter()
                    .map(|p| format!("{}: {}", p.name, self.render_inline_expr(&p.value)))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            // Composite constructs have no single-line form; arrow/pipe
            // renderers route around this function for those. Reaching
            // here means a genuinely unsupported inline position.
            Expr::Session(_) | Expr::Do(_) | Expr::Parallel(_) | Expr::Try(_) | Expr::Loop(_) | Expr::Choice(_) | Expr::If(_) => {
                "# unsupported inline expression".to_string()
            }
            Expr::Arrow(a) => self.render_arrow_chain(a),
            Expr::Pipe(_) => "# unsupported inline expression".to_string(),
        }
    }

    /// An arrow/pipe operand: sessions and do-invocations flatten onto the
    /// same line; choice/if/try/loop/parallel have no such form, per
    /// spec.md's note that "parsing accepts them but the printer emits
    /// placeholders."
    fn render_arrow_operand(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Session(s) => self.session_header(s),
            Expr::Do(d) if d.is_invocation() => {
                let args = self.join_inline(&d.args);
                format!("do {}({})", d.name.as_ref().unwrap(), args)
            }
            Expr::Choice(_) | Expr::If(_) | Expr::Try(_) | Expr::Loop(_) | Expr::Parallel(_) => {
                "# unsupported arrow operand".to_string()
            }
            other => self.render_inline_expr(other),
        }
    }

    fn render_arrow_chain(&mut self, a: &ArrowExpression) -> String {
        format!("{} -> {}", self.render_arrow_side(&a.left), self.render_arrow_side(&a.right))
    }

    fn render_arrow_side(&mut self, e: &Expr) -> String {
        match e {
            Expr::Arrow(inner) => self.render_arrow_chain(inner),
            other => self.render_arrow_operand(other),
        }
    }
}

fn quote(s: &str, triple: bool) -> String {
    if triple {
        format!("\"\"\"{}\"\"\"", reescape(s, true))
    } else {
        format!("\"{}\"", reescape(s, false))
    }
}

fn print_string_literal(s: &StringLiteral) -> String {
    quote(&s.value, s.metadata.is_triple_quoted)
}

fn render_discretion(d: &DiscretionExpr) -> String {
    if d.multiline {
        format!("***{}***", d.text)
    } else {
        format!("**{}**", d.text)
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Decoded characters map back to their most compact valid form (spec.md
/// §4.4's re-escaping rule). Control bytes below `0x20` and `0x7F` become
/// `\u00XX`; everything else is emitted as-is, UTF-8 preserved.
fn reescape(value: &str, triple: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' if triple => out.push('\n'),
            '\n' => out.push_str("\\n"),
            '\r' if triple => out.push('\r'),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 || (c as u32) == 0x7F => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use openprose_parser::{parse, tokenize, LexOptions};

    fn print_source(src: &str, options: &PrinterOptions) -> String {
        let lexed = tokenize(src, &LexOptions::default());
        let parsed = parse(lexed.tokens);
        print_program(&parsed.program, options).code
    }

    #[test]
    fn inline_session_round_trips() {
        let printed = print_source(r#"session "Hello, world""#, &PrinterOptions::default());
        assert_eq!(printed, "session \"Hello, world\"\n");
    }

    #[test]
    fn agent_definition_prints_properties_on_their_own_lines() {
        let printed = print_source(
            "agent reviewer:\n  model: sonnet\n  prompt: \"Review\"\n",
            &PrinterOptions::default(),
        );
        assert_eq!(printed, "agent reviewer:\n  model: sonnet\n  prompt: \"Review\"\n");
    }

    #[test]
    fn context_shorthand_prints_with_braces_and_spaces() {
        let printed = print_source(
            "session x: agent\n  context: { a, b, c }\n",
            &PrinterOptions::default(),
        );
        assert!(printed.contains("context: { a, b, c }"));
    }

    #[test]
    fn parallel_modifiers_print_in_canonical_order() {
        let printed = print_source(
            "parallel (\"any\", count: 2, on-fail: \"retry\"):\n  session \"a\"\n  session \"b\"\n",
            &PrinterOptions::default(),
        );
        assert!(printed.starts_with("parallel (\"any\", count: 2, on-fail: \"retry\"):\n"));
    }

    #[test]
    fn arrow_chain_flattens_onto_one_line() {
        let printed = print_source(r#"session "A" -> session "B" -> session "C""#, &PrinterOptions::default());
        assert_eq!(printed, "session \"A\" -> session \"B\" -> session \"C\"\n");
    }

    #[test]
    fn pipeline_prints_continuation_lines() {
        let printed = print_source(
            "let r = items | filter:\n  session \"keep?\"\n",
            &PrinterOptions::default(),
        );
        assert_eq!(printed, "let r = items\n  | filter:\n    session \"keep?\"\n");
    }

    #[test]
    fn standalone_comments_are_dropped_unless_preserved() {
        let dropped = print_source("# a note\nsession \"hi\"\n", &PrinterOptions::default());
        assert_eq!(dropped, "session \"hi\"\n");

        let preserved = print_source(
            "# a note\nsession \"hi\"\n",
            &PrinterOptions {
                preserve_comments: true,
                ..PrinterOptions::default()
            },
        );
        assert_eq!(preserved, "# a note\nsession \"hi\"\n");
    }

    #[test]
    fn reescape_round_trips_control_characters() {
        assert_eq!(reescape("a\\b\"c\nd\te", false), "a\\\\b\\\"c\\nd\\te");
    }
}
