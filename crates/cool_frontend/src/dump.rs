// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Indented tree dump of a [`Program`], one node field per line.
//!
//! Every node starts with `#<line>` followed by its tag (`_class`, `_dispatch`,
//! ...). Expressions end with a `: <type>` line, which reads `: _no_type` when
//! types are suppressed or not yet assigned. Dumping with types suppressed is
//! stable across type checking.

use std::fmt::Write;

use crate::ast::*;
use crate::intern::{sym, Interner, Symbol};

const INDENT: usize = 2;
const MAX_PAD: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpTypes {
    Show,
    Suppress,
}

pub fn dump_program(program: &Program, interner: &Interner, types: DumpTypes) -> String {
    let mut d = Dumper {
        out: String::new(),
        interner,
        types,
    };
    d.program(program);
    d.out
}

/// Escape a string the way the dump and the lexer agree on.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            c if c.is_ascii() => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

struct Dumper<'a> {
    out: String,
    interner: &'a Interner,
    types: DumpTypes,
}

impl Dumper<'_> {
    fn pad(&mut self, level: usize) {
        for _ in 0..level.min(MAX_PAD) {
            self.out.push(' ');
        }
    }

    fn text(&mut self, level: usize, text: &str) {
        self.pad(level);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn name(&mut self, level: usize, name: Symbol) {
        let interner = self.interner;
        self.text(level, interner.name(name));
    }

    fn line(&mut self, level: usize, line: Line) {
        self.pad(level);
        let _ = writeln!(self.out, "#{line}");
    }

    fn quoted(&mut self, level: usize, s: &str) {
        self.pad(level);
        let _ = writeln!(self.out, "\"{}\"", escape_string(s));
    }

    fn program(&mut self, program: &Program) {
        self.line(0, program.classes.first().map_or(1, |c| c.line));
        self.text(0, "_program");
        for class in &program.classes {
            self.class(INDENT, class);
        }
    }

    fn class(&mut self, level: usize, class: &Class) {
        self.line(level, class.line);
        self.text(level, "_class");
        let level = level + INDENT;
        self.name(level, class.name);
        self.name(level, class.parent);
        let interner = self.interner;
        self.quoted(level, interner.string(class.filename));
        self.text(level, "(");
        for feature in &class.features {
            match feature {
                Feature::Method(m) => self.method(level, m),
                Feature::Attr(a) => self.attr(level, a),
            }
        }
        self.text(level, ")");
    }

    fn method(&mut self, level: usize, m: &Method) {
        self.line(level, m.line);
        self.text(level, "_method");
        let level = level + INDENT;
        self.name(level, m.name);
        for formal in &m.formals {
            self.line(level, formal.line);
            self.text(level, "_formal");
            self.name(level + INDENT, formal.name);
            self.name(level + INDENT, formal.ty);
        }
        self.name(level, m.ret_type);
        self.expr(level, &m.body);
    }

    fn attr(&mut self, level: usize, a: &Attr) {
        self.line(level, a.line);
        self.text(level, "_attr");
        let level = level + INDENT;
        self.name(level, a.name);
        self.name(level, a.ty);
        self.expr(level, &a.init);
    }

    fn expr_type(&mut self, level: usize, e: &Expr) {
        let ty = match (self.types, e.ty()) {
            (DumpTypes::Show, Some(ty)) => ty,
            _ => sym::NO_TYPE,
        };
        self.pad(level);
        let _ = writeln!(self.out, ": {}", self.interner.name(ty));
    }

    fn actuals(&mut self, level: usize, args: &[Expr]) {
        self.text(level, "(");
        for arg in args {
            self.expr(level, arg);
        }
        self.text(level, ")");
    }

    fn expr(&mut self, level: usize, e: &Expr) {
        let inner = level + INDENT;
        self.line(level, e.line);
        match &e.kind {
            ExprKind::Assign { name, value } => {
                self.text(level, "_assign");
                self.name(inner, *name);
                self.expr(inner, value);
            }
            ExprKind::StaticDispatch {
                receiver,
                static_type,
                method,
                args,
            } => {
                self.text(level, "_static_dispatch");
                self.expr(inner, receiver);
                self.name(inner, *static_type);
                self.name(inner, *method);
                self.actuals(inner, args);
            }
            ExprKind::Dispatch {
                receiver,
                method,
                args,
            } => {
                self.text(level, "_dispatch");
                self.expr(inner, receiver);
                self.name(inner, *method);
                self.actuals(inner, args);
            }
            ExprKind::Cond {
                pred,
                then_branch,
                else_branch,
            } => {
                self.text(level, "_cond");
                self.expr(inner, pred);
                self.expr(inner, then_branch);
                self.expr(inner, else_branch);
            }
            ExprKind::Loop { pred, body } => {
                self.text(level, "_loop");
                self.expr(inner, pred);
                self.expr(inner, body);
            }
            ExprKind::Block(body) => {
                self.text(level, "_block");
                for e in body {
                    self.expr(inner, e);
                }
            }
            ExprKind::Let {
                name,
                ty,
                init,
                body,
            } => {
                self.text(level, "_let");
                self.name(inner, *name);
                self.name(inner, *ty);
                self.expr(inner, init);
                self.expr(inner, body);
            }
            ExprKind::Case {
                scrutinee,
                branches,
            } => {
                self.text(level, "_typcase");
                self.expr(inner, scrutinee);
                for b in branches {
                    // branches carry no type line
                    self.line(inner, b.line);
                    self.text(inner, "_branch");
                    self.name(inner + INDENT, b.name);
                    self.name(inner + INDENT, b.ty);
                    self.expr(inner + INDENT, &b.body);
                }
            }
            ExprKind::New(ty) => {
                self.text(level, "_new");
                self.name(inner, *ty);
            }
            ExprKind::Unary { op, operand } => {
                let tag = match op {
                    UnOp::Neg => "_neg",
                    UnOp::Not => "_comp",
                    UnOp::IsVoid => "_isvoid",
                };
                self.text(level, tag);
                self.expr(inner, operand);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let tag = match op {
                    BinOp::Add => "_plus",
                    BinOp::Sub => "_sub",
                    BinOp::Mul => "_mul",
                    BinOp::Div => "_divide",
                    BinOp::Lt => "_lt",
                    BinOp::Eq => "_eq",
                    BinOp::Le => "_leq",
                };
                self.text(level, tag);
                self.expr(inner, lhs);
                self.expr(inner, rhs);
            }
            ExprKind::Ref(name) => {
                self.text(level, "_object");
                self.name(inner, *name);
            }
            ExprKind::NoExpr => self.text(level, "_no_expr"),
            ExprKind::Str(id) => {
                self.text(level, "_string");
                let interner = self.interner;
                self.quoted(inner, interner.string(*id));
            }
            ExprKind::Int(id) => {
                self.text(level, "_int");
                let value = self.interner.int(*id).to_string();
                self.text(inner, &value);
            }
            ExprKind::Bool(b) => {
                self.text(level, "_bool");
                self.text(inner, if *b { "1" } else { "0" });
            }
        }
        self.expr_type(level, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse_program;

    #[test]
    fn dumps_class_header_and_literal() {
        let src = "class Main {\n  s : String <- \"a\\tb\";\n};";
        let mut interner = Interner::new();
        let lexed = lex(src).unwrap();
        let prog = parse_program(&lexed, "m.cl", &mut interner).unwrap();
        let dump = dump_program(&prog, &interner, DumpTypes::Show);

        let expected = "\
#1
_program
  #1
  _class
    Main
    Object
    \"m.cl\"
    (
    #2
    _attr
      s
      String
      #2
      _string
        \"a\\tb\"
      : _no_type
    )
";
        assert_eq!(dump, expected);
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_string("q\"\\\n\u{1}"), "q\\\"\\\\\\n\\001");
    }
}
