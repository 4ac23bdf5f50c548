// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::cell::RefCell;

use chumsky::prelude::*;
use chumsky::{extra, pratt};
use thiserror::Error;

use crate::ast::*;
use crate::intern::{sym, IntId, Interner, StrId, Symbol};
use crate::lexer::{Lexed, Tok};

/// chumsky 0.12 errors are lifetime-parameterized
pub type ParseError<'src> = chumsky::error::Simple<'src, Tok>;
pub type PExtra<'src> = extra::Err<ParseError<'src>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{filename}:{line}: {message}")]
pub struct SyntaxError {
    pub filename: String,
    pub line: Line,
    pub message: String,
}

/// State shared by every parser closure: the interner (parsers are `Fn`, so it
/// sits behind a `RefCell`) and the token line table.
pub struct ParseCtx {
    interner: RefCell<Interner>,
    lines: Vec<Line>,
    filename: StrId,
}

impl ParseCtx {
    fn ident(&self, s: &str) -> Symbol {
        self.interner.borrow_mut().ident(s)
    }

    fn string(&self, s: &str) -> StrId {
        self.interner.borrow_mut().strings.emplace(s)
    }

    fn int(&self, n: i32) -> IntId {
        self.interner.borrow_mut().ints.emplace(&n)
    }

    /// Spans over a token slice are token indices.
    fn line(&self, span: SimpleSpan) -> Line {
        self.lines
            .get(span.start)
            .or(self.lines.last())
            .copied()
            .unwrap_or(1)
    }
}

/// Public API: parse one file's tokens into a Program, interning every name
/// and literal into `interner`.
pub fn parse_program(
    lexed: &Lexed,
    filename: &str,
    interner: &mut Interner,
) -> Result<Program, Vec<SyntaxError>> {
    let file = interner.strings.emplace(filename);
    let cx = ParseCtx {
        interner: RefCell::new(std::mem::take(interner)),
        lines: lexed.lines.clone(),
        filename: file,
    };

    let result = program_parser(&cx)
        .parse(lexed.toks.as_slice())
        .into_result()
        .map_err(|errs| {
            errs.into_iter()
                .map(|e| SyntaxError {
                    filename: filename.to_string(),
                    line: cx.line(*e.span()),
                    message: match e.found() {
                        Some(tok) => format!("syntax error at or near {tok:?}"),
                        None => "syntax error at or near EOF".to_string(),
                    },
                })
                .collect()
        });

    *interner = cx.interner.into_inner();
    result
}

pub fn program_parser<'src>(
    cx: &'src ParseCtx,
) -> impl Parser<'src, &'src [Tok], Program, PExtra<'src>> {
    class_parser(cx)
        .then_ignore(just(Tok::Semi))
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|classes| Program { classes })
        .then_ignore(end())
}

fn class_parser<'src>(cx: &'src ParseCtx) -> impl Parser<'src, &'src [Tok], Class, PExtra<'src>> {
    just(Tok::KwClass)
        .ignore_then(type_id(cx))
        .then(just(Tok::KwInherits).ignore_then(type_id(cx)).or_not())
        .then(
            just(Tok::LBrace)
                .ignore_then(
                    feature_parser(cx)
                        .then_ignore(just(Tok::Semi))
                        .repeated()
                        .collect::<Vec<_>>(),
                )
                .then_ignore(just(Tok::RBrace)),
        )
        .map_with(move |((name, parent), features), e| Class {
            name,
            parent: parent.unwrap_or(sym::OBJECT),
            features,
            filename: cx.filename,
            line: cx.line(e.span()),
        })
}

fn feature_parser<'src>(
    cx: &'src ParseCtx,
) -> impl Parser<'src, &'src [Tok], Feature, PExtra<'src>> {
    let method = obj_id(cx)
        .then(
            just(Tok::LParen)
                .ignore_then(
                    formal_parser(cx)
                        .separated_by(just(Tok::Comma))
                        .collect::<Vec<_>>(),
                )
                .then_ignore(just(Tok::RParen)),
        )
        .then_ignore(just(Tok::Colon))
        .then(type_id(cx))
        .then(
            just(Tok::LBrace)
                .ignore_then(expr_parser(cx))
                .then_ignore(just(Tok::RBrace)),
        )
        .map_with(move |(((name, formals), ret_type), body), e| {
            Feature::Method(Method {
                name,
                formals,
                ret_type,
                body,
                line: cx.line(e.span()),
            })
        });

    let attr = obj_id(cx)
        .then_ignore(just(Tok::Colon))
        .then(type_id(cx))
        .then(just(Tok::Assign).ignore_then(expr_parser(cx)).or_not())
        .map_with(move |((name, ty), init), e| {
            let line = cx.line(e.span());
            Feature::Attr(Attr {
                name,
                ty,
                init: init.unwrap_or_else(|| Expr::no_expr(line)),
                line,
            })
        });

    method.or(attr)
}

fn formal_parser<'src>(cx: &'src ParseCtx) -> impl Parser<'src, &'src [Tok], Formal, PExtra<'src>> {
    obj_id(cx)
        .then_ignore(just(Tok::Colon))
        .then(type_id(cx))
        .map_with(move |(name, ty), e| Formal {
            name,
            ty,
            line: cx.line(e.span()),
        })
}

fn type_id<'src>(cx: &'src ParseCtx) -> impl Parser<'src, &'src [Tok], Symbol, PExtra<'src>> {
    select! { Tok::TypeId(s) => s }
        .map(move |s| cx.ident(&s))
        .or(just(Tok::SelfType).to(sym::SELF_TYPE))
}

/// `self` parses as an object identifier; binding or assigning it is a
/// semantic error.
fn obj_id<'src>(cx: &'src ParseCtx) -> impl Parser<'src, &'src [Tok], Symbol, PExtra<'src>> {
    select! { Tok::ObjId(s) => s }
        .map(move |s| cx.ident(&s))
        .or(just(Tok::SelfId).to(sym::SELF))
}

fn literal<'src>(cx: &'src ParseCtx) -> impl Parser<'src, &'src [Tok], Expr, PExtra<'src>> {
    let int = select! { Tok::Int(n) => n }
        .map_with(move |n, e| Expr::new(ExprKind::Int(cx.int(n)), cx.line(e.span())));
    let string = select! { Tok::Str(s) => s }
        .map_with(move |s, e| Expr::new(ExprKind::Str(cx.string(&s)), cx.line(e.span())));
    let boolean = select! {
        Tok::KwTrue => true,
        Tok::KwFalse => false,
    }
    .map_with(move |b, e| Expr::new(ExprKind::Bool(b), cx.line(e.span())));

    int.or(string).or(boolean)
}

fn unary(op: UnOp, operand: Expr) -> Expr {
    let line = operand.line;
    Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        line,
    )
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let line = lhs.line;
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        line,
    )
}

pub fn expr_parser<'src>(cx: &'src ParseCtx) -> impl Parser<'src, &'src [Tok], Expr, PExtra<'src>> {
    recursive(move |expr| {
        let paren = just(Tok::LParen)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::RParen));

        let id = obj_id(cx)
            .map_with(move |name, e| Expr::new(ExprKind::Ref(name), cx.line(e.span())));

        // args: ( [expr (, expr)*]? )
        let args = just(Tok::LParen)
            .ignore_then(
                expr.clone()
                    .separated_by(just(Tok::Comma))
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Tok::RParen));

        // id(args) => self.id(args)
        let self_call = obj_id(cx)
            .then(args.clone())
            .map_with(move |(method, args), e| {
                let line = cx.line(e.span());
                Expr::new(
                    ExprKind::Dispatch {
                        receiver: Box::new(Expr::new(ExprKind::Ref(sym::SELF), line)),
                        method,
                        args,
                    },
                    line,
                )
            });

        let block = just(Tok::LBrace)
            .ignore_then(
                expr.clone()
                    .then_ignore(just(Tok::Semi))
                    .repeated()
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Tok::RBrace))
            .map_with(move |body, e| Expr::new(ExprKind::Block(body), cx.line(e.span())));

        let if_ = just(Tok::KwIf)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::KwThen))
            .then(expr.clone())
            .then_ignore(just(Tok::KwElse))
            .then(expr.clone())
            .then_ignore(just(Tok::KwFi))
            .map_with(move |((pred, then_branch), else_branch), e| {
                Expr::new(
                    ExprKind::Cond {
                        pred: Box::new(pred),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    },
                    cx.line(e.span()),
                )
            });

        let while_ = just(Tok::KwWhile)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::KwLoop))
            .then(expr.clone())
            .then_ignore(just(Tok::KwPool))
            .map_with(move |(pred, body), e| {
                Expr::new(
                    ExprKind::Loop {
                        pred: Box::new(pred),
                        body: Box::new(body),
                    },
                    cx.line(e.span()),
                )
            });

        let let_binding = obj_id(cx)
            .then_ignore(just(Tok::Colon))
            .then(type_id(cx))
            .then(just(Tok::Assign).ignore_then(expr.clone()).or_not())
            .map_with(move |((name, ty), init), e| (name, ty, init, cx.line(e.span())));

        // let a : A, b : B in body  ==>  let a : A in let b : B in body
        let let_ = just(Tok::KwLet)
            .ignore_then(
                let_binding
                    .separated_by(just(Tok::Comma))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Tok::KwIn))
            .then(expr.clone())
            .map(|(bindings, body)| {
                bindings
                    .into_iter()
                    .rev()
                    .fold(body, |body, (name, ty, init, line)| {
                        Expr::new(
                            ExprKind::Let {
                                name,
                                ty,
                                init: Box::new(init.unwrap_or_else(|| Expr::no_expr(line))),
                                body: Box::new(body),
                            },
                            line,
                        )
                    })
            });

        let case_branch = obj_id(cx)
            .then_ignore(just(Tok::Colon))
            .then(type_id(cx))
            .then_ignore(just(Tok::Darrow))
            .then(expr.clone())
            .then_ignore(just(Tok::Semi))
            .map_with(move |((name, ty), body), e| CaseBranch {
                name,
                ty,
                body,
                line: cx.line(e.span()),
            });

        let case_ = just(Tok::KwCase)
            .ignore_then(expr.clone())
            .then_ignore(just(Tok::KwOf))
            .then(case_branch.repeated().at_least(1).collect::<Vec<_>>())
            .then_ignore(just(Tok::KwEsac))
            .map_with(move |(scrutinee, branches), e| {
                Expr::new(
                    ExprKind::Case {
                        scrutinee: Box::new(scrutinee),
                        branches,
                    },
                    cx.line(e.span()),
                )
            });

        let new_ = just(Tok::KwNew)
            .ignore_then(type_id(cx))
            .map_with(move |ty, e| Expr::new(ExprKind::New(ty), cx.line(e.span())));

        let atom = if_
            .or(while_)
            .or(let_)
            .or(case_)
            .or(block)
            .or(new_)
            .or(paren)
            .or(literal(cx))
            .or(self_call)
            .or(id);

        // recv [@TYPE] . id(args)
        let dispatch_step = just(Tok::At)
            .ignore_then(type_id(cx))
            .or_not()
            .then_ignore(just(Tok::Dot))
            .then(obj_id(cx))
            .then(args)
            .map_with(move |((static_type, method), args), e| {
                (static_type, method, args, cx.line(e.span()))
            });

        let postfix = atom
            .then(dispatch_step.repeated().collect::<Vec<_>>())
            .map(|(base, steps)| {
                steps
                    .into_iter()
                    .fold(base, |receiver, (static_type, method, args, line)| {
                        let receiver = Box::new(receiver);
                        let kind = match static_type {
                            Some(static_type) => ExprKind::StaticDispatch {
                                receiver,
                                static_type,
                                method,
                                args,
                            },
                            None => ExprKind::Dispatch {
                                receiver,
                                method,
                                args,
                            },
                        };
                        Expr::new(kind, line)
                    })
            });

        // Higher binding power binds tighter:
        // ~ > isvoid > * / > + - > <= < = > not
        let pratt_expr = postfix.pratt((
            pratt::prefix(6, just(Tok::Tilde), |_, rhs: Expr, _| unary(UnOp::Neg, rhs)),
            pratt::prefix(5, just(Tok::KwIsVoid), |_, rhs: Expr, _| {
                unary(UnOp::IsVoid, rhs)
            }),
            pratt::infix(pratt::left(4), just(Tok::Star), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Mul, lhs, rhs)
            }),
            pratt::infix(pratt::left(4), just(Tok::Slash), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Div, lhs, rhs)
            }),
            pratt::infix(pratt::left(3), just(Tok::Plus), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Add, lhs, rhs)
            }),
            pratt::infix(pratt::left(3), just(Tok::Minus), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Sub, lhs, rhs)
            }),
            pratt::infix(pratt::left(2), just(Tok::Le), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Le, lhs, rhs)
            }),
            pratt::infix(pratt::left(2), just(Tok::Lt), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Lt, lhs, rhs)
            }),
            pratt::infix(pratt::left(2), just(Tok::Eq), |lhs: Expr, _, rhs: Expr, _| {
                binary(BinOp::Eq, lhs, rhs)
            }),
            pratt::prefix(1, just(Tok::KwNot), |_, rhs: Expr, _| unary(UnOp::Not, rhs)),
        ));

        // x <- expr binds loosest and associates to the right
        let assign = obj_id(cx)
            .then_ignore(just(Tok::Assign))
            .then(expr.clone())
            .map_with(move |(name, value), e| {
                Expr::new(
                    ExprKind::Assign {
                        name,
                        value: Box::new(value),
                    },
                    cx.line(e.span()),
                )
            });

        // Make recursive closure output Clone by boxing
        assign.or(pratt_expr).boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse(src: &str, interner: &mut Interner) -> Program {
        let lexed = lex(src).unwrap();
        parse_program(&lexed, "test.cl", interner).unwrap()
    }

    fn main_body(prog: &Program) -> &Expr {
        match &prog.classes[0].features[0] {
            Feature::Method(m) => &m.body,
            other => panic!("expected method, got {other:?}"),
        }
    }

    #[test]
    fn parses_minimal_main_class() {
        let src = r#"
            class Main {
              main() : Int { 1 + 2 * 3 };
            };
        "#;

        let mut interner = Interner::new();
        let prog = parse(src, &mut interner);
        assert_eq!(prog.classes.len(), 1);
        assert_eq!(prog.classes[0].name, sym::MAIN_CLASS);
        assert_eq!(prog.classes[0].parent, sym::OBJECT);
        assert_eq!(prog.classes[0].line, 2);
        assert_eq!(interner.string(prog.classes[0].filename), "test.cl");
        assert_eq!(prog.classes[0].features.len(), 1);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let mut interner = Interner::new();
        let prog = parse("class Main { main() : Int { 1 + 2 * 3 }; };", &mut interner);
        match &main_body(&prog).kind {
            ExprKind::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn not_applies_to_whole_comparison() {
        let mut interner = Interner::new();
        let prog = parse("class Main { main() : Bool { not 1 < 2 }; };", &mut interner);
        match &main_body(&prog).kind {
            ExprKind::Unary { op: UnOp::Not, operand } => {
                assert!(matches!(operand.kind, ExprKind::Binary { op: BinOp::Lt, .. }));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn multi_binding_let_is_nested() {
        let mut interner = Interner::new();
        let prog = parse(
            "class Main { main() : Int { let y : Int <- 5, z : Int in y }; };",
            &mut interner,
        );
        let ExprKind::Let { name, init, body, .. } = &main_body(&prog).kind else {
            panic!("expected let");
        };
        assert_eq!(interner.name(*name), "y");
        assert!(matches!(init.kind, ExprKind::Int(_)));
        let ExprKind::Let { name, init, .. } = &body.kind else {
            panic!("expected nested let");
        };
        assert_eq!(interner.name(*name), "z");
        assert!(init.is_no_expr());
    }

    #[test]
    fn parses_block_let_case_dispatch() {
        let src = r#"
            class Main inherits IO {
              x : Int;
              main() : Int {
                {
                  x <- 0;
                  let y : Int <- 5, z : Int in self.out_int(x);
                  case x of a : Int => a + 1; b : Object => 0; esac;
                  out_int(x)@IO.out_string("done");
                  x;
                }
              };
            };
        "#;

        let mut interner = Interner::new();
        let prog = parse(src, &mut interner);
        assert_eq!(prog.classes[0].parent, sym::IO);
        let Feature::Method(main) = &prog.classes[0].features[1] else {
            panic!("expected main method");
        };
        let ExprKind::Block(body) = &main.body.kind else {
            panic!("expected block");
        };
        assert!(matches!(body[0].kind, ExprKind::Assign { .. }));
        assert!(matches!(&body[2].kind, ExprKind::Case { branches, .. } if branches.len() == 2));
        match &body[3].kind {
            ExprKind::StaticDispatch {
                receiver,
                static_type,
                ..
            } => {
                assert_eq!(*static_type, sym::IO);
                assert!(matches!(
                    &receiver.kind,
                    ExprKind::Dispatch { method, .. } if *method == sym::OUT_INT
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(body[4].line, 10);
    }

    #[test]
    fn syntax_error_carries_file_and_line() {
        let lexed = lex("class Main {\n  main() : Int { 1 + };\n};").unwrap();
        let mut interner = Interner::new();
        let errs = parse_program(&lexed, "bad.cl", &mut interner).unwrap_err();
        assert_eq!(errs[0].filename, "bad.cl");
        assert_eq!(errs[0].line, 2);
        assert!(errs[0].to_string().starts_with("bad.cl:2: syntax error"));
    }
}
