// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::cell::OnceCell;

use crate::intern::{IntId, StrId, Symbol};

pub type Line = u32;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub name: Symbol,   // TYPE
    pub parent: Symbol, // TYPE, Object when omitted
    pub features: Vec<Feature>,
    pub filename: StrId,
    pub line: Line,
}

impl Class {
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.features.iter().filter_map(|f| match f {
            Feature::Method(m) => Some(m),
            Feature::Attr(_) => None,
        })
    }

    pub fn attrs(&self) -> impl Iterator<Item = &Attr> {
        self.features.iter().filter_map(|f| match f {
            Feature::Attr(a) => Some(a),
            Feature::Method(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    Method(Method),
    Attr(Attr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: Symbol, // ID
    pub formals: Vec<Formal>,
    pub ret_type: Symbol, // TYPE
    pub body: Expr,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: Symbol, // ID
    pub ty: Symbol,   // TYPE
    /// `NoExpr` when the attribute has no initializer.
    pub init: Expr,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formal {
    pub name: Symbol, // ID
    pub ty: Symbol,   // TYPE
    pub line: Line,
}

/// An expression node. The resolved type is filled in once by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: Line,
    ty: OnceCell<Symbol>,
}

impl Expr {
    pub fn new(kind: ExprKind, line: Line) -> Self {
        Self {
            kind,
            line,
            ty: OnceCell::new(),
        }
    }

    pub fn no_expr(line: Line) -> Self {
        Self::new(ExprKind::NoExpr, line)
    }

    pub fn is_no_expr(&self) -> bool {
        matches!(self.kind, ExprKind::NoExpr)
    }

    pub fn ty(&self) -> Option<Symbol> {
        self.ty.get().copied()
    }

    /// Record the resolved type. Later calls keep the first value.
    pub fn set_ty(&self, ty: Symbol) {
        let fresh = self.ty.set(ty).is_ok();
        debug_assert!(fresh, "expression at line {} typed twice", self.line);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Assign {
        name: Symbol,
        value: Box<Expr>,
    },

    Dispatch {
        receiver: Box<Expr>,
        method: Symbol,
        args: Vec<Expr>,
    },

    // receiver@Type.method(args)
    StaticDispatch {
        receiver: Box<Expr>,
        static_type: Symbol,
        method: Symbol,
        args: Vec<Expr>,
    },

    Cond {
        pred: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    Loop {
        pred: Box<Expr>,
        body: Box<Expr>,
    },

    Block(Vec<Expr>),

    // one binding; multi-binding lets are nested by the parser
    Let {
        name: Symbol,
        ty: Symbol,
        init: Box<Expr>,
        body: Box<Expr>,
    },

    Case {
        scrutinee: Box<Expr>,
        branches: Vec<CaseBranch>,
    },

    New(Symbol),

    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    // identifier reference, including self
    Ref(Symbol),

    NoExpr,

    // literals
    Str(StrId),
    Int(IntId),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseBranch {
    pub name: Symbol,
    pub ty: Symbol,
    pub body: Expr,
    pub line: Line,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    IsVoid,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Eq,
}

impl BinOp {
    pub fn is_arith(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "=",
        }
    }
}
