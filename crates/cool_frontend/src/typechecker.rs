// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Semantic analysis: inheritance graph, per-class scoped tables, then
//! bottom-up type checking of every expression.
//!
//! Each phase reports everything it finds. A phase that recorded errors stops
//! the analysis before the next one starts.

use rustc_hash::FxHashSet;

use crate::ast::*;
use crate::class_table::{ClassId, ClassTable};
use crate::diagnostics::{Diagnostics, SemantError, SemantErrorKind};
use crate::intern::{sym, Interner, Symbol};
use crate::scoped::ScopedTable;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSig {
    /// Class that defines this version of the method.
    pub owner: Symbol,
    pub name: Symbol,
    pub formals: Vec<(Symbol, Symbol)>,
    pub ret_type: Symbol,
}

impl MethodSig {
    fn of(owner: Symbol, m: &Method) -> Self {
        Self {
            owner,
            name: m.name,
            formals: m.formals.iter().map(|f| (f.name, f.ty)).collect(),
            ret_type: m.ret_type,
        }
    }
}

/// Method signatures and attribute types visible in one class, inherited
/// entries included.
#[derive(Clone, Debug, Default)]
pub struct ClassScopes {
    pub methods: ScopedTable<Symbol, MethodSig>,
    pub attrs: ScopedTable<Symbol, Symbol>,
}

/// Result of a clean analysis. Expression types are stored on the AST itself.
pub struct Analysis<'p> {
    pub classes: ClassTable<'p>,
    /// Indexed by [`ClassId::index`].
    pub scopes: Vec<ClassScopes>,
}

/// Public entry point.
pub fn type_check_program(p: &Program, interner: &Interner) -> Result<(), Vec<SemantError>> {
    analyze(p, interner).map(|_| ())
}

pub fn analyze<'p>(p: &'p Program, interner: &Interner) -> Result<Analysis<'p>, Vec<SemantError>> {
    let mut diags = Diagnostics::new(interner);

    let classes = ClassTable::build(p, &mut diags);
    if !diags.is_empty() {
        return Err(diags.into_errors());
    }

    let scopes = build_scopes(&classes, &mut diags);
    if !diags.is_empty() {
        return Err(diags.into_errors());
    }

    for id in classes.preorder() {
        let class = classes.klass(id);
        tracing::trace!(class = interner.name(class.name), "type checking class");
        let mut env = TypeEnv {
            classes: &classes,
            scopes: &scopes,
            diags: &mut diags,
            current: id,
            class,
            objects: scopes[id.index()].attrs.clone(),
        };
        for feature in &class.features {
            match feature {
                Feature::Attr(a) => env.check_attr(a),
                Feature::Method(m) => env.check_method(m),
            }
        }
    }
    check_entry_point(&classes, &scopes, &mut diags);
    if !diags.is_empty() {
        return Err(diags.into_errors());
    }

    tracing::debug!("semantic analysis succeeded");
    Ok(Analysis { classes, scopes })
}

/// Copy each parent's tables, then add the class's own attributes and methods.
fn build_scopes(classes: &ClassTable<'_>, diags: &mut Diagnostics<'_>) -> Vec<ClassScopes> {
    let mut scopes = vec![ClassScopes::default(); classes.len()];

    for id in classes.preorder() {
        let class = classes.klass(id);
        let mut own = match classes.node(id).parent {
            Some(parent) => scopes[parent.index()].clone(),
            None => ClassScopes::default(),
        };
        own.methods.enter_scope();
        own.attrs.enter_scope();

        for feature in &class.features {
            match feature {
                Feature::Attr(a) => install_attr(class, a, &mut own, diags),
                Feature::Method(m) => install_method(class, m, &mut own, diags),
            }
        }
        scopes[id.index()] = own;
    }

    scopes
}

fn install_attr(class: &Class, a: &Attr, own: &mut ClassScopes, diags: &mut Diagnostics<'_>) {
    if a.name == sym::SELF {
        diags.report(class, a.line, SemantErrorKind::SelfBinding { what: "an attribute" });
        return;
    }
    if own.attrs.lookup(&a.name).is_some() {
        let (class_name, attr) = (diags.name(class.name), diags.name(a.name));
        let kind = if own.attrs.probe(&a.name).is_some() {
            SemantErrorKind::AttrMultiplyDefined { class: class_name, attr }
        } else {
            SemantErrorKind::AttrRedefined { class: class_name, attr }
        };
        diags.report(class, a.line, kind);
        return;
    }
    let _ = own.attrs.add_to_scope(a.name, a.ty);
}

/// Overrides must keep the return type and every formal type. A rejected
/// override leaves the inherited signature in place.
fn install_method(class: &Class, m: &Method, own: &mut ClassScopes, diags: &mut Diagnostics<'_>) {
    if own.methods.probe(&m.name).is_some() {
        let kind = SemantErrorKind::MethodRedefined {
            class: diags.name(class.name),
            method: diags.name(m.name),
        };
        diags.report(class, m.line, kind);
        return;
    }

    let sig = MethodSig::of(class.name, m);
    if let Some(inherited) = own.methods.lookup(&m.name) {
        let method = diags.name(m.name);
        let mut accepted = true;

        if inherited.ret_type != sig.ret_type {
            let kind = SemantErrorKind::OverrideReturnType {
                method: method.clone(),
                expected: diags.name(inherited.ret_type),
                found: diags.name(sig.ret_type),
            };
            diags.report(class, m.line, kind);
            accepted = false;
        }

        if inherited.formals.len() != sig.formals.len() {
            let kind = SemantErrorKind::OverrideArity {
                method,
                expected: inherited.formals.len(),
                found: sig.formals.len(),
            };
            diags.report(class, m.line, kind);
            accepted = false;
        } else {
            for (formal, (&(_, expected), &(name, found))) in m
                .formals
                .iter()
                .zip(inherited.formals.iter().zip(sig.formals.iter()))
            {
                if expected != found {
                    let kind = SemantErrorKind::OverrideFormalType {
                        method: method.clone(),
                        formal: diags.name(name),
                        expected: diags.name(expected),
                        found: diags.name(found),
                    };
                    diags.report(class, formal.line, kind);
                    accepted = false;
                }
            }
        }

        if !accepted {
            return;
        }
    }
    let _ = own.methods.add_to_scope(m.name, sig);
}

fn check_entry_point(classes: &ClassTable<'_>, scopes: &[ClassScopes], diags: &mut Diagnostics<'_>) {
    let main = classes
        .find(sym::MAIN_CLASS)
        .filter(|&id| classes.node(id).in_graph);
    match main {
        None => {
            let anchor = classes
                .program()
                .classes
                .first()
                .unwrap_or_else(|| classes.klass(classes.root()));
            diags.report(anchor, anchor.line, SemantErrorKind::MissingMainClass);
        }
        Some(id) => {
            if scopes[id.index()].methods.lookup(&sym::MAIN_METHOD).is_none() {
                let class = classes.klass(id);
                diags.report(class, class.line, SemantErrorKind::MissingMainMethod);
            }
        }
    }
}

fn is_basic_value(t: Symbol) -> bool {
    t == sym::INT || t == sym::BOOL || t == sym::STRING
}

/// Typing context for the features of one class.
struct TypeEnv<'a, 'p, 'i> {
    classes: &'a ClassTable<'p>,
    scopes: &'a [ClassScopes],
    diags: &'a mut Diagnostics<'i>,
    current: ClassId,
    class: &'a Class,
    /// O(v) = T. Starts as the class's attribute table.
    objects: ScopedTable<Symbol, Symbol>,
}

impl TypeEnv<'_, '_, '_> {
    fn error(&mut self, line: Line, kind: SemantErrorKind) {
        self.diags.report(self.class, line, kind);
    }

    fn name(&self, s: Symbol) -> String {
        self.diags.name(s)
    }

    fn is_defined(&self, ty: Symbol) -> bool {
        self.classes.find(ty).is_some()
    }

    /// Tree node for a type, with SELF_TYPE read as the current class.
    fn resolve(&self, ty: Symbol) -> Option<ClassId> {
        if ty == sym::SELF_TYPE {
            return Some(self.current);
        }
        self.classes
            .find(ty)
            .filter(|&id| self.classes.node(id).in_graph)
    }

    /// SELF_TYPE read as the name of the current class.
    fn concrete(&self, ty: Symbol) -> Symbol {
        if ty == sym::SELF_TYPE { self.class.name } else { ty }
    }

    /// `t1 <= t2`.
    fn type_le(&self, t1: Symbol, t2: Symbol) -> bool {
        if t1 == sym::BOTTOM {
            return true;
        }
        if t2 == sym::BOTTOM {
            return false;
        }
        if t2 == sym::SELF_TYPE {
            return t1 == sym::SELF_TYPE;
        }
        match (self.resolve(t1), self.resolve(t2)) {
            (Some(a), Some(b)) => self.classes.conforms(a, b),
            _ => t1 == t2,
        }
    }

    fn lub(&self, t1: Symbol, t2: Symbol) -> Symbol {
        if t1 == sym::BOTTOM {
            return t2;
        }
        if t2 == sym::BOTTOM {
            return t1;
        }
        if t1 == sym::SELF_TYPE && t2 == sym::SELF_TYPE {
            return sym::SELF_TYPE;
        }
        match (self.resolve(t1), self.resolve(t2)) {
            (Some(a), Some(b)) => self.classes.node(self.classes.lub(a, b)).name,
            _ => sym::OBJECT,
        }
    }

    fn bind(&mut self, name: Symbol, ty: Symbol) {
        let _ = self.objects.add_to_scope(name, ty);
    }

    fn check_attr(&mut self, a: &Attr) {
        self.objects.enter_scope();
        self.bind(sym::SELF, sym::SELF_TYPE);

        let declared_ok = self.is_defined(a.ty);
        if !declared_ok {
            let kind = SemantErrorKind::UndefinedType {
                ty: self.name(a.ty),
                what: format!("attribute {}", self.name(a.name)),
            };
            self.error(a.line, kind);
        }

        let t_init = self.check_expr(&a.init);
        if t_init != sym::NO_TYPE && declared_ok && !self.type_le(t_init, a.ty) {
            let kind = SemantErrorKind::AttrInitMismatch {
                attr: self.name(a.name),
                declared: self.name(a.ty),
                found: self.name(t_init),
            };
            self.error(a.line, kind);
        }

        self.objects.exit_scope();
    }

    fn check_method(&mut self, m: &Method) {
        self.objects.enter_scope();
        self.bind(sym::SELF, sym::SELF_TYPE);
        self.objects.enter_scope();

        for f in &m.formals {
            if f.name == sym::SELF {
                self.error(f.line, SemantErrorKind::SelfBinding { what: "a formal parameter" });
                continue;
            }
            let mut ty = f.ty;
            if f.ty == sym::SELF_TYPE {
                let kind = SemantErrorKind::SelfTypeFormal { name: self.name(f.name) };
                self.error(f.line, kind);
                ty = sym::OBJECT;
            } else if !self.is_defined(f.ty) {
                let kind = SemantErrorKind::UndefinedType {
                    ty: self.name(f.ty),
                    what: format!("formal parameter {}", self.name(f.name)),
                };
                self.error(f.line, kind);
                ty = sym::OBJECT;
            }
            if self.objects.add_to_scope(f.name, ty).is_err() {
                let kind = SemantErrorKind::DuplicateFormal { name: self.name(f.name) };
                self.error(f.line, kind);
            }
        }

        let ret_ok = self.is_defined(m.ret_type);
        if !ret_ok {
            let kind = SemantErrorKind::UndefinedType {
                ty: self.name(m.ret_type),
                what: format!("return type of method {}", self.name(m.name)),
            };
            self.error(m.line, kind);
        }

        // built-in methods have no body to check
        let t_body = self.check_expr(&m.body);
        if t_body != sym::NO_TYPE && ret_ok && !self.type_le(t_body, m.ret_type) {
            let kind = SemantErrorKind::MethodBodyMismatch {
                method: self.name(m.name),
                declared: self.name(m.ret_type),
                found: self.name(t_body),
            };
            self.error(m.body.line, kind);
        }

        self.objects.exit_scope();
        self.objects.exit_scope();
    }

    /// Type `e` and its children, record the result on the node and return it.
    fn check_expr(&mut self, e: &Expr) -> Symbol {
        let ty = self.type_of(e);
        e.set_ty(ty);
        ty
    }

    fn type_of(&mut self, e: &Expr) -> Symbol {
        match &e.kind {
            ExprKind::Int(_) => sym::INT,
            ExprKind::Str(_) => sym::STRING,
            ExprKind::Bool(_) => sym::BOOL,
            ExprKind::NoExpr => sym::NO_TYPE,

            ExprKind::Ref(name) => match self.objects.lookup(name) {
                Some(&ty) => ty,
                None => {
                    let kind = SemantErrorKind::UndefinedIdentifier { name: self.name(*name) };
                    self.error(e.line, kind);
                    sym::OBJECT
                }
            },

            ExprKind::Assign { name, value } => {
                let t_value = self.check_expr(value);
                if *name == sym::SELF {
                    self.error(e.line, SemantErrorKind::SelfAssign);
                    return sym::OBJECT;
                }
                let Some(&declared) = self.objects.lookup(name) else {
                    let kind = SemantErrorKind::UndefinedIdentifier { name: self.name(*name) };
                    self.error(e.line, kind);
                    return sym::OBJECT;
                };
                if self.type_le(t_value, declared) {
                    t_value
                } else {
                    let kind = SemantErrorKind::AssignMismatch {
                        name: self.name(*name),
                        declared: self.name(declared),
                        found: self.name(t_value),
                    };
                    self.error(e.line, kind);
                    sym::OBJECT
                }
            }

            ExprKind::Dispatch {
                receiver,
                method,
                args,
            } => {
                let t0 = self.check_expr(receiver);
                let arg_types: Vec<Symbol> = args.iter().map(|a| self.check_expr(a)).collect();
                let target = self.resolve(t0);
                self.check_call(e.line, t0, target, *method, &arg_types)
            }

            ExprKind::StaticDispatch {
                receiver,
                static_type,
                method,
                args,
            } => {
                let t0 = self.check_expr(receiver);
                let arg_types: Vec<Symbol> = args.iter().map(|a| self.check_expr(a)).collect();

                let target = self
                    .classes
                    .find(*static_type)
                    .filter(|&id| self.classes.node(id).in_graph);
                let Some(target) = target else {
                    let kind = SemantErrorKind::UndefinedType {
                        ty: self.name(*static_type),
                        what: "static dispatch".to_string(),
                    };
                    self.error(e.line, kind);
                    return sym::OBJECT;
                };
                if !self.type_le(t0, *static_type) {
                    let kind = SemantErrorKind::StaticDispatchMismatch {
                        found: self.name(t0),
                        declared: self.name(*static_type),
                    };
                    self.error(e.line, kind);
                }
                self.check_call(e.line, t0, Some(target), *method, &arg_types)
            }

            ExprKind::Cond {
                pred,
                then_branch,
                else_branch,
            } => {
                self.check_predicate(pred, "if");
                let t_then = self.check_expr(then_branch);
                let t_else = self.check_expr(else_branch);
                self.lub(t_then, t_else)
            }

            ExprKind::Loop { pred, body } => {
                self.check_predicate(pred, "while");
                self.check_expr(body);
                sym::OBJECT
            }

            ExprKind::Block(body) => {
                let mut last = sym::OBJECT;
                for ex in body {
                    last = self.check_expr(ex);
                }
                last
            }

            ExprKind::Let {
                name,
                ty,
                init,
                body,
            } => {
                if *name == sym::SELF {
                    self.error(e.line, SemantErrorKind::SelfBinding { what: "a let-bound variable" });
                }
                let declared_ok = self.is_defined(*ty);
                if !declared_ok {
                    let kind = SemantErrorKind::UndefinedType {
                        ty: self.name(*ty),
                        what: format!("let-bound identifier {}", self.name(*name)),
                    };
                    self.error(e.line, kind);
                }

                let t_init = self.check_expr(init);
                if t_init != sym::NO_TYPE && declared_ok && !self.type_le(t_init, *ty) {
                    let kind = SemantErrorKind::LetInitMismatch {
                        name: self.name(*name),
                        declared: self.name(*ty),
                        found: self.name(t_init),
                    };
                    self.error(e.line, kind);
                }

                self.objects.enter_scope();
                if *name != sym::SELF {
                    self.bind(*name, if declared_ok { *ty } else { sym::OBJECT });
                }
                let t_body = self.check_expr(body);
                self.objects.exit_scope();
                t_body
            }

            ExprKind::Case {
                scrutinee,
                branches,
            } => {
                self.check_expr(scrutinee);

                let mut seen = FxHashSet::<Symbol>::default();
                let mut result = sym::BOTTOM;
                for b in branches {
                    if b.name == sym::SELF {
                        self.error(b.line, SemantErrorKind::SelfBinding { what: "a case branch variable" });
                    }
                    let mut ty = b.ty;
                    if b.ty == sym::SELF_TYPE {
                        let kind = SemantErrorKind::SelfTypeCaseBranch { name: self.name(b.name) };
                        self.error(b.line, kind);
                        ty = sym::OBJECT;
                    } else if !self.is_defined(b.ty) {
                        let kind = SemantErrorKind::UndefinedType {
                            ty: self.name(b.ty),
                            what: format!("case branch {}", self.name(b.name)),
                        };
                        self.error(b.line, kind);
                        ty = sym::OBJECT;
                    }
                    if !seen.insert(b.ty) {
                        let kind = SemantErrorKind::DuplicateCaseBranch { ty: self.name(b.ty) };
                        self.error(b.line, kind);
                    }

                    self.objects.enter_scope();
                    if b.name != sym::SELF {
                        self.bind(b.name, ty);
                    }
                    let t_branch = self.check_expr(&b.body);
                    self.objects.exit_scope();
                    result = self.lub(result, t_branch);
                }
                result
            }

            ExprKind::New(ty) => {
                if *ty == sym::SELF_TYPE {
                    sym::SELF_TYPE
                } else if self.resolve(*ty).is_some() {
                    *ty
                } else {
                    let kind = SemantErrorKind::UndefinedType {
                        ty: self.name(*ty),
                        what: "new".to_string(),
                    };
                    self.error(e.line, kind);
                    sym::OBJECT
                }
            }

            ExprKind::Unary { op, operand } => {
                let t = self.check_expr(operand);
                match op {
                    UnOp::IsVoid => sym::BOOL,
                    UnOp::Not => {
                        self.expect_operand(e.line, t, sym::BOOL, "not", "Operand");
                        sym::BOOL
                    }
                    UnOp::Neg => {
                        self.expect_operand(e.line, t, sym::INT, "~", "Operand");
                        sym::INT
                    }
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let tl = self.check_expr(lhs);
                let tr = self.check_expr(rhs);

                match op {
                    BinOp::Eq => {
                        let (tl, tr) = (self.concrete(tl), self.concrete(tr));
                        if (is_basic_value(tl) || is_basic_value(tr)) && tl != tr {
                            let kind = SemantErrorKind::EqualityMismatch {
                                lhs: self.name(tl),
                                rhs: self.name(tr),
                            };
                            self.error(e.line, kind);
                        }
                        sym::BOOL
                    }
                    _ => {
                        self.expect_operand(e.line, tl, sym::INT, op.symbol(), "Left");
                        self.expect_operand(e.line, tr, sym::INT, op.symbol(), "Right");
                        if op.is_arith() { sym::INT } else { sym::BOOL }
                    }
                }
            }
        }
    }

    fn check_predicate(&mut self, pred: &Expr, construct: &'static str) {
        if self.check_expr(pred) != sym::BOOL {
            self.error(pred.line, SemantErrorKind::PredicateNotBool { construct });
        }
    }

    fn expect_operand(
        &mut self,
        line: Line,
        found: Symbol,
        expected: Symbol,
        op: &'static str,
        side: &'static str,
    ) {
        if found != expected {
            let kind = SemantErrorKind::OperandMismatch {
                op,
                side,
                expected: if expected == sym::INT { "Int" } else { "Bool" },
                found: self.name(found),
            };
            self.error(line, kind);
        }
    }

    /// Resolve `method` in `target` and check the actuals against its formals.
    /// A SELF_TYPE return takes the receiver's static type.
    fn check_call(
        &mut self,
        line: Line,
        t0: Symbol,
        target: Option<ClassId>,
        method: Symbol,
        arg_types: &[Symbol],
    ) -> Symbol {
        let sig = target.and_then(|id| self.scopes[id.index()].methods.lookup(&method).cloned());
        let Some(sig) = sig else {
            let kind = SemantErrorKind::UndefinedMethod {
                method: self.name(method),
                ty: self.name(t0),
            };
            self.error(line, kind);
            return sym::OBJECT;
        };

        if sig.formals.len() != arg_types.len() {
            let kind = SemantErrorKind::DispatchArity {
                method: self.name(method),
                expected: sig.formals.len(),
                found: arg_types.len(),
            };
            self.error(line, kind);
        } else {
            let current = self.classes.node(self.current).name;
            for (&(formal, expected), &actual) in sig.formals.iter().zip(arg_types) {
                let actual = if actual == sym::SELF_TYPE && expected != sym::SELF_TYPE {
                    current
                } else {
                    actual
                };
                if !self.type_le(actual, expected) {
                    let kind = SemantErrorKind::DispatchArgType {
                        method: self.name(method),
                        formal: self.name(formal),
                        expected: self.name(expected),
                        found: self.name(actual),
                    };
                    self.error(line, kind);
                }
            }
        }

        if sig.ret_type == sym::SELF_TYPE {
            t0
        } else {
            sig.ret_type
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    fn check(src: &str) -> Result<(), Vec<SemantError>> {
        let mut interner = Interner::new();
        let prog = parse_source(&mut interner, "test.cl", src).unwrap();
        type_check_program(&prog, &interner)
    }

    fn errors(src: &str) -> Vec<SemantErrorKind> {
        match check(src) {
            Ok(()) => Vec::new(),
            Err(errs) => errs.into_iter().map(|e| e.kind).collect(),
        }
    }

    #[test]
    fn typechecks_simple_arith() {
        let src = r#"
            class Main inherits Object {
              main() : Int { 1 + 2 * 3 };
            };
        "#;
        let res = check(src);
        assert!(res.is_ok(), "{res:?}");
    }

    #[test]
    fn rejects_bad_if_condition() {
        let src = r#"
            class Main inherits Object {
              main() : Int {
                if 1 then 2 else 3 fi
              };
            };
        "#;

        let errs = check(src).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            errs[0].kind,
            SemantErrorKind::PredicateNotBool { construct: "if" }
        ));
        assert_eq!(errs[0].line, 4);
        assert_eq!(errs[0].filename, "test.cl");
    }

    #[test]
    fn identical_override_is_accepted() {
        let src = r#"
            class A { foo(x : Int) : Int { x }; };
            class B inherits A { foo(x : Int) : Int { x + 1 }; };
            class Main { main() : Object { (new B).foo(1) }; };
        "#;
        assert!(check(src).is_ok());
    }

    #[test]
    fn each_override_mismatch_is_one_error() {
        let base = "class A { foo(x : Int) : Int { x }; }; class Main { main() : Object { 0 }; };";

        let ret = errors(&format!("{base} class B inherits A {{ foo(x : Int) : Bool {{ true }}; }};"));
        assert_eq!(ret.len(), 1);
        assert!(matches!(ret[0], SemantErrorKind::OverrideReturnType { .. }));

        let arity = errors(&format!(
            "{base} class B inherits A {{ foo(x : Int, y : Int) : Int {{ x }}; }};"
        ));
        assert_eq!(arity.len(), 1);
        assert!(matches!(
            arity[0],
            SemantErrorKind::OverrideArity { expected: 1, found: 2, .. }
        ));

        let formal = errors(&format!("{base} class B inherits A {{ foo(x : Bool) : Int {{ 0 }}; }};"));
        assert_eq!(formal.len(), 1);
        assert!(matches!(formal[0], SemantErrorKind::OverrideFormalType { .. }));
    }

    #[test]
    fn attribute_initializer_mismatch_is_reported_once() {
        let errs = errors(r#"class Main { x : Int <- "hello"; main() : Object { x }; };"#);
        assert_eq!(errs.len(), 1);
        assert!(matches!(&errs[0], SemantErrorKind::AttrInitMismatch { attr, .. } if attr == "x"));
        assert!(errs[0]
            .to_string()
            .starts_with("Inconsistent types in attribute initializer"));
    }

    #[test]
    fn redeclaring_inherited_attribute_is_reported_once() {
        let src = r#"
            class A { x : Int; };
            class B inherits A { x : Int; };
            class Main { main() : Object { 0 }; };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 1);
        assert!(matches!(&errs[0], SemantErrorKind::AttrRedefined { class, attr } if class == "B" && attr == "x"));
    }

    #[test]
    fn class_errors_halt_before_type_checking() {
        let src = r#"
            class A inherits Bool { };
            class Main { main() : Int { "not an int" }; };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], SemantErrorKind::NonInheritableParent { .. }));
    }

    #[test]
    fn self_type_return_follows_the_receiver() {
        let src = r#"
            class Counter {
              n : Int;
              inc() : SELF_TYPE { { n <- n + 1; self; } };
              get() : Int { n };
            };
            class Sub inherits Counter { extra() : Bool { true }; };
            class Main {
              main() : Bool { (new Sub).inc().inc().extra() };
            };
        "#;
        assert!(check(src).is_ok(), "{:?}", check(src));
    }

    #[test]
    fn conditional_type_is_least_upper_bound() {
        let src = r#"
            class C1 { };
            class C2 inherits C1 { };
            class C3 inherits C1 { };
            class Main {
              main() : C1 { if true then new C2 else new C3 fi };
              wrong() : C2 { if true then new C2 else new C3 fi };
            };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 1);
        assert!(matches!(&errs[0], SemantErrorKind::MethodBodyMismatch { found, .. } if found == "C1"));
    }

    #[test]
    fn undefined_identifier_defaults_to_object_and_continues() {
        let src = r#"
            class Main {
              main() : Object { { y; z <- 1; 1 + true; } };
            };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 3);
        assert!(matches!(&errs[0], SemantErrorKind::UndefinedIdentifier { name } if name == "y"));
        assert!(matches!(&errs[1], SemantErrorKind::UndefinedIdentifier { name } if name == "z"));
        assert!(matches!(
            errs[2],
            SemantErrorKind::OperandMismatch { side: "Right", .. }
        ));
    }

    #[test]
    fn dispatch_checks_arity_and_argument_types() {
        let src = r#"
            class Main inherits IO {
              main() : Object { {
                out_string(1);
                out_int(1, 2);
                self.nothing();
                out_string("ok").out_int(3);
              } };
            };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 3);
        assert!(matches!(&errs[0], SemantErrorKind::DispatchArgType { expected, found, .. } if expected == "String" && found == "Int"));
        assert!(matches!(errs[1], SemantErrorKind::DispatchArity { expected: 1, found: 2, .. }));
        assert!(matches!(errs[2], SemantErrorKind::UndefinedMethod { .. }));
    }

    #[test]
    fn self_argument_conforms_as_current_class() {
        let src = r#"
            class A { take(a : A) : Int { 0 }; give() : Int { take(self) }; };
            class Main { main() : Object { 0 }; };
        "#;
        assert!(check(src).is_ok());
    }

    #[test]
    fn static_dispatch_requires_conforming_receiver() {
        let src = r#"
            class A { f() : Int { 1 }; };
            class B inherits A { f() : Int { 2 }; };
            class Main {
              main() : Int { (new B)@A.f() + (new A)@B.f() };
            };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], SemantErrorKind::StaticDispatchMismatch { .. }));
    }

    #[test]
    fn equality_between_basic_types_must_match() {
        let src = r#"
            class Main {
              main() : Bool { { 1 = 2; "a" = "b"; new Main = new Object; 1 = "a"; true = new Object; } };
            };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 2);
        assert!(errs
            .iter()
            .all(|k| matches!(k, SemantErrorKind::EqualityMismatch { .. })));
    }

    #[test]
    fn case_checks_duplicates_and_yields_lub() {
        let src = r#"
            class Main {
              main() : Object {
                case 1 of a : Int => 1; b : Int => 2; c : String => "s"; esac
              };
              lub() : Int { case 1 of a : Int => 1; c : String => "s"; esac };
            };
        "#;
        let errs = errors(src);
        assert_eq!(errs.len(), 2);
        assert!(matches!(&errs[0], SemantErrorKind::DuplicateCaseBranch { ty } if ty == "Int"));
        assert!(matches!(&errs[1], SemantErrorKind::MethodBodyMismatch { found, .. } if found == "Object"));
    }

    #[test]
    fn let_scopes_and_self_rules() {
        let src = r#"
            class Main {
              main() : Int { let x : Int <- 1 in let x : String <- "s" in x.length() };
              bad(self : Int, a : SELF_TYPE, a : Int) : Object { self <- 3 };
            };
        "#;
        let errs = errors(src);
        let expected: [fn(&SemantErrorKind) -> bool; 4] = [
            |k| matches!(k, SemantErrorKind::SelfBinding { .. }),
            |k| matches!(k, SemantErrorKind::SelfTypeFormal { .. }),
            |k| matches!(k, SemantErrorKind::DuplicateFormal { .. }),
            |k| matches!(k, SemantErrorKind::SelfAssign),
        ];
        assert_eq!(errs.len(), expected.len(), "{errs:?}");
        for (err, pred) in errs.iter().zip(expected) {
            assert!(pred(err), "unexpected {err:?}");
        }
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let errs = errors("class A { };");
        assert_eq!(errs, vec![SemantErrorKind::MissingMainClass]);

        let errs = errors("class Main { notmain() : Int { 0 }; };");
        assert_eq!(errs, vec![SemantErrorKind::MissingMainMethod]);

        // inherited main is fine
        assert!(check("class A { main() : Int { 0 }; }; class Main inherits A { };").is_ok());
    }

    #[test]
    fn every_expression_is_annotated() {
        let mut interner = Interner::new();
        let src = "class Main { main() : SELF_TYPE { { let x : Int <- 2 in x * 3; self; } }; };";
        let prog = parse_source(&mut interner, "t.cl", src).unwrap();
        type_check_program(&prog, &interner).unwrap();

        let Feature::Method(main) = &prog.classes[0].features[0] else {
            panic!("expected method");
        };
        assert_eq!(main.body.ty(), Some(sym::SELF_TYPE));
        let ExprKind::Block(body) = &main.body.kind else {
            panic!("expected block");
        };
        assert_eq!(body[0].ty(), Some(sym::INT));
        let ExprKind::Let { init, body: let_body, .. } = &body[0].kind else {
            panic!("expected let");
        };
        assert_eq!(init.ty(), Some(sym::INT));
        assert_eq!(let_body.ty(), Some(sym::INT));
    }

    #[test]
    fn error_display_has_file_and_line() {
        let errs = check("class Main {\n  main() : Int { nope };\n};").unwrap_err();
        assert_eq!(errs[0].to_string(), "test.cl:2: Undeclared identifier nope.");
    }

    /// Parse and check, keeping the annotated tree even when checking fails.
    fn annotated(src: &str) -> (Interner, Program, Vec<SemantErrorKind>) {
        let mut interner = Interner::new();
        let prog = parse_source(&mut interner, "test.cl", src).unwrap();
        let errs = match type_check_program(&prog, &interner) {
            Ok(()) => Vec::new(),
            Err(errs) => errs.into_iter().map(|e| e.kind).collect(),
        };
        (interner, prog, errs)
    }

    fn method_body<'a>(prog: &'a Program, class: usize, method: usize) -> &'a Expr {
        match &prog.classes[class].features[method] {
            Feature::Method(m) => &m.body,
            Feature::Attr(_) => panic!("expected a method"),
        }
    }

    #[test]
    fn assignment_yields_the_value_type_or_object() {
        let src = r#"
            class A { };
            class B inherits A { };
            class Main { x : A; main() : Object { x <- new B }; };
        "#;
        let (mut interner, prog, errs) = annotated(src);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(method_body(&prog, 2, 1).ty(), Some(interner.ident("B")));

        let src = r#"class Main { x : Int; main() : Object { x <- "s" }; };"#;
        let (_, prog, errs) = annotated(src);
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            &errs[0],
            SemantErrorKind::AssignMismatch { name, declared, found }
                if name == "x" && declared == "Int" && found == "String"
        ));
        assert_eq!(method_body(&prog, 0, 1).ty(), Some(sym::OBJECT));
    }

    #[test]
    fn loop_needs_bool_predicate_and_is_object() {
        let (_, _, errs) = annotated("class Main { main() : Object { while 1 loop 0 pool }; };");
        assert_eq!(errs, vec![SemantErrorKind::PredicateNotBool { construct: "while" }]);

        let (_, prog, errs) = annotated("class Main { main() : Object { while false loop 0 pool }; };");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(method_body(&prog, 0, 0).ty(), Some(sym::OBJECT));
    }

    #[test]
    fn undefined_types_are_reported_once_per_use() {
        let cases = [
            ("attribute", "a : Nope; main() : Object { 0 };"),
            ("formal", "f(x : Nope) : Object { x }; main() : Object { 0 };"),
            ("return type", "f() : Nope { 0 }; main() : Object { 0 };"),
            ("let", "main() : Object { let y : Nope in y };"),
            ("case branch", "main() : Object { case 1 of y : Nope => y; esac };"),
            ("new", "main() : Object { new Nope };"),
            ("static dispatch", "main() : Object { self@Nope.f() };"),
        ];
        for (place, features) in cases {
            let errs = errors(&format!("class Main {{ {features} }};"));
            assert_eq!(errs.len(), 1, "{place}: {errs:?}");
            assert!(
                matches!(&errs[0], SemantErrorKind::UndefinedType { ty, .. } if ty == "Nope"),
                "{place}: {errs:?}"
            );
        }
    }

    #[test]
    fn method_defined_twice_in_one_class() {
        let src = "class Main { f() : Int { 1 }; f() : Int { 2 }; main() : Object { 0 }; };";
        let errs = errors(src);
        assert_eq!(
            errs,
            vec![SemantErrorKind::MethodRedefined {
                class: "Main".to_string(),
                method: "f".to_string(),
            }]
        );
    }

    #[test]
    fn same_class_attribute_duplicate_is_not_an_inherited_redefinition() {
        let src = "class Main { x : Int; x : String; main() : Object { 0 }; };";
        let errs = check(src).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].kind,
            SemantErrorKind::AttrMultiplyDefined {
                class: "Main".to_string(),
                attr: "x".to_string(),
            }
        );
        assert_eq!(errs[0].to_string(), "test.cl:1: Attribute x is multiply defined in class Main.");

        let src = "class A { x : Int; }; class Main inherits A { x : Int; main() : Object { 0 }; };";
        assert!(matches!(errors(src).as_slice(), [SemantErrorKind::AttrRedefined { .. }]));
    }

    #[test]
    fn equality_reads_self_type_as_the_current_class() {
        let errs = errors("class Main { main() : Object { self = 1 }; };");
        assert_eq!(
            errs,
            vec![SemantErrorKind::EqualityMismatch {
                lhs: "Main".to_string(),
                rhs: "Int".to_string(),
            }]
        );
    }
}
