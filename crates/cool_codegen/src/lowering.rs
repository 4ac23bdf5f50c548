// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Text segment: object initializers and method bodies.
//!
//! Frame layout, with `F = 3 + temps` and `k` arguments:
//!
//! ```text
//!   fp + 4*(F-1+k-i)   argument i (pushed left to right by the caller)
//!   fp + 4*(temps+2)   saved $fp
//!   fp + 4*(temps+1)   saved $s0
//!   fp + 4*temps       saved $ra
//!   fp + 4*i           temporary i
//! ```

use cool_frontend::intern::{EMPTY_STR, INT_ZERO};
use cool_frontend::scoped::ScopedTable;
use cool_frontend::{
    sym, BinOp, Class, ClassId, ClassTable, Expr, ExprKind, Interner, Method, Symbol, UnOp,
};

use crate::abi::{self, ACC, A1, FP, RA, SELF, SP, T1, T2, ZERO};
use crate::binding::{ClassLayout, Layouts};
use crate::emit::{Asm, Label};
use crate::{CodegenOptions, GcMode};

/// Read-only state shared by every emitter.
pub struct CgenContext<'a, 'p> {
    pub classes: &'a ClassTable<'p>,
    pub layouts: &'a Layouts,
    pub interner: &'a Interner,
    pub options: &'a CodegenOptions,
}

impl<'a> CgenContext<'a, '_> {
    pub fn name(&self, s: Symbol) -> &'a str {
        self.interner.name(s)
    }

    pub fn layout_of(&self, class: Symbol) -> &'a ClassLayout {
        match self.classes.find(class) {
            Some(id) => self.layouts.get(id),
            None => panic!("no layout for class {}", self.name(class)),
        }
    }

    pub fn tag_of(&self, class: Symbol) -> u32 {
        self.layout_of(class).tag
    }

    /// Label of the interned string constant equal to `s`.
    pub fn str_label(&self, s: &str) -> String {
        match self.interner.strings.lookup(s) {
            Some(id) => abi::str_const(id.id()),
            None => panic!("string constant {s:?} was not interned"),
        }
    }
}

/// Frame words needed for temporaries while evaluating `e`.
pub fn temps_needed(e: &Expr) -> i32 {
    match &e.kind {
        ExprKind::Assign { value, .. } => temps_needed(value),
        ExprKind::Dispatch { receiver, args, .. }
        | ExprKind::StaticDispatch { receiver, args, .. } => args
            .iter()
            .map(temps_needed)
            .fold(temps_needed(receiver), i32::max),
        ExprKind::Cond {
            pred,
            then_branch,
            else_branch,
        } => temps_needed(pred)
            .max(temps_needed(then_branch))
            .max(temps_needed(else_branch)),
        ExprKind::Loop { pred, body } => temps_needed(pred).max(temps_needed(body)),
        ExprKind::Block(body) => body.iter().map(temps_needed).max().unwrap_or(0),
        ExprKind::Let { init, body, .. } => temps_needed(init).max(1 + temps_needed(body)),
        ExprKind::Case {
            scrutinee,
            branches,
        } => {
            let branch = branches.iter().map(|b| temps_needed(&b.body)).max().unwrap_or(0);
            temps_needed(scrutinee).max(1 + branch)
        }
        ExprKind::Unary { operand, .. } => temps_needed(operand),
        ExprKind::Binary { lhs, rhs, .. } => temps_needed(lhs).max(1 + temps_needed(rhs)),
        ExprKind::New(_)
        | ExprKind::Ref(_)
        | ExprKind::NoExpr
        | ExprKind::Str(_)
        | ExprKind::Int(_)
        | ExprKind::Bool(_) => 0,
    }
}

/// Initializers for every class, then the methods of every user class.
pub fn emit_text(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    for (id, _) in cx.layouts.in_tag_order() {
        emit_init(asm, cx, id);
    }
    for (id, layout) in cx.layouts.in_tag_order() {
        if cx.classes.node(id).basic {
            continue;
        }
        let class = cx.classes.klass(id);
        tracing::debug!(class = cx.name(layout.name), "emitting methods");
        for m in class.methods() {
            let mut g = MethodGen::new(cx, asm, class, layout);
            g.method(m);
        }
    }
}

fn emit_init(asm: &mut Asm, cx: &CgenContext<'_, '_>, id: ClassId) {
    let class = cx.classes.klass(id);
    let layout = cx.layouts.get(id);
    let temps = class.attrs().map(|a| temps_needed(&a.init)).max().unwrap_or(0);

    asm.def(&abi::init(cx.name(layout.name)));
    let mut g = MethodGen::new(cx, asm, class, layout);
    g.temps = temps;
    g.prologue();
    if let Some(parent) = cx.classes.node(id).parent {
        let parent = cx.classes.node(parent).name;
        g.asm.jal(&abi::init(cx.name(parent)));
    }
    for a in class.attrs() {
        if a.init.is_no_expr() {
            continue;
        }
        g.expr(&a.init);
        let Some(slot) = layout.attr(a.name) else {
            panic!("attribute {} has no slot", cx.name(a.name));
        };
        g.store(Loc::Attr(slot.offset));
    }
    g.asm.mv(ACC, SELF);
    g.epilogue(0);
}

/// Where a name lives at run time, as a word offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Loc {
    /// Off `$s0`.
    Attr(i32),
    /// Off `$fp`.
    Frame(i32),
}

struct MethodGen<'g, 'a, 'p> {
    cx: &'g CgenContext<'a, 'p>,
    asm: &'g mut Asm,
    class: &'a Class,
    layout: &'a ClassLayout,
    vars: ScopedTable<Symbol, Loc>,
    temps: i32,
    next_temp: i32,
}

impl<'g, 'a, 'p> MethodGen<'g, 'a, 'p> {
    fn new(
        cx: &'g CgenContext<'a, 'p>,
        asm: &'g mut Asm,
        class: &'a Class,
        layout: &'a ClassLayout,
    ) -> Self {
        let mut vars = ScopedTable::new();
        vars.enter_scope();
        for a in &layout.attrs {
            let _ = vars.add_to_scope(a.name, Loc::Attr(a.offset));
        }
        Self {
            cx,
            asm,
            class,
            layout,
            vars,
            temps: 0,
            next_temp: 0,
        }
    }

    fn frame_words(&self) -> i32 {
        abi::FRAME_SAVED_WORDS + self.temps
    }

    fn prologue(&mut self) {
        let f = self.frame_words();
        self.asm.addiu(SP, SP, -f * abi::WORD_SIZE);
        self.asm.sw(FP, f, SP);
        self.asm.sw(SELF, f - 1, SP);
        self.asm.sw(RA, f - 2, SP);
        self.asm.addiu(FP, SP, abi::WORD_SIZE);
        self.asm.mv(SELF, ACC);
    }

    /// Restore the caller's registers and pop the frame and `args` arguments.
    fn epilogue(&mut self, args: i32) {
        let f = self.frame_words();
        self.asm.lw(FP, f, SP);
        self.asm.lw(SELF, f - 1, SP);
        self.asm.lw(RA, f - 2, SP);
        self.asm.addiu(SP, SP, (f + args) * abi::WORD_SIZE);
        self.asm.ret();
    }

    fn method(&mut self, m: &Method) {
        let label = abi::method(self.cx.name(self.layout.name), self.cx.name(m.name));
        tracing::trace!(%label, "method");
        self.asm.def(&label);

        self.temps = temps_needed(&m.body);
        self.prologue();

        let k = m.formals.len() as i32;
        let f = self.frame_words();
        self.vars.enter_scope();
        for (i, formal) in m.formals.iter().enumerate() {
            let _ = self.vars.add_to_scope(formal.name, Loc::Frame(f - 1 + k - i as i32));
        }
        self.expr(&m.body);
        self.vars.exit_scope();

        self.epilogue(k);
    }

    fn alloc_temp(&mut self) -> i32 {
        let t = self.next_temp;
        self.next_temp += 1;
        debug_assert!(self.next_temp <= self.temps, "temporary count underestimated");
        t
    }

    fn free_temp(&mut self) {
        self.next_temp -= 1;
    }

    fn lookup(&self, name: Symbol) -> Loc {
        match self.vars.lookup(&name) {
            Some(&loc) => loc,
            None => panic!("unbound identifier {}", self.cx.name(name)),
        }
    }

    fn load(&mut self, loc: Loc) {
        match loc {
            Loc::Attr(off) => self.asm.lw(ACC, off, SELF),
            Loc::Frame(off) => self.asm.lw(ACC, off, FP),
        }
    }

    fn store(&mut self, loc: Loc) {
        match loc {
            Loc::Attr(off) => {
                self.asm.sw(ACC, off, SELF);
                if self.cx.options.gc == GcMode::Generational {
                    self.asm.addiu(A1, SELF, off * abi::WORD_SIZE);
                    self.asm.jal(abi::FN_GC_ASSIGN);
                }
            }
            Loc::Frame(off) => self.asm.sw(ACC, off, FP),
        }
    }

    /// Clone the object in `$a0` through the runtime.
    fn copy_object(&mut self) {
        self.asm.jal(abi::FN_COPY);
        if self.cx.options.gc_debug {
            self.asm.mv(A1, ACC);
            self.asm.jal(abi::FN_GC_CHECK);
        }
    }

    fn static_type(&self, e: &Expr) -> Symbol {
        match e.ty() {
            Some(ty) if ty == sym::SELF_TYPE => self.layout.name,
            Some(ty) => ty,
            None => panic!("expression at line {} was not type checked", e.line),
        }
    }

    fn default_value(&mut self, ty: Symbol) {
        if ty == sym::INT {
            self.asm.la(ACC, &abi::int_const(INT_ZERO.id()));
        } else if ty == sym::STRING {
            self.asm.la(ACC, &abi::str_const(EMPTY_STR.id()));
        } else if ty == sym::BOOL {
            self.asm.la(ACC, &abi::bool_const(false));
        } else {
            self.asm.mv(ACC, ZERO);
        }
    }

    /// Abort through `routine` with the file name and line when `$a0` is void.
    fn void_check(&mut self, routine: &str, line: u32) {
        let ok = self.asm.new_label();
        self.asm.bne(ACC, ZERO, ok);
        self.asm.la(ACC, &abi::str_const(self.class.filename.id()));
        self.asm.li(T1, i64::from(line));
        self.asm.jal(routine);
        self.asm.def_label(ok);
    }

    /// Leave the value of `e` in `$a0`.
    fn expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Int(id) => self.asm.la(ACC, &abi::int_const(id.id())),
            ExprKind::Str(id) => self.asm.la(ACC, &abi::str_const(id.id())),
            ExprKind::Bool(b) => self.asm.la(ACC, &abi::bool_const(*b)),
            ExprKind::NoExpr => self.asm.mv(ACC, ZERO),

            ExprKind::Ref(name) if *name == sym::SELF => self.asm.mv(ACC, SELF),
            ExprKind::Ref(name) => {
                let loc = self.lookup(*name);
                self.load(loc);
            }

            ExprKind::Assign { name, value } => {
                self.expr(value);
                let loc = self.lookup(*name);
                self.store(loc);
            }

            ExprKind::Dispatch {
                receiver,
                method,
                args,
            } => self.dispatch(e.line, receiver, None, *method, args),
            ExprKind::StaticDispatch {
                receiver,
                static_type,
                method,
                args,
            } => self.dispatch(e.line, receiver, Some(*static_type), *method, args),

            ExprKind::Cond {
                pred,
                then_branch,
                else_branch,
            } => {
                let else_l = self.asm.new_label();
                let end = self.asm.new_label();
                self.expr(pred);
                self.asm.fetch_int(T1, ACC);
                self.asm.beqz(T1, else_l);
                self.expr(then_branch);
                self.asm.b(end);
                self.asm.def_label(else_l);
                self.expr(else_branch);
                self.asm.def_label(end);
            }

            ExprKind::Loop { pred, body } => {
                let top = self.asm.new_label();
                let end = self.asm.new_label();
                self.asm.def_label(top);
                self.expr(pred);
                self.asm.fetch_int(T1, ACC);
                self.asm.beqz(T1, end);
                self.expr(body);
                self.asm.b(top);
                self.asm.def_label(end);
                self.asm.mv(ACC, ZERO);
            }

            ExprKind::Block(body) => {
                for ex in body {
                    self.expr(ex);
                }
            }

            ExprKind::Let {
                name,
                ty,
                init,
                body,
            } => {
                if init.is_no_expr() {
                    self.default_value(*ty);
                } else {
                    self.expr(init);
                }
                let t = self.alloc_temp();
                self.asm.sw(ACC, t, FP);
                self.vars.enter_scope();
                let _ = self.vars.add_to_scope(*name, Loc::Frame(t));
                self.expr(body);
                self.vars.exit_scope();
                self.free_temp();
            }

            ExprKind::Case {
                scrutinee,
                branches,
            } => {
                self.expr(scrutinee);
                self.void_check(abi::FN_CASE_ABORT2, e.line);
                self.asm.lw(T2, abi::TAG_OFFSET, ACC);

                let end = self.asm.new_label();
                let t = self.alloc_temp();

                // most derived first, so the first matching range is the closest
                let mut ordered: Vec<_> = branches
                    .iter()
                    .map(|b| (self.cx.layout_of(b.ty), b))
                    .collect();
                ordered.sort_by(|(a, _), (b, _)| b.depth.cmp(&a.depth));

                for (layout, b) in ordered {
                    let next = self.asm.new_label();
                    self.asm.blti(T2, layout.tag, next);
                    self.asm.bgti(T2, layout.last_tag, next);
                    self.asm.sw(ACC, t, FP);
                    self.vars.enter_scope();
                    let _ = self.vars.add_to_scope(b.name, Loc::Frame(t));
                    self.expr(&b.body);
                    self.vars.exit_scope();
                    self.asm.b(end);
                    self.asm.def_label(next);
                }
                self.asm.jal(abi::FN_CASE_ABORT);
                self.asm.def_label(end);
                self.free_temp();
            }

            ExprKind::New(ty) if *ty == sym::SELF_TYPE => {
                // class_objTab holds (protObj, init) pairs indexed by tag
                self.asm.la(T1, abi::CLASS_OBJ_TAB);
                self.asm.lw(T2, abi::TAG_OFFSET, SELF);
                self.asm.sll(T2, T2, 3);
                self.asm.binop("addu", T1, T1, T2);
                self.asm.push(T1);
                self.asm.lw(ACC, 0, T1);
                self.copy_object();
                self.asm.pop(T1);
                self.asm.lw(T1, 1, T1);
                self.asm.jalr(T1);
            }
            ExprKind::New(ty) => {
                let name = self.cx.name(*ty);
                self.asm.la(ACC, &abi::protobj(name));
                self.copy_object();
                self.asm.jal(&abi::init(name));
            }

            ExprKind::Unary { op, operand } => {
                self.expr(operand);
                match op {
                    UnOp::Neg => {
                        self.copy_object();
                        self.asm.fetch_int(T1, ACC);
                        self.asm.neg(T1, T1);
                        self.asm.store_int(T1, ACC);
                    }
                    UnOp::Not => {
                        self.asm.fetch_int(T1, ACC);
                        self.select_bool(|asm, l| asm.beqz(T1, l));
                    }
                    UnOp::IsVoid => {
                        self.asm.mv(T1, ACC);
                        self.select_bool(|asm, l| asm.beqz(T1, l));
                    }
                }
            }

            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs);
                let t = self.alloc_temp();
                self.asm.sw(ACC, t, FP);
                self.expr(rhs);
                self.free_temp();

                match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                        self.copy_object();
                        self.asm.lw(T1, t, FP);
                        self.asm.fetch_int(T1, T1);
                        self.asm.fetch_int(T2, ACC);
                        let opcode = match op {
                            BinOp::Add => "add",
                            BinOp::Sub => "sub",
                            BinOp::Mul => "mul",
                            _ => "div",
                        };
                        self.asm.binop(opcode, T1, T1, T2);
                        self.asm.store_int(T1, ACC);
                    }
                    BinOp::Lt | BinOp::Le => {
                        self.asm.lw(T1, t, FP);
                        self.asm.fetch_int(T1, T1);
                        self.asm.fetch_int(T2, ACC);
                        if *op == BinOp::Lt {
                            self.select_bool(|asm, l| asm.blt(T1, T2, l));
                        } else {
                            self.select_bool(|asm, l| asm.ble(T1, T2, l));
                        }
                    }
                    BinOp::Eq => {
                        self.asm.mv(T2, ACC);
                        self.asm.lw(T1, t, FP);
                        let done = self.asm.new_label();
                        self.asm.la(ACC, &abi::bool_const(true));
                        self.asm.beq(T1, T2, done);
                        self.asm.la(A1, &abi::bool_const(false));
                        self.asm.jal(abi::FN_EQUALITY_TEST);
                        self.asm.def_label(done);
                    }
                }
            }
        }
    }

    /// `$a0 <- true` when `branch` jumps, else false.
    fn select_bool(&mut self, branch: impl FnOnce(&mut Asm, Label)) {
        let done = self.asm.new_label();
        self.asm.la(ACC, &abi::bool_const(true));
        branch(&mut *self.asm, done);
        self.asm.la(ACC, &abi::bool_const(false));
        self.asm.def_label(done);
    }

    fn dispatch(
        &mut self,
        line: u32,
        receiver: &Expr,
        static_type: Option<Symbol>,
        method: Symbol,
        args: &[Expr],
    ) {
        for a in args {
            self.expr(a);
            self.asm.push(ACC);
        }
        self.expr(receiver);
        self.void_check(abi::FN_DISPATCH_ABORT, line);

        let target = static_type.unwrap_or_else(|| self.static_type(receiver));
        let layout = self.cx.layout_of(target);
        let Some(slot) = layout.method_slot(method) else {
            panic!(
                "no method {} in class {}",
                self.cx.name(method),
                self.cx.name(target)
            );
        };

        match static_type {
            Some(t) => self.asm.la(T1, &abi::disptab(self.cx.name(t))),
            None => self.asm.lw(T1, abi::DISPTABLE_OFFSET, ACC),
        }
        self.asm.lw(T1, slot as i32, T1);
        self.asm.jalr(T1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cool_frontend::{parse_source, Feature, Interner};

    fn body_temps(src: &str) -> i32 {
        let mut interner = Interner::new();
        let prog = parse_source(&mut interner, "t.cl", src).unwrap();
        let Some(Feature::Method(m)) = prog.classes[0].features.first() else {
            panic!("expected a method");
        };
        temps_needed(&m.body)
    }

    #[test]
    fn temporaries_follow_nesting() {
        assert_eq!(body_temps("class A { f() : Int { 1 }; };"), 0);
        assert_eq!(body_temps("class A { f() : Int { 1 + 2 }; };"), 1);
        // the right operand needs its own slot above the spilled left one
        assert_eq!(body_temps("class A { f() : Int { 1 + (2 + 3) }; };"), 2);
        assert_eq!(body_temps("class A { f() : Int { (1 + 2) + 3 }; };"), 1);
        assert_eq!(
            body_temps("class A { f() : Int { let x : Int, y : Int in x + y }; };"),
            3
        );
        assert_eq!(
            body_temps("class A { f() : Object { case 1 of x : Int => x + 1; y : Object => y; esac }; };"),
            2
        );
    }
}
