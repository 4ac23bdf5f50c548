// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Inheritance graph over built-in and user classes.
//!
//! Nodes live in a flat arena addressed by [`ClassId`]; parent and child links
//! are indices. `Object` is always node 0 and the root of the tree.

use std::iter;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::*;
use crate::diagnostics::{Diagnostics, SemantErrorKind};
use crate::intern::{sym, Symbol, BASIC_CLASS_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Builtin(usize),
    User(usize),
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: Symbol,
    pub parent_name: Symbol,
    pub parent: Option<ClassId>,
    pub children: Vec<ClassId>,
    pub inheritable: bool,
    /// Built-in classes and sentinels.
    pub basic: bool,
    /// Sentinels are findable by name but are not part of the tree.
    pub in_graph: bool,
    origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Problem {
    Redefined(usize),
    UndefinedParent(ClassId),
    NonInheritable(ClassId),
    Cycle(ClassId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

pub struct ClassTable<'p> {
    program: &'p Program,
    builtins: Vec<Class>,
    nodes: Vec<ClassNode>,
    by_name: FxHashMap<Symbol, ClassId>,
}

const ROOT: ClassId = ClassId(0);

impl<'p> ClassTable<'p> {
    /// Register and link every class, reporting structural errors.
    ///
    /// The cycle check only runs when registration and linking were clean, so
    /// a missing parent is never also reported as a cycle.
    pub fn build(program: &'p Program, diags: &mut Diagnostics<'_>) -> Self {
        let (table, mut problems) = Self::register(program);
        if problems.is_empty() {
            problems = table.check_cycles();
        }
        for problem in problems {
            table.report(problem, diags);
        }
        tracing::debug!(classes = table.nodes.len(), errors = diags.len(), "class table built");
        table
    }

    /// Register and link without reporting. Used on programs that already
    /// passed analysis.
    pub fn install(program: &'p Program) -> Self {
        let (table, problems) = Self::register(program);
        if !problems.is_empty() {
            tracing::warn!(count = problems.len(), "class table installed with structural errors");
        }
        table
    }

    fn register(program: &'p Program) -> (Self, Vec<Problem>) {
        let mut table = ClassTable {
            program,
            builtins: Vec::new(),
            nodes: Vec::new(),
            by_name: FxHashMap::default(),
        };
        let mut problems = Vec::new();

        for (class, inheritable, in_graph) in builtin_classes() {
            let idx = table.builtins.len();
            table.add_node(&class, Origin::Builtin(idx), inheritable, true, in_graph);
            table.builtins.push(class);
        }

        for (idx, class) in program.classes.iter().enumerate() {
            if table.by_name.contains_key(&class.name) {
                problems.push(Problem::Redefined(idx));
                continue;
            }
            table.add_node(class, Origin::User(idx), true, false, true);
        }

        for i in 0..table.nodes.len() {
            let id = ClassId(i as u32);
            if id == ROOT || !table.nodes[i].in_graph {
                continue;
            }
            let parent_name = table.nodes[i].parent_name;
            match table.by_name.get(&parent_name).copied() {
                None => problems.push(Problem::UndefinedParent(id)),
                Some(p) if !table.nodes[p.index()].inheritable => {
                    problems.push(Problem::NonInheritable(id))
                }
                Some(p) => {
                    table.nodes[i].parent = Some(p);
                    table.nodes[p.index()].children.push(id);
                }
            }
        }

        (table, problems)
    }

    fn add_node(&mut self, class: &Class, origin: Origin, inheritable: bool, basic: bool, in_graph: bool) {
        let id = ClassId(self.nodes.len() as u32);
        self.nodes.push(ClassNode {
            name: class.name,
            parent_name: class.parent,
            parent: None,
            children: Vec::new(),
            inheritable,
            basic,
            in_graph,
            origin,
        });
        self.by_name.insert(class.name, id);
    }

    /// Depth-first walk from the root; whatever stays unvisited hangs off a cycle.
    fn check_cycles(&self) -> Vec<Problem> {
        let mut state = vec![Visit::Unvisited; self.nodes.len()];
        let mut problems = Vec::new();
        let mut stack = vec![(ROOT, false)];

        while let Some((id, leaving)) = stack.pop() {
            if leaving {
                state[id.index()] = Visit::Done;
                continue;
            }
            match state[id.index()] {
                Visit::Unvisited => {}
                Visit::InProgress => {
                    problems.push(Problem::Cycle(id));
                    continue;
                }
                Visit::Done => continue,
            }
            state[id.index()] = Visit::InProgress;
            stack.push((id, true));
            for &child in self.nodes[id.index()].children.iter().rev() {
                stack.push((child, false));
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.in_graph && state[i] == Visit::Unvisited {
                problems.push(Problem::Cycle(ClassId(i as u32)));
            }
        }
        problems
    }

    fn report(&self, problem: Problem, diags: &mut Diagnostics<'_>) {
        match problem {
            Problem::Redefined(idx) => {
                let class = &self.program.classes[idx];
                let kind = SemantErrorKind::ClassRedefined {
                    class: diags.name(class.name),
                };
                diags.report(class, class.line, kind);
            }
            Problem::UndefinedParent(id) | Problem::NonInheritable(id) => {
                let class = self.klass(id);
                let names = (diags.name(class.name), diags.name(class.parent));
                let kind = match problem {
                    Problem::UndefinedParent(_) => SemantErrorKind::UndefinedParent {
                        class: names.0,
                        parent: names.1,
                    },
                    _ => SemantErrorKind::NonInheritableParent {
                        class: names.0,
                        parent: names.1,
                    },
                };
                diags.report(class, class.line, kind);
            }
            Problem::Cycle(id) => {
                let class = self.klass(id);
                let kind = SemantErrorKind::InheritanceCycle {
                    class: diags.name(class.name),
                };
                diags.report(class, class.line, kind);
            }
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn root(&self) -> ClassId {
        ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, name: Symbol) -> Option<ClassId> {
        self.by_name.get(&name).copied()
    }

    pub fn node(&self, id: ClassId) -> &ClassNode {
        &self.nodes[id.index()]
    }

    /// The class definition behind a node, built-in or user.
    pub fn klass(&self, id: ClassId) -> &Class {
        match self.nodes[id.index()].origin {
            Origin::Builtin(i) => &self.builtins[i],
            Origin::User(i) => &self.program.classes[i],
        }
    }

    /// Tree classes in pre-order from the root, children in declaration order.
    pub fn preorder(&self) -> Vec<ClassId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.index()].children.iter().rev().copied());
        }
        order
    }

    /// `id` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, id: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        iter::successors(Some(id), move |c| self.nodes[c.index()].parent)
    }

    pub fn depth(&self, id: ClassId) -> usize {
        self.ancestors(id).count() - 1
    }

    /// `a` is `b` or one of its descendants.
    pub fn conforms(&self, a: ClassId, b: ClassId) -> bool {
        self.ancestors(a).any(|c| c == b)
    }

    /// Nearest common ancestor.
    pub fn lub(&self, a: ClassId, b: ClassId) -> ClassId {
        let above_a: FxHashSet<ClassId> = self.ancestors(a).collect();
        self.ancestors(b)
            .find(|c| above_a.contains(c))
            .unwrap_or(ROOT)
    }
}

fn basic_class(name: Symbol, parent: Symbol, features: Vec<Feature>) -> Class {
    Class {
        name,
        parent,
        features,
        filename: BASIC_CLASS_FILE,
        line: 0,
    }
}

fn method(name: Symbol, formals: &[(Symbol, Symbol)], ret_type: Symbol) -> Feature {
    Feature::Method(Method {
        name,
        formals: formals
            .iter()
            .map(|&(name, ty)| Formal { name, ty, line: 0 })
            .collect(),
        ret_type,
        body: Expr::no_expr(0),
        line: 0,
    })
}

fn attr(name: Symbol, ty: Symbol) -> Feature {
    Feature::Attr(Attr {
        name,
        ty,
        init: Expr::no_expr(0),
        line: 0,
    })
}

/// Built-in classes as `(class, inheritable, in_graph)`. Method bodies are
/// empty; the runtime supplies them.
fn builtin_classes() -> Vec<(Class, bool, bool)> {
    use sym::*;

    let object = basic_class(
        OBJECT,
        NO_CLASS,
        vec![
            method(ABORT, &[], OBJECT),
            method(TYPE_NAME, &[], STRING),
            method(COPY, &[], SELF_TYPE),
        ],
    );
    let io = basic_class(
        IO,
        OBJECT,
        vec![
            method(OUT_STRING, &[(ARG, STRING)], SELF_TYPE),
            method(OUT_INT, &[(ARG, INT)], SELF_TYPE),
            method(IN_STRING, &[], STRING),
            method(IN_INT, &[], INT),
        ],
    );
    let int = basic_class(INT, OBJECT, vec![attr(VAL, PRIM_SLOT)]);
    let boolean = basic_class(BOOL, OBJECT, vec![attr(VAL, PRIM_SLOT)]);
    let string = basic_class(
        STRING,
        OBJECT,
        vec![
            attr(VAL, INT),
            attr(STR_FIELD, PRIM_SLOT),
            method(LENGTH, &[], INT),
            method(CONCAT, &[(ARG, STRING)], STRING),
            method(SUBSTR, &[(ARG, INT), (ARG2, INT)], STRING),
        ],
    );

    vec![
        (object, true, true),
        (io, true, true),
        (int, false, true),
        (boolean, false, true),
        (string, false, true),
        (basic_class(NO_CLASS, NO_CLASS, Vec::new()), false, false),
        (basic_class(SELF_TYPE, NO_CLASS, Vec::new()), false, false),
        (basic_class(PRIM_SLOT, NO_CLASS, Vec::new()), false, false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::parse_source;

    fn kinds(src: &str) -> Vec<SemantErrorKind> {
        let mut interner = Interner::new();
        let prog = parse_source(&mut interner, "t.cl", src).unwrap();
        let mut diags = Diagnostics::new(&interner);
        let _ = ClassTable::build(&prog, &mut diags);
        diags.into_errors().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn two_class_cycle_is_reported_without_looping() {
        let errs = kinds("class A inherits B {}; class B inherits A {};");
        assert_eq!(errs.len(), 2);
        assert!(errs
            .iter()
            .all(|k| matches!(k, SemantErrorKind::InheritanceCycle { .. })));
    }

    #[test]
    fn self_inheritance_is_a_cycle() {
        let errs = kinds("class A inherits A {}; class Main {};");
        assert_eq!(
            errs,
            vec![SemantErrorKind::InheritanceCycle {
                class: "A".to_string()
            }]
        );
    }

    #[test]
    fn inheriting_from_primitives_is_rejected() {
        let errs = kinds("class A inherits Int {}; class B inherits String {}; class C inherits SELF_TYPE {};");
        assert_eq!(errs.len(), 3);
        assert!(errs
            .iter()
            .all(|k| matches!(k, SemantErrorKind::NonInheritableParent { .. })));
    }

    #[test]
    fn redefinition_and_missing_parent_are_collected_together() {
        let errs = kinds("class A {}; class A {}; class Int {}; class B inherits Nope {};");
        assert_eq!(errs.len(), 3);
        assert!(matches!(&errs[0], SemantErrorKind::ClassRedefined { class } if class == "A"));
        assert!(matches!(&errs[1], SemantErrorKind::ClassRedefined { class } if class == "Int"));
        assert!(matches!(&errs[2], SemantErrorKind::UndefinedParent { parent, .. } if parent == "Nope"));
    }

    #[test]
    fn preorder_starts_at_object_and_covers_the_tree() {
        let mut interner = Interner::new();
        let prog = parse_source(&mut interner, "t.cl", "class B inherits A {}; class A {};").unwrap();
        let mut diags = Diagnostics::new(&interner);
        let table = ClassTable::build(&prog, &mut diags);
        assert!(diags.is_empty());

        let names: Vec<&str> = table
            .preorder()
            .into_iter()
            .map(|id| interner.name(table.node(id).name))
            .collect();
        assert_eq!(names, vec!["Object", "IO", "Int", "Bool", "String", "A", "B"]);
    }

    #[test]
    fn conforms_is_reflexive_and_lub_finds_common_ancestor() {
        let mut interner = Interner::new();
        let src = "class C1 {}; class C2 inherits C1 {}; class C3 inherits C1 {}; class C4 inherits C3 {};";
        let prog = parse_source(&mut interner, "t.cl", src).unwrap();
        let mut diags = Diagnostics::new(&interner);
        let table = ClassTable::build(&prog, &mut diags);
        let id = |name: &str| table.find(interner.idents.lookup(name).unwrap()).unwrap();

        for c in table.preorder() {
            assert!(table.conforms(c, c));
        }
        assert_eq!(table.lub(id("C2"), id("C3")), id("C1"));
        assert_eq!(table.lub(id("C3"), id("C2")), id("C1"));
        assert_eq!(table.lub(id("C4"), id("C2")), id("C1"));
        assert_eq!(table.lub(id("C4"), id("C3")), id("C3"));
        assert_eq!(table.lub(id("C2"), id("Int")), table.root());
        assert!(table.conforms(id("C4"), id("C1")));
        assert!(!table.conforms(id("C1"), id("C4")));
        assert_eq!(table.depth(id("C4")), 3);
    }

    #[test]
    fn sentinels_are_findable_but_outside_the_tree() {
        let interner = Interner::new();
        let prog = Program::default();
        let mut diags = Diagnostics::new(&interner);
        let table = ClassTable::build(&prog, &mut diags);
        let self_type = table.find(sym::SELF_TYPE).unwrap();
        assert!(!table.node(self_type).in_graph);
        assert!(!table.preorder().contains(&self_type));
        assert!(diags.is_empty());
    }
}
