// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Semantic error taxonomy and the accumulating reporter.

use thiserror::Error;

use crate::ast::{Class, Line};
use crate::intern::{Interner, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemantErrorKind {
    // class table
    #[error("Class {class} redefined.")]
    ClassRedefined { class: String },
    #[error("Class {class} inherits from an undefined class {parent}.")]
    UndefinedParent { class: String, parent: String },
    #[error("Class {class} cannot inherit class {parent}.")]
    NonInheritableParent { class: String, parent: String },
    #[error("Class {class}, or an ancestor of {class}, is involved in an inheritance cycle.")]
    InheritanceCycle { class: String },

    // table construction
    #[error("Attribute {attr} is an attribute of an inherited class.")]
    AttrRedefined { class: String, attr: String },
    #[error("Attribute {attr} is multiply defined in class {class}.")]
    AttrMultiplyDefined { class: String, attr: String },
    #[error("Method {method} is multiply defined in class {class}.")]
    MethodRedefined { class: String, method: String },
    #[error(
        "In redefined method {method}, return type {found} is different from original return type {expected}."
    )]
    OverrideReturnType {
        method: String,
        expected: String,
        found: String,
    },
    #[error(
        "Incompatible number of formal parameters in redefined method {method}: expected {expected}, found {found}."
    )]
    OverrideArity {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error(
        "In redefined method {method}, parameter type {found} is different from original type {expected}."
    )]
    OverrideFormalType {
        method: String,
        formal: String,
        expected: String,
        found: String,
    },

    // declarations
    #[error("Class {ty} of {what} is undefined.")]
    UndefinedType { ty: String, what: String },
    #[error("Formal parameter {name} is multiply defined.")]
    DuplicateFormal { name: String },
    #[error("Formal parameter {name} cannot have type SELF_TYPE.")]
    SelfTypeFormal { name: String },
    #[error("'self' cannot be the name of {what}.")]
    SelfBinding { what: &'static str },
    #[error("Cannot assign to 'self'.")]
    SelfAssign,
    #[error("Duplicate branch {ty} in case statement.")]
    DuplicateCaseBranch { ty: String },
    #[error("Identifier {name} declared with type SELF_TYPE in case branch.")]
    SelfTypeCaseBranch { name: String },

    // expressions
    #[error("Undeclared identifier {name}.")]
    UndefinedIdentifier { name: String },
    #[error("Inconsistent types in attribute initializer: type {found} of initialization of attribute {attr} does not conform to declared type {declared}.")]
    AttrInitMismatch {
        attr: String,
        declared: String,
        found: String,
    },
    #[error("Type {found} of assigned expression does not conform to declared type {declared} of identifier {name}.")]
    AssignMismatch {
        name: String,
        declared: String,
        found: String,
    },
    #[error("Inferred type {found} of initialization of {name} does not conform to identifier's declared type {declared}.")]
    LetInitMismatch {
        name: String,
        declared: String,
        found: String,
    },
    #[error("Inferred return type {found} of method {method} does not conform to declared return type {declared}.")]
    MethodBodyMismatch {
        method: String,
        declared: String,
        found: String,
    },
    #[error("Predicate of '{construct}' does not have type Bool.")]
    PredicateNotBool { construct: &'static str },
    #[error("{side} operand of '{op}' has type {found} instead of {expected}.")]
    OperandMismatch {
        op: &'static str,
        side: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("Illegal comparison with a basic type: {lhs} = {rhs}.")]
    EqualityMismatch { lhs: String, rhs: String },
    #[error("Expression type {found} does not conform to declared static dispatch type {declared}.")]
    StaticDispatchMismatch { found: String, declared: String },
    #[error("Dispatch to undefined method {method} on type {ty}.")]
    UndefinedMethod { method: String, ty: String },
    #[error("Method {method} called with wrong number of arguments: expected {expected}, found {found}.")]
    DispatchArity {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("In call of method {method}, type {found} of parameter {formal} does not conform to declared type {expected}.")]
    DispatchArgType {
        method: String,
        formal: String,
        expected: String,
        found: String,
    },

    // entry point
    #[error("Class Main is not defined.")]
    MissingMainClass,
    #[error("No 'main' method in class Main.")]
    MissingMainMethod,
}

/// A semantic error located at a file and line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{filename}:{line}: {kind}")]
pub struct SemantError {
    pub filename: String,
    pub line: Line,
    pub kind: SemantErrorKind,
}

/// Accumulates errors for one analysis run. Checked at phase boundaries.
pub struct Diagnostics<'i> {
    interner: &'i Interner,
    errors: Vec<SemantError>,
}

impl<'i> Diagnostics<'i> {
    pub fn new(interner: &'i Interner) -> Self {
        Self {
            interner,
            errors: Vec::new(),
        }
    }

    /// Resolve a symbol for use in a message.
    pub fn name(&self, sym: Symbol) -> String {
        self.interner.name(sym).to_string()
    }

    /// Record an error at `line` in the file that defines `class`.
    pub fn report(&mut self, class: &Class, line: Line, kind: SemantErrorKind) {
        let err = SemantError {
            filename: self.interner.string(class.filename).to_string(),
            line,
            kind,
        };
        tracing::debug!(error = %err, "semantic error");
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<SemantError> {
        self.errors
    }
}
