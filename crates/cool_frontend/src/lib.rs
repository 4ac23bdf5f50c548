// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

pub mod ast;
pub mod class_table;
pub mod diagnostics;
pub mod dump;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod scoped;
pub mod typechecker;

pub use ast::*;
pub use class_table::{ClassId, ClassNode, ClassTable};
pub use diagnostics::{SemantError, SemantErrorKind};
pub use dump::{dump_program, DumpTypes};
pub use intern::{sym, IntId, Interner, StrId, Symbol};
pub use lexer::{lex, strip_comments, LexError, Lexed, Tok};
pub use parser::{parse_program, SyntaxError};
pub use typechecker::{analyze, type_check_program, Analysis, ClassScopes, MethodSig};

/// Lex and parse one source file. Lexical errors come back as a single
/// syntax error at the offending line.
pub fn parse_source(
    interner: &mut Interner,
    filename: &str,
    src: &str,
) -> Result<Program, Vec<SyntaxError>> {
    let lexed = lex(src).map_err(|e| {
        vec![SyntaxError {
            filename: filename.to_string(),
            line: e.line,
            message: e.message,
        }]
    })?;
    parse_program(&lexed, filename, interner)
}
