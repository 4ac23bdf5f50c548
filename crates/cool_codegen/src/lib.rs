// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

pub mod abi;
pub mod binding;
pub mod data;
pub mod emit;
pub mod lowering;

use cool_frontend::{sym, ClassTable, Interner, Program};
use thiserror::Error;

use crate::binding::Layouts;
use crate::emit::Asm;
use crate::lowering::CgenContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("Class Main is not defined.")]
    MissingMainClass,
    #[error("No 'main' method in class Main.")]
    MissingMainMethod,
}

/// Garbage collector the runtime is told to install. Only selects labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GcMode {
    #[default]
    None,
    Generational,
    StopAndCopy,
}

impl GcMode {
    pub fn init_label(self) -> &'static str {
        match self {
            GcMode::None => "_NoGC_Init",
            GcMode::Generational => "_GenGC_Init",
            GcMode::StopAndCopy => "_ScnGC_Init",
        }
    }

    pub fn collect_label(self) -> &'static str {
        match self {
            GcMode::None => "_NoGC_Collect",
            GcMode::Generational => "_GenGC_Collect",
            GcMode::StopAndCopy => "_ScnGC_Collect",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    pub gc: GcMode,
    /// Sets `_MemMgr_TEST`.
    pub gc_test: bool,
    /// Check the heap after every allocation.
    pub gc_debug: bool,
    pub optimize: bool,
    pub disable_reg_alloc: bool,
}

pub struct Codegen {
    options: CodegenOptions,
}

impl Codegen {
    pub fn new(options: CodegenOptions) -> Self {
        if options.optimize || options.disable_reg_alloc {
            tracing::info!(
                optimize = options.optimize,
                disable_reg_alloc = options.disable_reg_alloc,
                "flags accepted with no effect on output"
            );
        }
        Self { options }
    }

    /// Emit the SPIM listing for a program that passed semantic analysis.
    ///
    /// Class names and string lengths are interned as constants
    /// before anything is written.
    pub fn compile_program(&self, p: &Program, interner: &mut Interner) -> Result<String, CodegenError> {
        let classes = ClassTable::install(p);
        let layouts = Layouts::bind(&classes);

        let main = classes
            .find(sym::MAIN_CLASS)
            .filter(|&id| classes.node(id).in_graph)
            .ok_or(CodegenError::MissingMainClass)?;
        if layouts.get(main).method(sym::MAIN_METHOD).is_none() {
            return Err(CodegenError::MissingMainMethod);
        }

        intern_constants(&layouts, interner);
        let interner: &Interner = interner;

        let cx = CgenContext {
            classes: &classes,
            layouts: &layouts,
            interner,
            options: &self.options,
        };
        let mut asm = Asm::new();
        data::emit_data(&mut asm, &cx);
        data::emit_global_text(&mut asm, &cx);
        lowering::emit_text(&mut asm, &cx);

        tracing::debug!(classes = layouts.len(), "code generation finished");
        Ok(asm.finish())
    }
}

/// Every class name becomes a string constant, and every string constant's
/// length an int constant. File names were interned by the parser.
fn intern_constants(layouts: &Layouts, interner: &mut Interner) {
    for (_, layout) in layouts.in_tag_order() {
        let name = interner.idents.get(layout.name).clone();
        interner.strings.emplace(name.as_str());
    }
    let lengths: Vec<i32> = interner
        .strings
        .iter()
        .map(|(_, s)| s.len() as i32)
        .collect();
    for len in lengths {
        interner.ints.emplace(&len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_labels_follow_the_mode() {
        assert_eq!(GcMode::default().init_label(), "_NoGC_Init");
        assert_eq!(GcMode::Generational.collect_label(), "_GenGC_Collect");
        assert_eq!(GcMode::StopAndCopy.init_label(), "_ScnGC_Init");
    }
}
