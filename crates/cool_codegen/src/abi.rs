// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! COOL SPIM runtime ABI: object layout, register names, label naming and the
//! runtime entry points the generated code calls.

pub const WORD_SIZE: i32 = 4;

/// Object header words.
pub const TAG_OFFSET: i32 = 0;
pub const SIZE_OFFSET: i32 = 1;
pub const DISPTABLE_OFFSET: i32 = 2;
pub const DEFAULT_OBJFIELDS: i32 = 3;

/// Payload words of the boxed basic classes.
pub const INT_SLOTS: i32 = 1;
pub const BOOL_SLOTS: i32 = 1;
pub const STRING_SLOTS: i32 = 1;

/// Words above the temporaries in every frame: saved $fp, $s0 and $ra.
pub const FRAME_SAVED_WORDS: i32 = 3;

pub type Register = &'static str;

pub const ZERO: Register = "$zero";
/// Accumulator.
pub const ACC: Register = "$a0";
pub const A1: Register = "$a1";
/// Self, callee saved.
pub const SELF: Register = "$s0";
pub const T1: Register = "$t1";
pub const T2: Register = "$t2";
pub const SP: Register = "$sp";
pub const FP: Register = "$fp";
pub const RA: Register = "$ra";

// global names
pub const CLASS_NAME_TAB: &str = "class_nameTab";
pub const CLASS_OBJ_TAB: &str = "class_objTab";
pub const INT_TAG: &str = "_int_tag";
pub const BOOL_TAG: &str = "_bool_tag";
pub const STRING_TAG: &str = "_string_tag";
pub const HEAP_START: &str = "heap_start";

// label suffixes and prefixes
pub const DISPTAB_SUFFIX: &str = "_dispTab";
pub const METHOD_SEP: &str = ".";
pub const CLASSINIT_SUFFIX: &str = "_init";
pub const PROTOBJ_SUFFIX: &str = "_protObj";
pub const INTCONST_PREFIX: &str = "int_const";
pub const STRCONST_PREFIX: &str = "str_const";
pub const BOOLCONST_PREFIX: &str = "bool_const";

// runtime entry points
pub const FN_COPY: &str = "Object.copy";
pub const FN_EQUALITY_TEST: &str = "equality_test";
pub const FN_DISPATCH_ABORT: &str = "_dispatch_abort";
pub const FN_CASE_ABORT: &str = "_case_abort";
pub const FN_CASE_ABORT2: &str = "_case_abort2";
pub const FN_GC_ASSIGN: &str = "_GenGC_Assign";
pub const FN_GC_CHECK: &str = "_gc_check";

// memory manager selection words
pub const MEMMGR_INITIALIZER: &str = "_MemMgr_INITIALIZER";
pub const MEMMGR_COLLECTOR: &str = "_MemMgr_COLLECTOR";
pub const MEMMGR_TEST: &str = "_MemMgr_TEST";

pub fn protobj(class: &str) -> String {
    format!("{class}{PROTOBJ_SUFFIX}")
}

pub fn disptab(class: &str) -> String {
    format!("{class}{DISPTAB_SUFFIX}")
}

pub fn init(class: &str) -> String {
    format!("{class}{CLASSINIT_SUFFIX}")
}

pub fn method(class: &str, method: &str) -> String {
    format!("{class}{METHOD_SEP}{method}")
}

pub fn int_const(id: u32) -> String {
    format!("{INTCONST_PREFIX}{id}")
}

pub fn str_const(id: u32) -> String {
    format!("{STRCONST_PREFIX}{id}")
}

pub fn bool_const(value: bool) -> String {
    format!("{BOOLCONST_PREFIX}{}", u8::from(value))
}
