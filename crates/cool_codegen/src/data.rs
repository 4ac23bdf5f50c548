// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Data segment: tag words, memory manager selection, constants, class tables,
//! dispatch tables and prototype objects.

use cool_frontend::intern::{EMPTY_STR, INT_ZERO};
use cool_frontend::sym;

use crate::abi;
use crate::emit::Asm;
use crate::lowering::CgenContext;

pub fn emit_data(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    global_data(asm, cx);
    select_gc(asm, cx);
    constants(asm, cx);
    class_name_table(asm, cx);
    class_obj_table(asm, cx);
    dispatch_tables(asm, cx);
    prototypes(asm, cx);
}

/// `heap_start` closes the data segment; then the text-segment globals.
pub fn emit_global_text(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    asm.global(abi::HEAP_START);
    asm.def(abi::HEAP_START);
    asm.word(0);
    asm.text();
    asm.global(&abi::init(cx.name(sym::MAIN_CLASS)));
    asm.global(&abi::init(cx.name(sym::INT)));
    asm.global(&abi::init(cx.name(sym::STRING)));
    asm.global(&abi::init(cx.name(sym::BOOL)));
    asm.global(&abi::method(cx.name(sym::MAIN_CLASS), cx.name(sym::MAIN_METHOD)));
}

fn global_data(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    asm.data();
    asm.align();

    asm.global(abi::CLASS_NAME_TAB);
    asm.global(&abi::protobj(cx.name(sym::MAIN_CLASS)));
    asm.global(&abi::protobj(cx.name(sym::INT)));
    asm.global(&abi::protobj(cx.name(sym::STRING)));
    asm.global(&abi::bool_const(false));
    asm.global(&abi::bool_const(true));
    asm.global(abi::INT_TAG);
    asm.global(abi::BOOL_TAG);
    asm.global(abi::STRING_TAG);

    asm.def(abi::INT_TAG);
    asm.word(cx.tag_of(sym::INT));
    asm.def(abi::BOOL_TAG);
    asm.word(cx.tag_of(sym::BOOL));
    asm.def(abi::STRING_TAG);
    asm.word(cx.tag_of(sym::STRING));
}

fn select_gc(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    let gc = cx.options.gc;
    asm.global(abi::MEMMGR_INITIALIZER);
    asm.def(abi::MEMMGR_INITIALIZER);
    asm.word(gc.init_label());
    asm.global(abi::MEMMGR_COLLECTOR);
    asm.def(abi::MEMMGR_COLLECTOR);
    asm.word(gc.collect_label());
    asm.global(abi::MEMMGR_TEST);
    asm.def(abi::MEMMGR_TEST);
    asm.word(u8::from(cx.options.gc_test));
}

/// String, Int and Bool constants, each behind a `-1` eye catcher. Tables
/// are emitted newest entry first.
fn constants(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    let string_tag = cx.tag_of(sym::STRING);
    let int_tag = cx.tag_of(sym::INT);
    let bool_tag = cx.tag_of(sym::BOOL);
    let string_disp = abi::disptab(cx.name(sym::STRING));
    let int_disp = abi::disptab(cx.name(sym::INT));
    let bool_disp = abi::disptab(cx.name(sym::BOOL));

    let strings: Vec<_> = cx.interner.strings.iter().collect();
    for (id, value) in strings.into_iter().rev() {
        let Some(length) = cx.interner.ints.lookup(&(value.len() as i32)) else {
            panic!("length of string constant {value:?} was not interned");
        };
        let words = abi::DEFAULT_OBJFIELDS + abi::STRING_SLOTS + (value.len() as i32 + 4) / 4;
        asm.word(-1);
        asm.def(&abi::str_const(id.id()));
        asm.word(string_tag);
        asm.word(words);
        asm.word(&string_disp);
        asm.word(abi::int_const(length.id()));
        asm.string_constant(value);
        asm.align();
    }

    let ints: Vec<_> = cx.interner.ints.iter().collect();
    for (id, value) in ints.into_iter().rev() {
        asm.word(-1);
        asm.def(&abi::int_const(id.id()));
        asm.word(int_tag);
        asm.word(abi::DEFAULT_OBJFIELDS + abi::INT_SLOTS);
        asm.word(&int_disp);
        asm.word(value);
    }

    for value in [false, true] {
        asm.word(-1);
        asm.def(&abi::bool_const(value));
        asm.word(bool_tag);
        asm.word(abi::DEFAULT_OBJFIELDS + abi::BOOL_SLOTS);
        asm.word(&bool_disp);
        asm.word(u8::from(value));
    }
}

fn class_name_table(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    asm.def(abi::CLASS_NAME_TAB);
    for (_, layout) in cx.layouts.in_tag_order() {
        asm.word(cx.str_label(cx.name(layout.name)));
    }
}

fn class_obj_table(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    asm.def(abi::CLASS_OBJ_TAB);
    for (_, layout) in cx.layouts.in_tag_order() {
        let name = cx.name(layout.name);
        asm.word(abi::protobj(name));
        asm.word(abi::init(name));
    }
}

fn dispatch_tables(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    for (_, layout) in cx.layouts.in_tag_order() {
        asm.def(&abi::disptab(cx.name(layout.name)));
        for slot in &layout.methods {
            asm.word(abi::method(cx.name(slot.owner), cx.name(slot.name)));
        }
    }
}

/// Prototypes hold the default value of every attribute: the empty string,
/// zero, false, or void.
fn prototypes(asm: &mut Asm, cx: &CgenContext<'_, '_>) {
    for (_, layout) in cx.layouts.in_tag_order() {
        let name = cx.name(layout.name);
        asm.word(-1);
        asm.def(&abi::protobj(name));
        asm.word(layout.tag);
        asm.word(layout.size_words());
        asm.word(abi::disptab(name));
        for attr in &layout.attrs {
            if attr.ty == sym::STRING {
                asm.word(abi::str_const(EMPTY_STR.id()));
            } else if attr.ty == sym::INT {
                asm.word(abi::int_const(INT_ZERO.id()));
            } else if attr.ty == sym::BOOL {
                asm.word(abi::bool_const(false));
            } else {
                asm.word(0);
            }
        }
    }
}
