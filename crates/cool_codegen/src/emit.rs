// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Text emission for SPIM assembly. One helper per opcode, plus the data
//! directives used by the constant and table emitters.

use std::fmt::{Display, Write};

use crate::abi::{self, Register};

/// A branch target allocated from [`Asm::new_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u32);

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label{}", self.0)
    }
}

/// Assembly listing under construction.
#[derive(Debug, Default)]
pub struct Asm {
    out: String,
    next_label: u32,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn new_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    fn instr(&mut self, args: std::fmt::Arguments<'_>) {
        self.out.push('\t');
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    // directives

    pub fn data(&mut self) {
        self.out.push_str("\t.data\n");
    }

    pub fn text(&mut self) {
        self.out.push_str("\t.text\n");
    }

    pub fn align(&mut self) {
        self.out.push_str("\t.align\t2\n");
    }

    pub fn global(&mut self, name: &str) {
        let _ = writeln!(self.out, "\t.globl\t{name}");
    }

    pub fn word(&mut self, value: impl Display) {
        let _ = writeln!(self.out, "\t.word\t{value}");
    }

    pub fn def(&mut self, name: &str) {
        let _ = writeln!(self.out, "{name}:");
    }

    pub fn def_label(&mut self, l: Label) {
        let _ = writeln!(self.out, "{l}:");
    }

    /// Bytes of a string constant followed by the terminating zero.
    pub fn string_constant(&mut self, s: &str) {
        let mut in_ascii = false;
        for b in s.bytes() {
            let escaped = match b {
                b'\n' => Some("\\n"),
                b'\t' => Some("\\t"),
                b'"' => Some("\\\""),
                _ => None,
            };
            if escaped.is_some() || ((b' '..0x7f).contains(&b) && b != b'\\') {
                if !in_ascii {
                    self.out.push_str("\t.ascii\t\"");
                    in_ascii = true;
                }
                match escaped {
                    Some(e) => self.out.push_str(e),
                    None => self.out.push(char::from(b)),
                }
            } else {
                if in_ascii {
                    self.out.push_str("\"\n");
                    in_ascii = false;
                }
                let _ = writeln!(self.out, "\t.byte\t{b}");
            }
        }
        if in_ascii {
            self.out.push_str("\"\n");
        }
        self.out.push_str("\t.byte\t0\t\n");
    }

    // instructions

    /// `dest <- offset words from base`.
    pub fn lw(&mut self, dest: Register, offset: i32, base: Register) {
        self.instr(format_args!("lw {dest} {}({base})", offset * abi::WORD_SIZE));
    }

    pub fn sw(&mut self, src: Register, offset: i32, base: Register) {
        self.instr(format_args!("sw {src} {}({base})", offset * abi::WORD_SIZE));
    }

    pub fn li(&mut self, dest: Register, value: i64) {
        self.instr(format_args!("li {dest} {value}"));
    }

    pub fn la(&mut self, dest: Register, address: &str) {
        self.instr(format_args!("la {dest} {address}"));
    }

    pub fn mv(&mut self, dest: Register, src: Register) {
        if dest == src {
            tracing::trace!(dest, "omitting self move");
            return;
        }
        self.instr(format_args!("move {dest} {src}"));
    }

    pub fn neg(&mut self, dest: Register, src: Register) {
        self.instr(format_args!("neg {dest} {src}"));
    }

    pub fn binop(&mut self, op: &str, dest: Register, a: Register, b: Register) {
        self.instr(format_args!("{op} {dest} {a} {b}"));
    }

    pub fn addiu(&mut self, dest: Register, src: Register, imm: i32) {
        self.instr(format_args!("addiu {dest} {src} {imm}"));
    }

    pub fn sll(&mut self, dest: Register, src: Register, bits: u32) {
        self.instr(format_args!("sll {dest} {src} {bits}"));
    }

    pub fn jal(&mut self, target: &str) {
        self.instr(format_args!("jal {target}"));
    }

    pub fn jalr(&mut self, reg: Register) {
        self.instr(format_args!("jalr {reg}"));
    }

    pub fn ret(&mut self) {
        self.instr(format_args!("jr {}", abi::RA));
    }

    pub fn b(&mut self, l: Label) {
        self.instr(format_args!("b {l}"));
    }

    pub fn beqz(&mut self, src: Register, l: Label) {
        self.instr(format_args!("beqz {src} {l}"));
    }

    pub fn beq(&mut self, a: Register, b: Register, l: Label) {
        self.instr(format_args!("beq {a} {b} {l}"));
    }

    pub fn bne(&mut self, a: Register, b: Register, l: Label) {
        self.instr(format_args!("bne {a} {b} {l}"));
    }

    pub fn blt(&mut self, a: Register, b: Register, l: Label) {
        self.instr(format_args!("blt {a} {b} {l}"));
    }

    pub fn ble(&mut self, a: Register, b: Register, l: Label) {
        self.instr(format_args!("ble {a} {b} {l}"));
    }

    pub fn blti(&mut self, a: Register, imm: u32, l: Label) {
        self.instr(format_args!("blt {a} {imm} {l}"));
    }

    pub fn bgti(&mut self, a: Register, imm: u32, l: Label) {
        self.instr(format_args!("bgt {a} {imm} {l}"));
    }

    // composite sequences

    /// Push a register. The stack grows down and `$sp` points at the next
    /// free word.
    pub fn push(&mut self, reg: Register) {
        self.sw(reg, 0, abi::SP);
        self.addiu(abi::SP, abi::SP, -abi::WORD_SIZE);
    }

    /// Pop the top of the stack into `reg`.
    pub fn pop(&mut self, reg: Register) {
        self.lw(reg, 1, abi::SP);
        self.addiu(abi::SP, abi::SP, abi::WORD_SIZE);
    }

    /// Load the value word of a boxed Int or Bool.
    pub fn fetch_int(&mut self, dest: Register, src: Register) {
        self.lw(dest, abi::DEFAULT_OBJFIELDS, src);
    }

    pub fn store_int(&mut self, src: Register, dest: Register) {
        self.sw(src, abi::DEFAULT_OBJFIELDS, dest);
    }
}
