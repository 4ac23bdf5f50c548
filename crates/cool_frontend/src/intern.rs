// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Interning tables for identifiers, string literals and integer literals.
//!
//! Every distinct value gets one stable handle whose `id()` reflects first-seen
//! order. Handles are never invalidated, so they can be compared by value and
//! used as hash keys anywhere downstream.

use std::borrow::Borrow;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// A copyable index into a [`SymbolTable`].
pub trait Handle: Copy + Eq + Hash {
    fn from_id(id: u32) -> Self;
    fn id(self) -> u32;
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl Handle for $name {
            fn from_id(id: u32) -> Self {
                $name(id)
            }

            fn id(self) -> u32 {
                self.0
            }
        }

        impl $name {
            pub fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Interned identifier (class, method, attribute or variable name).
    Symbol
);
handle!(
    /// Interned string literal.
    StrId
);
handle!(
    /// Interned integer literal.
    IntId
);

/// Deduplicating table mapping values to sequential handles.
#[derive(Debug, Clone)]
pub struct SymbolTable<K, H> {
    map: FxHashMap<K, H>,
    values: Vec<K>,
}

impl<K, H> Default for SymbolTable<K, H> {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            values: Vec::new(),
        }
    }
}

impl<K, H> SymbolTable<K, H>
where
    K: Hash + Eq + Clone,
    H: Handle,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `value`, creating one with the next id if unseen.
    pub fn emplace<Q>(&mut self, value: &Q) -> H
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&h) = self.map.get(value) {
            return h;
        }
        let h = H::from_id(self.values.len() as u32);
        let owned = value.to_owned();
        self.values.push(owned.clone());
        self.map.insert(owned, h);
        h
    }

    pub fn lookup<Q>(&self, value: &Q) -> Option<H>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(value).copied()
    }

    pub fn get(&self, h: H) -> &K {
        &self.values[h.id() as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &K)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (H::from_id(i as u32), v))
    }
}

/// Names the compiler itself refers to. Seeded into every [`Interner`] in this
/// order, so the constants in [`sym`] are valid for any interner.
const WELL_KNOWN: [&str; 27] = [
    "Object",
    "IO",
    "Int",
    "Bool",
    "String",
    "Main",
    "main",
    "SELF_TYPE",
    "self",
    "_no_class",
    "_no_type",
    "_prim_slot",
    "_bottom",
    "_val",
    "_str_field",
    "abort",
    "type_name",
    "copy",
    "out_string",
    "out_int",
    "in_string",
    "in_int",
    "length",
    "concat",
    "substr",
    "arg",
    "arg2",
];

pub mod sym {
    use super::Symbol;

    pub const OBJECT: Symbol = Symbol(0);
    pub const IO: Symbol = Symbol(1);
    pub const INT: Symbol = Symbol(2);
    pub const BOOL: Symbol = Symbol(3);
    pub const STRING: Symbol = Symbol(4);
    pub const MAIN_CLASS: Symbol = Symbol(5);
    pub const MAIN_METHOD: Symbol = Symbol(6);
    pub const SELF_TYPE: Symbol = Symbol(7);
    pub const SELF: Symbol = Symbol(8);
    pub const NO_CLASS: Symbol = Symbol(9);
    pub const NO_TYPE: Symbol = Symbol(10);
    pub const PRIM_SLOT: Symbol = Symbol(11);
    /// Least element of the type lattice; identity for LUB.
    pub const BOTTOM: Symbol = Symbol(12);
    pub const VAL: Symbol = Symbol(13);
    pub const STR_FIELD: Symbol = Symbol(14);
    pub const ABORT: Symbol = Symbol(15);
    pub const TYPE_NAME: Symbol = Symbol(16);
    pub const COPY: Symbol = Symbol(17);
    pub const OUT_STRING: Symbol = Symbol(18);
    pub const OUT_INT: Symbol = Symbol(19);
    pub const IN_STRING: Symbol = Symbol(20);
    pub const IN_INT: Symbol = Symbol(21);
    pub const LENGTH: Symbol = Symbol(22);
    pub const CONCAT: Symbol = Symbol(23);
    pub const SUBSTR: Symbol = Symbol(24);
    pub const ARG: Symbol = Symbol(25);
    pub const ARG2: Symbol = Symbol(26);
}

pub const EMPTY_STR: StrId = StrId(0);
/// File name recorded on built-in classes.
pub const BASIC_CLASS_FILE: StrId = StrId(1);
pub const INT_ZERO: IntId = IntId(0);

/// The three interning tables of one compilation.
#[derive(Debug, Clone)]
pub struct Interner {
    pub idents: SymbolTable<String, Symbol>,
    pub strings: SymbolTable<String, StrId>,
    pub ints: SymbolTable<i32, IntId>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Self {
            idents: SymbolTable::new(),
            strings: SymbolTable::new(),
            ints: SymbolTable::new(),
        };
        for name in WELL_KNOWN {
            interner.idents.emplace(name);
        }
        interner.strings.emplace("");
        interner.strings.emplace("<basic class>");
        interner.ints.emplace(&0);
        interner
    }

    pub fn ident(&mut self, name: &str) -> Symbol {
        self.idents.emplace(name)
    }

    pub fn name(&self, sym: Symbol) -> &str {
        self.idents.get(sym)
    }

    pub fn string(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    pub fn int(&self, id: IntId) -> i32 {
        *self.ints.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emplace_returns_same_handle_for_equal_values() {
        let mut table: SymbolTable<String, Symbol> = SymbolTable::new();
        let a = table.emplace("hello");
        let b = table.emplace("world");
        let c = table.emplace("hello");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn ids_follow_first_seen_order_from_zero() {
        let mut table: SymbolTable<i32, IntId> = SymbolTable::new();
        let ids: Vec<u32> = [7, 3, 7, 9, 3, 11]
            .iter()
            .map(|v| table.emplace(v).id())
            .collect();
        assert_eq!(ids, vec![0, 1, 0, 2, 1, 3]);
    }

    #[test]
    fn lookup_does_not_insert() {
        let mut table: SymbolTable<String, StrId> = SymbolTable::new();
        assert_eq!(table.lookup("x"), None);
        assert!(table.is_empty());
        let x = table.emplace("x");
        assert_eq!(table.lookup("x"), Some(x));
        assert_eq!(table.get(x), "x");
    }

    #[test]
    fn well_known_symbols_are_seeded() {
        let interner = Interner::new();
        assert_eq!(interner.idents.lookup("Object"), Some(sym::OBJECT));
        assert_eq!(interner.idents.lookup("SELF_TYPE"), Some(sym::SELF_TYPE));
        assert_eq!(interner.idents.lookup("arg2"), Some(sym::ARG2));
        assert_eq!(interner.name(sym::PRIM_SLOT), "_prim_slot");
        assert_eq!(interner.string(BASIC_CLASS_FILE), "<basic class>");
        assert_eq!(interner.string(EMPTY_STR), "");
        assert_eq!(interner.int(INT_ZERO), 0);
    }
}
