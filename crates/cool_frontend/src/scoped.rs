// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::hash::Hash;

use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("name already bound in the current scope")]
pub struct DuplicateKey;

/// A stack of scopes. Lookups search innermost first.
///
/// Cloning snapshots the whole stack, which is how a class starts from a copy of
/// its parent's tables.
#[derive(Debug, Clone)]
pub struct ScopedTable<K, V> {
    scopes: Vec<FxHashMap<K, V>>,
}

impl<K, V> Default for ScopedTable<K, V> {
    fn default() -> Self {
        Self { scopes: Vec::new() }
    }
}

impl<K: Hash + Eq, V> ScopedTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn exit_scope(&mut self) {
        let popped = self.scopes.pop();
        debug_assert!(popped.is_some(), "exit_scope without a matching enter_scope");
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `key` in the innermost scope, opening one first if none exists.
    pub fn add_to_scope(&mut self, key: K, value: V) -> Result<(), DuplicateKey> {
        if self.scopes.is_empty() {
            self.enter_scope();
        }
        let Some(scope) = self.scopes.last_mut() else {
            return Err(DuplicateKey);
        };
        if scope.contains_key(&key) {
            return Err(DuplicateKey);
        }
        scope.insert(key, value);
        Ok(())
    }

    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.scopes.iter().rev().find_map(|s| s.get(key))
    }

    /// Look only in the innermost scope.
    pub fn probe(&self, key: &K) -> Option<&V> {
        self.scopes.last().and_then(|s| s.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut t = ScopedTable::new();
        t.enter_scope();
        t.add_to_scope("x", 1).unwrap();
        t.enter_scope();
        t.add_to_scope("x", 2).unwrap();
        assert_eq!(t.lookup(&"x"), Some(&2));
        t.exit_scope();
        assert_eq!(t.lookup(&"x"), Some(&1));
    }

    #[test]
    fn probe_sees_only_current_scope() {
        let mut t = ScopedTable::new();
        t.enter_scope();
        t.add_to_scope("x", 1).unwrap();
        t.enter_scope();
        assert_eq!(t.probe(&"x"), None);
        assert_eq!(t.lookup(&"x"), Some(&1));
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut t = ScopedTable::new();
        t.enter_scope();
        t.add_to_scope("x", 1).unwrap();
        assert_eq!(t.add_to_scope("x", 3), Err(DuplicateKey));
        assert_eq!(t.lookup(&"x"), Some(&1));
    }

    #[test]
    fn clone_is_an_independent_snapshot() {
        let mut parent = ScopedTable::new();
        parent.enter_scope();
        parent.add_to_scope("a", 1).unwrap();

        let mut child = parent.clone();
        child.enter_scope();
        child.add_to_scope("b", 2).unwrap();

        assert_eq!(parent.lookup(&"b"), None);
        assert_eq!(child.lookup(&"a"), Some(&1));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn missing_key_is_none() {
        let t: ScopedTable<&str, i32> = ScopedTable::new();
        assert_eq!(t.lookup(&"nothing"), None);
        assert_eq!(t.probe(&"nothing"), None);
    }
}
