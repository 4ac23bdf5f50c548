// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

//! Storage layout. Each class starts from a copy of its parent's attribute
//! and dispatch-slot lists, appends its own attributes, and either reuses the
//! inherited slot of a method it overrides or appends a new one.
//!
//! Tags follow the pre-order walk of the class tree, so a class and its
//! descendants always occupy the contiguous range `tag..=last_tag`.

use cool_frontend::{ClassId, ClassTable, Feature, Symbol};
use rustc_hash::FxHashMap;

use crate::abi;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrSlot {
    pub name: Symbol,
    pub owner: Symbol,
    pub ty: Symbol,
    /// Word offset from the start of the object.
    pub offset: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSlot {
    pub name: Symbol,
    /// Class whose definition occupies this slot.
    pub owner: Symbol,
    pub arity: usize,
}

#[derive(Clone, Debug)]
pub struct ClassLayout {
    pub name: Symbol,
    pub tag: u32,
    /// Largest tag in this class's subtree.
    pub last_tag: u32,
    pub depth: usize,
    pub attrs: Vec<AttrSlot>,
    pub methods: Vec<MethodSlot>,
    attr_index: FxHashMap<Symbol, usize>,
    method_index: FxHashMap<Symbol, usize>,
}

impl ClassLayout {
    fn root(name: Symbol) -> Self {
        Self {
            name,
            tag: 0,
            last_tag: 0,
            depth: 0,
            attrs: Vec::new(),
            methods: Vec::new(),
            attr_index: FxHashMap::default(),
            method_index: FxHashMap::default(),
        }
    }

    pub fn attr(&self, name: Symbol) -> Option<&AttrSlot> {
        self.attr_index.get(&name).map(|&i| &self.attrs[i])
    }

    /// Dispatch-table index of `name`.
    pub fn method_slot(&self, name: Symbol) -> Option<usize> {
        self.method_index.get(&name).copied()
    }

    pub fn method(&self, name: Symbol) -> Option<&MethodSlot> {
        self.method_slot(name).map(|i| &self.methods[i])
    }

    /// Object size in words, header included.
    pub fn size_words(&self) -> i32 {
        abi::DEFAULT_OBJFIELDS + self.attrs.len() as i32
    }

    fn add_attr(&mut self, name: Symbol, ty: Symbol) {
        let offset = self.size_words();
        self.attr_index.insert(name, self.attrs.len());
        self.attrs.push(AttrSlot {
            name,
            owner: self.name,
            ty,
            offset,
        });
    }

    fn add_method(&mut self, name: Symbol, arity: usize) {
        let slot = MethodSlot {
            name,
            owner: self.name,
            arity,
        };
        match self.method_index.get(&name) {
            Some(&i) => self.methods[i] = slot,
            None => {
                self.method_index.insert(name, self.methods.len());
                self.methods.push(slot);
            }
        }
    }
}

/// Layouts of every class in the inheritance tree, in tag order.
#[derive(Debug)]
pub struct Layouts {
    by_id: FxHashMap<ClassId, ClassLayout>,
    order: Vec<ClassId>,
}

impl Layouts {
    pub fn bind(classes: &ClassTable<'_>) -> Self {
        let order = classes.preorder();
        let mut by_id = FxHashMap::<ClassId, ClassLayout>::default();

        for (tag, &id) in order.iter().enumerate() {
            let node = classes.node(id);
            let mut layout = match node.parent.and_then(|p| by_id.get(&p)) {
                Some(parent) => {
                    let mut l = parent.clone();
                    l.name = node.name;
                    l.depth = parent.depth + 1;
                    l
                }
                None => ClassLayout::root(node.name),
            };
            layout.tag = tag as u32;

            for feature in &classes.klass(id).features {
                match feature {
                    Feature::Attr(a) => layout.add_attr(a.name, a.ty),
                    Feature::Method(m) => layout.add_method(m.name, m.formals.len()),
                }
            }
            tracing::trace!(tag, attrs = layout.attrs.len(), slots = layout.methods.len(), "bound class");
            by_id.insert(id, layout);
        }

        // subtree ranges, children before parents
        for &id in order.iter().rev() {
            let last = classes
                .node(id)
                .children
                .iter()
                .filter_map(|c| by_id.get(c).map(|l| l.last_tag))
                .max();
            if let Some(layout) = by_id.get_mut(&id) {
                layout.last_tag = last.unwrap_or(layout.tag).max(layout.tag);
            }
        }

        Self { by_id, order }
    }

    pub fn get(&self, id: ClassId) -> &ClassLayout {
        match self.by_id.get(&id) {
            Some(l) => l,
            None => panic!("class {id:?} is not part of the inheritance tree"),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn in_tag_order(&self) -> impl Iterator<Item = (ClassId, &ClassLayout)> + '_ {
        self.order.iter().map(move |&id| (id, self.get(id)))
    }
}
