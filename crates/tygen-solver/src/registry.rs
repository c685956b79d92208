//! The per-compilation declaration table.
//!
//! The front-end registers one IR value per declared type name; passes thread
//! a reference to this table explicitly rather than relying on any ambient
//! state. Iteration order is insertion order, which keeps resolution and
//! instantiation deterministic across runs.

use crate::types::{BuiltinKind, IntrinsicKind, TypeIr};
use indexmap::IndexMap;

/// Mapping from declared type name to its declaration IR.
///
/// Declaration entries are `Alias`, `Interface`, or `Builtin` nodes; anything
/// else the front-end registers is carried as-is and rejected by
/// instantiation when referenced.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeIr>,
}

impl TypeRegistry {
    /// An empty registry with no pre-registered names.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every intrinsic and builtin container pre-registered.
    ///
    /// Intrinsics are zero-parameter aliases so resolution inlines a plain
    /// `Ref("string")` into `Intrinsic(String)`. Containers are `Builtin`
    /// declarations whose element slots are `Param` placeholders filled in
    /// during instantiation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in IntrinsicKind::ALL {
            registry.register(kind.as_str(), TypeIr::alias(0, TypeIr::Intrinsic(kind)));
        }
        for kind in [BuiltinKind::Array, BuiltinKind::Set, BuiltinKind::Map] {
            let elements = (0..kind.arity() as u32).map(TypeIr::Param).collect();
            registry.register(kind.name(), TypeIr::Builtin { kind, elements });
        }
        registry
    }

    /// Register (or replace) a declaration.
    pub fn register(&mut self, name: impl Into<String>, declaration: TypeIr) {
        self.types.insert(name.into(), declaration);
    }

    pub fn get(&self, name: &str) -> Option<&TypeIr> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Declared names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Replace the declaration body for `name`. Used by resolution, which
    /// rewrites the table in place.
    pub(crate) fn replace(&mut self, name: &str, declaration: TypeIr) {
        debug_assert!(self.types.contains_key(name), "replace of unknown name");
        self.types.insert(name.to_string(), declaration);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeIr)> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
