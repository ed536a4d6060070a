//! Config property schemas and per-instance slots.
//!
//! A schema is the ordered list of declared properties for one type:
//! first-declared-first-applied at initialization. Redeclaring a property in
//! a subclass deep-merges object-valued defaults unless the redeclaration is
//! flagged as replacing.

use crate::core::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDecl {
    pub name: String,
    pub default: Value,
    /// Replace the inherited default outright instead of deep-merging.
    pub replace: bool,
}

impl ConfigDecl {
    pub fn new(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            default,
            replace: false,
        }
    }

    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    props: Vec<ConfigDecl>,
    index: HashMap<String, usize>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a subclass schema: the parent's declarations keep their position
    /// (so initialization order is stable down the hierarchy); redeclared
    /// properties merge or replace in place; new properties append.
    pub fn merged(parent: &ConfigSchema, decls: &[ConfigDecl]) -> ConfigSchema {
        let mut schema = parent.clone();
        for decl in decls {
            match schema.index.get(&decl.name).copied() {
                Some(idx) => {
                    let existing = &schema.props[idx];
                    let default = if decl.replace {
                        decl.default.clone()
                    } else {
                        existing.default.merged_with(&decl.default)
                    };
                    schema.props[idx] = ConfigDecl {
                        name: decl.name.clone(),
                        default,
                        replace: decl.replace,
                    };
                }
                None => schema.push(decl.clone()),
            }
        }
        schema
    }

    fn push(&mut self, decl: ConfigDecl) {
        self.index.insert(decl.name.clone(), self.props.len());
        self.props.push(decl);
    }

    pub fn get(&self, name: &str) -> Option<&ConfigDecl> {
        self.index.get(name).map(|&idx| &self.props[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared properties in initialization order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigDecl> {
        self.props.iter()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// Per-instance storage for one config property. The initialized flag is the
/// variant itself: a plain branch, re-checked only until the first write.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSlot {
    Uninitialized,
    Initialized(Value),
}

impl ConfigSlot {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ConfigSlot::Initialized(v) => Some(v),
            ConfigSlot::Uninitialized => None,
        }
    }
}
