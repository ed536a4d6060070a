//! Canonical-name directory: aliases, alternate names, and name expressions.
//!
//! Canonical type names are dotted paths (`Ui.button.Split`). Aliases are
//! short instantiation keys (`button.split`, many per canonical); alternate
//! names are backward-compatible synonyms that resolve one-to-one back to a
//! canonical name. Both directions are kept so collisions can be unlinked.

use dashmap::DashMap;
use glob::Pattern;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Small inline list for expanded name sets.
pub type NameList = SmallVec<[String; 8]>;

#[derive(Default)]
pub struct NameRegistry {
    alias_to_name: DashMap<String, String>,
    name_to_aliases: DashMap<String, Vec<String>>,
    alternate_to_name: DashMap<String, String>,
    name_to_alternates: DashMap<String, Vec<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical names are non-empty dotted paths of identifier segments.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
            })
    }

    /// Leading segment of a dotted name.
    pub fn root_namespace(name: &str) -> &str {
        name.split('.').next().unwrap_or(name)
    }

    /// Register `alias -> name`. Re-registering an alias to a different
    /// canonical name silently overwrites: last writer wins.
    pub fn set_alias(&self, alias: &str, name: &str) {
        if let Some(previous) = self.alias_to_name.insert(alias.to_string(), name.to_string()) {
            if previous != name {
                if let Some(mut list) = self.name_to_aliases.get_mut(&previous) {
                    list.retain(|a| a != alias);
                }
            }
        }
        let mut list = self.name_to_aliases.entry(name.to_string()).or_default();
        if !list.iter().any(|a| a == alias) {
            list.push(alias.to_string());
        }
    }

    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.alias_to_name.get(alias).map(|n| n.clone())
    }

    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        self.name_to_aliases
            .get(name)
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Register a backward-compatible synonym. One-to-one alternate -> name,
    /// many alternates per canonical; last writer wins on collision.
    pub fn set_alternate(&self, alternate: &str, name: &str) {
        if let Some(previous) = self
            .alternate_to_name
            .insert(alternate.to_string(), name.to_string())
        {
            if previous != name {
                if let Some(mut list) = self.name_to_alternates.get_mut(&previous) {
                    list.retain(|a| a != alternate);
                }
            }
        }
        let mut list = self.name_to_alternates.entry(name.to_string()).or_default();
        if !list.iter().any(|a| a == alternate) {
            list.push(alternate.to_string());
        }
    }

    pub fn alternate_target(&self, alternate: &str) -> Option<String> {
        self.alternate_to_name.get(alternate).map(|n| n.clone())
    }

    pub fn alternates_of(&self, name: &str) -> Vec<String> {
        self.name_to_alternates
            .get(name)
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    pub fn alternate_names(&self) -> Vec<String> {
        self.alternate_to_name
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }

    /// Map any registered synonym to its canonical name. Alternates are
    /// checked before aliases; an unknown name resolves to itself.
    pub fn resolve(&self, name: &str) -> String {
        if let Some(canonical) = self.alternate_target(name) {
            return canonical;
        }
        if let Some(canonical) = self.alias_target(name) {
            return canonical;
        }
        name.to_string()
    }

    /// Expand name expressions over a known-name universe. Plain names pass
    /// through untouched; expressions containing `*` or `?` match against
    /// `known`. Results are deduplicated, preserving discovery order.
    pub fn expand<'a, I>(&self, exprs: &[String], known: I) -> NameList
    where
        I: IntoIterator<Item = &'a String>,
    {
        let known: Vec<&String> = known.into_iter().collect();
        let mut seen = HashSet::new();
        let mut out = NameList::new();
        for expr in exprs {
            if expr.contains('*') || expr.contains('?') {
                if let Ok(pattern) = Pattern::new(expr) {
                    for name in &known {
                        if pattern.matches(name) && seen.insert((*name).clone()) {
                            out.push((*name).clone());
                        }
                    }
                }
            } else if seen.insert(expr.clone()) {
                out.push(expr.clone());
            }
        }
        out
    }
}
