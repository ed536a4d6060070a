//! Global directory of constructed types and their creation listeners.
//!
//! The manager is pure bookkeeping: type table plus parked listeners. The
//! kernel drives the post-construction pipeline (aliases, alternates,
//! singletons) and fires listeners, because listeners re-enter the kernel.

use crate::class::template::TypeRef;
use crate::kernel::Kernel;
use std::collections::{HashMap, VecDeque};

/// One-shot listener for a specific type name.
pub type CreatedCallback = Box<dyn FnOnce(&mut Kernel, &TypeRef)>;

/// Listener fired on every future registration.
pub type CreatedWatcher = Box<dyn FnMut(&mut Kernel, &TypeRef)>;

#[derive(Default)]
pub struct ClassManager {
    types: HashMap<String, TypeRef>,
    pub(crate) exact_listeners: HashMap<String, Vec<CreatedCallback>>,
    pub(crate) watchers: Vec<CreatedWatcher>,
    /// Types registered from inside a watcher, waiting for the watcher pass
    /// to reach them.
    pub(crate) watcher_backlog: VecDeque<TypeRef>,
    pub(crate) firing_watchers: bool,
}

impl ClassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_created(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn insert(&mut self, name: String, ty: TypeRef) {
        self.types.insert(name, ty);
    }

    pub(crate) fn park_exact(&mut self, name: &str, cb: CreatedCallback) {
        self.exact_listeners
            .entry(name.to_string())
            .or_default()
            .push(cb);
    }

    pub(crate) fn take_exact(&mut self, name: &str) -> Vec<CreatedCallback> {
        self.exact_listeners.remove(name).unwrap_or_default()
    }
}
