//! The kernel: single-threaded owner of the name registry, class manager,
//! loader state, and suspended definitions.
//!
//! Every operation runs to completion on the caller's thread. Deferred work
//! (queued requires, parked definitions, ready listeners) is stored as
//! continuations and resumed by the kernel itself when the event it waits on
//! arrives, so there is exactly one `&mut Kernel` in play at any moment.

use crate::class::builder::PendingDefinition;
use crate::class::template::{BehaviorTemplate, Type, TypeRef};
use crate::class::{ConfigSchema, Instance};
use crate::config::KernelConfig;
use crate::core::names::{NameList, NameRegistry};
use crate::core::value::{Value, ValueMap};
use crate::errors::{CoreError, ErrorKind};
use crate::loader::{
    FetchFailure, LoaderState, LoaderStats, PathResolver, UnitSource,
};
use crate::manager::ClassManager;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Name of the implicit root class every definition ultimately extends.
pub const ROOT_CLASS: &str = "Base";

pub struct Kernel {
    pub(crate) registry: NameRegistry,
    pub(crate) manager: ClassManager,
    pub(crate) loader: LoaderState,
    /// Definitions suspended on dependencies, keyed by ticket.
    pub(crate) pending: HashMap<u64, PendingDefinition>,
    pub(crate) next_pending: u64,
    singletons: HashMap<String, Rc<RefCell<Instance>>>,
    root: TypeRef,
}

impl Kernel {
    pub fn new() -> Self {
        let root: TypeRef = Rc::new(Type {
            name: ROOT_CLASS.to_string(),
            superclass: None,
            template: BehaviorTemplate::new(ROOT_CLASS),
            statics: RefCell::new(ValueMap::new()),
            inheritable_statics: ValueMap::new(),
            config: ConfigSchema::new(),
            mixins: Vec::new(),
            singleton: false,
            mixin_hook: None,
            data: ValueMap::new(),
        });
        let mut manager = ClassManager::new();
        manager.insert(ROOT_CLASS.to_string(), root.clone());
        Self {
            registry: NameRegistry::new(),
            manager,
            loader: LoaderState::new(),
            pending: HashMap::new(),
            next_pending: 0,
            singletons: HashMap::new(),
            root,
        }
    }

    pub fn with_config(config: &KernelConfig) -> Self {
        let mut kernel = Self::new();
        kernel.apply_config(config);
        kernel
    }

    pub fn apply_config(&mut self, config: &KernelConfig) {
        self.loader.enabled = config.loader.enabled;
        let mut resolver = PathResolver::new()
            .with_extension(&config.loader.extension)
            .with_cache_busting(config.loader.disable_caching, &config.loader.cache_param);
        for (prefix, base) in &config.loader.paths {
            resolver.set_path(prefix, base);
        }
        self.loader.resolver = resolver;
    }

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    pub fn root_type(&self) -> TypeRef {
        self.root.clone()
    }

    /// Look up a constructed type by canonical name, alternate, or alias.
    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.manager.get(&self.registry.resolve(name))
    }

    pub fn is_created(&self, name: &str) -> bool {
        self.manager.is_created(&self.registry.resolve(name))
    }

    pub fn class_names(&self) -> Vec<String> {
        self.manager.names()
    }

    pub fn resolve_name(&self, name: &str) -> String {
        self.registry.resolve(name)
    }

    /// Expand name expressions against every name the kernel knows:
    /// constructed classes plus registered alternates.
    pub fn expand_names(&self, exprs: &[String]) -> NameList {
        let mut known = self.manager.names();
        known.extend(self.registry.alternate_names());
        self.registry.expand(exprs, &known)
    }

    // ---- loader configuration ----

    pub fn set_source<S: UnitSource + 'static>(&mut self, source: S) {
        self.loader.source = Box::new(source);
    }

    pub fn set_path(&mut self, prefix: &str, base: &str) {
        self.loader.resolver.set_path(prefix, base);
    }

    pub fn set_loader_enabled(&mut self, enabled: bool) {
        self.loader.enabled = enabled;
    }

    pub fn loader_enabled(&self) -> bool {
        self.loader.enabled
    }

    pub fn set_failure_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&FetchFailure) + 'static,
    {
        self.loader.failure_handler = Some(Box::new(handler));
    }

    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    // ---- registration ----

    pub(crate) fn register_type(&mut self, ty: TypeRef, alternates: &[String]) {
        let name = ty.name().to_string();
        for alternate in alternates {
            self.registry.set_alternate(alternate, &name);
        }
        self.manager.insert(name, ty);
    }

    /// Fire everything waiting on a freshly constructed type: parked exact
    /// listeners (under the canonical name and every alternate), watchers,
    /// queued requires, and finally the ready gate.
    pub(crate) fn announce_created(&mut self, ty: &TypeRef, alternates: &[String]) {
        let mut listeners = self.manager.take_exact(ty.name());
        for alternate in alternates {
            listeners.extend(self.manager.take_exact(alternate));
        }
        for callback in listeners {
            callback(self, ty);
        }

        // watchers fire on every registration, including types a watcher
        // itself defines: those land in the backlog while the list is
        // checked out and get their own pass once it is back
        if self.manager.firing_watchers {
            self.manager.watcher_backlog.push_back(ty.clone());
        } else {
            self.manager.firing_watchers = true;
            let mut current = ty.clone();
            loop {
                let mut watchers = std::mem::take(&mut self.manager.watchers);
                for watcher in watchers.iter_mut() {
                    watcher(self, &current);
                }
                let mut added = std::mem::replace(&mut self.manager.watchers, watchers);
                self.manager.watchers.append(&mut added);
                match self.manager.watcher_backlog.pop_front() {
                    Some(next) => current = next,
                    None => break,
                }
            }
            self.manager.firing_watchers = false;
        }

        self.rescan_queue(ty.name());
        for alternate in alternates {
            self.rescan_queue(alternate);
        }
        self.check_ready();
    }

    /// Watch every future registration.
    pub fn on_created<F>(&mut self, watcher: F)
    where
        F: FnMut(&mut Kernel, &TypeRef) + 'static,
    {
        self.manager.watchers.push(Box::new(watcher));
    }

    /// Run `callback` when the named type exists: immediately if it already
    /// does, otherwise once it registers.
    pub fn on_created_for<F>(&mut self, name: &str, callback: F)
    where
        F: FnOnce(&mut Kernel, &TypeRef) + 'static,
    {
        let canonical = self.registry.resolve(name);
        if let Some(ty) = self.manager.get(&canonical) {
            callback(self, &ty);
        } else {
            self.manager.park_exact(&canonical, Box::new(callback));
        }
    }

    // ---- instantiation ----

    /// Instantiate a class by any of its names. An unresolved name is
    /// fetched blocking when the loader is enabled. The first argument, when
    /// it is an object, supplies config overrides; all arguments reach the
    /// `constructor` member if the class declares one.
    pub fn create(&mut self, name: &str, args: &[Value]) -> Result<Instance, CoreError> {
        let canonical = self.registry.resolve(name);
        let ty = match self.manager.get(&canonical) {
            Some(ty) => ty,
            None => {
                if !self.loader.enabled {
                    return Err(CoreError::new(ErrorKind::LoaderDisabled {
                        name: canonical,
                    }));
                }
                self.sync_require(&[canonical.clone()])?;
                // the unit may have registered this name as an alternate of
                // a new canonical name; resolve again before giving up
                let canonical = self.registry.resolve(&canonical);
                match self.manager.get(&canonical) {
                    Some(ty) => ty,
                    None => {
                        return Err(CoreError::unknown_class(&canonical, &self.manager.names()))
                    }
                }
            }
        };
        if ty.is_singleton() {
            return Err(CoreError::malformed(
                ty.name(),
                "is a singleton; access it through Kernel::singleton",
            ));
        }
        self.instantiate(&ty, args)
    }

    /// Instantiate strictly by alias; canonical and alternate names are not
    /// accepted here.
    pub fn create_by_alias(&mut self, alias: &str, args: &[Value]) -> Result<Instance, CoreError> {
        let name = self
            .registry
            .alias_target(alias)
            .ok_or_else(|| CoreError::unknown_class(alias, &self.manager.names()))?;
        self.create(&name, args)
    }

    fn instantiate(&mut self, ty: &TypeRef, args: &[Value]) -> Result<Instance, CoreError> {
        let mut instance = Instance::new(ty.clone());
        let supplied = match args.first() {
            Some(Value::Object(map)) => map.clone(),
            _ => ValueMap::new(),
        };
        instance.init_config(self, supplied)?;
        if ty.find_member("constructor").is_some() {
            instance.call(self, "constructor", args)?;
        }
        Ok(instance)
    }

    pub(crate) fn instantiate_singleton(&mut self, ty: &TypeRef) -> Result<(), CoreError> {
        let instance = self.instantiate(ty, &[])?;
        self.singletons
            .insert(ty.name().to_string(), Rc::new(RefCell::new(instance)));
        Ok(())
    }

    /// The shared instance of a singleton class, under any of its names.
    pub fn singleton(&self, name: &str) -> Option<Rc<RefCell<Instance>>> {
        self.singletons.get(&self.registry.resolve(name)).cloned()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_class_is_preregistered() {
        let kernel = Kernel::new();
        assert!(kernel.is_created(ROOT_CLASS));
        assert!(kernel.get(ROOT_CLASS).unwrap().superclass().is_none());
    }

    #[test]
    fn test_expand_names_sees_alternates() {
        let mut kernel = Kernel::new();
        kernel
            .define("Ui.Button", crate::class::ClassSpec::new().alternate("Old.Button"))
            .unwrap();
        let out = kernel.expand_names(&["Old.*".to_string()]);
        assert_eq!(out.as_slice(), ["Old.Button"]);
    }
}
