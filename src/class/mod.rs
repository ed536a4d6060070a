//! Class definitions: declarative specs, behavior templates, the build
//! pipeline, config accessors, and instances.

pub mod builder;
pub mod config;
pub mod instance;
pub mod template;

pub use config::{ConfigDecl, ConfigSchema, ConfigSlot};
pub use instance::{CallScope, Instance};
pub use template::{BehaviorTemplate, MemberSlot, Type, TypeRef};

use crate::core::value::{Value, ValueMap};
use crate::errors::CoreError;
use crate::kernel::Kernel;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A native member body. Invoked with the executing call scope and the
/// caller's arguments.
pub type NativeFn = Rc<dyn Fn(&mut CallScope<'_>, &[Value]) -> Result<Value, CoreError>>;

/// Class-level hook run when a mixin is composed into a new type.
pub type MixinHook = Rc<dyn Fn(&mut Kernel, &TypeRef) -> Result<(), CoreError>>;

/// Wrap a closure as a member body.
pub fn native<F>(f: F) -> NativeFn
where
    F: Fn(&mut CallScope<'_>, &[Value]) -> Result<Value, CoreError> + 'static,
{
    Rc::new(f)
}

/// Declarative definition consumed by `Kernel::define`.
///
/// Unknown JSON keys of a data-only unit land in `data` and become plain
/// instance members; native members are attached through the builder methods.
#[derive(Default)]
pub struct ClassSpec {
    pub extend: Option<String>,
    pub override_of: Option<String>,
    pub mixins: Vec<(String, String)>,
    pub config: Vec<ConfigDecl>,
    pub statics: ValueMap,
    pub inheritable_statics: ValueMap,
    pub requires: Vec<String>,
    pub uses: Vec<String>,
    pub aliases: Vec<String>,
    pub alternate_names: Vec<String>,
    pub singleton: bool,
    pub members: BTreeMap<String, NativeFn>,
    pub data: ValueMap,
    pub mixin_hook: Option<MixinHook>,
}

impl ClassSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(mut self, parent: &str) -> Self {
        self.extend = Some(parent.to_string());
        self
    }

    /// Turn this spec into a patch applied to an existing type instead of a
    /// new definition.
    pub fn override_of(mut self, target: &str) -> Self {
        self.override_of = Some(target.to_string());
        self
    }

    pub fn mixin(mut self, binding: &str, class: &str) -> Self {
        self.mixins.push((binding.to_string(), class.to_string()));
        self
    }

    /// Declare a config property with a deep-merging default.
    pub fn config(mut self, name: &str, default: Value) -> Self {
        self.config.push(ConfigDecl::new(name, default));
        self
    }

    /// Declare a config property whose redeclaration replaces the inherited
    /// default outright instead of deep-merging object values.
    pub fn config_replace(mut self, name: &str, default: Value) -> Self {
        self.config.push(ConfigDecl::new(name, default).replacing());
        self
    }

    pub fn static_value(mut self, name: &str, value: Value) -> Self {
        self.statics.insert(name.to_string(), value);
        self
    }

    /// Statics propagated to subclasses unless locally overridden.
    pub fn inheritable_static(mut self, name: &str, value: Value) -> Self {
        self.inheritable_statics.insert(name.to_string(), value);
        self
    }

    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }

    /// Optional dependencies: fetched before the global ready gate fires, but
    /// never blocking this definition.
    pub fn uses<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn alternate(mut self, name: &str) -> Self {
        self.alternate_names.push(name.to_string());
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn member(mut self, name: &str, body: NativeFn) -> Self {
        self.members.insert(name.to_string(), body);
        self
    }

    /// Plain data member copied onto every instance.
    pub fn data(mut self, name: &str, value: Value) -> Self {
        self.data.insert(name.to_string(), value);
        self
    }

    pub fn on_mixed_in<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Kernel, &TypeRef) -> Result<(), CoreError> + 'static,
    {
        self.mixin_hook = Some(Rc::new(hook));
        self
    }
}

impl std::fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassSpec")
            .field("extend", &self.extend)
            .field("override_of", &self.override_of)
            .field("mixins", &self.mixins)
            .field("config", &self.config)
            .field("requires", &self.requires)
            .field("uses", &self.uses)
            .field("aliases", &self.aliases)
            .field("alternate_names", &self.alternate_names)
            .field("singleton", &self.singleton)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}
