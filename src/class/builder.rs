//! The define pipeline: a cursor over fixed build steps, suspendable at the
//! dependency step.
//!
//! `define` drives a `PendingDefinition` through the pipeline. When
//! dependencies are missing the definition parks in the kernel's pending
//! table and a queued require resumes it at the next step; everything else
//! runs to completion in one pass. Overrides short-circuit the pipeline:
//! they patch an existing template (or park until the target registers).

use crate::class::config::ConfigSchema;
use crate::class::template::{BehaviorTemplate, Type, TypeRef};
use crate::class::{ClassSpec, MixinHook};
use crate::core::names::NameRegistry;
use crate::core::value::ValueMap;
use crate::errors::{CoreError, ErrorKind};
use crate::kernel::Kernel;
use crate::manager::CreatedCallback;
use std::cell::RefCell;
use std::rc::Rc;

pub struct PendingDefinition {
    pub(crate) id: u64,
    pub(crate) name: String,
    spec: ClassSpec,
    /// Index of the next pipeline step to run.
    cursor: usize,
    waiting: Vec<String>,
    parent: Option<TypeRef>,
    template: BehaviorTemplate,
    statics: ValueMap,
    inheritable: ValueMap,
    schema: ConfigSchema,
    mixins: Vec<(String, TypeRef)>,
    /// Start of the mixins this definition composed itself, as opposed to
    /// the ones inherited from the parent. Only these fire mixed-in hooks.
    first_new_mixin: usize,
    on_created: Option<CreatedCallback>,
}

impl PendingDefinition {
    fn new(id: u64, name: &str, spec: ClassSpec, on_created: Option<CreatedCallback>) -> Self {
        Self {
            id,
            name: name.to_string(),
            spec,
            cursor: 0,
            waiting: Vec::new(),
            parent: None,
            template: BehaviorTemplate::new(name),
            statics: ValueMap::new(),
            inheritable: ValueMap::new(),
            schema: ConfigSchema::new(),
            mixins: Vec::new(),
            first_new_mixin: 0,
            on_created,
        }
    }

    fn parent(&self) -> Result<TypeRef, CoreError> {
        self.parent
            .clone()
            .ok_or_else(|| CoreError::malformed(&self.name, "parent not resolved"))
    }
}

enum StepResult {
    Continue,
    /// Park the definition; `waiting` holds the names to require.
    Suspend,
}

type BuildStep = fn(&mut Kernel, &mut PendingDefinition) -> Result<StepResult, CoreError>;

const PIPELINE: &[(&str, BuildStep)] = &[
    ("class-name", resolve_class_name),
    ("dependencies", await_dependencies),
    ("extend", resolve_parent),
    ("statics", apply_statics),
    ("config", apply_config),
    ("mixins", apply_mixins),
    ("members", attach_members),
];

fn resolve_class_name(
    kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    if !NameRegistry::is_valid_name(&pd.name) {
        return Err(CoreError::malformed(&pd.name, "not a valid dotted class name"));
    }
    for alternate in &pd.spec.alternate_names {
        if !NameRegistry::is_valid_name(alternate) {
            return Err(CoreError::malformed(
                &pd.name,
                format!("invalid alternate name '{}'", alternate),
            ));
        }
    }
    if kernel.is_created(&pd.name) {
        return Err(CoreError::malformed(&pd.name, "already defined"));
    }
    Ok(StepResult::Continue)
}

/// Collect every name the definition cannot proceed without: the parent,
/// mixin sources, and explicit requires. `uses` names only feed the ready
/// gate and never block.
fn await_dependencies(
    kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    kernel.loader.optional.extend(pd.spec.uses.iter().cloned());

    let mut needed: Vec<String> = Vec::new();
    if let Some(parent) = &pd.spec.extend {
        needed.push(parent.clone());
    }
    for (_, class) in &pd.spec.mixins {
        needed.push(class.clone());
    }
    needed.extend(pd.spec.requires.iter().cloned());

    let mut missing: Vec<String> = Vec::new();
    for name in kernel.expand_names(&needed) {
        let canonical = kernel.resolve_name(&name);
        if !kernel.is_created(&canonical) && !missing.contains(&canonical) {
            missing.push(canonical);
        }
    }
    if missing.is_empty() {
        return Ok(StepResult::Continue);
    }
    if !kernel.loader_enabled() {
        return Err(CoreError::new(ErrorKind::UnresolvedDependency {
            class: pd.name.clone(),
            dependency: missing.remove(0),
        }));
    }
    tracing::debug!(class = %pd.name, missing = ?missing, "definition suspended on dependencies");
    pd.waiting = missing;
    Ok(StepResult::Suspend)
}

fn resolve_parent(
    kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    let parent = match &pd.spec.extend {
        Some(name) => {
            let canonical = kernel.resolve_name(name);
            kernel.get(&canonical).ok_or_else(|| {
                CoreError::new(ErrorKind::UnresolvedDependency {
                    class: pd.name.clone(),
                    dependency: canonical.clone(),
                })
            })?
        }
        None => kernel.root_type(),
    };
    if parent.is_singleton() {
        return Err(CoreError::malformed(
            &pd.name,
            format!("cannot extend singleton '{}'", parent.name()),
        ));
    }
    pd.template.inherit_from(parent.template());
    pd.parent = Some(parent);
    Ok(StepResult::Continue)
}

/// Static table: parent's inheritable statics first, then the definition's
/// own inheritable statics, then its plain statics. Later entries win.
fn apply_statics(
    _kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    let parent = pd.parent()?;
    let mut statics = parent.inheritable_statics.clone();
    let mut inheritable = parent.inheritable_statics.clone();
    for (name, value) in &pd.spec.inheritable_statics {
        statics.insert(name.clone(), value.clone());
        inheritable.insert(name.clone(), value.clone());
    }
    for (name, value) in &pd.spec.statics {
        statics.insert(name.clone(), value.clone());
    }
    pd.statics = statics;
    pd.inheritable = inheritable;
    Ok(StepResult::Continue)
}

fn apply_config(
    _kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    let parent = pd.parent()?;
    pd.schema = ConfigSchema::merged(parent.config_schema(), &pd.spec.config);
    Ok(StepResult::Continue)
}

/// Compose mixins: inherited bindings first, then each declared mixin in
/// order. A mixin contributes the member slots the template does not already
/// have, shared so the slot still reports the mixin as its owner. Rebinding
/// an inherited name replaces that binding.
fn apply_mixins(
    kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    let parent = pd.parent()?;
    pd.mixins = parent.mixins().to_vec();
    pd.first_new_mixin = pd.mixins.len();
    let declared = std::mem::take(&mut pd.spec.mixins);
    for (binding, class) in declared {
        let canonical = kernel.resolve_name(&class);
        let mixin = kernel.get(&canonical).ok_or_else(|| {
            CoreError::new(ErrorKind::UnresolvedDependency {
                class: pd.name.clone(),
                dependency: canonical.clone(),
            })
        })?;
        for slot in mixin.template().slots() {
            if !pd.template.has(&slot.name) {
                pd.template.install_shared(slot);
            }
        }
        if let Some(pos) = pd.mixins.iter().position(|(b, _)| *b == binding) {
            pd.mixins.remove(pos);
            if pos < pd.first_new_mixin {
                pd.first_new_mixin -= 1;
            }
        }
        pd.mixins.push((binding, mixin));
    }
    Ok(StepResult::Continue)
}

fn attach_members(
    _kernel: &mut Kernel,
    pd: &mut PendingDefinition,
) -> Result<StepResult, CoreError> {
    let members = std::mem::take(&mut pd.spec.members);
    for (name, body) in members {
        pd.template.install(&name, body);
    }
    Ok(StepResult::Continue)
}

/// Run the pipeline from the definition's cursor. Returns the constructed
/// type, or `None` when the definition suspended (or completed through a
/// synchronous resume inside its own require).
pub(crate) fn drive(
    kernel: &mut Kernel,
    mut pd: PendingDefinition,
) -> Result<Option<TypeRef>, CoreError> {
    while pd.cursor < PIPELINE.len() {
        let (step_name, step) = PIPELINE[pd.cursor];
        tracing::trace!(class = %pd.name, step = step_name, "build step");
        match step(kernel, &mut pd)? {
            StepResult::Continue => pd.cursor += 1,
            StepResult::Suspend => {
                let id = pd.id;
                let class = pd.name.clone();
                let waiting = std::mem::take(&mut pd.waiting);
                // resume past the suspending step
                pd.cursor += 1;
                kernel.pending.insert(id, pd);
                let result = kernel.require_internal(
                    &waiting,
                    &[],
                    &class,
                    Box::new(move |k: &mut Kernel| k.resume_definition(id)),
                );
                if let Err(e) = result {
                    kernel.pending.remove(&id);
                    return Err(e);
                }
                // a blocking source may have resumed and finished us already
                return Ok(kernel.get(&class));
            }
        }
    }
    let ty = finish_definition(kernel, pd)?;
    Ok(Some(ty))
}

fn finish_definition(kernel: &mut Kernel, pd: PendingDefinition) -> Result<TypeRef, CoreError> {
    let PendingDefinition {
        name,
        spec,
        parent,
        template,
        statics,
        inheritable,
        schema,
        mixins,
        first_new_mixin,
        on_created,
        ..
    } = pd;

    let mut data = parent
        .as_ref()
        .map(|p| p.data_defaults().clone())
        .unwrap_or_default();
    for (key, value) in spec.data {
        data.insert(key, value);
    }

    let ty: TypeRef = Rc::new(Type {
        name: name.clone(),
        superclass: parent,
        template,
        statics: RefCell::new(statics),
        inheritable_statics: inheritable,
        config: schema,
        mixins,
        singleton: spec.singleton,
        mixin_hook: spec.mixin_hook,
        data,
    });

    for alias in &spec.aliases {
        kernel.registry.set_alias(alias, &name);
    }
    kernel.register_type(ty.clone(), &spec.alternate_names);

    let hooks: Vec<MixinHook> = ty.mixins()[first_new_mixin..]
        .iter()
        .filter_map(|(_, mixin)| mixin.mixin_hook.clone())
        .collect();
    for hook in hooks {
        hook(kernel, &ty)?;
    }

    if ty.is_singleton() {
        kernel.instantiate_singleton(&ty)?;
    }

    if let Some(callback) = on_created {
        callback(kernel, &ty);
    }
    kernel.announce_created(&ty, &spec.alternate_names);
    tracing::info!(class = %name, "class defined");
    Ok(ty)
}

/// Patch an already-constructed type: members swap in place (each keeping a
/// link to the implementation it replaced) and statics overwrite. Overrides
/// cannot extend, mix in, or declare config.
fn apply_override(target: &TypeRef, spec: ClassSpec) -> Result<(), CoreError> {
    if spec.extend.is_some() || !spec.mixins.is_empty() || !spec.config.is_empty() {
        return Err(CoreError::malformed(
            target.name(),
            "an override may only patch members and statics",
        ));
    }
    for (name, body) in spec.members {
        target.template().patch(&name, body);
    }
    for (name, value) in spec.statics {
        target.set_static(&name, value);
    }
    tracing::debug!(class = %target.name(), "override applied");
    Ok(())
}

impl Kernel {
    /// Define a class. Returns the constructed type, or `None` when the
    /// definition suspended on dependencies still being fetched.
    pub fn define(&mut self, name: &str, spec: ClassSpec) -> Result<Option<TypeRef>, CoreError> {
        self.define_internal(name, spec, None)
    }

    /// `define` with a callback fired after construction completes, however
    /// long the dependency wait takes.
    pub fn define_with<F>(
        &mut self,
        name: &str,
        spec: ClassSpec,
        on_created: F,
    ) -> Result<Option<TypeRef>, CoreError>
    where
        F: FnOnce(&mut Kernel, &TypeRef) + 'static,
    {
        self.define_internal(name, spec, Some(Box::new(on_created)))
    }

    fn define_internal(
        &mut self,
        name: &str,
        spec: ClassSpec,
        on_created: Option<CreatedCallback>,
    ) -> Result<Option<TypeRef>, CoreError> {
        if let Some(target) = spec.override_of.clone() {
            return self.define_override(name, &target, spec, on_created);
        }
        let id = self.next_pending;
        self.next_pending += 1;
        drive(self, PendingDefinition::new(id, name, spec, on_created))
    }

    fn define_override(
        &mut self,
        name: &str,
        target: &str,
        mut spec: ClassSpec,
        on_created: Option<CreatedCallback>,
    ) -> Result<Option<TypeRef>, CoreError> {
        if !NameRegistry::is_valid_name(name) {
            return Err(CoreError::malformed(name, "not a valid dotted class name"));
        }
        spec.override_of = None;
        let canonical = self.resolve_name(target);
        if let Some(ty) = self.get(&canonical) {
            apply_override(&ty, spec)?;
            if let Some(callback) = on_created {
                callback(self, &ty);
            }
            return Ok(Some(ty));
        }
        // target not constructed yet: park until it registers
        let override_name = name.to_string();
        self.manager.park_exact(
            &canonical,
            Box::new(move |kernel: &mut Kernel, ty: &TypeRef| {
                if let Err(e) = apply_override(ty, spec) {
                    kernel.report_deferred_error(&override_name, &e);
                    return;
                }
                if let Some(callback) = on_created {
                    callback(kernel, ty);
                }
            }),
        );
        Ok(None)
    }

    pub(crate) fn resume_definition(&mut self, id: u64) {
        if let Some(pd) = self.pending.remove(&id) {
            let class = pd.name.clone();
            if let Err(e) = drive(self, pd) {
                self.report_deferred_error(&class, &e);
            }
        }
    }
}
