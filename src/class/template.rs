//! Behavior templates: the member dispatch table every instance delegates to.
//!
//! A template is built once per type by copying the parent's table and
//! overlaying local members, so lookup never walks a live chain. Each slot is
//! tagged with the type that declared it, which is what makes parent dispatch
//! an explicit lookup. Post-construction `override` patches swap slots in
//! place, each patch keeping a link to the implementation it replaced.

use crate::class::config::ConfigSchema;
use crate::class::{MixinHook, NativeFn};
use crate::core::value::ValueMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct MemberSlot {
    /// Name of the type that declared this implementation.
    pub owner: String,
    pub name: String,
    pub body: NativeFn,
    /// Implementation this slot replaced, if it is an override patch.
    pub previous: Option<Rc<MemberSlot>>,
}

impl std::fmt::Debug for MemberSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberSlot")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("patched", &self.previous.is_some())
            .finish()
    }
}

pub struct BehaviorTemplate {
    class_name: String,
    members: RefCell<HashMap<String, Rc<MemberSlot>>>,
}

impl BehaviorTemplate {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            members: RefCell::new(HashMap::new()),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Seed this table with a copy of the parent's. Slots are shared, so an
    /// inherited member still reports its declaring type as owner.
    pub fn inherit_from(&self, parent: &BehaviorTemplate) {
        let parent_members = parent.members.borrow();
        let mut members = self.members.borrow_mut();
        for (name, slot) in parent_members.iter() {
            members.insert(name.clone(), Rc::clone(slot));
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<MemberSlot>> {
        self.members.borrow().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.members.borrow().contains_key(name)
    }

    /// Install a locally declared member, shadowing any inherited slot.
    pub fn install(&self, name: &str, body: NativeFn) {
        let slot = Rc::new(MemberSlot {
            owner: self.class_name.clone(),
            name: name.to_string(),
            body,
            previous: None,
        });
        self.members.borrow_mut().insert(name.to_string(), slot);
    }

    /// Share an existing slot (mixin composition keeps the mixin as owner).
    pub fn install_shared(&self, slot: Rc<MemberSlot>) {
        self.members
            .borrow_mut()
            .insert(slot.name.clone(), slot);
    }

    /// Patch a member, linking the new implementation to the one it replaces.
    pub fn patch(&self, name: &str, body: NativeFn) {
        let previous = self.lookup(name);
        let slot = Rc::new(MemberSlot {
            owner: self.class_name.clone(),
            name: name.to_string(),
            body,
            previous,
        });
        self.members.borrow_mut().insert(name.to_string(), slot);
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.borrow().keys().cloned().collect()
    }

    pub fn slots(&self) -> Vec<Rc<MemberSlot>> {
        self.members.borrow().values().cloned().collect()
    }
}

/// A constructed class: behavior template, statics, config schema, mixin
/// bindings, and the parent link. Built once by the define pipeline; the only
/// later mutation is member patching via `override`.
pub struct Type {
    pub(crate) name: String,
    pub(crate) superclass: Option<TypeRef>,
    pub(crate) template: BehaviorTemplate,
    pub(crate) statics: RefCell<ValueMap>,
    pub(crate) inheritable_statics: ValueMap,
    pub(crate) config: ConfigSchema,
    pub(crate) mixins: Vec<(String, TypeRef)>,
    pub(crate) singleton: bool,
    pub(crate) mixin_hook: Option<MixinHook>,
    pub(crate) data: ValueMap,
}

pub type TypeRef = Rc<Type>;

impl Type {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&TypeRef> {
        self.superclass.as_ref()
    }

    pub fn template(&self) -> &BehaviorTemplate {
        &self.template
    }

    pub fn config_schema(&self) -> &ConfigSchema {
        &self.config
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Mixins composed into this type, inherited bindings included.
    pub fn mixins(&self) -> &[(String, TypeRef)] {
        &self.mixins
    }

    pub fn find_member(&self, name: &str) -> Option<Rc<MemberSlot>> {
        self.template.lookup(name)
    }

    /// Static member lookup. Inheritable statics were already flattened into
    /// this table at construction, so no chain walk happens here.
    pub fn static_value(&self, name: &str) -> Option<crate::core::value::Value> {
        self.statics.borrow().get(name).cloned()
    }

    pub fn set_static(&self, name: &str, value: crate::core::value::Value) {
        self.statics.borrow_mut().insert(name.to_string(), value);
    }

    pub(crate) fn data_defaults(&self) -> &ValueMap {
        &self.data
    }

    /// True when `ancestor` appears on this type's parent chain (or is self).
    pub fn is_subclass_of(&self, ancestor: &str) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.name == ancestor {
                return true;
            }
            current = ty.superclass.as_ref().map(|t| t.as_ref());
        }
        false
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|t| t.name.as_str()),
            )
            .field("singleton", &self.singleton)
            .field("config", &self.config.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::native;
    use crate::core::value::Value;

    #[test]
    fn test_inherited_slot_keeps_declaring_owner() {
        let parent = BehaviorTemplate::new("Ui.Base");
        parent.install("render", native(|_, _| Ok(Value::Null)));

        let child = BehaviorTemplate::new("Ui.Panel");
        child.inherit_from(&parent);

        let slot = child.lookup("render").unwrap();
        assert_eq!(slot.owner, "Ui.Base");
    }

    #[test]
    fn test_local_install_shadows_inherited() {
        let parent = BehaviorTemplate::new("Ui.Base");
        parent.install("render", native(|_, _| Ok(Value::Null)));

        let child = BehaviorTemplate::new("Ui.Panel");
        child.inherit_from(&parent);
        child.install("render", native(|_, _| Ok(Value::from(1))));

        assert_eq!(child.lookup("render").unwrap().owner, "Ui.Panel");
        // parent table untouched
        assert_eq!(parent.lookup("render").unwrap().owner, "Ui.Base");
    }

    #[test]
    fn test_patch_links_previous_implementation() {
        let template = BehaviorTemplate::new("Ui.Base");
        template.install("render", native(|_, _| Ok(Value::from(1))));
        template.patch("render", native(|_, _| Ok(Value::from(2))));
        template.patch("render", native(|_, _| Ok(Value::from(3))));

        let slot = template.lookup("render").unwrap();
        let first = slot.previous.as_ref().unwrap();
        let original = first.previous.as_ref().unwrap();
        assert!(original.previous.is_none());
    }
}
