//! Instances and the call scope members execute in.
//!
//! A `CallScope` carries the executing member's frame, which is what makes
//! `call_parent`/`call_super` explicit lookups instead of chain walks, plus
//! mutable access to the instance and the kernel for the duration of the call.

use crate::class::config::ConfigSlot;
use crate::class::template::{MemberSlot, TypeRef};
use crate::core::value::{Value, ValueMap};
use crate::errors::{CoreError, ErrorKind};
use crate::kernel::Kernel;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Instance {
    ty: TypeRef,
    config: HashMap<String, ConfigSlot>,
    /// Instance-supplied config values not yet applied (consumed lazily or
    /// during the post-default initialization pass).
    overrides: ValueMap,
    data: ValueMap,
}

impl Instance {
    pub(crate) fn new(ty: TypeRef) -> Self {
        let data = ty.data_defaults().clone();
        Self {
            ty,
            config: HashMap::new(),
            overrides: ValueMap::new(),
            data,
        }
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    pub fn class_name(&self) -> &str {
        self.ty.name()
    }

    pub fn data(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn set_data(&mut self, name: &str, value: Value) {
        self.data.insert(name.to_string(), value);
    }

    /// Invoke a member by name.
    pub fn call(
        &mut self,
        kernel: &mut Kernel,
        member: &str,
        args: &[Value],
    ) -> Result<Value, CoreError> {
        let slot = self.ty.find_member(member).ok_or_else(|| {
            CoreError::new(ErrorKind::NoSuchMember {
                class: self.ty.name().to_string(),
                member: member.to_string(),
            })
        })?;
        let mut scope = CallScope {
            kernel,
            instance: self,
            frame: Frame { slot: None },
        };
        scope.run_slot(slot, args)
    }

    /// Read a config property through the synthesized accessor path.
    pub fn get_config(&mut self, kernel: &mut Kernel, prop: &str) -> Result<Value, CoreError> {
        let mut scope = CallScope {
            kernel,
            instance: self,
            frame: Frame { slot: None },
        };
        scope.get(prop)
    }

    /// Write a config property through the synthesized accessor path.
    pub fn set_config(
        &mut self,
        kernel: &mut Kernel,
        prop: &str,
        value: Value,
    ) -> Result<Value, CoreError> {
        let mut scope = CallScope {
            kernel,
            instance: self,
            frame: Frame { slot: None },
        };
        scope.set(prop, value)
    }

    /// Apply build-time defaults in first-declared order, then the
    /// instance-supplied overrides, also in declaration order. Keys with no
    /// matching declaration become plain data members.
    pub(crate) fn init_config(
        &mut self,
        kernel: &mut Kernel,
        supplied: ValueMap,
    ) -> Result<(), CoreError> {
        let mut order: Vec<(String, bool)> = Vec::with_capacity(self.ty.config_schema().len());
        for decl in self.ty.config_schema().iter() {
            order.push((decl.name.clone(), supplied.contains_key(&decl.name)));
        }
        for (key, value) in supplied {
            if self.ty.config_schema().contains(&key) {
                self.overrides.insert(key, value);
            } else {
                self.data.insert(key, value);
            }
        }

        let mut scope = CallScope {
            kernel,
            instance: self,
            frame: Frame { slot: None },
        };
        for (name, _) in order.iter().filter(|(_, o)| !*o) {
            if !scope.slot_initialized(name) {
                scope.init_prop(name)?;
            }
        }
        for (name, _) in order.iter().filter(|(_, o)| *o) {
            if let Some(value) = scope.instance.overrides.remove(name) {
                scope.set(name, value)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.ty.name())
            .field("config", &self.config.len())
            .finish()
    }
}

#[derive(Clone)]
struct Frame {
    /// Slot of the executing member; `None` outside member execution.
    slot: Option<Rc<MemberSlot>>,
}

pub struct CallScope<'a> {
    kernel: &'a mut Kernel,
    instance: &'a mut Instance,
    frame: Frame,
}

impl<'a> CallScope<'a> {
    pub fn kernel(&mut self) -> &mut Kernel {
        self.kernel
    }

    pub fn class_name(&self) -> &str {
        self.instance.ty.name()
    }

    pub fn type_ref(&self) -> TypeRef {
        self.instance.ty.clone()
    }

    pub fn data(&self, name: &str) -> Option<&Value> {
        self.instance.data.get(name)
    }

    pub fn set_data(&mut self, name: &str, value: Value) {
        self.instance.data.insert(name.to_string(), value);
    }

    /// Invoke another member of the same instance.
    pub fn invoke(&mut self, member: &str, args: &[Value]) -> Result<Value, CoreError> {
        let slot = self.instance.ty.find_member(member).ok_or_else(|| {
            CoreError::new(ErrorKind::NoSuchMember {
                class: self.instance.ty.name().to_string(),
                member: member.to_string(),
            })
        })?;
        self.run_slot(slot, args)
    }

    /// Invoke the implementation the executing member shadows: the patched
    /// implementation when this member is an override, otherwise the direct
    /// ancestor's implementation of the same name.
    pub fn call_parent(&mut self, args: &[Value]) -> Result<Value, CoreError> {
        let slot = self.executing_slot("call_parent")?;
        if let Some(previous) = slot.previous.clone() {
            return self.run_slot(previous, args);
        }
        let ancestor = self.ancestor_slot(&slot)?;
        self.run_slot(ancestor, args)
    }

    /// Invoke the implementation this member's override chain would otherwise
    /// have reached: the original implementation beneath every patch, or the
    /// ancestor's when the executing member is not patched at all.
    pub fn call_super(&mut self, args: &[Value]) -> Result<Value, CoreError> {
        let slot = self.executing_slot("call_super")?;
        let mut bottom = slot.clone();
        while let Some(previous) = bottom.previous.clone() {
            bottom = previous;
        }
        if !Rc::ptr_eq(&bottom, &slot) {
            return self.run_slot(bottom, args);
        }
        let ancestor = self.ancestor_slot(&slot)?;
        self.run_slot(ancestor, args)
    }

    /// Synthesized getter: direct read once initialized, lazy initialization
    /// from the merged default (or pending instance override) on first
    /// access. A user-declared `get_<prop>` member shadows this path.
    pub fn get(&mut self, prop: &str) -> Result<Value, CoreError> {
        let getter = format!("get_{}", prop);
        let inside_getter = matches!(&self.frame.slot, Some(s) if s.name == getter);
        if !inside_getter {
            if let Some(slot) = self.instance.ty.find_member(&getter) {
                return self.run_slot(slot, &[]);
            }
        }
        if let Some(ConfigSlot::Initialized(value)) = self.instance.config.get(prop) {
            return Ok(value.clone());
        }
        self.init_prop(prop)
    }

    /// Synthesized setter: mark the slot initialized, run the `apply_<prop>`
    /// hook (returning `Undefined` vetoes the write), store the result, and
    /// run `update_<prop>(new, old)` only when the value changed.
    pub fn set(&mut self, prop: &str, value: Value) -> Result<Value, CoreError> {
        let old = match self.instance.config.get(prop) {
            Some(ConfigSlot::Initialized(v)) => v.clone(),
            _ => Value::Undefined,
        };
        self.instance
            .config
            .insert(prop.to_string(), ConfigSlot::Initialized(old.clone()));

        let applied = match self.instance.ty.find_member(&format!("apply_{}", prop)) {
            Some(hook) => self.run_slot(hook, &[value, old.clone()])?,
            None => value,
        };
        if applied.is_undefined() {
            // vetoed; the previous value stands
            return Ok(old);
        }

        self.instance
            .config
            .insert(prop.to_string(), ConfigSlot::Initialized(applied.clone()));
        if applied != old {
            if let Some(hook) = self.instance.ty.find_member(&format!("update_{}", prop)) {
                self.run_slot(hook, &[applied.clone(), old])?;
            }
        }
        Ok(applied)
    }

    pub(crate) fn slot_initialized(&self, prop: &str) -> bool {
        matches!(
            self.instance.config.get(prop),
            Some(ConfigSlot::Initialized(_))
        )
    }

    pub(crate) fn init_prop(&mut self, prop: &str) -> Result<Value, CoreError> {
        let initial = match self.instance.overrides.remove(prop) {
            Some(value) => value,
            None => self
                .instance
                .ty
                .config_schema()
                .get(prop)
                .map(|decl| decl.default.clone())
                .unwrap_or(Value::Undefined),
        };
        self.set(prop, initial)
    }

    fn executing_slot(&self, operation: &str) -> Result<Rc<MemberSlot>, CoreError> {
        self.frame.slot.clone().ok_or_else(|| {
            CoreError::new(ErrorKind::OutsideMemberCall {
                operation: operation.to_string(),
            })
        })
    }

    /// Look up the executing member's name in the declaring type's direct
    /// ancestor. Templates are flattened, so one lookup covers the whole
    /// upper chain.
    fn ancestor_slot(&self, slot: &Rc<MemberSlot>) -> Result<Rc<MemberSlot>, CoreError> {
        let missing = || {
            CoreError::new(ErrorKind::NoAncestorImplementation {
                class: slot.owner.clone(),
                member: slot.name.clone(),
            })
        };
        let owner = self.kernel.get(&slot.owner).ok_or_else(missing)?;
        let parent = owner.superclass().ok_or_else(missing)?;
        parent.find_member(&slot.name).ok_or_else(missing)
    }

    fn run_slot(&mut self, slot: Rc<MemberSlot>, args: &[Value]) -> Result<Value, CoreError> {
        let body = slot.body.clone();
        let mut child = CallScope {
            kernel: &mut *self.kernel,
            instance: &mut *self.instance,
            frame: Frame { slot: Some(slot) },
        };
        body(&mut child, args)
    }
}
