//! Compilation-unit sources: where the loader gets its units from.
//!
//! One fetchable unit defines exactly one named type. `FileSource` reads
//! data-only JSON specs from disk; `MemoryUnits` backs the tests and any
//! embedder that stages units programmatically, with a manual mode that
//! models an event loop delivering completions later.

use crate::class::{ClassSpec, ConfigDecl};
use crate::core::value::Value;
use crate::errors::CoreError;
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

/// One fetchable resource defining exactly one named type.
pub struct CompilationUnit {
    pub name: String,
    pub payload: UnitPayload,
}

pub enum UnitPayload {
    /// Declarative definition, executed as `define(name, spec)`.
    Spec(Box<ClassSpec>),
    /// Arbitrary registration code, for units with native members.
    Native(Box<dyn FnOnce(&mut Kernel) -> Result<(), CoreError>>),
}

impl CompilationUnit {
    pub fn from_spec(name: &str, spec: ClassSpec) -> Self {
        Self {
            name: name.to_string(),
            payload: UnitPayload::Spec(Box::new(spec)),
        }
    }

    pub fn native<F>(name: &str, f: F) -> Self
    where
        F: FnOnce(&mut Kernel) -> Result<(), CoreError> + 'static,
    {
        Self {
            name: name.to_string(),
            payload: UnitPayload::Native(Box::new(f)),
        }
    }
}

pub enum FetchOutcome {
    Loaded(CompilationUnit),
    /// Fetch started; completion arrives later via `Kernel::complete_fetch`.
    /// Not a legal answer to a blocking fetch.
    Pending,
    Failed(String),
}

/// The loader's I/O seam. `sync` demands an in-place blocking fetch.
pub trait UnitSource {
    fn fetch(&mut self, path: &str, url: &str, sync: bool) -> FetchOutcome;
}

/// Serialized form of a data-only unit: the type name plus its spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredUnit {
    pub name: String,
    #[serde(flatten)]
    pub spec: DeclaredSpec,
}

/// Data-only class spec, deserializable from a unit file. Native members
/// cannot appear here; `data` keys become plain instance members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredSpec {
    pub extend: Option<String>,
    pub requires: Vec<String>,
    pub uses: Vec<String>,
    pub mixins: BTreeMap<String, String>,
    pub config: BTreeMap<String, serde_json::Value>,
    /// Config names whose redeclared default replaces instead of deep-merging.
    pub config_replace: Vec<String>,
    pub statics: BTreeMap<String, serde_json::Value>,
    pub inheritable_statics: BTreeMap<String, serde_json::Value>,
    pub alias: Vec<String>,
    pub alternate_names: Vec<String>,
    pub singleton: bool,
    pub data: BTreeMap<String, serde_json::Value>,
}

impl DeclaredSpec {
    pub fn into_spec(self) -> ClassSpec {
        let mut spec = ClassSpec::new();
        spec.extend = self.extend;
        spec.requires = self.requires;
        spec.uses = self.uses;
        spec.mixins = self.mixins.into_iter().collect();
        for (name, default) in self.config {
            let decl = ConfigDecl::new(&name, Value::from_json(&default));
            spec.config.push(if self.config_replace.contains(&name) {
                decl.replacing()
            } else {
                decl
            });
        }
        for (name, value) in self.statics {
            spec.statics.insert(name, Value::from_json(&value));
        }
        for (name, value) in self.inheritable_statics {
            spec.inheritable_statics
                .insert(name, Value::from_json(&value));
        }
        spec.aliases = self.alias;
        spec.alternate_names = self.alternate_names;
        spec.singleton = self.singleton;
        for (name, value) in self.data {
            spec.data.insert(name, Value::from_json(&value));
        }
        spec
    }
}

/// Reads JSON `DeclaredUnit` files from a base directory.
pub struct FileSource {
    base_dir: PathBuf,
}

impl FileSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl UnitSource for FileSource {
    fn fetch(&mut self, path: &str, _url: &str, _sync: bool) -> FetchOutcome {
        let full = self.base_dir.join(path);
        let content = match fs::read_to_string(&full) {
            Ok(content) => content,
            Err(e) => return FetchOutcome::Failed(format!("{}: {}", full.display(), e)),
        };
        match serde_json::from_str::<DeclaredUnit>(&content) {
            Ok(unit) => FetchOutcome::Loaded(CompilationUnit::from_spec(
                &unit.name,
                unit.spec.into_spec(),
            )),
            Err(e) => FetchOutcome::Failed(format!("{}: {}", full.display(), e)),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    units: HashMap<String, CompilationUnit>,
    manual: bool,
    requested: Vec<String>,
}

/// In-memory unit store. Cloning shares the store, so a test can keep a
/// handle while the kernel owns the source. In manual mode asynchronous
/// fetches park as `Pending` and the holder delivers them through
/// `Kernel::complete_fetch`; blocking fetches always answer in place.
#[derive(Clone, Default)]
pub struct MemoryUnits {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manual() -> Self {
        let store = Self::default();
        store.inner.borrow_mut().manual = true;
        store
    }

    pub fn insert(&self, path: &str, unit: CompilationUnit) {
        self.inner.borrow_mut().units.insert(path.to_string(), unit);
    }

    pub fn insert_spec(&self, path: &str, name: &str, spec: ClassSpec) {
        self.insert(path, CompilationUnit::from_spec(name, spec));
    }

    /// Paths whose async fetches are parked awaiting manual delivery.
    pub fn requested(&self) -> Vec<String> {
        self.inner.borrow().requested.clone()
    }

    /// Take the unit staged at `path` for manual delivery.
    pub fn take(&self, path: &str) -> Option<CompilationUnit> {
        let mut inner = self.inner.borrow_mut();
        inner.requested.retain(|p| p != path);
        inner.units.remove(path)
    }
}

impl UnitSource for MemoryUnits {
    fn fetch(&mut self, path: &str, _url: &str, sync: bool) -> FetchOutcome {
        let mut inner = self.inner.borrow_mut();
        if inner.manual && !sync {
            inner.requested.push(path.to_string());
            return FetchOutcome::Pending;
        }
        match inner.units.remove(path) {
            Some(unit) => FetchOutcome::Loaded(unit),
            None => FetchOutcome::Failed(format!("no unit staged at '{}'", path)),
        }
    }
}
