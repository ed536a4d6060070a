//! classkit: a dynamic class system with dependency-aware loading.
//!
//! Classes are defined at runtime from declarative specs: single
//! inheritance from an implicit root, mixin composition, declarative config
//! properties with synthesized accessors and apply/update hooks, statics,
//! aliases, and alternate names. Definitions whose dependencies are not yet
//! constructed suspend and resume when the loader delivers them; a FIFO
//! request queue and a global ready gate coordinate the rest.
//!
//! The whole kernel is single-threaded and cooperative. Deferred work is
//! stored as continuations and resumed by the [`Kernel`] itself, so the
//! public surface is plain `&mut Kernel` all the way down.
//!
//! ```
//! use classkit::{ClassSpec, Kernel, Value};
//!
//! let mut kernel = Kernel::new();
//! kernel
//!     .define("Ui.Panel", ClassSpec::new().config("title", Value::from("untitled")))
//!     .unwrap();
//! let mut panel = kernel.create("Ui.Panel", &[]).unwrap();
//! assert_eq!(
//!     panel.get_config(&mut kernel, "title").unwrap(),
//!     Value::from("untitled")
//! );
//! ```

pub mod class;
pub mod config;
pub mod core;
pub mod errors;
pub mod kernel;
pub mod loader;
pub mod logging;
pub mod manager;

pub use class::{
    native, CallScope, ClassSpec, ConfigDecl, ConfigSchema, Instance, NativeFn, Type, TypeRef,
};
pub use config::KernelConfig;
pub use crate::core::names::NameRegistry;
pub use crate::core::value::{object_of, Value, ValueMap};
pub use errors::{CoreError, ErrorKind};
pub use kernel::{Kernel, ROOT_CLASS};
pub use loader::{
    CompilationUnit, DeclaredUnit, ExcludeScope, FetchFailure, FetchState, FileSource,
    LoaderStats, MemoryUnits, PathResolver, UnitPayload, UnitSource,
};
pub use manager::ClassManager;
