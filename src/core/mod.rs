pub mod names;
pub mod value;

pub use names::{NameList, NameRegistry};
pub use value::{object_of, Value, ValueMap};
