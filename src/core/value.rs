//! Dynamic value model shared by config defaults, statics, and unit payloads.
//!
//! Values cross the boundary between native Rust members and data-only
//! compilation units, so they mirror the JSON data model plus an explicit
//! `Undefined` used as the accessor veto/absence marker.

use std::collections::BTreeMap;
use std::fmt;

pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value. An `apply` hook returning this vetoes the assignment.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(ValueMap),
}

impl Value {
    pub fn object() -> Value {
        Value::Object(ValueMap::new())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Merge `patch` onto `self`. Object-vs-object merges recursively per key;
    /// any other combination replaces the base value.
    pub fn merged_with(&self, patch: &Value) -> Value {
        match (self, patch) {
            (Value::Object(base), Value::Object(over)) => {
                let mut out = base.clone();
                for (key, value) in over {
                    let merged = match out.get(key) {
                        Some(existing) => existing.merged_with(value),
                        None => value.clone(),
                    };
                    out.insert(key.clone(), merged);
                }
                Value::Object(out)
            }
            _ => patch.clone(),
        }
    }

    /// Convert from the JSON data model. JSON has no `Undefined`; `null`
    /// becomes `Null`. Numbers outside i64 fall back to `Float`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to the JSON data model. `Undefined` flattens to `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Object(map)
    }
}

/// Build an object value from key/value pairs.
pub fn object_of<I, K>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_merge_is_recursive() {
        let base = object_of([("a", object_of([("x", Value::from(1))]))]);
        let patch = object_of([("a", object_of([("y", Value::from(2))]))]);

        let merged = base.merged_with(&patch);
        let a = merged.as_object().unwrap().get("a").unwrap();
        assert_eq!(a.as_object().unwrap().get("x"), Some(&Value::from(1)));
        assert_eq!(a.as_object().unwrap().get("y"), Some(&Value::from(2)));
    }

    #[test]
    fn test_non_object_patch_replaces() {
        let base = object_of([("x", Value::from(1))]);
        assert_eq!(base.merged_with(&Value::from("flat")), Value::from("flat"));
        assert_eq!(Value::from(3).merged_with(&base), base);
    }

    #[test]
    fn test_json_roundtrip() {
        let value = object_of([
            ("name", Value::from("panel")),
            ("width", Value::from(320)),
            ("items", Value::List(vec![Value::from(1), Value::Null])),
        ]);

        let back = Value::from_json(&value.to_json());
        assert_eq!(back, value);
    }

    #[test]
    fn test_undefined_flattens_to_null() {
        assert_eq!(Value::Undefined.to_json(), serde_json::Value::Null);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Int),
                "[a-z]{0,8}".prop_map(Value::Str),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                    prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                        .prop_map(Value::Object),
                ]
            })
        }

        proptest! {
            #[test]
            fn merge_with_self_is_identity(v in arb_value()) {
                prop_assert_eq!(v.merged_with(&v), v);
            }

            #[test]
            fn merge_keeps_every_patch_key(
                base in prop::collection::btree_map("[a-z]{1,4}", arb_value(), 0..4),
                patch in prop::collection::btree_map("[a-z]{1,4}", arb_value(), 0..4),
            ) {
                let merged = Value::Object(base).merged_with(&Value::Object(patch.clone()));
                let merged = merged.as_object().unwrap();
                for key in patch.keys() {
                    prop_assert!(merged.contains_key(key));
                }
            }
        }
    }
}
