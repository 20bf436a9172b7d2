use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::format_number;

/// A run-time value as seen by the pattern matcher.
///
/// This mirrors what the generated program hands to the injected matcher:
/// primitives, arrays, and objects that may carry a constructor name, the
/// names of their base types and an explicit positional field order.
///
/// # Examples
///
/// ```rust
/// use makrell_meta::ast::value::{Object, Value};
/// let point = Value::Object(
///     Object::new("Point")
///         .field("x", Value::Number(2.0))
///         .field("y", Value::Number(3.0)),
/// );
/// assert_eq!(point.type_name(), "Point");
/// assert!(point.is_truthy());
/// assert!(!Value::String(String::new()).is_truthy());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Object(Object),
}

/// An object value with ordered fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Object {
    /// Constructor name; plain dictionaries have none.
    pub ctor: Option<String>,
    /// Names of the types this object's constructor derives from.
    pub bases: Vec<String>,
    /// Fields in declaration order.
    pub fields: Vec<(String, Value)>,
    /// Explicit positional field order (`__match_args__`).
    pub match_args: Option<Vec<String>>,
}

const CTOR_KEY: &str = "__ctor__";
const BASES_KEY: &str = "__bases__";
const MATCH_ARGS_KEY: &str = "__match_args__";

impl Object {
    pub fn new(ctor: impl Into<String>) -> Self {
        Self {
            ctor: Some(ctor.into()),
            ..Self::default()
        }
    }

    /// A plain dictionary (no constructor).
    pub fn dict() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.bases.push(name.into());
        self
    }

    pub fn match_args<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_args = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// The constructor name the host would report; dictionaries are `Object`.
    pub fn ctor_name(&self) -> &str {
        self.ctor.as_deref().unwrap_or("Object")
    }

    /// Field names used for positional destructuring: `__match_args__` if
    /// declared, otherwise the object's own key order.
    pub fn positional_fields(&self) -> Vec<&str> {
        match &self.match_args {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => self.fields.iter().map(|(k, _)| k.as_str()).collect(),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Object(obj) => obj.ctor_name(),
        }
    }

    /// Truthiness of the generated program's host language.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Object(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Reads a member the way `value.name` would in the generated program.
    pub fn member(&self, name: &str) -> Value {
        match (self, name) {
            (Value::Object(obj), _) => obj.get(name).cloned().unwrap_or_default(),
            (Value::List(items), "length") => Value::Number(items.len() as f64),
            (Value::String(s), "length") => Value::Number(s.chars().count() as f64),
            _ => Value::Null,
        }
    }

    /// Builds a value from JSON. Objects may carry `__ctor__`, `__bases__`
    /// and `__match_args__` keys.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => {
                let mut obj = Object::dict();
                for (key, val) in map {
                    match key.as_str() {
                        CTOR_KEY => obj.ctor = val.as_str().map(str::to_string),
                        BASES_KEY => obj.bases = string_list(val),
                        MATCH_ARGS_KEY => obj.match_args = Some(string_list(val)),
                        _ => obj.fields.push((key.clone(), Value::from_json(val))),
                    }
                }
                Value::Object(obj)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::from(*n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(obj) => {
                let mut map = serde_json::Map::new();
                if let Some(ctor) = &obj.ctor {
                    map.insert(CTOR_KEY.to_string(), ctor.clone().into());
                }
                if !obj.bases.is_empty() {
                    map.insert(BASES_KEY.to_string(), obj.bases.clone().into());
                }
                if let Some(args) = &obj.match_args {
                    map.insert(MATCH_ARGS_KEY.to_string(), args.clone().into());
                }
                for (key, val) in &obj.fields {
                    map.insert(key.clone(), val.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Display formatting helpers
    // ------------------------------------------------------------------------

    fn fmt_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }

    fn fmt_object(f: &mut fmt::Formatter<'_>, obj: &Object) -> fmt::Result {
        if let Some(ctor) = &obj.ctor {
            write!(f, "{} ", ctor)?;
        }
        write!(f, "{{")?;
        for (i, (k, v)) in obj.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

fn string_list(json: &serde_json::Value) -> Vec<String> {
    json.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|x| x.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => Value::fmt_list(f, items),
            Value::Object(obj) => Value::fmt_object(f, obj),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_objects_keep_constructor_metadata_and_key_order() {
        let json = serde_json::json!({
            "__ctor__": "Point",
            "__bases__": ["Shape"],
            "y": 3,
            "x": 2
        });
        let value = Value::from_json(&json);
        let obj = value.as_object().unwrap();
        assert_eq!(obj.ctor_name(), "Point");
        assert_eq!(obj.bases, vec!["Shape".to_string()]);
        assert_eq!(obj.positional_fields(), vec!["y", "x"]);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn member_reads_follow_host_semantics() {
        let list = Value::List(vec![Value::Null, Value::Null]);
        assert_eq!(list.member("length"), Value::Number(2.0));
        assert_eq!(Value::Number(1.0).member("length"), Value::Null);
    }
}
