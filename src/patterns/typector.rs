//! `{$type Name [positional…] [key=pattern…]}` and the `_:Name` guard.

use crate::ast::value::Value;
use crate::ast::Node;
use crate::patterns::{MatchEnv, PatternMatcher};

/// True if `value` is of the named type.
///
/// Primitive names come first (`str`/`string`, `int`, `float`/`number`,
/// `bool`/`boolean`, `list`/`array`, `dict`/`object`), then the object's
/// constructor name, then the names of its declared bases.
///
/// ```rust
/// use makrell_meta::ast::value::{Object, Value};
/// use makrell_meta::patterns::check_type;
/// assert!(check_type(&Value::Number(2.0), "int"));
/// assert!(!check_type(&Value::Number(2.5), "int"));
/// let circle = Value::Object(Object::new("Circle").base("Shape"));
/// assert!(check_type(&circle, "Circle"));
/// assert!(check_type(&circle, "Shape"));
/// assert!(check_type(&circle, "dict"));
/// ```
pub fn check_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "str" | "string" => matches!(value, Value::String(_)),
        "int" => matches!(value, Value::Number(n) if n.is_finite() && n.fract() == 0.0),
        "float" | "number" => matches!(value, Value::Number(_)),
        "bool" | "boolean" => matches!(value, Value::Bool(_)),
        "list" | "array" => matches!(value, Value::List(_)),
        "dict" | "object" => matches!(value, Value::Object(_)),
        _ => match value {
            Value::Object(obj) => obj.ctor_name() == type_name || obj.bases.iter().any(|b| b == type_name),
            Value::List(_) => type_name == "Array",
            _ => false,
        },
    }
}

pub(crate) fn match_type_ctor(
    matcher: &PatternMatcher,
    value: &Value,
    pattern: &[Node],
    env: MatchEnv,
) -> Option<MatchEnv> {
    let type_name = pattern.get(1)?.as_ident()?;
    if !check_type(value, type_name) {
        return None;
    }
    if !matches!(value, Value::Object(_) | Value::List(_)) {
        return Some(env);
    }

    let mut positional: Option<&[Node]> = None;
    let mut keywords: Vec<(&str, &Node)> = Vec::new();
    for group in &pattern[2..] {
        let Node::Square { nodes, .. } = group else {
            return None;
        };
        if nodes.is_empty() {
            continue;
        }
        let all_kw = nodes.iter().all(|n| keyword(n).is_some());
        let any_kw = nodes.iter().any(|n| matches!(n, Node::Binop { op, .. } if op == "="));
        if any_kw && !all_kw {
            return None;
        }
        if all_kw {
            keywords.extend(nodes.iter().filter_map(keyword));
            continue;
        }
        if positional.is_some() {
            return None;
        }
        positional = Some(&nodes[..]);
    }

    if let Some(patterns) = positional {
        let names = positional_names(value);
        if names.len() < patterns.len() {
            return None;
        }
        for (name, sub) in names.iter().zip(patterns) {
            matcher.match_with_env(&field(value, name), sub, env.clone())?;
        }
    }
    for (name, sub) in keywords {
        matcher.match_with_env(&field(value, name), sub, env.clone())?;
    }
    Some(env)
}

fn keyword(node: &Node) -> Option<(&str, &Node)> {
    match node {
        Node::Binop {
            left, op, right, ..
        } if op == "=" => Some((left.as_ident()?, right.as_ref())),
        _ => None,
    }
}

/// Lists destructure by index.
fn positional_names(value: &Value) -> Vec<String> {
    match value {
        Value::Object(obj) => obj.positional_fields().into_iter().map(str::to_string).collect(),
        Value::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Missing fields read as `null`.
fn field(value: &Value, name: &str) -> Value {
    match (value, name.parse::<usize>()) {
        (Value::List(items), Ok(i)) => items.get(i).cloned().unwrap_or_default(),
        _ => value.member(name),
    }
}
