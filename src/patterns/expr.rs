//! Value-level pattern expressions, e.g. `$ > 2 && $ < 10`.
//!
//! `$` is the scrutinee. Identifiers other than `true`/`false`/`null` are
//! string literals, so `$.name` reads the member called `name`. Operators
//! follow the generated program's semantics; an unknown operator is `false`.

use std::cmp::Ordering;

use crate::ast::format_number;
use crate::ast::value::Value;
use crate::ast::Node;

pub fn eval_with_value(node: &Node, value: &Value) -> Value {
    match node {
        Node::Identifier { value: name, .. } => match name.as_str() {
            "$" => value.clone(),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            other => Value::String(other.to_string()),
        },
        Node::Number { .. } => Value::Number(node.number_value().unwrap_or(f64::NAN)),
        Node::String { value: text, .. } => Value::String(text.clone()),
        Node::Binop {
            left, op, right, ..
        } => {
            let l = eval_with_value(left, value);
            let r = eval_with_value(right, value);
            apply(op, &l, &r)
        }
        Node::Round { nodes, .. } if nodes.len() == 1 => eval_with_value(&nodes[0], value),
        Node::Round { nodes, .. } | Node::Square { nodes, .. } => {
            Value::List(nodes.iter().map(|n| eval_with_value(n, value)).collect())
        }
        _ => Value::Null,
    }
}

fn apply(op: &str, l: &Value, r: &Value) -> Value {
    match op {
        "==" => Value::Bool(l == r),
        "!=" => Value::Bool(l != r),
        "<" => Value::Bool(compare(l, r) == Some(Ordering::Less)),
        "<=" => Value::Bool(matches!(compare(l, r), Some(Ordering::Less | Ordering::Equal))),
        ">" => Value::Bool(compare(l, r) == Some(Ordering::Greater)),
        ">=" => Value::Bool(matches!(compare(l, r), Some(Ordering::Greater | Ordering::Equal))),
        "+" => match (l, r) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", text(l), text(r)))
            }
            _ => Value::Number(number(l) + number(r)),
        },
        "-" => Value::Number(number(l) - number(r)),
        "*" => Value::Number(number(l) * number(r)),
        "/" => Value::Number(number(l) / number(r)),
        "%" => Value::Number(number(l) % number(r)),
        "&&" => Value::Bool(l.is_truthy() && r.is_truthy()),
        "||" => Value::Bool(l.is_truthy() || r.is_truthy()),
        "." => l.member(&text(r)),
        _ => Value::Bool(false),
    }
}

/// Numbers compare numerically and strings lexically; anything else is
/// unordered.
fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => number(l).partial_cmp(&number(r)),
    }
}

/// Numeric coercion: `null` and `false` are 0, `true` is 1, numeric strings
/// parse, everything else is NaN.
fn number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => *n,
        Value::Null | Value::Bool(false) => 0.0,
        Value::Bool(true) => 1.0,
        Value::String(s) => crate::ast::parse_number_text(s),
        Value::List(_) | Value::Object(_) => f64::NAN,
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::value::Object;
    use crate::ast::{bin, ident, num, round, string};

    #[test]
    fn arithmetic_and_comparison_over_the_scrutinee() {
        let expr = bin(bin(ident("$"), "*", num("2")), ">", num("5"));
        assert_eq!(eval_with_value(&expr, &Value::Number(3.0)), Value::Bool(true));
        assert_eq!(eval_with_value(&expr, &Value::Number(2.0)), Value::Bool(false));
    }

    #[test]
    fn member_access_uses_identifier_text() {
        let obj = Value::Object(Object::new("P").field("name", Value::from("ann")));
        let expr = bin(bin(ident("$"), ".", ident("name")), "==", string("ann"));
        assert_eq!(eval_with_value(&expr, &obj), Value::Bool(true));
        let len = bin(ident("$"), ".", ident("length"));
        assert_eq!(eval_with_value(&len, &Value::from("abc")), Value::Number(3.0));
    }

    #[test]
    fn grouping_and_unknown_operators() {
        let grouped = round(vec![bin(ident("$"), "+", num("1"))]);
        assert_eq!(eval_with_value(&grouped, &Value::Number(1.0)), Value::Number(2.0));
        assert_eq!(eval_with_value(&bin(num("1"), "**", num("2")), &Value::Null), Value::Bool(false));
        assert_eq!(eval_with_value(&bin(string("a"), "+", num("1")), &Value::Null), Value::from("a1"));
    }
}
