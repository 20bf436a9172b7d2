//! Member access on macro-time values (`recv.name`, `{recv.method args…}`).
//!
//! Nodes expose their fields; lists and strings expose `length` and a subset
//! of the host's array and string methods. Methods come back as natives bound
//! to their receiver, so list methods mutate the shared list.

use std::rc::Rc;

use crate::ast::Node;
use crate::runtime::value::{ListRef, MacroValue};

/// Looks up `name` on `receiver`; `None` if there is no such member.
pub fn get_member(receiver: &MacroValue, name: &str) -> Option<MacroValue> {
    match receiver {
        MacroValue::Node(node) => node_field(node, name),
        MacroValue::List(items) => list_member(items, name),
        MacroValue::Str(s) => str_member(s, name),
        _ => None,
    }
}

fn node_field(node: &Node, name: &str) -> Option<MacroValue> {
    match (name, node) {
        ("kind", _) => Some(MacroValue::str(node.kind_name())),
        (
            "value",
            Node::Identifier { value, .. }
            | Node::String { value, .. }
            | Node::Number { value, .. }
            | Node::Operator { value, .. },
        ) => Some(MacroValue::str(value.clone())),
        ("op", Node::Binop { op, .. }) => Some(MacroValue::str(op.clone())),
        ("left", Node::Binop { left, .. }) => Some(MacroValue::Node(left.as_ref().clone())),
        ("right", Node::Binop { right, .. }) => Some(MacroValue::Node(right.as_ref().clone())),
        ("nodes", _) => node.children().map(|c| MacroValue::from_nodes(c.to_vec())),
        _ => None,
    }
}

fn arg(args: &[MacroValue], i: usize) -> MacroValue {
    args.get(i).cloned().unwrap_or_default()
}

/// Resolves a host-style slice bound: negatives count from the end.
fn slice_bound(value: Option<&MacroValue>, len: usize, default: usize) -> usize {
    match value.and_then(MacroValue::as_num) {
        Some(n) if n.is_nan() => 0,
        Some(n) if n < 0.0 => len.saturating_sub((-n) as usize),
        Some(n) => (n as usize).min(len),
        None => default,
    }
}

type ListMethod = fn(&ListRef, Vec<MacroValue>) -> MacroValue;
type StrMethod = fn(&str, Vec<MacroValue>) -> MacroValue;

fn bind_list(items: &ListRef, name: &str, f: ListMethod) -> MacroValue {
    let list = Rc::clone(items);
    MacroValue::native(name, move |_, args| Ok(f(&list, args)))
}

fn bind_str(text: &str, name: &str, f: StrMethod) -> MacroValue {
    let text = text.to_string();
    MacroValue::native(name, move |_, args| Ok(f(&text, args)))
}

fn list_member(items: &ListRef, name: &str) -> Option<MacroValue> {
    let method = |f: ListMethod| bind_list(items, name, f);
    match name {
        "length" => Some(MacroValue::Num(items.borrow().len() as f64)),
        "push" => Some(method(|list, args| {
            list.borrow_mut().extend(args);
            MacroValue::Num(list.borrow().len() as f64)
        })),
        "pop" => Some(method(|list, _| list.borrow_mut().pop().unwrap_or_default())),
        "slice" => Some(method(|list, args| {
            let items = list.borrow();
            let start = slice_bound(args.first(), items.len(), 0);
            let end = slice_bound(args.get(1), items.len(), items.len());
            MacroValue::list(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        })),
        "concat" => Some(method(|list, args| {
            let mut out = list.borrow().clone();
            for extra in args {
                match extra {
                    MacroValue::List(more) => out.extend(more.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            MacroValue::list(out)
        })),
        "includes" => Some(method(|list, args| {
            let wanted = arg(&args, 0);
            MacroValue::Bool(list.borrow().iter().any(|x| x.strict_eq(&wanted)))
        })),
        "indexOf" => Some(method(|list, args| {
            let wanted = arg(&args, 0);
            let pos = list.borrow().iter().position(|x| x.strict_eq(&wanted));
            MacroValue::Num(pos.map_or(-1.0, |p| p as f64))
        })),
        "join" => Some(method(|list, args| {
            let sep = match args.first() {
                Some(MacroValue::Str(s)) => s.clone(),
                _ => ",".to_string(),
            };
            let parts: Vec<String> = list
                .borrow()
                .iter()
                .map(|x| match x {
                    MacroValue::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            MacroValue::Str(parts.join(&sep))
        })),
        "reverse" => Some(method(|list, _| {
            list.borrow_mut().reverse();
            MacroValue::List(Rc::clone(list))
        })),
        _ => None,
    }
}

fn str_member(s: &str, name: &str) -> Option<MacroValue> {
    let method = |f: StrMethod| bind_str(s, name, f);
    match name {
        "length" => Some(MacroValue::Num(s.chars().count() as f64)),
        "toUpperCase" => Some(method(|s, _| MacroValue::str(s.to_uppercase()))),
        "toLowerCase" => Some(method(|s, _| MacroValue::str(s.to_lowercase()))),
        "startsWith" => Some(method(|s, args| MacroValue::Bool(s.starts_with(&text_arg(&args))))),
        "endsWith" => Some(method(|s, args| MacroValue::Bool(s.ends_with(&text_arg(&args))))),
        "includes" => Some(method(|s, args| MacroValue::Bool(s.contains(&text_arg(&args))))),
        "split" => Some(method(|s, args| {
            let parts: Vec<MacroValue> = match args.first() {
                None | Some(MacroValue::Null) => vec![MacroValue::str(s)],
                Some(_) => {
                    let sep = text_arg(&args);
                    if sep.is_empty() {
                        s.chars().map(|c| MacroValue::Str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(MacroValue::str).collect()
                    }
                }
            };
            MacroValue::list(parts)
        })),
        "slice" => Some(method(|s, args| {
            let chars: Vec<char> = s.chars().collect();
            let start = slice_bound(args.first(), chars.len(), 0);
            let end = slice_bound(args.get(1), chars.len(), chars.len());
            MacroValue::Str(chars.get(start..end.max(start)).unwrap_or_default().iter().collect())
        })),
        _ => None,
    }
}

fn text_arg(args: &[MacroValue]) -> String {
    match args.first() {
        Some(MacroValue::Str(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{bin, ident, num, square};
    use crate::macros::{DefaultMacroContext, MacroRegistry};
    use crate::runtime::eval::{Evaluator, Unwind};

    fn invoke(receiver: &MacroValue, method: &str, args: Vec<MacroValue>) -> MacroValue {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        let f = get_member(receiver, method).unwrap();
        ev.call(&f, args).map_err(Unwind::into_error).unwrap()
    }

    #[test]
    fn node_fields_are_readable() {
        let node = MacroValue::Node(bin(ident("a"), "+", num("1")));
        assert_eq!(get_member(&node, "op").unwrap().to_string(), "+");
        assert_eq!(get_member(&node, "kind").unwrap().to_string(), "binop");
        assert_eq!(get_member(&node, "left").unwrap().to_node().unwrap(), ident("a"));
        assert!(get_member(&node, "nodes").is_none());

        let list = MacroValue::Node(square(vec![num("1"), num("2")]));
        let nodes = get_member(&list, "nodes").unwrap();
        assert_eq!(nodes.as_node_list().unwrap(), vec![num("1"), num("2")]);
    }

    #[test]
    fn bound_list_methods_share_the_receiver() {
        let list = MacroValue::list(vec![MacroValue::Num(1.0)]);
        invoke(&list, "push", vec![MacroValue::Num(2.0)]);
        assert_eq!(get_member(&list, "length").unwrap().as_num(), Some(2.0));
        let popped = invoke(&list, "pop", vec![]);
        assert_eq!(popped.as_num(), Some(2.0));
        let sliced = invoke(&list, "slice", vec![MacroValue::Num(-1.0)]);
        assert_eq!(sliced.to_string(), "1");
    }

    #[test]
    fn string_methods() {
        let s = MacroValue::str("a-b-c");
        assert_eq!(invoke(&s, "split", vec![MacroValue::str("-")]).to_string(), "a,b,c");
        assert_eq!(invoke(&s, "toUpperCase", vec![]).to_string(), "A-B-C");
        assert_eq!(invoke(&s, "slice", vec![MacroValue::Num(2.0)]).to_string(), "b-c");
        assert!(get_member(&s, "frobnicate").is_none());
    }
}
