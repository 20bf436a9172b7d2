//! The base environment every macro invocation starts from.
//!
//! Helpers that take list arguments are lenient in the host language's way:
//! a non-list usually yields an empty list, `0` or `null` rather than an error.

use std::rc::Rc;

use crate::ast::{bin, curly, ident, num, op, round, sequence, square, string, Node};
use crate::runtime::env::Env;
use crate::runtime::eval::EvalResult;
use crate::runtime::value::{MacroValue, NativeFn};
use crate::err_msg;

fn arg(args: &[MacroValue], i: usize) -> MacroValue {
    args.get(i).cloned().unwrap_or_default()
}

fn bind(env: &Rc<Env>, native: NativeFn) {
    let name = native.name.clone();
    env.define(&name, MacroValue::Native(Rc::new(native)));
}

/// Node kinds by constructor tag. `Node` tags every kind.
const NODE_TAGS: &[(&str, &str)] = &[
    ("Identifier", "identifier"),
    ("Number", "number"),
    ("String", "string"),
    ("Operator", "operator"),
    ("BinOp", "binop"),
    ("RoundBrackets", "round"),
    ("SquareBrackets", "square"),
    ("CurlyBrackets", "curly"),
    ("Sequence", "sequence"),
];

/// A fresh root environment holding the builtins.
pub fn base_env() -> Rc<Env> {
    let env = Env::root();

    bind(&env, NativeFn::new("regular", |ev, args| {
        let nodes = arg(&args, 0).node_items();
        Ok(MacroValue::from_nodes(ev.context().regular(nodes)))
    }));
    bind(&env, NativeFn::new("operator_parse", |ev, args| {
        let nodes = arg(&args, 0).node_items();
        Ok(MacroValue::from_nodes(ev.context().operator_parse(&nodes)?))
    }));
    bind(&env, NativeFn::new("parse", |ev, args| match arg(&args, 0) {
        MacroValue::Str(src) => Ok(MacroValue::from_nodes(ev.context().parse(&src)?)),
        _ => Err(err_msg!(Type, "parse expects string").into()),
    }));

    bind(&env, NativeFn::new("len", |_, args| {
        Ok(MacroValue::Num(match arg(&args, 0) {
            MacroValue::List(items) => items.borrow().len() as f64,
            MacroValue::Str(s) => s.chars().count() as f64,
            _ => 0.0,
        }))
    }));
    bind(&env, NativeFn::new("str", |_, args| Ok(MacroValue::Str(arg(&args, 0).to_string()))));
    bind(&env, NativeFn::new("int", |_, args| {
        Ok(MacroValue::Num(parse_int_prefix(&arg(&args, 0).to_string())))
    }));
    bind(&env, NativeFn::new("float", |_, args| {
        Ok(MacroValue::Num(parse_float_prefix(&arg(&args, 0).to_string())))
    }));

    bind(&env, NativeFn::new("list", |_, args| {
        Ok(MacroValue::list(list_items(&arg(&args, 0))))
    }));
    bind(&env, NativeFn::new("first", |_, args| {
        Ok(list_items(&arg(&args, 0)).into_iter().next().unwrap_or_default())
    }));
    bind(&env, NativeFn::new("rest", |_, args| {
        Ok(MacroValue::list(list_items(&arg(&args, 0)).into_iter().skip(1).collect()))
    }));
    bind(&env, NativeFn::new("reversed", |_, args| {
        let mut items = list_items(&arg(&args, 0));
        items.reverse();
        Ok(MacroValue::list(items))
    }));
    bind(&env, NativeFn::new("push", |_, args| match arg(&args, 0) {
        MacroValue::List(items) => {
            items.borrow_mut().push(arg(&args, 1));
            Ok(MacroValue::Num(items.borrow().len() as f64))
        }
        _ => Ok(MacroValue::Num(0.0)),
    }));
    bind(&env, NativeFn::new("pop", |_, args| match arg(&args, 0) {
        MacroValue::List(items) => Ok(items.borrow_mut().pop().unwrap_or_default()),
        _ => Ok(MacroValue::Null),
    }));
    bind(&env, NativeFn::new("range", |_, args| {
        let (start, end) = match args.get(1) {
            Some(end) => (to_number(&arg(&args, 0)), to_number(end)),
            None => (0.0, to_number(&arg(&args, 0))),
        };
        let mut out = Vec::new();
        let mut i = start;
        while i < end {
            out.push(MacroValue::Num(i));
            i += 1.0;
        }
        Ok(MacroValue::list(out))
    }));
    bind(&env, NativeFn::new("map", |ev, args| {
        let f = arg(&args, 0);
        let items = arg(&args, 1);
        let (true, Some(items)) = (f.is_callable(), items.as_list()) else {
            return Ok(MacroValue::list(Vec::new()));
        };
        let snapshot: Vec<MacroValue> = items.borrow().clone();
        let mapped = snapshot
            .into_iter()
            .map(|item| ev.call(&f, vec![item]))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(MacroValue::list(mapped))
    }));

    bind(&env, NativeFn::new("print", |_, args| {
        let line = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
        // stdout belongs to the runner protocol.
        eprintln!("{}", line);
        Ok(MacroValue::Null)
    }));
    bind(&env, NativeFn::new("assert", |_, args| {
        if arg(&args, 0).is_truthy() {
            return Ok(MacroValue::Null);
        }
        let message = match args.get(1) {
            Some(msg) if msg.is_truthy() => msg.to_string(),
            _ => "Macro assertion failed".to_string(),
        };
        Err(err_msg!(Assertion, "{}", message).into())
    }));
    bind(&env, NativeFn::new("isinstance", |_, args| {
        Ok(MacroValue::Bool(is_instance(&arg(&args, 0), &arg(&args, 1))))
    }));

    bind_node_ctors(&env);
    env
}

fn bind_node_ctors(env: &Rc<Env>) {
    bind(env, NativeFn::node_ctor("Identifier", |_, args| {
        Ok(MacroValue::Node(ident(arg(&args, 0).to_string())))
    }));
    bind(env, NativeFn::node_ctor("Number", |_, args| {
        Ok(MacroValue::Node(num(arg(&args, 0).to_string())))
    }));
    bind(env, NativeFn::node_ctor("String", |_, args| {
        Ok(MacroValue::Node(string(arg(&args, 0).to_string())))
    }));
    bind(env, NativeFn::node_ctor("Operator", |_, args| {
        Ok(MacroValue::Node(op(arg(&args, 0).to_string())))
    }));
    bind(env, NativeFn::node_ctor("BinOp", |_, args| {
        let left = arg(&args, 0).to_node()?;
        let right = arg(&args, 2).to_node()?;
        Ok(MacroValue::Node(bin(left, arg(&args, 1).to_string(), right)))
    }));

    type BracketCtor = fn(Vec<Node>) -> Node;
    let brackets: [(&'static str, BracketCtor); 4] = [
        ("RoundBrackets", round),
        ("SquareBrackets", square),
        ("CurlyBrackets", curly),
        ("Sequence", sequence),
    ];
    for (tag, build) in brackets {
        bind(env, NativeFn::node_ctor(tag, move |_, args| {
            Ok(MacroValue::Node(build(arg(&args, 0).node_items())))
        }));
    }
}

fn is_instance(value: &MacroValue, typ: &MacroValue) -> bool {
    let MacroValue::Node(node) = value else {
        return false;
    };
    let tag = match typ {
        MacroValue::Native(native) => native.node_ctor,
        MacroValue::Str(name) => NODE_TAGS
            .iter()
            .map(|(tag, _)| *tag)
            .chain(std::iter::once("Node"))
            .find(|tag| *tag == name.as_str()),
        _ => None,
    };
    match tag {
        Some("Node") => true,
        Some(tag) => NODE_TAGS
            .iter()
            .any(|(t, kind)| *t == tag && *kind == node.kind_name()),
        None => false,
    }
}

fn list_items(value: &MacroValue) -> Vec<MacroValue> {
    match value {
        MacroValue::List(items) => items.borrow().clone(),
        _ => Vec::new(),
    }
}

fn to_number(value: &MacroValue) -> f64 {
    match value {
        MacroValue::Num(n) => *n,
        MacroValue::Bool(b) => f64::from(u8::from(*b)),
        MacroValue::Null => 0.0,
        MacroValue::Str(s) => crate::ast::parse_number_text(s),
        _ => f64::NAN,
    }
}

/// Leading base-10 integer of `text`, NaN if there is none.
pub fn parse_int_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return f64::NAN;
    }
    digits[..end].parse::<f64>().map_or(f64::NAN, |n| sign * n)
}

/// Longest leading decimal literal of `text`, NaN if there is none.
pub fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && trimmed.len() - unsigned.len() <= 1 {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    trimmed[..end].parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::{DefaultMacroContext, MacroRegistry};
    use crate::runtime::eval::{Evaluator, Unwind};

    fn call(name: &str, args: Vec<MacroValue>) -> MacroValue {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        let f = base_env().get(name).unwrap();
        ev.call(&f, args).map_err(Unwind::into_error).unwrap()
    }

    #[test]
    fn numeric_prefix_parsing_matches_the_host() {
        assert_eq!(parse_int_prefix("  42px"), 42.0);
        assert_eq!(parse_int_prefix("-7.9"), -7.0);
        assert!(parse_int_prefix("px").is_nan());
        assert_eq!(parse_float_prefix("2.5e2x"), 250.0);
        assert_eq!(parse_float_prefix(".5"), 0.5);
        assert!(parse_float_prefix(".").is_nan());
    }

    #[test]
    fn range_has_one_and_two_argument_forms() {
        let one = call("range", vec![MacroValue::Num(3.0)]);
        assert_eq!(one.to_string(), "0,1,2");
        let two = call("range", vec![MacroValue::Num(2.0), MacroValue::Num(4.0)]);
        assert_eq!(two.to_string(), "2,3");
    }

    #[test]
    fn push_mutates_the_shared_list() {
        let list = MacroValue::list(vec![]);
        let len = call("push", vec![list.clone(), MacroValue::Num(1.0)]);
        assert_eq!(len.as_num(), Some(1.0));
        assert_eq!(list.to_string(), "1");
    }

    #[test]
    fn isinstance_accepts_constructor_values_and_names() {
        let env = base_env();
        let node = MacroValue::Node(num("1"));
        let number_ctor = env.get("Number").unwrap();
        assert!(is_instance(&node, &number_ctor));
        assert!(is_instance(&node, &MacroValue::str("Node")));
        assert!(!is_instance(&node, &env.get("Identifier").unwrap()));
        assert!(!is_instance(&MacroValue::Num(1.0), &number_ctor));
    }

    #[test]
    fn failed_assert_reports_the_message() {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        let f = base_env().get("assert").unwrap();
        let err = ev
            .call(&f, vec![MacroValue::Bool(false), MacroValue::str("nope")])
            .map_err(Unwind::into_error)
            .unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Assertion);
        assert_eq!(err.to_string(), "nope");
    }
}
