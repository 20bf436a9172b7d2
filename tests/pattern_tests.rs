//! Pattern matching through the public matcher and its JSON entry point.

use makrell_meta::ast::value::{Object, Value};
use makrell_meta::ast::{bin, curly, ident, num, round, square, Node};
use makrell_meta::patterns::{match_json, render_match_call, FnHook, MatchEnv, PatternMatcher};
use serde_json::json;

fn list(items: &[f64]) -> Value {
    Value::List(items.iter().map(|n| Value::Number(*n)).collect())
}

fn two_to_three_threes() -> Node {
    curly(vec![
        ident("$r"),
        num("2"),
        bin(round(vec![bin(num("2"), "..", num("3"))]), "*", num("3")),
        num("5"),
    ])
}

fn point(x: f64, y: f64) -> Value {
    Value::Object(
        Object::new("Point")
            .field("x", Value::Number(x))
            .field("y", Value::Number(y))
            .match_args(["x", "y"]),
    )
}

fn point_pattern(group: Vec<Node>) -> Node {
    curly(vec![ident("$type"), ident("Point"), square(group)])
}

#[test]
fn regular_pattern_with_bounded_run() {
    let m = PatternMatcher::new();
    let pattern = two_to_three_threes();
    assert!(m.match_pattern(&list(&[2.0, 3.0, 3.0, 5.0]), &pattern));
    assert!(m.match_pattern(&list(&[2.0, 3.0, 3.0, 3.0, 5.0]), &pattern));
    assert!(!m.match_pattern(&list(&[2.0, 3.0, 5.0]), &pattern));
    assert!(!m.match_pattern(&list(&[2.0, 5.0]), &pattern));
    assert!(!m.match_pattern(&list(&[2.0, 3.0, 3.0, 3.0, 3.0, 5.0]), &pattern));
}

#[test]
fn regular_pattern_with_optional_and_rest() {
    let m = PatternMatcher::new();
    let pattern = curly(vec![
        ident("$r"),
        bin(ident("maybe"), "*", num("0")),
        num("1"),
        ident("$rest"),
    ]);
    assert!(m.match_pattern(&list(&[0.0, 1.0, 7.0, 8.0]), &pattern));
    assert!(m.match_pattern(&list(&[1.0]), &pattern));
    assert!(!m.match_pattern(&list(&[0.0, 0.0, 1.0]), &pattern));
}

#[test]
fn type_constructor_positional_and_keyword() {
    let m = PatternMatcher::new();
    let p = point(2.0, 3.0);
    assert!(m.match_pattern(&p, &point_pattern(vec![num("2"), num("3")])));
    assert!(m.match_pattern(&p, &point_pattern(vec![bin(ident("x"), "=", num("2"))])));
    assert!(!m.match_pattern(&p, &point_pattern(vec![bin(ident("x"), "=", num("3"))])));
    assert!(!m.match_pattern(&p, &point_pattern(vec![num("3"), ident("_")])));
    assert!(!m.match_pattern(&Value::Number(2.0), &point_pattern(vec![])));
}

#[test]
fn type_guard_follows_bases() {
    let m = PatternMatcher::new();
    let circle = Value::Object(Object::new("Circle").base("Shape"));
    let is_shape = bin(ident("_"), ":", ident("Shape"));
    assert!(m.match_pattern(&circle, &is_shape));
    assert!(!m.match_pattern(&point(0.0, 0.0), &is_shape));
}

#[test]
fn bindings_collect_across_a_list() {
    let m = PatternMatcher::new();
    let pattern = square(vec![
        bin(ident("head"), "=", ident("_")),
        bin(ident("tail"), "=", bin(ident("_"), ":", ident("list"))),
    ]);
    let value = Value::List(vec![Value::from("a"), list(&[1.0, 2.0])]);
    let env = m.match_with_env(&value, &pattern, MatchEnv::new()).unwrap();
    assert_eq!(env.get("head"), Some(&Value::from("a")));
    assert_eq!(env.get("tail"), Some(&list(&[1.0, 2.0])));
}

#[test]
fn value_expressions_compare_against_the_scrutinee() {
    let m = PatternMatcher::new();
    let between = bin(
        bin(ident("$"), ">=", num("10")),
        "&&",
        bin(ident("$"), "<", num("20")),
    );
    assert!(m.match_pattern(&Value::Number(15.0), &between));
    assert!(!m.match_pattern(&Value::Number(25.0), &between));
}

#[test]
fn hooks_take_precedence_over_builtin_forms() {
    let mut m = PatternMatcher::new();
    let pattern = curly(vec![ident("$r"), num("1")]);
    assert!(!m.match_pattern(&list(&[9.0]), &pattern));

    m.register_hook(FnHook::new(
        "anything-regular",
        |p| p.is_curly_headed("$r"),
        |_, _, env, _| Some(env),
    ));
    assert!(m.match_pattern(&list(&[9.0]), &pattern));

    m.clear_hooks();
    assert!(!m.match_pattern(&list(&[9.0]), &pattern));
}

#[test]
fn newest_hook_wins_and_can_delegate() {
    let mut m = PatternMatcher::new();
    m.register_hook(FnHook::new("never", |p| p.is_curly_headed("$pair"), |_, _, _, _| None));
    m.register_hook(FnHook::new(
        "pair",
        |p| p.is_curly_headed("$pair"),
        |value, pattern, env, next| {
            let items = value.as_list()?;
            let sub = pattern.children()?.get(1)?;
            if items.len() != 2 {
                return None;
            }
            let env = next(&items[0], sub, env)?;
            next(&items[1], sub, env)
        },
    ));
    assert_eq!(m.hook_names().collect::<Vec<_>>(), vec!["pair", "never"]);

    let pattern = curly(vec![ident("$pair"), bin(ident("_"), ":", ident("int"))]);
    assert!(m.match_pattern(&list(&[1.0, 2.0]), &pattern));
    assert!(!m.match_pattern(&list(&[1.0, 2.5]), &pattern));
    assert!(!m.match_pattern(&list(&[1.0]), &pattern));
}

#[test]
fn json_objects_carry_type_metadata() {
    let m = PatternMatcher::new();
    let value = json!({"__ctor__": "Point", "__match_args__": ["x", "y"], "x": 2, "y": 3});
    let pattern = serde_json::to_value(point_pattern(vec![num("2"), num("3")])).unwrap();
    assert!(match_json(&m, &value, &pattern).unwrap());
    let pattern = serde_json::to_value(point_pattern(vec![bin(ident("y"), "=", num("4"))])).unwrap();
    assert!(!match_json(&m, &value, &pattern).unwrap());
}

#[test]
fn rendered_match_call_embeds_a_readable_pattern() {
    let pattern = two_to_three_threes();
    let call = render_match_call("xs", &pattern).unwrap();
    let json_text = call
        .strip_prefix("__mr_matchPattern(xs, ")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap();
    let embedded: serde_json::Value = serde_json::from_str(json_text).unwrap();
    let m = PatternMatcher::new();
    assert!(match_json(&m, &json!([2, 3, 3, 5]), &embedded).unwrap());
}
