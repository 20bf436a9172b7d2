//! Program expansion with user-defined macros.

mod common;

use common::{call, def_macro, quote, unq};
use makrell_meta::ast::{bin, ident, num, round, square, Node};
use makrell_meta::config::MetaConfig;
use makrell_meta::macros::{Expander, Expansion, MacroRegistry};
use makrell_meta::meta::{runtime_from_config, InProcessMetaRuntime};
use makrell_meta::ErrorType;

fn inc_def() -> Node {
    def_macro(
        "inc",
        &["ns"],
        vec![
            bin(ident("n"), "=", bin(call("regular", vec![ident("ns")]), "@", num("0"))),
            quote(vec![bin(unq(ident("n")), "+", num("1"))]),
        ],
    )
}

#[test]
fn defined_macro_expands_at_its_call_site() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let out = expander
        .expand_program(&[inc_def(), bin(ident("x"), "=", call("inc", vec![num("41")]))])
        .unwrap();
    assert_eq!(out, vec![bin(ident("x"), "=", bin(num("41"), "+", num("1")))]);
}

#[test]
fn calls_inside_brackets_are_expanded() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let program = [
        inc_def(),
        square(vec![call("inc", vec![num("1")]), round(vec![call("inc", vec![num("2")])])]),
    ];
    let out = expander.expand_program(&program).unwrap();
    assert_eq!(
        out,
        vec![square(vec![
            bin(num("1"), "+", num("1")),
            round(vec![bin(num("2"), "+", num("1"))]),
        ])]
    );
}

#[test]
fn expansions_are_expanded_again() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let twice = def_macro(
        "twice",
        &["ns"],
        vec![quote(vec![call("inc", vec![call("inc", vec![unq(ident("ns"))])])])],
    );
    let out = expander
        .expand_program(&[inc_def(), twice, call("twice", vec![num("5")])])
        .unwrap();
    assert_eq!(out, vec![bin(bin(num("5"), "+", num("1")), "+", num("1"))]);
}

#[test]
fn macros_call_earlier_macros_by_name() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let wrap = def_macro("wrap", &["ns"], vec![call("inc", vec![num("9")])]);
    let out = expander
        .expand_program(&[inc_def(), wrap, call("wrap", vec![])])
        .unwrap();
    assert_eq!(out, vec![bin(num("9"), "+", num("1"))]);
}

#[test]
fn use_before_definition_is_left_alone() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let early = call("inc", vec![num("1")]);
    let out = expander.expand_program(&[early.clone(), inc_def()]).unwrap();
    assert_eq!(out, vec![early]);
}

#[test]
fn statement_expansions_splice_into_the_block() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let both = def_macro(
        "both",
        &["a", "b"],
        vec![quote(vec![unq(ident("b")), unq(ident("a"))])],
    );
    let out = expander
        .expand_program(&[both, call("both", vec![ident("x"), ident("y")]), ident("z")])
        .unwrap();
    assert_eq!(out, vec![ident("y"), ident("x"), ident("z")]);
}

#[test]
fn macro_errors_carry_their_kind() {
    let runtime = InProcessMetaRuntime::new();
    let mut expander = Expander::new(&runtime);
    let broken = def_macro("broken", &["ns"], vec![ident("undefined_thing")]);
    let err = expander
        .expand_program(&[broken, call("broken", vec![])])
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Scope);
}

#[test]
fn native_and_makrell_macros_share_a_registry() {
    let runtime = InProcessMetaRuntime::new();
    let mut registry = MacroRegistry::new();
    registry.register_native("zero", |_, _| Ok(Expansion::Node(num("0"))));
    let mut expander = Expander::new(&runtime).with_registry(registry);
    let uses_native = def_macro(
        "plus_zero",
        &["ns"],
        vec![
            bin(ident("x"), "=", call("first", vec![ident("ns")])),
            bin(ident("z"), "=", call("zero", vec![])),
            quote(vec![bin(unq(ident("x")), "+", unq(ident("z")))]),
        ],
    );
    let out = expander
        .expand_program(&[uses_native, call("plus_zero", vec![ident("a")])])
        .unwrap();
    assert_eq!(out, vec![bin(ident("a"), "+", num("0"))]);
    assert_eq!(expander.into_registry().len(), 2);
}

#[test]
fn configured_runtime_drives_the_expander() {
    let config = MetaConfig::from_toml_str("[meta]\nmax_expansion_depth = 4\n").unwrap();
    let runtime = runtime_from_config(&config).unwrap();
    assert_eq!(runtime.kind(), "inprocess");
    let mut expander = Expander::from_config(runtime.as_ref(), &config);
    let again = def_macro("again", &["ns"], vec![quote(vec![call("again", vec![])])]);
    let err = expander
        .expand_program(&[again, call("again", vec![])])
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Internal);
    assert!(err.to_string().contains("maximum depth of 4"));
}
