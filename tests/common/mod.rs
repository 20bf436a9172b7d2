//! Shared builders for the integration tests.
#![allow(dead_code)]

use makrell_meta::ast::{curly, ident, square, Node};
use makrell_meta::macros::{DefaultMacroContext, Expansion, MacroRegistry, MakrellMacro};
use makrell_meta::runtime::run_makrell_macro;
use makrell_meta::MakrellResult;

/// `{def macro name [params…] body…}`
pub fn def_macro(name: &str, params: &[&str], body: Vec<Node>) -> Node {
    let mut nodes = vec![
        ident("def"),
        ident("macro"),
        ident(name),
        square(params.iter().map(|p| ident(*p)).collect()),
    ];
    nodes.extend(body);
    curly(nodes)
}

/// `{head args…}`
pub fn call(head: &str, args: Vec<Node>) -> Node {
    let mut nodes = vec![ident(head)];
    nodes.extend(args);
    curly(nodes)
}

/// `{quote parts…}`
pub fn quote(parts: Vec<Node>) -> Node {
    call("quote", parts)
}

/// `{$ expr}`
pub fn unq(expr: Node) -> Node {
    curly(vec![ident("$"), expr])
}

/// Runs a macro body in-process against an empty registry.
pub fn run(params: &[&str], body: Vec<Node>, args: &[Node]) -> MakrellResult<Expansion> {
    let def = MakrellMacro::new(params.iter().map(|p| p.to_string()).collect(), body);
    run_makrell_macro(&def, args, &MacroRegistry::new(), &DefaultMacroContext)
}

/// Like [`run`], but expects a single node.
pub fn run_node(params: &[&str], body: Vec<Node>, args: &[Node]) -> Node {
    match run(params, body, args) {
        Ok(Expansion::Node(node)) => node,
        other => panic!("expected a single node, got {:?}", other),
    }
}
