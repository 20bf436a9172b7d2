//! Quasiquote: builds AST from a template where `{unquote x}` / `{$ x}` marks
//! parts to evaluate.
//!
//! Unquoted lists are spliced into the surrounding brackets. Leaves are taken
//! literally and never looked up.

use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{ident, Node};
use crate::err_ctx;
use crate::macros::Expansion;
use crate::runtime::env::Env;
use crate::runtime::eval::{EvalResult, Evaluator};
use crate::runtime::value::MacroValue;

fn is_unquote(node: &Node) -> bool {
    node.is_curly_headed("unquote") || node.is_curly_headed("$")
}

pub fn quasiquote(ev: &Evaluator<'_>, node: &Node, env: &Rc<Env>) -> EvalResult<Expansion> {
    if is_unquote(node) {
        let children = node.children().unwrap_or_default();
        let raw = match children.get(1) {
            Some(expr) => ev.eval(expr, env)?,
            None => ev.eval(&ident("null"), env)?,
        };
        return Ok(splice(raw).map_err(|e| e.at(node.span()))?);
    }

    match node {
        Node::Binop {
            left, op, right, loc,
        } => {
            let (Expansion::Node(l), Expansion::Node(r)) =
                (quasiquote(ev, left, env)?, quasiquote(ev, right, env)?)
            else {
                return Err(err_ctx!(Coercion, "Unquote produced invalid binop side", node).into());
            };
            Ok(Expansion::Node(Node::Binop {
                left: Arc::new(l),
                op: op.clone(),
                right: Arc::new(r),
                loc: *loc,
            }))
        }
        _ => match (node.bracket_kind(), node.children()) {
            (Some(kind), Some(children)) => {
                let mut kids = Vec::with_capacity(children.len());
                for child in children {
                    match quasiquote(ev, child, env)? {
                        Expansion::Node(n) => kids.push(n),
                        Expansion::Nodes(ns) => kids.extend(ns),
                    }
                }
                Ok(Expansion::Node(Node::brackets(kind, kids, node.span())))
            }
            _ => Ok(Expansion::Node(node.clone())),
        },
    }
}

fn splice(raw: MacroValue) -> crate::MakrellResult<Expansion> {
    if let MacroValue::Node(node) = raw {
        return Ok(Expansion::Node(node));
    }
    if let Some(nodes) = raw.as_node_list() {
        return Ok(Expansion::Nodes(nodes));
    }
    raw.to_node().map(Expansion::Node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{bin, curly, num, square};
    use crate::macros::{DefaultMacroContext, MacroRegistry};

    #[test]
    fn unquoted_lists_splice_into_brackets() {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        let env = Env::root();
        env.set("xs", MacroValue::from_nodes(vec![num("1"), num("2")]));
        let template = square(vec![num("0"), curly(vec![ident("$"), ident("xs")]), num("3")]);
        let out = quasiquote(&ev, &template, &env).map_err(|e| e.into_error()).unwrap();
        assert_eq!(
            out,
            Expansion::Node(square(vec![num("0"), num("1"), num("2"), num("3")]))
        );
    }

    #[test]
    fn binop_sides_must_be_single_nodes() {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        let env = Env::root();
        env.set("xs", MacroValue::from_nodes(vec![num("1"), num("2")]));
        let template = bin(curly(vec![ident("unquote"), ident("xs")]), "+", num("1"));
        let err = quasiquote(&ev, &template, &env).map_err(|e| e.into_error()).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Coercion);
    }
}
