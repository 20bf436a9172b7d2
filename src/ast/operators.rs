//! Operator precedence parsing over flat node lists.
//!
//! The bracket parser leaves binary operators as separate `operator` nodes;
//! `operator_parse` folds them into `binop` nodes. Macros reach this through
//! the `operator_parse` builtin, and `{$r …}` patterns that arrive unparsed are
//! normalised with it.

use std::sync::Arc;

use super::{Node, Span};
use crate::{err_msg, MakrellResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Priority and associativity of a binary operator. Unknown operators bind
/// loosest and associate left.
pub fn operator_info(operator: &str) -> (u8, Assoc) {
    match operator {
        "=" => (5, Assoc::Right),
        "->" => (10, Assoc::Right),
        "|" => (20, Assoc::Left),
        "||" => (30, Assoc::Left),
        "&&" => (40, Assoc::Left),
        "==" | "!=" => (50, Assoc::Left),
        "<" | "<=" | ">" | ">=" => (55, Assoc::Left),
        ":" => (58, Assoc::Left),
        ".." => (60, Assoc::Left),
        "+" | "-" => (70, Assoc::Left),
        "*" | "/" | "%" => (80, Assoc::Left),
        "**" => (90, Assoc::Right),
        "@" => (95, Assoc::Left),
        "'" => (100, Assoc::Left),
        "." => (110, Assoc::Left),
        _ => (0, Assoc::Left),
    }
}

struct PendingOp {
    value: String,
    loc: Option<Span>,
}

/// Folds `operator` nodes into `binop` trees, recursing into brackets.
///
/// ```rust
/// use makrell_meta::ast::{bin, ident, num, op, operator_parse};
/// let parsed = operator_parse(&[num("1"), op("+"), num("2"), op("*"), ident("x")]).unwrap();
/// assert_eq!(parsed, vec![bin(num("1"), "+", bin(num("2"), "*", ident("x")))]);
/// ```
pub fn operator_parse(nodes: &[Node]) -> MakrellResult<Vec<Node>> {
    let mut output: Vec<Node> = Vec::with_capacity(nodes.len());
    let mut ops: Vec<PendingOp> = Vec::new();
    let mut last_was_operand = true;

    for node in nodes {
        if let Node::Operator { value, loc } = node {
            let (current, _) = operator_info(value);
            while let Some(top) = ops.last() {
                let (stacked, assoc) = operator_info(&top.value);
                if stacked > current || (stacked == current && assoc == Assoc::Left) {
                    apply_one(&mut output, &mut ops)?;
                } else {
                    break;
                }
            }
            ops.push(PendingOp {
                value: value.clone(),
                loc: *loc,
            });
            last_was_operand = false;
            continue;
        }

        if last_was_operand {
            apply_all(&mut output, &mut ops)?;
        }
        output.push(transform(node)?);
        last_was_operand = true;
    }

    apply_all(&mut output, &mut ops)?;
    Ok(output)
}

fn apply_one(output: &mut Vec<Node>, ops: &mut Vec<PendingOp>) -> MakrellResult<()> {
    let right = output.pop();
    let left = output.pop();
    let pending = ops.pop();
    let (Some(left), Some(right), Some(pending)) = (left, right, pending) else {
        return Err(err_msg!(Shape, "Malformed expression"));
    };
    let loc = Span::merge(Span::merge(left.span(), pending.loc), right.span());
    output.push(Node::Binop {
        left: Arc::new(left),
        op: pending.value,
        right: Arc::new(right),
        loc,
    });
    Ok(())
}

fn apply_all(output: &mut Vec<Node>, ops: &mut Vec<PendingOp>) -> MakrellResult<()> {
    while !ops.is_empty() {
        if output.len() < 2 {
            let dangling = ops.pop().map(|p| p.value).unwrap_or_default();
            return Err(err_msg!(
                Shape,
                "Malformed expression near operator '{}'",
                dangling
            ));
        }
        apply_one(output, ops)?;
    }
    Ok(())
}

fn transform(node: &Node) -> MakrellResult<Node> {
    match (node.bracket_kind(), node.children()) {
        (Some(kind), Some(children)) => Ok(Node::brackets(
            kind,
            operator_parse(children)?,
            node.span(),
        )),
        _ => Ok(node.clone()),
    }
}
