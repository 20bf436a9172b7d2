//! Node constructors.
//!
//! All builders produce unlocated nodes. Use [`Node::with_span`] to attach a
//! location when one is known.

use std::sync::Arc;

use super::Node;

pub fn ident(value: impl Into<String>) -> Node {
    Node::Identifier {
        value: value.into(),
        loc: None,
    }
}

pub fn num(value: impl Into<String>) -> Node {
    Node::Number {
        value: value.into(),
        loc: None,
    }
}

pub fn string(value: impl Into<String>) -> Node {
    Node::String {
        value: value.into(),
        loc: None,
    }
}

pub fn op(value: impl Into<String>) -> Node {
    Node::Operator {
        value: value.into(),
        loc: None,
    }
}

pub fn bin(left: Node, operator: impl Into<String>, right: Node) -> Node {
    Node::Binop {
        left: Arc::new(left),
        op: operator.into(),
        right: Arc::new(right),
        loc: None,
    }
}

pub fn round(nodes: Vec<Node>) -> Node {
    Node::Round {
        nodes: nodes.into(),
        loc: None,
    }
}

pub fn square(nodes: Vec<Node>) -> Node {
    Node::Square {
        nodes: nodes.into(),
        loc: None,
    }
}

pub fn curly(nodes: Vec<Node>) -> Node {
    Node::Curly {
        nodes: nodes.into(),
        loc: None,
    }
}

pub fn sequence(nodes: Vec<Node>) -> Node {
    Node::Sequence {
        nodes: nodes.into(),
        loc: None,
    }
}
