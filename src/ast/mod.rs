//! AST module for the Makrell meta core
//!
//! The tree shared by the macro evaluator, the quasiquote evaluator and the
//! pattern matcher. The parser that produces it lives outside this crate; the
//! node set here is closed and its serde form is the JSON wire shape used by
//! the out-of-process and worker meta-runtimes.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod builder;
pub mod operators;
pub mod value;

pub use builder::{bin, curly, ident, num, op, round, sequence, square, string};
pub use operators::operator_parse;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourcePos {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

/// Represents a span in the source code.
///
/// # Examples
///
/// ```rust
/// use makrell_meta::ast::{SourcePos, Span};
/// let start = SourcePos { index: 0, line: 1, column: 1 };
/// let end = SourcePos { index: 5, line: 1, column: 6 };
/// let span = Span { start, end };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: SourcePos,
    pub end: SourcePos,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.index.saturating_sub(self.start.index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both inputs.
    pub fn merge(a: Option<Span>, b: Option<Span>) -> Option<Span> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Span {
                start: a.start,
                end: b.end,
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// The canonical AST node.
///
/// Nodes are immutable once built. Children are reference counted so
/// quasiquote and the expander can share subtrees instead of copying them.
/// Equality is structural and ignores `loc`.
///
/// # Examples
///
/// ```rust
/// use makrell_meta::ast::{bin, num};
/// let sum = bin(num("41"), "+", num("1"));
/// assert_eq!(sum.kind_name(), "binop");
/// assert_eq!(sum.pretty(), "41 + 1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Identifier {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    String {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    /// Numbers keep their source text; see [`Node::number_value`].
    Number {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    Operator {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    Binop {
        left: Arc<Node>,
        op: String,
        right: Arc<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    Round {
        nodes: Arc<[Node]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    Square {
        nodes: Arc<[Node]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    Curly {
        nodes: Arc<[Node]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
    Sequence {
        nodes: Arc<[Node]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<Span>,
    },
}

/// The three bracket kinds plus the root sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Round,
    Square,
    Curly,
    Sequence,
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Node {
    pub fn span(&self) -> Option<Span> {
        match self {
            Node::Identifier { loc, .. }
            | Node::String { loc, .. }
            | Node::Number { loc, .. }
            | Node::Operator { loc, .. }
            | Node::Binop { loc, .. }
            | Node::Round { loc, .. }
            | Node::Square { loc, .. }
            | Node::Curly { loc, .. }
            | Node::Sequence { loc, .. } => *loc,
        }
    }

    /// Returns the same node located at `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        match &mut self {
            Node::Identifier { loc, .. }
            | Node::String { loc, .. }
            | Node::Number { loc, .. }
            | Node::Operator { loc, .. }
            | Node::Binop { loc, .. }
            | Node::Round { loc, .. }
            | Node::Square { loc, .. }
            | Node::Curly { loc, .. }
            | Node::Sequence { loc, .. } => *loc = Some(span),
        }
        self
    }

    /// The wire name of this node's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Identifier { .. } => "identifier",
            Node::String { .. } => "string",
            Node::Number { .. } => "number",
            Node::Operator { .. } => "operator",
            Node::Binop { .. } => "binop",
            Node::Round { .. } => "round",
            Node::Square { .. } => "square",
            Node::Curly { .. } => "curly",
            Node::Sequence { .. } => "sequence",
        }
    }

    /// True if this is the identifier `wanted`.
    ///
    /// ```rust
    /// use makrell_meta::ast::{ident, num};
    /// assert!(ident("quote").is_ident("quote"));
    /// assert!(!num("1").is_ident("1"));
    /// ```
    pub fn is_ident(&self, wanted: &str) -> bool {
        matches!(self, Node::Identifier { value, .. } if value == wanted)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Node::Identifier { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Parses a number node's text the way the host language does: surrounding
    /// whitespace is ignored and anything unparsable is NaN.
    pub fn number_value(&self) -> Option<f64> {
        match self {
            Node::Number { value, .. } => Some(parse_number_text(value)),
            _ => None,
        }
    }

    pub fn bracket_kind(&self) -> Option<BracketKind> {
        match self {
            Node::Round { .. } => Some(BracketKind::Round),
            Node::Square { .. } => Some(BracketKind::Square),
            Node::Curly { .. } => Some(BracketKind::Curly),
            Node::Sequence { .. } => Some(BracketKind::Sequence),
            _ => None,
        }
    }

    /// Children of a bracketed node; `None` for leaves and binops.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Round { nodes, .. }
            | Node::Square { nodes, .. }
            | Node::Curly { nodes, .. }
            | Node::Sequence { nodes, .. } => Some(nodes),
            _ => None,
        }
    }

    /// True for a curly form whose first child is the identifier `head`.
    pub fn is_curly_headed(&self, head: &str) -> bool {
        match self {
            Node::Curly { nodes, .. } => nodes.first().is_some_and(|n| n.is_ident(head)),
            _ => false,
        }
    }

    /// Builds a bracketed node of `kind` around `nodes`.
    pub fn brackets(kind: BracketKind, nodes: Vec<Node>, loc: Option<Span>) -> Node {
        let nodes: Arc<[Node]> = nodes.into();
        match kind {
            BracketKind::Round => Node::Round { nodes, loc },
            BracketKind::Square => Node::Square { nodes, loc },
            BracketKind::Curly => Node::Curly { nodes, loc },
            BracketKind::Sequence => Node::Sequence { nodes, loc },
        }
    }

    /// Pretty-prints the node as source-like text.
    ///
    /// ```rust
    /// use makrell_meta::ast::{curly, ident, num, string};
    /// let call = curly(vec![ident("print"), string("hi"), num("2")]);
    /// assert_eq!(call.pretty(), "{print \"hi\" 2}");
    /// ```
    pub fn pretty(&self) -> String {
        match self {
            Node::Identifier { value, .. }
            | Node::Number { value, .. }
            | Node::Operator { value, .. } => value.clone(),
            Node::String { value, .. } => {
                serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
            }
            Node::Binop {
                left, op, right, ..
            } => format!("{} {} {}", left.pretty(), op, right.pretty()),
            Node::Round { nodes, .. } => format!("({})", Self::pretty_list(nodes)),
            Node::Square { nodes, .. } => format!("[{}]", Self::pretty_list(nodes)),
            Node::Curly { nodes, .. } => format!("{{{}}}", Self::pretty_list(nodes)),
            Node::Sequence { nodes, .. } => Self::pretty_list(nodes),
        }
    }

    fn pretty_list(nodes: &[Node]) -> String {
        nodes
            .iter()
            .map(Node::pretty)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Identifier { value: a, .. }, Node::Identifier { value: b, .. })
            | (Node::String { value: a, .. }, Node::String { value: b, .. })
            | (Node::Number { value: a, .. }, Node::Number { value: b, .. })
            | (Node::Operator { value: a, .. }, Node::Operator { value: b, .. }) => a == b,
            (
                Node::Binop {
                    left: l1,
                    op: o1,
                    right: r1,
                    ..
                },
                Node::Binop {
                    left: l2,
                    op: o2,
                    right: r2,
                    ..
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (Node::Round { nodes: a, .. }, Node::Round { nodes: b, .. })
            | (Node::Square { nodes: a, .. }, Node::Square { nodes: b, .. })
            | (Node::Curly { nodes: a, .. }, Node::Curly { nodes: b, .. })
            | (Node::Sequence { nodes: a, .. }, Node::Sequence { nodes: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// True if a JSON value is shaped like a serialized [`Node`]: an object with
/// a string `kind` field.
pub fn is_node_shaped(value: &serde_json::Value) -> bool {
    value
        .get("kind")
        .is_some_and(|kind| kind.is_string())
}

/// Number text to `f64`. Empty text is zero, unparsable text is NaN.
pub fn parse_number_text(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Formats a number the way the generated program would print it
/// (`42` not `42.0`, `Infinity`, `NaN`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_location() {
        let span = Span {
            start: SourcePos { index: 3, line: 1, column: 4 },
            end: SourcePos { index: 4, line: 1, column: 5 },
        };
        assert_eq!(num("7").with_span(span), num("7"));
        assert_ne!(num("7"), string("7"));
    }

    #[test]
    fn wire_shape_is_tagged_by_kind() {
        let node = bin(ident("n"), "+", num("1"));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "binop",
                "left": { "kind": "identifier", "value": "n" },
                "op": "+",
                "right": { "kind": "number", "value": "1" }
            })
        );
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn deserializes_locations() {
        let raw = r#"{"kind":"square","nodes":[{"kind":"number","value":"2"}],
            "loc":{"start":{"index":0,"line":1,"column":1},"end":{"index":3,"line":1,"column":4}}}"#;
        let node: Node = serde_json::from_str(raw).unwrap();
        assert_eq!(node.span().map(|s| s.len()), Some(3));
        assert_eq!(node.children().map(|c| c.len()), Some(1));
    }

    #[test]
    fn number_text_is_parsed_lazily() {
        assert_eq!(num("2.5").number_value(), Some(2.5));
        assert!(num("abc").number_value().unwrap().is_nan());
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn node_shape_detection() {
        assert!(is_node_shaped(&serde_json::json!({"kind": "identifier", "value": "x"})));
        assert!(!is_node_shaped(&serde_json::json!({"value": "x"})));
        assert!(!is_node_shaped(&serde_json::json!(3)));
    }
}
