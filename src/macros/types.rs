//! Core macro types.
//!
//! This module defines the fundamental types used throughout the macro system.
//! It has no dependencies on other macro modules, making it the foundation layer.
//!
//! ## Ownership
//!
//! - `MacroEntry` is cheap to clone: both variants are reference counted
//! - `MakrellMacro` owns its parameter names and body nodes
//! - `Expansion` owns the nodes a macro produced

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::{operator_parse, Node};
use crate::{err_msg, MakrellResult};

/// Maximum nesting of macro expansions before the expander gives up.
pub const MAX_MACRO_RECURSION_DEPTH: usize = 128;

/// What a macro produced: a single node, or a list spliced in place of the
/// call.
///
/// The serde form is the JSON wire shape `Node | Node[]`.
///
/// ```rust
/// use makrell_meta::ast::{num, ident};
/// use makrell_meta::macros::Expansion;
/// let one = Expansion::Node(num("1"));
/// assert_eq!(one.into_nodes(), vec![num("1")]);
/// let many = Expansion::Nodes(vec![ident("a"), ident("b")]);
/// assert_eq!(many.into_nodes().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expansion {
    Node(Node),
    Nodes(Vec<Node>),
}

impl Expansion {
    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            Expansion::Node(node) => vec![node],
            Expansion::Nodes(nodes) => nodes,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Expansion::Node(node) => Some(node),
            Expansion::Nodes(_) => None,
        }
    }
}

/// Host services available to macros while they run.
///
/// The source parser is an external collaborator, so `parse` is only as good
/// as the context the embedder supplies.
pub trait MacroContext {
    /// Normalises an argument list. The default keeps every node.
    fn regular(&self, nodes: Vec<Node>) -> Vec<Node> {
        nodes
    }

    /// Parses source text into top-level nodes.
    fn parse(&self, src: &str) -> MakrellResult<Vec<Node>>;

    /// Folds loose operator nodes into binops.
    fn operator_parse(&self, nodes: &[Node]) -> MakrellResult<Vec<Node>> {
        operator_parse(nodes)
    }
}

/// The context used when nothing better is configured: no source parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMacroContext;

impl MacroContext for DefaultMacroContext {
    fn parse(&self, _src: &str) -> MakrellResult<Vec<Node>> {
        Err(err_msg!(
            Call,
            "parse is unavailable: no source parser is attached to this macro context"
        ))
    }
}

/// A native macro: host code from argument nodes to an expansion.
///
/// Native macros cannot be serialized and only run in-process.
pub type NativeMacroFn =
    Arc<dyn Fn(&[Node], &dyn MacroContext) -> MakrellResult<Expansion> + Send + Sync>;

/// A user-defined macro, fully described by data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakrellMacro {
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

impl MakrellMacro {
    pub fn new(params: Vec<String>, body: Vec<Node>) -> Self {
        Self { params, body }
    }
}

/// A registry entry.
#[derive(Clone)]
pub enum MacroEntry {
    Native(NativeMacroFn),
    Makrell(Arc<MakrellMacro>),
}

impl MacroEntry {
    pub fn is_native(&self) -> bool {
        matches!(self, MacroEntry::Native(_))
    }

    pub fn as_makrell(&self) -> Option<&MakrellMacro> {
        match self {
            MacroEntry::Makrell(def) => Some(def),
            MacroEntry::Native(_) => None,
        }
    }
}

impl fmt::Debug for MacroEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroEntry::Native(_) => write!(f, "Native(<fn>)"),
            MacroEntry::Makrell(def) => f
                .debug_struct("Makrell")
                .field("params", &def.params)
                .field("body", &def.body.len())
                .finish(),
        }
    }
}

/// The wire form of a Makrell macro: `{name, params, body}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedMacro {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

impl SerializedMacro {
    pub fn new(name: impl Into<String>, def: &MakrellMacro) -> Self {
        Self {
            name: name.into(),
            params: def.params.clone(),
            body: def.body.clone(),
        }
    }

    pub fn to_macro(&self) -> MakrellMacro {
        MakrellMacro::new(self.params.clone(), self.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{bin, ident, num};
    use crate::ErrorType;

    #[test]
    fn expansion_wire_shape_is_node_or_array() {
        let single: Expansion =
            serde_json::from_value(serde_json::json!({"kind": "number", "value": "42"})).unwrap();
        assert_eq!(single, Expansion::Node(num("42")));

        let many: Expansion = serde_json::from_value(serde_json::json!([
            {"kind": "identifier", "value": "a"},
            {"kind": "identifier", "value": "b"}
        ]))
        .unwrap();
        assert_eq!(many, Expansion::Nodes(vec![ident("a"), ident("b")]));
    }

    #[test]
    fn default_context_has_no_parser() {
        let err = DefaultMacroContext.parse("a + 1").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Call);
    }

    #[test]
    fn serialized_macro_keeps_params_and_body() {
        let def = MakrellMacro::new(vec!["ns".into()], vec![bin(ident("n"), "+", num("1"))]);
        let wire = SerializedMacro::new("inc", &def);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["name"], "inc");
        assert_eq!(json["params"], serde_json::json!(["ns"]));
        assert_eq!(wire.to_macro(), def);
    }
}
