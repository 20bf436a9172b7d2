//! Macro-time values.
//!
//! Lists are shared mutable references: pushing through one binding is visible
//! through every other binding of the same list, as in the generated program's
//! host language. Closures hold their defining [`Env`] by `Rc`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{format_number, ident, num, square, string, Node};
use crate::macros::Expansion;
use crate::runtime::env::Env;
use crate::runtime::eval::{EvalResult, Evaluator};
use crate::{err_msg, MakrellResult};

pub type ListRef = Rc<RefCell<Vec<MacroValue>>>;

#[derive(Clone, Default)]
pub enum MacroValue {
    #[default]
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Node(Node),
    List(ListRef),
    Closure(Rc<Closure>),
    Native(Rc<NativeFn>),
}

/// Whether a closure body is a `fun` (catches `return`) or a `->` lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureKind {
    Lambda,
    Function,
}

pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Node>,
    pub env: Rc<Env>,
    pub kind: ClosureKind,
}

type NativeImpl = dyn Fn(&Evaluator<'_>, Vec<MacroValue>) -> EvalResult;

/// A host function callable from macro code.
pub struct NativeFn {
    pub name: String,
    /// Set for node constructors so `isinstance` can use them as type tags.
    pub node_ctor: Option<&'static str>,
    func: Box<NativeImpl>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Evaluator<'_>, Vec<MacroValue>) -> EvalResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            node_ctor: None,
            func: Box::new(func),
        }
    }

    pub fn node_ctor(
        tag: &'static str,
        func: impl Fn(&Evaluator<'_>, Vec<MacroValue>) -> EvalResult + 'static,
    ) -> Self {
        Self {
            name: tag.to_string(),
            node_ctor: Some(tag),
            func: Box::new(func),
        }
    }

    pub fn call(&self, ev: &Evaluator<'_>, args: Vec<MacroValue>) -> EvalResult {
        (self.func)(ev, args)
    }
}

impl MacroValue {
    pub fn str(text: impl Into<String>) -> Self {
        MacroValue::Str(text.into())
    }

    pub fn list(items: Vec<MacroValue>) -> Self {
        MacroValue::List(Rc::new(RefCell::new(items)))
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self::list(nodes.into_iter().map(MacroValue::Node).collect())
    }

    pub fn from_expansion(expansion: Expansion) -> Self {
        match expansion {
            Expansion::Node(node) => MacroValue::Node(node),
            Expansion::Nodes(nodes) => Self::from_nodes(nodes),
        }
    }

    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&Evaluator<'_>, Vec<MacroValue>) -> EvalResult + 'static,
    ) -> Self {
        MacroValue::Native(Rc::new(NativeFn::new(name, func)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MacroValue::Null => "null",
            MacroValue::Bool(_) => "boolean",
            MacroValue::Num(_) => "number",
            MacroValue::Str(_) => "string",
            MacroValue::Node(_) => "node",
            MacroValue::List(_) => "list",
            MacroValue::Closure(_) | MacroValue::Native(_) => "function",
        }
    }

    /// Host truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            MacroValue::Null => false,
            MacroValue::Bool(b) => *b,
            MacroValue::Num(n) => *n != 0.0 && !n.is_nan(),
            MacroValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, MacroValue::Closure(_) | MacroValue::Native(_))
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            MacroValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            MacroValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The nodes of a list made only of nodes. An empty list qualifies.
    pub fn as_node_list(&self) -> Option<Vec<Node>> {
        let MacroValue::List(items) = self else {
            return None;
        };
        items
            .borrow()
            .iter()
            .map(|item| match item {
                MacroValue::Node(node) => Some(node.clone()),
                _ => None,
            })
            .collect()
    }

    /// The node elements of a list, skipping everything else.
    pub fn node_items(&self) -> Vec<Node> {
        match self {
            MacroValue::List(items) => items
                .borrow()
                .iter()
                .filter_map(|item| match item {
                    MacroValue::Node(node) => Some(node.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Coerces a value into a node.
    ///
    /// ```rust
    /// use makrell_meta::ast::{ident, num};
    /// use makrell_meta::runtime::MacroValue;
    /// assert_eq!(MacroValue::Num(7.0).to_node().unwrap(), num("7"));
    /// assert_eq!(MacroValue::Null.to_node().unwrap(), ident("null"));
    /// ```
    pub fn to_node(&self) -> MakrellResult<Node> {
        match self {
            MacroValue::Node(node) => Ok(node.clone()),
            MacroValue::Str(s) => Ok(string(s.clone())),
            MacroValue::Num(n) => Ok(num(format_number(*n))),
            MacroValue::Bool(b) => Ok(ident(if *b { "true" } else { "false" })),
            MacroValue::Null => Ok(ident("null")),
            other => match other.as_node_list() {
                Some(nodes) => Ok(square(nodes)),
                None => Err(err_msg!(
                    Coercion,
                    "Macro returned value that cannot be converted to AST node: {}",
                    other
                )),
            },
        }
    }

    /// The final coercion applied to a macro's result.
    pub fn into_expansion(self) -> MakrellResult<Expansion> {
        if let MacroValue::Node(node) = self {
            return Ok(Expansion::Node(node));
        }
        if let Some(nodes) = self.as_node_list() {
            return Ok(Expansion::Nodes(nodes));
        }
        self.to_node().map(Expansion::Node)
    }

    /// Strict equality: primitives by value, nodes structurally, lists and
    /// functions by identity.
    pub fn strict_eq(&self, other: &MacroValue) -> bool {
        match (self, other) {
            (MacroValue::Null, MacroValue::Null) => true,
            (MacroValue::Bool(a), MacroValue::Bool(b)) => a == b,
            (MacroValue::Num(a), MacroValue::Num(b)) => a == b,
            (MacroValue::Str(a), MacroValue::Str(b)) => a == b,
            (MacroValue::Node(a), MacroValue::Node(b)) => a == b,
            (MacroValue::List(a), MacroValue::List(b)) => Rc::ptr_eq(a, b),
            (MacroValue::Closure(a), MacroValue::Closure(b)) => Rc::ptr_eq(a, b),
            (MacroValue::Native(a), MacroValue::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Null => write!(f, "null"),
            MacroValue::Bool(b) => write!(f, "{}", b),
            MacroValue::Num(n) => write!(f, "{}", format_number(*n)),
            MacroValue::Str(s) => write!(f, "{}", s),
            MacroValue::Node(node) => write!(f, "{}", node.pretty()),
            MacroValue::List(items) => {
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !matches!(item, MacroValue::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            MacroValue::Closure(c) => write!(f, "[function {}]", c.name.as_deref().unwrap_or("anonymous")),
            MacroValue::Native(n) => write!(f, "[function {}]", n.name),
        }
    }
}

impl fmt::Debug for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Null => write!(f, "Null"),
            MacroValue::Bool(b) => write!(f, "Bool({})", b),
            MacroValue::Num(n) => write!(f, "Num({})", n),
            MacroValue::Str(s) => write!(f, "Str({:?})", s),
            MacroValue::Node(node) => write!(f, "Node({})", node.pretty()),
            MacroValue::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            MacroValue::Closure(c) => write!(f, "Closure({:?}, {:?})", c.name, c.params),
            MacroValue::Native(n) => write!(f, "Native({})", n.name),
        }
    }
}

impl From<Node> for MacroValue {
    fn from(node: Node) -> Self {
        MacroValue::Node(node)
    }
}
