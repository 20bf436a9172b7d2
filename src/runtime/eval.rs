//! The macro-time evaluator.
//!
//! A synchronous tree walk over [`Node`]s against an [`Env`] chain. Curly forms
//! are dispatched on their head identifier (`if`, `do`, `when`, `while`, `for`,
//! `fun`, `return`, `quote`), then member calls `{recv.method args…}`, then
//! plain calls.
//!
//! ## Control flow
//!
//! `{return x}` does not raise an error. It produces [`Unwind::Return`], which
//! travels up through `?` like an error and is caught only by a `fun` body or
//! by the macro boundary in [`Evaluator::run_macro`]. Everything public returns
//! plain `MakrellResult`, so a return signal can never leak to a caller.
//!
//! ## Recursion
//!
//! Nested evaluation is bounded by `max_depth` and reported as an `Internal`
//! error instead of overflowing the stack.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::ast::{ident, parse_number_text, square, Node};
use crate::macros::{Expansion, MacroContext, MacroEntry, MacroRegistry, MakrellMacro};
use crate::runtime::builtins::base_env;
use crate::runtime::env::Env;
use crate::runtime::members::get_member;
use crate::runtime::quasiquote::quasiquote;
use crate::runtime::value::{Closure, ClosureKind, MacroValue};
use crate::{err_ctx, err_msg, MakrellError, MakrellResult};

/// Default bound on nested evaluation.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 512;

/// Outcome of a step that did not produce a value normally.
#[derive(Debug)]
pub enum Unwind {
    /// `{return x}` unwinding to the nearest function or macro boundary.
    Return(MacroValue),
    Error(MakrellError),
}

impl Unwind {
    /// Collapses an unwind at a boundary that does not catch returns.
    pub fn into_error(self) -> MakrellError {
        match self {
            Unwind::Error(err) => err,
            Unwind::Return(_) => err_msg!(Internal, "return signal escaped its function boundary"),
        }
    }
}

impl From<MakrellError> for Unwind {
    fn from(err: MakrellError) -> Self {
        Unwind::Error(err)
    }
}

pub type EvalResult<T = MacroValue> = Result<T, Unwind>;

/// Evaluates macro bodies against one registry and macro context.
pub struct Evaluator<'a> {
    registry: &'a MacroRegistry,
    ctx: &'a dyn MacroContext,
    max_depth: usize,
    deadline: Option<Instant>,
    depth: Cell<usize>,
}

struct DepthGuard<'e> {
    depth: &'e Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a MacroRegistry, ctx: &'a dyn MacroContext) -> Self {
        Self {
            registry,
            ctx,
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
            deadline: None,
            depth: Cell::new(0),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Stops evaluation with an `Internal` error once `deadline` has passed.
    /// Checked on every nested step, so a looping body cannot outlive it.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn registry(&self) -> &'a MacroRegistry {
        self.registry
    }

    pub fn context(&self) -> &'a dyn MacroContext {
        self.ctx
    }

    fn enter(&self) -> MakrellResult<DepthGuard<'_>> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(err_msg!(Internal, "Macro evaluation ran past its deadline"));
        }
        let next = self.depth.get() + 1;
        if next > self.max_depth {
            return Err(err_msg!(
                Internal,
                "Macro evaluation exceeded maximum depth of {}",
                self.max_depth
            ));
        }
        self.depth.set(next);
        Ok(DepthGuard { depth: &self.depth })
    }

    // ------------------------------------------------------------------------
    // Macro boundary
    // ------------------------------------------------------------------------

    /// Runs a user-defined macro over argument nodes.
    ///
    /// A single declared parameter receives the whole argument list; otherwise
    /// arguments bind positionally and missing ones become the `null`
    /// identifier. Every registry entry is callable by name from the body.
    pub fn run_macro(&self, def: &MakrellMacro, args: &[Node]) -> MakrellResult<Expansion> {
        let _guard = self.enter()?;
        debug!(
            params = ?def.params,
            args = args.len(),
            statements = def.body.len(),
            "running makrell macro"
        );
        let frame = Env::child(&base_env());

        if let [only] = def.params.as_slice() {
            frame.define(only, MacroValue::from_nodes(args.to_vec()));
        } else {
            for (i, param) in def.params.iter().enumerate() {
                let arg = args.get(i).cloned().unwrap_or_else(|| ident("null"));
                frame.define(param, MacroValue::Node(arg));
            }
        }

        for (name, entry) in self.registry.entries() {
            frame.define(name, macro_callable(name, entry));
        }

        let out = match self.eval_body(&def.body, &frame) {
            Ok(value) | Err(Unwind::Return(value)) => value,
            Err(Unwind::Error(err)) => return Err(err),
        };
        out.into_expansion()
    }

    // ------------------------------------------------------------------------
    // Node evaluation
    // ------------------------------------------------------------------------

    /// Evaluates statements in order; the value is the last one's, or null.
    pub fn eval_body(&self, body: &[Node], env: &Rc<Env>) -> EvalResult {
        let mut out = MacroValue::Null;
        for stmt in body {
            out = self.eval(stmt, env)?;
        }
        Ok(out)
    }

    pub fn eval(&self, node: &Node, env: &Rc<Env>) -> EvalResult {
        let _guard = self.enter().map_err(|e| e.at(node.span()))?;
        match node {
            Node::Identifier { value, .. } => match value.as_str() {
                "true" => Ok(MacroValue::Bool(true)),
                "false" => Ok(MacroValue::Bool(false)),
                "null" => Ok(MacroValue::Null),
                name => Ok(env.get(name).map_err(|e| e.at(node.span()))?),
            },
            Node::String { value, .. } => Ok(MacroValue::Str(value.clone())),
            Node::Number { value, .. } => Ok(MacroValue::Num(parse_number_text(value))),
            Node::Operator { value, .. } => Ok(MacroValue::Str(value.clone())),
            Node::Square { nodes, .. } => self.eval_list(nodes, env),
            Node::Round { nodes, .. } => match nodes.len() {
                0 => Ok(MacroValue::Null),
                1 => self.eval(&nodes[0], env),
                _ => self.eval_list(nodes, env),
            },
            Node::Binop {
                left, op, right, ..
            } => self.eval_binop(node, left, op, right, env),
            Node::Curly { nodes, .. } => self.eval_curly(node, nodes, env),
            Node::Sequence { nodes, .. } => self.eval_body(nodes, env),
        }
    }

    fn eval_list(&self, nodes: &[Node], env: &Rc<Env>) -> EvalResult {
        let items = self.eval_args(nodes, env)?;
        Ok(MacroValue::list(items))
    }

    fn eval_args(&self, nodes: &[Node], env: &Rc<Env>) -> EvalResult<Vec<MacroValue>> {
        nodes.iter().map(|n| self.eval(n, env)).collect()
    }

    fn eval_binop(
        &self,
        node: &Node,
        left: &Node,
        op: &str,
        right: &Node,
        env: &Rc<Env>,
    ) -> EvalResult {
        match op {
            "=" => {
                let Some(name) = left.as_ident() else {
                    return Err(err_ctx!(Scope, "Macro assignment left side must be identifier", left).into());
                };
                let value = self.eval(right, env)?;
                env.set(name, value.clone());
                Ok(value)
            }
            "->" => {
                let params = match left {
                    Node::Identifier { value, .. } => vec![value.clone()],
                    Node::Square { nodes, .. } => param_names(nodes, "Lambda params must be identifiers")?,
                    other => return Err(err_ctx!(Shape, "Invalid lambda params", other).into()),
                };
                Ok(MacroValue::Closure(Rc::new(Closure {
                    name: None,
                    params,
                    body: vec![right.clone()],
                    env: Rc::clone(env),
                    kind: ClosureKind::Lambda,
                })))
            }
            "|" => {
                let arg = self.eval(left, env)?;
                let callee = match right.as_ident() {
                    Some(name) => {
                        let target = env.get(name).map_err(|e| e.at(right.span()))?;
                        if !target.is_callable() {
                            let msg = format!("Pipe target '{}' is not callable", name);
                            return Err(err_ctx!(Call, msg, right).into());
                        }
                        target
                    }
                    None => {
                        let target = self.eval(right, env)?;
                        if !target.is_callable() {
                            return Err(err_ctx!(Call, "Pipe target is not callable", right).into());
                        }
                        target
                    }
                };
                self.call(&callee, vec![arg])
            }
            "." => {
                let receiver = self.eval(left, env)?;
                let key = self.member_key(right, env)?;
                Ok(get_member(&receiver, &key).unwrap_or_default())
            }
            _ if is_value_operator(op) => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                Ok(apply_operator(op, &l, &r).map_err(|e| e.at(node.span()))?)
            }
            _ => {
                let msg = format!("Unsupported macro binop: {}", op);
                Err(err_ctx!(Shape, msg, node).into())
            }
        }
    }

    fn member_key(&self, right: &Node, env: &Rc<Env>) -> EvalResult<String> {
        match right.as_ident() {
            Some(name) => Ok(name.to_string()),
            None => Ok(self.eval(right, env)?.to_string()),
        }
    }

    fn eval_curly(&self, node: &Node, nodes: &[Node], env: &Rc<Env>) -> EvalResult {
        let Some(head) = nodes.first() else {
            return Err(err_ctx!(Call, "Macro call target is not callable", node).into());
        };
        let rest = &nodes[1..];

        match head.as_ident() {
            Some("if") => return self.eval_if(rest, env),
            Some("do") => return self.eval_body(rest, env),
            Some("when") => {
                let cond = match rest.first() {
                    Some(cond) => self.eval(cond, env)?,
                    None => MacroValue::Bool(false),
                };
                if cond.is_truthy() {
                    return self.eval_body(&rest[1..], env);
                }
                return Ok(MacroValue::Null);
            }
            Some("while") => return self.eval_while(rest, env),
            Some("for") => return self.eval_for(node, rest, env),
            Some("fun") => return self.eval_fun(node, rest, env),
            Some("return") => {
                let value = match rest.first() {
                    Some(expr) => self.eval(expr, env)?,
                    None => MacroValue::Null,
                };
                trace!("return signal raised");
                return Err(Unwind::Return(value));
            }
            Some("quote") => return self.eval_quote(rest, env),
            _ => {}
        }

        if let Node::Binop {
            left, op, right, ..
        } = head
        {
            if op == "." {
                let receiver = self.eval(left, env)?;
                let member = self.member_key(right, env)?;
                let target = get_member(&receiver, &member).unwrap_or_default();
                if !target.is_callable() {
                    let msg = format!("Macro member '{}' is not callable", member);
                    return Err(err_ctx!(Call, msg, head).into());
                }
                let args = self.eval_args(rest, env)?;
                return self.call(&target, args);
            }
        }

        let callee = self.eval(head, env)?;
        if !callee.is_callable() {
            return Err(err_ctx!(Call, "Macro call target is not callable", head).into());
        }
        let args = self.eval_args(rest, env)?;
        self.call(&callee, args)
    }

    fn eval_if(&self, parts: &[Node], env: &Rc<Env>) -> EvalResult {
        let mut pairs = parts.chunks_exact(2);
        for pair in pairs.by_ref() {
            if self.eval(&pair[0], env)?.is_truthy() {
                return self.eval(&pair[1], env);
            }
        }
        match pairs.remainder() {
            [fallback] => self.eval(fallback, env),
            _ => Ok(MacroValue::Null),
        }
    }

    fn eval_while(&self, parts: &[Node], env: &Rc<Env>) -> EvalResult {
        let Some(cond) = parts.first() else {
            return Ok(MacroValue::Null);
        };
        let mut out = MacroValue::Null;
        while self.eval(cond, env)?.is_truthy() {
            for stmt in &parts[1..] {
                out = self.eval(stmt, env)?;
            }
        }
        Ok(out)
    }

    fn eval_for(&self, node: &Node, parts: &[Node], env: &Rc<Env>) -> EvalResult {
        let Some(var) = parts.first().and_then(Node::as_ident) else {
            return Err(err_ctx!(Shape, "for requires identifier variable", node).into());
        };
        let iterable = match parts.get(1) {
            Some(expr) => self.eval(expr, env)?,
            None => MacroValue::list(Vec::new()),
        };
        let Some(items) = iterable.as_list() else {
            return Err(err_ctx!(Type, "for iterable must evaluate to array", node).into());
        };
        // Snapshot so the body may push to the list it iterates.
        let snapshot: Vec<MacroValue> = items.borrow().clone();
        let body = parts.get(2..).unwrap_or_default();
        let mut out = MacroValue::Null;
        for item in snapshot {
            env.set(var, item);
            for stmt in body {
                out = self.eval(stmt, env)?;
            }
        }
        Ok(out)
    }

    fn eval_fun(&self, node: &Node, parts: &[Node], env: &Rc<Env>) -> EvalResult {
        let (Some(name), Some(Node::Square { nodes: params, .. })) =
            (parts.first().and_then(Node::as_ident), parts.get(1))
        else {
            return Err(err_ctx!(
                Shape,
                "Macro {fun ...} must be {fun name [args] ...}",
                node
            )
            .into());
        };
        let closure = MacroValue::Closure(Rc::new(Closure {
            name: Some(name.to_string()),
            params: param_names(params, "fun args must be identifiers")?,
            body: parts[2..].to_vec(),
            env: Rc::clone(env),
            kind: ClosureKind::Function,
        }));
        env.set(name, closure.clone());
        Ok(closure)
    }

    fn eval_quote(&self, parts: &[Node], env: &Rc<Env>) -> EvalResult {
        let mut quoted = parts
            .iter()
            .map(|part| quasiquote(self, part, env))
            .collect::<EvalResult<Vec<_>>>()?;
        match quoted.len() {
            0 => Ok(MacroValue::Node(square(Vec::new()))),
            1 => Ok(MacroValue::from_expansion(quoted.remove(0))),
            _ => {
                let merged = quoted.into_iter().flat_map(Expansion::into_nodes).collect();
                Ok(MacroValue::from_nodes(merged))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    /// Applies a callable to already evaluated arguments.
    pub fn call(&self, callee: &MacroValue, args: Vec<MacroValue>) -> EvalResult {
        match callee {
            MacroValue::Closure(closure) => self.call_closure(closure, args),
            MacroValue::Native(native) => {
                trace!(function = %native.name, args = args.len(), "calling native");
                native.call(self, args)
            }
            other => Err(err_msg!(Call, "Value of type {} is not callable", other.type_name()).into()),
        }
    }

    fn call_closure(&self, closure: &Closure, args: Vec<MacroValue>) -> EvalResult {
        let _guard = self.enter()?;
        let frame = Env::child(&closure.env);
        let mut args = args.into_iter();
        // Parameters bind like assignment: a name already bound further out
        // is updated there, not shadowed.
        for param in &closure.params {
            frame.set(param, args.next().unwrap_or_default());
        }
        match (closure.kind, self.eval_body(&closure.body, &frame)) {
            (ClosureKind::Function, Err(Unwind::Return(value))) => Ok(value),
            (_, outcome) => outcome,
        }
    }
}

/// Binds a registry entry as a callable so macros can call other macros.
fn macro_callable(name: &str, entry: &MacroEntry) -> MacroValue {
    let entry = entry.clone();
    MacroValue::native(name, move |ev, args| {
        let nodes = args
            .iter()
            .map(MacroValue::to_node)
            .collect::<MakrellResult<Vec<_>>>()?;
        let expansion = match &entry {
            MacroEntry::Native(func) => func(&nodes, ev.context())?,
            MacroEntry::Makrell(def) => ev.run_macro(def, &nodes)?,
        };
        Ok(MacroValue::from_expansion(expansion))
    })
}

fn param_names(nodes: &[Node], message: &str) -> MakrellResult<Vec<String>> {
    nodes
        .iter()
        .map(|p| match p.as_ident() {
            Some(name) => Ok(name.to_string()),
            None => Err(err_ctx!(Shape, message, p)),
        })
        .collect()
}

fn is_value_operator(op: &str) -> bool {
    matches!(
        op,
        "+" | "-" | "*" | "/" | "%" | "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" | "@"
    )
}

/// Applies an arithmetic, comparison, boolean or index operator.
pub fn apply_operator(op: &str, l: &MacroValue, r: &MacroValue) -> MakrellResult<MacroValue> {
    use MacroValue::{Bool, Num, Str};

    let type_error = || {
        err_msg!(
            Type,
            "Cannot apply '{}' to {} and {}",
            op,
            l.type_name(),
            r.type_name()
        )
    };

    match op {
        // Nodes compare structurally, not by object identity as in the host.
        "==" => Ok(Bool(l.strict_eq(r))),
        "!=" => Ok(Bool(!l.strict_eq(r))),
        "&&" => Ok(Bool(l.is_truthy() && r.is_truthy())),
        "||" => Ok(Bool(l.is_truthy() || r.is_truthy())),
        "+" => match (l, r) {
            (Num(a), Num(b)) => Ok(Num(a + b)),
            (Str(_), _) | (_, Str(_)) => Ok(Str(format!("{}{}", l, r))),
            _ => Err(type_error()),
        },
        "-" | "*" | "/" | "%" => {
            let (Num(a), Num(b)) = (l, r) else {
                return Err(type_error());
            };
            Ok(Num(match op {
                "-" => a - b,
                "*" => a * b,
                "/" => a / b,
                _ => a % b,
            }))
        }
        "<" | "<=" | ">" | ">=" => {
            let ordering = match (l, r) {
                (Num(a), Num(b)) => a.partial_cmp(b),
                (Str(a), Str(b)) => Some(a.cmp(b)),
                _ => return Err(type_error()),
            };
            let Some(ordering) = ordering else {
                return Ok(Bool(false));
            };
            Ok(Bool(match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        "@" => index(l, r),
        _ => Err(err_msg!(Shape, "Unsupported macro binop: {}", op)),
    }
}

fn index(target: &MacroValue, key: &MacroValue) -> MakrellResult<MacroValue> {
    let Some(i) = key.as_num() else {
        return Err(err_msg!(Type, "Index must be a number, got {}", key.type_name()));
    };
    if i < 0.0 || i.fract() != 0.0 {
        return Ok(MacroValue::Null);
    }
    let i = i as usize;
    match target {
        MacroValue::List(items) => Ok(items.borrow().get(i).cloned().unwrap_or_default()),
        MacroValue::Str(s) => Ok(s
            .chars()
            .nth(i)
            .map(|c| MacroValue::Str(c.to_string()))
            .unwrap_or_default()),
        other => Err(err_msg!(Type, "Cannot index {}", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{bin, curly, num, square, string};
    use crate::macros::DefaultMacroContext;
    use crate::ErrorType;

    fn eval_in(node: &Node, env: &Rc<Env>) -> MakrellResult<MacroValue> {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        ev.eval(node, env).map_err(Unwind::into_error)
    }

    #[test]
    fn round_brackets_group_or_build_lists() {
        let env = Env::root();
        assert!(matches!(eval_in(&crate::ast::round(vec![]), &env).unwrap(), MacroValue::Null));
        let grouped = eval_in(&crate::ast::round(vec![num("3")]), &env).unwrap();
        assert_eq!(grouped.as_num(), Some(3.0));
        let listed = eval_in(&crate::ast::round(vec![num("1"), num("2")]), &env).unwrap();
        assert_eq!(listed.as_list().map(|l| l.borrow().len()), Some(2));
    }

    #[test]
    fn if_is_a_cond_chain_with_fallback() {
        let env = Env::root();
        let form = curly(vec![
            ident("if"),
            ident("false"),
            num("1"),
            ident("true"),
            num("2"),
            num("3"),
        ]);
        assert_eq!(eval_in(&form, &env).unwrap().as_num(), Some(2.0));
        let none = curly(vec![ident("if"), ident("false"), num("1")]);
        assert!(matches!(eval_in(&none, &env).unwrap(), MacroValue::Null));
    }

    #[test]
    fn equal_nodes_compare_structurally() {
        let a = MacroValue::Node(bin(num("1"), "+", num("2")));
        let b = MacroValue::Node(bin(num("1"), "+", num("2")));
        assert!(matches!(apply_operator("==", &a, &b).unwrap(), MacroValue::Bool(true)));
        let list = MacroValue::list(vec![]);
        let other = MacroValue::list(vec![]);
        assert!(matches!(apply_operator("==", &list, &other).unwrap(), MacroValue::Bool(false)));
    }

    #[test]
    fn for_iterates_the_list_as_it_was_at_the_start() {
        let env = Env::root();
        env.set("xs", MacroValue::list(vec![MacroValue::Num(1.0), MacroValue::Num(2.0)]));
        let grow = curly(vec![
            ident("for"),
            ident("x"),
            ident("xs"),
            curly(vec![bin(ident("xs"), ".", ident("push")), ident("x")]),
        ]);
        eval_in(&grow, &env).unwrap();
        let xs = env.get("xs").unwrap();
        assert_eq!(xs.to_string(), "1,2,1,2");
    }

    #[test]
    fn string_plus_concatenates() {
        let out = apply_operator("+", &MacroValue::str("n"), &MacroValue::Num(1.0)).unwrap();
        assert!(matches!(out, MacroValue::Str(s) if s == "n1"));
    }

    #[test]
    fn index_out_of_range_is_null() {
        let env = Env::root();
        let form = bin(square(vec![num("1")]), "@", num("4"));
        assert!(matches!(eval_in(&form, &env).unwrap(), MacroValue::Null));
    }

    #[test]
    fn assignment_to_non_identifier_is_a_scope_error() {
        let env = Env::root();
        let err = eval_in(&bin(string("x"), "=", num("1")), &env).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Scope);
    }

    #[test]
    fn lambda_parameters_update_outer_bindings() {
        let env = Env::root();
        env.set("x", MacroValue::Num(1.0));
        let set_x = bin(ident("x"), "->", ident("x"));
        let f = eval_in(&set_x, &env).unwrap();
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext);
        let out = ev.call(&f, vec![MacroValue::Num(7.0)]).map_err(Unwind::into_error).unwrap();
        assert_eq!(out.as_num(), Some(7.0));
        assert_eq!(env.get("x").unwrap().as_num(), Some(7.0));

        let g = eval_in(&bin(ident("z"), "->", ident("z")), &env).unwrap();
        ev.call(&g, vec![MacroValue::Num(3.0)]).map_err(Unwind::into_error).unwrap();
        assert!(env.get("z").is_err());
    }

    #[test]
    fn expired_deadline_stops_a_loop() {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext)
            .with_deadline(Some(Instant::now() + std::time::Duration::from_millis(20)));
        let spin = curly(vec![ident("while"), ident("true"), num("1")]);
        let err = ev
            .eval(&spin, &Env::root())
            .map_err(Unwind::into_error)
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Internal);
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn depth_limit_is_reported_not_overflowed() {
        let registry = MacroRegistry::new();
        let ev = Evaluator::new(&registry, &DefaultMacroContext).with_max_depth(32);
        let env = Env::root();
        let define = curly(vec![
            ident("fun"),
            ident("loop"),
            square(vec![ident("n")]),
            curly(vec![ident("loop"), ident("n")]),
        ]);
        ev.eval(&define, &env).map_err(Unwind::into_error).unwrap();
        let err = ev
            .eval(&curly(vec![ident("loop"), num("1")]), &env)
            .map_err(Unwind::into_error)
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Internal);
        assert!(err.to_string().contains("maximum depth"));
    }
}
