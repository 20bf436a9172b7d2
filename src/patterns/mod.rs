//! Structural pattern matching over run-time values.
//!
//! Patterns are ordinary [`Node`] trees. The generated program embeds them as
//! JSON and hands them, with the scrutinee, to an injected matcher function;
//! [`match_json`] is that function's entry point on this side.
//!
//! ## Pattern forms
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `_` | anything |
//! | `$` | any truthy value |
//! | `true` / `false` / `null` | that literal |
//! | other identifier, string | that exact string |
//! | number | numerically equal number |
//! | `()` | `null` |
//! | `(p)` | `p` |
//! | `(p q …)`, `p \| q` | first alternative that matches |
//! | `[p q …]` | a list of exactly that length, element-wise |
//! | `p & q` | both, bindings from `p` visible to `q` |
//! | `_ : T` | a value of type `T` (see [`check_type`]) |
//! | `name = p` | `p`, then binds the value to `name` |
//! | `{$r …}` | see [`regular`] |
//! | `{$type T …}` | see [`typector`] |
//! | any other binop | value-level expression over `$`, see [`expr`] |
//!
//! Registered [`PatternHook`]s are consulted before all of the above.

use tracing::trace;

use crate::ast::value::Value;
use crate::ast::Node;
use crate::MakrellResult;

pub mod expr;
pub mod hooks;
pub mod regular;
pub mod typector;

pub use expr::eval_with_value;
pub use hooks::{FnHook, Next, PatternHook};
pub use typector::check_type;

/// Name of the matcher function generated code calls.
pub const MATCH_FN_NAME: &str = "__mr_matchPattern";

/// Bindings produced by a successful match.
///
/// Persistent, so trying an alternative against a copy is cheap.
pub type MatchEnv = im::HashMap<String, Value>;

/// The matcher plus its hook list. Newest hooks are consulted first.
#[derive(Default)]
pub struct PatternMatcher {
    hooks: Vec<Box<dyn PatternHook>>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook ahead of every hook registered before it.
    pub fn register_hook(&mut self, hook: impl PatternHook + 'static) {
        self.hooks.insert(0, Box::new(hook));
    }

    pub fn clear_hooks(&mut self) {
        self.hooks.clear();
    }

    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|h| h.name())
    }

    pub fn match_pattern(&self, value: &Value, pattern: &Node) -> bool {
        self.match_with_env(value, pattern, MatchEnv::new()).is_some()
    }

    /// Matches and returns the resulting bindings, or `None` on failure.
    ///
    /// ```rust
    /// use makrell_meta::ast::{bin, ident, square, num};
    /// use makrell_meta::ast::value::Value;
    /// use makrell_meta::patterns::{MatchEnv, PatternMatcher};
    ///
    /// let pattern = square(vec![bin(ident("a"), "=", ident("_")), num("2")]);
    /// let value = Value::List(vec![Value::from("x"), Value::Number(2.0)]);
    /// let env = PatternMatcher::new().match_with_env(&value, &pattern, MatchEnv::new()).unwrap();
    /// assert_eq!(env.get("a"), Some(&Value::from("x")));
    /// ```
    pub fn match_with_env(&self, value: &Value, pattern: &Node, env: MatchEnv) -> Option<MatchEnv> {
        if let Some(hook) = self.hooks.iter().find(|h| h.can_handle(pattern)) {
            trace!(hook = hook.name(), pattern = %pattern.pretty(), "pattern hook claimed pattern");
            let next = |v: &Value, p: &Node, e: MatchEnv| self.match_with_env(v, p, e);
            return hook.match_value(value, pattern, env, &next);
        }
        self.match_builtin(value, pattern, env)
    }

    fn match_builtin(&self, value: &Value, pattern: &Node, env: MatchEnv) -> Option<MatchEnv> {
        let matched = |ok: bool, env: MatchEnv| ok.then_some(env);
        match pattern {
            Node::Identifier { value: name, .. } => match name.as_str() {
                "_" => Some(env),
                "$" => matched(value.is_truthy(), env),
                "true" => matched(*value == Value::Bool(true), env),
                "false" => matched(*value == Value::Bool(false), env),
                "null" => matched(value.is_null(), env),
                other => matched(value.as_str() == Some(other), env),
            },
            Node::String { value: text, .. } => matched(value.as_str() == Some(text.as_str()), env),
            Node::Number { .. } => matched(value.as_number() == pattern.number_value(), env),
            Node::Round { nodes, .. } => match nodes.len() {
                0 => matched(value.is_null(), env),
                1 => self.match_with_env(value, &nodes[0], env),
                _ => nodes
                    .iter()
                    .find_map(|alt| self.match_with_env(value, alt, env.clone())),
            },
            Node::Square { nodes, .. } => {
                let items = value.as_list()?;
                if items.len() != nodes.len() {
                    return None;
                }
                items
                    .iter()
                    .zip(nodes.iter())
                    .try_fold(env, |env, (item, sub)| self.match_with_env(item, sub, env))
            }
            Node::Curly { nodes, .. } => match nodes.first().and_then(Node::as_ident) {
                Some("$r") => regular::match_regular(self, value, &nodes[1..], env),
                Some("$type") => typector::match_type_ctor(self, value, nodes, env),
                _ => None,
            },
            Node::Binop {
                left, op, right, ..
            } => self.match_binop(value, pattern, left, op, right, env),
            _ => None,
        }
    }

    fn match_binop(
        &self,
        value: &Value,
        pattern: &Node,
        left: &Node,
        op: &str,
        right: &Node,
        env: MatchEnv,
    ) -> Option<MatchEnv> {
        match op {
            "|" => self
                .match_with_env(value, left, env.clone())
                .or_else(|| self.match_with_env(value, right, env)),
            "&" => {
                let env = self.match_with_env(value, left, env)?;
                self.match_with_env(value, right, env)
            }
            ":" if left.is_ident("_") && right.as_ident().is_some() => {
                let type_name = right.as_ident()?;
                check_type(value, type_name).then_some(env)
            }
            "=" => {
                let name = left.as_ident()?;
                let mut env = self.match_with_env(value, right, env)?;
                env.insert(name.to_string(), value.clone());
                Some(env)
            }
            _ => eval_with_value(pattern, value).is_truthy().then_some(env),
        }
    }
}

/// Matches JSON data against a JSON-encoded pattern.
pub fn match_json(
    matcher: &PatternMatcher,
    value: &serde_json::Value,
    pattern: &serde_json::Value,
) -> MakrellResult<bool> {
    let pattern: Node = serde_json::from_value(pattern.clone())?;
    Ok(matcher.match_pattern(&Value::from_json(value), &pattern))
}

/// Renders the call generated code makes for `{match value pattern}`.
///
/// ```rust
/// use makrell_meta::ast::ident;
/// use makrell_meta::patterns::render_match_call;
/// let call = render_match_call("x", &ident("_")).unwrap();
/// assert_eq!(call, r#"__mr_matchPattern(x, {"kind":"identifier","value":"_"})"#);
/// ```
pub fn render_match_call(value_expr: &str, pattern: &Node) -> MakrellResult<String> {
    Ok(format!(
        "{}({}, {})",
        MATCH_FN_NAME,
        value_expr,
        serde_json::to_string(pattern)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{bin, ident, num, round, string};

    #[test]
    fn identifiers_are_literals_not_binders() {
        let m = PatternMatcher::new();
        assert!(m.match_pattern(&Value::from("x"), &ident("x")));
        assert!(!m.match_pattern(&Value::from("y"), &ident("x")));
        assert!(m.match_pattern(&Value::Null, &ident("null")));
        assert!(!m.match_pattern(&Value::Bool(false), &ident("null")));
        assert!(m.match_pattern(&Value::Number(2.0), &num("2.0")));
        assert!(!m.match_pattern(&Value::from("2"), &num("2")));
        assert!(m.match_pattern(&Value::from("2"), &string("2")));
    }

    #[test]
    fn round_forms() {
        let m = PatternMatcher::new();
        assert!(m.match_pattern(&Value::Null, &round(vec![])));
        let alts = round(vec![num("1"), num("2"), num("3")]);
        assert!(m.match_pattern(&Value::Number(3.0), &alts));
        assert!(!m.match_pattern(&Value::Number(4.0), &alts));
    }

    #[test]
    fn alternatives_do_not_leak_bindings() {
        let m = PatternMatcher::new();
        let pattern = bin(
            bin(ident("a"), "=", num("1")),
            "|",
            bin(ident("b"), "=", ident("_")),
        );
        let env = m.match_with_env(&Value::Number(5.0), &pattern, MatchEnv::new()).unwrap();
        assert!(env.get("a").is_none());
        assert_eq!(env.get("b"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn type_guard_and_conjunction() {
        let m = PatternMatcher::new();
        let int_over_two = bin(
            bin(ident("_"), ":", ident("int")),
            "&",
            bin(ident("$"), ">", num("2")),
        );
        assert!(m.match_pattern(&Value::Number(3.0), &int_over_two));
        assert!(!m.match_pattern(&Value::Number(2.0), &int_over_two));
        assert!(!m.match_pattern(&Value::Number(3.5), &int_over_two));
    }

    #[test]
    fn json_entry_point() {
        let m = PatternMatcher::new();
        let pattern = serde_json::to_value(bin(ident("_"), ":", ident("str"))).unwrap();
        assert!(match_json(&m, &serde_json::json!("hi"), &pattern).unwrap());
        assert!(!match_json(&m, &serde_json::json!(1), &pattern).unwrap());
        assert!(match_json(&m, &serde_json::json!(1), &serde_json::json!({"nope": 1})).is_err());
    }
}
