//! Pattern hooks: embedder-supplied pattern forms.
//!
//! A hook that claims a pattern gets it before any built-in handling,
//! including `$r` and `$type`. The `next` continuation re-enters the full
//! matcher (hooks included), so a hook can delegate its sub-patterns.

use crate::ast::value::Value;
use crate::ast::Node;
use crate::patterns::MatchEnv;

/// Continuation back into the matcher.
pub type Next<'a> = &'a dyn Fn(&Value, &Node, MatchEnv) -> Option<MatchEnv>;

pub trait PatternHook: Send + Sync {
    fn name(&self) -> &str;

    /// True if this hook takes over `pattern`.
    fn can_handle(&self, pattern: &Node) -> bool;

    /// Matches `value` against a claimed pattern. `None` means no match.
    fn match_value(&self, value: &Value, pattern: &Node, env: MatchEnv, next: Next<'_>) -> Option<MatchEnv>;
}

type CanHandleFn = dyn Fn(&Node) -> bool + Send + Sync;
type MatchFn = dyn Fn(&Value, &Node, MatchEnv, Next<'_>) -> Option<MatchEnv> + Send + Sync;

/// A hook assembled from two closures.
///
/// ```rust
/// use makrell_meta::ast::{curly, ident, num};
/// use makrell_meta::ast::value::Value;
/// use makrell_meta::patterns::{FnHook, PatternMatcher};
///
/// let mut matcher = PatternMatcher::new();
/// matcher.register_hook(FnHook::new(
///     "even",
///     |p| p.is_curly_headed("$even"),
///     |v, _p, env, _next| (v.as_number()? % 2.0 == 0.0).then_some(env),
/// ));
/// let even = curly(vec![ident("$even")]);
/// assert!(matcher.match_pattern(&Value::Number(4.0), &even));
/// assert!(!matcher.match_pattern(&Value::Number(3.0), &even));
/// ```
pub struct FnHook {
    name: String,
    can_handle: Box<CanHandleFn>,
    matcher: Box<MatchFn>,
}

impl FnHook {
    pub fn new(
        name: impl Into<String>,
        can_handle: impl Fn(&Node) -> bool + Send + Sync + 'static,
        matcher: impl Fn(&Value, &Node, MatchEnv, Next<'_>) -> Option<MatchEnv> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            can_handle: Box::new(can_handle),
            matcher: Box::new(matcher),
        }
    }
}

impl PatternHook for FnHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, pattern: &Node) -> bool {
        (self.can_handle)(pattern)
    }

    fn match_value(&self, value: &Value, pattern: &Node, env: MatchEnv, next: Next<'_>) -> Option<MatchEnv> {
        (self.matcher)(value, pattern, env, next)
    }
}
