//! Macro-time runtime: environments, values and the evaluator that runs
//! user-defined macro bodies.

pub mod builtins;
pub mod env;
pub mod eval;
pub mod members;
pub mod quasiquote;
pub mod value;

pub use env::Env;
pub use eval::{apply_operator, EvalResult, Evaluator, Unwind, DEFAULT_MAX_EVAL_DEPTH};
pub use value::{Closure, ClosureKind, MacroValue, NativeFn};

use std::time::Instant;

use crate::ast::Node;
use crate::macros::{DefaultMacroContext, Expansion, MacroContext, MacroRegistry, MakrellMacro, SerializedMacro};
use crate::MakrellResult;

/// Runs a user-defined macro in this process.
pub fn run_makrell_macro(
    def: &MakrellMacro,
    args: &[Node],
    registry: &MacroRegistry,
    ctx: &dyn MacroContext,
) -> MakrellResult<Expansion> {
    Evaluator::new(registry, ctx).run_macro(def, args)
}

/// Runs a serialized macro against a registry rebuilt from its serialized
/// peers. This is what the isolated runner and the worker execute.
pub fn evaluate_serialized(
    target: &SerializedMacro,
    args: &[Node],
    registry: &[SerializedMacro],
    max_depth: usize,
    deadline: Option<Instant>,
) -> MakrellResult<Expansion> {
    let registry = MacroRegistry::from_serialized(registry);
    Evaluator::new(&registry, &DefaultMacroContext)
        .with_max_depth(max_depth)
        .with_deadline(deadline)
        .run_macro(&target.to_macro(), args)
}
