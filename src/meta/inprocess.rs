use tracing::trace;

use crate::ast::Node;
use crate::config::MetaConfig;
use crate::macros::{Expansion, MacroContext, MacroRegistry, MakrellMacro};
use crate::meta::MetaRuntime;
use crate::runtime::{Evaluator, DEFAULT_MAX_EVAL_DEPTH};
use crate::MakrellResult;

/// Evaluates macros on the calling thread. No isolation.
#[derive(Debug, Clone, Copy)]
pub struct InProcessMetaRuntime {
    max_depth: usize,
}

impl InProcessMetaRuntime {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }

    pub fn from_config(config: &MetaConfig) -> Self {
        Self::new().with_max_depth(config.max_eval_depth)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for InProcessMetaRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaRuntime for InProcessMetaRuntime {
    fn kind(&self) -> &'static str {
        "inprocess"
    }

    fn run_macro(
        &self,
        name: &str,
        def: &MakrellMacro,
        args: &[Node],
        registry: &MacroRegistry,
        ctx: &dyn MacroContext,
    ) -> MakrellResult<Expansion> {
        trace!(macro_name = name, "running macro in process");
        Evaluator::new(registry, ctx)
            .with_max_depth(self.max_depth)
            .run_macro(def, args)
    }
}
