//! Meta-runtime adapters: where a user-defined macro body actually runs.
//!
//! The expander only ever talks to a [`MetaRuntime`]; which one it gets is a
//! configuration choice.
//!
//! - [`InProcessMetaRuntime`] evaluates directly against the live registry.
//! - [`SubprocessMetaRuntime`] ships the macro to an isolated runner process
//!   over the JSON protocol in [`protocol`], and falls back to in-process
//!   evaluation when the host cannot spawn one.
//! - [`WorkerMetaRuntime`] posts requests over an async channel. Its result
//!   arrives later, so it only works with the async expander.
//!
//! Native macros never reach an adapter: they cannot be serialized and the
//! expander calls them directly.

pub mod inprocess;
pub mod protocol;
pub mod subprocess;
pub mod worker;

pub use inprocess::InProcessMetaRuntime;
pub use protocol::{MetaRequest, MetaResponse, WorkerRequest, WorkerResponse};
pub use subprocess::SubprocessMetaRuntime;
pub use worker::{spawn_meta_worker, WorkerMetaRuntime};

use tracing::debug;

use crate::ast::Node;
use crate::config::{MetaConfig, RuntimeKind};
use crate::macros::{Expansion, MacroContext, MacroRegistry, MakrellMacro};
use crate::{err_msg, MakrellResult};

/// Runs one user-defined macro invocation.
pub trait MetaRuntime {
    /// Short name used in logs.
    fn kind(&self) -> &'static str;

    /// Expands `name` over `args`. `registry` is the compilation's registry
    /// at the time of the call, so the body can call other macros by name.
    fn run_macro(
        &self,
        name: &str,
        def: &MakrellMacro,
        args: &[Node],
        registry: &MacroRegistry,
        ctx: &dyn MacroContext,
    ) -> MakrellResult<Expansion>;
}

/// Builds the synchronous adapter selected by `config`.
///
/// The worker adapter has no synchronous form; asking for it here is a
/// configuration error. Use [`spawn_meta_worker`] with
/// `Expander::expand_async` instead.
pub fn runtime_from_config(config: &MetaConfig) -> MakrellResult<Box<dyn MetaRuntime>> {
    debug!(runtime = config.runtime.as_str(), "selecting meta runtime");
    match config.runtime {
        RuntimeKind::InProcess => Ok(Box::new(InProcessMetaRuntime::from_config(config))),
        RuntimeKind::Subprocess => Ok(Box::new(SubprocessMetaRuntime::from_config(config))),
        RuntimeKind::Worker => Err(err_msg!(
            Config,
            "the worker meta runtime is async-only; spawn it with spawn_meta_worker and expand with expand_async"
        )),
    }
}
