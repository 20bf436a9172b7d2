//! Macro expansion at the compile boundary.
//!
//! The expander walks a statement list in source order. For each node:
//!
//! 1. `{def macro name [params] body…}` registers a Makrell macro and
//!    produces nothing.
//! 2. A curly form whose head names a registered macro is expanded. Native
//!    macros are called directly, Makrell macros go through the configured
//!    [`MetaRuntime`]. The result (zero, one or many nodes) is spliced in
//!    place of the call and expanded again.
//! 3. Anything else is descended into.
//!
//! Definitions must textually precede their first use; the walk is strictly
//! in order, so that holds without any extra bookkeeping.
//!
//! ## Error Handling
//!
//! Shape errors for malformed definitions, errors raised by the macro itself,
//! and an `Internal` error once nested expansion exceeds the configured
//! depth. Errors without a location are located at the macro call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::ast::Node;
use crate::config::MetaConfig;
use crate::macros::registry::MacroRegistry;
use crate::macros::types::{
    DefaultMacroContext, MacroContext, MacroEntry, MAX_MACRO_RECURSION_DEPTH,
};
use crate::meta::{MetaRuntime, WorkerMetaRuntime};
use crate::{err_ctx, MakrellResult};

type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Expands macros for one compilation.
pub struct Expander<'r> {
    registry: MacroRegistry,
    ctx: Box<dyn MacroContext>,
    runtime: &'r dyn MetaRuntime,
    max_depth: usize,
}

impl<'r> Expander<'r> {
    pub fn new(runtime: &'r dyn MetaRuntime) -> Self {
        Self {
            registry: MacroRegistry::new(),
            ctx: Box::new(DefaultMacroContext),
            runtime,
            max_depth: MAX_MACRO_RECURSION_DEPTH,
        }
    }

    pub fn from_config(runtime: &'r dyn MetaRuntime, config: &MetaConfig) -> Self {
        Self::new(runtime).with_max_depth(config.max_expansion_depth)
    }

    /// Starts from an existing registry, e.g. one with native macros or
    /// imported definitions.
    pub fn with_registry(mut self, registry: MacroRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_context(mut self, ctx: impl MacroContext + 'static) -> Self {
        self.ctx = Box::new(ctx);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MacroRegistry {
        &mut self.registry
    }

    pub fn into_registry(self) -> MacroRegistry {
        self.registry
    }

    /// Expands a whole program.
    pub fn expand_program(&mut self, nodes: &[Node]) -> MakrellResult<Vec<Node>> {
        self.expand_block(nodes, 0)
    }

    /// Registers `node` if it is a macro definition.
    ///
    /// Returns `false` for anything that is not shaped like
    /// `{def macro …}` with at least a name, a parameter list and one body
    /// statement.
    pub fn register_macro_def(&mut self, node: &Node) -> MakrellResult<bool> {
        let Node::Curly { nodes, .. } = node else {
            return Ok(false);
        };
        if nodes.len() < 5 || !nodes[0].is_ident("def") || !nodes[1].is_ident("macro") {
            return Ok(false);
        }
        let (Some(name), Node::Square { nodes: params, .. }) = (nodes[2].as_ident(), &nodes[3])
        else {
            return Err(err_ctx!(
                Shape,
                "Macro definition must be {def macro name [params] ...}",
                node
            ));
        };
        let params = params
            .iter()
            .map(|p| {
                p.as_ident()
                    .map(str::to_string)
                    .ok_or_else(|| err_ctx!(Shape, "Macro params must be identifiers", p))
            })
            .collect::<MakrellResult<Vec<_>>>()?;
        self.registry.register_makrell(name, params, nodes[4..].to_vec());
        Ok(true)
    }

    /// Expands `node` once if it is a call to a registered macro.
    pub fn expand_call(&self, node: &Node) -> MakrellResult<Option<Vec<Node>>> {
        let Some((name, entry, args)) = self.lookup_call(node) else {
            return Ok(None);
        };
        let expansion = match &entry {
            MacroEntry::Native(func) => func(args, self.ctx.as_ref()),
            MacroEntry::Makrell(def) => {
                self.runtime
                    .run_macro(name, def, args, &self.registry, self.ctx.as_ref())
            }
        }
        .map_err(|e| e.at(node.span()))?;
        let nodes = expansion.into_nodes();
        let runtime = if entry.is_native() { "native" } else { self.runtime.kind() };
        debug!(
            macro_name = name,
            runtime,
            produced = nodes.len(),
            "expanded macro call"
        );
        Ok(Some(nodes))
    }

    fn lookup_call<'n>(&self, node: &'n Node) -> Option<(&'n str, MacroEntry, &'n [Node])> {
        let Node::Curly { nodes, .. } = node else {
            return None;
        };
        let name = nodes.first().and_then(Node::as_ident)?;
        let entry = self.registry.get_entry(name)?.clone();
        Some((name, entry, &nodes[1..]))
    }

    fn check_depth(&self, node: &Node, depth: usize) -> MakrellResult<()> {
        if depth >= self.max_depth {
            return Err(err_ctx!(
                Internal,
                format!("Macro expansion exceeded maximum depth of {}", self.max_depth),
                node
            ));
        }
        Ok(())
    }

    fn expand_block(&mut self, nodes: &[Node], depth: usize) -> MakrellResult<Vec<Node>> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            out.extend(self.expand_node(node, depth)?);
        }
        Ok(out)
    }

    fn expand_node(&mut self, node: &Node, depth: usize) -> MakrellResult<Vec<Node>> {
        if self.register_macro_def(node)? {
            return Ok(Vec::new());
        }
        if let Some(expanded) = self.expand_call(node)? {
            self.check_depth(node, depth)?;
            return self.expand_block(&expanded, depth + 1);
        }
        match node {
            Node::Binop {
                left,
                op,
                right,
                loc,
            } => {
                let left = single(node, self.expand_node(left, depth)?)?;
                let right = single(node, self.expand_node(right, depth)?)?;
                Ok(vec![Node::Binop {
                    left: Arc::new(left),
                    op: op.clone(),
                    right: Arc::new(right),
                    loc: *loc,
                }])
            }
            _ => match (node.bracket_kind(), node.children()) {
                (Some(kind), Some(children)) => {
                    let children = self.expand_block(children, depth)?;
                    Ok(vec![Node::brackets(kind, children, node.span())])
                }
                _ => Ok(vec![node.clone()]),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Async walk, for the worker adapter
    // ------------------------------------------------------------------------

    /// Expands a whole program, running Makrell macros on `worker`.
    ///
    /// Native macros still run in-process.
    pub async fn expand_async(
        &mut self,
        nodes: &[Node],
        worker: &WorkerMetaRuntime,
    ) -> MakrellResult<Vec<Node>> {
        self.expand_block_async(nodes, worker, 0).await
    }

    fn expand_block_async<'a>(
        &'a mut self,
        nodes: &'a [Node],
        worker: &'a WorkerMetaRuntime,
        depth: usize,
    ) -> LocalFuture<'a, MakrellResult<Vec<Node>>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(nodes.len());
            for node in nodes {
                out.extend(self.expand_node_async(node, worker, depth).await?);
            }
            Ok(out)
        })
    }

    fn expand_node_async<'a>(
        &'a mut self,
        node: &'a Node,
        worker: &'a WorkerMetaRuntime,
        depth: usize,
    ) -> LocalFuture<'a, MakrellResult<Vec<Node>>> {
        Box::pin(async move {
            if self.register_macro_def(node)? {
                return Ok(Vec::new());
            }
            if let Some((name, entry, args)) = self.lookup_call(node) {
                let expansion = match &entry {
                    MacroEntry::Native(func) => func(args, self.ctx.as_ref()),
                    MacroEntry::Makrell(def) => {
                        worker.run_macro(name, def, args, &self.registry).await
                    }
                }
                .map_err(|e| e.at(node.span()))?;
                let expanded = expansion.into_nodes();
                debug!(macro_name = name, produced = expanded.len(), "expanded macro call");
                self.check_depth(node, depth)?;
                return self.expand_block_async(&expanded, worker, depth + 1).await;
            }
            match node {
                Node::Binop {
                    left,
                    op,
                    right,
                    loc,
                } => {
                    let l = self.expand_node_async(left, worker, depth).await?;
                    let r = self.expand_node_async(right, worker, depth).await?;
                    Ok(vec![Node::Binop {
                        left: Arc::new(single(node, l)?),
                        op: op.clone(),
                        right: Arc::new(single(node, r)?),
                        loc: *loc,
                    }])
                }
                _ => match (node.bracket_kind(), node.children()) {
                    (Some(kind), Some(children)) => {
                        let children = self.expand_block_async(children, worker, depth).await?;
                        Ok(vec![Node::brackets(kind, children, node.span())])
                    }
                    _ => Ok(vec![node.clone()]),
                },
            }
        })
    }
}

/// An operand position holds exactly one node.
fn single(binop: &Node, mut nodes: Vec<Node>) -> MakrellResult<Node> {
    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        n => Err(err_ctx!(
            Shape,
            format!("Macro expansion in operand position produced {} nodes, expected 1", n),
            binop
        )),
    }
}
