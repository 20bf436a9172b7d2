//! JSON wire protocol shared by the isolated runner and the worker.
//!
//! A request carries the target macro, its argument nodes and every
//! serializable registry entry, so the far side can rebuild the registry and
//! let the target call its peers by name.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::Node;
use crate::macros::{Expansion, SerializedMacro};
use crate::runtime::evaluate_serialized;
use crate::MakrellResult;

/// `{target, args, registry}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRequest {
    pub target: SerializedMacro,
    pub args: Vec<Node>,
    #[serde(default)]
    pub registry: Vec<SerializedMacro>,
}

/// `{ok:true, result}` or `{ok:false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Expansion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetaResponse {
    pub fn success(result: Expansion) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(outcome: MakrellResult<Expansion>) -> Self {
        match outcome {
            Ok(expansion) => Self::success(expansion),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

/// Worker request: `{id, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: String,
    pub payload: MetaRequest,
}

/// Worker reply: `{id, ok, result?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: String,
    #[serde(flatten)]
    pub body: MetaResponse,
}

impl MetaRequest {
    /// Evaluates the request in this process, giving up once `deadline`
    /// has passed.
    pub fn evaluate(&self, max_depth: usize, deadline: Option<Instant>) -> MakrellResult<Expansion> {
        debug!(
            target_macro = %self.target.name,
            args = self.args.len(),
            registry = self.registry.len(),
            "evaluating meta request"
        );
        evaluate_serialized(&self.target, &self.args, &self.registry, max_depth, deadline)
    }
}

/// Handles one request document end to end. Malformed input becomes an
/// `{ok:false}` response rather than an error so the caller always has
/// something to write back.
pub fn handle_request_line(line: &str, max_depth: usize) -> MetaResponse {
    let outcome = serde_json::from_str::<MetaRequest>(line)
        .map_err(Into::into)
        .and_then(|request| request.evaluate(max_depth, None));
    MetaResponse::from_result(outcome)
}
