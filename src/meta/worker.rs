//! Worker-channel adapter.
//!
//! Requests go out as [`WorkerRequest`]s on one channel and replies come back
//! as [`WorkerResponse`]s on another, in whatever order the worker finishes
//! them. A dispatcher task routes each reply to the waiter registered under
//! its id.
//!
//! ```text
//!  run_macro ──(id, payload)──> requests ──> worker task ──> evaluate
//!      ^                                                        │
//!      └── oneshot <── pending[id] <── dispatcher <── responses ┘
//! ```
//!
//! Replies can only be awaited, so [`WorkerMetaRuntime::run_macro`] is async
//! and the synchronous [`MetaRuntime`] impl refuses to run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::{debug, trace, warn};

use crate::ast::Node;
use crate::config::MetaConfig;
use crate::macros::{Expansion, MacroContext, MacroRegistry, MakrellMacro, SerializedMacro};
use crate::meta::protocol::{MetaRequest, MetaResponse, WorkerRequest, WorkerResponse};
use crate::meta::MetaRuntime;
use crate::{err_msg, MakrellResult};

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<WorkerResponse>>>>;

pub struct WorkerMetaRuntime {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
}

impl WorkerMetaRuntime {
    /// Attaches to an existing worker through its two channels.
    ///
    /// Must be called inside a tokio runtime: the reply dispatcher is
    /// spawned onto it.
    pub fn connect(
        requests: mpsc::UnboundedSender<WorkerRequest>,
        mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
        timeout: Duration,
    ) -> Self {
        let pending: Pending = Arc::default();
        let table = Arc::clone(&pending);
        task::spawn(async move {
            while let Some(reply) = responses.recv().await {
                let waiter = lock(&table).remove(&reply.id);
                match waiter {
                    Some(tx) => {
                        trace!(id = %reply.id, ok = reply.body.ok, "routing worker reply");
                        let _ = tx.send(reply);
                    }
                    None => warn!(id = %reply.id, "dropping worker reply with no waiter"),
                }
            }
            // Worker gone: dropping the senders wakes every waiter.
            lock(&table).clear();
        });
        Self {
            requests,
            pending,
            next_id: AtomicU64::new(0),
            timeout,
        }
    }

    fn next_id(&self) -> String {
        format!("m{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Number of requests still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Posts a macro call to the worker and waits for the matching reply.
    pub async fn run_macro(
        &self,
        name: &str,
        def: &MakrellMacro,
        args: &[Node],
        registry: &MacroRegistry,
    ) -> MakrellResult<Expansion> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), tx);

        let request = WorkerRequest {
            id: id.clone(),
            payload: MetaRequest {
                target: SerializedMacro::new(name, def),
                args: args.to_vec(),
                registry: registry.serialize(),
            },
        };
        debug!(id = %id, macro_name = name, "posting macro to worker");
        if self.requests.send(request).is_err() {
            lock(&self.pending).remove(&id);
            return Err(worker_error("request channel is closed"));
        }

        let reply = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(worker_error(format!("no reply for {}, worker stopped", id))),
            Err(_) => {
                lock(&self.pending).remove(&id);
                warn!(id = %id, timeout_ms = self.timeout.as_millis() as u64, "worker reply timed out");
                return Err(worker_error(format!(
                    "no reply for {} within {} ms",
                    id,
                    self.timeout.as_millis()
                )));
            }
        };

        match reply.body {
            MetaResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            MetaResponse { ok: true, .. } => Err(worker_error("reply has no result")),
            MetaResponse { error, .. } => {
                Err(worker_error(error.unwrap_or_else(|| "unknown error".to_string())))
            }
        }
    }
}

impl MetaRuntime for WorkerMetaRuntime {
    fn kind(&self) -> &'static str {
        "worker"
    }

    fn run_macro(
        &self,
        name: &str,
        _def: &MakrellMacro,
        _args: &[Node],
        _registry: &MacroRegistry,
        _ctx: &dyn MacroContext,
    ) -> MakrellResult<Expansion> {
        warn!(macro_name = name, "worker adapter used from a synchronous expander");
        Err(worker_error("worker adapter requires an async compile pipeline"))
    }
}

/// Starts an in-process worker task and returns an adapter connected to it.
///
/// Every request gets its own task and is evaluated on tokio's blocking
/// pool, so a slow macro holds up only its own reply. Evaluation is cut off
/// at the worker timeout, which frees the blocking thread once the waiter
/// has given up. Must be called inside a tokio runtime.
pub fn spawn_meta_worker(config: &MetaConfig) -> WorkerMetaRuntime {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
    let (response_tx, response_rx) = mpsc::unbounded_channel::<WorkerResponse>();
    let max_depth = config.max_eval_depth;
    let timeout = config.worker_timeout();

    task::spawn(async move {
        while let Some(request) = request_rx.recv().await {
            let replies = response_tx.clone();
            let deadline = Instant::now().checked_add(timeout);
            task::spawn(async move {
                let id = request.id.clone();
                let body = task::spawn_blocking(move || {
                    MetaResponse::from_result(request.payload.evaluate(max_depth, deadline))
                })
                .await
                .unwrap_or_else(|join_err| MetaResponse::failure(join_err.to_string()));
                if replies.send(WorkerResponse { id, body }).is_err() {
                    trace!("worker reply dropped, adapter is gone");
                }
            });
        }
        debug!("meta worker stopped");
    });

    WorkerMetaRuntime::connect(request_tx, response_rx, timeout)
}

fn worker_error(detail: impl std::fmt::Display) -> crate::MakrellError {
    err_msg!(Isolation, "meta worker error: {}", detail)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
