//! Out-of-process adapter.
//!
//! Each macro call spawns the runner, writes one [`MetaRequest`] document to
//! its stdin and reads one [`MetaResponse`] from its stdout. The call blocks
//! until the child exits or the timeout expires; on timeout the child is
//! killed.
//!
//! A host that cannot spawn the runner (no runner configured or found, or
//! spawning is not supported here) evaluates in-process instead. That
//! fallback is logged at `warn` and is not an error. A runner that is known
//! but fails to start is an isolation error.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::ast::Node;
use crate::config::{MetaConfig, ENV_RUNNER};
use crate::macros::{Expansion, MacroContext, MacroRegistry, MakrellMacro, SerializedMacro};
use crate::meta::inprocess::InProcessMetaRuntime;
use crate::meta::protocol::{MetaRequest, MetaResponse};
use crate::meta::MetaRuntime;
use crate::{err_msg, MakrellError, MakrellResult};

/// File name of the runner binary shipped with this crate.
pub const RUNNER_NAME: &str = "makrell-meta-runner";

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct SubprocessMetaRuntime {
    runner: Option<PathBuf>,
    runner_args: Vec<String>,
    timeout: Duration,
    fallback: InProcessMetaRuntime,
}

impl SubprocessMetaRuntime {
    /// Uses the configured runner, else `MAKRELL_META_RUNNER`, else a
    /// `makrell-meta-runner` next to the current executable.
    pub fn from_config(config: &MetaConfig) -> Self {
        Self {
            runner: config.runner.clone().or_else(locate_runner),
            runner_args: config.runner_args.clone(),
            timeout: config.subprocess_timeout(),
            fallback: InProcessMetaRuntime::from_config(config),
        }
    }

    /// Uses an explicit runner program.
    pub fn with_runner(runner: impl Into<PathBuf>) -> Self {
        let config = MetaConfig::default();
        Self {
            runner: Some(runner.into()),
            runner_args: Vec::new(),
            timeout: config.subprocess_timeout(),
            fallback: InProcessMetaRuntime::from_config(&config),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn runner(&self) -> Option<&PathBuf> {
        self.runner.as_ref()
    }

    fn spawn(&self, program: &PathBuf) -> io::Result<Child> {
        Command::new(program)
            .args(&self.runner_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }

    /// Runs the request in a child process and returns its raw output.
    fn exchange(&self, mut child: Child, payload: String) -> MakrellResult<(ExitStatus, String, String)> {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        if let Some(mut stdin) = child.stdin.take() {
            // Written off-thread so a child that never reads cannot outlive
            // the timeout. Dropping the handle closes the pipe.
            thread::spawn(move || {
                if let Err(err) = stdin.write_all(payload.as_bytes()) {
                    debug!(error = %err, "meta subprocess closed stdin early");
                }
            });
        }

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(pid = child.id(), timeout_ms = self.timeout.as_millis() as u64, "killing meta subprocess");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(err_msg!(
                        Isolation,
                        "meta subprocess failed: timed out after {} ms",
                        self.timeout.as_millis()
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(subprocess_failed(err)),
            }
        };
        Ok((status, collect(stdout), collect(stderr)))
    }
}

impl MetaRuntime for SubprocessMetaRuntime {
    fn kind(&self) -> &'static str {
        "subprocess"
    }

    fn run_macro(
        &self,
        name: &str,
        def: &MakrellMacro,
        args: &[Node],
        registry: &MacroRegistry,
        ctx: &dyn MacroContext,
    ) -> MakrellResult<Expansion> {
        let Some(program) = &self.runner else {
            warn!(macro_name = name, "no meta runner available, evaluating in process");
            return self.fallback.run_macro(name, def, args, registry, ctx);
        };

        let request = MetaRequest {
            target: SerializedMacro::new(name, def),
            args: args.to_vec(),
            registry: registry.serialize(),
        };
        let payload = serde_json::to_string(&request)?;

        let child = match self.spawn(program) {
            Ok(child) => child,
            Err(err) if cannot_spawn(&err) => {
                warn!(
                    macro_name = name,
                    runner = %program.display(),
                    error = %err,
                    "cannot spawn meta runner, evaluating in process"
                );
                return self.fallback.run_macro(name, def, args, registry, ctx);
            }
            Err(err) => return Err(subprocess_failed(err)),
        };

        debug!(macro_name = name, pid = child.id(), bytes = payload.len(), "meta subprocess spawned");

        let (status, stdout, stderr) = self.exchange(child, payload)?;
        debug!(macro_name = name, status = %status, "meta subprocess exited");
        interpret_output(status.success(), &stdout, &stderr)
    }
}

/// Turns a finished child's exit state and output into the macro result.
pub fn interpret_output(success: bool, stdout: &str, stderr: &str) -> MakrellResult<Expansion> {
    let text = stdout.trim();
    if !success {
        let reported = serde_json::from_str::<MetaResponse>(text)
            .ok()
            .and_then(|response| response.error);
        let detail = reported.unwrap_or_else(|| match stderr.trim() {
            "" => "runner exited with a failure status".to_string(),
            err => err.to_string(),
        });
        return Err(err_msg!(Isolation, "meta subprocess failed: {}", detail));
    }
    if text.is_empty() {
        return Err(err_msg!(Isolation, "meta subprocess returned empty output"));
    }
    let response: MetaResponse = serde_json::from_str(text).map_err(|e| MakrellError::Isolation {
        message: format!("meta subprocess error: unreadable output: {}", e),
        ctx: crate::ErrorContext::none(),
        source: Some(Box::new(e)),
    })?;
    match response {
        MetaResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        MetaResponse { ok: true, .. } => Err(err_msg!(Isolation, "meta subprocess error: response has no result")),
        MetaResponse { error, .. } => Err(err_msg!(
            Isolation,
            "meta subprocess error: {}",
            error.unwrap_or_else(|| "unknown error".to_string())
        )),
    }
}

/// Only a host without process support falls back. A runner path that does
/// not exist is a configuration mistake and must not silently lose isolation.
fn cannot_spawn(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Unsupported
}

fn subprocess_failed(err: io::Error) -> MakrellError {
    MakrellError::Isolation {
        message: format!("meta subprocess failed: {}", err),
        ctx: crate::ErrorContext::none(),
        source: Some(Box::new(err)),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = pipe.read_to_string(&mut text);
            text
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn locate_runner() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_RUNNER).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let exe = std::env::current_exe().ok()?;
    let file = format!("{}{}", RUNNER_NAME, std::env::consts::EXE_SUFFIX);
    // Test binaries live one level below the runner, in `deps/`.
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}
