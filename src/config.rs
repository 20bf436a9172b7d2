//! Meta-runtime configuration.
//!
//! Settings come from a `[meta]` table in a TOML document and can be
//! overridden by `MAKRELL_META_*` environment variables. Every field has a
//! default, so an empty document is a valid configuration.
//!
//! ```rust
//! use makrell_meta::config::{MetaConfig, RuntimeKind};
//! let config = MetaConfig::from_toml_str("[meta]\nruntime = \"subprocess\"\n").unwrap();
//! assert_eq!(config.runtime, RuntimeKind::Subprocess);
//! assert_eq!(config.subprocess_timeout_ms, 30_000);
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::macros::MAX_MACRO_RECURSION_DEPTH;
use crate::runtime::DEFAULT_MAX_EVAL_DEPTH;
use crate::{err_msg, MakrellError, MakrellResult};

pub const ENV_RUNTIME: &str = "MAKRELL_META_RUNTIME";
pub const ENV_RUNNER: &str = "MAKRELL_META_RUNNER";
pub const ENV_TIMEOUT_MS: &str = "MAKRELL_META_TIMEOUT_MS";
pub const ENV_WORKER_TIMEOUT_MS: &str = "MAKRELL_META_WORKER_TIMEOUT_MS";
pub const ENV_MAX_DEPTH: &str = "MAKRELL_META_MAX_DEPTH";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Where user-defined macro bodies run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    #[default]
    InProcess,
    Subprocess,
    Worker,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::InProcess => "inprocess",
            RuntimeKind::Subprocess => "subprocess",
            RuntimeKind::Worker => "worker",
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = MakrellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inprocess" | "in-process" => Ok(RuntimeKind::InProcess),
            "subprocess" => Ok(RuntimeKind::Subprocess),
            "worker" => Ok(RuntimeKind::Worker),
            other => Err(err_msg!(Config, "unknown meta runtime '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    pub runtime: RuntimeKind,
    /// The isolated runner program. When unset the subprocess adapter looks
    /// for `makrell-meta-runner` next to the current executable.
    pub runner: Option<PathBuf>,
    pub runner_args: Vec<String>,
    pub subprocess_timeout_ms: u64,
    pub worker_timeout_ms: u64,
    pub max_eval_depth: usize,
    pub max_expansion_depth: usize,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeKind::default(),
            runner: None,
            runner_args: Vec::new(),
            subprocess_timeout_ms: DEFAULT_TIMEOUT_MS,
            worker_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
            max_expansion_depth: MAX_MACRO_RECURSION_DEPTH,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    meta: MetaConfig,
}

impl MetaConfig {
    /// Reads the `[meta]` table of a TOML document. A missing table yields
    /// the defaults.
    pub fn from_toml_str(text: &str) -> MakrellResult<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| MakrellError::Config {
            message: e.message().to_string(),
            ctx: crate::ErrorContext::none(),
            source: Some(Box::new(e)),
        })?;
        Ok(file.meta)
    }

    /// Defaults plus `MAKRELL_META_*` overrides.
    pub fn from_env() -> MakrellResult<Self> {
        Self::default().apply_env()
    }

    /// Applies `MAKRELL_META_*` overrides from the process environment.
    pub fn apply_env(self) -> MakrellResult<Self> {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup; `apply_env` uses the process
    /// environment.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> MakrellResult<Self> {
        if let Some(kind) = lookup(ENV_RUNTIME) {
            self.runtime = kind.parse()?;
        }
        if let Some(runner) = lookup(ENV_RUNNER).filter(|r| !r.is_empty()) {
            self.runner = Some(PathBuf::from(runner));
        }
        if let Some(ms) = lookup(ENV_TIMEOUT_MS) {
            self.subprocess_timeout_ms = parse_number(ENV_TIMEOUT_MS, &ms)?;
        }
        if let Some(ms) = lookup(ENV_WORKER_TIMEOUT_MS) {
            self.worker_timeout_ms = parse_number(ENV_WORKER_TIMEOUT_MS, &ms)?;
        }
        if let Some(depth) = lookup(ENV_MAX_DEPTH) {
            self.max_eval_depth = parse_number(ENV_MAX_DEPTH, &depth)?;
        }
        Ok(self)
    }

    pub fn subprocess_timeout(&self) -> Duration {
        Duration::from_millis(self.subprocess_timeout_ms)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }
}

fn parse_number<T: FromStr>(key: &str, text: &str) -> MakrellResult<T> {
    text.trim()
        .parse()
        .map_err(|_| err_msg!(Config, "{} must be a non-negative integer, got '{}'", key, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = MetaConfig::from_toml_str("").unwrap();
        assert_eq!(config, MetaConfig::default());
        assert_eq!(config.max_expansion_depth, 128);
        assert_eq!(config.max_eval_depth, 512);
    }

    #[test]
    fn reads_meta_table() {
        let config = MetaConfig::from_toml_str(
            r#"
            [meta]
            runtime = "worker"
            runner = "/opt/makrell/runner"
            runner_args = ["--log-level", "debug"]
            worker_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.runtime, RuntimeKind::Worker);
        assert_eq!(config.runner, Some(PathBuf::from("/opt/makrell/runner")));
        assert_eq!(config.runner_args.len(), 2);
        assert_eq!(config.worker_timeout(), Duration::from_millis(250));
        assert_eq!(config.subprocess_timeout_ms, 30_000);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = MetaConfig::from_toml_str("[meta]\nruntime = \"elsewhere\"").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[test]
    fn overlay_overrides_fields() {
        let config = MetaConfig::default()
            .overlay(|key| match key {
                ENV_RUNTIME => Some("subprocess".into()),
                ENV_TIMEOUT_MS => Some("1500".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.runtime, RuntimeKind::Subprocess);
        assert_eq!(config.subprocess_timeout_ms, 1500);

        let err = MetaConfig::default()
            .overlay(|key| (key == ENV_MAX_DEPTH).then(|| "deep".to_string()))
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
