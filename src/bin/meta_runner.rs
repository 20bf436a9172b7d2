//! Isolated meta runner: evaluates one macro request per process.
//!
//! Reads a JSON request from stdin, writes a JSON response to stdout and
//! exits 0 on `{ok:true}`, 1 on `{ok:false}`. Logs go to stderr.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use makrell_meta::config::MetaConfig;
use makrell_meta::meta::protocol::{handle_request_line, MetaResponse};
use tracing::{debug, Level};

#[derive(Debug, Parser)]
#[command(
    name = "makrell-meta-runner",
    version,
    about = "Runs one Makrell macro request from stdin in an isolated process."
)]
struct Args {
    /// Log level for diagnostics on stderr (error, warn, info, debug, trace, off).
    #[arg(long, env = "MAKRELL_META_LOG", default_value = "warn")]
    log_level: String,

    /// A TOML file with a `[meta]` table.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the evaluator depth limit.
    #[arg(long)]
    max_depth: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let response = match load_config(&args) {
        Ok(config) => {
            let mut input = String::new();
            match io::stdin().read_to_string(&mut input) {
                Ok(_) => handle_request_line(&input, config.max_eval_depth),
                Err(err) => MetaResponse::failure(format!("cannot read request: {}", err)),
            }
        }
        Err(err) => MetaResponse::failure(err.to_string()),
    };
    debug!(ok = response.ok, "meta request handled");

    let line = match serde_json::to_string(&response) {
        Ok(line) => line,
        Err(err) => {
            eprintln!("cannot encode response: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = io::stdout().lock();
    if writeln!(stdout, "{}", line).and_then(|_| stdout.flush()).is_err() {
        return ExitCode::FAILURE;
    }
    if response.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_config(args: &Args) -> makrell_meta::MakrellResult<MetaConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| makrell_meta::MakrellError::Config {
                message: format!("cannot read {}: {}", path.display(), e),
                ctx: makrell_meta::ErrorContext::none(),
                source: Some(Box::new(e)),
            })?;
            MetaConfig::from_toml_str(&text)?
        }
        None => MetaConfig::default(),
    }
    .apply_env()?;
    if let Some(depth) = args.max_depth {
        config.max_eval_depth = depth;
    }
    Ok(config)
}

fn init_logging(level: &str) {
    if level.eq_ignore_ascii_case("off") {
        return;
    }
    let level = level.parse::<Level>().unwrap_or(Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
