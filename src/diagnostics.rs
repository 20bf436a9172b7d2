//! Unified, `miette`-based diagnostics for the Makrell meta core.
//!
//! Every failure produced by the macro evaluator, the expander, the pattern
//! matcher or a meta-runtime adapter is a [`MakrellError`]. Errors are built
//! with the `err_msg!` and `err_ctx!` macros so call sites never assemble an
//! [`ErrorContext`] by hand.
//!
//! - **Use `err_msg!` for message-only errors.**
//!   `err_msg!(Scope, "Unknown macro symbol: {}", name)`
//! - **Use `err_ctx!` when a node is at hand.** The node's span becomes the
//!   primary label and an optional help text can be attached.
//!   `err_ctx!(Shape, "fun args must be identifiers", node)`
//!
//! The early `return` of a macro or `fun` body is *not* an error and never
//! appears here; see `runtime::Unwind`.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::ast::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Convenience alias used across the crate.
pub type MakrellResult<T> = Result<T, MakrellError>;

/// Type-safe classification of a [`MakrellError`], used by tests and by
/// adapters that need to branch on the failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Unknown symbol, invalid assignment target
    Scope,
    /// Malformed macro/function/definition forms
    Shape,
    /// Invoking a non-callable value or a missing member
    Call,
    /// A value that cannot be turned into an AST node
    Coercion,
    /// Operand type errors (arithmetic on non-numbers, indexing non-lists)
    Type,
    /// Subprocess or worker failures
    Isolation,
    /// A failed `assert` inside a macro body
    Assertion,
    /// JSON wire format errors
    Serialization,
    /// Invalid configuration
    Config,
    /// Engine bugs
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Scope => "Scope",
            ErrorType::Shape => "Shape",
            ErrorType::Call => "Call",
            ErrorType::Coercion => "Coercion",
            ErrorType::Type => "Type",
            ErrorType::Isolation => "Isolation",
            ErrorType::Assertion => "Assertion",
            ErrorType::Serialization => "Serialization",
            ErrorType::Config => "Config",
            ErrorType::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    /// The source text this error points into (if any).
    pub source: Option<SourceArc>,
    /// The primary span for this error (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_span(span: Option<Span>) -> Self {
        Self {
            source: None,
            span,
            help: None,
        }
    }

    pub fn with_help(span: Option<Span>, help: impl Into<String>) -> Self {
        Self {
            source: None,
            span,
            help: Some(help.into()),
        }
    }
}

/// Unified error type for all failure modes of the meta core.
#[derive(Debug, Error)]
pub enum MakrellError {
    #[error("{message}")]
    Scope {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Shape {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Call {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Coercion {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Type {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Isolation {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("{message}")]
    Assertion {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl MakrellError {
    fn ctx(&self) -> &ErrorContext {
        match self {
            MakrellError::Scope { ctx, .. }
            | MakrellError::Shape { ctx, .. }
            | MakrellError::Call { ctx, .. }
            | MakrellError::Coercion { ctx, .. }
            | MakrellError::Type { ctx, .. }
            | MakrellError::Isolation { ctx, .. }
            | MakrellError::Assertion { ctx, .. }
            | MakrellError::Serialization { ctx, .. }
            | MakrellError::Config { ctx, .. }
            | MakrellError::Internal { ctx, .. } => ctx,
        }
    }

    /// The bare message, without the variant prefix added by `Display`.
    pub fn message(&self) -> &str {
        match self {
            MakrellError::Scope { message, .. }
            | MakrellError::Shape { message, .. }
            | MakrellError::Call { message, .. }
            | MakrellError::Coercion { message, .. }
            | MakrellError::Type { message, .. }
            | MakrellError::Isolation { message, .. }
            | MakrellError::Assertion { message, .. }
            | MakrellError::Serialization { message, .. }
            | MakrellError::Config { message, .. }
            | MakrellError::Internal { message, .. } => message,
        }
    }

    pub fn span(&self) -> Option<Span> {
        self.ctx().span
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            MakrellError::Scope { .. } => ErrorType::Scope,
            MakrellError::Shape { .. } => ErrorType::Shape,
            MakrellError::Call { .. } => ErrorType::Call,
            MakrellError::Coercion { .. } => ErrorType::Coercion,
            MakrellError::Type { .. } => ErrorType::Type,
            MakrellError::Isolation { .. } => ErrorType::Isolation,
            MakrellError::Assertion { .. } => ErrorType::Assertion,
            MakrellError::Serialization { .. } => ErrorType::Serialization,
            MakrellError::Config { .. } => ErrorType::Config,
            MakrellError::Internal { .. } => ErrorType::Internal,
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            MakrellError::Scope { ctx, .. }
            | MakrellError::Shape { ctx, .. }
            | MakrellError::Call { ctx, .. }
            | MakrellError::Coercion { ctx, .. }
            | MakrellError::Type { ctx, .. }
            | MakrellError::Isolation { ctx, .. }
            | MakrellError::Assertion { ctx, .. }
            | MakrellError::Serialization { ctx, .. }
            | MakrellError::Config { ctx, .. }
            | MakrellError::Internal { ctx, .. } => ctx,
        }
    }

    /// Attaches source text so `miette` can render the labelled span.
    pub fn with_source(mut self, name: &str, text: &str) -> Self {
        self.ctx_mut().source = Some(Arc::new(NamedSource::new(name, text.to_string())));
        self
    }

    /// Locates an error that has no span yet. Inner spans win.
    pub fn at(mut self, span: Option<Span>) -> Self {
        let ctx = self.ctx_mut();
        if ctx.span.is_none() {
            ctx.span = span;
        }
        self
    }
}

impl From<serde_json::Error> for MakrellError {
    fn from(err: serde_json::Error) -> Self {
        MakrellError::Serialization {
            message: err.to_string(),
            ctx: ErrorContext::none(),
            source: Some(Box::new(err)),
        }
    }
}

impl Diagnostic for MakrellError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!(
            "makrell::{}",
            self.error_type().as_str().to_lowercase()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.ctx().span?;
        let start = span.start.index;
        let len = span.end.index.saturating_sub(start).max(1);
        let label = LabeledSpan::new(Some(self.message().to_string()), start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Constructs a `MakrellError` variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::MakrellError::$variant {
            message: format!($fmt $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `MakrellError` variant located at a node's span, optionally
/// with a help message.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $node:expr, help = $help:expr) => {
        $crate::MakrellError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_help($node.span(), $help),
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $node:expr) => {
        $crate::MakrellError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_span($node.span()),
            source: None,
        }
    };
}
