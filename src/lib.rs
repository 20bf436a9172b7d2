pub use crate::diagnostics::{ErrorContext, ErrorType, MakrellError, MakrellResult};

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod macros;
pub mod meta;
pub mod patterns;
pub mod runtime;
