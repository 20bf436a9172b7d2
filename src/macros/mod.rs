//! # Makrell Macro System
//!
//! Macros are AST-to-AST functions run at compile time. They come in two
//! flavours:
//!
//! - **Native** macros are host closures. They run in-process only.
//! - **Makrell** macros are `{def macro name [params] body…}` definitions,
//!   stored as data. Their bodies are interpreted by the macro-time evaluator
//!   in [`crate::runtime`], wherever the configured meta-runtime puts it.
//!
//! ## Layers
//!
//! - [`types`]: entries, expansions and the host context. No dependencies on
//!   the other macro modules.
//! - [`registry`]: the per-compilation name-to-entry table.
//! - [`expander`]: the compile-boundary walk that registers definitions and
//!   splices expansions in place of calls.
//!
//! **INVARIANT:** a registry belongs to exactly one compilation and is passed
//! by reference. There is no global macro table.
//!
//! Example:
//! ```rust
//! use makrell_meta::ast::{bin, curly, ident, num, square};
//! use makrell_meta::macros::Expander;
//! use makrell_meta::meta::InProcessMetaRuntime;
//!
//! let runtime = InProcessMetaRuntime::new();
//! let mut expander = Expander::new(&runtime);
//! let program = vec![
//!     curly(vec![
//!         ident("def"), ident("macro"), ident("twice"), square(vec![ident("x"), ident("y")]),
//!         curly(vec![ident("quote"), bin(curly(vec![ident("$"), ident("x")]), "*", num("2"))]),
//!     ]),
//!     curly(vec![ident("twice"), num("21")]),
//! ];
//! let out = expander.expand_program(&program).unwrap();
//! assert_eq!(out, vec![bin(num("21"), "*", num("2"))]);
//! ```

pub mod expander;
pub mod registry;
pub mod types;

pub use expander::Expander;
pub use registry::MacroRegistry;
pub use types::{
    DefaultMacroContext, Expansion, MacroContext, MacroEntry, MakrellMacro, NativeMacroFn,
    SerializedMacro, MAX_MACRO_RECURSION_DEPTH,
};
