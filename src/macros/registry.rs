//! Macro registry for storage and lookup of macro definitions.
//!
//! # Error Handling
//!
//! Registration never fails. Lookups return `Option`; the expander turns a
//! missing macro into "not a macro call" rather than an error.
//!
//! # Macro Types
//! - **Native macros**: host functions (not serializable).
//! - **Makrell macros**: `{params, body}` data, serializable.
//!
//! # Features
//! - Register and look up macros by name (case-sensitive).
//! - Re-registering a name replaces the entry but keeps its original position.
//! - Iteration order is insertion order.
//! - Only Makrell macros are serialized; native macros are dropped because
//!   they cannot cross a process boundary.
//!
//! # Thread Safety
//! A registry belongs to one compilation. Native entries are `Send + Sync`, so
//! a registry may be moved to another thread, but it is never shared.
//!
//! # Serialization Example
//! ```rust
//! use makrell_meta::ast::{ident, num, bin};
//! use makrell_meta::macros::MacroRegistry;
//! let mut reg = MacroRegistry::new();
//! reg.register_makrell("inc", vec!["ns".into()], vec![bin(ident("n"), "+", num("1"))]);
//! reg.register_native("noop", |args, _ctx| {
//!     Ok(makrell_meta::macros::Expansion::Nodes(args.to_vec()))
//! });
//! let wire = reg.serialize();
//! assert_eq!(wire.len(), 1);
//! assert_eq!(wire[0].name, "inc");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ast::Node;
use crate::macros::types::{
    Expansion, MacroContext, MacroEntry, MakrellMacro, NativeMacroFn, SerializedMacro,
};
use crate::MakrellResult;

/// Name to macro entry, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    entries: Vec<(String, MacroEntry)>,
    index: HashMap<String, usize>,
}

impl MacroRegistry {
    /// Creates a new, empty macro registry.
    ///
    /// ```rust
    /// use makrell_meta::macros::MacroRegistry;
    /// let registry = MacroRegistry::new();
    /// assert!(registry.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host-implemented macro.
    ///
    /// Returns the previous entry under this name, if any.
    pub fn register_native<F>(&mut self, name: &str, func: F) -> Option<MacroEntry>
    where
        F: Fn(&[Node], &dyn MacroContext) -> MakrellResult<Expansion> + Send + Sync + 'static,
    {
        debug!(macro_name = name, "registering native macro");
        let func: NativeMacroFn = Arc::new(func);
        self.insert(name, MacroEntry::Native(func))
    }

    /// Registers a user-defined macro from its parameter names and body.
    ///
    /// Returns the previous entry under this name, if any.
    pub fn register_makrell(
        &mut self,
        name: &str,
        params: Vec<String>,
        body: Vec<Node>,
    ) -> Option<MacroEntry> {
        debug!(
            macro_name = name,
            params = ?params,
            statements = body.len(),
            "registering makrell macro"
        );
        self.insert(
            name,
            MacroEntry::Makrell(Arc::new(MakrellMacro::new(params, body))),
        )
    }

    fn insert(&mut self, name: &str, entry: MacroEntry) -> Option<MacroEntry> {
        match self.index.get(name) {
            Some(&slot) => Some(std::mem::replace(&mut self.entries[slot].1, entry)),
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), entry));
                None
            }
        }
    }

    /// Looks up a macro by name.
    pub fn get_entry(&self, name: &str) -> Option<&MacroEntry> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All entries, in the order they were first registered.
    ///
    /// ```rust
    /// use makrell_meta::macros::MacroRegistry;
    /// let mut reg = MacroRegistry::new();
    /// reg.register_makrell("b", vec![], vec![]);
    /// reg.register_makrell("a", vec![], vec![]);
    /// let names: Vec<_> = reg.entries().map(|(name, _)| name).collect();
    /// assert_eq!(names, ["b", "a"]);
    /// ```
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MacroEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The Makrell entries as wire records. Native entries are dropped.
    pub fn serialize(&self) -> Vec<SerializedMacro> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| entry.as_makrell().map(|def| SerializedMacro::new(name, def)))
            .collect()
    }

    /// Builds a registry holding exactly the given serialized macros.
    pub fn from_serialized(entries: &[SerializedMacro]) -> Self {
        let mut registry = Self::new();
        registry.import_serialized(entries, None);
        registry
    }

    /// Re-registers exported macros, optionally restricted to `only`.
    ///
    /// Returns the number of macros imported.
    pub fn import_serialized(&mut self, entries: &[SerializedMacro], only: Option<&[&str]>) -> usize {
        let mut imported = 0;
        for entry in entries {
            if only.is_some_and(|names| !names.contains(&entry.name.as_str())) {
                continue;
            }
            self.register_makrell(&entry.name, entry.params.clone(), entry.body.clone());
            imported += 1;
        }
        imported
    }
}
