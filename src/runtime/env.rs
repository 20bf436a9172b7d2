//! Lexical environments for macro-time evaluation.
//!
//! An [`Env`] is a frame of bindings with an optional parent. Frames are
//! reference counted so closures can keep their defining frame alive after the
//! call that created it has returned.
//!
//! `set` is assignment-like: it updates the nearest existing binding anywhere
//! up the chain and only declares a new local binding when the name is unbound
//! everywhere. `define` always binds in the local frame and is used for
//! parameters.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::value::MacroValue;
use crate::{err_msg, MakrellResult};

#[derive(Debug, Default)]
pub struct Env {
    own: RefCell<HashMap<String, MacroValue>>,
    parent: Option<Rc<Env>>,
}

impl Env {
    /// A root frame with no parent.
    pub fn root() -> Rc<Env> {
        Rc::new(Env::default())
    }

    /// A fresh frame whose lookups fall back to `parent`.
    pub fn child(parent: &Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            own: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn has(&self, name: &str) -> bool {
        if self.own.borrow().contains_key(name) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.has(name))
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.own.borrow().contains_key(name)
    }

    /// Looks `name` up through the chain.
    ///
    /// ```rust
    /// use makrell_meta::runtime::{Env, MacroValue};
    /// let env = Env::root();
    /// assert!(env.get("nope").is_err());
    /// env.set("x", MacroValue::Num(1.0));
    /// assert!(matches!(env.get("x"), Ok(MacroValue::Num(n)) if n == 1.0));
    /// ```
    pub fn get(&self, name: &str) -> MakrellResult<MacroValue> {
        if let Some(value) = self.own.borrow().get(name) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.get(name),
            None => Err(err_msg!(Scope, "Unknown macro symbol: {}", name)),
        }
    }

    /// Updates the nearest existing binding, else declares `name` locally.
    pub fn set(&self, name: &str, value: MacroValue) {
        if self.has_local(name) {
            self.own.borrow_mut().insert(name.to_string(), value);
            return;
        }
        if let Some(parent) = &self.parent {
            if parent.has(name) {
                parent.set(name, value);
                return;
            }
        }
        self.own.borrow_mut().insert(name.to_string(), value);
    }

    /// Binds `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: &str, value: MacroValue) {
        self.own.borrow_mut().insert(name.to_string(), value);
    }
}
