//! The shared evaluation context.
//!
//! Fragments loaded in one call chain share a [`Context`]. Top-level `let`
//! bindings and assignments land here, so helpers defined by an ancestor
//! fragment are visible to descendant fragments and to computed fields. The
//! context is mutable on purpose: it is the one escape hatch for state that
//! must outlive a single evaluation (counters, memoized values).
//!
//! Cloning a `Context` shares it. Functions hold a [`WeakContext`] so that a
//! helper stored in the context does not keep the context alive.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;

type Bindings = RefCell<BTreeMap<String, Value>>;

/// Shared, mutable name bindings visible to fragments and computed fields.
///
/// # Examples
///
/// ```
/// use strata::{Context, Value};
///
/// let context = Context::new();
/// let alias = context.clone();
/// alias.set("course", "CIS 162");
/// assert_eq!(context.get("course"), Some(Value::from("CIS 162")));
/// ```
#[derive(Clone, Default)]
pub struct Context {
    bindings: Rc<Bindings>,
}

impl Context {
    /// A fresh, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.bindings.borrow_mut().insert(name.to_string(), value.into());
    }

    /// True if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Remove a binding, returning its value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.bindings.borrow_mut().remove(name)
    }

    /// All bound names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    /// True if both handles refer to the same context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.bindings, &other.bindings)
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Rc::downgrade(&self.bindings))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("names", &self.names()).finish()
    }
}

/// A non-owning handle to a [`Context`].
#[derive(Clone, Default)]
pub struct WeakContext(Weak<Bindings>);

impl WeakContext {
    /// The context, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Context> {
        self.0.upgrade().map(|bindings| Context { bindings })
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakContext")
    }
}
