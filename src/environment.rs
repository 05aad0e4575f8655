//! Scopes: lexically chained binding environments.
//!
//! A scope owns a symbol→value map and an ordered list of parent scopes.
//! Lookup consults the own map first, then each parent depth-first in
//! declaration order. `def` writes only to the scope itself; parents are
//! never mutated through a child.
//!
//! Scopes also carry the documentation the reader attaches: per-binding doc
//! strings and free-standing commentary blocks, both in definition order so
//! `doc` can replay them.
//!
//! A scope is cheap to clone (an `Arc` bump). The `RwLock` makes the handle
//! shareable with collaborator threads, which only read quiescent scopes.

use std::fmt;
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::language::Value;
use crate::symbol::Symbol;

/// An entry in a scope's documentation record, in definition order.
#[derive(Clone, Debug, PartialEq)]
pub enum DocEntry {
    /// Free-standing commentary promoted by the `_` placeholder.
    Commentary(String),
    /// A binding that has documentation attached.
    Binding(Symbol),
}

struct ScopeState {
    bindings: FxHashMap<Symbol, Value>,
    parents: Vec<Scope>,
    docs: FxHashMap<Symbol, String>,
    entries: Vec<DocEntry>,
}

#[derive(Clone)]
pub struct Scope {
    state: Arc<RwLock<ScopeState>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A new empty scope with no parents.
    pub fn new() -> Self {
        Scope::with_parents(Vec::new())
    }

    /// A new empty scope delegating lookup to `parents`, in order.
    pub fn with_parents(parents: Vec<Scope>) -> Self {
        Scope {
            state: Arc::new(RwLock::new(ScopeState {
                bindings: FxHashMap::default(),
                parents,
                docs: FxHashMap::default(),
                entries: Vec::new(),
            })),
        }
    }

    /// A new empty scope with this scope as its only parent.
    pub fn child(&self) -> Scope {
        Scope::with_parents(vec![self.clone()])
    }

    /// Look up a symbol, walking parents depth-first in declaration order.
    pub fn get(&self, sym: Symbol) -> Option<Value> {
        let state = self.state.read().unwrap();
        if let Some(value) = state.bindings.get(&sym) {
            return Some(value.clone());
        }
        for parent in &state.parents {
            if let Some(value) = parent.get(sym) {
                return Some(value);
            }
        }
        None
    }

    /// Bind a symbol in this scope, shadowing any parent binding.
    pub fn def(&self, sym: Symbol, value: Value) {
        let mut state = self.state.write().unwrap();
        state.bindings.insert(sym, value);
    }

    /// Documentation attached to a binding, falling through to parents.
    pub fn doc(&self, sym: Symbol) -> Option<String> {
        let state = self.state.read().unwrap();
        if let Some(text) = state.docs.get(&sym) {
            return Some(text.clone());
        }
        for parent in &state.parents {
            if let Some(text) = parent.doc(sym) {
                return Some(text);
            }
        }
        None
    }

    /// Attach documentation to a binding, recording definition order.
    pub fn set_doc(&self, sym: Symbol, text: String) {
        let mut state = self.state.write().unwrap();
        if state.docs.insert(sym, text).is_none() {
            state.entries.push(DocEntry::Binding(sym));
        }
    }

    /// Record a free-standing commentary block.
    pub fn add_commentary(&self, text: String) {
        let mut state = self.state.write().unwrap();
        state.entries.push(DocEntry::Commentary(text));
    }

    /// Documentation entries of this scope alone, in definition order.
    pub fn entries(&self) -> Vec<DocEntry> {
        self.state.read().unwrap().entries.clone()
    }

    pub fn parents(&self) -> Vec<Scope> {
        self.state.read().unwrap().parents.clone()
    }

    /// Snapshot of this scope's own bindings (parents excluded).
    pub fn own_bindings(&self) -> Vec<(Symbol, Value)> {
        let state = self.state.read().unwrap();
        state
            .bindings
            .iter()
            .map(|(sym, value)| (*sym, value.clone()))
            .collect()
    }
}

/// Structural equality over bindings and parents; documentation does not
/// participate, so `(make-env)` always equals `(make-env)`.
impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.state, &other.state) {
            return true;
        }
        let a = self.state.read().unwrap();
        let b = other.state.read().unwrap();
        a.bindings == b.bindings && a.parents == b.parents
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<env>")
    }
}
