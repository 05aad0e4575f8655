//! Interned symbols.
//!
//! Symbols are identifiers interned in a global pool so that lookup and
//! equality are cheap `Copy` comparisons. Equality remains structural by
//! name: interning the same name twice yields the same `Symbol`.

use std::fmt;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static POOL: Lazy<RwLock<StringInterner<DefaultBackend>>> =
    Lazy::new(|| RwLock::new(StringInterner::default()));

/// An identifier interned in the global symbol pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    /// Intern a name, returning its symbol.
    pub fn new(name: &str) -> Self {
        let mut pool = POOL.write().unwrap();
        Symbol(pool.get_or_intern(name))
    }

    /// Resolve the symbol back to an owned name.
    pub fn name(&self) -> String {
        self.with_name(str::to_owned)
    }

    /// Run a function over the name without allocating.
    pub fn with_name<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let pool = POOL.read().unwrap();
        let s = pool.resolve(self.0).expect("symbol interned in pool");
        f(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_name(|s| write!(f, "{s}"))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_name(|s| write!(f, "Symbol({s})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_symbol() {
        assert_eq!(Symbol::new("foo"), Symbol::new("foo"));
    }

    #[test]
    fn different_names_differ() {
        assert_ne!(Symbol::new("foo"), Symbol::new("bar"));
    }

    #[test]
    fn name_round_trips() {
        assert_eq!(Symbol::new("wrap").name(), "wrap");
    }

    #[test]
    fn with_name_borrows() {
        let len = Symbol::new("eval").with_name(str::len);
        assert_eq!(len, 4);
    }

    #[test]
    fn display_is_the_name() {
        assert_eq!(format!("{}", Symbol::new("list*")), "list*");
    }
}
