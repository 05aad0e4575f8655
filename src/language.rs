//! Core value model.
//!
//! Every runtime value is a variant of [`Value`], a closed tagged sum. All
//! values are immutable except scopes; sharing is by `Arc`, so cloning a
//! value is cheap. Equality is structural throughout.
//!
//! Pairs come in two flavors with identical payloads: `Pair` evaluates as a
//! combination, while `InertPair` (the `[...]` literal) evaluates its head
//! and tail and yields a `Pair`: it is the list-construction literal. In
//! pattern position the two are interchangeable.

use std::fmt;
use std::sync::Arc;

use crate::environment::Scope;
use crate::interpreter::{Cont, Step};
use crate::runtime::{Context, Thunk, ThunkPath};
use crate::symbol::Symbol;

// ============================================================================
// Cells
// ============================================================================

/// Payload shared by `Pair` and `InertPair`.
#[derive(Clone, Debug, PartialEq)]
pub struct PairCell {
    pub head: Value,
    pub tail: Value,
}

/// An interpreted operative: formals pattern, eformal, body, captured scope.
#[derive(Clone)]
pub struct OperativeCell {
    pub formals: Value,
    pub eformal: Value,
    pub body: Value,
    pub scope: Scope,
}

impl PartialEq for OperativeCell {
    fn eq(&self, other: &Self) -> bool {
        self.formals == other.formals
            && self.eformal == other.eformal
            && self.body == other.body
            && self.scope == other.scope
    }
}

/// The host-side implementation of a native combiner. Receives the operand
/// tree (unevaluated for operatives, the evaluated argument list when the
/// native sits under an applicative wrapper), the dynamic scope, and the
/// caller's continuation.
pub type NativeImpl = Arc<dyn Fn(&Context, Value, &Scope, Cont) -> Step + Send + Sync>;

/// A native operative. Compared by name, not by function identity, so that
/// structurally identical grounds compare equal.
#[derive(Clone)]
pub struct NativeCell {
    pub name: String,
    /// Formals hint shown by `doc`, e.g. `(x)` or `[f category]`.
    pub formals: String,
    pub func: NativeImpl,
}

impl NativeCell {
    pub fn new(
        name: impl Into<String>,
        formals: impl Into<String>,
        func: impl Fn(&Context, Value, &Scope, Cont) -> Step + Send + Sync + 'static,
    ) -> Self {
        NativeCell {
            name: name.into(),
            formals: formals.into(),
            func: Arc::new(func),
        }
    }
}

impl PartialEq for NativeCell {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for NativeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCell")
            .field("name", &self.name)
            .field("formals", &self.formals)
            .finish()
    }
}

/// A reader-produced wrapper attaching a comment to a form. Evaluates its
/// inner form; the comment then becomes documentation for the resulting
/// binding, or scope commentary when the form is the `_` placeholder.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedCell {
    pub comment: String,
    pub form: Value,
}

// ============================================================================
// Value
// ============================================================================

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Symbol(Symbol),
    Keyword(Symbol),
    Ignore,
    Empty,
    Pair(Arc<PairCell>),
    InertPair(Arc<PairCell>),
    Env(Scope),
    Operative(Arc<OperativeCell>),
    Native(Arc<NativeCell>),
    /// Wraps exactly one combiner; arguments are evaluated before the
    /// underlying combiner runs.
    Applicative(Arc<Value>),
    Annotated(Arc<AnnotatedCell>),
    Thunk(Arc<Thunk>),
    ThunkPath(Arc<ThunkPath>),
}

impl Value {
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn keyword(name: &str) -> Value {
        Value::Keyword(Symbol::new(name))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    /// The falsy set is `false`, `null`, `()`, and `""`; everything else is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(false) | Value::Null | Value::Empty => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_) | Value::InertPair(_))
    }

    /// A list is Empty or a pair chain (of either flavor) ending in Empty.
    pub fn is_list(&self) -> bool {
        let mut current = self;
        loop {
            match current {
                Value::Empty => return true,
                Value::Pair(cell) | Value::InertPair(cell) => current = &cell.tail,
                _ => return false,
            }
        }
    }

    pub fn is_operative(&self) -> bool {
        matches!(self, Value::Operative(_) | Value::Native(_))
    }

    pub fn is_applicative(&self) -> bool {
        matches!(self, Value::Applicative(_))
    }

    pub fn is_combiner(&self) -> bool {
        self.is_operative() || self.is_applicative()
    }

    /// Kind name used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Ignore => "ignore",
            Value::Empty => "empty list",
            Value::Pair(_) => "pair",
            Value::InertPair(_) => "inert pair",
            Value::Env(_) => "env",
            Value::Operative(_) | Value::Native(_) => "operative",
            Value::Applicative(_) => "applicative",
            Value::Annotated(_) => "annotated form",
            Value::Thunk(_) => "thunk",
            Value::ThunkPath(_) => "thunk path",
        }
    }
}

// ============================================================================
// Construction helpers
// ============================================================================

pub fn cons(head: Value, tail: Value) -> Value {
    Value::Pair(Arc::new(PairCell { head, tail }))
}

pub fn inert_cons(head: Value, tail: Value) -> Value {
    Value::InertPair(Arc::new(PairCell { head, tail }))
}

/// Build a proper Pair list.
pub fn list_from(items: Vec<Value>) -> Value {
    items
        .into_iter()
        .rev()
        .fold(Value::Empty, |tail, head| cons(head, tail))
}

/// Build a proper InertPair list, as the `[...]` literal does.
pub fn inert_list_from(items: Vec<Value>) -> Value {
    items
        .into_iter()
        .rev()
        .fold(Value::Empty, |tail, head| inert_cons(head, tail))
}

/// Collect a proper list (of either pair flavor) into a Vec. Returns `None`
/// for improper lists and non-lists.
pub fn proper_list(value: &Value) -> Option<Vec<Value>> {
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Empty => return Some(items),
            Value::Pair(cell) | Value::InertPair(cell) => {
                items.push(cell.head.clone());
                current = &cell.tail;
            }
            _ => return None,
        }
    }
}

// ============================================================================
// Equality
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Ignore, Value::Ignore) => true,
            (Value::Empty, Value::Empty) => true,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::InertPair(a), Value::InertPair(b)) => a == b,
            (Value::Env(a), Value::Env(b)) => a == b,
            (Value::Operative(a), Value::Operative(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Applicative(a), Value::Applicative(b)) => a == b,
            (Value::Annotated(a), Value::Annotated(b)) => a == b,
            (Value::Thunk(a), Value::Thunk(b)) => a == b,
            (Value::ThunkPath(a), Value::ThunkPath(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Display
// ============================================================================

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\u{0008}' => result.push_str("\\b"),
            '\u{000C}' => result.push_str("\\f"),
            '\u{000B}' => result.push_str("\\v"),
            '\u{0007}' => result.push_str("\\a"),
            c => result.push(c),
        }
    }
    result
}

/// Print a pair chain, continuing while the tail keeps the same flavor and
/// falling back to dotted-tail notation otherwise, so output re-reads as the
/// same value.
fn write_chain(f: &mut fmt::Formatter<'_>, value: &Value, inert: bool) -> fmt::Result {
    let (open, close) = if inert { ('[', ']') } else { ('(', ')') };
    write!(f, "{open}")?;
    let mut current = value.clone();
    loop {
        let cell = match (&current, inert) {
            (Value::Pair(cell), false) | (Value::InertPair(cell), true) => cell.clone(),
            _ => unreachable!("write_chain starts on a pair of the right flavor"),
        };
        write!(f, "{}", cell.head)?;
        match (&cell.tail, inert) {
            (Value::Empty, _) => break,
            (Value::Pair(_), false) | (Value::InertPair(_), true) => {
                write!(f, " ")?;
                current = cell.tail.clone();
            }
            (other, _) => {
                write!(f, " . {other}")?;
                break;
            }
        }
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Symbol(sym) => write!(f, "{sym}"),
            Value::Keyword(sym) => write!(f, ":{sym}"),
            Value::Ignore => write!(f, "_"),
            Value::Empty => write!(f, "()"),
            Value::Pair(_) => write_chain(f, self, false),
            Value::InertPair(_) => write_chain(f, self, true),
            Value::Env(_) => write!(f, "<env>"),
            Value::Operative(_) => write!(f, "<op>"),
            Value::Native(cell) => write!(f, "<op: {}>", cell.name),
            Value::Applicative(inner) => match inner.as_ref() {
                Value::Native(cell) => write!(f, "<fn: {}>", cell.name),
                _ => write!(f, "<fn>"),
            },
            Value::Annotated(cell) => write!(f, "{}", cell.form),
            Value::Thunk(thunk) => write!(f, "{thunk}"),
            Value::ThunkPath(path) => write!(f, "{path}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_the_falsy_set() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Empty.is_truthy());
        assert!(!Value::string("").is_truthy());

        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::Ignore.is_truthy());
        assert!(cons(Value::Int(1), Value::Empty).is_truthy());
    }

    #[test]
    fn list_predicate_walks_both_flavors() {
        let proper = cons(Value::Int(1), inert_cons(Value::Int(2), Value::Empty));
        assert!(proper.is_list());
        assert!(Value::Empty.is_list());
        assert!(!cons(Value::Int(1), Value::Int(2)).is_list());
        assert!(!Value::Null.is_list());
    }

    #[test]
    fn pair_and_inert_pair_are_distinct() {
        let pair = cons(Value::Int(1), Value::Empty);
        let inert = inert_cons(Value::Int(1), Value::Empty);
        assert_ne!(pair, inert);
        assert!(pair.is_pair());
        assert!(inert.is_pair());
    }

    #[test]
    fn display_round_trip_shapes() {
        assert_eq!(
            list_from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]).to_string(),
            "(1 2 3)"
        );
        assert_eq!(
            inert_list_from(vec![Value::symbol("a"), Value::Int(2)]).to_string(),
            "[a 2]"
        );
        assert_eq!(cons(Value::Int(1), Value::Int(2)).to_string(), "(1 . 2)");
        assert_eq!(
            cons(Value::Int(1), inert_cons(Value::Int(2), Value::Empty)).to_string(),
            "(1 . [2])"
        );
        assert_eq!(Value::string("a\"b\n").to_string(), "\"a\\\"b\\n\"");
        assert_eq!(Value::keyword("out").to_string(), ":out");
    }

    #[test]
    fn proper_list_rejects_improper_tails() {
        assert_eq!(
            proper_list(&list_from(vec![Value::Int(1), Value::Int(2)])),
            Some(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(proper_list(&cons(Value::Int(1), Value::Int(2))), None);
        assert_eq!(proper_list(&Value::Empty), Some(vec![]));
    }

    #[test]
    fn natives_compare_by_name() {
        let a = NativeCell::new("cons", "(a d)", |_, _, _, cont| {
            cont.call(Value::Null)
        });
        let b = NativeCell::new("cons", "(a d)", |_, _, _, cont| {
            cont.call(Value::Bool(true))
        });
        assert_eq!(a, b);
    }
}
