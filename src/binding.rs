//! Destructuring binder.
//!
//! Binds a formals pattern tree against an operand tree, writing bindings
//! into a scope. The same relation backs `def` and operative formals, so
//! `(def (a . bs) ...)` and `(op (a . bs) ...)` speak one pattern language.
//! Pair and InertPair patterns are interchangeable, both supporting dotted
//! rest-bindings.
//!
//! On mismatch the error carries the pattern and operand *subtrees* at the
//! point of failure, not the roots.

use crate::environment::Scope;
use crate::error::Error;
use crate::language::Value;

pub fn bind(scope: &Scope, pattern: &Value, operand: &Value) -> Result<(), Error> {
    match pattern {
        Value::Ignore => Ok(()),
        Value::Symbol(sym) => {
            scope.def(*sym, operand.clone());
            Ok(())
        }
        Value::Empty => match operand {
            Value::Empty => Ok(()),
            _ => Err(mismatch(pattern, operand)),
        },
        Value::Pair(need) | Value::InertPair(need) => match operand {
            Value::Pair(have) | Value::InertPair(have) => {
                bind(scope, &need.head, &have.head)?;
                bind(scope, &need.tail, &have.tail)
            }
            _ => Err(mismatch(pattern, operand)),
        },
        // Any other pattern matches only its structural equal and binds
        // nothing.
        _ => {
            if pattern == operand {
                Ok(())
            } else {
                Err(mismatch(pattern, operand))
            }
        }
    }
}

fn mismatch(need: &Value, have: &Value) -> Error {
    Error::BindMismatch {
        need: need.clone(),
        have: have.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{cons, inert_list_from, list_from};
    use crate::symbol::Symbol;

    fn get(scope: &Scope, name: &str) -> Option<Value> {
        scope.get(Symbol::new(name))
    }

    #[test]
    fn symbol_binds_anything() {
        let scope = Scope::new();
        bind(&scope, &Value::symbol("x"), &Value::Int(7)).unwrap();
        assert_eq!(get(&scope, "x"), Some(Value::Int(7)));
    }

    #[test]
    fn ignore_binds_nothing() {
        let scope = Scope::new();
        bind(&scope, &Value::Ignore, &Value::Int(7)).unwrap();
        assert!(scope.own_bindings().is_empty());
    }

    #[test]
    fn dotted_tail_takes_the_rest() {
        let scope = Scope::new();
        let pattern = cons(Value::symbol("a"), Value::symbol("bs"));
        let operand = list_from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        bind(&scope, &pattern, &operand).unwrap();
        assert_eq!(get(&scope, "a"), Some(Value::Int(1)));
        assert_eq!(
            get(&scope, "bs"),
            Some(list_from(vec![Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn inert_pattern_matches_pair_operand() {
        let scope = Scope::new();
        let pattern = inert_list_from(vec![Value::symbol("x"), Value::symbol("y")]);
        let operand = list_from(vec![Value::Int(1), Value::Int(2)]);
        bind(&scope, &pattern, &operand).unwrap();
        assert_eq!(get(&scope, "x"), Some(Value::Int(1)));
        assert_eq!(get(&scope, "y"), Some(Value::Int(2)));
    }

    #[test]
    fn empty_matches_only_empty() {
        let scope = Scope::new();
        bind(&scope, &Value::Empty, &Value::Empty).unwrap();

        let err = bind(&scope, &Value::Empty, &Value::Int(1)).unwrap_err();
        assert_eq!(
            err,
            Error::BindMismatch {
                need: Value::Empty,
                have: Value::Int(1),
            }
        );
    }

    #[test]
    fn mismatch_reports_the_failing_subtrees() {
        let scope = Scope::new();
        // (a b) against (1): the inner (b) pattern meets an empty operand
        let pattern = list_from(vec![Value::symbol("a"), Value::symbol("b")]);
        let operand = list_from(vec![Value::Int(1)]);
        let err = bind(&scope, &pattern, &operand).unwrap_err();
        assert_eq!(
            err,
            Error::BindMismatch {
                need: list_from(vec![Value::symbol("b")]),
                have: Value::Empty,
            }
        );
        // the partial binding before the failure still landed
        assert_eq!(get(&scope, "a"), Some(Value::Int(1)));
    }

    #[test]
    fn atom_patterns_match_by_equality() {
        let scope = Scope::new();
        bind(&scope, &Value::Int(1), &Value::Int(1)).unwrap();
        assert!(bind(&scope, &Value::Int(1), &Value::Int(2)).is_err());
        bind(&scope, &Value::keyword("k"), &Value::keyword("k")).unwrap();
    }
}
