//! Tests for the derived standard library and the `op` constructor's
//! staged destructuring errors.

use perch::language::{cons, list_from};
use perch::{eval_source, standard_scope, Context, Error, Scope, Symbol, Value};

fn test_scope(ctx: &Context) -> Scope {
    standard_scope(ctx).expect("ground bootstraps")
}

fn eval_str(ctx: &Context, scope: &Scope, src: &str) -> Result<Value, Error> {
    eval_source(ctx, scope, src)
}

fn get(scope: &Scope, name: &str) -> Option<Value> {
    scope.get(Symbol::new(name))
}

#[test]
fn do_sequences_and_returns_the_last() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    assert_eq!(
        eval_str(&ctx, &scope, "(do (def a 1) (def b 2) [a b])").unwrap(),
        list_from(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(get(&scope, "a"), Some(Value::Int(1)));
    assert_eq!(get(&scope, "b"), Some(Value::Int(2)));

    // an empty do yields null
    assert_eq!(eval_str(&ctx, &scope, "(do)").unwrap(), Value::Null);
    assert_eq!(eval_str(&ctx, &scope, "(do 42)").unwrap(), Value::Int(42));
}

#[test]
fn list_evaluates_left_to_right() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    // (def a 42) returns the symbol a; by the time the second argument
    // evaluates, a is bound
    assert_eq!(
        eval_str(&ctx, &scope, "(list (def a 42) a)").unwrap(),
        list_from(vec![Value::symbol("a"), Value::Int(42)])
    );
    assert_eq!(get(&scope, "a"), Some(Value::Int(42)));
}

#[test]
fn list_star_splices_the_tail() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    assert_eq!(
        eval_str(&ctx, &scope, "(list* (def a 1) a (list (def b 2) b))").unwrap(),
        list_from(vec![
            Value::symbol("a"),
            Value::Int(1),
            Value::symbol("b"),
            Value::Int(2),
        ])
    );

    assert_eq!(eval_str(&ctx, &scope, "(list* 5)").unwrap(), Value::Int(5));
    assert_eq!(
        eval_str(&ctx, &scope, "(list* 1 2)").unwrap(),
        cons(Value::Int(1), Value::Int(2))
    );
}

#[test]
fn list_accessors() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    let examples = [
        ("(first (list 1 2 3))", Value::Int(1)),
        (
            "(rest (list 1 2 3))",
            list_from(vec![Value::Int(2), Value::Int(3)]),
        ),
        ("(second (list 1 2 3))", Value::Int(2)),
        ("(third (list 1 2 3))", Value::Int(3)),
        ("(length (list 1 2 3))", Value::Int(3)),
        ("(length [])", Value::Int(0)),
    ];
    for (src, expected) in examples {
        assert_eq!(eval_str(&ctx, &scope, src).unwrap(), expected, "{src}");
    }

    assert_eq!(
        eval_str(&ctx, &scope, "(length 5)").unwrap_err(),
        Error::Type {
            op: "length".to_string(),
            expected: "list",
            got: Value::Int(5),
        }
    );
    assert!(eval_str(&ctx, &scope, "(first [])").is_err());
}

#[test]
fn op_with_multiple_body_forms_sequences_them() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    assert_eq!(
        eval_str(&ctx, &scope, "((op [x y] e (eval [def x y] e) y) foo 42)").unwrap(),
        Value::Int(42)
    );
    assert_eq!(get(&scope, "foo"), Some(Value::Int(42)));
}

#[test]
fn op_destructuring_mismatches() {
    let ctx = Context::new();

    let cases = [
        (
            "(op)",
            Error::BindMismatch {
                need: cons(
                    Value::symbol("formals"),
                    cons(Value::symbol("eformal"), Value::symbol("body")),
                ),
                have: Value::Empty,
            },
        ),
        (
            "(op [x])",
            Error::BindMismatch {
                need: cons(Value::symbol("eformal"), Value::symbol("body")),
                have: Value::Empty,
            },
        ),
        (
            "(op [x] _)",
            Error::BindMismatch {
                need: cons(Value::symbol("f"), Value::Ignore),
                have: Value::Empty,
            },
        ),
        (
            "(op . false)",
            Error::BindMismatch {
                need: cons(
                    Value::symbol("formals"),
                    cons(Value::symbol("eformal"), Value::symbol("body")),
                ),
                have: Value::Bool(false),
            },
        ),
        (
            "(op [x] . _)",
            Error::BindMismatch {
                need: cons(Value::symbol("eformal"), Value::symbol("body")),
                have: Value::Ignore,
            },
        ),
    ];

    for (src, expected) in cases {
        let scope = test_scope(&ctx);
        assert_eq!(eval_str(&ctx, &scope, src).unwrap_err(), expected, "{src}");
    }
}

#[test]
fn defop_defines_an_operative() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    assert_eq!(
        eval_str(&ctx, &scope, "(defop def2 [x y] e (eval [def x y] e) y)").unwrap(),
        Value::symbol("def2")
    );
    assert_eq!(
        eval_str(&ctx, &scope, "(def2 foo 42)").unwrap(),
        Value::Int(42)
    );
    assert_eq!(get(&scope, "foo"), Some(Value::Int(42)));
}

#[test]
fn fn_closes_over_a_fresh_scope() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    assert_eq!(
        eval_str(
            &ctx,
            &scope,
            "((fn [x] (def local (* x 2)) [local (* local 2)]) 21)"
        )
        .unwrap(),
        list_from(vec![Value::Int(42), Value::Int(84)])
    );
    // the local definition never leaked into the calling scope
    assert!(scope.own_bindings().is_empty());
}

#[test]
fn defn_defines_an_applicative() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    assert_eq!(
        eval_str(
            &ctx,
            &scope,
            "(defn foo [x] (def local (* x 2)) [local (* local 2)])"
        )
        .unwrap(),
        Value::symbol("foo")
    );
    assert_eq!(
        eval_str(&ctx, &scope, "(foo 21)").unwrap(),
        list_from(vec![Value::Int(42), Value::Int(84)])
    );
}

#[test]
fn defn_with_paren_formals() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    eval_str(&ctx, &scope, "(defn inc2 (x) (+ x 1))").unwrap();
    assert_eq!(eval_str(&ctx, &scope, "(inc2 41)").unwrap(), Value::Int(42));
}

#[test]
fn derived_helpers() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    let examples = [
        ("(not false)", Value::Bool(true)),
        ("(not [1])", Value::Bool(false)),
        ("(inc 41)", Value::Int(42)),
        ("(dec 43)", Value::Int(42)),
        (
            "(map inc [1 2 3])",
            list_from(vec![Value::Int(2), Value::Int(3), Value::Int(4)]),
        ),
        ("(foldl + 0 [1 2 3 4])", Value::Int(10)),
        (
            "(reverse [1 2 3])",
            list_from(vec![Value::Int(3), Value::Int(2), Value::Int(1)]),
        ),
        (
            "(concat [1 2] [3 4])",
            list_from(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(4),
            ]),
        ),
        ("(last [1 2 3])", Value::Int(3)),
        ("(when true 1 2)", Value::Int(2)),
        ("(when false 1 2)", Value::Null),
        ("(unless false 7)", Value::Int(7)),
        ("(unless \"\" 7)", Value::Int(7)),
        ("(unless true 7)", Value::Null),
    ];
    for (src, expected) in examples {
        assert_eq!(eval_str(&ctx, &scope, src).unwrap(), expected, "{src}");
    }
}

#[test]
fn when_leaves_body_unevaluated_on_false() {
    let ctx = Context::new();
    let scope = test_scope(&ctx);

    // unbound symbols in the skipped body never evaluate
    assert_eq!(
        eval_str(&ctx, &scope, "(when false (boom))").unwrap(),
        Value::Null
    );
    assert!(eval_str(&ctx, &scope, "(when true (boom))").is_err());
}
