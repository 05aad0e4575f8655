//! Property tests for the reader: printing any value from the textual
//! subset and reading it back yields the same value.

use proptest::prelude::*;

use perch::language::{inert_list_from, list_from};
use perch::{parse, Value};

/// Names that read back as something other than a symbol.
const RESERVED: &[&str] = &["null", "true", "false", "_"];

fn symbol_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9?*-]{0,8}".prop_filter("reserved word", |name| !RESERVED.contains(&name.as_str()))
}

fn atom() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        Just(Value::Empty),
        Just(Value::Ignore),
        symbol_name().prop_map(|name| Value::symbol(&name)),
        symbol_name().prop_map(|name| Value::keyword(&name)),
        // printable text plus the escaped control characters
        "[ -~\n\t\r]{0,12}".prop_map(Value::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    atom().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(list_from),
            prop::collection::vec(inner, 0..5).prop_map(inert_list_from),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn read_repr_round_trips(value in value()) {
        let printed = value.to_string();
        let read = parse(&printed).unwrap();
        prop_assert_eq!(read, value, "printed as {}", printed);
    }

    #[test]
    fn integers_round_trip(n in any::<i64>()) {
        prop_assert_eq!(parse(&n.to_string()).unwrap(), Value::Int(n));
    }

    #[test]
    fn strings_round_trip(s in "[ -~\n\t\r\u{7}\u{8}\u{b}\u{c}]{0,40}") {
        let value = Value::String(s);
        prop_assert_eq!(parse(&value.to_string()).unwrap(), value);
    }
}
