use super::*;
use std::cmp::Ordering;
use ulid::Ulid;

#[test]
fn cross_variant_ordering_follows_rank() {
    let ordered = [
        Value::Null,
        Value::Bool(true),
        Value::Int(-1),
        Value::Uint(0),
        Value::Float(0.5),
        Value::Text("a".to_string()),
        Value::Ulid(Ulid::from_parts(1, 1)),
    ];

    for pair in ordered.windows(2) {
        assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
    }
}

#[test]
fn float_equality_is_bitwise() {
    assert_eq!(Value::Float(0.5), Value::Float(0.5));
    assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
}

#[test]
fn float_ordering_is_total() {
    assert_eq!(
        Value::Float(f64::NAN).cmp(&Value::Float(f64::NAN)),
        Ordering::Equal
    );
    assert!(Value::Float(-1.0) < Value::Float(1.0));
}

#[test]
fn int_and_uint_do_not_compare_equal() {
    assert_ne!(Value::Int(7), Value::Uint(7));
}

#[test]
fn serde_roundtrip() {
    let values = [
        Value::Null,
        Value::Bool(false),
        Value::Int(-42),
        Value::Uint(42),
        Value::Float(1.25),
        Value::Text("zip".to_string()),
        Value::Ulid(Ulid::from_parts(7, 7)),
    ];

    for value in values {
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }
}

#[test]
fn kind_labels_are_stable() {
    assert_eq!(Value::Null.kind_label(), "null");
    assert_eq!(Value::Float(0.0).kind_label(), "float");
    assert_eq!(Value::Text(String::new()).kind_label(), "text");
}
