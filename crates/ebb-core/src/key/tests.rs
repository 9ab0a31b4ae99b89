use super::*;
use crate::value::Value;
use std::collections::BTreeMap;

fn values(pairs: &[(&'static str, Value)]) -> BTreeMap<&'static str, Value> {
    pairs.iter().cloned().collect()
}

#[test]
fn key_from_keyable_values() {
    assert_eq!(Key::try_from_value(&Value::Int(-3)).unwrap(), Key::Int(-3));
    assert_eq!(Key::try_from_value(&Value::Uint(9)).unwrap(), Key::Uint(9));
    assert_eq!(
        Key::try_from_value(&Value::Text("zip".to_string())).unwrap(),
        Key::Text("zip".to_string())
    );
}

#[test]
fn null_and_float_are_not_keyable() {
    assert!(matches!(
        Key::try_from_value(&Value::Null),
        Err(KeyError::NotKeyable { kind: "null" })
    ));
    assert!(matches!(
        Key::try_from_value(&Value::Float(1.0)),
        Err(KeyError::NotKeyable { kind: "float" })
    ));
}

#[test]
fn entity_key_preserves_member_order() {
    let vals = values(&[("a", Value::Int(1)), ("b", Value::Int(2))]);

    let forward = entity_key_from_values(&["a", "b"], &vals).unwrap();
    let backward = entity_key_from_values(&["b", "a"], &vals).unwrap();

    assert_ne!(forward, backward);
    assert_eq!(forward.parts(), &[Key::Int(1), Key::Int(2)]);
}

#[test]
fn entity_key_missing_member() {
    let vals = values(&[("a", Value::Int(1))]);

    let err = entity_key_from_values(&["a", "b"], &vals).unwrap_err();
    assert!(matches!(err, KeyError::MissingKeyMember { field } if field == "b"));
}

#[test]
fn single_member_display_is_bare() {
    let key = EntityKey::new(vec![Key::Int(5)]);
    assert_eq!(key.to_string(), "5");

    let composite = EntityKey::new(vec![Key::Int(5), Key::Text("x".to_string())]);
    assert_eq!(composite.to_string(), "(5, x)");
}

#[test]
fn equal_values_yield_equal_identity() {
    let a = entity_key_from_values(&["id"], &values(&[("id", Value::Uint(5))])).unwrap();
    let b = entity_key_from_values(&["id"], &values(&[("id", Value::Uint(5))])).unwrap();

    assert_eq!(a, b);

    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut ha = DefaultHasher::new();
    let mut hb = DefaultHasher::new();
    a.hash(&mut ha);
    b.hash(&mut hb);
    assert_eq!(ha.finish(), hb.finish());
}
