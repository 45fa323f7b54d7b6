use crate::common::{registry, ITEMS_LIST};
use action_dispatch_core::action::{ActionFactory, ActionIdAllocator};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn keyed_action(entries: Vec<(&str, Value)>) -> String {
    let factory = ActionFactory::new(registry(), Arc::new(ActionIdAllocator::new()), "1");
    let mut action = factory.create(ITEMS_LIST).unwrap();
    let mut config = Map::new();
    for (name, value) in entries {
        config.insert(name.to_string(), value);
    }
    action.set_params(&config);
    action.set_storable(None).unwrap();
    action.get_storage_key().unwrap()
}

#[test]
fn test_key_is_descriptor_and_ordered_params() {
    let key = keyed_action(vec![("b", json!(2)), ("a", json!(1))]);
    assert_eq!(key, r#"java://Items.list:{"a":1,"b":2}"#);
}

#[test]
fn test_nested_values_are_canonical() {
    let first = keyed_action(vec![("a", json!({"y": 1, "x": {"q": [1, {"n": 1, "m": 2}]}}))]);
    let second = keyed_action(vec![("a", json!({"x": {"q": [1, {"m": 2, "n": 1}]}, "y": 1}))]);
    assert_eq!(first, second);
}

#[test]
fn test_different_values_give_different_keys() {
    let first = keyed_action(vec![("a", json!(1))]);
    let second = keyed_action(vec![("a", json!("1"))]);
    assert_ne!(first, second);
}

fn param_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        proptest::collection::btree_map("[a-z]{1,4}", any::<i16>(), 0..4)
            .prop_map(|map| json!(map)),
    ]
}

proptest! {
    /// Property: storage keys do not depend on the order params were supplied in
    #[test]
    fn storage_key_is_order_independent(
        a in param_value(),
        b in param_value(),
        page in param_value(),
    ) {
        let forward = keyed_action(vec![("a", a.clone()), ("b", b.clone()), ("page", page.clone())]);
        let reverse = keyed_action(vec![("page", page), ("b", b), ("a", a)]);
        prop_assert_eq!(forward, reverse);
    }
}
