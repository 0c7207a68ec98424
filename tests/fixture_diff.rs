//! Property tests for fixture comparison.

use pokerwire::fixture::{Match, first_difference};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (0u64..2000).prop_map(|n| Value::from(n.to_string())),
        "[a-z]{1,6}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Follow a dotted path such as `a.b[1].c` into `value`.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path == "$" {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| {
        let (key, indices) = segment.split_once('[').map_or((segment, ""), |(k, rest)| (k, rest));
        let mut node = if key.is_empty() { current } else { current.get(key)? };
        for index in indices.split('[').filter(|s| !s.is_empty()) {
            node = node.get(index.trim_end_matches(']').parse::<usize>().ok()?)?;
        }
        Some(node)
    })
}

proptest! {
    #[test]
    fn identical_values_never_differ(value in json_value()) {
        prop_assert_eq!(first_difference(&value, &value, Match::Exact), None);
        prop_assert_eq!(first_difference(&value, &value, Match::Subset), None);
    }

    #[test]
    fn extra_fields_only_fail_exact_matches(
        fields in proptest::collection::btree_map("[a-z]{1,4}", json_value(), 1..5),
        extra in json_value(),
    ) {
        let expected = Value::Object(fields.clone().into_iter().collect());
        let mut observed = fields;
        observed.insert("zzzzz".to_owned(), extra.clone());
        let observed = Value::Object(observed.into_iter().collect());

        prop_assert_eq!(first_difference(&expected, &observed, Match::Subset), None);
        let mismatch = first_difference(&expected, &observed, Match::Exact).expect("extra field");
        prop_assert_eq!(mismatch.path, "zzzzz");
        prop_assert_eq!(mismatch.expected, None);
        prop_assert_eq!(mismatch.actual, Some(extra));
    }

    #[test]
    fn reported_path_points_at_both_values(expected in json_value(), actual in json_value()) {
        if let Some(mismatch) = first_difference(&expected, &actual, Match::Exact) {
            prop_assert_eq!(lookup(&expected, &mismatch.path), mismatch.expected.as_ref());
            prop_assert_eq!(lookup(&actual, &mismatch.path), mismatch.actual.as_ref());
            prop_assert_ne!(mismatch.expected, mismatch.actual);
        } else {
            prop_assert_eq!(expected, actual);
        }
    }
}

#[test]
fn names_the_first_differing_seat() {
    let expected = json!({"handEvent": {"streetEvent": {"currentActivePlayers": [
        {"id": "player_one", "stack": "990"},
        {"id": "player_two", "stack": "980"},
    ]}}});
    let actual = json!({"handEvent": {"streetEvent": {"currentActivePlayers": [
        {"id": "player_one", "stack": "990"},
        {"id": "player_two", "stack": "1000"},
    ]}}});
    let mismatch = first_difference(&expected, &actual, Match::Exact).expect("stacks differ");
    assert_eq!(mismatch.path, "handEvent.streetEvent.currentActivePlayers[1].stack");
    assert_eq!(mismatch.expected, Some(json!("980")));
    assert_eq!(mismatch.actual, Some(json!("1000")));
}
