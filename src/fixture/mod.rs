//! Expected-frame fixtures and the structural comparison behind them.
//!
//! Fixtures are plain JSON values produced by the factories in [`hand`].
//! [`first_difference`] walks expected and observed values side by side and
//! reports the first field that differs, so a failure names exactly one path
//! such as `handEvent.playerEvent.currentStack`.

pub mod hand;

use serde_json::Value;

use crate::error::AssertionFailure;

/// How an observed payload is compared with its fixture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Match {
    /// Every field must be equal and no extra fields may appear.
    #[default]
    Exact,
    /// Fields absent from the fixture are not compared.
    Subset,
}

/// First differing field between a fixture and an observed value.
#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
    pub path: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

impl Mismatch {
    /// Attribute the mismatch to an actor.
    #[must_use]
    pub fn into_failure(self, actor: impl Into<String>) -> AssertionFailure {
        AssertionFailure {
            step: String::new(),
            actor: actor.into(),
            path: self.path,
            expected: self.expected,
            actual: self.actual,
        }
    }
}

/// Compare `actual` against `expected`.
///
/// Object keys are visited in sorted order, then (for [`Match::Exact`])
/// keys only present in `actual`. Arrays must have equal length in both
/// modes.
#[must_use]
pub fn first_difference(expected: &Value, actual: &Value, mode: Match) -> Option<Mismatch> {
    let mut path = String::new();
    walk(expected, actual, mode, &mut path)
}

/// [`first_difference`] as an assertion on behalf of `actor`.
///
/// # Errors
///
/// Returns [`AssertionFailure`] naming the first differing field.
pub fn assert_matches(
    actor: &str,
    expected: &Value,
    actual: &Value,
    mode: Match,
) -> Result<(), AssertionFailure> {
    first_difference(expected, actual, mode).map_or(Ok(()), |mismatch| Err(mismatch.into_failure(actor)))
}

fn walk(expected: &Value, actual: &Value, mode: Match, path: &mut String) -> Option<Mismatch> {
    match (expected, actual) {
        (Value::Object(want), Value::Object(got)) => {
            for (key, want_value) in want {
                let mark = push_key(path, key);
                let found = match got.get(key) {
                    Some(got_value) => walk(want_value, got_value, mode, path),
                    None => Some(mismatch(path, Some(want_value), None)),
                };
                path.truncate(mark);
                if found.is_some() {
                    return found;
                }
            }
            if mode == Match::Exact
                && let Some((key, got_value)) = got.iter().find(|(key, _)| !want.contains_key(*key))
            {
                let mark = push_key(path, key);
                let found = mismatch(path, None, Some(got_value));
                path.truncate(mark);
                return Some(found);
            }
            None
        }
        (Value::Array(want), Value::Array(got)) => {
            for index in 0..want.len().max(got.len()) {
                let mark = path.len();
                path.push_str(&format!("[{index}]"));
                let found = match (want.get(index), got.get(index)) {
                    (Some(w), Some(g)) => walk(w, g, mode, path),
                    (w, g) => Some(mismatch(path, w, g)),
                };
                path.truncate(mark);
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        (want, got) if want == got => None,
        (want, got) => Some(mismatch(path, Some(want), Some(got))),
    }
}

fn push_key(path: &mut String, key: &str) -> usize {
    let mark = path.len();
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str(key);
    mark
}

fn mismatch(path: &str, expected: Option<&Value>, actual: Option<&Value>) -> Mismatch {
    Mismatch {
        path: if path.is_empty() { "$".to_owned() } else { path.to_owned() },
        expected: expected.cloned(),
        actual: actual.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn names_nested_field() {
        let expected = json!({"handEvent": {"playerEvent": {"currentStack": "1000", "action": "Fold"}}});
        let actual = json!({"handEvent": {"playerEvent": {"currentStack": "990", "action": "Fold"}}});
        let mismatch = first_difference(&expected, &actual, Match::Exact).expect("stacks differ");
        assert_eq!(mismatch.path, "handEvent.playerEvent.currentStack");
        assert_eq!(mismatch.expected, Some(json!("1000")));
        assert_eq!(mismatch.actual, Some(json!("990")));
    }

    #[test]
    fn indexes_arrays() {
        let expected = json!({"players": [{"id": "a"}, {"id": "b"}]});
        let actual = json!({"players": [{"id": "a"}, {"id": "c"}]});
        let mismatch = first_difference(&expected, &actual, Match::Exact).expect("ids differ");
        assert_eq!(mismatch.path, "players[1].id");
    }

    #[test]
    fn exact_rejects_extra_fields_subset_ignores_them() {
        let expected = json!({"pot": "30"});
        let actual = json!({"pot": "30", "cards": null});
        let mismatch = first_difference(&expected, &actual, Match::Exact).expect("extra field");
        assert_eq!(mismatch.path, "cards");
        assert_eq!(mismatch.expected, None);
        assert!(first_difference(&expected, &actual, Match::Subset).is_none());
    }

    #[test]
    fn missing_element_is_reported() {
        let mismatch = first_difference(&json!([1, 2]), &json!([1]), Match::Subset).expect("short");
        assert_eq!(mismatch.path, "[1]");
        assert_eq!(mismatch.actual, None);
    }

    #[test]
    fn root_type_mismatch_uses_dollar() {
        let mismatch = first_difference(&json!({}), &Value::Null, Match::Exact).expect("differs");
        assert_eq!(mismatch.path, "$");
    }

    #[test]
    fn casing_is_not_normalised() {
        let failure = assert_matches("p", &json!({"action": "Fold"}), &json!({"action": "FOLD"}), Match::Exact)
            .expect_err("casing differs");
        assert_eq!(failure.path, "action");
    }
}
