//! Assertion evaluation
//!
//! The engine only needs the [`AssertionEvaluator`] contract. [`Matcher`] is
//! the built-in evaluator: each expression reads
//! `<dotted.path> <Operator> [expected...]`, where the path is resolved
//! against `{"result": <executor result>}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Outcome of a single assertion expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub expression: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionResult {
    fn pass(expression: &str) -> Self {
        Self {
            expression: expression.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(expression: &str, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Evaluates assertion expressions against an executor result
pub trait AssertionEvaluator: Send + Sync {
    fn evaluate(&self, result: &Value, assertions: &[String]) -> Vec<AssertionResult>;
}

/// Default string-based matcher
#[derive(Clone, Copy, Debug, Default)]
pub struct Matcher;

impl AssertionEvaluator for Matcher {
    fn evaluate(&self, result: &Value, assertions: &[String]) -> Vec<AssertionResult> {
        let root = json!({ "result": result });
        assertions
            .iter()
            .map(|expression| evaluate_one(&root, expression))
            .collect()
    }
}

fn evaluate_one(root: &Value, expression: &str) -> AssertionResult {
    let mut tokens = expression.split_whitespace();
    let (path, operator) = match (tokens.next(), tokens.next()) {
        (Some(path), Some(operator)) => (path, operator),
        _ => return AssertionResult::fail(expression, "expected '<path> <Operator> [value]'"),
    };
    let expected = tokens.collect::<Vec<_>>().join(" ");
    let actual = lookup(root, path);
    let actual_str = actual.map(to_text);

    let ok = match operator {
        "ShouldEqual" => actual_str.as_deref() == Some(expected.as_str()),
        "ShouldNotEqual" => actual_str.as_deref() != Some(expected.as_str()),
        "ShouldContainSubstring" => actual_str
            .as_deref()
            .map(|a| a.contains(&expected))
            .unwrap_or(false),
        "ShouldNotContainSubstring" => actual_str
            .as_deref()
            .map(|a| !a.contains(&expected))
            .unwrap_or(true),
        "ShouldExist" => exists(actual),
        "ShouldNotExist" => !exists(actual),
        "ShouldBeEmpty" => is_empty(actual),
        "ShouldNotBeEmpty" => !is_empty(actual),
        "ShouldBeTrue" => actual_str.as_deref() == Some("true"),
        "ShouldBeFalse" => actual_str.as_deref() == Some("false"),
        "ShouldBeGreaterThan" | "ShouldBeLessThan" => {
            match (actual_str.as_deref().and_then(as_number), as_number(&expected)) {
                (Some(a), Some(e)) if operator == "ShouldBeGreaterThan" => a > e,
                (Some(a), Some(e)) => a < e,
                _ => false,
            }
        }
        other => {
            return AssertionResult::fail(expression, format!("unknown operator '{other}'"));
        }
    };

    if ok {
        AssertionResult::pass(expression)
    } else {
        let got = actual_str.unwrap_or_else(|| "<missing>".to_string());
        AssertionResult::fail(expression, format!("{}: got {}", expression.trim(), got))
    }
}

/// Resolve a dotted path; list items are addressed by index
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map
            .get(segment)
            .or_else(|| {
                map.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(segment))
                    .map(|(_, v)| v)
            }),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn exists(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(result: Value, expression: &str) -> bool {
        Matcher.evaluate(&result, &[expression.to_string()])[0].passed
    }

    #[test]
    fn test_equality() {
        let result = json!({"code": 0, "systemout": "hello world"});
        assert!(check(result.clone(), "result.code ShouldEqual 0"));
        assert!(!check(result.clone(), "result.code ShouldEqual 1"));
        assert!(check(result.clone(), "result.code ShouldNotEqual 1"));
        assert!(check(result, "result.systemout ShouldEqual hello world"));
    }

    #[test]
    fn test_existence() {
        let result = json!({"err": null, "content": "x"});
        assert!(check(result.clone(), "result.err ShouldNotExist"));
        assert!(check(result.clone(), "result.missing ShouldNotExist"));
        assert!(check(result.clone(), "result.content ShouldExist"));
        assert!(!check(result, "result.content ShouldNotExist"));
    }

    #[test]
    fn test_substring_and_emptiness() {
        let result = json!({"body": "{\"id\": 42}", "list": []});
        assert!(check(result.clone(), "result.body ShouldContainSubstring 42"));
        assert!(check(result.clone(), "result.body ShouldNotContainSubstring 43"));
        assert!(check(result.clone(), "result.list ShouldBeEmpty"));
        assert!(check(result, "result.body ShouldNotBeEmpty"));
    }

    #[test]
    fn test_numeric_comparisons() {
        let result = json!({"timeseconds": 0.25, "count": "12"});
        assert!(check(result.clone(), "result.timeseconds ShouldBeLessThan 1"));
        assert!(check(result.clone(), "result.count ShouldBeGreaterThan 10"));
        assert!(!check(result, "result.count ShouldBeGreaterThan abc"));
    }

    #[test]
    fn test_nested_paths() {
        let result = json!({"bodyjson": {"items": [{"name": "a"}]}, "ok": true});
        assert!(check(result.clone(), "result.bodyjson.items.0.name ShouldEqual a"));
        assert!(check(result.clone(), "result.BodyJson.items.0.name ShouldEqual a"));
        assert!(check(result, "result.ok ShouldBeTrue"));
    }

    #[test]
    fn test_malformed_expressions_fail() {
        let results = Matcher.evaluate(
            &json!({}),
            &["result.code".to_string(), "result.code ShouldSparkle".to_string()],
        );
        assert!(results.iter().all(|r| !r.passed));
        assert!(results[1].message.as_deref().unwrap().contains("ShouldSparkle"));
    }
}
