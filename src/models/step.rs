//! Test step model
//!
//! A step is an ordered key/value document. A handful of keys are reserved for
//! the engine, everything else belongs to the executor named by `type`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::executor::StepError;

/// Executor used when a step has no `type`
pub const DEFAULT_EXECUTOR: &str = "exec";

/// Keys interpreted by the engine rather than by the executor
pub const RESERVED_KEYS: &[&str] = &["type", "retry", "delay", "timeout", "assertions"];

/// A single test step
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(Mapping);

/// Retry/delay/timeout settings of a step, in attempts and seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepPolicy {
    pub retry: u32,
    pub delay: u64,
    pub timeout: u64,
}

impl Step {
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    /// Builder-style insert, mostly useful in tests
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Value::String(key.to_string()), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn mapping(&self) -> &Mapping {
        &self.0
    }

    /// Lowercase executor name, `exec` when absent or empty
    pub fn executor_type(&self) -> Result<String, StepError> {
        match self.get("type") {
            None | Some(Value::Null) => Ok(DEFAULT_EXECUTOR.to_string()),
            Some(Value::String(name)) if name.trim().is_empty() => {
                Ok(DEFAULT_EXECUTOR.to_string())
            }
            Some(Value::String(name)) => Ok(name.trim().to_lowercase()),
            Some(other) => Err(StepError::Configuration {
                attribute: "type".to_string(),
                reason: format!("expected a string, got {}", describe(other)),
            }),
        }
    }

    /// Parse `retry`, `delay` and `timeout`
    pub fn policy(&self) -> Result<StepPolicy, StepError> {
        let retry = self.attr_u64("retry")?;
        let retry = u32::try_from(retry).map_err(|_| StepError::Configuration {
            attribute: "retry".to_string(),
            reason: format!("{retry} is out of range"),
        })?;

        Ok(StepPolicy {
            retry,
            delay: self.attr_u64("delay")?,
            timeout: self.attr_u64("timeout")?,
        })
    }

    /// Assertion expressions declared on the step
    pub fn assertions(&self) -> Result<Vec<String>, StepError> {
        let invalid = |reason: String| StepError::Configuration {
            attribute: "assertions".to_string(),
            reason,
        };

        match self.get("assertions") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(invalid(format!(
                        "expected a list of strings, found {}",
                        describe(other)
                    ))),
                })
                .collect(),
            Some(other) => Err(invalid(format!("expected a list, got {}", describe(other)))),
        }
    }

    /// Executor-specific fields, reserved keys removed
    pub fn executor_fields(&self) -> Mapping {
        self.0
            .iter()
            .filter(|(k, _)| {
                k.as_str()
                    .map(|k| !RESERVED_KEYS.contains(&k))
                    .unwrap_or(true)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Decode the executor-specific fields into an executor's own shape
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StepError> {
        serde_yaml::from_value(Value::Mapping(self.executor_fields()))
            .map_err(|e| StepError::Decode(e.to_string()))
    }

    fn attr_u64(&self, name: &str) -> Result<u64, StepError> {
        let invalid = |reason: String| StepError::Configuration {
            attribute: name.to_string(),
            reason,
        };

        match self.get(name) {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| invalid(format!("'{n}' is not a non-negative integer"))),
            // Templated values arrive as strings
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(format!("'{s}' is not a non-negative integer"))),
            Some(other) => Err(invalid(format!(
                "expected an integer, got {}",
                describe(other)
            ))),
        }
    }
}

impl From<Mapping> for Step {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Step {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_default_executor_type() {
        let step = parse("script: echo hi");
        assert_eq!(step.executor_type().unwrap(), "exec");

        let step = parse("type: ''\nscript: echo hi");
        assert_eq!(step.executor_type().unwrap(), "exec");
    }

    #[test]
    fn test_executor_type_is_lowercased() {
        let step = parse("type: HTTP");
        assert_eq!(step.executor_type().unwrap(), "http");
    }

    #[test]
    fn test_policy_defaults_to_zero() {
        let step = parse("script: ls");
        assert_eq!(step.policy().unwrap(), StepPolicy::default());
    }

    #[test]
    fn test_policy_parsing() {
        let step = parse("retry: 3\ndelay: '2'\ntimeout: 10");
        let policy = step.policy().unwrap();
        assert_eq!(policy.retry, 3);
        assert_eq!(policy.delay, 2);
        assert_eq!(policy.timeout, 10);
    }

    #[test]
    fn test_policy_rejects_invalid_values() {
        for yaml in ["retry: -1", "delay: abc", "timeout: 1.5", "retry: [1]"] {
            let err = parse(yaml).policy().unwrap_err();
            assert!(
                matches!(err, StepError::Configuration { .. }),
                "{yaml} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_assertions() {
        let step = parse("assertions:\n  - result.code ShouldEqual 0\n");
        assert_eq!(step.assertions().unwrap(), vec!["result.code ShouldEqual 0"]);

        let step = parse("assertions: nope");
        assert!(step.assertions().is_err());
    }

    #[test]
    fn test_executor_fields_drop_reserved_keys() {
        let step = parse("type: exec\nretry: 1\nscript: ls\nassertions: []");
        let fields = step.executor_fields();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("script"));
    }

    #[test]
    fn test_decode() {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Fields {
            script: String,
        }

        let step = parse("type: exec\nscript: ls");
        let fields: Fields = step.decode().unwrap();
        assert_eq!(fields.script, "ls");

        let step = parse("script: ls\nscirpt: typo");
        assert!(matches!(
            step.decode::<Fields>(),
            Err(StepError::Decode(_))
        ));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let step = parse("b: 1\na: 2\nc: 3");
        let keys: Vec<_> = step
            .mapping()
            .keys()
            .filter_map(|k| k.as_str())
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
