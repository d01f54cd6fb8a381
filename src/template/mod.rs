//! Step templating
//!
//! Placeholders of the form `{{.key}}` are resolved by serializing the step to
//! JSON, replacing placeholders textually and decoding the result back into a
//! step. Going through the serialized form lets one substitution pass reach
//! every string at any nesting depth.
//!
//! Values are JSON-escaped before insertion. Placeholders can only occur
//! inside JSON strings, so numbers and booleans that did not contain a
//! placeholder keep their type, and a templated scalar stays a string.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::executor::StepError;
use crate::models::Step;

/// Templating values for one suite run
#[derive(Clone, Debug, Default)]
pub struct Templater {
    values: BTreeMap<String, String>,
}

impl Templater {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Merge entries as `prefix.key`
    pub fn add<I, K, V>(&mut self, prefix: &str, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in values {
            self.values
                .insert(format!("{}.{}", prefix, k.as_ref()), v.into());
        }
    }

    /// Merge entries without a prefix
    pub fn extend<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Resolve every known placeholder in a step
    pub fn apply(&self, step: &Step) -> Result<Step, StepError> {
        let mut text = serde_json::to_string(step)
            .map_err(|e| StepError::Templating(format!("error while serializing step: {e}")))?;

        if !text.contains("{{.") {
            return Ok(step.clone());
        }

        for (key, value) in &self.values {
            let placeholder = format!("{{{{.{}}}}}", escape(key));
            if text.contains(&placeholder) {
                text = text.replace(&placeholder, &escape(value));
            }
        }

        let resolved = serde_json::from_str(&text)
            .map_err(|e| StepError::Templating(format!("error while decoding step: {e}")))?;

        debug!("templater> after: {}", text);
        Ok(resolved)
    }
}

/// JSON string escaping without the surrounding quotes
fn escape(raw: &str) -> String {
    let quoted = Value::String(raw.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Flatten a result document into dotted keys rooted at `root`
///
/// Strings are taken verbatim, other scalars use their JSON form, and list
/// items are addressed by index (`root.items.0`).
pub fn flatten(root: &str, value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(root.to_string(), value, &mut out);
    out
}

fn flatten_into(path: String, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{path}.{key}")
        }
    };

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(join(k), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(join(&i.to_string()), v, out);
            }
        }
        Value::String(s) => {
            out.insert(path, s.clone());
        }
        Value::Null => {
            out.insert(path, String::new());
        }
        other => {
            out.insert(path, other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(yaml: &str) -> Step {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn templater(pairs: &[(&str, &str)]) -> Templater {
        Templater::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_substitution() {
        let t = templater(&[("name", "alice")]);
        let resolved = t.apply(&step("user: '{{.name}}'")).unwrap();
        assert_eq!(resolved, step("user: alice"));
    }

    #[test]
    fn test_unresolved_placeholder_is_kept() {
        let t = templater(&[("name", "alice")]);
        let resolved = t
            .apply(&step("user: '{{.name}} and {{.missing}}'"))
            .unwrap();
        assert_eq!(resolved, step("user: 'alice and {{.missing}}'"));
    }

    #[test]
    fn test_no_placeholder_is_identity() {
        let t = templater(&[("name", "alice")]);
        let original = step(
            "type: http\nretry: 3\nratio: 1.5\nenabled: true\nnothing: null\nheaders:\n  a: b\nlist: [1, two]",
        );
        assert_eq!(t.apply(&original).unwrap(), original);
    }

    #[test]
    fn test_numbers_keep_their_type() {
        let t = templater(&[("host", "example.com")]);
        let resolved = t
            .apply(&step("url: 'http://{{.host}}'\ntimeout: 5"))
            .unwrap();
        assert_eq!(resolved.policy().unwrap().timeout, 5);
        assert_eq!(
            resolved.get("timeout"),
            Some(&serde_yaml::Value::Number(5u64.into()))
        );
    }

    #[test]
    fn test_nested_substitution() {
        let t = templater(&[("token", "abc")]);
        let resolved = t
            .apply(&step("headers:\n  auth: 'Bearer {{.token}}'\nargs: ['{{.token}}']"))
            .unwrap();
        assert_eq!(
            resolved,
            step("headers:\n  auth: Bearer abc\nargs: [abc]")
        );
    }

    #[test]
    fn test_values_with_quotes_stay_valid() {
        let t = templater(&[("msg", "say \"hi\"\nit's me")]);
        let resolved = t.apply(&step("script: 'echo {{.msg}}'")).unwrap();
        assert_eq!(
            resolved.get("script").and_then(|v| v.as_str()),
            Some("echo say \"hi\"\nit's me")
        );
    }

    #[test]
    fn test_add_with_prefix() {
        let mut t = Templater::default();
        t.add("login", [("result.code", "0")]);
        t.extend([("env", "prod")]);
        assert_eq!(t.values().get("login.result.code").unwrap(), "0");
        assert_eq!(t.values().get("env").unwrap(), "prod");

        let resolved = t
            .apply(&step("script: 'echo {{.login.result.code}} {{.env}}'"))
            .unwrap();
        assert_eq!(resolved, step("script: echo 0 prod"));
    }

    #[test]
    fn test_flatten() {
        let flat = flatten(
            "result",
            &json!({"code": 0, "body": "ok", "headers": ["a", "b"], "meta": {"x": true}, "err": null}),
        );
        assert_eq!(flat.get("result.code").unwrap(), "0");
        assert_eq!(flat.get("result.body").unwrap(), "ok");
        assert_eq!(flat.get("result.headers.1").unwrap(), "b");
        assert_eq!(flat.get("result.meta.x").unwrap(), "true");
        assert_eq!(flat.get("result.err").unwrap(), "");
    }
}
