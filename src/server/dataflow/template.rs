//! `input_id_template` compile + evaluate pass.
//!
//! A template is a plain string carrying `#param#` placeholders. Compiling extracts the
//! placeholder names once; evaluating substitutes each against a merged parameter mapping and
//! returns the rendered string, which the dataflow engine then reparses as the downstream
//! job's structured input.

use regex::Regex;
use serde_json::Value;

use crate::server::error::dataflow::DataflowError;

/// A compiled `#param#` template.
pub struct Template {
    raw: String,
}

impl Template {
    /// Compiles `raw`. Compilation never fails — unknown placeholders are only caught when
    /// the template is evaluated against a concrete parameter set.
    pub fn compile(raw: &str) -> Self {
        Self { raw: raw.to_string() }
    }

    /// Renders the template against `params`, substituting every `#name#` placeholder with
    /// the stringified value of `params["name"]`.
    ///
    /// # Errors
    /// Returns [`DataflowError::UnknownTemplateParam`] if a placeholder references a key
    /// absent from `params`.
    pub fn render(&self, params: &Value) -> Result<String, DataflowError> {
        let pattern = placeholder_pattern();
        let mut err = None;

        let rendered = pattern.replace_all(&self.raw, |caps: &regex::Captures| {
            let name = &caps[1];
            match params.get(name) {
                Some(value) => stringify(value),
                None => {
                    err.get_or_insert_with(|| DataflowError::UnknownTemplateParam(name.to_string()));
                    String::new()
                }
            }
        });

        if let Some(err) = err {
            return Err(err);
        }

        Ok(rendered.into_owned())
    }
}

fn placeholder_pattern() -> Regex {
    Regex::new(r"#([A-Za-z_][A-Za-z0-9_]*)#").expect("static placeholder pattern is valid")
}

/// Renders a JSON scalar the way a template placeholder expects: strings unquoted, everything
/// else via its JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders an accumulator address, which uses `{name}` rather than `#name#` placeholders
/// (the convention the resource URL grammar's `accu_address` query parameter carries, e.g.
/// `{digit}[]`) — kept as a distinct syntax from `input_id_template` so the two can't be
/// confused when reading a pipeline's rule table.
pub fn render_accu_address(raw: &str, params: &Value) -> Result<String, DataflowError> {
    let pattern = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid");
    let mut err = None;

    let rendered = pattern.replace_all(raw, |caps: &regex::Captures| {
        let name = &caps[1];
        match params.get(name) {
            Some(value) => stringify(value),
            None => {
                err.get_or_insert_with(|| DataflowError::MalformedAccuAddress(raw.to_string()));
                String::new()
            }
        }
    });

    if let Some(err) = err {
        return Err(err);
    }

    Ok(rendered.into_owned())
}

/// Merges `primary` over `fallback`: keys present in `primary` win, the rest fall through
/// from `fallback`. Used to evaluate a template against "the emitting job's output params
/// union its own input params".
pub fn merge_params(primary: &Value, fallback: &Value) -> Value {
    match (primary, fallback) {
        (Value::Object(p), Value::Object(f)) => {
            let mut merged = f.clone();
            for (k, v) in p {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => primary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_known_placeholders() {
        let template = Template::compile("#a# times #b#");
        let rendered = template.render(&json!({"a": "3", "b": "4"})).unwrap();
        assert_eq!(rendered, "3 times 4");
    }

    #[test]
    fn renders_non_string_scalars_via_json_text() {
        let template = Template::compile("n=#n#");
        let rendered = template.render(&json!({"n": 5})).unwrap();
        assert_eq!(rendered, "n=5");
    }

    #[test]
    fn errors_on_unknown_placeholder() {
        let template = Template::compile("#missing#");
        let err = template.render(&json!({"a": "1"})).unwrap_err();
        assert!(matches!(err, DataflowError::UnknownTemplateParam(name) if name == "missing"));
    }

    #[test]
    fn renders_accu_address_placeholders() {
        let rendered = render_accu_address("{digit}[]", &json!({"digit": 3})).unwrap();
        assert_eq!(rendered, "3[]");
    }

    #[test]
    fn merge_prefers_primary_keys() {
        let merged = merge_params(&json!({"a": 1}), &json!({"a": 2, "b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }
}
