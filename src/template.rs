//! Template interpolation for source definitions
//!
//! Renders `{{ config.field }}` placeholders against the caller-supplied
//! secrets and `{{ params.name }}` against per-run parameters. A bare
//! `{{ field }}` is looked up in the secrets.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Matches `{{ variable.path }}`
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template pattern is valid")
});

/// Values available to templates
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Secrets and connection settings, e.g. `{"api_key": "..."}`
    pub config: Value,
    /// Per-run parameters
    pub params: Value,
}

impl TemplateContext {
    /// Context with secrets only
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            params: Value::Null,
        }
    }

    /// Add per-run parameters
    #[must_use]
    pub fn with_params(mut self, params: &BTreeMap<String, String>) -> Self {
        self.params = Value::Object(
            params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        self
    }

    /// Look up a dotted path such as `config.credentials.client_id`
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let (root, rest): (&Value, Vec<&str>) = match parts.next()? {
            "config" => (&self.config, parts.collect()),
            "params" => (&self.params, parts.collect()),
            _ => (&self.config, path.split('.').collect()),
        };

        let value = rest
            .iter()
            .try_fold(root, |current, part| current.as_object()?.get(*part))?;

        // A null secret is as good as a missing one
        (!value.is_null()).then_some(value)
    }
}

/// Render a template string, failing on any undefined variable
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut undefined = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        match ctx.get(&cap[1]) {
            Some(value) => value_to_string(value),
            None => {
                undefined.push(cap[1].to_string());
                String::new()
            }
        }
    });

    if undefined.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(undefined.join(", ")))
    }
}

/// Render an optional template
pub fn render_opt(template: Option<&str>, ctx: &TemplateContext) -> Result<Option<String>> {
    template.map(|t| render(t, ctx)).transpose()
}

/// Render every value of a string map
pub fn render_map(
    map: &BTreeMap<String, String>,
    ctx: &TemplateContext,
) -> Result<BTreeMap<String, String>> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), render(v, ctx)?)))
        .collect()
}

/// Render every string inside a JSON value
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) if has_templates(s) => Ok(Value::String(render(s, ctx)?)),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), render_value(v, ctx)?)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        Value::Array(arr) => arr
            .iter()
            .map(|v| render_value(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(value.clone()),
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Variable paths referenced by a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
