//! Placeholder substitution for tool URL and command templates.
//!
//! Stored tool configs use two equivalent syntaxes, `{key}` and `{{key}}`;
//! one function handles both so every call-site behaves identically.

use std::collections::HashMap;

use serde_json::Value;

/// How substituted values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    /// Percent-encode values (URL templates).
    Url,
    /// Insert values verbatim (shell command templates; the caller is
    /// responsible for safe input).
    None,
}

/// Substitute every supplied parameter into `template` at both placeholder
/// syntaxes. Unknown placeholders are left untouched.
pub fn substitute_placeholders(
    template: &str,
    parameters: &HashMap<String, Value>,
    escaping: Escaping,
) -> String {
    let mut out = template.to_string();

    for (key, value) in parameters {
        let rendered = render_value(value);
        let rendered = match escaping {
            Escaping::Url => urlencoding::encode(&rendered).into_owned(),
            Escaping::None => rendered,
        };

        // Double braces first, otherwise `{{key}}` would decay to `{value}`.
        out = out.replace(&format!("{{{{{}}}}}", key), &rendered);
        out = out.replace(&format!("{{{}}}", key), &rendered);
    }

    out
}

/// String form of a parameter value: strings verbatim, everything else as
/// compact JSON.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn url_values_are_percent_encoded() {
        let p = params(&[("id", json!("a b"))]);
        assert_eq!(
            substitute_placeholders("https://x/{id}", &p, Escaping::Url),
            "https://x/a%20b"
        );
    }

    #[test]
    fn double_brace_syntax_substitutes_unescaped() {
        let p = params(&[("msg", json!("hi"))]);
        assert_eq!(
            substitute_placeholders("echo {{msg}}", &p, Escaping::None),
            "echo hi"
        );
    }

    #[test]
    fn both_syntaxes_in_one_template() {
        let p = params(&[("a", json!("1")), ("b", json!("2"))]);
        assert_eq!(
            substitute_placeholders("{a}/{{b}}", &p, Escaping::None),
            "1/2"
        );
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let p = params(&[("a", json!("1"))]);
        assert_eq!(
            substitute_placeholders("{a}/{missing}", &p, Escaping::None),
            "1/{missing}"
        );
    }

    #[test]
    fn non_string_values_render_as_json() {
        let p = params(&[("n", json!(42))]);
        assert_eq!(
            substitute_placeholders("limit={n}", &p, Escaping::None),
            "limit=42"
        );
    }
}
