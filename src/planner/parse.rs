//! Typed "parse JSON or fall back" handling for model output.

use serde::de::DeserializeOwned;

/// Result of interpreting free-form model text as a typed value.
///
/// Both variants carry a usable value; the tag records whether the model's
/// JSON parsed or the documented fallback was taken, so callers and tests can
/// distinguish the degrade path.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    /// The model produced well-formed JSON.
    Parsed(T),
    /// The model's text did not parse; this is the fallback value.
    Fallback(T),
}

impl<T> ModelOutput<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Parsed(v) | Self::Fallback(v) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Parsed(v) | Self::Fallback(v) => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Parse raw model text as `T`, or build the fallback from the raw text.
/// Never fails; the soft degrade path is invisible to the end user.
pub fn parse_or<T, F>(raw: &str, fallback: F) -> ModelOutput<T>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> T,
{
    match serde_json::from_str(raw.trim()) {
        Ok(value) => ModelOutput::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, "model output did not parse as JSON; using fallback");
            ModelOutput::Fallback(fallback(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Reply {
        answer: String,
    }

    #[test]
    fn well_formed_json_is_tagged_parsed() {
        let out: ModelOutput<Reply> =
            parse_or(r#"{"answer": "42"}"#, |_| Reply { answer: String::new() });
        assert_eq!(out, ModelOutput::Parsed(Reply { answer: "42".to_string() }));
        assert!(!out.is_fallback());
    }

    #[test]
    fn prose_takes_the_fallback_path() {
        let out: ModelOutput<Reply> = parse_or("I think you want X", |raw| Reply {
            answer: raw.to_string(),
        });
        assert!(out.is_fallback());
        assert_eq!(out.value().answer, "I think you want X");
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let out: ModelOutput<Reply> =
            parse_or("\n  {\"answer\": \"ok\"}\n", |_| Reply { answer: String::new() });
        assert!(!out.is_fallback());
    }
}
