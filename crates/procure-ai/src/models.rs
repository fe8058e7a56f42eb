//! Model defaults and lookup.

use crate::Model;

/// Model used when neither the caller nor the configuration names one.
pub const DEFAULT_MODEL_ID: &str = "gpt-4.1-mini";

/// Public OpenAI endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Output token ceiling applied to models we know nothing about.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Known output limits for commonly used Responses API models.
const KNOWN_LIMITS: &[(&str, u32)] = &[
    ("gpt-4.1", 32768),
    ("gpt-4.1-mini", 32768),
    ("gpt-4.1-nano", 32768),
    ("gpt-4o", 16384),
    ("gpt-4o-mini", 16384),
    ("o4-mini", 100000),
];

/// Build a model definition for an id served from `base_url`.
pub fn get_model(id: &str, base_url: &str) -> Model {
    let max_tokens = KNOWN_LIMITS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_MAX_TOKENS);

    Model {
        id: id.to_string(),
        name: id.to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
        max_tokens,
        headers: Default::default(),
    }
}

/// The default model on the public endpoint.
pub fn default_model() -> Model {
    get_model(DEFAULT_MODEL_ID, DEFAULT_BASE_URL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_limits() {
        assert_eq!(get_model("gpt-4o", DEFAULT_BASE_URL).max_tokens, 16384);
        assert_eq!(
            get_model("some-local-model", "http://localhost:8080/v1").max_tokens,
            DEFAULT_MAX_TOKENS
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let model = get_model("gpt-4.1", "https://example.test/v1/");
        assert_eq!(model.base_url, "https://example.test/v1");
    }

    #[test]
    fn test_default_model() {
        let model = default_model();
        assert_eq!(model.id, DEFAULT_MODEL_ID);
        assert_eq!(model.base_url, DEFAULT_BASE_URL);
    }
}
