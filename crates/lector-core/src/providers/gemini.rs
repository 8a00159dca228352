//! Gemini API key provider (Generative Language API), non-streaming text.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};

use super::shared::{
    ProviderError, ProviderResult, classify_reqwest_error, google_json_headers, resolve_base_url,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Gemini endpoint configuration. The API key is supplied per request so the
/// credential pool can rotate keys.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: Option<u32>,
}

impl GeminiConfig {
    /// Builds a config, honoring `LECTOR_TEXT_BASE_URL`.
    ///
    /// # Errors
    /// Returns an error if the resolved base URL is invalid.
    pub fn from_env(model: &str, config_base_url: Option<&str>) -> anyhow::Result<Self> {
        let base_url = resolve_base_url(
            config_base_url,
            "LECTOR_TEXT_BASE_URL",
            DEFAULT_BASE_URL,
            "Gemini",
        )?;
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            model.trim()
        };
        Ok(Self {
            base_url,
            model: model.to_string(),
            max_output_tokens: None,
        })
    }
}

/// Gemini client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    /// Sends a single-turn prompt and returns the concatenated text parts.
    ///
    /// # Errors
    /// Returns a [`ProviderError`] on transport failure, non-2xx status,
    /// unparseable body, or a response without text.
    pub async fn generate_text(&self, api_key: &str, prompt: &str) -> ProviderResult<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let request = build_text_request(prompt, self.config.max_output_tokens);

        let response = self
            .http
            .post(url)
            .headers(google_json_headers(api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ProviderError::http_status(status.as_u16(), &body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::parse(format!("Invalid Gemini response JSON: {e}"), &body))?;
        parse_text_response(&value)
    }
}

fn build_text_request(prompt: &str, max_output_tokens: Option<u32>) -> Value {
    let mut request = json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }],
    });
    if let Some(max) = max_output_tokens {
        request["generationConfig"] = json!({ "maxOutputTokens": max });
    }
    request
}

fn parse_text_response(value: &Value) -> ProviderResult<String> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ProviderError::api_error(message));
    }

    let payload = value.get("response").unwrap_or(value);
    let text: String = payload
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate.get("content")?.get("parts")?.as_array())
        .flatten()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        let reason = payload
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("no text in response");
        return Err(ProviderError::api_error(format!("Gemini returned no text: {reason}")));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::providers::shared::ProviderErrorKind;

    fn client(base_url: &str) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            base_url: base_url.to_string(),
            model: "test-model".to_string(),
            max_output_tokens: None,
        })
    }

    #[test]
    fn test_parse_text_response_joins_parts() {
        let value = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "there" }] }
            }]
        });
        assert_eq!(parse_text_response(&value).unwrap(), "Hello there");
    }

    #[test]
    fn test_parse_text_response_reports_block_reason() {
        let value = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_text_response(&value).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ApiError);
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_request_sets_generation_config_only_when_limited() {
        assert!(build_text_request("hi", None).get("generationConfig").is_none());
        assert_eq!(
            build_text_request("hi", Some(64))["generationConfig"]["maxOutputTokens"],
            json!(64)
        );
    }

    #[tokio::test]
    async fn test_generate_text_sends_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "cleaned" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri()).generate_text("key-1", "prompt").await;
        assert_eq!(text.unwrap(), "cleaned");
    }

    #[tokio::test]
    async fn test_generate_text_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({ "error": { "message": "quota exceeded" } })),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .generate_text("key-1", "prompt")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 429: quota exceeded");
    }
}
