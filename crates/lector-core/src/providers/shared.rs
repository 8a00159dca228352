//! Types and helpers shared by the remote backends.

use std::fmt;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard User-Agent header for lector API requests.
pub const USER_AGENT: &str = concat!("lector/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Config resolution helpers
// ============================================================================

/// Resolves the credential pool with precedence: config > env.
///
/// Each env var may hold a single key or a comma-separated list; the vars are
/// read in order and their keys concatenated. Blank entries and duplicates
/// are dropped, preserving first occurrence order.
pub fn resolve_api_keys(config_keys: &[String], env_vars: &[&str]) -> Vec<String> {
    let from_config = clean_keys(config_keys.iter().map(String::as_str));
    if !from_config.is_empty() {
        return from_config;
    }

    let env_values: Vec<String> = env_vars
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .collect();
    clean_keys(env_values.iter().flat_map(|value| value.split(',')))
}

fn clean_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in keys.map(str::trim).filter(|key| !key.is_empty()) {
        if !out.iter().any(|existing| existing == key) {
            out.push(key.to_string());
        }
    }
    out
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the env or config value is not a valid URL.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> Result<String> {
    // Try env var first
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, provider_name: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {provider_name} base URL: {url}"))?;
    Ok(())
}

/// JSON request headers for Google APIs keyed by `x-goog-api-key`.
pub fn google_json_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers
}

// ============================================================================
// Errors
// ============================================================================

/// Categories of provider errors for consistent error handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Failed to parse response
    Parse,
    /// API-level error carried in a successful response
    ApiError,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::HttpStatus => write!(f, "http_status"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::ApiError => write!(f, "api_error"),
        }
    }
}

/// Structured error from one remote attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    /// Error category
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, pulling `error.message` out of a JSON
    /// body when there is one.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(error_obj) = json.get("error")
                && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
            {
                return Self {
                    kind: ProviderErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: ProviderErrorKind::HttpStatus,
            message,
            details,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>, body: &str) -> Self {
        Self {
            kind: ProviderErrorKind::Parse,
            message: message.into(),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ApiError, message)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

pub fn classify_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::timeout(format!("Connection failed: {e}"))
    } else if e.is_request() {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Request error: {e}"))
    } else {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_keys_win_and_are_cleaned() {
        let keys = vec![
            " key-a ".to_string(),
            String::new(),
            "key-b".to_string(),
            "key-a".to_string(),
        ];
        let resolved = resolve_api_keys(&keys, &["LECTOR_TEST_UNSET_KEYS_VAR"]);
        assert_eq!(resolved, vec!["key-a", "key-b"]);
    }

    #[test]
    fn test_missing_env_yields_empty_pool() {
        let resolved = resolve_api_keys(&[], &["LECTOR_TEST_UNSET_KEYS_VAR"]);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_comma_separated_keys_are_split() {
        let resolved = clean_keys("a, b,,c ,a".split(','));
        assert_eq!(resolved, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_base_url_prefers_config_over_default_and_validates() {
        let url = resolve_base_url(
            Some("http://localhost:9000/"),
            "LECTOR_TEST_UNSET_URL_VAR",
            "https://default.example",
            "Test",
        )
        .unwrap();
        assert_eq!(url, "http://localhost:9000");

        let default = resolve_base_url(None, "LECTOR_TEST_UNSET_URL_VAR", "https://d.example", "T")
            .unwrap();
        assert_eq!(default, "https://d.example");

        assert!(
            resolve_base_url(Some("not a url"), "LECTOR_TEST_UNSET_URL_VAR", "x", "Test").is_err()
        );
    }

    #[test]
    fn test_http_status_extracts_json_message() {
        let err = ProviderError::http_status(403, r#"{"error":{"message":"API key invalid"}}"#);
        assert_eq!(err.kind, ProviderErrorKind::HttpStatus);
        assert_eq!(err.to_string(), "HTTP 403: API key invalid");
        assert!(err.details.is_some());

        let plain = ProviderError::http_status(500, "");
        assert_eq!(plain.to_string(), "HTTP 500");
        assert!(plain.details.is_none());
    }
}
