//! AI-assisted text operations with credential failover and local fallback.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::alerts::Alerter;
use crate::config::TextConfig;
use crate::credentials::{CredentialFailover, CredentialsExhausted};
use crate::prompts::{
    EXPLAIN_PROMPT_TEMPLATE, PREPROCESS_PROMPT_TEMPLATE, SUMMARIZE_PROMPT_TEMPLATE,
    TRANSLATE_PROMPT_TEMPLATE, render,
};
use crate::providers::gemini::{GeminiClient, GeminiConfig};
use crate::providers::shared::resolve_api_keys;
use crate::store::KeyValueStore;
use crate::text::normalize;

/// Provider name used for the credential cache and alerts.
pub const TEXT_PROVIDER: &str = "gemini";

const OUTPUT_PREFIXES: [&str; 6] = [
    "output:",
    "cleaned text:",
    "translation:",
    "summary:",
    "explanation:",
    "text:",
];

#[derive(Debug, Error)]
pub enum TextServiceError {
    #[error(transparent)]
    Exhausted(#[from] CredentialsExhausted),
    #[error("text service returned no usable output")]
    EmptyOutput,
}

/// Cleanup and translation used while reading. Never fails: implementations
/// fall back to [`normalize`].
pub trait TextProcessor: Send + Sync {
    fn preprocess<'a>(&'a self, text: &'a str) -> BoxFuture<'a, String>;

    fn translate<'a>(&'a self, text: &'a str, language: &'a str) -> BoxFuture<'a, String>;
}

/// Local-only processing: normalization, no translation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalText;

impl TextProcessor for LocalText {
    fn preprocess<'a>(&'a self, text: &'a str) -> BoxFuture<'a, String> {
        futures_util::future::ready(normalize(text)).boxed()
    }

    fn translate<'a>(&'a self, text: &'a str, _language: &'a str) -> BoxFuture<'a, String> {
        futures_util::future::ready(normalize(text)).boxed()
    }
}

/// Gemini-backed text service.
pub struct TextService {
    client: GeminiClient,
    failover: Arc<CredentialFailover>,
}

impl TextService {
    pub fn new(client: GeminiClient, failover: Arc<CredentialFailover>) -> Self {
        Self { client, failover }
    }

    /// Builds the service from `[text]`, resolving keys and base URL from the
    /// environment where the config leaves them empty.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn from_config(
        config: &TextConfig,
        store: Arc<dyn KeyValueStore>,
        alerter: Arc<dyn Alerter>,
    ) -> anyhow::Result<Self> {
        let gemini = GeminiConfig::from_env(&config.model, config.base_url.as_deref())?;
        let keys = resolve_api_keys(&config.api_keys, &["GEMINI_API_KEYS", "GEMINI_API_KEY"]);
        if keys.is_empty() {
            tracing::debug!("No Gemini API keys configured; text operations use local fallback");
        }
        let failover = CredentialFailover::new(TEXT_PROVIDER, keys, store, alerter);
        Ok(Self::new(GeminiClient::new(gemini), Arc::new(failover)))
    }

    pub fn has_credentials(&self) -> bool {
        !self.failover.is_empty()
    }

    /// Summarizes `text`. There is no local equivalent.
    ///
    /// # Errors
    /// Returns an error when every credential fails or the output is empty.
    pub async fn summarize(&self, text: &str) -> Result<String, TextServiceError> {
        self.complete(&render(SUMMARIZE_PROMPT_TEMPLATE, text, None))
            .await
    }

    /// Explains `text` for a non-expert. There is no local equivalent.
    ///
    /// # Errors
    /// Returns an error when every credential fails or the output is empty.
    pub async fn explain(&self, text: &str) -> Result<String, TextServiceError> {
        self.complete(&render(EXPLAIN_PROMPT_TEMPLATE, text, None))
            .await
    }

    async fn complete(&self, prompt: &str) -> Result<String, TextServiceError> {
        let raw = self
            .failover
            .request(|key| async move { self.client.generate_text(&key, prompt).await })
            .await?;
        sanitize_output(&raw).ok_or(TextServiceError::EmptyOutput)
    }

    async fn complete_or_normalize(&self, prompt: &str, text: &str, operation: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match self.complete(prompt).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(operation, "Remote text service failed, using local cleanup: {e}");
                normalize(text)
            }
        }
    }
}

impl TextProcessor for TextService {
    fn preprocess<'a>(&'a self, text: &'a str) -> BoxFuture<'a, String> {
        async move {
            let prompt = render(PREPROCESS_PROMPT_TEMPLATE, text, None);
            self.complete_or_normalize(&prompt, text, "preprocess").await
        }
        .boxed()
    }

    fn translate<'a>(&'a self, text: &'a str, language: &'a str) -> BoxFuture<'a, String> {
        async move {
            let prompt = render(TRANSLATE_PROMPT_TEMPLATE, text, Some(language));
            self.complete_or_normalize(&prompt, text, "translate").await
        }
        .boxed()
    }
}

/// Strips the wrapping models like to add. Returns `None` when nothing is left.
fn sanitize_output(raw: &str) -> Option<String> {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the fence line (and its language tag).
        text = rest.split_once('\n').map_or("", |(_, body)| body);
        text = text.trim_end().strip_suffix("```").unwrap_or(text).trim();
    }

    if let Some(prefix) = OUTPUT_PREFIXES.iter().find(|prefix| {
        text.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }) {
        text = text[prefix.len()..].trim_start();
    }

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
