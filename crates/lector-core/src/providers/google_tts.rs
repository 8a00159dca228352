//! Google Cloud Text-to-Speech (`text:synthesize`).

use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::shared::{
    ProviderError, ProviderResult, classify_reqwest_error, google_json_headers, resolve_base_url,
};

pub const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Voice and audio settings sent with every synthesis request.
#[derive(Debug, Clone)]
pub struct GoogleTtsConfig {
    pub base_url: String,
    pub voice: String,
    pub language_code: String,
    pub speaking_rate: f32,
    pub audio_encoding: String,
}

impl GoogleTtsConfig {
    /// Resolves the base URL (`LECTOR_TTS_BASE_URL` > config > default).
    ///
    /// # Errors
    /// Returns an error if the resolved base URL is invalid.
    pub fn resolve_base_url(config_base_url: Option<&str>) -> anyhow::Result<String> {
        resolve_base_url(
            config_base_url,
            "LECTOR_TTS_BASE_URL",
            DEFAULT_BASE_URL,
            "Google TTS",
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
    speaking_rate: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

pub struct GoogleTtsClient {
    config: GoogleTtsConfig,
    http: Client,
}

impl GoogleTtsClient {
    pub fn new(config: GoogleTtsConfig) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    /// Synthesizes `text` and returns the decoded audio bytes.
    ///
    /// # Errors
    /// Returns a [`ProviderError`] on transport failure, non-2xx status, or a
    /// response without decodable `audioContent`.
    pub async fn synthesize(&self, api_key: &str, text: &str) -> ProviderResult<Bytes> {
        let url = format!("{}/text:synthesize", self.config.base_url);
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: &self.config.voice,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.config.audio_encoding,
                speaking_rate: self.config.speaking_rate,
            },
        };

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

        let parsed: SynthesizeResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::parse(format!("Invalid TTS response JSON: {e}"), &body))?;
        let encoded = parsed
            .audio_content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::api_error("TTS response has no audioContent"))?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ProviderError::parse(format!("Invalid base64 audio: {e}"), ""))?;
        Ok(Bytes::from(audio))
    }
}
