//! Tier selection and fallback between remote audio and on-device speech.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::SpeechError;
use super::local::{CommandSpeech, LocalSpeech, Utterance};
use super::player::{AudioPlayer, CommandPlayer};
use crate::alerts::Alerter;
use crate::config::SpeechConfig;
use crate::credentials::CredentialFailover;
use crate::providers::google_tts::{GoogleTtsClient, GoogleTtsConfig};
use crate::providers::shared::resolve_api_keys;
use crate::store::KeyValueStore;

/// Provider name used for the credential cache and alerts.
pub const SPEECH_PROVIDER: &str = "google_tts";

/// Speech quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechTier {
    /// On-device speech only.
    Basic,
    /// Remote neural TTS, on-device speech as fallback.
    #[default]
    Premium,
}

impl fmt::Display for SpeechTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechTier::Basic => write!(f, "basic"),
            SpeechTier::Premium => write!(f, "premium"),
        }
    }
}

impl FromStr for SpeechTier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            _ => Err(format!("Unknown speech tier: {value}")),
        }
    }
}

/// Produces audio bytes for text.
pub trait Synthesizer: Send + Sync {
    fn synthesize<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Bytes, SpeechError>>;
}

/// Google Cloud TTS behind a credential pool.
pub struct RemoteSynthesizer {
    client: GoogleTtsClient,
    failover: Arc<CredentialFailover>,
}

impl RemoteSynthesizer {
    pub fn new(client: GoogleTtsClient, failover: Arc<CredentialFailover>) -> Self {
        Self { client, failover }
    }

    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn from_config(
        config: &SpeechConfig,
        store: Arc<dyn KeyValueStore>,
        alerter: Arc<dyn Alerter>,
    ) -> anyhow::Result<Self> {
        let client = GoogleTtsClient::new(GoogleTtsConfig {
            base_url: GoogleTtsConfig::resolve_base_url(config.base_url.as_deref())?,
            voice: config.voice.clone(),
            language_code: config.language_code.clone(),
            speaking_rate: config.speaking_rate,
            audio_encoding: config.audio_encoding.clone(),
        });
        let keys = resolve_api_keys(
            &config.api_keys,
            &["GOOGLE_TTS_API_KEYS", "GOOGLE_TTS_API_KEY"],
        );
        let failover = CredentialFailover::new(SPEECH_PROVIDER, keys, store, alerter);
        Ok(Self::new(client, Arc::new(failover)))
    }

    pub fn has_credentials(&self) -> bool {
        !self.failover.is_empty()
    }
}

impl Synthesizer for RemoteSynthesizer {
    fn synthesize<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Bytes, SpeechError>> {
        async move {
            self.failover
                .request(|key| async move { self.client.synthesize(&key, text).await })
                .await
                .map_err(SpeechError::from)
        }
        .boxed()
    }
}

/// Something ready to be played by [`SpeechEngine::play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playable {
    /// Synthesized audio for the player.
    Audio(Bytes),
    /// Text for on-device speech.
    Local(String),
}

/// Routes text to remote synthesis or on-device speech.
pub struct SpeechEngine {
    tier: SpeechTier,
    remote: Option<Arc<dyn Synthesizer>>,
    local: Option<Arc<dyn LocalSpeech>>,
    player: Option<Arc<dyn AudioPlayer>>,
    rate: f32,
    voice_hint: String,
}

impl SpeechEngine {
    pub fn new(tier: SpeechTier) -> Self {
        Self {
            tier,
            remote: None,
            local: None,
            player: None,
            rate: 1.0,
            voice_hint: String::new(),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn Synthesizer>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn with_local(mut self, local: Arc<dyn LocalSpeech>) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub fn with_player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    #[must_use]
    pub fn with_voice(mut self, rate: f32, voice_hint: &str) -> Self {
        self.rate = rate;
        self.voice_hint = voice_hint.to_string();
        self
    }

    /// Wires up the configured backends. Blank commands disable the matching
    /// backend; remote synthesis is only set up for the premium tier.
    ///
    /// # Errors
    /// Returns an error if the TTS base URL is invalid.
    pub fn from_config(
        config: &SpeechConfig,
        store: Arc<dyn KeyValueStore>,
        alerter: Arc<dyn Alerter>,
    ) -> anyhow::Result<Self> {
        let mut engine = Self::new(config.tier).with_voice(config.speaking_rate, &config.voice_hint);

        if config.tier == SpeechTier::Premium {
            let remote = RemoteSynthesizer::from_config(config, store, alerter)?;
            if remote.has_credentials() {
                engine = engine.with_remote(Arc::new(remote));
            } else {
                tracing::warn!("No Google TTS API keys configured; using on-device speech");
            }
        }
        match CommandSpeech::from_command_line(&config.local_command) {
            Ok(local) => engine = engine.with_local(Arc::new(local)),
            Err(e) => tracing::debug!("On-device speech disabled: {e}"),
        }
        match CommandPlayer::from_command_line(&config.player, &config.audio_encoding) {
            Ok(player) => engine = engine.with_player(Arc::new(player)),
            Err(e) => tracing::debug!("Audio player disabled: {e}"),
        }
        Ok(engine)
    }

    pub fn tier(&self) -> SpeechTier {
        self.tier
    }

    /// Turns text into something playable.
    ///
    /// The basic tier always speaks on-device. The premium tier synthesizes
    /// remotely and falls back to on-device speech when synthesis fails.
    ///
    /// # Errors
    /// Returns [`SpeechError::Exhausted`] when synthesis fails with no
    /// on-device fallback, or [`SpeechError::Unavailable`] when no backend
    /// is configured.
    pub async fn prepare(&self, text: &str) -> Result<Playable, SpeechError> {
        if self.tier == SpeechTier::Premium
            && let Some(remote) = &self.remote
        {
            match remote.synthesize(text).await {
                Ok(audio) => return Ok(Playable::Audio(audio)),
                Err(e) if self.local.is_some() => {
                    tracing::warn!("Remote synthesis failed, falling back to on-device speech: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        if self.local.is_some() {
            Ok(Playable::Local(text.to_string()))
        } else {
            Err(SpeechError::Unavailable(
                "no on-device speech configured".to_string(),
            ))
        }
    }

    /// Plays a prepared item to the end.
    ///
    /// # Errors
    /// Returns [`SpeechError::Playback`] when the item cannot be played,
    /// including when its backend is missing or fails to start, and
    /// [`SpeechError::Cancelled`] when stopped. Playback errors only affect
    /// this item.
    pub async fn play(&self, playable: Playable) -> Result<(), SpeechError> {
        match playable {
            Playable::Audio(audio) => match &self.player {
                Some(player) => player.play(audio).await,
                None => Err(SpeechError::Playback("no audio player configured".to_string())),
            },
            Playable::Local(text) => match &self.local {
                Some(local) => {
                    local
                        .start(Utterance {
                            text,
                            rate: self.rate,
                            voice_hint: self.voice_hint.clone(),
                        })
                        .finished()
                        .await
                }
                None => Err(SpeechError::Playback(
                    "no on-device speech configured".to_string(),
                )),
            },
        }
    }

    /// Prepares and plays `text` once, outside any queue.
    ///
    /// # Errors
    /// See [`SpeechEngine::prepare`] and [`SpeechEngine::play`].
    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let playable = self.prepare(text).await?;
        self.play(playable).await
    }

    /// Silences everything immediately. Idempotent.
    pub fn cancel(&self) {
        if let Some(local) = &self.local {
            local.cancel();
        }
        if let Some(player) = &self.player {
            player.stop();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::credentials::CredentialsExhausted;
    use crate::speech::SpeechEvents;

    /// Synthesizer that returns the text as bytes, or fails when `fail` is set.
    #[derive(Default)]
    pub(crate) struct FakeSynth {
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl Synthesizer for FakeSynth {
        fn synthesize<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Bytes, SpeechError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(SpeechError::Exhausted(CredentialsExhausted {
                    provider: SPEECH_PROVIDER.to_string(),
                    attempts: 2,
                    last_error: "HTTP 403".to_string(),
                }))
            } else {
                Ok(Bytes::copy_from_slice(text.as_bytes()))
            };
            futures_util::future::ready(result).boxed()
        }
    }

    /// On-device speech that finishes immediately and records what it spoke.
    #[derive(Default)]
    pub(crate) struct FakeLocal {
        pub spoken: Mutex<Vec<String>>,
        pub cancels: AtomicUsize,
    }

    impl LocalSpeech for FakeLocal {
        fn start(&self, utterance: Utterance) -> SpeechEvents {
            self.spoken.lock().unwrap().push(utterance.text);
            SpeechEvents::ready(Ok(()))
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_tier_parses_and_displays() {
        assert_eq!("Basic".parse::<SpeechTier>().unwrap(), SpeechTier::Basic);
        assert_eq!(SpeechTier::Premium.to_string(), "premium");
        assert!("gold".parse::<SpeechTier>().is_err());
    }

    #[tokio::test]
    async fn test_basic_tier_speaks_locally_without_remote_calls() {
        let synth = Arc::new(FakeSynth::default());
        let engine = SpeechEngine::new(SpeechTier::Basic)
            .with_remote(synth.clone())
            .with_local(Arc::new(FakeLocal::default()));

        assert_eq!(
            engine.prepare("hello").await.unwrap(),
            Playable::Local("hello".to_string())
        );
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_premium_tier_returns_audio() {
        let engine = SpeechEngine::new(SpeechTier::Premium)
            .with_remote(Arc::new(FakeSynth::default()));
        assert_eq!(
            engine.prepare("hi").await.unwrap(),
            Playable::Audio(Bytes::from_static(b"hi"))
        );
    }

    #[tokio::test]
    async fn test_premium_exhaustion_falls_back_to_local() {
        let local = Arc::new(FakeLocal::default());
        let engine = SpeechEngine::new(SpeechTier::Premium)
            .with_remote(Arc::new(FakeSynth {
                fail: true,
                ..Default::default()
            }))
            .with_local(local.clone());

        engine.speak("fallback text").await.unwrap();
        assert_eq!(*local.spoken.lock().unwrap(), vec!["fallback text"]);
    }

    #[tokio::test]
    async fn test_premium_exhaustion_without_local_is_fatal() {
        let engine = SpeechEngine::new(SpeechTier::Premium).with_remote(Arc::new(FakeSynth {
            fail: true,
            ..Default::default()
        }));
        let err = engine.prepare("text").await.unwrap_err();
        assert!(matches!(err, SpeechError::Exhausted(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_audio_without_player_fails_only_that_item() {
        let engine = SpeechEngine::new(SpeechTier::Premium);
        let err = engine
            .play(Playable::Audio(Bytes::from_static(b"x")))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Playback(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let local = Arc::new(FakeLocal::default());
        let engine = SpeechEngine::new(SpeechTier::Basic).with_local(local.clone());
        engine.cancel();
        engine.cancel();
        assert_eq!(local.cancels.load(Ordering::SeqCst), 2);
    }
}
