//! Speech output: remote neural TTS, on-device speech, audio playback.

mod engine;
mod local;
mod player;
mod process;

pub use engine::{Playable, RemoteSynthesizer, SPEECH_PROVIDER, SpeechEngine, SpeechTier, Synthesizer};
pub use local::{CommandSpeech, LocalSpeech, SpeechEvents, Utterance};
pub use player::{AudioPlayer, CommandPlayer};
pub use process::CommandTemplate;

use thiserror::Error;

use crate::credentials::CredentialsExhausted;

#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    /// Every remote speech credential failed.
    #[error(transparent)]
    Exhausted(#[from] CredentialsExhausted),
    /// No backend can produce speech for this request.
    #[error("speech unavailable: {0}")]
    Unavailable(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("speech cancelled")]
    Cancelled,
}

impl SpeechError {
    /// Errors after which no further chunk can be spoken in this session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpeechError::Exhausted(_) | SpeechError::Unavailable(_))
    }
}
