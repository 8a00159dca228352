//! On-device speech.

use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::SpeechError;
use super::process::{CommandTemplate, run_until_cancelled};

/// Words per minute at `rate == 1.0` for the `{rate}` placeholder.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// One piece of text to speak on-device.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Multiplier on the engine's normal pace.
    pub rate: f32,
    pub voice_hint: String,
}

/// Completion handle for a started utterance.
pub struct SpeechEvents {
    done: oneshot::Receiver<Result<(), SpeechError>>,
}

impl SpeechEvents {
    pub fn channel() -> (oneshot::Sender<Result<(), SpeechError>>, Self) {
        let (tx, done) = oneshot::channel();
        (tx, Self { done })
    }

    /// An utterance that has already ended with `result`.
    pub fn ready(result: Result<(), SpeechError>) -> Self {
        let (tx, events) = Self::channel();
        let _ = tx.send(result);
        events
    }

    /// Resolves when the utterance ends. A dropped backend counts as
    /// cancellation.
    ///
    /// # Errors
    /// Returns the backend's error, or [`SpeechError::Cancelled`].
    pub async fn finished(self) -> Result<(), SpeechError> {
        self.done.await.unwrap_or(Err(SpeechError::Cancelled))
    }
}

/// Global, singular on-device speech.
pub trait LocalSpeech: Send + Sync {
    /// Starts speaking, silencing any utterance still in flight.
    fn start(&self, utterance: Utterance) -> SpeechEvents;

    /// Silences speech immediately. Safe to call at any time, repeatedly.
    fn cancel(&self);
}

/// Speaks through an external command such as `espeak-ng` or `say`.
///
/// Placeholders: `{text}`, `{rate}` (words per minute), `{voice}`.
/// Must be used from within a Tokio runtime.
pub struct CommandSpeech {
    template: CommandTemplate,
    current: Mutex<Option<CancellationToken>>,
}

impl CommandSpeech {
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            current: Mutex::new(None),
        }
    }

    /// # Errors
    /// Returns [`SpeechError::Unavailable`] for a blank command.
    pub fn from_command_line(command: &str) -> Result<Self, SpeechError> {
        CommandTemplate::parse(command).map(Self::new)
    }

    fn replace_current(&self, next: Option<CancellationToken>) {
        let previous = std::mem::replace(
            &mut *self.current.lock().unwrap_or_else(PoisonError::into_inner),
            next,
        );
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

impl LocalSpeech for CommandSpeech {
    fn start(&self, utterance: Utterance) -> SpeechEvents {
        let token = CancellationToken::new();
        self.replace_current(Some(token.clone()));

        let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate.max(0.1)).round();
        let rate = format!("{words_per_minute}");
        let command = self.template.command(&[
            ("text", utterance.text.as_str()),
            ("rate", rate.as_str()),
            ("voice", utterance.voice_hint.as_str()),
        ]);
        let program = self.template.program().to_string();

        let (tx, events) = SpeechEvents::channel();
        tokio::spawn(async move {
            let result = run_until_cancelled(command, &program, &token).await;
            let _ = tx.send(result);
        });
        events
    }

    fn cancel(&self) {
        self.replace_current(None);
    }
}
