//! Playback of synthesized audio.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::SpeechError;
use super::process::{CommandTemplate, run_until_cancelled};

pub trait AudioPlayer: Send + Sync {
    /// Plays `audio` to the end.
    fn play(&self, audio: Bytes) -> BoxFuture<'_, Result<(), SpeechError>>;

    /// Stops current playback. Idempotent.
    fn stop(&self);
}

/// Plays audio by writing it to a temporary file and running a player
/// command on it (`{file}` placeholder).
pub struct CommandPlayer {
    template: CommandTemplate,
    suffix: &'static str,
    current: Mutex<Option<CancellationToken>>,
}

impl CommandPlayer {
    pub fn new(template: CommandTemplate, audio_encoding: &str) -> Self {
        Self {
            template,
            suffix: suffix_for_encoding(audio_encoding),
            current: Mutex::new(None),
        }
    }

    /// # Errors
    /// Returns [`SpeechError::Unavailable`] for a blank command.
    pub fn from_command_line(command: &str, audio_encoding: &str) -> Result<Self, SpeechError> {
        CommandTemplate::parse(command).map(|template| Self::new(template, audio_encoding))
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

impl AudioPlayer for CommandPlayer {
    fn play(&self, audio: Bytes) -> BoxFuture<'_, Result<(), SpeechError>> {
        async move {
            let mut file = tempfile::Builder::new()
                .prefix("lector-")
                .suffix(self.suffix)
                .tempfile()
                .map_err(|e| SpeechError::Playback(format!("failed to create audio file: {e}")))?;
            file.write_all(&audio)
                .and_then(|()| file.flush())
                .map_err(|e| SpeechError::Playback(format!("failed to write audio file: {e}")))?;

            let path = file.path().to_string_lossy().into_owned();
            let command = self.template.command(&[("file", path.as_str())]);

            let token = CancellationToken::new();
            self.replace_current(Some(token.clone()));
            let result = run_until_cancelled(command, self.template.program(), &token).await;
            drop(file);
            result
        }
        .boxed()
    }

    fn stop(&self) {
        self.replace_current(None);
    }
}

fn suffix_for_encoding(encoding: &str) -> &'static str {
    match encoding.to_ascii_uppercase().as_str() {
        "OGG_OPUS" => ".ogg",
        "LINEAR16" | "MULAW" | "ALAW" => ".wav",
        _ => ".mp3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_follows_encoding() {
        assert_eq!(suffix_for_encoding("MP3"), ".mp3");
        assert_eq!(suffix_for_encoding("ogg_opus"), ".ogg");
        assert_eq!(suffix_for_encoding("LINEAR16"), ".wav");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_player_receives_written_file() {
        // `test -s` succeeds only for an existing, non-empty file.
        let player = CommandPlayer::from_command_line("test -s {file}", "MP3").unwrap();
        assert!(player.play(Bytes::from_static(b"ID3")).await.is_ok());

        let empty = player.play(Bytes::new()).await.unwrap_err();
        assert!(matches!(empty, SpeechError::Playback(_)));
    }

    #[tokio::test]
    async fn test_missing_player_fails_playback() {
        let player = CommandPlayer::from_command_line("lector-no-such-player {file}", "MP3").unwrap();
        let err = player.play(Bytes::from_static(b"ID3")).await.unwrap_err();
        assert!(matches!(err, SpeechError::Playback(_)));
        assert!(!err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_interrupts_playback() {
        let player = std::sync::Arc::new(CommandPlayer::from_command_line("sleep 30", "MP3").unwrap());
        let playing = {
            let player = std::sync::Arc::clone(&player);
            tokio::spawn(async move { player.play(Bytes::from_static(b"x")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        player.stop();

        let result = tokio::time::timeout(std::time::Duration::from_secs(10), playing)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(SpeechError::Cancelled)));
    }
}
