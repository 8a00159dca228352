//! Reading sessions: chunked preparation, paced queueing, playback and
//! highlighting of the visible document text.
//!
//! A session moves `Off -> Loading -> Reading -> Off`. [`Reader::start`]
//! prepares the first chunk itself so failures surface to the caller; the
//! rest is handled by two tasks sharing one [`AudioQueue`]: a producer that
//! prepares chunks slightly ahead of playback, and a consumer that plays
//! them in order. [`Reader::stop`] tears everything down synchronously.

mod highlight;
mod queue;
mod source;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use highlight::{HighlightCursor, HighlightPacing, walk_targets};
pub use queue::{AudioQueue, QueueItem};
pub use source::{
    HighlightHandle, HighlightTarget, Highlighter, NoHighlight, TextSource, VisibleTextSnapshot,
};

use crate::config::{Config, ReaderConfig};
use crate::core::events::{EventSender, ReaderEvent, ReaderState};
use crate::speech::{SpeechEngine, SpeechError, SpeechTier};
use crate::text::{remaining_text, split_text};
use crate::text_service::TextProcessor;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

/// Reader tuning, taken from `[reader]` plus the translation target.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub reader: ReaderConfig,
    pub target_language: String,
}

impl ReaderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reader: config.reader.clone(),
            target_language: config.text.target_language.clone(),
        }
    }
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            target_language: "English".to_string(),
        }
    }
}

/// Result of handling a text selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub spoken: bool,
    pub translation: Option<String>,
}

#[derive(Clone)]
struct Session {
    id: Uuid,
    token: CancellationToken,
    queue: Arc<AudioQueue>,
}

struct ReaderInner {
    settings: ReaderSettings,
    source: Arc<dyn TextSource>,
    text: Arc<dyn TextProcessor>,
    speech: Arc<SpeechEngine>,
    cursor: Arc<HighlightCursor>,
    state: watch::Sender<ReaderState>,
    highlight_enabled: watch::Sender<bool>,
    session: Mutex<Option<Session>>,
    events: Option<EventSender>,
}

/// Coordinates reading sessions. Cheap to clone.
#[derive(Clone)]
pub struct Reader {
    inner: Arc<ReaderInner>,
}

impl Reader {
    pub fn new(
        settings: ReaderSettings,
        source: Arc<dyn TextSource>,
        text: Arc<dyn TextProcessor>,
        speech: Arc<SpeechEngine>,
        highlighter: Arc<dyn Highlighter>,
        events: Option<EventSender>,
    ) -> Self {
        let (state, _) = watch::channel(ReaderState::Off);
        let (highlight_enabled, _) = watch::channel(settings.reader.highlight);
        Self {
            inner: Arc::new(ReaderInner {
                settings,
                source,
                text,
                speech,
                cursor: Arc::new(HighlightCursor::new(highlighter)),
                state,
                highlight_enabled,
                session: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn state(&self) -> ReaderState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReaderState> {
        self.inner.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.inner.current().is_some()
    }

    /// Handles currently highlighted.
    pub fn active_highlights(&self) -> Vec<HighlightHandle> {
        self.inner.cursor.active()
    }

    /// Chunks prepared but not yet played in the current session.
    pub fn queued(&self) -> usize {
        self.inner.current().map_or(0, |s| s.queue.len())
    }

    /// Resolves once the reader is `Off`.
    pub async fn wait_until_off(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| *state == ReaderState::Off).await;
    }

    /// Starts reading the visible text. Does nothing while a session is
    /// already active.
    ///
    /// Returns after the first chunk is queued and playback has been handed
    /// to background tasks.
    ///
    /// # Errors
    /// Returns an error when the first chunk cannot be turned into speech by
    /// any backend. The reader is `Off` afterwards.
    pub async fn start(&self) -> Result<(), ReaderError> {
        let session = {
            let mut current = self.inner.lock_session();
            if current.is_some() {
                tracing::debug!("Reading session already active");
                return Ok(());
            }
            let session = Session {
                id: Uuid::new_v4(),
                token: CancellationToken::new(),
                queue: Arc::new(AudioQueue::new()),
            };
            *current = Some(session.clone());
            session
        };
        tracing::info!(session = %session.id, "Reading session started");
        self.inner.set_state(ReaderState::Loading);

        let snapshot = self.inner.source.visible_text();
        let reader = &self.inner.settings.reader;
        let mut chunks = split_text(
            &snapshot.text,
            reader.visible_chunk_len,
            Some(reader.first_chunk_len),
        )
        .into_iter();

        let Some(first) = chunks.next() else {
            tracing::debug!("Nothing visible to read");
            self.inner.end_session(session.id);
            return Ok(());
        };

        let processed = self.inner.text.preprocess(&first).await;
        if session.token.is_cancelled() {
            return Ok(());
        }
        match self.inner.speech.prepare(&processed).await {
            Ok(playable) => {
                if session.token.is_cancelled() {
                    return Ok(());
                }
                session.queue.push(QueueItem {
                    ordinal: 0,
                    text_len: processed.len(),
                    playable,
                });
                self.inner
                    .emit(ReaderEvent::ChunkQueued {
                        ordinal: 0,
                        chars: processed.len(),
                    })
                    .await;
            }
            Err(e) if e.is_fatal() => {
                self.inner.fail(&session, &e).await;
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(ordinal = 0, "First chunk failed: {e}");
                self.inner
                    .emit(ReaderEvent::ChunkFailed {
                        ordinal: 0,
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        let producer = Producer {
            inner: Arc::clone(&self.inner),
            session: session.clone(),
            visible: snapshot.text,
            rest: chunks.collect(),
            first_len: first.len(),
        };
        tokio::spawn(producer.run());
        tokio::spawn(consume(
            Arc::clone(&self.inner),
            session,
            snapshot.highlight_targets,
        ));
        Ok(())
    }

    /// Ends the current session immediately: speech is silenced, pending
    /// chunks are dropped and highlights are cleared. Idempotent.
    pub fn stop(&self) {
        let session = self.inner.lock_session().take();
        if let Some(session) = &session {
            tracing::info!(session = %session.id, "Reading session stopped");
            session.token.cancel();
            session.queue.clear();
        }
        self.inner.speech.cancel();
        self.inner.cursor.clear();
        self.inner.set_state(ReaderState::Off);
    }

    /// Turns highlighting on or off. Turning it off clears every highlight
    /// and stops the running walk.
    pub fn set_highlighting(&self, enabled: bool) {
        self.inner.highlight_enabled.send_replace(enabled);
        if !enabled {
            self.inner.cursor.clear();
        }
    }

    /// Handles a user text selection according to `read_selection` and
    /// `translate_selection`. Selections are only spoken while no session is
    /// active.
    pub async fn on_selection(&self, text: &str) -> SelectionOutcome {
        let settings = &self.inner.settings;
        let processed = self.inner.text.preprocess(text).await;
        if processed.trim().is_empty() {
            return SelectionOutcome::default();
        }

        let speak = settings.reader.read_selection && !self.is_active();
        let speaking = async {
            if !speak {
                return false;
            }
            match self.inner.speech.speak(&processed).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Selection speech failed: {e}");
                    false
                }
            }
        };
        let translating = async {
            if settings.reader.translate_selection {
                Some(
                    self.inner
                        .text
                        .translate(&processed, &settings.target_language)
                        .await,
                )
            } else {
                None
            }
        };

        let (spoken, translation) = tokio::join!(speaking, translating);
        SelectionOutcome {
            spoken,
            translation,
        }
    }
}

impl ReaderInner {
    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<Session> {
        self.lock_session().clone()
    }

    fn is_current(&self, id: Uuid) -> bool {
        self.lock_session().as_ref().is_some_and(|s| s.id == id)
    }

    fn set_state(&self, state: ReaderState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(?state, "Reader state changed");
            if let Some(events) = &self.events {
                events.send_delta(ReaderEvent::StateChanged { state });
            }
        }
    }

    async fn emit(&self, event: ReaderEvent) {
        if let Some(events) = &self.events {
            events.send_important(event).await;
        }
    }

    /// Tears down session `id` if it is still the current one.
    fn end_session(&self, id: Uuid) {
        let session = {
            let mut current = self.lock_session();
            if current.as_ref().is_none_or(|s| s.id != id) {
                return;
            }
            current.take()
        };
        if let Some(session) = session {
            session.token.cancel();
            session.queue.clear();
        }
        self.cursor.clear();
        self.set_state(ReaderState::Off);
    }

    async fn fail(&self, session: &Session, error: &SpeechError) {
        tracing::error!(session = %session.id, "Reading stopped: {error}");
        self.emit(ReaderEvent::Fatal {
            error: error.to_string(),
        })
        .await;
        if self.is_current(session.id) {
            self.speech.cancel();
        }
        self.end_session(session.id);
    }

    /// Time to wait before preparing the chunk after one of `prev_len` bytes.
    fn pace_delay(&self, prev_len: usize) -> Duration {
        let reader = &self.settings.reader;
        let factor = match self.speech.tier() {
            SpeechTier::Basic => reader.basic_pace_factor,
            SpeechTier::Premium => reader.premium_pace_factor,
        };
        let secs = prev_len as f64 / (reader.chars_per_second * reader.reading_speed) * factor;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    fn highlight_pacing(&self) -> HighlightPacing {
        let reader = &self.settings.reader;
        HighlightPacing {
            chars_per_second: reader.chars_per_second,
            reading_speed: reader.reading_speed,
            min_delay: reader.min_highlight_delay(),
        }
    }
}

/// Prepares the chunks after the first one and feeds the queue.
struct Producer {
    inner: Arc<ReaderInner>,
    session: Session,
    visible: String,
    rest: Vec<String>,
    first_len: usize,
}

impl Producer {
    async fn run(self) {
        let mut prev_len = self.first_len;
        let mut ordinal = 1;

        for chunk in &self.rest {
            if !self.feed(chunk, ordinal, prev_len).await {
                return;
            }
            ordinal += 1;
            prev_len = chunk.len();
        }

        if self.session.token.is_cancelled() {
            return;
        }
        let remaining = remaining_text(&self.visible, &self.inner.source.full_text());
        let chunk_len = self.inner.settings.reader.remaining_chunk_len;
        for chunk in split_text(&remaining, chunk_len, None) {
            if !self.feed(&chunk, ordinal, prev_len).await {
                return;
            }
            ordinal += 1;
            prev_len = chunk.len();
        }

        self.session.queue.finish_feeding();
        tracing::debug!(session = %self.session.id, chunks = ordinal, "All chunks prepared");
    }

    /// Prepares one chunk. Returns `false` when the session is over.
    async fn feed(&self, chunk: &str, ordinal: usize, prev_len: usize) -> bool {
        let token = &self.session.token;
        if token.is_cancelled() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(self.inner.pace_delay(prev_len)) => {}
            () = token.cancelled() => return false,
        }

        let processed = self.inner.text.preprocess(chunk).await;
        if token.is_cancelled() {
            return false;
        }
        if processed.trim().is_empty() {
            return true;
        }

        match self.inner.speech.prepare(&processed).await {
            Ok(playable) => {
                if token.is_cancelled() {
                    return false;
                }
                self.session.queue.push(QueueItem {
                    ordinal,
                    text_len: processed.len(),
                    playable,
                });
                self.inner
                    .emit(ReaderEvent::ChunkQueued {
                        ordinal,
                        chars: processed.len(),
                    })
                    .await;
                true
            }
            Err(e) if e.is_fatal() => {
                self.inner.fail(&self.session, &e).await;
                false
            }
            Err(e) => {
                tracing::warn!(ordinal, "Chunk preparation failed: {e}");
                self.inner
                    .emit(ReaderEvent::ChunkFailed {
                        ordinal,
                        error: e.to_string(),
                    })
                    .await;
                true
            }
        }
    }
}

/// Plays queued chunks in order until the queue is drained or the session
/// is cancelled.
async fn consume(inner: Arc<ReaderInner>, session: Session, targets: Vec<HighlightTarget>) {
    let mut targets = Some(targets);

    while let Some(item) = session.queue.next(&session.token).await {
        inner.set_state(ReaderState::Reading);
        if let Some(targets) = targets.take()
            && !targets.is_empty()
        {
            tokio::spawn(walk_targets(
                Arc::clone(&inner.cursor),
                targets,
                inner.highlight_pacing(),
                session.token.clone(),
                inner.highlight_enabled.subscribe(),
                inner.events.clone(),
            ));
        }

        if let Some(events) = &inner.events {
            events.send_delta(ReaderEvent::ChunkStarted {
                ordinal: item.ordinal,
            });
        }
        if session.token.is_cancelled() {
            return;
        }
        let played = tokio::select! {
            result = inner.speech.play(item.playable) => result,
            () = session.token.cancelled() => {
                // The stop may have landed before this item reached a backend.
                inner.speech.cancel();
                return;
            }
        };
        match played {
            Ok(()) => {}
            Err(_) if session.token.is_cancelled() => return,
            Err(e) => {
                tracing::warn!(ordinal = item.ordinal, "Chunk playback failed: {e}");
                inner
                    .emit(ReaderEvent::ChunkFailed {
                        ordinal: item.ordinal,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    if !session.token.is_cancelled() {
        tracing::info!(session = %session.id, "Reading session finished");
        inner.emit(ReaderEvent::Finished).await;
        inner.end_session(session.id);
    }
}
