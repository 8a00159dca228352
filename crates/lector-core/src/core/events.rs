//! Reader state and events.
//!
//! Events are serializable so a front end can forward them as JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Lifecycle of a reading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReaderState {
    #[default]
    Off,
    /// Preparing the first chunk.
    Loading,
    /// Audio is playing.
    Reading,
}

/// Events emitted by the reader during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderEvent {
    StateChanged { state: ReaderState },

    /// A chunk was prepared and queued for playback.
    ChunkQueued { ordinal: usize, chars: usize },

    /// Playback of a chunk began.
    ChunkStarted { ordinal: usize },

    /// A chunk could not be prepared or played; reading continues.
    ChunkFailed { ordinal: usize, error: String },

    /// A highlight target was activated.
    Highlighted { index: usize },

    /// All queued text was spoken.
    Finished,

    /// The session ended because speech became impossible.
    Fatal { error: String },
}

pub type ReaderEventTx = mpsc::Sender<Arc<ReaderEvent>>;

pub type ReaderEventRx = mpsc::Receiver<Arc<ReaderEvent>>;

/// Default channel capacity for event streams.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

pub fn create_event_channel() -> (ReaderEventTx, ReaderEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Event sender wrapper that provides best-effort and reliable send modes.
///
/// Use `send_delta()` for frequent events that can be dropped (highlights)
/// and from synchronous code; use `send_important()` for events a consumer
/// must see (queueing, failures, completion).
#[derive(Clone)]
pub struct EventSender {
    tx: ReaderEventTx,
}

impl EventSender {
    pub fn new(tx: ReaderEventTx) -> Self {
        Self { tx }
    }

    /// Best-effort send: never awaits, drops if channel is full.
    pub fn send_delta(&self, ev: ReaderEvent) {
        let _ = self.tx.try_send(Arc::new(ev));
    }

    /// Reliable send: awaits delivery.
    pub async fn send_important(&self, ev: ReaderEvent) {
        let _ = self.tx.send(Arc::new(ev)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tag() {
        let json = serde_json::to_value(ReaderEvent::StateChanged {
            state: ReaderState::Loading,
        })
        .unwrap();
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["state"], "loading");
    }

    #[tokio::test]
    async fn test_delta_send_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        sender.send_delta(ReaderEvent::Finished);
        sender.send_delta(ReaderEvent::Highlighted { index: 1 });
        assert_eq!(*rx.recv().await.unwrap(), ReaderEvent::Finished);
        assert!(rx.try_recv().is_err());
    }
}
