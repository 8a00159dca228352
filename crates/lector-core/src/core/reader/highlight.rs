//! Timed highlighting of visible text targets.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::source::{HighlightHandle, HighlightTarget, Highlighter};
use crate::core::events::{EventSender, ReaderEvent};

/// Tracks which handles are active so they can all be cleared at once.
pub struct HighlightCursor {
    highlighter: Arc<dyn Highlighter>,
    active: Mutex<Vec<HighlightHandle>>,
}

impl HighlightCursor {
    pub fn new(highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            highlighter,
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn activate(&self, handle: &HighlightHandle) {
        let mut active = self.lock();
        if !active.contains(handle) {
            active.push(handle.clone());
            self.highlighter.set_active(handle, true);
        }
    }

    pub fn deactivate(&self, handle: &HighlightHandle) {
        let mut active = self.lock();
        if let Some(pos) = active.iter().position(|h| h == handle) {
            active.remove(pos);
            self.highlighter.set_active(handle, false);
        }
    }

    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain(..).collect();
        for handle in &drained {
            self.highlighter.set_active(handle, false);
        }
    }

    pub fn active(&self) -> Vec<HighlightHandle> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HighlightHandle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How long one target stays highlighted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightPacing {
    pub chars_per_second: f64,
    pub reading_speed: f64,
    pub min_delay: Duration,
}

impl HighlightPacing {
    pub fn delay_for(&self, text_len: usize) -> Duration {
        let secs = text_len as f64 / (self.chars_per_second * self.reading_speed);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::ZERO)
            .max(self.min_delay)
    }
}

/// Walks `targets` in order, one active at a time.
///
/// Stops early when `token` is cancelled or `enabled` turns false. Every
/// highlight is cleared on exit.
pub async fn walk_targets(
    cursor: Arc<HighlightCursor>,
    targets: Vec<HighlightTarget>,
    pacing: HighlightPacing,
    token: CancellationToken,
    mut enabled: watch::Receiver<bool>,
    events: Option<EventSender>,
) {
    let mut previous: Option<HighlightHandle> = None;

    for (index, target) in targets.into_iter().enumerate() {
        if token.is_cancelled() || !*enabled.borrow() {
            break;
        }
        if let Some(prev) = previous.take() {
            cursor.deactivate(&prev);
        }
        cursor.activate(&target.handle);
        if let Some(events) = &events {
            events.send_delta(ReaderEvent::Highlighted { index });
        }
        previous = Some(target.handle);

        let delay = pacing.delay_for(target.text_len);
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = token.cancelled() => break,
            () = turned_off(&mut enabled) => break,
        }
    }

    cursor.clear();
}

/// Resolves once highlighting is disabled (or its sender is gone).
async fn turned_off(enabled: &mut watch::Receiver<bool>) {
    let _ = enabled.wait_for(|on| !*on).await;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every `set_active` call.
    #[derive(Default)]
    pub(crate) struct RecordingHighlighter {
        pub calls: Mutex<Vec<(String, bool)>>,
    }

    impl Highlighter for RecordingHighlighter {
        fn set_active(&self, handle: &HighlightHandle, active: bool) {
            self.calls
                .lock()
                .unwrap()
                .push((handle.as_str().to_string(), active));
        }
    }

    fn target(id: &str, text_len: usize) -> HighlightTarget {
        HighlightTarget {
            handle: HighlightHandle::new(id),
            text_len,
        }
    }

    fn pacing() -> HighlightPacing {
        HighlightPacing {
            chars_per_second: 10.0,
            reading_speed: 1.0,
            min_delay: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_delay_scales_with_length_and_respects_floor() {
        let pacing = pacing();
        assert_eq!(pacing.delay_for(30), Duration::from_secs(3));
        assert_eq!(pacing.delay_for(1), Duration::from_millis(500));

        let faster = HighlightPacing {
            reading_speed: 2.0,
            ..pacing
        };
        assert_eq!(faster.delay_for(30), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_rate_falls_back_to_floor() {
        let pacing = HighlightPacing {
            chars_per_second: 0.0,
            ..pacing()
        };
        assert_eq!(pacing.delay_for(10), Duration::from_millis(500));
    }

    #[test]
    fn test_cursor_clear_deactivates_everything() {
        let highlighter = Arc::new(RecordingHighlighter::default());
        let cursor = HighlightCursor::new(highlighter.clone());
        cursor.activate(&HighlightHandle::new("a"));
        cursor.activate(&HighlightHandle::new("b"));
        cursor.activate(&HighlightHandle::new("a"));
        cursor.clear();

        assert!(cursor.active().is_empty());
        let calls = highlighter.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("a".to_string(), false),
                ("b".to_string(), false),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_moves_through_targets_in_order() {
        let highlighter = Arc::new(RecordingHighlighter::default());
        let cursor = Arc::new(HighlightCursor::new(highlighter.clone()));
        let (_enabled_tx, enabled) = watch::channel(true);

        walk_targets(
            cursor.clone(),
            vec![target("p1", 20), target("p2", 10)],
            pacing(),
            CancellationToken::new(),
            enabled,
            None,
        )
        .await;

        assert!(cursor.active().is_empty());
        let calls = highlighter.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("p1".to_string(), true),
                ("p1".to_string(), false),
                ("p2".to_string(), true),
                ("p2".to_string(), false),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_stops_walk_and_clears() {
        let highlighter = Arc::new(RecordingHighlighter::default());
        let cursor = Arc::new(HighlightCursor::new(highlighter.clone()));
        let (enabled_tx, enabled) = watch::channel(true);

        let walker = tokio::spawn(walk_targets(
            cursor.clone(),
            vec![target("p1", 100), target("p2", 100)],
            pacing(),
            CancellationToken::new(),
            enabled,
            None,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cursor.active(), vec![HighlightHandle::new("p1")]);

        enabled_tx.send_replace(false);
        walker.await.unwrap();
        assert!(cursor.active().is_empty());
        let calls = highlighter.calls.lock().unwrap().clone();
        assert!(!calls.contains(&("p2".to_string(), true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_walk() {
        let cursor = Arc::new(HighlightCursor::new(Arc::new(RecordingHighlighter::default())));
        let (_enabled_tx, enabled) = watch::channel(true);
        let token = CancellationToken::new();

        let walker = tokio::spawn(walk_targets(
            cursor.clone(),
            vec![target("p1", 100)],
            pacing(),
            token.clone(),
            enabled,
            None,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        walker.await.unwrap();
        assert!(cursor.active().is_empty());
    }
}
