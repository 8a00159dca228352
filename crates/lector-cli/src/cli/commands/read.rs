//! `lector read`: reads a document aloud until it ends or Ctrl+C.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use lector_core::config::Config;
use lector_core::core::events::{EventSender, ReaderEvent, create_event_channel};
use lector_core::core::interrupt;
use lector_core::core::reader::{
    HighlightHandle, HighlightTarget, Highlighter, Reader, ReaderSettings, TextSource,
    VisibleTextSnapshot,
};
use lector_core::speech::{SpeechEngine, SpeechTier};
use lector_core::text_service::{LocalText, TextProcessor, TextService};

use super::{backend_support, read_input};

/// Characters of a paragraph echoed when it is highlighted.
const PREVIEW_CHARS: usize = 72;

pub struct ReadOptions<'a> {
    pub file: &'a Path,
    pub visible_chars: usize,
    pub tier: Option<SpeechTier>,
    pub config: &'a Config,
}

pub async fn run(options: ReadOptions<'_>) -> Result<()> {
    let document = read_input(Some(options.file))?;
    let mut config = options.config.clone();
    if let Some(tier) = options.tier {
        config.speech.tier = tier;
    }

    let (store, alerter) = backend_support(&config);
    let service = TextService::from_config(&config.text, Arc::clone(&store), Arc::clone(&alerter))
        .context("set up text service")?;
    let text: Arc<dyn TextProcessor> = if service.has_credentials() {
        Arc::new(service)
    } else {
        Arc::new(LocalText)
    };
    let speech = SpeechEngine::from_config(&config.speech, store, alerter)
        .context("set up speech")?;

    let source = DocumentSource::new(document, options.visible_chars);
    let highlighter = Arc::new(TerminalHighlighter::new(&source.visible));
    let (tx, mut rx) = create_event_channel();
    let reader = Reader::new(
        ReaderSettings::from_config(&config),
        Arc::new(source),
        text,
        Arc::new(speech),
        highlighter,
        Some(EventSender::new(tx)),
    );

    interrupt::init()?;
    reader.start().await.context("start reading")?;

    let mut fatal = None;
    loop {
        tokio::select! {
            Some(event) = rx.recv() => report(&event, &mut fatal),
            () = reader.wait_until_off() => break,
            () = interrupt::wait_for_interrupt() => {
                reader.stop();
                eprintln!("Stopped.");
                break;
            }
        }
    }
    while let Ok(event) = rx.try_recv() {
        report(&event, &mut fatal);
    }

    if let Some(error) = fatal {
        bail!("reading stopped: {error}");
    }
    Ok(())
}

fn report(event: &ReaderEvent, fatal: &mut Option<String>) {
    match event {
        ReaderEvent::ChunkFailed { ordinal, error } => {
            eprintln!("Skipped chunk {ordinal}: {error}");
        }
        ReaderEvent::Fatal { error } => *fatal = Some(error.clone()),
        other => tracing::debug!(event = ?other, "Reader event"),
    }
}

/// A document where the first paragraphs, up to a character budget, count
/// as visible.
struct DocumentSource {
    full: String,
    visible: Vec<String>,
}

impl DocumentSource {
    fn new(full: String, visible_chars: usize) -> Self {
        let mut visible = Vec::new();
        let mut used = 0;
        for paragraph in paragraphs(&full) {
            let len = paragraph.chars().count();
            if !visible.is_empty() && used + len > visible_chars {
                break;
            }
            used += len;
            visible.push(paragraph);
        }
        Self { full, visible }
    }
}

impl TextSource for DocumentSource {
    fn visible_text(&self) -> VisibleTextSnapshot {
        VisibleTextSnapshot {
            text: self.visible.join("\n\n"),
            highlight_targets: self
                .visible
                .iter()
                .enumerate()
                .map(|(i, paragraph)| HighlightTarget {
                    handle: paragraph_handle(i),
                    text_len: paragraph.len(),
                })
                .collect(),
        }
    }

    fn full_text(&self) -> String {
        self.full.clone()
    }
}

/// Paragraphs separated by blank lines, with inner line breaks folded.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

fn paragraph_handle(index: usize) -> HighlightHandle {
    HighlightHandle::new(format!("p{}", index + 1))
}

/// Echoes the start of each paragraph as it becomes active.
struct TerminalHighlighter {
    previews: HashMap<HighlightHandle, String>,
}

impl TerminalHighlighter {
    fn new(paragraphs: &[String]) -> Self {
        let previews = paragraphs
            .iter()
            .enumerate()
            .map(|(i, paragraph)| {
                let mut preview: String = paragraph.chars().take(PREVIEW_CHARS).collect();
                if preview.len() < paragraph.len() {
                    preview.push_str("...");
                }
                (paragraph_handle(i), preview)
            })
            .collect();
        Self { previews }
    }
}

impl Highlighter for TerminalHighlighter {
    fn set_active(&self, handle: &HighlightHandle, active: bool) {
        if active && let Some(preview) = self.previews.get(handle) {
            eprintln!("> {preview}");
        }
    }
}
