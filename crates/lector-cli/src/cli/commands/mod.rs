//! CLI command handlers.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use lector_core::alerts::{Alerter, LogAlerter, WebhookAlerter};
use lector_core::config::{Config, paths};
use lector_core::store::{FileStore, KeyValueStore};

pub mod assist;
pub mod config;
pub mod read;
pub mod text;

/// Reads a file, or stdin when `path` is missing or `-`.
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display())),
        _ => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("read stdin")?;
            Ok(input)
        }
    }
}

/// State store and alert sink shared by the remote backends.
fn backend_support(config: &Config) -> (Arc<dyn KeyValueStore>, Arc<dyn Alerter>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(paths::state_path()));
    let alerter: Arc<dyn Alerter> = match config.alerts.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Arc::new(WebhookAlerter::new(url.trim())),
        _ => Arc::new(LogAlerter),
    };
    (store, alerter)
}
