//! AI-assisted commands: translate, summarize, explain.

use std::path::Path;

use anyhow::{Context, Result};
use lector_core::config::Config;
use lector_core::text::section_around;
use lector_core::text_service::{LocalText, TextProcessor, TextService};

use super::{backend_support, read_input};

/// Window used to look for section headings around `--at`.
const SECTION_WINDOW: usize = 500;

fn text_service(config: &Config) -> Result<TextService> {
    let (store, alerter) = backend_support(config);
    TextService::from_config(&config.text, store, alerter).context("set up text service")
}

pub async fn translate(file: Option<&Path>, to: Option<&str>, config: &Config) -> Result<()> {
    let input = read_input(file)?;
    let language = to.unwrap_or(&config.text.target_language);
    let service = text_service(config)?;

    let translated = if service.has_credentials() {
        service.translate(&input, language).await
    } else {
        tracing::warn!("No Gemini API keys configured; printing cleaned text untranslated");
        LocalText.translate(&input, language).await
    };
    println!("{translated}");
    Ok(())
}

pub async fn summarize(file: Option<&Path>, at: Option<usize>, config: &Config) -> Result<()> {
    let input = read_input(file)?;
    let text = match at {
        Some(position) => {
            let section = section_around(&input, position, SECTION_WINDOW);
            tracing::debug!(start = section.start, end = section.end, "Summarizing section");
            &input[section]
        }
        None => input.as_str(),
    };

    let summary = text_service(config)?
        .summarize(text)
        .await
        .context("summarize")?;
    println!("{summary}");
    Ok(())
}

pub async fn explain(file: Option<&Path>, config: &Config) -> Result<()> {
    let input = read_input(file)?;
    let explanation = text_service(config)?
        .explain(&input)
        .await
        .context("explain")?;
    println!("{explanation}");
    Ok(())
}
