//! Offline text commands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use lector_core::text::{find_title_boundaries, normalize as normalize_text, text_chunks};

use super::read_input;

/// Characters of context printed after each heading boundary.
const PREVIEW_CHARS: usize = 60;

pub fn normalize(file: Option<&Path>) -> Result<()> {
    let input = read_input(file)?;
    println!("{}", normalize_text(&input));
    Ok(())
}

pub fn split(
    file: Option<&Path>,
    max_length: usize,
    first_length: Option<usize>,
    json: bool,
) -> Result<()> {
    if max_length == 0 {
        bail!("--max-length must be greater than zero");
    }
    let input = read_input(file)?;
    let chunks = text_chunks(&input, max_length, first_length);

    if json {
        let out = serde_json::to_string_pretty(&chunks).context("serialize chunks")?;
        println!("{out}");
        return Ok(());
    }

    for chunk in &chunks {
        println!("[{}] {}", chunk.ordinal, chunk.content);
    }
    Ok(())
}

pub fn titles(file: Option<&Path>, window: usize) -> Result<()> {
    if window == 0 {
        bail!("--window must be greater than zero");
    }
    let input = read_input(file)?;

    for offset in find_title_boundaries(&input, window) {
        let preview: String = input[offset..]
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        println!("{offset}\t{preview}");
    }
    Ok(())
}
