//! Prompt templates sent to the text service.
//!
//! Templates use `{{TEXT}}` for the input and `{{LANGUAGE}}` for the
//! translation target.

/// Cleans extracted text for speech.
pub const PREPROCESS_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/preprocess_prompt.md"
));

pub const TRANSLATE_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/translate_prompt.md"
));

pub const SUMMARIZE_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/summarize_prompt.md"
));

pub const EXPLAIN_PROMPT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/explain_prompt.md"
));

/// Fills a template. `{{TEXT}}` is substituted last so user text containing
/// placeholder syntax is left alone.
pub fn render(template: &str, text: &str, language: Option<&str>) -> String {
    let template = match language {
        Some(language) => template.replace("{{LANGUAGE}}", language),
        None => template.to_string(),
    };
    template.replace("{{TEXT}}", text)
}
