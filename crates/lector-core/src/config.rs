//! Configuration management for lector.
//!
//! Loads configuration from ${LECTOR_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::providers::gemini;
use crate::speech::SpeechTier;

/// Remote text service settings (`[text]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Gemini model used for preprocessing, translation, summaries.
    pub model: String,
    /// Override for the Generative Language API base URL.
    pub base_url: Option<String>,
    /// Credential pool, tried in order. Falls back to `GEMINI_API_KEYS` /
    /// `GEMINI_API_KEY` when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,
    /// Language selections are translated into.
    pub target_language: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            model: gemini::DEFAULT_MODEL.to_string(),
            base_url: None,
            api_keys: Vec::new(),
            target_language: "English".to_string(),
        }
    }
}

/// Speech settings (`[speech]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// "basic" speaks on-device, "premium" uses remote neural TTS.
    pub tier: SpeechTier,
    pub base_url: Option<String>,
    /// Falls back to `GOOGLE_TTS_API_KEYS` / `GOOGLE_TTS_API_KEY` when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,
    pub voice: String,
    pub language_code: String,
    pub speaking_rate: f32,
    pub audio_encoding: String,
    /// Audio player command; `{file}` is replaced with the audio path.
    pub player: String,
    /// On-device speech command; `{text}`, `{rate}` and `{voice}` are replaced.
    pub local_command: String,
    /// Voice name passed to the on-device command.
    pub voice_hint: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            tier: SpeechTier::Premium,
            base_url: None,
            api_keys: Vec::new(),
            voice: "en-US-Neural2-C".to_string(),
            language_code: "en-US".to_string(),
            speaking_rate: 1.0,
            audio_encoding: "MP3".to_string(),
            player: "ffplay -nodisp -autoexit -loglevel quiet {file}".to_string(),
            local_command: "espeak-ng -s {rate} -v {voice} {text}".to_string(),
            voice_hint: "en".to_string(),
        }
    }
}

/// Read-aloud pacing and behavior (`[reader]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Size of the first chunk, kept short so playback starts quickly.
    pub first_chunk_len: usize,
    /// Chunk size for the rest of the visible text.
    pub visible_chunk_len: usize,
    /// Chunk size for text beyond the visible snapshot.
    pub remaining_chunk_len: usize,
    /// Multiplier on the base speaking pace.
    pub reading_speed: f64,
    /// Expected characters spoken per second at speed 1.0.
    pub chars_per_second: f64,
    /// Pacing factor between chunks for the basic tier.
    pub basic_pace_factor: f64,
    /// Pacing factor between chunks for the premium tier.
    pub premium_pace_factor: f64,
    /// Lower bound on the time one highlight target stays active.
    pub min_highlight_delay_ms: u64,
    pub highlight: bool,
    /// Speak selected text once when no session is active.
    pub read_selection: bool,
    /// Translate selected text into `[text] target_language`.
    pub translate_selection: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            first_chunk_len: 200,
            visible_chunk_len: 1000,
            remaining_chunk_len: 2000,
            reading_speed: 1.0,
            chars_per_second: 15.0,
            basic_pace_factor: 1.0,
            premium_pace_factor: 0.5,
            min_highlight_delay_ms: 800,
            highlight: true,
            read_selection: false,
            translate_selection: false,
        }
    }
}

impl ReaderConfig {
    pub fn min_highlight_delay(&self) -> Duration {
        Duration::from_millis(self.min_highlight_delay_ms)
    }
}

/// Failure alerting (`[alerts]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Credential failures are POSTed here as JSON when set; otherwise they
    /// are only logged.
    pub webhook_url: Option<String>,
}

/// Logging (`[logging]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to ${LECTOR_HOME}/logs/lector.log.
    pub file: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub text: TextConfig,
    pub speech: SpeechConfig,
    pub reader: ReaderConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for lector configuration and state.
    //!
    //! LECTOR_HOME resolution order:
    //! 1. LECTOR_HOME environment variable (if set)
    //! 2. ~/.config/lector (default)

    use std::path::PathBuf;

    /// Returns the lector home directory.
    ///
    /// Checks `LECTOR_HOME` first, falls back to ~/.config/lector, then to a
    /// relative `.lector` when no home directory can be determined.
    pub fn lector_home() -> PathBuf {
        if let Ok(home) = std::env::var("LECTOR_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".lector"),
            |h| h.join(".config").join("lector"),
        )
    }

    pub fn config_path() -> PathBuf {
        lector_home().join("config.toml")
    }

    /// Key-value state (known-good credentials).
    pub fn state_path() -> PathBuf {
        lector_home().join("state.json")
    }

    pub fn logs_dir() -> PathBuf {
        lector_home().join("logs")
    }
}

impl Config {
    /// Loads configuration from ${LECTOR_HOME}/config.toml.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the default template to `path`.
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Used by `xtask update-default-config` to keep `default_config.toml` in
    /// sync with the defaults above. The embedded template supplies structure
    /// and comments; values come from `Config::default()`.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
