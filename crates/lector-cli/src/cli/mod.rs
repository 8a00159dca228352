//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lector_core::config::{self, LoggingConfig};
use lector_core::speech::SpeechTier;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "lector")]
#[command(version)]
#[command(about = "Read long documents aloud, chunk by chunk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Clean up extraction artifacts in text
    Normalize {
        /// Input file (stdin when omitted or "-")
        file: Option<PathBuf>,
    },

    /// Split text into speakable chunks
    Split {
        /// Input file (stdin when omitted or "-")
        file: Option<PathBuf>,

        /// Target chunk length in bytes
        #[arg(long, default_value_t = 1000)]
        max_length: usize,

        /// Length of the first chunk (kept short for a fast start)
        #[arg(long)]
        first_length: Option<usize>,

        /// Print chunks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where headings appear to end
    Titles {
        /// Input file (stdin when omitted or "-")
        file: Option<PathBuf>,

        /// Window size in bytes; at most one boundary per window
        #[arg(long, default_value_t = 500)]
        window: usize,
    },

    /// Read a document aloud
    Read {
        /// Document to read (stdin when "-")
        file: PathBuf,

        /// How much of the document counts as on screen
        #[arg(long, default_value_t = 2000)]
        visible_chars: usize,

        /// Speech tier (basic, premium); overrides the config
        #[arg(long, env = "LECTOR_TIER")]
        tier: Option<SpeechTier>,
    },

    /// Translate text
    Translate {
        /// Input file (stdin when omitted or "-")
        file: Option<PathBuf>,

        /// Target language (defaults to [text] target_language)
        #[arg(long)]
        to: Option<String>,
    },

    /// Summarize text, or the section around an offset
    Summarize {
        /// Input file (stdin when omitted or "-")
        file: Option<PathBuf>,

        /// Byte offset; only the section containing it is summarized
        #[arg(long)]
        at: Option<usize>,
    },

    /// Explain text in plain language
    Explain {
        /// Input file (stdin when omitted or "-")
        file: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load().context("load config")?;
    let _log_guard = init_logging(&config.logging)?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli.command, config).await })
}

async fn dispatch(command: Commands, config: config::Config) -> Result<()> {
    match command {
        Commands::Normalize { file } => commands::text::normalize(file.as_deref()),
        Commands::Split {
            file,
            max_length,
            first_length,
            json,
        } => commands::text::split(file.as_deref(), max_length, first_length, json),
        Commands::Titles { file, window } => commands::text::titles(file.as_deref(), window),

        Commands::Read {
            file,
            visible_chars,
            tier,
        } => {
            commands::read::run(commands::read::ReadOptions {
                file: &file,
                visible_chars,
                tier,
                config: &config,
            })
            .await
        }

        Commands::Translate { file, to } => {
            commands::assist::translate(file.as_deref(), to.as_deref(), &config).await
        }
        Commands::Summarize { file, at } => {
            commands::assist::summarize(file.as_deref(), at, &config).await
        }
        Commands::Explain { file } => commands::assist::explain(file.as_deref(), &config).await,

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },
    }
}

/// Logs to stderr, filtered by `LECTOR_LOG` (default `warn`), and to
/// `$LECTOR_HOME/logs/lector.log` when `[logging] file` is set.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env("LECTOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if !logging.file {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()
            .context("install logger")?;
        return Ok(None);
    }

    let logs_dir = config::paths::logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("create log directory {}", logs_dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&logs_dir, "lector.log"));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()
        .context("install logger")?;
    Ok(Some(guard))
}
