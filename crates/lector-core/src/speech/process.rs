//! Running external speech and player commands.

use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::SpeechError;

/// A command line with `{name}` placeholders.
///
/// The template is split on whitespace once; placeholders are substituted
/// inside individual arguments, so substituted text always stays a single
/// argument and never passes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    /// # Errors
    /// Returns [`SpeechError::Unavailable`] for a blank template.
    pub fn parse(template: &str) -> Result<Self, SpeechError> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SpeechError::Unavailable("empty command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{name}}}"), value)
                })
            })
            .collect()
    }

    pub fn command(&self, vars: &[(&str, &str)]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.render_args(vars))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

/// Runs `command` to completion, killing it as soon as `token` is cancelled.
///
/// # Errors
/// [`SpeechError::Playback`] when the program cannot be started or exits
/// non-zero, [`SpeechError::Cancelled`] when the token fires first.
pub async fn run_until_cancelled(
    mut command: Command,
    program: &str,
    token: &CancellationToken,
) -> Result<(), SpeechError> {
    if token.is_cancelled() {
        return Err(SpeechError::Cancelled);
    }

    let mut child = command
        .spawn()
        .map_err(|e| SpeechError::Playback(format!("failed to start {program}: {e}")))?;

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(SpeechError::Playback(format!("{program} exited with {status}"))),
            Err(e) => Err(SpeechError::Playback(format!("{program} failed: {e}"))),
        },
        () = token.cancelled() => {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Failed to kill {program}: {e}");
            }
            let _ = child.wait().await;
            Err(SpeechError::Cancelled)
        }
    }
}
