//! Tracker backed by the `findcr` / `addcr` command-line tools.
//!
//! Commands are rendered from templates and run through `sh -c` with
//! captured output and a timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::{ProjectConfig, TrackerConfig};
use crate::error::TrackerError;
use crate::pipeline::profile::ProductProfile;
use crate::pipeline::types::ReportId;
use crate::tracker::Tracker;

/// Output kept in error messages.
const MAX_ERROR_OUTPUT: usize = 500;

/// Tracker that shells out to external query and filing tools.
#[derive(Debug, Clone)]
pub struct CommandTracker {
    project: String,
    product: String,
    query_template: String,
    file_template: String,
    /// Filing output containing this token counts as success.
    success_token: Option<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl CommandTracker {
    pub fn new(project: &ProjectConfig, tracker: &TrackerConfig, profile: &ProductProfile) -> Self {
        Self {
            project: project.project.clone(),
            product: project.product.clone(),
            query_template: tracker.query_command.clone(),
            file_template: tracker.file_command.clone(),
            success_token: profile.success_token.clone(),
            timeout: tracker.timeout,
            working_dir: None,
        }
    }

    /// Run commands from `dir` instead of the process cwd.
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Render the query command for `id`.
    pub fn query_command(&self, id: &ReportId) -> String {
        self.query_template
            .replace("{project}", &self.project)
            .replace("{product}", &self.product)
            .replace("{id}", id.as_str())
    }

    /// Render the filing command for the two artifact paths.
    pub fn file_command(&self, template: &Path, notes: &Path) -> String {
        self.file_template
            .replace("{template}", &shell_quote(&template.to_string_lossy()))
            .replace("{notes}", &shell_quote(&notes.to_string_lossy()))
    }

    /// Run a command, returning stdout. Non-zero exit is an error.
    async fn run(&self, cmd: &str) -> Result<String, TrackerError> {
        debug!(command = %cmd, "Running tracker command");

        let mut command = Command::new("sh");
        command
            .args(["-c", cmd])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(TrackerError::Spawn {
                    command: cmd.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(TrackerError::Timeout {
                    command: cmd.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let combined = if stderr.trim().is_empty() {
                stdout
            } else {
                format!("{stdout}{stderr}")
            };
            return Err(TrackerError::NonZeroExit {
                command: cmd.to_string(),
                code: output.status.code().unwrap_or(-1),
                output: truncate_for_error(combined.trim()),
            });
        }
        Ok(stdout)
    }
}

#[async_trait]
impl Tracker for CommandTracker {
    async fn exists(&self, id: &ReportId) -> Result<bool, TrackerError> {
        let cmd = self.query_command(id);
        let stdout = self.run(&cmd).await?;
        let count = stdout
            .trim()
            .parse::<u64>()
            .map_err(|_| TrackerError::UnexpectedOutput {
                command: cmd.clone(),
                output: truncate_for_error(stdout.trim()),
            })?;
        debug!(id = %id, count, "Tracker query result");
        Ok(count > 0)
    }

    async fn file(&self, template: &Path, notes: &Path) -> Result<(), TrackerError> {
        let cmd = self.file_command(template, notes);
        let stdout = self.run(&cmd).await?;
        let output = stdout.trim();

        // The filing tool prints nothing on success; some products echo the new record id.
        let accepted = output.is_empty()
            || self
                .success_token
                .as_deref()
                .is_some_and(|token| output.contains(token));
        if accepted {
            Ok(())
        } else {
            Err(TrackerError::UnexpectedOutput {
                command: cmd,
                output: truncate_for_error(output),
            })
        }
    }
}

/// Quote a value for `sh` unless it is made of obviously safe characters.
fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '+'));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn truncate_for_error(s: &str) -> String {
    if s.chars().count() <= MAX_ERROR_OUTPUT {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(MAX_ERROR_OUTPUT).collect::<String>())
    }
}
