//! Error types for the MR filer.

use std::path::PathBuf;
use std::time::Duration;

/// Fatal errors. Any of these ends the run before or while fetching the range.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to {server} for alias {alias}: {source}")]
    Connection {
        server: String,
        alias: String,
        #[source]
        source: MailError,
    },

    #[error("Failed to retrieve messages {first}-{last} for alias {alias}: {source}")]
    Fetch {
        alias: String,
        first: u64,
        last: u64,
        #[source]
        source: MailError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown product profile: {0} (expected one of: attip, jira)")]
    UnknownProfile(String),

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Mail session (NNTP) errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Server rejected {command}: {response}")]
    Rejected { command: String, response: String },

    #[error("Malformed server response: {0}")]
    Malformed(String),

    #[error("Connection closed by server")]
    Closed,

    #[error("Mail task failed: {0}")]
    Task(String),
}

/// Errors from the external tracker command-line tools.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with code {code}: {output}")]
    NonZeroExit {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Unexpected output from `{command}`: {output}")]
    UnexpectedOutput { command: String, output: String },
}

/// Known-report ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Record builder errors.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Report {id} has no headline")]
    MissingHeadline { id: String },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-message failures. Logged and counted; the message is retried next run.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Tracker query failed for {id}: {source}")]
    TrackerQuery {
        id: String,
        #[source]
        source: TrackerError,
    },

    #[error("Failed to fetch body of message {message}: {source}")]
    BodyFetch {
        message: u64,
        #[source]
        source: MailError,
    },

    #[error("Artifact error: {0}")]
    Build(#[from] BuildError),

    #[error("Filing failed for {id}: {source}")]
    Filing {
        id: String,
        #[source]
        source: TrackerError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl MessageError {
    /// Short label used in structured logs and run summaries.
    pub fn label(&self) -> &'static str {
        match self {
            MessageError::TrackerQuery { .. } => "tracker_query",
            MessageError::BodyFetch { .. } => "body_fetch",
            MessageError::Build(_) => "artifact",
            MessageError::Filing { .. } => "filing",
            MessageError::Ledger(_) => "ledger",
        }
    }
}
