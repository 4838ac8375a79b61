//! Configuration types.
//!
//! Everything is read once from the environment at startup and then passed
//! by reference; nothing here is mutated during a run.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::profile::ProductProfile;

/// Default news server hosting the MR aliases.
pub const DEFAULT_SERVER: &str = "news.cisco.com";

/// Default tracker project.
pub const DEFAULT_PROJECT: &str = "CSC.swtools";

/// Tracker field limits, kept below the real upstream limits as headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    /// Headline (upstream limit 72).
    pub headline: usize,
    /// Summary (upstream limit 2000).
    pub summary: usize,
    /// Full-text notes (upstream limit 16k).
    pub notes: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            headline: 70,
            summary: 1995,
            notes: 15800,
        }
    }
}

/// Where the record's `DE-priority` comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DePriority {
    /// The severity parsed from the message body.
    FromReport,
    /// A fixed value (sources without a priority field).
    Fixed(String),
}

/// Data classification label written into the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataClassification {
    pub label: String,
    pub reason: String,
}

/// Tracker project fields shared by every record filed in a run.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project: String,
    pub product: String,
    pub version: String,
    pub component: String,
    /// Appended to the report id in the record's `Attribute:` field.
    pub release_attribute: String,
    /// Severity given to every filed record.
    pub severity: String,
    pub de_priority: DePriority,
    pub data_classification: Option<DataClassification>,
    pub limits: FieldLimits,
}

/// News server connection settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    /// Newsgroup (mailer alias) carrying the MR notifications.
    pub alias: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub read_timeout: Duration,
}

/// External tracker command templates.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub query_command: String,
    pub file_command: String,
    pub timeout: Duration,
}

/// Pacing, paths and debugging knobs for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory holding the ledger and the generated artifacts.
    pub work_dir: PathBuf,
    /// Pause before each filing call.
    pub filing_delay: Duration,
    /// Pause at the end of a run.
    pub final_delay: Duration,
    /// Dump headers and bodies at debug level.
    pub debug_dump: bool,
    /// Stop after this message id (debugging only).
    pub debug_limit: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            filing_delay: Duration::from_millis(500),
            final_delay: Duration::from_secs(1),
            debug_dump: false,
            debug_limit: None,
        }
    }
}

impl RunOptions {
    pub fn ledger_path(&self, product: &str) -> PathBuf {
        self.work_dir.join(format!("{product}-Filed-MRs.txt"))
    }
}

/// Logging destinations.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    /// Also log to stderr.
    pub console: bool,
    /// Lower the default level to `debug` (header and body dumps).
    pub debug: bool,
}

/// Complete filer configuration.
#[derive(Debug, Clone)]
pub struct FilerConfig {
    pub profile: ProductProfile,
    pub mail: MailConfig,
    pub project: ProjectConfig,
    pub tracker: TrackerConfig,
    pub run: RunOptions,
    pub logging: LogConfig,
}

impl FilerConfig {
    /// Build config from `MRFILER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let mut profile = ProductProfile::by_name(&require("MRFILER_PROFILE")?)?;
        if let Some(pattern) = get("MRFILER_SUBJECT_PATTERN") {
            profile = profile.with_subject_pattern(&pattern)?;
        }
        if let Some(spec) = get("MRFILER_ID_PATTERNS") {
            profile = profile.with_id_patterns(&spec)?;
        }
        if let Some(marker) = get("MRFILER_FOOTER_MARKER") {
            profile.footer_marker = Some(marker);
        }

        let use_tls = parse_flag(get("MRFILER_TLS"));
        let port = match get("MRFILER_PORT") {
            Some(raw) => parse_num::<u16>("MRFILER_PORT", &raw)?,
            None if use_tls => 563,
            None => 119,
        };

        let mail = MailConfig {
            server: get("MRFILER_SERVER").unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            port,
            use_tls,
            alias: require("MRFILER_ALIAS")?,
            username: get("MRFILER_USERNAME"),
            password: get("MRFILER_PASSWORD").map(SecretString::from),
            read_timeout: Duration::from_secs(60),
        };

        let de_priority = match get("MRFILER_DE_PRIORITY") {
            Some(value) => DePriority::Fixed(value),
            None => profile.default_de_priority.clone(),
        };

        let data_classification = match get("MRFILER_DATA_CLASSIFICATION") {
            Some(label) => Some(DataClassification {
                label,
                reason: get("MRFILER_DATA_CLASSIFICATION_REASON")
                    .or_else(|| {
                        profile
                            .default_data_classification
                            .as_ref()
                            .map(|d| d.reason.clone())
                    })
                    .unwrap_or_default(),
            }),
            None => profile.default_data_classification.clone(),
        };

        let project = ProjectConfig {
            project: get("MRFILER_PROJECT").unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            product: require("MRFILER_PRODUCT")?,
            version: require("MRFILER_VERSION")?,
            component: require("MRFILER_COMPONENT")?,
            release_attribute: require("MRFILER_ATTRIBUTE")?,
            severity: get("MRFILER_SEVERITY").unwrap_or_else(|| "6".to_string()),
            de_priority,
            data_classification,
            limits: FieldLimits::default(),
        };

        let timeout_secs = match get("MRFILER_COMMAND_TIMEOUT_SECS") {
            Some(raw) => parse_num::<u64>("MRFILER_COMMAND_TIMEOUT_SECS", &raw)?,
            None => 120,
        };
        let tracker = TrackerConfig {
            query_command: get("MRFILER_QUERY_CMD").unwrap_or_else(|| profile.query_command.clone()),
            file_command: get("MRFILER_FILE_CMD").unwrap_or_else(|| profile.file_command.clone()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let defaults = RunOptions::default();
        let run = RunOptions {
            work_dir: get("MRFILER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            filing_delay: match get("MRFILER_FILING_DELAY_MS") {
                Some(raw) => Duration::from_millis(parse_num("MRFILER_FILING_DELAY_MS", &raw)?),
                None => defaults.filing_delay,
            },
            final_delay: match get("MRFILER_FINAL_DELAY_MS") {
                Some(raw) => Duration::from_millis(parse_num("MRFILER_FINAL_DELAY_MS", &raw)?),
                None => defaults.final_delay,
            },
            debug_dump: parse_flag(get("MRFILER_DEBUG")),
            debug_limit: get("MRFILER_DEBUG_LIMIT")
                .map(|raw| parse_num::<u64>("MRFILER_DEBUG_LIMIT", &raw))
                .transpose()?,
        };

        let logging = LogConfig {
            log_dir: get("MRFILER_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            console: parse_flag(get("MRFILER_CONSOLE")),
            debug: run.debug_dump,
        };

        Ok(Self {
            profile,
            mail,
            project,
            tracker,
            run,
            logging,
        })
    }
}

fn parse_flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
