//! Shared types for the report filing pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Report identifier ───────────────────────────────────────────────

/// Canonical report identifier (e.g. `ATTip12345`, `MDSIADCISC-16`).
///
/// Used both as the ledger key and as the tracker query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReportId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Result of matching a subject line against a product's patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Subject is not a new-report notification.
    NotNew,
    /// Subject looks like a new report, but no identifier pattern matched.
    ClassifiedButUnextractable,
    /// New report with its identifier and the kind of pattern that matched.
    New { id: ReportId, kind: String },
}

impl Classification {
    /// The identifier, if this is a usable new report.
    pub fn report_id(&self) -> Option<&ReportId> {
        match self {
            Classification::New { id, .. } => Some(id),
            _ => None,
        }
    }
}

// ── Parsed body ─────────────────────────────────────────────────────

/// A record field that a body label can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    Id,
    Headline,
    Severity,
    Summary,
}

/// Structured fields extracted from a message body, plus the full text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Identifier found in the body (may be empty; caller substitutes).
    pub id: String,
    /// Headline / abstract.
    pub headline: String,
    /// Severity as reported upstream (becomes DE-priority for some products).
    pub severity: String,
    /// Free-text summary.
    pub summary: String,
    /// Cleaned verbatim body text.
    #[serde(skip_serializing)]
    pub full_text: String,
}

impl ReportRecord {
    /// Whether `field` already holds a value.
    pub fn is_set(&self, field: ReportField) -> bool {
        !self.field(field).is_empty()
    }

    pub fn field(&self, field: ReportField) -> &str {
        match field {
            ReportField::Id => &self.id,
            ReportField::Headline => &self.headline,
            ReportField::Severity => &self.severity,
            ReportField::Summary => &self.summary,
        }
    }

    /// Fill the id from the subject when the body had none, or always when
    /// the subject id is authoritative for the product.
    pub fn resolve_id(&mut self, subject_id: &str, subject_authoritative: bool) {
        if subject_authoritative || self.id.is_empty() {
            self.id = subject_id.to_string();
        }
    }

    pub fn set(&mut self, field: ReportField, value: String) {
        match field {
            ReportField::Id => self.id = value,
            ReportField::Headline => self.headline = value,
            ReportField::Severity => self.severity = value,
            ReportField::Summary => self.summary = value,
        }
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Terminal outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Subject does not announce a new report (or has no usable identifier).
    SkipNotNew,
    /// Identifier is already in the ledger.
    SkipKnown { id: ReportId },
    /// Tracker already has a record; the ledger was updated.
    SkipTrackerExists { id: ReportId },
    /// A new tracker record was filed and the ledger was updated.
    Filed { id: ReportId },
}

impl Outcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::SkipNotNew => "skip_not_new",
            Outcome::SkipKnown { .. } => "skip_known",
            Outcome::SkipTrackerExists { .. } => "skip_tracker_exists",
            Outcome::Filed { .. } => "filed",
        }
    }
}

/// Counts for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub alias: String,
    pub first: u64,
    pub last: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub messages: usize,
    pub not_new: usize,
    pub known: usize,
    pub tracker_exists: usize,
    pub filed: Vec<ReportId>,
    pub failed: usize,
}

impl RunSummary {
    pub fn new(alias: &str, first: u64, last: u64) -> Self {
        Self {
            alias: alias.to_string(),
            first,
            last,
            started_at: Utc::now(),
            finished_at: None,
            messages: 0,
            not_new: 0,
            known: 0,
            tracker_exists: 0,
            filed: Vec::new(),
            failed: 0,
        }
    }

    /// Record one message's result.
    pub fn record<E>(&mut self, result: &Result<Outcome, E>) {
        self.messages += 1;
        match result {
            Ok(Outcome::SkipNotNew) => self.not_new += 1,
            Ok(Outcome::SkipKnown { .. }) => self.known += 1,
            Ok(Outcome::SkipTrackerExists { .. }) => self.tracker_exists += 1,
            Ok(Outcome::Filed { id }) => self.filed.push(id.clone()),
            Err(_) => self.failed += 1,
        }
    }
}
