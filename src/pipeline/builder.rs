//! Record builder: turns a parsed report into the two files the filing tool
//! consumes (the field template and the full-text notes).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{DePriority, ProjectConfig};
use crate::error::BuildError;
use crate::pipeline::profile::ProductProfile;
use crate::pipeline::types::ReportRecord;

/// Rendered artifact contents, not yet on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub template: String,
    pub notes: String,
}

/// Where `write_artifacts` put the files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub template: PathBuf,
    pub notes: PathBuf,
}

impl ArtifactPaths {
    pub fn for_product(dir: &Path, product: &str) -> Self {
        Self {
            template: dir.join(format!("{product}-DDTS-Template.txt")),
            notes: dir.join(format!("{product}-MR-Full-Text.txt")),
        }
    }
}

/// Render the template and notes for `record`.
pub fn build(
    project: &ProjectConfig,
    profile: &ProductProfile,
    record: &ReportRecord,
) -> Result<Artifacts, BuildError> {
    let limits = project.limits;

    let headline = truncate_chars(&record.headline, limits.headline);
    if profile.require_headline && headline.trim().is_empty() {
        return Err(BuildError::MissingHeadline {
            id: record.id.clone(),
        });
    }

    let summary = if record.summary.is_empty() {
        headline
    } else {
        truncate_chars(&record.summary, limits.summary)
    };

    let de_priority = match &project.de_priority {
        DePriority::FromReport => record.severity.as_str(),
        DePriority::Fixed(value) => value.as_str(),
    };

    let mut template = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(template, "Project: {}", project.project);
    let _ = writeln!(template, "Product: {}", project.product);
    let _ = writeln!(template, "Component: {}", project.component);
    let _ = writeln!(template, "Version: {}", project.version);
    let _ = writeln!(template, "Headline: {headline}");
    let _ = writeln!(template, "Severity: {}", project.severity);
    let _ = writeln!(
        template,
        "Attribute: {}{}{}",
        record.id, profile.attribute_separator, project.release_attribute
    );
    let _ = writeln!(template, "DE-priority: {de_priority}");
    if let Some(classification) = &project.data_classification {
        let _ = writeln!(template, "Data-classification: {}", classification.label);
        let _ = writeln!(
            template,
            "Data-classification-reason: {}",
            classification.reason
        );
    }
    let _ = write!(template, "Summary: {summary}");

    let notes = truncate_chars(record.full_text.trim_end(), limits.notes).to_string();

    Ok(Artifacts { template, notes })
}

/// Write both artifacts into `dir`, replacing any previous run's files.
pub async fn write_artifacts(
    dir: &Path,
    product: &str,
    artifacts: &Artifacts,
) -> Result<ArtifactPaths, BuildError> {
    let paths = ArtifactPaths::for_product(dir, product);
    for (path, contents) in [
        (&paths.template, &artifacts.template),
        (&paths.notes, &artifacts.notes),
    ] {
        tokio::fs::write(path, contents)
            .await
            .map_err(|source| BuildError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote artifact");
    }
    Ok(paths)
}

/// At most `limit` characters of `s`, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
