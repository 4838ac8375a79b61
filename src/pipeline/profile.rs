//! Per-product strategy values.
//!
//! Each mail source announces new reports differently and each tracker
//! product wants slightly different records. A `ProductProfile` carries
//! every one of those differences so the pipeline itself stays generic.

use regex::Regex;

use crate::config::{DataClassification, DePriority};
use crate::error::ConfigError;
use crate::pipeline::types::ReportField;

/// Footer line that ends the useful part of a forwarded JIRA notification.
pub const JIRA_FOOTER_MARKER: &str = "AT&T Proprietary (Internal Use Only)";

/// Default tracker filing command shared by both products.
const FILE_COMMAND: &str =
    "/usr/cisco/bin/addcr -q -T {template} -n N-comments -f {notes} Dev-escape N";

/// A named identifier pattern. Patterns are tried in priority order.
#[derive(Debug, Clone)]
pub struct IdPattern {
    /// Label reported alongside the id (e.g. `ATTip`, `CC`).
    pub kind: String,
    pub regex: Regex,
}

/// How much of a labelled line becomes the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSpan {
    /// Everything after the label.
    Rest,
    /// Text after the label up to the next `:`.
    FirstSegment,
}

/// Maps a body line prefix to a record field.
#[derive(Debug, Clone)]
pub struct LabelRule {
    pub label: String,
    pub field: ReportField,
    pub span: ValueSpan,
}

impl LabelRule {
    pub fn new(label: &str, field: ReportField, span: ValueSpan) -> Self {
        Self {
            label: label.to_string(),
            field,
            span,
        }
    }
}

/// Everything that differs between mail sources / tracker products.
#[derive(Debug, Clone)]
pub struct ProductProfile {
    pub name: String,
    /// Matches subjects that announce a new report.
    pub new_subject: Regex,
    /// Identifier patterns in priority order.
    pub id_patterns: Vec<IdPattern>,
    /// Body labels to extract.
    pub labels: Vec<LabelRule>,
    /// Body lines starting with this end extraction.
    pub footer_marker: Option<String>,
    /// Always use the subject id, ignoring any id found in the body.
    pub subject_id_authoritative: bool,
    /// Refuse to build a record without a headline.
    pub require_headline: bool,
    /// Between the report id and the release attribute in `Attribute:`.
    pub attribute_separator: String,
    pub default_de_priority: DePriority,
    pub default_data_classification: Option<DataClassification>,
    /// Query command template (`{project}`, `{product}`, `{id}`).
    pub query_command: String,
    /// Filing command template (`{template}`, `{notes}`).
    pub file_command: String,
    /// Filing output containing this token also counts as success.
    pub success_token: Option<String>,
    /// Delete the generated artifacts at the end of a run.
    pub remove_artifacts: bool,
}

impl ProductProfile {
    /// Look up a built-in profile by name.
    pub fn by_name(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "attip" | "att-ip" | "scrubber" => Self::att_ip(),
            "jira" => Self::jira(),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }

    /// MR notifications with subjects like `ATTip12345:Project:New:3:...`.
    pub fn att_ip() -> Result<Self, ConfigError> {
        Ok(Self {
            name: "attip".into(),
            new_subject: compile(r"^ATTip\d{5}:[\w|\-]+:New:\d:")?,
            id_patterns: vec![IdPattern {
                kind: "ATTip".into(),
                regex: compile(r"^ATTip\d{5}")?,
            }],
            labels: vec![
                LabelRule::new("MR:", ReportField::Id, ValueSpan::FirstSegment),
                LabelRule::new("Abstract:", ReportField::Headline, ValueSpan::FirstSegment),
                LabelRule::new("Severity:", ReportField::Severity, ValueSpan::FirstSegment),
                LabelRule::new("Summary:", ReportField::Summary, ValueSpan::FirstSegment),
            ],
            footer_marker: None,
            subject_id_authoritative: false,
            require_headline: false,
            attribute_separator: " ".into(),
            default_de_priority: DePriority::FromReport,
            default_data_classification: None,
            query_command: "/usr/cisco/bin/findcr -c -n -p {project} \
                            \"Product = '{product}' and Attribute LIKE '*{id}*'\""
                .into(),
            file_command: FILE_COMMAND.into(),
            success_token: None,
            remove_artifacts: true,
        })
    }

    /// JIRA notifications with subjects like `[JIRA] Created: (MDSIADCISC-16) ...`.
    pub fn jira() -> Result<Self, ConfigError> {
        Ok(Self {
            name: "jira".into(),
            new_subject: compile(r"\[JIRA\] [cC]reated:? \(\w+-\d+\)")?,
            id_patterns: vec![
                IdPattern {
                    kind: "MDSIADCISC".into(),
                    regex: compile(r"MDSIADCISC-\d+")?,
                },
                IdPattern {
                    kind: "CC".into(),
                    regex: compile(r"CC-\d+")?,
                },
            ],
            labels: vec![
                LabelRule::new("Summary: ", ReportField::Summary, ValueSpan::Rest),
                LabelRule::new("Key: ", ReportField::Id, ValueSpan::FirstSegment),
            ],
            footer_marker: Some(JIRA_FOOTER_MARKER.into()),
            subject_id_authoritative: true,
            require_headline: true,
            attribute_separator: "  ".into(),
            default_de_priority: DePriority::Fixed("3".into()),
            default_data_classification: Some(DataClassification {
                label: "Cisco Confidential".into(),
                reason: "Default value of Data-classification set to Cisco Confidential by system"
                    .into(),
            }),
            query_command: "/usr/cisco/bin/findcr -c -n -p {project} \
                            \"Product = '{product}' and Attribute LIKE '*{id} *'\""
                .into(),
            file_command: FILE_COMMAND.into(),
            success_token: Some("CSC".into()),
            remove_artifacts: true,
        })
    }

    /// Replace the new-report subject pattern.
    pub fn with_subject_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.new_subject = compile(pattern)?;
        Ok(self)
    }

    /// Replace the identifier patterns from a `kind=regex;kind=regex` list.
    pub fn with_id_patterns(mut self, spec: &str) -> Result<Self, ConfigError> {
        let mut patterns = Vec::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (kind, pattern) =
                entry
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: "MRFILER_ID_PATTERNS".into(),
                        message: format!("expected kind=regex, got {entry:?}"),
                    })?;
            patterns.push(IdPattern {
                kind: kind.trim().to_string(),
                regex: compile(pattern.trim())?,
            });
        }
        if patterns.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "MRFILER_ID_PATTERNS".into(),
                message: "no identifier patterns given".into(),
            });
        }
        self.id_patterns = patterns;
        Ok(self)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(ProductProfile::by_name("attip").unwrap().name, "attip");
        assert_eq!(ProductProfile::by_name(" JIRA ").unwrap().name, "jira");
        assert!(matches!(
            ProductProfile::by_name("bugzilla"),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn query_patterns_stay_distinct() {
        let attip = ProductProfile::att_ip().unwrap();
        let jira = ProductProfile::jira().unwrap();
        assert!(attip.query_command.contains("LIKE '*{id}*'"));
        assert!(jira.query_command.contains("LIKE '*{id} *'"));
    }

    #[test]
    fn id_pattern_override() {
        let profile = ProductProfile::jira()
            .unwrap()
            .with_id_patterns("PROJ=PROJ-\\d+; OPS=OPS-\\d+")
            .unwrap();
        let kinds: Vec<_> = profile.id_patterns.iter().map(|p| p.kind.as_str()).collect();
        assert_eq!(kinds, vec!["PROJ", "OPS"]);
    }

    #[test]
    fn id_pattern_override_rejects_garbage() {
        let profile = ProductProfile::jira().unwrap();
        assert!(profile.clone().with_id_patterns("no-equals-sign").is_err());
        assert!(profile.clone().with_id_patterns("X=(").is_err());
        assert!(profile.with_id_patterns(" ; ").is_err());
    }
}
