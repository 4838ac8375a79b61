//! Body extractor.
//!
//! One pass over the body lines, no backtracking:
//! 1. stop at the profile's footer marker, if any
//! 2. undo quoted-printable leftovers (`=` soft breaks, `=3D`)
//! 3. append the cleaned line to the full text
//! 4. strip one quote marker and match labelled fields (first one wins)

use crate::pipeline::profile::{LabelRule, ProductProfile, ValueSpan};
use crate::pipeline::types::ReportRecord;

pub struct BodyExtractor<'a> {
    profile: &'a ProductProfile,
}

impl<'a> BodyExtractor<'a> {
    pub fn new(profile: &'a ProductProfile) -> Self {
        Self { profile }
    }

    pub fn extract<I, S>(&self, lines: I) -> ReportRecord
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut record = ReportRecord::default();

        for line in lines {
            let line = line.as_ref();

            if let Some(marker) = self.profile.footer_marker.as_deref()
                && line.starts_with(marker)
            {
                break;
            }

            let (cleaned, soft_break) = clean_transport_line(line);
            record.full_text.push_str(&cleaned);
            if !soft_break {
                record.full_text.push('\n');
            }

            let candidate = cleaned.strip_prefix('>').unwrap_or(&cleaned).trim_start();
            if let Some((rule, value)) = match_label(&self.profile.labels, candidate)
                && !record.is_set(rule.field)
            {
                record.set(rule.field, value);
            }
        }

        if record.headline.is_empty() {
            record.headline = record.summary.clone();
        }
        record
    }
}

/// Remove a trailing soft-break `=` and unescape `=3D`.
///
/// Returns the cleaned line and whether it ended in a soft break (and so
/// continues on the next line without a newline).
pub fn clean_transport_line(line: &str) -> (String, bool) {
    let (body, soft_break) = match line.strip_suffix('=') {
        Some(body) => (body, true),
        None => (line, false),
    };
    (body.replace("=3D", "="), soft_break)
}

/// First rule whose label prefixes `line`, with its (non-empty) value.
fn match_label<'r>(rules: &'r [LabelRule], line: &str) -> Option<(&'r LabelRule, String)> {
    rules.iter().find_map(|rule| {
        let rest = line.strip_prefix(rule.label.as_str())?;
        let value = match rule.span {
            ValueSpan::Rest => rest,
            ValueSpan::FirstSegment => rest.split(':').next().unwrap_or_default(),
        }
        .trim();
        (!value.is_empty()).then(|| (rule, value.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attip() -> ProductProfile {
        ProductProfile::att_ip().unwrap()
    }

    fn jira() -> ProductProfile {
        ProductProfile::jira().unwrap()
    }

    #[test]
    fn attip_fields_extracted() {
        let profile = attip();
        let record = BodyExtractor::new(&profile).extract([
            "MR: ATTip12345",
            "Abstract: BGP session flaps",
            "Severity: 2",
            "Summary: neighbor resets every 30s",
            "",
            "Details follow.",
        ]);
        assert_eq!(record.id, "ATTip12345");
        assert_eq!(record.headline, "BGP session flaps");
        assert_eq!(record.severity, "2");
        assert_eq!(record.summary, "neighbor resets every 30s");
        assert_eq!(
            record.full_text,
            "MR: ATTip12345\nAbstract: BGP session flaps\nSeverity: 2\n\
             Summary: neighbor resets every 30s\n\nDetails follow.\n"
        );
    }

    #[test]
    fn headline_defaults_to_summary() {
        let profile = attip();
        let record = BodyExtractor::new(&profile).extract(["Summary: disk fills up"]);
        assert_eq!(record.summary, "disk fills up");
        assert_eq!(record.headline, "disk fills up");
    }

    #[test]
    fn first_occurrence_wins() {
        let profile = attip();
        let record = BodyExtractor::new(&profile).extract([
            "Summary: first summary",
            "> Summary: quoted later summary",
            "Summary: third summary",
        ]);
        assert_eq!(record.summary, "first summary");
    }

    #[test]
    fn empty_label_does_not_claim_field() {
        let profile = attip();
        let record =
            BodyExtractor::new(&profile).extract(["Abstract:", "Abstract: real headline"]);
        assert_eq!(record.headline, "real headline");
    }

    #[test]
    fn first_segment_stops_at_next_colon() {
        let profile = attip();
        let record = BodyExtractor::new(&profile).extract(["Summary: disk full: /var"]);
        assert_eq!(record.summary, "disk full");
    }

    #[test]
    fn rest_span_keeps_colons() {
        let profile = jira();
        let record = BodyExtractor::new(&profile).extract(["Summary: 5501: link down: slot 3"]);
        assert_eq!(record.summary, "5501: link down: slot 3");
        assert_eq!(record.headline, "5501: link down: slot 3");
    }

    #[test]
    fn labels_are_case_sensitive() {
        let profile = attip();
        let record = BodyExtractor::new(&profile).extract(["summary: lower case"]);
        assert!(record.summary.is_empty());
    }

    #[test]
    fn quoted_lines_match_but_blob_keeps_marker() {
        let profile = jira();
        let record =
            BodyExtractor::new(&profile).extract(["> Key: MDSIADCISC-16", ">   Summary: quoted"]);
        assert_eq!(record.id, "MDSIADCISC-16");
        assert_eq!(record.summary, "quoted");
        assert_eq!(record.full_text, "> Key: MDSIADCISC-16\n>   Summary: quoted\n");
    }

    #[test]
    fn soft_breaks_join_without_newline() {
        let profile = jira();
        let record = BodyExtractor::new(&profile).extract([
            "This sentence was wrapped by the=",
            " mail gateway.",
            "Next line",
        ]);
        assert_eq!(
            record.full_text,
            "This sentence was wrapped by the mail gateway.\nNext line\n"
        );
    }

    #[test]
    fn escaped_equals_unescaped() {
        let profile = jira();
        let record = BodyExtractor::new(&profile).extract([
            "=3D=3D=3D=3D",
            "a =3D b=",
            "3D tail",
        ]);
        assert_eq!(record.full_text, "====\na = b3D tail\n");
    }

    #[test]
    fn footer_stops_extraction_when_enabled() {
        let profile = jira();
        let record = BodyExtractor::new(&profile).extract([
            "Summary: real summary",
            "AT&T Proprietary (Internal Use Only)",
            "Summary: disclaimer text",
            "Not for use or disclosure outside AT&T",
        ]);
        assert_eq!(record.summary, "real summary");
        assert_eq!(record.full_text, "Summary: real summary\n");
    }

    #[test]
    fn footer_ignored_when_disabled() {
        let profile = attip();
        let record = BodyExtractor::new(&profile).extract([
            "AT&T Proprietary (Internal Use Only)",
            "Summary: after footer",
        ]);
        assert_eq!(record.summary, "after footer");
        assert!(record.full_text.starts_with("AT&T Proprietary"));
    }

    #[test]
    fn clean_transport_line_cases() {
        assert_eq!(clean_transport_line("plain"), ("plain".into(), false));
        assert_eq!(clean_transport_line("wrapped="), ("wrapped".into(), true));
        assert_eq!(clean_transport_line("x=3Dy="), ("x=y".into(), true));
        assert_eq!(clean_transport_line(""), ("".into(), false));
    }

    #[test]
    fn resolve_id_from_subject() {
        let mut record = ReportRecord::default();
        record.resolve_id("ATTip12345", false);
        assert_eq!(record.id, "ATTip12345");

        record.id = "ATTip00001".into();
        record.resolve_id("ATTip12345", false);
        assert_eq!(record.id, "ATTip00001");

        record.resolve_id("MDSIADCISC-16", true);
        assert_eq!(record.id, "MDSIADCISC-16");
    }
}
