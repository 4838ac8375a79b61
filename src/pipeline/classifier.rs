//! Subject classifier.
//!
//! Two independent matches: the profile's new-report pattern decides whether
//! a subject announces a report at all, then the identifier patterns (in
//! priority order) pull out the canonical id.

use tracing::debug;

use crate::pipeline::profile::ProductProfile;
use crate::pipeline::types::{Classification, ReportId};

pub struct SubjectClassifier<'a> {
    profile: &'a ProductProfile,
}

impl<'a> SubjectClassifier<'a> {
    pub fn new(profile: &'a ProductProfile) -> Self {
        Self { profile }
    }

    pub fn classify(&self, subject: &str) -> Classification {
        if !self.profile.new_subject.is_match(subject) {
            return Classification::NotNew;
        }

        for pattern in &self.profile.id_patterns {
            if let Some(found) = pattern.regex.find(subject) {
                return Classification::New {
                    id: ReportId::new(found.as_str()),
                    kind: pattern.kind.clone(),
                };
            }
        }

        debug!(subject = %subject, "New-report subject without a recognizable id");
        Classification::ClassifiedButUnextractable
    }
}
