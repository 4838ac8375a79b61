//! Pipeline orchestrator.
//!
//! Per message: classify → ledger gate → tracker gate → extract → build →
//! file → ledger append. Each message either ends in an `Outcome` or a
//! `MessageError`; only failures before the loop (fetching the overview)
//! abort the run.
//!
//! **Core invariant: an id reaches the ledger only once the tracker is known
//! to hold a record for it.** Any failure leaves the ledger untouched so the
//! message is retried next run.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::channels::{GroupRange, MailSession, MessageHeader, extract_owner};
use crate::config::{FilerConfig, ProjectConfig, RunOptions};
use crate::error::{MessageError, RunError};
use crate::pipeline::builder::{self, ArtifactPaths};
use crate::pipeline::classifier::SubjectClassifier;
use crate::pipeline::extractor::BodyExtractor;
use crate::pipeline::ledger::Ledger;
use crate::pipeline::profile::ProductProfile;
use crate::pipeline::types::{Classification, Outcome, ReportId, RunSummary};
use crate::tracker::Tracker;

pub struct Pipeline {
    profile: ProductProfile,
    project: ProjectConfig,
    options: RunOptions,
    alias: String,
    tracker: Arc<dyn Tracker>,
    ledger: Ledger,
}

impl Pipeline {
    pub fn new(config: &FilerConfig, tracker: Arc<dyn Tracker>, ledger: Ledger) -> Self {
        Self {
            profile: config.profile.clone(),
            project: config.project.clone(),
            options: config.run.clone(),
            alias: config.mail.alias.clone(),
            tracker,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Process every message in `range`.
    pub async fn run(
        &mut self,
        session: &mut dyn MailSession,
        range: GroupRange,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::new(&self.alias, range.first, range.last);
        info!(
            alias = %self.alias,
            profile = %self.profile.name,
            first = range.first,
            last = range.last,
            count = range.count,
            "Starting run"
        );

        let headers = if range.count == 0 || range.first > range.last {
            info!(alias = %self.alias, "Alias is empty, nothing to do");
            Vec::new()
        } else {
            session
                .fetch_overview(range.first, range.last)
                .await
                .map_err(|source| RunError::Fetch {
                    alias: self.alias.clone(),
                    first: range.first,
                    last: range.last,
                    source,
                })?
        };

        for header in &headers {
            if let Some(limit) = self.options.debug_limit
                && header.id > limit
            {
                info!(limit, "Debug limit reached, stopping");
                break;
            }

            let result = self.process_message(session, header).await;
            match &result {
                Ok(outcome) => debug!(article = header.id, outcome = outcome.label(), "Message done"),
                Err(e) => error!(
                    article = header.id,
                    kind = e.label(),
                    error = %e,
                    "Failed to process message"
                ),
            }
            summary.record(&result);
        }

        tokio::time::sleep(self.options.final_delay).await;
        if self.profile.remove_artifacts {
            self.remove_artifacts().await;
        }

        summary.finished_at = Some(Utc::now());
        info!(
            alias = %self.alias,
            summary = %serde_json::to_string(&summary).unwrap_or_default(),
            "Successfully processed messages from alias"
        );
        Ok(summary)
    }

    /// Take one message as far through the pipeline as it should go.
    pub async fn process_message(
        &mut self,
        session: &mut dyn MailSession,
        header: &MessageHeader,
    ) -> Result<Outcome, MessageError> {
        if self.options.debug_dump {
            debug!(article = header.id, subject = %header.subject, from = %header.from, "Header");
        }

        let classifier = SubjectClassifier::new(&self.profile);
        let id = match classifier.classify(&header.subject) {
            Classification::New { id, kind } => {
                debug!(article = header.id, id = %id, kind = %kind, "New report subject");
                id
            }
            Classification::NotNew | Classification::ClassifiedButUnextractable => {
                info!(
                    article = header.id,
                    subject = %builder::truncate_chars(&header.subject, self.project.limits.headline),
                    "Not a new report"
                );
                return Ok(Outcome::SkipNotNew);
            }
        };

        if self.ledger.contains(&id) {
            info!(article = header.id, id = %id, ledger = %self.ledger.path().display(), "Report already in ledger");
            return Ok(Outcome::SkipKnown { id });
        }

        let exists = self
            .tracker
            .exists(&id)
            .await
            .map_err(|source| MessageError::TrackerQuery {
                id: id.to_string(),
                source,
            })?;
        if exists {
            self.ledger.append(&id).await?;
            info!(
                article = header.id,
                id = %id,
                product = %self.project.product,
                "Tracker record already exists, added to ledger"
            );
            return Ok(Outcome::SkipTrackerExists { id });
        }

        let owner = extract_owner(&header.from).unwrap_or_default();
        info!(
            article = header.id,
            id = %id,
            owner = %owner,
            product = %self.project.product,
            "No tracker record found, filing"
        );

        let body = session
            .fetch_body(header.id)
            .await
            .map_err(|source| MessageError::BodyFetch {
                message: header.id,
                source,
            })?;
        if self.options.debug_dump {
            debug!(article = header.id, body = %body.join("\n"), "Body");
        }

        let mut record = BodyExtractor::new(&self.profile).extract(&body);
        record.resolve_id(id.as_str(), self.profile.subject_id_authoritative);

        let artifacts = builder::build(&self.project, &self.profile, &record)?;
        let paths =
            builder::write_artifacts(&self.options.work_dir, &self.project.product, &artifacts)
                .await?;
        debug!(
            article = header.id,
            id = %id,
            record = %serde_json::to_string(&record).unwrap_or_default(),
            "Wrote tracker artifacts"
        );

        tokio::time::sleep(self.options.filing_delay).await;
        self.file(&id, &paths).await?;

        self.ledger.append(&id).await?;
        info!(article = header.id, id = %id, owner = %owner, "Filed tracker record, added to ledger");
        Ok(Outcome::Filed { id })
    }

    async fn file(&self, id: &ReportId, paths: &ArtifactPaths) -> Result<(), MessageError> {
        self.tracker
            .file(&paths.template, &paths.notes)
            .await
            .map_err(|source| MessageError::Filing {
                id: id.to_string(),
                source,
            })
    }

    /// Delete this run's artifacts. Missing files are fine.
    async fn remove_artifacts(&self) {
        let paths = ArtifactPaths::for_product(&self.options.work_dir, &self.project.product);
        for path in [&paths.template, &paths.notes] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{MailError, TrackerError};

    struct Session {
        headers: Vec<MessageHeader>,
    }

    #[async_trait]
    impl MailSession for Session {
        async fn fetch_overview(
            &mut self,
            _first: u64,
            _last: u64,
        ) -> Result<Vec<MessageHeader>, MailError> {
            Ok(self.headers.clone())
        }

        async fn fetch_body(&mut self, _id: u64) -> Result<Vec<String>, MailError> {
            Ok(vec![
                "Abstract: BGP session flaps".to_string(),
                "Summary: neighbor resets".to_string(),
            ])
        }

        async fn quit(&mut self) -> Result<(), MailError> {
            Ok(())
        }
    }

    /// Knows `ATTip11111`; accepts every filing.
    #[derive(Default)]
    struct KnownTracker {
        queries: Mutex<Vec<String>>,
        filings: Mutex<usize>,
    }

    #[async_trait]
    impl Tracker for KnownTracker {
        async fn exists(&self, id: &ReportId) -> Result<bool, TrackerError> {
            self.queries.lock().unwrap().push(id.to_string());
            Ok(id.as_str() == "ATTip11111")
        }

        async fn file(&self, _template: &Path, _notes: &Path) -> Result<(), TrackerError> {
            *self.filings.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn header(id: u64, subject: &str) -> MessageHeader {
        MessageHeader {
            id,
            subject: subject.to_string(),
            from: "owner@example.com".to_string(),
        }
    }

    fn config(work_dir: &Path) -> FilerConfig {
        let vars: HashMap<&str, String> = [
            ("MRFILER_PROFILE", "attip".to_string()),
            ("MRFILER_ALIAS", "eng.mr".to_string()),
            ("MRFILER_PRODUCT", "att-idc-ncs5500".to_string()),
            ("MRFILER_VERSION", "6.3.2".to_string()),
            ("MRFILER_COMPONENT", "sukhalid".to_string()),
            ("MRFILER_ATTRIBUTE", "ATT_IDC_RLS2".to_string()),
            ("MRFILER_WORK_DIR", work_dir.to_string_lossy().to_string()),
            ("MRFILER_FILING_DELAY_MS", "0".to_string()),
            ("MRFILER_FINAL_DELAY_MS", "0".to_string()),
        ]
        .into_iter()
        .collect();
        FilerConfig::from_lookup(move |key| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn ledger_write_failure_fails_message_not_run() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let ledger_path = config.run.ledger_path(&config.project.product);
        std::fs::write(&ledger_path, "").unwrap();
        let ledger = Ledger::open_read_only(&ledger_path).await.unwrap();

        let tracker = Arc::new(KnownTracker::default());
        let mut pipeline = Pipeline::new(&config, tracker.clone(), ledger);
        let mut session = Session {
            headers: vec![
                header(1, "ATTip11111:Proj:New:2: already tracked"),
                header(2, "ATTip22222:Proj:New:2: brand new"),
            ],
        };

        let first = session.headers[0].clone();
        let err = pipeline
            .process_message(&mut session, &first)
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Ledger(_)));
        assert_eq!(err.label(), "ledger");

        let range = GroupRange {
            count: 2,
            first: 1,
            last: 2,
        };
        let summary = pipeline.run(&mut session, range).await.unwrap();

        assert_eq!(summary.messages, 2);
        assert_eq!(summary.failed, 2);
        assert!(summary.filed.is_empty());
        assert_eq!(
            *tracker.queries.lock().unwrap(),
            vec!["ATTip11111", "ATTip11111", "ATTip22222"]
        );
        // The second message was filed, but its id could not be recorded.
        assert_eq!(*tracker.filings.lock().unwrap(), 1);
        assert!(pipeline.ledger().is_empty());
        assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), "");
    }
}
