//! Known-report ledger: the persisted list of report ids already handled.
//!
//! Plain text, one id per line, append-only. Loaded once per run; every
//! append goes to memory and then straight to disk so an interrupted run
//! keeps its dedup state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::pipeline::types::ReportId;

pub struct Ledger {
    path: PathBuf,
    file: File,
    /// Ids in file order.
    entries: Vec<ReportId>,
    index: HashSet<ReportId>,
    /// The file's last line has no terminating newline yet.
    unterminated: bool,
}

impl Ledger {
    /// Open (creating if needed) the ledger file and load its contents.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source: std::io::Error| LedgerError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(io_err)?;

        let unterminated = !contents.is_empty() && !contents.ends_with('\n');
        let mut entries = Vec::new();
        let mut index = HashSet::new();
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let id = ReportId::new(line);
            if index.insert(id.clone()) {
                entries.push(id);
            }
        }

        info!(path = %path.display(), known = entries.len(), "Loaded known-report ledger");
        Ok(Self {
            path,
            file,
            entries,
            index,
            unterminated,
        })
    }

    pub fn contains(&self, id: &ReportId) -> bool {
        self.index.contains(id)
    }

    /// Record `id` in memory, then append it to the file and flush.
    ///
    /// Appending an id that is already present is a no-op. If the write
    /// fails the id is dropped from memory again.
    pub async fn append(&mut self, id: &ReportId) -> Result<(), LedgerError> {
        if !self.index.insert(id.clone()) {
            debug!(id = %id, "Ledger already holds id");
            return Ok(());
        }
        self.entries.push(id.clone());

        // A hand-edited file may end mid-line; never glue ids together.
        let line = if self.unterminated {
            format!("\n{id}\n")
        } else {
            format!("{id}\n")
        };
        let result = async {
            self.file.write_all(line.as_bytes()).await?;
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;

        if let Err(source) = result {
            self.index.remove(id);
            self.entries.pop();
            return Err(LedgerError::Io {
                path: self.path.clone(),
                source,
            });
        }
        self.unterminated = false;
        debug!(id = %id, path = %self.path.display(), "Appended id to ledger");
        Ok(())
    }

    /// Open `path` without write access so every append fails.
    #[cfg(test)]
    pub(crate) async fn open_read_only(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .await
            .map_err(|source| LedgerError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file,
            entries: Vec::new(),
            index: HashSet::new(),
            unterminated: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in the order they were recorded.
    pub fn entries(&self) -> &[ReportId] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("prod-Filed-MRs.txt");
        let ledger = Ledger::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn loads_existing_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.txt");
        std::fs::write(&path, "ATTip12345\n\nATTip23456  \nATTip12345\n").unwrap();

        let ledger = Ledger::open(&path).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(&ReportId::new("ATTip12345")));
        assert!(ledger.contains(&ReportId::new("ATTip23456")));
        assert!(!ledger.contains(&ReportId::new("ATTip99999")));
    }

    #[tokio::test]
    async fn append_persists_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.txt");
        std::fs::write(&path, "ATTip12345\n").unwrap();

        let mut ledger = Ledger::open(&path).await.unwrap();
        ledger.append(&ReportId::new("ATTip99999")).await.unwrap();

        assert!(ledger.contains(&ReportId::new("ATTip99999")));
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "ATTip12345\nATTip99999\n");
    }

    #[tokio::test]
    async fn append_after_unterminated_last_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.txt");
        std::fs::write(&path, "ATTip12345").unwrap();

        let mut ledger = Ledger::open(&path).await.unwrap();
        ledger.append(&ReportId::new("ATTip99999")).await.unwrap();
        ledger.append(&ReportId::new("ATTip88888")).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ATTip12345\nATTip99999\nATTip88888\n"
        );
        let reopened = Ledger::open(&path).await.unwrap();
        assert!(reopened.contains(&ReportId::new("ATTip12345")));
        assert!(reopened.contains(&ReportId::new("ATTip99999")));
        assert_eq!(reopened.len(), 3);
    }

    #[tokio::test]
    async fn failed_append_is_reported_and_forgotten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.txt");
        std::fs::write(&path, "").unwrap();

        let mut ledger = Ledger::open_read_only(&path).await.unwrap();
        let err = ledger.append(&ReportId::new("CC-7")).await.unwrap_err();

        assert!(matches!(err, LedgerError::Io { ref path, .. } if path.ends_with("ledger.txt")));
        assert!(!ledger.contains(&ReportId::new("CC-7")));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn append_known_id_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.txt");
        let mut ledger = Ledger::open(&path).await.unwrap();

        ledger.append(&ReportId::new("CC-7")).await.unwrap();
        ledger.append(&ReportId::new("CC-7")).await.unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "CC-7\n");
    }

    #[tokio::test]
    async fn reopen_sees_appended_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.txt");
        {
            let mut ledger = Ledger::open(&path).await.unwrap();
            ledger.append(&ReportId::new("MDSIADCISC-16")).await.unwrap();
        }
        let ledger = Ledger::open(&path).await.unwrap();
        assert_eq!(ledger.entries(), &[ReportId::new("MDSIADCISC-16")]);
    }
}
