//! Defect tracker collaborator.
//!
//! The tracker is only ever asked two questions: does a record for this
//! report already exist, and please file this one.

pub mod command;

use std::path::Path;

use async_trait::async_trait;

use crate::error::TrackerError;
use crate::pipeline::types::ReportId;

pub use command::CommandTracker;

#[async_trait]
pub trait Tracker: Send + Sync {
    /// Whether the tracker already holds a record for `id`.
    async fn exists(&self, id: &ReportId) -> Result<bool, TrackerError>;

    /// File a new record from the template and notes artifacts.
    async fn file(&self, template: &Path, notes: &Path) -> Result<(), TrackerError>;
}
