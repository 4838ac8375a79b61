//! Report filing pipeline.
//!
//! Every message in the alias flows through:
//! 1. `SubjectClassifier::classify()`: is this a new report, and which id
//! 2. `Ledger::contains()` / `Tracker::exists()`: has it been filed already
//! 3. `BodyExtractor::extract()`: labelled fields and the full text
//! 4. `builder::build()`: the filing template and notes
//! 5. `Tracker::file()` then `Ledger::append()`
//!
//! Per-product differences live in `ProductProfile`.

pub mod builder;
pub mod classifier;
pub mod extractor;
pub mod ledger;
pub mod processor;
pub mod profile;
pub mod types;

pub use ledger::Ledger;
pub use processor::Pipeline;
pub use profile::ProductProfile;
