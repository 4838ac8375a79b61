//! MR filer: files tracker records for new-report notifications posted to a
//! news alias.

pub mod channels;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod tracker;
