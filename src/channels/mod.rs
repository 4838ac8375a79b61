//! Mail source abstraction.
//!
//! The pipeline only needs three things from a mail source: the id range of
//! an alias, the headers in that range, and the body of a single message.

pub mod headers;
pub mod nntp;

use async_trait::async_trait;

use crate::error::MailError;

pub use headers::{decode_header, extract_owner};
pub use nntp::NntpSession;

/// Inclusive message id range of a selected alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRange {
    pub count: u64,
    pub first: u64,
    pub last: u64,
}

/// Overview record for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: u64,
    /// Decoded subject line.
    pub subject: String,
    /// Decoded `From` header.
    pub from: String,
}

/// A connected mail session.
#[async_trait]
pub trait MailSession: Send {
    /// Headers for every message in `first..=last`, in id order.
    async fn fetch_overview(&mut self, first: u64, last: u64)
    -> Result<Vec<MessageHeader>, MailError>;

    /// Body lines of one message.
    async fn fetch_body(&mut self, id: u64) -> Result<Vec<String>, MailError>;

    /// Close the session politely.
    async fn quit(&mut self) -> Result<(), MailError>;
}
