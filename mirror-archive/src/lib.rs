//! # mirror-archive
//!
//! Source inventory for a mirror run.
//!
//! The reconciliation engine only sees the [`SourceProvider`] trait. Two
//! implementations ship here: [`ArchiveSource`] reads the on-disk export
//! archive, [`MemorySource`] serves records held in memory.

pub mod error;
pub mod record;
mod source;

pub use error::ArchiveError;
pub use record::{parse_record, MalformedRecord, SourceEntry};
pub use source::{ArchiveSource, MemorySource, SourceProvider};
