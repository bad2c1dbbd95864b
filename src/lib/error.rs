//! Error kinds surfaced by the index/reader/translator core.
//!
//! Every variant here corresponds to one row of the error table: all errors
//! are local and returned, never logged or retried by this crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The error type shared by every fallible operation in this crate.
#[derive(Error, Debug)]
pub enum RaidxError {
    /// The data file itself could not be opened.
    #[error("source file missing or unreadable: {0}")]
    SourceMissing(PathBuf),

    /// `.fai` is absent and `Flags::CREATE_IF_MISSING` was not set.
    #[error(".fai index missing for {0}")]
    IndexMissing(PathBuf),

    /// `.fai` or `.gzi` contents could not be parsed.
    #[error("malformed index: {0}")]
    IndexMalformed(String),

    /// Two `.fai` records shared a sequence name.
    #[error("duplicate sequence name in index: {0}")]
    DuplicateName(String),

    /// A name or id did not resolve to a known sequence.
    #[error("unknown sequence: {0}")]
    UnknownSequence(String),

    /// A descriptor's line geometry is unusable (zero payload, or a
    /// requested range that would overflow the platform size type).
    #[error("bad geometry: {0}")]
    BadGeometry(String),

    /// `fetch_qual` was called against a FASTA source.
    #[error("quality scores are not available for a FASTA source")]
    NotFastq,

    /// A seek or read failed after a successful open, including any short
    /// read (partial reads are never returned to the caller).
    #[error("I/O error: {0}")]
    IOError(#[from] io::Error),

    /// A fallible allocation could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RaidxError>;
