//! Error types for sheet loading

use std::io;
use thiserror::Error;

/// Result type alias for sheet operations
pub type Result<T> = std::result::Result<T, SheetError>;

/// Errors produced while reading a sheet buffer
#[derive(Error, Debug)]
pub enum SheetError {
    /// I/O error while reading the sheet source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The buffer ended before a field could be read
    #[error("Sheet data truncated at offset {offset}, needed {needed} more bytes")]
    Truncated {
        /// Byte offset of the field that could not be read
        offset: u64,
        /// Size of the field in bytes
        needed: usize,
    },

    /// The header declared a negative number of sequences
    #[error("Invalid sequence count: {0}")]
    InvalidSequenceCount(i32),

    /// A sequence entry carried a negative index
    #[error("Invalid sequence index: {0}")]
    InvalidSequenceIndex(i32),

    /// A sequence declared a frame count that cannot be sampled
    #[error("Sequence {sequence} has invalid frame count {count}")]
    InvalidFrameCount {
        /// Sequence index
        sequence: usize,
        /// Declared frame count
        count: i32,
    },

    /// A sequence was listed more than once
    #[error("Sequence {0} is defined more than once")]
    DuplicateSequence(usize),

    /// Lookup outside the sequence table
    #[error("Sequence {sequence} out of range (sheet has {count} sequences)")]
    SequenceOutOfRange {
        /// Requested sequence
        sequence: usize,
        /// Number of sequence slots in the sheet
        count: usize,
    },
}
