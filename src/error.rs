// Crate-wide error type.

use thiserror::Error;

use crate::completion::Fault;
use crate::job::JobError;

/// Errors returned by the descriptor builder, codec and stream driver.
#[derive(Debug, Error)]
pub enum Error {
    /// No fragments, or a zero-length fragment in a multi-fragment list.
    #[error("empty buffer in scatter/gather list")]
    EmptyBuffer,
    #[error("too many fragments: {count} exceeds the limit of {max}")]
    TooManyFragments { count: usize, max: usize },
    /// A length does not fit the 32-bit byte count register.
    #[error("buffer length {0} overflows the byte count register")]
    LengthOverflow(u64),
    #[error("indirect descriptors cannot reference other indirect descriptors")]
    NestedIndirection,
    #[error("unsupported function combination: {0}")]
    UnsupportedCombination(&'static str),
    /// The status block still has its valid bit set.
    #[error("request block already submitted (status valid bit is set)")]
    AlreadySubmitted,
    /// The status block has not been written by the device yet.
    #[error("request block has not completed (status valid bit is clear)")]
    NotCompleted,
    #[error("stream has terminated")]
    StreamTerminated,
    #[error("dynamic Huffman compression requires a table")]
    MissingHuffmanTable,
    #[error("invalid Huffman table: {0}")]
    InvalidHuffmanTable(&'static str),
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall { needed: usize, available: usize },
    #[error("job submission failed: {0}")]
    Job(#[from] JobError),
    #[error("coprocessor fault: {0}")]
    Fault(Fault),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
