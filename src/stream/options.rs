// Stream configuration.

use crate::block::{CompletionSignal, HuffmanTable};
use crate::error::{Error, Result};
use crate::function::{Huffman, LimitClass, Operation};

/// Largest Deflate back-reference distance.
pub const MAX_WINDOW: usize = 32 * 1024;

/// Configuration for a `Stream`.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// What every job of the stream does.
    pub operation: Operation,
    /// Huffman coding for compression; ignored otherwise.
    pub huffman: Huffman,
    /// Table for `Huffman::Dynamic` compression.
    pub table: Option<HuffmanTable>,
    /// Ask compression jobs for LZ77 symbol counts.
    pub lz_counts: bool,
    /// Device byte-count limit the jobs are charged against.
    pub limit: LimitClass,
    /// History carried between jobs, in bytes. Decompression needs the
    /// full 32 KiB a Deflate match may reach back; compression may keep
    /// less at the cost of ratio.
    pub window: usize,
    /// Stop decompression after every Deflate block.
    pub single_block_suspend: bool,
    pub signal: Option<CompletionSignal>,
    pub address_type: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            operation: Operation::Decompress,
            huffman: Huffman::Fixed,
            table: None,
            lz_counts: false,
            limit: LimitClass::Primary,
            window: MAX_WINDOW,
            single_block_suspend: false,
            signal: None,
            address_type: false,
        }
    }
}

impl StreamOptions {
    pub fn decompress() -> Self {
        Self::default()
    }

    pub fn compress(huffman: Huffman) -> Self {
        Self {
            operation: Operation::Compress,
            huffman,
            ..Self::default()
        }
    }

    pub fn wrap() -> Self {
        Self {
            operation: Operation::Wrap,
            window: 0,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.window > MAX_WINDOW {
            return Err(Error::UnsupportedCombination(
                "history window exceeds 32 KiB",
            ));
        }
        if self.operation == Operation::Decompress && self.window < MAX_WINDOW {
            return Err(Error::UnsupportedCombination(
                "decompression needs a 32 KiB history window",
            ));
        }
        if self.operation == Operation::Compress
            && self.huffman == Huffman::Dynamic
            && self.table.is_none()
        {
            return Err(Error::MissingHuffmanTable);
        }
        if self.single_block_suspend && self.operation != Operation::Decompress {
            return Err(Error::UnsupportedCombination(
                "single block suspend only applies to decompression",
            ));
        }
        if self.lz_counts && self.operation != Operation::Compress {
            return Err(Error::UnsupportedCombination(
                "symbol counts are only produced by compression",
            ));
        }
        Ok(())
    }
}
