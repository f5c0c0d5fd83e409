// Function code registry.
//
// The function code selects the operation a request performs. Bits 0:4
// of the 8-bit register (MSB numbering, i.e. the code values below) name
// the operation; the low bit selects one of two device byte-count limit
// classes. The table is closed: every code the device accepts is listed
// once, keyed by the operation parameters that select it.

use crate::error::{Error, Result};

use Huffman::{Dynamic as D, Fixed as F};
use Operation::{Compress as C, Decompress as X, Wrap as W};

// ---------------------------------------------------------------------------
// Code values
// ---------------------------------------------------------------------------

pub const FC_LIMIT_MASK: u8 = 0x01;
pub const FC_COMPRESS_FHT: u8 = 0x00;
pub const FC_COMPRESS_DHT: u8 = 0x02;
pub const FC_COMPRESS_FHT_COUNT: u8 = 0x04;
pub const FC_COMPRESS_DHT_COUNT: u8 = 0x06;
pub const FC_COMPRESS_RESUME_FHT: u8 = 0x08;
pub const FC_COMPRESS_RESUME_DHT: u8 = 0x0a;
pub const FC_COMPRESS_RESUME_FHT_COUNT: u8 = 0x0c;
pub const FC_COMPRESS_RESUME_DHT_COUNT: u8 = 0x0e;
pub const FC_DECOMPRESS: u8 = 0x10;
pub const FC_DECOMPRESS_SINGLE_BLK_N_SUSPEND: u8 = 0x12;
pub const FC_DECOMPRESS_RESUME: u8 = 0x14;
pub const FC_DECOMPRESS_RESUME_SINGLE_BLK_N_SUSPEND: u8 = 0x16;
pub const FC_WRAP: u8 = 0x1e;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Compress,
    Decompress,
    /// Copy source to target unchanged, computing checksums.
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Huffman {
    #[default]
    Fixed,
    Dynamic,
}

/// Which of the two device byte-count limits applies to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LimitClass {
    #[default]
    Primary,
    Secondary,
}

/// The parameters a function code encodes, normalized so that each code
/// has exactly one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionKind {
    pub op: Operation,
    pub huffman: Huffman,
    pub counts: bool,
    pub resume: bool,
    pub single_block: bool,
}

const fn kind(
    op: Operation,
    huffman: Huffman,
    counts: bool,
    resume: bool,
    single_block: bool,
) -> FunctionKind {
    FunctionKind {
        op,
        huffman,
        counts,
        resume,
        single_block,
    }
}

/// The closed function code table.
const TABLE: &[(FunctionKind, u8)] = &[
    (kind(C, F, false, false, false), FC_COMPRESS_FHT),
    (kind(C, D, false, false, false), FC_COMPRESS_DHT),
    (kind(C, F, true, false, false), FC_COMPRESS_FHT_COUNT),
    (kind(C, D, true, false, false), FC_COMPRESS_DHT_COUNT),
    (kind(C, F, false, true, false), FC_COMPRESS_RESUME_FHT),
    (kind(C, D, false, true, false), FC_COMPRESS_RESUME_DHT),
    (kind(C, F, true, true, false), FC_COMPRESS_RESUME_FHT_COUNT),
    (kind(C, D, true, true, false), FC_COMPRESS_RESUME_DHT_COUNT),
    (kind(X, F, false, false, false), FC_DECOMPRESS),
    (
        kind(X, F, false, false, true),
        FC_DECOMPRESS_SINGLE_BLK_N_SUSPEND,
    ),
    (kind(X, F, false, true, false), FC_DECOMPRESS_RESUME),
    (
        kind(X, F, false, true, true),
        FC_DECOMPRESS_RESUME_SINGLE_BLK_N_SUSPEND,
    ),
    (kind(W, F, false, false, false), FC_WRAP),
];

// ---------------------------------------------------------------------------
// FunctionCode
// ---------------------------------------------------------------------------

/// An 8-bit function code register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionCode(u8);

impl FunctionCode {
    /// Wrap a raw register value if it names a known operation.
    pub fn from_raw(raw: u8) -> Option<Self> {
        let fc = Self(raw);
        fc.kind().map(|_| fc)
    }

    /// Register value as read back from a block; may name no operation.
    pub(crate) const fn from_register(raw: u8) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// The code with the limit class bit removed.
    #[inline]
    pub const fn base(self) -> u8 {
        self.0 & !FC_LIMIT_MASK
    }

    pub const fn limit_class(self) -> LimitClass {
        if self.0 & FC_LIMIT_MASK != 0 {
            LimitClass::Secondary
        } else {
            LimitClass::Primary
        }
    }

    pub const fn with_limit(self, class: LimitClass) -> Self {
        match class {
            LimitClass::Primary => Self(self.base()),
            LimitClass::Secondary => Self(self.base() | FC_LIMIT_MASK),
        }
    }

    /// Reverse table lookup.
    pub fn kind(self) -> Option<FunctionKind> {
        let base = self.base();
        TABLE.iter().find(|(_, code)| *code == base).map(|(k, _)| *k)
    }

    pub fn operation(self) -> Option<Operation> {
        self.kind().map(|k| k.op)
    }

    pub fn is_compress(self) -> bool {
        self.operation() == Some(Operation::Compress)
    }

    pub fn is_decompress(self) -> bool {
        self.operation() == Some(Operation::Decompress)
    }

    pub fn is_wrap(self) -> bool {
        self.operation() == Some(Operation::Wrap)
    }

    /// Compression that also reports LZ77 symbol counts.
    pub fn has_count(self) -> bool {
        self.kind().is_some_and(|k| k.counts)
    }

    pub fn is_resume(self) -> bool {
        self.kind().is_some_and(|k| k.resume)
    }

    /// The resume form of this code, keeping every other parameter and the
    /// limit class. Wrap has no resume form and maps to itself.
    pub fn resume_variant(self) -> Option<Self> {
        let k = self.kind()?;
        if k.op == Operation::Wrap {
            return Some(self);
        }
        lookup(FunctionKind { resume: true, ..k }).map(|fc| fc.with_limit(self.limit_class()))
    }
}

impl std::fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            Some(k) => {
                let op = match k.op {
                    Operation::Compress => "compress",
                    Operation::Decompress => "decompress",
                    Operation::Wrap => "wrap",
                };
                write!(f, "{op}")?;
                if k.op == Operation::Compress {
                    let h = match k.huffman {
                        Huffman::Fixed => "fht",
                        Huffman::Dynamic => "dht",
                    };
                    write!(f, "-{h}")?;
                }
                if k.resume {
                    write!(f, "-resume")?;
                }
                if k.counts {
                    write!(f, "-count")?;
                }
                if k.single_block {
                    write!(f, "-single-block")?;
                }
                write!(f, " ({:#04x})", self.0)
            }
            None => write!(f, "unknown ({:#04x})", self.0),
        }
    }
}

fn lookup(key: FunctionKind) -> Option<FunctionCode> {
    TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, code)| FunctionCode(*code))
}

/// Resolve operation parameters to a function code.
///
/// Decompression detects block types itself, so `huffman` is ignored for
/// it; wrap ignores `huffman` and `resume`. Requesting symbol counts from
/// anything but compression, or single-block suspension from anything but
/// decompression, is not in the table.
pub fn resolve(
    op: Operation,
    huffman: Huffman,
    want_counts: bool,
    resume: bool,
    single_block_suspend: bool,
) -> Result<FunctionCode> {
    if want_counts && op != Operation::Compress {
        return Err(Error::UnsupportedCombination(
            "symbol counts are only produced by compression",
        ));
    }
    if single_block_suspend && op != Operation::Decompress {
        return Err(Error::UnsupportedCombination(
            "single block suspend only applies to decompression",
        ));
    }
    let key = match op {
        Operation::Compress => kind(op, huffman, want_counts, resume, false),
        Operation::Decompress => kind(op, Huffman::Fixed, false, resume, single_block_suspend),
        Operation::Wrap => kind(op, Huffman::Fixed, false, false, false),
    };
    lookup(key).ok_or(Error::UnsupportedCombination(
        "no function code for these parameters",
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
