// Data descriptor elements (DDEs): scatter/gather references to caller
// buffers.
//
// A direct DDE names one buffer by address and length. An indirect DDE
// names a contiguous list of direct DDEs plus the total byte count of the
// buffers they reference. The hardware permits exactly one level of
// indirection; anything deeper is rejected here instead of flattened.
//
// Descriptors never own or copy caller data. An indirect descriptor owns
// only its encoded entry list, which must stay alive (and unmoved) while
// a job referencing it is in flight.

use crate::error::{Error, Result};
use crate::regs::field::{get, put};
use crate::regs::layout::{DDE_COUNT, DDE_SIZE, DDEAD, DDEBC, MAX_DDE_COUNT};

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// One contiguous caller buffer: an effective address and a byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub address: u64,
    pub length: u32,
}

impl Fragment {
    pub const fn new(address: u64, length: u32) -> Self {
        Self { address, length }
    }

    /// Reference a source buffer.
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        Ok(Self {
            address: buf.as_ptr() as u64,
            length: byte_count(buf.len())?,
        })
    }

    /// Reference a target buffer the device will write into.
    pub fn from_mut_slice(buf: &mut [u8]) -> Result<Self> {
        Ok(Self {
            address: buf.as_mut_ptr() as u64,
            length: byte_count(buf.len())?,
        })
    }
}

fn byte_count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::LengthOverflow(len as u64))
}

// ---------------------------------------------------------------------------
// Wire record
// ---------------------------------------------------------------------------

/// The 16-byte DDE as the device sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdeRecord {
    /// 0 for a direct DDE, otherwise the number of list entries.
    pub count: u8,
    /// Buffer length, or the total length of all listed buffers.
    pub byte_count: u32,
    /// Buffer address, or the address of the entry list.
    pub address: u64,
}

impl DdeRecord {
    pub fn encode(&self, buf: &mut [u8]) {
        buf[..DDE_SIZE].fill(0);
        put(buf, DDE_COUNT, u32::from(self.count));
        put(buf, DDEBC, self.byte_count);
        DDEAD.put(buf, self.address);
    }

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            count: get(buf, DDE_COUNT) as u8,
            byte_count: get(buf, DDEBC),
            address: DDEAD.get(buf),
        }
    }

    #[inline]
    pub fn is_indirect(&self) -> bool {
        self.count != 0
    }
}

// ---------------------------------------------------------------------------
// Indirect entry list
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct RawDde([u8; DDE_SIZE]);

/// Contiguous, 16-byte aligned list of encoded direct DDEs.
pub struct DdeList {
    entries: Box<[RawDde]>,
    total: u32,
}

impl DdeList {
    /// Build a list from buffer fragments.
    pub fn new(fragments: &[Fragment]) -> Result<Self> {
        if fragments.len() > MAX_DDE_COUNT {
            return Err(Error::TooManyFragments {
                count: fragments.len(),
                max: MAX_DDE_COUNT,
            });
        }
        if fragments.is_empty() || fragments.iter().any(|f| f.length == 0) {
            return Err(Error::EmptyBuffer);
        }

        let mut total = 0u64;
        let mut entries = vec![RawDde([0u8; DDE_SIZE]); fragments.len()].into_boxed_slice();
        for (raw, frag) in entries.iter_mut().zip(fragments) {
            total += u64::from(frag.length);
            DdeRecord {
                count: 0,
                byte_count: frag.length,
                address: frag.address,
            }
            .encode(&mut raw.0);
        }
        let total = u32::try_from(total).map_err(|_| Error::LengthOverflow(total))?;
        Ok(Self { entries, total })
    }

    /// Build a list from existing descriptors. Every entry must be direct.
    pub fn from_descriptors(descriptors: &[DataDescriptor]) -> Result<Self> {
        let mut fragments = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            match d {
                DataDescriptor::Direct(f) => fragments.push(*f),
                DataDescriptor::Indirect(_) => return Err(Error::NestedIndirection),
            }
        }
        Self::new(&fragments)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_len(&self) -> u32 {
        self.total
    }

    /// Effective address of the first entry.
    pub fn address(&self) -> u64 {
        self.entries.as_ptr() as u64
    }

    /// Decoded entries, in order.
    pub fn fragments(&self) -> impl Iterator<Item = Fragment> + '_ {
        self.entries.iter().map(|raw| {
            let rec = DdeRecord::decode(&raw.0);
            Fragment::new(rec.address, rec.byte_count)
        })
    }
}

impl std::fmt::Debug for DdeList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdeList")
            .field("entries", &self.fragments().collect::<Vec<_>>())
            .field("total", &self.total)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DataDescriptor
// ---------------------------------------------------------------------------

/// A source or target buffer description.
#[derive(Debug)]
pub enum DataDescriptor {
    Direct(Fragment),
    Indirect(DdeList),
}

impl DataDescriptor {
    /// Total number of bytes described.
    pub fn total_len(&self) -> u32 {
        match self {
            Self::Direct(f) => f.length,
            Self::Indirect(list) => list.total_len(),
        }
    }

    /// The record written into the request block.
    pub fn record(&self) -> DdeRecord {
        match self {
            Self::Direct(f) => DdeRecord {
                count: 0,
                byte_count: f.length,
                address: f.address,
            },
            Self::Indirect(list) => DdeRecord {
                // `DdeList::new` caps the length at MAX_DDE_COUNT.
                count: list.len() as u8,
                byte_count: list.total_len(),
                address: list.address(),
            },
        }
    }
}

/// Describe an ordered sequence of caller buffers.
///
/// One buffer yields a direct descriptor (a zero length is allowed);
/// several yield an indirect descriptor whose total length is the sum of
/// the fragment lengths.
pub fn describe(buffers: &[Fragment]) -> Result<DataDescriptor> {
    match buffers {
        [] => Err(Error::EmptyBuffer),
        [single] => Ok(DataDescriptor::Direct(*single)),
        many => Ok(DataDescriptor::Indirect(DdeList::new(many)?)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
