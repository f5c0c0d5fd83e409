// Raw Deflate stream helpers: final-block type decoding and the few
// block-level edits needed to stitch job outputs into one stream.
//
// Positions inside an output buffer are given as a byte length plus a
// target ending bit count (`tebc`): the number of valid bits in the last
// byte, with 0 meaning all eight.

use crate::error::{Error, Result};

/// BFINAL bit of an SFBT value.
pub const SFBT_BFINAL: u8 = 0x1;
/// Stored (literal) block, before the BFINAL shift.
pub const SFBT_LIT: u8 = 0x4;
/// Fixed Huffman block.
pub const SFBT_FHT: u8 = 0x5;
/// Dynamic Huffman block.
pub const SFBT_DHT: u8 = 0x6;
/// Inside a block header, or at the end of a non-final block so that the
/// next bit starts one.
pub const SFBT_HDR: u8 = 0x7;

/// What the decompressor was in the middle of when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Between blocks; the final end-of-block code was seen when the
    /// whole SFBT is zero.
    Boundary,
    Stored,
    Fixed,
    Dynamic,
    /// The next unprocessed bit belongs to a block header. `last` is
    /// that header's BFINAL when it had started to arrive.
    Header,
}

/// Decoded source final block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockState {
    pub block: BlockType,
    /// BFINAL of the block being processed.
    pub last: bool,
}

impl BlockState {
    pub const fn from_sfbt(sfbt: u8) -> Self {
        let block = match (sfbt & 0xF) >> 1 {
            SFBT_LIT => BlockType::Stored,
            SFBT_FHT => BlockType::Fixed,
            SFBT_DHT => BlockType::Dynamic,
            SFBT_HDR => BlockType::Header,
            _ => BlockType::Boundary,
        };
        Self {
            block,
            last: sfbt & SFBT_BFINAL != 0,
        }
    }

    pub const fn to_sfbt(self) -> u8 {
        let ty = match self.block {
            BlockType::Boundary => 0,
            BlockType::Stored => SFBT_LIT,
            BlockType::Fixed => SFBT_FHT,
            BlockType::Dynamic => SFBT_DHT,
            BlockType::Header => SFBT_HDR,
        };
        (ty << 1) | self.last as u8
    }

    /// A suspension inside a dynamic block carries the partial table.
    pub const fn is_dynamic(self) -> bool {
        matches!(self.block, BlockType::Dynamic)
    }
}

// ---------------------------------------------------------------------------
// Block edits
// ---------------------------------------------------------------------------

/// Set BFINAL of a block header that starts at bit 0 of `buf`.
pub fn set_final_bit(buf: &mut [u8]) {
    if let Some(b) = buf.first_mut() {
        *b |= 1;
    }
}

/// Clear BFINAL of a block header that starts at bit 0 of `buf`.
pub fn clear_final_bit(buf: &mut [u8]) {
    if let Some(b) = buf.first_mut() {
        *b &= !1;
    }
}

/// Bit offset of the end of `len` bytes with `tebc` valid bits in the last.
pub fn bit_end(len: usize, tebc: u8) -> usize {
    match (len, tebc & 7) {
        (0, _) => 0,
        (n, 0) => n * 8,
        (n, t) => (n - 1) * 8 + usize::from(t),
    }
}

struct BitWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BitWriter<'a> {
    fn at(buf: &'a mut [u8], pos: usize) -> Self {
        // Bits past the end position are undefined; clear them.
        if pos % 8 != 0 {
            let keep = (1u8 << (pos % 8)) - 1;
            buf[pos / 8] &= keep;
        }
        Self { buf, pos }
    }

    /// Write `n` bits of `value`, least significant first.
    fn bits(&mut self, value: u32, n: u32) {
        for i in 0..n {
            let byte = self.pos / 8;
            let shift = self.pos % 8;
            if shift == 0 {
                self.buf[byte] = 0;
            }
            self.buf[byte] |= (((value >> i) & 1) as u8) << shift;
            self.pos += 1;
        }
    }

    fn align(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
    }

    fn byte(&mut self, b: u8) {
        self.buf[self.pos / 8] = b;
        self.pos += 8;
    }

    fn end(&self) -> (usize, u8) {
        (self.pos.div_ceil(8), (self.pos % 8) as u8)
    }
}

fn check_room(buf: &[u8], end_bit: usize) -> Result<()> {
    let needed = end_bit.div_ceil(8);
    if needed > buf.len() {
        return Err(Error::OutputTooSmall {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Append an empty fixed-Huffman block (header plus end-of-block code,
/// 10 bits) after `len` bytes ending with `tebc` valid bits.
///
/// Returns the new length and ending bit count.
pub fn append_empty_fixed_block(
    buf: &mut [u8],
    len: usize,
    tebc: u8,
    last: bool,
) -> Result<(usize, u8)> {
    let start = bit_end(len, tebc);
    check_room(buf, start + 10)?;
    let mut w = BitWriter::at(buf, start);
    w.bits(u32::from(last), 1);
    w.bits(0b01, 2);
    w.bits(0, 7);
    Ok(w.end())
}

/// Append an empty non-final stored block so the stream ends on a byte
/// boundary. Returns the new length; the ending bit count is 0.
pub fn sync_flush(buf: &mut [u8], len: usize, tebc: u8) -> Result<usize> {
    let start = bit_end(len, tebc);
    let end = (start + 3).div_ceil(8) * 8 + 32;
    check_room(buf, end)?;
    let mut w = BitWriter::at(buf, start);
    w.bits(0, 3);
    w.align();
    for b in [0x00, 0x00, 0xFF, 0xFF] {
        w.byte(b);
    }
    Ok(w.end().0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
