// Bit I/O and canonical Huffman decoding for the stand-in device.

pub const MAX_BITS: usize = 15;

pub const LEN_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];
pub const LEN_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
pub const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
pub const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// LSB-first reader; `None` means the input ran out.
pub struct BitReader<'a> {
    data: &'a [u8],
    pub pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn bits(&mut self, n: u32) -> Option<u32> {
        if self.pos + n as usize > self.data.len() * 8 {
            return None;
        }
        let mut v = 0u32;
        for i in 0..n {
            let bit = (self.data[self.pos / 8] >> (self.pos % 8)) & 1;
            v |= u32::from(bit) << i;
            self.pos += 1;
        }
        Some(v)
    }

    pub fn align(&mut self) {
        self.pos = self.pos.div_ceil(8) * 8;
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// LSB-first writer into a growing buffer.
#[derive(Default)]
pub struct BitWriter {
    pub bytes: Vec<u8>,
    pub pos: usize,
}

impl BitWriter {
    pub fn bits(&mut self, value: u32, n: u32) {
        for i in 0..n {
            if self.pos % 8 == 0 {
                self.bytes.push(0);
            }
            let last = self.bytes.len() - 1;
            self.bytes[last] |= (((value >> i) & 1) as u8) << (self.pos % 8);
            self.pos += 1;
        }
    }

    /// Write a Huffman code, most significant bit first.
    pub fn code(&mut self, code: u32, len: u32) {
        let reversed = code.reverse_bits() >> (32 - len);
        self.bits(reversed, len);
    }

    pub fn tebc(&self) -> u8 {
        (self.pos % 8) as u8
    }
}

/// Copy `len` bits starting at bit `from` of `src` into a fresh buffer.
pub fn extract_bits(src: &[u8], from: usize, len: usize) -> Vec<u8> {
    let mut r = BitReader::new(src, from);
    let mut w = BitWriter::default();
    for _ in 0..len {
        let b = r.bits(1).unwrap_or(0);
        w.bits(b, 1);
    }
    w.bytes
}

#[derive(Debug)]
pub enum Decode {
    Symbol(u16),
    NeedInput,
    Invalid,
}

/// Canonical Huffman decoding table.
pub struct Huffman {
    count: [u16; MAX_BITS + 1],
    symbol: Vec<u16>,
}

impl Huffman {
    /// Build from code lengths; `None` when over-subscribed.
    pub fn new(lengths: &[u8]) -> Option<Self> {
        let mut count = [0u16; MAX_BITS + 1];
        for &l in lengths {
            count[usize::from(l)] += 1;
        }
        let mut left: i32 = 1;
        for len in 1..=MAX_BITS {
            left <<= 1;
            left -= i32::from(count[len]);
            if left < 0 {
                return None;
            }
        }
        let mut offs = [0u16; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offs[len + 1] = offs[len] + count[len];
        }
        let mut symbol = vec![0u16; lengths.len()];
        for (sym, &l) in lengths.iter().enumerate() {
            if l != 0 {
                symbol[usize::from(offs[usize::from(l)])] = sym as u16;
                offs[usize::from(l)] += 1;
            }
        }
        Some(Self { count, symbol })
    }

    pub fn decode(&self, r: &mut BitReader<'_>) -> Decode {
        let (mut code, mut first, mut index) = (0i32, 0i32, 0i32);
        for len in 1..=MAX_BITS {
            let Some(bit) = r.bits(1) else {
                return Decode::NeedInput;
            };
            code |= bit as i32;
            let count = i32::from(self.count[len]);
            if code - count < first {
                return Decode::Symbol(self.symbol[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Decode::Invalid
    }
}

pub fn fixed_tables() -> (Huffman, Huffman) {
    let mut lengths = [0u8; 288];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    let lit = Huffman::new(&lengths).unwrap_or_else(|| unreachable!());
    let dist = Huffman::new(&[5u8; 30]).unwrap_or_else(|| unreachable!());
    (lit, dist)
}

/// Parse a dynamic block header (HLIT onward).
///
/// `Err(true)` means the input ran out, `Err(false)` a malformed header.
pub fn dynamic_tables(r: &mut BitReader<'_>) -> Result<(Huffman, Huffman), bool> {
    const ORDER: [usize; 19] = [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];
    let hlit = r.bits(5).ok_or(true)? as usize + 257;
    let hdist = r.bits(5).ok_or(true)? as usize + 1;
    let hclen = r.bits(4).ok_or(true)? as usize + 4;
    if hlit > 286 || hdist > 30 {
        return Err(false);
    }
    let mut cl = [0u8; 19];
    for &i in ORDER.iter().take(hclen) {
        cl[i] = r.bits(3).ok_or(true)? as u8;
    }
    let clh = Huffman::new(&cl).ok_or(false)?;
    let mut lengths = vec![0u8; hlit + hdist];
    let mut i = 0;
    while i < hlit + hdist {
        let sym = match clh.decode(r) {
            Decode::Symbol(s) => s,
            Decode::NeedInput => return Err(true),
            Decode::Invalid => return Err(false),
        };
        let (value, repeat) = match sym {
            0..=15 => (sym as u8, 1),
            16 => {
                if i == 0 {
                    return Err(false);
                }
                (lengths[i - 1], 3 + r.bits(2).ok_or(true)? as usize)
            }
            17 => (0, 3 + r.bits(3).ok_or(true)? as usize),
            _ => (0, 11 + r.bits(7).ok_or(true)? as usize),
        };
        if i + repeat > hlit + hdist {
            return Err(false);
        }
        lengths[i..i + repeat].fill(value);
        i += repeat;
    }
    if lengths[256] == 0 {
        return Err(false);
    }
    let lit = Huffman::new(&lengths[..hlit]).ok_or(false)?;
    let dist = Huffman::new(&lengths[hlit..]).ok_or(false)?;
    Ok((lit, dist))
}
