// Resumable raw Deflate decoder modelled on the device's decompress
// functions. It stops only at safe points (block boundaries or between
// symbols) and reports the state needed to continue.

use nxdeflate::deflate::{BlockState, BlockType};

use super::bits::{
    BitReader, DIST_BASE, DIST_EXTRA, Decode, Huffman, LEN_BASE, LEN_EXTRA, dynamic_tables,
    extract_bits, fixed_tables,
};

pub const CC_MISSING_CODE: u8 = 66;
pub const CC_INVALID_DIST: u8 = 67;
pub const CC_INVALID_DHT: u8 = 68;

/// Resume state handed to a job.
pub struct Resume<'a> {
    pub state: BlockState,
    /// Remaining stored bytes, or the DHT length in bits.
    pub count: u16,
    pub dht: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Final end-of-block seen.
    Done,
    InputExhausted,
    TargetFull,
    /// Non-final block finished in single-block mode.
    BlockEnd,
}

#[derive(Debug)]
pub struct Report {
    pub stop: Stop,
    pub output: Vec<u8>,
    /// Bit position in the data after the history.
    pub bit_pos: usize,
    pub state: BlockState,
    pub count: u16,
    pub dht: Option<Vec<u8>>,
}

enum Block {
    Boundary,
    Stored {
        remaining: u16,
        last: bool,
    },
    Coded {
        lit: Huffman,
        dist: Huffman,
        last: bool,
        /// Header bits of a dynamic block.
        header: Option<(Vec<u8>, u16)>,
    },
}

pub struct Inflater<'a> {
    reader: BitReader<'a>,
    window: Vec<u8>,
    hist_len: usize,
    capacity: usize,
    single_block: bool,
}

impl<'a> Inflater<'a> {
    pub fn new(
        history: &[u8],
        data: &'a [u8],
        skip_bits: usize,
        capacity: usize,
        single_block: bool,
    ) -> Self {
        Self {
            reader: BitReader::new(data, skip_bits),
            window: history.to_vec(),
            hist_len: history.len(),
            capacity,
            single_block,
        }
    }

    fn produced(&self) -> usize {
        self.window.len() - self.hist_len
    }

    /// BFINAL of a header starting at bit `pos`, if that bit is present.
    fn peek_final(&self, pos: usize) -> bool {
        self.reader
            .data()
            .get(pos / 8)
            .is_some_and(|b| (b >> (pos % 8)) & 1 != 0)
    }

    fn report(self, stop: Stop, block: &Block) -> Report {
        let (state, count, dht) = match block {
            // After the final block the whole SFBT is zero; otherwise the
            // next unprocessed bit starts a block header. BFINAL is only
            // known once the header has started to arrive.
            Block::Boundary if stop == Stop::Done => (BlockState::from_sfbt(0), 0, None),
            Block::Boundary => {
                let last = stop == Stop::InputExhausted && self.peek_final(self.reader.pos);
                (
                    BlockState {
                        block: BlockType::Header,
                        last,
                    },
                    0,
                    None,
                )
            }
            Block::Stored { remaining, last } => (
                BlockState {
                    block: BlockType::Stored,
                    last: *last,
                },
                *remaining,
                None,
            ),
            Block::Coded { last, header, .. } => match header {
                None => (
                    BlockState {
                        block: BlockType::Fixed,
                        last: *last,
                    },
                    0,
                    None,
                ),
                Some((bits, len)) => (
                    BlockState {
                        block: BlockType::Dynamic,
                        last: *last,
                    },
                    *len,
                    Some(bits.clone()),
                ),
            },
        };
        Report {
            stop,
            bit_pos: self.reader.pos,
            output: self.window[self.hist_len..].to_vec(),
            state,
            count,
            dht,
        }
    }

    /// Decode until a stop point. `Err(cc)` is a data error.
    pub fn run(mut self, resume: Resume<'_>) -> Result<Report, u8> {
        let last = resume.state.last;
        let mut block = match resume.state.block {
            BlockType::Stored => Block::Stored {
                remaining: resume.count,
                last,
            },
            BlockType::Fixed => {
                let (lit, dist) = fixed_tables();
                Block::Coded {
                    lit,
                    dist,
                    last,
                    header: None,
                }
            }
            BlockType::Dynamic => {
                let mut r = BitReader::new(resume.dht, 0);
                let (lit, dist) = dynamic_tables(&mut r).map_err(|_| CC_INVALID_DHT)?;
                if r.pos != usize::from(resume.count) {
                    return Err(CC_INVALID_DHT);
                }
                let bits = extract_bits(resume.dht, 0, r.pos);
                Block::Coded {
                    lit,
                    dist,
                    last,
                    header: Some((bits, resume.count)),
                }
            }
            BlockType::Boundary | BlockType::Header => Block::Boundary,
        };

        loop {
            if matches!(block, Block::Boundary) {
                let mark = self.reader.pos;
                match self.header()? {
                    Some(next) => block = next,
                    None => {
                        self.reader.pos = mark;
                        return Ok(self.report(Stop::InputExhausted, &Block::Boundary));
                    }
                }
            }

            let finished_last = match &mut block {
                Block::Boundary => continue,
                Block::Stored { remaining, last } => {
                    while *remaining > 0 {
                        if self.produced() == self.capacity {
                            return Ok(self.report(Stop::TargetFull, &block));
                        }
                        let Some(b) = self.reader.bits(8) else {
                            return Ok(self.report(Stop::InputExhausted, &block));
                        };
                        self.window.push(b as u8);
                        *remaining -= 1;
                    }
                    *last
                }
                Block::Coded {
                    lit, dist, last, ..
                } => {
                    let last = *last;
                    if let Some(stop) = self.symbols(lit, dist)? {
                        return Ok(self.report(stop, &block));
                    }
                    last
                }
            };

            if finished_last {
                return Ok(self.report(Stop::Done, &Block::Boundary));
            }
            block = Block::Boundary;
            if self.single_block {
                return Ok(self.report(Stop::BlockEnd, &block));
            }
        }
    }

    /// Read a block header. `Ok(None)` when the input ran out.
    fn header(&mut self) -> Result<Option<Block>, u8> {
        let Some(h) = self.reader.bits(3) else {
            return Ok(None);
        };
        let last = h & 1 != 0;
        match h >> 1 {
            0 => {
                self.reader.align();
                let Some(len) = self.reader.bits(16) else {
                    return Ok(None);
                };
                let Some(nlen) = self.reader.bits(16) else {
                    return Ok(None);
                };
                if len != !nlen & 0xFFFF {
                    return Err(CC_INVALID_DHT);
                }
                Ok(Some(Block::Stored {
                    remaining: len as u16,
                    last,
                }))
            }
            1 => {
                let (lit, dist) = fixed_tables();
                Ok(Some(Block::Coded {
                    lit,
                    dist,
                    last,
                    header: None,
                }))
            }
            2 => {
                let start = self.reader.pos;
                match dynamic_tables(&mut self.reader) {
                    Ok((lit, dist)) => {
                        let len = self.reader.pos - start;
                        let bits = extract_bits(self.reader.data(), start, len);
                        Ok(Some(Block::Coded {
                            lit,
                            dist,
                            last,
                            header: Some((bits, len as u16)),
                        }))
                    }
                    Err(true) => Ok(None),
                    Err(false) => Err(CC_INVALID_DHT),
                }
            }
            _ => Err(CC_INVALID_DHT),
        }
    }

    /// Decode symbols to the end of the block (`Ok(None)`) or a stop.
    fn symbols(&mut self, lit: &Huffman, dist: &Huffman) -> Result<Option<Stop>, u8> {
        loop {
            let mark = self.reader.pos;
            let sym = match lit.decode(&mut self.reader) {
                Decode::Symbol(s) => s,
                Decode::NeedInput => {
                    self.reader.pos = mark;
                    return Ok(Some(Stop::InputExhausted));
                }
                Decode::Invalid => return Err(CC_MISSING_CODE),
            };
            match sym {
                0..=255 => {
                    if self.produced() == self.capacity {
                        self.reader.pos = mark;
                        return Ok(Some(Stop::TargetFull));
                    }
                    self.window.push(sym as u8);
                }
                256 => return Ok(None),
                257..=285 => {
                    let Some((len, distance)) = self.pair(sym, dist)? else {
                        self.reader.pos = mark;
                        return Ok(Some(Stop::InputExhausted));
                    };
                    if distance > self.window.len() {
                        return Err(CC_INVALID_DIST);
                    }
                    if self.produced() + len > self.capacity {
                        self.reader.pos = mark;
                        return Ok(Some(Stop::TargetFull));
                    }
                    let start = self.window.len() - distance;
                    for i in 0..len {
                        let b = self.window[start + i];
                        self.window.push(b);
                    }
                }
                _ => return Err(CC_MISSING_CODE),
            }
        }
    }

    /// Length and distance of a match. `Ok(None)` when the input ran out.
    fn pair(&mut self, sym: u16, dist: &Huffman) -> Result<Option<(usize, usize)>, u8> {
        let i = usize::from(sym - 257);
        let Some(extra) = self.reader.bits(u32::from(LEN_EXTRA[i])) else {
            return Ok(None);
        };
        let len = usize::from(LEN_BASE[i]) + extra as usize;
        let d = match dist.decode(&mut self.reader) {
            Decode::Symbol(d) if d < 30 => usize::from(d),
            Decode::Symbol(_) | Decode::Invalid => return Err(CC_INVALID_DIST),
            Decode::NeedInput => return Ok(None),
        };
        let Some(extra) = self.reader.bits(u32::from(DIST_EXTRA[d])) else {
            return Ok(None);
        };
        Ok(Some((len, usize::from(DIST_BASE[d]) + extra as usize)))
    }
}
