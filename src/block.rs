// Command block codec: the combined request (CRB) and parameter (CPB)
// block exchanged with the coprocessor.
//
// `CrbCpb` is a single 2048-byte aligned byte buffer. Every register is
// accessed through the field table in `regs::layout`; there are no
// overlapping typed views of the same bytes. The device holds the block's
// address while a job is in flight, so a block lives in a `Box` and is
// never moved or mutated by anyone else until the job completes.

use crate::completion::{self, CompletionCode, CompletionExt, Outcome};
use crate::dde::{DataDescriptor, DdeRecord};
use crate::deflate::BlockState;
use crate::error::{Error, Result};
use crate::function::FunctionCode;
use crate::regs::field::{Field, get, get_bits, put, put_bits, read_be32, write_be32};
use crate::regs::layout::*;

// ---------------------------------------------------------------------------
// Checksums
// ---------------------------------------------------------------------------

/// CRC-32 of empty input.
pub const INIT_CRC: u32 = 0;
/// Adler-32 of empty input.
pub const INIT_ADLER: u32 = 1;

/// Running checksums over the uncompressed data of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksums {
    pub crc32: u32,
    pub adler32: u32,
}

impl Checksums {
    /// Seeds for a job that starts a new stream.
    pub const INITIAL: Self = Self {
        crc32: INIT_CRC,
        adler32: INIT_ADLER,
    };
}

impl Default for Checksums {
    fn default() -> Self {
        Self::INITIAL
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Completion signalling requested through the CCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSignal {
    /// CCB completion method (3 bits).
    pub method: u8,
}

/// Caller intent for one job, before it is packed into a block.
#[derive(Debug)]
pub struct Request<'d> {
    pub fc: FunctionCode,
    pub source: &'d DataDescriptor,
    pub target: &'d DataDescriptor,
    /// Sets `crb_c` and the CCB completion method when present.
    pub signal: Option<CompletionSignal>,
    /// `crb_at`: addresses are of the type named by the window context
    /// rather than effective addresses.
    pub address_type: bool,
}

/// Request fields as the device reads them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestView {
    pub fc: FunctionCode,
    pub csb_address: u64,
    pub ccb_defined: bool,
    pub address_type: bool,
    pub completion_method: u8,
    pub source: DdeRecord,
    pub target: DdeRecord,
}

// ---------------------------------------------------------------------------
// Parameter block: input region
// ---------------------------------------------------------------------------

/// Dynamic Huffman table payload: the DEFLATE dynamic block header bits
/// (HLIT through the code lengths), little-endian bit order.
#[derive(Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    bytes: Box<[u8; DHT_MAXSZ]>,
    len_bits: u16,
}

impl HuffmanTable {
    pub fn new(bits: &[u8], len_bits: u16) -> Result<Self> {
        if bits.len() > DHT_MAXSZ {
            return Err(Error::InvalidHuffmanTable("table exceeds 288 bytes"));
        }
        if usize::from(len_bits) > bits.len() * 8 || u32::from(len_bits) > IN_DHTLEN.max() {
            return Err(Error::InvalidHuffmanTable("bit length exceeds table"));
        }
        let mut bytes = Box::new([0u8; DHT_MAXSZ]);
        bytes[..bits.len()].copy_from_slice(bits);
        Ok(Self { bytes, len_bits })
    }

    pub fn len_bits(&self) -> u16 {
        self.len_bits
    }

    pub fn bytes(&self) -> &[u8; DHT_MAXSZ] {
        &self.bytes
    }
}

impl std::fmt::Debug for HuffmanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuffmanTable")
            .field("len_bits", &self.len_bits)
            .finish_non_exhaustive()
    }
}

/// Caller-written parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamInput {
    pub checksums: Checksums,
    /// History quadwords at the front of the source (12 bits).
    pub histlen: u16,
    /// Unprocessed bits of the first source byte; 0 means all 8 (3 bits).
    pub subc: u8,
    /// Raw word holding SFBT and the remaining byte count or DHT length.
    pub resume_word: u32,
    pub dht: Option<Box<[u8; DHT_MAXSZ]>>,
}

impl ParamInput {
    /// Parameters for a job that starts a new stream.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Load a compression table, replacing any resume word.
    pub fn set_huffman_table(&mut self, table: &HuffmanTable) {
        let len = u32::from(table.len_bits());
        self.resume_word = put_bits(0, IN_DHTLEN.offset, IN_DHTLEN.width, len);
        self.dht = Some(table.bytes.clone());
    }

    fn encode(&self, buf: &mut [u8]) {
        put(buf, IN_ADLER, self.checksums.adler32);
        put(buf, IN_CRC, self.checksums.crc32);
        put(buf, IN_HISTLEN, u32::from(self.histlen));
        put(buf, IN_SUBC, u32::from(self.subc));
        write_be32(buf, IN_RESUME_WORD, self.resume_word & RESUME_WORD_MASK);
        if let Some(dht) = &self.dht {
            buf[IN_DHT..IN_DHT + DHT_MAXSZ].copy_from_slice(&dht[..]);
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let mut dht = Box::new([0u8; DHT_MAXSZ]);
        dht.copy_from_slice(&buf[IN_DHT..IN_DHT + DHT_MAXSZ]);
        Self {
            checksums: Checksums {
                crc32: get(buf, IN_CRC),
                adler32: get(buf, IN_ADLER),
            },
            histlen: get(buf, IN_HISTLEN) as u16,
            subc: get(buf, IN_SUBC) as u8,
            resume_word: read_be32(buf, IN_RESUME_WORD) & RESUME_WORD_MASK,
            dht: Some(dht),
        }
    }

    pub fn sfbt(&self) -> u8 {
        resume_word_field(self.resume_word, IN_SFBT) as u8
    }

    pub fn rembytecnt(&self) -> u16 {
        resume_word_field(self.resume_word, IN_REMBYTECNT) as u16
    }

    pub fn dhtlen(&self) -> u16 {
        resume_word_field(self.resume_word, IN_DHTLEN) as u16
    }
}

fn resume_word_field(word: u32, field: Field) -> u32 {
    get_bits(word, field.offset, field.width)
}

// ---------------------------------------------------------------------------
// Parameter block: output region
// ---------------------------------------------------------------------------

/// LZ77 symbol counts reported by counting compression functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LzCounts {
    pub literal_length: [u32; LLSZ],
    pub distance: [u32; DSZ],
}

/// Device-written parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamOutput {
    pub checksums: Checksums,
    /// Target ending bit count (3 bits).
    pub tebc: u8,
    /// Source unprocessed bit count (16 bits).
    pub subc: u16,
    /// Raw word holding SFBT and the remaining byte count or DHT length.
    pub resume_word: u32,
    /// Source processed byte count, read from the slot the function uses.
    pub spbc: u32,
    /// Partial dynamic table of a decompression suspended in a dynamic block.
    pub dht: Option<Box<[u8; DHT_MAXSZ]>>,
    pub lz_counts: Option<Box<LzCounts>>,
}

impl ParamOutput {
    pub fn sfbt(&self) -> u8 {
        resume_word_field(self.resume_word, OUT_SFBT) as u8
    }

    pub fn rembytecnt(&self) -> u16 {
        resume_word_field(self.resume_word, OUT_REMBYTECNT) as u16
    }

    pub fn dhtlen(&self) -> u16 {
        resume_word_field(self.resume_word, OUT_DHTLEN) as u16
    }

    pub fn block_state(&self) -> BlockState {
        BlockState::from_sfbt(self.sfbt())
    }

    fn decode(buf: &[u8], fc: FunctionCode) -> Self {
        let resume_word = read_be32(buf, OUT_RESUME_WORD) & RESUME_WORD_MASK;
        let mut out = Self {
            checksums: Checksums {
                crc32: get(buf, OUT_CRC),
                adler32: get(buf, OUT_ADLER),
            },
            tebc: get(buf, OUT_TEBC) as u8,
            subc: get(buf, OUT_SUBC) as u16,
            resume_word,
            spbc: get(buf, spbc_field(fc)),
            dht: None,
            lz_counts: None,
        };
        if fc.is_decompress() && out.block_state().is_dynamic() {
            let mut dht = Box::new([0u8; DHT_MAXSZ]);
            dht.copy_from_slice(&buf[OUT_DHT..OUT_DHT + DHT_MAXSZ]);
            out.dht = Some(dht);
        }
        if fc.has_count() {
            let mut counts = Box::new(LzCounts {
                literal_length: [0; LLSZ],
                distance: [0; DSZ],
            });
            let words = (0..LLSZ + DSZ).map(|i| read_be32(buf, OUT_LZCOUNT + 4 * i));
            for (i, w) in words.enumerate() {
                if i < LLSZ {
                    counts.literal_length[i] = w;
                } else {
                    counts.distance[i - LLSZ] = w;
                }
            }
            out.lz_counts = Some(counts);
        }
        out
    }

    fn encode(&self, buf: &mut [u8], fc: FunctionCode) {
        put(buf, OUT_ADLER, self.checksums.adler32);
        put(buf, OUT_CRC, self.checksums.crc32);
        put(buf, OUT_TEBC, u32::from(self.tebc));
        put(buf, OUT_SUBC, u32::from(self.subc));
        write_be32(buf, OUT_RESUME_WORD, self.resume_word & RESUME_WORD_MASK);
        if let Some(dht) = &self.dht {
            buf[OUT_DHT..OUT_DHT + DHT_MAXSZ].copy_from_slice(&dht[..]);
        }
        if let Some(counts) = &self.lz_counts {
            let all = counts.literal_length.iter().chain(counts.distance.iter());
            for (i, &c) in all.enumerate() {
                write_be32(buf, OUT_LZCOUNT + 4 * i, c);
            }
        }
        // Written last: the compress and wrap slot shares qw25 with the tables.
        put(buf, spbc_field(fc), self.spbc);
    }
}

/// Where the device stores the source processed byte count for `fc`.
fn spbc_field(fc: FunctionCode) -> Field {
    if fc.is_decompress() {
        OUT_SPBC_DECOMP
    } else if fc.has_count() {
        OUT_SPBC_COMP_WITH_COUNT
    } else {
        OUT_SPBC_COMP_WRAP
    }
}

// ---------------------------------------------------------------------------
// Resume fields
// ---------------------------------------------------------------------------

/// Bit-level state of a suspended stream, carried verbatim into the next
/// job's input region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeFields {
    /// Unprocessed source bits at the end of the suspended job.
    pub subc: u16,
    /// SFBT and remaining byte count / DHT length, exactly as reported.
    pub resume_word: u32,
    pub dht: Option<Box<[u8; DHT_MAXSZ]>>,
}

impl ResumeFields {
    pub fn from_output(out: &ParamOutput) -> Self {
        Self {
            subc: out.subc,
            resume_word: out.resume_word,
            dht: out.dht.clone(),
        }
    }

    pub fn sfbt(&self) -> u8 {
        resume_word_field(self.resume_word, OUT_SFBT) as u8
    }

    pub fn rembytecnt(&self) -> u16 {
        resume_word_field(self.resume_word, OUT_REMBYTECNT) as u16
    }

    pub fn dhtlen(&self) -> u16 {
        resume_word_field(self.resume_word, OUT_DHTLEN) as u16
    }

    pub fn block_state(&self) -> BlockState {
        BlockState::from_sfbt(self.sfbt())
    }

    /// Whole source bytes that hold unprocessed bits.
    pub fn unprocessed_bytes(&self) -> usize {
        usize::from(self.subc).div_ceil(8)
    }

    /// Thread the suspended state into the next job's parameters.
    pub fn apply(&self, input: &mut ParamInput) {
        input.subc = (self.subc & 7) as u8;
        input.resume_word = self.resume_word;
        input.dht = if self.block_state().is_dynamic() {
            self.dht.clone()
        } else {
            None
        };
    }
}

// ---------------------------------------------------------------------------
// Status block
// ---------------------------------------------------------------------------

/// Coprocessor status block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBlock {
    pub valid: bool,
    /// Set when the device used the 16-byte CSB format.
    pub format_16b: bool,
    pub sequence: u8,
    pub code: CompletionCode,
    pub ext: CompletionExt,
    /// Target processed byte count.
    pub tpbc: u32,
    /// Failing storage address for address-related faults.
    pub fsaddr: u64,
}

impl Default for StatusBlock {
    fn default() -> Self {
        Self {
            valid: false,
            format_16b: false,
            sequence: 0,
            code: CompletionCode::Ok,
            ext: CompletionExt::empty(),
            tpbc: 0,
            fsaddr: 0,
        }
    }
}

impl StatusBlock {
    fn decode(buf: &[u8]) -> Self {
        Self {
            valid: get(buf, CSB_V) != 0,
            format_16b: get(buf, CSB_F) != 0,
            sequence: get(buf, CSB_CS) as u8,
            code: CompletionCode::from_u8(get(buf, CSB_CC) as u8),
            ext: CompletionExt::from_register(get(buf, CSB_CE) as u8),
            tpbc: get(buf, CSB_TPBC),
            fsaddr: CSB_FSADDR.get(buf),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        put(buf, CSB_F, u32::from(self.format_16b));
        put(buf, CSB_CS, u32::from(self.sequence));
        put(buf, CSB_CC, u32::from(self.code.as_u8()));
        put(buf, CSB_CE, u32::from(self.ext.to_register()));
        put(buf, CSB_TPBC, self.tpbc);
        CSB_FSADDR.put(buf, self.fsaddr);
        put(buf, CSB_V, u32::from(self.valid));
    }
}

/// Fault information NX stamps into quadword 4 of a faulting CRB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StampedFault {
    pub fsa: u64,
    pub translation: bool,
    pub fault_status: u8,
    pub pswid: u32,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Everything the device reported for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub fc: FunctionCode,
    pub status: StatusBlock,
    pub output: ParamOutput,
}

impl Completion {
    pub fn interpret(&self) -> Outcome {
        completion::interpret(self)
    }
}

// ---------------------------------------------------------------------------
// CrbCpb
// ---------------------------------------------------------------------------

/// Request and parameter block in one aligned allocation.
#[repr(C, align(2048))]
pub struct CrbCpb {
    bytes: [u8; CRB_CPB_SIZE],
}

impl CrbCpb {
    /// A zeroed block on the heap.
    pub fn new() -> Box<Self> {
        Box::new(Self {
            bytes: [0u8; CRB_CPB_SIZE],
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Effective address of the request block.
    pub fn address(&self) -> u64 {
        self.bytes.as_ptr() as u64
    }

    pub fn csb_address(&self) -> u64 {
        self.address() + CSB as u64
    }

    pub fn get(&self, field: Field) -> u32 {
        get(&self.bytes, field)
    }

    pub fn put(&mut self, field: Field, value: u32) {
        put(&mut self.bytes, field, value);
    }

    pub fn function_code(&self) -> FunctionCode {
        FunctionCode::from_register(self.get(GZIP_FC) as u8)
    }

    pub fn status_valid(&self) -> bool {
        self.get(CSB_V) != 0
    }

    /// Clear the status block so the block can be submitted again.
    pub fn clear_status(&mut self) {
        self.bytes[CSB..CSB + CSB_SIZE].fill(0);
    }

    /// Pack a request and its input parameters.
    ///
    /// Every byte outside the status block is rewritten, so output fields
    /// of a previous job never leak into the next one.
    pub fn encode(&mut self, req: &Request<'_>, input: &ParamInput) -> Result<()> {
        if self.status_valid() {
            return Err(Error::AlreadySubmitted);
        }

        let csb_address = self.csb_address();
        let buf = &mut self.bytes;
        buf[..CSB].fill(0);
        buf[CSB + CSB_SIZE..].fill(0);

        put(buf, GZIP_FC, u32::from(req.fc.raw()));
        CSB_ADDRESS.put(buf, csb_address & CSB_ADDRESS_MASK);
        put(buf, CRB_C, u32::from(req.signal.is_some()));
        put(buf, CRB_AT, u32::from(req.address_type));
        req.source
            .record()
            .encode(&mut buf[SOURCE_DDE..SOURCE_DDE + DDE_SIZE]);
        req.target
            .record()
            .encode(&mut buf[TARGET_DDE..TARGET_DDE + DDE_SIZE]);
        if let Some(signal) = req.signal {
            put(buf, CCB_CM, u32::from(signal.method));
        }
        input.encode(buf);

        log::trace!(
            "encoded {} src={}B dst={}B histlen={} subc={} resume_word={:#07x}",
            req.fc,
            req.source.total_len(),
            req.target.total_len(),
            input.histlen,
            input.subc,
            input.resume_word
        );
        Ok(())
    }

    /// Unpack the status block and output parameters of a completed job.
    pub fn decode(&self) -> Result<Completion> {
        let status = StatusBlock::decode(&self.bytes);
        if !status.valid {
            return Err(Error::NotCompleted);
        }
        let fc = self.function_code();
        Ok(Completion {
            fc,
            status,
            output: ParamOutput::decode(&self.bytes, fc),
        })
    }

    // -----------------------------------------------------------------------
    // Device side
    // -----------------------------------------------------------------------

    /// Read the request fields back, as the device sees them.
    pub fn request(&self) -> RequestView {
        let buf = &self.bytes;
        RequestView {
            fc: self.function_code(),
            csb_address: CSB_ADDRESS.get(buf) & CSB_ADDRESS_MASK,
            ccb_defined: get(buf, CRB_C) != 0,
            address_type: get(buf, CRB_AT) != 0,
            completion_method: get(buf, CCB_CM) as u8,
            source: DdeRecord::decode(&buf[SOURCE_DDE..SOURCE_DDE + DDE_SIZE]),
            target: DdeRecord::decode(&buf[TARGET_DDE..TARGET_DDE + DDE_SIZE]),
        }
    }

    pub fn input(&self) -> ParamInput {
        ParamInput::decode(&self.bytes)
    }

    /// Store a job result. The valid bit is written last.
    pub fn complete(&mut self, status: &StatusBlock, output: &ParamOutput) {
        let fc = self.function_code();
        output.encode(&mut self.bytes, fc);
        status.encode(&mut self.bytes);
    }

    pub fn stamped_fault(&self) -> StampedFault {
        let buf = &self.bytes;
        StampedFault {
            fsa: NXSF_FSA.get(buf),
            translation: get(buf, NXSF_T) != 0,
            fault_status: get(buf, NXSF_FS) as u8,
            pswid: get(buf, NXSF_PSWID),
        }
    }
}

impl std::fmt::Debug for CrbCpb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrbCpb")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("fc", &self.function_code())
            .field("status", &StatusBlock::decode(&self.bytes))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
