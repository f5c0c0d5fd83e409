// Byte layout of the combined request/parameter block.
//
// Offsets are relative to the start of the 2048-byte aligned allocation
// holding the CRB (request) followed by the CPB (parameters). The CRB
// region is 256 bytes: the 128-byte request proper plus the stamp area
// that pushes the CSB out to byte 240.

use super::field::{Field, Field64};

// ---------------------------------------------------------------------------
// Sizes and alignment
// ---------------------------------------------------------------------------

/// Alignment of the request block.
pub const CRB_ALIGN: usize = 128;
/// Alignment of the combined request + parameter allocation.
pub const CRB_CPB_ALIGN: usize = 2048;
/// Size of the combined allocation.
pub const CRB_CPB_SIZE: usize = 2048;
/// Bytes occupied by the request region (request, stamp area and CSB).
pub const CRB_SIZE: usize = 256;
/// Start of the parameter block.
pub const CPB_BASE: usize = CRB_SIZE;
/// Size of one data descriptor element.
pub const DDE_SIZE: usize = 16;
/// One quadword.
pub const QW: usize = 16;

/// Literal/length alphabet size.
pub const LLSZ: usize = 286;
/// Distance alphabet size.
pub const DSZ: usize = 30;
/// Dynamic Huffman table payload in quadwords.
pub const DHTSZ: usize = 18;
/// Dynamic Huffman table payload in bytes.
pub const DHT_MAXSZ: usize = 288;
/// Largest number of entries in an indirect descriptor list.
pub const MAX_DDE_COUNT: usize = 255;

// ---------------------------------------------------------------------------
// CRB
// ---------------------------------------------------------------------------

pub const GZIP_FC: Field = Field::bits("gzip_fc", 0, 31, 8);
pub const CSB_ADDRESS: Field64 = Field64::new("csb_address", 8);
/// Low 4 bits of the CSB address carry flags, not address bits.
pub const CSB_ADDRESS_MASK: u64 = !15;
pub const CRB_C: Field = Field::bits("crb_c", 12, 28, 1);
pub const CRB_AT: Field = Field::bits("crb_at", 12, 30, 1);

pub const SOURCE_DDE: usize = 16;
pub const TARGET_DDE: usize = 32;

/// Fields of a data descriptor element relative to its start.
pub const DDE_COUNT: Field = Field::bits("dde_count", 0, 23, 8);
pub const DDEBC: Field = Field::word("ddebc", 4);
pub const DDEAD: Field64 = Field64::new("ddead", 8);

pub const CCB: usize = 48;
pub const CCB_CM: Field = Field::bits("ccb_cm", 60, 31, 3);

// Quadword 4 is stamped either by VAS when the CRB enters the receive
// FIFO or by NX when a translation fault sends it to the fault window.
pub const STAMP: usize = 64;
pub const STAMP_QWORDS: usize = 11;
pub const VAS_BUF_NUM: Field = Field::bits("vas_buf_num", 64, 5, 6);
pub const VAS_SEND_WC_ID: Field = Field::bits("send_wc_id", 64, 31, 16);
pub const VAS_RECV_WC_ID: Field = Field::bits("recv_wc_id", 68, 31, 16);
pub const VAS_INVALID: Field = Field::bits("vas_invalid", 76, 31, 1);
pub const NXSF_FSA: Field64 = Field64::new("fsa", 64);
pub const NXSF_T: Field = Field::bits("nxsf_t", 72, 23, 1);
pub const NXSF_FS: Field = Field::bits("nxsf_fs", 72, 31, 8);
pub const NXSF_PSWID: Field = Field::word("pswid", 76);

// ---------------------------------------------------------------------------
// CSB
// ---------------------------------------------------------------------------

pub const CSB: usize = 240;
pub const CSB_SIZE: usize = 16;
pub const CSB_V: Field = Field::bits("csb_v", 240, 0, 1);
pub const CSB_F: Field = Field::bits("csb_f", 240, 6, 1);
pub const CSB_CS: Field = Field::bits("csb_cs", 240, 15, 8);
pub const CSB_CC: Field = Field::bits("csb_cc", 240, 23, 8);
pub const CSB_CE: Field = Field::bits("csb_ce", 240, 31, 8);
pub const CSB_TPBC: Field = Field::word("tpbc", 244);
pub const CSB_FSADDR: Field64 = Field64::new("fsaddr", 248);

// ---------------------------------------------------------------------------
// CPB input (qw 0..23)
// ---------------------------------------------------------------------------

pub const IN_ADLER: Field = Field::word("in_adler", CPB_BASE);
pub const IN_CRC: Field = Field::word("in_crc", CPB_BASE + 4);
pub const IN_HISTLEN: Field = Field::bits("in_histlen", CPB_BASE + 8, 11, 12);
pub const IN_SUBC: Field = Field::bits("in_subc", CPB_BASE + 8, 31, 3);
pub const IN_SFBT: Field = Field::bits("in_sfbt", CPB_BASE + 12, 15, 4);
pub const IN_REMBYTECNT: Field = Field::bits("in_rembytecnt", CPB_BASE + 12, 31, 16);
pub const IN_DHTLEN: Field = Field::bits("in_dhtlen", CPB_BASE + 12, 31, 12);
/// Word shared by SFBT and the remaining byte count / DHT length.
pub const IN_RESUME_WORD: usize = CPB_BASE + 12;
pub const IN_DHT: usize = CPB_BASE + QW;
pub const IN_RESERVED: usize = CPB_BASE + 19 * QW;
pub const CPB_IN_END: usize = CPB_BASE + 24 * QW;

// ---------------------------------------------------------------------------
// CPB output (qw 24..104)
// ---------------------------------------------------------------------------

pub const CPB_OUT: usize = CPB_BASE + 24 * QW;
pub const OUT_ADLER: Field = Field::word("out_adler", CPB_OUT);
pub const OUT_CRC: Field = Field::word("out_crc", CPB_OUT + 4);
pub const OUT_TEBC: Field = Field::bits("out_tebc", CPB_OUT + 8, 15, 3);
pub const OUT_SUBC: Field = Field::bits("out_subc", CPB_OUT + 8, 31, 16);
pub const OUT_SFBT: Field = Field::bits("out_sfbt", CPB_OUT + 12, 15, 4);
pub const OUT_REMBYTECNT: Field = Field::bits("out_rembytecnt", CPB_OUT + 12, 31, 16);
pub const OUT_DHTLEN: Field = Field::bits("out_dhtlen", CPB_OUT + 12, 31, 12);
pub const OUT_RESUME_WORD: usize = CPB_OUT + 12;

/// qw25: start of the region reused for spbc, LZ counts or the output DHT.
pub const OUT_QW25: usize = CPB_OUT + QW;
pub const OUT_SPBC_COMP_WRAP: Field = Field::word("out_spbc_comp_wrap", OUT_QW25);
pub const OUT_LZCOUNT: usize = OUT_QW25;
pub const OUT_DHT: usize = OUT_QW25;
pub const OUT_SPBC_DECOMP: Field = Field::word("out_spbc_decomp", OUT_QW25 + DHTSZ * QW);
pub const OUT_SPBC_COMP_WITH_COUNT: Field =
    Field::word("out_spbc_comp_with_count", CPB_BASE + 104 * QW);

/// Mask of the SFBT and remaining byte count bits of a resume word.
pub const RESUME_WORD_MASK: u32 = IN_SFBT.word_mask() | IN_REMBYTECNT.word_mask();

/// Every 32-bit register field, for diagnostics and exhaustive tests.
pub const FIELDS: &[Field] = &[
    GZIP_FC,
    CRB_C,
    CRB_AT,
    CCB_CM,
    VAS_BUF_NUM,
    VAS_SEND_WC_ID,
    VAS_RECV_WC_ID,
    VAS_INVALID,
    NXSF_T,
    NXSF_FS,
    NXSF_PSWID,
    CSB_V,
    CSB_F,
    CSB_CS,
    CSB_CC,
    CSB_CE,
    CSB_TPBC,
    IN_ADLER,
    IN_CRC,
    IN_HISTLEN,
    IN_SUBC,
    IN_SFBT,
    IN_REMBYTECNT,
    IN_DHTLEN,
    OUT_ADLER,
    OUT_CRC,
    OUT_TEBC,
    OUT_SUBC,
    OUT_SFBT,
    OUT_REMBYTECNT,
    OUT_DHTLEN,
    OUT_SPBC_COMP_WRAP,
    OUT_SPBC_DECOMP,
    OUT_SPBC_COMP_WITH_COUNT,
];

/// Look up a register field by name.
pub fn field(name: &str) -> Option<Field> {
    FIELDS.iter().copied().find(|f| f.name == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
