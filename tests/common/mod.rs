// Shared test harness: a software stand-in for the coprocessor.
//
// `SimDevice` implements `JobRunner` by reading the request block the way
// the hardware does: it follows the source and target descriptors to raw
// memory, runs the requested function and writes the status block and
// output parameters back.

#![allow(dead_code)]

pub mod bits;
pub mod inflate;

use nxdeflate::block::{Checksums, CrbCpb, LzCounts, ParamInput, ParamOutput, StatusBlock};
use nxdeflate::completion::{CompletionCode, CompletionExt};
use nxdeflate::dde::DdeRecord;
use nxdeflate::deflate::BlockState;
use nxdeflate::function::{FunctionCode, Huffman, Operation};
use nxdeflate::job::{JobError, JobRunner};
use nxdeflate::regs::layout::{DDE_SIZE, DHT_MAXSZ, QW};

use inflate::{Inflater, Resume, Stop};

/// What the device saw for one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub fc: FunctionCode,
    pub histlen: u16,
    pub subc: u8,
    pub sfbt: u8,
    pub source_len: usize,
    pub source_fragments: usize,
    pub target_len: usize,
}

#[derive(Default)]
pub struct SimDevice {
    pub jobs: Vec<JobRecord>,
    /// Status to report instead of running the next job.
    pub inject: Option<(CompletionCode, CompletionExt)>,
}

impl SimDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Direct fragments a descriptor names.
fn fragments(record: DdeRecord) -> Vec<(u64, usize)> {
    if !record.is_indirect() {
        return vec![(record.address, record.byte_count as usize)];
    }
    // SAFETY: the list was built by `DdeList` and outlives the job.
    let list = unsafe {
        std::slice::from_raw_parts(
            record.address as *const u8,
            usize::from(record.count) * DDE_SIZE,
        )
    };
    list.chunks_exact(DDE_SIZE)
        .map(|e| {
            let d = DdeRecord::decode(e);
            (d.address, d.byte_count as usize)
        })
        .collect()
}

fn gather(frags: &[(u64, usize)]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(addr, len) in frags {
        // SAFETY: descriptors point at caller buffers pinned for the job.
        out.extend_from_slice(unsafe { std::slice::from_raw_parts(addr as *const u8, len) });
    }
    out
}

fn scatter(frags: &[(u64, usize)], mut data: &[u8]) {
    for &(addr, len) in frags {
        let n = len.min(data.len());
        // SAFETY: as above; the target is exclusively the device's.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), addr as *mut u8, n) };
        data = &data[n..];
    }
}

fn checksums(seed: Checksums, data: &[u8]) -> Checksums {
    let mut crc = crc32fast::Hasher::new_with_initial(seed.crc32);
    crc.update(data);
    let mut adler = simd_adler32::Adler32::from_checksum(seed.adler32);
    adler.write(data);
    Checksums {
        crc32: crc.finalize(),
        adler32: adler.finish(),
    }
}

fn status(code: CompletionCode, ext: CompletionExt, tpbc: usize) -> StatusBlock {
    StatusBlock {
        valid: true,
        format_16b: true,
        code,
        ext,
        tpbc: tpbc as u32,
        ..Default::default()
    }
}

fn fault(code: u8) -> (StatusBlock, ParamOutput) {
    (
        status(CompletionCode::from_u8(code), CompletionExt::TERMINATE, 0),
        ParamOutput::default(),
    )
}

impl JobRunner for SimDevice {
    fn run_job(&mut self, block: &mut CrbCpb) -> Result<(), JobError> {
        let req = block.request();
        let input = block.input();
        let src_frags = fragments(req.source);
        let dst_frags = fragments(req.target);
        let source = gather(&src_frags);
        let capacity: usize = dst_frags.iter().map(|f| f.1).sum();

        self.jobs.push(JobRecord {
            fc: req.fc,
            histlen: input.histlen,
            subc: input.subc,
            sfbt: input.sfbt(),
            source_len: source.len(),
            source_fragments: src_frags.len(),
            target_len: capacity,
        });

        let (st, out) = if let Some((code, ext)) = self.inject.take() {
            (status(code, ext, 0), ParamOutput::default())
        } else {
            let hist = (usize::from(input.histlen) * QW).min(source.len());
            let (history, data) = source.split_at(hist);
            match req.fc.kind().map(|k| (k.op, k.huffman)) {
                Some((Operation::Wrap, _)) => wrap(&input, data, &dst_frags, capacity),
                Some((Operation::Compress, Huffman::Fixed)) => {
                    deflate(&input, history, data, &dst_frags, capacity, req.fc.has_count())
                }
                // Dynamic table compression is not modelled.
                Some((Operation::Compress, Huffman::Dynamic)) => fault(8),
                Some((Operation::Decompress, _)) => {
                    let single = req.fc.kind().is_some_and(|k| k.single_block);
                    inflate(&input, history, data, &dst_frags, capacity, single)
                }
                None => fault(17),
            }
        };
        block.complete(&st, &out);
        Ok(())
    }
}

fn wrap(
    input: &ParamInput,
    data: &[u8],
    dst: &[(u64, usize)],
    capacity: usize,
) -> (StatusBlock, ParamOutput) {
    if data.len() > capacity {
        let ext = CompletionExt::PARTIAL | CompletionExt::TPBC_VALID;
        return (status(CompletionCode::TargetSpace, ext, 0), ParamOutput::default());
    }
    scatter(dst, data);
    let out = ParamOutput {
        checksums: checksums(input.checksums, data),
        spbc: data.len() as u32,
        ..Default::default()
    };
    (
        status(CompletionCode::Ok, CompletionExt::TPBC_VALID, data.len()),
        out,
    )
}

fn deflate(
    input: &ParamInput,
    history: &[u8],
    data: &[u8],
    dst: &[(u64, usize)],
    capacity: usize,
    counts: bool,
) -> (StatusBlock, ParamOutput) {
    let enc = compress::compress(history, data);
    if enc.bytes.len() > capacity {
        let ext = CompletionExt::PARTIAL | CompletionExt::TPBC_VALID;
        return (status(CompletionCode::TargetSpace, ext, 0), ParamOutput::default());
    }
    scatter(dst, &enc.bytes);
    let out = ParamOutput {
        checksums: checksums(input.checksums, data),
        tebc: enc.tebc,
        spbc: data.len() as u32,
        lz_counts: counts.then(|| {
            Box::new(LzCounts {
                literal_length: enc.literal_length,
                distance: enc.distance,
            })
        }),
        ..Default::default()
    };
    let code = if enc.bytes.len() > data.len() {
        CompletionCode::TpbcGtSpbc
    } else {
        CompletionCode::Ok
    };
    (status(code, CompletionExt::TPBC_VALID, enc.bytes.len()), out)
}

fn inflate(
    input: &ParamInput,
    history: &[u8],
    data: &[u8],
    dst: &[(u64, usize)],
    capacity: usize,
    single_block: bool,
) -> (StatusBlock, ParamOutput) {
    let state = BlockState::from_sfbt(input.sfbt());
    let count = if state.is_dynamic() {
        input.dhtlen()
    } else {
        input.rembytecnt()
    };
    let dht = input.dht.as_deref().map_or(&[][..], |d| &d[..]);
    let skip = match input.subc {
        0 => 0,
        n => 8 - usize::from(n),
    };
    let resume = Resume { state, count, dht };
    let report = match Inflater::new(history, data, skip, capacity, single_block).run(resume) {
        Ok(r) => r,
        Err(cc) => return fault(cc),
    };

    scatter(dst, &report.output);
    // Source the device has taken in. Running dry or finishing consumes
    // the whole buffer and the leftover bits (a partial header, or bytes
    // after the final block) are reported in SUBC.
    let spbc = match report.stop {
        Stop::Done | Stop::InputExhausted => {
            data.len().min((report.bit_pos + usize::from(u16::MAX)) / 8)
        }
        Stop::TargetFull | Stop::BlockEnd => report.bit_pos.div_ceil(8),
    };
    let mut out = ParamOutput {
        checksums: checksums(input.checksums, &report.output),
        spbc: spbc as u32,
        ..Default::default()
    };
    let produced = report.output.len();
    let partial = CompletionExt::PARTIAL | CompletionExt::TPBC_VALID;
    let (code, ext) = match report.stop {
        Stop::Done => (CompletionCode::Ok, CompletionExt::TPBC_VALID),
        Stop::InputExhausted | Stop::BlockEnd => (CompletionCode::Ok, partial),
        Stop::TargetFull => (CompletionCode::TargetSpace, partial),
    };
    out.subc = (spbc * 8 - report.bit_pos) as u16;
    if report.stop != Stop::Done {
        out.resume_word = (u32::from(report.state.to_sfbt()) << 16) | u32::from(report.count);
        if let Some(bits) = report.dht {
            let mut table = Box::new([0u8; DHT_MAXSZ]);
            table[..bits.len()].copy_from_slice(&bits);
            out.dht = Some(table);
        }
    }
    (status(code, ext, produced), out)
}
