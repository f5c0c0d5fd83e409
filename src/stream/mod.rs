// Stream resume state machine.
//
// A stream processes one logical Deflate stream (or a wrap copy) as a
// sequence of bounded jobs. Between jobs it owns everything the device
// needs to pick up where it stopped:
//   - running CRC-32 / Adler-32
//   - the history window placed in front of a resumed source
//   - source bytes the device did not consume (the carry)
//   - the resume fields of the last suspended decompression job
//
// States:
//
//   InProgress --Success (non-final chunk)--> InProgress
//   InProgress --Success--------------------> Finished
//   InProgress --Suspended------------------> Suspended --advance--> ...
//   any        --Fault----------------------> Faulted
//
// Finished and Faulted are terminal.

mod history;
pub mod options;

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::block::{Checksums, Completion, CrbCpb, LzCounts, ParamInput, Request, ResumeFields};
use crate::completion::Outcome;
use crate::dde::{DataDescriptor, Fragment, describe};
use crate::deflate;
use crate::error::{Error, Result};
use crate::function::{FunctionCode, Huffman, Operation, resolve};
use crate::job::{self, JobRunner};

use history::History;
pub use options::{MAX_WINDOW, StreamOptions};

/// Output reserved on intermediate compression chunks for the sync flush.
const SYNC_FLUSH_RESERVE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    InProgress,
    Suspended,
    Finished,
    Faulted,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Faulted)
    }
}

/// Whether a compression or wrap chunk is the last one.
///
/// Decompression ends on the final Deflate block and ignores this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    #[default]
    Continue,
    Finish,
}

/// Result of one completed job.
#[derive(Debug)]
pub struct Step {
    pub state: StreamState,
    pub outcome: Outcome,
    /// Bytes written to the caller's output buffer.
    pub produced: usize,
    /// LZ77 symbol counts from counting compression jobs.
    pub counts: Option<Box<LzCounts>>,
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

pub struct Stream {
    options: StreamOptions,
    block: Box<CrbCpb>,
    state: StreamState,
    checksums: Checksums,
    resume: Option<ResumeFields>,
    history: History,
    carry: Vec<u8>,
    /// History and carry of the job in flight.
    staging: Vec<u8>,
    /// A compression job has succeeded, so later jobs resume.
    started: bool,
    jobs: u64,
    total_in: u64,
    total_out: u64,
}

impl Stream {
    pub fn new(options: StreamOptions) -> Result<Self> {
        options.validate()?;
        let history = History::new(match options.operation {
            Operation::Wrap => 0,
            _ => options.window,
        });
        Ok(Self {
            options,
            block: CrbCpb::new(),
            state: StreamState::InProgress,
            checksums: Checksums::INITIAL,
            resume: None,
            history,
            carry: Vec::new(),
            staging: Vec::new(),
            started: false,
            jobs: 0,
            total_in: 0,
            total_out: 0,
        })
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Running checksums of the uncompressed data seen so far.
    pub fn checksums(&self) -> Checksums {
        self.checksums
    }

    pub fn jobs(&self) -> u64 {
        self.jobs
    }

    /// Input bytes handed to `advance` for jobs that completed.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Output bytes produced, including flush blocks.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Source bytes held for the next job; after decompression finishes,
    /// whatever followed the final block.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    pub fn resume_fields(&self) -> Option<&ResumeFields> {
        self.resume.as_ref()
    }

    /// Switch single-block-and-suspend decompression on or off for
    /// subsequent jobs.
    pub fn set_single_block_suspend(&mut self, on: bool) -> Result<()> {
        if on && self.options.operation != Operation::Decompress {
            return Err(Error::UnsupportedCombination(
                "single block suspend only applies to decompression",
            ));
        }
        self.options.single_block_suspend = on;
        Ok(())
    }

    fn function_code(&self) -> Result<FunctionCode> {
        let o = &self.options;
        let resume = match o.operation {
            Operation::Decompress => self.resume.is_some(),
            Operation::Compress => self.started,
            Operation::Wrap => false,
        };
        let fc = resolve(
            o.operation,
            o.huffman,
            o.lz_counts,
            resume,
            o.single_block_suspend,
        )?;
        Ok(fc.with_limit(o.limit))
    }

    /// Encode the next job. `input` is appended to any carried source; the
    /// stream takes responsibility for all of it.
    ///
    /// The returned submission borrows the stream and both buffers until
    /// the job completes.
    pub fn advance<'s, 'b>(
        &'s mut self,
        input: &'b [u8],
        output: &'b mut [u8],
        flush: Flush,
    ) -> Result<Submission<'s, 'b>> {
        if self.state.is_terminal() {
            return Err(Error::StreamTerminated);
        }
        let op = self.options.operation;
        let fc = self.function_code()?;

        let mut param = ParamInput::fresh();
        param.checksums = self.checksums;

        self.staging.clear();
        if fc.is_resume() {
            param.histlen = match op {
                Operation::Compress => self.history.write_truncated(&mut self.staging),
                _ => self.history.write_padded(&mut self.staging),
            };
        }
        let hist_bytes = self.staging.len();
        self.staging.extend_from_slice(&self.carry);
        if self.staging.len() == hist_bytes && input.is_empty() {
            return Err(Error::EmptyBuffer);
        }

        if op == Operation::Decompress
            && let Some(resume) = &self.resume
        {
            resume.apply(&mut param);
            log::trace!(
                "resume: histlen={} subc={} sfbt={:#x} word={:#07x} dht={}",
                param.histlen,
                param.subc,
                resume.sfbt(),
                resume.resume_word,
                param.dht.is_some()
            );
        }
        if let (Operation::Compress, Huffman::Dynamic, Some(table)) =
            (op, self.options.huffman, &self.options.table)
        {
            param.set_huffman_table(table);
        }

        let reserve = match (op, flush) {
            (Operation::Compress, Flush::Continue) => SYNC_FLUSH_RESERVE,
            _ => 0,
        };
        if output.len() <= reserve {
            return Err(Error::OutputTooSmall {
                needed: reserve + 1,
                available: output.len(),
            });
        }
        let target_len = output.len() - reserve;

        let mut fragments = Vec::with_capacity(2);
        if !self.staging.is_empty() {
            fragments.push(Fragment::from_slice(&self.staging)?);
        }
        if !input.is_empty() {
            fragments.push(Fragment::from_slice(input)?);
        }
        let source = describe(&fragments)?;
        let target = describe(&[Fragment::from_mut_slice(&mut output[..target_len])?])?;

        let req = Request {
            fc,
            source: &source,
            target: &target,
            signal: self.options.signal,
            address_type: self.options.address_type,
        };
        self.block.encode(&req, &param)?;

        Ok(Submission {
            output: NonNull::from(&mut *output).cast(),
            output_len: output.len(),
            stream: self,
            input,
            flush,
            hist_bytes,
            settled: false,
            _source: source,
            _target: target,
            _output: PhantomData,
        })
    }

    /// `advance` and run the job on `runner`.
    pub fn run<R: JobRunner + ?Sized>(
        &mut self,
        runner: &mut R,
        input: &[u8],
        output: &mut [u8],
        flush: Flush,
    ) -> Result<Step> {
        self.advance(input, output, flush)?.run(runner)
    }

    /// End a compression or wrap stream whose data has all been submitted
    /// with `Flush::Continue`. Compression appends an empty final block.
    /// Returns the bytes written to `output`.
    pub fn finish(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.state.is_terminal() {
            return Err(Error::StreamTerminated);
        }
        if !self.carry.is_empty() {
            return Err(Error::UnsupportedCombination(
                "carried input must be submitted before finishing",
            ));
        }
        let produced = match self.options.operation {
            Operation::Decompress => {
                return Err(Error::UnsupportedCombination(
                    "decompression ends on the final block",
                ));
            }
            Operation::Compress => deflate::append_empty_fixed_block(output, 0, 0, true)?.0,
            Operation::Wrap => 0,
        };
        self.total_out += produced as u64;
        self.transition(StreamState::Finished);
        Ok(produced)
    }

    fn transition(&mut self, next: StreamState) {
        if next != self.state {
            log::debug!("stream {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    /// Source bytes following the history, from `from` onward.
    fn rest_of_source(&self, input: &[u8], hist_bytes: usize, from: usize) -> Vec<u8> {
        let staged = &self.staging[hist_bytes..];
        let mut rest = Vec::new();
        if from < staged.len() {
            rest.extend_from_slice(&staged[from..]);
            rest.extend_from_slice(input);
        } else {
            let skip = (from - staged.len()).min(input.len());
            rest.extend_from_slice(&input[skip..]);
        }
        rest
    }

    /// First `len` source bytes following the history.
    fn head_of_source(&self, input: &[u8], hist_bytes: usize, len: usize) -> Vec<u8> {
        let staged = &self.staging[hist_bytes..];
        let mut head = Vec::with_capacity(len);
        let from_staged = len.min(staged.len());
        head.extend_from_slice(&staged[..from_staged]);
        head.extend_from_slice(&input[..(len - from_staged).min(input.len())]);
        head
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("operation", &self.options.operation)
            .field("state", &self.state)
            .field("jobs", &self.jobs)
            .field("checksums", &self.checksums)
            .field("history", &self.history.len())
            .field("carry", &self.carry.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// An encoded job waiting to run.
///
/// Holds the stream and the caller's buffers until completion. The output
/// buffer is kept as a raw pointer so no reference to it is live while
/// the device writes to it.
///
/// Dropping a submission without completing it abandons the job: the block
/// is cleared for reuse and the stream is left as it was before `advance`.
pub struct Submission<'s, 'b> {
    stream: &'s mut Stream,
    input: &'b [u8],
    output: NonNull<u8>,
    output_len: usize,
    flush: Flush,
    hist_bytes: usize,
    /// A completion has been applied to the stream.
    settled: bool,
    // Indirect lists must outlive the job.
    _source: DataDescriptor,
    _target: DataDescriptor,
    _output: PhantomData<&'b mut [u8]>,
}

impl Submission<'_, '_> {
    pub fn block(&self) -> &CrbCpb {
        &self.stream.block
    }

    /// The encoded block, for callers that submit it themselves and then
    /// call `complete`.
    pub fn block_mut(&mut self) -> &mut CrbCpb {
        &mut self.stream.block
    }

    pub fn function_code(&self) -> FunctionCode {
        self.stream.block.function_code()
    }

    pub fn run<R: JobRunner + ?Sized>(self, runner: &mut R) -> Result<Step> {
        self.run_with_progress(runner, &mut || {})
    }

    pub fn run_with_progress<R: JobRunner + ?Sized>(
        mut self,
        runner: &mut R,
        progress: &mut dyn FnMut(),
    ) -> Result<Step> {
        let completion = job::submit_with_progress(runner, &mut self.stream.block, progress)?;
        self.on_completion(completion)
    }

    /// Interpret a job the caller ran through `block_mut`.
    pub fn complete(mut self) -> Result<Step> {
        let completion = self.stream.block.decode()?;
        self.on_completion(completion)
    }

    fn on_completion(&mut self, c: Completion) -> Result<Step> {
        self.settled = true;
        let (input, output_len, flush, hist_bytes) =
            (self.input, self.output_len, self.flush, self.hist_bytes);
        let stream = &mut *self.stream;
        stream.block.clear_status();
        stream.jobs += 1;
        stream.total_in += input.len() as u64;

        // SAFETY: `output` and `output_len` come from the `&'b mut [u8]`
        // passed to `advance`, which this submission still borrows, and the
        // device has finished writing to it.
        let output = unsafe { std::slice::from_raw_parts_mut(self.output.as_ptr(), output_len) };

        let outcome = c.interpret();
        let (summary, suspended) = match &outcome {
            Outcome::Fault(fault) => {
                stream.transition(StreamState::Faulted);
                return Err(Error::Fault(*fault));
            }
            Outcome::Success { summary, .. } => (*summary, None),
            Outcome::Suspended { summary, resume, .. } => (*summary, Some(resume.clone())),
        };

        let spbc = summary.source_bytes as usize;
        let mut produced = (summary.target_bytes as usize).min(output_len);

        let next = match (stream.options.operation, suspended) {
            (Operation::Decompress, None) => {
                stream.history.push(&output[..produced]);
                stream.checksums = summary.checksums;
                // SPBC runs to the end of the source and SUBC counts the
                // bits after the final block. Pad bits of the byte holding
                // the end-of-block code are not part of what follows.
                let from = spbc.saturating_sub(usize::from(summary.unprocessed_bits) / 8);
                stream.carry = stream.rest_of_source(input, hist_bytes, from);
                stream.resume = None;
                StreamState::Finished
            }
            (Operation::Decompress, Some(resume)) => {
                stream.history.push(&output[..produced]);
                stream.checksums = summary.checksums;
                let from = spbc.saturating_sub(resume.unprocessed_bytes());
                stream.carry = stream.rest_of_source(input, hist_bytes, from);
                stream.resume = Some(resume);
                StreamState::Suspended
            }
            // Out of target space: nothing is kept, the chunk is retried.
            (_, Some(_)) => {
                produced = 0;
                stream.carry = stream.rest_of_source(input, hist_bytes, 0);
                StreamState::Suspended
            }
            (op, None) => {
                let consumed = stream.head_of_source(input, hist_bytes, spbc);
                stream.history.push(&consumed);
                stream.checksums = summary.checksums;
                stream.carry = stream.rest_of_source(input, hist_bytes, spbc);
                stream.started = true;
                if op == Operation::Compress && produced > 0 {
                    let block = &mut output[..produced];
                    match flush {
                        Flush::Finish => deflate::set_final_bit(block),
                        Flush::Continue => {
                            deflate::clear_final_bit(block);
                            produced =
                                deflate::sync_flush(output, produced, summary.target_ending_bits)?;
                        }
                    }
                }
                match flush {
                    Flush::Finish => StreamState::Finished,
                    Flush::Continue => StreamState::InProgress,
                }
            }
        };

        stream.total_out += produced as u64;
        stream.transition(next);
        Ok(Step {
            state: next,
            outcome,
            produced,
            counts: c.output.lz_counts,
        })
    }
}

impl Drop for Submission<'_, '_> {
    fn drop(&mut self) {
        if !self.settled {
            log::debug!("submission dropped before completion");
            self.stream.block.clear_status();
        }
    }
}

impl std::fmt::Debug for Submission<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submission")
            .field("fc", &self.function_code())
            .field("input", &self.input.len())
            .field("output", &self.output_len)
            .field("flush", &self.flush)
            .finish_non_exhaustive()
    }
}
