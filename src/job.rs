// Job submission seam.
//
// Everything that touches the device itself (window setup, paste,
// waiting on the status block, page-fault touch and retry) lives behind
// `JobRunner`. This crate only encodes blocks, hands them over one at a
// time and interprets what comes back.

use thiserror::Error;

use crate::block::{Completion, CrbCpb};
use crate::error::{Error, Result};
use crate::timebase;

/// Submission failed before the device produced a status block.
#[derive(Debug, Error)]
pub enum JobError {
    /// The device or driver refused the request.
    #[error("device rejected the job (errno {0})")]
    Rejected(i32),
    #[error("no coprocessor available: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs one request block on a coprocessor.
///
/// # Contract
///
/// `run_job` returns only once the device has written the status block
/// (valid bit set) or the job could not be submitted. The block must not
/// be moved or freed while the call is in progress, which the `&mut`
/// borrow guarantees; the buffers its descriptors point at are pinned by
/// the caller for the same span.
///
/// ```no_run
/// use nxdeflate::block::CrbCpb;
/// use nxdeflate::job::{JobError, JobRunner};
///
/// struct Window { fd: i32 }
///
/// impl JobRunner for Window {
///     fn run_job(&mut self, block: &mut CrbCpb) -> Result<(), JobError> {
///         // paste `block.address()` to the device and wait on the CSB
///         let _ = (self.fd, block);
///         Err(JobError::Rejected(-1))
///     }
/// }
/// ```
pub trait JobRunner {
    fn run_job(&mut self, block: &mut CrbCpb) -> Result<(), JobError>;

    /// Like `run_job`, calling `progress` while waiting so long jobs can
    /// report liveness. The default calls it once before submitting.
    fn run_job_with_progress(
        &mut self,
        block: &mut CrbCpb,
        progress: &mut dyn FnMut(),
    ) -> Result<(), JobError> {
        progress();
        self.run_job(block)
    }
}

impl<R: JobRunner + ?Sized> JobRunner for &mut R {
    fn run_job(&mut self, block: &mut CrbCpb) -> Result<(), JobError> {
        (**self).run_job(block)
    }

    fn run_job_with_progress(
        &mut self,
        block: &mut CrbCpb,
        progress: &mut dyn FnMut(),
    ) -> Result<(), JobError> {
        (**self).run_job_with_progress(block, progress)
    }
}

/// Run an encoded block and decode its completion.
pub fn submit<R: JobRunner + ?Sized>(runner: &mut R, block: &mut CrbCpb) -> Result<Completion> {
    submit_with_progress(runner, block, &mut || {})
}

/// `submit` with a liveness callback.
pub fn submit_with_progress<R: JobRunner + ?Sized>(
    runner: &mut R,
    block: &mut CrbCpb,
    progress: &mut dyn FnMut(),
) -> Result<Completion> {
    if block.status_valid() {
        return Err(Error::AlreadySubmitted);
    }
    let fc = block.function_code();
    log::debug!("submitting {fc} at {:#x}", block.address());

    let t0 = timebase::now();
    runner.run_job_with_progress(block, progress)?;
    let elapsed = timebase::time_diff(t0, timebase::now());

    let completion = block.decode()?;
    log::debug!(
        "{fc} completed in {}us: {} tpbc={} spbc={}",
        timebase::to_micros(elapsed),
        completion.status.code,
        completion.status.tpbc,
        completion.output.spbc
    );
    Ok(completion)
}
