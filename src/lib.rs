//! nxdeflate: request/parameter block protocol for NX-GZIP style Deflate
//! coprocessors.
//!
//! The crate provides:
//! - Big-endian, MSB-numbered register access over plain byte buffers (`regs`)
//! - Scatter/gather data descriptors (`dde`)
//! - The function code registry (`function`)
//! - The command block codec (`block`) and completion interpreter (`completion`)
//! - A resumable stream driver that splits a Deflate stream into jobs (`stream`)
//! - Deflate block helpers used to stitch job outputs together (`deflate`)
//!
//! Talking to the device is left to an implementation of [`job::JobRunner`].
//!
//! # Quick Start
//!
//! ```no_run
//! use nxdeflate::block::CrbCpb;
//! use nxdeflate::job::{JobError, JobRunner};
//! use nxdeflate::stream::{Flush, Stream, StreamOptions, StreamState};
//!
//! struct Device;
//!
//! impl JobRunner for Device {
//!     fn run_job(&mut self, _block: &mut CrbCpb) -> Result<(), JobError> {
//!         // Paste the block to the accelerator and wait for its status.
//!         Err(JobError::Unavailable("no device".into()))
//!     }
//! }
//!
//! # fn main() -> nxdeflate::Result<()> {
//! let compressed: &[u8] = &[0x03, 0x00];
//! let mut out = vec![0u8; 4096];
//! let mut stream = Stream::new(StreamOptions::decompress())?;
//! let step = stream.run(&mut Device, compressed, &mut out, Flush::Continue)?;
//! if step.state == StreamState::Suspended {
//!     // Feed more input (or drain `out`) and call `run` again.
//! }
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod completion;
pub mod dde;
pub mod deflate;
pub mod error;
pub mod function;
pub mod job;
pub mod regs;
pub mod stream;
pub mod timebase;

pub use error::{Error, Result};
