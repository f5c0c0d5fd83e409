// Completion interpreter.
//
// The device reports a job's result through the CSB completion code (CC)
// and three completion extension (CE) bits:
//   - terminated: the job did not run to completion, output is unreliable
//   - partial:    the job stopped early at a resumable point
//   - tpbc valid: the target processed byte count is authoritative
//
// `interpret` collapses these into an `Outcome`. It never retries.

use bitflags::bitflags;
use thiserror::Error;

use crate::block::{Checksums, Completion, ResumeFields};

// ---------------------------------------------------------------------------
// Completion extension
// ---------------------------------------------------------------------------

bitflags! {
    /// CE(0..2), taken from the three most significant bits of the CE byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompletionExt: u8 {
        const PARTIAL = 0x4;
        const TERMINATE = 0x2;
        const TPBC_VALID = 0x1;
    }
}

impl CompletionExt {
    /// Decode from the 8-bit CE register.
    #[inline]
    pub fn from_register(ce: u8) -> Self {
        Self::from_bits_truncate(ce >> 5)
    }

    /// Encode into the 8-bit CE register.
    #[inline]
    pub fn to_register(self) -> u8 {
        self.bits() << 5
    }

    pub fn terminated(self) -> bool {
        self.contains(Self::TERMINATE)
    }

    pub fn partial(self) -> bool {
        self.contains(Self::PARTIAL)
    }

    pub fn tpbc_valid(self) -> bool {
        self.contains(Self::TPBC_VALID)
    }
}

// ---------------------------------------------------------------------------
// Completion codes
// ---------------------------------------------------------------------------

/// CSB completion code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionCode {
    Ok,
    Alignment,
    OperandOverlap,
    DataLength,
    Translation,
    Protection,
    ExternalUe7,
    InvalidOp,
    Privilege,
    InternalUe,
    ExternalUeWrite,
    TargetSpace,
    ExcessiveDde,
    TranslationWrite,
    ProtectionWrite,
    Subfunction,
    FunctionAbort,
    ByteMax,
    CorruptCrb,
    InvalidCrb,
    InvalidDde,
    SegmentedDdl,
    DdeOverflow,
    TpbcGtSpbc,
    MissingCode,
    InvalidDistance,
    InvalidDht,
    ExternalUe90,
    WatchdogTimer,
    AtFault,
    InterruptServer,
    Ue253,
    NoHardware,
    HungOp,
    /// Any code the manual does not document.
    Unknown(u8),
}

impl CompletionCode {
    pub const fn from_u8(cc: u8) -> Self {
        match cc {
            0 => Self::Ok,
            1 => Self::Alignment,
            2 => Self::OperandOverlap,
            3 => Self::DataLength,
            5 => Self::Translation,
            6 => Self::Protection,
            7 => Self::ExternalUe7,
            8 => Self::InvalidOp,
            9 => Self::Privilege,
            10 => Self::InternalUe,
            12 => Self::ExternalUeWrite,
            13 => Self::TargetSpace,
            14 => Self::ExcessiveDde,
            15 => Self::TranslationWrite,
            16 => Self::ProtectionWrite,
            17 => Self::Subfunction,
            18 => Self::FunctionAbort,
            19 => Self::ByteMax,
            20 => Self::CorruptCrb,
            21 => Self::InvalidCrb,
            30 => Self::InvalidDde,
            31 => Self::SegmentedDdl,
            33 => Self::DdeOverflow,
            64 => Self::TpbcGtSpbc,
            66 => Self::MissingCode,
            67 => Self::InvalidDistance,
            68 => Self::InvalidDht,
            90 => Self::ExternalUe90,
            224 => Self::WatchdogTimer,
            250 => Self::AtFault,
            252 => Self::InterruptServer,
            253 => Self::Ue253,
            254 => Self::NoHardware,
            255 => Self::HungOp,
            other => Self::Unknown(other),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Alignment => 1,
            Self::OperandOverlap => 2,
            Self::DataLength => 3,
            Self::Translation => 5,
            Self::Protection => 6,
            Self::ExternalUe7 => 7,
            Self::InvalidOp => 8,
            Self::Privilege => 9,
            Self::InternalUe => 10,
            Self::ExternalUeWrite => 12,
            Self::TargetSpace => 13,
            Self::ExcessiveDde => 14,
            Self::TranslationWrite => 15,
            Self::ProtectionWrite => 16,
            Self::Subfunction => 17,
            Self::FunctionAbort => 18,
            Self::ByteMax => 19,
            Self::CorruptCrb => 20,
            Self::InvalidCrb => 21,
            Self::InvalidDde => 30,
            Self::SegmentedDdl => 31,
            Self::DdeOverflow => 33,
            Self::TpbcGtSpbc => 64,
            Self::MissingCode => 66,
            Self::InvalidDistance => 67,
            Self::InvalidDht => 68,
            Self::ExternalUe90 => 90,
            Self::WatchdogTimer => 224,
            Self::AtFault => 250,
            Self::InterruptServer => 252,
            Self::Ue253 => 253,
            Self::NoHardware => 254,
            Self::HungOp => 255,
            Self::Unknown(cc) => cc,
        }
    }

    /// Codes that always end in a fault, whatever the extension bits say.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Ok | Self::TargetSpace | Self::TpbcGtSpbc)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::Alignment => "operand alignment error",
            Self::OperandOverlap => "source and target operands overlap",
            Self::DataLength => "invalid data length",
            Self::Translation => "address translation fault",
            Self::Protection => "storage protection violation",
            Self::ExternalUe7 => "uncorrectable error on external bus",
            Self::InvalidOp => "invalid operation",
            Self::Privilege => "privilege violation",
            Self::InternalUe => "internal uncorrectable error",
            Self::ExternalUeWrite => "uncorrectable error writing external memory",
            Self::TargetSpace => "target buffer too small",
            Self::ExcessiveDde => "too many data descriptor elements",
            Self::TranslationWrite => "address translation fault on write",
            Self::ProtectionWrite => "storage protection violation on write",
            Self::Subfunction => "invalid subfunction",
            Self::FunctionAbort => "function aborted",
            Self::ByteMax => "byte count limit exceeded",
            Self::CorruptCrb => "corrupt request block",
            Self::InvalidCrb => "invalid request block",
            Self::InvalidDde => "invalid data descriptor element",
            Self::SegmentedDdl => "segmented descriptor list",
            Self::DdeOverflow => "descriptor byte count overflow",
            Self::TpbcGtSpbc => "compressed output not smaller than input",
            Self::MissingCode => "missing Huffman code in compressed data",
            Self::InvalidDistance => "invalid distance in compressed data",
            Self::InvalidDht => "invalid dynamic Huffman table",
            Self::ExternalUe90 => "external uncorrectable error",
            Self::WatchdogTimer => "watchdog timer expired",
            Self::AtFault => "asynchronous address translation fault",
            Self::InterruptServer => "interrupt server error",
            Self::Ue253 => "uncorrectable error",
            Self::NoHardware => "no accelerator available",
            Self::HungOp => "operation hung",
            Self::Unknown(_) => "undocumented completion code",
        }
    }
}

impl std::fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (cc={})", self.description(), self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Fault taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    /// Reported asynchronously; the direction is unknown.
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UeSource {
    Internal,
    External,
}

/// Classified fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FaultKind {
    /// Status is self-contradictory (e.g. terminated with a success code).
    #[error("corrupted status block")]
    Corrupted,
    /// Completed without an authoritative byte count.
    #[error("indeterminate completion")]
    Indeterminate,
    #[error("alignment error")]
    Alignment,
    #[error("operand overlap")]
    OperandOverlap,
    #[error("data length error")]
    DataLength,
    #[error("address translation fault ({0:?})")]
    AddressTranslation(Access),
    #[error("protection fault ({0:?})")]
    Protection(Access),
    #[error("uncorrectable hardware error ({0:?})")]
    UncorrectableHardware(UeSource),
    #[error("invalid operation")]
    InvalidOperation,
    #[error("invalid subfunction")]
    InvalidSubfunction,
    #[error("privilege violation")]
    PrivilegeViolation,
    #[error("target space exhausted")]
    TargetSpace,
    #[error("function aborted")]
    FunctionAborted,
    #[error("byte count limit exceeded")]
    ByteCountLimit,
    #[error("corrupt request block")]
    CorruptRequestBlock,
    #[error("invalid request block")]
    InvalidRequestBlock,
    #[error("invalid descriptor")]
    InvalidDescriptor,
    #[error("descriptor list too long")]
    DescriptorListTooLong,
    #[error("segmented descriptor list")]
    SegmentedDescriptorList,
    #[error("descriptor overflow")]
    DescriptorOverflow,
    #[error("missing Huffman code")]
    MissingCode,
    #[error("invalid distance")]
    InvalidDistance,
    #[error("invalid Huffman table")]
    InvalidHuffmanTable,
    #[error("watchdog timeout")]
    WatchdogTimeout,
    #[error("interrupt server error")]
    InterruptServer,
    #[error("device unavailable")]
    DeviceUnavailable,
    #[error("operation hung")]
    OperationHung,
    #[error("unknown completion code {0}")]
    Unknown(u8),
}

impl FaultKind {
    /// Kind for a code reported with the terminated bit (or a fatal code).
    pub const fn from_code(code: CompletionCode) -> Self {
        use CompletionCode as C;
        match code {
            C::Ok | C::TpbcGtSpbc => Self::Corrupted,
            C::Alignment => Self::Alignment,
            C::OperandOverlap => Self::OperandOverlap,
            C::DataLength => Self::DataLength,
            C::Translation => Self::AddressTranslation(Access::Read),
            C::TranslationWrite => Self::AddressTranslation(Access::Write),
            C::AtFault => Self::AddressTranslation(Access::Unspecified),
            C::Protection => Self::Protection(Access::Read),
            C::ProtectionWrite => Self::Protection(Access::Write),
            C::ExternalUe7 | C::ExternalUeWrite | C::ExternalUe90 => {
                Self::UncorrectableHardware(UeSource::External)
            }
            C::InternalUe | C::Ue253 => Self::UncorrectableHardware(UeSource::Internal),
            C::InvalidOp => Self::InvalidOperation,
            C::Subfunction => Self::InvalidSubfunction,
            C::Privilege => Self::PrivilegeViolation,
            C::TargetSpace => Self::TargetSpace,
            C::FunctionAbort => Self::FunctionAborted,
            C::ByteMax => Self::ByteCountLimit,
            C::CorruptCrb => Self::CorruptRequestBlock,
            C::InvalidCrb => Self::InvalidRequestBlock,
            C::InvalidDde => Self::InvalidDescriptor,
            C::ExcessiveDde => Self::DescriptorListTooLong,
            C::SegmentedDdl => Self::SegmentedDescriptorList,
            C::DdeOverflow => Self::DescriptorOverflow,
            C::MissingCode => Self::MissingCode,
            C::InvalidDistance => Self::InvalidDistance,
            C::InvalidDht => Self::InvalidHuffmanTable,
            C::WatchdogTimer => Self::WatchdogTimeout,
            C::InterruptServer => Self::InterruptServer,
            C::NoHardware => Self::DeviceUnavailable,
            C::HungOp => Self::OperationHung,
            C::Unknown(cc) => Self::Unknown(cc),
        }
    }

    /// Faults whose status carries a failing storage address.
    pub const fn has_address(self) -> bool {
        matches!(self, Self::AddressTranslation(_) | Self::Protection(_))
    }

    /// Faults caused by corrupt compressed input.
    pub const fn is_data_error(self) -> bool {
        matches!(
            self,
            Self::MissingCode | Self::InvalidDistance | Self::InvalidHuffmanTable
        )
    }
}

/// A fault outcome with whatever the status block could vouch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind}: {code}")]
pub struct Fault {
    pub kind: FaultKind,
    pub code: CompletionCode,
    pub ext: CompletionExt,
    /// Target bytes stored before the fault, when CE says the count is valid.
    pub valid_target_bytes: Option<u32>,
    pub failing_address: Option<u64>,
}

impl Fault {
    pub fn byte_count_valid(&self) -> bool {
        self.valid_target_bytes.is_some()
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Counts and checksums common to successful and suspended jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobSummary {
    /// Source processed byte count.
    pub source_bytes: u32,
    /// Target processed byte count.
    pub target_bytes: u32,
    pub checksums: Checksums,
    /// Valid bits in the last target byte (0 means all eight).
    pub target_ending_bits: u8,
    /// Source bits the device did not process.
    pub unprocessed_bits: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        summary: JobSummary,
        /// Compressed output is not smaller than the input; callers may
        /// prefer to store the data uncompressed.
        expanded: bool,
    },
    Suspended {
        summary: JobSummary,
        resume: ResumeFields,
        /// Why the device stopped (`Ok` for end of input, `TargetSpace`
        /// when the output buffer filled).
        cause: CompletionCode,
    },
    Fault(Fault),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&JobSummary> {
        match self {
            Self::Success { summary, .. } | Self::Suspended { summary, .. } => Some(summary),
            Self::Fault(_) => None,
        }
    }
}

fn fault(c: &Completion, kind: FaultKind) -> Outcome {
    let status = &c.status;
    let failing_address = kind.has_address().then_some(status.fsaddr);
    let valid_target_bytes = status.ext.tpbc_valid().then_some(status.tpbc);
    log::warn!(
        "job {} faulted: {kind} ({}, ce={:?})",
        c.fc,
        status.code,
        status.ext
    );
    Outcome::Fault(Fault {
        kind,
        code: status.code,
        ext: status.ext,
        valid_target_bytes,
        failing_address,
    })
}

fn summary(c: &Completion) -> JobSummary {
    JobSummary {
        source_bytes: c.output.spbc,
        target_bytes: c.status.tpbc,
        checksums: c.output.checksums,
        target_ending_bits: c.output.tebc,
        unprocessed_bits: c.output.subc,
    }
}

/// Classify a decoded completion.
pub fn interpret(c: &Completion) -> Outcome {
    let status = &c.status;
    let ext = status.ext;
    let code = status.code;

    if ext.terminated() || code.is_fatal() {
        return fault(c, FaultKind::from_code(code));
    }

    if ext.partial() {
        return Outcome::Suspended {
            summary: summary(c),
            resume: ResumeFields::from_output(&c.output),
            cause: code,
        };
    }

    match code {
        CompletionCode::TpbcGtSpbc => Outcome::Success {
            summary: summary(c),
            expanded: true,
        },
        // Target space without a partial completion leaves nothing to resume.
        CompletionCode::TargetSpace => fault(c, FaultKind::TargetSpace),
        _ if !ext.tpbc_valid() => fault(c, FaultKind::Indeterminate),
        _ => Outcome::Success {
            summary: summary(c),
            expanded: false,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
