use core::fmt::Debug;
use nand_hal::{NandOpsError, NandOpsErrorKind};

use crate::xfer::XferError;

/// Error type for the raw NAND driver.
///
/// Generic over the bus error type (BE) so platforms can surface their
/// transport failures unchanged. Protocol-level timeouts, transfer-level
/// timeouts and device-reported failures stay distinct; the host can map
/// them to generic kinds through [NandOpsError].
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RawNandError<BE> {
    /// Error from the phase transport
    #[error("bus error: {0}")]
    Bus(BE),
    /// Missing buffer or undersized transfer. No device phase was issued.
    #[error("invalid argument")]
    InvalidArgument,
    /// Block or page outside the resolved geometry. No device phase was
    /// issued.
    #[error("address out of bounds")]
    OutOfBounds,
    /// Ready-line busy-wait or status poll exceeded its iteration budget
    #[error("device timeout")]
    Timeout,
    /// The offload engine failed to start or to complete within budget
    #[error("offload transfer timeout")]
    TransferTimeout,
    /// The device reported a failed page program
    #[error("program failed")]
    ProgramFailed,
    /// The device reported a failed block erase
    #[error("erase failed")]
    EraseFailed,
    /// Data could not be reconstructed, not even against the redundant
    /// parity copy
    #[error("uncorrectable ECC error")]
    EccError,
    /// An asynchronous program/erase is still outstanding; `sync` first
    #[error("operation in flight")]
    Busy,
}

// Convert to the generic kinds consumed by the flash-management host
impl<BE: Debug> NandOpsError for RawNandError<BE> {
    fn kind(&self) -> NandOpsErrorKind {
        match self {
            RawNandError::Bus(_) => NandOpsErrorKind::Other,
            RawNandError::InvalidArgument => NandOpsErrorKind::InvalidArgument,
            RawNandError::OutOfBounds => NandOpsErrorKind::OutOfBounds,
            RawNandError::Timeout => NandOpsErrorKind::Timeout,
            RawNandError::TransferTimeout => NandOpsErrorKind::TransferTimeout,
            RawNandError::ProgramFailed => NandOpsErrorKind::Write,
            RawNandError::EraseFailed => NandOpsErrorKind::Erase,
            RawNandError::EccError => NandOpsErrorKind::Ecc,
            RawNandError::Busy => NandOpsErrorKind::Other,
        }
    }
}

impl<BE> From<XferError<BE>> for RawNandError<BE> {
    fn from(err: XferError<BE>) -> Self {
        match err {
            XferError::Bus(e) => RawNandError::Bus(e),
            XferError::Timeout => RawNandError::TransferTimeout,
        }
    }
}
