#![no_std]
// Must be first to share macros across crate
pub(crate) mod fmt;

pub mod bus;
mod cmd_blocking;
mod device;
pub mod ecc;
pub mod error;
pub mod id;
pub mod sim;
mod xfer;

pub use device::RawNandDevice;
pub use ecc::EccStatus;
pub use id::{ChipSpec, NandId};

/// Core trait that a raw (parallel-bus) NAND flash chip must implement.
///
/// Carries the per-chip protocol constants: the command opcodes sequenced
/// over the command phase, the status register bits, the polling budgets
/// and the build-time behavior switches. The defaults match large-page
/// SLC devices; override individual constants for chips that deviate.
///
/// The chip geometry is deliberately *not* part of this trait: it is
/// resolved at startup from the identification record (see
/// [crate::id::ChipSpec::from_id]) and only [NandChip::FALLBACK_SPEC] is
/// assumed until then.
pub trait NandChip {
    // Commands
    /// First cycle of the page read sequence
    const CMD_READ: u8 = 0x00;
    /// Confirm cycle that starts the array-to-register transfer
    const CMD_READ_CONFIRM: u8 = 0x30;
    /// Reposition the output column within the page register
    const CMD_RANDOM_OUT: u8 = 0x05;
    const CMD_RANDOM_OUT_CONFIRM: u8 = 0xE0;
    /// First cycle of the page program sequence
    const CMD_PROGRAM: u8 = 0x80;
    /// Reposition the input column within the program register
    const CMD_RANDOM_IN: u8 = 0x85;
    const CMD_PROGRAM_CONFIRM: u8 = 0x10;
    /// First cycle of the block erase sequence
    const CMD_ERASE: u8 = 0x60;
    const CMD_ERASE_CONFIRM: u8 = 0xD0;
    /// Read the status register
    const CMD_STATUS: u8 = 0x70;
    /// Read the identification record
    const CMD_READ_ID: u8 = 0x90;
    /// Reset the chip
    const CMD_RESET: u8 = 0xFF;

    // Status register bits
    /// Set when the device is ready for the next command
    const STATUS_READY: u8 = 0x40;
    /// Set when the last program/erase operation failed
    const STATUS_FAIL: u8 = 0x01;

    // Behavior switches
    /// Program and erase return right after the confirm command; the
    /// caller drains the deferred status with `sync`. At most one such
    /// operation may be outstanding per chip.
    const ASYNC_COMPLETION: bool = true;
    /// The memory controller computes single-bit ECC over the data area
    /// and the driver stores/checks the parity in the spare area.
    const HARDWARE_ECC: bool = true;

    // Polling budgets
    /// Status-read iterations before a completion poll reports a timeout
    const STATUS_POLL_BUDGET: u32 = 2;
    /// Ready-line polls before a busy-wait reports a timeout
    const READY_POLL_BUDGET: u32 = 0x0100_0000;
    /// Spin cycles between the ready edge and the first data cycle
    const READ_SETTLE_CYCLES: u32 = 5;

    /// Geometry assumed until identification has run
    const FALLBACK_SPEC: ChipSpec = ChipSpec::FALLBACK;
}
