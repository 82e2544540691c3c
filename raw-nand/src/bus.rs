//! Downward transport seams of the driver.
//!
//! [NandBus] is the raw phase transport: a memory-controller mapping of the
//! chip's command latch, address latch and data port, plus the ready/busy
//! line and the controller's hardware ECC accumulator. [DmaChannel] is an
//! owned handle to one direction of the offload engine. Both are provided
//! by the platform; the driver core never touches registers itself.

use core::fmt::Debug;

/// Raw phase transport for one chip-enable.
///
/// Implementations map the phases onto fixed device addresses (command
/// write, address write, data read/write). The word accessors move four
/// consecutive data-phase bytes in one bus cycle, least-significant byte
/// first; the driver uses them for the aligned bulk of direct transfers.
///
/// The ECC accumulator is controller hardware that folds every data-phase
/// byte into a parity word while enabled. Enabling it resets the
/// accumulated value.
pub trait NandBus {
    type Error: Debug;

    /// Write one byte to the command latch
    fn write_command(&mut self, op: u8) -> Result<(), Self::Error>;
    /// Write one address cycle
    fn write_address(&mut self, cycle: u8) -> Result<(), Self::Error>;
    /// Read one byte from the data port
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
    /// Write one byte to the data port
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
    /// Read four data bytes in one bus word
    fn read_word(&mut self) -> Result<u32, Self::Error>;
    /// Write four data bytes in one bus word
    fn write_word(&mut self, word: u32) -> Result<(), Self::Error>;

    /// Level of the ready/busy line (true = ready)
    fn is_ready(&mut self) -> Result<bool, Self::Error>;

    /// Reset and start the hardware ECC accumulator
    fn ecc_enable(&mut self) -> Result<(), Self::Error>;
    /// Freeze the hardware ECC accumulator
    fn ecc_disable(&mut self) -> Result<(), Self::Error>;
    /// Current accumulator value
    fn ecc_value(&mut self) -> Result<u32, Self::Error>;
}

/// Beat width of an offload transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum XferWidth {
    Byte,
    Word,
}

/// Lowest host address the offload engine can reach by default.
///
/// Matches the usual SoC layout where only main SRAM is visible to the
/// engine; buffers below this line (flash, core-coupled memory) must take
/// the direct path.
pub const OFFLOAD_FLOOR: usize = 0x2000_0000;

/// One direction of the offload engine, owned by the driver.
///
/// The peripheral side of the channel (the chip's data port address and
/// the transfer direction) is fixed when the handle is constructed; per
/// transfer only the host buffer, beat count and beat width are
/// reprogrammed. A channel is a singleton hardware resource: it must be
/// fully quiesced (`is_active` false) before it is armed again.
pub trait DmaChannel {
    /// Whether the engine can reach the given host address
    fn reaches(&self, addr: usize) -> bool {
        addr >= OFFLOAD_FLOOR
    }

    /// Whether the engine still owns the channel
    fn is_active(&mut self) -> bool;

    /// Clear the transfer-complete flag of a finished transfer
    fn clear_complete(&mut self);

    /// Program the host buffer, beat count and beat width, then start
    fn arm(&mut self, buf: *mut u8, beats: u32, width: XferWidth);

    /// Whether the transfer-complete flag is raised
    fn is_complete(&mut self) -> bool;
}
