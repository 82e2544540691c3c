#![no_std]

mod address;
pub use address::{BlockIndex, ColumnAddress, PageIndex, RowAddress};

pub trait NandOpsError {
    /// Convert a specific driver error into a generic error kind
    fn kind(&self) -> NandOpsErrorKind;
}

/// A trait that [NandOps] implementations can use to share an error type.
pub trait ErrorType {
    /// Errors returned by this NAND driver.
    type Error: NandOpsError;
}

/// Generic NAND driver error kinds.
///
/// Driver implementations must map their error to those generic error kinds
/// through the [`NandOpsError`] trait so that the flash-management host can
/// act on outcomes without knowing the transport.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum NandOpsErrorKind {
    /// The arguments are malformed (missing buffer, undersized transfer).
    /// No device phase has been issued.
    InvalidArgument,

    /// The addressed block or page is outside the resolved geometry.
    OutOfBounds,

    /// The device busy-wait or status poll exceeded its iteration budget.
    Timeout,

    /// The offload (DMA) path failed to start or complete within budget.
    TransferTimeout,

    /// The device status register reported a failed program operation.
    Write,

    /// The device status register reported a failed erase operation.
    Erase,

    /// Data could not be reconstructed by the error-correcting code.
    Ecc,

    /// Error specific to the implementation.
    Other,
}

/// The operation table a raw NAND low-level driver exposes to the
/// flash-management host.
///
/// Addressing is page/block granular: `block` selects an erase block and
/// `page` a page within that block. Buffer-carrying operations transfer
/// whole data and/or spare areas as resolved from the chip geometry.
///
/// Callers serialize access per chip; no operation may be invoked
/// concurrently for the same chip from two contexts.
pub trait NandOps: ErrorType {
    /// Prepare the chip for use. Trivial for drivers without a power state.
    fn open(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Release the chip. Trivial for drivers without a power state.
    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Read the data area and/or the spare area of one page.
    ///
    /// At least one buffer must be given. `data` must hold the chip's data
    /// size, `spare` the chip's spare size. Error correction applies to the
    /// data area when the driver is built with hardware ECC.
    fn read_page(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        data: Option<&mut [u8]>,
        spare: Option<&mut [u8]>,
    ) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes from the start of a page, bypassing ECC and
    /// the spare area. The length must be at least the minimum transfer
    /// granularity of 4 bytes.
    fn read_bytes(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        buf: &mut [u8],
    ) -> Result<(), Self::Error>;

    /// Program the data area and/or the spare area of one page.
    ///
    /// At least one buffer must be given. With hardware ECC the computed
    /// parity is stored in the spare area; an omitted spare area is written
    /// as erased (0xFF) bytes plus parity.
    fn write_page(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        data: Option<&[u8]>,
        spare: Option<&[u8]>,
    ) -> Result<(), Self::Error>;

    /// Program `buf.len()` bytes at the start of a page, bypassing ECC and
    /// the spare area. The length must be at least 4 bytes.
    fn write_bytes(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), Self::Error>;

    /// Erase one block.
    fn erase(&mut self, block: BlockIndex) -> Result<(), Self::Error>;

    /// Check the factory bad-block markers of a block.
    fn is_bad_block(&mut self, block: BlockIndex) -> Result<bool, Self::Error>;

    /// Drain the outstanding asynchronous program/erase operation, if any.
    ///
    /// Only meaningful for drivers built with asynchronous completion; the
    /// default is a no-op for synchronous builds.
    fn sync(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
