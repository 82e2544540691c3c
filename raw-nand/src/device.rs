use nand_hal::{BlockIndex, ErrorType, NandOps, PageIndex};

use crate::bus::{DmaChannel, NandBus};
use crate::error::RawNandError;
use crate::id::{ChipSpec, MAX_SPARE_SIZE};
use crate::NandChip;

/// Byte of the spare area holding the factory bad-block marker on the
/// first two pages of each block
const BAD_BLOCK_MARKER: usize = 0;

/// A raw NAND chip behind a phase transport and a pair of offload
/// channels.
///
/// This type owns everything one chip-enable needs: the bus `B`, the chip
/// definition `D` (protocol constants), and the read- and write-direction
/// offload channel handles `R` and `W`. The geometry starts as
/// [NandChip::FALLBACK_SPEC] and is resolved once by
/// [RawNandDevice::identify].
///
/// All operations are synchronous busy-polling calls; the caller
/// serializes access per chip. When the chip definition selects
/// asynchronous completion, program and erase leave a single-slot pending
/// operation behind that [RawNandDevice::sync] drains.
pub struct RawNandDevice<B, D, R, W> {
    pub bus: B,
    pub chip: D,
    pub(crate) read_channel: R,
    pub(crate) write_channel: W,
    pub(crate) spec: ChipSpec,
    pub(crate) pending: Option<Pending>,
    pub(crate) identified: bool,
}

/// The single-slot in-flight operation of asynchronous completion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    Program,
    Erase,
}

impl Pending {
    pub(crate) fn failure<BE>(self) -> RawNandError<BE> {
        match self {
            Pending::Program => RawNandError::ProgramFailed,
            Pending::Erase => RawNandError::EraseFailed,
        }
    }
}

impl<B, D: NandChip, R, W> RawNandDevice<B, D, R, W> {
    /// Create a device with the fallback geometry. Call
    /// [RawNandDevice::identify] once before regular operation.
    pub fn new(bus: B, chip: D, read_channel: R, write_channel: W) -> Self {
        RawNandDevice {
            bus,
            chip,
            read_channel,
            write_channel,
            spec: D::FALLBACK_SPEC,
            pending: None,
            identified: false,
        }
    }

    /// Create a device with a known geometry, skipping identification.
    pub fn with_spec(bus: B, chip: D, read_channel: R, write_channel: W, spec: ChipSpec) -> Self {
        RawNandDevice {
            bus,
            chip,
            read_channel,
            write_channel,
            spec,
            pending: None,
            identified: true,
        }
    }

    /// The geometry in effect.
    pub fn spec(&self) -> &ChipSpec {
        &self.spec
    }
}

impl<B, D, R, W> RawNandDevice<B, D, R, W>
where
    B: NandBus,
    D: NandChip,
    R: DmaChannel,
    W: DmaChannel,
{
    /// Classify a block by its factory bad-block markers.
    ///
    /// The marker byte lives in the spare area of the first two pages of
    /// each block. Any read failure or any marker other than the erased
    /// value means the block is bad; a bad first page settles the answer
    /// without reading the second.
    pub fn is_bad_block(&mut self, block: BlockIndex) -> Result<bool, RawNandError<B::Error>> {
        let spare_len = self.spec.spare_size as usize;
        let mut spare = [0xFF_u8; MAX_SPARE_SIZE];

        for page in 0..2 {
            let read = self.read_page(block, PageIndex::new(page), None, Some(&mut spare[..spare_len]));
            match read {
                Ok(()) => {
                    if spare[BAD_BLOCK_MARKER] != 0xFF {
                        debug!("block {} marked bad on page {}", block.as_u32(), page);
                        return Ok(true);
                    }
                }
                Err(_) => {
                    debug!("block {} unreadable, treating as bad", block.as_u32());
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl<B, D, R, W> ErrorType for RawNandDevice<B, D, R, W>
where
    B: NandBus,
{
    type Error = RawNandError<B::Error>;
}

impl<B, D, R, W> NandOps for RawNandDevice<B, D, R, W>
where
    B: NandBus,
    D: NandChip,
    R: DmaChannel,
    W: DmaChannel,
{
    fn read_page(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        data: Option<&mut [u8]>,
        spare: Option<&mut [u8]>,
    ) -> Result<(), Self::Error> {
        RawNandDevice::read_page(self, block, page, data, spare)
    }

    fn read_bytes(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        RawNandDevice::read_bytes(self, block, page, buf)
    }

    fn write_page(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        data: Option<&[u8]>,
        spare: Option<&[u8]>,
    ) -> Result<(), Self::Error> {
        RawNandDevice::write_page(self, block, page, data, spare)
    }

    fn write_bytes(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), Self::Error> {
        RawNandDevice::write_bytes(self, block, page, buf)
    }

    fn erase(&mut self, block: BlockIndex) -> Result<(), Self::Error> {
        RawNandDevice::erase(self, block)
    }

    fn is_bad_block(&mut self, block: BlockIndex) -> Result<bool, Self::Error> {
        RawNandDevice::is_bad_block(self, block)
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        RawNandDevice::sync(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDma, SimNand};
    use core::cell::RefCell;
    use nand_hal::NandOpsError;
    use test_log::test;

    const PAGE: usize = 272;
    const DATA: usize = 256;
    const SPARE: usize = 16;
    const PPB: usize = 4;
    const BLOCKS: usize = 8;

    type Chip = SimNand<PAGE, DATA, PPB, BLOCKS>;
    type Bus<'a> = SimBus<'a, PAGE, DATA, PPB, BLOCKS>;
    type Dma<'a> = SimDma<'a, PAGE, DATA, PPB, BLOCKS>;

    struct TestChip;
    impl NandChip for TestChip {
        const ASYNC_COMPLETION: bool = false;
        const READY_POLL_BUDGET: u32 = 64;
        const READ_SETTLE_CYCLES: u32 = 0;
    }

    fn sim_spec() -> ChipSpec {
        ChipSpec {
            data_size: DATA as u32,
            spare_size: SPARE as u32,
            page_size: PAGE as u32,
            sectors_per_page: 1,
            pages_per_block: PPB as u32,
            block_size: (DATA * PPB) as u32,
            num_blocks: BLOCKS as u32,
            num_dies_per_ce: 1,
            num_planes: 1,
            max_bad_blocks: 1,
        }
    }

    fn device(chip: &RefCell<Chip>) -> RawNandDevice<Bus<'_>, TestChip, Dma<'_>, Dma<'_>> {
        RawNandDevice::with_spec(
            SimBus::new(chip),
            TestChip,
            SimDma::reader(chip).with_floor(usize::MAX),
            SimDma::writer(chip).with_floor(usize::MAX),
            sim_spec(),
        )
    }

    #[test]
    fn pristine_blocks_scan_good() {
        let chip = RefCell::new(Chip::new([0; 5]));
        let mut dev = device(&chip);

        assert!(!dev.is_bad_block(BlockIndex::new(3)).unwrap());
        // Both marker pages were inspected
        assert_eq!(chip.borrow().stats.page_reads, 2);
    }

    #[test]
    fn first_page_marker_settles_the_scan() {
        let chip = RefCell::new(Chip::new([0; 5]));
        chip.borrow_mut().page_mut(3, 0)[DATA + BAD_BLOCK_MARKER] = 0x00;
        let mut dev = device(&chip);

        assert!(dev.is_bad_block(BlockIndex::new(3)).unwrap());
        // Page 1 was never read
        assert_eq!(chip.borrow().stats.page_reads, 1);
    }

    #[test]
    fn second_page_marker_is_checked_too() {
        let chip = RefCell::new(Chip::new([0; 5]));
        chip.borrow_mut().page_mut(3, 1)[DATA + BAD_BLOCK_MARKER] = 0xAB;
        let mut dev = device(&chip);

        assert!(dev.is_bad_block(BlockIndex::new(3)).unwrap());
        assert_eq!(chip.borrow().stats.page_reads, 2);
    }

    #[test]
    fn unreadable_blocks_scan_bad() {
        let chip = RefCell::new(Chip::new([0; 5]));
        chip.borrow_mut().force_busy(1000);
        let mut dev = device(&chip);

        // The ready-line timeout classifies the block, it does not escape
        assert!(dev.is_bad_block(BlockIndex::new(0)).unwrap());
    }

    #[test]
    fn operation_table_drives_the_device() {
        fn exercise<T: NandOps>(dev: &mut T, data: &[u8], out: &mut [u8]) -> Result<bool, T::Error> {
            dev.open()?;
            dev.erase(BlockIndex::new(1))?;
            dev.write_page(BlockIndex::new(1), PageIndex::new(2), Some(data), None)?;
            dev.sync()?;
            dev.read_page(BlockIndex::new(1), PageIndex::new(2), Some(out), None)?;
            let bad = dev.is_bad_block(BlockIndex::new(1))?;
            dev.close()?;
            Ok(bad)
        }

        let chip = RefCell::new(Chip::new([0; 5]));
        let mut dev = device(&chip);
        let data = [0x5A_u8; DATA];
        let mut out = [0u8; DATA];

        let bad = exercise(&mut dev, &data, &mut out).unwrap();
        assert!(!bad);
        assert_eq!(out, data);
    }

    #[test]
    fn op_errors_expose_generic_kinds() {
        let chip = RefCell::new(Chip::new([0; 5]));
        let mut dev = device(&chip);

        let err = dev.read_page(BlockIndex::new(0), PageIndex::new(0), None, None).unwrap_err();
        assert_eq!(err.kind(), nand_hal::NandOpsErrorKind::InvalidArgument);
    }
}
