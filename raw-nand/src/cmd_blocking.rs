//! The command/protocol engine.
//!
//! Every operation here turns a logical (block, page, buffer) request into
//! the chip's command/address/data phase sequence and reports one outcome.
//! Invalid arguments fail before the first phase; once a sequence has
//! started it runs to completion or to a bounded timeout.

use nand_hal::{BlockIndex, ColumnAddress, PageIndex, RowAddress};

use crate::bus::{DmaChannel, NandBus};
use crate::device::{Pending, RawNandDevice};
use crate::ecc::{self, EccStatus};
use crate::error::RawNandError;
use crate::id::{ChipSpec, NandId, MAX_SPARE_SIZE};
use crate::xfer;
use crate::NandChip;

/// Minimum physical transfer granularity of the byte-level operations
const MIN_TRANSFER: usize = 4;

/// The two terminal states a completion poll can observe.
enum DeviceStatus {
    Ready,
    Failed,
}

fn settle(cycles: u32) {
    for _ in 0..cycles {
        core::hint::spin_loop();
    }
}

impl<B, D, R, W> RawNandDevice<B, D, R, W>
where
    B: NandBus,
    D: NandChip,
    R: DmaChannel,
    W: DmaChannel,
{
    fn cmd(&mut self, op: u8) -> Result<(), RawNandError<B::Error>> {
        self.bus.write_command(op).map_err(RawNandError::Bus)
    }

    fn addr_cycles(&mut self, cycles: &[u8]) -> Result<(), RawNandError<B::Error>> {
        for cycle in cycles {
            self.bus.write_address(*cycle).map_err(RawNandError::Bus)?;
        }
        Ok(())
    }

    /// Busy-wait on the ready line, bounded by the chip's poll budget.
    fn wait_ready(&mut self) -> Result<(), RawNandError<B::Error>> {
        let mut budget = D::READY_POLL_BUDGET;
        while !self.bus.is_ready().map_err(RawNandError::Bus)? {
            budget -= 1;
            if budget == 0 {
                return Err(RawNandError::Timeout);
            }
        }
        Ok(())
    }

    /// Poll the status register until it reports ready or failed.
    ///
    /// Budget exhaustion is a timeout, distinct from a device-reported
    /// failure.
    fn poll_status(&mut self) -> Result<DeviceStatus, RawNandError<B::Error>> {
        self.wait_ready()?;

        for _ in 0..D::STATUS_POLL_BUDGET {
            self.cmd(D::CMD_STATUS)?;
            let status = self.bus.read_byte().map_err(RawNandError::Bus)?;

            if status & D::STATUS_FAIL != 0 {
                return Ok(DeviceStatus::Failed);
            }
            if status & D::STATUS_READY != 0 {
                return Ok(DeviceStatus::Ready);
            }
        }
        Err(RawNandError::Timeout)
    }

    /// Apply the completion policy to a just-confirmed program/erase.
    fn complete(&mut self, kind: Pending) -> Result<(), RawNandError<B::Error>> {
        if D::ASYNC_COMPLETION {
            self.pending = Some(kind);
            return Ok(());
        }
        match self.poll_status()? {
            DeviceStatus::Ready => Ok(()),
            DeviceStatus::Failed => Err(kind.failure()),
        }
    }

    /// Reject new phase sequences while an asynchronous operation is
    /// outstanding.
    fn ensure_idle(&self) -> Result<(), RawNandError<B::Error>> {
        if self.pending.is_some() {
            return Err(RawNandError::Busy);
        }
        Ok(())
    }

    fn check_bounds(&self, block: BlockIndex, page: PageIndex) -> Result<(), RawNandError<B::Error>> {
        if block.as_u32() >= self.spec.num_blocks
            || page.as_u16() as u32 >= self.spec.pages_per_block
        {
            return Err(RawNandError::OutOfBounds);
        }
        Ok(())
    }

    /// Send the reset command. Fire and forget: the caller waits for the
    /// ready line separately, and a reset failure only shows up in a later
    /// status read.
    pub fn reset(&mut self) -> Result<(), RawNandError<B::Error>> {
        self.cmd(D::CMD_RESET)
    }

    /// Read the five-byte identification record.
    fn read_id(&mut self) -> Result<NandId, RawNandError<B::Error>> {
        self.cmd(D::CMD_READ_ID)?;
        self.addr_cycles(&[0x00])?;

        let mut raw = [0u8; 5];
        for byte in raw.iter_mut() {
            *byte = self.bus.read_byte().map_err(RawNandError::Bus)?;
        }
        Ok(NandId::from_bytes(raw))
    }

    /// Reset the chip, read its identification record and resolve the
    /// geometry.
    ///
    /// Runs exactly once per chip at startup; the resolved geometry is
    /// read-only afterwards and a second call is rejected.
    pub fn identify(&mut self) -> Result<&ChipSpec, RawNandError<B::Error>> {
        if self.identified {
            return Err(RawNandError::InvalidArgument);
        }

        self.reset()?;
        self.wait_ready()?;

        let id = self.read_id()?;
        match id.device_name() {
            Some(name) => info!("NAND flash: {}", name),
            None => info!(
                "NAND flash: unknown device (maker {}, device {})",
                id.maker, id.device
            ),
        }

        self.spec = ChipSpec::from_id(&id);
        info!(
            "geometry: {} + {} byte pages, {} pages/block, {} blocks, {} plane(s)",
            self.spec.data_size,
            self.spec.spare_size,
            self.spec.pages_per_block,
            self.spec.num_blocks,
            self.spec.num_planes
        );

        self.identified = true;
        Ok(&self.spec)
    }

    /// Read the data area and/or the spare area of one page.
    ///
    /// With hardware ECC in effect the data area is checked against the
    /// stored parity; a damaged primary parity word is retried once
    /// against the redundant copy before the read is declared
    /// uncorrectable.
    pub fn read_page(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        data: Option<&mut [u8]>,
        spare: Option<&mut [u8]>,
    ) -> Result<(), RawNandError<B::Error>> {
        if data.is_none() && spare.is_none() {
            return Err(RawNandError::InvalidArgument);
        }
        let data_len = self.spec.data_size as usize;
        let spare_len = self.spec.spare_size as usize;
        if data.as_ref().is_some_and(|b| b.len() < data_len)
            || spare.as_ref().is_some_and(|b| b.len() < spare_len)
        {
            return Err(RawNandError::InvalidArgument);
        }
        self.check_bounds(block, page)?;
        self.ensure_idle()?;

        trace!("read page (block = {}, page = {})", block.as_u32(), page.as_u16());

        let column = if data.is_some() {
            ColumnAddress::DATA
        } else {
            ColumnAddress::SPARE
        };
        let row = RowAddress::new(block, page, self.spec.pages_per_block);

        self.cmd(D::CMD_READ)?;
        self.addr_cycles(&column.cycles())?;
        self.addr_cycles(&row.cycles())?;
        self.cmd(D::CMD_READ_CONFIRM)?;

        self.wait_ready()?;
        settle(D::READ_SETTLE_CYCLES);

        let mut scratch = [0xFF_u8; MAX_SPARE_SIZE];

        match data {
            Some(data) => {
                let data = &mut data[..data_len];

                if D::HARDWARE_ECC {
                    self.bus.ecc_enable().map_err(RawNandError::Bus)?;
                }
                xfer::data_read(&mut self.bus, &mut self.read_channel, data)?;
                let ecc_calc = if D::HARDWARE_ECC {
                    let calc = self.bus.ecc_value().map_err(RawNandError::Bus)? ^ 0xFFFF_FFFF;
                    self.bus.ecc_disable().map_err(RawNandError::Bus)?;
                    Some(calc)
                } else {
                    None
                };

                // The spare area is fetched when the caller asked for it,
                // and also when the stored parity is needed
                let spare = match spare {
                    Some(spare) => Some(&mut spare[..spare_len]),
                    None if D::HARDWARE_ECC => Some(&mut scratch[..spare_len]),
                    None => None,
                };
                if let Some(spare) = spare {
                    self.cmd(D::CMD_RANDOM_OUT)?;
                    self.addr_cycles(&ColumnAddress::SPARE.cycles())?;
                    self.cmd(D::CMD_RANDOM_OUT_CONFIRM)?;
                    settle(D::READ_SETTLE_CYCLES);

                    xfer::data_read(&mut self.bus, &mut self.read_channel, spare)?;

                    if let Some(calc) = ecc_calc {
                        Self::check_ecc(block, page, calc, spare, data)?;
                    }
                }
            }
            None => {
                // Spare-only read: the column already points at the spare
                // area
                if let Some(spare) = spare {
                    xfer::data_read(&mut self.bus, &mut self.read_channel, &mut spare[..spare_len])?;
                }
            }
        }

        Ok(())
    }

    /// Compare the computed parity against the stored one, correcting the
    /// data in place where possible.
    fn check_ecc(
        block: BlockIndex,
        page: PageIndex,
        ecc_calc: u32,
        spare: &[u8],
        data: &mut [u8],
    ) -> Result<(), RawNandError<B::Error>> {
        let mut ecc_read = ecc::stored_parity(spare, ecc::PARITY_OFFSET);
        let mut retried = false;

        loop {
            if ecc_calc == ecc_read {
                return Ok(());
            }
            match ecc::correct_data(ecc_calc, ecc_read, data) {
                EccStatus::Ok => return Ok(()),
                EccStatus::Corrected => {
                    info!(
                        "ECC correction ok (block = {}, page = {})",
                        block.as_u32(),
                        page.as_u16()
                    );
                    return Ok(());
                }
                EccStatus::ParityError if !retried => {
                    // The parity word itself is damaged; try the copy once
                    retried = true;
                    warn!(
                        "stored ECC damaged, trying the copy (block = {}, page = {})",
                        block.as_u32(),
                        page.as_u16()
                    );
                    ecc_read = ecc::stored_parity(spare, ecc::PARITY_COPY_OFFSET);
                }
                _ => {
                    error!(
                        "uncorrectable ECC error (block = {}, page = {})",
                        block.as_u32(),
                        page.as_u16()
                    );
                    return Err(RawNandError::EccError);
                }
            }
        }
    }

    /// Read `buf.len()` bytes from the start of a page. No spare handling,
    /// no ECC.
    pub fn read_bytes(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        buf: &mut [u8],
    ) -> Result<(), RawNandError<B::Error>> {
        if buf.len() < MIN_TRANSFER {
            return Err(RawNandError::InvalidArgument);
        }
        self.check_bounds(block, page)?;
        self.ensure_idle()?;

        let row = RowAddress::new(block, page, self.spec.pages_per_block);

        self.cmd(D::CMD_READ)?;
        self.addr_cycles(&ColumnAddress::DATA.cycles())?;
        self.addr_cycles(&row.cycles())?;
        self.cmd(D::CMD_READ_CONFIRM)?;

        self.wait_ready()?;
        settle(D::READ_SETTLE_CYCLES);

        xfer::data_read(&mut self.bus, &mut self.read_channel, buf)?;
        Ok(())
    }

    /// Program the data area and/or the spare area of one page.
    ///
    /// With hardware ECC the computed parity lands in both parity slots of
    /// the spare image before the spare transfer. An omitted spare area is
    /// programmed as erased bytes (plus parity), so unwritten spare bytes
    /// read back as 0xFF.
    pub fn write_page(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        data: Option<&[u8]>,
        spare: Option<&[u8]>,
    ) -> Result<(), RawNandError<B::Error>> {
        if data.is_none() && spare.is_none() {
            return Err(RawNandError::InvalidArgument);
        }
        let data_len = self.spec.data_size as usize;
        let spare_len = self.spec.spare_size as usize;
        if data.is_some_and(|b| b.len() < data_len)
            || spare.is_some_and(|b| b.len() < spare_len)
        {
            return Err(RawNandError::InvalidArgument);
        }
        self.check_bounds(block, page)?;
        self.ensure_idle()?;

        trace!("program page (block = {}, page = {})", block.as_u32(), page.as_u16());

        let column = if data.is_some() {
            ColumnAddress::DATA
        } else {
            ColumnAddress::SPARE
        };
        let row = RowAddress::new(block, page, self.spec.pages_per_block);

        self.cmd(D::CMD_PROGRAM)?;
        self.addr_cycles(&column.cycles())?;
        self.addr_cycles(&row.cycles())?;

        // The spare image is staged on the stack; the caller's slice is
        // never written to
        let mut image = [0xFF_u8; MAX_SPARE_SIZE];
        if let Some(spare) = spare {
            image[..spare_len].copy_from_slice(&spare[..spare_len]);
        }

        match data {
            Some(data) => {
                let data = &data[..data_len];

                if D::HARDWARE_ECC {
                    self.bus.ecc_enable().map_err(RawNandError::Bus)?;
                }
                xfer::data_write(&mut self.bus, &mut self.write_channel, data)?;
                if D::HARDWARE_ECC {
                    let calc = self.bus.ecc_value().map_err(RawNandError::Bus)? ^ 0xFFFF_FFFF;
                    self.bus.ecc_disable().map_err(RawNandError::Bus)?;
                    ecc::store_parity(&mut image[..spare_len], calc);
                }

                if spare.is_some() || D::HARDWARE_ECC {
                    self.cmd(D::CMD_RANDOM_IN)?;
                    self.addr_cycles(&ColumnAddress::SPARE.cycles())?;
                    xfer::data_write(&mut self.bus, &mut self.write_channel, &image[..spare_len])?;
                }
            }
            None => {
                // Spare-only program: the column already points at the
                // spare area
                xfer::data_write(&mut self.bus, &mut self.write_channel, &image[..spare_len])?;
            }
        }

        self.cmd(D::CMD_PROGRAM_CONFIRM)?;
        self.complete(Pending::Program)
    }

    /// Program `buf.len()` bytes at the start of a page. No spare
    /// handling, no ECC.
    pub fn write_bytes(
        &mut self,
        block: BlockIndex,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), RawNandError<B::Error>> {
        if buf.len() < MIN_TRANSFER {
            return Err(RawNandError::InvalidArgument);
        }
        self.check_bounds(block, page)?;
        self.ensure_idle()?;

        let row = RowAddress::new(block, page, self.spec.pages_per_block);

        self.cmd(D::CMD_PROGRAM)?;
        self.addr_cycles(&ColumnAddress::DATA.cycles())?;
        self.addr_cycles(&row.cycles())?;

        xfer::data_write(&mut self.bus, &mut self.write_channel, buf)?;

        self.cmd(D::CMD_PROGRAM_CONFIRM)?;
        self.complete(Pending::Program)
    }

    /// Erase one block.
    pub fn erase(&mut self, block: BlockIndex) -> Result<(), RawNandError<B::Error>> {
        if block.as_u32() >= self.spec.num_blocks {
            return Err(RawNandError::OutOfBounds);
        }
        self.ensure_idle()?;

        trace!("erase block {}", block.as_u32());

        let row = RowAddress::block_start(block, self.spec.pages_per_block);

        self.cmd(D::CMD_ERASE)?;
        self.addr_cycles(&row.cycles())?;
        self.cmd(D::CMD_ERASE_CONFIRM)?;

        self.complete(Pending::Erase)
    }

    /// Drain the outstanding asynchronous program/erase, reporting its
    /// deferred status. A no-op when nothing is outstanding.
    pub fn sync(&mut self) -> Result<(), RawNandError<B::Error>> {
        let kind = match self.pending.take() {
            Some(kind) => kind,
            None => return Ok(()),
        };
        match self.poll_status()? {
            DeviceStatus::Ready => Ok(()),
            DeviceStatus::Failed => Err(kind.failure()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimDma, SimNand};
    use core::cell::RefCell;
    use test_log::test;

    const PAGE: usize = 272;
    const DATA: usize = 256;
    const SPARE: usize = 16;
    const PPB: usize = 4;
    const BLOCKS: usize = 8;

    type Chip = SimNand<PAGE, DATA, PPB, BLOCKS>;
    type Bus<'a> = SimBus<'a, PAGE, DATA, PPB, BLOCKS>;
    type Dma<'a> = SimDma<'a, PAGE, DATA, PPB, BLOCKS>;

    const K9F1G08U0A_ID: [u8; 5] = [0xEC, 0xF1, 0x80, 0x15, 0x40];

    /// Completion polled before program/erase return
    struct SyncChip;
    impl NandChip for SyncChip {
        const ASYNC_COMPLETION: bool = false;
        const READY_POLL_BUDGET: u32 = 64;
        const READ_SETTLE_CYCLES: u32 = 0;
    }

    /// Deferred completion, drained by sync()
    struct AsyncChip;
    impl NandChip for AsyncChip {
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

    fn chip() -> RefCell<Chip> {
        RefCell::new(Chip::new(K9F1G08U0A_ID))
    }

    fn device<D: NandChip>(
        chip: &RefCell<Chip>,
        def: D,
    ) -> RawNandDevice<Bus<'_>, D, Dma<'_>, Dma<'_>> {
        RawNandDevice::with_spec(
            SimBus::new(chip),
            def,
            SimDma::reader(chip).with_floor(usize::MAX),
            SimDma::writer(chip).with_floor(usize::MAX),
            sim_spec(),
        )
    }

    fn pattern() -> [u8; DATA] {
        core::array::from_fn(|i| (i as u8).wrapping_mul(31).wrapping_add(7))
    }

    const B0: BlockIndex = BlockIndex::new(0);
    const P0: PageIndex = PageIndex::new(0);

    #[test]
    fn roundtrip_without_spare_buffer() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();

        let mut out = [0u8; DATA];
        dev.read_page(B0, P0, Some(&mut out), None).unwrap();
        assert_eq!(out, data);

        // Unwritten spare bytes read back erased, and the synthesized
        // spare holds identical parity copies in both slots
        let mut spare = [0u8; SPARE];
        dev.read_page(B0, P0, None, Some(&mut spare)).unwrap();
        assert_eq!(spare[..8], [0xFF; 8]);
        assert_eq!(spare[8..12], spare[12..16]);
    }

    #[test]
    fn roundtrip_through_the_offload_path() {
        let chip = chip();
        let mut dev = RawNandDevice::with_spec(
            SimBus::new(&chip),
            SyncChip,
            SimDma::reader(&chip).with_floor(0),
            SimDma::writer(&chip).with_floor(0),
            sim_spec(),
        );
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();
        let mut out = [0u8; DATA];
        dev.read_page(B0, P0, Some(&mut out), None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_with_caller_spare() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();
        let mut spare_in = [0xFFu8; SPARE];
        spare_in[1] = 0xAB;

        dev.write_page(B0, P0, Some(&data), Some(&spare_in)).unwrap();
        // The caller's spare slice is staged, not mutated
        assert_eq!(spare_in[8..12], [0xFF; 4]);

        let mut out = [0u8; DATA];
        let mut spare_out = [0u8; SPARE];
        dev.read_page(B0, P0, Some(&mut out), Some(&mut spare_out)).unwrap();
        assert_eq!(out, data);
        assert_eq!(spare_out[1], 0xAB);
    }

    #[test]
    fn erased_page_reads_clean() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);

        let mut out = [0u8; DATA];
        dev.read_page(B0, P0, Some(&mut out), None).unwrap();
        assert_eq!(out, [0xFF; DATA]);
    }

    #[test]
    fn corrects_a_single_flipped_bit() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();
        chip.borrow_mut().page_mut(0, 0)[100] ^= 1 << 3;

        let mut out = [0u8; DATA];
        dev.read_page(B0, P0, Some(&mut out), None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn damaged_parity_falls_back_to_the_copy() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();
        // One flipped bit in the primary parity word, copy intact
        chip.borrow_mut().page_mut(0, 0)[DATA + ecc::PARITY_OFFSET] ^= 0x04;

        let mut out = [0u8; DATA];
        dev.read_page(B0, P0, Some(&mut out), None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn damaged_parity_and_copy_is_an_ecc_error() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();
        {
            let mut sim = chip.borrow_mut();
            let page = sim.page_mut(0, 0);
            page[DATA + ecc::PARITY_OFFSET] ^= 0x04;
            page[DATA + ecc::PARITY_COPY_OFFSET] ^= 0x04;
        }

        let mut out = [0u8; DATA];
        let err = dev.read_page(B0, P0, Some(&mut out), None).unwrap_err();
        assert!(matches!(err, RawNandError::EccError));
    }

    #[test]
    fn two_flipped_bits_are_uncorrectable() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();
        {
            let mut sim = chip.borrow_mut();
            let page = sim.page_mut(0, 0);
            page[10] ^= 0x01;
            page[20] ^= 0x01;
        }

        let mut out = [0u8; DATA];
        let err = dev.read_page(B0, P0, Some(&mut out), None).unwrap_err();
        assert!(matches!(err, RawNandError::EccError));
    }

    #[test]
    fn missing_buffers_fail_before_any_phase() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);

        let err = dev.read_page(B0, P0, None, None).unwrap_err();
        assert!(matches!(err, RawNandError::InvalidArgument));
        let err = dev.write_page(B0, P0, None, None).unwrap_err();
        assert!(matches!(err, RawNandError::InvalidArgument));

        let stats = chip.borrow().stats;
        assert_eq!(stats.commands, 0);
        assert_eq!(stats.addresses, 0);
    }

    #[test]
    fn short_byte_transfers_fail_before_any_phase() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);

        let mut small = [0u8; 3];
        let err = dev.read_bytes(B0, P0, &mut small).unwrap_err();
        assert!(matches!(err, RawNandError::InvalidArgument));
        let err = dev.write_bytes(B0, P0, &small).unwrap_err();
        assert!(matches!(err, RawNandError::InvalidArgument));

        assert_eq!(chip.borrow().stats.commands, 0);
    }

    #[test]
    fn out_of_range_addresses_are_rejected() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);

        let mut buf = [0u8; DATA];
        let err = dev
            .read_page(BlockIndex::new(BLOCKS as u32), P0, Some(&mut buf), None)
            .unwrap_err();
        assert!(matches!(err, RawNandError::OutOfBounds));

        let err = dev
            .read_page(B0, PageIndex::new(PPB as u16), Some(&mut buf), None)
            .unwrap_err();
        assert!(matches!(err, RawNandError::OutOfBounds));

        let err = dev.erase(BlockIndex::new(BLOCKS as u32)).unwrap_err();
        assert!(matches!(err, RawNandError::OutOfBounds));

        assert_eq!(chip.borrow().stats.commands, 0);
    }

    #[test]
    fn byte_transfers_round_trip() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);

        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x55, 0xAA, 0x00, 0xFF];
        dev.write_bytes(B0, P0, &payload).unwrap();

        let mut out = [0u8; 8];
        dev.read_bytes(B0, P0, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn erase_restores_the_erased_state() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        let data = pattern();

        dev.write_page(B0, P0, Some(&data), None).unwrap();
        dev.erase(B0).unwrap();

        let mut out = [0u8; DATA];
        dev.read_page(B0, P0, Some(&mut out), None).unwrap();
        assert_eq!(out, [0xFF; DATA]);
    }

    #[test]
    fn sync_chip_reports_program_failure_immediately() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        chip.borrow_mut().fail_next_program = true;

        let err = dev.write_page(B0, P0, Some(&pattern()), None).unwrap_err();
        assert!(matches!(err, RawNandError::ProgramFailed));
    }

    #[test]
    fn async_chip_defers_completion_to_sync() {
        let chip = chip();
        let mut dev = device(&chip, AsyncChip);

        dev.write_page(B0, P0, Some(&pattern()), None).unwrap();
        // The slot is occupied until drained
        let err = dev.write_page(B0, PageIndex::new(1), Some(&pattern()), None).unwrap_err();
        assert!(matches!(err, RawNandError::Busy));
        dev.sync().unwrap();

        chip.borrow_mut().fail_next_erase = true;
        dev.erase(B0).unwrap();
        let err = dev.sync().unwrap_err();
        assert!(matches!(err, RawNandError::EraseFailed));

        // Drained slot: sync is a no-op again
        dev.sync().unwrap();
    }

    #[test]
    fn stuck_status_register_is_a_timeout() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        chip.borrow_mut().hold_busy = true;

        let err = dev.write_page(B0, P0, Some(&pattern()), None).unwrap_err();
        assert!(matches!(err, RawNandError::Timeout));
    }

    #[test]
    fn stuck_ready_line_is_a_timeout() {
        let chip = chip();
        let mut dev = device(&chip, SyncChip);
        chip.borrow_mut().force_busy(1000);

        let mut out = [0u8; DATA];
        let err = dev.read_page(B0, P0, Some(&mut out), None).unwrap_err();
        assert!(matches!(err, RawNandError::Timeout));
    }

    #[test]
    fn identify_resolves_and_latches_the_geometry() {
        let chip = chip();
        let mut dev = RawNandDevice::new(
            SimBus::new(&chip),
            SyncChip,
            SimDma::reader(&chip).with_floor(usize::MAX),
            SimDma::writer(&chip).with_floor(usize::MAX),
        );

        let spec = *dev.identify().unwrap();
        assert_eq!(spec, ChipSpec::FALLBACK);
        assert_eq!(spec.data_size, 2048);
        assert_eq!(spec.num_blocks, 1024);
        assert_eq!(spec.max_bad_blocks, 25);

        // Geometry resolves exactly once
        let err = dev.identify().unwrap_err();
        assert!(matches!(err, RawNandError::InvalidArgument));
    }
}
