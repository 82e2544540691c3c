//! Transfer path selector.
//!
//! Moves a buffer between host memory and the chip's data port, either by
//! a direct CPU copy or through the offload engine. Eligibility for the
//! offload path depends only on the buffer address (the engine reaches a
//! limited address range); the chosen path then moves exactly the
//! requested byte count or reports a timeout.

use crate::bus::{DmaChannel, NandBus, XferWidth};

/// Polls granted to each offload wait (quiesce, start, completion)
const OFFLOAD_POLL_BUDGET: u32 = 0x0010_0000;

#[derive(Debug)]
pub(crate) enum XferError<BE> {
    Bus(BE),
    Timeout,
}

/// Read `buf.len()` bytes from the data port into `buf`.
pub(crate) fn data_read<B: NandBus, C: DmaChannel>(
    bus: &mut B,
    channel: &mut C,
    buf: &mut [u8],
) -> Result<(), XferError<B::Error>> {
    if channel.reaches(buf.as_ptr() as usize) {
        offload(channel, buf.as_mut_ptr(), buf.len())
    } else {
        direct_read(bus, buf).map_err(XferError::Bus)
    }
}

/// Write `buf.len()` bytes from `buf` to the data port.
pub(crate) fn data_write<B: NandBus, C: DmaChannel>(
    bus: &mut B,
    channel: &mut C,
    buf: &[u8],
) -> Result<(), XferError<B::Error>> {
    if channel.reaches(buf.as_ptr() as usize) {
        // The engine only reads from the buffer on this direction
        offload(channel, buf.as_ptr() as *mut u8, buf.len())
    } else {
        direct_write(bus, buf).map_err(XferError::Bus)
    }
}

fn direct_read<B: NandBus>(bus: &mut B, buf: &mut [u8]) -> Result<(), B::Error> {
    let mut i = 0;
    // Byte accesses until the pointer is word aligned; unaligned word
    // accesses fault on the bus
    while i < buf.len() && (buf.as_ptr() as usize + i) & 0x03 != 0 {
        buf[i] = bus.read_byte()?;
        i += 1;
    }
    while i + 4 <= buf.len() {
        let word = bus.read_word()?.to_le_bytes();
        buf[i..i + 4].copy_from_slice(&word);
        i += 4;
    }
    while i < buf.len() {
        buf[i] = bus.read_byte()?;
        i += 1;
    }
    Ok(())
}

fn direct_write<B: NandBus>(bus: &mut B, buf: &[u8]) -> Result<(), B::Error> {
    let mut i = 0;
    while i < buf.len() && (buf.as_ptr() as usize + i) & 0x03 != 0 {
        bus.write_byte(buf[i])?;
        i += 1;
    }
    while i + 4 <= buf.len() {
        let word = u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        bus.write_word(word)?;
        i += 4;
    }
    while i < buf.len() {
        bus.write_byte(buf[i])?;
        i += 1;
    }
    Ok(())
}

fn offload<C: DmaChannel, BE>(
    channel: &mut C,
    buf: *mut u8,
    len: usize,
) -> Result<(), XferError<BE>> {
    // The channel is a singleton; wait out any previous transfer before
    // reprogramming it
    let mut budget = OFFLOAD_POLL_BUDGET;
    while channel.is_active() {
        budget -= 1;
        if budget == 0 {
            warn!("offload channel stuck active (len = {})", len);
            return Err(XferError::Timeout);
        }
    }

    channel.clear_complete();

    // Word beats need both the address and the count aligned
    if buf as usize & 0x03 == 0 && len & 0x03 == 0 {
        channel.arm(buf, (len >> 2) as u32, XferWidth::Word);
    } else {
        channel.arm(buf, len as u32, XferWidth::Byte);
    }

    let mut budget = OFFLOAD_POLL_BUDGET;
    while !channel.is_active() {
        budget -= 1;
        if budget == 0 {
            warn!("offload start timeout (len = {})", len);
            return Err(XferError::Timeout);
        }
    }

    let mut budget = OFFLOAD_POLL_BUDGET;
    while !channel.is_complete() {
        budget -= 1;
        if budget == 0 {
            warn!("offload completion timeout (len = {})", len);
            return Err(XferError::Timeout);
        }
    }

    Ok(())
}
