//! Chip identification and geometry resolution.
//!
//! The identify sequence returns five raw bytes; three of them encode the
//! device geometry as packed bit-fields. The mapping is fixed by the ONFI-
//! era large-page ID convention and is decoded verbatim here, then folded
//! into a [ChipSpec] that the rest of the driver reads.

/// Spare bytes per 512-byte sector on supported devices
pub const SPARE_BYTES_PER_SECTOR: u32 = 16;
/// Largest sector count per page the scratch spare buffers are sized for
pub const MAX_SECTORS_PER_PAGE: usize = 8;
/// Size of the stack scratch spare buffers
pub const MAX_SPARE_SIZE: usize = MAX_SECTORS_PER_PAGE * SPARE_BYTES_PER_SECTOR as usize;

/// The five raw bytes of the identification record.
///
/// Transient: consumed right after the identify sequence to resolve the
/// chip geometry, not retained by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NandId {
    pub maker: u8,
    pub device: u8,
    pub id3: u8,
    pub id4: u8,
    pub id5: u8,
}

impl NandId {
    pub fn from_bytes(raw: [u8; 5]) -> Self {
        NandId {
            maker: raw[0],
            device: raw[1],
            id3: raw[2],
            id4: raw[3],
            id5: raw[4],
        }
    }

    /// Marketing name of recognized device classes, for logging.
    pub fn device_name(&self) -> Option<&'static str> {
        match (self.maker, self.device, self.id3, self.id4) {
            (0xEC, 0xF1, 0x80, 0x15) => Some("K9F1G08U0A"),
            (0xEC, 0xF1, 0x00, 0x95) => Some("K9F1G08U0B/K9F1G08U0C"),
            (0xEC, 0xF1, 0x00, 0x15) => Some("K9F1G08U0D"),
            (0xAD, 0xF1, 0x80, 0x1D) => Some("HY27UF081G2A"),
            _ => None,
        }
    }
}

/// The bit-fields packed into ID bytes 3 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NandInfo {
    /// Internal dies behind this chip enable
    pub dies: u32,
    /// Cell levels (2 = SLC)
    pub cell_levels: u32,
    /// Pages programmed simultaneously
    pub simul_prog_pages: u32,
    pub interleave_support: bool,
    pub cache_prog_support: bool,
    /// Data area bytes per page
    pub data_size: u32,
    /// Data bytes per erase block
    pub block_size: u32,
    /// Spare bytes per 512 data bytes
    pub spare_per_512: u32,
    /// Bus width in bits
    pub organization: u32,
    /// Minimum serial access time in nanoseconds
    pub serial_access_ns: u32,
    pub planes: u32,
    /// Bytes per plane
    pub plane_size: u32,
}

impl NandInfo {
    /// Decode the packed ID bytes. Every shift and mask below mirrors the
    /// device datasheet bit layout.
    pub fn decode(id: &NandId) -> Self {
        NandInfo {
            dies: 1 << (id.id3 & 0x03),
            cell_levels: 2 << ((id.id3 & 0x0C) >> 2),
            simul_prog_pages: 1 << ((id.id3 & 0x30) >> 4),
            interleave_support: id.id3 & 0x40 != 0,
            cache_prog_support: id.id3 & 0x80 != 0,

            data_size: 1024 << (id.id4 & 0x03),
            block_size: (64 * 1024) << ((id.id4 & 0x30) >> 4),
            spare_per_512: 8 << ((id.id4 & 0x04) >> 2),
            organization: 8 << ((id.id4 & 0x40) >> 6),
            serial_access_ns: 50 >> ((id.id4 & 0x80) >> 7),

            planes: 1 << ((id.id5 & 0x0C) >> 2),
            plane_size: (8 * 1024 * 1024) << ((id.id5 & 0x70) >> 4),
        }
    }
}

/// Resolved geometry of one chip.
///
/// Populated once per chip right after identification and read-only for
/// the rest of the process lifetime. Invariants once resolved:
/// `page_size == data_size + spare_size`,
/// `block_size == pages_per_block * data_size`, all fields positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipSpec {
    /// Data area bytes per page
    pub data_size: u32,
    /// Spare area bytes per page
    pub spare_size: u32,
    /// Data plus spare
    pub page_size: u32,
    /// 512-byte sectors per page
    pub sectors_per_page: u32,
    pub pages_per_block: u32,
    /// Data bytes per erase block
    pub block_size: u32,
    pub num_blocks: u32,
    pub num_dies_per_ce: u32,
    pub num_planes: u32,
    /// Bad blocks the device may develop over its lifetime (2.45% of all
    /// blocks)
    pub max_bad_blocks: u32,
}

impl ChipSpec {
    /// Conservative large-page SLC default assumed until identification
    /// has run.
    pub const FALLBACK: ChipSpec = ChipSpec {
        data_size: 2048,
        spare_size: 64,
        page_size: 2048 + 64,
        sectors_per_page: 4,
        pages_per_block: 64,
        block_size: 2048 * 64,
        num_blocks: 1024,
        num_dies_per_ce: 1,
        num_planes: 1,
        max_bad_blocks: 25,
    };

    /// Resolve the geometry from an identification record.
    pub fn from_id(id: &NandId) -> Self {
        let info = NandInfo::decode(id);
        let data_size = info.data_size;
        let sectors_per_page = data_size >> 9;
        let spare_size = info.spare_per_512 * sectors_per_page;
        let num_blocks = info.plane_size / info.block_size * info.planes;

        ChipSpec {
            data_size,
            spare_size,
            page_size: data_size + spare_size,
            sectors_per_page,
            pages_per_block: info.block_size / data_size,
            block_size: info.block_size,
            num_blocks,
            num_dies_per_ce: info.dies,
            num_planes: info.planes,
            max_bad_blocks: num_blocks * 245 / 10000,
        }
    }
}
