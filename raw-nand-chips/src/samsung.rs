use raw_nand::{NandChip, NandId};

/// Samsung K9F1G08 family: 1 Gbit SLC, 2048 + 64 byte pages, 64 pages per
/// block. Covers the U0A/U0B/U0C/U0D steppings, which differ only in ID
/// bytes 3 and 4.
///
/// The standard large-page command set and the asynchronous completion
/// default apply unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct K9f1g08;

impl K9f1g08 {
    pub const MAKER_ID: u8 = 0xEC;
    pub const DEVICE_ID: u8 = 0xF1;

    /// Whether an identification record belongs to this family.
    pub fn matches(id: &NandId) -> bool {
        id.maker == Self::MAKER_ID && id.device == Self::DEVICE_ID
    }
}

impl NandChip for K9f1g08 {}
