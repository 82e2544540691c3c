use raw_nand::{NandChip, NandId};

/// Hynix HY27UF081G2A: 1 Gbit SLC, 2048 + 64 byte pages, 64 pages per
/// block. Protocol-compatible with the Samsung large-page command set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hy27uf081g2a;

impl Hy27uf081g2a {
    pub const MAKER_ID: u8 = 0xAD;
    pub const DEVICE_ID: u8 = 0xF1;

    /// Whether an identification record belongs to this device.
    pub fn matches(id: &NandId) -> bool {
        id.maker == Self::MAKER_ID && id.device == Self::DEVICE_ID
    }
}

impl NandChip for Hy27uf081g2a {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_its_id_record() {
        let id = NandId::from_bytes([0xAD, 0xF1, 0x80, 0x1D, 0x40]);
        assert!(Hy27uf081g2a::matches(&id));
        assert_eq!(id.device_name(), Some("HY27UF081G2A"));
    }
}
