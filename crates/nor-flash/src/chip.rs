//! Supported flash parts.

/// Physical layout and command decoding of one flash part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub manufacturer_id: u8,
    pub device_id: u8,
    /// Low address byte that returns the device id in autoselect mode.
    pub device_id_addr: u32,
    pub size: u32,
    pub sector_mask: u32,
    pub sector_size: u32,
    pub sector_shift: u32,
    pub magic_1_addr: u32,
    pub magic_2_addr: u32,
    pub magic_1_mask: u32,
    pub magic_2_mask: u32,
    /// Bits flipped on each status read during erase.
    pub status_toggle_bits: u8,
    pub erase_sector_timeout_cycles: u32,
    pub erase_sector_cycles: u32,
    pub erase_chip_cycles: u32,
}

/// Macronix MX29F800CB, 1 MiB, byte mode (Megabyter).
const MX29F800CB: FlashGeometry = FlashGeometry {
    manufacturer_id: 0xC2,
    device_id: 0x58,
    device_id_addr: 1,
    size: 0x10_0000,
    sector_mask: 0x0F_0000,
    sector_size: 0x1_0000,
    sector_shift: 16,
    magic_1_addr: 0xAAA,
    magic_2_addr: 0x555,
    magic_1_mask: 0xFFF,
    magic_2_mask: 0xFFF,
    status_toggle_bits: 0x40,
    erase_sector_timeout_cycles: 40,
    // Real parts may take up to 15s per sector and 32s for the chip.
    erase_sector_cycles: 700_000,
    erase_chip_cycles: 8_000_000,
};

/// AMD Am29F040B, 512 KiB (EasyFlash, one per ROM window).
const AM29F040B: FlashGeometry = FlashGeometry {
    manufacturer_id: 0x01,
    device_id: 0xA4,
    device_id_addr: 1,
    size: 0x8_0000,
    sector_mask: 0x7_0000,
    sector_size: 0x1_0000,
    sector_shift: 16,
    magic_1_addr: 0x555,
    magic_2_addr: 0x2AA,
    magic_1_mask: 0x7FF,
    magic_2_mask: 0x7FF,
    status_toggle_bits: 0x40,
    erase_sector_timeout_cycles: 80,
    erase_sector_cycles: 1_000_000,
    erase_chip_cycles: 8_000_000,
};

/// Flash part selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashType {
    Mx29f800cb,
    Am29f040b,
}

impl FlashType {
    #[must_use]
    pub fn geometry(self) -> &'static FlashGeometry {
        match self {
            Self::Mx29f800cb => &MX29F800CB,
            Self::Am29f040b => &AM29F040B,
        }
    }

    /// Array size in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        self.geometry().size as usize
    }

    #[must_use]
    pub fn sector_count(self) -> u32 {
        let g = self.geometry();
        g.size / g.sector_size
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mx29f800cb => "MX29F800CB",
            Self::Am29f040b => "AM29F040B",
        }
    }
}
