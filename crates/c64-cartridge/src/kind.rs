//! Supported cartridge families and their fixed properties.

use std::fmt;
use std::str::FromStr;

use nor_flash::FlashType;

use crate::error::CartridgeError;
use crate::mode::AddressMode;

/// Cartridge hardware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartridgeKind {
    /// Type 0 with EXROM low: 8K at $8000.
    Generic8k,
    /// Type 0 with EXROM and GAME low: 16K at $8000.
    Generic16k,
    /// Type 0 with GAME low only: ROMH at $E000.
    Ultimax,
    /// Type 5: up to 64 x 8K banks, $DE00 selects.
    Ocean,
    /// Type 19: up to 128 x 8K banks, $DE00 bit 7 switches off.
    MagicDesk,
    /// Type 32: 2 x AM29F040B flash, 256 bytes RAM at $DF00.
    EasyFlash,
    Uc1,
    Uc15,
    Uc2,
    /// One MX29F800CB flash on ROML.
    Megabyter,
}

/// How a raw (headerless) image lays out its banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLayout {
    /// 16K per bank: 8K ROML followed by 8K ROMH.
    Interleaved,
    /// 8K per bank, ROML only.
    LinearRoml,
}

/// Where a CRT chip packet lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTarget {
    Roml,
    Romh,
    /// 16K packet split across ROML and ROMH.
    Both,
}

impl CartridgeKind {
    pub const ALL: [Self; 10] = [
        Self::Generic8k,
        Self::Generic16k,
        Self::Ultimax,
        Self::Ocean,
        Self::MagicDesk,
        Self::EasyFlash,
        Self::Uc1,
        Self::Uc15,
        Self::Uc2,
        Self::Megabyter,
    ];

    /// Hardware type id in CRT headers.
    #[must_use]
    pub fn crt_id(self) -> u16 {
        match self {
            Self::Generic8k | Self::Generic16k | Self::Ultimax => 0,
            Self::Ocean => 5,
            Self::MagicDesk => 19,
            Self::EasyFlash => 32,
            Self::Uc1 => 81,
            Self::Uc15 => 82,
            Self::Uc2 => 83,
            Self::Megabyter => 85,
        }
    }

    /// Banked family for a CRT hardware id. Type 0 needs the header
    /// lines and is resolved by [`CartridgeKind::generic`].
    #[must_use]
    pub fn from_crt_id(id: u16) -> Option<Self> {
        match id {
            5 => Some(Self::Ocean),
            19 => Some(Self::MagicDesk),
            32 => Some(Self::EasyFlash),
            81 => Some(Self::Uc1),
            82 => Some(Self::Uc15),
            83 => Some(Self::Uc2),
            85 => Some(Self::Megabyter),
            _ => None,
        }
    }

    /// Generic family for the given header mode.
    #[must_use]
    pub fn generic(mode: AddressMode) -> Option<Self> {
        match mode {
            AddressMode::Game8k => Some(Self::Generic8k),
            AddressMode::Game16k => Some(Self::Generic16k),
            AddressMode::Ultimax => Some(Self::Ultimax),
            AddressMode::RamOnly => None,
        }
    }

    /// Stable code used in snapshots.
    #[must_use]
    pub fn code(self) -> u8 {
        Self::ALL.iter().position(|&k| k == self).unwrap_or(0) as u8
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic8k => "Generic 8KB",
            Self::Generic16k => "Generic 16KB",
            Self::Ultimax => "Ultimax",
            Self::Ocean => "Ocean",
            Self::MagicDesk => "Magic Desk",
            Self::EasyFlash => "EasyFlash",
            Self::Uc1 => "UC-1",
            Self::Uc15 => "UC-1.5",
            Self::Uc2 => "UC-2",
            Self::Megabyter => "Megabyter",
        }
    }

    /// Number of ROML/ROMH bank pairs the hardware can address.
    #[must_use]
    pub fn max_banks(self) -> usize {
        match self {
            Self::Generic8k | Self::Generic16k | Self::Ultimax => 1,
            Self::Ocean | Self::EasyFlash => 64,
            Self::MagicDesk | Self::Megabyter => 128,
            Self::Uc1 => 8,
            Self::Uc15 | Self::Uc2 => 32,
        }
    }

    #[must_use]
    pub fn raw_layout(self) -> RawLayout {
        match self {
            Self::Ocean | Self::MagicDesk | Self::Megabyter => RawLayout::LinearRoml,
            _ => RawLayout::Interleaved,
        }
    }

    /// Accepted raw image sizes, without a load address prefix.
    #[must_use]
    pub fn raw_sizes(self) -> &'static [usize] {
        const K: usize = 1024;
        match self {
            Self::Generic8k => &[8 * K],
            Self::Generic16k => &[16 * K],
            Self::Ultimax => &[8 * K, 16 * K],
            Self::Ocean => &[32 * K, 64 * K, 128 * K, 256 * K, 512 * K],
            Self::MagicDesk => &[32 * K, 64 * K, 128 * K, 256 * K, 512 * K, 1024 * K],
            Self::EasyFlash | Self::Megabyter => &[1024 * K],
            Self::Uc1 => &[32 * K, 64 * K, 128 * K],
            Self::Uc15 | Self::Uc2 => &[128 * K, 256 * K, 512 * K],
        }
    }

    /// Mode a freshly attached cartridge of this family powers up in,
    /// when the image does not say otherwise.
    #[must_use]
    pub fn default_mode(self) -> AddressMode {
        match self {
            Self::Generic8k | Self::MagicDesk | Self::Ocean | Self::Megabyter => {
                AddressMode::Game8k
            }
            Self::Ultimax | Self::EasyFlash => AddressMode::Ultimax,
            Self::Generic16k | Self::Uc1 | Self::Uc15 | Self::Uc2 => AddressMode::Game16k,
        }
    }

    /// Flash chips fitted, ROML first.
    #[must_use]
    pub fn flash_chips(self) -> &'static [FlashType] {
        match self {
            Self::EasyFlash => &[FlashType::Am29f040b, FlashType::Am29f040b],
            Self::Megabyter => &[FlashType::Mx29f800cb],
            _ => &[],
        }
    }

    #[must_use]
    pub fn has_flash(self) -> bool {
        !self.flash_chips().is_empty()
    }

    /// Legal placement of a CRT chip packet, or `None` if this family
    /// cannot hold a packet of that size at that address.
    #[must_use]
    pub fn chunk_target(self, load_address: u16, size: usize) -> Option<ChunkTarget> {
        const K8: usize = 0x2000;
        const K16: usize = 0x4000;
        match (self, load_address, size) {
            (Self::Generic8k | Self::MagicDesk | Self::Megabyter, 0x8000, K8) => {
                Some(ChunkTarget::Roml)
            }
            (Self::Generic16k | Self::Ultimax | Self::Ocean, 0x8000, K8)
            | (Self::EasyFlash | Self::Uc1 | Self::Uc15 | Self::Uc2, 0x8000, K8) => {
                Some(ChunkTarget::Roml)
            }
            (Self::Generic16k | Self::Ocean, 0xA000, K8)
            | (Self::Ultimax, 0xE000, K8)
            | (Self::EasyFlash | Self::Uc1 | Self::Uc15 | Self::Uc2, 0xA000 | 0xE000, K8) => {
                Some(ChunkTarget::Romh)
            }
            (
                Self::Generic16k | Self::Ultimax | Self::Ocean | Self::Uc1 | Self::Uc15 | Self::Uc2,
                0x8000,
                K16,
            ) => Some(ChunkTarget::Both),
            _ => None,
        }
    }

    /// EXROM and GAME levels written to CRT headers.
    #[must_use]
    pub fn crt_lines(self, image_mode: AddressMode) -> (bool, bool) {
        match self {
            // Flash carts boot in Ultimax.
            Self::EasyFlash | Self::Megabyter => (true, false),
            _ => (image_mode.exrom_line(), image_mode.game_line()),
        }
    }
}

impl fmt::Display for CartridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CartridgeKind {
    type Err = CartridgeError;

    /// Accepts the family name in any case, with or without punctuation,
    /// or a numeric CRT id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();
        let kind = match key.as_str() {
            "8k" | "generic8k" | "normal" => Self::Generic8k,
            "16k" | "generic16k" => Self::Generic16k,
            "ultimax" => Self::Ultimax,
            "ocean" => Self::Ocean,
            "magicdesk" | "md" => Self::MagicDesk,
            "easyflash" | "ef" => Self::EasyFlash,
            "uc1" => Self::Uc1,
            "uc15" => Self::Uc15,
            "uc2" => Self::Uc2,
            "megabyter" => Self::Megabyter,
            _ => {
                let id = key
                    .parse::<u16>()
                    .map_err(|_| CartridgeError::MalformedImage(format!("unknown cartridge type {s}")))?;
                return Self::from_crt_id(id).ok_or(CartridgeError::UnsupportedCartridge(id));
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in CartridgeKind::ALL {
            assert_eq!(CartridgeKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CartridgeKind::from_code(200), None);
    }

    #[test]
    fn banked_ids_round_trip() {
        for kind in CartridgeKind::ALL {
            if kind.crt_id() != 0 {
                assert_eq!(CartridgeKind::from_crt_id(kind.crt_id()), Some(kind));
            }
        }
    }

    #[test]
    fn raw_sizes_fit_bank_storage() {
        for kind in CartridgeKind::ALL {
            let per_bank = match kind.raw_layout() {
                RawLayout::Interleaved => 0x4000,
                RawLayout::LinearRoml => 0x2000,
            };
            for &size in kind.raw_sizes() {
                assert!(size.div_ceil(per_bank) <= kind.max_banks(), "{kind} {size}");
            }
        }
    }

    #[test]
    fn chunk_rules() {
        use CartridgeKind::*;
        assert_eq!(Uc2.chunk_target(0xE000, 0x2000), Some(ChunkTarget::Romh));
        assert_eq!(Uc2.chunk_target(0xA000, 0x4000), None);
        assert_eq!(Megabyter.chunk_target(0xA000, 0x2000), None);
        assert_eq!(Megabyter.chunk_target(0x8000, 0x4000), None);
        assert_eq!(EasyFlash.chunk_target(0xE000, 0x2000), Some(ChunkTarget::Romh));
        assert_eq!(Ocean.chunk_target(0x8000, 0x2000), Some(ChunkTarget::Roml));
        assert_eq!(Generic8k.chunk_target(0x9000, 0x2000), None);
    }

    #[test]
    fn parse_names() {
        assert_eq!("UC-1.5".parse::<CartridgeKind>().ok(), Some(CartridgeKind::Uc15));
        assert_eq!("EasyFlash".parse::<CartridgeKind>().ok(), Some(CartridgeKind::EasyFlash));
        assert_eq!("85".parse::<CartridgeKind>().ok(), Some(CartridgeKind::Megabyter));
        assert!(matches!(
            "60".parse::<CartridgeKind>(),
            Err(CartridgeError::UnsupportedCartridge(60))
        ));
        assert!("bogus".parse::<CartridgeKind>().is_err());
    }
}
