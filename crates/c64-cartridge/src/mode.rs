//! GAME/EXROM address-space configurations.
//!
//! | EXROM | GAME | Mode                                              |
//! |-------|------|---------------------------------------------------|
//! |   1   |   1  | RAM only (cartridge invisible)                    |
//! |   0   |   1  | 8K: ROML at $8000-$9FFF                           |
//! |   0   |   0  | 16K: ROML at $8000, ROMH at $A000                 |
//! |   1   |   0  | Ultimax: ROML at $8000, ROMH at $E000             |
//!
//! Cartridges do not drive the lines from register bits the same way.
//! Some store the line level, some store "asserted", some add a mode bit.
//! Each family therefore carries its own [`ModeTable`].

use std::fmt;

/// Canonical memory configuration selected by the expansion port lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    RamOnly,
    Game8k,
    Game16k,
    Ultimax,
}

impl AddressMode {
    /// EXROM line level for this mode (true = high / inactive).
    #[must_use]
    pub fn exrom_line(self) -> bool {
        matches!(self, Self::RamOnly | Self::Ultimax)
    }

    /// GAME line level for this mode (true = high / inactive).
    #[must_use]
    pub fn game_line(self) -> bool {
        matches!(self, Self::RamOnly | Self::Game8k)
    }

    /// Mode produced by the given line levels.
    #[must_use]
    pub fn from_lines(exrom: bool, game: bool) -> Self {
        LINE_LEVEL.resolve(game, exrom, false)
    }

    /// True if ROML responds at $8000-$9FFF.
    #[must_use]
    pub fn roml_visible(self) -> bool {
        self != Self::RamOnly
    }

    /// Short name used in monitor dumps.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RamOnly => "DISABLED",
            Self::Game8k => "8KB",
            Self::Game16k => "16KB",
            Self::Ultimax => "Ultimax",
        }
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-family lookup from (mode flag, EXROM bit, GAME bit) to a mode.
///
/// Index is `flag << 2 | exrom << 1 | game`, taken from the raw register
/// bits before any polarity interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTable([AddressMode; 8]);

impl ModeTable {
    #[must_use]
    pub const fn new(entries: [AddressMode; 8]) -> Self {
        Self(entries)
    }

    /// Total: every input combination maps to one of the four modes.
    #[must_use]
    pub fn resolve(&self, game: bool, exrom: bool, mode_flag: bool) -> AddressMode {
        let index = usize::from(mode_flag) << 2 | usize::from(exrom) << 1 | usize::from(game);
        self.0[index]
    }
}

use AddressMode::{Game16k, Game8k, RamOnly, Ultimax};

/// Bits are line levels (1 = high). Used by CRT headers and the UC
/// family, whose register bits 6/7 drive /GAME and /EXROM directly.
pub const LINE_LEVEL: ModeTable = ModeTable::new([
    Game16k, Game8k, Ultimax, RamOnly, // flag clear
    Game16k, Game8k, Ultimax, RamOnly, // flag ignored
]);

/// Megabyter $DE02: bit 0 set pulls GAME low, bit 1 set releases EXROM.
pub const MEGABYTER: ModeTable = ModeTable::new([
    Game8k, Game16k, RamOnly, Ultimax, // flag ignored
    Game8k, Game16k, RamOnly, Ultimax,
]);

/// EasyFlash $DE02 with the boot jumper off: with MODE clear, GAME
/// follows the jumper, which holds it low.
pub const EASYFLASH_BOOT: ModeTable = ModeTable::new([
    Ultimax, Ultimax, Game16k, Game16k, // MODE = 0
    RamOnly, Ultimax, Game8k, Game16k, // MODE = 1
]);

/// EasyFlash $DE02 with the boot jumper on: GAME stays high while MODE
/// is clear.
pub const EASYFLASH_DISABLED: ModeTable = ModeTable::new([
    RamOnly, RamOnly, Game8k, Game8k, // MODE = 0
    RamOnly, Ultimax, Game8k, Game16k, // MODE = 1
]);
