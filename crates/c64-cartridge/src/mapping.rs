//! Register decode results and the derived address-space state.

use crate::mode::{AddressMode, ModeTable};

/// Named fields of a control register write, before any mode lookup.
///
/// `game_line`, `exrom_line` and `mode_flag` are the raw register bits
/// that index the family's [`ModeTable`]; their polarity is the table's
/// business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlBits {
    pub bank_index: usize,
    pub ram_write_enabled: bool,
    pub ram_selected: bool,
    pub io_visible: bool,
    pub game_line: bool,
    pub exrom_line: bool,
    pub mode_flag: bool,
}

impl ControlBits {
    /// UC family control byte:
    ///
    /// ```text
    /// bit 0-2  bank (UC-1 only)
    /// bit 3    IO register disable
    /// bit 4    RAM write enable
    /// bit 5    RAM select (1 = RAM, 0 = ROM)
    /// bit 6    /GAME
    /// bit 7    /EXROM
    /// ```
    #[must_use]
    pub fn decode_uc(value: u8) -> Self {
        Self {
            bank_index: usize::from(value & 0x07),
            ram_write_enabled: value & 0x10 != 0,
            ram_selected: value & 0x20 != 0,
            io_visible: value & 0x08 == 0,
            game_line: value & 0x40 != 0,
            exrom_line: value & 0x80 != 0,
            mode_flag: false,
        }
    }
}

/// Address-space state of one attached cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartridgeConfig {
    /// Nominal mode, as seen by the VIC.
    pub mode: AddressMode,
    /// Always `bank_index & bank_mask == bank_index`.
    pub bank_index: usize,
    pub bank_mask: usize,
    pub ram_write_enabled: bool,
    pub ram_selected: bool,
    pub io_visible: bool,
    /// CPU sees Ultimax so cartridge RAM can be written, but
    /// $1000-$7FFF and $C000-$CFFF read C64 RAM instead of open bus.
    pub fake_ultimax_ram: bool,
}

impl CartridgeConfig {
    /// Disabled cartridge with bank 0.
    #[must_use]
    pub fn new(bank_mask: usize) -> Self {
        Self {
            mode: AddressMode::RamOnly,
            bank_index: 0,
            bank_mask,
            ram_write_enabled: false,
            ram_selected: false,
            io_visible: true,
            fake_ultimax_ram: false,
        }
    }

    /// Fixed mode, no registers.
    #[must_use]
    pub fn fixed(mode: AddressMode) -> Self {
        Self {
            mode,
            ..Self::new(0)
        }
    }

    /// Full state for a decoded register write.
    ///
    /// RAM writes need both RAM on the board and the cartridge not being
    /// switched off; when allowed they force fake Ultimax.
    #[must_use]
    pub fn derive(bits: &ControlBits, table: &ModeTable, bank_mask: usize, has_ram: bool) -> Self {
        let mode = table.resolve(bits.game_line, bits.exrom_line, bits.mode_flag);
        let ram_write_enabled = bits.ram_write_enabled && has_ram && mode != AddressMode::RamOnly;
        Self {
            mode,
            bank_index: bits.bank_index & bank_mask,
            bank_mask,
            ram_write_enabled,
            ram_selected: bits.ram_selected && has_ram,
            io_visible: bits.io_visible,
            fake_ultimax_ram: ram_write_enabled,
        }
    }

    /// Mode the CPU (phi2) sees.
    #[must_use]
    pub fn cpu_mode(&self) -> AddressMode {
        if self.fake_ultimax_ram {
            AddressMode::Ultimax
        } else {
            self.mode
        }
    }

    /// Mode the VIC (phi1) sees.
    #[must_use]
    pub fn vic_mode(&self) -> AddressMode {
        self.mode
    }

    /// ROMH responds (at $A000 in 16K, at $E000 in Ultimax).
    #[must_use]
    pub fn romh_visible(&self) -> bool {
        matches!(self.mode, AddressMode::Game16k | AddressMode::Ultimax)
    }
}
