//! Megabyter: 1 MiB MX29F800CB flash on ROML.
//!
//! ```text
//! $DE00  bit 0-6  bank 0-127
//! $DE02  bit 7    LED
//!        bit 1    EXROM (0 = low)
//!        bit 0    GAME (1 = low)
//! ```
//!
//! Only A1 is decoded, so every even/odd pair mirrors the two registers.

use log::debug;
use nor_flash::FlashType;

use super::{Board, FlashBus, FlashChip, IoWindow, ModuleVersion};
use crate::bank::BankRegion;
use crate::kind::CartridgeKind;
use crate::mapping::{CartridgeConfig, ControlBits};
use crate::mode::MEGABYTER;

const BANK_MASK: usize = 0x7F;

#[derive(Debug, Clone)]
pub struct MegabyterBoard {
    bank: u8,
    control: u8,
    config: CartridgeConfig,
    chips: [FlashChip; 1],
}

impl MegabyterBoard {
    #[must_use]
    pub fn new() -> Self {
        let mut board = Self {
            bank: 0,
            control: 0,
            config: CartridgeConfig::new(BANK_MASK),
            chips: [FlashChip::new("FLASH800CB", FlashBus::Roml, FlashType::Mx29f800cb)],
        };
        board.apply();
        board
    }

    fn apply(&mut self) {
        let bits = ControlBits {
            bank_index: usize::from(self.bank),
            game_line: self.control & 0x01 != 0,
            exrom_line: self.control & 0x02 != 0,
            io_visible: true,
            ..ControlBits::default()
        };
        self.config = CartridgeConfig::derive(&bits, &MEGABYTER, BANK_MASK, false);
    }
}

impl Default for MegabyterBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for MegabyterBoard {
    fn kind(&self) -> CartridgeKind {
        CartridgeKind::Megabyter
    }

    fn config(&self) -> &CartridgeConfig {
        &self.config
    }

    /// Registers only. The flash chip has no reset line.
    fn reset(&mut self) {
        self.bank = 0;
        self.control = 0;
        self.apply();
    }

    fn io_store(&mut self, window: IoWindow, offset: u8, value: u8) {
        if window != IoWindow::Io1 {
            return;
        }
        if offset & 2 != 0 {
            self.control = value & 0x83;
        } else {
            self.bank = value & BANK_MASK as u8;
        }
        self.apply();
        debug!(
            "Megabyter: ${:04X} <- ${value:02X} (bank {}, {}, LED {})",
            IoWindow::Io1.base() | u16::from(offset),
            self.bank,
            self.config.mode,
            self.control >> 7
        );
    }

    fn io_peek(&self, window: IoWindow, offset: u8) -> Option<u8> {
        (window == IoWindow::Io1).then_some(if offset & 2 != 0 {
            self.control
        } else {
            self.bank
        })
    }

    fn roml_read(&mut self, region: &BankRegion, addr: u16) -> u8 {
        let bank = self.config.bank_index;
        self.chips[0].read(region, bank, addr)
    }

    fn roml_peek(&self, region: &BankRegion, addr: u16) -> u8 {
        self.chips[0].peek(region, self.config.bank_index, addr)
    }

    fn roml_store(&mut self, region: &mut BankRegion, addr: u16, value: u8) {
        let bank = self.config.bank_index;
        self.chips[0].store(region, bank, addr, value);
    }

    fn roml_store_rmw(&mut self, region: &mut BankRegion, addr: u16, value: u8) {
        let bank = self.config.bank_index;
        self.chips[0].store_rmw(region, bank, addr, value);
    }

    fn dump(&self) -> String {
        format!(
            "Mode: {}, bank: {}, LED is {}",
            self.config.mode,
            self.bank,
            if self.control & 0x80 != 0 { "on" } else { "off" }
        )
    }

    fn module(&self) -> ModuleVersion {
        ModuleVersion {
            name: "CARTMEGABYTER",
            major: 0,
            minor: 0,
        }
    }

    fn registers(&self) -> Vec<u8> {
        vec![self.bank, self.control]
    }

    fn restore_registers(&mut self, registers: &[u8]) {
        if let [bank, control, ..] = registers {
            self.bank = bank & BANK_MASK as u8;
            self.control = control & 0x83;
        }
        self.apply();
    }

    fn flash_chips(&self) -> &[FlashChip] {
        &self.chips
    }

    fn flash_chips_mut(&mut self) -> &mut [FlashChip] {
        &mut self.chips
    }
}
