//! EasyFlash: two AM29F040B chips and 256 bytes of RAM.
//!
//! ```text
//! $DE00      bit 0-5  bank
//! $DE02      bit 7    LED
//!            bit 2    MODE (0 = GAME from jumper)
//!            bit 1    EXROM (1 = low)
//!            bit 0    GAME (1 = low, used when MODE = 1)
//! $DF00-FF   RAM
//! ```

use log::debug;
use nor_flash::FlashType;

use super::{Board, FlashBus, FlashChip, IoWindow, ModuleVersion};
use crate::bank::BankRegion;
use crate::config::CartridgeOptions;
use crate::kind::CartridgeKind;
use crate::mapping::{CartridgeConfig, ControlBits};
use crate::mode::{EASYFLASH_BOOT, EASYFLASH_DISABLED};

const BANK_MASK: usize = 0x3F;
const RAM_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct EasyFlashBoard {
    bank: u8,
    control: u8,
    jumper: bool,
    ram: Vec<u8>,
    config: CartridgeConfig,
    /// ROML chip, then ROMH chip.
    chips: [FlashChip; 2],
}

impl EasyFlashBoard {
    #[must_use]
    pub fn new(options: &CartridgeOptions) -> Self {
        let mut board = Self {
            bank: 0,
            control: 0,
            jumper: options.easyflash_jumper,
            ram: options.ram_init.fill(RAM_SIZE),
            config: CartridgeConfig::new(BANK_MASK),
            chips: [
                FlashChip::new("FLASH040L", FlashBus::Roml, FlashType::Am29f040b),
                FlashChip::new("FLASH040H", FlashBus::Romh, FlashType::Am29f040b),
            ],
        };
        board.apply();
        board
    }

    fn apply(&mut self) {
        let bits = ControlBits {
            bank_index: usize::from(self.bank),
            game_line: self.control & 0x01 != 0,
            exrom_line: self.control & 0x02 != 0,
            mode_flag: self.control & 0x04 != 0,
            io_visible: true,
            ..ControlBits::default()
        };
        let table = if self.jumper {
            &EASYFLASH_DISABLED
        } else {
            &EASYFLASH_BOOT
        };
        self.config = CartridgeConfig::derive(&bits, table, BANK_MASK, false);
    }
}

impl Board for EasyFlashBoard {
    fn kind(&self) -> CartridgeKind {
        CartridgeKind::EasyFlash
    }

    fn config(&self) -> &CartridgeConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.bank = 0;
        self.control = 0;
        self.apply();
    }

    fn io_store(&mut self, window: IoWindow, offset: u8, value: u8) {
        match window {
            IoWindow::Io1 => {
                if offset & 2 != 0 {
                    self.control = value & 0x87;
                } else {
                    self.bank = value & BANK_MASK as u8;
                }
                self.apply();
                debug!(
                    "EasyFlash: bank {}, {}, LED {}",
                    self.bank,
                    self.config.mode,
                    self.control >> 7
                );
            }
            IoWindow::Io2 => self.ram[usize::from(offset)] = value,
        }
    }

    fn io_read(&mut self, window: IoWindow, offset: u8) -> Option<u8> {
        match window {
            IoWindow::Io1 => None,
            IoWindow::Io2 => Some(self.ram[usize::from(offset)]),
        }
    }

    fn io_peek(&self, window: IoWindow, offset: u8) -> Option<u8> {
        Some(match window {
            IoWindow::Io1 if offset & 2 != 0 => self.control,
            IoWindow::Io1 => self.bank,
            IoWindow::Io2 => self.ram[usize::from(offset)],
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

    fn romh_read(&mut self, region: &BankRegion, addr: u16) -> u8 {
        let bank = self.config.bank_index;
        self.chips[1].read(region, bank, addr)
    }

    fn romh_peek(&self, region: &BankRegion, addr: u16) -> u8 {
        self.chips[1].peek(region, self.config.bank_index, addr)
    }

    fn romh_store(&mut self, region: &mut BankRegion, addr: u16, value: u8) {
        let bank = self.config.bank_index;
        self.chips[1].store(region, bank, addr, value);
    }

    fn romh_store_rmw(&mut self, region: &mut BankRegion, addr: u16, value: u8) {
        let bank = self.config.bank_index;
        self.chips[1].store_rmw(region, bank, addr, value);
    }

    fn dump(&self) -> String {
        format!(
            "Mode: {}, bank: {}, LED {}, jumper {}",
            self.config.mode,
            self.bank,
            if self.control & 0x80 != 0 { "on" } else { "off" },
            if self.jumper { "on" } else { "off" }
        )
    }

    fn module(&self) -> ModuleVersion {
        ModuleVersion {
            name: "CARTEF",
            major: 0,
            minor: 0,
        }
    }

    fn registers(&self) -> Vec<u8> {
        vec![self.bank, self.control, u8::from(self.jumper)]
    }

    fn restore_registers(&mut self, registers: &[u8]) {
        if let [bank, control, jumper, ..] = registers {
            self.bank = bank & BANK_MASK as u8;
            self.control = control & 0x87;
            self.jumper = *jumper != 0;
        }
        self.apply();
    }

    fn cart_ram(&self) -> Option<&[u8]> {
        Some(&self.ram)
    }

    fn cart_ram_mut(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.ram)
    }

    fn flash_chips(&self) -> &[FlashChip] {
        &self.chips
    }

    fn flash_chips_mut(&mut self) -> &mut [FlashChip] {
        &mut self.chips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::AddressMode;

    fn board(jumper: bool) -> EasyFlashBoard {
        EasyFlashBoard::new(&CartridgeOptions {
            easyflash_jumper: jumper,
            ..CartridgeOptions::default()
        })
    }

    #[test]
    fn boot_mode_follows_jumper() {
        assert_eq!(board(false).config().mode, AddressMode::Ultimax);
        assert_eq!(board(true).config().mode, AddressMode::RamOnly);
    }

    #[test]
    fn control_register_modes() {
        let mut b = board(false);
        b.io_store(IoWindow::Io1, 2, 0x07);
        assert_eq!(b.config().mode, AddressMode::Game16k);
        b.io_store(IoWindow::Io1, 2, 0x04);
        assert_eq!(b.config().mode, AddressMode::RamOnly);
        b.io_store(IoWindow::Io1, 2, 0x06);
        assert_eq!(b.config().mode, AddressMode::Game8k);
        assert_eq!(b.io_peek(IoWindow::Io1, 2), Some(0x06));
    }

    #[test]
    fn io2_ram() {
        let mut b = board(false);
        b.io_store(IoWindow::Io2, 0x80, 0x5A);
        assert_eq!(b.io_read(IoWindow::Io2, 0x80), Some(0x5A));
        assert_eq!(b.io_read(IoWindow::Io1, 0), None);
    }

    #[test]
    fn chips_are_independent() {
        let mut region = BankRegion::allocate(64).expect("alloc");
        let mut b = board(false);
        b.io_store(IoWindow::Io1, 0, 1);
        // Program ROMH only.
        b.romh_store(&mut region, 0xE555, 0xAA);
        b.romh_store(&mut region, 0xE2AA, 0x55);
        b.romh_store(&mut region, 0xE555, 0xA0);
        b.romh_store(&mut region, 0xE010, 0x3C);
        assert_eq!(region.read_romh(1, 0x10), 0x3C);
        assert_eq!(region.read_roml(1, 0x10), 0xFF);
        assert!(b.flash_chips()[1].device.is_dirty());
        assert!(!b.flash_chips()[0].device.is_dirty());
    }
}
