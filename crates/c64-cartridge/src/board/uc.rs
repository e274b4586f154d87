//! UC-1, UC-1.5 and UC-2: banked EPROM plus battery-less SRAM.
//!
//! UC-1 has one register mirrored across IO1:
//!
//! ```text
//! bit 0-2  bank
//! bit 3    IO register disable (1 = hidden until reset)
//! bit 4    SRAM write enable
//! bit 5    SRAM select (1 = RAM, 0 = EPROM)
//! bit 6    /GAME
//! bit 7    /EXROM
//! ```
//!
//! UC-2 splits it: register A at $DE02 holds a 5-bit bank, register B at
//! $DE03 holds bits 2-7 of the UC-1 layout (bit 2 is the MAX flag). Only
//! A0-A1 are decoded. UC-1.5 is a UC-2 whose registers do not read back.
//!
//! With SRAM writes enabled the CPU sees Ultimax, so writes to
//! $4000-$7FFF and $8000-$BFFF reach the cartridge RAM.

use log::debug;

use super::{Board, DONT_CARE, IoWindow, ModuleVersion};
use crate::bank::BankRegion;
use crate::config::CartridgeOptions;
use crate::kind::CartridgeKind;
use crate::mapping::{CartridgeConfig, ControlBits};
use crate::mode::LINE_LEVEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcVariant {
    Uc1,
    Uc15,
    Uc2,
}

impl UcVariant {
    fn ram_size(self) -> usize {
        match self {
            Self::Uc1 => 32 * 1024,
            Self::Uc15 | Self::Uc2 => 512 * 1024,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Uc1 => "UC1",
            Self::Uc15 => "UC1.5",
            Self::Uc2 => "UC2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UcBoard {
    variant: UcVariant,
    /// UC-2 register A (bank). Unused on UC-1.
    reg_a: u8,
    /// UC-1 register, or UC-2 register B.
    reg_b: u8,
    bank_mask: usize,
    config: CartridgeConfig,
    ram: Vec<u8>,
}

impl UcBoard {
    #[must_use]
    pub fn new(variant: UcVariant, bank_mask: usize, options: &CartridgeOptions) -> Self {
        let mut board = Self {
            variant,
            reg_a: 0,
            reg_b: 0,
            bank_mask,
            config: CartridgeConfig::new(bank_mask),
            ram: options.ram_init.fill(variant.ram_size()),
        };
        board.apply();
        board
    }

    fn apply(&mut self) {
        let mut bits = ControlBits::decode_uc(self.reg_b);
        if self.variant != UcVariant::Uc1 {
            bits.bank_index = usize::from(self.reg_a);
        }
        self.config = CartridgeConfig::derive(&bits, &LINE_LEVEL, self.bank_mask, true);
    }

    /// Start of the 16K RAM window: RAM-L, then RAM-H at +$2000.
    fn ram_base(&self) -> usize {
        match self.variant {
            UcVariant::Uc1 => (self.config.bank_index & 1) << 14,
            _ => usize::from(self.reg_a) << 14,
        }
    }

    fn ram_index(&self, high: bool, addr: u16) -> usize {
        self.ram_base() + if high { 0x2000 } else { 0 } + (usize::from(addr) & 0x1FFF)
    }

    fn write_ram(&mut self, high: bool, addr: u16, value: u8) {
        if self.config.ram_write_enabled {
            let i = self.ram_index(high, addr);
            self.ram[i] = value;
        }
    }

    fn register_peek(&self, offset: u8) -> u8 {
        match self.variant {
            UcVariant::Uc1 => self.reg_b,
            UcVariant::Uc15 => DONT_CARE,
            UcVariant::Uc2 if self.config.io_visible => match offset & 3 {
                2 => self.reg_a,
                3 => self.reg_b,
                _ => DONT_CARE,
            },
            UcVariant::Uc2 => DONT_CARE,
        }
    }
}

impl Board for UcBoard {
    fn kind(&self) -> CartridgeKind {
        match self.variant {
            UcVariant::Uc1 => CartridgeKind::Uc1,
            UcVariant::Uc15 => CartridgeKind::Uc15,
            UcVariant::Uc2 => CartridgeKind::Uc2,
        }
    }

    fn config(&self) -> &CartridgeConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.reg_a = 0;
        self.reg_b = 0;
        self.apply();
    }

    fn io_store(&mut self, window: IoWindow, offset: u8, value: u8) {
        if window != IoWindow::Io1 || !self.config.io_visible {
            return;
        }
        match (self.variant, offset & 3) {
            (UcVariant::Uc1, _) => self.reg_b = value,
            (_, 2) => self.reg_a = value & 0x1F,
            (_, 3) => self.reg_b = value,
            _ => return,
        }
        self.apply();
        debug!("{}", self.dump());
    }

    fn io_read(&mut self, window: IoWindow, offset: u8) -> Option<u8> {
        if window != IoWindow::Io1 {
            return None;
        }
        match self.variant {
            UcVariant::Uc1 => Some(0),
            _ => Some(self.register_peek(offset)),
        }
    }

    fn io_peek(&self, window: IoWindow, offset: u8) -> Option<u8> {
        (window == IoWindow::Io1).then(|| self.register_peek(offset))
    }

    fn roml_peek(&self, region: &BankRegion, addr: u16) -> u8 {
        if self.config.ram_selected {
            self.ram[self.ram_index(false, addr)]
        } else {
            region.read_roml(self.config.bank_index, addr)
        }
    }

    fn roml_store(&mut self, _region: &mut BankRegion, addr: u16, value: u8) {
        self.write_ram(false, addr, value);
    }

    fn romh_peek(&self, region: &BankRegion, addr: u16) -> u8 {
        if self.config.ram_selected {
            self.ram[self.ram_index(true, addr)]
        } else {
            region.read_romh(self.config.bank_index, addr)
        }
    }

    fn romh_store(&mut self, _region: &mut BankRegion, addr: u16, value: u8) {
        self.write_ram(true, addr, value);
    }

    fn ram_store(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000..=0x5FFF => self.write_ram(false, addr, value),
            0x6000..=0x7FFF => self.write_ram(true, addr, value),
            _ => {}
        }
    }

    fn dump(&self) -> String {
        let value = if self.variant == UcVariant::Uc1 {
            format!("{:02x}", self.reg_b)
        } else {
            format!("{:02x}/{:02x}", self.reg_a, self.reg_b)
        };
        format!(
            "{} reg: {} (bank: {} ({} banks), {}, {}, {}, {}, {}, {})",
            self.variant.label(),
            value,
            self.config.bank_index,
            self.bank_mask + 1,
            if self.reg_b & 0x80 != 0 { "EXROM" } else { "/EXROM" },
            if self.reg_b & 0x40 != 0 { "GAME" } else { "/GAME" },
            self.config.mode,
            if self.reg_b & 0x20 != 0 { "RAM" } else { "ROM" },
            if self.reg_b & 0x10 != 0 {
                "write enabled"
            } else {
                "write disabled"
            },
            if self.config.io_visible {
                "IO enabled"
            } else {
                "IO disabled"
            },
        )
    }

    fn module(&self) -> ModuleVersion {
        let name = match self.variant {
            UcVariant::Uc1 => "CARTUC1",
            UcVariant::Uc15 | UcVariant::Uc2 => "CARTUC2",
        };
        ModuleVersion {
            name,
            major: 0,
            minor: 2,
        }
    }

    fn registers(&self) -> Vec<u8> {
        match self.variant {
            UcVariant::Uc1 => vec![self.reg_b],
            UcVariant::Uc15 | UcVariant::Uc2 => vec![self.reg_a, self.reg_b],
        }
    }

    fn restore_registers(&mut self, registers: &[u8]) {
        match (self.variant, registers) {
            (UcVariant::Uc1, [b, ..]) => self.reg_b = *b,
            (_, [a, b, ..]) => {
                self.reg_a = *a & 0x1F;
                self.reg_b = *b;
            }
            _ => {}
        }
        self.apply();
    }

    fn cart_ram(&self) -> Option<&[u8]> {
        Some(&self.ram)
    }

    fn cart_ram_mut(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.ram)
    }
}
