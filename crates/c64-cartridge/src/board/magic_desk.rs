//! Magic Desk and compatible 8K bank-switched ROM.

use log::debug;

use super::{Board, IoWindow, ModuleVersion};
use crate::kind::CartridgeKind;
use crate::mapping::CartridgeConfig;
use crate::mode::AddressMode;

/// $DE00: bits 0-6 bank, bit 7 switches the cartridge off.
#[derive(Debug, Clone)]
pub struct MagicDeskBoard {
    register: u8,
    config: CartridgeConfig,
}

impl MagicDeskBoard {
    #[must_use]
    pub fn new(bank_mask: usize) -> Self {
        Self {
            register: 0,
            config: CartridgeConfig::new(bank_mask),
        }
    }

    fn apply(&mut self) {
        let mode = if self.register & 0x80 == 0 {
            AddressMode::Game8k
        } else {
            AddressMode::RamOnly
        };
        self.config = CartridgeConfig {
            mode,
            bank_index: usize::from(self.register & 0x7F) & self.config.bank_mask,
            ..self.config
        };
    }
}

impl Board for MagicDeskBoard {
    fn kind(&self) -> CartridgeKind {
        CartridgeKind::MagicDesk
    }

    fn config(&self) -> &CartridgeConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.register = 0;
        self.apply();
    }

    fn io_store(&mut self, window: IoWindow, _offset: u8, value: u8) {
        if window == IoWindow::Io1 {
            self.register = value;
            self.apply();
            debug!(
                "Magic Desk: bank {}, {}",
                self.config.bank_index, self.config.mode
            );
        }
    }

    fn io_peek(&self, window: IoWindow, _offset: u8) -> Option<u8> {
        (window == IoWindow::Io1).then_some(self.register)
    }

    fn dump(&self) -> String {
        format!(
            "bank: {} of {}, cartridge {}",
            self.config.bank_index,
            self.config.bank_mask + 1,
            if self.config.mode == AddressMode::RamOnly {
                "disabled"
            } else {
                "enabled"
            }
        )
    }

    fn module(&self) -> ModuleVersion {
        ModuleVersion {
            name: "CARTMAGICDESK",
            major: 0,
            minor: 0,
        }
    }

    fn registers(&self) -> Vec<u8> {
        vec![self.register]
    }

    fn restore_registers(&mut self, registers: &[u8]) {
        self.register = registers.first().copied().unwrap_or(0);
        self.apply();
    }
}
