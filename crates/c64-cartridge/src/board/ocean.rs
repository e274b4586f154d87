//! Ocean bank-switched ROM.

use log::debug;

use super::{Board, IoWindow, ModuleVersion};
use crate::kind::CartridgeKind;
use crate::mapping::CartridgeConfig;
use crate::mode::AddressMode;

/// Up to 64 x 8K banks. Any write to IO1 selects `value & 0x3F`; the
/// mode never changes after attach.
#[derive(Debug, Clone)]
pub struct OceanBoard {
    register: u8,
    config: CartridgeConfig,
}

impl OceanBoard {
    #[must_use]
    pub fn new(mode: AddressMode, bank_mask: usize) -> Self {
        Self {
            register: 0,
            config: CartridgeConfig {
                mode,
                ..CartridgeConfig::new(bank_mask)
            },
        }
    }

    fn apply(&mut self) {
        self.config = CartridgeConfig {
            bank_index: usize::from(self.register) & self.config.bank_mask,
            ..self.config
        };
    }
}

impl Board for OceanBoard {
    fn kind(&self) -> CartridgeKind {
        CartridgeKind::Ocean
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
            self.register = value & 0x3F;
            self.apply();
            debug!("Ocean: bank {}", self.config.bank_index);
        }
    }

    fn io_peek(&self, window: IoWindow, _offset: u8) -> Option<u8> {
        (window == IoWindow::Io1).then_some(self.register)
    }

    fn dump(&self) -> String {
        format!(
            "bank: {} of {}, mode: {}",
            self.config.bank_index,
            self.config.bank_mask + 1,
            self.config.mode
        )
    }

    fn module(&self) -> ModuleVersion {
        ModuleVersion {
            name: "CARTOCEAN",
            major: 0,
            minor: 1,
        }
    }

    fn registers(&self) -> Vec<u8> {
        vec![self.register]
    }

    fn restore_registers(&mut self, registers: &[u8]) {
        self.register = registers.first().copied().unwrap_or(0) & 0x3F;
        self.apply();
    }
}
