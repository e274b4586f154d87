//! Plain ROM cartridges without registers.

use super::{Board, IoWindow, ModuleVersion};
use crate::kind::CartridgeKind;
use crate::mapping::CartridgeConfig;
use crate::mode::AddressMode;

/// 8K, 16K or Ultimax ROM, one bank, mode fixed by the image.
#[derive(Debug, Clone)]
pub struct GenericBoard {
    kind: CartridgeKind,
    config: CartridgeConfig,
}

impl GenericBoard {
    #[must_use]
    pub fn new(kind: CartridgeKind) -> Self {
        let mode = match kind {
            CartridgeKind::Generic16k => AddressMode::Game16k,
            CartridgeKind::Ultimax => AddressMode::Ultimax,
            _ => AddressMode::Game8k,
        };
        Self {
            kind,
            config: CartridgeConfig::fixed(mode),
        }
    }
}

impl Board for GenericBoard {
    fn kind(&self) -> CartridgeKind {
        self.kind
    }

    fn config(&self) -> &CartridgeConfig {
        &self.config
    }

    fn reset(&mut self) {}

    fn io_store(&mut self, _window: IoWindow, _offset: u8, _value: u8) {}

    fn dump(&self) -> String {
        format!("{}, mode: {}", self.kind, self.config.mode)
    }

    fn module(&self) -> ModuleVersion {
        ModuleVersion {
            name: "CARTGENERIC",
            major: 0,
            minor: 0,
        }
    }

    fn registers(&self) -> Vec<u8> {
        Vec::new()
    }

    fn restore_registers(&mut self, _registers: &[u8]) {}
}
