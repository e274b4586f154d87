//! The expansion port: at most one cartridge, seen by the bus.

use log::info;

use crate::cartridge::{CartRead, CartWrite, Cartridge};
use crate::config::CartridgeOptions;
use crate::error::Result;
use crate::mode::AddressMode;
use crate::snapshot::{HEADER_MODULE, SnapshotReader, SnapshotWriter};

/// Expansion port slot.
#[derive(Debug, Default)]
pub struct ExpansionPort {
    cartridge: Option<Cartridge>,
}

impl ExpansionPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in `cart`, returning whatever was there before. The caller
    /// owns the old cartridge and should [`Cartridge::detach`] it.
    #[must_use = "the previous cartridge has not been detached"]
    pub fn attach(&mut self, cart: Cartridge) -> Option<Cartridge> {
        self.cartridge.replace(cart)
    }

    /// Unplug the cartridge, flushing it if its options ask for that.
    pub fn detach(&mut self) -> Result<()> {
        match self.cartridge.take() {
            Some(cart) => cart.detach(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cartridge.is_none()
    }

    /// Mode the CPU sees; an empty port leaves both lines high.
    #[must_use]
    pub fn cpu_mode(&self) -> AddressMode {
        self.cartridge
            .as_ref()
            .map_or(AddressMode::RamOnly, Cartridge::cpu_mode)
    }

    #[must_use]
    pub fn vic_mode(&self) -> AddressMode {
        self.cartridge
            .as_ref()
            .map_or(AddressMode::RamOnly, Cartridge::vic_mode)
    }

    pub fn read(&mut self, addr: u16) -> CartRead {
        match &mut self.cartridge {
            Some(cart) => cart.read(addr),
            None if matches!(addr, 0xDE00..=0xDFFF) => CartRead::OpenBus,
            None => CartRead::Ram,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) -> CartWrite {
        match &mut self.cartridge {
            Some(cart) => cart.write(addr, value),
            None if matches!(addr, 0xDE00..=0xDFFF) => CartWrite::OpenBus,
            None => CartWrite::Ram,
        }
    }

    #[must_use]
    pub fn peek(&self, addr: u16) -> Option<u8> {
        self.cartridge.as_ref().and_then(|cart| cart.peek(addr))
    }

    /// Machine reset.
    pub fn reset(&mut self) {
        if let Some(cart) = &mut self.cartridge {
            cart.config_init();
        }
    }

    pub fn clock(&mut self, cycles: u32) {
        if let Some(cart) = &mut self.cartridge {
            cart.clock(cycles);
        }
    }

    pub fn save_snapshot(&self, writer: &mut SnapshotWriter) {
        if let Some(cart) = &self.cartridge {
            cart.save_snapshot(writer);
        }
    }

    /// Restore the port from a snapshot, building the new cartridge with
    /// `options`. The new cartridge is built and the old one written back
    /// before anything is swapped, so on error nothing changes. A snapshot
    /// without cartridge modules empties the port.
    pub fn load_snapshot(
        &mut self,
        reader: &SnapshotReader,
        options: CartridgeOptions,
    ) -> Result<()> {
        if !reader.modules().iter().any(|m| m.name == HEADER_MODULE) {
            if let Some(cart) = &mut self.cartridge {
                cart.write_back()?;
            }
            self.cartridge = None;
            info!("Snapshot has no cartridge, port emptied");
            return Ok(());
        }
        let restored = Cartridge::from_snapshot(reader, options)?;
        match &mut self.cartridge {
            Some(cart) => cart.replace_with(restored),
            None => {
                self.cartridge = Some(restored);
                Ok(())
            }
        }
    }
}
