//! Per-family register decode and ROM/RAM routing.
//!
//! Each family implements [`Board`]. The cartridge owns the bank storage
//! and passes it in on every access, so a board holds only its registers,
//! the derived [`CartridgeConfig`] and any RAM or flash state.

mod easyflash;
mod generic;
mod magic_desk;
mod megabyter;
mod ocean;
mod uc;

use std::fmt;

use nor_flash::{FlashDevice, FlashType};

use crate::bank::{BANK_SIZE, BankRegion};
use crate::config::CartridgeOptions;
use crate::kind::CartridgeKind;
use crate::mapping::CartridgeConfig;
use crate::mode::AddressMode;

pub use easyflash::EasyFlashBoard;
pub use generic::GenericBoard;
pub use magic_desk::MagicDeskBoard;
pub use megabyter::MegabyterBoard;
pub use ocean::OceanBoard;
pub use uc::{UcBoard, UcVariant};

/// Value returned for registers the hardware does not drive on read.
pub const DONT_CARE: u8 = 0xFF;

/// The two 256-byte I/O pages on the expansion port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoWindow {
    /// $DE00-$DEFF
    Io1,
    /// $DF00-$DFFF
    Io2,
}

impl IoWindow {
    #[must_use]
    pub fn base(self) -> u16 {
        match self {
            Self::Io1 => 0xDE00,
            Self::Io2 => 0xDF00,
        }
    }

    /// Window and offset for a full address, if it falls in one.
    #[must_use]
    pub fn from_addr(addr: u16) -> Option<(Self, u8)> {
        match addr & 0xFF00 {
            0xDE00 => Some((Self::Io1, addr as u8)),
            0xDF00 => Some((Self::Io2, addr as u8)),
            _ => None,
        }
    }
}

/// Snapshot module name and version of a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleVersion {
    pub name: &'static str,
    pub major: u8,
    pub minor: u8,
}

/// Which bank array a flash chip uses as its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashBus {
    Roml,
    Romh,
}

/// A flash chip wired to ROML or ROMH.
#[derive(Debug, Clone)]
pub struct FlashChip {
    pub module: &'static str,
    pub bus: FlashBus,
    pub device: FlashDevice,
}

impl FlashChip {
    #[must_use]
    pub fn new(module: &'static str, bus: FlashBus, flash_type: FlashType) -> Self {
        Self {
            module,
            bus,
            device: FlashDevice::new(flash_type),
        }
    }

    /// Chip address for a CPU access in the given bank.
    #[must_use]
    pub fn address(bank: usize, addr: u16) -> u32 {
        (bank * BANK_SIZE + (usize::from(addr) & (BANK_SIZE - 1))) as u32
    }

    fn cells<'a>(&self, region: &'a BankRegion) -> &'a [u8] {
        match self.bus {
            FlashBus::Roml => region.roml(),
            FlashBus::Romh => region.romh(),
        }
    }

    fn cells_mut<'a>(&self, region: &'a mut BankRegion) -> &'a mut [u8] {
        match self.bus {
            FlashBus::Roml => region.roml_mut(),
            FlashBus::Romh => region.romh_mut(),
        }
    }

    pub fn read(&mut self, region: &BankRegion, bank: usize, addr: u16) -> u8 {
        let cells = self.cells(region);
        self.device.read(cells, Self::address(bank, addr))
    }

    #[must_use]
    pub fn peek(&self, region: &BankRegion, bank: usize, addr: u16) -> u8 {
        self.device.peek(self.cells(region), Self::address(bank, addr))
    }

    pub fn store(&mut self, region: &mut BankRegion, bank: usize, addr: u16, value: u8) {
        let cells = self.cells_mut(region);
        self.device.store(cells, Self::address(bank, addr), value);
    }

    pub fn store_rmw(&mut self, region: &mut BankRegion, bank: usize, addr: u16, value: u8) {
        let cells = self.cells_mut(region);
        self.device.store_rmw(cells, Self::address(bank, addr), value);
    }

    pub fn clock(&mut self, region: &mut BankRegion, cycles: u32) {
        let cells = self.cells_mut(region);
        self.device.clock(cells, cycles);
    }
}

/// Register decode and memory routing for one cartridge family.
///
/// Bus-side calls never fail. Anything the hardware would ignore is
/// ignored; reads of undriven registers return `None` so the caller can
/// substitute the open-bus value.
pub trait Board: fmt::Debug {
    fn kind(&self) -> CartridgeKind;

    /// Current address-space state. Always consistent: every register
    /// write replaces it in one assignment.
    fn config(&self) -> &CartridgeConfig;

    /// Machine reset (`config_init`).
    fn reset(&mut self);

    fn io_store(&mut self, window: IoWindow, offset: u8, value: u8);

    /// Bus read of an I/O page. May have side effects.
    fn io_read(&mut self, _window: IoWindow, _offset: u8) -> Option<u8> {
        None
    }

    /// Debugger read of an I/O page.
    fn io_peek(&self, _window: IoWindow, _offset: u8) -> Option<u8> {
        None
    }

    fn roml_read(&mut self, region: &BankRegion, addr: u16) -> u8 {
        self.roml_peek(region, addr)
    }

    fn roml_peek(&self, region: &BankRegion, addr: u16) -> u8 {
        region.read_roml(self.config().bank_index, addr)
    }

    /// Write to $8000-$9FFF while the CPU sees Ultimax.
    fn roml_store(&mut self, _region: &mut BankRegion, _addr: u16, _value: u8) {}

    /// Write cycle of a read-modify-write instruction at $8000-$9FFF.
    /// Only flash sees the unmodified value written back first.
    fn roml_store_rmw(&mut self, region: &mut BankRegion, addr: u16, value: u8) {
        self.roml_store(region, addr, value);
    }

    fn romh_read(&mut self, region: &BankRegion, addr: u16) -> u8 {
        self.romh_peek(region, addr)
    }

    fn romh_peek(&self, region: &BankRegion, addr: u16) -> u8 {
        region.read_romh(self.config().bank_index, addr)
    }

    fn romh_store(&mut self, _region: &mut BankRegion, _addr: u16, _value: u8) {}

    fn romh_store_rmw(&mut self, region: &mut BankRegion, addr: u16, value: u8) {
        self.romh_store(region, addr, value);
    }

    /// Write to $1000-$7FFF while fake Ultimax is active. The value also
    /// goes to C64 RAM; this only updates cartridge RAM.
    fn ram_store(&mut self, _addr: u16, _value: u8) {}

    /// Advance flash timers.
    fn clock(&mut self, region: &mut BankRegion, cycles: u32) {
        for chip in self.flash_chips_mut() {
            chip.clock(region, cycles);
        }
    }

    /// One-line state summary for the monitor.
    fn dump(&self) -> String;

    fn module(&self) -> ModuleVersion;

    /// Raw register bytes, in snapshot order.
    fn registers(&self) -> Vec<u8>;

    /// Load register bytes from a snapshot and re-derive the config.
    /// `registers` has the same length [`Board::registers`] returns.
    fn restore_registers(&mut self, registers: &[u8]);

    fn cart_ram(&self) -> Option<&[u8]> {
        None
    }

    fn cart_ram_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn flash_chips(&self) -> &[FlashChip] {
        &[]
    }

    fn flash_chips_mut(&mut self) -> &mut [FlashChip] {
        &mut []
    }
}

/// Build the board for `kind`.
///
/// `image_mode` is the mode from the image header; fixed-mode and
/// Ocean/Magic Desk boards use it. `bank_mask` limits register bank
/// numbers to the populated banks.
#[must_use]
pub fn create(
    kind: CartridgeKind,
    image_mode: AddressMode,
    bank_mask: usize,
    options: &CartridgeOptions,
) -> Box<dyn Board> {
    let mut board: Box<dyn Board> = match kind {
        CartridgeKind::Generic8k | CartridgeKind::Generic16k | CartridgeKind::Ultimax => {
            Box::new(GenericBoard::new(kind))
        }
        CartridgeKind::Ocean => Box::new(OceanBoard::new(image_mode, bank_mask)),
        CartridgeKind::MagicDesk => Box::new(MagicDeskBoard::new(bank_mask)),
        CartridgeKind::EasyFlash => Box::new(EasyFlashBoard::new(options)),
        CartridgeKind::Uc1 => Box::new(UcBoard::new(UcVariant::Uc1, bank_mask, options)),
        CartridgeKind::Uc15 => Box::new(UcBoard::new(UcVariant::Uc15, bank_mask, options)),
        CartridgeKind::Uc2 => Box::new(UcBoard::new(UcVariant::Uc2, bank_mask, options)),
        CartridgeKind::Megabyter => Box::new(MegabyterBoard::new()),
    };
    board.reset();
    board
}
