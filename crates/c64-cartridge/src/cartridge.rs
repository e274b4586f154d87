//! One attached cartridge: bank storage, register board and export.
//!
//! The machine calls [`Cartridge::read`] and [`Cartridge::write`] for
//! every CPU access; the answer says whether the cartridge drives the
//! bus, the machine's own RAM/ROM/IO answers, or nothing does.

use std::fs;
use std::path::{Path, PathBuf};

use format_crt::{ChipPacket, ChipType, CrtImage};
use log::{debug, info, warn};

use crate::bank::{BankRegion, bank_mask_for};
use crate::board::{self, Board, IoWindow};
use crate::config::CartridgeOptions;
use crate::error::{CartridgeError, Result};
use crate::image::{ImageFormat, RawCartridge, load_image};
use crate::kind::{CartridgeKind, RawLayout};
use crate::mapping::CartridgeConfig;
use crate::mode::AddressMode;
use crate::snapshot::{self, CartridgeState, SnapshotReader, SnapshotWriter};

/// Result of a CPU read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartRead {
    /// The cartridge drives the bus.
    Cart(u8),
    /// The machine answers: RAM, KERNAL/BASIC ROM or I/O chips.
    Ram,
    /// Nothing drives the bus (Ultimax holes, undriven registers).
    OpenBus,
}

/// Where a CPU write went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartWrite {
    /// The machine takes the write.
    Ram,
    /// The cartridge took the write (register, RAM or flash).
    Cart,
    /// Nothing is mapped; the write is lost.
    OpenBus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Roml,
    Romh,
    Io(IoWindow, u8),
    Ram,
    OpenBus,
}

fn in_ultimax_hole(addr: u16) -> bool {
    matches!(addr, 0x1000..=0x7FFF | 0xC000..=0xCFFF)
}

fn read_route(config: &CartridgeConfig, addr: u16) -> Route {
    let ultimax = config.cpu_mode() == AddressMode::Ultimax;
    if let Some((window, offset)) = IoWindow::from_addr(addr) {
        return Route::Io(window, offset);
    }
    match addr {
        _ if in_ultimax_hole(addr) && ultimax => {
            if config.fake_ultimax_ram {
                Route::Ram
            } else {
                Route::OpenBus
            }
        }
        0x8000..=0x9FFF if config.cpu_mode().roml_visible() => Route::Roml,
        0xA000..=0xBFFF => match config.mode {
            AddressMode::Game16k => Route::Romh,
            AddressMode::Ultimax => Route::OpenBus,
            _ => Route::Ram,
        },
        0xE000..=0xFFFF if ultimax && config.romh_visible() => Route::Romh,
        _ => Route::Ram,
    }
}

fn write_route(config: &CartridgeConfig, addr: u16) -> Route {
    let ultimax = config.cpu_mode() == AddressMode::Ultimax;
    if let Some((window, offset)) = IoWindow::from_addr(addr) {
        return Route::Io(window, offset);
    }
    match addr {
        // Fake Ultimax: C64 RAM takes the write, cartridge RAM snoops it.
        _ if in_ultimax_hole(addr) && ultimax && !config.fake_ultimax_ram => Route::OpenBus,
        0x8000..=0x9FFF if ultimax => Route::Roml,
        0xA000..=0xBFFF if config.fake_ultimax_ram => Route::Romh,
        0xA000..=0xBFFF if ultimax => Route::OpenBus,
        0xE000..=0xFFFF if ultimax => Route::Romh,
        _ => Route::Ram,
    }
}

/// An attached cartridge.
#[derive(Debug)]
pub struct Cartridge {
    kind: CartridgeKind,
    name: String,
    region: BankRegion,
    board: Box<dyn Board>,
    options: CartridgeOptions,
    /// Banks populated by the image, used for export.
    image_banks: usize,
    image_mode: AddressMode,
    format: ImageFormat,
    source: Option<PathBuf>,
}

impl Cartridge {
    /// Build a cartridge from a validated image (`config_setup`).
    pub fn attach(raw: RawCartridge, options: CartridgeOptions) -> Result<Self> {
        let mut region = BankRegion::allocate(raw.bank_count)?;
        region.load_interleaved(&raw.data);
        region.set_bank_mask(bank_mask_for(raw.bank_count));
        let board = board::create(raw.kind, raw.mode, region.bank_mask(), &options);

        info!(
            "Attached {} \"{}\": {} banks, mask ${:02X}, {}",
            raw.kind,
            raw.name,
            raw.bank_count,
            region.bank_mask(),
            board.config().mode
        );
        Ok(Self {
            kind: raw.kind,
            name: raw.name,
            region,
            board,
            options,
            image_banks: raw.bank_count,
            image_mode: raw.mode,
            format: raw.format,
            source: None,
        })
    }

    /// Load and attach an in-memory image. CRT files carry their own type;
    /// raw binaries need `kind` unless they are a plain 8K or 16K dump.
    pub fn from_bytes(
        data: &[u8],
        kind: Option<CartridgeKind>,
        options: CartridgeOptions,
    ) -> Result<Self> {
        Self::attach(load_image(data, kind)?, options)
    }

    /// Load and attach an image file. The file becomes the write-back
    /// target for [`Cartridge::detach`].
    pub fn open(
        path: impl AsRef<Path>,
        kind: Option<CartridgeKind>,
        options: CartridgeOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut cart = Self::from_bytes(&data, kind, options)?;
        cart.source = Some(path.to_path_buf());
        Ok(cart)
    }

    /// Machine reset (`config_init`). Flash contents survive.
    pub fn config_init(&mut self) {
        self.board.reset();
        debug!("{}: reset, {}", self.kind, self.board.config().mode);
    }

    /// Release the cartridge, writing modified flash back to its image
    /// first when `write_back` is set.
    pub fn detach(mut self) -> Result<()> {
        self.write_back()?;
        info!("Detached {} \"{}\"", self.kind, self.name);
        Ok(())
    }

    /// Flush modified flash to the image file if `write_back` is set.
    /// Nothing else changes, so on error the cartridge stays usable.
    pub(crate) fn write_back(&mut self) -> Result<()> {
        if self.options.write_back && self.is_dirty() {
            let path = self.source.clone().ok_or_else(|| {
                warn!("{}: flash modified but there is no image file", self.kind);
                CartridgeError::NoBackingFile
            })?;
            self.flush(&path)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn kind(&self) -> CartridgeKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &CartridgeConfig {
        self.board.config()
    }

    /// Nominal mode, as set by the registers.
    #[must_use]
    pub fn mode(&self) -> AddressMode {
        self.board.config().mode
    }

    #[must_use]
    pub fn cpu_mode(&self) -> AddressMode {
        self.board.config().cpu_mode()
    }

    #[must_use]
    pub fn vic_mode(&self) -> AddressMode {
        self.board.config().vic_mode()
    }

    #[must_use]
    pub fn bank_mask(&self) -> usize {
        self.region.bank_mask()
    }

    #[must_use]
    pub fn region(&self) -> &BankRegion {
        &self.region
    }

    #[must_use]
    pub fn board(&self) -> &dyn Board {
        self.board.as_ref()
    }

    #[must_use]
    pub fn options(&self) -> &CartridgeOptions {
        &self.options
    }

    #[must_use]
    pub fn image_banks(&self) -> usize {
        self.image_banks
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// True if flash contents changed since attach or the last flush.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.board.flash_chips().iter().any(|c| c.device.is_dirty())
    }

    pub fn roml_read(&mut self, addr: u16) -> u8 {
        self.board.roml_read(&self.region, addr)
    }

    pub fn roml_store(&mut self, addr: u16, value: u8) {
        self.board.roml_store(&mut self.region, addr, value);
    }

    pub fn romh_read(&mut self, addr: u16) -> u8 {
        self.board.romh_read(&self.region, addr)
    }

    pub fn romh_store(&mut self, addr: u16, value: u8) {
        self.board.romh_store(&mut self.region, addr, value);
    }

    pub fn io_store(&mut self, window: IoWindow, offset: u8, value: u8) {
        self.board.io_store(window, offset, value);
    }

    pub fn io_read(&mut self, window: IoWindow, offset: u8) -> Option<u8> {
        self.board.io_read(window, offset)
    }

    #[must_use]
    pub fn io_peek(&self, window: IoWindow, offset: u8) -> Option<u8> {
        self.board.io_peek(window, offset)
    }

    /// CPU read anywhere in the 64K map.
    pub fn read(&mut self, addr: u16) -> CartRead {
        match read_route(self.board.config(), addr) {
            Route::Roml => CartRead::Cart(self.board.roml_read(&self.region, addr)),
            Route::Romh => CartRead::Cart(self.board.romh_read(&self.region, addr)),
            Route::Io(window, offset) => self
                .board
                .io_read(window, offset)
                .map_or(CartRead::OpenBus, CartRead::Cart),
            Route::Ram => CartRead::Ram,
            Route::OpenBus => CartRead::OpenBus,
        }
    }

    /// Side-effect-free read. `None` when the cartridge does not drive
    /// the address.
    #[must_use]
    pub fn peek(&self, addr: u16) -> Option<u8> {
        match read_route(self.board.config(), addr) {
            Route::Roml => Some(self.board.roml_peek(&self.region, addr)),
            Route::Romh => Some(self.board.romh_peek(&self.region, addr)),
            Route::Io(window, offset) => self.board.io_peek(window, offset),
            Route::Ram | Route::OpenBus => None,
        }
    }

    /// CPU write anywhere in the 64K map.
    pub fn write(&mut self, addr: u16, value: u8) -> CartWrite {
        self.store(addr, value, false)
    }

    /// Write cycle of a read-modify-write instruction (INC, ASL, ...).
    /// A flash chip first sees the value the CPU read written back.
    pub fn write_rmw(&mut self, addr: u16, value: u8) -> CartWrite {
        self.store(addr, value, true)
    }

    fn store(&mut self, addr: u16, value: u8, rmw: bool) -> CartWrite {
        match write_route(self.board.config(), addr) {
            Route::Roml => {
                if rmw {
                    self.board.roml_store_rmw(&mut self.region, addr, value);
                } else {
                    self.board.roml_store(&mut self.region, addr, value);
                }
                CartWrite::Cart
            }
            Route::Romh => {
                if rmw {
                    self.board.romh_store_rmw(&mut self.region, addr, value);
                } else {
                    self.board.romh_store(&mut self.region, addr, value);
                }
                CartWrite::Cart
            }
            Route::Io(window, offset) => {
                self.board.io_store(window, offset, value);
                CartWrite::Cart
            }
            Route::Ram => {
                if self.board.config().fake_ultimax_ram && in_ultimax_hole(addr) {
                    self.board.ram_store(addr, value);
                }
                CartWrite::Ram
            }
            Route::OpenBus => CartWrite::OpenBus,
        }
    }

    /// Advance flash timers by `cycles` CPU cycles.
    pub fn clock(&mut self, cycles: u32) {
        self.board.clock(&mut self.region, cycles);
    }

    /// Monitor summary.
    #[must_use]
    pub fn dump(&self) -> String {
        self.board.dump()
    }

    pub fn save_snapshot(&self, writer: &mut SnapshotWriter) {
        snapshot::write(
            writer,
            &CartridgeState {
                kind: self.kind,
                name: &self.name,
                image_banks: self.image_banks,
                image_mode: self.image_mode,
                region: &self.region,
                board: self.board.as_ref(),
            },
        );
        info!("Saved {} snapshot", self.kind);
    }

    /// Build a cartridge from a snapshot. It has no image file.
    pub fn from_snapshot(reader: &SnapshotReader, options: CartridgeOptions) -> Result<Self> {
        let restored = snapshot::read(reader, &options)?;
        info!(
            "Restored {} \"{}\" from snapshot, {}",
            restored.kind,
            restored.name,
            restored.board.config().mode
        );
        Ok(Self {
            kind: restored.kind,
            name: restored.name,
            region: restored.region,
            board: restored.board,
            options,
            image_banks: restored.image_banks,
            image_mode: restored.image_mode,
            format: ImageFormat::Crt,
            source: None,
        })
    }

    /// Replace this cartridge's state with the snapshot's. On error the
    /// cartridge is unchanged.
    pub fn load_snapshot(&mut self, reader: &SnapshotReader) -> Result<()> {
        let restored = Self::from_snapshot(reader, self.options.clone())?;
        self.replace_with(restored)
    }

    /// Swap `next` in, writing this cartridge back first. A cartridge of
    /// the same family keeps this one's image file.
    pub(crate) fn replace_with(&mut self, mut next: Self) -> Result<()> {
        self.write_back()?;
        if next.kind == self.kind {
            next.source = self.source.take();
            next.format = self.format;
        }
        info!("Detached {} \"{}\"", self.kind, self.name);
        *self = next;
        Ok(())
    }

    /// Raw image in the family's raw layout.
    #[must_use]
    pub fn to_bin(&self) -> Vec<u8> {
        let region = &self.region;
        match self.kind {
            CartridgeKind::Generic8k => region.bank(false, 0).to_vec(),
            CartridgeKind::Ultimax if is_blank(region.bank(false, 0)) => {
                region.bank(true, 0).to_vec()
            }
            _ => match self.kind.raw_layout() {
                RawLayout::Interleaved => region.to_interleaved(self.image_banks),
                RawLayout::LinearRoml => (0..self.image_banks)
                    .flat_map(|bank| region.bank(false, bank).iter().copied())
                    .collect(),
            },
        }
    }

    /// CRT image. Flash carts use chip type 2; with `optimize_crt` their
    /// erased banks are left out.
    #[must_use]
    pub fn to_crt(&self) -> Vec<u8> {
        let (exrom, game) = self.kind.crt_lines(self.image_mode);
        let mut image = CrtImage::new(self.kind.crt_id(), exrom, game, &self.name);
        let chip_type = if self.kind.has_flash() {
            ChipType::Flash
        } else {
            ChipType::Rom
        };
        let skip_blank = self.kind.has_flash() && self.options.optimize_crt;

        for bank in 0..self.image_banks {
            let roml = self.region.bank(false, bank);
            let romh = self.region.bank(true, bank);
            let mut chips: Vec<(u16, Vec<u8>)> = Vec::with_capacity(2);
            match self.kind {
                CartridgeKind::Generic8k
                | CartridgeKind::MagicDesk
                | CartridgeKind::Megabyter => chips.push((0x8000, roml.to_vec())),
                CartridgeKind::Ultimax if is_blank(roml) => chips.push((0xE000, romh.to_vec())),
                CartridgeKind::Generic16k
                | CartridgeKind::Ultimax
                | CartridgeKind::Uc1
                | CartridgeKind::Uc15
                | CartridgeKind::Uc2 => chips.push((0x8000, [roml, romh].concat())),
                CartridgeKind::Ocean => {
                    chips.push((0x8000, roml.to_vec()));
                    if !is_blank(romh) {
                        chips.push((0xA000, romh.to_vec()));
                    }
                }
                CartridgeKind::EasyFlash => {
                    chips.push((0x8000, roml.to_vec()));
                    chips.push((0xE000, romh.to_vec()));
                }
            }
            for (load_address, data) in chips {
                if skip_blank && is_blank(&data) {
                    continue;
                }
                image.push_chip(ChipPacket::new(chip_type, bank as u16, load_address, data));
            }
        }
        debug!("{}: CRT export, {} chips", self.kind, image.chips.len());
        image.to_bytes()
    }

    /// Write the image to `path` in `format`.
    pub fn save_as(&self, path: impl AsRef<Path>, format: ImageFormat) -> Result<()> {
        let bytes = match format {
            ImageFormat::Bin => self.to_bin(),
            ImageFormat::Crt => self.to_crt(),
        };
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Write the image back in the format it was attached from and mark
    /// the flash clean.
    pub fn flush(&mut self, path: &Path) -> Result<()> {
        self.save_as(path, self.format)?;
        for chip in self.board.flash_chips_mut() {
            chip.device.clear_dirty();
        }
        info!("{}: flushed to {}", self.kind, path.display());
        Ok(())
    }
}

fn is_blank(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::BANK_SIZE;
    use crate::image::load_bin;

    fn attach(kind: CartridgeKind, data: &[u8]) -> Cartridge {
        Cartridge::attach(load_bin(kind, data).expect("load"), CartridgeOptions::default())
            .expect("attach")
    }

    fn uc1() -> Cartridge {
        attach(CartridgeKind::Uc1, &vec![0x11; 64 * 1024])
    }

    #[test]
    fn sixteen_k_maps_both_halves() {
        let mut data = vec![0x11; 0x4000];
        data[0x2000] = 0x22;
        let mut cart = attach(CartridgeKind::Generic16k, &data);
        assert_eq!(cart.read(0x8000), CartRead::Cart(0x11));
        assert_eq!(cart.read(0xA000), CartRead::Cart(0x22));
        assert_eq!(cart.read(0xE000), CartRead::Ram);
        assert_eq!(cart.read(0x4000), CartRead::Ram);
        assert_eq!(cart.write(0x8000, 0), CartWrite::Ram);
        assert_eq!(cart.peek(0x8000), Some(0x11));
    }

    #[test]
    fn real_ultimax_has_holes() {
        let mut cart = attach(CartridgeKind::Ultimax, &[0x33; 0x2000]);
        assert_eq!(cart.read(0xE000), CartRead::Cart(0x33));
        assert_eq!(cart.read(0x4000), CartRead::OpenBus);
        assert_eq!(cart.read(0xC800), CartRead::OpenBus);
        assert_eq!(cart.read(0xA000), CartRead::OpenBus);
        assert_eq!(cart.read(0x0800), CartRead::Ram);
        assert_eq!(cart.write(0x4000, 1), CartWrite::OpenBus);
    }

    #[test]
    fn fake_ultimax_passes_ram_through() {
        let mut cart = uc1();
        // 16K, RAM selected, RAM writes enabled.
        cart.write(0xDE00, 0x30);
        assert_eq!(cart.mode(), AddressMode::Game16k);
        assert_eq!(cart.cpu_mode(), AddressMode::Ultimax);
        assert_eq!(cart.vic_mode(), AddressMode::Game16k);

        assert_eq!(cart.read(0x4000), CartRead::Ram);
        assert_eq!(cart.write(0x4010, 0x5A), CartWrite::Ram);
        assert_eq!(cart.read(0x8010), CartRead::Cart(0x5A));
        assert_eq!(cart.write(0x7010, 0xA5), CartWrite::Ram);
        assert_eq!(cart.read(0xA010), CartRead::Cart(0xA5));
        assert_eq!(cart.read(0xE010), CartRead::Cart(0xA5));
    }

    #[test]
    fn ocean_bank_switch_through_io() {
        let mut data = vec![0u8; 4 * BANK_SIZE];
        for (bank, chunk) in data.chunks_mut(BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut cart = attach(CartridgeKind::Ocean, &data);
        assert_eq!(cart.bank_mask(), 3);
        assert_eq!(cart.write(0xDE00, 2), CartWrite::Cart);
        assert_eq!(cart.read(0x8000), CartRead::Cart(2));
        // Bank 6 masks to 2.
        cart.write(0xDE00, 6);
        assert_eq!(cart.read(0x9FFF), CartRead::Cart(2));
    }

    #[test]
    fn reset_restores_power_up_mode() {
        let mut cart = uc1();
        cart.write(0xDE00, 0xC0);
        assert_eq!(cart.mode(), AddressMode::RamOnly);
        cart.config_init();
        assert_eq!(cart.mode(), AddressMode::Game16k);
    }

    #[test]
    fn raw_export_matches_input() {
        let data: Vec<u8> = (0..64 * 1024).map(|i| (i >> 8) as u8).collect();
        let cart = attach(CartridgeKind::MagicDesk, &data);
        assert_eq!(cart.to_bin(), data);

        let ultimax = attach(CartridgeKind::Ultimax, &[0x44; 0x2000]);
        assert_eq!(ultimax.to_bin(), vec![0x44; 0x2000]);
    }

    #[test]
    fn crt_export_skips_erased_flash() {
        let mut data = vec![0xFF; 1024 * 1024];
        data[..0x100].fill(0);
        let cart = attach(CartridgeKind::Megabyter, &data);
        let image = format_crt::parse_crt(&cart.to_crt()).expect("parse");
        assert_eq!(image.header.hw_type, 85);
        assert_eq!(image.chips.len(), 1);
        assert_eq!(image.chips[0].chip_type, ChipType::Flash);

        let cart = Cartridge::attach(
            load_bin(CartridgeKind::Megabyter, &data).expect("load"),
            CartridgeOptions {
                optimize_crt: false,
                ..CartridgeOptions::default()
            },
        )
        .expect("attach");
        let image = format_crt::parse_crt(&cart.to_crt()).expect("parse");
        assert_eq!(image.chips.len(), 128);
    }

    #[test]
    fn detach_without_file_needs_no_backing_when_clean() {
        let cart = Cartridge::attach(
            load_bin(CartridgeKind::EasyFlash, &vec![0xFF; 1024 * 1024]).expect("load"),
            CartridgeOptions {
                write_back: true,
                ..CartridgeOptions::default()
            },
        )
        .expect("attach");
        assert!(cart.detach().is_ok());
    }

    #[test]
    fn dirty_flash_without_file_cannot_be_written_back() {
        let mut cart = Cartridge::attach(
            load_bin(CartridgeKind::EasyFlash, &vec![0xFF; 1024 * 1024]).expect("load"),
            CartridgeOptions {
                write_back: true,
                ..CartridgeOptions::default()
            },
        )
        .expect("attach");
        // EasyFlash boots in Ultimax, so $8000 writes reach the ROML chip.
        cart.write(0x8555, 0xAA);
        cart.write(0x82AA, 0x55);
        cart.write(0x8555, 0xA0);
        cart.write(0x8000, 0x00);
        assert!(cart.is_dirty());
        assert!(matches!(cart.detach(), Err(CartridgeError::NoBackingFile)));
    }
}
