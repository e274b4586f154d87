//! Cartridge state in snapshot modules.
//!
//! A cartridge writes three kinds of module:
//!
//! ```text
//! CARTRIDGE 1.0     kind  crt_id:u16  image_banks:u32  image_mode  name_len:u16  name
//! <family>          registers  bank_mask:u32  bank_count:u32  roml  romh  [ram]
//! <flash chip> 2.1  state  base_state  program_byte  erase_mask:u32  last_read
//!                   countdown_present  countdown:u32  cmd_len  cmd
//! ```
//!
//! Flash modules from 2.0 stop after `last_read`.

use log::{debug, warn};
use nor_flash::{CommandState, FlashSnapshot};

use super::stream::{ModuleReader, SnapshotReader, SnapshotWriter};
use crate::bank::{BANK_SIZE, BankRegion};
use crate::board::{self, Board, FlashChip};
use crate::config::CartridgeOptions;
use crate::error::{CartridgeError, Result};
use crate::kind::CartridgeKind;
use crate::mode::AddressMode;

pub const HEADER_MODULE: &str = "CARTRIDGE";
const HEADER_MAJOR: u8 = 1;
const HEADER_MINOR: u8 = 0;

pub const FLASH_MAJOR: u8 = 2;
pub const FLASH_MINOR: u8 = 1;

/// Open `name` and check its version against the one this build writes.
///
/// A different major is refused. A newer minor is read as far as the
/// fields this build knows.
pub fn open_module<'a>(
    reader: &'a SnapshotReader,
    name: &str,
    major: u8,
    minor: u8,
) -> Result<ModuleReader<'a>> {
    let module = reader.open_module(name)?;
    if module.major() != major {
        warn!(
            "snapshot: {name} is version {}.{}, expected {major}.x",
            module.major(),
            module.minor()
        );
        return Err(CartridgeError::IncompatibleSnapshotVersion {
            module: name.to_string(),
            found_major: module.major(),
            found_minor: module.minor(),
            supported_major: major,
        });
    }
    if module.minor() > minor {
        debug!(
            "snapshot: {name} minor {} is newer than {minor}, ignoring extra fields",
            module.minor()
        );
    }
    Ok(module)
}

fn mode_code(mode: AddressMode) -> u8 {
    match mode {
        AddressMode::RamOnly => 0,
        AddressMode::Game8k => 1,
        AddressMode::Game16k => 2,
        AddressMode::Ultimax => 3,
    }
}

fn mode_from_code(code: u8) -> Option<AddressMode> {
    Some(match code {
        0 => AddressMode::RamOnly,
        1 => AddressMode::Game8k,
        2 => AddressMode::Game16k,
        3 => AddressMode::Ultimax,
        _ => return None,
    })
}

/// Borrowed view of an attached cartridge, for writing.
#[derive(Debug, Clone, Copy)]
pub struct CartridgeState<'a> {
    pub kind: CartridgeKind,
    pub name: &'a str,
    pub image_banks: usize,
    pub image_mode: AddressMode,
    pub region: &'a BankRegion,
    pub board: &'a dyn Board,
}

/// Everything needed to rebuild a cartridge from a snapshot.
#[derive(Debug)]
pub struct RestoredState {
    pub kind: CartridgeKind,
    pub name: String,
    pub image_banks: usize,
    pub image_mode: AddressMode,
    pub region: BankRegion,
    pub board: Box<dyn Board>,
}

pub fn write(writer: &mut SnapshotWriter, state: &CartridgeState<'_>) {
    {
        let mut m = writer.create_module(HEADER_MODULE, HEADER_MAJOR, HEADER_MINOR);
        m.write_byte(state.kind.code());
        m.write_word(state.kind.crt_id());
        m.write_dword(state.image_banks as u32);
        m.write_byte(mode_code(state.image_mode));
        let name = &state.name.as_bytes()[..state.name.len().min(usize::from(u16::MAX))];
        m.write_word(name.len() as u16);
        m.write_bytes(name);
    }

    let version = state.board.module();
    {
        let mut m = writer.create_module(version.name, version.major, version.minor);
        m.write_bytes(&state.board.registers());
        m.write_dword(state.region.bank_mask() as u32);
        m.write_dword(state.region.bank_count() as u32);
        m.write_bytes(state.region.roml());
        m.write_bytes(state.region.romh());
        if let Some(ram) = state.board.cart_ram() {
            m.write_bytes(ram);
        }
    }

    for chip in state.board.flash_chips() {
        write_flash(writer, chip);
    }
}

fn write_flash(writer: &mut SnapshotWriter, chip: &FlashChip) {
    let snap = chip.device.save_state();
    let mut m = writer.create_module(chip.module, FLASH_MAJOR, FLASH_MINOR);
    m.write_byte(snap.state as u8);
    m.write_byte(snap.base_state as u8);
    m.write_byte(snap.program_byte);
    m.write_dword(snap.erase_mask);
    m.write_byte(snap.last_read);
    m.write_byte(u8::from(snap.erase_countdown.is_some()));
    m.write_dword(snap.erase_countdown.unwrap_or(0));
    m.write_byte(snap.command_sequence.len() as u8);
    m.write_bytes(&snap.command_sequence);
}

/// Rebuild a cartridge from `reader`. Nothing outside the returned value
/// is touched, so a failure leaves the caller's state as it was.
pub fn read(reader: &SnapshotReader, options: &CartridgeOptions) -> Result<RestoredState> {
    let mut header = open_module(reader, HEADER_MODULE, HEADER_MAJOR, HEADER_MINOR)?;
    let code = header.read_byte()?;
    let kind = CartridgeKind::from_code(code)
        .ok_or_else(|| CartridgeError::SnapshotMismatch(format!("unknown cartridge code {code}")))?;
    let crt_id = header.read_word()?;
    if crt_id != kind.crt_id() {
        return Err(CartridgeError::SnapshotMismatch(format!(
            "{kind} stored with CRT id {crt_id}"
        )));
    }
    let image_banks = header.read_dword()? as usize;
    let mode = header.read_byte()?;
    let image_mode = mode_from_code(mode)
        .ok_or_else(|| CartridgeError::SnapshotMismatch(format!("unknown mode {mode}")))?;
    let name_len = usize::from(header.read_word()?);
    let name = String::from_utf8_lossy(header.read_bytes(name_len)?).into_owned();

    // Register count comes from a fresh board of the same family.
    let fresh = board::create(kind, image_mode, kind.max_banks() - 1, options);
    let version = fresh.module();
    let mut family = open_module(reader, version.name, version.major, version.minor)?;
    let registers = family.read_bytes(fresh.registers().len())?;
    let bank_mask = family.read_dword()? as usize;
    let bank_count = family.read_dword()? as usize;
    if bank_count == 0 || bank_count > kind.max_banks() || image_banks > bank_count {
        return Err(CartridgeError::SnapshotMismatch(format!(
            "{kind} cannot have {bank_count} banks"
        )));
    }
    // Flash chips address their whole array regardless of the bank mask.
    for chip in fresh.flash_chips() {
        let flash_type = chip.device.flash_type();
        if bank_count * BANK_SIZE < flash_type.size() {
            return Err(CartridgeError::SnapshotMismatch(format!(
                "{}: {bank_count} banks do not cover a {} array",
                chip.module,
                flash_type.name()
            )));
        }
    }

    let mut region = BankRegion::allocate(bank_count)?;
    let half = bank_count * BANK_SIZE;
    let roml = family.read_bytes(half)?;
    let romh = family.read_bytes(half)?;
    if !region.replace_contents(roml, romh) {
        return Err(CartridgeError::SnapshotMismatch("bank array size".into()));
    }
    region.set_bank_mask(bank_mask);

    let mut board = board::create(kind, image_mode, region.bank_mask(), options);
    board.restore_registers(registers);
    if let Some(ram) = board.cart_ram_mut() {
        let stored = family.read_bytes(ram.len())?;
        ram.copy_from_slice(stored);
    }

    for chip in board.flash_chips_mut() {
        let snap = read_flash(reader, chip)?;
        chip.device.restore_state(&snap);
    }

    debug!("snapshot: restored {kind} \"{name}\", {}", board.dump());
    Ok(RestoredState {
        kind,
        name,
        image_banks,
        image_mode,
        region,
        board,
    })
}

fn command_state(module: &str, value: u8) -> Result<CommandState> {
    CommandState::from_u8(value).ok_or_else(|| {
        CartridgeError::SnapshotMismatch(format!("{module}: invalid flash state {value}"))
    })
}

fn read_flash(reader: &SnapshotReader, chip: &FlashChip) -> Result<FlashSnapshot> {
    let mut m = open_module(reader, chip.module, FLASH_MAJOR, FLASH_MINOR)?;
    let state = command_state(chip.module, m.read_byte()?)?;
    let base_state = command_state(chip.module, m.read_byte()?)?;
    let program_byte = m.read_byte()?;
    let erase_mask = m.read_dword()?;
    let last_read = m.read_byte()?;

    let (erase_countdown, command_sequence) = if m.minor() >= 1 {
        let present = m.read_byte()? != 0;
        let countdown = m.read_dword()?;
        let len = usize::from(m.read_byte()?);
        let cmd = m.read_bytes(len)?.to_vec();
        (present.then_some(countdown), cmd)
    } else {
        // 2.0 has no timer field; a pending erase restarts one sector period.
        let pending = matches!(
            state,
            CommandState::SectorEraseTimeout | CommandState::SectorErase | CommandState::ChipErase
        );
        let period = chip.device.flash_type().geometry().erase_sector_cycles;
        (pending.then_some(period), Vec::new())
    };

    Ok(FlashSnapshot {
        state,
        base_state,
        program_byte,
        erase_mask,
        last_read,
        erase_countdown,
        command_sequence,
    })
}
