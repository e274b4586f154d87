//! JEDEC-style NOR flash command state machine.
//!
//! Models the command interface shared by the AMD Am29F and Macronix
//! MX29F parts used on C64 flash cartridges: unlock cycles, autoselect,
//! byte program, chip and sector erase, and erase suspend/resume.
//!
//! The device owns no cell storage. Every access takes the backing slice
//! from the caller, so the cartridge's bank storage is the flash array and
//! there is never a second copy to keep in sync.
//!
//! Erase operations take time. Instead of scheduling callbacks the device
//! keeps a cycle countdown that the owner advances with [`FlashDevice::clock`].

#![allow(clippy::cast_possible_truncation)]

mod chip;

pub use chip::{FlashGeometry, FlashType};

use log::debug;

/// Internal command state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandState {
    Read = 0,
    Magic1 = 1,
    Magic2 = 2,
    Autoselect = 3,
    ByteProgram = 4,
    ByteProgramError = 5,
    EraseMagic1 = 6,
    EraseMagic2 = 7,
    EraseSelect = 8,
    ChipErase = 9,
    SectorErase = 10,
    SectorEraseTimeout = 11,
    SectorEraseSuspend = 12,
}

impl CommandState {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Read,
            1 => Self::Magic1,
            2 => Self::Magic2,
            3 => Self::Autoselect,
            4 => Self::ByteProgram,
            5 => Self::ByteProgramError,
            6 => Self::EraseMagic1,
            7 => Self::EraseMagic2,
            8 => Self::EraseSelect,
            9 => Self::ChipErase,
            10 => Self::SectorErase,
            11 => Self::SectorEraseTimeout,
            12 => Self::SectorEraseSuspend,
            _ => return None,
        })
    }

    /// Coarse operating mode for this state.
    #[must_use]
    pub fn mode(self) -> FlashMode {
        match self {
            Self::ByteProgram | Self::ByteProgramError => FlashMode::Program,
            Self::ChipErase | Self::SectorErase | Self::SectorEraseTimeout => FlashMode::Erase,
            Self::SectorEraseSuspend => FlashMode::EraseSuspend,
            Self::Read
            | Self::Magic1
            | Self::Magic2
            | Self::Autoselect
            | Self::EraseMagic1
            | Self::EraseMagic2
            | Self::EraseSelect => FlashMode::Read,
        }
    }
}

/// Coarse operating mode, as seen from outside the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Read,
    Program,
    Erase,
    EraseSuspend,
}

/// Maximum command bytes kept in the history.
pub const COMMAND_HISTORY: usize = 3;

/// Serializable device state. Cell contents are not included; they live
/// in the caller's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashSnapshot {
    pub state: CommandState,
    pub base_state: CommandState,
    pub program_byte: u8,
    pub erase_mask: u32,
    pub last_read: u8,
    /// Cycles until the pending erase step fires.
    pub erase_countdown: Option<u32>,
    pub command_sequence: Vec<u8>,
}

/// One flash chip's command interface.
#[derive(Debug, Clone)]
pub struct FlashDevice {
    flash_type: FlashType,
    state: CommandState,
    /// State to return to after a command: Read or Autoselect.
    base_state: CommandState,
    program_byte: u8,
    /// One bit per sector queued for erase.
    erase_mask: u32,
    last_read: u8,
    erase_countdown: Option<u32>,
    /// Free-running cycle count, drives the DQ6 toggle while programming.
    cycles: u64,
    command_sequence: [u8; COMMAND_HISTORY],
    command_len: usize,
    dirty: bool,
}

impl FlashDevice {
    #[must_use]
    pub fn new(flash_type: FlashType) -> Self {
        Self {
            flash_type,
            state: CommandState::Read,
            base_state: CommandState::Read,
            program_byte: 0,
            erase_mask: 0,
            last_read: 0,
            erase_countdown: None,
            cycles: 0,
            command_sequence: [0; COMMAND_HISTORY],
            command_len: 0,
            dirty: false,
        }
    }

    #[must_use]
    pub fn flash_type(&self) -> FlashType {
        self.flash_type
    }

    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    #[must_use]
    pub fn mode(&self) -> FlashMode {
        self.state.mode()
    }

    /// Command bytes written since the chip was last idle, most recent last.
    #[must_use]
    pub fn command_sequence(&self) -> &[u8] {
        &self.command_sequence[..self.command_len]
    }

    /// True once any cell has been programmed or erased.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Return to read-array mode and drop any pending erase.
    pub fn reset(&mut self) {
        debug!("flash: reset");
        self.state = CommandState::Read;
        self.base_state = CommandState::Read;
        self.program_byte = 0;
        self.erase_mask = 0;
        self.erase_countdown = None;
        self.command_len = 0;
    }

    fn offset(&self, addr: u32) -> usize {
        (addr as usize) & (self.flash_type.size() - 1)
    }

    /// Cell at `addr`. Cells past the end of a short array read erased.
    fn cell(&self, mem: &[u8], addr: u32) -> u8 {
        mem.get(self.offset(addr)).copied().unwrap_or(0xFF)
    }

    fn is_magic_1(&self, addr: u32) -> bool {
        let chip = self.flash_type.geometry();
        addr & chip.magic_1_mask == chip.magic_1_addr
    }

    fn is_magic_2(&self, addr: u32) -> bool {
        let chip = self.flash_type.geometry();
        addr & chip.magic_2_mask == chip.magic_2_addr
    }

    fn sector_of(&self, addr: u32) -> u32 {
        let chip = self.flash_type.geometry();
        (addr & chip.sector_mask) >> chip.sector_shift
    }

    fn add_sector_to_erase_mask(&mut self, addr: u32) {
        self.erase_mask |= 1 << self.sector_of(addr);
    }

    fn erase_sector(&mut self, mem: &mut [u8], sector: u32) {
        let size = self.flash_type.geometry().sector_size as usize;
        let start = sector as usize * size;
        debug!("flash: erasing ${:05X}-${:05X}", start, start + size - 1);
        if let Some(cells) = mem.get_mut(start..start + size) {
            cells.fill(0xFF);
        }
        self.dirty = true;
    }

    fn erase_chip(&mut self, mem: &mut [u8]) {
        debug!("flash: erasing chip");
        let size = self.flash_type.size().min(mem.len());
        mem[..size].fill(0xFF);
        self.dirty = true;
    }

    /// Program one cell. Bits can only go from 1 to 0.
    /// Returns false when the cell could not take the requested value.
    fn program_byte(&mut self, mem: &mut [u8], addr: u32, byte: u8) -> bool {
        let offset = self.offset(addr);
        self.program_byte = byte;
        let Some(cell) = mem.get_mut(offset) else {
            debug!("flash: program ${offset:05X} is past the cell array");
            return false;
        };
        let old = *cell;
        let new = old & byte;
        debug!("flash: programming ${offset:05X} with ${byte:02X} (${old:02X}->${new:02X})");
        *cell = new;
        self.dirty = true;
        new == byte
    }

    fn write_operation_status(&self) -> u8 {
        // DQ7 = inverted data, DQ6 = toggle, DQ5 = timeout.
        ((self.program_byte ^ 0x80) & 0x80) | (((self.cycles & 2) as u8) << 5) | 0x20
    }

    fn erase_operation_status(&mut self) -> u8 {
        let mut value = self.program_byte;
        self.program_byte ^= self.flash_type.geometry().status_toggle_bits;
        // DQ3 = sector erase timer expired
        if self.state != CommandState::SectorEraseTimeout {
            value |= 0x08;
        }
        value
    }

    fn set_countdown(&mut self, cycles: u32) {
        self.erase_countdown = Some(cycles);
    }

    fn record_command(&mut self, byte: u8) {
        if self.command_len == COMMAND_HISTORY {
            self.command_sequence.copy_within(1.., 0);
            self.command_len -= 1;
        }
        self.command_sequence[self.command_len] = byte;
        self.command_len += 1;
    }

    /// Bus write.
    pub fn store(&mut self, mem: &mut [u8], addr: u32, byte: u8) {
        let old_state = self.state;
        let geometry = self.flash_type.geometry();

        match self.state {
            CommandState::Read => {
                if self.is_magic_1(addr) && byte == 0xAA {
                    self.state = CommandState::Magic1;
                }
            }
            CommandState::Magic1 => {
                if self.is_magic_2(addr) && byte == 0x55 {
                    self.state = CommandState::Magic2;
                } else {
                    self.state = self.base_state;
                }
            }
            CommandState::Magic2 => {
                if self.is_magic_1(addr) {
                    match byte {
                        0x90 => {
                            self.state = CommandState::Autoselect;
                            self.base_state = CommandState::Autoselect;
                        }
                        0xF0 => {
                            self.state = CommandState::Read;
                            self.base_state = CommandState::Read;
                        }
                        0xA0 => self.state = CommandState::ByteProgram,
                        0x80 => self.state = CommandState::EraseMagic1,
                        _ => self.state = self.base_state,
                    }
                } else {
                    self.state = self.base_state;
                }
            }
            CommandState::ByteProgram => {
                if self.program_byte(mem, addr, byte) {
                    // Program time is short enough to complete immediately.
                    self.state = self.base_state;
                } else {
                    self.state = CommandState::ByteProgramError;
                }
            }
            CommandState::EraseMagic1 => {
                if self.is_magic_1(addr) && byte == 0xAA {
                    self.state = CommandState::EraseMagic2;
                } else {
                    self.state = self.base_state;
                }
            }
            CommandState::EraseMagic2 => {
                if self.is_magic_2(addr) && byte == 0x55 {
                    self.state = CommandState::EraseSelect;
                } else {
                    self.state = self.base_state;
                }
            }
            CommandState::EraseSelect => {
                if self.is_magic_1(addr) && byte == 0x10 {
                    self.state = CommandState::ChipErase;
                    self.program_byte = 0;
                    self.set_countdown(geometry.erase_chip_cycles);
                } else if byte == 0x30 {
                    self.add_sector_to_erase_mask(addr);
                    self.program_byte = 0;
                    self.state = CommandState::SectorEraseTimeout;
                    self.set_countdown(geometry.erase_sector_timeout_cycles);
                } else {
                    self.state = self.base_state;
                }
            }
            CommandState::SectorEraseTimeout => {
                if byte == 0x30 {
                    self.add_sector_to_erase_mask(addr);
                } else {
                    self.state = self.base_state;
                    self.erase_mask = 0;
                    self.erase_countdown = None;
                }
            }
            CommandState::SectorErase => {
                if byte == 0xB0 {
                    self.state = CommandState::SectorEraseSuspend;
                    self.erase_countdown = None;
                }
            }
            CommandState::SectorEraseSuspend => {
                if byte == 0x30 {
                    self.state = CommandState::SectorErase;
                    self.set_countdown(geometry.erase_sector_cycles);
                }
            }
            CommandState::ByteProgramError | CommandState::Autoselect => {
                if self.is_magic_1(addr) && byte == 0xAA {
                    self.state = CommandState::Magic1;
                }
                if byte == 0xF0 {
                    self.state = CommandState::Read;
                    self.base_state = CommandState::Read;
                }
            }
            CommandState::ChipErase => {}
        }

        if self.state == self.base_state {
            self.command_len = 0;
        } else {
            self.record_command(byte);
        }

        if old_state != self.state {
            debug!(
                "flash: write ${byte:02X} to ${addr:05X}, state {old_state:?}->{:?} (base {:?})",
                self.state, self.base_state
            );
        }
    }

    /// Bus write from a read-modify-write instruction: the CPU first
    /// writes back the value it read, then the modified value.
    pub fn store_rmw(&mut self, mem: &mut [u8], addr: u32, byte: u8) {
        let last = self.last_read;
        self.store(mem, addr, last);
        self.store(mem, addr, byte);
    }

    /// Bus read. Status reads toggle bits, so this needs `&mut self`.
    pub fn read(&mut self, mem: &[u8], addr: u32) -> u8 {
        let chip = self.flash_type.geometry();
        let value = match self.state {
            CommandState::Autoselect => match addr & 0xFF {
                0 => chip.manufacturer_id,
                a if a == chip.device_id_addr => chip.device_id,
                2 => 0,
                _ => self.cell(mem, addr),
            },
            CommandState::ByteProgramError => self.write_operation_status(),
            CommandState::SectorEraseSuspend
                if self.erase_mask & (1 << self.sector_of(addr)) == 0 =>
            {
                self.cell(mem, addr)
            }
            CommandState::SectorEraseSuspend
            | CommandState::ChipErase
            | CommandState::SectorErase
            | CommandState::SectorEraseTimeout => self.erase_operation_status(),
            // Reads in the middle of a command sequence don't reset it.
            _ => self.cell(mem, addr),
        };
        self.last_read = value;
        value
    }

    /// Side-effect-free read of the cell array.
    #[must_use]
    pub fn peek(&self, mem: &[u8], addr: u32) -> u8 {
        self.cell(mem, addr)
    }

    /// Advance the erase timer by `cycles`.
    pub fn clock(&mut self, mem: &mut [u8], cycles: u32) {
        self.cycles = self.cycles.wrapping_add(u64::from(cycles));
        let mut remaining = cycles;
        while let Some(countdown) = self.erase_countdown {
            if remaining < countdown {
                self.erase_countdown = Some(countdown - remaining);
                break;
            }
            remaining -= countdown;
            self.erase_countdown = None;
            self.erase_step(mem);
        }
    }

    /// Run any pending erase to completion.
    pub fn finish_pending(&mut self, mem: &mut [u8]) {
        while let Some(countdown) = self.erase_countdown {
            self.clock(mem, countdown);
        }
    }

    fn erase_step(&mut self, mem: &mut [u8]) {
        let geometry = self.flash_type.geometry();
        match self.state {
            CommandState::SectorEraseTimeout => {
                self.state = CommandState::SectorErase;
                self.set_countdown(geometry.erase_sector_cycles);
            }
            CommandState::SectorErase => {
                // One sector per period, lowest first.
                if self.erase_mask != 0 {
                    let sector = self.erase_mask.trailing_zeros();
                    self.erase_sector(mem, sector);
                    self.erase_mask &= !(1 << sector);
                }
                if self.erase_mask != 0 {
                    self.set_countdown(geometry.erase_sector_cycles);
                } else {
                    self.state = self.base_state;
                    self.command_len = 0;
                }
            }
            CommandState::ChipErase => {
                self.erase_chip(mem);
                self.state = self.base_state;
                self.command_len = 0;
            }
            other => debug!("flash: erase timer fired in unexpected state {other:?}"),
        }
    }

    #[must_use]
    pub fn save_state(&self) -> FlashSnapshot {
        FlashSnapshot {
            state: self.state,
            base_state: self.base_state,
            program_byte: self.program_byte,
            erase_mask: self.erase_mask,
            last_read: self.last_read,
            erase_countdown: self.erase_countdown,
            command_sequence: self.command_sequence().to_vec(),
        }
    }

    pub fn restore_state(&mut self, snapshot: &FlashSnapshot) {
        self.state = snapshot.state;
        self.base_state = snapshot.base_state;
        self.program_byte = snapshot.program_byte;
        self.erase_mask = snapshot.erase_mask;
        self.last_read = snapshot.last_read;
        self.erase_countdown = snapshot.erase_countdown;
        self.command_len = 0;
        let start = snapshot
            .command_sequence
            .len()
            .saturating_sub(COMMAND_HISTORY);
        for &byte in &snapshot.command_sequence[start..] {
            self.record_command(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mx() -> (FlashDevice, Vec<u8>) {
        let device = FlashDevice::new(FlashType::Mx29f800cb);
        let mem = vec![0xFF; FlashType::Mx29f800cb.size()];
        (device, mem)
    }

    fn unlock(device: &mut FlashDevice, mem: &mut [u8]) {
        device.store(mem, 0xAAA, 0xAA);
        device.store(mem, 0x555, 0x55);
    }

    fn program(device: &mut FlashDevice, mem: &mut [u8], addr: u32, value: u8) {
        unlock(device, mem);
        device.store(mem, 0xAAA, 0xA0);
        device.store(mem, addr, value);
    }

    fn sector_erase_command(device: &mut FlashDevice, mem: &mut [u8], addr: u32) {
        unlock(device, mem);
        device.store(mem, 0xAAA, 0x80);
        unlock(device, mem);
        device.store(mem, addr, 0x30);
    }

    #[test]
    fn plain_reads_return_cells() {
        let (mut device, mut mem) = mx();
        mem[0x1234] = 0x42;
        assert_eq!(device.read(&mem, 0x1234), 0x42);
        assert_eq!(device.mode(), FlashMode::Read);
    }

    #[test]
    fn program_ands_into_cell() {
        let (mut device, mut mem) = mx();
        program(&mut device, &mut mem, 0x100, 0xF0);
        assert_eq!(mem[0x100], 0xF0);
        assert_eq!(device.state(), CommandState::Read);
        assert!(device.is_dirty());

        // 0xF0 & 0x3C = 0x30: cannot set bits, so the chip reports an error.
        program(&mut device, &mut mem, 0x100, 0x3C);
        assert_eq!(mem[0x100], 0x30);
        assert_eq!(device.state(), CommandState::ByteProgramError);
        assert_eq!(device.mode(), FlashMode::Program);

        // Reset leaves the error state.
        device.store(&mut mem, 0, 0xF0);
        assert_eq!(device.state(), CommandState::Read);
    }

    #[test]
    fn program_error_status_has_inverted_dq7_and_timeout() {
        let (mut device, mut mem) = mx();
        mem[0x10] = 0x00;
        program(&mut device, &mut mem, 0x10, 0x80);
        let status = device.read(&mem, 0x10);
        assert_eq!(status & 0x80, 0x00);
        assert_eq!(status & 0x20, 0x20);
    }

    #[test]
    fn wrong_unlock_address_aborts_without_writing() {
        let (mut device, mut mem) = mx();
        device.store(&mut mem, 0xAAA, 0xAA);
        device.store(&mut mem, 0x554, 0x55);
        assert_eq!(device.state(), CommandState::Read);
        device.store(&mut mem, 0x200, 0x00);
        assert_eq!(mem[0x200], 0xFF);
        assert!(!device.is_dirty());
    }

    #[test]
    fn unknown_command_returns_to_read() {
        let (mut device, mut mem) = mx();
        unlock(&mut device, &mut mem);
        device.store(&mut mem, 0xAAA, 0x77);
        assert_eq!(device.state(), CommandState::Read);
        assert!(device.command_sequence().is_empty());
    }

    #[test]
    fn autoselect_reads_ids() {
        let (mut device, mut mem) = mx();
        unlock(&mut device, &mut mem);
        device.store(&mut mem, 0xAAA, 0x90);
        assert_eq!(device.read(&mem, 0x000), 0xC2);
        assert_eq!(device.read(&mem, 0x001), 0x58);
        assert_eq!(device.read(&mem, 0x002), 0x00);
        // Same decode in every 256-byte page.
        assert_eq!(device.read(&mem, 0x4500), 0xC2);

        device.store(&mut mem, 0, 0xF0);
        assert_eq!(device.read(&mem, 0x000), 0xFF);
    }

    #[test]
    fn am29f040_ids_and_magic() {
        let mut device = FlashDevice::new(FlashType::Am29f040b);
        let mut mem = vec![0xFF; FlashType::Am29f040b.size()];
        device.store(&mut mem, 0x555, 0xAA);
        device.store(&mut mem, 0x2AA, 0x55);
        device.store(&mut mem, 0x555, 0x90);
        assert_eq!(device.read(&mem, 0), 0x01);
        assert_eq!(device.read(&mem, 1), 0xA4);
    }

    #[test]
    fn chip_erase_sets_all_ones() {
        let (mut device, mut mem) = mx();
        mem.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        unlock(&mut device, &mut mem);
        device.store(&mut mem, 0xAAA, 0x80);
        unlock(&mut device, &mut mem);
        device.store(&mut mem, 0xAAA, 0x10);
        assert_eq!(device.mode(), FlashMode::Erase);

        device.finish_pending(&mut mem);
        assert_eq!(device.state(), CommandState::Read);
        assert!(mem.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn chip_erase_waits_for_its_timer() {
        let (mut device, mut mem) = mx();
        mem[0] = 0;
        unlock(&mut device, &mut mem);
        device.store(&mut mem, 0xAAA, 0x80);
        unlock(&mut device, &mut mem);
        device.store(&mut mem, 0xAAA, 0x10);

        let total = FlashType::Mx29f800cb.geometry().erase_chip_cycles;
        device.clock(&mut mem, total - 1);
        assert_eq!(mem[0], 0);
        device.clock(&mut mem, 1);
        assert_eq!(mem[0], 0xFF);
    }

    #[test]
    fn sector_erase_only_touches_selected_sectors() {
        let (mut device, mut mem) = mx();
        mem.fill(0);
        sector_erase_command(&mut device, &mut mem, 0x2_0000);
        // More sectors may be queued during the timeout window.
        device.store(&mut mem, 0x5_0000, 0x30);
        assert_eq!(device.state(), CommandState::SectorEraseTimeout);
        assert_eq!(device.command_sequence(), &[0x55, 0x30, 0x30]);

        device.finish_pending(&mut mem);
        assert!(mem[0x2_0000..0x3_0000].iter().all(|&b| b == 0xFF));
        assert!(mem[0x5_0000..0x6_0000].iter().all(|&b| b == 0xFF));
        assert!(mem[..0x2_0000].iter().all(|&b| b == 0));
        assert!(mem[0x3_0000..0x5_0000].iter().all(|&b| b == 0));
        assert_eq!(device.state(), CommandState::Read);
    }

    #[test]
    fn other_byte_during_timeout_aborts_erase() {
        let (mut device, mut mem) = mx();
        mem.fill(0);
        sector_erase_command(&mut device, &mut mem, 0);
        device.store(&mut mem, 0, 0x00);
        assert_eq!(device.state(), CommandState::Read);
        device.clock(&mut mem, 100_000_000);
        assert!(mem.iter().all(|&b| b == 0));
    }

    #[test]
    fn dq3_reflects_sector_timer() {
        let (mut device, mut mem) = mx();
        sector_erase_command(&mut device, &mut mem, 0);
        assert_eq!(device.read(&mem, 0) & 0x08, 0);
        let timeout = FlashType::Mx29f800cb.geometry().erase_sector_timeout_cycles;
        device.clock(&mut mem, timeout);
        assert_eq!(device.state(), CommandState::SectorErase);
        assert_eq!(device.read(&mem, 0) & 0x08, 0x08);
    }

    #[test]
    fn erase_status_toggles_dq6() {
        let (mut device, mut mem) = mx();
        sector_erase_command(&mut device, &mut mem, 0);
        let a = device.read(&mem, 0);
        let b = device.read(&mem, 0);
        assert_eq!((a ^ b) & 0x40, 0x40);
    }

    #[test]
    fn suspend_allows_reads_from_other_sectors() {
        let (mut device, mut mem) = mx();
        mem.fill(0x11);
        sector_erase_command(&mut device, &mut mem, 0x1_0000);
        let timeout = FlashType::Mx29f800cb.geometry().erase_sector_timeout_cycles;
        device.clock(&mut mem, timeout);
        device.store(&mut mem, 0, 0xB0);
        assert_eq!(device.mode(), FlashMode::EraseSuspend);

        // Non-erasing sector reads array data.
        assert_eq!(device.read(&mem, 0x4_0000), 0x11);
        // Erasing sector reads status.
        assert_eq!(device.read(&mem, 0x1_0000) & 0x08, 0x08);

        // Suspended erase does not progress.
        device.clock(&mut mem, 100_000_000);
        assert_eq!(mem[0x1_0000], 0x11);

        device.store(&mut mem, 0, 0x30);
        assert_eq!(device.mode(), FlashMode::Erase);
        device.finish_pending(&mut mem);
        assert_eq!(mem[0x1_0000], 0xFF);
        assert_eq!(mem[0x4_0000], 0x11);
    }

    #[test]
    fn rmw_store_writes_last_read_first() {
        let (mut device, mut mem) = mx();
        mem[0xAAA] = 0xAA;
        device.read(&mem, 0xAAA);
        // INC-style access: writes back $AA (unlock step 1), then the new value.
        device.store_rmw(&mut mem, 0xAAA, 0xAB);
        assert_eq!(device.state(), CommandState::Read);
        assert_eq!(mem[0xAAA], 0xAA);
    }

    #[test]
    fn short_cell_array_reads_erased() {
        let mut device = FlashDevice::new(FlashType::Mx29f800cb);
        let mut mem = vec![0x00; 0x2000];
        assert_eq!(device.read(&mem, 0xA000), 0xFF);
        assert_eq!(device.peek(&mem, 0xA000), 0xFF);

        program(&mut device, &mut mem, 0xA000, 0x12);
        assert_eq!(device.state(), CommandState::ByteProgramError);
        assert!(!device.is_dirty());
        assert!(mem.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn peek_has_no_side_effects() {
        let (mut device, mut mem) = mx();
        sector_erase_command(&mut device, &mut mem, 0);
        let before = device.save_state();
        assert_eq!(device.peek(&mem, 0), 0xFF);
        assert_eq!(device.save_state(), before);
    }

    #[test]
    fn state_restores_mid_erase() {
        let (mut device, mut mem) = mx();
        mem.fill(0);
        sector_erase_command(&mut device, &mut mem, 0x3_0000);
        device.clock(&mut mem, 1000);
        let saved = device.save_state();

        let mut restored = FlashDevice::new(FlashType::Mx29f800cb);
        restored.restore_state(&saved);
        assert_eq!(restored.save_state(), saved);

        let mut mem2 = mem.clone();
        device.finish_pending(&mut mem);
        restored.finish_pending(&mut mem2);
        assert_eq!(mem, mem2);
    }

    #[test]
    fn state_bytes_round_trip() {
        for raw in 0..=12u8 {
            let state = CommandState::from_u8(raw).expect("valid");
            assert_eq!(state as u8, raw);
        }
        assert_eq!(CommandState::from_u8(13), None);
    }
}
