//! ROML/ROMH bank storage.
//!
//! Each bank is 8K of ROML plus 8K of ROMH. Accesses take a bank number
//! and an offset; the bank is masked and the offset wrapped, so a bad
//! register value can never index outside the storage.

use crate::error::{CartridgeError, Result};

/// Size of one ROML or ROMH bank.
pub const BANK_SIZE: usize = 0x2000;

/// Size of one ROML+ROMH bank pair in interleaved raw images.
pub const SLOT_SIZE: usize = 2 * BANK_SIZE;

/// Largest storage a single cartridge may allocate.
pub const MAX_REGION_BYTES: usize = 32 * 1024 * 1024;

/// Smallest `2^n - 1` mask covering an image of `image_size` bytes,
/// counted in 16K units. Partial units round up.
#[must_use]
pub fn compute_bank_mask(image_size: usize) -> usize {
    bank_mask_for(image_size.div_ceil(SLOT_SIZE))
}

/// Smallest `2^n - 1` mask covering `count` banks.
#[must_use]
pub fn bank_mask_for(count: usize) -> usize {
    count.max(1).next_power_of_two() - 1
}

/// Owned ROML and ROMH bank arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankRegion {
    roml: Vec<u8>,
    romh: Vec<u8>,
    bank_count: usize,
    bank_mask: usize,
}

impl BankRegion {
    /// Allocate `bank_count` banks of erased (`0xFF`) storage.
    pub fn allocate(bank_count: usize) -> Result<Self> {
        let bytes = bank_count
            .checked_mul(SLOT_SIZE)
            .ok_or(CartridgeError::AllocationError(bank_count))?;
        if bank_count == 0 || bytes > MAX_REGION_BYTES {
            return Err(CartridgeError::AllocationError(bank_count));
        }

        let half = bank_count * BANK_SIZE;
        let mut roml = Vec::new();
        let mut romh = Vec::new();
        roml.try_reserve_exact(half)
            .map_err(|_| CartridgeError::AllocationError(bank_count))?;
        romh.try_reserve_exact(half)
            .map_err(|_| CartridgeError::AllocationError(bank_count))?;
        roml.resize(half, 0xFF);
        romh.resize(half, 0xFF);

        Ok(Self {
            roml,
            romh,
            bank_count,
            bank_mask: bank_mask_for(bank_count),
        })
    }

    #[must_use]
    pub fn bank_count(&self) -> usize {
        self.bank_count
    }

    #[must_use]
    pub fn bank_mask(&self) -> usize {
        self.bank_mask
    }

    /// Narrow the mask to the banks the image actually populates.
    pub fn set_bank_mask(&mut self, mask: usize) {
        self.bank_mask = mask & bank_mask_for(self.bank_count);
    }

    fn index(&self, bank: usize, offset: u16) -> usize {
        let bank = (bank & self.bank_mask) % self.bank_count;
        bank * BANK_SIZE + (usize::from(offset) & (BANK_SIZE - 1))
    }

    #[must_use]
    pub fn read_roml(&self, bank: usize, offset: u16) -> u8 {
        self.roml[self.index(bank, offset)]
    }

    #[must_use]
    pub fn read_romh(&self, bank: usize, offset: u16) -> u8 {
        self.romh[self.index(bank, offset)]
    }

    pub fn write_roml(&mut self, bank: usize, offset: u16, value: u8) {
        let i = self.index(bank, offset);
        self.roml[i] = value;
    }

    pub fn write_romh(&mut self, bank: usize, offset: u16, value: u8) {
        let i = self.index(bank, offset);
        self.romh[i] = value;
    }

    #[must_use]
    pub fn roml(&self) -> &[u8] {
        &self.roml
    }

    #[must_use]
    pub fn romh(&self) -> &[u8] {
        &self.romh
    }

    /// Whole ROML array, for flash chips that use it as cell storage.
    pub fn roml_mut(&mut self) -> &mut [u8] {
        &mut self.roml
    }

    pub fn romh_mut(&mut self) -> &mut [u8] {
        &mut self.romh
    }

    /// Split an interleaved image (ROML, ROMH per 16K) into the arrays.
    /// Banks beyond the image keep their contents.
    pub fn load_interleaved(&mut self, raw: &[u8]) {
        for (bank, slot) in raw.chunks(SLOT_SIZE).take(self.bank_count).enumerate() {
            let base = bank * BANK_SIZE;
            let (low, high) = slot.split_at(slot.len().min(BANK_SIZE));
            self.roml[base..base + low.len()].copy_from_slice(low);
            self.romh[base..base + high.len()].copy_from_slice(high);
        }
    }

    /// First `banks` banks as an interleaved image.
    #[must_use]
    pub fn to_interleaved(&self, banks: usize) -> Vec<u8> {
        let banks = banks.min(self.bank_count);
        let mut out = Vec::with_capacity(banks * SLOT_SIZE);
        for bank in 0..banks {
            let base = bank * BANK_SIZE;
            out.extend_from_slice(&self.roml[base..base + BANK_SIZE]);
            out.extend_from_slice(&self.romh[base..base + BANK_SIZE]);
        }
        out
    }

    /// One 8K bank of ROML or ROMH.
    #[must_use]
    pub fn bank(&self, high: bool, bank: usize) -> &[u8] {
        let array = if high { &self.romh } else { &self.roml };
        let base = (bank % self.bank_count) * BANK_SIZE;
        &array[base..base + BANK_SIZE]
    }

    /// Replace both arrays wholesale. Lengths must match the allocation.
    pub(crate) fn replace_contents(&mut self, roml: &[u8], romh: &[u8]) -> bool {
        if roml.len() != self.roml.len() || romh.len() != self.romh.len() {
            return false;
        }
        self.roml.copy_from_slice(roml);
        self.romh.copy_from_slice(romh);
        true
    }
}
