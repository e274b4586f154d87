//! Cartridge options.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Power-up fill of on-cartridge SRAM.
///
/// Byte `i` is `start_value`, inverted when `(i / value_invert)` is odd,
/// and inverted again when `(i / pattern_invert)` is odd. A zero period
/// disables that inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RamInitPattern {
    pub start_value: u8,
    pub value_invert: usize,
    pub pattern_invert: usize,
}

impl Default for RamInitPattern {
    fn default() -> Self {
        Self {
            start_value: 0xFF,
            value_invert: 2,
            pattern_invert: 0x100,
        }
    }
}

impl RamInitPattern {
    #[must_use]
    pub fn byte_at(&self, i: usize) -> u8 {
        let flip = |period: usize| period != 0 && (i / period) % 2 == 1;
        let mut value = self.start_value;
        if flip(self.value_invert) {
            value = !value;
        }
        if flip(self.pattern_invert) {
            value = !value;
        }
        value
    }

    #[must_use]
    pub fn fill(&self, len: usize) -> Vec<u8> {
        (0..len).map(|i| self.byte_at(i)).collect()
    }
}

/// Per-attach options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CartridgeOptions {
    /// Write flash contents back to the image file on detach.
    pub write_back: bool,
    /// Leave erased (all $FF) banks out of written CRT files.
    pub optimize_crt: bool,
    /// EasyFlash boot jumper. Off boots into Ultimax, on boots disabled.
    pub easyflash_jumper: bool,
    pub ram_init: RamInitPattern,
}

impl Default for CartridgeOptions {
    fn default() -> Self {
        Self {
            write_back: false,
            optimize_crt: true,
            easyflash_jumper: false,
            ram_init: RamInitPattern::default(),
        }
    }
}
