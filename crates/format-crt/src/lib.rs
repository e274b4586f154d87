//! CRT cartridge container format.
//!
//! The CRT format wraps C64 cartridge ROM images with a header describing
//! the hardware type and the initial EXROM/GAME line configuration. ROM
//! data follows in CHIP packets, each declaring its bank, load address and
//! size.
//!
//! Header layout (all multi-byte fields big-endian):
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | $00    | 16   | `"C64 CARTRIDGE   "`           |
//! | $10    | 4    | header length                  |
//! | $14    | 2    | version (hi.lo)                |
//! | $16    | 2    | hardware type                  |
//! | $18    | 1    | EXROM line (0 = active)        |
//! | $19    | 1    | GAME line (0 = active)         |
//! | $1A    | 1    | hardware revision              |
//! | $20    | 32   | name, zero padded              |
//!
//! CHIP packet: `"CHIP"`, packet length (4), chip type (2), bank (2),
//! load address (2), data size (2), then the data.
//!
//! This crate only deals with the container. Which chunks are legal for a
//! given cartridge is up to the emulation layer.

#![allow(clippy::cast_possible_truncation)]

use thiserror::Error;

/// CRT file signature.
pub const CRT_SIGNATURE: &[u8; 16] = b"C64 CARTRIDGE   ";

/// CHIP packet signature.
pub const CHIP_SIGNATURE: &[u8; 4] = b"CHIP";

/// Length of the header this crate writes.
pub const HEADER_LEN: usize = 0x40;

/// Length of a CHIP packet header.
pub const CHIP_HEADER_LEN: usize = 0x10;

/// Version written into new images (1.0).
pub const CRT_VERSION: u16 = 0x0100;

/// Errors from parsing a CRT container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrtError {
    #[error("CRT file too short for header ({0} bytes)")]
    TooShort(usize),
    #[error("invalid CRT signature")]
    BadSignature,
    #[error("invalid CRT header length {0}")]
    BadHeaderLength(u32),
    #[error("expected CHIP signature at offset {0}")]
    BadChipSignature(usize),
    #[error("invalid CHIP packet length {length} at offset {offset}")]
    BadChipLength { offset: usize, length: u32 },
    #[error("CHIP data at offset {0} extends past end of file")]
    ChipTruncated(usize),
    #[error("unknown chip type {chip_type} at offset {offset}")]
    UnknownChipType { offset: usize, chip_type: u16 },
    #[error("CRT file contains no CHIP packets")]
    NoChips,
}

/// Memory technology of a CHIP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipType {
    Rom,
    Ram,
    Flash,
}

impl ChipType {
    #[must_use]
    pub fn from_raw(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Rom),
            1 => Some(Self::Ram),
            2 => Some(Self::Flash),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Rom => 0,
            Self::Ram => 1,
            Self::Flash => 2,
        }
    }
}

/// Decoded CRT file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtHeader {
    /// Format version, high byte major.
    pub version: u16,
    /// Hardware type id.
    pub hw_type: u16,
    /// EXROM line level (false = asserted low).
    pub exrom: bool,
    /// GAME line level (false = asserted low).
    pub game: bool,
    /// Hardware revision / subtype (version 1.1 and later).
    pub hw_revision: u8,
    /// Cartridge name, trailing padding removed.
    pub name: String,
}

/// One CHIP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipPacket {
    pub chip_type: ChipType,
    pub bank: u16,
    pub load_address: u16,
    pub data: Vec<u8>,
}

impl ChipPacket {
    #[must_use]
    pub fn new(chip_type: ChipType, bank: u16, load_address: u16, data: Vec<u8>) -> Self {
        Self {
            chip_type,
            bank,
            load_address,
            data,
        }
    }

    /// Data size as declared in the packet header.
    #[must_use]
    pub fn size(&self) -> u16 {
        self.data.len() as u16
    }

    /// True if every byte is the erased flash pattern.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0xFF)
    }
}

/// A complete CRT container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtImage {
    pub header: CrtHeader,
    pub chips: Vec<ChipPacket>,
}

impl CrtImage {
    /// Start a new image with no chips.
    #[must_use]
    pub fn new(hw_type: u16, exrom: bool, game: bool, name: &str) -> Self {
        Self {
            header: CrtHeader {
                version: CRT_VERSION,
                hw_type,
                exrom,
                game,
                hw_revision: 0,
                name: name.to_string(),
            },
            chips: Vec::new(),
        }
    }

    pub fn push_chip(&mut self, chip: ChipPacket) {
        self.chips.push(chip);
    }

    /// Serialize to CRT bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload: usize = self
            .chips
            .iter()
            .map(|c| CHIP_HEADER_LEN + c.data.len())
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + payload);

        out.extend_from_slice(CRT_SIGNATURE);
        out.extend_from_slice(&(HEADER_LEN as u32).to_be_bytes());
        out.extend_from_slice(&self.header.version.to_be_bytes());
        out.extend_from_slice(&self.header.hw_type.to_be_bytes());
        out.push(u8::from(self.header.exrom));
        out.push(u8::from(self.header.game));
        out.push(self.header.hw_revision);
        out.extend_from_slice(&[0; 5]);

        let mut name = [0u8; 32];
        let bytes = self.header.name.as_bytes();
        let len = bytes.len().min(32);
        name[..len].copy_from_slice(&bytes[..len]);
        out.extend_from_slice(&name);

        for chip in &self.chips {
            out.extend_from_slice(CHIP_SIGNATURE);
            let total = (CHIP_HEADER_LEN + chip.data.len()) as u32;
            out.extend_from_slice(&total.to_be_bytes());
            out.extend_from_slice(&chip.chip_type.to_raw().to_be_bytes());
            out.extend_from_slice(&chip.bank.to_be_bytes());
            out.extend_from_slice(&chip.load_address.to_be_bytes());
            out.extend_from_slice(&chip.size().to_be_bytes());
            out.extend_from_slice(&chip.data);
        }
        out
    }
}

/// True if `data` starts with the CRT signature.
#[must_use]
pub fn is_crt(data: &[u8]) -> bool {
    data.len() >= CRT_SIGNATURE.len() && &data[..CRT_SIGNATURE.len()] == CRT_SIGNATURE
}

fn read_be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from(data[offset]) << 8 | u16::from(data[offset + 1])
}

fn read_be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from(data[offset]) << 24
        | u32::from(data[offset + 1]) << 16
        | u32::from(data[offset + 2]) << 8
        | u32::from(data[offset + 3])
}

/// Parse a CRT container.
///
/// Packets are returned in file order. Bytes after the last complete
/// packet header are ignored.
pub fn parse_crt(data: &[u8]) -> Result<CrtImage, CrtError> {
    if data.len() < HEADER_LEN {
        return Err(CrtError::TooShort(data.len()));
    }
    if !is_crt(data) {
        return Err(CrtError::BadSignature);
    }

    let header_len = read_be_u32(data, 0x10);
    // Some tools write $20 here even though the name field follows.
    if header_len < 0x20 || header_len as usize > data.len() {
        return Err(CrtError::BadHeaderLength(header_len));
    }

    let header = CrtHeader {
        version: read_be_u16(data, 0x14),
        hw_type: read_be_u16(data, 0x16),
        exrom: data[0x18] != 0,
        game: data[0x19] != 0,
        hw_revision: data[0x1A],
        name: crt_name(data),
    };

    let mut chips = Vec::new();
    let mut offset = (header_len as usize).max(HEADER_LEN);

    while offset + CHIP_HEADER_LEN <= data.len() {
        if &data[offset..offset + 4] != CHIP_SIGNATURE {
            return Err(CrtError::BadChipSignature(offset));
        }

        let chip_len = read_be_u32(data, offset + 4);
        if (chip_len as usize) < CHIP_HEADER_LEN {
            return Err(CrtError::BadChipLength {
                offset,
                length: chip_len,
            });
        }

        let raw_type = read_be_u16(data, offset + 0x08);
        let chip_type = ChipType::from_raw(raw_type).ok_or(CrtError::UnknownChipType {
            offset,
            chip_type: raw_type,
        })?;
        let bank = read_be_u16(data, offset + 0x0A);
        let load_address = read_be_u16(data, offset + 0x0C);
        let size = read_be_u16(data, offset + 0x0E) as usize;

        let start = offset + CHIP_HEADER_LEN;
        let end = start + size;
        if end > data.len() {
            return Err(CrtError::ChipTruncated(offset));
        }

        chips.push(ChipPacket {
            chip_type,
            bank,
            load_address,
            data: data[start..end].to_vec(),
        });

        // Packet length may include padding beyond the declared size.
        offset += (chip_len as usize).max(CHIP_HEADER_LEN + size);
    }

    if chips.is_empty() {
        return Err(CrtError::NoChips);
    }

    Ok(CrtImage { header, chips })
}

/// Extract the cartridge name from a CRT header (up to 32 bytes at offset $20).
#[must_use]
pub fn crt_name(data: &[u8]) -> String {
    if data.len() < 0x40 {
        return String::new();
    }
    let name_bytes = &data[0x20..0x40];
    let end = name_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(name_bytes.len());
    String::from_utf8_lossy(&name_bytes[..end]).trim().to_string()
}
