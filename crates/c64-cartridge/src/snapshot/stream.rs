//! VICE-style snapshot container.
//!
//! ```text
//! file:    "VICE Snapshot File\x1a"  major  minor  machine[16]  module*
//! module:  name[16]  major  minor  size:u32le  fields...
//! ```
//!
//! `size` counts the 22-byte module header. Fields are little-endian
//! bytes, words, dwords and raw byte arrays. Modules are looked up by
//! name, so their order in the file does not matter to readers.

use crate::error::{CartridgeError, Result};

/// File magic.
pub const SNAPSHOT_MAGIC: &[u8; 19] = b"VICE Snapshot File\x1a";

pub const SNAPSHOT_MAJOR: u8 = 2;
pub const SNAPSHOT_MINOR: u8 = 0;

const NAME_LEN: usize = 16;
const FILE_HEADER_LEN: usize = SNAPSHOT_MAGIC.len() + 2 + NAME_LEN;

/// Size of a module header.
pub const MODULE_HEADER_LEN: usize = NAME_LEN + 2 + 4;

fn padded_name(name: &str) -> [u8; NAME_LEN] {
    let mut out = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn unpad_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Builds a snapshot file in memory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    data: Vec<u8>,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new(machine: &str) -> Self {
        let mut data = Vec::with_capacity(FILE_HEADER_LEN);
        data.extend_from_slice(SNAPSHOT_MAGIC);
        data.push(SNAPSHOT_MAJOR);
        data.push(SNAPSHOT_MINOR);
        data.extend_from_slice(&padded_name(machine));
        Self { data }
    }

    /// Start a module. Its size is filled in when the returned writer is
    /// dropped.
    pub fn create_module(&mut self, name: &str, major: u8, minor: u8) -> ModuleWriter<'_> {
        let start = self.data.len();
        self.data.extend_from_slice(&padded_name(name));
        self.data.push(major);
        self.data.push(minor);
        self.data.extend_from_slice(&[0; 4]);
        ModuleWriter {
            data: &mut self.data,
            start,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Field writer for one open module.
#[derive(Debug)]
pub struct ModuleWriter<'a> {
    data: &'a mut Vec<u8>,
    start: usize,
}

impl ModuleWriter<'_> {
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_word(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_dword(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

impl Drop for ModuleWriter<'_> {
    fn drop(&mut self) {
        let size = (self.data.len() - self.start) as u32;
        let at = self.start + NAME_LEN + 2;
        self.data[at..at + 4].copy_from_slice(&size.to_le_bytes());
    }
}

/// Header of one module in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub major: u8,
    pub minor: u8,
    /// Byte range of the module body.
    body: std::ops::Range<usize>,
}

impl ModuleInfo {
    /// File offset of the module header.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.body.start - MODULE_HEADER_LEN
    }

    /// Body length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Parsed snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    data: Vec<u8>,
    machine: String,
    version: (u8, u8),
    modules: Vec<ModuleInfo>,
}

impl SnapshotReader {
    /// Check the file header and index the modules.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < FILE_HEADER_LEN {
            return Err(CartridgeError::SnapshotTruncated("file header".into()));
        }
        if &data[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
            return Err(CartridgeError::SnapshotMismatch("not a snapshot file".into()));
        }
        let version = (data[SNAPSHOT_MAGIC.len()], data[SNAPSHOT_MAGIC.len() + 1]);
        let machine = unpad_name(&data[SNAPSHOT_MAGIC.len() + 2..FILE_HEADER_LEN]);

        let mut modules = Vec::new();
        let mut pos = FILE_HEADER_LEN;
        while pos < data.len() {
            let Some(header) = data.get(pos..pos + MODULE_HEADER_LEN) else {
                return Err(CartridgeError::SnapshotTruncated("module header".into()));
            };
            let name = unpad_name(&header[..NAME_LEN]);
            let size = u32::from_le_bytes([header[18], header[19], header[20], header[21]]) as usize;
            if size < MODULE_HEADER_LEN || pos + size > data.len() {
                return Err(CartridgeError::SnapshotTruncated(name));
            }
            modules.push(ModuleInfo {
                name,
                major: header[NAME_LEN],
                minor: header[NAME_LEN + 1],
                body: pos + MODULE_HEADER_LEN..pos + size,
            });
            pos += size;
        }

        Ok(Self {
            data,
            machine,
            version,
            modules,
        })
    }

    #[must_use]
    pub fn machine(&self) -> &str {
        &self.machine
    }

    #[must_use]
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    #[must_use]
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    /// Open a module by name. Version policy is the caller's business.
    pub fn open_module(&self, name: &str) -> Result<ModuleReader<'_>> {
        let info = self
            .modules
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| CartridgeError::SnapshotModuleNotFound(name.to_string()))?;
        Ok(ModuleReader {
            info,
            data: &self.data[info.body.clone()],
            pos: 0,
        })
    }
}

/// Field reader for one module. Every read past the end is an error.
#[derive(Debug)]
pub struct ModuleReader<'a> {
    info: &'a ModuleInfo,
    data: &'a [u8],
    pos: usize,
}

impl<'a> ModuleReader<'a> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    #[must_use]
    pub fn major(&self) -> u8 {
        self.info.major
    }

    #[must_use]
    pub fn minor(&self) -> u8 {
        self.info.minor
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = self.data;
        let bytes = data
            .get(self.pos..self.pos + len)
            .ok_or_else(|| CartridgeError::SnapshotTruncated(self.info.name.clone()))?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_word(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_dword(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
