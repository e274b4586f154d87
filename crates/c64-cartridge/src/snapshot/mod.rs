//! Snapshot container and cartridge state modules.

mod codec;
mod stream;

pub use codec::{
    CartridgeState, FLASH_MAJOR, FLASH_MINOR, HEADER_MODULE, RestoredState, open_module, read,
    write,
};
pub use stream::{
    MODULE_HEADER_LEN, ModuleInfo, ModuleReader, ModuleWriter, SNAPSHOT_MAGIC, SNAPSHOT_MAJOR,
    SNAPSHOT_MINOR, SnapshotReader, SnapshotWriter,
};
