use format_crt::CrtError;
use thiserror::Error;

/// Attach, export and snapshot failures.
///
/// Bus accesses never fail; only the operations that build or persist a
/// cartridge return this.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("malformed cartridge image: {0}")]
    MalformedImage(String),
    #[error("unsupported image size {size} bytes for {kind}")]
    UnsupportedImageSize { kind: &'static str, size: usize },
    #[error("cannot allocate {0} banks")]
    AllocationError(usize),
    #[error("unsupported cartridge type {0}")]
    UnsupportedCartridge(u16),
    #[error(
        "snapshot module {module} has version {found_major}.{found_minor}, \
         this build reads {supported_major}.x"
    )]
    IncompatibleSnapshotVersion {
        module: String,
        found_major: u8,
        found_minor: u8,
        supported_major: u8,
    },
    #[error("snapshot truncated while reading {0}")]
    SnapshotTruncated(String),
    #[error("snapshot module {0} not found")]
    SnapshotModuleNotFound(String),
    #[error("snapshot does not match cartridge: {0}")]
    SnapshotMismatch(String),
    #[error("no image file to write back to")]
    NoBackingFile,
    #[error(transparent)]
    Crt(#[from] CrtError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CartridgeError>;
