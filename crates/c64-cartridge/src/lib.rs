//! C64 expansion port cartridges.
//!
//! A [`Cartridge`] owns its ROML/ROMH bank storage and a family-specific
//! [`Board`](board::Board) that decodes the $DE00/$DF00 registers into an
//! address-space configuration. Flash cartridges run the
//! [`nor_flash`] command state machine directly over the bank storage.
//!
//! Images come in as raw binaries or CRT containers and go out the same
//! way; running state persists in VICE-style snapshot modules.

pub mod bank;
pub mod board;
mod cartridge;
pub mod config;
mod error;
pub mod image;
pub mod kind;
pub mod mapping;
pub mod mode;
mod port;
pub mod snapshot;

pub use bank::{BankRegion, compute_bank_mask};
pub use board::IoWindow;
pub use cartridge::{CartRead, CartWrite, Cartridge};
pub use config::{CartridgeOptions, RamInitPattern};
pub use error::{CartridgeError, Result};
pub use image::{ImageFormat, RawCartridge, load_image};
pub use kind::CartridgeKind;
pub use mapping::CartridgeConfig;
pub use mode::AddressMode;
pub use port::ExpansionPort;
