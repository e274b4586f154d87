//! Cartridge image tool: inspect, convert and snapshot C64 cartridges.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use c64_cartridge::snapshot::SnapshotWriter;
use c64_cartridge::{Cartridge, CartridgeKind, CartridgeOptions, ImageFormat, Result};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// C64 cartridge image tool
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header, chip packets and power-on state of an image
    Info {
        file: PathBuf,
        /// Family of a raw image (name or CRT id)
        #[arg(short, long)]
        kind: Option<CartridgeKind>,
    },
    /// Convert between raw and CRT images
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        kind: Option<CartridgeKind>,
        /// Output format; defaults to the output file extension
        #[arg(short, long, value_enum)]
        format: Option<Format>,
        /// Keep erased flash banks in CRT output
        #[arg(long)]
        no_optimize: bool,
    },
    /// Attach an image and write a snapshot of its power-on state
    Snapshot {
        file: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        kind: Option<CartridgeKind>,
        /// Boot jumper setting for EasyFlash
        #[arg(long)]
        jumper: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Format {
    Bin,
    Crt,
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Bin => Self::Bin,
            Format::Crt => Self::Crt,
        }
    }
}

fn format_for(path: &Path) -> ImageFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("crt") => ImageFormat::Crt,
        _ => ImageFormat::Bin,
    }
}

fn info(file: &Path, kind: Option<CartridgeKind>) -> Result<()> {
    let data = fs::read(file)?;
    if format_crt::is_crt(&data) {
        let image = format_crt::parse_crt(&data)?;
        let header = &image.header;
        println!(
            "CRT v{}.{:02}, type {}, EXROM {}, GAME {}, name \"{}\"",
            header.version >> 8,
            header.version & 0xFF,
            header.hw_type,
            u8::from(header.exrom),
            u8::from(header.game),
            header.name
        );
        for (i, chip) in image.chips.iter().enumerate() {
            println!(
                "  chip {i:3}: {:?} bank {:3} ${:04X} ${:04X} bytes{}",
                chip.chip_type,
                chip.bank,
                chip.load_address,
                chip.size(),
                if chip.is_blank() { " (blank)" } else { "" }
            );
        }
    }

    let cart = Cartridge::from_bytes(&data, kind, CartridgeOptions::default())?;
    println!("Family:  {} (CRT id {})", cart.kind(), cart.kind().crt_id());
    println!("Banks:   {} (mask ${:02X})", cart.image_banks(), cart.bank_mask());
    println!("Mode:    {}", cart.mode());
    println!("State:   {}", cart.dump());
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    kind: Option<CartridgeKind>,
    format: Option<Format>,
    no_optimize: bool,
) -> Result<()> {
    let options = CartridgeOptions {
        optimize_crt: !no_optimize,
        ..CartridgeOptions::default()
    };
    let cart = Cartridge::open(input, kind, options)?;
    let format = format.map_or_else(|| format_for(output), ImageFormat::from);
    cart.save_as(output, format)?;
    println!("Wrote {} as {format:?} to {}", cart.kind(), output.display());
    Ok(())
}

fn snapshot(file: &Path, output: &Path, kind: Option<CartridgeKind>, jumper: bool) -> Result<()> {
    let options = CartridgeOptions {
        easyflash_jumper: jumper,
        ..CartridgeOptions::default()
    };
    let cart = Cartridge::open(file, kind, options)?;
    let mut writer = SnapshotWriter::new("C64");
    cart.save_snapshot(&mut writer);
    fs::write(output, writer.into_bytes())?;
    println!("Wrote {} snapshot to {}", cart.kind(), output.display());
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = match &args.command {
        Command::Info { file, kind } => info(file, *kind),
        Command::Convert {
            input,
            output,
            kind,
            format,
            no_optimize,
        } => convert(input, output, *kind, *format, *no_optimize),
        Command::Snapshot {
            file,
            output,
            kind,
            jumper,
        } => snapshot(file, output, *kind, *jumper),
    };

    if let Err(e) = result {
        eprintln!("c64cart: {e}");
        process::exit(1);
    }
}
