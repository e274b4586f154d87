//! Image loading: raw binaries and CRT containers.
//!
//! Both shapes are normalised to one interleaved buffer (8K ROML then
//! 8K ROMH per bank) pre-filled with `0xFF`, so banks a CRT leaves out
//! read as erased flash. The loader keeps no state after returning.

use format_crt::{ChipType, CrtImage, is_crt, parse_crt};
use log::{debug, warn};

use crate::bank::{BANK_SIZE, SLOT_SIZE};
use crate::error::{CartridgeError, Result};
use crate::kind::{CartridgeKind, ChunkTarget, RawLayout};
use crate::mode::AddressMode;

/// Container an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bin,
    Crt,
}

/// A validated image, ready to be attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCartridge {
    pub kind: CartridgeKind,
    pub name: String,
    /// Interleaved ROML/ROMH, `bank_count * 16K` bytes.
    pub data: Vec<u8>,
    /// Banks the image populates (highest bank + 1).
    pub bank_count: usize,
    /// Mode given by the CRT header lines, or the family default.
    pub mode: AddressMode,
    pub format: ImageFormat,
}

fn erased(bank_count: usize) -> Vec<u8> {
    vec![0xFF; bank_count * SLOT_SIZE]
}

/// Load an image of either shape. Raw binaries need the family, unless
/// they are a plain 8K or 16K dump.
pub fn load_image(data: &[u8], kind: Option<CartridgeKind>) -> Result<RawCartridge> {
    if is_crt(data) {
        let raw = load_crt(data)?;
        if let Some(expected) = kind.filter(|&k| k != raw.kind) {
            warn!("CRT is {} but {} was requested", raw.kind, expected);
        }
        return Ok(raw);
    }

    let kind = match kind {
        Some(kind) => kind,
        None => match strip_load_address(data, &[0x2000, 0x4000]).len() {
            0x2000 => CartridgeKind::Generic8k,
            0x4000 => CartridgeKind::Generic16k,
            size => {
                return Err(CartridgeError::MalformedImage(format!(
                    "cannot tell the cartridge type of a {size} byte raw image"
                )));
            }
        },
    };
    load_bin(kind, data)
}

/// Drop a 2-byte load address if that turns `data` into a legal size.
fn strip_load_address<'a>(data: &'a [u8], sizes: &[usize]) -> &'a [u8] {
    if !sizes.contains(&data.len()) && data.len() >= 2 && sizes.contains(&(data.len() - 2)) {
        &data[2..]
    } else {
        data
    }
}

/// Load a headerless image for `kind`.
pub fn load_bin(kind: CartridgeKind, data: &[u8]) -> Result<RawCartridge> {
    let sizes = kind.raw_sizes();
    let body = strip_load_address(data, sizes);
    if !sizes.contains(&body.len()) {
        warn!("{kind}: rejecting {} byte raw image", data.len());
        return Err(CartridgeError::UnsupportedImageSize {
            kind: kind.name(),
            size: data.len(),
        });
    }

    let mode = kind.default_mode();
    let (buffer, bank_count) = match kind.raw_layout() {
        RawLayout::Interleaved if kind == CartridgeKind::Ultimax && body.len() == BANK_SIZE => {
            // 8K Ultimax images are ROMH only.
            let mut buffer = erased(1);
            buffer[BANK_SIZE..].copy_from_slice(body);
            (buffer, 1)
        }
        RawLayout::Interleaved => {
            let banks = body.len().div_ceil(SLOT_SIZE);
            let mut buffer = erased(banks);
            buffer[..body.len()].copy_from_slice(body);
            (buffer, banks)
        }
        RawLayout::LinearRoml => {
            let banks = body.len() / BANK_SIZE;
            let mut buffer = erased(banks);
            for (bank, chunk) in body.chunks(BANK_SIZE).enumerate() {
                let base = bank * SLOT_SIZE;
                buffer[base..base + chunk.len()].copy_from_slice(chunk);
            }
            (buffer, banks)
        }
    };
    debug!("{kind}: raw image, {bank_count} banks");
    Ok(RawCartridge {
        kind,
        name: String::new(),
        data: buffer,
        bank_count,
        mode,
        format: ImageFormat::Bin,
    })
}

/// Load a CRT container. Any bad packet aborts the whole load.
pub fn load_crt(data: &[u8]) -> Result<RawCartridge> {
    let image = parse_crt(data)?;
    raw_from_crt(&image).inspect_err(|e| warn!("rejecting CRT image: {e}"))
}

fn raw_from_crt(image: &CrtImage) -> Result<RawCartridge> {
    let header = &image.header;
    let mode = AddressMode::from_lines(header.exrom, header.game);
    let kind = if header.hw_type == 0 {
        CartridgeKind::generic(mode).ok_or_else(|| {
            CartridgeError::MalformedImage("generic cartridge with EXROM and GAME inactive".into())
        })?
    } else {
        CartridgeKind::from_crt_id(header.hw_type)
            .ok_or(CartridgeError::UnsupportedCartridge(header.hw_type))?
    };

    let max_banks = kind.max_banks();
    let mut buffer = erased(max_banks);
    // One flag per 8K half.
    let mut filled = vec![false; max_banks * 2];
    let mut bank_count = 0;

    for (index, chip) in image.chips.iter().enumerate() {
        if chip.chip_type == ChipType::Ram {
            return Err(CartridgeError::MalformedImage(format!(
                "chip {index}: RAM packets are not supported for {kind}"
            )));
        }
        let bank = usize::from(chip.bank);
        if bank >= max_banks {
            return Err(CartridgeError::MalformedImage(format!(
                "chip {index}: bank {bank} out of range, {kind} has {max_banks}"
            )));
        }
        let target = kind
            .chunk_target(chip.load_address, chip.data.len())
            .ok_or_else(|| {
                CartridgeError::MalformedImage(format!(
                    "chip {index}: {} bytes at ${:04X} is not valid for {kind}",
                    chip.data.len(),
                    chip.load_address
                ))
            })?;

        let halves: &[usize] = match target {
            ChunkTarget::Roml => &[0],
            ChunkTarget::Romh => &[1],
            ChunkTarget::Both => &[0, 1],
        };
        for &half in halves {
            let slot = bank * 2 + half;
            if filled[slot] {
                return Err(CartridgeError::MalformedImage(format!(
                    "chip {index}: overlaps earlier data in bank {bank}"
                )));
            }
            filled[slot] = true;
        }

        let start = bank * SLOT_SIZE + halves[0] * BANK_SIZE;
        buffer[start..start + chip.data.len()].copy_from_slice(&chip.data);
        bank_count = bank_count.max(bank + 1);
    }

    if bank_count == 0 {
        return Err(CartridgeError::MalformedImage("no ROM data".into()));
    }
    if !kind.has_flash() {
        buffer.truncate(bank_count * SLOT_SIZE);
    }

    debug!(
        "{kind}: CRT \"{}\", {} chips, {bank_count} banks, mode {mode}",
        header.name,
        image.chips.len()
    );
    Ok(RawCartridge {
        kind,
        name: header.name.clone(),
        bank_count: if kind.has_flash() { max_banks } else { bank_count },
        data: buffer,
        mode,
        format: ImageFormat::Crt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use format_crt::ChipPacket;

    fn crt(kind_id: u16, exrom: bool, game: bool, chips: Vec<ChipPacket>) -> Vec<u8> {
        let mut image = CrtImage::new(kind_id, exrom, game, "TEST");
        for chip in chips {
            image.push_chip(chip);
        }
        image.to_bytes()
    }

    fn rom(bank: u16, addr: u16, fill: u8, len: usize) -> ChipPacket {
        ChipPacket::new(ChipType::Rom, bank, addr, vec![fill; len])
    }

    #[test]
    fn raw_16k_is_generic_16k() {
        let raw = load_image(&[0x11; 0x4000], None).expect("load");
        assert_eq!(raw.kind, CartridgeKind::Generic16k);
        assert_eq!(raw.mode, AddressMode::Game16k);
        assert_eq!(raw.bank_count, 1);
    }

    #[test]
    fn load_address_prefix_is_skipped() {
        let mut data = vec![0x00, 0x80];
        data.extend(std::iter::repeat_n(0x22, 0x2000));
        let raw = load_image(&data, None).expect("load");
        assert_eq!(raw.kind, CartridgeKind::Generic8k);
        assert_eq!(raw.data[0], 0x22);
    }

    #[test]
    fn raw_size_is_checked() {
        let err = load_bin(CartridgeKind::Uc1, &[0; 48 * 1024]).expect_err("48K is not a UC-1 size");
        assert!(matches!(
            err,
            CartridgeError::UnsupportedImageSize { size: 49152, .. }
        ));
    }

    #[test]
    fn linear_layout_fills_roml_only() {
        let mut data = vec![0x01; 0x2000];
        data.extend(vec![0x02; 0x2000]);
        data.extend(vec![0x03; 0x4000]);
        let raw = load_bin(CartridgeKind::Ocean, &data).expect("load");
        assert_eq!(raw.bank_count, 4);
        assert_eq!(raw.data[SLOT_SIZE], 0x02);
        assert_eq!(raw.data[SLOT_SIZE + BANK_SIZE], 0xFF);
    }

    #[test]
    fn ultimax_8k_goes_to_romh() {
        let raw = load_bin(CartridgeKind::Ultimax, &[0x33; 0x2000]).expect("load");
        assert_eq!(raw.data[0], 0xFF);
        assert_eq!(raw.data[BANK_SIZE], 0x33);
    }

    #[test]
    fn crt_chunks_in_any_order() {
        let data = crt(
            83,
            false,
            false,
            vec![rom(1, 0xA000, 0xB1, 0x2000), rom(0, 0x8000, 0xA0, 0x4000), rom(1, 0x8000, 0xA1, 0x2000)],
        );
        let raw = load_crt(&data).expect("load");
        assert_eq!(raw.kind, CartridgeKind::Uc2);
        assert_eq!(raw.bank_count, 2);
        assert_eq!(raw.data[0], 0xA0);
        assert_eq!(raw.data[BANK_SIZE], 0xA0);
        assert_eq!(raw.data[SLOT_SIZE], 0xA1);
        assert_eq!(raw.data[SLOT_SIZE + BANK_SIZE], 0xB1);
    }

    #[test]
    fn overlapping_chunks_are_rejected() {
        let data = crt(
            5,
            false,
            true,
            vec![rom(0, 0x8000, 1, 0x2000), rom(0, 0x8000, 2, 0x2000)],
        );
        assert!(matches!(load_crt(&data), Err(CartridgeError::MalformedImage(_))));

        let data = crt(
            83,
            false,
            false,
            vec![rom(0, 0x8000, 1, 0x4000), rom(0, 0xE000, 2, 0x2000)],
        );
        assert!(matches!(load_crt(&data), Err(CartridgeError::MalformedImage(_))));
    }

    #[test]
    fn bank_and_address_limits() {
        let data = crt(81, false, false, vec![rom(8, 0x8000, 1, 0x2000)]);
        assert!(matches!(load_crt(&data), Err(CartridgeError::MalformedImage(_))));

        let data = crt(85, true, false, vec![rom(0, 0xA000, 1, 0x2000)]);
        assert!(matches!(load_crt(&data), Err(CartridgeError::MalformedImage(_))));

        let data = crt(85, true, false, vec![rom(0, 0x8000, 1, 0x1000)]);
        assert!(matches!(load_crt(&data), Err(CartridgeError::MalformedImage(_))));
    }

    #[test]
    fn flash_images_cover_whole_chip() {
        let data = crt(85, true, false, vec![ChipPacket::new(ChipType::Flash, 3, 0x8000, vec![7; 0x2000])]);
        let raw = load_crt(&data).expect("load");
        assert_eq!(raw.bank_count, 128);
        assert_eq!(raw.data.len(), 128 * SLOT_SIZE);
        assert_eq!(raw.data[3 * SLOT_SIZE], 7);
        assert_eq!(raw.data[0], 0xFF);
    }

    #[test]
    fn unknown_hardware_type() {
        let data = crt(60, false, false, vec![rom(0, 0x8000, 1, 0x2000)]);
        assert!(matches!(
            load_crt(&data),
            Err(CartridgeError::UnsupportedCartridge(60))
        ));
    }

    #[test]
    fn generic_kind_follows_header_lines() {
        let data = crt(0, true, false, vec![rom(0, 0xE000, 1, 0x2000)]);
        assert_eq!(load_crt(&data).expect("load").kind, CartridgeKind::Ultimax);

        let data = crt(0, true, true, vec![rom(0, 0x8000, 1, 0x2000)]);
        assert!(load_crt(&data).is_err());
    }
}
