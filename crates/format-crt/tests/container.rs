//! Container-level checks through the public API only.

use format_crt::{ChipPacket, ChipType, CrtError, CrtImage, crt_name, parse_crt};

#[test]
fn ocean_style_image_keeps_bank_and_payload() {
    let mut image = CrtImage::new(5, false, true, "OCEAN TEST");
    for bank in 0..4u16 {
        image.push_chip(ChipPacket::new(
            ChipType::Rom,
            bank,
            0x8000,
            vec![0x10 + bank as u8; 0x2000],
        ));
    }
    let bytes = image.to_bytes();
    assert_eq!(crt_name(&bytes), "OCEAN TEST");

    let parsed = parse_crt(&bytes).expect("valid");
    assert_eq!(parsed.header.hw_type, 5);
    assert_eq!(parsed.chips.len(), 4);
    assert_eq!(parsed.chips[3].bank, 3);
    assert!(parsed.chips[3].data.iter().all(|&b| b == 0x13));
}

#[test]
fn long_names_are_clipped_to_field() {
    let image = CrtImage::new(0, false, true, "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789");
    let mut with_chip = image.clone();
    with_chip.push_chip(ChipPacket::new(ChipType::Rom, 0, 0x8000, vec![0; 0x2000]));
    let parsed = parse_crt(&with_chip.to_bytes()).expect("valid");
    assert_eq!(parsed.header.name.len(), 32);
}

#[test]
fn truncated_header_is_reported() {
    let bytes = CrtImage::new(0, false, true, "X").to_bytes();
    assert_eq!(parse_crt(&bytes[..32]), Err(CrtError::TooShort(32)));
}
