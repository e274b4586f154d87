//! Flash programming and erasing through the cartridge bus.

use c64_cartridge::image::load_bin;
use c64_cartridge::{CartRead, Cartridge, CartridgeKind, CartridgeOptions};
use nor_flash::{CommandState, FlashMode};

fn megabyter(fill: u8) -> Cartridge {
    let raw = load_bin(CartridgeKind::Megabyter, &vec![fill; 1024 * 1024]).expect("load");
    let mut cart = Cartridge::attach(raw, CartridgeOptions::default()).expect("attach");
    // Ultimax, so $8000 writes reach the chip.
    cart.write(0xDE02, 0x03);
    cart
}

fn unlock(cart: &mut Cartridge, command: u8) {
    cart.write(0x8AAA, 0xAA);
    cart.write(0x8555, 0x55);
    cart.write(0x8AAA, command);
}

fn program(cart: &mut Cartridge, addr: u16, value: u8) {
    unlock(cart, 0xA0);
    cart.write(addr, value);
}

fn chip_state(cart: &Cartridge) -> CommandState {
    cart.board().flash_chips()[0].device.state()
}

#[test]
fn chip_erase_sets_every_cell() {
    let mut cart = megabyter(0x00);
    unlock(&mut cart, 0x80);
    unlock(&mut cart, 0x10);
    assert_eq!(chip_state(&cart), CommandState::ChipErase);

    // Status reads toggle DQ6 while busy.
    let a = cart.read(0x8000);
    let b = cart.read(0x8000);
    assert_ne!(a, b);

    cart.clock(10_000_000);
    assert_eq!(chip_state(&cart), CommandState::Read);
    assert!(cart.region().roml().iter().all(|&b| b == 0xFF));
    assert!(cart.is_dirty());
}

#[test]
fn programming_only_clears_bits() {
    let mut cart = megabyter(0xFF);
    cart.write(0xDE00, 5);
    program(&mut cart, 0x8010, 0x3C);
    assert_eq!(cart.read(0x8010), CartRead::Cart(0x3C));

    // 0x3C & 0x0F = 0x0C: the cell cannot reach 0x0F.
    program(&mut cart, 0x8010, 0x0F);
    assert_eq!(cart.region().read_roml(5, 0x10), 0x3C & 0x0F);
    assert_eq!(chip_state(&cart), CommandState::ByteProgramError);

    cart.write(0x8000, 0xF0);
    assert_eq!(chip_state(&cart), CommandState::Read);
    assert_eq!(cart.read(0x8010), CartRead::Cart(0x0C));
}

#[test]
fn sector_erase_leaves_other_sectors() {
    let mut cart = megabyter(0x00);
    // Sector 1 starts at chip address $10000, bank 8.
    cart.write(0xDE00, 8);
    unlock(&mut cart, 0x80);
    cart.write(0x8AAA, 0xAA);
    cart.write(0x8555, 0x55);
    cart.write(0x8000, 0x30);
    assert_eq!(
        cart.board().flash_chips()[0].device.mode(),
        FlashMode::Erase
    );

    cart.clock(2_000_000);
    let roml = cart.region().roml();
    assert!(roml[0x1_0000..0x2_0000].iter().all(|&b| b == 0xFF));
    assert!(roml[..0x1_0000].iter().all(|&b| b == 0x00));
    assert!(roml[0x2_0000..].iter().all(|&b| b == 0x00));
}

#[test]
fn suspended_erase_reads_other_sectors() {
    let mut cart = megabyter(0x00);
    cart.write(0xDE00, 8);
    unlock(&mut cart, 0x80);
    cart.write(0x8AAA, 0xAA);
    cart.write(0x8555, 0x55);
    cart.write(0x8000, 0x30);
    cart.clock(100);
    cart.write(0x8000, 0xB0);
    assert_eq!(chip_state(&cart), CommandState::SectorEraseSuspend);

    // Bank 0 is outside the erasing sector.
    cart.write(0xDE00, 0);
    assert_eq!(cart.read(0x8000), CartRead::Cart(0x00));

    cart.write(0xDE00, 8);
    cart.write(0x8000, 0x30);
    cart.clock(1_000_000);
    assert_eq!(chip_state(&cart), CommandState::Read);
    assert_eq!(cart.read(0x8000), CartRead::Cart(0xFF));
}

#[test]
fn autoselect_and_reset() {
    let mut cart = megabyter(0x55);
    unlock(&mut cart, 0x90);
    assert_eq!(cart.read(0x8000), CartRead::Cart(0xC2));
    assert_eq!(cart.read(0x8001), CartRead::Cart(0x58));
    assert_eq!(cart.peek(0x8000), Some(0x55));
    cart.write(0x8000, 0xF0);
    assert_eq!(cart.read(0x8000), CartRead::Cart(0x55));
}

#[test]
fn invalid_sequence_changes_nothing() {
    let mut cart = megabyter(0xFF);
    cart.write(0x8AAA, 0xAA);
    cart.write(0x8555, 0x55);
    cart.write(0x8AAA, 0x42);
    assert_eq!(chip_state(&cart), CommandState::Read);
    cart.write(0x8010, 0x00);
    assert_eq!(cart.read(0x8010), CartRead::Cart(0xFF));
    assert!(!cart.is_dirty());
}

#[test]
fn machine_reset_keeps_flash() {
    let mut cart = megabyter(0xFF);
    program(&mut cart, 0x8000, 0x12);
    cart.config_init();
    assert_eq!(cart.region().read_roml(0, 0), 0x12);
    assert!(cart.is_dirty());
}

#[test]
fn easyflash_chips_follow_rom_windows() {
    let raw = load_bin(CartridgeKind::EasyFlash, &vec![0xFF; 1024 * 1024]).expect("load");
    let mut cart = Cartridge::attach(raw, CartridgeOptions::default()).expect("attach");
    cart.write(0xDE00, 2);
    cart.write(0xE555, 0xAA);
    cart.write(0xE2AA, 0x55);
    cart.write(0xE555, 0xA0);
    cart.write(0xE100, 0x99);
    assert_eq!(cart.read(0xE100), CartRead::Cart(0x99));
    assert_eq!(cart.region().read_romh(2, 0x100), 0x99);
    assert_eq!(cart.region().read_roml(2, 0x100), 0xFF);

    // 16K mode shows the same ROMH byte at $A000.
    cart.write(0xDE02, 0x07);
    assert_eq!(cart.read(0xA100), CartRead::Cart(0x99));
}

#[test]
fn rmw_write_repeats_the_read_value_first() {
    let mut data = vec![0xFF; 1024 * 1024];
    data[0x2AA] = 0x54;
    let boot = || {
        let raw = load_bin(CartridgeKind::EasyFlash, &data).expect("load");
        Cartridge::attach(raw, CartridgeOptions::default()).expect("attach")
    };

    // INC $82AA after the first unlock byte: the CPU reads $54, writes
    // $54 back, then writes $55.
    let mut cart = boot();
    cart.write(0x8555, 0xAA);
    assert_eq!(cart.read(0x82AA), CartRead::Cart(0x54));
    cart.write_rmw(0x82AA, 0x55);
    assert_eq!(
        cart.board().flash_chips()[0].device.state(),
        CommandState::Read
    );

    // A plain store of the same value continues the unlock sequence.
    let mut cart = boot();
    cart.write(0x8555, 0xAA);
    assert_eq!(cart.read(0x82AA), CartRead::Cart(0x54));
    cart.write(0x82AA, 0x55);
    assert_eq!(
        cart.board().flash_chips()[0].device.state(),
        CommandState::Magic2
    );
}
