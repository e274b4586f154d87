//! Command sequences as cartridge software issues them.

use nor_flash::{CommandState, FlashDevice, FlashMode, FlashType};

/// Program a block the way EasyFlash tools do: unlock, $A0, data, per byte.
fn program_block(device: &mut FlashDevice, mem: &mut [u8], base: u32, data: &[u8]) {
    for (i, &byte) in data.iter().enumerate() {
        device.store(mem, 0x555, 0xAA);
        device.store(mem, 0x2AA, 0x55);
        device.store(mem, 0x555, 0xA0);
        device.store(mem, base + i as u32, byte);
    }
}

#[test]
fn erase_then_program_sector() {
    let mut device = FlashDevice::new(FlashType::Am29f040b);
    let mut mem = vec![0u8; FlashType::Am29f040b.size()];

    device.store(&mut mem, 0x555, 0xAA);
    device.store(&mut mem, 0x2AA, 0x55);
    device.store(&mut mem, 0x555, 0x80);
    device.store(&mut mem, 0x555, 0xAA);
    device.store(&mut mem, 0x2AA, 0x55);
    device.store(&mut mem, 0x3_0000, 0x30);
    assert_eq!(device.mode(), FlashMode::Erase);

    // Poll DQ6 until it stops toggling, like a real flasher would.
    let mut polls = 0;
    loop {
        let a = device.read(&mem, 0x3_0000);
        let b = device.read(&mem, 0x3_0000);
        if (a ^ b) & 0x40 == 0 {
            break;
        }
        device.clock(&mut mem, 100_000);
        polls += 1;
        assert!(polls < 1000, "erase never finished");
    }
    assert_eq!(device.state(), CommandState::Read);
    assert!(mem[0x3_0000..0x4_0000].iter().all(|&b| b == 0xFF));

    program_block(&mut device, &mut mem, 0x3_0000, b"EASYFLASH");
    assert_eq!(&mem[0x3_0000..0x3_0009], b"EASYFLASH");
    assert_eq!(device.state(), CommandState::Read);
}

#[test]
fn reprogramming_without_erase_only_clears_bits() {
    let mut device = FlashDevice::new(FlashType::Am29f040b);
    let mut mem = vec![0xFFu8; FlashType::Am29f040b.size()];
    for (first, second) in [(0xF0u8, 0x0Fu8), (0xAA, 0x55), (0x81, 0xFF), (0x00, 0x12)] {
        program_block(&mut device, &mut mem, 0x100, &[first]);
        device.store(&mut mem, 0, 0xF0);
        program_block(&mut device, &mut mem, 0x100, &[second]);
        assert_eq!(mem[0x100], first & second);
        device.store(&mut mem, 0, 0xF0);
        mem[0x100] = 0xFF;
    }
}
