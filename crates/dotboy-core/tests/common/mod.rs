use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

static INIT: OnceCell<()> = OnceCell::new();

fn ensure_test_roms() {
    INIT.get_or_init(|| {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_roms");
        fs::create_dir_all(&dir).expect("failed to create test_roms directory");

        // ROM binaries are not checked in; fetch the c-sp bundle on first use.
        let has_tree = dir.join("blargg").exists() && dir.join("mooneye-test-suite").exists();
        if has_tree {
            return;
        }

        let url = "https://github.com/c-sp/game-boy-test-roms/releases/download/v7.0/game-boy-test-roms-v7.0.zip";
        let resp = reqwest::blocking::get(url).expect("failed to download test roms");
        let status = resp.status();
        if !status.is_success() {
            panic!("failed to download test roms: {status}");
        }
        let bytes = resp.bytes().expect("failed to read rom bytes");
        let reader = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(reader).expect("failed to open zip archive");
        archive.extract(&dir).expect("failed to extract test roms");
    });
}

#[allow(dead_code)]
pub fn rom_path<P: AsRef<Path>>(relative: P) -> PathBuf {
    ensure_test_roms();
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_roms")
        .join(relative)
}

#[allow(dead_code)]
pub fn serial_contains_result(serial: &[u8], checked_up_to: &mut usize) -> bool {
    const PASSED: &[u8] = b"Passed";
    const FAILED: &[u8] = b"Failed";

    let lookbehind = PASSED.len() - 1;
    let start = checked_up_to.saturating_sub(lookbehind).min(serial.len());
    let window = &serial[start..];

    let found = window.windows(PASSED.len()).any(|chunk| chunk == PASSED)
        || window.windows(FAILED.len()).any(|chunk| chunk == FAILED);

    *checked_up_to = serial.len();
    found
}

/// Entry point of [`test_rom`] programs.
#[allow(dead_code)]
pub const PROGRAM_START: u16 = 0x0150;

/// A 32 KiB image with a valid header whose entry point jumps to `program`,
/// placed at 0x0150.
#[allow(dead_code)]
pub fn test_rom(cart_type: u8, ram_code: u8, program: &[u8]) -> Vec<u8> {
    test_rom_banks(cart_type, ram_code, 2, program)
}

#[allow(dead_code)]
pub fn test_rom_banks(cart_type: u8, ram_code: u8, banks: usize, program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; banks * 0x4000];
    // nop; jp 0x0150
    rom[0x0100..0x0104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
    rom[0x0134..0x0138].copy_from_slice(b"TEST");
    rom[0x0147] = cart_type;
    rom[0x0148] = (banks / 2).trailing_zeros() as u8;
    rom[0x0149] = ram_code;
    let start = PROGRAM_START as usize;
    rom[start..start + program.len()].copy_from_slice(program);
    for bank in 1..banks {
        rom[bank * 0x4000] = bank as u8;
    }
    rom
}
