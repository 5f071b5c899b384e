mod common;
use dotboy_core::{
    Cartridge, GameBoy, Host, InputState, Model, RunStatus, Session,
    host::{Button, FRAME_BYTES},
    interrupts::Interrupt,
    save::FileStore,
    session::BATCH_CYCLES,
};

#[derive(Default)]
struct ScriptedHost {
    /// Returned from successive polls; the last entry repeats.
    inputs: Vec<InputState>,
    polls: usize,
    frames: usize,
    serial: Vec<u8>,
    delays: Vec<u64>,
    clock_ms: u64,
}

impl Host for ScriptedHost {
    fn poll_input(&mut self) -> InputState {
        let state = self
            .inputs
            .get(self.polls)
            .or(self.inputs.last())
            .copied()
            .unwrap_or_default();
        self.polls += 1;
        state
    }

    fn ticks_ms(&mut self) -> u64 {
        self.clock_ms
    }

    fn delay_ms(&mut self, ms: u64) {
        self.delays.push(ms);
    }

    fn frame_ready(&mut self, frame: &[u8]) {
        assert_eq!(frame.len(), FRAME_BYTES);
        self.frames += 1;
    }

    fn serial_byte(&mut self, byte: u8) {
        self.serial.push(byte);
    }
}

fn session(
    cart_type: u8,
    ram_code: u8,
    program: &[u8],
    host: ScriptedHost,
) -> Session<ScriptedHost> {
    let cart = Cartridge::from_bytes(common::test_rom(cart_type, ram_code, program)).unwrap();
    Session::new(GameBoy::with_cartridge(cart, Some(Model::Dmg), None), host)
}

const SPIN: [u8; 2] = [0x18, 0xFE];

#[test]
fn batch_runs_a_quarter_second() {
    let mut session = session(0x00, 0x00, &SPIN, ScriptedHost::default());
    session.set_pacing(false);
    assert_eq!(session.run_batch().unwrap(), RunStatus::Continue);

    let cycles = session.gameboy().cpu.cycles;
    assert!(cycles >= BATCH_CYCLES as u64);
    assert!(cycles < BATCH_CYCLES as u64 + 64);
    let frames = session.host().frames;
    assert!((14..=15).contains(&frames), "{frames} frames");
    assert!(session.host().polls > 60);
    assert!(session.host().delays.is_empty());
}

#[test]
fn quit_request_stops_the_run() {
    let host = ScriptedHost {
        inputs: vec![InputState::quit()],
        ..Default::default()
    };
    let mut session = session(0x00, 0x00, &SPIN, host);
    session.run().unwrap();
    assert_eq!(session.host().polls, 1);
    assert!(session.gameboy().cpu.cycles < 20_000);
}

#[test]
fn serial_bytes_reach_the_host() {
    // ld a,'O'; ldh (0x01),a; ld a,'K'; ldh (0x01),a; jr -2
    let program = [0x3E, b'O', 0xE0, 0x01, 0x3E, b'K', 0xE0, 0x01, 0x18, 0xFE];
    let mut session = session(0x00, 0x00, &program, ScriptedHost::default());
    session.set_pacing(false);
    session.run_batch().unwrap();
    assert_eq!(session.host().serial, b"OK");
}

#[test]
fn new_press_requests_joypad_and_wakes_halt() {
    // halt; jr -2
    let host = ScriptedHost {
        inputs: vec![InputState::default(), InputState::pressed(&[Button::A])],
        ..Default::default()
    };
    let mut session = session(0x00, 0x00, &[0x76, 0x18, 0xFE], host);
    session.set_pacing(false);
    session.gameboy_mut().mmu.ie_reg = 0;
    session.run_batch().unwrap();

    let gb = session.gameboy();
    assert!(!gb.cpu.halted);
    assert_eq!(gb.cpu.pc, 0x0151);
    assert_ne!(gb.mmu.if_reg & Interrupt::Joypad.bit(), 0);
    assert_eq!(gb.mmu.input.pressed(), Button::A as u8);
}

#[test]
fn pacing_waits_for_the_host_clock() {
    let mut session = session(0x00, 0x00, &SPIN, ScriptedHost::default());
    session.run_batch().unwrap();
    let delays = &session.host().delays;
    assert!(delays.len() >= 9, "{} delays", delays.len());
    assert!(delays.iter().all(|&ms| ms == 23 || ms == 24), "{delays:?}");
}

#[test]
fn paced_second_waits_about_a_second() {
    let mut session = session(0x00, 0x00, &SPIN, ScriptedHost::default());
    for _ in 0..4 {
        session.run_batch().unwrap();
    }
    // The final window may still be open.
    let waited: u64 = session.host().delays.iter().sum();
    assert!((975..=1000).contains(&waited), "waited {waited} ms");
}

#[test]
fn processor_fault_ends_the_run() {
    let mut session = session(0x00, 0x00, &[0xD3], ScriptedHost::default());
    let err = session.run().unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn shutdown_flushes_battery_ram() {
    let dir = tempfile::tempdir().unwrap();
    let rom = dir.path().join("game.gb");
    let store = FileStore::for_rom(&rom, Some(&dir.path().join("saves")));
    let sav = store.ram_path().to_path_buf();

    // ld a,0x77; ld (0xA000),a; jr -2
    let program = [0x3E, 0x77, 0xEA, 0x00, 0xA0, 0x18, 0xFE];
    let mut session =
        session(0x03, 0x02, &program, ScriptedHost::default()).with_battery(Box::new(store));
    session.set_pacing(false);
    session.run_batch().unwrap();
    assert!(!sav.exists());

    let (gb, _host) = session.shutdown();
    assert!(!gb.mmu.cart.as_ref().unwrap().is_dirty());
    let data = std::fs::read(&sav).unwrap();
    assert_eq!(data.len(), 0x2000);
    assert_eq!(data[0], 0x77);
}

#[test]
fn battery_ram_is_restored_on_attach() {
    let dir = tempfile::tempdir().unwrap();
    let rom = dir.path().join("game.gb");
    let store = FileStore::for_rom(&rom, None);
    let mut saved = vec![0u8; 0x2000];
    saved[0x10] = 0xAB;
    std::fs::write(store.ram_path(), &saved).unwrap();

    let mut session =
        session(0x03, 0x02, &SPIN, ScriptedHost::default()).with_battery(Box::new(store));
    assert_eq!(session.gameboy_mut().mmu.read_byte(0xA010), 0xAB);
}
