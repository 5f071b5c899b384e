mod common;
use dotboy_core::{Cartridge, GameBoy, Model, interrupts::Interrupt, timer::Timer};

#[test]
fn div_counts_every_256_cycles() {
    let mut timer = Timer::new();
    let mut if_reg = 0;
    timer.advance(255, &mut if_reg);
    assert_eq!(timer.read(0xFF04), 0);
    timer.advance(1, &mut if_reg);
    assert_eq!(timer.read(0xFF04), 1);
    timer.advance(256 * 255, &mut if_reg);
    assert_eq!(timer.read(0xFF04), 0);
    assert_eq!(if_reg, 0);
}

#[test]
fn div_write_restarts_divider() {
    let mut timer = Timer::new();
    let mut if_reg = 0;
    timer.advance(200, &mut if_reg);
    timer.write(0xFF04, 0x99);
    assert_eq!(timer.read(0xFF04), 0);
    timer.advance(255, &mut if_reg);
    assert_eq!(timer.read(0xFF04), 0);
    timer.advance(1, &mut if_reg);
    assert_eq!(timer.read(0xFF04), 1);
}

#[test]
fn tima_counts_at_selected_rate() {
    for (tac, period) in [(0x04, 1024), (0x05, 16), (0x06, 64), (0x07, 256)] {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.write(0xFF07, tac);
        timer.advance(period * 10, &mut if_reg);
        assert_eq!(timer.read(0xFF05), 10, "TAC={tac:#04X}");
        timer.advance(period - 1, &mut if_reg);
        assert_eq!(timer.read(0xFF05), 10, "TAC={tac:#04X}");
    }
}

#[test]
fn disabled_timer_holds_tima() {
    let mut timer = Timer::new();
    let mut if_reg = 0;
    timer.write(0xFF07, 0x01);
    timer.advance(10_000, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 0);
    assert_eq!(timer.read(0xFF07), 0xF9);
}

#[test]
fn disabling_mid_count_freezes_tima() {
    let mut timer = Timer::new();
    let mut if_reg = 0;
    timer.write(0xFF07, 0x05);
    timer.advance(40, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 2);

    timer.write(0xFF07, 0x01);
    timer.advance(10_000, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 2);
    assert_eq!(if_reg, 0);

    // The 8 cycles already counted toward the next tick are kept.
    timer.write(0xFF07, 0x05);
    timer.advance(8, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 3);
}

#[test]
fn period_change_restarts_sub_counter() {
    let mut timer = Timer::new();
    let mut if_reg = 0;
    timer.write(0xFF07, 0x05);
    timer.advance(10, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 0);

    timer.write(0xFF07, 0x06);
    timer.advance(60, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 0);
    timer.advance(4, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 1);
}

#[test]
fn overflow_reloads_tma_and_requests_interrupt() {
    let mut timer = Timer::new();
    let mut if_reg = 0;
    timer.write(0xFF05, 0xFE);
    timer.write(0xFF06, 0x42);
    timer.write(0xFF07, 0x05);

    timer.advance(16, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 0xFF);
    assert_eq!(if_reg, 0);

    timer.advance(16, &mut if_reg);
    assert_eq!(timer.read(0xFF05), 0x42);
    assert_eq!(if_reg, Interrupt::Timer.bit());
}

#[test]
fn stop_freezes_divider() {
    // stop; nop
    let rom = common::test_rom(0x00, 0x00, &[0x10, 0x00, 0x00]);
    let cart = Cartridge::from_bytes(rom).unwrap();
    let mut gb = GameBoy::with_cartridge(cart, Some(Model::Dmg), None);

    gb.mmu.timer.write(0xFF07, 0x05);
    while !gb.cpu.stopped {
        gb.step().unwrap();
    }
    let div = gb.mmu.timer.read(0xFF04);
    let tima = gb.mmu.timer.read(0xFF05);
    assert_eq!(div, 0);
    for _ in 0..10_000 {
        gb.step().unwrap();
    }
    assert!(gb.cpu.stopped);
    assert_eq!(gb.mmu.timer.read(0xFF04), div);
    assert_eq!(gb.mmu.timer.read(0xFF05), tima);
}
