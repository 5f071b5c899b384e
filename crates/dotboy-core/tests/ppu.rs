use dotboy_core::{
    hardware::CYCLES_PER_FRAME,
    interrupts::Interrupt,
    ppu::{Mode, Ppu, SCREEN_WIDTH},
};

/// OBP0 with colors 1-3 mapped straight through and color 0 drawn black, so
/// a transparent sprite pixel is told apart from an opaque one.
const OBP_VISIBLE_ZERO: u8 = 0xE7;

fn powered_ppu(cgb: bool) -> Ppu {
    let mut ppu = Ppu::new_with_mode(cgb);
    ppu.apply_boot_state();
    ppu
}

#[test]
fn scanline_mode_sequence() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    assert_eq!(ppu.mode(), Mode::OamSearch);

    ppu.step(79, &mut if_reg);
    assert_eq!(ppu.mode(), Mode::OamSearch);
    ppu.step(1, &mut if_reg);
    assert_eq!(ppu.mode(), Mode::PixelTransfer);

    let events = ppu.step(172, &mut if_reg);
    assert_eq!(ppu.mode(), Mode::HBlank);
    assert_eq!(events.hblank_entries, 1);

    ppu.step(204, &mut if_reg);
    assert_eq!(ppu.mode(), Mode::OamSearch);
    assert_eq!(ppu.ly(), 1);
    assert_eq!(ppu.read_reg(0xFF41) & 0x03, 2);
}

#[test]
fn one_frame_per_70224_dots() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    let mut frames = 0;
    let mut vblanks = 0;
    let mut hblanks = 0u32;

    for _ in 0..CYCLES_PER_FRAME / 4 {
        let events = ppu.step(4, &mut if_reg);
        hblanks += events.hblank_entries as u32;
        if events.frame_ready {
            frames += 1;
        }
        if if_reg & Interrupt::VBlank.bit() != 0 {
            vblanks += 1;
            if_reg &= !Interrupt::VBlank.bit();
        }
    }

    assert_eq!(frames, 1);
    assert_eq!(vblanks, 1);
    assert_eq!(hblanks, 144);
    assert_eq!(ppu.ly(), 0);
    assert_eq!(ppu.mode(), Mode::OamSearch);
    assert_eq!(ppu.frames(), 1);
}

#[test]
fn vblank_starts_at_line_144() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.step(456 * 144 - 1, &mut if_reg);
    assert_eq!(ppu.ly(), 143);
    assert_eq!(if_reg, 0);
    ppu.step(1, &mut if_reg);
    assert_eq!(ppu.ly(), 144);
    assert_eq!(ppu.mode(), Mode::VBlank);
    assert_eq!(if_reg, Interrupt::VBlank.bit());
}

#[test]
fn lyc_match_raises_stat() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.write_reg(0xFF41, 0x40, &mut if_reg);
    ppu.write_reg(0xFF45, 2, &mut if_reg);
    assert_eq!(if_reg, 0);
    assert_eq!(ppu.read_reg(0xFF41) & 0x04, 0);

    ppu.step(456 * 2, &mut if_reg);
    assert_eq!(ppu.ly(), 2);
    assert_eq!(if_reg, Interrupt::LcdStat.bit());
    assert_ne!(ppu.read_reg(0xFF41) & 0x04, 0);
}

#[test]
fn mode_entry_stat_sources() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.write_reg(0xFF41, 0x08, &mut if_reg);
    ppu.step(80, &mut if_reg);
    assert_eq!(if_reg, 0);
    ppu.step(172, &mut if_reg);
    assert_eq!(if_reg, Interrupt::LcdStat.bit());
}

#[test]
fn lcd_off_resets_line_and_freezes() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.step(456 * 5 + 100, &mut if_reg);
    assert_eq!(ppu.ly(), 5);

    ppu.write_reg(0xFF40, 0x11, &mut if_reg);
    assert_eq!(ppu.ly(), 0);
    assert_eq!(ppu.read_reg(0xFF41) & 0x03, 0);
    ppu.step(10_000, &mut if_reg);
    assert_eq!(ppu.ly(), 0);

    ppu.write_reg(0xFF40, 0x91, &mut if_reg);
    assert_eq!(ppu.mode(), Mode::OamSearch);
}

#[test]
fn ly_is_read_only() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.step(456 * 3, &mut if_reg);
    ppu.write_reg(0xFF44, 0x80, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF44), 3);
}

#[test]
fn dmg_background_uses_bgp_shades() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    // Tile 0, row 0 all color 3; the rest stays color 0.
    ppu.vram[0][0] = 0xFF;
    ppu.vram[0][1] = 0xFF;
    ppu.step(CYCLES_PER_FRAME, &mut if_reg);

    let fb = ppu.framebuffer();
    assert_eq!(&fb[0..4], &[0, 0, 0, 0xFF]);
    let second_row = SCREEN_WIDTH * 4;
    assert_eq!(&fb[second_row..second_row + 4], &[255, 255, 255, 0xFF]);
}

#[test]
fn dmg_bg_disable_blanks_to_white() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.vram[0][0] = 0xFF;
    ppu.vram[0][1] = 0xFF;
    ppu.write_reg(0xFF40, 0x90, &mut if_reg);
    ppu.step(CYCLES_PER_FRAME, &mut if_reg);
    assert_eq!(&ppu.framebuffer()[0..4], &[255, 255, 255, 0xFF]);
}

#[test]
fn cgb_palette_index_auto_increments_on_write() {
    let mut ppu = powered_ppu(true);
    let mut if_reg = 0;
    ppu.write_reg(0xFF68, 0x80, &mut if_reg);
    ppu.write_reg(0xFF69, 0x1F, &mut if_reg);
    ppu.write_reg(0xFF69, 0x00, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF68), 0xC2);

    ppu.write_reg(0xFF68, 0x00, &mut if_reg);
    assert_eq!(ppu.read_reg(0xFF69), 0x1F);
    assert_eq!(ppu.read_reg(0xFF69), 0x1F);
    assert_eq!(ppu.read_reg(0xFF68), 0x40);
}

#[test]
fn cgb_colors_expand_with_and_without_correction() {
    let mut ppu = powered_ppu(true);
    let mut if_reg = 0;
    // Palette 0 color 0 = pure red (0x001F).
    ppu.write_reg(0xFF68, 0x80, &mut if_reg);
    ppu.write_reg(0xFF69, 0x1F, &mut if_reg);
    ppu.write_reg(0xFF69, 0x00, &mut if_reg);
    ppu.step(CYCLES_PER_FRAME, &mut if_reg);
    assert_eq!(&ppu.framebuffer()[0..4], &[255, 0, 0, 0xFF]);

    ppu.set_color_correction(true);
    ppu.step(CYCLES_PER_FRAME, &mut if_reg);
    // 26 * 31 = 806 -> 201; 0; 6 * 31 = 186 -> 46
    assert_eq!(&ppu.framebuffer()[0..4], &[201, 0, 46, 0xFF]);
}

#[test]
fn window_line_counter_tracks_drawn_lines() {
    let mut ppu = powered_ppu(false);
    let mut if_reg = 0;
    ppu.write_reg(0xFF4A, 10, &mut if_reg);
    ppu.write_reg(0xFF4B, 7, &mut if_reg);
    ppu.write_reg(0xFF40, 0xB1, &mut if_reg);
    ppu.step(456 * 20, &mut if_reg);
    assert_eq!(ppu.window_line_counter(), 10);
}

/// Powered PPU with sprites on and identity BG palette.
fn sprite_ppu(cgb: bool, lcdc: u8) -> Ppu {
    let mut ppu = powered_ppu(cgb);
    let mut if_reg = 0;
    ppu.write_reg(0xFF40, lcdc, &mut if_reg);
    ppu.write_reg(0xFF47, 0xE4, &mut if_reg);
    ppu.write_reg(0xFF48, OBP_VISIBLE_ZERO, &mut if_reg);
    ppu
}

fn set_sprite(ppu: &mut Ppu, index: usize, y: u8, x: u8, tile: u8, flags: u8) {
    ppu.oam[index * 4..index * 4 + 4].copy_from_slice(&[y, x, tile, flags]);
}

fn set_tile_row(ppu: &mut Ppu, tile: usize, row: usize, lo: u8, hi: u8) {
    ppu.vram[0][tile * 16 + row * 2] = lo;
    ppu.vram[0][tile * 16 + row * 2 + 1] = hi;
}

/// Run a fresh PPU through pixel transfer of line `ly`.
fn render_line(ppu: &mut Ppu, ly: u32) {
    let mut if_reg = 0;
    ppu.step(456 * ly + 80 + 172, &mut if_reg);
}

fn pixel(ppu: &Ppu, x: usize, y: usize) -> [u8; 3] {
    let i = (y * SCREEN_WIDTH + x) * 4;
    let fb = ppu.framebuffer();
    [fb[i], fb[i + 1], fb[i + 2]]
}

fn shades(ppu: &Ppu, y: usize, xs: std::ops::Range<usize>) -> Vec<u8> {
    xs.map(|x| pixel(ppu, x, y)[0]).collect()
}

#[test]
fn sprite_color_zero_is_transparent() {
    let mut ppu = sprite_ppu(false, 0x93);
    // Left half color 1, right half color 0.
    set_tile_row(&mut ppu, 1, 0, 0xF0, 0x00);
    set_sprite(&mut ppu, 0, 16, 8, 1, 0x00);
    render_line(&mut ppu, 0);
    assert_eq!(
        shades(&ppu, 0, 0..8),
        [192, 192, 192, 192, 255, 255, 255, 255]
    );
}

#[test]
fn sprite_x_flip_mirrors_the_row() {
    let mut ppu = sprite_ppu(false, 0x93);
    set_tile_row(&mut ppu, 1, 0, 0xF0, 0x00);
    set_sprite(&mut ppu, 0, 16, 8, 1, 0x20);
    render_line(&mut ppu, 0);
    assert_eq!(
        shades(&ppu, 0, 0..8),
        [255, 255, 255, 255, 192, 192, 192, 192]
    );
}

#[test]
fn sprite_y_flip_reads_rows_bottom_up() {
    let mut ppu = sprite_ppu(false, 0x93);
    set_tile_row(&mut ppu, 1, 0, 0xFF, 0x00);
    set_tile_row(&mut ppu, 1, 7, 0x00, 0xFF);
    set_sprite(&mut ppu, 0, 16, 8, 1, 0x40);
    render_line(&mut ppu, 0);
    assert_eq!(shades(&ppu, 0, 0..8), [96; 8]);
}

#[test]
fn tall_sprites_ignore_tile_bit_zero() {
    let mut ppu = sprite_ppu(false, 0x97);
    set_tile_row(&mut ppu, 2, 0, 0xFF, 0x00);
    set_tile_row(&mut ppu, 3, 0, 0xFF, 0xFF);
    set_sprite(&mut ppu, 0, 16, 8, 3, 0x00);
    render_line(&mut ppu, 0);
    assert_eq!(shades(&ppu, 0, 0..8), [192; 8]);

    let mut ppu = sprite_ppu(false, 0x97);
    set_tile_row(&mut ppu, 2, 0, 0xFF, 0x00);
    set_tile_row(&mut ppu, 3, 0, 0xFF, 0xFF);
    set_sprite(&mut ppu, 0, 16, 8, 3, 0x00);
    render_line(&mut ppu, 8);
    assert_eq!(shades(&ppu, 8, 0..8), [0; 8]);
}

#[test]
fn behind_bg_sprite_shows_only_over_color_zero() {
    let mut ppu = sprite_ppu(false, 0x93);
    // Background tile 0: right half color 1.
    set_tile_row(&mut ppu, 0, 0, 0x0F, 0x00);
    set_tile_row(&mut ppu, 1, 0, 0xFF, 0xFF);
    set_sprite(&mut ppu, 0, 16, 8, 1, 0x80);
    render_line(&mut ppu, 0);
    assert_eq!(shades(&ppu, 0, 0..8), [0, 0, 0, 0, 192, 192, 192, 192]);
}

#[test]
fn lower_oam_index_wins_overlap() {
    let mut ppu = sprite_ppu(false, 0x93);
    set_tile_row(&mut ppu, 1, 0, 0xFF, 0x00);
    set_tile_row(&mut ppu, 2, 0, 0xFF, 0xFF);
    set_sprite(&mut ppu, 0, 16, 8, 1, 0x00);
    set_sprite(&mut ppu, 1, 16, 12, 2, 0x00);
    render_line(&mut ppu, 0);
    assert_eq!(shades(&ppu, 0, 0..4), [192; 4]);
    assert_eq!(shades(&ppu, 0, 4..8), [192; 4]);
    assert_eq!(shades(&ppu, 0, 8..12), [0; 4]);
}

#[test]
fn cgb_bg_priority_attribute_covers_sprites() {
    let mut ppu = sprite_ppu(true, 0x93);
    let mut if_reg = 0;
    // OBJ palette 0 color 3 = pure red.
    ppu.write_reg(0xFF6A, 0x86, &mut if_reg);
    ppu.write_reg(0xFF6B, 0x1F, &mut if_reg);
    ppu.write_reg(0xFF6B, 0x00, &mut if_reg);
    // Opaque white background; only the first map column has priority set.
    set_tile_row(&mut ppu, 0, 0, 0xFF, 0x00);
    ppu.vram[1][0x1800] = 0x80;
    set_tile_row(&mut ppu, 1, 0, 0xFF, 0xFF);
    set_sprite(&mut ppu, 0, 16, 12, 1, 0x00);
    render_line(&mut ppu, 0);

    for x in 4..8 {
        assert_eq!(pixel(&ppu, x, 0), [255, 255, 255], "x={x}");
    }
    for x in 8..12 {
        assert_eq!(pixel(&ppu, x, 0), [255, 0, 0], "x={x}");
    }
}
