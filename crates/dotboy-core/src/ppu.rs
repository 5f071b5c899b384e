use crate::interrupts::{self, Interrupt};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Timing constants per LCD mode in T-cycles
const MODE0_CYCLES: u32 = 204; // HBlank
const MODE1_CYCLES: u32 = 456; // One line during VBlank
const MODE2_CYCLES: u32 = 80; // OAM scan
const MODE3_CYCLES: u32 = 172; // Pixel transfer

// Last line of VBlank
const LAST_LINE: u8 = 153;

const TOTAL_SPRITES: usize = 40;

// Internal memory sizes
pub const VRAM_BANK_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;
const PAL_RAM_SIZE: usize = 0x40;
const PAL_INDEX_MASK: u8 = 0x3F;
const PAL_AUTO_INCREMENT_BIT: u8 = 0x80;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout constants
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x0800;

// LCDC bits
const LCDC_BG_ENABLE: u8 = 0x01;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_OBJ_TALL: u8 = 0x04;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_WINDOW_ENABLE: u8 = 0x20;
const LCDC_WINDOW_MAP: u8 = 0x40;
const LCDC_LCD_ENABLE: u8 = 0x80;

// STAT interrupt sources
const STAT_HBLANK_IRQ: u8 = 0x08;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_LYC_IRQ: u8 = 0x40;

/// Gray levels for DMG color indices 0-3.
const DMG_SHADES: [u8; 4] = [255, 192, 96, 0];

/// LCD mode as reported in STAT bits 0-1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    PixelTransfer = 3,
}

/// What happened during one call to [`Ppu::step`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PpuEvents {
    /// Number of times H-blank was entered.
    pub hblank_entries: u8,
    /// A frame finished; the framebuffer holds it until the next one starts.
    pub frame_ready: bool,
}

pub struct Ppu {
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub vram_bank: usize,
    pub oam: [u8; OAM_SIZE],

    cgb: bool,
    color_correction: bool,

    lcdc: u8,
    /// STAT interrupt enable bits (3-6).
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    lyc_eq_ly: bool,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    /// Internal window line counter
    win_line_counter: u8,

    bgpi: u8,
    bgpd: [u8; PAL_RAM_SIZE],
    obpi: u8,
    obpd: [u8; PAL_RAM_SIZE],

    mode_clock: u32,
    mode: Mode,

    framebuffer: Vec<u8>,
    /// BG/window color index per pixel of the current line.
    line_color: [u8; SCREEN_WIDTH],
    /// CGB BG-to-OBJ priority attribute per pixel of the current line.
    line_priority: [bool; SCREEN_WIDTH],
    frame_counter: u64,
}

impl Ppu {
    pub fn new_with_mode(cgb: bool) -> Self {
        Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            cgb,
            color_correction: false,
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            lyc_eq_ly: true,
            dma: 0xFF,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            win_line_counter: 0,
            bgpi: 0,
            bgpd: [0; PAL_RAM_SIZE],
            obpi: 0,
            obpd: [0; PAL_RAM_SIZE],
            mode_clock: 0,
            mode: Mode::HBlank,
            framebuffer: vec![0xFF; SCREEN_WIDTH * SCREEN_HEIGHT * 4],
            line_color: [0; SCREEN_WIDTH],
            line_priority: [false; SCREEN_WIDTH],
            frame_counter: 0,
        }
    }

    pub fn new() -> Self {
        Self::new_with_mode(false)
    }

    /// Initialize registers to the state expected after the boot ROM
    /// has finished executing.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.bgp = 0xFC;
        self.obp0 = 0xFF;
        self.obp1 = 0xFF;
        self.ly = 0;
        self.mode = Mode::OamSearch;
        self.mode_clock = 0;
        self.win_line_counter = 0;
        self.lyc_eq_ly = self.ly == self.lyc;
        if self.cgb {
            // The CGB boot ROM leaves every background color white.
            self.bgpd = [0xFF; PAL_RAM_SIZE];
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & LCDC_LCD_ENABLE != 0
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    pub fn set_color_correction(&mut self, enabled: bool) {
        self.color_correction = enabled;
    }

    pub fn color_correction(&self) -> bool {
        self.color_correction
    }

    /// RGBA8 image of the last completed frame (160x144x4 bytes).
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Returns the number of frames that have been completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    /// Returns the current value of the internal window line counter.
    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    /// Expand a 15-bit CGB color to RGB8.
    fn cgb_rgb(&self, lo: u8, hi: u8) -> [u8; 3] {
        let raw = ((hi as u16) << 8) | lo as u16;
        let r = (raw & 0x1F) as u32;
        let g = ((raw >> 5) & 0x1F) as u32;
        let b = ((raw >> 10) & 0x1F) as u32;
        if self.color_correction {
            // Approximates the washed-out gamut of the CGB LCD.
            [
                ((r * 26 + g * 4 + b * 2).min(960) >> 2) as u8,
                ((g * 24 + b * 8).min(960) >> 2) as u8,
                ((r * 6 + g * 4 + b * 22).min(960) >> 2) as u8,
            ]
        } else {
            let expand = |c: u32| ((c << 3) | (c >> 2)) as u8;
            [expand(r), expand(g), expand(b)]
        }
    }

    fn bg_palette_rgb(&self, palette: usize, color_id: u8) -> [u8; 3] {
        let off = palette * 8 + color_id as usize * 2;
        self.cgb_rgb(self.bgpd[off], self.bgpd[off + 1])
    }

    fn obj_palette_rgb(&self, palette: usize, color_id: u8) -> [u8; 3] {
        let off = palette * 8 + color_id as usize * 2;
        self.cgb_rgb(self.obpd[off], self.obpd[off + 1])
    }

    #[inline(always)]
    fn dmg_rgb(palette: u8, color_id: u8) -> [u8; 3] {
        let shade = DMG_SHADES[((palette >> (color_id * 2)) & 0x03) as usize];
        [shade, shade, shade]
    }

    #[inline]
    fn put_pixel(&mut self, x: usize, rgb: [u8; 3]) {
        let idx = (self.ly as usize * SCREEN_WIDTH + x) * 4;
        self.framebuffer[idx..idx + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
    }

    fn step_palette_index(index: &mut u8) {
        if *index & PAL_AUTO_INCREMENT_BIT != 0 {
            *index = PAL_AUTO_INCREMENT_BIT | ((*index + 1) & PAL_INDEX_MASK);
        }
    }

    /// Compare LY against LYC, raising the STAT interrupt on a match when
    /// enabled.
    fn compare_ly_lyc(&mut self, if_reg: &mut u8) {
        self.lyc_eq_ly = self.ly == self.lyc;
        if self.lyc_eq_ly && self.stat & STAT_LYC_IRQ != 0 {
            interrupts::request(if_reg, Interrupt::LcdStat);
        }
    }

    fn enter_mode(&mut self, mode: Mode, if_reg: &mut u8) {
        self.mode = mode;
        let source = match mode {
            Mode::HBlank => STAT_HBLANK_IRQ,
            Mode::VBlank => STAT_VBLANK_IRQ,
            Mode::OamSearch => STAT_OAM_IRQ,
            Mode::PixelTransfer => 0,
        };
        if self.stat & source != 0 {
            interrupts::request(if_reg, Interrupt::LcdStat);
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let mode = if self.lcd_enabled() { self.mode as u8 } else { 0 };
                0x80 | self.stat | if self.lyc_eq_ly { 0x04 } else { 0 } | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF4F if self.cgb => 0xFE | self.vram_bank as u8,
            0xFF68 if self.cgb => self.bgpi | 0x40,
            0xFF69 if self.cgb => self.bgpd[(self.bgpi & PAL_INDEX_MASK) as usize],
            0xFF6A if self.cgb => self.obpi | 0x40,
            0xFF6B if self.cgb => self.obpd[(self.obpi & PAL_INDEX_MASK) as usize],
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    self.ly = 0;
                    self.mode = Mode::HBlank;
                    self.mode_clock = 0;
                    self.win_line_counter = 0;
                    self.compare_ly_lyc(if_reg);
                } else if !was_on && self.lcd_enabled() {
                    self.mode = Mode::OamSearch;
                    self.mode_clock = 0;
                    self.compare_ly_lyc(if_reg);
                }
            }
            // Mode and coincidence bits are read-only.
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.compare_ly_lyc(if_reg);
            }
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            0xFF4F if self.cgb => self.vram_bank = (val & 0x01) as usize,
            0xFF68 if self.cgb => self.bgpi = val & (PAL_AUTO_INCREMENT_BIT | PAL_INDEX_MASK),
            0xFF69 if self.cgb => {
                self.bgpd[(self.bgpi & PAL_INDEX_MASK) as usize] = val;
                Self::step_palette_index(&mut self.bgpi);
            }
            0xFF6A if self.cgb => self.obpi = val & (PAL_AUTO_INCREMENT_BIT | PAL_INDEX_MASK),
            0xFF6B if self.cgb => {
                self.obpd[(self.obpi & PAL_INDEX_MASK) as usize] = val;
                Self::step_palette_index(&mut self.obpi);
            }
            _ => {}
        }
    }

    /// Advance the LCD by `cycles` dots.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) -> PpuEvents {
        let mut events = PpuEvents::default();
        if !self.lcd_enabled() {
            return events;
        }

        self.mode_clock += cycles;
        loop {
            match self.mode {
                Mode::OamSearch if self.mode_clock >= MODE2_CYCLES => {
                    self.mode_clock -= MODE2_CYCLES;
                    self.enter_mode(Mode::PixelTransfer, if_reg);
                }
                Mode::PixelTransfer if self.mode_clock >= MODE3_CYCLES => {
                    self.mode_clock -= MODE3_CYCLES;
                    self.render_scanline();
                    self.enter_mode(Mode::HBlank, if_reg);
                    events.hblank_entries += 1;
                }
                Mode::HBlank if self.mode_clock >= MODE0_CYCLES => {
                    self.mode_clock -= MODE0_CYCLES;
                    self.ly += 1;
                    self.compare_ly_lyc(if_reg);
                    if self.ly as usize == SCREEN_HEIGHT {
                        interrupts::request(if_reg, Interrupt::VBlank);
                        self.enter_mode(Mode::VBlank, if_reg);
                    } else {
                        self.enter_mode(Mode::OamSearch, if_reg);
                    }
                }
                Mode::VBlank if self.mode_clock >= MODE1_CYCLES => {
                    self.mode_clock -= MODE1_CYCLES;
                    if self.ly == LAST_LINE {
                        self.ly = 0;
                        self.win_line_counter = 0;
                        self.frame_counter = self.frame_counter.wrapping_add(1);
                        events.frame_ready = true;
                        self.compare_ly_lyc(if_reg);
                        self.enter_mode(Mode::OamSearch, if_reg);
                    } else {
                        self.ly += 1;
                        self.compare_ly_lyc(if_reg);
                    }
                }
                _ => break,
            }
        }
        events
    }

    /// Address within a VRAM bank of row `row` of tile `tile_index`.
    fn tile_row_addr(&self, tile_index: u8, row: usize) -> usize {
        let base = if self.lcdc & LCDC_TILE_DATA != 0 {
            TILE_DATA_0_BASE + tile_index as usize * 16
        } else {
            TILE_DATA_1_BASE + ((tile_index as i8 as i16 + 128) as usize) * 16
        };
        base + row * 2
    }

    /// Fetch one background/window pixel from tile map `map_base` at
    /// map-space coordinates (`px`, `py`). Returns (color id, palette, priority).
    fn map_pixel(&self, map_base: usize, px: usize, py: usize) -> (u8, usize, bool) {
        let map_idx = map_base + (py / 8) * 32 + px / 8;
        let tile_index = self.vram[0][map_idx];
        let mut tile_y = py % 8;
        let mut bit = 7 - (px % 8);
        let (mut palette, mut bank, mut priority) = (0, 0, false);
        if self.cgb {
            let attr = self.vram[1][map_idx];
            palette = (attr & 0x07) as usize;
            bank = ((attr >> 3) & 0x01) as usize;
            if attr & 0x20 != 0 {
                bit = px % 8;
            }
            if attr & 0x40 != 0 {
                tile_y = 7 - tile_y;
            }
            priority = attr & 0x80 != 0;
        }
        let addr = self.tile_row_addr(tile_index, tile_y);
        let lo = self.vram[bank][addr];
        let hi = self.vram[bank][addr + 1];
        let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
        (color_id, palette, priority)
    }

    fn bg_rgb(&self, color_id: u8, palette: usize) -> [u8; 3] {
        if self.cgb {
            self.bg_palette_rgb(palette, color_id)
        } else {
            Self::dmg_rgb(self.bgp, color_id)
        }
    }

    fn render_scanline(&mut self) {
        if self.ly as usize >= SCREEN_HEIGHT {
            return;
        }

        // DMG: LCDC bit 0 blanks both background and window.
        let bg_enabled = self.cgb || self.lcdc & LCDC_BG_ENABLE != 0;

        if bg_enabled {
            let map_base = if self.lcdc & LCDC_BG_MAP != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let py = self.ly.wrapping_add(self.scy) as usize;
            for x in 0..SCREEN_WIDTH {
                let px = (x as u8).wrapping_add(self.scx) as usize;
                let (color_id, palette, priority) = self.map_pixel(map_base, px, py);
                let rgb = self.bg_rgb(color_id, palette);
                self.put_pixel(x, rgb);
                self.line_color[x] = color_id;
                self.line_priority[x] = priority;
            }

            if self.lcdc & LCDC_WINDOW_ENABLE != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX
            {
                let map_base = if self.lcdc & LCDC_WINDOW_MAP != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let start = self.wx as i16 - 7;
                let py = self.win_line_counter as usize;
                for x in start.max(0) as usize..SCREEN_WIDTH {
                    let px = (x as i16 - start) as usize;
                    let (color_id, palette, priority) = self.map_pixel(map_base, px, py);
                    let rgb = self.bg_rgb(color_id, palette);
                    self.put_pixel(x, rgb);
                    self.line_color[x] = color_id;
                    self.line_priority[x] = priority;
                }
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        } else {
            let rgb = Self::dmg_rgb(0x00, 0);
            for x in 0..SCREEN_WIDTH {
                self.put_pixel(x, rgb);
            }
            self.line_color.fill(0);
            self.line_priority.fill(false);
        }

        if self.lcdc & LCDC_OBJ_ENABLE != 0 {
            self.render_sprites();
        }
    }

    /// Draw every sprite on the current line, last OAM entry first so lower
    /// indices end up on top.
    fn render_sprites(&mut self) {
        let height: i16 = if self.lcdc & LCDC_OBJ_TALL != 0 { 16 } else { 8 };
        // CGB with LCDC bit 0 clear: sprites always win over the background.
        let bg_can_win = !self.cgb || self.lcdc & LCDC_BG_ENABLE != 0;
        let ly = self.ly as i16;

        for index in (0..TOTAL_SPRITES).rev() {
            let base = index * 4;
            let y = self.oam[base] as i16 - 16;
            let x = self.oam[base + 1] as i16 - 8;
            let mut tile = self.oam[base + 2];
            let flags = self.oam[base + 3];

            if ly < y || ly >= y + height {
                continue;
            }
            if height == 16 {
                tile &= 0xFE;
            }
            let mut row = (ly - y) as usize;
            if flags & 0x40 != 0 {
                row = height as usize - 1 - row;
            }
            let bank = if self.cgb {
                ((flags >> 3) & 0x01) as usize
            } else {
                0
            };
            let addr = tile as usize * 16 + row * 2;
            let lo = self.vram[bank][addr];
            let hi = self.vram[bank][addr + 1];

            for px in 0..8i16 {
                let sx = x + px;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) {
                    continue;
                }
                let bit = if flags & 0x20 != 0 { px } else { 7 - px };
                let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                if color_id == 0 {
                    continue;
                }
                let sx = sx as usize;
                let bg_opaque = self.line_color[sx] != 0;
                if bg_can_win && bg_opaque && (flags & 0x80 != 0 || self.line_priority[sx]) {
                    continue;
                }
                let rgb = if self.cgb {
                    self.obj_palette_rgb((flags & 0x07) as usize, color_id)
                } else if flags & 0x10 != 0 {
                    Self::dmg_rgb(self.obp1, color_id)
                } else {
                    Self::dmg_rgb(self.obp0, color_id)
                };
                self.put_pixel(sx, rgb);
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
