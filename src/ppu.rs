use log::debug;

use crate::mmu::{INT_LCD, INT_VBLANK};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const OAM_SCAN_CYCLES: u32 = 80;
pub const PIXEL_TRANSFER_CYCLES: u32 = 172;
pub const HBLANK_CYCLES: u32 = 204;
pub const SCANLINE_CYCLES: u32 = 456;
pub const FRAME_CYCLES: u32 = SCANLINE_CYCLES * 154;

const TILE_COUNT: usize = 384;
const DMG_SHADES: [u8; 4] = [0xff, 0xcc, 0x77, 0x00];

/// Rendering phase, as encoded in STAT bits 0-1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    HBlank,       // Mode0
    VBlank,       // Mode1
    SearchingOAM, // Mode2
    Drawing,      // Mode3
}

impl Mode {
    fn bits(self) -> u8 {
        match self {
            Mode::HBlank => 0,
            Mode::VBlank => 1,
            Mode::SearchingOAM => 2,
            Mode::Drawing => 3,
        }
    }

    fn duration(self) -> u32 {
        match self {
            Mode::SearchingOAM => OAM_SCAN_CYCLES,
            Mode::Drawing => PIXEL_TRANSFER_CYCLES,
            Mode::HBlank => HBLANK_CYCLES,
            Mode::VBlank => SCANLINE_CYCLES,
        }
    }
}

enum MapArea {
    Base1800,
    Base1C00,
}

impl MapArea {
    fn base(&self) -> usize {
        match self {
            MapArea::Base1800 => 0x1800,
            MapArea::Base1C00 => 0x1c00,
        }
    }
}

/// Decoded 2-bit color indices for every tile of one VRAM bank.
type TileSet = [[[u8; 8]; 8]; TILE_COUNT];

/// What the background left at one column, consulted by sprite priority.
#[derive(Clone, Copy, Default)]
struct BgPixel {
    color_index: u8,
    priority: bool,
}

pub struct Ppu {
    color: bool,
    vram: Box<[[u8; 0x2000]; 2]>,
    vram_bank: usize,
    tiles: Box<[TileSet; 2]>,
    oam: [u8; 0xa0],
    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,
    bg_palette: [u8; 64],
    bcps: u8,
    obj_palette: [u8; 64],
    ocps: u8,
    counter: u32,
    line: [BgPixel; SCREEN_WIDTH],
    frame: Vec<u8>,
}

impl Ppu {
    /// PPU with the LCD switched off, as the boot ROM finds it.
    pub(crate) fn new(color: bool) -> Self {
        Ppu {
            color,
            vram: Box::new([[0; 0x2000]; 2]),
            vram_bank: 0,
            tiles: Box::new([[[[0; 8]; 8]; TILE_COUNT]; 2]),
            oam: [0; 0xa0],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0xff,
            obp1: 0xff,
            wy: 0,
            wx: 0,
            bg_palette: [0xff; 64],
            bcps: 0,
            obj_palette: [0xff; 64],
            ocps: 0,
            counter: 0,
            line: [BgPixel::default(); SCREEN_WIDTH],
            frame: vec![0xff; SCREEN_WIDTH * SCREEN_HEIGHT * 4],
        }
    }

    /// PPU as the boot ROM leaves it: LCD on, scanning line 0.
    pub(crate) fn post_boot(color: bool) -> Self {
        let mut ppu = Ppu::new(color);
        ppu.lcdc = 0x91;
        ppu.bgp = 0xfc;
        ppu.set_mode_flag(Mode::SearchingOAM);
        ppu.compare_lyc();
        ppu
    }

    /// RGBA8888 pixels, row-major, 160x144.
    pub fn get_frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> Mode {
        match self.stat & 0x03 {
            0 => Mode::HBlank,
            1 => Mode::VBlank,
            2 => Mode::SearchingOAM,
            _ => Mode::Drawing,
        }
    }

    fn set_mode_flag(&mut self, mode: Mode) {
        self.stat = (self.stat & 0xfc) | mode.bits();
    }

    fn is_lcd_and_ppu_enable(&self) -> bool {
        ((self.lcdc >> 7) & 1) == 1
    }

    fn window_map_area(&self) -> MapArea {
        match ((self.lcdc >> 6) & 1) == 1 {
            false => MapArea::Base1800,
            true => MapArea::Base1C00,
        }
    }

    fn bg_map_area(&self) -> MapArea {
        match ((self.lcdc >> 3) & 1) == 1 {
            false => MapArea::Base1800,
            true => MapArea::Base1C00,
        }
    }

    fn is_window_enable(&self) -> bool {
        ((self.lcdc >> 5) & 1) == 1 && self.wy <= self.ly
    }

    fn uses_unsigned_tile_area(&self) -> bool {
        ((self.lcdc >> 4) & 1) == 1
    }

    fn sprite_height(&self) -> i16 {
        if self.lcdc & 0x4 > 0 {
            16
        } else {
            8
        }
    }

    fn is_obj_enable(&self) -> bool {
        ((self.lcdc >> 1) & 1) == 1
    }

    fn is_bg_window_enable(&self) -> bool {
        (self.lcdc & 1) == 1
    }

    /// Re-decodes the tile row touched by a VRAM write.
    fn update_tile_row(&mut self, bank: usize, offset: usize) {
        let tile = offset / 16;
        let row = (offset % 16) / 2;
        let base = tile * 16 + row * 2;
        let low = self.vram[bank][base];
        let high = self.vram[bank][base + 1];

        for x in 0..8 {
            let shift = 7 - x;
            self.tiles[bank][tile][row][x] = ((high >> shift) & 1) << 1 | ((low >> shift) & 1);
        }
    }

    fn dmg_shade(palette: u8, color_index: u8) -> [u8; 3] {
        let shade = DMG_SHADES[((palette >> (color_index << 1)) & 0x3) as usize];
        [shade, shade, shade]
    }

    fn cgb_color(palette_ram: &[u8; 64], palette: u8, color_index: u8) -> [u8; 3] {
        let offset = (palette as usize & 7) * 8 + color_index as usize * 2;
        let rgb15 = (palette_ram[offset + 1] as u16) << 8 | palette_ram[offset] as u16;
        let scale = |c: u16| -> u8 {
            let c = (c & 0x1f) as u8;
            c << 3 | c >> 2
        };
        [scale(rgb15), scale(rgb15 >> 5), scale(rgb15 >> 10)]
    }

    fn paint(&mut self, x: usize, rgb: [u8; 3]) {
        let index = ((self.ly as usize) * SCREEN_WIDTH + x) * 4;
        self.frame[index..index + 3].copy_from_slice(&rgb);
        self.frame[index + 3] = 0xff;
    }

    fn render_bg(&mut self) {
        if !self.color && !self.is_bg_window_enable() {
            for x in 0..SCREEN_WIDTH {
                self.line[x] = BgPixel::default();
                self.paint(x, [DMG_SHADES[0]; 3]);
            }
            return;
        }

        let window_line = self.is_window_enable();
        let wx = self.wx as i16 - 7;
        let unsigned_tiles = self.uses_unsigned_tile_area();

        for x in 0..SCREEN_WIDTH {
            let window_flag = window_line && (x as i16) >= wx;

            let (map_base, pixel_x, pixel_y) = if window_flag {
                (
                    self.window_map_area().base(),
                    (x as i16 - wx) as u8,
                    self.ly - self.wy,
                )
            } else {
                (
                    self.bg_map_area().base(),
                    self.scx.wrapping_add(x as u8),
                    self.scy.wrapping_add(self.ly),
                )
            };

            let map_addr = map_base + (pixel_y as usize / 8) * 32 + pixel_x as usize / 8;
            let mut tile_no = self.vram[0][map_addr] as usize;
            if !unsigned_tiles && tile_no < 128 {
                tile_no += 256;
            }

            let attr = if self.color { self.vram[1][map_addr] } else { 0 };
            let bank = ((attr >> 3) & 1) as usize;
            let mut offset_x = (pixel_x & 7) as usize;
            let mut offset_y = (pixel_y & 7) as usize;
            if attr & 0x20 != 0 {
                offset_x = 7 - offset_x;
            }
            if attr & 0x40 != 0 {
                offset_y = 7 - offset_y;
            }

            let color_index = self.tiles[bank][tile_no][offset_y][offset_x];
            let rgb = if self.color {
                Self::cgb_color(&self.bg_palette, attr & 0x7, color_index)
            } else {
                Self::dmg_shade(self.bgp, color_index)
            };

            self.line[x] = BgPixel {
                color_index,
                priority: attr & 0x80 != 0,
            };
            self.paint(x, rgb);
        }
    }

    fn render_sprites(&mut self) {
        let height = self.sprite_height();
        let ly = self.ly as i16;

        let mut visible = [0usize; 10];
        let mut count = 0;
        for i in 0..40 {
            let sprite_y = self.oam[i * 4] as i16 - 16;
            if sprite_y <= ly && ly < sprite_y + height {
                visible[count] = i;
                count += 1;
                if count == visible.len() {
                    break;
                }
            }
        }

        // Paint back to front so the lowest OAM index ends up on top.
        for &i in visible[..count].iter().rev() {
            let sprite_addr = i * 4;
            let sprite_y = self.oam[sprite_addr] as i16 - 16;
            let sprite_x = self.oam[sprite_addr + 1] as i16 - 8;
            let tile_index = self.oam[sprite_addr + 2];
            let sprite_flag = self.oam[sprite_addr + 3];

            let bg_window_priority_flag = sprite_flag & 0x80 > 0;
            let flip_y_flag = sprite_flag & 0x40 > 0;
            let flip_x_flag = sprite_flag & 0x20 > 0;

            let mut row = ly - sprite_y;
            if flip_y_flag {
                row = height - 1 - row;
            }
            let tile_no = if height == 16 {
                (tile_index & 0xfe) as usize + (row >= 8) as usize
            } else {
                tile_index as usize
            };
            let bank = if self.color && sprite_flag & 0x08 != 0 {
                1
            } else {
                0
            };

            for offset_x in 0..8 {
                let pixel_x = sprite_x + offset_x;
                if pixel_x < 0 || pixel_x >= SCREEN_WIDTH as i16 {
                    continue;
                }
                let index_x = if flip_x_flag { 7 - offset_x } else { offset_x };
                let tile_color = self.tiles[bank][tile_no][(row & 7) as usize][index_x as usize];

                // Color 0 is transparent for sprites.
                if tile_color == 0 {
                    continue;
                }

                let bg = self.line[pixel_x as usize];
                let hidden = if self.color {
                    self.is_bg_window_enable()
                        && bg.color_index != 0
                        && (bg_window_priority_flag || bg.priority)
                } else {
                    bg_window_priority_flag && bg.color_index != 0
                };
                if hidden {
                    continue;
                }

                let rgb = if self.color {
                    Self::cgb_color(&self.obj_palette, sprite_flag & 0x7, tile_color)
                } else {
                    let palette = if sprite_flag & 0x10 > 0 {
                        self.obp1
                    } else {
                        self.obp0
                    };
                    Self::dmg_shade(palette, tile_color)
                };
                self.paint(pixel_x as usize, rgb);
            }
        }
    }

    fn render_scan(&mut self) {
        debug!(
            "Render line ly: {}, scx: {}, scy: {}, lcdc: 0x{:02x}",
            self.ly, self.scx, self.scy, self.lcdc
        );
        self.render_bg();
        if self.is_obj_enable() {
            self.render_sprites();
        }
    }

    pub(crate) fn read(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0x9fff => self.vram[self.vram_bank][(addr & 0x1fff) as usize],
            0xfe00..=0xfe9f => self.oam[(addr & 0x00ff) as usize],

            // IO registers
            0xff40 => self.lcdc,
            0xff41 => self.stat | 0x80,
            0xff42 => self.scy,
            0xff43 => self.scx,
            0xff44 => self.ly,
            0xff45 => self.lyc,
            0xff47 => self.bgp,
            0xff48 => self.obp0,
            0xff49 => self.obp1,
            0xff4a => self.wy,
            0xff4b => self.wx,
            0xff4f if self.color => 0xfe | self.vram_bank as u8,
            0xff68 if self.color => self.bcps | 0x40,
            0xff69 if self.color => self.bg_palette[(self.bcps & 0x3f) as usize],
            0xff6a if self.color => self.ocps | 0x40,
            0xff6b if self.color => self.obj_palette[(self.ocps & 0x3f) as usize],

            _ => 0xff,
        }
    }

    /// Writes a PPU-owned address and returns any interrupt bits raised.
    pub(crate) fn write(&mut self, addr: u16, value: u8) -> u8 {
        match addr {
            0x8000..=0x9fff => {
                let offset = (addr & 0x1fff) as usize;
                self.vram[self.vram_bank][offset] = value;
                if offset < 0x1800 {
                    self.update_tile_row(self.vram_bank, offset);
                }
            }

            0xfe00..=0xfe9f => self.oam[(addr & 0x00ff) as usize] = value,

            0xff40 => {
                let was_enabled = self.is_lcd_and_ppu_enable();
                self.lcdc = value;

                if was_enabled != self.is_lcd_and_ppu_enable() {
                    self.counter = 0;
                    if self.is_lcd_and_ppu_enable() {
                        debug!("LCD on");
                        self.set_mode_flag(Mode::SearchingOAM);
                        return self.set_ly(0) | self.update_mode_interrupt();
                    }
                    debug!("LCD off");
                    self.ly = 0;
                    self.set_mode_flag(Mode::HBlank);
                }
            }
            // Bits 0-2 are read only.
            0xff41 => self.stat = (value & 0x78) | (self.stat & 0x07),
            0xff42 => self.scy = value,
            0xff43 => self.scx = value,
            0xff44 => (),
            0xff45 => {
                if self.lyc != value {
                    self.lyc = value;
                    if self.is_lcd_and_ppu_enable() {
                        return self.compare_lyc();
                    }
                }
            }
            0xff47 => self.bgp = value,
            0xff48 => self.obp0 = value,
            0xff49 => self.obp1 = value,
            0xff4a => self.wy = value,
            0xff4b => self.wx = value,
            0xff4f if self.color => self.vram_bank = (value & 1) as usize,
            0xff68 if self.color => self.bcps = value & 0xbf,
            0xff69 if self.color => {
                self.bg_palette[(self.bcps & 0x3f) as usize] = value;
                self.bcps = Self::advance_palette_index(self.bcps);
            }
            0xff6a if self.color => self.ocps = value & 0xbf,
            0xff6b if self.color => {
                self.obj_palette[(self.ocps & 0x3f) as usize] = value;
                self.ocps = Self::advance_palette_index(self.ocps);
            }

            _ => (),
        }
        0
    }

    fn advance_palette_index(index: u8) -> u8 {
        if index & 0x80 != 0 {
            0x80 | (index.wrapping_add(1) & 0x3f)
        } else {
            index
        }
    }

    /// LYC=LY coincidence check.
    fn compare_lyc(&mut self) -> u8 {
        if self.ly == self.lyc {
            self.stat |= 0x4;
            if self.stat & 0x40 > 0 {
                return INT_LCD;
            }
        } else {
            self.stat &= !0x4;
        }
        0
    }

    fn set_ly(&mut self, ly: u8) -> u8 {
        self.ly = ly;
        self.compare_lyc()
    }

    /// Checks LCD mode interrupt.
    fn update_mode_interrupt(&mut self) -> u8 {
        let enabled = match self.mode() {
            Mode::HBlank => self.stat & 0x8 > 0,
            Mode::VBlank => self.stat & 0x10 > 0,
            Mode::SearchingOAM => self.stat & 0x20 > 0,
            Mode::Drawing => false,
        };
        if enabled {
            INT_LCD
        } else {
            0
        }
    }

    fn enter_mode(&mut self, mode: Mode) -> u8 {
        self.set_mode_flag(mode);
        self.update_mode_interrupt()
    }

    /// Advances the scanline state machine by `clock` cycles and returns the
    /// interrupt bits raised along the way.
    pub(crate) fn update(&mut self, clock: u32) -> u8 {
        if !self.is_lcd_and_ppu_enable() {
            self.ly = 0;
            self.counter = 0;
            self.set_mode_flag(Mode::HBlank);
            return 0;
        }

        let mut irq = 0;
        self.counter += clock;

        loop {
            let mode = self.mode();
            if self.counter < mode.duration() {
                break;
            }
            self.counter -= mode.duration();

            match mode {
                Mode::SearchingOAM => self.set_mode_flag(Mode::Drawing),
                Mode::Drawing => {
                    self.render_scan();
                    irq |= self.enter_mode(Mode::HBlank);
                }
                Mode::HBlank => {
                    irq |= self.set_ly(self.ly + 1);
                    if self.ly >= SCREEN_HEIGHT as u8 {
                        irq |= INT_VBLANK;
                        irq |= self.enter_mode(Mode::VBlank);
                    } else {
                        irq |= self.enter_mode(Mode::SearchingOAM);
                    }
                }
                Mode::VBlank => {
                    if self.ly >= 153 {
                        irq |= self.set_ly(0);
                        irq |= self.enter_mode(Mode::SearchingOAM);
                    } else {
                        irq |= self.set_ly(self.ly + 1);
                    }
                }
            }
        }

        irq
    }
}
