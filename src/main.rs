use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;

use rust_gb_core::{Config, GameBoy, Key, SCREEN_HEIGHT, SCREEN_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "rust_gb")]
#[command(about = "A Game Boy emulator", long_about = None)]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Enable Game Boy Color mode
    #[arg(long)]
    color: bool,

    /// Path to boot ROM file
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Window scale factor
    #[arg(long, default_value_t = 3)]
    scale: u32,
}

fn translate_keycode(key: Keycode) -> Option<Key> {
    match key {
        Keycode::Down => Some(Key::Down),
        Keycode::Up => Some(Key::Up),
        Keycode::Left => Some(Key::Left),
        Keycode::Right => Some(Key::Right),
        Keycode::Return => Some(Key::Start),
        Keycode::RShift => Some(Key::Select),
        Keycode::X => Some(Key::A),
        Keycode::Z => Some(Key::B),
        _ => None,
    }
}

/// Handles key down event.
fn handle_keydown(gb: &mut GameBoy, key: Keycode) {
    if let Some(k) = translate_keycode(key) {
        gb.key_down(k);
    }
}

/// Handles key up event.
fn handle_keyup(gb: &mut GameBoy, key: Keycode) {
    if let Some(k) = translate_keycode(key) {
        gb.key_up(k);
    }
}

fn save_path(rom: &Path) -> PathBuf {
    rom.with_extension("sav")
}

fn load_save_data(gb: &mut GameBoy, path: &Path) -> Result<()> {
    if !gb.cartridge().has_battery() || !path.exists() {
        return Ok(());
    }
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    gb.cartridge_mut().load_ram(&data);
    info!("Loaded save data from {}", path.display());
    Ok(())
}

fn write_save_data(gb: &GameBoy, path: &Path) -> Result<()> {
    if !gb.cartridge().has_battery() {
        return Ok(());
    }
    fs::write(path, gb.cartridge().ram())
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote save data to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom.display()))?;
    let mut cfg = Config::new().color(args.color);
    if let Some(path) = &args.boot_rom {
        let boot = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        cfg = cfg.boot_rom(boot);
    }

    let mut gb = GameBoy::new(cfg, rom);
    let save = save_path(&args.rom);
    if let Err(e) = load_save_data(&mut gb, &save) {
        warn!("{:#}", e);
    }

    let sdl_context = sdl2::init().map_err(|e| anyhow!(e))?;
    let video_subsystem = sdl_context.video().map_err(|e| anyhow!(e))?;

    let window = video_subsystem
        .window(
            "rust-gameboy",
            SCREEN_WIDTH as u32 * args.scale,
            SCREEN_HEIGHT as u32 * args.scale,
        )
        .position_centered()
        .build()?;

    let mut canvas = window.into_canvas().build()?;
    let texture_creator = canvas.texture_creator();

    // ABGR8888 is R, G, B, A in memory on little-endian hosts.
    let mut texture = texture_creator.create_texture_streaming(
        PixelFormatEnum::ABGR8888,
        SCREEN_WIDTH as u32,
        SCREEN_HEIGHT as u32,
    )?;
    let mut event_pump = sdl_context.event_pump().map_err(|e| anyhow!(e))?;

    let mut frame_count: u64 = 0;

    'running: loop {
        let now = time::Instant::now();

        // Emulate one frame
        gb.run_frame();
        frame_count += 1;
        debug!("==frame_count: {}", frame_count);

        for event in gb.take_events() {
            debug!("core event: {}", event);
        }

        texture
            .with_lock(None, |buf: &mut [u8], pitch: usize| {
                let fb = gb.framebuffer();
                let row = SCREEN_WIDTH * 4;
                for y in 0..SCREEN_HEIGHT {
                    buf[y * pitch..y * pitch + row].copy_from_slice(&fb[y * row..(y + 1) * row]);
                }
            })
            .map_err(|e| anyhow!(e))?;

        canvas.clear();
        canvas.copy(&texture, None, None).map_err(|e| anyhow!(e))?;
        canvas.present();

        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => handle_keydown(&mut gb, keycode),
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => handle_keyup(&mut gb, keycode),
                _ => (),
            }
        }

        let wait = time::Duration::from_micros(1000000 / 60);
        let elapsed = now.elapsed();

        if wait > elapsed {
            thread::sleep(wait - elapsed);
        }
    }

    write_save_data(&gb, &save)
}
