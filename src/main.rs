mod config;
mod headless;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use dotboy_core::{FileStore, GameBoy, Model, Session, loader};
use env_logger::Env;
use log::{error, info, warn};

use crate::{
    config::Config,
    headless::{HeadlessHost, Limits, SerialOutcome},
};

#[derive(Parser)]
#[command(version, about = "Game Boy / Game Boy Color emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Force DMG mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Force CGB mode
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Directory for battery saves (defaults to the ROM's directory)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Config file to read instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mirror serial output to stdout and exit once a test ROM reports
    /// Passed or Failed
    #[arg(long)]
    serial: bool,

    /// Number of frames to run before exiting
    #[arg(long)]
    frames: Option<u64>,

    /// Number of seconds to run before exiting
    #[arg(long)]
    seconds: Option<u64>,

    /// Run as fast as possible
    #[arg(long)]
    turbo: bool,

    /// Write the last frame to this PNG file on exit
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Show raw CGB colors
    #[arg(long)]
    no_color_correction: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let cart = loader::load_rom(&args.rom)
        .with_context(|| format!("failed to load ROM {}", args.rom.display()))?;

    let forced = if args.dmg {
        Some(Model::Dmg)
    } else if args.cgb {
        Some(Model::Cgb)
    } else {
        cfg.emulation_mode.forced_model()
    };
    let model = forced.unwrap_or_else(|| Model::for_cgb_flag(cart.header.cgb_flag));

    let boot_rom = match boot_rom_path(&args, &cfg, model) {
        Some(path) => Some(
            loader::load_boot_rom(path)
                .with_context(|| format!("failed to load boot ROM {}", path.display()))?,
        ),
        None => None,
    };

    let gb = GameBoy::with_cartridge(cart, Some(model), boot_rom);
    info!(
        "Emulator initialized in {} mode",
        if model.is_cgb() { "CGB" } else { "DMG" }
    );

    let save_dir = args.save_dir.as_deref().or(cfg.save_dir.as_deref());
    let store = FileStore::for_rom(&args.rom, save_dir);

    let limits = Limits {
        frames: args.frames,
        time: args.seconds.map(Duration::from_secs),
    };
    let host = HeadlessHost::new(limits, args.serial, args.serial);

    let mut session = Session::new(gb, host).with_battery(Box::new(store));
    session.set_pacing(cfg.pacing && !args.turbo);
    session.set_color_correction(cfg.color_correction && !args.no_color_correction);

    let result = session.run();
    let (gb, host) = session.shutdown();

    if let Some(path) = &args.screenshot {
        match headless::save_png(path, host.last_frame()) {
            Ok(()) => info!("Saved screenshot to {}", path.display()),
            Err(e) => warn!("Failed to save screenshot {}: {e}", path.display()),
        }
    }

    info!(
        "Stopped after {} frames ({} cycles)",
        host.frames(),
        gb.cpu.cycles
    );

    if let Err(e) = result {
        return Ok(ExitCode::from(e.exit_code() as u8));
    }

    Ok(match host.outcome() {
        Some(SerialOutcome::Failed) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn boot_rom_path<'a>(args: &'a Args, cfg: &'a Config, model: Model) -> Option<&'a Path> {
    args.bootrom.as_deref().or_else(|| cfg.bootrom_for(model))
}
