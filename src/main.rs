//! Main entry point for AfkSentry.
//!
//! This file sets up the asynchronous runtime with `tokio` and logging. It
//! loads or creates the profile file and lets the user pick a profile, then
//! checks that the automation backend is available. After that it waits for
//! hotkeys that switch AFK mode on and off.

mod afk_loop;
mod automation;
mod color_utils;
mod config;
mod dispatcher;
mod error;
mod hotkey;
mod overlay;
mod sampler;
mod toggle;
mod ui;

use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use device_query::Keycode;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::afk_loop::{AfkController, LoopSettings};
use crate::automation::{AutoHotkey, DOWNLOAD_URL};
use crate::color_utils::{colors_match, describe, COLOR_TOLERANCE};
use crate::config::{Profile, ProfileStore};
use crate::dispatcher::InputDispatcher;
use crate::hotkey::{parse_key, spawn_listener, HotkeyBindings, HotkeyEvent};
use crate::overlay::{OverlayHandle, TerminalOverlay};
use crate::sampler::{PixelSampler, ScreenSampler};
use crate::toggle::ToggleController;
use crate::ui::show_menu;

const LOG_FILE: &str = "afk-sentry.log";

#[derive(Parser, Debug)]
#[command(version, about = "Keeps a game character active by watching screen pixels")]
struct Cli {
    /// Config file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Profile to activate, skipping the selection menu.
    #[arg(long)]
    profile: Option<String>,

    /// Print the sampled and expected colors of the active profile, then exit.
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(ProfileStore::default_path);
    init_tracing(config_path.parent().unwrap_or(Path::new(".")));

    match run(cli, config_path).await {
        Ok(code) => code,
        Err(err) => {
            error!("fatal: {err}");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config_path: PathBuf) -> Result<ExitCode, Box<dyn Error>> {
    println!("AfkSentry v{}", env!("CARGO_PKG_VERSION"));

    let mut store = ProfileStore::load(config_path)?;
    println!("Using configuration {}", store.path().display());

    if let Some(name) = cli.profile.as_deref() {
        if !store.switch_active(name)? {
            eprintln!(
                "Profile '{name}' does not exist. Available: {}",
                store.profile_names().join(", ")
            );
            return Ok(ExitCode::from(2));
        }
    } else if !cli.probe {
        match show_menu(&store)? {
            Some(name) => {
                store.switch_active(&name)?;
            }
            None => {
                println!("Configuration cancelled. Exiting.");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    let profile = store.resolve_active()?;
    println!(
        "Loaded profile: {} (check pixel {}, button pixel {})",
        profile.name, profile.check_pixel, profile.button_pixel
    );

    if cli.probe {
        probe(&profile);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(backend) = prepare_backend(&mut store) else {
        eprintln!("This program requires AutoHotkey to function.");
        eprintln!("Please install AutoHotkey from {DOWNLOAD_URL} and restart.");
        if let Err(err) = open::that(DOWNLOAD_URL) {
            warn!("could not open the download page: {err}");
        }
        error!("terminated: AutoHotkey is required but not found");
        return Ok(ExitCode::from(1));
    };

    let toggle_key = parse_key(&profile.toggle_key).unwrap_or_else(|err| {
        warn!("{err}, falling back to F4");
        Keycode::F4
    });
    let toggle_label = format!("{toggle_key:?}").to_uppercase();
    println!("Press {toggle_label} to toggle AFK mode, Esc+F12 to exit.");

    let afk = AfkController::new(
        LoopSettings::from(&profile),
        ScreenSampler,
        InputDispatcher::new(backend),
    );
    let banner = format!("AFK MODE ACTIVE - PRESS {toggle_label} TO STOP");
    let overlay = OverlayHandle::new(move || TerminalOverlay::new(banner.clone()));
    let mut toggle = ToggleController::new(afk, overlay);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    spawn_listener(HotkeyBindings::new(toggle_key), events_tx);

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(HotkeyEvent::Toggle) => {
                    toggle.toggle().await;
                }
                Some(HotkeyEvent::Exit) => {
                    info!("exit hotkey pressed");
                    toggle.emergency_stop();
                    println!("Exiting.");
                    std::process::exit(0);
                }
                None => {
                    warn!("hotkey listener stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    toggle.shutdown().await;
    println!("Script terminated by user");
    Ok(ExitCode::SUCCESS)
}

/// Find and start AutoHotkey, asking the user for a path as a last resort.
/// A working path is saved to the config.
///
/// # Arguments
///
/// * `store` - The loaded profile store, updated with the working path.
///
/// # Returns
///
/// The initialized backend, or `None` if no usable executable was found.
fn prepare_backend(store: &mut ProfileStore) -> Option<AutoHotkey> {
    let settings = store.automation().clone();
    let dirs = automation::search_dirs();

    let backend = match automation::connect(&settings.path, &settings.window_title, &dirs) {
        Ok(backend) => Some(backend),
        Err(err) => {
            warn!("failed to initialize automation backend: {err}");
            prompt_for_backend(&settings.window_title)
        }
    }?;

    if let Err(err) = store.set_automation_path(backend.executable()) {
        warn!("could not save automation path: {err}");
    }
    Some(backend)
}

fn prompt_for_backend(window_title: &str) -> Option<AutoHotkey> {
    if !io::stdin().is_terminal() {
        return None;
    }
    println!("AutoHotkey is required but couldn't be found automatically.");
    print!(r"Path to AutoHotkey.exe (usually C:\Program Files\AutoHotkey\AutoHotkey.exe), empty to cancel: ");
    io::stdout().flush().ok()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    let line = line.trim().trim_matches('"');
    if line.is_empty() {
        return None;
    }

    match AutoHotkey::initialize(Path::new(line), window_title) {
        Ok(backend) => Some(backend),
        Err(err) => {
            warn!(path = line, "failed to initialize selected automation backend: {err}");
            eprintln!("Could not start {line}: {err}");
            None
        }
    }
}

/// One-shot calibration output for the active profile.
///
/// # Arguments
///
/// * `profile` - The resolved profile whose two pixels are read.
fn probe(profile: &Profile) {
    let mut sampler = ScreenSampler;
    let probes = [
        ("Check pixel", profile.check_pixel, profile.expected_color),
        ("Button pixel", profile.button_pixel, profile.expected_button_color),
    ];
    let samples = sampler.sample_many(&[profile.check_pixel, profile.button_pixel]);
    for ((label, at, expected), sample) in probes.into_iter().zip(samples) {
        match sample {
            Ok(color) => {
                let verdict = if colors_match(color, expected, COLOR_TOLERANCE) {
                    "Match"
                } else {
                    "No Match"
                };
                println!(
                    "{label} {at}: {}, expected {} - {verdict}",
                    describe(color),
                    describe(expected)
                );
            }
            Err(err) => println!("{label} {at}: unavailable ({err})"),
        }
    }
}

/// Log to a file next to the config; the terminal belongs to the menu and
/// the overlay.
fn init_tracing(log_dir: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = fs::create_dir_all(log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(LOG_FILE))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match file {
        Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        Err(err) => {
            builder.with_writer(io::stderr).init();
            warn!("could not open log file in {}: {err}", log_dir.display());
        }
    }
}
