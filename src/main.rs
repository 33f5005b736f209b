mod audio;
mod buttons;
mod config;
mod display;
mod gpio;
#[cfg(feature = "rpi")]
mod hd44780;
mod midi;
mod ports;
mod shutdown;
mod telemetry;

use anyhow::{Context, Result};
use env_logger::Env;
use std::{sync::Arc, time::Duration};

use crate::buttons::ButtonPanel;
use crate::config::Config;
use crate::display::{CharDisplay, DisplayController};
use crate::ports::PortManager;
use crate::shutdown::Shutdown;
use crate::telemetry::{NOTE_COUNT, NoteTable};

const JACK_START_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env().context("invalid configuration")?;
    log::info!("🥁 Front panel starting: {cfg:?}");

    // Signals during startup are queued and honored once we are up.
    let shutdown = Shutdown::new();
    shutdown::watch_signals(shutdown.handle())?;

    if cfg.start_jack {
        ports::ensure_server(&cfg.jackd_command, JACK_START_TIMEOUT)?;
    }

    let display = Arc::new(DisplayController::new(open_display()?));
    display
        .show_startup_banner()
        .context("display rejected the startup banner")?;
    let panel = Arc::new(ButtonPanel::new(display, &cfg.button_pins, cfg.debounce)?);

    // pipeline: JACK MIDI in → decoder → telemetry
    let table = Arc::new(NoteTable::new());
    let ports = PortManager::open(&cfg, table.clone())?;
    ports.send_handshake(HANDSHAKE_TIMEOUT)?;

    // Buttons only after the handshake went out.
    let buttons = gpio::attach(panel)?;

    if cfg.console_quit {
        shutdown::watch_console(shutdown.handle());
        log::info!("press Return or Ctrl-C to quit");
    } else {
        log::info!("send SIGTERM or SIGINT to quit");
    }
    let reason = shutdown.wait();
    log::info!("Shutting down ({reason:?})");

    buttons.detach();
    ports.close()?;
    log_telemetry(&table);
    Ok(())
}

#[cfg(feature = "rpi")]
fn open_display() -> Result<Box<dyn CharDisplay>> {
    Ok(Box::new(hd44780::Hd44780::open()?))
}

#[cfg(not(feature = "rpi"))]
fn open_display() -> Result<Box<dyn CharDisplay>> {
    log::warn!("built without the `rpi` feature; display output goes to the log");
    Ok(Box::new(display::HeadlessDisplay::default()))
}

fn log_telemetry(table: &NoteTable) {
    for note in 0..NOTE_COUNT as u8 {
        let value = table.read(note);
        if value != 0 {
            log::debug!("note {note:3}: {value}");
        }
    }
}
