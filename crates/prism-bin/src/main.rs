//! Prism: a modal, multi-pane terminal syntax editor.
//!
//! The binary wires the session to the terminal: it initializes logging,
//! loads configuration, restores the retained session when one exists,
//! dispatches the background I/O thread with the device wakeup, and runs
//! the cycle of drain-completions, wait-for-event, dispatch, and render.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use unicode_normalization::UnicodeNormalization;

use core_events::DeviceEvent;
use core_io::IoManager;
use core_model::Area;
use core_session::{Session, retention};
use core_terminal::{CrosstermBackend, Device, TerminalBackend};

#[derive(Parser, Debug)]
#[command(name = "prism", about = "Modal multi-pane terminal syntax editor")]
struct Cli {
    /// Files to open, one pane each.
    files: Vec<PathBuf>,

    /// Configuration file path override.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log file path; logging is disabled without it.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Session snapshot to restore and retain.
    #[arg(long)]
    session: Option<PathBuf>,
}

fn init_logging(path: &PathBuf) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match &cli.log {
        Some(path) => Some(init_logging(path)?),
        None => None,
    };

    let mut config = core_config::load_from(cli.config.clone())?;
    let snapshot_path = cli
        .session
        .clone()
        .or_else(|| config.file.session.snapshot.clone());

    // The backend restores the terminal on drop, panics included.
    let mut backend = CrosstermBackend::new();
    backend.enter()?;
    backend.set_title("prism")?;

    let mut device = Device::from_terminal()?;
    let (lines, span) = device.dimensions();
    config.apply_context(core_config::ConfigContext::new(span, lines, 4));

    let io = IoManager::allocate(device.wakeup_handle())
        .map_err(|e| anyhow::anyhow!("i/o thread: {e}"))?;

    let mut session = Session::new(&config, io, Area::new(0, 0, lines, span));

    // Restore the retained session, or open the requested files.
    let restored = snapshot_path
        .as_ref()
        .and_then(|p| std::fs::read_to_string(p).ok());
    match restored {
        Some(text) if cli.files.is_empty() => session.restore(&text),
        _ => {
            let layout = if cli.files.len() > 1 {
                vec![(1, 1), (1, 0)]
            } else {
                vec![(1, 0)]
            };
            session.allocate(&layout, &cli.files);
            session.redraw();
        }
    }

    info!(target: "prism", lines, span, files = cli.files.len(), "session_started");
    interact(&mut session, &mut device)?;

    if let Some(path) = snapshot_path {
        let image = retention::sequence_snapshot(&session.snapshot());
        if let Err(e) = std::fs::write(&path, image) {
            error!(target: "prism", error = %e, "snapshot_store_failed");
        }
    }

    Ok(())
}

/// Dispatch the I/O service effects and execute cycles until the session
/// is done.
fn interact(session: &mut Session, device: &mut Device) -> Result<()> {
    device.render_image()?;
    device.synchronize()?;

    while !session.done {
        // Drain completed background transfers before blocking.
        session.drain_io();

        // Transfer all accumulated deltas onto the device.
        for instruction in session.drain_deltas() {
            device.dispatch(&instruction)?;
        }
        for instruction in session.indicate() {
            device.dispatch(&instruction)?;
        }
        device.synchronize()?;

        // The blocking wait: device input or background wakeup.
        let event = device.transfer_event()?;
        let event = normalize(event);
        session.dispatch(event);
    }
    Ok(())
}

/// Text arriving from the device is NFC normalized before insertion.
fn normalize(event: DeviceEvent) -> DeviceEvent {
    match event {
        DeviceEvent::Text(t) => DeviceEvent::Text(t.nfc().collect()),
        DeviceEvent::Paste(t) => DeviceEvent::Paste(t.nfc().collect()),
        other => other,
    }
}
