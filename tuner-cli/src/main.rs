//! # Strobe Tuner - Terminal Front End
//!
//! Runs the detector session against the default microphone and prints the
//! latest detection.
//!
//! ## Architecture
//! - **Main Thread**: prints results as they arrive
//! - **Worker Thread**: owned by `TunerSession`, captures and analyses audio
//! - **Input Thread**: waits for Enter and requests shutdown
//! - **Communication**: crossbeam channels between the threads
//!
//! Usage: `tuner-cli [settings.json]`

mod display;

use anyhow::{Context, Result};
use crossbeam_channel::{select, Receiver};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::thread;
use tuner_core::{MicCapture, PitchError, SharedSettings, StoredSettings, TunerSession};

use display::{format_detection, format_idle, DisplayOptions};

fn main() -> Result<()> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => load_settings(&path)?,
        None => StoredSettings::default(),
    };
    let config = settings.tuner_config()?;
    let options = DisplayOptions {
        convention: settings.note_convention(),
        show_error_text: settings.show_error_text(),
    };

    log::info!(
        "[MAIN] Starting tuner: A4={} Hz, threshold={:.3}, frame={} samples",
        config.reference_hz,
        config.detection_threshold,
        config.frame_size
    );

    let shared = Arc::new(SharedSettings::new(config));
    let (session, results) = TunerSession::spawn(|| Ok(MicCapture::new()), shared);
    let quit = spawn_quit_listener();

    println!("Listening... press Enter to stop.");
    display_loop(&results, &quit, options);

    log::info!("[MAIN] Stopping tuner...");
    session.stop()
}

/// Prints each fresh detection until Enter is pressed or the worker exits.
fn display_loop(results: &Receiver<Option<PitchError>>, quit: &Receiver<()>, options: DisplayOptions) {
    let mut stdout = std::io::stdout();
    loop {
        select! {
            recv(results) -> msg => match msg {
                Ok(Some(detection)) => {
                    let _ = write!(stdout, "\r{:<60}", format_detection(&detection, options));
                }
                Ok(None) => {
                    let _ = write!(stdout, "\r{:<60}", format_idle());
                }
                Err(_) => {
                    log::warn!("[MAIN] Worker stopped");
                    break;
                }
            },
            recv(quit) -> _ => break,
        }
        let _ = stdout.flush();
    }
    println!();
}

fn spawn_quit_listener() -> Receiver<()> {
    let (quit_tx, quit_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = quit_tx.send(());
    });
    quit_rx
}

/// Loads stored settings from a JSON file.
fn load_settings(path: &str) -> Result<StoredSettings> {
    let file = File::open(path).with_context(|| format!("opening settings file {}", path))?;
    let settings = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing settings file {}", path))?;
    Ok(settings)
}
