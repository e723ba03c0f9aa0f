//! Text rendering of detections for the terminal.

use tuner_core::{NoteConvention, PitchError};

/// What the terminal line shows besides the pitch name and frequency.
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub convention: NoteConvention,
    pub show_error_text: bool,
}

/// Renders one detection as a single status line.
pub fn format_detection(detection: &PitchError, options: DisplayOptions) -> String {
    let expected = detection.expected();
    let mut line = format!(
        "{:<12} {:>2}  {:>9.2} Hz",
        expected.name.display_name(options.convention),
        expected.octave,
        detection.actual_freq()
    );

    if options.show_error_text {
        line.push_str(&format!("  {:+4} cents", detection.error_in_cents().round() as i64));
    }

    line.push_str(&format!("  [{} bands]", detection.octave_bands()));
    line
}

/// Line shown while nothing is detected.
pub fn format_idle() -> &'static str {
    "--"
}
