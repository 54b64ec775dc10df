//! Output rendering for streamed chat replies.
//!
//! The conversation drives a [`Renderer`] as a turn progresses: the
//! placeholder is shown when the request starts, chunks are printed as they
//! arrive, and client-side notices replace the reply when a turn fails or is
//! cancelled.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{ChatMessage, Model};

/// ANSI escape code for dim text (used for the placeholder).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for yellow text (used for notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Return to column zero and erase the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Trait for rendering streaming output.
///
/// This abstraction allows for different rendering strategies:
/// plain text with ANSI styling, plain text for piping, or a full-screen view
/// that redraws from [`Renderer::render_conversation`].
pub trait Renderer: Send {
    /// Called once the placeholder reply is in place, before the request.
    fn start_response(&mut self, model: &Model, placeholder: &str) {
        _ = model;
        _ = placeholder;
    }

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as chunks are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print a client-side notice that became part of the conversation.
    fn print_notice(&mut self, notice: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Called with the whole conversation every time it changes.
    fn render_conversation(&mut self, messages: &[ChatMessage]) {
        _ = messages;
    }

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    placeholder_shown: bool,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            placeholder_shown: false,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Creates a new PlainTextRenderer with specified color and interrupt flag.
    pub fn with_color_and_interrupt(use_color: bool, interrupted: Arc<AtomicBool>) -> Self {
        Self::with_color(use_color).with_interrupt(interrupted)
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    /// Remove the placeholder before anything else is written over it.
    fn clear_placeholder(&mut self) {
        if !self.placeholder_shown {
            return;
        }
        self.placeholder_shown = false;
        if self.use_color {
            print!("{ANSI_CLEAR_LINE}");
            self.line_start = true;
        } else {
            self.write("\n");
        }
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self, _model: &Model, placeholder: &str) {
        self.end_line();
        if self.use_color {
            self.write(&format!("{ANSI_DIM}{placeholder}{ANSI_RESET}"));
        } else {
            self.write(placeholder);
        }
        self.placeholder_shown = true;
    }

    fn print_text(&mut self, text: &str) {
        self.clear_placeholder();
        self.write(text);
    }

    fn print_notice(&mut self, notice: &str) {
        self.clear_placeholder();
        self.end_line();
        if self.use_color {
            self.write(&format!("{ANSI_YELLOW}{notice}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("[{notice}]\n"));
        }
    }

    fn print_error(&mut self, error: &str) {
        self.clear_placeholder();
        self.end_line();
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(&format!("{info}\n"));
    }

    fn finish_response(&mut self) {
        self.clear_placeholder();
        self.end_line();
    }

    fn print_interrupted(&mut self) {
        self.clear_placeholder();
        self.end_line();
        self.write("[interrupted]\n");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
