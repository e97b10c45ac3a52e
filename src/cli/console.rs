use colored::*;
use std::io::{self, Stdout, Write};

use crate::dispatcher::ResponseSink;

/// Console handles all terminal I/O with colored formatting
pub struct Console<W: Write = Stdout> {
    out: W,
    user_color: Color,
    assistant_color: Color,
}

impl Console<Stdout> {
    /// Create a new Console on stdout with default colors
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for Console<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Console<W> {
    /// Create a Console that writes to any writer
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            user_color: Color::Cyan,
            assistant_color: Color::Green,
        }
    }

    /// Create a Console with custom colors
    pub fn with_colors(mut self, user_color: Color, assistant_color: Color) -> Self {
        self.user_color = user_color;
        self.assistant_color = assistant_color;
        self
    }

    /// Print the input prompt (without newline)
    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{} ", "You:".color(self.user_color).bold())?;
        self.out.flush()
    }

    /// Print one response chunk, prefixed by its author
    pub fn print_response(&mut self, author: &str, text: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {}",
            format!("{}:", author).color(self.assistant_color).bold(),
            text.color(self.assistant_color)
        )
    }

    /// Print a system message (info, recoverable errors)
    pub fn print_system(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{} {}", "System:".yellow().bold(), message)
    }

    /// Print a newline
    pub fn println(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    /// Print a welcome banner
    pub fn print_banner(&mut self, app_name: &str, session_id: &str) -> io::Result<()> {
        writeln!(self.out, "{}", "=".repeat(60).bright_blue())?;
        writeln!(
            self.out,
            "{}",
            format!("  {} - session '{}'", app_name, session_id)
                .bright_blue()
                .bold()
        )?;
        writeln!(self.out, "{}", "=".repeat(60).bright_blue())?;
        writeln!(self.out)?;
        writeln!(self.out, "Type your message and press Enter. Type 'exit' to end the session.")?;
        writeln!(self.out)
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}

impl<W: Write + Send> ResponseSink for Console<W> {
    fn response(&mut self, author: &str, text: &str) -> io::Result<()> {
        self.print_response(author, text)
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        self.print_system(message)
    }
}
