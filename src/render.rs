//! Terminal rendering of console line snapshots.
//!
//! The renderer remembers what it has already written. New lines are
//! printed in order, growth at the end of the most recent line is streamed
//! in place, growth of an earlier line continues below with only the new
//! text, and any other change reprints the line below.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::console::{ColorMode, Line, LineKind, Lines};

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for green text (dark mode prompt).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for blue text (light mode prompt).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for bold text (echoed input).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for black on white (light mode output).
const ANSI_BLACK_ON_WHITE: &str = "\x1b[30;47m";

/// Marker printed before echoed input.
const PROMPT: &str = "$ ";

/// Writes line snapshots to a terminal or any other writer.
pub struct TerminalRenderer<W: Write> {
    out: W,
    use_color: bool,
    shown: HashMap<String, String>,
    tail: Option<String>,
    at_line_start: bool,
}

impl<W: Write> TerminalRenderer<W> {
    /// Creates a renderer with ANSI colors enabled.
    pub fn new(out: W) -> Self {
        Self::with_color(out, true)
    }

    /// Creates a renderer with optional ANSI color output.
    pub fn with_color(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            shown: HashMap::new(),
            tail: None,
            at_line_start: true,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Bring the terminal up to date with `lines`.
    pub fn render(&mut self, lines: &Lines, mode: ColorMode) -> io::Result<()> {
        for line in lines.iter() {
            let (grown_from, is_tail) = match self.shown.get(&line.key) {
                Some(prev) if *prev == line.content => continue,
                Some(prev) if line.content.starts_with(prev.as_str()) => (
                    prev.len(),
                    self.tail.as_deref() == Some(line.key.as_str()),
                ),
                _ => (0, false),
            };
            if is_tail {
                self.write_text(line.kind, &line.content[grown_from..], mode)?;
            } else {
                self.start_line(line, grown_from, mode)?;
            }
            self.shown.insert(line.key.clone(), line.content.clone());
        }
        self.out.flush()
    }

    /// End the current line, if one is open.
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.at_line_start {
            self.out.write_all(b"\n")?;
            self.at_line_start = true;
        }
        self.out.flush()
    }

    /// Open a fresh terminal line for `line`, writing its content from `from`.
    fn start_line(&mut self, line: &Line, from: usize, mode: ColorMode) -> io::Result<()> {
        if !self.at_line_start {
            self.out.write_all(b"\n")?;
            self.at_line_start = true;
        }
        if line.kind == LineKind::Input && from == 0 {
            let prompt_style = match mode {
                ColorMode::Dark => ANSI_GREEN,
                ColorMode::Light => ANSI_BLUE,
            };
            self.write_styled(prompt_style, PROMPT)?;
            self.at_line_start = false;
        }
        self.write_text(line.kind, &line.content[from..], mode)?;
        self.tail = Some(line.key.clone());
        Ok(())
    }

    fn write_text(&mut self, kind: LineKind, text: &str, mode: ColorMode) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let style = match (kind, mode) {
            (LineKind::Input, _) => ANSI_BOLD,
            (LineKind::Output, ColorMode::Light) => ANSI_BLACK_ON_WHITE,
            (LineKind::Output, ColorMode::Dark) => "",
        };
        self.write_styled(style, text)?;
        self.at_line_start = text.ends_with('\n');
        Ok(())
    }

    fn write_styled(&mut self, style: &str, text: &str) -> io::Result<()> {
        if self.use_color && !style.is_empty() {
            write!(self.out, "{style}{text}{ANSI_RESET}")
        } else {
            self.out.write_all(text.as_bytes())
        }
    }
}
