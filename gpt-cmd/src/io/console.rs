//! Coloured terminal output for the loop.
//!
//! This is product output (goal, commands, exit codes, banners) and is
//! independent of `RUST_LOG` diagnostics.

use std::io::{self, Stdout, Write};

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};

/// Apply `paint` to each line separately so colours survive line breaks.
fn paint_lines(text: &str, paint: fn(&str) -> ColoredString) -> String {
    text.lines()
        .map(|line| paint(line).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn blue(text: &str) -> ColoredString {
    text.bright_blue()
}

fn dim(text: &str) -> ColoredString {
    text.dimmed()
}

fn green(text: &str) -> ColoredString {
    text.bright_green()
}

fn red(text: &str) -> ColoredString {
    text.bright_red()
}

/// Writer for everything the user sees while the loop runs.
pub struct Console<W: Write> {
    out: W,
}

impl Console<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").context("write console output")?;
        self.out.flush().context("flush console output")
    }

    pub fn goal(&mut self, goal: &str) -> Result<()> {
        self.line(&format!("{} {goal}", blue("Goal:")))
    }

    /// Separator printed before each turn.
    pub fn turn_separator(&mut self) -> Result<()> {
        self.line("\n----------")
    }

    pub fn blank_line(&mut self) -> Result<()> {
        self.line("")
    }

    /// Context attached to a command batch.
    pub fn batch_context(&mut self, context: &str) -> Result<()> {
        self.line(&format!("{} {context}", blue("Context:")))
    }

    /// Context attached to a terminal status, printed as-is.
    pub fn final_context(&mut self, context: &str) -> Result<()> {
        self.line(context)
    }

    pub fn command(&mut self, command: &str) -> Result<()> {
        self.line(&format!("{} {}", blue("Command:"), paint_lines(command, dim)))
    }

    pub fn exit_code(&mut self, exit_code: i32) -> Result<()> {
        let label = if exit_code == 0 {
            green("Exit code:")
        } else {
            red("Exit code:")
        };
        self.line(&format!("{label} {}", dim(&exit_code.to_string())))
    }

    pub fn command_output(&mut self, output: &str) -> Result<()> {
        self.line(&paint_lines(output, dim))
    }

    pub fn success_banner(&mut self) -> Result<()> {
        self.line(&green("✅ Goal successfully achieved.").to_string())
    }

    pub fn failure_banner(&mut self) -> Result<()> {
        self.line(&red("❌ Goal failed.").to_string())
    }

    pub fn error(&mut self, message: &str) -> Result<()> {
        self.line(&paint_lines(message, red))
    }
}
