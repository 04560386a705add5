//! Interactive yes/no confirmation before running a command.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::debug;

/// Move the cursor up one line and erase it.
const CLEAR_PREV_LINE: &str = "\x1b[1A\x1b[2K";

/// Asks the user whether a command may run.
pub trait Confirmer {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Confirmer reading answers from the process's stdin.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, question: &str) -> Result<bool> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        prompt_yes_no(&mut stdin.lock(), &mut stdout.lock(), question)
    }
}

/// Interpret one answer line: `y`, `n` or empty (yes), case-insensitive.
///
/// Returns `None` for anything else.
pub fn interpret_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "y" | "" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}

/// Prompt until a recognised answer is read.
///
/// Unrecognised answers overwrite the previous prompt line and ask again. A yes
/// also clears the prompt line. End of input counts as a refusal.
pub fn prompt_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> Result<bool> {
    let mut attempts = 0u32;
    loop {
        if attempts > 0 {
            write!(output, "{CLEAR_PREV_LINE}").context("write prompt")?;
        }
        write!(output, "{question} (Y/n) ").context("write prompt")?;
        output.flush().context("flush prompt")?;

        let mut buf = Vec::new();
        let read = input.read_until(b'\n', &mut buf).context("read answer")?;
        if read == 0 {
            debug!("stdin closed while prompting, treating as no");
            writeln!(output).context("write prompt")?;
            return Ok(false);
        }

        // Undecodable bytes never match an answer, so they just re-prompt.
        if let Some(answer) = interpret_answer(&String::from_utf8_lossy(&buf)) {
            if answer {
                write!(output, "{CLEAR_PREV_LINE}").context("write prompt")?;
                output.flush().context("flush prompt")?;
            }
            return Ok(answer);
        }
        attempts += 1;
    }
}
