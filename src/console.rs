//! Line-oriented input helpers
//!
//! All functions take any `BufRead`, so tests drive them with byte slices.
//! `Ok(None)` always means the input stream ended.

use crate::error::{ErrorCategory, ErrorKind, GpgsymError, Result};
use crate::palette::Palette;
use std::io::{self, BufRead, Write};

/// Maps a console I/O failure into a crate error.
pub(crate) fn console_io(what: &'static str) -> impl FnOnce(io::Error) -> GpgsymError {
    move |e| {
        GpgsymError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to {}: {}", what, e),
            e,
        )
    }
}

/// Read one line without its terminator.
pub fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let n = input
        .read_line(&mut line)
        .map_err(console_io("read from stdin"))?;
    if n == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

/// Collect lines until one equals `terminator` exactly, and join them with `\n`.
///
/// The terminator line is dropped unless `keep_last_line` is set.
pub fn multiline_input<R: BufRead>(
    input: &mut R,
    terminator: &str,
    keep_last_line: bool,
) -> Result<Option<String>> {
    let mut lines = Vec::new();
    loop {
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        if line == terminator {
            if keep_last_line {
                lines.push(line);
            }
            return Ok(Some(lines.join("\n")));
        }
        lines.push(line);
    }
}

/// Keep asking until the answer is one of `choices`.
///
/// `answer` is the reply already given to the original prompt. Mistakes are
/// not counted; the user can retry forever.
pub fn expect_one_of<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    palette: &Palette,
    mut answer: String,
    choices: &[&str],
) -> Result<Option<String>> {
    loop {
        if choices.contains(&answer.as_str()) {
            return Ok(Some(answer));
        }
        writeln!(
            output,
            "{}",
            (palette.error)(&format!("Expecting one of {}", choices.join(", ")))
        )
        .map_err(console_io("write to stdout"))?;
        write!(output, "{}", (palette.bold)(": ")).map_err(console_io("write to stdout"))?;
        output.flush().map_err(console_io("flush stdout"))?;

        match read_line(input)? {
            Some(line) => answer = line,
            None => return Ok(None),
        }
    }
}
