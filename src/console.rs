//! Line-oriented prompting over any reader/writer pair.

use std::fmt::Display;
use std::io::{self, BufRead, StdinLock, Stdout, Write};

pub(crate) struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<StdinLock<'static>, Stdout> {
    pub(crate) fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prints `prompt` and reads one line without its line ending. `None` at end of input.
    pub(crate) fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    /// A `(y/N)` question; anything but `y`/`Y` (including end of input) is no.
    pub(crate) fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{prompt} (y/N): "))?;
        Ok(matches!(answer.as_deref().map(str::trim), Some("y" | "Y")))
    }

    pub(crate) fn say(&mut self, text: impl Display) -> io::Result<()> {
        writeln!(self.output, "{text}")
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn ask_strips_line_endings() {
        let mut c = console("Berserk\r\nnext\n");
        assert_eq!(c.ask("Name: ").unwrap().as_deref(), Some("Berserk"));
        assert_eq!(c.ask("Name: ").unwrap().as_deref(), Some("next"));
        assert_eq!(c.ask("Name: ").unwrap(), None);
        assert_eq!(String::from_utf8(c.into_output()).unwrap(), "Name: Name: Name: ");
    }

    #[test]
    fn confirm_defaults_to_no() {
        let mut c = console("y\n\nyes\n");
        assert!(c.confirm("Delete?").unwrap());
        assert!(!c.confirm("Delete?").unwrap());
        assert!(!c.confirm("Delete?").unwrap());
        assert!(!c.confirm("Delete?").unwrap());
    }
}
