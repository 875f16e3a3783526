use std::io::{self, BufRead, Write};

use crate::config::TrackerConfig;
use crate::console::Console;
use crate::series::Series;

pub(crate) const SEPARATOR: &str = "----------------------------------------";

/// How a series is printed in lists: one line each, or the full description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DisplayMode {
    Compact,
    Full,
}

impl DisplayMode {
    pub(crate) fn from_config(config: &TrackerConfig) -> Self {
        if config.compact_list {
            Self::Compact
        } else {
            Self::Full
        }
    }
}

/// Prints `series` between separator rules, pausing after every `page_size` entries
/// (0 means never). Returns false if the user stopped at a page break.
pub(crate) fn print_series_list<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    series: &[Series],
    mode: DisplayMode,
    page_size: usize,
) -> io::Result<bool> {
    for (count, entry) in series.iter().enumerate() {
        if page_size != 0 && count != 0 && count % page_size == 0 {
            console.say(SEPARATOR)?;
            let answer = console.ask("Press Enter to continue or type 'q' to stop: ")?;
            match answer.as_deref().map(str::trim) {
                Some("q" | "Q") | None => return Ok(false),
                _ => {}
            }
        }
        console.say(SEPARATOR)?;
        console.say(entry.render(mode))?;
    }
    if !series.is_empty() {
        console.say(SEPARATOR)?;
    }
    Ok(true)
}
