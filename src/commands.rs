//! One driver per subcommand. Drivers talk to the user only through a [`Console`], so they
//! run the same against a terminal or an in-memory script.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cli::AddArgs;
use crate::config::{save_config, TrackerConfig, CONFIG_KEYS};
use crate::console::Console;
use crate::display::{print_series_list, DisplayMode, SEPARATOR};
use crate::error::{Result, TrackerError};
use crate::listing::{list_series, search_series, ListFilter};
use crate::series::{EditCommand, EditFeedback, EditSession, EditState, NewSeries, Series};
use crate::store::{is_database, SeriesStore, SortField};
use crate::volumes::VolumeSet;

pub(crate) fn open_store(config: &TrackerConfig) -> Result<SeriesStore> {
    SeriesStore::open_or_create(&config.database_path())
}

fn find_series(store: &SeriesStore, config: &TrackerConfig, name: &str) -> Result<Series> {
    let row = store
        .find_by_name(name.trim())?
        .ok_or_else(|| TrackerError::NotFound(name.to_string()))?;
    Series::from_row(row, config.volume_limit)
}

fn print_boxed<R: BufRead, W: Write>(console: &mut Console<R, W>, text: &str) -> Result<()> {
    console.say(SEPARATOR)?;
    console.say(text)?;
    console.say(SEPARATOR)?;
    Ok(())
}

pub(crate) fn init<R: BufRead, W: Write>(
    config: &TrackerConfig,
    console: &mut Console<R, W>,
) -> Result<()> {
    let store = open_store(config)?;
    console.say(format!(
        "Database {} ready ({} series).",
        config.database_name,
        store.count()?
    ))?;
    Ok(())
}

pub(crate) fn add<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    args: AddArgs,
) -> Result<()> {
    let parsed = VolumeSet::parse_ranges(&args.volumes, config.volume_limit);
    for issue in &parsed.issues {
        console.say(format!("Warning: {issue}"))?;
    }
    let mut draft = NewSeries::new(args.name, parsed.volumes);
    draft.completed = args.completed;
    draft.author = args.author;
    draft.publisher = args.publisher;
    draft.alt_names = args.alt_names;

    let mut series = Series::new(draft)?;
    store.save(&mut series)?;
    info!(name = series.name(), owned = series.volumes().len(), "added series");
    print_boxed(console, &series.render(DisplayMode::from_config(config)))
}

pub(crate) fn list<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    filter: ListFilter,
    order: SortField,
) -> Result<()> {
    let series = list_series(store, config, filter, order)?;
    if series.is_empty() {
        console.say(format!("No {}series found.", filter.describe()))?;
        return Ok(());
    }
    if filter != ListFilter::All {
        console.say(format!(
            "Found {} {}series:",
            series.len(),
            filter.describe()
        ))?;
    }
    print_series_list(
        console,
        &series,
        DisplayMode::from_config(config),
        config.series_per_page,
    )?;
    Ok(())
}

pub(crate) fn search<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    term: &str,
) -> Result<()> {
    let found = search_series(store, config, term)?;
    if found.is_empty() {
        console.say(format!("No series found for '{term}'."))?;
        return Ok(());
    }
    console.say(format!("Found {} entries for '{term}':", found.len()))?;
    print_series_list(
        console,
        &found,
        DisplayMode::from_config(config),
        config.series_per_page,
    )?;
    Ok(())
}

pub(crate) fn show<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    name: &str,
) -> Result<()> {
    let series = find_series(store, config, name)?;
    print_boxed(console, &series.full_string())
}

// ── Editing ──────────────────────────────────────────────────────────────

const EDIT_MENU: &str = "Edit: \n[N]ame / [V]olumes / [A]uthor / [P]ublisher \n\
                         [Alt]ernate Names / [C]ompletion Status / [E]nd: ";

/// Prompts for one edit command. `None` means the selection was not understood.
fn read_edit_command<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    series: &Series,
) -> Result<Option<EditCommand>> {
    let Some(selection) = console.ask(EDIT_MENU)? else {
        return Ok(Some(EditCommand::End));
    };
    let value = |console: &mut Console<R, W>, prompt: &str| -> Result<String> {
        Ok(console.ask(prompt)?.unwrap_or_default())
    };
    let command = match selection.trim().to_ascii_lowercase().as_str() {
        "n" => {
            console.say(format!("Current Name: {}", series.name()))?;
            EditCommand::Rename(value(
                console,
                "Enter new series name or leave blank if unchanged: ",
            )?)
        }
        "v" => {
            console.say(format!("Volumes Owned: {}", series.readable_volumes()))?;
            let choice = value(
                console,
                "[A]dd or [R]emove volumes, or leave blank if unchanged: ",
            )?;
            match choice.trim() {
                "a" | "A" => EditCommand::AddVolumes(value(
                    console,
                    "Enter volumes to add (ex. 1, 3-5): ",
                )?),
                "r" | "R" => EditCommand::RemoveVolumes(value(
                    console,
                    "Enter volumes to remove (ex. 1, 3-5): ",
                )?),
                _ => return Ok(None),
            }
        }
        "a" => {
            console.say(format!("Current Author: {}", series.author()))?;
            EditCommand::Author(value(console, "Enter author or leave blank if unchanged: ")?)
        }
        "p" => {
            console.say(format!("Current Publisher: {}", series.publisher()))?;
            EditCommand::Publisher(value(
                console,
                "Enter publisher or leave blank if unchanged: ",
            )?)
        }
        "alt" => {
            console.say(format!("Current Alt. Names: {}", series.alt_names()))?;
            EditCommand::AltNames(value(
                console,
                "Enter any alternate names for this series: ",
            )?)
        }
        "c" => EditCommand::Completion(value(
            console,
            "Have you completed this series? (y/n) (Leave blank if unchanged): ",
        )?),
        "e" | "end" => EditCommand::End,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// Runs an edit session, then saves, or deletes the series if the edit emptied it and the user
/// agrees.
///
/// With `scripted` commands nothing is prompted except the deletion question, which `yes`
/// answers in advance.
pub(crate) fn edit<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    name: &str,
    scripted: Vec<EditCommand>,
    yes: bool,
) -> Result<()> {
    let mut series = find_series(store, config, name)?;
    let interactive = scripted.is_empty();
    let mut emptied = false;
    {
        let mut session = EditSession::new(&mut series, store);
        if interactive {
            while session.state() == EditState::Editing {
                let Some(command) = read_edit_command(console, session.series())? else {
                    continue;
                };
                let feedback = session.apply(command)?;
                emptied = empties(&feedback).unwrap_or(emptied);
                console.say(&feedback)?;
                if session.state() == EditState::Editing {
                    print_boxed(console, &session.series().full_string())?;
                }
            }
        } else {
            let commands = scripted.into_iter().chain([EditCommand::End]);
            for feedback in session.run(commands)? {
                emptied = empties(&feedback).unwrap_or(emptied);
                console.say(&feedback)?;
            }
        }
    }

    if emptied {
        let remove = yes
            || (console.confirm("No volumes owned for series. Remove from database?")?
                && console.confirm(&format!(
                    "Are you sure you want to remove {}? This cannot be undone.",
                    series.name()
                ))?);
        if remove {
            return delete_series(store, console, &series);
        }
    }

    if interactive && !console.confirm("Save changes?")? {
        console.say("Changes discarded.")?;
        return Ok(());
    }
    store.save(&mut series)?;
    console.say("Series updated!")?;
    print_boxed(console, &series.full_string())
}

/// Whether a volume edit left the series empty; `None` for other edits.
fn empties(feedback: &EditFeedback) -> Option<bool> {
    match feedback {
        EditFeedback::VolumesChanged { now_empty, .. } => Some(*now_empty),
        _ => None,
    }
}

fn delete_series<R: BufRead, W: Write>(
    store: &SeriesStore,
    console: &mut Console<R, W>,
    series: &Series,
) -> Result<()> {
    if let Some(id) = series.id() {
        store.delete(id)?;
    }
    console.say(format!("Series '{}' removed from database.", series.name()))?;
    Ok(())
}

pub(crate) fn add_next<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    name: &str,
) -> Result<()> {
    let mut series = find_series(store, config, name)?;
    if series.is_completed() {
        console.say(format!("'{name}' is marked completed; nothing added."))?;
        return Ok(());
    }
    match series.add_next_volume() {
        Some(volume) => {
            store.save(&mut series)?;
            console.say(format!("Added volume {volume} to '{name}'."))?;
            if !series.next_exceeds_limit() {
                console.say(format!("Next Volume: {}", series.next_volume()))?;
            }
        }
        None => console.say(format!(
            "'{name}' already fills every tracked volume (limit {}).",
            config.volume_limit
        ))?,
    }
    Ok(())
}

pub(crate) fn remove<R: BufRead, W: Write>(
    store: &SeriesStore,
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    name: &str,
    yes: bool,
) -> Result<()> {
    let series = find_series(store, config, name)?;
    print_boxed(console, &series.full_string())?;
    if !yes && !console.confirm("Remove series from database? This cannot be undone.")? {
        console.say("Series not removed.")?;
        return Ok(());
    }
    delete_series(store, console, &series)
}

// ── Settings ─────────────────────────────────────────────────────────────

pub(crate) fn config_show<R: BufRead, W: Write>(
    config: &TrackerConfig,
    console: &mut Console<R, W>,
) -> Result<()> {
    for key in CONFIG_KEYS {
        console.say(format!("{key} = {}", config.get(key).unwrap_or_default()))?;
    }
    Ok(())
}

/// Validates and saves a settings change. A new volume limit is applied to the stored series
/// first; if some series owns volumes above it, nothing changes.
fn apply_config_change<R: BufRead, W: Write>(
    config_path: &Path,
    current: &mut TrackerConfig,
    updated: TrackerConfig,
    console: &mut Console<R, W>,
) -> Result<()> {
    let database = updated.database_path();
    if updated.database_name != current.database_name
        && database.exists()
        && !is_database(&database)
    {
        return Err(TrackerError::invalid_config(
            "database_name",
            format!("{} is not a series database", database.display()),
        ));
    }

    let mut relimited = None;
    if updated.volume_limit != current.volume_limit {
        let existing = current.database_path();
        if existing.exists() {
            let mut store = SeriesStore::open(&existing)?;
            let blocked = store.relimit(current.volume_limit, updated.volume_limit)?;
            if !blocked.is_empty() {
                return Err(TrackerError::invalid_config(
                    "volume_limit",
                    format!(
                        "these series own volumes above {}: {}",
                        updated.volume_limit,
                        blocked.join(", ")
                    ),
                ));
            }
            relimited = Some(store);
        }
    }

    // The store must keep matching the limit recorded in the config file.
    if let Err(err) = save_config(config_path, &updated) {
        if let Some(mut store) = relimited {
            warn!(
                limit = current.volume_limit,
                "config not saved; restoring stored volumes"
            );
            store.relimit(updated.volume_limit, current.volume_limit)?;
        }
        return Err(err);
    }
    *current = updated;
    console.say("Settings saved.")?;
    Ok(())
}

pub(crate) fn config_set<R: BufRead, W: Write>(
    config_path: &Path,
    config: &mut TrackerConfig,
    console: &mut Console<R, W>,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut updated = config.clone();
    updated.set(key, value)?;
    apply_config_change(config_path, config, updated, console)
}

pub(crate) fn config_reset<R: BufRead, W: Write>(
    config_path: &Path,
    config: &mut TrackerConfig,
    console: &mut Console<R, W>,
) -> Result<()> {
    let mut updated = config.clone();
    updated.reset();
    apply_config_change(config_path, config, updated, console)
}

pub(crate) fn clear_db<R: BufRead, W: Write>(
    config: &TrackerConfig,
    console: &mut Console<R, W>,
    yes: bool,
) -> Result<()> {
    let database = config.database_path();
    let backup = PathBuf::from(format!("{}.bak", config.database_name));
    if !database.exists() {
        console.say("No database to clear.")?;
        return Ok(());
    }
    let prompt = format!("Remove database? (will copy to {})", backup.display());
    if !yes && !console.confirm(&prompt)? {
        console.say("Database not changed.")?;
        return Ok(());
    }
    std::fs::rename(&database, &backup).map_err(|e| TrackerError::io(&database, e))?;
    SeriesStore::open_or_create(&database)?;
    info!(backup = %backup.display(), "database moved aside");
    console.say("Database cleared; previous contents kept in the backup.")?;
    Ok(())
}
