//! A tracked manga series and its editing workflow.
//!
//! [`Series`] owns its [`VolumeSet`] and caches the derived next volume and readable range
//! string; both are refreshed whenever the volumes change. Edits are expressed as
//! [`EditCommand`] values fed to an [`EditSession`], so the workflow runs the same from a
//! terminal loop, from `edit --set ...` arguments, or from tests.

use std::cell::OnceCell;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::display::DisplayMode;
use crate::error::{Result, TrackerError};
use crate::store::{SeriesId, SeriesRow};
use crate::volumes::{TokenIssue, VolumeSet};

/// Names that would collide with placeholder metadata values.
pub(crate) const RESERVED_NAMES: &[&str] = &["unknown"];

pub(crate) const UNKNOWN: &str = "Unknown";

/// Checks a name after trimming surrounding whitespace, which is how it will be stored.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrackerError::EmptyName);
    }
    if RESERVED_NAMES
        .iter()
        .any(|reserved| name.eq_ignore_ascii_case(reserved))
    {
        return Err(TrackerError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Reads the completion vocabulary: `y/yes/1/complete` and `n/no/0/incomplete`.
pub(crate) fn parse_completion(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "1" | "complete" => Some(true),
        "n" | "no" | "0" | "incomplete" => Some(false),
        _ => None,
    }
}

fn or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}

// ── NewSeries ────────────────────────────────────────────────────────────

/// Input for creating a series that has not been stored yet.
#[derive(Debug, Clone)]
pub(crate) struct NewSeries {
    pub(crate) name: String,
    pub(crate) volumes: VolumeSet,
    pub(crate) completed: bool,
    pub(crate) next_volume: Option<u32>,
    pub(crate) publisher: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) alt_names: Option<String>,
}

impl NewSeries {
    pub(crate) fn new(name: impl Into<String>, volumes: VolumeSet) -> Self {
        Self {
            name: name.into(),
            volumes,
            completed: false,
            next_volume: None,
            publisher: None,
            author: None,
            alt_names: None,
        }
    }
}

// ── Series ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct Series {
    id: Option<SeriesId>,
    name: String,
    volumes: VolumeSet,
    completed: bool,
    next_volume: u32,
    publisher: String,
    author: String,
    alt_names: String,
    readable: OnceCell<String>,
}

impl Series {
    /// Validates the name and fills metadata defaults.
    pub(crate) fn new(draft: NewSeries) -> Result<Self> {
        validate_name(&draft.name)?;
        let next_volume = draft
            .next_volume
            .filter(|&n| n >= 1)
            .map(|n| n.min(draft.volumes.limit() + 1))
            .unwrap_or_else(|| draft.volumes.next_missing());
        Ok(Self {
            id: None,
            name: draft.name.trim().to_string(),
            volumes: draft.volumes,
            completed: draft.completed,
            next_volume,
            publisher: or_unknown(draft.publisher),
            author: or_unknown(draft.author),
            alt_names: draft.alt_names.unwrap_or_default(),
            readable: OnceCell::new(),
        })
    }

    /// Rebuilds a stored series. A stored next volume below 1 (the `-1` sentinel) is recomputed.
    pub(crate) fn from_row(row: SeriesRow, limit: u32) -> Result<Self> {
        let volumes = VolumeSet::decode(&row.volumes_owned, limit).map_err(|e| {
            TrackerError::CorruptVolumes {
                name: row.name.clone(),
                reason: e.to_string(),
            }
        })?;
        let next_volume = match u32::try_from(row.next_volume) {
            Ok(n) if n >= 1 => n,
            _ => volumes.next_missing(),
        };
        Ok(Self {
            id: row.id,
            name: row.name,
            volumes,
            completed: row.is_completed,
            next_volume,
            publisher: row.publisher,
            author: row.author,
            alt_names: row.alt_names,
            readable: OnceCell::new(),
        })
    }

    pub(crate) fn to_row(&self) -> SeriesRow {
        SeriesRow {
            id: self.id,
            name: self.name.clone(),
            volumes_owned: self.volumes.encode(),
            is_completed: self.completed,
            next_volume: i64::from(self.next_volume),
            publisher: self.publisher.clone(),
            author: self.author.clone(),
            alt_names: self.alt_names.clone(),
        }
    }

    pub(crate) fn id(&self) -> Option<SeriesId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: SeriesId) {
        self.id = Some(id);
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn volumes(&self) -> &VolumeSet {
        &self.volumes
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn next_volume(&self) -> u32 {
        self.next_volume
    }

    /// True when the next volume lies beyond the configured limit.
    pub(crate) fn next_exceeds_limit(&self) -> bool {
        self.next_volume > self.volumes.limit()
    }

    pub(crate) fn publisher(&self) -> &str {
        &self.publisher
    }

    pub(crate) fn author(&self) -> &str {
        &self.author
    }

    pub(crate) fn alt_names(&self) -> &str {
        &self.alt_names
    }

    pub(crate) fn readable_volumes(&self) -> &str {
        self.readable.get_or_init(|| self.volumes.readable())
    }

    pub(crate) fn add_volumes(&mut self, delta: &VolumeSet) {
        self.volumes.merge_add(delta);
        self.volumes_changed();
    }

    /// Returns true if the series owns no volumes afterwards.
    pub(crate) fn remove_volumes(&mut self, delta: &VolumeSet) -> bool {
        let emptied = self.volumes.merge_remove(delta);
        self.volumes_changed();
        emptied
    }

    /// Marks the lowest unowned volume as owned. `None` when the collection fills every slot.
    pub(crate) fn add_next_volume(&mut self) -> Option<u32> {
        if self.volumes.is_full() {
            return None;
        }
        let volume = self.volumes.next_missing();
        self.volumes.insert(volume);
        self.volumes_changed();
        Some(volume)
    }

    pub(crate) fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    fn volumes_changed(&mut self) {
        self.next_volume = self.volumes.next_missing();
        self.readable = OnceCell::new();
    }

    /// One line: `"<name> by <author> (Completed)"` or `"... (Next Volume: <n>)"`.
    pub(crate) fn compact_string(&self) -> String {
        if self.completed {
            format!("{} by {} (Completed)", self.name, self.author)
        } else {
            format!(
                "{} by {} (Next Volume: {})",
                self.name, self.author, self.next_volume
            )
        }
    }

    pub(crate) fn full_string(&self) -> String {
        let mut out = format!(
            "{}: {} (Completed: {})\nAlternate names: {}\nAuthor: {}\nPublished by: {}",
            self.name,
            self.readable_volumes(),
            if self.completed { "Yes" } else { "No" },
            self.alt_names,
            self.author,
            self.publisher,
        );
        if !self.completed {
            out.push_str(&format!("\nNext Volume: {}", self.next_volume));
        }
        out
    }

    pub(crate) fn render(&self, mode: DisplayMode) -> String {
        match mode {
            DisplayMode::Compact => self.compact_string(),
            DisplayMode::Full => self.full_string(),
        }
    }
}

// ── Edit commands ────────────────────────────────────────────────────────

/// One step of an edit. Each command targets exactly one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EditCommand {
    Rename(String),
    AddVolumes(String),
    RemoveVolumes(String),
    Author(String),
    Publisher(String),
    AltNames(String),
    Completion(String),
    End,
}

impl FromStr for EditCommand {
    type Err = String;

    /// Parses the `field=value` form used by `edit --set`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (field, value) = match s.split_once('=') {
            Some((field, value)) => (field.trim(), value.to_string()),
            None => (s.trim(), String::new()),
        };
        match field.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Rename(value)),
            "add" => Ok(Self::AddVolumes(value)),
            "remove" | "rm" => Ok(Self::RemoveVolumes(value)),
            "author" => Ok(Self::Author(value)),
            "publisher" => Ok(Self::Publisher(value)),
            "alt" | "alt_names" | "alt-names" => Ok(Self::AltNames(value)),
            "completed" | "completion" => Ok(Self::Completion(value)),
            "end" | "e" => Ok(Self::End),
            other => Err(format!(
                "unknown field '{other}' (expected name, add, remove, author, publisher, alt, completed or end)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Author,
    Publisher,
    AltNames,
    Completion,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Author => "Author",
            Self::Publisher => "Publisher",
            Self::AltNames => "Alternate names",
            Self::Completion => "Completion status",
        })
    }
}

/// What a single edit command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EditFeedback {
    Renamed { to: String },
    NameUnchanged,
    NameRejected(String),
    VolumesChanged {
        issues: Vec<TokenIssue>,
        now_empty: bool,
    },
    FieldChanged(Field),
    FieldUnchanged(Field),
    InvalidCompletion(String),
    Finished,
}

impl fmt::Display for EditFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed { to } => write!(f, "Name changed to \"{to}\"."),
            Self::NameUnchanged => f.write_str("Name not changed."),
            Self::NameRejected(reason) => write!(f, "{reason} Name not changed."),
            Self::VolumesChanged { issues, now_empty } => {
                for issue in issues {
                    writeln!(f, "Warning: {issue}")?;
                }
                if *now_empty {
                    f.write_str("No volumes owned for series.")
                } else {
                    f.write_str("Volumes updated.")
                }
            }
            Self::FieldChanged(field) => write!(f, "{field} changed."),
            Self::FieldUnchanged(field) => write!(f, "{field} not changed."),
            Self::InvalidCompletion(value) => {
                write!(f, "Invalid value '{value}' for completion status, not changed.")
            }
            Self::Finished => f.write_str("Done editing."),
        }
    }
}

/// Answers whether a name is already taken, and by which series.
pub(crate) trait NameIndex {
    fn owner_of(&self, name: &str) -> Result<Option<SeriesId>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditState {
    Editing,
    Done,
}

/// Applies edit commands to one series until an `End` command arrives.
pub(crate) struct EditSession<'a, N: NameIndex + ?Sized> {
    series: &'a mut Series,
    names: &'a N,
    state: EditState,
}

impl<'a, N: NameIndex + ?Sized> EditSession<'a, N> {
    pub(crate) fn new(series: &'a mut Series, names: &'a N) -> Self {
        Self {
            series,
            names,
            state: EditState::Editing,
        }
    }

    pub(crate) fn state(&self) -> EditState {
        self.state
    }

    pub(crate) fn series(&self) -> &Series {
        self.series
    }

    /// Feeds commands until one of them ends the session.
    pub(crate) fn run(
        &mut self,
        commands: impl IntoIterator<Item = EditCommand>,
    ) -> Result<Vec<EditFeedback>> {
        let mut feedback = Vec::new();
        for command in commands {
            if self.state == EditState::Done {
                break;
            }
            feedback.push(self.apply(command)?);
        }
        Ok(feedback)
    }

    pub(crate) fn apply(&mut self, command: EditCommand) -> Result<EditFeedback> {
        if self.state == EditState::Done {
            return Ok(EditFeedback::Finished);
        }
        debug!(series = %self.series.name, ?command, "applying edit");
        let feedback = match command {
            EditCommand::Rename(name) => self.rename(name)?,
            EditCommand::AddVolumes(text) => {
                let parsed = VolumeSet::parse_ranges(&text, self.series.volumes.limit());
                self.series.add_volumes(&parsed.volumes);
                EditFeedback::VolumesChanged {
                    issues: parsed.issues,
                    now_empty: self.series.volumes.is_empty(),
                }
            }
            EditCommand::RemoveVolumes(text) => {
                let parsed = VolumeSet::parse_ranges(&text, self.series.volumes.limit());
                let now_empty = self.series.remove_volumes(&parsed.volumes);
                EditFeedback::VolumesChanged {
                    issues: parsed.issues,
                    now_empty,
                }
            }
            EditCommand::Author(value) => {
                replace_if_given(&mut self.series.author, value, Field::Author)
            }
            EditCommand::Publisher(value) => {
                replace_if_given(&mut self.series.publisher, value, Field::Publisher)
            }
            EditCommand::AltNames(value) => {
                replace_if_given(&mut self.series.alt_names, value, Field::AltNames)
            }
            EditCommand::Completion(value) => {
                if value.trim().is_empty() {
                    EditFeedback::FieldUnchanged(Field::Completion)
                } else if let Some(completed) = parse_completion(&value) {
                    self.series.set_completed(completed);
                    EditFeedback::FieldChanged(Field::Completion)
                } else {
                    EditFeedback::InvalidCompletion(value)
                }
            }
            EditCommand::End => {
                self.state = EditState::Done;
                EditFeedback::Finished
            }
        };
        Ok(feedback)
    }

    fn rename(&mut self, name: String) -> Result<EditFeedback> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(EditFeedback::NameUnchanged);
        }
        if let Err(err) = validate_name(&name) {
            return Ok(EditFeedback::NameRejected(format!("{err}.")));
        }
        match self.names.owner_of(&name)? {
            Some(owner) if Some(owner) != self.series.id => Ok(EditFeedback::NameRejected(
                "New name already present in database.".to_string(),
            )),
            _ => {
                self.series.name = name.clone();
                Ok(EditFeedback::Renamed { to: name })
            }
        }
    }
}

fn replace_if_given(slot: &mut String, value: String, field: Field) -> EditFeedback {
    if value.trim().is_empty() {
        EditFeedback::FieldUnchanged(field)
    } else {
        *slot = value;
        EditFeedback::FieldChanged(field)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Names(HashMap<String, SeriesId>);

    impl NameIndex for Names {
        fn owner_of(&self, name: &str) -> Result<Option<SeriesId>> {
            Ok(self.0.get(name).copied())
        }
    }

    fn names(entries: &[(&str, SeriesId)]) -> Names {
        Names(
            entries
                .iter()
                .map(|(name, id)| (name.to_string(), *id))
                .collect(),
        )
    }

    fn sample(name: &str, volumes: &str) -> Series {
        let mut draft = NewSeries::new(name, VolumeSet::from_ranges(volumes, 128));
        draft.author = Some("Kentaro Miura".to_string());
        Series::new(draft).unwrap()
    }

    #[test]
    fn test_new_series_defaults() {
        let series = Series::new(NewSeries::new(
            "Berserk",
            VolumeSet::from_ranges("1-3, 5", 128),
        ))
        .unwrap();
        assert_eq!(series.id(), None);
        assert_eq!(series.author(), UNKNOWN);
        assert_eq!(series.publisher(), UNKNOWN);
        assert_eq!(series.alt_names(), "");
        assert_eq!(series.next_volume(), 4);
        assert_eq!(series.readable_volumes(), "1-3, 5");
    }

    #[test]
    fn test_new_series_rejects_bad_names() {
        let empty = Series::new(NewSeries::new("  ", VolumeSet::empty(128)));
        assert!(matches!(empty, Err(TrackerError::EmptyName)));
        let reserved = Series::new(NewSeries::new("UnKnown", VolumeSet::empty(128)));
        assert!(matches!(reserved, Err(TrackerError::ReservedName(_))));
    }

    #[test]
    fn test_names_are_trimmed_before_checks() {
        let reserved = Series::new(NewSeries::new(" unknown ", VolumeSet::empty(128)));
        assert!(matches!(reserved, Err(TrackerError::ReservedName(_))));
        let series = Series::new(NewSeries::new("  Berserk ", VolumeSet::empty(128))).unwrap();
        assert_eq!(series.name(), "Berserk");

        let mut series = sample("Akira", "1");
        let index = names(&[]);
        let mut session = EditSession::new(&mut series, &index);
        assert!(matches!(
            session.apply(EditCommand::Rename("\tUnknown ".to_string())).unwrap(),
            EditFeedback::NameRejected(_)
        ));
        assert_eq!(
            session.apply(EditCommand::Rename(" Akira Deluxe ".to_string())).unwrap(),
            EditFeedback::Renamed {
                to: "Akira Deluxe".to_string()
            }
        );
    }

    #[test]
    fn test_explicit_next_volume_beyond_limit() {
        let mut draft = NewSeries::new("Vagabond", VolumeSet::from_ranges("1-2", 128));
        draft.next_volume = Some(500);
        let mut series = Series::new(draft).unwrap();
        assert_eq!(series.next_volume(), 129);
        assert_eq!(series.add_next_volume(), Some(3));
        assert_eq!(series.next_volume(), 4);
    }

    #[test]
    fn test_explicit_next_volume_kept() {
        let mut draft = NewSeries::new("Vagabond", VolumeSet::from_ranges("1-2", 128));
        draft.next_volume = Some(9);
        assert_eq!(Series::new(draft).unwrap().next_volume(), 9);
    }

    #[test]
    fn test_row_round_trip_recomputes_sentinel() {
        let series = sample("Berserk", "1, 3-5, 7, 52");
        let mut row = series.to_row();
        assert_eq!(row.volumes_owned, "93,524288,0,0");
        row.next_volume = -1;
        row.id = Some(7);
        let loaded = Series::from_row(row, 128).unwrap();
        assert_eq!(loaded.id(), Some(7));
        assert_eq!(loaded.next_volume(), 2);
        assert_eq!(loaded.volumes(), series.volumes());
    }

    #[test]
    fn test_from_row_rejects_wrong_word_count() {
        let mut row = sample("Berserk", "1").to_row();
        row.volumes_owned = "1,0".to_string();
        let err = Series::from_row(row, 128).unwrap_err();
        assert!(matches!(err, TrackerError::CorruptVolumes { .. }));
    }

    #[test]
    fn test_compact_and_full_strings() {
        let mut series = sample("Berserk", "1-3, 5");
        assert_eq!(
            series.compact_string(),
            "Berserk by Kentaro Miura (Next Volume: 4)"
        );
        assert_eq!(
            series.full_string(),
            "Berserk: 1-3, 5 (Completed: No)\nAlternate names: \nAuthor: Kentaro Miura\n\
             Published by: Unknown\nNext Volume: 4"
        );
        series.set_completed(true);
        assert_eq!(series.compact_string(), "Berserk by Kentaro Miura (Completed)");
        assert!(!series.full_string().contains("Next Volume"));
        assert_eq!(series.render(DisplayMode::Compact), series.compact_string());
    }

    #[test]
    fn test_parse_completion_vocabulary() {
        for yes in ["y", "YES", "1", "Complete"] {
            assert_eq!(parse_completion(yes), Some(true));
        }
        for no in ["n", "No", "0", "incomplete"] {
            assert_eq!(parse_completion(no), Some(false));
        }
        assert_eq!(parse_completion("maybe"), None);
    }

    #[test]
    fn test_edit_command_from_str() {
        assert_eq!(
            "name=Berserk Deluxe".parse::<EditCommand>(),
            Ok(EditCommand::Rename("Berserk Deluxe".to_string()))
        );
        assert_eq!(
            "add=4-6, 8".parse::<EditCommand>(),
            Ok(EditCommand::AddVolumes("4-6, 8".to_string()))
        );
        assert_eq!("end".parse::<EditCommand>(), Ok(EditCommand::End));
        assert!("colour=red".parse::<EditCommand>().is_err());
    }

    #[test]
    fn test_session_edits_fields_until_end() {
        let mut series = sample("Berserk", "1-3");
        let index = names(&[]);
        let mut session = EditSession::new(&mut series, &index);
        let feedback = session
            .run([
                EditCommand::AddVolumes("4-6".to_string()),
                EditCommand::Publisher("Dark Horse".to_string()),
                EditCommand::Author(String::new()),
                EditCommand::Completion("maybe".to_string()),
                EditCommand::Completion("yes".to_string()),
                EditCommand::End,
                EditCommand::Publisher("ignored".to_string()),
            ])
            .unwrap();
        assert_eq!(feedback.len(), 6);
        assert_eq!(session.state(), EditState::Done);
        assert_eq!(feedback[2], EditFeedback::FieldUnchanged(Field::Author));
        assert_eq!(
            feedback[3],
            EditFeedback::InvalidCompletion("maybe".to_string())
        );

        assert_eq!(series.readable_volumes(), "1-6");
        assert_eq!(series.next_volume(), 7);
        assert_eq!(series.publisher(), "Dark Horse");
        assert_eq!(series.author(), "Kentaro Miura");
        assert!(series.is_completed());
    }

    #[test]
    fn test_session_rename_rules() {
        let mut series = sample("Berserk", "1");
        series.set_id(1);
        let index = names(&[("Berserk", 1), ("Vagabond", 2)]);
        let mut session = EditSession::new(&mut series, &index);

        assert_eq!(
            session.apply(EditCommand::Rename(String::new())).unwrap(),
            EditFeedback::NameUnchanged
        );
        assert!(matches!(
            session.apply(EditCommand::Rename("unknown".to_string())).unwrap(),
            EditFeedback::NameRejected(_)
        ));
        assert!(matches!(
            session.apply(EditCommand::Rename("Vagabond".to_string())).unwrap(),
            EditFeedback::NameRejected(_)
        ));
        assert_eq!(session.series().name(), "Berserk");
        assert_eq!(
            session.apply(EditCommand::Rename("Berserk".to_string())).unwrap(),
            EditFeedback::Renamed {
                to: "Berserk".to_string()
            }
        );
        assert_eq!(
            session
                .apply(EditCommand::Rename("Berserk Deluxe".to_string()))
                .unwrap(),
            EditFeedback::Renamed {
                to: "Berserk Deluxe".to_string()
            }
        );
        assert_eq!(session.state(), EditState::Editing);
        assert_eq!(series.name(), "Berserk Deluxe");
    }

    #[test]
    fn test_remove_everything_signals_empty() {
        let mut series = sample("Berserk", "1-3");
        let index = names(&[]);
        let mut session = EditSession::new(&mut series, &index);
        let feedback = session
            .apply(EditCommand::RemoveVolumes("1-3, 0".to_string()))
            .unwrap();
        match feedback {
            EditFeedback::VolumesChanged { issues, now_empty } => {
                assert!(now_empty);
                assert_eq!(issues.len(), 1);
            }
            other => panic!("unexpected feedback {other:?}"),
        }
        assert_eq!(series.readable_volumes(), "None");
        assert_eq!(series.next_volume(), 1);
    }

    #[test]
    fn test_readable_cache_invalidated() {
        let mut series = sample("Berserk", "1");
        assert_eq!(series.readable_volumes(), "1");
        series.add_volumes(&VolumeSet::from_ranges("2", 128));
        assert_eq!(series.readable_volumes(), "1-2");
    }

    #[test]
    fn test_add_next_volume() {
        let mut series = sample("Berserk", "1-2, 4");
        assert_eq!(series.add_next_volume(), Some(3));
        assert_eq!(series.next_volume(), 5);

        let mut full = Series::new(NewSeries::new("Full", VolumeSet::from_ranges("1-32", 32)))
            .unwrap();
        assert!(full.next_exceeds_limit());
        assert_eq!(full.add_next_volume(), None);
    }
}
