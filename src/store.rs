//! SQLite-backed series store.
//!
//! One row per series; the owned volumes are kept in their canonical word encoding. Every
//! statement binds its values as parameters. The only interpolated SQL is the ORDER BY column,
//! which comes from [`SortField`] and never from user text.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::series::{NameIndex, Series};
use crate::volumes::VolumeSet;

pub(crate) type SeriesId = i64;

/// One stored series, exactly as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeriesRow {
    pub(crate) id: Option<SeriesId>,
    pub(crate) name: String,
    pub(crate) volumes_owned: String,
    pub(crate) is_completed: bool,
    pub(crate) next_volume: i64,
    pub(crate) publisher: String,
    pub(crate) author: String,
    pub(crate) alt_names: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SortField {
    #[default]
    Name,
    Author,
    Publisher,
    AltNames,
}

impl SortField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Author => "author",
            Self::Publisher => "publisher",
            Self::AltNames => "alt_names",
        }
    }

    pub(crate) fn key<'a>(&self, row: &'a SeriesRow) -> &'a str {
        match self {
            Self::Name => &row.name,
            Self::Author => &row.author,
            Self::Publisher => &row.publisher,
            Self::AltNames => &row.alt_names,
        }
    }
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    volumes_owned TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    next_volume INTEGER NOT NULL DEFAULT -1,
    publisher TEXT NOT NULL DEFAULT 'Unknown',
    author TEXT NOT NULL DEFAULT 'Unknown',
    alt_names TEXT NOT NULL DEFAULT ''
);
";

const SELECT_COLUMNS: &str =
    "SELECT id, name, volumes_owned, is_completed, next_volume, publisher, author, alt_names
     FROM series";

/// True if `path` ends in `.db` and SQLite can read its schema version.
pub(crate) fn is_database(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("db") || !path.is_file() {
        return false;
    }
    let Ok(conn) = Connection::open(path) else {
        return false;
    };
    conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
        .map(|version| version >= 0)
        .unwrap_or(false)
}

pub(crate) struct SeriesStore {
    conn: Connection,
}

impl SeriesStore {
    /// Open an existing database. Errors if the file doesn't exist.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TrackerError::MissingDatabase(path.to_path_buf()));
        }
        let conn = Connection::open(path).map_err(|e| TrackerError::store("open", e))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open or create a database file with the series table.
    pub(crate) fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TrackerError::io(parent, e))?;
        }
        let conn = Connection::open(path).map_err(|e| TrackerError::store("open", e))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .map_err(|e| TrackerError::store("create schema", e))?;
        debug!("series schema ready");
        Ok(())
    }

    fn row_to_series_row(row: &Row<'_>) -> rusqlite::Result<SeriesRow> {
        Ok(SeriesRow {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            volumes_owned: row.get(2)?,
            is_completed: row.get::<_, i64>(3)? != 0,
            next_volume: row.get(4)?,
            publisher: row.get(5)?,
            author: row.get(6)?,
            alt_names: row.get(7)?,
        })
    }

    fn query_rows(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        context: &'static str,
    ) -> Result<Vec<SeriesRow>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| TrackerError::store(context, e))?;
        let rows = stmt
            .query_map(params, Self::row_to_series_row)
            .map_err(|e| TrackerError::store(context, e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TrackerError::store(context, e))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub(crate) fn count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM series", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| TrackerError::store("count", e))
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Result<Option<SeriesRow>> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE name = ?1"),
                params![name],
                Self::row_to_series_row,
            )
            .optional()
            .map_err(|e| TrackerError::store("find by name", e))
    }

    pub(crate) fn find_by_id(&self, id: SeriesId) -> Result<Option<SeriesRow>> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                Self::row_to_series_row,
            )
            .optional()
            .map_err(|e| TrackerError::store("find by id", e))
    }

    /// Every row, ordered case-insensitively by `order`, then by name.
    pub(crate) fn scan_all(&self, order: SortField) -> Result<Vec<SeriesRow>> {
        let column = order.column();
        self.query_rows(
            &format!("{SELECT_COLUMNS} ORDER BY {column} COLLATE NOCASE ASC, name COLLATE NOCASE ASC"),
            &[],
            "scan series",
        )
    }

    /// Rows whose name, author, publisher or alternate names contain `term`.
    pub(crate) fn search(&self, term: &str) -> Result<Vec<SeriesRow>> {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        self.query_rows(
            &format!(
                "{SELECT_COLUMNS}
                 WHERE name LIKE ?1 ESCAPE '\\' OR author LIKE ?1 ESCAPE '\\'
                    OR publisher LIKE ?1 ESCAPE '\\' OR alt_names LIKE ?1 ESCAPE '\\'
                 ORDER BY name COLLATE NOCASE ASC"
            ),
            &[&pattern],
            "search series",
        )
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Inserts a new row. Fails with `DuplicateName` if the name is taken.
    pub(crate) fn insert(&self, row: &SeriesRow) -> Result<SeriesId> {
        if self.find_by_name(&row.name)?.is_some() {
            return Err(TrackerError::DuplicateName(row.name.clone()));
        }
        self.conn
            .execute(
                "INSERT INTO series (name, volumes_owned, is_completed, next_volume,
                 publisher, author, alt_names)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.name,
                    row.volumes_owned,
                    row.is_completed,
                    row.next_volume,
                    row.publisher,
                    row.author,
                    row.alt_names,
                ],
            )
            .map_err(|e| TrackerError::store("insert series", e))?;
        let id = self.conn.last_insert_rowid();
        debug!(id, name = %row.name, "inserted series");
        Ok(id)
    }

    /// Rewrites a stored row. Fails with `NotFound` if it was deleted in the meantime.
    pub(crate) fn update(&self, id: SeriesId, row: &SeriesRow) -> Result<()> {
        if self.find_by_id(id)?.is_none() {
            return Err(TrackerError::NotFound(row.name.clone()));
        }
        if let Some(existing) = self.find_by_name(&row.name)? {
            if existing.id != Some(id) {
                return Err(TrackerError::DuplicateName(row.name.clone()));
            }
        }
        self.conn
            .execute(
                "UPDATE series SET name = ?1, volumes_owned = ?2, is_completed = ?3,
                 next_volume = ?4, publisher = ?5, author = ?6, alt_names = ?7
                 WHERE id = ?8",
                params![
                    row.name,
                    row.volumes_owned,
                    row.is_completed,
                    row.next_volume,
                    row.publisher,
                    row.author,
                    row.alt_names,
                    id,
                ],
            )
            .map_err(|e| TrackerError::store("update series", e))?;
        debug!(id, name = %row.name, "updated series");
        Ok(())
    }

    pub(crate) fn delete(&self, id: SeriesId) -> Result<()> {
        self.conn
            .execute("DELETE FROM series WHERE id = ?1", params![id])
            .map_err(|e| TrackerError::store("delete series", e))?;
        debug!(id, "deleted series");
        Ok(())
    }

    /// Inserts an unsaved series (assigning its id) or updates a stored one.
    pub(crate) fn save(&self, series: &mut Series) -> Result<SeriesId> {
        let row = series.to_row();
        match series.id() {
            Some(id) => {
                self.update(id, &row)?;
                Ok(id)
            }
            None => {
                let id = self.insert(&row)?;
                series.set_id(id);
                Ok(id)
            }
        }
    }

    /// Re-encodes every row for a new volume limit in one transaction.
    ///
    /// Nothing is written if any series owns a volume above `new_limit`; the offending names are
    /// returned instead.
    pub(crate) fn relimit(&mut self, old_limit: u32, new_limit: u32) -> Result<Vec<String>> {
        let rows = self.scan_all(SortField::Name)?;
        let mut updates = Vec::with_capacity(rows.len());
        let mut blocked = Vec::new();
        for row in rows {
            let volumes = VolumeSet::decode(&row.volumes_owned, old_limit).map_err(|e| {
                TrackerError::CorruptVolumes {
                    name: row.name.clone(),
                    reason: e.to_string(),
                }
            })?;
            match volumes.relimit(new_limit) {
                Some(resized) => updates.push((row.id, resized)),
                None => blocked.push(row.name),
            }
        }
        if !blocked.is_empty() {
            return Ok(blocked);
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| TrackerError::store("begin relimit", e))?;
        for (id, volumes) in &updates {
            tx.execute(
                "UPDATE series SET volumes_owned = ?1, next_volume = ?2 WHERE id = ?3",
                params![volumes.encode(), i64::from(volumes.next_missing()), id],
            )
            .map_err(|e| TrackerError::store("relimit series", e))?;
        }
        tx.commit()
            .map_err(|e| TrackerError::store("commit relimit", e))?;
        info!(old_limit, new_limit, series = updates.len(), "re-encoded volumes");
        Ok(Vec::new())
    }
}

impl NameIndex for SeriesStore {
    fn owner_of(&self, name: &str) -> Result<Option<SeriesId>> {
        Ok(self.find_by_name(name)?.and_then(|row| row.id))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
