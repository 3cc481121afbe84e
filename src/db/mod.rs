pub mod migrations;
pub mod schema;

use crate::error::StoreError;
use crate::models::{AgentStatus, CaptureOutcome, IdleMerge, NewSample, Sample, SAMPLE_COLUMNS};
use chrono::Utc;
use log::{debug, warn};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use schema::TIMESTAMP_FORMAT;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Store handle shared by the capture loop, the sync engine and status readers.
pub type SharedStore = Arc<Mutex<SampleStore>>;

/// SQLite binds at most 999 variables in older builds.
const MARK_SYNCED_CHUNK: usize = 500;

/// Durable store of captured samples.
///
/// Every mutating call commits before returning, so a crash loses at most the
/// operation in flight.
pub struct SampleStore {
    conn: Connection,
    path: PathBuf,
    /// Select list matching `Sample::from_row` for this file's columns.
    select: String,
}

impl SampleStore {
    /// Open (or create) the store at `path` and apply pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut conn = Connection::open(path)?;
        migrations::run(&mut conn)?;
        let select = sample_select(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            select,
        })
    }

    /// Open an existing store for reading only; no migrations are applied.
    ///
    /// Files from older releases are read as they are, with columns they
    /// lack reported as NULL.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let found = migrations::schema_version(&conn)?;
        if found > migrations::CURRENT_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found,
                supported: migrations::CURRENT_SCHEMA_VERSION,
            });
        }
        if !migrations::has_table(&conn, "activities")? {
            return Err(StoreError::NotInitialized);
        }
        if found < migrations::CURRENT_SCHEMA_VERSION {
            debug!("Reading store at schema v{found} without migrating");
        }
        let select = sample_select(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            select,
        })
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a new sample and return its id.
    pub fn append(&self, sample: &NewSample) -> Result<i64, StoreError> {
        insert_sample(&self.conn, sample)
    }

    /// Refresh the idle-session fields of row `id`.
    pub fn merge_into_latest(&self, id: i64, merge: &IdleMerge) -> Result<(), StoreError> {
        update_idle_session(&self.conn, id, merge)
    }

    /// Most recently inserted row.
    pub fn latest(&self) -> Result<Option<Sample>, StoreError> {
        latest_sample(&self.conn, &self.select)
    }

    /// Merge into the open idle session or insert, as one transaction.
    ///
    /// A capture merges only when both the latest row and `sample` belong to
    /// `idle_process`; everything else becomes a new row.
    pub fn record_capture(
        &mut self,
        sample: &NewSample,
        idle_process: &str,
    ) -> Result<CaptureOutcome, StoreError> {
        let tx = self.conn.transaction()?;

        let open_session = if sample.process_name == idle_process {
            latest_sample(&tx, &self.select)?.filter(|latest| latest.process_name == idle_process)
        } else {
            None
        };

        let outcome = match open_session {
            Some(latest) => {
                update_idle_session(&tx, latest.id, &sample.idle_merge())?;
                CaptureOutcome::Merged(latest.id)
            }
            None => CaptureOutcome::Inserted(insert_sample(&tx, sample)?),
        };

        tx.commit()?;
        Ok(outcome)
    }

    pub fn count_all(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn count_unsynced(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Unsynced rows in ascending id order, at most `limit` when given.
    pub fn unsynced(&self, limit: Option<usize>) -> Result<Vec<Sample>, StoreError> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM activities WHERE synced = 0 ORDER BY id ASC LIMIT ?1",
            self.select
        ))?;
        let rows = stmt.query_map([limit], Sample::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Flag `ids` as delivered. Already-synced ids are left as they are.
    ///
    /// Returns the number of rows that flipped from unsynced to synced.
    pub fn mark_synced(&mut self, ids: &[i64]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for chunk in ids.chunks(MARK_SYNCED_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            changed += tx.execute(
                &format!(
                    "UPDATE activities SET synced = 1 WHERE synced = 0 AND id IN ({placeholders})"
                ),
                params_from_iter(chunk.iter()),
            )?;
        }
        tx.commit()?;

        debug!("Marked {changed} of {} samples as synced", ids.len());
        Ok(changed)
    }

    /// The `n` most recent rows, newest first.
    pub fn recent(&self, n: usize) -> Result<Vec<Sample>, StoreError> {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM activities ORDER BY id DESC LIMIT ?1",
            self.select
        ))?;
        let rows = stmt.query_map([n], Sample::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Process names ranked by number of samples.
    pub fn top_processes(&self, n: usize) -> Result<Vec<(String, u64)>, StoreError> {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(process_name, 'Unknown'), COUNT(*) AS count
             FROM activities
             GROUP BY process_name
             ORDER BY count DESC, process_name ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([n], |row| {
            let count: i64 = row.get(1)?;
            Ok((row.get(0)?, u64::try_from(count).unwrap_or(0)))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn status(&self) -> Result<AgentStatus, StoreError> {
        Ok(AgentStatus {
            total_records: self.count_all()?,
            unsynced_records: self.count_unsynced()?,
            store_path: self.path.display().to_string(),
        })
    }
}

/// Lock the shared store, recovering from poisoning if necessary.
pub fn lock_store<'a>(store: &'a SharedStore, context: &str) -> MutexGuard<'a, SampleStore> {
    match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context}: store mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

fn insert_sample(conn: &Connection, sample: &NewSample) -> Result<i64, StoreError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO activities (
            timestamp, window_title, process_name, process_path, cpu_usage, memory_usage,
            platform, browser_url, browser_tab_title, mouse_movements, input_events,
            is_user_active, synced, created_at, updated_at
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?1, ?1)",
        params![
            now,
            sample.window_title,
            sample.process_name,
            sample.process_path,
            sample.cpu_usage,
            sample.memory_usage,
            sample.platform,
            sample.browser_url,
            sample.browser_tab_title,
            sample.input_events,
            sample.input_events,
            sample.is_user_active,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_idle_session(conn: &Connection, id: i64, merge: &IdleMerge) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE activities
         SET updated_at = ?1,
             cpu_usage = ?2,
             memory_usage = ?3,
             mouse_movements = ?4,
             input_events = ?4,
             is_user_active = ?5
         WHERE id = ?6",
        params![
            now_timestamp(),
            merge.cpu_usage,
            merge.memory_usage,
            merge.input_events,
            merge.is_user_active,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { id });
    }
    Ok(())
}

/// Select list for `Sample::from_row`, reading absent columns as NULL.
fn sample_select(conn: &Connection) -> Result<String, StoreError> {
    let mut columns = Vec::with_capacity(SAMPLE_COLUMNS.len());
    for column in SAMPLE_COLUMNS {
        if migrations::has_column(conn, "activities", column)? {
            columns.push(column.to_string());
        } else {
            columns.push(format!("NULL AS {column}"));
        }
    }
    Ok(columns.join(", "))
}

fn latest_sample(conn: &Connection, select: &str) -> Result<Option<Sample>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {select} FROM activities ORDER BY id DESC LIMIT 1"),
            [],
            Sample::from_row,
        )
        .optional()?)
}
