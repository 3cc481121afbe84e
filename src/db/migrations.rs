use super::schema::SCHEMA_V1;
use crate::error::StoreError;
use log::info;
use rusqlite::{Connection, Transaction};

pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Bring the store up to [`CURRENT_SCHEMA_VERSION`].
///
/// Versions are tracked in `PRAGMA user_version`; each step runs at most once
/// and all pending steps commit together.
pub fn run(conn: &mut Connection) -> Result<(), StoreError> {
    let mut version = schema_version(conn)?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        info!("Applied store migration v{next_version}");
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32, StoreError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), StoreError> {
    match version {
        1 => tx.execute_batch(SCHEMA_V1)?,
        2 => {
            if !has_column(tx, "activities", "input_events")? {
                tx.execute_batch(
                    "ALTER TABLE activities ADD COLUMN input_events INTEGER DEFAULT 0;
                     UPDATE activities SET input_events = COALESCE(mouse_movements, 0);",
                )?;
            }
        }
        3 => {
            // SQLite rejects non-constant defaults on ADD COLUMN, so inserts
            // always write updated_at explicitly.
            if !has_column(tx, "activities", "updated_at")? {
                tx.execute_batch("ALTER TABLE activities ADD COLUMN updated_at DATETIME")?;
            }
            tx.execute(
                "UPDATE activities SET updated_at = created_at WHERE updated_at IS NULL",
                [],
            )?;
        }
        _ => {
            return Err(StoreError::UnsupportedVersion {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            })
        }
    }
    Ok(())
}

pub(crate) fn has_table(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info('activities') ORDER BY cid")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_store_reaches_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        let cols = columns(&conn);
        assert!(cols.contains(&"input_events".to_string()));
        assert!(cols.contains(&"updated_at".to_string()));

        let index_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_synced'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();

        let cols = columns(&conn);
        let input_cols = cols.iter().filter(|c| c.as_str() == "input_events").count();
        assert_eq!(input_cols, 1);
    }

    #[test]
    fn test_unversioned_file_with_updated_at_is_adopted() {
        // Files written before versioning may already carry updated_at.
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_V1).unwrap();
        conn.execute_batch("ALTER TABLE activities ADD COLUMN updated_at DATETIME")
            .unwrap();
        conn.execute(
            "INSERT INTO activities (process_name, created_at) VALUES ('Finder', '2024-05-01 09:00:00')",
            [],
        )
        .unwrap();

        run(&mut conn).unwrap();

        let updated_at: String = conn
            .query_row("SELECT updated_at FROM activities WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(updated_at, "2024-05-01 09:00:00");
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_added_input_events_copies_legacy_counter() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_V1).unwrap();
        conn.execute(
            "INSERT INTO activities (process_name, mouse_movements) VALUES ('Code', 6)",
            [],
        )
        .unwrap();

        run(&mut conn).unwrap();

        let input_events: i64 = conn
            .query_row("SELECT input_events FROM activities WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(input_events, 6);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();

        let err = run(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { .. }));
    }
}
