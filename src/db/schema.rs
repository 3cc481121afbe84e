/// Oldest on-disk layout of the `activities` table.
///
/// Later columns (`input_events`, `updated_at`) are added by migrations so that
/// files written by earlier releases and fresh files converge on one schema.
pub const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    window_title TEXT,
    process_name TEXT,
    process_path TEXT,
    cpu_usage REAL,
    memory_usage REAL,
    platform TEXT,
    browser_url TEXT,
    browser_tab_title TEXT,
    mouse_movements INTEGER DEFAULT 0,
    is_user_active INTEGER DEFAULT 1,
    synced INTEGER DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_synced ON activities(synced);
";

/// Timestamp format written by the store (UTC, millisecond precision).
///
/// Sorts lexicographically alongside the second-precision
/// `CURRENT_TIMESTAMP` values found in older files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
