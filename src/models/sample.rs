use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde::Serialize;

/// Columns read by every `Sample` query, in `Sample::from_row` order.
pub const SAMPLE_COLUMNS: [&str; 16] = [
    "id",
    "timestamp",
    "window_title",
    "process_name",
    "process_path",
    "cpu_usage",
    "memory_usage",
    "platform",
    "browser_url",
    "browser_tab_title",
    "mouse_movements",
    "input_events",
    "is_user_active",
    "synced",
    "created_at",
    "updated_at",
];

/// One stored row: a captured activity snapshot or a merged idle session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub id: i64,
    pub timestamp: String,
    pub window_title: String,
    pub process_name: String,
    pub process_path: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub platform: String,
    pub browser_url: Option<String>,
    pub browser_tab_title: Option<String>,
    pub mouse_movements: u32,
    pub input_events: u32,
    pub is_user_active: bool,
    pub synced: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Sample {
    /// Map a row selected with [`SAMPLE_COLUMNS`].
    ///
    /// Older stores wrote gauges as text and left some columns NULL, so every
    /// column is coerced rather than read with a strict type.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at = text_at(row, 14)?.unwrap_or_default();
        let mouse_movements = count_at(row, 10)?.unwrap_or(0);
        Ok(Self {
            id: row.get(0)?,
            timestamp: text_at(row, 1)?.unwrap_or_else(|| created_at.clone()),
            window_title: text_at(row, 2)?.unwrap_or_else(|| UNKNOWN.to_string()),
            process_name: text_at(row, 3)?.unwrap_or_else(|| UNKNOWN.to_string()),
            process_path: text_at(row, 4)?.unwrap_or_else(|| UNKNOWN.to_string()),
            cpu_usage: real_at(row, 5)?,
            memory_usage: real_at(row, 6)?,
            platform: text_at(row, 7)?.unwrap_or_default(),
            browser_url: text_at(row, 8)?,
            browser_tab_title: text_at(row, 9)?,
            mouse_movements,
            // Rows written before input_events existed only carry the legacy counter
            input_events: count_at(row, 11)?.unwrap_or(mouse_movements),
            is_user_active: flag_at(row, 12)?,
            synced: flag_at(row, 13)?,
            updated_at: text_at(row, 15)?.unwrap_or_else(|| created_at.clone()),
            created_at,
        })
    }
}

/// Placeholder for window facts the platform could not provide.
pub const UNKNOWN: &str = "Unknown";

/// A sample ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub window_title: String,
    pub process_name: String,
    pub process_path: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub platform: String,
    pub browser_url: Option<String>,
    pub browser_tab_title: Option<String>,
    pub input_events: u32,
    pub is_user_active: bool,
}

impl NewSample {
    /// The fields an idle-session merge refreshes on the open row.
    pub fn idle_merge(&self) -> IdleMerge {
        IdleMerge {
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
            input_events: self.input_events,
            is_user_active: self.is_user_active,
        }
    }
}

/// Fields updated in place when an idle session absorbs another capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleMerge {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub input_events: u32,
    pub is_user_active: bool,
}

/// What a capture cycle did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No foreground window; nothing written.
    Skipped,
    Inserted(i64),
    Merged(i64),
}

/// Read-only counters for the status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub total_records: u64,
    pub unsynced_records: u64,
    pub store_path: String,
}

fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    })
}

#[allow(
    clippy::as_conversions,
    clippy::cast_precision_loss,
    reason = "legacy integer gauges are small percentages"
)]
fn real_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Real(f) => f,
        ValueRef::Integer(i) => i as f64,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0),
        ValueRef::Null | ValueRef::Blob(_) => 0.0,
    })
}

/// `None` only for SQL NULL; unparseable legacy values read as 0.
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "clamped to the u32 range before casting"
)]
fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u32>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(u32::try_from(i.max(0)).unwrap_or(u32::MAX)),
        ValueRef::Real(f) => Some(f.clamp(0.0, f64::from(u32::MAX)) as u32),
        ValueRef::Text(t) => Some(
            std::str::from_utf8(t)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0),
        ),
        ValueRef::Blob(_) => Some(0),
    })
}

fn flag_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => i != 0,
        ValueRef::Real(f) => f.abs() > 0.0,
        ValueRef::Text(t) => matches!(t, b"1" | b"true" | b"TRUE"),
        ValueRef::Null | ValueRef::Blob(_) => false,
    })
}
