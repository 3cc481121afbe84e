use thiserror::Error;

/// Errors raised by the sample store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Sample {id} not found")]
    NotFound { id: i64 },

    #[error("Store schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i32, supported: i32 },

    #[error("Store has no activities table; run activity-agent once to create it")]
    NotInitialized,
}

/// Errors raised while delivering samples to the remote endpoint.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abort a single capture cycle.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that abort agent startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Could not create data directory: {0}")]
    DataDirCreation(std::io::Error),

    #[error("Failed to open sample store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

