mod transport;

pub use transport::{HttpTransport, SyncTransport};

use crate::db::{lock_store, SharedStore};
use crate::error::SyncError;
use crate::models::Sample;
use crate::platform;
use chrono::{SecondsFormat, Utc};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct SyncConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Delay before the first sync after startup.
    pub initial_delay: Duration,
    pub interval: Duration,
    pub timeout: Duration,
}

impl SyncConfig {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(30 * 60),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One sample as sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
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
    pub created_at: String,
}

impl From<&Sample> for ActivityRecord {
    fn from(sample: &Sample) -> Self {
        Self {
            id: sample.id,
            timestamp: sample.timestamp.clone(),
            window_title: sample.window_title.clone(),
            process_name: sample.process_name.clone(),
            process_path: sample.process_path.clone(),
            cpu_usage: sample.cpu_usage,
            memory_usage: sample.memory_usage,
            platform: sample.platform.clone(),
            browser_url: sample.browser_url.clone(),
            browser_tab_title: sample.browser_tab_title.clone(),
            mouse_movements: sample.mouse_movements,
            input_events: sample.input_events,
            is_user_active: sample.is_user_active,
            created_at: sample.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncMetadata {
    pub total_records: usize,
    pub sync_timestamp: String,
    pub device_platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPayload {
    pub activities: Vec<ActivityRecord>,
    pub metadata: SyncMetadata,
}

impl SyncPayload {
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            activities: samples.iter().map(ActivityRecord::from).collect(),
            metadata: SyncMetadata {
                total_records: samples.len(),
                sync_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                device_platform: platform::host_platform().to_string(),
            },
        }
    }
}

/// Result of one sync attempt, as shown to the status reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub synced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<usize, SyncError>> for SyncReport {
    fn from(result: Result<usize, SyncError>) -> Self {
        match result {
            Ok(synced) => Self {
                success: true,
                synced,
                error: None,
            },
            Err(e) => Self {
                success: false,
                synced: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Delivers unsynced samples upstream and flags them once acknowledged.
///
/// Delivery is at-least-once: a row stays unsynced until a 2xx response
/// covers it, so the endpoint must treat `id` as an idempotency key.
pub struct SyncEngine {
    store: SharedStore,
    transport: Box<dyn SyncTransport>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(store: SharedStore, transport: Box<dyn SyncTransport>, config: SyncConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Sync everything currently unsynced.
    pub fn sync_now(&self) -> SyncReport {
        let report = SyncReport::from(self.try_sync());
        if let Some(e) = &report.error {
            error!("Network sync error: {e}");
        }
        report
    }

    fn try_sync(&self) -> Result<usize, SyncError> {
        // The store lock is never held across the network call.
        let pending = lock_store(&self.store, "SyncEngine").unsynced(None)?;

        if pending.is_empty() {
            debug!("No data to sync");
            return Ok(0);
        }

        info!("Syncing {} records to {}", pending.len(), self.config.endpoint);
        let payload = SyncPayload::from_samples(&pending);
        let status = self.transport.post(&payload)?;

        if !(200..300).contains(&status) {
            return Err(SyncError::Http { status });
        }

        let ids: Vec<i64> = pending.iter().map(|s| s.id).collect();
        lock_store(&self.store, "SyncEngine").mark_synced(&ids)?;

        info!("Successfully synced {} records", ids.len());
        Ok(ids.len())
    }

    /// Sync once after the initial delay, then on every interval, until
    /// `running` is cleared.
    pub fn spawn(self: &Arc<Self>, running: Arc<AtomicBool>) -> std::io::Result<thread::JoinHandle<()>> {
        let engine = Arc::clone(self);

        thread::Builder::new()
            .name("sync-engine".to_string())
            .spawn(move || {
                info!(
                    "Network sync enabled (every {} minutes)",
                    engine.config.interval.as_secs() / 60
                );
                let mut wait = engine.config.initial_delay;
                loop {
                    crate::sleep_while_running(&running, wait);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    engine.sync_now();
                    wait = engine.config.interval;
                }
                info!("Network sync stopped");
            })
    }
}
