//! Shared test utilities for the activity agent.
//!
//! This module provides common setup functions used across test modules.

#![cfg(test)]

use crate::browser::NativeBrowserResolver;
use crate::db::SampleStore;
use crate::error::SyncError;
use crate::gauges::ResourceGauges;
use crate::models::NewSample;
use crate::platform::{ActiveWindow, IdleClock, WindowSource};
use crate::sync::{SyncPayload, SyncTransport};
use crate::tracker::Sources;
use crate::Collaborators;
use tempfile::{tempdir, TempDir};

/// Create a temporary store with migrations applied.
///
/// Returns a tuple of (SampleStore, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the store file from being deleted.
pub fn setup_test_store() -> (SampleStore, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test store");
    let db_path = dir.path().join("test.db");
    let store = SampleStore::open(&db_path).expect("Failed to open test store");
    (store, dir)
}

/// A plausible active sample for `process_name`.
pub fn sample(process_name: &str) -> NewSample {
    NewSample {
        window_title: format!("{process_name} window"),
        process_name: process_name.to_string(),
        process_path: format!("/Applications/{process_name}.app"),
        cpu_usage: 12.5,
        memory_usage: 48.25,
        platform: "darwin".to_string(),
        browser_url: None,
        browser_tab_title: None,
        input_events: 2,
        is_user_active: true,
    }
}

/// Always reports the same foreground window (or none).
pub struct StaticWindow(pub Option<ActiveWindow>);

impl WindowSource for StaticWindow {
    fn active_window(&self) -> Option<ActiveWindow> {
        self.0.clone()
    }
}

pub struct NoIdleClock;

impl IdleClock for NoIdleClock {
    fn idle_seconds(&self) -> Option<f64> {
        None
    }
}

pub struct FixedGauges;

impl ResourceGauges for FixedGauges {
    fn cpu_percent(&mut self) -> f64 {
        10.0
    }
    fn memory_percent(&mut self) -> f64 {
        50.0
    }
}

/// Answers every sync with `status`.
pub struct StatusTransport(pub u16);

impl SyncTransport for StatusTransport {
    fn post(&self, _payload: &SyncPayload) -> Result<u16, SyncError> {
        Ok(self.0)
    }
}

/// Fake collaborators: `process` in the foreground (or nothing), and a
/// transport answering `status` when given.
pub fn test_collaborators(process: Option<&str>, status: Option<u16>) -> Collaborators {
    let window = process.map(|name| ActiveWindow {
        process_name: name.to_string(),
        process_path: format!("/usr/bin/{name}"),
        window_title: format!("{name} window"),
    });
    Collaborators {
        sources: Sources {
            window: Box::new(StaticWindow(window)),
            browser: Box::new(NativeBrowserResolver),
            gauges: Box::new(FixedGauges),
        },
        idle_clock: Box::new(NoIdleClock),
        transport: status.map(|s| -> Box<dyn SyncTransport> { Box::new(StatusTransport(s)) }),
    }
}
