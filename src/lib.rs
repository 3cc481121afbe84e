pub mod browser;
pub mod config;
pub mod db;
pub mod error;
pub mod gauges;
pub mod input;
pub mod models;
pub mod platform;
pub mod sync;
#[cfg(test)]
mod test_utils;
pub mod tracker;

use crate::browser::NativeBrowserResolver;
use crate::config::AgentConfig;
use crate::db::{lock_store, SampleStore, SharedStore};
use crate::error::{InitError, StoreError};
use crate::gauges::SystemGauges;
use crate::input::InputMonitor;
use crate::models::AgentStatus;
use crate::platform::{IdleClock, NativeTracker};
use crate::sync::{HttpTransport, SyncEngine, SyncReport, SyncTransport};
use crate::tracker::{Sources, Tracker};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep in a worker loop, so shutdown stays prompt.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Sleep for `duration`, returning early once `running` is cleared.
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Everything the agent queries outside its own process.
pub struct Collaborators {
    pub sources: Sources,
    pub idle_clock: Box<dyn IdleClock>,
    /// `None` keeps the agent offline even when an endpoint is configured.
    pub transport: Option<Box<dyn SyncTransport>>,
}

impl Collaborators {
    /// Platform-backed collaborators for `config`.
    pub fn native(config: &AgentConfig) -> Self {
        Self {
            sources: Sources {
                window: Box::new(NativeTracker::new()),
                browser: Box::new(NativeBrowserResolver),
                gauges: Box::new(SystemGauges::new()),
            },
            idle_clock: Box::new(NativeTracker::new()),
            transport: config.sync().map(|sync| -> Box<dyn SyncTransport> {
                Box::new(HttpTransport::new(&sync))
            }),
        }
    }
}

/// The running agent: input monitor, capture loop and (when online) sync
/// engine, each on its own thread over one shared store.
pub struct Agent {
    store: SharedStore,
    sync: Option<Arc<SyncEngine>>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Agent {
    /// Open the configured store and start every worker.
    pub fn start(config: &AgentConfig) -> Result<Self, InitError> {
        let db_path = config.resolve_db_path()?;
        let store = SampleStore::open(&db_path)?;
        info!("Database initialized at: {}", db_path.display());
        Self::launch(store, config, Collaborators::native(config))
    }

    /// Start every worker over an already opened store.
    pub fn launch(
        store: SampleStore,
        config: &AgentConfig,
        collaborators: Collaborators,
    ) -> Result<Self, InitError> {
        let Collaborators {
            sources,
            idle_clock,
            transport,
        } = collaborators;

        let mut agent = Self {
            store: store.into_shared(),
            sync: None,
            running: Arc::new(AtomicBool::new(true)),
            handles: Vec::new(),
        };

        let monitor = Arc::new(InputMonitor::new(idle_clock));
        let handle = monitor.spawn(&config.input_monitor(), Arc::clone(&agent.running));
        agent.adopt("input-monitor", handle)?;

        let tracker = Tracker::new(
            Arc::clone(&agent.store),
            Arc::clone(&monitor),
            sources,
            config.tracker(),
        );
        let handle = tracker.spawn(Arc::clone(&agent.running));
        agent.adopt("capture-loop", handle)?;

        match (config.sync(), transport) {
            (Some(sync_config), Some(transport)) => {
                let engine = Arc::new(SyncEngine::new(
                    Arc::clone(&agent.store),
                    transport,
                    sync_config,
                ));
                let handle = engine.spawn(Arc::clone(&agent.running));
                agent.adopt("sync-engine", handle)?;
                agent.sync = Some(engine);
            }
            (Some(sync_config), None) => warn!(
                "No sync transport available for {} - running in offline mode",
                sync_config.endpoint
            ),
            (None, _) => warn!("No API_ENDPOINT configured - running in offline mode"),
        }

        info!("Activity agent is running in background");
        Ok(agent)
    }

    fn adopt(
        &mut self,
        name: &'static str,
        spawned: std::io::Result<JoinHandle<()>>,
    ) -> Result<(), InitError> {
        match spawned {
            Ok(handle) => {
                self.handles.push(handle);
                Ok(())
            }
            Err(source) => {
                self.stop_workers();
                Err(InitError::Spawn { name, source })
            }
        }
    }

    pub fn status(&self) -> Result<AgentStatus, StoreError> {
        lock_store(&self.store, "Agent").status()
    }

    pub fn is_online(&self) -> bool {
        self.sync.is_some()
    }

    /// Manual sync; `None` when the agent is offline.
    pub fn sync_now(&self) -> Option<SyncReport> {
        self.sync.as_ref().map(|engine| {
            info!("Manual sync triggered");
            engine.sync_now()
        })
    }

    fn stop_workers(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("A worker thread panicked during shutdown");
            }
        }
    }

    /// Stop scheduling work, wait for in-flight cycles, and report final counts.
    pub fn shutdown(mut self) -> Result<AgentStatus, StoreError> {
        info!("Shutting down...");
        self.stop_workers();
        let status = self.status()?;
        info!(
            "Activity tracking stopped ({} records, {} unsynced)",
            status.total_records, status.unsynced_records
        );
        Ok(status)
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample, setup_test_store, test_collaborators};

    fn fast_config(endpoint: Option<&str>) -> AgentConfig {
        AgentConfig {
            api_endpoint: endpoint.map(str::to_string),
            capture_interval_secs: 1,
            input_poll_secs: 1,
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_sleep_while_running_returns_early() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        sleep_while_running(&running, Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_offline_agent_captures_and_shuts_down() {
        let (store, _dir) = setup_test_store();
        let agent =
            Agent::launch(store, &fast_config(None), test_collaborators(Some("Code"), None))
                .unwrap();
        assert!(!agent.is_online());
        assert!(agent.sync_now().is_none());

        // The capture loop fires its first cycle immediately.
        for _ in 0..50 {
            if agent.status().unwrap().total_records > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        let status = agent.shutdown().unwrap();
        assert!(status.total_records >= 1);
        assert_eq!(status.unsynced_records, status.total_records);
    }

    #[test]
    fn test_online_agent_manual_sync() {
        let (store, _dir) = setup_test_store();
        store.append(&sample("Code")).unwrap();
        let agent = Agent::launch(
            store,
            &fast_config(Some("http://localhost/ingest")),
            test_collaborators(None, Some(200)),
        )
        .unwrap();
        assert!(agent.is_online());

        let report = agent.sync_now().unwrap();
        assert!(report.success);
        assert_eq!(agent.status().unwrap().unsynced_records, 0);
        agent.shutdown().unwrap();
    }

    #[test]
    fn test_endpoint_without_transport_stays_offline() {
        let (store, _dir) = setup_test_store();
        let agent = Agent::launch(
            store,
            &fast_config(Some("http://localhost/ingest")),
            test_collaborators(None, None),
        )
        .unwrap();
        assert!(!agent.is_online());
    }
}
