use crate::browser::BrowserTabResolver;
use crate::db::{lock_store, SharedStore};
use crate::error::CaptureError;
use crate::gauges::{normalize_percent, ResourceGauges};
use crate::input::InputMonitor;
use crate::models::{CaptureOutcome, NewSample};
use crate::platform::{self, WindowSource};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct TrackerConfig {
    pub capture_interval: Duration,
    /// Foreground process that marks an idle or locked session.
    pub idle_process: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_secs(10),
            idle_process: platform::default_idle_process().to_string(),
        }
    }
}

/// External collaborators queried once per capture.
pub struct Sources {
    pub window: Box<dyn WindowSource>,
    pub browser: Box<dyn BrowserTabResolver>,
    pub gauges: Box<dyn ResourceGauges>,
}

/// The capture loop: one sample per tick, merged into the open idle session
/// when the machine is still idle.
pub struct Tracker {
    config: TrackerConfig,
    store: SharedStore,
    input: Arc<InputMonitor>,
    sources: Sources,
}

impl Tracker {
    pub fn new(
        store: SharedStore,
        input: Arc<InputMonitor>,
        sources: Sources,
        config: TrackerConfig,
    ) -> Self {
        Self {
            config,
            store,
            input,
            sources,
        }
    }

    /// Run one capture cycle.
    ///
    /// The store write is a single transaction; an error leaves no partial row.
    pub fn capture_once(&mut self) -> Result<CaptureOutcome, CaptureError> {
        let input = self.input.drain();

        let Some(window) = self.sources.window.active_window() else {
            debug!("No active window, skipping capture");
            return Ok(CaptureOutcome::Skipped);
        };

        let tab = if self.sources.browser.is_browser(&window.process_name) {
            self.sources.browser.active_tab(&window.process_name)
        } else {
            None
        };

        let sample = NewSample {
            window_title: window.window_title,
            process_name: window.process_name,
            process_path: window.process_path,
            cpu_usage: normalize_percent(self.sources.gauges.cpu_percent()),
            memory_usage: normalize_percent(self.sources.gauges.memory_percent()),
            platform: platform::host_platform().to_string(),
            browser_url: tab.as_ref().map(|t| t.url.clone()),
            browser_tab_title: tab.and_then(|t| t.title),
            input_events: input.input_events,
            is_user_active: input.is_active,
        };

        let outcome = {
            let mut store = lock_store(&self.store, "Tracker");
            store.record_capture(&sample, &self.config.idle_process)?
        };

        let indicator = if sample.is_user_active { "active" } else { "idle" };
        match outcome {
            CaptureOutcome::Merged(id) => {
                debug!("Updated {} session (id {id})", self.config.idle_process);
            }
            CaptureOutcome::Inserted(id) => match &sample.browser_url {
                Some(url) => debug!("Tracked [{indicator}] {} - {url} (id {id})", sample.process_name),
                None => debug!(
                    "Tracked [{indicator}] {} - {} (id {id})",
                    sample.process_name, sample.window_title
                ),
            },
            CaptureOutcome::Skipped => {}
        }

        Ok(outcome)
    }

    /// Capture on a dedicated thread until `running` is cleared.
    ///
    /// A failed cycle is logged and the next tick proceeds normally.
    pub fn spawn(mut self, running: Arc<AtomicBool>) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || {
                info!(
                    "Activity tracking started (every {}s)",
                    self.config.capture_interval.as_secs()
                );
                while running.load(Ordering::SeqCst) {
                    if let Err(e) = self.capture_once() {
                        error!("Error capturing activity: {e}");
                    }
                    crate::sleep_while_running(&running, self.config.capture_interval);
                }
                info!("Activity tracking stopped");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserTab;
    use crate::db::SampleStore;
    use crate::platform::{ActiveWindow, IdleClock};
    use crate::test_utils::setup_test_store;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedWindows(RefCell<VecDeque<Option<ActiveWindow>>>);

    impl WindowSource for ScriptedWindows {
        fn active_window(&self) -> Option<ActiveWindow> {
            self.0.borrow_mut().pop_front().flatten()
        }
    }

    struct FixedTab(Option<BrowserTab>);

    impl BrowserTabResolver for FixedTab {
        fn active_tab(&self, _process_name: &str) -> Option<BrowserTab> {
            self.0.clone()
        }
    }

    struct FixedGauges(f64, f64);

    impl ResourceGauges for FixedGauges {
        fn cpu_percent(&mut self) -> f64 {
            self.0
        }
        fn memory_percent(&mut self) -> f64 {
            self.1
        }
    }

    struct ScriptedClock(Mutex<VecDeque<f64>>);

    impl IdleClock for ScriptedClock {
        fn idle_seconds(&self) -> Option<f64> {
            self.0.lock().unwrap().pop_front()
        }
    }

    fn window(process_name: &str, title: &str) -> Option<ActiveWindow> {
        Some(ActiveWindow {
            process_name: process_name.to_string(),
            process_path: format!("/Applications/{process_name}.app"),
            window_title: title.to_string(),
        })
    }

    struct Harness {
        tracker: Tracker,
        store: SharedStore,
        input: Arc<InputMonitor>,
        _dir: TempDir,
    }

    fn harness(windows: Vec<Option<ActiveWindow>>, tab: Option<BrowserTab>, idle: &[f64]) -> Harness {
        let (store, dir) = setup_test_store();
        let store = store.into_shared();
        let input = Arc::new(InputMonitor::new(Box::new(ScriptedClock(Mutex::new(
            idle.iter().copied().collect(),
        )))));
        let sources = Sources {
            window: Box::new(ScriptedWindows(RefCell::new(windows.into()))),
            browser: Box::new(FixedTab(tab)),
            gauges: Box::new(FixedGauges(33.333, 71.1049)),
        };
        let config = TrackerConfig {
            capture_interval: Duration::from_millis(10),
            idle_process: "loginwindow".to_string(),
        };
        Harness {
            tracker: Tracker::new(Arc::clone(&store), Arc::clone(&input), sources, config),
            store,
            input,
            _dir: dir,
        }
    }

    fn latest(store: &SharedStore) -> crate::models::Sample {
        lock_store(store, "test").latest().unwrap().unwrap()
    }

    #[test]
    fn test_capture_records_window_gauges_and_input() {
        let mut h = harness(vec![window("Code", "main.rs")], None, &[9.0, 4.0, 1.0]);
        for _ in 0..3 {
            h.input.poll();
        }

        let outcome = h.tracker.capture_once().unwrap();
        assert!(matches!(outcome, CaptureOutcome::Inserted(_)));

        let row = latest(&h.store);
        assert_eq!(row.process_name, "Code");
        assert_eq!(row.window_title, "main.rs");
        assert!((row.cpu_usage - 33.33).abs() < 1e-9);
        assert!((row.memory_usage - 71.1).abs() < 1e-9);
        assert_eq!(row.input_events, 2);
        assert_eq!(row.mouse_movements, 2);
        assert!(row.is_user_active);
        assert_eq!(row.platform, platform::host_platform());
        assert!(row.browser_url.is_none());

        // The drain reset the counter for the next window.
        assert_eq!(h.input.drain().input_events, 0);
    }

    #[test]
    fn test_missing_window_skips_cycle() {
        let mut h = harness(vec![None], None, &[]);
        assert_eq!(h.tracker.capture_once().unwrap(), CaptureOutcome::Skipped);
        assert_eq!(lock_store(&h.store, "test").count_all().unwrap(), 0);
    }

    #[test]
    fn test_browser_tab_attached_for_browsers_only() {
        let tab = BrowserTab {
            url: "https://docs.rs/".to_string(),
            title: Some("Docs.rs".to_string()),
        };
        let mut h = harness(
            vec![window("Google Chrome", "Docs.rs"), window("Code", "main.rs")],
            Some(tab),
            &[],
        );

        h.tracker.capture_once().unwrap();
        let browser_row = latest(&h.store);
        assert_eq!(browser_row.browser_url.as_deref(), Some("https://docs.rs/"));
        assert_eq!(browser_row.browser_tab_title.as_deref(), Some("Docs.rs"));

        h.tracker.capture_once().unwrap();
        let editor_row = latest(&h.store);
        assert!(editor_row.browser_url.is_none());
        assert!(editor_row.browser_tab_title.is_none());
    }

    #[test]
    fn test_failed_tab_lookup_still_records() {
        let mut h = harness(vec![window("Safari", "Start Page")], None, &[]);
        assert!(matches!(h.tracker.capture_once().unwrap(), CaptureOutcome::Inserted(_)));
        assert!(latest(&h.store).browser_url.is_none());
    }

    #[test]
    fn test_idle_session_collapses_into_one_row() {
        let mut h = harness(
            vec![
                window("loginwindow", "Login"),
                window("loginwindow", "Login"),
                window("loginwindow", "Login"),
                window("Code", "main.rs"),
            ],
            None,
            &[],
        );

        let first = h.tracker.capture_once().unwrap();
        let CaptureOutcome::Inserted(session_id) = first else {
            panic!("expected insert, got {first:?}");
        };
        assert_eq!(h.tracker.capture_once().unwrap(), CaptureOutcome::Merged(session_id));
        assert_eq!(h.tracker.capture_once().unwrap(), CaptureOutcome::Merged(session_id));
        assert!(matches!(h.tracker.capture_once().unwrap(), CaptureOutcome::Inserted(_)));

        assert_eq!(lock_store(&h.store, "test").count_all().unwrap(), 2);
    }

    #[test]
    fn test_store_failure_is_reported_not_fatal() {
        let mut h = harness(vec![window("Code", "a"), window("Code", "b")], None, &[]);
        lock_store(&h.store, "test")
            .connection()
            .execute_batch("ALTER TABLE activities RENAME TO parked")
            .unwrap();

        assert!(h.tracker.capture_once().is_err());

        lock_store(&h.store, "test")
            .connection()
            .execute_batch("ALTER TABLE parked RENAME TO activities")
            .unwrap();
        assert!(matches!(h.tracker.capture_once().unwrap(), CaptureOutcome::Inserted(_)));
        assert_eq!(lock_store(&h.store, "test").count_all().unwrap(), 1);
    }

    #[test]
    fn test_tracker_starts_and_stops() {
        let windows = (0..100).map(|_| window("Code", "main.rs")).collect();
        let h = harness(windows, None, &[]);
        let running = Arc::new(AtomicBool::new(true));

        let handle = h.tracker.spawn(Arc::clone(&running)).unwrap();
        thread::sleep(Duration::from_millis(60));
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert!(lock_store(&h.store, "test").count_all().unwrap() >= 1);
    }

    #[test]
    fn test_shared_store_reopens_with_rows() {
        let (store, dir) = setup_test_store();
        let path = store.path().to_path_buf();
        let shared = store.into_shared();
        lock_store(&shared, "test")
            .append(&crate::test_utils::sample("Code"))
            .unwrap();
        drop(shared);

        assert_eq!(SampleStore::open(&path).unwrap().count_all().unwrap(), 1);
        drop(dir);
    }
}
