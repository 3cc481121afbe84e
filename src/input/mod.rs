use crate::platform::IdleClock;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

pub struct InputMonitorConfig {
    pub poll_interval: Duration,
}

impl Default for InputMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Input activity accumulated since the previous drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStats {
    pub input_events: u32,
    pub is_active: bool,
}

#[derive(Debug, Default)]
struct Counter {
    last_idle_secs: Option<f64>,
    event_count: u32,
}

impl Counter {
    fn observe(&mut self, idle_secs: f64) -> bool {
        let decreased = self.last_idle_secs.is_some_and(|last| idle_secs < last);
        if decreased {
            self.event_count = self.event_count.saturating_add(1);
        }
        self.last_idle_secs = Some(idle_secs);
        decreased
    }
}

/// Infers input events from the platform idle-time counter.
///
/// A strict drop in idle time between two polls means the user touched the
/// keyboard or mouse at least once in between. `poll` and `drain` share one
/// lock, so no event is lost or counted twice across a drain.
pub struct InputMonitor {
    clock: Box<dyn IdleClock>,
    counter: Mutex<Counter>,
}

impl InputMonitor {
    pub fn new(clock: Box<dyn IdleClock>) -> Self {
        Self {
            clock,
            counter: Mutex::new(Counter::default()),
        }
    }

    fn lock_counter(&self) -> MutexGuard<'_, Counter> {
        match self.counter.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("InputMonitor: counter mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Take one idle-time reading. Unreadable counters leave state untouched.
    pub fn poll(&self) {
        let Some(idle_secs) = self.clock.idle_seconds() else {
            trace!("Idle counter unavailable, skipping poll");
            return;
        };
        if self.lock_counter().observe(idle_secs) {
            trace!("Input detected (idle reset to {idle_secs:.1}s)");
        }
    }

    /// Read and reset the accumulated event count.
    pub fn drain(&self) -> InputStats {
        let mut counter = self.lock_counter();
        let input_events = std::mem::take(&mut counter.event_count);
        InputStats {
            input_events,
            is_active: input_events > 0,
        }
    }

    /// Poll on a dedicated thread until `running` is cleared.
    pub fn spawn(
        self: &Arc<Self>,
        config: &InputMonitorConfig,
        running: Arc<AtomicBool>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        let monitor = Arc::clone(self);
        let interval = config.poll_interval;

        thread::Builder::new()
            .name("input-monitor".to_string())
            .spawn(move || {
                info!("Input activity tracking (idle-based) enabled");
                while running.load(Ordering::SeqCst) {
                    monitor.poll();
                    crate::sleep_while_running(&running, interval);
                }
                debug!("Input monitor stopped");
            })
    }
}
