pub mod types;

pub use types::{ActiveWindow, IdleClock, WindowSource};

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub use macos::MacOSTracker as NativeTracker;

#[cfg(target_os = "linux")]
pub use linux::LinuxTracker as NativeTracker;

/// Host identifier stored with each sample, in the naming used by the sync
/// endpoint.
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

/// Foreground process shown while the session is locked or idle.
pub fn default_idle_process() -> &'static str {
    match std::env::consts::OS {
        "macos" => "loginwindow",
        "windows" => "LockApp.exe",
        _ => "xscreensaver",
    }
}

// Platforms without window inspection report nothing, so every capture is skipped.
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub struct NativeTracker;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl WindowSource for NativeTracker {
    fn active_window(&self) -> Option<ActiveWindow> {
        None
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl IdleClock for NativeTracker {
    fn idle_seconds(&self) -> Option<f64> {
        None
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl NativeTracker {
    pub fn new() -> Self {
        Self
    }
}
