use super::{ActiveWindow, IdleClock, WindowSource};
use crate::models::UNKNOWN;
use log::trace;
use std::process::Command;
use std::time::Duration;

/// Field separator in the frontmost-app script output.
const FIELD_SEP: &str = "|||";

const FRONTMOST_SCRIPT: &str = r#"
tell application "System Events"
    set frontApp to first application process whose frontmost is true
    set appName to name of frontApp
    set appPath to ""
    try
        set appPath to POSIX path of (application file of frontApp as alias)
    end try
    set winTitle to ""
    try
        set winTitle to name of front window of frontApp
    end try
    return appName & "|||" & appPath & "|||" & winTitle
end tell
"#;

pub struct MacOSTracker;

impl Default for MacOSTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MacOSTracker {
    pub fn new() -> Self {
        Self
    }
}

/// Run an AppleScript snippet and return its trimmed stdout.
pub(crate) fn run_osascript(script: &str) -> Option<String> {
    let output = Command::new("osascript").arg("-e").arg(script).output().ok()?;
    if !output.status.success() {
        trace!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn parse_frontmost(output: &str) -> Option<ActiveWindow> {
    let mut fields = output.splitn(3, FIELD_SEP).map(str::trim);
    let process_name = fields.next().filter(|s| !s.is_empty())?;
    let or_unknown = |s: Option<&str>| {
        s.filter(|v| !v.is_empty())
            .map_or_else(|| UNKNOWN.to_string(), str::to_string)
    };
    Some(ActiveWindow {
        process_name: process_name.to_string(),
        process_path: or_unknown(fields.next()),
        window_title: or_unknown(fields.next()),
    })
}

/// Extract `HIDIdleTime` (nanoseconds) from `ioreg -c IOHIDSystem` output.
fn parse_hid_idle_secs(output: &str) -> Option<f64> {
    output
        .lines()
        .find(|line| line.contains("\"HIDIdleTime\""))
        .and_then(|line| line.rsplit('=').next())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|nanos| Duration::from_nanos(nanos).as_secs_f64())
}

impl WindowSource for MacOSTracker {
    fn active_window(&self) -> Option<ActiveWindow> {
        parse_frontmost(&run_osascript(FRONTMOST_SCRIPT)?)
    }
}

impl IdleClock for MacOSTracker {
    fn idle_seconds(&self) -> Option<f64> {
        let output = Command::new("ioreg")
            .args(["-c", "IOHIDSystem"])
            .output()
            .ok()?;
        parse_hid_idle_secs(&String::from_utf8_lossy(&output.stdout))
    }
}
