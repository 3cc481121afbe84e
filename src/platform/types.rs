#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveWindow {
    pub process_name: String,
    pub process_path: String,
    pub window_title: String,
}

/// Foreground window/process facts, queried once per capture.
pub trait WindowSource: Send {
    fn active_window(&self) -> Option<ActiveWindow>;
}

/// Seconds since the last keyboard or mouse input.
pub trait IdleClock: Send + Sync {
    fn idle_seconds(&self) -> Option<f64>;
}
