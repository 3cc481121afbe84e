use super::{ActiveWindow, IdleClock, WindowSource};
use crate::models::UNKNOWN;
use log::warn;
use x11rb::connection::Connection;
use x11rb::protocol::screensaver;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, Window};

pub struct LinuxTracker {
    conn: Option<x11rb::rust_connection::RustConnection>,
    root: Window,
}

impl Default for LinuxTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxTracker {
    pub fn new() -> Self {
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let Some(root) = conn.setup().roots.get(screen_num).map(|s| s.root) else {
                    warn!(
                        "Invalid screen number {screen_num} ({} screens available). Window tracking disabled.",
                        conn.setup().roots.len()
                    );
                    return Self { conn: None, root: 0 };
                };
                Self {
                    conn: Some(conn),
                    root,
                }
            }
            Err(e) => {
                // Wayland or headless: keep running, every query yields nothing.
                warn!("Failed to connect to X server: {e}. Window tracking disabled.");
                Self { conn: None, root: 0 }
            }
        }
    }

    fn get_atom(&self, name: &str) -> Option<u32> {
        self.conn
            .as_ref()?
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn get_property_bytes(&self, window: Window, atom: u32, kind: AtomEnum) -> Option<Vec<u8>> {
        let reply = self
            .conn
            .as_ref()?
            .get_property(false, window, atom, kind, 0, 1024)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }
        Some(reply.value)
    }

    fn get_window_property(&self, window: Window, atom: u32) -> Option<String> {
        let bytes = self.get_property_bytes(window, atom, AtomEnum::ANY)?;
        String::from_utf8(bytes).ok()
    }

    fn get_u32_property(&self, window: Window, atom: u32, kind: AtomEnum) -> Option<u32> {
        let bytes = self.get_property_bytes(window, atom, kind)?;
        let word: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(u32::from_ne_bytes(word))
    }

    fn get_active_window_id(&self) -> Option<Window> {
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        self.get_u32_property(self.root, atom, AtomEnum::WINDOW)
            .filter(|id| *id != 0)
    }

    fn get_process_path(&self, window: Window) -> Option<String> {
        let atom = self.get_atom("_NET_WM_PID")?;
        let pid = self.get_u32_property(window, atom, AtomEnum::CARDINAL)?;
        std::fs::read_link(format!("/proc/{pid}/exe"))
            .ok()
            .map(|p| p.display().to_string())
    }
}

impl WindowSource for LinuxTracker {
    fn active_window(&self) -> Option<ActiveWindow> {
        let window_id = self.get_active_window_id()?;

        let name_atom = self
            .get_atom("_NET_WM_NAME")
            .unwrap_or_else(|| AtomEnum::WM_NAME.into());

        let window_title = self
            .get_window_property(window_id, name_atom)
            .unwrap_or_else(|| UNKNOWN.to_string());

        // WM_CLASS is "instance\0class\0"; the class names the application.
        let process_name = self
            .get_window_property(window_id, AtomEnum::WM_CLASS.into())
            .and_then(|s| {
                let mut parts = s.split('\0').filter(|p| !p.is_empty());
                let instance = parts.next().map(str::to_string);
                parts.next().map(str::to_string).or(instance)
            })
            .unwrap_or_else(|| UNKNOWN.to_string());

        let process_path = self
            .get_process_path(window_id)
            .unwrap_or_else(|| UNKNOWN.to_string());

        Some(ActiveWindow {
            process_name,
            process_path,
            window_title,
        })
    }
}

impl IdleClock for LinuxTracker {
    fn idle_seconds(&self) -> Option<f64> {
        let conn = self.conn.as_ref()?;
        let info = screensaver::query_info(conn, self.root).ok()?.reply().ok()?;
        Some(f64::from(info.ms_since_user_input) / 1000.0)
    }
}
